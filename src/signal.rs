//! SIGINT/SIGQUIT/SIGALRM handling.
//!
//! The shell ignores SIGINT for its whole life. SIGQUIT arms an exit latch
//! and prints a warning; a second SIGQUIT while armed ends the shell. Five
//! seconds after arming, SIGALRM disarms the latch again.
//!
//! The handlers touch nothing but the latch's atomic flag and call only
//! async-signal-safe functions (`write`, `alarm`, `_exit`).

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};

/// How long the latch stays armed after the first SIGQUIT.
pub const QUIT_WINDOW_SECS: u32 = 5;

const QUIT_WARNING: &'static [u8] = b"\nType Ctrl-\\ again within 5 seconds to exit.\n";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QuitAction {
	/// First press: warn and start the timer.
	Warn,
	/// Second press inside the window.
	Exit,
}

/// The `Idle`/`ArmedForExit` state, kept in a single atomic flag.
#[derive(Debug)]
pub struct QuitLatch {
	armed: AtomicBool,
}

impl QuitLatch {
	pub const fn new() -> QuitLatch {
		QuitLatch { armed: AtomicBool::new(false) }
	}

	pub fn on_quit(&self) -> QuitAction {
		if self.armed.swap(true, Ordering::SeqCst) {
			QuitAction::Exit
		} else {
			QuitAction::Warn
		}
	}

	pub fn on_alarm(&self) {
		self.armed.store(false, Ordering::SeqCst);
	}

	pub fn is_armed(&self) -> bool {
		self.armed.load(Ordering::SeqCst)
	}
}

static QUIT_LATCH: QuitLatch = QuitLatch::new();

extern "C" fn handle_quit(_: libc::c_int) {
	match QUIT_LATCH.on_quit() {
		QuitAction::Warn => unsafe {
			libc::write(libc::STDOUT_FILENO, QUIT_WARNING.as_ptr() as *const libc::c_void, QUIT_WARNING.len());
			libc::alarm(QUIT_WINDOW_SECS);
		},
		QuitAction::Exit => unsafe { libc::_exit(0) },
	}
}

extern "C" fn handle_alarm(_: libc::c_int) {
	QUIT_LATCH.on_alarm();
}

fn set_handler(sig: Signal, handler: SigHandler) -> nix::Result<()> {
	// No SA_RESTART: blocking waits see EINTR and retry themselves.
	let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
	unsafe { signal::sigaction(sig, &action) }?;
	Ok(())
}

fn unblock(signals: &[Signal]) -> nix::Result<()> {
	let mut set = SigSet::empty();
	for &sig in signals {
		set.add(sig);
	}
	signal::sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&set), None)
}

/// Installs the shell's dispositions and returns the process-wide latch.
pub fn install() -> nix::Result<&'static QuitLatch> {
	set_handler(Signal::SIGINT, SigHandler::SigIgn)?;
	set_handler(Signal::SIGQUIT, SigHandler::Handler(handle_quit))?;
	set_handler(Signal::SIGALRM, SigHandler::Handler(handle_alarm))?;
	unblock(&[Signal::SIGINT, Signal::SIGQUIT, Signal::SIGALRM])?;
	Ok(&QUIT_LATCH)
}

/// Signals whose disposition in the shell differs from the default. SIGPIPE
/// is ignored by the Rust runtime and an ignored signal survives `execvp`.
const CHILD_RESET: [Signal; 4] = [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGALRM, Signal::SIGPIPE];

/// Blocks the shell's handled signals for the current thread and returns the
/// previous mask. Held across `fork` so a child never runs the shell's
/// handlers before its dispositions are reset.
pub fn block_for_fork() -> nix::Result<SigSet> {
	let mut set = SigSet::empty();
	for &sig in &CHILD_RESET {
		set.add(sig);
	}
	set.thread_swap_mask(SigmaskHow::SIG_BLOCK)
}

pub fn restore_mask(old: &SigSet) -> nix::Result<()> {
	old.thread_set_mask()
}

/// Runs in a freshly forked child: default dispositions and an empty mask,
/// so the program it execs can be interrupted, quit and killed by SIGPIPE.
/// The mask is cleared only after every disposition is reset.
pub fn restore_child_defaults() -> nix::Result<()> {
	for &sig in &CHILD_RESET {
		set_handler(sig, SigHandler::SigDfl)?;
	}
	signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn second_quit_inside_window_exits() {
		let latch = QuitLatch::new();
		assert!(!latch.is_armed());
		assert_eq!(latch.on_quit(), QuitAction::Warn);
		assert!(latch.is_armed());
		assert_eq!(latch.on_quit(), QuitAction::Exit);
	}

	#[test]
	fn alarm_disarms() {
		let latch = QuitLatch::new();
		assert_eq!(latch.on_quit(), QuitAction::Warn);
		// window expires
		latch.on_alarm();
		assert!(!latch.is_armed());
		assert_eq!(latch.on_quit(), QuitAction::Warn);
		assert_eq!(latch.on_quit(), QuitAction::Exit);
	}

	#[test]
	fn block_for_fork_restores_previous_mask() {
		let before = SigSet::thread_get_mask().unwrap();
		let old = block_for_fork().unwrap();
		let blocked = SigSet::thread_get_mask().unwrap();
		assert!(blocked.contains(Signal::SIGQUIT));
		assert!(blocked.contains(Signal::SIGPIPE));
		restore_mask(&old).unwrap();
		let after = SigSet::thread_get_mask().unwrap();
		for &sig in &CHILD_RESET {
			assert_eq!(after.contains(sig), before.contains(sig), "{:?}", sig);
		}
	}

	#[test]
	fn alarm_while_idle_is_harmless() {
		let latch = QuitLatch::new();
		latch.on_alarm();
		assert!(!latch.is_armed());
		assert_eq!(latch.on_quit(), QuitAction::Warn);
	}
}
