use nix::errno::Errno;
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::{self, Pid};
use tracing::{debug, warn};

use crate::signal;

pub trait WaitStatusExt {
	fn is_terminated(self) -> bool;
	fn code(self) -> i32;
}

impl WaitStatusExt for WaitStatus {
	fn is_terminated(self) -> bool {
		match self {
			WaitStatus::Exited(..) | WaitStatus::Signaled(..) => true,
			_ => false,
		}
	}

	/// Shell-style status: the exit code, or 128 + signal number.
	fn code(self) -> i32 {
		match self {
			WaitStatus::Exited(_, code) => code,
			WaitStatus::Signaled(_, sig, _) => 128 + sig as i32,
			_ => 0,
		}
	}
}

/// One forked stage. `status` stays `None` until the child is reaped.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ChildRecord {
	pub pid: Pid,
	pub stage_index: usize,
	pub status: Option<WaitStatus>,
}

impl ChildRecord {
	pub fn is_reaped(&self) -> bool {
		self.status.map_or(false, |s| s.is_terminated())
	}
}

#[derive(Debug)]
pub struct Job {
	children: Vec<ChildRecord>,
}

impl Job {
	pub fn children(&self) -> &[ChildRecord] {
		&self.children
	}

	pub fn is_done(&self) -> bool {
		self.children.iter().all(ChildRecord::is_reaped)
	}

	/// Status of the last stage, if it was forked and has been reaped.
	pub fn last_code(&self) -> Option<i32> {
		self.children.last().and_then(|c| c.status).map(|s| s.code())
	}

	/// Blocks until every child of this job has terminated. A signal
	/// interrupting the wait just restarts it.
	pub fn wait(&mut self) {
		for child in self.children.iter_mut().filter(|c| !c.is_reaped()) {
			loop {
				match wait::waitpid(child.pid, None) {
					Ok(status) if status.is_terminated() => {
						debug!(pid = %child.pid, stage = child.stage_index, ?status, "reaped");
						child.status = Some(status);
						break;
					},
					Ok(_) | Err(Errno::EINTR) => continue,
					Err(e) => {
						warn!(pid = %child.pid, error = %e, "waitpid failed");
						// ECHILD: nothing left to wait for
						child.status = Some(WaitStatus::Exited(child.pid, 126));
						break;
					},
				}
			}
		}
	}

	/// Reaps whichever children have already exited, without blocking.
	pub fn poll(&mut self) {
		for child in self.children.iter_mut().filter(|c| !c.is_reaped()) {
			match wait::waitpid(child.pid, Some(WaitPidFlag::WNOHANG)) {
				Ok(WaitStatus::StillAlive) => {},
				Ok(status) => {
					if status.is_terminated() {
						debug!(pid = %child.pid, stage = child.stage_index, ?status, "reaped background child");
						child.status = Some(status);
					}
				},
				Err(Errno::EINTR) => {},
				Err(e) => {
					warn!(pid = %child.pid, error = %e, "waitpid failed");
					child.status = Some(WaitStatus::Exited(child.pid, 126));
				},
			}
		}
	}
}

/// Collects child records while a pipeline is being forked.
#[derive(Debug)]
pub struct JobBuilder {
	imp: Job,
}

impl JobBuilder {
	pub fn new(size_hint: usize) -> JobBuilder {
		JobBuilder {
			imp: Job { children: Vec::with_capacity(size_hint) }
		}
	}

	/// Forks and, in the parent, records the child against `stage_index`.
	///
	/// The shell's signals stay blocked in the child; it must unblock them
	/// with [`signal::restore_child_defaults`] once its dispositions are reset.
	pub fn push_fork(&mut self, stage_index: usize) -> nix::Result<unistd::ForkResult> {
		let old_mask = signal::block_for_fork()?;
		// SAFETY: the shell is single-threaded; the child only rewires fds,
		// resets signal dispositions and execs or exits.
		let r = unsafe { unistd::fork() };
		match r {
			Ok(unistd::ForkResult::Child) => {},
			Ok(unistd::ForkResult::Parent { child }) => {
				debug!(pid = %child, stage = stage_index, "forked");
				self.imp.children.push(ChildRecord { pid: child, stage_index: stage_index, status: None });
				signal::restore_mask(&old_mask)?;
			},
			Err(_) => { signal::restore_mask(&old_mask)?; },
		}
		r
	}

	pub fn build(self) -> Job {
		self.imp
	}
}

/// Pipelines started with `&`, kept until all their children are reaped.
#[derive(Debug, Default)]
pub struct BackgroundJobs {
	jobs: Vec<Job>,
}

impl BackgroundJobs {
	pub fn new() -> BackgroundJobs {
		BackgroundJobs::default()
	}

	pub fn push(&mut self, job: Job) {
		if let Some(first) = job.children().first() {
			debug!(pid = %first.pid, stages = job.children().len(), "background job started");
		}
		self.jobs.push(job);
	}

	pub fn len(&self) -> usize {
		self.jobs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.jobs.is_empty()
	}

	pub fn reap(&mut self) {
		if self.is_empty() {
			return;
		}
		for job in self.jobs.iter_mut() {
			job.poll();
		}
		self.jobs.retain(|job| !job.is_done());
	}
}
