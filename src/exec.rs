//! Forks, wires and waits for the stages of a pipeline.
//!
//! Every descriptor lives in an [`OwnedFd`]. Before each fork the stage's
//! stdin/stdout descriptors are taken out of their pipe or redirection slot;
//! the parent drops them right after the fork, and the child drops every
//! other slot before `dup2`ing its own pair onto fds 0 and 1. Once the last
//! stage is forked the parent drops whatever is left, so it holds no pipe
//! end while it waits.

use std::ffi::{CString, NulError};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use std::path::PathBuf;

use nix::errno::Errno;
use nix::fcntl::{self, FcntlArg, FdFlag};
use nix::unistd;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::os_text;
use crate::job::{Job, JobBuilder};
use crate::pipeline::{Pipeline, Stage};
use crate::redirect::{self, Redirections};
use crate::signal;

/// Exit status of a child whose program could not be found.
pub const STATUS_NOT_FOUND: i32 = 127;
/// Exit status of a child that failed to exec or to set up its fds.
pub const STATUS_CANNOT_EXEC: i32 = 126;

#[derive(Debug, Error)]
pub enum ExecError {
	#[error("{}: {}", .path.display(), os_text(.source))]
	Open { path: PathBuf, #[source] source: io::Error },
	#[error("pipe: {}", .0.desc())]
	Pipe(#[source] nix::Error),
	#[error("fork: {}", .0.desc())]
	Fork(#[source] nix::Error),
	#[error("{program}: argument contains a NUL byte")]
	Nul { program: String, #[source] source: NulError },
}

#[derive(Debug)]
pub enum Outcome {
	/// Every child has been reaped.
	Done(Job),
	/// Started with `&`; the children are still running.
	Background(Job),
}

#[derive(Debug)]
struct PipeEnds {
	read: Option<OwnedFd>,
	write: Option<OwnedFd>,
}

#[cfg(not(target_vendor = "apple"))]
fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
	unistd::pipe2(fcntl::OFlag::O_CLOEXEC)
}

#[cfg(target_vendor = "apple")]
fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
	let (read, write) = unistd::pipe()?;
	for fd in &[&read, &write] {
		fcntl::fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
	}
	Ok((read, write))
}

// Close-on-exec keeps one pipeline's ends out of programs exec'd by another;
// the copies dup2'd onto fds 0 and 1 do not inherit the flag.
fn create_pipes(count: usize) -> Result<Vec<PipeEnds>, ExecError> {
	let mut pipes = Vec::with_capacity(count);
	for _ in 0..count {
		let (read, write) = cloexec_pipe().map_err(ExecError::Pipe)?;
		pipes.push(PipeEnds { read: Some(read), write: Some(write) });
	}
	Ok(pipes)
}

fn prepare_argv(stage: &Stage) -> Result<Vec<CString>, ExecError> {
	stage.argv.iter()
		.map(|s| CString::new(s.as_bytes()))
		.collect::<Result<Vec<CString>, NulError>>()
		.map_err(|e| ExecError::Nul { program: stage.program().to_string(), source: e })
}

/// Makes `fd` the process's `target` descriptor and closes the original.
fn splice(fd: Option<OwnedFd>, target: RawFd) -> nix::Result<()> {
	if let Some(fd) = fd {
		if fd.as_raw_fd() == target {
			fcntl::fcntl(target, FcntlArg::F_SETFD(FdFlag::empty()))?;
			let _ = fd.into_raw_fd();
		} else {
			unistd::dup2(fd.as_raw_fd(), target)?;
		}
	}
	Ok(())
}

fn child_exit(program: &str, e: Errno, status: i32) -> ! {
	let _ = writeln!(&mut io::stderr(), "{}: {}", program, e.desc());
	unsafe { libc::_exit(status) }
}

/// Never returns: the process becomes `argv[0]` or exits non-zero.
fn exec_stage(stage: &Stage, argv: &[CString], stdin: Option<OwnedFd>, stdout: Option<OwnedFd>) -> ! {
	let wired = signal::restore_child_defaults()
		.and_then(|_| splice(stdin, libc::STDIN_FILENO))
		.and_then(|_| splice(stdout, libc::STDOUT_FILENO));
	if let Err(e) = wired {
		child_exit(stage.program(), e, STATUS_CANNOT_EXEC);
	}
	let e = match unistd::execvp(&argv[0], argv) {
		Ok(never) => match never {},
		Err(e) => e,
	};
	let status = if e == Errno::ENOENT { STATUS_NOT_FOUND } else { STATUS_CANNOT_EXEC };
	child_exit(stage.program(), e, status)
}

fn spawn_stages(pipeline: &Pipeline, argvs: &[Vec<CString>], redirections: &mut Vec<Redirections>,
                pipes: &mut Vec<PipeEnds>, job_builder: &mut JobBuilder) -> Result<(), ExecError> {
	let last = pipeline.stages.len() - 1;
	for (i, stage) in pipeline.stages.iter().enumerate() {
		let stdin = if i > 0 {
			pipes[i - 1].read.take()
		} else {
			redirections[i].stdin.take()
		};
		let stdout = if i < last {
			pipes[i].write.take()
		} else {
			redirections[i].stdout.take()
		};
		match job_builder.push_fork(i).map_err(ExecError::Fork)? {
			unistd::ForkResult::Parent { .. } => {
				drop(stdin);
				drop(stdout);
			},
			unistd::ForkResult::Child => {
				pipes.clear();
				redirections.clear();
				exec_stage(stage, &argvs[i], stdin, stdout);
			},
		}
	}
	Ok(())
}

/// Runs `pipeline` as child processes.
///
/// Argument vectors, redirections and pipes are all prepared before the
/// first fork, so failures there start nothing. A fork failure part way
/// through still reaps the children already started.
pub fn execute(pipeline: &Pipeline) -> Result<Outcome, ExecError> {
	assert!(!pipeline.stages.is_empty());

	let argvs = pipeline.stages.iter().map(prepare_argv).collect::<Result<Vec<_>, _>>()?;
	let mut redirections = redirect::resolve_all(pipeline)?;
	let mut pipes = create_pipes(pipeline.pipe_count())?;
	debug!(stages = pipeline.stages.len(), background = pipeline.background, "spawning pipeline");

	let mut job_builder = JobBuilder::new(pipeline.stages.len());
	let spawned = spawn_stages(pipeline, &argvs, &mut redirections, &mut pipes, &mut job_builder);
	drop(pipes);
	drop(redirections);

	let mut job = job_builder.build();
	if let Err(e) = spawned {
		warn!(error = %e, started = job.children().len(), "pipeline aborted, reaping started stages");
		job.wait();
		return Err(e);
	}
	if pipeline.background {
		return Ok(Outcome::Background(job));
	}
	job.wait();
	debug!(status = ?job.last_code(), "pipeline finished");
	Ok(Outcome::Done(job))
}
