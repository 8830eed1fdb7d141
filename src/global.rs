use std::io::{self, Write};

use tracing::debug;

use crate::builtin;
use crate::config::Config;
use crate::error::ShellError;
use crate::exec::{self, Outcome};
use crate::job;
use crate::lexer;
use crate::pipeline;
use crate::syntax;

/// What the driver should do after a line has been executed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Flow {
	Continue,
	Exit,
}

pub struct Shell {
	config: Config,
	background: job::BackgroundJobs,
	last_status: Option<i32>,
}

impl Shell {
	pub fn new(config: Config) -> Shell {
		Shell { config: config, background: job::BackgroundJobs::new(), last_status: None }
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Status of the last foreground stage, if one has run.
	pub fn last_status(&self) -> Option<i32> {
		self.last_status
	}

	pub fn background_jobs(&self) -> usize {
		self.background.len()
	}

	/// Executes one input line. Errors are reported on stderr and never end
	/// the shell; only `exit` yields [`Flow::Exit`].
	pub fn execute_line(&mut self, line: &str) -> Flow {
		self.execute_bytes(line.as_bytes())
	}

	/// Same as [`Shell::execute_line`] for a line as read from input, which
	/// may not be valid UTF-8.
	pub fn execute_bytes(&mut self, line: &[u8]) -> Flow {
		self.background.reap();
		match self.try_execute(line) {
			Ok(flow) => flow,
			Err(e) => {
				self.report(&e);
				Flow::Continue
			},
		}
	}

	fn try_execute(&mut self, line: &[u8]) -> Result<Flow, ShellError> {
		let tokens = lexer::lex_bytes(line)?;
		if self.config.debug {
			lexer::dump_tokens(&tokens);
		}
		syntax::check(&tokens)?;
		if tokens.is_empty() {
			return Ok(Flow::Continue);
		}
		if let Some(r) = builtin::dispatch(&tokens) {
			return Ok(r?);
		}
		let pipeline = pipeline::build(&tokens)?;
		match exec::execute(&pipeline)? {
			Outcome::Done(job) => {
				self.last_status = job.last_code();
				debug!(status = ?self.last_status, "foreground job done");
			},
			Outcome::Background(job) => self.background.push(job),
		}
		Ok(Flow::Continue)
	}

	fn report(&self, e: &ShellError) {
		let mut stderr = io::stderr();
		let _ = writeln!(stderr, "{}: {}", self.config.shell_name, e);
		let _ = stderr.flush();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	#[test]
	fn errors_do_not_end_the_shell() {
		let mut shell = Shell::new(Config::default());
		assert_eq!(shell.execute_line("echo \"unterminated\n"), Flow::Continue);
		assert_eq!(shell.execute_line("cat < a < b\n"), Flow::Continue);
		assert_eq!(shell.execute_line("cd one two\n"), Flow::Continue);
		assert_eq!(shell.execute_line("   \n"), Flow::Continue);
		assert_eq!(shell.last_status(), None);
	}

	#[test]
	fn invalid_utf8_line_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let out = dir.path().join("out");
		let mut shell = Shell::new(Config::default());
		let mut line = b"echo \xff > ".to_vec();
		line.extend_from_slice(out.to_str().unwrap().as_bytes());
		assert_eq!(shell.execute_bytes(&line), Flow::Continue);
		assert!(!out.exists());
		assert_eq!(shell.last_status(), None);
	}

	#[test]
	fn exit_ends_the_shell() {
		let mut shell = Shell::new(Config::default());
		assert_eq!(shell.execute_line("exit\n"), Flow::Exit);
	}

	#[test]
	fn records_last_status() {
		let dir = tempfile::tempdir().unwrap();
		let out = dir.path().join("out");
		let mut shell = Shell::new(Config::default());
		let line = format!("echo x > {}\n", out.to_str().unwrap());
		assert_eq!(shell.execute_line(&line), Flow::Continue);
		assert_eq!(shell.last_status(), Some(0));
		assert_eq!(fs::read_to_string(&out).unwrap(), "x\n");
		shell.execute_line("false\n");
		assert_eq!(shell.last_status(), Some(1));
	}

	#[test]
	fn background_jobs_are_tracked_then_reaped() {
		let mut shell = Shell::new(Config::default());
		shell.execute_line("true &\n");
		assert_eq!(shell.background_jobs(), 1);
		for _ in 0..200 {
			shell.execute_line("\n");
			if shell.background_jobs() == 0 {
				break;
			}
			std::thread::sleep(std::time::Duration::from_millis(10));
		}
		assert_eq!(shell.background_jobs(), 0);
	}
}
