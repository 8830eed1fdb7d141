//! Groups a checked token stream into pipeline stages.

use std::path::PathBuf;

use thiserror::Error;

use crate::lexer::{Token, TokenKind};

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum BuildError {
	#[error("Missing command name")]
	MissingCommand,
	#[error("Redirection without file name")]
	MissingTarget,
	#[error("Multiple redirection of the same stream")]
	MultipleRedirect,
	#[error("Invalid use of background")]
	MisplacedBackground,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Stage {
	pub argv: Vec<String>,
	pub input_file: Option<PathBuf>,
	pub output_file: Option<PathBuf>,
	pub index: usize,
}

impl Stage {
	fn new(index: usize) -> Stage {
		Stage { argv: Vec::new(), input_file: None, output_file: None, index: index }
	}

	pub fn program(&self) -> &str {
		&self.argv[0]
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
	pub background: bool,
}

impl Pipeline {
	pub fn pipe_count(&self) -> usize {
		self.stages.len() - 1
	}
}

type BuildResult<T> = Result<T, BuildError>;

struct Builder<'a> {
	tokens: &'a [Token],
	i: usize,
	stages: Vec<Stage>,
	current: Stage,
	background: bool,
}

impl<'a> Builder<'a> {
	fn next(&mut self) -> Option<&'a Token> {
		let t = self.tokens.get(self.i);
		if t.is_some() {
			self.i += 1;
		}
		t
	}

	fn read_target(&mut self) -> BuildResult<PathBuf> {
		match self.next() {
			Some(&Token { kind: TokenKind::Word, value: Some(ref v) }) => Ok(PathBuf::from(v)),
			_ => Err(BuildError::MissingTarget),
		}
	}

	fn close_stage(&mut self) -> BuildResult<()> {
		if self.current.argv.is_empty() {
			return Err(BuildError::MissingCommand);
		}
		let next = Stage::new(self.current.index + 1);
		let stage = std::mem::replace(&mut self.current, next);
		self.stages.push(stage);
		Ok(())
	}

	fn run(mut self) -> BuildResult<Pipeline> {
		while let Some(token) = self.next() {
			if self.background {
				return Err(BuildError::MisplacedBackground);
			}
			match token.kind {
				TokenKind::Word => {
					let word = token.value.clone().unwrap_or_default();
					self.current.argv.push(word);
				},
				TokenKind::RedirectIn => {
					let target = self.read_target()?;
					if self.current.input_file.replace(target).is_some() {
						return Err(BuildError::MultipleRedirect);
					}
				},
				TokenKind::RedirectOut => {
					let target = self.read_target()?;
					if self.current.output_file.replace(target).is_some() {
						return Err(BuildError::MultipleRedirect);
					}
				},
				TokenKind::Pipe => self.close_stage()?,
				TokenKind::Background => { self.background = true; },
			}
		}
		self.close_stage()?;
		Ok(Pipeline { stages: self.stages, background: self.background })
	}
}

/// Builds a pipeline from tokens that already passed the syntax check.
///
/// Emptiness at every pipe boundary is checked again here; nothing is
/// opened or spawned, so an error leaves no trace.
pub fn build(tokens: &[Token]) -> BuildResult<Pipeline> {
	let builder = Builder {
		tokens: tokens,
		i: 0,
		stages: Vec::new(),
		current: Stage::new(0),
		background: false,
	};
	builder.run()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::lexer::lex;

	fn build_line(line: &str) -> BuildResult<Pipeline> {
		build(&lex(line).unwrap())
	}

	#[test]
	fn single_stage() {
		let p = build_line("ls -l /tmp\n").unwrap();
		assert_eq!(p.stages.len(), 1);
		assert_eq!(p.pipe_count(), 0);
		assert_eq!(p.stages[0].argv, vec!["ls", "-l", "/tmp"]);
		assert_eq!(p.stages[0].program(), "ls");
		assert!(!p.background);
	}

	#[test]
	fn redirections_bind_to_enclosing_stage() {
		let p = build_line("cat < in.txt | sort -r | uniq > out.txt").unwrap();
		assert_eq!(p.stages.len(), 3);
		assert_eq!(p.stages[0].input_file, Some(PathBuf::from("in.txt")));
		assert_eq!(p.stages[0].output_file, None);
		assert_eq!(p.stages[1].input_file, None);
		assert_eq!(p.stages[1].argv, vec!["sort", "-r"]);
		assert_eq!(p.stages[2].output_file, Some(PathBuf::from("out.txt")));
		let indices: Vec<usize> = p.stages.iter().map(|s| s.index).collect();
		assert_eq!(indices, vec![0, 1, 2]);
	}

	#[test]
	fn redirection_between_arguments() {
		let p = build_line("sort > out -r").unwrap();
		assert_eq!(p.stages[0].argv, vec!["sort", "-r"]);
		assert_eq!(p.stages[0].output_file, Some(PathBuf::from("out")));
	}

	#[test]
	fn no_argument_ceiling() {
		let line = format!("echo{}", " a".repeat(400));
		let p = build_line(&line).unwrap();
		assert_eq!(p.stages[0].argv.len(), 401);
	}

	#[test]
	fn empty_stages_are_rejected() {
		assert_eq!(build_line("ls |"), Err(BuildError::MissingCommand));
		assert_eq!(build_line("| ls"), Err(BuildError::MissingCommand));
		assert_eq!(build_line("ls | | wc"), Err(BuildError::MissingCommand));
		assert_eq!(build(&[]), Err(BuildError::MissingCommand));
	}

	#[test]
	fn malformed_redirections_are_rejected() {
		assert_eq!(build_line("cat <"), Err(BuildError::MissingTarget));
		assert_eq!(build_line("cat > | wc"), Err(BuildError::MissingTarget));
		assert_eq!(build_line("cat < a < b"), Err(BuildError::MultipleRedirect));
	}

	#[test]
	fn background_flag() {
		let p = build_line("sleep 10 &").unwrap();
		assert!(p.background);
		assert_eq!(p.stages[0].argv, vec!["sleep", "10"]);
		assert_eq!(build_line("sleep 10 & ls"), Err(BuildError::MisplacedBackground));
	}
}
