//! Structural validation of a token stream.
//!
//! A stream that passes [`check`] has a command name at the start of every
//! stage, a file name after every redirection, at most one source for each
//! stage's stdin and stdout, and `&` only at the very end.

use thiserror::Error;

use crate::lexer::{Token, TokenKind};

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum SyntaxError {
	#[error("Missing command name")]
	MissingCommand,
	#[error("Multiple redirection of standard input")]
	MultipleRedirIn,
	#[error("Standard input redirection without file name")]
	MissingRedirInTarget,
	#[error("Multiple redirection of standard out")]
	MultipleRedirOut,
	#[error("Standard output redirection without file name")]
	MissingRedirOutTarget,
	#[error("Invalid use of background")]
	InvalidBackgroundUse,
}

pub fn check(tokens: &[Token]) -> Result<(), SyntaxError> {
	if tokens.is_empty() {
		return Ok(());
	}

	let mut expect_command = true;
	let mut stage_index = 0;
	let mut redir_in = false;
	let mut redir_out = false;
	let mut iter = tokens.iter().enumerate();

	while let Some((i, token)) = iter.next() {
		if expect_command && !token.is_word() {
			return Err(SyntaxError::MissingCommand);
		}
		match token.kind {
			TokenKind::Word => { expect_command = false; },
			TokenKind::RedirectIn => {
				if redir_in || stage_index > 0 {
					return Err(SyntaxError::MultipleRedirIn);
				}
				match iter.next() {
					Some((_, t)) if t.is_word() => { redir_in = true; },
					_ => { return Err(SyntaxError::MissingRedirInTarget); },
				}
			},
			TokenKind::RedirectOut => {
				if redir_out {
					return Err(SyntaxError::MultipleRedirOut);
				}
				match iter.next() {
					Some((_, t)) if t.is_word() => { redir_out = true; },
					_ => { return Err(SyntaxError::MissingRedirOutTarget); },
				}
			},
			TokenKind::Pipe => {
				// stdout of this stage now goes to the pipe
				if redir_out {
					return Err(SyntaxError::MultipleRedirOut);
				}
				stage_index += 1;
				redir_in = false;
				expect_command = true;
			},
			TokenKind::Background => {
				if i + 1 != tokens.len() {
					return Err(SyntaxError::InvalidBackgroundUse);
				}
			},
		}
	}

	if expect_command {
		return Err(SyntaxError::MissingCommand);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::lexer::lex;

	fn check_line(line: &str) -> Result<(), SyntaxError> {
		check(&lex(line).unwrap())
	}

	#[test]
	fn accepts_valid_lines() {
		assert_eq!(check_line(""), Ok(()));
		assert_eq!(check_line("ls -l"), Ok(()));
		assert_eq!(check_line("cat < in | sort | uniq > out"), Ok(()));
		assert_eq!(check_line("sleep 1 &"), Ok(()));
		assert_eq!(check_line("cat > out < in"), Ok(()));
	}

	#[test]
	fn missing_command() {
		assert_eq!(check_line("| cat"), Err(SyntaxError::MissingCommand));
		assert_eq!(check_line("cat |"), Err(SyntaxError::MissingCommand));
		assert_eq!(check_line("cat | | cat"), Err(SyntaxError::MissingCommand));
		assert_eq!(check_line("&"), Err(SyntaxError::MissingCommand));
		assert_eq!(check_line("< in cat"), Err(SyntaxError::MissingCommand));
	}

	#[test]
	fn redirection_errors() {
		assert_eq!(check_line("cat < a < b"), Err(SyntaxError::MultipleRedirIn));
		assert_eq!(check_line("cat > a > b"), Err(SyntaxError::MultipleRedirOut));
		assert_eq!(check_line("cat <"), Err(SyntaxError::MissingRedirInTarget));
		assert_eq!(check_line("cat < | x"), Err(SyntaxError::MissingRedirInTarget));
		assert_eq!(check_line("cat >"), Err(SyntaxError::MissingRedirOutTarget));
		assert_eq!(check_line("cat > &"), Err(SyntaxError::MissingRedirOutTarget));
	}

	#[test]
	fn redirection_conflicts_with_pipe() {
		assert_eq!(check_line("echo x | cat < f"), Err(SyntaxError::MultipleRedirIn));
		assert_eq!(check_line("echo x > f | cat"), Err(SyntaxError::MultipleRedirOut));
		assert_eq!(check_line("cat < f | cat > g"), Ok(()));
	}

	#[test]
	fn background_must_be_last() {
		assert_eq!(check_line("sleep 1 & ls"), Err(SyntaxError::InvalidBackgroundUse));
		assert_eq!(check_line("sleep 1 & | cat"), Err(SyntaxError::InvalidBackgroundUse));
	}
}
