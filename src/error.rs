use std::io;

use nix::errno::Errno;
use thiserror::Error;

use crate::builtin::BuiltinError;
use crate::exec::ExecError;
use crate::lexer::LexError;
use crate::pipeline::BuildError;
use crate::syntax::SyntaxError;

/// Everything that can abandon a command line. None of these end the shell.
#[derive(Debug, Error)]
pub enum ShellError {
	#[error(transparent)]
	Lex(#[from] LexError),
	#[error(transparent)]
	Syntax(#[from] SyntaxError),
	#[error(transparent)]
	Build(#[from] BuildError),
	#[error(transparent)]
	Builtin(#[from] BuiltinError),
	#[error(transparent)]
	Exec(#[from] ExecError),
}

/// The bare OS text for an I/O error ("No such file or directory"), without
/// the "(os error N)" suffix `io::Error` would add.
pub fn os_text(e: &io::Error) -> String {
	match e.raw_os_error() {
		Some(n) => Errno::from_raw(n).desc().to_string(),
		None => e.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn os_text_strips_code() {
		let e = io::Error::from_raw_os_error(libc::ENOENT);
		assert_eq!(os_text(&e), "No such file or directory");
		let e = io::Error::new(io::ErrorKind::Other, "custom");
		assert_eq!(os_text(&e), "custom");
	}

	#[test]
	fn wraps_layer_errors_transparently() {
		let e: ShellError = SyntaxError::MultipleRedirIn.into();
		assert_eq!(e.to_string(), "Multiple redirection of standard input");
		let e: ShellError = LexError::UnmatchedQuote.into();
		assert_eq!(e.to_string(), "Unmatched quote");
	}
}
