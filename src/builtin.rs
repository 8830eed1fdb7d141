//! Commands run inside the shell process: `cd`, `exit`, `setenv`, `unsetenv`.

use std::env;
use std::ffi::OsStr;
use std::path::PathBuf;

use nix::unistd;
use thiserror::Error;
use tracing::debug;

use crate::global::Flow;
use crate::lexer::{Token, TokenKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuiltinError {
	#[error("Built-in commands cannot be redirected/piped")]
	Redirected,
	#[error("{0}")]
	Usage(&'static str),
	#[error("cd: HOME not set")]
	NoHome,
	#[error("cd: {}: {}", .path.display(), .source.desc())]
	Chdir { path: PathBuf, #[source] source: nix::Error },
	#[error("{command}: invalid variable name \"{name}\"")]
	InvalidName { command: &'static str, name: String },
	#[error("setenv: value may not contain a NUL byte")]
	InvalidValue,
}

pub type Builtin = fn(&[String]) -> Result<Flow, BuiltinError>;

fn check_name(command: &'static str, name: &str) -> Result<(), BuiltinError> {
	if name.is_empty() || name.contains('=') || name.contains('\0') {
		return Err(BuiltinError::InvalidName { command: command, name: name.to_string() });
	}
	Ok(())
}

pub fn builtin_cd(args: &[String]) -> Result<Flow, BuiltinError> {
	let path = match args {
		[] => match env::var_os("HOME") {
			Some(home) => PathBuf::from(home),
			None => { return Err(BuiltinError::NoHome); },
		},
		[dir] => PathBuf::from(dir),
		_ => { return Err(BuiltinError::Usage("cd takes one parameter")); },
	};
	unistd::chdir(path.as_path()).map_err(|e| BuiltinError::Chdir { path: path.clone(), source: e })?;
	debug!(path = %path.display(), "changed directory");
	Ok(Flow::Continue)
}

pub fn builtin_exit(args: &[String]) -> Result<Flow, BuiltinError> {
	if !args.is_empty() {
		return Err(BuiltinError::Usage("exit does not take any parameters"));
	}
	Ok(Flow::Exit)
}

pub fn builtin_setenv(args: &[String]) -> Result<Flow, BuiltinError> {
	let (name, value) = match args {
		[name] => (name, ""),
		[name, value] => (name, value.as_str()),
		_ => { return Err(BuiltinError::Usage("setenv takes one or two parameters")); },
	};
	check_name("setenv", name)?;
	if value.contains('\0') {
		return Err(BuiltinError::InvalidValue);
	}
	env::set_var(name, OsStr::new(value));
	Ok(Flow::Continue)
}

pub fn builtin_unsetenv(args: &[String]) -> Result<Flow, BuiltinError> {
	let name = match args {
		[name] => name,
		_ => { return Err(BuiltinError::Usage("unsetenv takes one parameter")); },
	};
	check_name("unsetenv", name)?;
	// removing an unset variable is not an error
	env::remove_var(name);
	Ok(Flow::Continue)
}

pub fn match_builtin(name: &str) -> Option<Builtin> {
	match name {
		"cd" => Some(builtin_cd),
		"exit" => Some(builtin_exit),
		"setenv" => Some(builtin_setenv),
		"unsetenv" => Some(builtin_unsetenv),
		_ => None,
	}
}

/// Runs the line in-process if its first word names a builtin.
///
/// Returns `None` when the line is not a builtin and should be spawned.
/// A builtin line carrying any pipe or redirection is refused as a whole.
/// A trailing `&` is ignored; builtins always run in the shell itself.
pub fn dispatch(tokens: &[Token]) -> Option<Result<Flow, BuiltinError>> {
	let builtin = match tokens.first() {
		Some(&Token { kind: TokenKind::Word, value: Some(ref name) }) => match_builtin(name)?,
		_ => { return None; },
	};
	let mut args: Vec<String> = Vec::with_capacity(tokens.len() - 1);
	for token in &tokens[1..] {
		match token.kind {
			TokenKind::Word => args.push(token.value.clone().unwrap_or_default()),
			TokenKind::Pipe | TokenKind::RedirectIn | TokenKind::RedirectOut => {
				return Some(Err(BuiltinError::Redirected));
			},
			TokenKind::Background => {},
		}
	}
	Some(builtin(&args))
}
