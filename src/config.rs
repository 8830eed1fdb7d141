use std::env;
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

const DEFAULT_SHELL_NAME: &'static str = "ish";
const RC_FILE: &'static str = ".ishrc";
const LOG_ENV: &'static str = "ISH_LOG";
const DEFAULT_LOG_FILTER: &'static str = "off";

/// Settings read once from the process environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	/// Prefix for diagnostics, normally `argv[0]`.
	pub shell_name: String,
	pub home: Option<PathBuf>,
	/// Dump every token stream to stderr (`DEBUG` is set).
	pub debug: bool,
	/// `tracing` filter directives (`ISH_LOG`).
	pub log_filter: String,
	/// Whether to print prompts; true when stdin is a terminal.
	pub interactive: bool,
}

impl Default for Config {
	fn default() -> Config {
		Config {
			shell_name: DEFAULT_SHELL_NAME.to_string(),
			home: None,
			debug: false,
			log_filter: DEFAULT_LOG_FILTER.to_string(),
			interactive: false,
		}
	}
}

impl Config {
	pub fn from_env() -> Config {
		Config::from_parts(
			env::args_os().next(),
			env::var_os("HOME"),
			env::var_os("DEBUG").is_some(),
			env::var(LOG_ENV).ok(),
			io::stdin().is_terminal(),
		)
	}

	fn from_parts(arg0: Option<OsString>, home: Option<OsString>, debug: bool,
	              log_filter: Option<String>, interactive: bool) -> Config {
		let shell_name = arg0
			.map(|a| a.to_string_lossy().into_owned())
			.filter(|a| !a.is_empty())
			.unwrap_or_else(|| DEFAULT_SHELL_NAME.to_string());
		Config {
			shell_name: shell_name,
			home: home.filter(|h| !h.is_empty()).map(PathBuf::from),
			debug: debug,
			log_filter: log_filter.unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
			interactive: interactive,
		}
	}

	/// `$HOME/.ishrc`, if `HOME` is known.
	pub fn rc_path(&self) -> Option<PathBuf> {
		self.home.as_ref().map(|h| h.join(RC_FILE))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_when_environment_is_empty() {
		let c = Config::from_parts(None, None, false, None, false);
		assert_eq!(c, Config::default());
		assert_eq!(c.rc_path(), None);
	}

	#[test]
	fn reads_all_parts() {
		let c = Config::from_parts(Some("./ish".into()), Some("/home/u".into()), true,
		                           Some("ish=debug".to_string()), true);
		assert_eq!(c.shell_name, "./ish");
		assert_eq!(c.rc_path(), Some(PathBuf::from("/home/u/.ishrc")));
		assert!(c.debug);
		assert!(c.interactive);
		assert_eq!(c.log_filter, "ish=debug");
	}

	#[test]
	fn empty_home_is_ignored() {
		let c = Config::from_parts(Some("".into()), Some("".into()), false, None, false);
		assert_eq!(c.home, None);
		assert_eq!(c.shell_name, "ish");
	}
}
