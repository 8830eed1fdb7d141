use std::fs;
use std::io;
use std::process;
use io::Write;
use io::BufRead;

use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use ish::{signal, Config, Flow, Shell};

const PROMPT: &'static [u8] = b"% ";

fn init_logging(config: &Config) {
	let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("off"));
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.with_target(false)
		.try_init();
}

/// Reads one raw line; decoding is left to the lexer.
fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
	let mut line: Vec<u8> = vec![];
	if reader.read_until(b'\n', &mut line)? == 0 {
		return Ok(None);
	}
	Ok(Some(line))
}

/// Runs `$HOME/.ishrc` line by line, echoing each line after a prompt.
fn source_rc(shell: &mut Shell) -> Flow {
	let path = match shell.config().rc_path() {
		Some(p) => p,
		None => { return Flow::Continue; },
	};
	let file = match fs::File::open(&path) {
		Ok(f) => f,
		Err(e) => {
			debug!(path = %path.display(), error = %e, "no startup file");
			return Flow::Continue;
		},
	};
	let mut reader = io::BufReader::new(file);
	let mut stdout = io::stdout();
	loop {
		let line = match read_line(&mut reader) {
			Ok(Some(line)) => line,
			Ok(None) => { return Flow::Continue; },
			Err(e) => {
				warn!(path = %path.display(), error = %e, "stopped reading startup file");
				return Flow::Continue;
			},
		};
		let _ = stdout.write_all(PROMPT);
		let _ = stdout.write_all(line.strip_suffix(b"\n").unwrap_or(&line));
		let _ = stdout.write_all(b"\n");
		let _ = stdout.flush();
		if shell.execute_bytes(&line) == Flow::Exit {
			return Flow::Exit;
		}
	}
}

fn main() {
	let config = Config::from_env();
	init_logging(&config);
	let quit = match signal::install() {
		Ok(latch) => Some(latch),
		Err(e) => {
			let _ = writeln!(&mut io::stderr(), "{}: cannot install signal handlers: {}", config.shell_name, e.desc());
			None
		},
	};
	let interactive = config.interactive;
	let mut shell = Shell::new(config);

	if source_rc(&mut shell) == Flow::Exit {
		process::exit(0);
	}

	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	loop {
		if interactive {
			let _ = stdout.write_all(PROMPT);
		}
		let _ = stdout.flush();
		let line = match read_line(&mut stdin_locked) {
			Ok(Some(line)) => line,
			Ok(None) => {
				if interactive {
					let _ = stdout.write_all(b"\n");
					let _ = stdout.flush();
				}
				break;
			},
			Err(e) => {
				warn!(error = %e, "cannot read standard input");
				break;
			},
		};
		if quit.map_or(false, |q| q.is_armed()) {
			debug!("running a line while a quit request is pending");
		}
		if shell.execute_bytes(&line) == Flow::Exit {
			break;
		}
	}
	process::exit(0);
}
