//! Opens the files named by a stage's redirections.

use std::fs;
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use tracing::debug;

use crate::exec::ExecError;
use crate::pipeline::{Pipeline, Stage};

/// Mode bits for files created by `>`.
pub const OUTPUT_MODE: u32 = 0o600;

/// Descriptors opened for one stage. Dropping it closes whatever was not
/// handed to a child.
#[derive(Debug, Default)]
pub struct Redirections {
	pub stdin: Option<OwnedFd>,
	pub stdout: Option<OwnedFd>,
}

fn open(path: &Path, oopt: &fs::OpenOptions) -> Result<OwnedFd, ExecError> {
	match oopt.open(path) {
		Ok(file) => Ok(OwnedFd::from(file)),
		Err(e) => Err(ExecError::Open { path: path.to_owned(), source: e }),
	}
}

pub fn open_input(path: &Path) -> Result<OwnedFd, ExecError> {
	let mut oopt = fs::OpenOptions::new();
	oopt.read(true);
	open(path, &oopt)
}

pub fn open_output(path: &Path) -> Result<OwnedFd, ExecError> {
	let mut oopt = fs::OpenOptions::new();
	oopt.write(true).create(true).truncate(true).mode(OUTPUT_MODE);
	open(path, &oopt)
}

pub fn resolve(stage: &Stage) -> Result<Redirections, ExecError> {
	let mut r = Redirections::default();
	if let Some(ref path) = stage.input_file {
		debug!(stage = stage.index, path = %path.display(), "redirect stdin");
		r.stdin = Some(open_input(path)?);
	}
	if let Some(ref path) = stage.output_file {
		debug!(stage = stage.index, path = %path.display(), "redirect stdout");
		r.stdout = Some(open_output(path)?);
	}
	Ok(r)
}

/// Resolves every stage up front. On failure the descriptors opened so far
/// are dropped, so nothing is left open.
pub fn resolve_all(pipeline: &Pipeline) -> Result<Vec<Redirections>, ExecError> {
	pipeline.stages.iter().map(resolve).collect()
}
