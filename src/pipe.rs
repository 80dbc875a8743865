//! Threads pipes between pipeline stages and launches them.

use std::os::unix::io::{AsFd, FromRawFd, OwnedFd};

use log::debug;
use nix::fcntl::OFlag;
use nix::unistd;

use crate::error::LaunchError;
use crate::job::JobBuilder;
use crate::launch::{self, Stage};

/// Both ends are close-on-exec: a child keeps only what it dup'd onto its
/// standard input and output.
fn pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
	let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC)?;
	Ok(unsafe { (OwnedFd::from_raw_fd(read), OwnedFd::from_raw_fd(write)) })
}

/// Forks every stage before anything waits on them. Stage `i` reads from pipe
/// `i - 1` and writes to pipe `i`; a file redirection on either side takes
/// precedence over the pipe.
///
/// The parent drops each stage's descriptors right after forking it, so only
/// the children hold pipe ends and readers see EOF once writers exit. On
/// failure the stages launched so far stay in `job_builder`.
pub fn spawn_pipeline(stages: Vec<Stage>, job_builder: &mut JobBuilder) -> Result<(), LaunchError> {
	let count = stages.len();
	let mut upstream: Option<OwnedFd> = None;

	for (i, stage) in stages.into_iter().enumerate() {
		let is_last = i + 1 == count;
		let (downstream, pipe_write) = if is_last {
			(None, None)
		} else {
			let (read, write) = pipe().map_err(LaunchError::Pipe)?;
			(Some(read), Some(write))
		};

		let input = stage.input.as_ref().or(upstream.as_ref()).map(|fd| fd.as_fd());
		let output = stage.output.as_ref().or(pipe_write.as_ref()).map(|fd| fd.as_fd());
		let pid = launch::launch(&stage.program, input, output, job_builder.pgid())?;
		job_builder.push(pid);
		debug!("stage {} of {} running as pid {}", i + 1, count, pid);

		drop(pipe_write);
		drop(stage);
		upstream = downstream;
	}
	Ok(())
}
