use std::ffi::NulError;
use std::io;
use std::path::PathBuf;

use nix::unistd::Pid;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
	#[error("syntax error: expected a file name after '{0}'")]
	MissingTarget(String),
	#[error("syntax error: unexpected '{found}' after '{operator}'")]
	UnexpectedOperator { operator: String, found: String },
	#[error("syntax error: empty command")]
	EmptyStage,
}

#[derive(Debug, Error)]
pub enum LaunchError {
	#[error("fork: {0}")]
	Fork(#[source] nix::Error),
	#[error("pipe: {0}")]
	Pipe(#[source] nix::Error),
	#[error("{program}: argument contains a NUL byte")]
	Nul {
		program: String,
		#[source]
		source: NulError,
	},
}

/// Everything that keeps a line from being launched at all.
#[derive(Debug, Error)]
pub enum ExecError {
	#[error(transparent)]
	Parse(#[from] ParseError),
	#[error("{0}: program not found")]
	ProgramNotFound(String),
	#[error("{}: {}", .path.display(), .source)]
	Redirect {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error(transparent)]
	Launch(#[from] LaunchError),
}

impl ExecError {
	/// Status reported for a line that never launched.
	pub fn status(&self) -> i32 {
		match *self {
			ExecError::Parse(_) => 2,
			ExecError::ProgramNotFound(_) => 127,
			ExecError::Redirect { .. } => 1,
			ExecError::Launch(_) => 126,
		}
	}
}

#[derive(Debug, Error)]
#[error("waitpid({pid}): {source}")]
pub struct WaitError {
	pub pid: Pid,
	#[source]
	pub source: nix::Error,
}
