use std::ffi::{CString, NulError};
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::path::Path;
use std::ptr;

use log::debug;
use nix::errno::Errno;
use nix::unistd::{self, ForkResult, Pid};

use crate::error::{ExecError, LaunchError, ParseError};
use crate::search;
use crate::terminal;
use crate::types::{CommandSpec, PipelineSpec};

/// Exit status of a child whose exec (or redirection) failed.
pub const EXEC_FAILURE_STATUS: i32 = 126;

/// Everything the child needs, built before fork so the child never allocates.
#[derive(Debug)]
pub struct Program {
	path: CString,
	argv: Vec<CString>,
	// NULL-terminated pointers into `argv`, ready for execv
	argv_ptrs: Vec<*const libc::c_char>,
	failure_prefix: Vec<u8>,
}

impl Program {
	pub fn prepare(command: &CommandSpec) -> Result<Program, ExecError> {
		let name = command.name().ok_or(ParseError::EmptyStage)?;
		let resolved = search::resolve(name)
			.ok_or_else(|| ExecError::ProgramNotFound(name.to_string()))?;
		let nul = |source: NulError| LaunchError::Nul { program: name.to_string(), source: source };

		let path = CString::new(resolved.as_os_str().as_bytes()).map_err(nul)?;
		let mut argv = Vec::with_capacity(command.argv.len());
		argv.push(path.clone());
		for arg in &command.argv[1..] {
			argv.push(CString::new(arg.as_bytes()).map_err(nul)?);
		}
		debug!("resolved {} to {}", name, resolved.display());

		let mut argv_ptrs: Vec<*const libc::c_char> = argv.iter().map(|a| a.as_ptr()).collect();
		argv_ptrs.push(ptr::null());
		Ok(Program {
			path: path,
			argv: argv,
			argv_ptrs: argv_ptrs,
			failure_prefix: format!("jobsh: {}: ", name).into_bytes(),
		})
	}

	pub fn path(&self) -> &CString {
		&self.path
	}

	pub fn argv(&self) -> &[CString] {
		&self.argv
	}
}

/// A stage ready to launch: the resolved program plus its opened redirect files.
#[derive(Debug)]
pub struct Stage {
	pub program: Program,
	pub input: Option<OwnedFd>,
	pub output: Option<OwnedFd>,
}

fn open_input(path: &Path) -> Result<OwnedFd, ExecError> {
	fs::File::open(path)
		.map(OwnedFd::from)
		.map_err(|e| ExecError::Redirect { path: path.to_path_buf(), source: e })
}

fn open_output(path: &Path) -> Result<OwnedFd, ExecError> {
	fs::OpenOptions::new()
		.write(true)
		.create(true)
		.truncate(true)
		.open(path)
		.map(OwnedFd::from)
		.map_err(|e| ExecError::Redirect { path: path.to_path_buf(), source: e })
}

/// Resolves every stage before opening any file, and opens every file before
/// anything is forked, so a failure leaves no process behind.
pub fn prepare(pipeline: &PipelineSpec) -> Result<Vec<Stage>, ExecError> {
	let programs = pipeline.commands.iter()
		.map(Program::prepare)
		.collect::<Result<Vec<_>, _>>()?;

	let mut stages = Vec::with_capacity(programs.len());
	for (program, command) in programs.into_iter().zip(&pipeline.commands) {
		let input = match command.input {
			Some(ref path) => Some(open_input(path)?),
			None => None,
		};
		let output = match command.output {
			Some(ref path) => Some(open_output(path)?),
			None => None,
		};
		stages.push(Stage { program: program, input: input, output: output });
	}
	Ok(stages)
}

fn write_stderr(bytes: &[u8]) {
	let _ = unistd::write(libc::STDERR_FILENO, bytes);
}

fn child_fail(program: &Program, err: nix::Error) -> ! {
	write_stderr(&program.failure_prefix);
	write_stderr(err.desc().as_bytes());
	write_stderr(b"\n");
	unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
}

fn exec_child(program: &Program, in_fd: Option<RawFd>, out_fd: Option<RawFd>, pgid: Option<Pid>) -> ! {
	terminal::restore_default_signals();
	let _ = unistd::setpgid(Pid::from_raw(0), pgid.unwrap_or(Pid::from_raw(0)));

	// Everything the shell opened is close-on-exec; only the dup'd copies survive.
	if let Some(fd) = in_fd {
		if let Err(e) = unistd::dup2(fd, libc::STDIN_FILENO) {
			child_fail(program, e);
		}
	}
	if let Some(fd) = out_fd {
		if let Err(e) = unistd::dup2(fd, libc::STDOUT_FILENO) {
			child_fail(program, e);
		}
	}

	unsafe { libc::execv(program.path.as_ptr(), program.argv_ptrs.as_ptr()) };
	child_fail(program, Errno::last())
}

/// Forks one pipeline stage and returns its pid without waiting.
///
/// The child joins `pgid`, or starts a group of its own when `pgid` is `None`.
/// The parent makes the same `setpgid` call so the group exists no matter
/// which side runs first.
pub fn launch(program: &Program, in_fd: Option<BorrowedFd>, out_fd: Option<BorrowedFd>,
              pgid: Option<Pid>) -> Result<Pid, LaunchError> {
	let in_fd = in_fd.map(|fd| fd.as_raw_fd());
	let out_fd = out_fd.map(|fd| fd.as_raw_fd());

	match unsafe { unistd::fork() }.map_err(LaunchError::Fork)? {
		ForkResult::Parent { child } => {
			let group = pgid.unwrap_or(child);
			if let Err(e) = unistd::setpgid(child, group) {
				// EACCES once the child has already exec'd, which is fine
				debug!("setpgid({}, {}): {}", child, group, e);
			}
			debug!("launched {:?} as pid {} in group {}", program.path, child, group);
			Ok(child)
		},
		ForkResult::Child => exec_child(program, in_fd, out_fd, pgid),
	}
}
