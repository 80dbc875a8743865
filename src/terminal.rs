//! Terminal ownership and the shell's own signal disposition.
//!
//! The shell ignores the job-control signals while it runs and hands the
//! terminal to a job's process group for as long as that job is in the
//! foreground. Children put every signal back to its default before exec.

use std::os::unix::io::RawFd;

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::termios::{self, SetArg, Termios};
use nix::unistd::{self, Pid};

/// Signals meant for the foreground job, never for the shell.
pub const JOB_CONTROL_SIGNALS: [Signal; 5] = [
	Signal::SIGINT,
	Signal::SIGQUIT,
	Signal::SIGTSTP,
	Signal::SIGTTIN,
	Signal::SIGTTOU,
];

fn set_disposition(sig: Signal, handler: SigHandler) -> nix::Result<()> {
	let action = SigAction::new(handler, SaFlags::SA_RESTART, SigSet::empty());
	unsafe { signal::sigaction(sig, &action) }.map(|_| ())
}

pub fn ignore_job_control_signals() -> nix::Result<()> {
	for &sig in JOB_CONTROL_SIGNALS.iter() {
		set_disposition(sig, SigHandler::SigIgn)?;
	}
	Ok(())
}

/// Called in a forked child before exec. Only async-signal-safe calls here.
pub fn restore_default_signals() {
	for &sig in JOB_CONTROL_SIGNALS.iter() {
		let _ = set_disposition(sig, SigHandler::SigDfl);
	}
	let _ = set_disposition(Signal::SIGCHLD, SigHandler::SigDfl);
}

#[derive(Debug)]
pub struct Terminal {
	fd: RawFd,
	interactive: bool,
	shell_pgid: Pid,
	modes: Option<Termios>,
}

impl Terminal {
	/// Takes control of standard input's terminal. Falls back to a detached
	/// terminal when standard input is not a tty.
	pub fn init() -> nix::Result<Terminal> {
		let fd = libc::STDIN_FILENO;
		// An inherited SIG_IGN for SIGCHLD would make the kernel reap children
		// behind our back.
		set_disposition(Signal::SIGCHLD, SigHandler::SigDfl)?;
		if !unistd::isatty(fd).unwrap_or(false) {
			return Ok(Terminal::detached());
		}

		loop {
			let pgrp = unistd::getpgrp();
			if unistd::tcgetpgrp(fd)? == pgrp {
				break;
			}
			debug!("shell group {} is not in the foreground, stopping", pgrp);
			signal::killpg(pgrp, Signal::SIGTTIN)?;
		}

		ignore_job_control_signals()?;

		let shell_pgid = unistd::getpid();
		match unistd::setpgid(shell_pgid, shell_pgid) {
			// a session leader already leads its own group
			Ok(()) | Err(Errno::EPERM) => {},
			Err(e) => return Err(e),
		}
		unistd::tcsetpgrp(fd, shell_pgid)?;
		let modes = termios::tcgetattr(fd).ok();
		debug!("shell group {} owns terminal fd {}", shell_pgid, fd);

		Ok(Terminal { fd: fd, interactive: true, shell_pgid: shell_pgid, modes: modes })
	}

	/// A terminal the shell never hands over, used when input is not a tty.
	pub fn detached() -> Terminal {
		Terminal {
			fd: libc::STDIN_FILENO,
			interactive: false,
			shell_pgid: unistd::getpgrp(),
			modes: None,
		}
	}

	pub fn is_interactive(&self) -> bool {
		self.interactive
	}

	pub fn shell_pgid(&self) -> Pid {
		self.shell_pgid
	}

	/// The process group the kernel currently treats as foreground.
	pub fn owner(&self) -> nix::Result<Pid> {
		unistd::tcgetpgrp(self.fd)
	}

	pub fn hand_to(&self, pgid: Pid) {
		if !self.interactive {
			return;
		}
		debug!("handing terminal to group {}", pgid);
		if let Err(e) = unistd::tcsetpgrp(self.fd, pgid) {
			warn!("tcsetpgrp({}): {}", pgid, e);
		}
	}

	pub fn reclaim(&self) {
		if !self.interactive {
			return;
		}
		debug!("reclaiming terminal for shell group {}", self.shell_pgid);
		if let Err(e) = unistd::tcsetpgrp(self.fd, self.shell_pgid) {
			warn!("tcsetpgrp({}): {}", self.shell_pgid, e);
		}
		if let Some(ref modes) = self.modes {
			if let Err(e) = termios::tcsetattr(self.fd, SetArg::TCSADRAIN, modes) {
				warn!("tcsetattr: {}", e);
			}
		}
	}
}
