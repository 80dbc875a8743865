use log::info;
use nix::unistd::Pid;

use crate::job::{Job, JobOutcome, JobTable, State};
use crate::terminal::Terminal;

/// Process-wide shell state. Only the job table and the terminal arbiter
/// mutate it, and only between launches.
#[derive(Debug)]
pub struct ShellState {
	pub terminal: Terminal,
	pub jobs: JobTable,
}

impl ShellState {
	pub fn new(terminal: Terminal) -> ShellState {
		ShellState { terminal: terminal, jobs: JobTable::new() }
	}

	/// State for a shell that never owns a terminal (scripts, `-c`, tests).
	pub fn detached() -> ShellState {
		ShellState::new(Terminal::detached())
	}

	/// Hands the terminal to `job`, waits for it and takes the terminal back,
	/// whether the job finished or stopped.
	pub fn run_foreground(&mut self, job: Job) -> JobOutcome {
		self.terminal.hand_to(job.pgid);
		self.wait_and_reclaim(job)
	}

	fn wait_and_reclaim(&mut self, job: Job) -> JobOutcome {
		let outcome = self.jobs.wait_foreground(job);
		self.terminal.reclaim();
		if outcome.state != State::Done {
			eprintln!("[{}] Stopped", outcome.pgid);
		}
		outcome
	}

	pub fn launch_background(&mut self, job: Job) -> Pid {
		let pgid = job.pgid;
		eprintln!("[{}]", pgid);
		self.jobs.set_background(job);
		pgid
	}

	/// Brings the background job to the foreground. `Ok(None)` when there is
	/// no background job.
	pub fn resume_foreground(&mut self) -> nix::Result<Option<JobOutcome>> {
		let mut job = match self.jobs.take_background() {
			Some(job) => job,
			None => return Ok(None),
		};
		self.terminal.hand_to(job.pgid);
		if let Err(e) = job.resume() {
			self.terminal.reclaim();
			self.jobs.set_background(job);
			return Err(e);
		}
		Ok(Some(self.wait_and_reclaim(job)))
	}

	/// Continues a stopped background job without giving it the terminal.
	pub fn resume_background(&mut self) -> nix::Result<Option<Pid>> {
		let job = match self.jobs.background_mut() {
			Some(job) => job,
			None => return Ok(None),
		};
		if job.state() == State::Stopped {
			job.resume()?;
			eprintln!("[{}] Running", job.pgid);
		}
		Ok(Some(job.pgid))
	}

	/// Non-blocking reap of finished or stopped background work.
	pub fn reap_background(&mut self) {
		if let Some((pgid, state)) = self.jobs.reap_background() {
			info!("background group {} is now {:?}", pgid, state);
			match state {
				State::Done => eprintln!("[{}] Done", pgid),
				State::Stopped => eprintln!("[{}] Stopped", pgid),
				State::Running => eprintln!("[{}] Running", pgid),
			}
		}
	}
}
