use log::{debug, error, info, warn};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::error::WaitError;

/// Ordered so that the state of a job is the minimum over its members.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum State { Running, Stopped, Done }

pub trait WaitStatusExt {
	fn state(self) -> State;
	fn code(self) -> Option<i32>;
}

impl WaitStatusExt for WaitStatus {
	fn state(self) -> State {
		match self {
			WaitStatus::Exited(..) | WaitStatus::Signaled(..) => State::Done,
			WaitStatus::StillAlive | WaitStatus::Continued(..) => State::Running,
			_ => State::Stopped,
		}
	}

	fn code(self) -> Option<i32> {
		match self {
			WaitStatus::Exited(_, code) => Some(code),
			WaitStatus::Signaled(_, sig, _) => Some(128 + sig as i32),
			WaitStatus::Stopped(_, sig) => Some(128 + sig as i32),
			_ => None,
		}
	}
}

fn waitpid_retrying(pid: Pid, flags: WaitPidFlag) -> nix::Result<WaitStatus> {
	loop {
		match wait::waitpid(pid, Some(flags)) {
			Err(Errno::EINTR) => {},
			r => return r,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Process {
	pub pid: Pid,
	pub status: WaitStatus,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct JobOutcome {
	pub pgid: Pid,
	pub state: State,
	/// The last status observed while waiting, if any.
	pub status: Option<WaitStatus>,
}

impl JobOutcome {
	pub fn code(&self) -> i32 {
		self.status.and_then(|s| s.code()).unwrap_or(0)
	}
}

/// One launched pipeline: a process group and its members in pipeline order.
#[derive(Debug)]
pub struct Job {
	pub pgid: Pid,
	pub processes: Vec<Process>,
	pub foreground: bool,
	last_status: Option<WaitStatus>,
}

impl Job {
	pub fn state(&self) -> State {
		self.processes.iter().map(|pr| pr.status.state()).min().unwrap_or(State::Done)
	}

	pub fn pids(&self) -> Vec<Pid> {
		self.processes.iter().map(|pr| pr.pid).collect()
	}

	pub fn outcome(&self) -> JobOutcome {
		JobOutcome { pgid: self.pgid, state: self.state(), status: self.last_status }
	}

	/// Blocks on each live member in pipeline order until it exits or stops.
	///
	/// A member that cannot be waited for is dropped from the job; the first
	/// such failure is returned after the others have been waited on.
	pub fn wait(&mut self) -> Result<State, WaitError> {
		let mut failure = None;
		let mut lost = vec![];
		for pr in self.processes.iter_mut().filter(|pr| pr.status.state() == State::Running) {
			match waitpid_retrying(pr.pid, WaitPidFlag::WUNTRACED) {
				Ok(status) => {
					debug!("pid {} of group {}: {:?}", pr.pid, self.pgid, status);
					pr.status = status;
					self.last_status = Some(status);
				},
				Err(e) => {
					error!("waitpid({}): {}", pr.pid, e);
					lost.push(pr.pid);
					failure.get_or_insert(WaitError { pid: pr.pid, source: e });
				},
			}
		}
		self.processes.retain(|pr| !lost.contains(&pr.pid));
		match failure {
			Some(e) => Err(e),
			None => Ok(self.state()),
		}
	}

	/// Collects pending status changes without blocking.
	pub fn poll(&mut self) -> State {
		let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
		let mut lost = vec![];
		for pr in self.processes.iter_mut().filter(|pr| pr.status.state() != State::Done) {
			match waitpid_retrying(pr.pid, flags) {
				Ok(WaitStatus::StillAlive) => {},
				Ok(status) => {
					debug!("pid {} of group {}: {:?}", pr.pid, self.pgid, status);
					pr.status = status;
					self.last_status = Some(status);
				},
				Err(e) => {
					warn!("waitpid({}): {}, forgetting it", pr.pid, e);
					lost.push(pr.pid);
				},
			}
		}
		self.processes.retain(|pr| !lost.contains(&pr.pid));
		self.state()
	}

	/// Sends SIGCONT to the whole group and marks stopped members running.
	pub fn resume(&mut self) -> nix::Result<()> {
		signal::killpg(self.pgid, Signal::SIGCONT)?;
		for pr in self.processes.iter_mut().filter(|pr| pr.status.state() == State::Stopped) {
			pr.status = WaitStatus::StillAlive;
		}
		info!("group {} continued", self.pgid);
		Ok(())
	}

	/// SIGHUP then SIGCONT, the way the kernel treats an orphaned stopped
	/// group, so a job nobody can resume is not left stopped forever.
	pub fn hang_up(&mut self) -> nix::Result<()> {
		signal::killpg(self.pgid, Signal::SIGHUP)?;
		self.resume()
	}
}

#[derive(Debug)]
pub struct JobBuilder {
	pgid: Option<Pid>,
	processes: Vec<Process>,
}

impl JobBuilder {
	pub fn new(size_hint: usize) -> JobBuilder {
		JobBuilder { pgid: None, processes: Vec::with_capacity(size_hint) }
	}

	/// The group later stages must join: the first stage's pid.
	pub fn pgid(&self) -> Option<Pid> {
		self.pgid
	}

	pub fn push(&mut self, pid: Pid) {
		self.pgid.get_or_insert(pid);
		self.processes.push(Process { pid: pid, status: WaitStatus::StillAlive });
	}

	pub fn is_empty(&self) -> bool {
		self.processes.is_empty()
	}

	pub fn build(self, foreground: bool) -> Option<Job> {
		let pgid = self.pgid?;
		Some(Job { pgid: pgid, processes: self.processes, foreground: foreground, last_status: None })
	}
}

/// The shell's job slots: at most one foreground and one background job.
///
/// A background job pushed out of its slot is kept in `disowned` only so its
/// members still get reaped.
#[derive(Debug, Default)]
pub struct JobTable {
	foreground: Option<Job>,
	background: Option<Job>,
	disowned: Vec<Job>,
}

impl JobTable {
	pub fn new() -> JobTable {
		JobTable::default()
	}

	pub fn foreground(&self) -> Option<&Job> {
		self.foreground.as_ref()
	}

	pub fn background(&self) -> Option<&Job> {
		self.background.as_ref()
	}

	pub fn background_pgid(&self) -> Option<Pid> {
		self.background.as_ref().map(|job| job.pgid)
	}

	pub fn foreground_pgid(&self) -> Option<Pid> {
		self.foreground.as_ref().map(|job| job.pgid)
	}

	pub fn disowned(&self) -> usize {
		self.disowned.len()
	}

	pub fn take_background(&mut self) -> Option<Job> {
		self.background.take()
	}

	pub fn background_mut(&mut self) -> Option<&mut Job> {
		self.background.as_mut()
	}

	pub fn set_background(&mut self, mut job: Job) {
		job.foreground = false;
		if let Some(mut prev) = self.background.replace(job) {
			warn!("group {} is no longer tracked; it will only be reaped", prev.pgid);
			if prev.state() == State::Stopped {
				if let Err(e) = prev.hang_up() {
					warn!("hanging up stopped group {}: {}", prev.pgid, e);
				}
			}
			self.disowned.push(prev);
		}
	}

	/// Waits for the foreground job, then releases it if it finished or moves
	/// it into the background slot if it stopped.
	pub fn wait_foreground(&mut self, mut job: Job) -> JobOutcome {
		job.foreground = true;
		let job = self.foreground.insert(job);
		if let Err(e) = job.wait() {
			eprintln!("jobsh: {}", e);
		}
		let outcome = job.outcome();

		if let Some(job) = self.foreground.take() {
			match outcome.state {
				State::Done => info!("group {} done", job.pgid),
				State::Stopped | State::Running => {
					info!("group {} stopped, moving to background", job.pgid);
					self.set_background(job);
				},
			}
		}
		outcome
	}

	/// Non-blocking check of the background job (and any disowned ones).
	/// Returns the background job's new state when it changed; a finished
	/// job's slot is cleared.
	pub fn reap_background(&mut self) -> Option<(Pid, State)> {
		self.disowned.retain_mut(|job| job.poll() != State::Done);

		let job = self.background.as_mut()?;
		let before = job.state();
		let after = job.poll();
		let pgid = job.pgid;
		if after == State::Done {
			info!("group {} done", pgid);
			self.background = None;
		}
		if before != after { Some((pgid, after)) } else { None }
	}
}
