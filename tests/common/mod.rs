#![allow(dead_code)]

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::wait::{self, WaitPidFlag};
use nix::unistd::Pid;

use jobsh::tokenizer::tokenize;
use jobsh::{execute_line, ExecutionReport, ShellState};

pub fn init_logging() {
	let _ = env_logger::builder().is_test(true).try_init();
}

pub fn run(state: &mut ShellState, line: &str) -> ExecutionReport {
	execute_line(state, &tokenize(line))
}

/// Runs `line` on a worker thread and fails the test instead of hanging when
/// it does not finish within `secs`.
pub fn run_within(state: ShellState, line: &str, secs: u64) -> (ShellState, ExecutionReport) {
	let (tx, rx) = mpsc::channel();
	let owned = line.to_string();
	thread::spawn(move || {
		let mut state = state;
		let report = run(&mut state, &owned);
		let _ = tx.send((state, report));
	});
	rx.recv_timeout(Duration::from_secs(secs))
		.unwrap_or_else(|_| panic!("'{}' did not finish within {}s", line, secs))
}

/// True when this process has no children left, reaped or not.
pub fn no_children() -> bool {
	wait::waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) == Err(Errno::ECHILD)
}

/// Kills and reaps every member of `pids`.
pub fn kill_and_reap(pgid: Pid, pids: &[Pid]) {
	let _ = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGKILL);
	for &pid in pids {
		let _ = wait::waitpid(pid, None);
	}
}
