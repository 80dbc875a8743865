use log::debug;
use nix::unistd::Pid;

use crate::builtin::{self, BuiltinResult};
use crate::error::ExecError;
use crate::global::ShellState;
use crate::job::{JobBuilder, JobOutcome};
use crate::launch;
use crate::parser;
use crate::pipe;

#[derive(Debug)]
pub enum ExecutionReport {
	/// The line had no tokens.
	Empty,
	Builtin(u8),
	/// The `exit` builtin asked the shell to leave with this status.
	Exit(i32),
	/// Nothing was launched.
	Rejected(ExecError),
	Foreground(JobOutcome),
	Background(Pid),
}

impl ExecutionReport {
	pub fn status(&self) -> i32 {
		match *self {
			ExecutionReport::Empty | ExecutionReport::Background(_) => 0,
			ExecutionReport::Builtin(s) => s as i32,
			ExecutionReport::Exit(code) => code,
			ExecutionReport::Rejected(ref e) => e.status(),
			ExecutionReport::Foreground(ref outcome) => outcome.code(),
		}
	}
}

fn eval_pipeline(state: &mut ShellState, tokens: &[String]) -> Result<ExecutionReport, ExecError> {
	let pipeline = parser::parse(tokens)?;
	let stages = launch::prepare(&pipeline)?;
	debug!("launching {} stage(s), background: {}", stages.len(), pipeline.is_background);

	let mut job_builder = JobBuilder::new(stages.len());
	if let Err(e) = pipe::spawn_pipeline(stages, &mut job_builder) {
		if job_builder.is_empty() {
			return Err(e.into());
		}
		// the stages already running are still a job
		eprintln!("jobsh: {}", e);
	}

	let job = match job_builder.build(!pipeline.is_background) {
		Some(job) => job,
		None => return Ok(ExecutionReport::Empty),
	};
	if pipeline.is_background {
		Ok(ExecutionReport::Background(state.launch_background(job)))
	} else {
		Ok(ExecutionReport::Foreground(state.run_foreground(job)))
	}
}

/// Runs one tokenized line: a builtin when token 0 names one, otherwise a
/// pipeline. Never fatal to the shell.
pub fn execute_line(state: &mut ShellState, tokens: &[String]) -> ExecutionReport {
	state.reap_background();

	let name = match tokens.first() {
		Some(name) => name,
		None => return ExecutionReport::Empty,
	};
	if let Some(func) = builtin::match_builtin(name) {
		return match func(state, &tokens[1..]) {
			BuiltinResult::Status(s) => ExecutionReport::Builtin(s),
			BuiltinResult::Exit(code) => ExecutionReport::Exit(code),
		};
	}

	match eval_pipeline(state, tokens) {
		Ok(report) => report,
		Err(e) => {
			eprintln!("jobsh: {}", e);
			ExecutionReport::Rejected(e)
		},
	}
}
