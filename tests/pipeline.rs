mod common;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::{self, Pid};
use serial_test::serial;

use jobsh::error::ExecError;
use jobsh::job::{State, WaitStatusExt};
use jobsh::{ExecutionReport, ShellState};

use common::{init_logging, kill_and_reap, no_children, run, run_within};

fn foreground_code(report: ExecutionReport) -> i32 {
	match report {
		ExecutionReport::Foreground(outcome) => {
			assert_eq!(outcome.state, State::Done);
			outcome.code()
		},
		other => panic!("expected a foreground job, got {:?}", other),
	}
}

fn wait_for_background_to_clear(state: &mut ShellState) {
	let deadline = Instant::now() + Duration::from_secs(10);
	while state.jobs.background_pgid().is_some() || state.jobs.disowned() > 0 {
		assert!(Instant::now() < deadline, "background work never finished");
		thread::sleep(Duration::from_millis(20));
		run(state, "");
	}
}

#[test]
#[serial]
fn pipeline_stages_share_one_process_group() {
	init_logging();
	let mut state = ShellState::detached();
	let pgid = match run(&mut state, "sleep 5 | sleep 5 | sleep 5 &") {
		ExecutionReport::Background(pgid) => pgid,
		other => panic!("expected a background job, got {:?}", other),
	};

	let pids = state.jobs.background().expect("background job is tracked").pids();
	assert_eq!(pids.len(), 3);
	assert_eq!(pids[0], pgid);
	for &pid in &pids {
		assert_eq!(unistd::getpgid(Some(pid)).unwrap(), pgid);
	}
	assert_ne!(pgid, unistd::getpgrp());

	kill_and_reap(pgid, &pids);
	assert!(no_children());
}

#[test]
#[serial]
fn redirection_round_trip_matches_pipe() {
	init_logging();
	let dir = tempfile::tempdir().unwrap();
	let f = dir.path().join("f");
	let via_file = dir.path().join("via_file");
	let via_pipe = dir.path().join("via_pipe");
	let mut state = ShellState::detached();

	assert_eq!(foreground_code(run(&mut state, &format!("echo hello > {}", f.display()))), 0);
	assert_eq!(foreground_code(run(&mut state,
		&format!("cat < {} > {}", f.display(), via_file.display()))), 0);
	assert_eq!(foreground_code(run(&mut state,
		&format!("echo hello | cat > {}", via_pipe.display()))), 0);

	assert_eq!(fs::read(&via_file).unwrap(), b"hello\n");
	assert_eq!(fs::read(&via_file).unwrap(), fs::read(&via_pipe).unwrap());
	assert!(no_children());
}

#[test]
#[serial]
fn output_redirect_truncates() {
	init_logging();
	let dir = tempfile::tempdir().unwrap();
	let f = dir.path().join("f");
	fs::write(&f, "a much longer line that must disappear\n").unwrap();
	let mut state = ShellState::detached();

	assert_eq!(foreground_code(run(&mut state, &format!("echo short > {}", f.display()))), 0);
	assert_eq!(fs::read_to_string(&f).unwrap(), "short\n");
}

#[test]
#[serial]
fn large_pipeline_does_not_deadlock() {
	init_logging();
	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("count");
	// far more than a kernel pipe buffer
	let line = format!("head -c 1000000 /dev/zero | cat | wc -c > {}", out.display());

	let (_state, report) = run_within(ShellState::detached(), &line, 30);
	assert_eq!(foreground_code(report), 0);
	assert_eq!(fs::read_to_string(&out).unwrap().trim(), "1000000");
	assert!(no_children());
}

#[test]
#[serial]
fn reader_sees_eof_when_writer_exits() {
	init_logging();
	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("lines");
	let line = format!("printf 'a\\nb\\nc\\n' | cat | wc -l > {}", out.display());

	let (_state, report) = run_within(ShellState::detached(), &line, 10);
	assert_eq!(foreground_code(report), 0);
	assert_eq!(fs::read_to_string(&out).unwrap().trim(), "3");
}

#[test]
#[serial]
fn malformed_stage_launches_nothing() {
	init_logging();
	let dir = tempfile::tempdir().unwrap();
	let f = dir.path().join("f");
	let mut state = ShellState::detached();

	match run(&mut state, "echo hi | cat >") {
		ExecutionReport::Rejected(ExecError::Parse(_)) => {},
		other => panic!("expected a parse error, got {:?}", other),
	}
	assert!(no_children());

	assert_eq!(foreground_code(run(&mut state, &format!("echo ok > {}", f.display()))), 0);
	assert_eq!(fs::read_to_string(&f).unwrap(), "ok\n");
}

#[test]
#[serial]
fn unknown_program_aborts_whole_pipeline() {
	init_logging();
	let dir = tempfile::tempdir().unwrap();
	let f = dir.path().join("f");
	let mut state = ShellState::detached();

	let report = run(&mut state, &format!("echo hi > {} | jobsh-no-such-program | cat", f.display()));
	assert_eq!(report.status(), 127);
	match report {
		ExecutionReport::Rejected(ExecError::ProgramNotFound(name)) => {
			assert_eq!(name, "jobsh-no-such-program");
		},
		other => panic!("expected ProgramNotFound, got {:?}", other),
	}
	assert!(no_children());
	assert!(!f.exists());

	assert_eq!(foreground_code(run(&mut state, "true")), 0);
}

#[test]
#[serial]
fn missing_input_file_aborts_pipeline() {
	init_logging();
	let dir = tempfile::tempdir().unwrap();
	let mut state = ShellState::detached();

	let line = format!("cat < {} | wc -l", dir.path().join("missing").display());
	match run(&mut state, &line) {
		ExecutionReport::Rejected(ExecError::Redirect { .. }) => {},
		other => panic!("expected a redirect error, got {:?}", other),
	}
	assert!(no_children());
}

#[test]
#[serial]
fn exec_failure_only_affects_its_stage() {
	init_logging();
	let dir = tempfile::tempdir().unwrap();
	let script = dir.path().join("broken");
	fs::write(&script, "#!/jobsh/no/such/interpreter\n").unwrap();
	fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
	let out = dir.path().join("out");
	let mut state = ShellState::detached();

	assert_eq!(foreground_code(run(&mut state, script.to_str().unwrap())), 126);

	let line = format!("echo hi | {} | cat > {}", script.display(), out.display());
	let (_state, report) = run_within(state, &line, 10);
	assert_eq!(foreground_code(report), 0);
	assert_eq!(fs::read_to_string(&out).unwrap(), "");
	assert!(no_children());
}

#[test]
#[serial]
fn exit_status_comes_from_last_stage() {
	init_logging();
	let mut state = ShellState::detached();
	assert_eq!(foreground_code(run(&mut state, "true | sh -c 'exit 5'")), 5);
	assert_eq!(foreground_code(run(&mut state, "sh -c 'exit 5' | true")), 0);
}

#[test]
#[serial]
fn background_returns_immediately_and_is_tracked_until_exit() {
	init_logging();
	let mut state = ShellState::detached();

	let started = Instant::now();
	let pgid = match run(&mut state, "sleep 0.5 &") {
		ExecutionReport::Background(pgid) => pgid,
		other => panic!("expected a background job, got {:?}", other),
	};
	assert!(started.elapsed() < Duration::from_millis(400));
	assert_eq!(state.jobs.background_pgid(), Some(pgid));
	assert_eq!(state.jobs.foreground_pgid(), None);

	wait_for_background_to_clear(&mut state);
	assert!(no_children());
}

#[test]
#[serial]
fn second_background_job_replaces_first_without_leaking() {
	init_logging();
	let mut state = ShellState::detached();

	let first = run(&mut state, "sleep 0.3 &");
	let second = match run(&mut state, "sleep 0.3 &") {
		ExecutionReport::Background(pgid) => pgid,
		other => panic!("expected a background job, got {:?}", other),
	};
	assert!(matches!(first, ExecutionReport::Background(pgid) if pgid != second));
	assert_eq!(state.jobs.background_pgid(), Some(second));
	assert_eq!(state.jobs.disowned(), 1);

	wait_for_background_to_clear(&mut state);
	assert!(no_children());
}

#[test]
#[serial]
fn stopped_job_moves_to_background_and_resumes_with_fg() {
	init_logging();
	let mut state = ShellState::detached();

	let outcome = match run(&mut state, "sh -c 'kill -s STOP $$; exit 7'") {
		ExecutionReport::Foreground(outcome) => outcome,
		other => panic!("expected a foreground job, got {:?}", other),
	};
	assert_eq!(outcome.state, State::Stopped);
	assert_eq!(state.jobs.background_pgid(), Some(outcome.pgid));
	assert_eq!(state.jobs.foreground_pgid(), None);

	let (state, report) = run_within(state, "fg", 10);
	assert!(matches!(report, ExecutionReport::Builtin(7)), "got {:?}", report);
	assert_eq!(state.jobs.background_pgid(), None);
	assert!(no_children());
}

#[test]
#[serial]
fn resumed_job_can_stop_again() {
	init_logging();
	let mut state = ShellState::detached();

	let outcome = match run(&mut state, "sh -c 'kill -s STOP $$; kill -s STOP $$; exit 3'") {
		ExecutionReport::Foreground(outcome) => outcome,
		other => panic!("expected a foreground job, got {:?}", other),
	};
	assert_eq!(outcome.state, State::Stopped);

	let (state, report) = run_within(state, "fg", 10);
	assert!(matches!(report, ExecutionReport::Builtin(_)), "got {:?}", report);
	assert_eq!(state.jobs.background_pgid(), Some(outcome.pgid));
	assert_eq!(state.jobs.background().unwrap().state(), State::Stopped);

	let (state, report) = run_within(state, "fg", 10);
	assert!(matches!(report, ExecutionReport::Builtin(3)), "got {:?}", report);
	assert_eq!(state.jobs.background_pgid(), None);
	assert!(no_children());
}

#[test]
#[serial]
fn bg_continues_stopped_job_in_background() {
	init_logging();
	let mut state = ShellState::detached();

	let outcome = match run(&mut state, "sh -c 'kill -s STOP $$; sleep 0.2'") {
		ExecutionReport::Foreground(outcome) => outcome,
		other => panic!("expected a foreground job, got {:?}", other),
	};
	assert_eq!(outcome.state, State::Stopped);

	assert!(matches!(run(&mut state, "bg"), ExecutionReport::Builtin(0)));
	assert_eq!(state.jobs.background().unwrap().state(), State::Running);

	wait_for_background_to_clear(&mut state);
	assert!(no_children());
}

#[test]
#[serial]
fn displaced_stopped_job_is_hung_up_and_reaped() {
	init_logging();
	let mut state = ShellState::detached();

	let stopped = match run(&mut state, "sh -c 'kill -s STOP $$; sleep 30'") {
		ExecutionReport::Foreground(outcome) => outcome,
		other => panic!("expected a foreground job, got {:?}", other),
	};
	assert_eq!(stopped.state, State::Stopped);

	let replacement = run(&mut state, "sleep 0.1 &");
	assert!(matches!(replacement, ExecutionReport::Background(pgid) if pgid != stopped.pgid));
	assert_eq!(state.jobs.disowned(), 1);

	wait_for_background_to_clear(&mut state);
	assert!(no_children());
}

/// Polls `path` until a stage has written its pid there.
fn read_pid(path: &std::path::Path) -> Pid {
	let deadline = Instant::now() + Duration::from_secs(10);
	loop {
		if let Ok(text) = fs::read_to_string(path) {
			if text.ends_with('\n') {
				return Pid::from_raw(text.trim().parse().unwrap());
			}
		}
		assert!(Instant::now() < deadline, "no pid written to {}", path.display());
		thread::sleep(Duration::from_millis(10));
	}
}

#[test]
#[serial]
fn tstp_to_group_stops_every_stage() {
	init_logging();
	let dir = tempfile::tempdir().unwrap();
	let pid_file = dir.path().join("pid");
	let state = ShellState::detached();

	// the last stage is forked after every other one has joined the group
	let line = format!("sleep 2 | sleep 2 | sh -c 'echo $$ > {}; exec sleep 2'", pid_file.display());
	let worker = thread::spawn(move || run_within(state, &line, 10));

	let last = read_pid(&pid_file);
	let pgid = unistd::getpgid(Some(last)).unwrap();
	assert_ne!(pgid, unistd::getpgrp());
	signal::killpg(pgid, Signal::SIGTSTP).unwrap();

	let (state, report) = worker.join().unwrap();
	match report {
		ExecutionReport::Foreground(outcome) => {
			assert_eq!(outcome.state, State::Stopped);
			assert_eq!(outcome.pgid, pgid);
		},
		other => panic!("expected a foreground job, got {:?}", other),
	}
	let job = state.jobs.background().expect("stopped job moves to the background");
	assert_eq!(job.pgid, pgid);
	assert_eq!(job.processes.len(), 3);
	assert!(job.processes.iter().all(|pr| pr.status.state() == State::Stopped));

	let (state, report) = run_within(state, "fg", 10);
	assert!(matches!(report, ExecutionReport::Builtin(0)), "got {:?}", report);
	assert_eq!(state.jobs.background_pgid(), None);
	assert!(no_children());
}

#[test]
#[serial]
fn builtins_never_create_jobs() {
	init_logging();
	let mut state = ShellState::detached();
	assert!(matches!(run(&mut state, "bgpgid"), ExecutionReport::Builtin(0)));
	assert!(matches!(run(&mut state, "fgpgid"), ExecutionReport::Builtin(0)));
	assert!(matches!(run(&mut state, "exit 4"), ExecutionReport::Exit(4)));
	assert!(matches!(run(&mut state, "   "), ExecutionReport::Empty));
	assert_eq!(state.jobs.background_pgid(), None);
	assert!(no_children());
}
