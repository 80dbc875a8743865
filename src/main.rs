use std::io;
use std::io::{BufRead, Write};
use std::process;

use clap::Parser;
use log::{debug, warn};

use jobsh::config::Config;
use jobsh::terminal::Terminal;
use jobsh::tokenizer::tokenize;
use jobsh::{execute_line, ExecutionReport, ShellState};

fn run_command(line: &str) -> i32 {
	let mut state = ShellState::detached();
	let report = execute_line(&mut state, &tokenize(line));
	report.status()
}

fn run_interactive(config: &Config) -> i32 {
	let terminal = Terminal::init().unwrap_or_else(|e| {
		warn!("cannot take control of the terminal: {}", e);
		Terminal::detached()
	});
	let interactive = terminal.is_interactive();
	debug!("interactive: {}, shell group {}", interactive, terminal.shell_pgid());
	let mut state = ShellState::new(terminal);

	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	let mut status = 0;
	loop {
		if interactive {
			let _ = stdout.write_all(config.prompt.as_bytes());
			let _ = stdout.flush();
		}
		let mut buf = Vec::new();
		match stdin_locked.read_until(b'\n', &mut buf) {
			Ok(0) => {
				if interactive {
					println!();
				}
				return status;
			},
			Ok(_) => {},
			Err(e) => {
				eprintln!("jobsh: {}", e);
				return 1;
			},
		}
		// undecodable bytes become U+FFFD instead of ending the shell
		let line = String::from_utf8_lossy(&buf);
		match execute_line(&mut state, &tokenize(&line)) {
			ExecutionReport::Exit(code) => return code,
			ExecutionReport::Empty => {},
			report => status = report.status(),
		}
	}
}

fn main() {
	let config = Config::parse();
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_filter())).init();

	let code = match config.command {
		Some(ref line) => run_command(line),
		None => run_interactive(&config),
	};
	process::exit(code);
}
