use std::env;
use std::path::PathBuf;

use nix::unistd::Pid;

use crate::global::ShellState;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BuiltinResult {
	Status(u8),
	Exit(i32),
}

pub type Builtin = fn(&mut ShellState, &[String]) -> BuiltinResult;

struct BuiltinDesc {
	name: &'static str,
	func: Builtin,
	doc: &'static str,
}

const BUILTINS: &[BuiltinDesc] = &[
	BuiltinDesc { name: "?", func: builtin_help, doc: "show this help menu" },
	BuiltinDesc { name: "help", func: builtin_help, doc: "show this help menu" },
	BuiltinDesc { name: "exit", func: builtin_exit, doc: "exit the command shell" },
	BuiltinDesc { name: "cd", func: builtin_cd, doc: "change current working directory" },
	BuiltinDesc { name: "pwd", func: builtin_pwd, doc: "print current working directory" },
	BuiltinDesc { name: "fg", func: builtin_fg, doc: "resume the background job in the foreground" },
	BuiltinDesc { name: "bg", func: builtin_bg, doc: "resume a stopped background job in the background" },
	BuiltinDesc { name: "fgpgid", func: builtin_fgpgid, doc: "print this shell's foreground process group" },
	BuiltinDesc { name: "bgpgid", func: builtin_bgpgid, doc: "print this shell's background process group" },
	BuiltinDesc { name: "pfgpgid", func: builtin_pfgpgid, doc: "print the terminal's foreground process group" },
];

fn print_pgid(pgid: Option<Pid>) {
	println!("{}", pgid.map_or(-1, |p| p.as_raw()));
}

fn builtin_help(_: &mut ShellState, _: &[String]) -> BuiltinResult {
	for desc in BUILTINS {
		println!("{} - {}", desc.name, desc.doc);
	}
	BuiltinResult::Status(0)
}

fn builtin_exit(_: &mut ShellState, args: &[String]) -> BuiltinResult {
	match args.first().map(|s| s.parse::<i32>()) {
		None => BuiltinResult::Exit(0),
		Some(Ok(code)) => BuiltinResult::Exit(code),
		Some(Err(_)) => {
			eprintln!("exit: {}: numeric argument required", args[0]);
			BuiltinResult::Status(2)
		},
	}
}

fn builtin_cd(_: &mut ShellState, args: &[String]) -> BuiltinResult {
	let target = match args.first() {
		Some(dir) => PathBuf::from(dir),
		None => match env::var_os("HOME") {
			Some(home) => PathBuf::from(home),
			None => {
				eprintln!("cd: HOME not set");
				return BuiltinResult::Status(1);
			},
		},
	};
	match env::set_current_dir(&target) {
		Ok(()) => BuiltinResult::Status(0),
		Err(e) => {
			eprintln!("cd: {}: {}", target.display(), e);
			BuiltinResult::Status(1)
		},
	}
}

fn builtin_pwd(_: &mut ShellState, _: &[String]) -> BuiltinResult {
	match env::current_dir() {
		Ok(dir) => {
			println!("{}", dir.display());
			BuiltinResult::Status(0)
		},
		Err(e) => {
			eprintln!("pwd: {}", e);
			BuiltinResult::Status(1)
		},
	}
}

fn builtin_fg(state: &mut ShellState, _: &[String]) -> BuiltinResult {
	match state.resume_foreground() {
		Ok(Some(outcome)) => BuiltinResult::Status(outcome.code() as u8),
		Ok(None) => {
			eprintln!("fg: no current job");
			BuiltinResult::Status(1)
		},
		Err(e) => {
			eprintln!("fg: {}", e);
			BuiltinResult::Status(1)
		},
	}
}

fn builtin_bg(state: &mut ShellState, _: &[String]) -> BuiltinResult {
	match state.resume_background() {
		Ok(Some(_)) => BuiltinResult::Status(0),
		Ok(None) => {
			eprintln!("bg: no current job");
			BuiltinResult::Status(1)
		},
		Err(e) => {
			eprintln!("bg: {}", e);
			BuiltinResult::Status(1)
		},
	}
}

fn builtin_fgpgid(state: &mut ShellState, _: &[String]) -> BuiltinResult {
	print_pgid(state.jobs.foreground_pgid());
	BuiltinResult::Status(0)
}

fn builtin_bgpgid(state: &mut ShellState, _: &[String]) -> BuiltinResult {
	print_pgid(state.jobs.background_pgid());
	BuiltinResult::Status(0)
}

fn builtin_pfgpgid(state: &mut ShellState, _: &[String]) -> BuiltinResult {
	match state.terminal.owner() {
		Ok(pgid) => {
			print_pgid(Some(pgid));
			BuiltinResult::Status(0)
		},
		Err(e) => {
			eprintln!("pfgpgid: {}", e);
			BuiltinResult::Status(1)
		},
	}
}

pub fn match_builtin(name: &str) -> Option<Builtin> {
	BUILTINS.iter().find(|desc| desc.name == name).map(|desc| desc.func)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn args(list: &[&str]) -> Vec<String> {
		list.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn lookup() {
		for name in &["?", "help", "exit", "cd", "pwd", "fg", "bg", "fgpgid", "bgpgid", "pfgpgid"] {
			assert!(match_builtin(name).is_some(), "{} should be a builtin", name);
		}
		assert!(match_builtin("ls").is_none());
		assert!(match_builtin("").is_none());
	}

	#[test]
	fn exit_codes() {
		let mut state = ShellState::detached();
		assert_eq!(builtin_exit(&mut state, &args(&[])), BuiltinResult::Exit(0));
		assert_eq!(builtin_exit(&mut state, &args(&["3"])), BuiltinResult::Exit(3));
		assert_eq!(builtin_exit(&mut state, &args(&["x"])), BuiltinResult::Status(2));
	}

	#[test]
	fn fg_and_bg_without_job_fail() {
		let mut state = ShellState::detached();
		assert_eq!(builtin_fg(&mut state, &[]), BuiltinResult::Status(1));
		assert_eq!(builtin_bg(&mut state, &[]), BuiltinResult::Status(1));
	}
}
