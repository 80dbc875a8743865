use std::env;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const PATH_KEY: &str = "PATH";

fn is_runnable(path: &Path) -> bool {
	match fs::metadata(path) {
		Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
		Err(_) => false,
	}
}

/// Resolves `program` against the current `PATH`.
pub fn resolve(program: &str) -> Option<PathBuf> {
	resolve_in(program, env::var_os(PATH_KEY).as_deref())
}

/// The literal path wins when it names a runnable file; otherwise each entry
/// of `path_var` is tried in order.
pub fn resolve_in(program: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
	if program.is_empty() {
		return None;
	}
	let literal = Path::new(program);
	if is_runnable(literal) {
		return Some(literal.to_path_buf());
	}
	let path_var = path_var?;
	env::split_paths(path_var)
		.map(|dir| dir.join(program))
		.find(|candidate| is_runnable(candidate))
}
