use std::path::PathBuf;

/// One stage of a pipeline: the argument vector plus its file redirections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
	pub argv: Vec<String>,
	pub input: Option<PathBuf>,
	pub output: Option<PathBuf>,
}

impl CommandSpec {
	pub fn name(&self) -> Option<&str> {
		self.argv.first().map(String::as_str)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec {
	pub commands: Vec<CommandSpec>,
	pub is_background: bool,
}
