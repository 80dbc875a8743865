use clap::Parser;

pub const DEFAULT_PROMPT: &str = "jobsh> ";

/// A job-control shell.
#[derive(Debug, Parser)]
#[command(name = "jobsh", version)]
pub struct Config {
	/// Run a single command line and exit with its status.
	#[arg(short = 'c', long = "command", value_name = "LINE")]
	pub command: Option<String>,

	/// Prompt shown before each line when reading from a terminal.
	#[arg(long, env = "JOBSH_PROMPT", default_value = DEFAULT_PROMPT)]
	pub prompt: String,

	/// Log launch, wait and terminal handoff details.
	#[arg(short, long)]
	pub verbose: bool,
}

impl Config {
	/// Default `env_logger` filter when `RUST_LOG` is unset.
	pub fn log_filter(&self) -> &'static str {
		if self.verbose { "debug" } else { "warn" }
	}
}
