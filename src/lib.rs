//! Job-control execution engine of an interactive shell: parses a tokenized
//! line into a pipeline, launches it as one process group, and tracks the
//! result as a foreground or background job.

pub mod builtin;
pub mod config;
pub mod error;
pub mod eval;
pub mod global;
pub mod job;
pub mod launch;
pub mod parser;
pub mod pipe;
pub mod search;
pub mod terminal;
pub mod tokenizer;
pub mod types;

pub use eval::{execute_line, ExecutionReport};
pub use global::ShellState;
