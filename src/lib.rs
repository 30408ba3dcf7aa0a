//! # engineered-prompts
//!
//! Goal-driven prompts for LLM completion APIs.
//!
//! ## Features
//!
//! - Flat-file goal library (`goals/**/*.txt`)
//! - Single files or whole directories as input, flattened by an external
//!   script or an in-process `.gitignore`-aware walker
//! - Delimited built-in prompt, or a custom Tera template
//! - Blocking OpenAI chat-completions client with typed failures
//! - Interactive goal / input / output form in the terminal
//!
//! ## Quick Start
//!
//! ```no_run
//! use engineered_prompts::{BatchRunner, Config, OpenAiClient, flatten};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .goals_dir("./goals")
//!     .model("gpt-3.5-turbo")
//!     .build()?;
//!
//! let client = OpenAiClient::from_env(&config)?;
//! let runner = BatchRunner::new(&config, client, flatten::from_config(&config))?;
//! let report = runner.process_file(Path::new("notes.txt"), "general/summarize.txt")?;
//! println!("{}", report.completion);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Stores**: resolve goal and filter names under their roots
//! 2. **Flattener**: turns a directory into one input file
//! 3. **Prompt**: wraps goal and input into the prompt text
//! 4. **Client**: one completion call per request
//! 5. **Runner / Shell**: batch and interactive front ends over the above

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod error;
mod file;
mod filter;
mod prompt;
mod runner;
mod store;
mod template_validator;
mod token;
mod writer;

pub mod api;
pub mod flatten;
pub mod shell;

pub use client::{CompletionClient, Credentials, DEFAULT_MODEL, ModelId, OpenAiClient};
pub use config::{Config, ConfigBuilder, FlattenerKind};
pub use error::{Error, Result};
pub use filter::FileFilterConfig;
pub use flatten::{BuiltinFlattener, DirectoryFlattener, ScriptFlattener};
pub use prompt::{PromptTemplate, TEMPLATE_OVERHEAD, build_prompt};
pub use runner::{BatchRequest, BatchRunner, RunReport, Target};
pub use shell::{DEFAULT_GOAL, ShellActions, TerminalShell, Workbench};
pub use store::{FilterKind, FilterRef, FilterStore, Goal, GoalStore};
pub use token::{PromptSize, TokenEstimator, TokenizerKind, context_window};
pub use writer::OutputWriter;

/// Applies a goal to a file or directory with the OpenAI client configured
/// from the environment.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - The input, goal or filter does not exist
/// - Flattening the directory fails
/// - The completion call fails
///
/// # Examples
///
/// ```no_run
/// use engineered_prompts::{BatchRequest, Config, process};
///
/// # fn main() -> anyhow::Result<()> {
/// let request = BatchRequest::from_args(
///     Some("./src".into()),
///     None,
///     Some("code/review.txt".into()),
///     None,
/// )?
/// .expect("a target was given");
///
/// let report = process(&Config::default(), &request)?;
/// println!("{}", report.completion);
/// # Ok(())
/// # }
/// ```
pub fn process(config: &Config, request: &BatchRequest) -> Result<RunReport> {
    let client = OpenAiClient::from_env(config)?;
    BatchRunner::new(config, client, flatten::from_config(config))?.run(request)
}
