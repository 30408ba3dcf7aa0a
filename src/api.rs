//! # Quick API
//!
//! Fluent entry point for the common case: one goal, one file or directory,
//! the OpenAI client configured from the environment.
//!
//! ## Examples
//!
//! ```no_run
//! use engineered_prompts::api::Ask;
//!
//! // Apply a goal to a single file
//! let report = Ask::file("notes.txt")
//!     .goal("general/summarize.txt")
//!     .run()?;
//! println!("{}", report.completion);
//!
//! // Flatten a directory through a filter and use another model
//! Ask::dir("./src")
//!     .goal("code/review.txt")
//!     .filter("rust_only.txt")
//!     .builtin_flattener()
//!     .model("gpt-4o")
//!     .run()?;
//! # Ok::<(), engineered_prompts::Error>(())
//! ```

use crate::{
    BatchRequest, BatchRunner, Config, Error, FlattenerKind, ModelId, OpenAiClient, Result,
    RunReport, flatten,
};
use std::path::PathBuf;

/// Builder for a single batch request.
#[derive(Debug, Clone)]
#[must_use = "call .run() to send the prompt"]
pub struct Ask {
    dir: Option<PathBuf>,
    file: Option<PathBuf>,
    goal: Option<String>,
    filter: Option<String>,
    model: Option<ModelId>,
    template_path: Option<PathBuf>,
    goals_dir: Option<PathBuf>,
    flattener: FlattenerKind,
}

impl Ask {
    fn empty() -> Self {
        Self {
            dir: None,
            file: None,
            goal: None,
            filter: None,
            model: None,
            template_path: None,
            goals_dir: None,
            flattener: FlattenerKind::Script,
        }
    }

    /// Applies the goal to a single file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            ..Self::empty()
        }
    }

    /// Applies the goal to a whole directory, flattened into one input.
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(path.into()),
            ..Self::empty()
        }
    }

    /// Goal name relative to the goal root. Required.
    pub fn goal(mut self, name: impl Into<String>) -> Self {
        self.goal = Some(name.into());
        self
    }

    /// Filter name relative to the filter root. Only valid with [`Ask::dir`].
    pub fn filter(mut self, name: impl Into<String>) -> Self {
        self.filter = Some(name.into());
        self
    }

    /// Model to use instead of the default.
    pub fn model(mut self, model: impl Into<ModelId>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Custom Tera prompt template with `goal` and `body` variables.
    pub fn template(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    /// Goal root, `goals` by default.
    pub fn goals_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.goals_dir = Some(path.into());
        self
    }

    /// Flatten directories in-process instead of through the shell script.
    pub fn builtin_flattener(mut self) -> Self {
        self.flattener = FlattenerKind::Builtin;
        self
    }

    /// Sends the prompt and returns the report.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an incomplete request, and otherwise
    /// any error of [`BatchRunner::run`].
    pub fn run(self) -> Result<RunReport> {
        let (config, request) = self.prepare()?;

        let client = OpenAiClient::from_env(&config)?;
        let runner = BatchRunner::new(&config, client, flatten::from_config(&config))?;
        runner.run(&request)
    }

    fn prepare(self) -> Result<(Config, BatchRequest)> {
        let request = BatchRequest::from_args(self.dir, self.file, self.goal, self.filter)?
            .ok_or_else(|| Error::validation("no file or directory to process"))?;

        let mut builder = Config::builder().flattener(self.flattener);
        if let Some(model) = self.model {
            builder = builder.model(model);
        }
        if let Some(path) = self.template_path {
            builder = builder.template_path(path);
        }
        if let Some(path) = self.goals_dir {
            builder = builder.goals_dir(path);
        }

        Ok((builder.build()?, request))
    }
}
