use crate::{
    client::{CompletionClient, ModelId},
    config::Config,
    error::{Error, Result},
    file::read_text,
    flatten::DirectoryFlattener,
    prompt::PromptTemplate,
    store::{FilterStore, GoalStore},
    token::{PromptSize, TokenEstimator},
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

/// What a batch invocation processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A single text file
    File(PathBuf),
    /// A directory, flattened into one input, optionally restricted by a filter
    Dir {
        /// Directory to flatten
        path: PathBuf,
        /// Filter name relative to the filter root
        filter: Option<String>,
    },
}

/// A validated batch invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    /// Input to process
    pub target: Target,
    /// Goal name relative to the goal root
    pub goal: String,
}

impl BatchRequest {
    /// Validates the raw command-line selection.
    ///
    /// Returns `Ok(None)` when neither a directory nor a file is given, which
    /// means interactive mode. No file system access happens here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if:
    /// - Both `dir` and `file` are given
    /// - A target is given without a goal
    /// - A filter is given with `file` or without `dir`
    pub fn from_args(
        dir: Option<PathBuf>,
        file: Option<PathBuf>,
        goal: Option<String>,
        filter: Option<String>,
    ) -> Result<Option<Self>> {
        let filter = filter.filter(|f| !f.is_empty());
        let goal = goal.filter(|g| !g.is_empty());

        let target = match (dir, file) {
            (Some(_), Some(_)) => {
                return Err(Error::validation(
                    "--dir and --file are mutually exclusive",
                ));
            }
            (Some(path), None) => Target::Dir { path, filter },
            (None, Some(path)) => {
                if filter.is_some() {
                    return Err(Error::validation("--filter can only be used with --dir"));
                }
                Target::File(path)
            }
            (None, None) => {
                if filter.is_some() {
                    return Err(Error::validation("--filter requires --dir"));
                }
                return Ok(None);
            }
        };

        let goal = goal.ok_or_else(|| {
            Error::validation("--goal is required when processing a file or directory")
        })?;

        Ok(Some(Self { target, goal }))
    }
}

/// Outcome of one batch operation.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// File or directory that was processed
    pub source: PathBuf,

    /// Goal name as requested
    pub goal: String,

    /// Text returned by the model
    pub completion: String,

    /// Estimated prompt size
    pub prompt_size: PromptSize,

    /// Wall time including the remote call
    pub duration: Duration,
}

/// Runs goals against files and directories.
pub struct BatchRunner<C, F> {
    goals: GoalStore,
    filters: FilterStore,
    template: PromptTemplate,
    tokenizer: Arc<dyn TokenEstimator>,
    model: ModelId,
    client: C,
    flattener: F,
}

impl<C: CompletionClient, F: DirectoryFlattener> BatchRunner<C, F> {
    /// Creates a runner from a configuration and its two collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the custom prompt
    /// template cannot be loaded.
    pub fn new(config: &Config, client: C, flattener: F) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            goals: GoalStore::new(&config.goals_dir),
            filters: FilterStore::new(&config.filters_dir),
            template: PromptTemplate::load(config.template_path.as_deref())?,
            tokenizer: config.tokenizer.create(),
            model: config.model.clone(),
            client,
            flattener,
        })
    }

    /// Goal store used to resolve goal names.
    #[must_use]
    pub fn goals(&self) -> &GoalStore {
        &self.goals
    }

    /// Filter store used to resolve filter names.
    #[must_use]
    pub fn filters(&self) -> &FilterStore {
        &self.filters
    }

    /// Executes a validated request.
    ///
    /// # Errors
    ///
    /// See [`Self::process_file`] and [`Self::process_directory`].
    pub fn run(&self, request: &BatchRequest) -> Result<RunReport> {
        match request.target {
            Target::File(ref path) => self.process_file(path, &request.goal),
            Target::Dir {
                ref path,
                ref filter,
            } => self.process_directory(path, &request.goal, filter.as_deref()),
        }
    }

    /// Applies a goal to a single file with one completion call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for a missing input or goal file (no call
    /// is made in that case), an IO error if the input cannot be read, or the
    /// client's error.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn process_file(&self, path: &Path, goal: &str) -> Result<RunReport> {
        let start = Instant::now();

        if !path.is_file() {
            return Err(Error::not_found("input file", path));
        }
        let goal_text = self.goals.load(goal)?.text;
        let body = read_text(path)?;

        let (completion, prompt_size) = self.complete(&goal_text, &body)?;

        Ok(RunReport {
            source: path.to_path_buf(),
            goal: goal.to_string(),
            completion,
            prompt_size,
            duration: start.elapsed(),
        })
    }

    /// Flattens a directory into a temporary file and applies a goal to it.
    ///
    /// The temporary file is removed afterwards, also when flattening or the
    /// completion fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for a missing directory, goal or filter,
    /// the flattener's error, or any error of [`Self::process_file`].
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub fn process_directory(
        &self,
        dir: &Path,
        goal: &str,
        filter: Option<&str>,
    ) -> Result<RunReport> {
        let start = Instant::now();

        if !dir.is_dir() {
            return Err(Error::not_found("directory", dir));
        }
        self.goals.locate(goal)?;
        let filter = filter
            .filter(|f| !f.is_empty())
            .map(|name| self.filters.resolve(name))
            .transpose()?;

        let flattened = NamedTempFile::new()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        debug!("Flattening into {}", flattened.path().display());

        let result = self
            .flattener
            .flatten(dir, flattened.path(), filter.as_ref())
            .and_then(|()| {
                if std::fs::metadata(flattened.path()).is_ok_and(|m| m.len() == 0) {
                    warn!("Flattening {} produced no content", dir.display());
                }
                self.process_file(flattened.path(), goal)
            });

        let temp_path = flattened.path().to_path_buf();
        if let Err(e) = flattened.close() {
            warn!("Failed to remove {}: {}", temp_path.display(), e);
        }

        let mut report = result?;
        report.source = dir.to_path_buf();
        report.duration = start.elapsed();
        Ok(report)
    }

    fn complete(&self, goal: &str, body: &str) -> Result<(String, PromptSize)> {
        let prompt = self.template.render(goal, body)?;
        let size = PromptSize::measure(self.tokenizer.as_ref(), goal, body, &prompt);
        debug!(
            "Prompt built: {} bytes, ~{} tokens (goal ~{}, input ~{})",
            prompt.len(),
            size.total,
            size.goal,
            size.body
        );
        if let Some(window) = size.exceeded_window(&self.model) {
            warn!(
                "Prompt is ~{} tokens but {} accepts {}; the provider will likely reject it",
                size.total, self.model, window
            );
        }

        info!("Sending prompt to the model");
        let completion = self.client.complete(&prompt)?;
        info!("Received completion ({} bytes)", completion.len());

        Ok((completion, size))
    }
}
