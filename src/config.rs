use crate::client::ModelId;
use crate::error::{Error, Result};
use crate::token::TokenizerKind;
use std::path::PathBuf;

const DEFAULT_GOALS_DIR: &str = "goals";
const DEFAULT_FILTERS_DIR: &str = "utils/file_filters";
const DEFAULT_SERIALIZE_SCRIPT: &str = "utils/serialize_dir.sh";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const MAX_TEMPERATURE: f32 = 2.0;

/// Strategy used to turn a directory into a single input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlattenerKind {
    /// Run the external serialization shell script
    #[default]
    Script,
    /// Walk the directory in-process
    Builtin,
}

/// Configuration for goal resolution, prompt building and the completion client.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root directory holding goal files
    pub goals_dir: PathBuf,

    /// Root directory holding filter files
    pub filters_dir: PathBuf,

    /// Script used by [`FlattenerKind::Script`]
    pub serialize_script: PathBuf,

    /// Directory flattening strategy
    pub flattener: FlattenerKind,

    /// Model identifier sent to the provider
    pub model: ModelId,

    /// Sampling temperature
    pub temperature: f32,

    /// Base URL of the chat-completions API
    pub api_base: String,

    /// Path to a custom Tera prompt template
    pub template_path: Option<PathBuf>,

    /// Estimator used for prompt size checks
    pub tokenizer: TokenizerKind,

    /// Back up existing output files before overwriting them
    pub backup_existing: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use engineered_prompts::Config;
    ///
    /// let config = Config::builder()
    ///     .goals_dir("./goals")
    ///     .model("gpt-4o")
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// Goal and filter roots are not required to exist here; missing goals
    /// are reported when they are resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The model identifier is empty
    /// - Temperature is outside `[0, 2]`
    /// - The API base is not an http(s) URL
    /// - The custom template is invalid
    pub fn validate(&self) -> Result<()> {
        if self.model.as_str().trim().is_empty() {
            return Err(Error::config("model identifier must not be empty"));
        }

        if !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(Error::config(format!(
                "temperature ({}) must be between 0 and {MAX_TEMPERATURE}",
                self.temperature
            )));
        }

        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(Error::config(format!(
                "API base must be an http(s) URL: {}",
                self.api_base
            )));
        }

        if let Some(ref template_path) = self.template_path {
            crate::template_validator::validate(template_path)?;
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            goals_dir: PathBuf::from(DEFAULT_GOALS_DIR),
            filters_dir: PathBuf::from(DEFAULT_FILTERS_DIR),
            serialize_script: PathBuf::from(DEFAULT_SERIALIZE_SCRIPT),
            flattener: FlattenerKind::Script,
            model: ModelId::default(),
            temperature: 0.0,
            api_base: DEFAULT_API_BASE.to_string(),
            template_path: None,
            tokenizer: TokenizerKind::Chars,
            backup_existing: true,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    goals_dir: Option<PathBuf>,
    filters_dir: Option<PathBuf>,
    serialize_script: Option<PathBuf>,
    flattener: Option<FlattenerKind>,
    model: Option<ModelId>,
    temperature: Option<f32>,
    api_base: Option<String>,
    template_path: Option<PathBuf>,
    tokenizer: Option<TokenizerKind>,
    backup_existing: Option<bool>,
}

impl ConfigBuilder {
    /// Sets the root directory for goal files.
    #[must_use]
    pub fn goals_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.goals_dir = Some(path.into());
        self
    }

    /// Sets the root directory for filter files.
    #[must_use]
    pub fn filters_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.filters_dir = Some(path.into());
        self
    }

    /// Sets the directory serialization script.
    #[must_use]
    pub fn serialize_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.serialize_script = Some(path.into());
        self
    }

    /// Sets the directory flattening strategy.
    #[must_use]
    pub fn flattener(mut self, kind: FlattenerKind) -> Self {
        self.flattener = Some(kind);
        self
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<ModelId>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the chat-completions API base URL.
    #[must_use]
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = Some(url.into());
        self
    }

    /// Sets the path to a custom Tera prompt template.
    ///
    /// The template receives `goal` and `body` and replaces the built-in
    /// delimited prompt.
    #[must_use]
    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    /// Sets the tokenizer implementation.
    #[must_use]
    pub fn tokenizer(mut self, kind: TokenizerKind) -> Self {
        self.tokenizer = Some(kind);
        self
    }

    /// Enables or disables backup creation.
    #[must_use]
    pub fn backup_existing(mut self, enabled: bool) -> Self {
        self.backup_existing = Some(enabled);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            goals_dir: self
                .goals_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_GOALS_DIR)),
            filters_dir: self
                .filters_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FILTERS_DIR)),
            serialize_script: self
                .serialize_script
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SERIALIZE_SCRIPT)),
            flattener: self.flattener.unwrap_or_default(),
            model: self.model.unwrap_or_default(),
            temperature: self.temperature.unwrap_or(0.0),
            api_base: self
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            template_path: self.template_path,
            tokenizer: self.tokenizer.unwrap_or(TokenizerKind::Chars),
            backup_existing: self.backup_existing.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_default_config() {
        let config = Config::builder().build().unwrap();

        assert_eq!(config.goals_dir, PathBuf::from("goals"));
        assert_eq!(config.filters_dir, PathBuf::from("utils/file_filters"));
        assert_eq!(config.model.as_str(), "gpt-3.5-turbo");
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.flattener, FlattenerKind::Script);
    }

    #[test]
    fn test_empty_model_rejected() {
        let result = Config::builder().model("  ").build();

        assert!(result.unwrap_err().is_config());
    }

    #[test]
    fn test_temperature_out_of_range() {
        assert!(Config::builder().temperature(-0.1).build().is_err());
        assert!(Config::builder().temperature(2.5).build().is_err());
        assert!(Config::builder().temperature(1.0).build().is_ok());
    }

    #[test]
    fn test_invalid_api_base() {
        let result = Config::builder().api_base("api.openai.com").build();

        assert!(result.is_err());
    }

    #[test]
    fn test_missing_template_rejected() {
        let result = Config::builder()
            .template_path("/nonexistent/prompt.tera")
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_valid_template_accepted() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template = temp.child("prompt.tera");
        template
            .write_str("Goal: {{ goal }}\n---\n{{ body }}")
            .unwrap();

        let config = Config::builder()
            .template_path(template.path())
            .build()
            .unwrap();

        assert_eq!(config.template_path.as_deref(), Some(template.path()));
    }
}
