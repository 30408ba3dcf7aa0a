use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for the engineered-prompts library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Bad, missing or conflicting invocation arguments.
    #[error("Invalid arguments: {message}")]
    Validation {
        /// Detailed error message
        message: String,
    },

    /// A goal, filter, input file or directory does not exist.
    #[error("{what} does not exist: {path}")]
    NotFound {
        /// Kind of the missing entity ("goal file", "directory", ...)
        what: &'static str,
        /// Path that was looked up
        path: PathBuf,
    },

    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Invalid UTF-8 encountered in file.
    #[error("Invalid UTF-8 encoding in file '{path}'. File may be binary or use unsupported encoding.")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Template validation or rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name or path
        template: String,
        /// Error message
        message: String,
    },

    /// Credentials are absent or were rejected by the provider.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Error message
        message: String,
    },

    /// Transport-level failure talking to the provider.
    #[error("Network error: {message}")]
    Network {
        /// Error message
        message: String,
    },

    /// The provider throttled the request.
    #[error("Rate limited by provider: {message}")]
    RateLimit {
        /// Error message
        message: String,
    },

    /// The account ran out of quota.
    #[error("Quota exceeded: {message}")]
    Quota {
        /// Error message
        message: String,
    },

    /// Any other non-success HTTP status.
    #[error("Provider returned HTTP {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message extracted from the body
        message: String,
    },

    /// The response did not carry the expected completion field.
    #[error("Malformed completion response: {message}")]
    MalformedResponse {
        /// Error message
        message: String,
    },

    /// The external directory flattening step failed.
    #[error("Directory flattening failed (exit status {}): {stderr}", describe_status(.status))]
    Flatten {
        /// Exit status of the flattening process, if it exited normally
        status: Option<i32>,
        /// Captured standard error, verbatim
        stderr: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// Interactive terminal failure (prompt aborted, no TTY, editor failed).
    #[error("Terminal error: {message}")]
    Terminal {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a not-found error for the given kind of entity.
    #[must_use]
    pub fn not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            what,
            path: path.into(),
        }
    }

    /// Creates an IO error with path context.
    ///
    /// `NotFound` IO errors are reported as [`Error::NotFound`] for files.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::not_found("file", path),
            std::io::ErrorKind::InvalidData => Self::InvalidUtf8 { path },
            _ => Self::Io {
                path,
                message: source.to_string(),
            },
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a malformed response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Creates a terminal error.
    #[must_use]
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Terminal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns true if this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if the error came from the completion provider.
    #[must_use]
    pub const fn is_provider(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. }
                | Self::Network { .. }
                | Self::RateLimit { .. }
                | Self::Quota { .. }
                | Self::Api { .. }
                | Self::MalformedResponse { .. }
        )
    }

    /// Process exit code for this error category.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation { .. } | Self::Config { .. } | Self::Template { .. } => 2,
            Self::NotFound { .. }
            | Self::Io { .. }
            | Self::InvalidUtf8 { .. }
            | Self::Serialization { .. } => 3,
            Self::Authentication { .. } => 4,
            Self::Network { .. } | Self::Api { .. } => 5,
            Self::RateLimit { .. } | Self::Quota { .. } => 6,
            Self::MalformedResponse { .. } => 7,
            Self::Flatten { .. } => 8,
            Self::Terminal { .. } => 1,
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "unknown".to_string(), |code| code.to_string())
}

impl From<tera::Error> for Error {
    fn from(e: tera::Error) -> Self {
        Self::Template {
            template: "unknown".to_string(),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}
