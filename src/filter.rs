//! Glob-based file selection for the built-in directory flattener.
//!
//! A filter file holds one glob per line. Blank lines and lines starting with
//! `#` are ignored, `!pattern` excludes matching files. When no include
//! pattern is given every file is included.

use crate::error::{Error, Result};
use crate::file::read_text;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Include/exclude glob patterns for directory flattening.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilterConfig {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl FileFilterConfig {
    /// Creates a new empty configuration, which includes everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the include whitelist.
    #[must_use]
    pub fn allow_only(mut self, patterns: Vec<String>) -> Self {
        self.include = patterns;
        self
    }

    /// Sets the exclude blacklist.
    #[must_use]
    pub fn exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }

    /// Parses filter-file text.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.strip_prefix('!') {
                Some(pattern) => config.exclude.push(pattern.trim().to_string()),
                None => config.include.push(line.to_string()),
            }
        }

        config
    }

    /// Reads and parses a filter file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::parse(&read_text(path)?))
    }
}

/// Compiled form of a [`FileFilterConfig`], matched against paths relative
/// to the flattened directory.
#[derive(Debug, Clone)]
pub(crate) struct FileFilter {
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl FileFilter {
    /// Compiles the configured patterns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid glob.
    pub(crate) fn new(config: &FileFilterConfig) -> Result<Self> {
        let include = if config.include.is_empty() {
            None
        } else {
            Some(Self::build_globset(&config.include)?)
        };

        Ok(Self {
            include,
            exclude: Self::build_globset(&config.exclude)?,
        })
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                Error::config(format!("Invalid glob pattern '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))
    }

    /// Returns true if the file at `relative` should be flattened.
    pub(crate) fn should_process(&self, relative: &Path) -> bool {
        if let Some(ref include) = self.include {
            if !include.is_match(relative) {
                return false;
            }
        }

        if self.exclude.is_match(relative) {
            return false;
        }

        // Excluding a directory excludes everything below it
        !relative
            .ancestors()
            .skip(1)
            .filter(|a| !a.as_os_str().is_empty())
            .any(|ancestor| self.exclude.is_match(ancestor))
    }
}
