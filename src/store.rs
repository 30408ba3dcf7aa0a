//! Goal and filter stores.
//!
//! Both are flat text files addressed by a path relative to a fixed root
//! (`goals/` and `utils/file_filters/` by default).

use crate::error::{Error, Result};
use crate::file::read_text;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// A goal loaded from the goal store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goal {
    /// Path relative to the goal root, as given by the caller
    pub name: String,
    /// Resolved path on disk
    pub path: PathBuf,
    /// Goal instruction text
    pub text: String,
}

/// Read-only store of goal templates.
#[derive(Debug, Clone)]
pub struct GoalStore {
    root: PathBuf,
}

impl GoalStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a relative goal name to its path under the root.
    #[must_use]
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Returns the resolved path if the goal exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the goal file is missing.
    pub fn locate(&self, name: &str) -> Result<PathBuf> {
        let path = self.resolve(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::not_found("goal file", path))
        }
    }

    /// Loads a goal by its relative name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the goal file is missing, or an IO error
    /// if it cannot be read.
    pub fn load(&self, name: &str) -> Result<Goal> {
        let path = self.locate(name)?;
        let text = read_text(&path)?;

        debug!("Loaded goal {} ({} bytes)", path.display(), text.len());
        Ok(Goal {
            name: name.to_string(),
            path,
            text,
        })
    }

    /// Lists the `.txt` goals under the root, relative and sorted.
    ///
    /// A missing root yields an empty list.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        list_relative(&self.root, |path| {
            path.extension().is_some_and(|ext| ext == "txt")
        })
    }
}

/// How a filter file is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Executable filter run once per file (`.sh` and anything not `.txt`)
    Script,
    /// Glob list read by the built-in flattener (`.txt`)
    Globs,
}

/// A filter selected by name, with its resolved location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRef {
    /// Name relative to the filter root, as given on the command line
    pub name: String,
    /// Resolved path on disk
    pub path: PathBuf,
}

impl FilterRef {
    /// Glob lists are `.txt` files; everything else is a filter script.
    #[must_use]
    pub fn kind(&self) -> FilterKind {
        if self.path.extension().is_some_and(|ext| ext == "txt") {
            FilterKind::Globs
        } else {
            FilterKind::Script
        }
    }
}

/// Read-only store of directory filters.
#[derive(Debug, Clone)]
pub struct FilterStore {
    root: PathBuf,
}

impl FilterStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a filter name, checking that it exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the filter file is missing.
    pub fn resolve(&self, name: &str) -> Result<FilterRef> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(Error::not_found("filter file", path));
        }

        Ok(FilterRef {
            name: name.to_string(),
            path,
        })
    }

    /// Lists all filter files under the root, relative and sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        list_relative(&self.root, |_| true)
    }
}

fn list_relative(root: &Path, keep: impl Fn(&Path) -> bool) -> Vec<String> {
    let mut names: Vec<String> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file() && keep(entry.path()))
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        })
        .collect();

    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_goal_load() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("general/summarize.txt")
            .write_str("summarize in 2 sentences")
            .unwrap();

        let store = GoalStore::new(temp.path());
        let goal = store.load("general/summarize.txt").unwrap();

        assert_eq!(goal.text, "summarize in 2 sentences");
        assert_eq!(goal.name, "general/summarize.txt");
        assert_eq!(goal.path, temp.path().join("general/summarize.txt"));
    }

    #[test]
    fn test_missing_goal_is_not_found() {
        let temp = assert_fs::TempDir::new().unwrap();
        let store = GoalStore::new(temp.path());

        let err = store.load("nope.txt").unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("goal file"));
    }

    #[test]
    fn test_goal_directory_is_not_a_goal() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("general").create_dir_all().unwrap();

        let store = GoalStore::new(temp.path());

        assert!(store.locate("general").unwrap_err().is_not_found());
    }

    #[test]
    fn test_goal_list_only_txt_sorted() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("general/summarize.txt").write_str("a").unwrap();
        temp.child("code/review.txt").write_str("b").unwrap();
        temp.child("code/notes.md").write_str("c").unwrap();

        let store = GoalStore::new(temp.path());

        assert_eq!(
            store.list(),
            vec!["code/review.txt".to_string(), "general/summarize.txt".to_string()]
        );
    }

    #[test]
    fn test_goal_list_missing_root() {
        let store = GoalStore::new("/nonexistent/goals/root");
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_filter_resolve() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("rust_only.txt").write_str("**/*.rs").unwrap();

        let store = FilterStore::new(temp.path());
        let filter = store.resolve("rust_only.txt").unwrap();

        assert_eq!(filter.name, "rust_only.txt");
        assert_eq!(filter.path, temp.path().join("rust_only.txt"));
        assert!(store.resolve("missing.sh").unwrap_err().is_not_found());
    }

    #[test]
    fn test_filter_list() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("has_timestamp.sh").write_str("#!/bin/bash").unwrap();
        temp.child("rust_only.txt").write_str("**/*.rs").unwrap();

        let store = FilterStore::new(temp.path());

        assert_eq!(store.list(), vec!["has_timestamp.sh", "rust_only.txt"]);
    }

    #[test]
    fn test_filter_kind_by_extension() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("has_timestamp.sh").write_str("exit 0").unwrap();
        temp.child("rust_only.txt").write_str("**/*.rs").unwrap();
        let store = FilterStore::new(temp.path());

        assert_eq!(store.resolve("has_timestamp.sh").unwrap().kind(), FilterKind::Script);
        assert_eq!(store.resolve("rust_only.txt").unwrap().kind(), FilterKind::Globs);
    }
}
