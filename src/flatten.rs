//! Directory flattening.
//!
//! Batch mode sends a whole directory as one input by first serializing it
//! into a single text file. How the directory is serialized is owned by the
//! [`DirectoryFlattener`] implementation; callers only rely on the output file
//! existing afterwards.

use crate::config::{Config, FlattenerKind};
use crate::error::{Error, Result};
use crate::file::{has_binary_extension, is_likely_binary, read_text};
use crate::filter::{FileFilter, FileFilterConfig};
use crate::store::{FilterKind, FilterRef};
use ignore::WalkBuilder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, trace, warn};

/// Writes a filtered, single-file representation of a directory.
pub trait DirectoryFlattener {
    /// Serializes `source` into `output`, optionally restricted by `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be serialized.
    fn flatten(&self, source: &Path, output: &Path, filter: Option<&FilterRef>) -> Result<()>;
}

impl<T: DirectoryFlattener + ?Sized> DirectoryFlattener for &T {
    fn flatten(&self, source: &Path, output: &Path, filter: Option<&FilterRef>) -> Result<()> {
        (**self).flatten(source, output, filter)
    }
}

impl<T: DirectoryFlattener + ?Sized> DirectoryFlattener for Box<T> {
    fn flatten(&self, source: &Path, output: &Path, filter: Option<&FilterRef>) -> Result<()> {
        (**self).flatten(source, output, filter)
    }
}

/// Creates the flattener selected in the configuration.
#[must_use]
pub fn from_config(config: &Config) -> Box<dyn DirectoryFlattener> {
    match config.flattener {
        FlattenerKind::Script => Box::new(ScriptFlattener::new(&config.serialize_script)),
        FlattenerKind::Builtin => Box::new(BuiltinFlattener::new()),
    }
}

/// Delegates to an external serialization script run through `bash`.
///
/// The script is called as `bash <script> <source> <output> <filter-path>`,
/// with an empty filter path when no filter was selected. Its output format
/// is its own business. Only [`FilterKind::Script`] filters are accepted.
#[derive(Debug, Clone)]
pub struct ScriptFlattener {
    script: PathBuf,
}

impl ScriptFlattener {
    /// Creates a flattener running `script`.
    #[must_use]
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl DirectoryFlattener for ScriptFlattener {
    fn flatten(&self, source: &Path, output: &Path, filter: Option<&FilterRef>) -> Result<()> {
        if !self.script.is_file() {
            return Err(Error::not_found("serialization script", &self.script));
        }

        if let Some(filter) = filter.filter(|f| f.kind() == FilterKind::Globs) {
            return Err(Error::validation(format!(
                "filter {} is a glob list; use it with --flattener builtin",
                filter.name
            )));
        }

        let filter_path = filter.map_or_else(PathBuf::new, |f| f.path.clone());
        info!(
            "Executing: bash {} {} {} {}",
            self.script.display(),
            source.display(),
            output.display(),
            filter_path.display()
        );

        let result = Command::new("bash")
            .arg(&self.script)
            .arg(source)
            .arg(output)
            .arg(&filter_path)
            .output()
            .map_err(|e| Error::io(&self.script, e))?;

        if !result.status.success() {
            return Err(Error::Flatten {
                status: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }

        debug!(
            "Serialization script finished ({} bytes of stdout)",
            result.stdout.len()
        );
        Ok(())
    }
}

/// In-process flattener.
///
/// Walks the directory honouring `.gitignore` and skipping hidden and binary
/// files, applies a [`FilterKind::Globs`] filter (see [`crate::filter`]) and
/// writes every file as a `==> relative/path <==` header followed by its
/// content, in path order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinFlattener;

impl BuiltinFlattener {
    /// Creates the built-in flattener.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn collect(source: &Path, filter: &FileFilter) -> Vec<(String, PathBuf)> {
        let walker = WalkBuilder::new(source)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .require_git(false)
            .hidden(true)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut files = Vec::new();
        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();
            let relative = pathdiff::diff_paths(path, source).unwrap_or_else(|| path.to_path_buf());
            if !filter.should_process(&relative) {
                trace!("Filtered out {}", relative.display());
                continue;
            }

            files.push((relative.to_string_lossy().replace('\\', "/"), path.to_path_buf()));
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }
}

impl DirectoryFlattener for BuiltinFlattener {
    fn flatten(&self, source: &Path, output: &Path, filter: Option<&FilterRef>) -> Result<()> {
        let filter_config = match filter {
            Some(filter) if filter.kind() == FilterKind::Script => {
                return Err(Error::validation(format!(
                    "filter {} is a script; use it with --flattener script",
                    filter.name
                )));
            }
            Some(filter) => FileFilterConfig::from_file(&filter.path)?,
            None => FileFilterConfig::new(),
        };
        let file_filter = FileFilter::new(&filter_config)?;

        let out = File::create(output).map_err(|e| Error::io(output, e))?;
        let mut writer = BufWriter::new(out);
        let mut written = 0usize;

        for (relative, path) in Self::collect(source, &file_filter) {
            if path == output {
                continue;
            }
            if has_binary_extension(&path) || is_likely_binary(&path)? {
                debug!("Skipping binary file: {}", relative);
                continue;
            }

            let content = match read_text(&path) {
                Ok(content) => content,
                Err(e @ Error::InvalidUtf8 { .. }) => {
                    warn!("{}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            write_entry(&mut writer, &relative, &content).map_err(|e| Error::io(output, e))?;
            written += 1;
        }

        writer.flush().map_err(|e| Error::io(output, e))?;

        info!("Flattened {} files from {}", written, source.display());
        Ok(())
    }
}

/// Header line, content, then one blank line.
fn write_entry(writer: &mut impl Write, relative: &str, content: &str) -> std::io::Result<()> {
    writeln!(writer, "==> {relative} <==")?;
    writer.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        writeln!(writer)?;
    }
    writeln!(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn flatten_to_string(source: &Path, filter: Option<&FilterRef>) -> String {
        let out_dir = assert_fs::TempDir::new().unwrap();
        let output = out_dir.child("flat.txt");

        BuiltinFlattener::new()
            .flatten(source, output.path(), filter)
            .unwrap();

        std::fs::read_to_string(output.path()).unwrap()
    }

    #[test]
    fn test_builtin_flattens_in_path_order() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("b.txt").write_str("second\n").unwrap();
        temp.child("a/notes.md").write_str("first").unwrap();

        let flat = flatten_to_string(temp.path(), None);

        assert_eq!(flat, "==> a/notes.md <==\nfirst\n\n==> b.txt <==\nsecond\n\n");
    }

    #[test]
    fn test_builtin_skips_binary_and_hidden() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("keep.txt").write_str("text").unwrap();
        temp.child("image.png").write_binary(&[0x89, 0x50, 0x4e, 0x47]).unwrap();
        temp.child("blob.dat").write_binary(&[0u8; 64]).unwrap();
        temp.child(".secret").write_str("hidden").unwrap();

        let flat = flatten_to_string(temp.path(), None);

        assert!(flat.contains("==> keep.txt <=="));
        assert!(!flat.contains("image.png"));
        assert!(!flat.contains("blob.dat"));
        assert!(!flat.contains(".secret"));
    }

    #[test]
    fn test_builtin_applies_filter_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/lib.rs").write_str("pub fn a() {}").unwrap();
        temp.child("src/gen.rs").write_str("// generated").unwrap();
        temp.child("README.md").write_str("# readme").unwrap();

        let filters = assert_fs::TempDir::new().unwrap();
        let filter_file = filters.child("rust_only.txt");
        filter_file.write_str("**/*.rs\n!**/gen.rs\n").unwrap();
        let filter = FilterRef {
            name: "rust_only.txt".to_string(),
            path: filter_file.path().to_path_buf(),
        };

        let flat = flatten_to_string(temp.path(), Some(&filter));

        assert!(flat.contains("==> src/lib.rs <=="));
        assert!(!flat.contains("gen.rs"));
        assert!(!flat.contains("README.md"));
    }

    #[test]
    fn test_script_missing_is_not_found() {
        let temp = assert_fs::TempDir::new().unwrap();
        let flattener = ScriptFlattener::new(temp.path().join("serialize_dir.sh"));

        let err = flattener
            .flatten(temp.path(), &temp.path().join("out.txt"), None)
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[cfg(unix)]
    #[test]
    fn test_script_receives_arguments() {
        let temp = assert_fs::TempDir::new().unwrap();
        let script = temp.child("serialize_dir.sh");
        script
            .write_str("printf '%s|%s' \"$1\" \"$3\" > \"$2\"\n")
            .unwrap();
        let output = temp.child("out.txt");
        let filters = temp.child("custom_filters");
        let filter = FilterRef {
            name: "has_timestamp.sh".to_string(),
            path: filters.path().join("has_timestamp.sh"),
        };

        ScriptFlattener::new(script.path())
            .flatten(Path::new("/some/dir"), output.path(), Some(&filter))
            .unwrap();

        let recorded = std::fs::read_to_string(output.path()).unwrap();
        assert_eq!(
            recorded,
            format!("/some/dir|{}", filters.path().join("has_timestamp.sh").display())
        );
    }

    #[test]
    fn test_script_rejects_glob_filter() {
        let temp = assert_fs::TempDir::new().unwrap();
        let script = temp.child("serialize_dir.sh");
        script.write_str("exit 0\n").unwrap();
        let filter = FilterRef {
            name: "rust_only.txt".to_string(),
            path: temp.path().join("rust_only.txt"),
        };

        let err = ScriptFlattener::new(script.path())
            .flatten(temp.path(), &temp.path().join("out.txt"), Some(&filter))
            .unwrap_err();

        assert!(err.is_validation());
        assert!(err.to_string().contains("--flattener builtin"));
    }

    #[test]
    fn test_builtin_rejects_script_filter() {
        let source = assert_fs::TempDir::new().unwrap();
        source.child("a.txt").write_str("a").unwrap();
        let filters = assert_fs::TempDir::new().unwrap();
        let filter_file = filters.child("has_timestamp.sh");
        filter_file.write_str("grep -q 2024 \"$1\"\n").unwrap();
        let filter = FilterRef {
            name: "has_timestamp.sh".to_string(),
            path: filter_file.path().to_path_buf(),
        };

        let err = BuiltinFlattener::new()
            .flatten(source.path(), &filters.path().join("out.txt"), Some(&filter))
            .unwrap_err();

        assert!(err.is_validation());
    }

    #[test]
    fn test_builtin_keeps_non_ascii_text() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("notes_ru.txt")
            .write_str("Привет, мир. Это заметка на русском языке.\n")
            .unwrap();
        temp.child("notes_ja.txt").write_str("こんにちは世界。\n").unwrap();

        let flat = flatten_to_string(temp.path(), None);

        assert!(flat.contains("==> notes_ja.txt <==\nこんにちは世界。\n"));
        assert!(flat.contains("==> notes_ru.txt <==\nПривет, мир."));
    }

    #[cfg(unix)]
    #[test]
    fn test_script_failure_propagates_stderr() {
        let temp = assert_fs::TempDir::new().unwrap();
        let script = temp.child("serialize_dir.sh");
        script.write_str("echo 'no such filter' >&2\nexit 3\n").unwrap();

        let err = ScriptFlattener::new(script.path())
            .flatten(temp.path(), &temp.path().join("out.txt"), None)
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Flatten { status: Some(3), ref stderr } if stderr == "no such filter\n"
        ));
    }

    #[test]
    fn test_from_config_selects_kind() {
        let config = Config::builder()
            .flattener(FlattenerKind::Builtin)
            .build()
            .unwrap();
        let source = assert_fs::TempDir::new().unwrap();
        source.child("only.txt").write_str("x").unwrap();
        let out_dir = assert_fs::TempDir::new().unwrap();
        let output = out_dir.child("flat.txt");

        from_config(&config)
            .flatten(source.path(), output.path(), None)
            .unwrap();

        assert!(std::fs::read_to_string(output.path()).unwrap().contains("==> only.txt <=="));
    }

    #[cfg(unix)]
    mod shipped_script {
        use super::*;
        use assert_fs::prelude::*;

        fn shipped() -> ScriptFlattener {
            ScriptFlattener::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("utils/serialize_dir.sh"))
        }

        fn script_filter(dir: &assert_fs::TempDir, name: &str, body: &str) -> FilterRef {
            let file = dir.child(name);
            file.write_str(body).unwrap();
            FilterRef {
                name: name.to_string(),
                path: file.path().to_path_buf(),
            }
        }

        #[test]
        fn test_filter_from_custom_directory_is_applied() {
            let source = assert_fs::TempDir::new().unwrap();
            source.child("dated.txt").write_str("released 2024-05-01").unwrap();
            source.child("plain.txt").write_str("no date here").unwrap();
            let filters = assert_fs::TempDir::new().unwrap();
            let filter = script_filter(
                &filters,
                "has_timestamp.sh",
                "grep -Eq '[0-9]{4}-[0-9]{2}-[0-9]{2}' \"$1\"\n",
            );
            let output = filters.child("flat.txt");

            shipped()
                .flatten(source.path(), output.path(), Some(&filter))
                .unwrap();

            let flat = std::fs::read_to_string(output.path()).unwrap();
            assert!(flat.contains("==> dated.txt <=="));
            assert!(!flat.contains("plain.txt"));
        }

        #[test]
        fn test_unrunnable_filter_fails_the_run() {
            let source = assert_fs::TempDir::new().unwrap();
            source.child("a.txt").write_str("a").unwrap();
            let filters = assert_fs::TempDir::new().unwrap();
            let filter = script_filter(&filters, "broken.sh", "no_such_command_here \"$1\"\n");

            let err = shipped()
                .flatten(source.path(), &filters.path().join("flat.txt"), Some(&filter))
                .unwrap_err();

            assert!(matches!(
                err,
                Error::Flatten { status: Some(2), ref stderr } if stderr.contains("could not be executed")
            ));
        }
    }
}
