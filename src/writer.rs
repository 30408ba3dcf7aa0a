use crate::error::{Error, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Writes completions and goal files to disk with atomic operations.
#[derive(Debug, Clone, Copy)]
pub struct OutputWriter {
    backup_existing: bool,
}

impl OutputWriter {
    /// Creates a new writer.
    #[must_use]
    pub const fn new(backup_existing: bool) -> Self {
        Self { backup_existing }
    }

    /// Writes `content` to `path`, creating parent directories as needed.
    ///
    /// # Process
    ///
    /// 1. Creates a backup if the file exists and backups are enabled
    /// 2. Writes content to a temporary file in the same directory and syncs it
    /// 3. Atomically renames the temporary file to the target path
    ///
    /// The temporary file is removed if any step fails.
    ///
    /// # Errors
    ///
    /// Returns an error if any file operation fails.
    pub fn write(&self, path: &Path, content: &str) -> Result<PathBuf> {
        let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
                parent
            }
            None => Path::new("."),
        };

        if path.exists() && self.backup_existing {
            Self::backup_file(path)?;
        }

        let mut temp_file = NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;

        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| Error::io(temp_file.path(), e))?;

        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| Error::io(temp_file.path(), e))?;

        temp_file
            .persist(path)
            .map_err(|e| Error::io(path, e.error))?;

        info!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(path.to_path_buf())
    }

    /// Creates a timestamped backup of an existing file.
    fn backup_file(path: &Path) -> Result<()> {
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_err(|e| Error::config(format!("System clock before UNIX epoch: {e}")))?
            .as_nanos();

        let filename = path
            .file_name()
            .ok_or_else(|| Error::validation(format!("Invalid file path: {}", path.display())))?
            .to_string_lossy();

        let backup_path = path.with_file_name(format!("{filename}.backup.{timestamp}"));

        fs::copy(path, &backup_path).map_err(|e| Error::io(&backup_path, e))?;

        debug!("Created backup: {}", backup_path.display());
        Ok(())
    }
}
