//! Flat upload directory
//!
//! Every file lives directly under one directory, keyed by its original name.
//! Names are checked before any filesystem access.

use crate::error::ShareError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};

/// Longest accepted filename, in bytes
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Reject names that could escape the upload directory.
///
/// Path separators and the parent-directory token are refused outright rather
/// than stripped, so a caller never reads or writes a file it did not name.
pub fn validate_file_name(file_name: &str) -> Result<&str, ShareError> {
    let invalid = file_name.is_empty()
        || file_name == "."
        || file_name.contains("..")
        || file_name.contains(['/', '\\'])
        || file_name.chars().any(char::is_control);

    if invalid {
        return Err(ShareError::InvalidInput("Invalid filename".to_string()));
    }

    if file_name.len() > MAX_FILENAME_LENGTH {
        return Err(ShareError::InvalidInput(format!(
            "Filename too long ({} bytes, max {})",
            file_name.len(),
            MAX_FILENAME_LENGTH
        )));
    }

    Ok(file_name)
}

/// Handle on the upload directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: Arc<PathBuf>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if it does not exist yet
    pub async fn ensure_dir(&self) -> Result<(), ShareError> {
        tokio::fs::create_dir_all(self.root.as_path())
            .await
            .map_err(|e| ShareError::Storage(format!("Cannot create upload dir: {}", e)))
    }

    fn path_for(&self, file_name: &str) -> Result<PathBuf, ShareError> {
        Ok(self.root.join(validate_file_name(file_name)?))
    }

    /// Names of all regular files, sorted
    pub async fn list(&self) -> Result<Vec<String>, ShareError> {
        let mut entries = tokio::fs::read_dir(self.root.as_path())
            .await
            .map_err(|e| ShareError::Storage(format!("Error reading files: {}", e)))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ShareError::Storage(format!("Error reading files: {}", e)))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::debug!("Skipping non UTF-8 filename {:?}", raw),
            }
        }

        names.sort();
        Ok(names)
    }

    /// Open a stored file for reading, returning it with its size
    pub async fn open(&self, file_name: &str) -> Result<(File, u64), ShareError> {
        let path = self.path_for(file_name)?;

        let not_found = || ShareError::NotFound("File not found".to_string());
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(not_found()),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(ShareError::storage(e)),
        };

        let file = File::open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => not_found(),
            _ => ShareError::storage(e),
        })?;

        Ok((file, metadata.len()))
    }

    /// Create (or truncate) a file for an incoming upload.
    /// An existing file with the same name is overwritten.
    pub async fn create(&self, file_name: &str) -> Result<File, ShareError> {
        let path = self.path_for(file_name)?;
        self.ensure_dir().await?;
        open_secure_file(&path)
            .await
            .map_err(|e| ShareError::Storage(format!("Cannot create file: {}", e)))
    }

    /// Remove a partially written file after a failed upload
    pub async fn discard(&self, file_name: &str) {
        let Ok(path) = self.path_for(file_name) else {
            return;
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("Could not remove partial file {:?}: {}", path, e);
            }
        }
    }
}

/// Open a file for writing with owner-only permissions (0o600 on Unix)
pub async fn open_secure_file(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    options.open(path).await
}
