//! # Folder Scanner
//!
//! Enumerates the audio files under a root directory.
//!
//! The scanner is lazy and restartable: every call to [`FolderScanner::iter`]
//! starts a fresh walk. Symlinks are followed by default; loops and unreadable
//! entries surface as per-path [`ScanError`] items and never end the walk. Only
//! a bad root is fatal, and that is reported by [`FolderScanner::new`] before
//! any entry is produced.

use crate::error::{Result, SyncError};
use core_runtime::config::ScanConfig;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A single entry that could not be visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

impl std::error::Error for ScanError {}

/// Everything one walk produced.
#[derive(Debug, Default, Clone)]
pub struct ScanResult {
    pub files: Vec<PathBuf>,
    pub errors: Vec<ScanError>,
}

#[derive(Debug, Clone)]
pub struct FolderScanner {
    root: PathBuf,
    config: ScanConfig,
}

impl FolderScanner {
    /// Create a scanner for `root`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::FatalScan`] if the root does not exist, is not a
    /// directory, or cannot be listed.
    pub fn new(root: impl Into<PathBuf>, config: ScanConfig) -> Result<Self> {
        let root = root.into();
        let fatal = |message: String| SyncError::FatalScan {
            path: root.clone(),
            message,
        };

        let metadata = std::fs::metadata(&root).map_err(|e| fatal(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(fatal("not a directory".to_string()));
        }
        std::fs::read_dir(&root).map_err(|e| fatal(e.to_string()))?;

        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a new walk over the root.
    pub fn iter(&self) -> ScanIter {
        let walker = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .into_iter();

        ScanIter {
            root: self.root.clone(),
            config: self.config.clone(),
            walker,
        }
    }

    /// Walk the whole tree, splitting audio files from entry errors.
    pub fn scan(&self) -> ScanResult {
        let mut result = ScanResult::default();
        for item in self.iter() {
            match item {
                Ok(path) => result.files.push(path),
                Err(err) => {
                    warn!(path = %err.path.display(), "Skipping unreadable entry: {}", err.message);
                    result.errors.push(err);
                }
            }
        }

        debug!(
            root = %self.root.display(),
            files = result.files.len(),
            errors = result.errors.len(),
            "Scan finished"
        );
        result
    }
}

impl<'a> IntoIterator for &'a FolderScanner {
    type Item = std::result::Result<PathBuf, ScanError>;
    type IntoIter = ScanIter;

    fn into_iter(self) -> ScanIter {
        self.iter()
    }
}

/// Lazy walk over one root.
pub struct ScanIter {
    root: PathBuf,
    config: ScanConfig,
    walker: walkdir::IntoIter,
}

impl Iterator for ScanIter {
    type Item = std::result::Result<PathBuf, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.walker.next()? {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.config.accepts(entry.path()) {
                        return Some(Ok(entry.into_path()));
                    }
                }
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    let message = if err.loop_ancestor().is_some() {
                        "symlink loop".to_string()
                    } else {
                        err.to_string()
                    };
                    return Some(Err(ScanError { path, message }));
                }
            }
        }
    }
}
