use core_library::LibraryError;
use core_metadata::MetadataError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Cannot scan {}: {message}", .path.display())]
    FatalScan { path: PathBuf, message: String },

    #[error("Sync already in progress (run {run_id})")]
    AlreadyRunning { run_id: String },

    #[error("Catalog error: {0}")]
    Library(#[from] LibraryError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Unsupported file name (not valid UTF-8): {}", .path.display())]
    UnsupportedPath { path: PathBuf },

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("No Tokio runtime available: {0}")]
    NoRuntime(String),

    #[error("Sync task failed: {0}")]
    TaskFailed(String),
}

impl SyncError {
    /// Errors confined to a single file; the run skips the file and continues.
    pub fn is_file_level(&self) -> bool {
        matches!(
            self,
            SyncError::Metadata(_)
                | SyncError::UnsupportedPath { .. }
                | SyncError::Library(LibraryError::Duplicate { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_level_classification() {
        let metadata = SyncError::from(MetadataError::CorruptedFile("a.mp3".to_string()));
        let duplicate = SyncError::from(LibraryError::Duplicate {
            entity_type: "Track path".to_string(),
            value: "/music/a.mp3".to_string(),
        });
        let odd = SyncError::UnsupportedPath {
            path: PathBuf::from("/music/a.mp3"),
        };
        assert!(metadata.is_file_level());
        assert!(duplicate.is_file_level());
        assert!(odd.is_file_level());

        let store = SyncError::from(LibraryError::Migration("locked".to_string()));
        let root = SyncError::FatalScan {
            path: PathBuf::from("/missing"),
            message: "not found".to_string(),
        };
        assert!(!store.is_file_level());
        assert!(!root.is_file_level());
    }
}
