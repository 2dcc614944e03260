//! Content fingerprinting
//!
//! A fingerprint is the lowercase hex SHA-256 digest of the whole file. Any
//! byte change, tags included, yields a different fingerprint.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::trace;

use crate::error::{MetadataError, Result};

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Stream the file at `path` through SHA-256.
pub async fn fingerprint_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| MetadataError::from_io(path, e))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        total += read as u64;
    }

    trace!(path = %path.display(), bytes = total, "Fingerprinted file");
    Ok(format!("{:x}", hasher.finalize()))
}

/// Fingerprint of an in-memory buffer, identical to hashing a file with the
/// same contents.
pub fn fingerprint_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
