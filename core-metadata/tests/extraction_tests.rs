//! Integration tests for metadata extraction and fingerprinting
//!
//! Audio inputs are generated on the fly as minimal PCM WAV files.

use core_metadata::{
    fingerprint_bytes, fingerprint_file, LoftyExtractor, MetadataError, MetadataExtractor,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Mono 16-bit PCM WAV containing `millis` of silence at 8 kHz.
fn silent_wav(millis: u32) -> Vec<u8> {
    let sample_rate: u32 = 8_000;
    let block_align: u16 = 2;
    let data_len = sample_rate * millis / 1000 * block_align as u32;

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // channels
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    wav
}

#[tokio::test]
async fn test_extract_missing_file() {
    let dir = TempDir::new().unwrap();
    let missing_path = dir.path().join("nonexistent.mp3");

    let extractor = LoftyExtractor::new();
    let result = extractor.extract(&missing_path).await;

    assert!(matches!(result, Err(MetadataError::FileNotFound(_))));
}

#[tokio::test]
async fn test_extract_corrupted_file() {
    let dir = TempDir::new().unwrap();
    let corrupt_path = dir.path().join("corrupt.mp3");
    fs::write(&corrupt_path, b"This is not a valid audio file").unwrap();

    let extractor = LoftyExtractor::new();
    let result = extractor.extract(&corrupt_path).await;

    assert!(result.is_err(), "Should fail for corrupted file");
}

#[tokio::test]
async fn test_extract_empty_file() {
    let dir = TempDir::new().unwrap();
    let empty_path = dir.path().join("empty.flac");
    fs::write(&empty_path, b"").unwrap();

    let result = LoftyExtractor::new().extract(&empty_path).await;
    assert!(result.is_err(), "Should fail for empty file");
}

#[tokio::test]
async fn test_untagged_wav_uses_file_stem() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Morning  Walk.wav");
    fs::write(&path, silent_wav(1_000)).unwrap();

    let metadata = LoftyExtractor::new().extract(&path).await.unwrap();

    assert_eq!(metadata.title, "Morning Walk");
    assert_eq!(metadata.artist, "");
    assert_eq!(metadata.album, "");
    assert!(
        (990..=1_010).contains(&metadata.duration_ms),
        "unexpected duration {}",
        metadata.duration_ms
    );
}

#[tokio::test]
async fn test_extractor_as_trait_object() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clip.wav");
    fs::write(&path, silent_wav(500)).unwrap();

    let extractor: Box<dyn MetadataExtractor> = Box::new(LoftyExtractor::default());
    let metadata = extractor.extract(&path).await.unwrap();
    assert_eq!(metadata.title, "clip");
}

#[tokio::test]
async fn test_fingerprint_matches_in_memory_digest() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.wav");
    let bytes = silent_wav(2_000);
    fs::write(&path, &bytes).unwrap();

    assert_eq!(fingerprint_file(&path).await.unwrap(), fingerprint_bytes(&bytes));
}

#[tokio::test]
async fn test_identical_content_shares_fingerprint() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.wav");
    let b = dir.path().join("copy of a.wav");
    fs::write(&a, silent_wav(300)).unwrap();
    fs::copy(&a, &b).unwrap();

    assert_eq!(
        fingerprint_file(&a).await.unwrap(),
        fingerprint_file(&b).await.unwrap()
    );
}

#[tokio::test]
async fn test_single_byte_change_changes_fingerprint() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.wav");
    let mut bytes = silent_wav(300);
    fs::write(&path, &bytes).unwrap();
    let before = fingerprint_file(&path).await.unwrap();

    let last = bytes.len() - 1;
    bytes[last] = 1;
    fs::write(&path, &bytes).unwrap();

    assert_ne!(before, fingerprint_file(&path).await.unwrap());
}

#[tokio::test]
async fn test_fingerprint_missing_file() {
    let result = fingerprint_file(Path::new("/definitely/not/here.mp3")).await;
    assert!(matches!(result, Err(MetadataError::FileNotFound(_))));
}
