//! Shared helpers for mm-client integration tests

#![allow(dead_code)]

pub mod mock_backend;

use std::path::{Path, PathBuf};

/// Write `len` bytes of fake audio named `name` into `dir`
pub fn write_audio_fixture(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    let mut bytes = b"RIFF".to_vec();
    bytes.resize(len.max(4), 0x55);
    std::fs::write(&path, bytes).expect("write fixture");
    path
}
