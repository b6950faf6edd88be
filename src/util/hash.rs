//! Hashing for environment fingerprints and package checksums.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// SHA256 of a file, hex encoded.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buffer)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Incremental fingerprint over labelled fields.
///
/// Every field is written as `label\0value\0`, lists additionally carry their
/// length, so `["a b"]` and `["a", "b"]` never collide.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    /// Start an empty fingerprint.
    pub fn new() -> Self {
        Fingerprint::default()
    }

    /// Add a single labelled value.
    pub fn field(&mut self, label: &str, value: &str) -> &mut Self {
        self.hasher.update(label.as_bytes());
        self.hasher.update(b"\0");
        self.hasher.update(value.as_bytes());
        self.hasher.update(b"\0");
        self
    }

    /// Add a labelled list of values.
    pub fn list<'a>(
        &mut self,
        label: &str,
        values: impl IntoIterator<Item = &'a str>,
    ) -> &mut Self {
        let values: Vec<&str> = values.into_iter().collect();
        self.field(label, &values.len().to_string());
        for value in values {
            self.hasher.update(value.as_bytes());
            self.hasher.update(b"\0");
        }
        self
    }

    /// Finalize as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    /// Finalize as the first 16 hex characters.
    pub fn finish_short(self) -> String {
        self.finish()[..16].to_string()
    }
}
