use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::sha256_bytes;

    #[test]
    fn sha256_bytes_matches_known_digest() {
        assert_eq!(
            sha256_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
