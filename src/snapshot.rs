//! Snapshot persistence
//!
//! Each harvested network is written as one JSON document. Files are written
//! to a temporary sibling and renamed into place, so readers only ever see a
//! complete snapshot and an interrupted run keeps the previous one.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::info;

use crate::errors::HarvesterError;
use crate::models::{HarvestResult, ManifestEntry};

/// Writes snapshots, raw source tables and the network manifest
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    output_dir: PathBuf,
    manifest_path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl Into<PathBuf>, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            manifest_path: manifest_path.into(),
        }
    }

    pub fn snapshot_path(&self, safe_name: &str) -> PathBuf {
        self.output_dir.join(format!("{safe_name}.json"))
    }

    pub fn raw_path(&self, safe_name: &str) -> PathBuf {
        self.output_dir.join(format!("{safe_name}.txt"))
    }

    /// Write the snapshot of one network, replacing any previous one
    pub async fn write_snapshot(
        &self,
        safe_name: &str,
        result: &HarvestResult,
    ) -> Result<PathBuf, HarvesterError> {
        let path = self.snapshot_path(safe_name);
        write_json(&path, result).await?;
        info!(
            "Parsed {} mount points saved to {}",
            result.streams.len(),
            path.display()
        );
        Ok(path)
    }

    /// Keep the source table as received
    pub async fn write_raw(&self, safe_name: &str, raw: &str) -> Result<PathBuf, HarvesterError> {
        let path = self.raw_path(safe_name);
        write_atomic(&path, raw.as_bytes()).await?;
        info!("Raw data file has been saved as {}", path.display());
        Ok(path)
    }

    pub async fn write_manifest(&self, entries: &[ManifestEntry]) -> Result<(), HarvesterError> {
        write_json(&self.manifest_path, entries).await?;
        info!(
            "Wrote {} successfully processed networks to {}",
            entries.len(),
            self.manifest_path.display()
        );
        Ok(())
    }
}

/// Load a previously written snapshot
pub async fn read_snapshot(path: &Path) -> Result<HarvestResult, HarvesterError> {
    let data = fs::read(path).await?;
    Ok(serde_json::from_slice(&data)?)
}

/// File name stem for a network: lowercase ASCII alphanumerics, every other
/// run of characters collapsed to one `-`.
pub fn safe_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), HarvesterError> {
    let data = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &data).await
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), HarvesterError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, data)
        .await
        .map_err(|e| HarvesterError::SnapshotWriteError {
            path: tmp.display().to_string(),
            origin: e.to_string(),
        })?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| HarvesterError::SnapshotWriteError {
            path: path.display().to_string(),
            origin: e.to_string(),
        })?;
    Ok(())
}
