use std::path::{Path, PathBuf};

use duocam_sync::SyncRecord;
use serde::{Deserialize, Serialize};

use crate::error::IoError;
use crate::json::{read_json_value, write_json_atomic};

#[derive(Serialize, Deserialize)]
struct CameraFlash {
    url: String,
    flash_time: f64,
}

#[derive(Serialize, Deserialize)]
struct SyncFile {
    camera1: CameraFlash,
    camera2: CameraFlash,
    time_diff: f64,
    #[serde(default)]
    date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    drift_rate: Option<f64>,
}

/// Reads and writes the synchronization artifact.
#[derive(Debug, Clone)]
pub struct SyncStore {
    path: PathBuf,
}

impl SyncStore {
    /// A store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The artifact file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the artifact file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write a record, replacing any previous one.
    pub fn save(&self, record: &SyncRecord) -> Result<(), IoError> {
        let file = SyncFile {
            camera1: CameraFlash {
                url: record.camera1_url.clone(),
                flash_time: record.flash1_time,
            },
            camera2: CameraFlash {
                url: record.camera2_url.clone(),
                flash_time: record.flash2_time,
            },
            time_diff: record.time_diff,
            date: record.date.clone(),
            drift_rate: record.drift_rate,
        };
        write_json_atomic(&self.path, &file)?;
        log::info!("sync record saved to {}", self.path.display());
        Ok(())
    }

    /// Read the record, `None` when the file does not exist.
    pub fn load(&self) -> Result<Option<SyncRecord>, IoError> {
        let Some(value) = read_json_value(&self.path)? else {
            return Ok(None);
        };
        let file: SyncFile = serde_json::from_value(value).map_err(|e| IoError::malformed(&self.path, e))?;
        Ok(Some(SyncRecord {
            camera1_url: file.camera1.url,
            camera2_url: file.camera2.url,
            flash1_time: file.camera1.flash_time,
            flash2_time: file.camera2.flash_time,
            time_diff: file.time_diff,
            drift_rate: file.drift_rate,
            date: file.date,
        }))
    }

    /// Read the record, logging and discarding any error.
    pub fn load_or_warn(&self) -> Option<SyncRecord> {
        match self.load() {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                log::info!("no sync record at {}, assuming synchronized cameras", self.path.display());
                None
            }
            Err(e) => {
                log::warn!("ignoring sync record: {e}");
                None
            }
        }
    }

    /// Store a measured drift rate in the existing record.
    ///
    /// Returns the updated record, or `None` when there is no record to update.
    pub fn merge_drift_rate(&self, drift_rate: f64) -> Result<Option<SyncRecord>, IoError> {
        let Some(record) = self.load()? else {
            return Ok(None);
        };
        let record = record.with_drift_rate(drift_rate);
        self.save(&record)?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sync_file_shape() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let store = SyncStore::new(tmp_dir.path().join("sync_data.json"));
        store.save(&SyncRecord::new("cam-a", "cam-b", 10.0, 10.15, "2024-05-01 12:00:00"))?;

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(store.path())?)?;
        assert_eq!(value["camera1"]["url"], "cam-a");
        assert_eq!(value["camera2"]["flash_time"], 10.15);
        assert!(value.get("drift_rate").is_none());
        assert_relative_eq!(value["time_diff"].as_f64().unwrap_or(0.0), 0.15, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_file_without_drift_rate() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("sync_data.json");
        std::fs::write(
            &path,
            r#"{"camera1": {"url": "a", "flash_time": 1.5}, "camera2": {"url": "b", "flash_time": 1.25}, "time_diff": -0.25}"#,
        )?;
        let store = SyncStore::new(&path);
        let record = store.load()?.expect("record");
        assert_eq!(record.time_diff, -0.25);
        assert_eq!(record.drift_rate_or_zero(), 0.0);

        let merged = store.merge_drift_rate(0.4)?.expect("record");
        assert_eq!(merged.drift_rate, Some(0.4));
        assert_eq!(store.load()?.expect("record").drift_rate, Some(0.4));
        Ok(())
    }

    #[test]
    fn test_malformed_sync_file() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("sync_data.json");
        std::fs::write(&path, r#"{"camera1": {"url": "a"}}"#)?;
        let store = SyncStore::new(&path);
        assert!(matches!(store.load(), Err(IoError::MalformedArtifact { .. })));
        assert!(store.load_or_warn().is_none());
        assert!(store.merge_drift_rate(0.1).is_err());
        Ok(())
    }
}
