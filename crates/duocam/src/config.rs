use std::path::{Path, PathBuf};
use std::time::Duration;

use duocam_calib::chessboard::SubPixParams;
use duocam_calib::{CalibError, CalibrationSettings, PatternSize};
use duocam_io::{CalibrationStore, SyncStore};
use duocam_stereo::BucketLimits;
use duocam_sync::SyncSettings;
use serde::{Deserialize, Serialize};

use crate::error::WorkerError;

/// Chessboard calibration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Inner corners per chessboard row.
    pub chessboard_cols: usize,
    /// Inner corners per chessboard column.
    pub chessboard_rows: usize,
    /// Edge length of a square, in the unit of the baseline.
    pub square_size: f64,
    /// Number of sample pairs to collect.
    pub num_samples: usize,
    /// Pause after an accepted sample to let the operator move the board.
    pub sample_delay_ms: u64,
    /// Side of the sub-pixel refinement window, odd.
    pub subpix_window: usize,
    /// Maximum iterations of the sub-pixel refinement.
    pub subpix_max_iters: usize,
    /// Convergence threshold of the sub-pixel refinement, in pixels.
    pub subpix_eps: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            chessboard_cols: 9,
            chessboard_rows: 6,
            square_size: 2.5,
            num_samples: 15,
            sample_delay_ms: 1000,
            subpix_window: 11,
            subpix_max_iters: 30,
            subpix_eps: 0.001,
        }
    }
}

/// Flash synchronization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Gray level a pixel must exceed to count as bright.
    pub flash_threshold: u8,
    /// Number of bright pixels a flash must exceed.
    pub min_pixels: usize,
    /// Seconds to wait for both flashes.
    pub max_wait_time: f64,
    /// Pause between two polls of the cameras.
    pub poll_interval_ms: u64,
    /// Seconds between two drift reports.
    pub drift_report_interval: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flash_threshold: 220,
            min_pixels: 1000,
            max_wait_time: 30.0,
            poll_interval_ms: 10,
            drift_report_interval: 30.0,
        }
    }
}

/// Distance estimation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    /// Distance between the optical centers, in centimeters.
    pub baseline_cm: f64,
    /// Focal length used without calibration, in pixels.
    pub fallback_focal_px: f64,
    /// Distances below this are near.
    pub near_cm: f64,
    /// Distances at or above this are far.
    pub far_cm: f64,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            baseline_cm: 10.0,
            fallback_focal_px: duocam_stereo::matcher::DEFAULT_FALLBACK_FOCAL_PX,
            near_cm: 200.0,
            far_cm: 500.0,
        }
    }
}

/// Object detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Detections below this confidence are dropped.
    pub confidence_threshold: f32,
    /// Minimum overlap for a detection to keep its track.
    pub iou_threshold: f32,
    /// Recorded detections replayed for the first camera.
    pub detections1: Option<PathBuf>,
    /// Recorded detections replayed for the second camera.
    pub detections2: Option<PathBuf>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            detections1: None,
            detections2: None,
        }
    }
}

/// Locations of the artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// The calibration artifact.
    pub calibration_file: PathBuf,
    /// The synchronization artifact.
    pub sync_file: PathBuf,
    /// The camera source list.
    pub camera_list: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            calibration_file: "calibration_data.json".into(),
            sync_file: "sync_data.json".into(),
            camera_list: "cameras.txt".into(),
        }
    }
}

/// A snapshot of the application settings.
///
/// Sessions receive their own copy; changing a setting produces a new
/// snapshot through the `with_*` methods.
///
/// # Example
///
/// ```
/// use duocam::config::{AppConfig, DistanceConfig};
///
/// let config = AppConfig::default().with_distance(DistanceConfig {
///     baseline_cm: 12.0,
///     ..Default::default()
/// });
/// assert_eq!(config.distance.baseline_cm, 12.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Chessboard calibration.
    pub calibration: CalibrationConfig,
    /// Flash synchronization.
    pub sync: SyncConfig,
    /// Distance estimation.
    pub distance: DistanceConfig,
    /// Object detection.
    pub detection: DetectionConfig,
    /// Artifact locations.
    pub paths: PathsConfig,
}

impl AppConfig {
    /// Read the settings, `None` when the file does not exist.
    ///
    /// Missing keys take their default value.
    pub fn try_load(path: impl AsRef<Path>) -> Result<Option<Self>, WorkerError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path).map_err(|e| WorkerError::Config(e.to_string()))?;
        let config = serde_json::from_str(&text)
            .map_err(|e| WorkerError::Config(format!("{}: {e}", path.display())))?;
        Ok(Some(config))
    }

    /// Read the settings, falling back to the defaults on any problem.
    pub fn load(path: impl AsRef<Path>) -> Self {
        match Self::try_load(path) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                log::warn!("using default settings: {e}");
                Self::default()
            }
        }
    }

    /// Write the settings as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), WorkerError> {
        let text = serde_json::to_string_pretty(self).map_err(|e| WorkerError::Config(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| WorkerError::Config(e.to_string()))
    }

    /// A copy with new calibration settings.
    pub fn with_calibration(self, calibration: CalibrationConfig) -> Self {
        Self { calibration, ..self }
    }

    /// A copy with new synchronization settings.
    pub fn with_sync(self, sync: SyncConfig) -> Self {
        Self { sync, ..self }
    }

    /// A copy with new distance settings.
    pub fn with_distance(self, distance: DistanceConfig) -> Self {
        Self { distance, ..self }
    }

    /// A copy with new detection settings.
    pub fn with_detection(self, detection: DetectionConfig) -> Self {
        Self { detection, ..self }
    }

    /// A copy with new artifact locations.
    pub fn with_paths(self, paths: PathsConfig) -> Self {
        Self { paths, ..self }
    }

    /// Settings of a calibration session.
    pub fn calibration_settings(&self) -> Result<CalibrationSettings, CalibError> {
        let c = &self.calibration;
        let pattern = PatternSize::new(c.chessboard_cols, c.chessboard_rows)?;
        let mut settings = CalibrationSettings::new(pattern, c.square_size, c.num_samples);
        settings.subpix = SubPixParams {
            half_window: c.subpix_window / 2,
            max_iters: c.subpix_max_iters,
            eps: c.subpix_eps,
        };
        Ok(settings)
    }

    /// Pause after an accepted calibration sample.
    pub fn sample_delay(&self) -> Duration {
        Duration::from_millis(self.calibration.sample_delay_ms)
    }

    /// Settings of a synchronization session.
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            flash_threshold: self.sync.flash_threshold,
            min_pixels: self.sync.min_pixels,
            max_wait: self.sync.max_wait_time,
            poll_interval: Duration::from_millis(self.sync.poll_interval_ms),
        }
    }

    /// Limits of the distance buckets.
    pub fn bucket_limits(&self) -> BucketLimits {
        BucketLimits {
            near_cm: self.distance.near_cm,
            far_cm: self.distance.far_cm,
        }
    }

    /// The calibration artifact store.
    pub fn calibration_store(&self) -> CalibrationStore {
        CalibrationStore::new(&self.paths.calibration_file)
    }

    /// The synchronization artifact store.
    pub fn sync_store(&self) -> SyncStore {
        SyncStore::new(&self.paths.sync_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_file() -> Result<(), WorkerError> {
        let tmp_dir = tempfile::tempdir().map_err(|e| WorkerError::Config(e.to_string()))?;
        let path = tmp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{"distance": {"baseline_cm": 12.5}, "sync": {"max_wait_time": 5}}"#)
            .map_err(|e| WorkerError::Config(e.to_string()))?;

        let config = AppConfig::load(&path);
        assert_eq!(config.distance.baseline_cm, 12.5);
        assert_eq!(config.distance.fallback_focal_px, 800.0);
        assert_eq!(config.sync_settings().max_wait, 5.0);
        assert_eq!(config.calibration.num_samples, 15);
        Ok(())
    }

    #[test]
    fn test_malformed_settings_fall_back() -> Result<(), WorkerError> {
        let tmp_dir = tempfile::tempdir().map_err(|e| WorkerError::Config(e.to_string()))?;
        let path = tmp_dir.path().join("settings.json");
        std::fs::write(&path, "{ broken").map_err(|e| WorkerError::Config(e.to_string()))?;
        assert!(AppConfig::try_load(&path).is_err());
        assert_eq!(AppConfig::load(&path), AppConfig::default());
        assert_eq!(AppConfig::load(tmp_dir.path().join("missing.json")), AppConfig::default());
        Ok(())
    }

    #[test]
    fn test_save_and_reload() -> Result<(), WorkerError> {
        let tmp_dir = tempfile::tempdir().map_err(|e| WorkerError::Config(e.to_string()))?;
        let path = tmp_dir.path().join("settings.json");
        let config = AppConfig::default().with_calibration(CalibrationConfig {
            chessboard_cols: 7,
            subpix_window: 9,
            ..Default::default()
        });
        config.save(&path)?;
        let back = AppConfig::load(&path);
        assert_eq!(back, config);

        let settings = back.calibration_settings()?;
        assert_eq!(settings.pattern.cols, 7);
        assert_eq!(settings.subpix.half_window, 4);
        Ok(())
    }
}
