use crate::config::AppConfig;
use crate::error::WorkerError;

/// A condition the operator should confirm before measuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightWarning {
    /// No usable calibration for the pair, distances use the fallback focal length.
    NotCalibrated,
    /// No usable synchronization record, the streams are assumed in sync.
    NotSynchronized,
}

impl std::fmt::Display for PreflightWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PreflightWarning::NotCalibrated => write!(f, "cameras are not calibrated"),
            PreflightWarning::NotSynchronized => write!(f, "cameras are not synchronized"),
        }
    }
}

/// Check that a measurement session can start.
///
/// # Arguments
///
/// * `config` - The settings snapshot locating the artifacts.
/// * `camera1_url` - The first camera.
/// * `camera2_url` - The second camera.
///
/// # Returns
///
/// The warnings to show the operator. An empty list means the session is
/// ready to start.
///
/// # Errors
///
/// [`WorkerError::InvalidCameraPair`] when a url is empty or both cameras
/// are the same source.
pub fn preflight(
    config: &AppConfig,
    camera1_url: &str,
    camera2_url: &str,
) -> Result<Vec<PreflightWarning>, WorkerError> {
    check_camera_pair(camera1_url, camera2_url)?;

    let mut warnings = Vec::new();
    if config
        .calibration_store()
        .load_or_warn(camera1_url, camera2_url)
        .is_none()
    {
        warnings.push(PreflightWarning::NotCalibrated);
    }
    if config.sync_store().load_or_warn().is_none() {
        warnings.push(PreflightWarning::NotSynchronized);
    }
    for warning in &warnings {
        log::warn!("{warning}");
    }
    Ok(warnings)
}

/// Reject empty or identical camera urls.
pub fn check_camera_pair(camera1_url: &str, camera2_url: &str) -> Result<(), WorkerError> {
    let (url1, url2) = (camera1_url.trim(), camera2_url.trim());
    if url1.is_empty() || url2.is_empty() {
        return Err(WorkerError::InvalidCameraPair("both cameras must be selected".to_string()));
    }
    if url1 == url2 {
        return Err(WorkerError::InvalidCameraPair(format!("{url1} is selected twice")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathsConfig;

    #[test]
    fn test_camera_pair_checks() {
        assert!(check_camera_pair("a", "b").is_ok());
        assert!(matches!(check_camera_pair("", "b"), Err(WorkerError::InvalidCameraPair(_))));
        assert!(matches!(check_camera_pair("a", " a "), Err(WorkerError::InvalidCameraPair(_))));
    }

    #[test]
    fn test_missing_artifacts_are_warnings() -> Result<(), WorkerError> {
        let tmp_dir = tempfile::tempdir().map_err(|e| WorkerError::Config(e.to_string()))?;
        let config = AppConfig::default().with_paths(PathsConfig {
            calibration_file: tmp_dir.path().join("calibration_data.json"),
            sync_file: tmp_dir.path().join("sync_data.json"),
            ..Default::default()
        });
        let warnings = preflight(&config, "cam1", "cam2")?;
        assert_eq!(
            warnings,
            vec![PreflightWarning::NotCalibrated, PreflightWarning::NotSynchronized]
        );

        std::fs::write(tmp_dir.path().join("sync_data.json"), "{ not json")
            .map_err(|e| WorkerError::Config(e.to_string()))?;
        assert!(preflight(&config, "cam1", "cam2")?.contains(&PreflightWarning::NotSynchronized));
        Ok(())
    }
}
