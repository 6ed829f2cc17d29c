/// One of the two cameras of the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraId {
    /// The first (reference) camera.
    First,
    /// The second camera.
    Second,
}

impl CameraId {
    /// One based index of the camera.
    pub fn index(&self) -> usize {
        match self {
            CameraId::First => 1,
            CameraId::Second => 2,
        }
    }
}

impl std::fmt::Display for CameraId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "camera {}", self.index())
    }
}

/// Result of a successful synchronization session.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRecord {
    /// Source of the first camera.
    pub camera1_url: String,
    /// Source of the second camera.
    pub camera2_url: String,
    /// Wall clock time of the flash seen by the first camera, in seconds.
    pub flash1_time: f64,
    /// Wall clock time of the flash seen by the second camera, in seconds.
    pub flash2_time: f64,
    /// `flash2_time - flash1_time`, in seconds.
    pub time_diff: f64,
    /// Relative frame slip in frames per second, positive when camera 2 lags.
    pub drift_rate: Option<f64>,
    /// Local time of the session, `%Y-%m-%d %H:%M:%S`.
    pub date: String,
}

impl SyncRecord {
    /// Build a record from the two flash times.
    pub fn new(
        camera1_url: impl Into<String>,
        camera2_url: impl Into<String>,
        flash1_time: f64,
        flash2_time: f64,
        date: impl Into<String>,
    ) -> Self {
        Self {
            camera1_url: camera1_url.into(),
            camera2_url: camera2_url.into(),
            flash1_time,
            flash2_time,
            time_diff: flash2_time - flash1_time,
            drift_rate: None,
            date: date.into(),
        }
    }

    /// A copy of the record carrying a measured drift rate.
    pub fn with_drift_rate(self, drift_rate: f64) -> Self {
        Self {
            drift_rate: Some(drift_rate),
            ..self
        }
    }

    /// The drift rate, zero when it was never measured.
    pub fn drift_rate_or_zero(&self) -> f64 {
        self.drift_rate.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_time_diff() {
        let record = SyncRecord::new("a", "b", 10.0, 10.15, "2024-01-01 00:00:00");
        assert_relative_eq!(record.time_diff, 0.15, epsilon = 1e-9);
        assert_eq!(record.drift_rate_or_zero(), 0.0);
        let record = record.with_drift_rate(0.4);
        assert_eq!(record.drift_rate, Some(0.4));
        assert_eq!(CameraId::Second.to_string(), "camera 2");
    }
}
