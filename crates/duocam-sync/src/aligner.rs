use crate::record::{CameraId, SyncRecord};

/// Frames to discard from one camera before reading the next pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSkip {
    /// The lagging camera.
    pub camera: CameraId,
    /// Number of frames to read and discard.
    pub count: u64,
}

/// Keeps two live streams aligned by skipping frames on the lagging camera.
///
/// The drift rate measured at sync time is projected forward: after
/// `elapsed` seconds, `floor(|drift_rate| * elapsed)` frames should have been
/// skipped in total. A positive rate means camera 2 lags and is skipped, a
/// negative rate skips camera 1. The correction is open loop, the rate is
/// never re-measured.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAligner {
    drift_rate: f64,
    skipped: u64,
}

impl FrameAligner {
    /// Create an aligner for a drift rate in frames per second.
    pub fn new(drift_rate: f64) -> Self {
        let drift_rate = if drift_rate.is_finite() {
            drift_rate
        } else {
            log::warn!("ignoring non finite drift rate {drift_rate}");
            0.0
        };
        Self {
            drift_rate,
            skipped: 0,
        }
    }

    /// Create an aligner from an optional sync record.
    ///
    /// A missing record or drift rate means the streams are assumed in sync.
    pub fn from_record(record: Option<&SyncRecord>) -> Self {
        Self::new(record.map(SyncRecord::drift_rate_or_zero).unwrap_or(0.0))
    }

    /// The drift rate in frames per second.
    pub fn drift_rate(&self) -> f64 {
        self.drift_rate
    }

    /// The camera falling behind, if any.
    pub fn lagging_camera(&self) -> Option<CameraId> {
        if self.drift_rate > 0.0 {
            Some(CameraId::Second)
        } else if self.drift_rate < 0.0 {
            Some(CameraId::First)
        } else {
            None
        }
    }

    /// Total frames skipped this session.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Frames to skip now, given the seconds elapsed since the session start.
    ///
    /// Only the increase over the frames already skipped is returned.
    pub fn frames_to_skip(&mut self, elapsed: f64) -> Option<FrameSkip> {
        let camera = self.lagging_camera()?;
        let target = (self.drift_rate.abs() * elapsed.max(0.0)).floor() as u64;
        if target <= self.skipped {
            return None;
        }
        let count = target - self.skipped;
        self.skipped = target;
        log::debug!("skipping {count} frames on {camera}");
        Some(FrameSkip { camera, count })
    }

    /// Forget the frames skipped so far, for a new session.
    pub fn reset(&mut self) {
        self.skipped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_only_the_increase() {
        let mut aligner = FrameAligner::new(0.5);
        assert_eq!(aligner.lagging_camera(), Some(CameraId::Second));
        assert_eq!(aligner.frames_to_skip(1.0), None);
        assert_eq!(
            aligner.frames_to_skip(2.1),
            Some(FrameSkip {
                camera: CameraId::Second,
                count: 1
            })
        );
        assert_eq!(aligner.frames_to_skip(2.5), None);
        assert_eq!(
            aligner.frames_to_skip(7.0),
            Some(FrameSkip {
                camera: CameraId::Second,
                count: 2
            })
        );
        assert_eq!(aligner.skipped(), 3);
    }

    #[test]
    fn test_negative_rate_skips_first_camera() {
        let mut aligner = FrameAligner::new(-2.0);
        assert_eq!(
            aligner.frames_to_skip(1.0),
            Some(FrameSkip {
                camera: CameraId::First,
                count: 2
            })
        );
    }

    #[test]
    fn test_no_record_means_in_sync() {
        let mut aligner = FrameAligner::from_record(None);
        assert_eq!(aligner.lagging_camera(), None);
        assert_eq!(aligner.frames_to_skip(1000.0), None);

        let record = SyncRecord::new("a", "b", 1.0, 1.1, "2024-01-01 00:00:00");
        assert_eq!(FrameAligner::from_record(Some(&record)).drift_rate(), 0.0);
        assert_eq!(FrameAligner::new(f64::NAN).drift_rate(), 0.0);
    }
}
