use duocam_image::{Image, ImageError};
use duocam_imgproc::color::to_gray_u8;

use crate::flash::FlashDetector;

/// Rate changes below this many frames per second are considered stable.
const STABLE_RATE_CHANGE: f64 = 0.01;

/// Frame counts at one periodic checkpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftReport {
    /// Seconds since both flashes were seen.
    pub elapsed: f64,
    /// Frames delivered by the first camera.
    pub frames1: u64,
    /// Frames delivered by the second camera.
    pub frames2: u64,
    /// `frames1 - frames2`.
    pub diff: i64,
    /// `diff / elapsed`, frames per second.
    pub rate: f64,
}

impl DriftReport {
    fn new(elapsed: f64, frames1: u64, frames2: u64) -> Self {
        let diff = frames1 as i64 - frames2 as i64;
        let rate = if elapsed > 0.0 { diff as f64 / elapsed } else { 0.0 };
        Self {
            elapsed,
            frames1,
            frames2,
            diff,
            rate,
        }
    }
}

/// Final estimate of a monitoring session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftSummary {
    /// Counts at the end of the session.
    pub last: DriftReport,
    /// Drift rate in frames per second, positive when camera 2 lags.
    pub drift_rate: f64,
    /// Change of the rate between the first and the last periodic report.
    pub rate_change: Option<f64>,
}

impl DriftSummary {
    /// Whether the drift rate stayed constant, when it could be assessed.
    pub fn is_stable(&self) -> Option<bool> {
        self.rate_change.map(|c| c.abs() < STABLE_RATE_CHANGE)
    }
}

/// Measures how fast two camera streams slip apart.
///
/// Counting starts once a flash has been seen by both cameras. From then on
/// each delivered frame is counted per camera, except frames read while that
/// camera's flash is still active. A report is produced every
/// `report_interval` seconds.
#[derive(Debug, Clone)]
pub struct DriftMonitor {
    detector1: FlashDetector,
    detector2: FlashDetector,
    flashes1: u32,
    flashes2: u32,
    frames1: u64,
    frames2: u64,
    reset_at: Option<f64>,
    report_interval: f64,
    reports: Vec<DriftReport>,
}

impl DriftMonitor {
    /// Create a monitor.
    ///
    /// # Arguments
    ///
    /// * `detector` - The flash detector applied to both cameras.
    /// * `report_interval` - Seconds between two periodic reports.
    pub fn new(detector: FlashDetector, report_interval: f64) -> Self {
        Self {
            detector1: detector.clone(),
            detector2: detector,
            flashes1: 0,
            flashes2: 0,
            frames1: 0,
            frames2: 0,
            reset_at: None,
            report_interval,
            reports: Vec::new(),
        }
    }

    /// Whether both flashes were seen and frames are being counted.
    pub fn is_counting(&self) -> bool {
        self.reset_at.is_some()
    }

    /// Number of flashes seen by each camera.
    pub fn flash_counts(&self) -> (u32, u32) {
        (self.flashes1, self.flashes2)
    }

    /// The periodic reports produced so far.
    pub fn reports(&self) -> &[DriftReport] {
        &self.reports
    }

    /// Feed a pair of grayscale frames read at `now` seconds.
    ///
    /// Returns a report when a checkpoint was crossed.
    pub fn process_gray_pair(
        &mut self,
        gray1: &Image<u8, 1>,
        gray2: &Image<u8, 1>,
        now: f64,
    ) -> Option<DriftReport> {
        if self.detector1.process_gray(gray1) {
            self.flashes1 += 1;
            log::info!("camera 1: flash #{} at frame {}", self.flashes1, self.frames1);
        }
        if !self.detector1.is_active() {
            self.frames1 += 1;
        }
        if self.detector2.process_gray(gray2) {
            self.flashes2 += 1;
            log::info!("camera 2: flash #{} at frame {}", self.flashes2, self.frames2);
        }
        if !self.detector2.is_active() {
            self.frames2 += 1;
        }

        let reset_at = match self.reset_at {
            Some(t) => t,
            None if self.flashes1 > 0 && self.flashes2 > 0 => {
                log::info!("flash seen on both cameras, counting frames");
                self.frames1 = 0;
                self.frames2 = 0;
                self.reset_at = Some(now);
                now
            }
            None => return None,
        };

        let elapsed = now - reset_at;
        let next = self.report_interval * (self.reports.len() + 1) as f64;
        if self.report_interval > 0.0 && elapsed >= next {
            let report = DriftReport::new(elapsed, self.frames1, self.frames2);
            log::info!(
                "after {:.0}s: camera 1 {} frames, camera 2 {} frames, diff {}, rate {:.2} frames/s",
                elapsed,
                report.frames1,
                report.frames2,
                report.diff,
                report.rate
            );
            self.reports.push(report);
            return Some(report);
        }
        None
    }

    /// Feed a pair of RGB frames read at `now` seconds.
    pub fn process_pair(
        &mut self,
        frame1: &Image<u8, 3>,
        frame2: &Image<u8, 3>,
        now: f64,
    ) -> Result<Option<DriftReport>, ImageError> {
        let gray1 = to_gray_u8(frame1)?;
        let gray2 = to_gray_u8(frame2)?;
        Ok(self.process_gray_pair(&gray1, &gray2, now))
    }

    /// The drift estimate at `now`, if counting started.
    pub fn summary(&self, now: f64) -> Option<DriftSummary> {
        let reset_at = self.reset_at?;
        let last = DriftReport::new(now - reset_at, self.frames1, self.frames2);
        let rate_change = match (self.reports.first(), self.reports.last()) {
            (Some(first), Some(last)) if self.reports.len() > 1 => Some(last.rate - first.rate),
            _ => None,
        };
        Some(DriftSummary {
            last,
            drift_rate: last.rate,
            rate_change,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame(value: u8) -> Image<u8, 1> {
        Image::new([64, 48].into(), vec![value; 64 * 48]).expect("valid size")
    }

    #[test]
    fn test_counts_start_after_both_flashes() {
        let mut monitor = DriftMonitor::new(FlashDetector::default(), 30.0);
        assert!(monitor.process_gray_pair(&frame(10), &frame(10), 0.0).is_none());
        monitor.process_gray_pair(&frame(255), &frame(10), 0.1);
        assert!(!monitor.is_counting());
        monitor.process_gray_pair(&frame(10), &frame(255), 0.2);
        assert!(monitor.is_counting());
        assert_eq!(monitor.flash_counts(), (1, 1));
        assert!(monitor.summary(0.2).is_some());
    }

    #[test]
    fn test_drift_rate_and_stability() {
        let mut monitor = DriftMonitor::new(FlashDetector::default(), 30.0);
        monitor.process_gray_pair(&frame(255), &frame(255), 0.0);

        // camera 2 delivers one frame less every ten frames
        let mut reports = Vec::new();
        for i in 1..=1800u32 {
            let now = i as f64 / 30.0;
            let f2 = if i % 10 == 0 { frame(255) } else { frame(10) };
            if let Some(r) = monitor.process_gray_pair(&frame(10), &f2, now) {
                reports.push(r);
            }
        }
        assert_eq!(reports.len(), 2);

        let summary = monitor.summary(60.0).expect("counting started");
        assert_eq!(summary.last.frames1, 1800);
        assert_eq!(summary.last.frames2, 1620);
        assert_relative_eq!(summary.drift_rate, 3.0, epsilon = 1e-9);
        assert_eq!(summary.is_stable(), Some(true));
    }
}
