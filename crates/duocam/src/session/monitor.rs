use std::sync::Arc;

use duocam_io::{SourceOpener, SyncStore};
use duocam_sync::{Clock, DriftMonitor, DriftReport, DriftSummary, FlashDetector, SystemClock};

use crate::cameras::CameraPair;
use crate::config::AppConfig;
use crate::error::WorkerError;
use crate::preflight::check_camera_pair;
use crate::stop::StopToken;
use crate::worker::{EventSender, Worker};

/// A frame divergence measurement.
///
/// Counting starts once both cameras saw a flash and runs until the session
/// is stopped, a stream ends or `duration` elapsed. The final drift rate is
/// merged into the stored sync record when `store` is set.
pub struct MonitorJob {
    /// The first camera.
    pub camera1_url: String,
    /// The second camera.
    pub camera2_url: String,
    /// Flash detection used to start counting.
    pub detector: FlashDetector,
    /// Seconds between periodic reports.
    pub report_interval: f64,
    /// Stop after this many seconds, or run until stopped.
    pub duration: Option<f64>,
    /// Sync record receiving the drift rate.
    pub store: Option<SyncStore>,
    /// Opens the cameras.
    pub opener: Arc<dyn SourceOpener>,
    /// Timestamps the frames.
    pub clock: Box<dyn Clock>,
}

impl MonitorJob {
    /// A session configured from a settings snapshot, timed by the system clock.
    pub fn from_config(
        config: &AppConfig,
        camera1_url: impl Into<String>,
        camera2_url: impl Into<String>,
        opener: Arc<dyn SourceOpener>,
    ) -> Self {
        Self {
            camera1_url: camera1_url.into(),
            camera2_url: camera2_url.into(),
            detector: FlashDetector::new(config.sync.flash_threshold, config.sync.min_pixels),
            report_interval: config.sync.drift_report_interval,
            duration: None,
            store: Some(config.sync_store()),
            opener,
            clock: Box::new(SystemClock),
        }
    }

    /// Stop after `seconds`.
    pub fn with_duration(self, seconds: f64) -> Self {
        Self {
            duration: Some(seconds),
            ..self
        }
    }

    /// Replace the clock.
    pub fn with_clock(self, clock: Box<dyn Clock>) -> Self {
        Self { clock, ..self }
    }

    /// Run the session on a background worker.
    pub fn spawn(self) -> Result<Worker<DriftReport, DriftSummary>, WorkerError> {
        Worker::spawn("drift-monitor", move |stop, events| self.run(stop, events))
    }

    /// Run the session on the current thread.
    ///
    /// Every periodic report is sent as an update.
    pub fn run(
        self,
        stop: &StopToken,
        events: &EventSender<DriftReport, DriftSummary>,
    ) -> Result<DriftSummary, WorkerError> {
        check_camera_pair(&self.camera1_url, &self.camera2_url)?;
        let mut cameras = CameraPair::open(self.opener.as_ref(), &self.camera1_url, &self.camera2_url)?;

        let mut monitor = DriftMonitor::new(self.detector, self.report_interval);
        let start = self.clock.now();
        let mut now = start;
        events.status("waiting for a flash on both cameras");

        while !stop.is_stopped() {
            let Some((frame1, frame2)) = cameras.try_read()? else {
                events.status("camera stream ended");
                break;
            };
            now = self.clock.now();
            let was_counting = monitor.is_counting();
            if let Some(report) = monitor.process_pair(&frame1, &frame2, now)? {
                events.status(format!(
                    "after {:.0}s: diff {} frames, rate {:.2} frames/s",
                    report.elapsed, report.diff, report.rate
                ));
                events.update(report);
            }
            if !was_counting && monitor.is_counting() {
                events.status("flash seen on both cameras, counting frames");
            }
            if self.duration.is_some_and(|d| now - start >= d) {
                break;
            }
        }
        drop(cameras);

        let summary = monitor.summary(now).ok_or(WorkerError::NoDriftEstimate)?;
        let stability = match summary.is_stable() {
            Some(true) => ", stable",
            Some(false) => ", unstable",
            None => "",
        };
        events.status(format!(
            "drift rate {:.3} frames/s over {:.1}s{stability}",
            summary.drift_rate, summary.last.elapsed
        ));

        if let Some(store) = &self.store {
            match store.merge_drift_rate(summary.drift_rate)? {
                Some(_) => events.status(format!("drift rate saved to {}", store.path().display())),
                None => log::warn!("no sync record at {}, drift rate not saved", store.path().display()),
            }
        }
        Ok(summary)
    }
}
