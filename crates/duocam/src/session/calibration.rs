use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use duocam_calib::{CalibError, CalibrationSettings, GeometryCalibrator, SampleOutcome};
use duocam_imgproc::color::to_gray_u8;
use duocam_io::{CalibrationStore, SourceOpener};

use crate::cameras::CameraPair;
use crate::config::AppConfig;
use crate::error::WorkerError;
use crate::preflight::check_camera_pair;
use crate::stop::StopToken;
use crate::worker::{EventSender, Worker};

/// What a finished calibration produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSummary {
    /// Reprojection rms of the stereo optimization in pixels.
    pub rms: f64,
    /// Horizontal focal length of the first camera in pixels.
    pub focal_length_px: f64,
    /// Length of the stereo translation, in chessboard units.
    pub baseline: f64,
    /// Where the calibration was written.
    pub path: PathBuf,
}

/// A chessboard calibration session.
///
/// Frames are read in lockstep from both cameras; every accepted sample is
/// followed by a pause so the board can be moved. The calibration is written
/// only once all samples were collected and the solve succeeded, a stopped or
/// failed session leaves the store untouched.
pub struct CalibrationJob {
    /// The first camera.
    pub camera1_url: String,
    /// The second camera.
    pub camera2_url: String,
    /// The board and sample count.
    pub settings: CalibrationSettings,
    /// Pause after an accepted sample.
    pub sample_delay: Duration,
    /// Destination of the calibration.
    pub store: CalibrationStore,
    /// Opens the cameras.
    pub opener: Arc<dyn SourceOpener>,
}

impl CalibrationJob {
    /// A session configured from a settings snapshot.
    pub fn from_config(
        config: &AppConfig,
        camera1_url: impl Into<String>,
        camera2_url: impl Into<String>,
        opener: Arc<dyn SourceOpener>,
    ) -> Result<Self, WorkerError> {
        Ok(Self {
            camera1_url: camera1_url.into(),
            camera2_url: camera2_url.into(),
            settings: config.calibration_settings()?,
            sample_delay: config.sample_delay(),
            store: config.calibration_store(),
            opener,
        })
    }

    /// Run the session on a background worker.
    pub fn spawn(self) -> Result<Worker<SampleOutcome, CalibrationSummary>, WorkerError> {
        Worker::spawn("calibration", move |stop, events| self.run(stop, events))
    }

    /// Run the session on the current thread.
    ///
    /// Every frame pair offered to the calibrator is sent as an update.
    pub fn run(
        self,
        stop: &StopToken,
        events: &EventSender<SampleOutcome, CalibrationSummary>,
    ) -> Result<CalibrationSummary, WorkerError> {
        check_camera_pair(&self.camera1_url, &self.camera2_url)?;
        events.status(format!("opening {} and {}", self.camera1_url, self.camera2_url));
        let mut cameras = CameraPair::open(self.opener.as_ref(), &self.camera1_url, &self.camera2_url)?;

        let mut calibrator = GeometryCalibrator::new(self.settings);
        let required = calibrator.required();
        events.progress(0.0);
        events.status(format!("show the chessboard to both cameras, {required} samples needed"));

        while !calibrator.is_complete() {
            if stop.is_stopped() {
                events.status("calibration stopped");
                break;
            }
            let Some((frame1, frame2)) = cameras.try_read()? else {
                events.status("camera stream ended");
                break;
            };

            let outcome = calibrator.add_sample(&to_gray_u8(&frame1)?, &to_gray_u8(&frame2)?)?;
            let accepted = matches!(outcome, SampleOutcome::Accepted { .. });
            events.update(outcome);
            if !accepted {
                continue;
            }

            events.progress(calibrator.progress());
            events.status(format!("sample {}/{required} captured", calibrator.collected()));
            if !calibrator.is_complete() && stop.wait(self.sample_delay) {
                events.status("calibration stopped");
                break;
            }
        }
        drop(cameras);

        if !calibrator.is_complete() {
            return Err(CalibError::InsufficientCalibrationData {
                collected: calibrator.collected(),
                required,
            }
            .into());
        }

        events.status("computing the calibration");
        let calib = calibrator.calibrate(&self.camera1_url, &self.camera2_url, &crate::timestamp())?;
        self.store.save(&calib)?;
        events.progress(1.0);
        events.status(format!(
            "calibration saved to {} (rms {:.3} px)",
            self.store.path().display(),
            calib.rms
        ));

        let t = calib.stereo.translation;
        Ok(CalibrationSummary {
            rms: calib.rms,
            focal_length_px: calib.camera1.focal_length_px(),
            baseline: (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt(),
            path: self.store.path().to_path_buf(),
        })
    }
}
