use std::sync::Arc;

use duocam_calib::RectifyMaps;
use duocam_image::{Image, ImageSize};
use duocam_imgproc::interpolation::remap_u8;
use duocam_io::{FpsCounter, LoadedCalibration, SourceOpener};
use duocam_stereo::{
    BoxAnnotator, Detector, FrameResult, IouTracker, MeasurementPipeline, StereoMatcher,
};
use duocam_sync::{CameraId, Clock, FrameAligner, SyncRecord, SystemClock};

use crate::cameras::CameraPair;
use crate::config::AppConfig;
use crate::error::WorkerError;
use crate::preflight::check_camera_pair;
use crate::stop::StopToken;
use crate::worker::{EventSender, Worker};

/// Undistorts and rectifies the frames of both cameras.
///
/// Each camera keeps its own maps, regenerated whenever its frame resolution
/// differs from the one they were built for.
pub struct Undistorter {
    calibration: LoadedCalibration,
    maps: [Option<RectifyMaps>; 2],
}

impl Undistorter {
    /// Create an undistorter for a loaded calibration.
    pub fn new(calibration: LoadedCalibration) -> Self {
        Self {
            calibration,
            maps: [None, None],
        }
    }

    fn maps_for(&mut self, camera: CameraId, size: ImageSize) -> Result<&RectifyMaps, WorkerError> {
        let slot = &mut self.maps[camera.index() - 1];
        if slot.as_ref().map_or(true, |m| m.size() != size) {
            let intrinsics = match camera {
                CameraId::First => self.calibration.camera1(),
                CameraId::Second => self.calibration.camera2(),
            };
            *slot = Some(intrinsics.maps_for(size)?);
        }
        slot.as_ref()
            .ok_or_else(|| WorkerError::Config("rectify maps unavailable".to_string()))
    }

    fn undistort(&mut self, camera: CameraId, frame: &Image<u8, 3>) -> Result<Image<u8, 3>, WorkerError> {
        let maps = self.maps_for(camera, frame.size())?;
        let mut out = Image::from_size_val(frame.size(), 0)?;
        remap_u8(frame, &mut out, &maps.map_x, &maps.map_y)?;
        Ok(out)
    }

    /// Undistort a frame pair.
    ///
    /// The frames may have different resolutions.
    pub fn apply(
        &mut self,
        frame1: &Image<u8, 3>,
        frame2: &Image<u8, 3>,
    ) -> Result<(Image<u8, 3>, Image<u8, 3>), WorkerError> {
        Ok((
            self.undistort(CameraId::First, frame1)?,
            self.undistort(CameraId::Second, frame2)?,
        ))
    }
}

/// One processed frame pair of a measurement session.
#[derive(Debug, Clone)]
pub struct MeasurementFrame {
    /// Matches, metadata and annotations of the pair.
    pub result: FrameResult,
    /// The annotated frame of the first camera.
    pub frame1: Image<u8, 3>,
    /// The annotated frame of the second camera.
    pub frame2: Image<u8, 3>,
    /// Smoothed processing rate.
    pub fps: f32,
}

/// Totals of a finished measurement session.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeasurementSummary {
    /// Frame pairs processed.
    pub frames: u64,
    /// Frames dropped from the lagging camera.
    pub skipped: u64,
    /// Matched pairs over all frames.
    pub matched_pairs: u64,
    /// Smoothed processing rate at the end of the session.
    pub fps: f32,
}

/// The live distance measurement loop.
pub struct MeasureJob {
    /// The first camera.
    pub camera1_url: String,
    /// The second camera.
    pub camera2_url: String,
    /// Calibration used to undistort the frames, if any.
    pub calibration: Option<LoadedCalibration>,
    /// Sync record providing the drift rate, if any.
    pub sync: Option<SyncRecord>,
    /// Detection, tracking, matching and annotation.
    pub pipeline: MeasurementPipeline,
    /// Stop after this many frame pairs.
    pub max_frames: Option<u64>,
    /// Opens the cameras.
    pub opener: Arc<dyn SourceOpener>,
    /// Measures the elapsed time.
    pub clock: Box<dyn Clock>,
}

impl MeasureJob {
    /// A session configured from a settings snapshot.
    ///
    /// Missing or malformed artifacts are logged and the session runs
    /// without them: the fallback focal length replaces the calibrated one
    /// and the streams are assumed in sync.
    pub fn from_config(
        config: &AppConfig,
        camera1_url: impl Into<String>,
        camera2_url: impl Into<String>,
        detectors: (Box<dyn Detector>, Box<dyn Detector>),
        opener: Arc<dyn SourceOpener>,
    ) -> Result<Self, WorkerError> {
        let (camera1_url, camera2_url) = (camera1_url.into(), camera2_url.into());
        let calibration = config
            .calibration_store()
            .load_or_warn(&camera1_url, &camera2_url);
        let sync = config.sync_store().load_or_warn();

        let matcher = StereoMatcher::with_optional_calibration(
            config.distance.baseline_cm,
            calibration.as_ref().map(LoadedCalibration::focal_length_px),
            config.distance.fallback_focal_px,
        )?;
        let iou = config.detection.iou_threshold;
        let annotator = BoxAnnotator {
            limits: config.bucket_limits(),
            ..Default::default()
        };
        let pipeline = MeasurementPipeline::new(detectors.0, detectors.1, matcher)
            .with_trackers(Box::new(IouTracker::new(iou)), Box::new(IouTracker::new(iou)))
            .with_annotator(Some(Box::new(annotator)))
            .with_confidence_threshold(config.detection.confidence_threshold);

        Ok(Self {
            camera1_url,
            camera2_url,
            calibration,
            sync,
            pipeline,
            max_frames: None,
            opener,
            clock: Box::new(SystemClock),
        })
    }

    /// Stop after `frames` frame pairs.
    pub fn with_max_frames(self, frames: u64) -> Self {
        Self {
            max_frames: Some(frames),
            ..self
        }
    }

    /// Replace the clock.
    pub fn with_clock(self, clock: Box<dyn Clock>) -> Self {
        Self { clock, ..self }
    }

    /// Run the session on a background worker.
    pub fn spawn(self) -> Result<Worker<MeasurementFrame, MeasurementSummary>, WorkerError> {
        Worker::spawn("measurement", move |stop, events| self.run(stop, events))
    }

    /// Run the session on the current thread.
    ///
    /// The end of either stream, or a frame that cannot be read, ends the
    /// session normally.
    pub fn run(
        mut self,
        stop: &StopToken,
        events: &EventSender<MeasurementFrame, MeasurementSummary>,
    ) -> Result<MeasurementSummary, WorkerError> {
        check_camera_pair(&self.camera1_url, &self.camera2_url)?;
        let mut cameras = CameraPair::open(self.opener.as_ref(), &self.camera1_url, &self.camera2_url)?;

        let mut aligner = FrameAligner::from_record(self.sync.as_ref());
        if let Some(camera) = aligner.lagging_camera() {
            events.status(format!(
                "compensating a drift of {:.3} frames/s on {camera}",
                aligner.drift_rate()
            ));
        }
        let mut undistorter = self.calibration.take().map(Undistorter::new);
        if undistorter.is_none() {
            events.status(format!(
                "no calibration, using a focal length of {:.0} px",
                self.pipeline.matcher().focal_length_px()
            ));
        }

        let mut fps = FpsCounter::new();
        let mut summary = MeasurementSummary::default();
        let start = self.clock.now();
        let mut last = start;
        events.status("measuring");

        while !stop.is_stopped() {
            if let Some(skip) = aligner.frames_to_skip(self.clock.now() - start) {
                let skipped = end_on_read_failure(cameras.skip(skip.camera, skip.count), events)?
                    .unwrap_or(0);
                summary.skipped += skipped;
                if skipped < skip.count {
                    events.status("camera stream ended");
                    break;
                }
            }

            let Some((frame1, frame2)) = end_on_read_failure(cameras.try_read(), events)?.flatten() else {
                events.status("camera stream ended");
                break;
            };
            let (mut frame1, mut frame2) = match undistorter.as_mut() {
                Some(u) => u.apply(&frame1, &frame2)?,
                None => (frame1, frame2),
            };

            let now = self.clock.now();
            let result = self.pipeline.process(&mut frame1, &mut frame2, now - start)?;
            fps.update_with_interval((now - last) as f32);
            last = now;

            summary.frames += 1;
            summary.matched_pairs += result.matches.pairs.len() as u64;
            summary.fps = fps.fps();
            events.update(MeasurementFrame {
                result,
                frame1,
                frame2,
                fps: summary.fps,
            });

            if self.max_frames.is_some_and(|n| summary.frames >= n) {
                break;
            }
        }
        drop(cameras);

        events.status(format!(
            "processed {} frame pairs, {} matches",
            summary.frames, summary.matched_pairs
        ));
        Ok(summary)
    }
}

/// Turn a failed frame read into the end of the stream.
fn end_on_read_failure<T>(
    read: Result<T, WorkerError>,
    events: &EventSender<MeasurementFrame, MeasurementSummary>,
) -> Result<Option<T>, WorkerError> {
    match read {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_frame_read_failure() => {
            log::warn!("{err}");
            events.status(format!("camera read failed: {err}"));
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
