use duocam_image::Image;

use crate::annotate::{Annotations, Annotator, BoxAnnotator};
use crate::detection::Detection;
use crate::error::StereoError;
use crate::matcher::{StereoMatcher, StereoMatches};
use crate::tracker::{PassthroughTracker, Tracker};

/// Produces the detections of one camera frame.
///
/// Closures `FnMut(&Image<u8, 3>) -> Result<Vec<Detection>, StereoError>`
/// implement this trait.
pub trait Detector: Send {
    /// Detect the objects of an RGB frame.
    fn detect(&mut self, frame: &Image<u8, 3>) -> Result<Vec<Detection>, StereoError>;
}

impl<F> Detector for F
where
    F: FnMut(&Image<u8, 3>) -> Result<Vec<Detection>, StereoError> + Send,
{
    fn detect(&mut self, frame: &Image<u8, 3>) -> Result<Vec<Detection>, StereoError> {
        self(frame)
    }
}

/// Metadata of a processed frame pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Number of frame pairs processed so far, this one included.
    pub frame_count: u64,
    /// Seconds since the session started.
    pub timestamp: f64,
    /// Number of matched pairs in this frame.
    pub num_detections: usize,
}

/// Everything the pipeline produced for one frame pair.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    /// The matched and unmatched detections.
    pub matches: StereoMatches,
    /// The frame metadata.
    pub info: FrameInfo,
    /// What was drawn on the frames.
    pub annotations: Annotations,
}

/// Detection, tracking, matching and annotation of synchronized frame pairs.
///
/// Each camera gets its own detector and tracker so that track identities
/// never leak between the views.
pub struct MeasurementPipeline {
    detectors: [Box<dyn Detector>; 2],
    trackers: [Box<dyn Tracker>; 2],
    annotator: Option<Box<dyn Annotator>>,
    matcher: StereoMatcher,
    confidence_threshold: f32,
    frame_count: u64,
}

impl MeasurementPipeline {
    /// Create a pipeline with pass-through trackers and the default box annotator.
    ///
    /// # Arguments
    ///
    /// * `detector1` - The detector of the first camera.
    /// * `detector2` - The detector of the second camera.
    /// * `matcher` - The cross camera matcher.
    pub fn new(detector1: Box<dyn Detector>, detector2: Box<dyn Detector>, matcher: StereoMatcher) -> Self {
        Self {
            detectors: [detector1, detector2],
            trackers: [Box::new(PassthroughTracker), Box::new(PassthroughTracker)],
            annotator: Some(Box::new(BoxAnnotator::default())),
            matcher,
            confidence_threshold: 0.0,
            frame_count: 0,
        }
    }

    /// Replace the trackers of both cameras.
    pub fn with_trackers(mut self, tracker1: Box<dyn Tracker>, tracker2: Box<dyn Tracker>) -> Self {
        self.trackers = [tracker1, tracker2];
        self
    }

    /// Replace the annotator, `None` leaves the frames untouched.
    pub fn with_annotator(mut self, annotator: Option<Box<dyn Annotator>>) -> Self {
        self.annotator = annotator;
        self
    }

    /// Drop detections below this confidence before matching.
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// The matcher in use.
    pub fn matcher(&self) -> &StereoMatcher {
        &self.matcher
    }

    /// Number of frame pairs processed.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Process one synchronized frame pair.
    ///
    /// # Arguments
    ///
    /// * `frame1` - The undistorted frame of the first camera, annotated in place.
    /// * `frame2` - The undistorted frame of the second camera, annotated in place.
    /// * `elapsed` - Seconds since the session started.
    pub fn process(
        &mut self,
        frame1: &mut Image<u8, 3>,
        frame2: &mut Image<u8, 3>,
        elapsed: f64,
    ) -> Result<FrameResult, StereoError> {
        let detections1 = self.detect(0, frame1)?;
        let detections2 = self.detect(1, frame2)?;

        let matches = self.matcher.match_detections(&detections1, &detections2);
        let annotations = match &self.annotator {
            Some(annotator) => annotator.annotate(frame1, frame2, &matches),
            None => Annotations::default(),
        };

        self.frame_count += 1;
        let info = FrameInfo {
            frame_count: self.frame_count,
            timestamp: elapsed,
            num_detections: matches.pairs.len(),
        };

        Ok(FrameResult {
            matches,
            info,
            annotations,
        })
    }

    fn detect(&mut self, camera: usize, frame: &Image<u8, 3>) -> Result<Vec<Detection>, StereoError> {
        let threshold = self.confidence_threshold;
        let mut detections = self.detectors[camera].detect(frame)?;
        detections.retain(|d| d.confidence >= threshold);
        Ok(self.trackers[camera].update(detections))
    }

    /// Reset the frame counter and the trackers.
    pub fn reset(&mut self) {
        self.frame_count = 0;
        self.trackers.iter_mut().for_each(|t| t.reset());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;
    use crate::tracker::IouTracker;

    fn fixed(dets: Vec<Detection>) -> Box<dyn Detector> {
        Box::new(move |_: &Image<u8, 3>| -> Result<Vec<Detection>, StereoError> { Ok(dets.clone()) })
    }

    #[test]
    fn test_pipeline_frame_info() -> Result<(), StereoError> {
        let cam1 = vec![
            Detection::new(0, "person", 0.9, BoundingBox::new(300, 200, 340, 280)),
            Detection::new(0, "person", 0.2, BoundingBox::new(100, 200, 140, 280)),
        ];
        let cam2 = vec![Detection::new(0, "person", 0.8, BoundingBox::new(280, 200, 320, 280))];
        let mut pipeline = MeasurementPipeline::new(fixed(cam1), fixed(cam2), StereoMatcher::new(10.0, 800.0)?)
            .with_trackers(Box::new(IouTracker::default()), Box::new(IouTracker::default()))
            .with_confidence_threshold(0.5);

        let mut frame1 = Image::<u8, 3>::from_size_val([640, 480].into(), 0)?;
        let mut frame2 = frame1.clone();
        let first = pipeline.process(&mut frame1, &mut frame2, 0.5)?;
        let second = pipeline.process(&mut frame1, &mut frame2, 1.0)?;

        assert_eq!(first.info.frame_count, 1);
        assert_eq!(second.info.frame_count, 2);
        assert_eq!(second.info.timestamp, 1.0);
        assert_eq!(second.info.num_detections, 1);
        assert!(second.matches.unmatched1.is_empty());
        assert_eq!(second.matches.pairs[0].cam1.track_id, Some(0));
        assert_eq!(second.annotations.camera1[0].label, "person 4.00m");
        Ok(())
    }

    #[test]
    fn test_pipeline_detector_error() -> Result<(), StereoError> {
        let failing: Box<dyn Detector> = Box::new(|_: &Image<u8, 3>| -> Result<Vec<Detection>, StereoError> {
            Err(StereoError::Detector("model not loaded".to_string()))
        });
        let mut pipeline = MeasurementPipeline::new(failing, fixed(vec![]), StereoMatcher::new(10.0, 800.0)?)
            .with_annotator(None);
        let mut frame1 = Image::<u8, 3>::from_size_val([64, 48].into(), 0)?;
        let mut frame2 = frame1.clone();
        assert!(matches!(
            pipeline.process(&mut frame1, &mut frame2, 0.0),
            Err(StereoError::Detector(_))
        ));
        assert_eq!(pipeline.frame_count(), 0);
        Ok(())
    }

    #[test]
    fn test_pipeline_mixed_resolutions() -> Result<(), StereoError> {
        let cam1 = vec![Detection::new(0, "person", 0.9, BoundingBox::new(20, 10, 40, 30))];
        let cam2 = vec![Detection::new(0, "person", 0.9, BoundingBox::new(0, 10, 20, 30))];
        let mut pipeline = MeasurementPipeline::new(fixed(cam1), fixed(cam2), StereoMatcher::new(10.0, 800.0)?);
        let mut frame1 = Image::<u8, 3>::from_size_val([64, 48].into(), 0)?;
        let mut frame2 = Image::<u8, 3>::from_size_val([80, 60].into(), 0)?;
        let result = pipeline.process(&mut frame1, &mut frame2, 0.0)?;
        assert_eq!(result.matches.pairs.len(), 1);
        assert_eq!(result.matches.pairs[0].disparity_px, 20.0);
        Ok(())
    }
}
