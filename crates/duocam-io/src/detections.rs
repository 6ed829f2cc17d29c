use std::path::Path;

use duocam_image::Image;
use duocam_stereo::{BoundingBox, Detection, Detector, StereoError};
use serde::{Deserialize, Serialize};

use crate::error::IoError;

/// One detection as stored in a detection log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// The class label.
    pub class_id: u32,
    /// The class name.
    pub class_name: String,
    /// The detection confidence.
    pub confidence: f32,
    /// The box as `[x1, y1, x2, y2]`.
    pub bbox: [i32; 4],
}

impl From<DetectionRecord> for Detection {
    fn from(r: DetectionRecord) -> Self {
        let [x1, y1, x2, y2] = r.bbox;
        Detection::new(r.class_id, r.class_name, r.confidence, BoundingBox::new(x1, y1, x2, y2))
    }
}

/// A [`Detector`] returning detections recorded beforehand, one list per frame.
///
/// Once the log is exhausted every frame yields no detection.
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    frames: Vec<Vec<Detection>>,
    next: usize,
}

impl ReplayDetector {
    /// Replay the given per frame detections.
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self { frames, next: 0 }
    }

    /// Load a JSON log, a list of frames each holding a list of detections.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(IoError::FileDoesNotExist(path.to_path_buf()));
        }
        let frames: Vec<Vec<DetectionRecord>> = serde_json::from_str(&std::fs::read_to_string(path)?)
            .map_err(|e| IoError::malformed(path, e))?;
        let frames = frames
            .into_iter()
            .map(|f| f.into_iter().map(Detection::from).collect())
            .collect();
        Ok(Self::new(frames))
    }

    /// Number of recorded frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame was recorded.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Detector for ReplayDetector {
    fn detect(&mut self, _frame: &Image<u8, 3>) -> Result<Vec<Detection>, StereoError> {
        let detections = self.frames.get(self.next).cloned().unwrap_or_default();
        self.next += 1;
        Ok(detections)
    }
}
