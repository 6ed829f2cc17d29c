#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Drawing of matched and unmatched detections.
pub mod annotate;

/// Presentation buckets of distances.
pub mod bucket;

/// Detections produced by an object detector.
pub mod detection;

/// Error types for the stereo module.
pub mod error;

/// Disparity based matching of detections across cameras.
pub mod matcher;

/// The per frame measurement pipeline.
pub mod pipeline;

/// Track identity assignment.
pub mod tracker;

pub use crate::annotate::{Annotation, Annotations, Annotator, BoxAnnotator};
pub use crate::bucket::{BucketLimits, DistanceBucket};
pub use crate::detection::{BoundingBox, Detection};
pub use crate::error::StereoError;
pub use crate::matcher::{MatchedPair, StereoMatcher, StereoMatches};
pub use crate::pipeline::{Detector, FrameInfo, FrameResult, MeasurementPipeline};
pub use crate::tracker::{IouTracker, PassthroughTracker, Tracker};
