#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Flexible numeric arrays of the JSON artifacts.
pub mod array;

/// Calibration artifact store.
pub mod calibration_store;

/// Camera source list parsing.
pub mod camera_list;

/// Detections replayed from a file.
pub mod detections;

/// Error types for the io module.
pub mod error;

mod json;

/// A module for measuring frames per second.
pub mod fps_counter;

/// Image file reading and writing.
pub mod functional;

/// Directory of numbered images as a camera.
pub mod sequence;

/// Frame source abstractions.
pub mod source;

/// Sync artifact store.
pub mod sync_store;

pub use crate::calibration_store::{CalibrationStore, LoadedCalibration};
pub use crate::camera_list::{load_camera_list, parse_camera_list, CameraEntry};
pub use crate::detections::{DetectionRecord, ReplayDetector};
pub use crate::error::IoError;
pub use crate::fps_counter::FpsCounter;
pub use crate::sequence::ImageSequenceSource;
pub use crate::source::{open_pair, FileSourceOpener, FrameSource, SourceOpener};
pub use crate::sync_store::SyncStore;
