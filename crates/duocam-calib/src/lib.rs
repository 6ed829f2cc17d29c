#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera model with polynomial lens distortion.
pub mod camera;

/// Stereo sample collection and the calibration session.
pub mod calibrator;

/// Chessboard inner corner detection and sub-pixel refinement.
pub mod chessboard;

/// Error types for the calibration module.
pub mod error;

/// Planar homography estimation.
pub mod homography;

/// Small fixed size linear algebra helpers.
pub mod linalg;

/// Levenberg-Marquardt least squares solver.
pub mod lm;

/// Single camera calibration from planar views.
pub mod mono;

/// Chessboard target description and synthetic view rendering.
pub mod pattern;

/// Stereo rectification and undistort-rectify maps.
pub mod rectify;

/// Stereo extrinsic calibration with fixed intrinsics.
pub mod stereo;

/// Calibration result types.
pub mod types;

pub use crate::calibrator::{CalibrationSettings, GeometryCalibrator, SampleOutcome};
pub use crate::camera::{CameraMatrix, Distortion};
pub use crate::error::CalibError;
pub use crate::pattern::PatternSize;
pub use crate::types::{CalibrationInfo, CameraIntrinsics, RectifyMaps, StereoCalibration, StereoGeometry};
