use duocam_image::{Image, ImageSize};

use crate::chessboard::{find_chessboard_corners, ChessboardDetectorParams, SubPixParams};
use crate::error::CalibError;
use crate::mono::calibrate_camera;
use crate::pattern::PatternSize;
use crate::rectify::{init_undistort_rectify_map, stereo_rectify};
use crate::stereo::stereo_calibrate;
use crate::types::{CalibrationInfo, CameraIntrinsics, StereoCalibration, StereoGeometry};

/// Parameters of a calibration session.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSettings {
    /// Inner corners of the chessboard.
    pub pattern: PatternSize,
    /// Edge length of one square, in the unit of the baseline.
    pub square_size: f64,
    /// Number of accepted sample pairs required to calibrate.
    pub num_samples: usize,
    /// Corner detector parameters.
    pub detector: ChessboardDetectorParams,
    /// Sub-pixel refinement parameters.
    pub subpix: SubPixParams,
}

impl CalibrationSettings {
    /// Settings for a board with the default detector and refinement parameters.
    pub fn new(pattern: PatternSize, square_size: f64, num_samples: usize) -> Self {
        Self {
            pattern,
            square_size,
            num_samples,
            detector: ChessboardDetectorParams::default(),
            subpix: SubPixParams::default(),
        }
    }
}

/// What happened to a frame pair offered to the calibrator.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// The board was found in both frames and the sample was stored.
    Accepted {
        /// Number of accepted samples so far.
        collected: usize,
        /// Refined corners in the first frame.
        corners1: Vec<[f64; 2]>,
        /// Refined corners in the second frame.
        corners2: Vec<[f64; 2]>,
    },
    /// The board was missing from at least one frame; nothing was stored.
    Rejected {
        /// Whether the board was found in the first frame.
        found1: bool,
        /// Whether the board was found in the second frame.
        found2: bool,
    },
}

/// Collects chessboard views from a stereo pair and turns them into a
/// [`StereoCalibration`].
///
/// A sample is kept only when the complete board is detected in both frames.
/// Collected samples live only inside the calibrator, dropping it discards
/// them.
///
/// # Example
///
/// ```no_run
/// use duocam_calib::{CalibrationSettings, GeometryCalibrator, PatternSize};
/// use duocam_image::Image;
///
/// let pattern = PatternSize::new(9, 6).unwrap();
/// let mut calibrator = GeometryCalibrator::new(CalibrationSettings::new(pattern, 2.5, 15));
/// let frame1 = Image::<u8, 1>::from_size_val([640, 480].into(), 0).unwrap();
/// let frame2 = frame1.clone();
/// calibrator.add_sample(&frame1, &frame2).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct GeometryCalibrator {
    settings: CalibrationSettings,
    object_points: Vec<[f64; 3]>,
    image_points1: Vec<Vec<[f64; 2]>>,
    image_points2: Vec<Vec<[f64; 2]>>,
    image_size: Option<ImageSize>,
}

impl GeometryCalibrator {
    /// Create a calibrator with no samples.
    pub fn new(settings: CalibrationSettings) -> Self {
        let object_points = settings.pattern.object_points(settings.square_size);
        Self {
            settings,
            object_points,
            image_points1: Vec::new(),
            image_points2: Vec::new(),
            image_size: None,
        }
    }

    /// The session parameters.
    pub fn settings(&self) -> &CalibrationSettings {
        &self.settings
    }

    /// Number of accepted samples.
    pub fn collected(&self) -> usize {
        self.image_points1.len()
    }

    /// Number of samples required before calibrating.
    pub fn required(&self) -> usize {
        self.settings.num_samples
    }

    /// Fraction of the required samples collected, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.settings.num_samples == 0 {
            return 1.0;
        }
        (self.collected() as f32 / self.settings.num_samples as f32).min(1.0)
    }

    /// Whether enough samples were collected.
    pub fn is_complete(&self) -> bool {
        self.collected() >= self.settings.num_samples
    }

    /// Drop every collected sample.
    pub fn reset(&mut self) {
        self.image_points1.clear();
        self.image_points2.clear();
        self.image_size = None;
    }

    /// Offer a synchronized pair of grayscale frames.
    ///
    /// # Arguments
    ///
    /// * `frame1` - The frame of the first camera.
    /// * `frame2` - The frame of the second camera.
    ///
    /// # Returns
    ///
    /// Whether the sample was accepted. Both frames must share the resolution
    /// of the previously accepted samples.
    pub fn add_sample(
        &mut self,
        frame1: &Image<u8, 1>,
        frame2: &Image<u8, 1>,
    ) -> Result<SampleOutcome, CalibError> {
        let size = frame1.size();
        if frame2.size() != size {
            return Err(CalibError::ImageSizeMismatch(
                size.width,
                size.height,
                frame2.width(),
                frame2.height(),
            ));
        }
        if let Some(expected) = self.image_size {
            if expected != size {
                return Err(CalibError::ImageSizeMismatch(
                    expected.width,
                    expected.height,
                    size.width,
                    size.height,
                ));
            }
        }

        let s = &self.settings;
        let corners1 = find_chessboard_corners(frame1, &s.pattern, &s.detector, &s.subpix)?;
        let corners2 = find_chessboard_corners(frame2, &s.pattern, &s.detector, &s.subpix)?;
        let (corners1, corners2) = match (corners1, corners2) {
            (Some(c1), Some(c2)) => (c1, c2),
            (c1, c2) => {
                log::trace!("sample rejected: board in camera 1 {}, camera 2 {}", c1.is_some(), c2.is_some());
                return Ok(SampleOutcome::Rejected {
                    found1: c1.is_some(),
                    found2: c2.is_some(),
                });
            }
        };

        self.image_size = Some(size);
        self.image_points1.push(corners1.clone());
        self.image_points2.push(corners2.clone());
        log::debug!("sample accepted: {}/{}", self.collected(), self.required());

        Ok(SampleOutcome::Accepted {
            collected: self.collected(),
            corners1,
            corners2,
        })
    }

    /// Run the calibration on the collected samples.
    ///
    /// Each camera is calibrated on its own, then the relative pose is solved
    /// with the intrinsics held fixed, the pair is rectified and the dense
    /// maps are generated at the sample resolution.
    ///
    /// # Arguments
    ///
    /// * `camera1_url` - Source of the first camera, stored in the provenance.
    /// * `camera2_url` - Source of the second camera.
    /// * `date` - Timestamp stored in the provenance.
    ///
    /// # Errors
    ///
    /// [`CalibError::InsufficientCalibrationData`] when fewer samples than
    /// required were collected.
    pub fn calibrate(
        &self,
        camera1_url: &str,
        camera2_url: &str,
        date: &str,
    ) -> Result<StereoCalibration, CalibError> {
        let (collected, required) = (self.collected(), self.required());
        let image_size = match self.image_size {
            Some(size) if collected >= required && collected > 0 => size,
            _ => {
                return Err(CalibError::InsufficientCalibrationData {
                    collected,
                    required,
                })
            }
        };

        log::info!("calibrating camera 1 from {collected} samples");
        let mono1 = calibrate_camera(&self.object_points, &self.image_points1, image_size)?;
        log::info!("calibrating camera 2 from {collected} samples");
        let mono2 = calibrate_camera(&self.object_points, &self.image_points2, image_size)?;

        log::info!("calibrating stereo extrinsics");
        let extrinsics = stereo_calibrate(
            &self.object_points,
            &self.image_points1,
            &self.image_points2,
            &mono1,
            &mono2,
        )?;

        log::info!("computing rectification");
        let rect = stereo_rectify(
            &mono1.camera_matrix,
            &mono1.distortion,
            &mono2.camera_matrix,
            &mono2.distortion,
            image_size,
            &extrinsics.rotation,
            &extrinsics.translation,
        )?;

        log::info!("computing rectify maps at {image_size}");
        let maps1 = init_undistort_rectify_map(
            &mono1.camera_matrix,
            &mono1.distortion,
            &rect.r1,
            &rect.p1,
            image_size,
        )?;
        let maps2 = init_undistort_rectify_map(
            &mono2.camera_matrix,
            &mono2.distortion,
            &rect.r2,
            &rect.p2,
            image_size,
        )?;

        Ok(StereoCalibration {
            camera1: CameraIntrinsics {
                camera_matrix: mono1.camera_matrix,
                distortion: mono1.distortion,
                rectification: rect.r1,
                projection: rect.p1,
                maps: Some(maps1),
            },
            camera2: CameraIntrinsics {
                camera_matrix: mono2.camera_matrix,
                distortion: mono2.distortion,
                rectification: rect.r2,
                projection: rect.p2,
                maps: Some(maps2),
            },
            stereo: StereoGeometry {
                rotation: extrinsics.rotation,
                translation: extrinsics.translation,
                essential: extrinsics.essential,
                fundamental: extrinsics.fundamental,
                disparity_to_depth: rect.q,
            },
            info: CalibrationInfo {
                camera1_url: camera1_url.to_string(),
                camera2_url: camera2_url.to_string(),
                chessboard_size: self.settings.pattern,
                square_size: self.settings.square_size,
                date: date.to_string(),
            },
            rms: extrinsics.rms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibrate_without_samples() -> Result<(), CalibError> {
        let calibrator = GeometryCalibrator::new(CalibrationSettings::new(PatternSize::new(9, 6)?, 2.5, 15));
        assert_eq!(calibrator.progress(), 0.0);
        assert!(matches!(
            calibrator.calibrate("a", "b", "2024-01-01 00:00:00"),
            Err(CalibError::InsufficientCalibrationData {
                collected: 0,
                required: 15
            })
        ));
        Ok(())
    }

    #[test]
    fn test_reject_blank_frames() -> Result<(), CalibError> {
        let mut calibrator = GeometryCalibrator::new(CalibrationSettings::new(PatternSize::new(9, 6)?, 2.5, 15));
        let blank = Image::<u8, 1>::from_size_val([160, 120].into(), 90)?;
        let outcome = calibrator.add_sample(&blank, &blank)?;
        assert_eq!(
            outcome,
            SampleOutcome::Rejected {
                found1: false,
                found2: false
            }
        );
        assert_eq!(calibrator.collected(), 0);
        Ok(())
    }

    #[test]
    fn test_reject_mismatched_sizes() -> Result<(), CalibError> {
        let mut calibrator = GeometryCalibrator::new(CalibrationSettings::new(PatternSize::new(9, 6)?, 2.5, 15));
        let a = Image::<u8, 1>::from_size_val([160, 120].into(), 0)?;
        let b = Image::<u8, 1>::from_size_val([320, 240].into(), 0)?;
        assert!(matches!(
            calibrator.add_sample(&a, &b),
            Err(CalibError::ImageSizeMismatch(160, 120, 320, 240))
        ));
        Ok(())
    }
}
