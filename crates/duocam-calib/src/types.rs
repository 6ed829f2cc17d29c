use duocam_image::{Image, ImageSize};

use crate::camera::{CameraMatrix, Distortion};
use crate::error::CalibError;
use crate::linalg::{Mat33, Vec3, IDENTITY};
use crate::pattern::PatternSize;
use crate::rectify::{init_undistort_rectify_map, Mat34, Mat44};

/// Dense lookup tables mapping each output pixel to a source location.
#[derive(Debug, Clone, PartialEq)]
pub struct RectifyMaps {
    /// Source x coordinate of each output pixel.
    pub map_x: Image<f32, 1>,
    /// Source y coordinate of each output pixel.
    pub map_y: Image<f32, 1>,
}

impl RectifyMaps {
    /// The resolution the maps were generated for.
    pub fn size(&self) -> ImageSize {
        self.map_x.size()
    }
}

/// Calibrated parameters of one camera of the stereo rig.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraIntrinsics {
    /// The camera matrix.
    pub camera_matrix: CameraMatrix,
    /// The lens distortion.
    pub distortion: Distortion,
    /// The rectifying rotation.
    pub rectification: Mat33,
    /// The projection matrix of the rectified camera.
    pub projection: Mat34,
    /// The undistort-rectify maps, if available.
    pub maps: Option<RectifyMaps>,
}

impl CameraIntrinsics {
    /// Intrinsics without rectification: identity rotation and the camera
    /// matrix as projection.
    pub fn unrectified(camera_matrix: CameraMatrix, distortion: Distortion) -> Self {
        let k = camera_matrix.to_mat33();
        Self {
            camera_matrix,
            distortion,
            rectification: IDENTITY,
            projection: [
                [k[0][0], k[0][1], k[0][2], 0.0],
                [k[1][0], k[1][1], k[1][2], 0.0],
                [k[2][0], k[2][1], k[2][2], 0.0],
            ],
            maps: None,
        }
    }

    /// Return maps valid for `size`.
    ///
    /// The stored maps are reused when they match the resolution, otherwise
    /// new maps are computed from the parameters.
    pub fn maps_for(&self, size: ImageSize) -> Result<RectifyMaps, CalibError> {
        match &self.maps {
            Some(maps) if maps.size() == size => Ok(maps.clone()),
            _ => {
                log::debug!("generating rectify maps for {size}");
                init_undistort_rectify_map(
                    &self.camera_matrix,
                    &self.distortion,
                    &self.rectification,
                    &self.projection,
                    size,
                )
            }
        }
    }

    /// Horizontal focal length of the camera matrix in pixels.
    pub fn focal_length_px(&self) -> f64 {
        self.camera_matrix.fx
    }
}

/// Stereo extrinsics and the derived matrices of a calibrated rig.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoGeometry {
    /// Rotation from the first to the second camera.
    pub rotation: Mat33,
    /// Translation from the first to the second camera, in board units.
    pub translation: Vec3,
    /// The essential matrix.
    pub essential: Mat33,
    /// The fundamental matrix.
    pub fundamental: Mat33,
    /// The disparity to depth mapping.
    pub disparity_to_depth: Mat44,
}

/// Provenance of a calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationInfo {
    /// Source of the first camera.
    pub camera1_url: String,
    /// Source of the second camera.
    pub camera2_url: String,
    /// The chessboard inner corner layout.
    pub chessboard_size: PatternSize,
    /// The chessboard square edge length.
    pub square_size: f64,
    /// Local time of the calibration, `%Y-%m-%d %H:%M:%S`.
    pub date: String,
}

/// The complete result of a stereo calibration session.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoCalibration {
    /// The first camera.
    pub camera1: CameraIntrinsics,
    /// The second camera.
    pub camera2: CameraIntrinsics,
    /// The stereo geometry.
    pub stereo: StereoGeometry,
    /// The calibration provenance.
    pub info: CalibrationInfo,
    /// Reprojection rms of the stereo optimization in pixels.
    pub rms: f64,
}
