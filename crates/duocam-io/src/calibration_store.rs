use std::collections::HashMap;
use std::path::{Path, PathBuf};

use duocam_calib::{
    CalibrationInfo, CameraIntrinsics, CameraMatrix, Distortion, PatternSize, RectifyMaps, StereoCalibration,
    StereoGeometry,
};
use duocam_image::{Image, ImageSize};
use serde::{Deserialize, Serialize};

use crate::array::NumArray;
use crate::error::IoError;
use crate::json::{read_json_value, write_json_atomic};

#[derive(Serialize, Deserialize)]
struct CameraEntry {
    matrix: NumArray,
    distortion: NumArray,
    #[serde(rename = "R")]
    rectification: NumArray,
    #[serde(rename = "P")]
    projection: NumArray,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mapx: Option<Vec<Vec<f32>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mapy: Option<Vec<Vec<f32>>>,
}

#[derive(Serialize, Deserialize)]
struct StereoEntry {
    #[serde(rename = "R")]
    rotation: NumArray,
    #[serde(rename = "T")]
    translation: NumArray,
    #[serde(rename = "E")]
    essential: NumArray,
    #[serde(rename = "F")]
    fundamental: NumArray,
    #[serde(rename = "Q")]
    disparity_to_depth: NumArray,
}

#[derive(Serialize, Deserialize)]
struct InfoEntry {
    camera1_url: String,
    camera2_url: String,
    chessboard_size: [usize; 2],
    square_size: f64,
    #[serde(default)]
    date: String,
}

#[derive(Serialize, Deserialize)]
struct CalibrationFile {
    camera1: CameraEntry,
    camera2: CameraEntry,
    stereo: StereoEntry,
    info: InfoEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rms: Option<f64>,
}

#[derive(Deserialize)]
struct LegacyCamera {
    camera_matrix: NumArray,
    dist_coeffs: NumArray,
}

/// A calibration read from disk.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedCalibration {
    /// A complete stereo calibration.
    Stereo(Box<StereoCalibration>),
    /// Per camera intrinsics from a file keyed by camera source, without
    /// stereo geometry or rectification.
    Intrinsics {
        /// The first camera.
        camera1: CameraIntrinsics,
        /// The second camera.
        camera2: CameraIntrinsics,
    },
}

impl LoadedCalibration {
    /// The first camera.
    pub fn camera1(&self) -> &CameraIntrinsics {
        match self {
            LoadedCalibration::Stereo(calib) => &calib.camera1,
            LoadedCalibration::Intrinsics { camera1, .. } => camera1,
        }
    }

    /// The second camera.
    pub fn camera2(&self) -> &CameraIntrinsics {
        match self {
            LoadedCalibration::Stereo(calib) => &calib.camera2,
            LoadedCalibration::Intrinsics { camera2, .. } => camera2,
        }
    }

    /// The horizontal focal length of the first camera.
    pub fn focal_length_px(&self) -> f64 {
        self.camera1().focal_length_px()
    }

    /// The stereo calibration, if the file had one.
    pub fn stereo(&self) -> Option<&StereoCalibration> {
        match self {
            LoadedCalibration::Stereo(calib) => Some(calib.as_ref()),
            LoadedCalibration::Intrinsics { .. } => None,
        }
    }
}

/// Reads and writes the calibration artifact.
///
/// The document holds both cameras with their dense maps, the stereo
/// geometry and the provenance of the session. Writes go through a temporary
/// file so a reader never sees half a calibration.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    /// A store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The artifact file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the artifact file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write a calibration, replacing any previous one.
    pub fn save(&self, calib: &StereoCalibration) -> Result<(), IoError> {
        let file = CalibrationFile {
            camera1: camera_entry(&calib.camera1),
            camera2: camera_entry(&calib.camera2),
            stereo: StereoEntry {
                rotation: NumArray::from_rows(&calib.stereo.rotation),
                translation: NumArray::column(&calib.stereo.translation),
                essential: NumArray::from_rows(&calib.stereo.essential),
                fundamental: NumArray::from_rows(&calib.stereo.fundamental),
                disparity_to_depth: NumArray::from_rows(&calib.stereo.disparity_to_depth),
            },
            info: InfoEntry {
                camera1_url: calib.info.camera1_url.clone(),
                camera2_url: calib.info.camera2_url.clone(),
                chessboard_size: [calib.info.chessboard_size.cols, calib.info.chessboard_size.rows],
                square_size: calib.info.square_size,
                date: calib.info.date.clone(),
            },
            rms: Some(calib.rms),
        };
        write_json_atomic(&self.path, &file)?;
        log::info!("calibration saved to {}", self.path.display());
        Ok(())
    }

    /// Read the calibration for a camera pair.
    ///
    /// # Arguments
    ///
    /// * `camera1_url` - Source of the first camera, used with files keyed by source.
    /// * `camera2_url` - Source of the second camera.
    ///
    /// # Returns
    ///
    /// `None` when the file does not exist.
    pub fn load(&self, camera1_url: &str, camera2_url: &str) -> Result<Option<LoadedCalibration>, IoError> {
        let Some(value) = read_json_value(&self.path)? else {
            return Ok(None);
        };
        let malformed = |e: String| IoError::malformed(&self.path, e);

        if value.get("camera1").is_some() {
            let file: CalibrationFile = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
            let calib = stereo_from_file(file).map_err(malformed)?;
            if calib.info.camera1_url != camera1_url || calib.info.camera2_url != camera2_url {
                log::warn!(
                    "calibration was made for {} / {}, using it for {camera1_url} / {camera2_url}",
                    calib.info.camera1_url,
                    calib.info.camera2_url
                );
            }
            return Ok(Some(LoadedCalibration::Stereo(Box::new(calib))));
        }

        let mut legacy: HashMap<String, LegacyCamera> =
            serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
        let mut take = |url: &str| -> Result<CameraIntrinsics, IoError> {
            let entry = legacy
                .remove(url)
                .ok_or_else(|| malformed(format!("no calibration for {url}")))?;
            legacy_intrinsics(&entry).map_err(malformed)
        };
        let camera1 = take(camera1_url)?;
        let camera2 = take(camera2_url)?;
        log::info!("loaded per camera intrinsics from {}", self.path.display());
        Ok(Some(LoadedCalibration::Intrinsics { camera1, camera2 }))
    }

    /// Read the calibration, logging and discarding any error.
    pub fn load_or_warn(&self, camera1_url: &str, camera2_url: &str) -> Option<LoadedCalibration> {
        match self.load(camera1_url, camera2_url) {
            Ok(Some(calib)) => Some(calib),
            Ok(None) => {
                log::info!("no calibration at {}, running uncalibrated", self.path.display());
                None
            }
            Err(e) => {
                log::warn!("ignoring calibration: {e}");
                None
            }
        }
    }
}

fn camera_entry(cam: &CameraIntrinsics) -> CameraEntry {
    let rows = |img: &Image<f32, 1>| -> Vec<Vec<f32>> { img.as_slice().chunks(img.width()).map(|r| r.to_vec()).collect() };
    CameraEntry {
        matrix: NumArray::from_rows(&cam.camera_matrix.to_mat33()),
        distortion: NumArray::from_slice(&cam.distortion.to_array()),
        rectification: NumArray::from_rows(&cam.rectification),
        projection: NumArray::from_rows(&cam.projection),
        mapx: cam.maps.as_ref().map(|m| rows(&m.map_x)),
        mapy: cam.maps.as_ref().map(|m| rows(&m.map_y)),
    }
}

fn map_image(rows: Vec<Vec<f32>>) -> Result<Image<f32, 1>, String> {
    let height = rows.len();
    let width = rows.first().map_or(0, |r| r.len());
    if rows.iter().any(|r| r.len() != width) {
        return Err("map rows have different lengths".to_string());
    }
    let data = rows.into_iter().flatten().collect();
    Image::new(ImageSize { width, height }, data).map_err(|e| e.to_string())
}

fn camera_from_entry(entry: CameraEntry) -> Result<CameraIntrinsics, String> {
    let distortion = Distortion::from_slice(&entry.distortion.flatten()).map_err(|e| e.to_string())?;
    let maps = match (entry.mapx, entry.mapy) {
        (Some(mx), Some(my)) => {
            let maps = RectifyMaps {
                map_x: map_image(mx)?,
                map_y: map_image(my)?,
            };
            if maps.map_x.size() != maps.map_y.size() {
                return Err("mapx and mapy differ in size".to_string());
            }
            Some(maps)
        }
        _ => None,
    };
    Ok(CameraIntrinsics {
        camera_matrix: CameraMatrix::from_mat33(&entry.matrix.to_rows()?),
        distortion,
        rectification: entry.rectification.to_rows()?,
        projection: entry.projection.to_rows()?,
        maps,
    })
}

fn stereo_from_file(file: CalibrationFile) -> Result<StereoCalibration, String> {
    let [cols, rows] = file.info.chessboard_size;
    Ok(StereoCalibration {
        camera1: camera_from_entry(file.camera1)?,
        camera2: camera_from_entry(file.camera2)?,
        stereo: StereoGeometry {
            rotation: file.stereo.rotation.to_rows()?,
            translation: file.stereo.translation.to_vector()?,
            essential: file.stereo.essential.to_rows()?,
            fundamental: file.stereo.fundamental.to_rows()?,
            disparity_to_depth: file.stereo.disparity_to_depth.to_rows()?,
        },
        info: CalibrationInfo {
            camera1_url: file.info.camera1_url,
            camera2_url: file.info.camera2_url,
            chessboard_size: PatternSize::new(cols, rows).map_err(|e| e.to_string())?,
            square_size: file.info.square_size,
            date: file.info.date,
        },
        rms: file.rms.unwrap_or(0.0),
    })
}

fn legacy_intrinsics(entry: &LegacyCamera) -> Result<CameraIntrinsics, String> {
    let k = CameraMatrix::from_mat33(&entry.camera_matrix.to_rows()?);
    let dist = Distortion::from_slice(&entry.dist_coeffs.flatten()).map_err(|e| e.to_string())?;
    Ok(CameraIntrinsics::unrectified(k, dist))
}
