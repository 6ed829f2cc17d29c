use duocam_image::{Image, ImageSize};
use duocam_imgproc::parallel;

use crate::camera::{undistort_pixel, CameraMatrix, Distortion};
use crate::error::CalibError;
use crate::linalg::{mat33_mul_vec3, mat33_transpose, Mat33, Vec3};

/// Number of inner corners of a chessboard along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternSize {
    /// Inner corners per row.
    pub cols: usize,
    /// Inner corners per column.
    pub rows: usize,
}

impl PatternSize {
    /// Create a pattern size, rejecting boards with fewer than 2x2 inner corners.
    pub fn new(cols: usize, rows: usize) -> Result<Self, CalibError> {
        if cols < 2 || rows < 2 {
            return Err(CalibError::InvalidPatternSize(cols, rows));
        }
        Ok(Self { cols, rows })
    }

    /// Total number of inner corners.
    pub fn num_corners(&self) -> usize {
        self.cols * self.rows
    }

    /// Planar object points of the inner corners, row by row, with `z = 0`.
    ///
    /// # Arguments
    ///
    /// * `square_size` - The edge length of one square in world units.
    pub fn object_points(&self, square_size: f64) -> Vec<[f64; 3]> {
        (0..self.rows)
            .flat_map(|j| {
                (0..self.cols).map(move |i| [i as f64 * square_size, j as f64 * square_size, 0.0])
            })
            .collect()
    }
}

impl std::fmt::Display for PatternSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// Intensity of the board at a point of the board plane.
///
/// The board has `cols + 1` by `rows + 1` squares surrounded by a white margin
/// of one square, anything further away is mid gray.
fn board_intensity(pattern: &PatternSize, square_size: f64, x: f64, y: f64) -> f32 {
    let a = (x / square_size).floor() as i64;
    let b = (y / square_size).floor() as i64;
    let inside_squares = a >= -1 && b >= -1 && a <= pattern.cols as i64 - 1 && b <= pattern.rows as i64 - 1;
    if inside_squares {
        return if (a + b).rem_euclid(2) == 0 { 0.0 } else { 255.0 };
    }
    let inside_margin = a >= -2 && b >= -2 && a <= pattern.cols as i64 && b <= pattern.rows as i64;
    if inside_margin {
        255.0
    } else {
        128.0
    }
}

/// Render the view of a chessboard seen by a camera.
///
/// Each pixel is supersampled on a 4x4 grid so that corners land with sub-pixel
/// accuracy. Used to preview a target and to produce synthetic calibration
/// sequences.
///
/// # Arguments
///
/// * `pattern` - The inner corner layout of the board.
/// * `square_size` - The edge length of one square in world units.
/// * `k` - The camera intrinsics.
/// * `dist` - The lens distortion.
/// * `r` - Rotation from board to camera coordinates.
/// * `t` - Translation from board to camera coordinates.
/// * `size` - The size of the rendered image.
#[allow(clippy::too_many_arguments)]
pub fn render_chessboard_view(
    pattern: &PatternSize,
    square_size: f64,
    k: &CameraMatrix,
    dist: &Distortion,
    r: &Mat33,
    t: &Vec3,
    size: ImageSize,
) -> Result<Image<u8, 1>, CalibError> {
    const SUBSAMPLES: usize = 4;

    // board plane normal and the camera center in board coordinates
    let rt = mat33_transpose(r);
    let normal = [r[0][2], r[1][2], r[2][2]];
    let n_dot_t = normal[0] * t[0] + normal[1] * t[1] + normal[2] * t[2];

    let mut image = Image::<u8, 1>::from_size_val(size, 0)?;
    parallel::par_fill_rows(&mut image, |x, y| {
        let mut acc = 0.0f32;
        for sy in 0..SUBSAMPLES {
            for sx in 0..SUBSAMPLES {
                let u = x as f64 + (sx as f64 + 0.5) / SUBSAMPLES as f64 - 0.5;
                let v = y as f64 + (sy as f64 + 0.5) / SUBSAMPLES as f64 - 0.5;
                let [xn, yn] = undistort_pixel(k, dist, u, v);
                let ray = [xn, yn, 1.0];
                let n_dot_ray = normal[0] * ray[0] + normal[1] * ray[1] + normal[2] * ray[2];
                let s = n_dot_t / n_dot_ray;
                acc += if n_dot_ray.abs() < 1e-12 || s <= 0.0 {
                    128.0
                } else {
                    let pc = [s * ray[0] - t[0], s * ray[1] - t[1], s * ray[2] - t[2]];
                    let pw = mat33_mul_vec3(&rt, &pc);
                    board_intensity(pattern, square_size, pw[0], pw[1])
                };
            }
        }
        (acc / (SUBSAMPLES * SUBSAMPLES) as f32).round() as u8
    });

    Ok(image)
}
