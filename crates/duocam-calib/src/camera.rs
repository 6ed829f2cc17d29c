use crate::error::CalibError;
use crate::linalg::{mat33_mul_vec3, Mat33, Vec3};

/// Pinhole camera intrinsic parameters.
///
/// The skew term is assumed to be zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrix {
    /// Focal length along the x axis in pixels.
    pub fx: f64,
    /// Focal length along the y axis in pixels.
    pub fy: f64,
    /// Principal point x coordinate in pixels.
    pub cx: f64,
    /// Principal point y coordinate in pixels.
    pub cy: f64,
}

impl CameraMatrix {
    /// Build the 3x3 matrix `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn to_mat33(&self) -> Mat33 {
        [
            [self.fx, 0.0, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }

    /// Read the focal lengths and principal point from a 3x3 matrix.
    pub fn from_mat33(m: &Mat33) -> Self {
        Self {
            fx: m[0][0],
            fy: m[1][1],
            cx: m[0][2],
            cy: m[1][2],
        }
    }

    /// Map a normalized image point to pixel coordinates.
    #[inline]
    pub fn to_pixel(&self, x: f64, y: f64) -> [f64; 2] {
        [self.fx * x + self.cx, self.fy * y + self.cy]
    }

    /// Map a pixel to normalized image coordinates.
    #[inline]
    pub fn to_normalized(&self, u: f64, v: f64) -> [f64; 2] {
        [(u - self.cx) / self.fx, (v - self.cy) / self.fy]
    }
}

/// Polynomial lens distortion `(k1, k2, p1, p2, k3)`.
///
/// The coefficients follow the radial-tangential (Brown-Conrady) model.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Distortion {
    /// Radial coefficient of order 2.
    pub k1: f64,
    /// Radial coefficient of order 4.
    pub k2: f64,
    /// First tangential coefficient.
    pub p1: f64,
    /// Second tangential coefficient.
    pub p2: f64,
    /// Radial coefficient of order 6.
    pub k3: f64,
}

impl Distortion {
    /// Build the model from a coefficient vector in `k1, k2, p1, p2, k3` order.
    ///
    /// Shorter vectors are padded with zeros. Longer vectors are accepted only
    /// when the extra rational terms are all zero.
    pub fn from_slice(coeffs: &[f64]) -> Result<Self, CalibError> {
        if coeffs.len() > 5 && coeffs[5..].iter().any(|c| *c != 0.0) {
            return Err(CalibError::InvalidDistortion(coeffs.len()));
        }
        let get = |i: usize| coeffs.get(i).copied().unwrap_or(0.0);
        Ok(Self {
            k1: get(0),
            k2: get(1),
            p1: get(2),
            p2: get(3),
            k3: get(4),
        })
    }

    /// The coefficients in `k1, k2, p1, p2, k3` order.
    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// Apply the distortion to a normalized image point.
    #[inline]
    pub fn distort(&self, x: f64, y: f64) -> [f64; 2] {
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let xy2 = 2.0 * x * y;
        [
            x * radial + self.p1 * xy2 + self.p2 * (r2 + 2.0 * x * x),
            y * radial + self.p1 * (r2 + 2.0 * y * y) + self.p2 * xy2,
        ]
    }

    /// Remove the distortion from a normalized image point.
    ///
    /// Uses a fixed point iteration, which converges for the moderate
    /// distortion of typical webcam lenses.
    pub fn undistort(&self, xd: f64, yd: f64) -> [f64; 2] {
        let (mut x, mut y) = (xd, yd);
        for _ in 0..20 {
            let r2 = x * x + y * y;
            let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            let nx = (xd - dx) / radial;
            let ny = (yd - dy) / radial;
            let converged = (nx - x).abs() < 1e-12 && (ny - y).abs() < 1e-12;
            x = nx;
            y = ny;
            if converged {
                break;
            }
        }
        [x, y]
    }
}

/// Project a point in camera coordinates to pixels.
///
/// # Arguments
///
/// * `k` - The camera intrinsics.
/// * `dist` - The lens distortion.
/// * `p` - The point expressed in the camera frame.
///
/// # Returns
///
/// The pixel coordinates of the projection.
pub fn project_camera_point(k: &CameraMatrix, dist: &Distortion, p: &Vec3) -> [f64; 2] {
    let inv_z = 1.0 / p[2];
    let [xd, yd] = dist.distort(p[0] * inv_z, p[1] * inv_z);
    k.to_pixel(xd, yd)
}

/// Project a world point observed from a pose `(r, t)` to pixels.
pub fn project_point(
    k: &CameraMatrix,
    dist: &Distortion,
    r: &Mat33,
    t: &Vec3,
    p_world: &Vec3,
) -> [f64; 2] {
    let pc = mat33_mul_vec3(r, p_world);
    project_camera_point(k, dist, &[pc[0] + t[0], pc[1] + t[1], pc[2] + t[2]])
}

/// Undistort pixel coordinates to normalized image coordinates.
pub fn undistort_pixel(k: &CameraMatrix, dist: &Distortion, u: f64, v: f64) -> [f64; 2] {
    let [xd, yd] = k.to_normalized(u, v);
    dist.undistort(xd, yd)
}
