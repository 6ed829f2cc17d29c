use duocam_image::ImageSize;

use crate::camera::{project_point, CameraMatrix, Distortion};
use crate::error::CalibError;
use crate::homography::find_homography_dlt;
use crate::linalg::{
    cross_vec3, inverse_mat33, mat33_mul_vec3, nearest_rotation, norm_vec3, rodrigues,
    rotation_to_rodrigues, Mat33, Vec3,
};
use crate::lm::{levenberg_marquardt, LMParams, LeastSquaresProblem};

/// Number of intrinsic parameters: `fx, fy, cx, cy, k1, k2, p1, p2, k3`.
const NUM_INTRINSICS: usize = 9;

/// Result of a single camera calibration.
#[derive(Debug, Clone)]
pub struct MonoCalibration {
    /// The estimated intrinsics.
    pub camera_matrix: CameraMatrix,
    /// The estimated lens distortion.
    pub distortion: Distortion,
    /// Board to camera rotation of each view as an axis-angle vector.
    pub rvecs: Vec<Vec3>,
    /// Board to camera translation of each view.
    pub tvecs: Vec<Vec3>,
    /// Root mean square reprojection error in pixels.
    pub rms: f64,
}

/// Camera parameters packed into the optimization vector.
pub(crate) fn unpack_intrinsics(x: &[f64]) -> (CameraMatrix, Distortion) {
    (
        CameraMatrix {
            fx: x[0],
            fy: x[1],
            cx: x[2],
            cy: x[3],
        },
        Distortion {
            k1: x[4],
            k2: x[5],
            p1: x[6],
            p2: x[7],
            k3: x[8],
        },
    )
}

/// Residuals of one view, two per point.
pub(crate) fn view_residuals(
    k: &CameraMatrix,
    dist: &Distortion,
    pose: &[f64],
    object_points: &[[f64; 3]],
    image_points: &[[f64; 2]],
    out: &mut [f64],
) {
    let r = rodrigues(&[pose[0], pose[1], pose[2]]);
    let t = [pose[3], pose[4], pose[5]];
    for (i, (p, uv)) in object_points.iter().zip(image_points).enumerate() {
        let proj = project_point(k, dist, &r, &t, p);
        out[2 * i] = proj[0] - uv[0];
        out[2 * i + 1] = proj[1] - uv[1];
    }
}

/// Central difference of `f` w.r.t. `x[col]`, written into `jac` at `row_offset`.
pub(crate) fn central_difference(
    x: &[f64],
    col: usize,
    rows: usize,
    row_offset: usize,
    jac: &mut faer::Mat<f64>,
    mut f: impl FnMut(&[f64], &mut [f64]),
) {
    let mut xp = x.to_vec();
    let mut r_plus = vec![0.0; rows];
    let mut r_minus = vec![0.0; rows];
    let h = 1e-6 * x[col].abs().max(1.0);
    xp[col] = x[col] + h;
    f(&xp, &mut r_plus);
    xp[col] = x[col] - h;
    f(&xp, &mut r_minus);
    for i in 0..rows {
        jac.write(row_offset + i, col, (r_plus[i] - r_minus[i]) / (2.0 * h));
    }
}

struct MonoProblem<'a> {
    object_points: &'a [[f64; 3]],
    image_points: &'a [Vec<[f64; 2]>],
}

impl MonoProblem<'_> {
    fn view_len(&self) -> usize {
        2 * self.object_points.len()
    }
}

impl LeastSquaresProblem for MonoProblem<'_> {
    fn num_params(&self) -> usize {
        NUM_INTRINSICS + 6 * self.image_points.len()
    }

    fn num_residuals(&self) -> usize {
        self.view_len() * self.image_points.len()
    }

    fn residuals(&self, x: &[f64], out: &mut [f64]) {
        let (k, dist) = unpack_intrinsics(x);
        let n = self.view_len();
        for (v, pts) in self.image_points.iter().enumerate() {
            let pose = &x[NUM_INTRINSICS + 6 * v..NUM_INTRINSICS + 6 * v + 6];
            view_residuals(&k, &dist, pose, self.object_points, pts, &mut out[v * n..(v + 1) * n]);
        }
    }

    fn jacobian(&self, x: &[f64], jac: &mut faer::Mat<f64>) {
        let m = self.num_residuals();
        let n = self.view_len();
        jac.fill_zero();

        // intrinsics touch every residual
        for col in 0..NUM_INTRINSICS {
            central_difference(x, col, m, 0, jac, |xp, out| self.residuals(xp, out));
        }

        // a view pose only touches the residuals of its own view
        let (k, dist) = unpack_intrinsics(x);
        for (v, pts) in self.image_points.iter().enumerate() {
            let base = NUM_INTRINSICS + 6 * v;
            for p in 0..6 {
                central_difference(x, base + p, n, v * n, jac, |xp, out| {
                    view_residuals(&k, &dist, &xp[base..base + 6], self.object_points, pts, out)
                });
            }
        }
    }
}

/// Closed form focal lengths with the principal point fixed at `(cx, cy)`.
///
/// Each homography constrains the image of the absolute conic through the
/// orthogonality and equal norm of its first two columns.
fn init_focal_lengths(homographies: &[Mat33], cx: f64, cy: f64) -> Option<(f64, f64)> {
    let (mut a00, mut a01, mut a11, mut b0, mut b1) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for h in homographies {
        // move the principal point to the origin
        let col = |j: usize| {
            [
                h[0][j] - cx * h[2][j],
                h[1][j] - cy * h[2][j],
                h[2][j],
            ]
        };
        let (h1, h2) = (col(0), col(1));

        let rows = [
            ([h1[0] * h2[0], h1[1] * h2[1]], -h1[2] * h2[2]),
            (
                [h1[0] * h1[0] - h2[0] * h2[0], h1[1] * h1[1] - h2[1] * h2[1]],
                -(h1[2] * h1[2] - h2[2] * h2[2]),
            ),
        ];
        for (a, b) in rows {
            let scale = (a[0] * a[0] + a[1] * a[1] + b * b).sqrt();
            if scale < 1e-15 {
                continue;
            }
            let (a, b) = ([a[0] / scale, a[1] / scale], b / scale);
            a00 += a[0] * a[0];
            a01 += a[0] * a[1];
            a11 += a[1] * a[1];
            b0 += a[0] * b;
            b1 += a[1] * b;
        }
    }

    let det = a00 * a11 - a01 * a01;
    if det.abs() < 1e-15 {
        return None;
    }
    let inv_fx2 = (a11 * b0 - a01 * b1) / det;
    let inv_fy2 = (a00 * b1 - a01 * b0) / det;
    if inv_fx2 <= 0.0 || inv_fy2 <= 0.0 {
        return None;
    }
    Some((1.0 / inv_fx2.sqrt(), 1.0 / inv_fy2.sqrt()))
}

/// Board pose from a homography and the intrinsics.
fn pose_from_homography(k: &CameraMatrix, h: &Mat33) -> Result<(Vec3, Vec3), CalibError> {
    let k_inv = inverse_mat33(&k.to_mat33()).ok_or(CalibError::SingularMatrix("camera matrix"))?;
    let col = |j: usize| mat33_mul_vec3(&k_inv, &[h[0][j], h[1][j], h[2][j]]);
    let (h1, h2, h3) = (col(0), col(1), col(2));

    let norm = 0.5 * (norm_vec3(&h1) + norm_vec3(&h2));
    if norm < 1e-12 {
        return Err(CalibError::Degenerate("homography without scale".to_string()));
    }
    // the board must lie in front of the camera
    let lambda = if h3[2] < 0.0 { -1.0 / norm } else { 1.0 / norm };
    let r1 = h1.map(|v| v * lambda);
    let r2 = h2.map(|v| v * lambda);
    let t = h3.map(|v| v * lambda);
    let r3 = cross_vec3(&r1, &r2);

    let r = nearest_rotation(&[
        [r1[0], r2[0], r3[0]],
        [r1[1], r2[1], r3[1]],
        [r1[2], r2[2], r3[2]],
    ]);
    Ok((rotation_to_rodrigues(&r), t))
}

/// Calibrate a single camera from several views of a planar target.
///
/// The intrinsics are initialised in closed form with the principal point at
/// the image center, the views from their homographies, and everything is
/// then refined by minimizing the reprojection error.
///
/// # Arguments
///
/// * `object_points` - The target points on the `z = 0` plane.
/// * `image_points` - The detected points for each view, in the same order.
/// * `image_size` - The size of the images.
///
/// # Returns
///
/// The intrinsics, distortion, per view poses and the rms reprojection error.
pub fn calibrate_camera(
    object_points: &[[f64; 3]],
    image_points: &[Vec<[f64; 2]>],
    image_size: ImageSize,
) -> Result<MonoCalibration, CalibError> {
    if image_points.len() < 3 {
        return Err(CalibError::NotEnoughPoints {
            required: 3,
            actual: image_points.len(),
        });
    }
    if let Some(view) = image_points.iter().find(|v| v.len() != object_points.len()) {
        return Err(CalibError::MismatchedLengths(view.len(), object_points.len()));
    }
    if object_points.iter().any(|p| p[2].abs() > 1e-9) {
        return Err(CalibError::Degenerate("calibration target must be planar".to_string()));
    }

    let plane = object_points.iter().map(|p| [p[0], p[1]]).collect::<Vec<_>>();
    let homographies = image_points
        .iter()
        .map(|pts| find_homography_dlt(&plane, pts))
        .collect::<Result<Vec<_>, _>>()?;

    let cx = (image_size.width as f64 - 1.0) * 0.5;
    let cy = (image_size.height as f64 - 1.0) * 0.5;
    let (fx, fy) = init_focal_lengths(&homographies, cx, cy).unwrap_or_else(|| {
        log::warn!("could not initialise the focal length, views may be fronto-parallel");
        let f = image_size.width.max(image_size.height) as f64;
        (f, f)
    });
    let k_init = CameraMatrix { fx, fy, cx, cy };
    log::debug!("initial focal lengths: fx={fx:.2} fy={fy:.2}");

    let mut x = vec![fx, fy, cx, cy, 0.0, 0.0, 0.0, 0.0, 0.0];
    for h in &homographies {
        let (rvec, t) = pose_from_homography(&k_init, h)?;
        x.extend_from_slice(&rvec);
        x.extend_from_slice(&t);
    }

    let problem = MonoProblem {
        object_points,
        image_points,
    };
    let params = LMParams {
        max_iters: 100,
        ..Default::default()
    };
    let report = levenberg_marquardt(&problem, &mut x, &params)?;

    let (camera_matrix, distortion) = unpack_intrinsics(&x);
    let (rvecs, tvecs) = x[NUM_INTRINSICS..]
        .chunks_exact(6)
        .map(|p| ([p[0], p[1], p[2]], [p[3], p[4], p[5]]))
        .unzip();

    // rms over points, as a pixel distance
    let num_points = (problem.num_residuals() / 2) as f64;
    let rms = (report.cost / num_points).sqrt();
    log::info!(
        "camera calibrated: fx={:.2} fy={:.2} cx={:.2} cy={:.2}, rms {:.4} px",
        camera_matrix.fx,
        camera_matrix.fy,
        camera_matrix.cx,
        camera_matrix.cy,
        rms
    );

    Ok(MonoCalibration {
        camera_matrix,
        distortion,
        rvecs,
        tvecs,
        rms,
    })
}
