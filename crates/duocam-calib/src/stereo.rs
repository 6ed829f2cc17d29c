use crate::camera::{project_point, CameraMatrix, Distortion};
use crate::error::CalibError;
use crate::linalg::{
    inverse_mat33, mat33_mul, mat33_mul_vec3, mat33_transpose, median, rodrigues,
    rotation_to_rodrigues, skew, Mat33, Vec3,
};
use crate::lm::{levenberg_marquardt, LMParams, LeastSquaresProblem};
use crate::mono::{central_difference, view_residuals, MonoCalibration};

/// Relative pose of the second camera and the derived epipolar geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoExtrinsics {
    /// Rotation from the first to the second camera frame.
    pub rotation: Mat33,
    /// Translation from the first to the second camera frame.
    pub translation: Vec3,
    /// Essential matrix `[T]x R`.
    pub essential: Mat33,
    /// Fundamental matrix `K2^-T E K1^-1`, scaled so its last element is one.
    pub fundamental: Mat33,
    /// Root mean square reprojection error over both cameras, in pixels.
    pub rms: f64,
}

struct StereoProblem<'a> {
    object_points: &'a [[f64; 3]],
    image_points1: &'a [Vec<[f64; 2]>],
    image_points2: &'a [Vec<[f64; 2]>],
    k1: CameraMatrix,
    d1: Distortion,
    k2: CameraMatrix,
    d2: Distortion,
}

impl StereoProblem<'_> {
    /// Residuals of one view pair: first camera then second camera.
    fn pair_residuals(&self, rel: &[f64], pose: &[f64], v: usize, out: &mut [f64]) {
        let n = 2 * self.object_points.len();
        view_residuals(
            &self.k1,
            &self.d1,
            pose,
            self.object_points,
            &self.image_points1[v],
            &mut out[..n],
        );

        let r = rodrigues(&[rel[0], rel[1], rel[2]]);
        let r1 = rodrigues(&[pose[0], pose[1], pose[2]]);
        let rt1 = mat33_mul_vec3(&r, &[pose[3], pose[4], pose[5]]);
        let r2 = mat33_mul(&r, &r1);
        let t2 = [rt1[0] + rel[3], rt1[1] + rel[4], rt1[2] + rel[5]];
        for (i, (p, uv)) in self.object_points.iter().zip(&self.image_points2[v]).enumerate() {
            let proj = project_point(&self.k2, &self.d2, &r2, &t2, p);
            out[n + 2 * i] = proj[0] - uv[0];
            out[n + 2 * i + 1] = proj[1] - uv[1];
        }
    }

    fn pair_len(&self) -> usize {
        4 * self.object_points.len()
    }
}

impl LeastSquaresProblem for StereoProblem<'_> {
    fn num_params(&self) -> usize {
        6 + 6 * self.image_points1.len()
    }

    fn num_residuals(&self) -> usize {
        self.pair_len() * self.image_points1.len()
    }

    fn residuals(&self, x: &[f64], out: &mut [f64]) {
        let n = self.pair_len();
        for v in 0..self.image_points1.len() {
            let pose = &x[6 + 6 * v..12 + 6 * v];
            self.pair_residuals(&x[..6], pose, v, &mut out[v * n..(v + 1) * n]);
        }
    }

    fn jacobian(&self, x: &[f64], jac: &mut faer::Mat<f64>) {
        let m = self.num_residuals();
        let n = self.pair_len();
        jac.fill_zero();

        for col in 0..6 {
            central_difference(x, col, m, 0, jac, |xp, out| self.residuals(xp, out));
        }
        for v in 0..self.image_points1.len() {
            let base = 6 + 6 * v;
            for p in 0..6 {
                central_difference(x, base + p, n, v * n, jac, |xp, out| {
                    self.pair_residuals(&x[..6], &xp[base..base + 6], v, out)
                });
            }
        }
    }
}

/// Calibrate the relative pose of two cameras with their intrinsics held fixed.
///
/// The pose is initialised with the median of the per view relative poses and
/// refined jointly with the board poses seen by the first camera.
///
/// # Arguments
///
/// * `object_points` - The target points on the `z = 0` plane.
/// * `image_points1` - The points detected by the first camera, per view.
/// * `image_points2` - The points detected by the second camera, per view.
/// * `mono1` - The calibration of the first camera.
/// * `mono2` - The calibration of the second camera.
pub fn stereo_calibrate(
    object_points: &[[f64; 3]],
    image_points1: &[Vec<[f64; 2]>],
    image_points2: &[Vec<[f64; 2]>],
    mono1: &MonoCalibration,
    mono2: &MonoCalibration,
) -> Result<StereoExtrinsics, CalibError> {
    let num_views = image_points1.len();
    if image_points2.len() != num_views {
        return Err(CalibError::MismatchedLengths(num_views, image_points2.len()));
    }
    if mono1.rvecs.len() != num_views || mono2.rvecs.len() != num_views {
        return Err(CalibError::MismatchedLengths(num_views, mono1.rvecs.len().min(mono2.rvecs.len())));
    }
    if num_views == 0 {
        return Err(CalibError::NotEnoughPoints {
            required: 1,
            actual: 0,
        });
    }

    // per view relative pose: R = R2 R1^T, T = t2 - R t1
    let mut oms = Vec::with_capacity(num_views);
    let mut ts = Vec::with_capacity(num_views);
    for v in 0..num_views {
        let r1 = rodrigues(&mono1.rvecs[v]);
        let r2 = rodrigues(&mono2.rvecs[v]);
        let r = mat33_mul(&r2, &mat33_transpose(&r1));
        let rt1 = mat33_mul_vec3(&r, &mono1.tvecs[v]);
        let t2 = mono2.tvecs[v];
        oms.push(rotation_to_rodrigues(&r));
        ts.push([t2[0] - rt1[0], t2[1] - rt1[1], t2[2] - rt1[2]]);
    }
    let component = |vs: &[Vec3], i: usize| median(&vs.iter().map(|v| v[i]).collect::<Vec<_>>());

    let mut x = Vec::with_capacity(6 + 6 * num_views);
    x.extend((0..3).map(|i| component(&oms, i)));
    x.extend((0..3).map(|i| component(&ts, i)));
    for v in 0..num_views {
        x.extend_from_slice(&mono1.rvecs[v]);
        x.extend_from_slice(&mono1.tvecs[v]);
    }

    let problem = StereoProblem {
        object_points,
        image_points1,
        image_points2,
        k1: mono1.camera_matrix,
        d1: mono1.distortion,
        k2: mono2.camera_matrix,
        d2: mono2.distortion,
    };
    let report = levenberg_marquardt(&problem, &mut x, &LMParams::default())?;

    let rotation = rodrigues(&[x[0], x[1], x[2]]);
    let translation = [x[3], x[4], x[5]];
    let essential = mat33_mul(&skew(&translation), &rotation);
    let fundamental = fundamental_from_essential(&essential, &mono1.camera_matrix, &mono2.camera_matrix)?;

    let rms = (report.cost / (problem.num_residuals() / 2) as f64).sqrt();
    log::info!(
        "stereo calibrated: T=({:.3}, {:.3}, {:.3}), rms {:.4} px",
        translation[0],
        translation[1],
        translation[2],
        rms
    );

    Ok(StereoExtrinsics {
        rotation,
        translation,
        essential,
        fundamental,
        rms,
    })
}

/// Compute `F = K2^-T E K1^-1`, normalized so that `F[2][2] = 1` when possible.
pub fn fundamental_from_essential(
    essential: &Mat33,
    k1: &CameraMatrix,
    k2: &CameraMatrix,
) -> Result<Mat33, CalibError> {
    let k1_inv = inverse_mat33(&k1.to_mat33()).ok_or(CalibError::SingularMatrix("camera matrix 1"))?;
    let k2_inv = inverse_mat33(&k2.to_mat33()).ok_or(CalibError::SingularMatrix("camera matrix 2"))?;
    let mut f = mat33_mul(&mat33_mul(&mat33_transpose(&k2_inv), essential), &k1_inv);
    if f[2][2].abs() > f64::EPSILON {
        let s = 1.0 / f[2][2];
        f.iter_mut().flatten().for_each(|v| *v *= s);
    }
    Ok(f)
}
