use duocam_image::{Image, ImageSize};
use duocam_imgproc::parallel;

use crate::camera::{undistort_pixel, CameraMatrix, Distortion};
use crate::error::CalibError;
use crate::linalg::{
    cross_vec3, inverse_mat33, mat33_mul, mat33_mul_vec3, mat33_transpose, norm_vec3, rodrigues,
    rotation_to_rodrigues, Mat33, Vec3,
};
use crate::types::RectifyMaps;

/// A 3x4 projection matrix.
pub type Mat34 = [[f64; 4]; 3];

/// A 4x4 matrix, used for the disparity to depth mapping.
pub type Mat44 = [[f64; 4]; 4];

/// Rectifying transforms of a calibrated stereo pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Rectification {
    /// Rectifying rotation of the first camera.
    pub r1: Mat33,
    /// Rectifying rotation of the second camera.
    pub r2: Mat33,
    /// Projection matrix of the first rectified camera.
    pub p1: Mat34,
    /// Projection matrix of the second rectified camera, holding the baseline.
    pub p2: Mat34,
    /// Disparity to depth mapping matrix.
    pub q: Mat44,
}

/// Compute the rectification of a stereo pair so that epipolar lines become
/// horizontal (or vertical for a vertical baseline) scanlines.
///
/// Both cameras are rotated half way towards each other, then a common
/// rotation aligns the baseline with the image axis. The rectified cameras
/// share the averaged focal length and principal point, so corresponding
/// points at infinity have zero disparity.
///
/// # Arguments
///
/// * `k1` - The intrinsics of the first camera.
/// * `d1` - The distortion of the first camera.
/// * `k2` - The intrinsics of the second camera.
/// * `d2` - The distortion of the second camera.
/// * `image_size` - The size of the images.
/// * `rotation` - The rotation from the first to the second camera.
/// * `translation` - The translation from the first to the second camera.
pub fn stereo_rectify(
    k1: &CameraMatrix,
    d1: &Distortion,
    k2: &CameraMatrix,
    d2: &Distortion,
    image_size: ImageSize,
    rotation: &Mat33,
    translation: &Vec3,
) -> Result<Rectification, CalibError> {
    // half rotation for each camera
    let om = rotation_to_rodrigues(rotation).map(|v| v * -0.5);
    let r_r = rodrigues(&om);
    let t = mat33_mul_vec3(&r_r, translation);

    let idx = if t[0].abs() > t[1].abs() { 0 } else { 1 };
    let c = t[idx];
    let nt = norm_vec3(&t);
    if nt < f64::EPSILON {
        return Err(CalibError::Degenerate("zero baseline".to_string()));
    }
    let mut uu = [0.0; 3];
    uu[idx] = if c > 0.0 { 1.0 } else { -1.0 };

    // global rotation aligning the baseline with the image axis
    let mut ww = cross_vec3(&t, &uu);
    let nw = norm_vec3(&ww);
    if nw > 0.0 {
        let s = (c.abs() / nt).acos() / nw;
        ww = ww.map(|v| v * s);
    }
    let w_r = rodrigues(&ww);

    let r1 = mat33_mul(&w_r, &mat33_transpose(&r_r));
    let r2 = mat33_mul(&w_r, &r_r);
    let t_rect = mat33_mul_vec3(&r2, translation);

    let other = idx ^ 1;
    let k1m = k1.to_mat33();
    let k2m = k2.to_mat33();
    let fc_new = (k1m[other][other] + k2m[other][other]) * 0.5;

    // principal points that keep the image corners centered
    let (nx, ny) = (image_size.width as f64, image_size.height as f64);
    let corners = [[0.0, 0.0], [nx - 1.0, 0.0], [0.0, ny - 1.0], [nx - 1.0, ny - 1.0]];
    let mut cc_new = [[0.0; 2]; 2];
    for (cam, (k, d, r)) in [(k1, d1, &r1), (k2, d2, &r2)].into_iter().enumerate() {
        let mut avg = [0.0, 0.0];
        for corner in &corners {
            let [x, y] = undistort_pixel(k, d, corner[0], corner[1]);
            let p = mat33_mul_vec3(r, &[x, y, 1.0]);
            avg[0] += fc_new * p[0] / p[2] / 4.0;
            avg[1] += fc_new * p[1] / p[2] / 4.0;
        }
        cc_new[cam] = [(nx - 1.0) / 2.0 - avg[0], (ny - 1.0) / 2.0 - avg[1]];
    }
    let cc = [
        (cc_new[0][0] + cc_new[1][0]) * 0.5,
        (cc_new[0][1] + cc_new[1][1]) * 0.5,
    ];

    let p1 = [
        [fc_new, 0.0, cc[0], 0.0],
        [0.0, fc_new, cc[1], 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ];
    let mut p2 = p1;
    p2[idx][3] = t_rect[idx] * fc_new;

    let q = [
        [1.0, 0.0, 0.0, -cc[0]],
        [0.0, 1.0, 0.0, -cc[1]],
        [0.0, 0.0, 0.0, fc_new],
        [0.0, 0.0, -1.0 / t_rect[idx], 0.0],
    ];

    log::debug!(
        "rectified with focal {fc_new:.2}, principal point ({:.2}, {:.2}), baseline {:.3}",
        cc[0],
        cc[1],
        t_rect[idx]
    );

    Ok(Rectification { r1, r2, p1, p2, q })
}

/// Compute the undistortion and rectification maps of a camera.
///
/// For each pixel of the rectified image the maps hold the location to sample
/// in the source image, to be used with a bilinear remap.
///
/// # Arguments
///
/// * `k` - The intrinsics of the camera.
/// * `dist` - The lens distortion.
/// * `r` - The rectifying rotation.
/// * `p` - The projection matrix of the rectified camera.
/// * `size` - The size of the maps.
pub fn init_undistort_rectify_map(
    k: &CameraMatrix,
    dist: &Distortion,
    r: &Mat33,
    p: &Mat34,
    size: ImageSize,
) -> Result<RectifyMaps, CalibError> {
    let new_k = [
        [p[0][0], p[0][1], p[0][2]],
        [p[1][0], p[1][1], p[1][2]],
        [p[2][0], p[2][1], p[2][2]],
    ];
    let ir = inverse_mat33(&mat33_mul(&new_k, r)).ok_or(CalibError::SingularMatrix("rectified projection"))?;

    let mut map_x = Image::<f32, 1>::from_size_val(size, 0.0)?;
    let mut map_y = Image::<f32, 1>::from_size_val(size, 0.0)?;

    let source = |x: usize, y: usize| {
        let (u, v) = (x as f64, y as f64);
        let q = mat33_mul_vec3(&ir, &[u, v, 1.0]);
        let [xd, yd] = dist.distort(q[0] / q[2], q[1] / q[2]);
        k.to_pixel(xd, yd)
    };
    parallel::par_fill_rows(&mut map_x, |x, y| source(x, y)[0] as f32);
    parallel::par_fill_rows(&mut map_y, |x, y| source(x, y)[1] as f32);

    Ok(RectifyMaps { map_x, map_y })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::project_camera_point;
    use approx::assert_relative_eq;

    fn camera() -> CameraMatrix {
        CameraMatrix {
            fx: 500.0,
            fy: 500.0,
            cx: 320.0,
            cy: 240.0,
        }
    }

    #[test]
    fn test_rectify_parallel_rig() -> Result<(), CalibError> {
        let k = camera();
        let d = Distortion::default();
        let rect = stereo_rectify(&k, &d, &k, &d, [640, 480].into(), &crate::linalg::IDENTITY, &[-10.0, 0.0, 0.0])?;

        // an ideal rig only needs identity rotations
        for i in 0..3 {
            for j in 0..3 {
                let e = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(rect.r1[i][j], e, epsilon = 1e-12);
                assert_relative_eq!(rect.r2[i][j], e, epsilon = 1e-12);
            }
        }
        assert_relative_eq!(rect.p1[0][0], 500.0);
        assert_relative_eq!(rect.p2[0][3], -5000.0, epsilon = 1e-9);
        assert_relative_eq!(rect.q[2][3], 500.0);
        assert_relative_eq!(rect.q[3][2], 0.1, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_rectify_aligns_rows() -> Result<(), CalibError> {
        let k = camera();
        let d = Distortion::default();
        let rotation = rodrigues(&[0.01, 0.03, -0.02]);
        let translation = [-12.0, 0.4, 0.3];
        let rect = stereo_rectify(&k, &d, &k, &d, [640, 480].into(), &rotation, &translation)?;

        // project the same world point with both rectified cameras
        for pw in [[5.0, 3.0, 120.0], [-20.0, -10.0, 300.0], [0.0, 15.0, 80.0]] {
            let p2 = {
                let rp = mat33_mul_vec3(&rotation, &pw);
                [rp[0] + translation[0], rp[1] + translation[1], rp[2] + translation[2]]
            };
            let q1 = mat33_mul_vec3(&rect.r1, &pw);
            let q2 = mat33_mul_vec3(&rect.r2, &p2);
            let kr = CameraMatrix {
                fx: rect.p1[0][0],
                fy: rect.p1[1][1],
                cx: rect.p1[0][2],
                cy: rect.p1[1][2],
            };
            let uv1 = project_camera_point(&kr, &d, &q1);
            let uv2 = project_camera_point(&kr, &d, &q2);
            assert_relative_eq!(uv1[1], uv2[1], epsilon = 1e-6);
            assert!(uv1[0] > uv2[0]);
        }
        Ok(())
    }

    #[test]
    fn test_undistort_rectify_map_identity() -> Result<(), CalibError> {
        let k = camera();
        let p = [
            [k.fx, 0.0, k.cx, 0.0],
            [0.0, k.fy, k.cy, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ];
        let maps = init_undistort_rectify_map(
            &k,
            &Distortion::default(),
            &crate::linalg::IDENTITY,
            &p,
            [64, 48].into(),
        )?;
        assert_eq!(maps.map_x.size(), ImageSize { width: 64, height: 48 });
        assert_relative_eq!(*maps.map_x.get_pixel(10, 20, 0)?, 10.0, epsilon = 1e-4);
        assert_relative_eq!(*maps.map_y.get_pixel(10, 20, 0)?, 20.0, epsilon = 1e-4);
        Ok(())
    }

    #[test]
    fn test_undistort_rectify_map_distortion() -> Result<(), CalibError> {
        let k = camera();
        let dist = Distortion {
            k1: -0.2,
            ..Default::default()
        };
        let p = [
            [k.fx, 0.0, k.cx, 0.0],
            [0.0, k.fy, k.cy, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ];
        let maps = init_undistort_rectify_map(&k, &dist, &crate::linalg::IDENTITY, &p, [640, 480].into())?;
        // barrel distortion pulls the corners towards the center
        assert!(*maps.map_x.get_pixel(0, 0, 0)? > 0.0);
        assert!(*maps.map_y.get_pixel(0, 0, 0)? > 0.0);
        assert_relative_eq!(*maps.map_x.get_pixel(320, 240, 0)?, 320.0, epsilon = 1e-4);
        Ok(())
    }
}
