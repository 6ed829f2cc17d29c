//! Row-major `[[f64; 3]; 3]` helpers used across the calibration code.

/// A 3x3 row-major matrix.
pub type Mat33 = [[f64; 3]; 3];

/// A 3d vector.
pub type Vec3 = [f64; 3];

/// The 3x3 identity matrix.
pub const IDENTITY: Mat33 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Multiply two 3x3 matrices.
pub fn mat33_mul(a: &Mat33, b: &Mat33) -> Mat33 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    out
}

/// Transpose a 3x3 matrix.
pub fn mat33_transpose(a: &Mat33) -> Mat33 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in a.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            out[j][i] = *v;
        }
    }
    out
}

/// Multiply a 3x3 matrix by a 3d vector.
pub fn mat33_mul_vec3(a: &Mat33, v: &Vec3) -> Vec3 {
    [
        a[0][0] * v[0] + a[0][1] * v[1] + a[0][2] * v[2],
        a[1][0] * v[0] + a[1][1] * v[1] + a[1][2] * v[2],
        a[2][0] * v[0] + a[2][1] * v[1] + a[2][2] * v[2],
    ]
}

/// Compute the determinant of a 3x3 matrix.
pub fn det_mat33(m: &Mat33) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Invert a 3x3 matrix with the adjugate formula.
///
/// Returns `None` when the determinant is too close to zero.
pub fn inverse_mat33(m: &Mat33) -> Option<Mat33> {
    let det = det_mat33(m);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ])
}

/// Scale a 3x3 matrix so that its last element is one.
pub fn normalize_mat33_inplace(m: &mut Mat33) {
    let s = m[2][2];
    if s.abs() > f64::EPSILON {
        m.iter_mut().flatten().for_each(|v| *v /= s);
    }
}

/// Cross product of two 3d vectors.
pub fn cross_vec3(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Dot product of two 3d vectors.
pub fn dot_vec3(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Euclidean norm of a 3d vector.
pub fn norm_vec3(a: &Vec3) -> f64 {
    dot_vec3(a, a).sqrt()
}

/// Skew symmetric cross product matrix `[v]x`.
pub fn skew(v: &Vec3) -> Mat33 {
    [[0.0, -v[2], v[1]], [v[2], 0.0, -v[0]], [-v[1], v[0], 0.0]]
}

/// Convert an axis-angle vector to a rotation matrix (Rodrigues formula).
pub fn rodrigues(rvec: &Vec3) -> Mat33 {
    let theta = norm_vec3(rvec);
    let k = skew(rvec);
    let k2 = mat33_mul(&k, &k);
    let (a, b) = if theta < 1e-8 {
        // second order expansion around the identity
        (1.0 - theta * theta / 6.0, 0.5 - theta * theta / 24.0)
    } else {
        (theta.sin() / theta, (1.0 - theta.cos()) / (theta * theta))
    };
    let mut r = IDENTITY;
    for i in 0..3 {
        for j in 0..3 {
            r[i][j] += a * k[i][j] + b * k2[i][j];
        }
    }
    r
}

/// Convert a rotation matrix to an axis-angle vector.
pub fn rotation_to_rodrigues(r: &Mat33) -> Vec3 {
    let trace = r[0][0] + r[1][1] + r[2][2];
    let cos_theta = ((trace - 1.0) * 0.5).clamp(-1.0, 1.0);
    let theta = cos_theta.acos();
    let w = [r[2][1] - r[1][2], r[0][2] - r[2][0], r[1][0] - r[0][1]];

    if theta < 1e-8 {
        return [w[0] * 0.5, w[1] * 0.5, w[2] * 0.5];
    }

    if std::f64::consts::PI - theta < 1e-5 {
        // near pi the antisymmetric part vanishes, recover the axis from R + I
        let b = [
            [(r[0][0] + 1.0) * 0.5, (r[0][1] + r[1][0]) * 0.25, (r[0][2] + r[2][0]) * 0.25],
            [(r[1][0] + r[0][1]) * 0.25, (r[1][1] + 1.0) * 0.5, (r[1][2] + r[2][1]) * 0.25],
            [(r[2][0] + r[0][2]) * 0.25, (r[2][1] + r[1][2]) * 0.25, (r[2][2] + 1.0) * 0.5],
        ];
        let i = (0..3)
            .max_by(|&a, &c| b[a][a].total_cmp(&b[c][c]))
            .unwrap_or(0);
        let d = b[i][i].max(0.0).sqrt();
        if d < 1e-12 {
            return [0.0; 3];
        }
        let mut axis = [b[0][i] / d, b[1][i] / d, b[2][i] / d];
        axis[i] = d;
        let n = norm_vec3(&axis);
        // keep the sign consistent with the residual antisymmetric part
        let sign = if dot_vec3(&axis, &w) < 0.0 { -1.0 } else { 1.0 };
        return [
            sign * axis[0] / n * theta,
            sign * axis[1] / n * theta,
            sign * axis[2] / n * theta,
        ];
    }

    let s = theta / (2.0 * theta.sin());
    [w[0] * s, w[1] * s, w[2] * s]
}

/// Convert a fixed size matrix to a faer matrix.
pub fn to_faer_mat3(m: &Mat33) -> faer::Mat<f64> {
    faer::mat![
        [m[0][0], m[0][1], m[0][2]],
        [m[1][0], m[1][1], m[1][2]],
        [m[2][0], m[2][1], m[2][2]]
    ]
}

/// Convert a 3x3 faer matrix to a fixed size matrix.
pub fn from_faer_mat3(m: &faer::Mat<f64>) -> Mat33 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = m.read(i, j);
        }
    }
    out
}

/// Project a matrix onto the closest rotation in the Frobenius sense.
pub fn nearest_rotation(m: &Mat33) -> Mat33 {
    let svd = to_faer_mat3(m).svd();
    let u = svd.u();
    let v = svd.v();
    let mut r = [[0.0; 3]; 3];
    for (i, row) in r.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = (0..3).map(|k| u.read(i, k) * v.read(j, k)).sum();
        }
    }
    if det_mat33(&r) < 0.0 {
        // flip the direction of the weakest singular vector
        for (i, row) in r.iter_mut().enumerate() {
            for (j, val) in row.iter_mut().enumerate() {
                *val -= 2.0 * u.read(i, 2) * v.read(j, 2);
            }
        }
    }
    r
}

/// Median of a slice of values, `0.0` for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_mat33_eq(a: &Mat33, b: &Mat33, eps: f64) {
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(a[i][j], b[i][j], epsilon = eps);
            }
        }
    }

    #[test]
    fn test_inverse_mat33() {
        let m = [[2.0, 0.0, 1.0], [1.0, 3.0, 0.0], [0.0, 1.0, 4.0]];
        let inv = inverse_mat33(&m).expect("invertible");
        assert_mat33_eq(&mat33_mul(&m, &inv), &IDENTITY, 1e-12);
        assert!(inverse_mat33(&[[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]]).is_none());
    }

    #[test]
    fn test_rodrigues_roundtrip() {
        for rvec in [
            [0.1, -0.2, 0.3],
            [0.0, 0.0, 0.0],
            [1e-10, 0.0, 0.0],
            [0.0, 3.0, 0.5],
            [0.0, std::f64::consts::PI - 1e-7, 0.0],
        ] {
            let r = rodrigues(&rvec);
            assert_relative_eq!(det_mat33(&r), 1.0, epsilon = 1e-9);
            let back = rotation_to_rodrigues(&r);
            assert_mat33_eq(&rodrigues(&back), &r, 1e-6);
        }
    }

    #[test]
    fn test_rodrigues_axis() {
        let r = rodrigues(&[0.0, 0.0, std::f64::consts::FRAC_PI_2]);
        let v = mat33_mul_vec3(&r, &[1.0, 0.0, 0.0]);
        assert_relative_eq!(v[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(v[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nearest_rotation() {
        let r = rodrigues(&[0.2, 0.1, -0.4]);
        let mut noisy = r;
        noisy[0][1] += 1e-3;
        noisy[2][0] -= 1e-3;
        let fixed = nearest_rotation(&noisy);
        assert_relative_eq!(det_mat33(&fixed), 1.0, epsilon = 1e-9);
        assert_mat33_eq(&fixed, &r, 2e-3);
        let rrt = mat33_mul(&fixed, &mat33_transpose(&fixed));
        assert_mat33_eq(&rrt, &IDENTITY, 1e-9);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }
}
