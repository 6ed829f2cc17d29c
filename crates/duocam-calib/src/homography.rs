use crate::error::CalibError;
use crate::linalg::{self, Mat33};

/// Similarity transform moving the centroid to the origin with mean distance sqrt(2).
fn normalize_points_2d(x: &[[f64; 2]]) -> (Vec<[f64; 2]>, Mat33) {
    let n = x.len() as f64;
    let (mx, my) = x
        .iter()
        .fold((0.0, 0.0), |acc, p| (acc.0 + p[0], acc.1 + p[1]));
    let (mx, my) = (mx / n, my / n);

    let mean_dist = x
        .iter()
        .map(|p| ((p[0] - mx).powi(2) + (p[1] - my).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let scale = if mean_dist > 0.0 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let xn = x
        .iter()
        .map(|p| [(p[0] - mx) * scale, (p[1] - my) * scale])
        .collect();
    let t = [
        [scale, 0.0, -scale * mx],
        [0.0, scale, -scale * my],
        [0.0, 0.0, 1.0],
    ];
    (xn, t)
}

/// Estimate the homography mapping `src` to `dst` with the normalized DLT.
///
/// # Arguments
///
/// * `src` - The source 2d points, at least four.
/// * `dst` - The destination 2d points.
///
/// # Returns
///
/// The homography normalized so that its last element is one.
pub fn find_homography_dlt(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Mat33, CalibError> {
    if src.len() != dst.len() {
        return Err(CalibError::MismatchedLengths(src.len(), dst.len()));
    }
    if src.len() < 4 {
        return Err(CalibError::NotEnoughPoints {
            required: 4,
            actual: src.len(),
        });
    }

    let (src_n, t_src) = normalize_points_2d(src);
    let (dst_n, t_dst) = normalize_points_2d(dst);

    // construct matrix A with two rows per correspondence
    let n = src.len();
    let mut mat_a = faer::Mat::<f64>::zeros(2 * n, 9);
    for (i, (s, d)) in src_n.iter().zip(dst_n.iter()).enumerate() {
        let (x, y) = (s[0], s[1]);
        let (u, v) = (d[0], d[1]);
        mat_a.write(2 * i, 0, x);
        mat_a.write(2 * i, 1, y);
        mat_a.write(2 * i, 2, 1.0);
        mat_a.write(2 * i, 6, -u * x);
        mat_a.write(2 * i, 7, -u * y);
        mat_a.write(2 * i, 8, -u);

        mat_a.write(2 * i + 1, 3, x);
        mat_a.write(2 * i + 1, 4, y);
        mat_a.write(2 * i + 1, 5, 1.0);
        mat_a.write(2 * i + 1, 6, -v * x);
        mat_a.write(2 * i + 1, 7, -v * y);
        mat_a.write(2 * i + 1, 8, -v);
    }

    // the solution is the right singular vector of the smallest singular value
    let svd = mat_a.svd();
    let h = svd.v().col(8);
    let h_norm = [[h[0], h[1], h[2]], [h[3], h[4], h[5]], [h[6], h[7], h[8]]];

    // denormalize: H = T_dst^-1 * H_norm * T_src
    let t_dst_inv = linalg::inverse_mat33(&t_dst).ok_or(CalibError::SingularMatrix("homography"))?;
    let mut homo = linalg::mat33_mul(&linalg::mat33_mul(&t_dst_inv, &h_norm), &t_src);

    if homo[2][2].abs() < 1e-12 || linalg::det_mat33(&homo).abs() < 1e-12 {
        return Err(CalibError::Degenerate("homography is singular".to_string()));
    }
    linalg::normalize_mat33_inplace(&mut homo);

    Ok(homo)
}

/// Apply a homography to a 2d point.
pub fn transform_point(h: &Mat33, p: &[f64; 2]) -> [f64; 2] {
    let w = h[2][0] * p[0] + h[2][1] * p[1] + h[2][2];
    [
        (h[0][0] * p[0] + h[0][1] * p[1] + h[0][2]) / w,
        (h[1][0] * p[0] + h[1][1] * p[1] + h[1][2]) / w,
    ]
}
