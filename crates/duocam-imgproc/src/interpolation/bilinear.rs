use duocam_image::Image;

#[inline]
fn fetch<const C: usize>(data: &[f32], cols: usize, rows: usize, x: i64, y: i64, c: usize) -> f32 {
    if x < 0 || y < 0 || x >= cols as i64 || y >= rows as i64 {
        return 0.0;
    }
    data[(y as usize * cols + x as usize) * C + c]
}

/// Kernel for bilinear interpolation
///
/// # Arguments
///
/// * `image` - The input image container.
/// * `u` - The x coordinate of the pixel to interpolate.
/// * `v` - The y coordinate of the pixel to interpolate.
/// * `c` - The channel of the pixel to interpolate.
///
/// # Returns
///
/// The interpolated pixel value. Neighbours outside of the image contribute zero.
pub(crate) fn bilinear_interpolation<const C: usize>(
    image: &Image<f32, C>,
    u: f32,
    v: f32,
    c: usize,
) -> f32 {
    let (rows, cols) = (image.rows(), image.cols());
    if !(u > -1.0 && v > -1.0 && u < cols as f32 && v < rows as f32) {
        return 0.0;
    }

    let u0 = u.floor();
    let v0 = v.floor();
    let frac_u = u - u0;
    let frac_v = v - v0;
    let (iu, iv) = (u0 as i64, v0 as i64);

    let data = image.as_slice();
    let p00 = fetch::<C>(data, cols, rows, iu, iv, c);
    let p01 = fetch::<C>(data, cols, rows, iu + 1, iv, c);
    let p10 = fetch::<C>(data, cols, rows, iu, iv + 1, c);
    let p11 = fetch::<C>(data, cols, rows, iu + 1, iv + 1, c);

    p00 * (1.0 - frac_u) * (1.0 - frac_v)
        + p01 * frac_u * (1.0 - frac_v)
        + p10 * (1.0 - frac_u) * frac_v
        + p11 * frac_u * frac_v
}

/// Sample a single channel image at a sub-pixel location.
///
/// Coordinates are clamped to the image so the result is always defined,
/// which is what iterative refinement around a corner needs.
pub fn bilinear_sample(image: &Image<f32, 1>, u: f32, v: f32) -> f32 {
    let max_u = image.cols().saturating_sub(1) as f32;
    let max_v = image.rows().saturating_sub(1) as f32;
    let u = u.clamp(0.0, max_u);
    let v = v.clamp(0.0, max_v);
    bilinear_interpolation(image, u, v, 0)
}
