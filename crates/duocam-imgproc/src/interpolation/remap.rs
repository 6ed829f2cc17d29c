use rayon::prelude::*;

use super::interpolate::{interpolate_pixel, InterpolationMode};
use crate::parallel;
use duocam_image::{Image, ImageError};

fn check_maps(
    dst_size: duocam_image::ImageSize,
    map_x: &Image<f32, 1>,
    map_y: &Image<f32, 1>,
) -> Result<(), ImageError> {
    if map_x.size() != map_y.size() {
        return Err(ImageError::InvalidImageSize(
            map_x.cols(),
            map_x.rows(),
            map_y.cols(),
            map_y.rows(),
        ));
    }
    if dst_size != map_x.size() {
        return Err(ImageError::InvalidImageSize(
            map_x.cols(),
            map_x.rows(),
            dst_size.width,
            dst_size.height,
        ));
    }
    Ok(())
}

/// Apply generic geometric transformation to an image.
///
/// # Arguments
///
/// * `src` - The input image container with shape (height, width, C).
/// * `dst` - The output image container with shape (height, width, C).
/// * `map_x` - The x coordinates of the pixels to interpolate.
/// * `map_y` - The y coordinates of the pixels to interpolate.
/// * `interpolation` - The interpolation mode to use.
///
/// # Errors
///
/// * The mapx and mapy must have the same size.
/// * The output image must have the same size as the mapx and mapy.
pub fn remap<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    map_x: &Image<f32, 1>,
    map_y: &Image<f32, 1>,
    interpolation: InterpolationMode,
) -> Result<(), ImageError> {
    check_maps(dst.size(), map_x, map_y)?;

    // parallelize the remap operation by rows
    parallel::par_iter_rows_resample(dst, map_x, map_y, |&x, &y, dst_pixel| {
        dst_pixel.iter_mut().enumerate().for_each(|(c, pixel)| {
            *pixel = interpolate_pixel(src, x, y, c, interpolation);
        });
    });

    Ok(())
}

/// Apply a geometric transformation to an 8-bit image with bilinear interpolation.
///
/// This is the per-frame path used to undistort and rectify camera frames with
/// precomputed maps. Samples outside of the source are set to zero.
pub fn remap_u8<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    map_x: &Image<f32, 1>,
    map_y: &Image<f32, 1>,
) -> Result<(), ImageError> {
    check_maps(dst.size(), map_x, map_y)?;

    let (cols, rows) = (src.cols() as i64, src.rows() as i64);
    let src_data = src.as_slice();
    let fetch = |x: i64, y: i64, c: usize| -> f32 {
        if x < 0 || y < 0 || x >= cols || y >= rows {
            0.0
        } else {
            src_data[((y * cols + x) as usize) * C + c] as f32
        }
    };

    let dst_cols = dst.cols();
    dst.as_slice_mut()
        .par_chunks_exact_mut(C * dst_cols)
        .zip(map_x.as_slice().par_chunks_exact(dst_cols))
        .zip(map_y.as_slice().par_chunks_exact(dst_cols))
        .for_each(|((dst_row, mx_row), my_row)| {
            for ((dst_pixel, &u), &v) in dst_row
                .chunks_exact_mut(C)
                .zip(mx_row.iter())
                .zip(my_row.iter())
            {
                if !(u > -1.0 && v > -1.0 && u < cols as f32 && v < rows as f32) {
                    dst_pixel.fill(0);
                    continue;
                }
                let (u0, v0) = (u.floor(), v.floor());
                let (fu, fv) = (u - u0, v - v0);
                let (iu, iv) = (u0 as i64, v0 as i64);
                for (c, pixel) in dst_pixel.iter_mut().enumerate() {
                    let val = fetch(iu, iv, c) * (1.0 - fu) * (1.0 - fv)
                        + fetch(iu + 1, iv, c) * fu * (1.0 - fv)
                        + fetch(iu, iv + 1, c) * (1.0 - fu) * fv
                        + fetch(iu + 1, iv + 1, c) * fu * fv;
                    *pixel = val.round().clamp(0.0, 255.0) as u8;
                }
            }
        });

    Ok(())
}
