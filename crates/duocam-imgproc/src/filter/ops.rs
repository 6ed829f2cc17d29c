use rayon::prelude::*;

use duocam_image::{Image, ImageError};

use super::kernels;

#[inline]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// Apply a separable filter to a single channel image.
///
/// Borders are handled by replicating the edge pixels.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, 1).
/// * `dst` - The destination image with shape (H, W, 1).
/// * `kernel_x` - The horizontal kernel.
/// * `kernel_y` - The vertical kernel.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn separable_filter(
    src: &Image<f32, 1>,
    dst: &mut Image<f32, 1>,
    kernel_x: &[f32],
    kernel_y: &[f32],
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }
    let (cols, rows) = (src.cols(), src.rows());
    if cols == 0 || rows == 0 {
        return Err(ImageError::EmptyImage);
    }

    let src_data = src.as_slice();
    let half_x = (kernel_x.len() / 2) as isize;
    let half_y = (kernel_y.len() / 2) as isize;

    // horizontal pass
    let mut temp = vec![0.0f32; cols * rows];
    temp.par_chunks_exact_mut(cols)
        .zip(src_data.par_chunks_exact(cols))
        .for_each(|(temp_row, src_row)| {
            for (x, t) in temp_row.iter_mut().enumerate() {
                let mut sum = 0.0;
                for (k, w) in kernel_x.iter().enumerate() {
                    let xi = clamp_index(x as isize + k as isize - half_x, cols);
                    sum += src_row[xi] * w;
                }
                *t = sum;
            }
        });

    // vertical pass
    dst.as_slice_mut()
        .par_chunks_exact_mut(cols)
        .enumerate()
        .for_each(|(y, dst_row)| {
            for (x, d) in dst_row.iter_mut().enumerate() {
                let mut sum = 0.0;
                for (k, w) in kernel_y.iter().enumerate() {
                    let yi = clamp_index(y as isize + k as isize - half_y, rows);
                    sum += temp[yi * cols + x] * w;
                }
                *d = sum;
            }
        });

    Ok(())
}

/// Blur an image using a gaussian blur filter
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, 1).
/// * `dst` - The destination image with shape (H, W, 1).
/// * `kernel_size` - The size of the kernel (kernel_x, kernel_y).
/// * `sigma` - The sigma of the gaussian kernel.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn gaussian_blur(
    src: &Image<f32, 1>,
    dst: &mut Image<f32, 1>,
    kernel_size: (usize, usize),
    sigma: (f32, f32),
) -> Result<(), ImageError> {
    let kernel_x = kernels::gaussian_kernel_1d(kernel_size.0, sigma.0);
    let kernel_y = kernels::gaussian_kernel_1d(kernel_size.1, sigma.1);
    separable_filter(src, dst, &kernel_x, &kernel_y)
}

/// Compute the first order spatial derivatives with a 3x3 sobel operator.
///
/// The outputs are scaled by 1/8 so they approximate the per pixel derivative.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, 1).
/// * `dx` - The horizontal derivative with shape (H, W, 1).
/// * `dy` - The vertical derivative with shape (H, W, 1).
pub fn spatial_gradient(
    src: &Image<f32, 1>,
    dx: &mut Image<f32, 1>,
    dy: &mut Image<f32, 1>,
) -> Result<(), ImageError> {
    let (deriv, smooth) = kernels::sobel_kernel_1d();
    let deriv = deriv.iter().map(|v| v / 2.0).collect::<Vec<_>>();
    let smooth = smooth.iter().map(|v| v / 4.0).collect::<Vec<_>>();
    separable_filter(src, dx, &deriv, &smooth)?;
    separable_filter(src, dy, &smooth, &deriv)?;
    Ok(())
}
