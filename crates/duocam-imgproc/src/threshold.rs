use num_traits::Zero;
use rayon::prelude::*;

use duocam_image::{Image, ImageError};

use crate::parallel;

/// Apply a binary threshold to an image.
///
/// # Arguments
///
/// * `src` - The input image of an arbitrary number of channels and type.
/// * `dst` - The output image of an arbitrary number of channels and type.
/// * `threshold` - The threshold value. Must be the same type as the image.
/// * `max_value` - The value assigned when the input value is greater than the threshold.
///
/// # Examples
///
/// ```
/// use duocam_image::{Image, ImageSize};
/// use duocam_imgproc::threshold::threshold_binary;
///
/// let data = vec![100u8, 200, 50, 150, 200, 250];
/// let image = Image::<_, 1>::new(ImageSize { width: 2, height: 3 }, data).unwrap();
///
/// let mut thresholded = Image::<_, 1>::from_size_val(image.size(), 0).unwrap();
///
/// threshold_binary(&image, &mut thresholded, 100, 255).unwrap();
/// assert_eq!(thresholded.as_slice(), &[0, 255, 0, 255, 255, 255]);
/// ```
pub fn threshold_binary<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    threshold: T,
    max_value: T,
) -> Result<(), ImageError>
where
    T: Copy + Send + Sync + PartialOrd + Zero,
{
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows_val(src, dst, |src_pixel, dst_pixel| {
        *dst_pixel = if *src_pixel > threshold {
            max_value
        } else {
            T::zero()
        };
    });

    Ok(())
}

/// Count the values of an image strictly greater than a threshold.
///
/// Equivalent to thresholding the image and counting the non zero pixels
/// without allocating the intermediate mask.
///
/// # Arguments
///
/// * `src` - The input image.
/// * `threshold` - Values above this level are counted.
///
/// # Returns
///
/// The number of values above the threshold.
pub fn count_above_threshold<T, const C: usize>(src: &Image<T, C>, threshold: T) -> usize
where
    T: Copy + Send + Sync + PartialOrd,
{
    let row_len = (src.cols() * C).max(1);
    src.as_slice()
        .par_chunks(row_len)
        .map(|row| row.iter().filter(|&&v| v > threshold).count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_binary_f32() -> Result<(), ImageError> {
        let image = Image::<f32, 1>::new([2, 2].into(), vec![0.1, 0.6, 0.5, 0.9])?;
        let mut dst = Image::<f32, 1>::from_size_val(image.size(), 0.0)?;
        threshold_binary(&image, &mut dst, 0.5, 1.0)?;
        assert_eq!(dst.as_slice(), &[0.0, 1.0, 0.0, 1.0]);
        Ok(())
    }

    #[test]
    fn count_above_threshold_strict() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new([3, 2].into(), vec![220, 221, 255, 0, 219, 230])?;
        assert_eq!(count_above_threshold(&image, 220), 3);
        assert_eq!(count_above_threshold(&image, 255), 0);
        Ok(())
    }
}
