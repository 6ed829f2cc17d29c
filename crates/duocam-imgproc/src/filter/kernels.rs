/// Create a gaussian blur kernel.
///
/// # Arguments
///
/// * `kernel_size` - The size of the kernel.
/// * `sigma` - The sigma of the gaussian kernel.
///
/// # Returns
///
/// A normalized vector of the kernel.
pub fn gaussian_kernel_1d(kernel_size: usize, sigma: f32) -> Vec<f32> {
    let mut kernel = Vec::with_capacity(kernel_size);

    let mean = (kernel_size.max(1) - 1) as f32 / 2.0;
    let sigma_sq = sigma * sigma;

    for i in 0..kernel_size {
        let x = i as f32 - mean;
        kernel.push((-(x * x) / (2.0 * sigma_sq)).exp());
    }

    // normalize the kernel
    let norm = kernel.iter().sum::<f32>();
    kernel.iter_mut().for_each(|k| *k /= norm);
    kernel
}

/// Create the 3x3 sobel kernel pair as (derivative, smoothing).
pub fn sobel_kernel_1d() -> (Vec<f32>, Vec<f32>) {
    (vec![-1.0, 0.0, 1.0], vec![1.0, 2.0, 1.0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian_kernel_1d() {
        let kernel = gaussian_kernel_1d(5, 0.5);
        let expected = [
            0.00026386508,
            0.10645077,
            0.78657067,
            0.10645077,
            0.00026386508,
        ];
        for (k, e) in kernel.iter().zip(expected.iter()) {
            assert_relative_eq!(k, e, epsilon = 1e-6);
        }
        assert_relative_eq!(kernel.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_sobel_kernel_1d() {
        let (d, s) = sobel_kernel_1d();
        assert_eq!(d, vec![-1.0, 0.0, 1.0]);
        assert_eq!(s, vec![1.0, 2.0, 1.0]);
    }
}
