use duocam_image::ImageError;

/// An error type for the calibration module.
#[derive(thiserror::Error, Debug)]
pub enum CalibError {
    /// Fewer accepted samples than required when calibration was requested.
    #[error("insufficient calibration data: collected {collected} of {required} samples")]
    InsufficientCalibrationData {
        /// Number of accepted samples.
        collected: usize,
        /// Number of samples required.
        required: usize,
    },

    /// The chessboard pattern has an invalid number of inner corners.
    #[error("invalid chessboard pattern {0}x{1}, at least 2x2 inner corners are needed")]
    InvalidPatternSize(usize, usize),

    /// Two frames or maps do not share the same resolution.
    #[error("image size mismatch: ({0}, {1}) vs ({2}, {3})")]
    ImageSizeMismatch(usize, usize, usize, usize),

    /// Not enough correspondences for the estimation.
    #[error("not enough points: required {required}, got {actual}")]
    NotEnoughPoints {
        /// Minimum number of points.
        required: usize,
        /// Provided number of points.
        actual: usize,
    },

    /// Point sets with different lengths were provided.
    #[error("mismatched point sets: {0} vs {1}")]
    MismatchedLengths(usize, usize),

    /// A matrix that must be inverted is singular.
    #[error("singular matrix in {0}")]
    SingularMatrix(&'static str),

    /// The estimation problem is degenerate.
    #[error("degenerate configuration: {0}")]
    Degenerate(String),

    /// Distortion vectors are limited to five coefficients.
    #[error("unsupported number of distortion coefficients: {0}")]
    InvalidDistortion(usize),

    /// Error from the image module.
    #[error(transparent)]
    Image(#[from] ImageError),
}
