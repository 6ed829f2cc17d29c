use duocam_image::ImageError;

/// An error type for the stereo module.
#[derive(thiserror::Error, Debug)]
pub enum StereoError {
    /// The baseline must be a positive distance.
    #[error("invalid baseline {0}, expected a positive distance in cm")]
    InvalidBaseline(f64),

    /// The focal length must be positive.
    #[error("invalid focal length {0}, expected a positive number of pixels")]
    InvalidFocalLength(f64),

    /// The detector failed on a frame.
    #[error("detector failed: {0}")]
    Detector(String),

    /// Error from the image module.
    #[error(transparent)]
    Image(#[from] ImageError),
}
