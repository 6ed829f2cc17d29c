use std::path::PathBuf;

/// An error type for the io module.
#[derive(thiserror::Error, Debug)]
pub enum IoError {
    /// Error when the file does not exist.
    #[error("File does not exist: {0}")]
    FileDoesNotExist(PathBuf),

    /// Error to open or write the file.
    #[error("Failed to manipulate the file. {0}")]
    FileError(#[from] std::io::Error),

    /// A camera source could not be opened.
    #[error("Camera source unavailable: {url}")]
    DeviceUnavailable {
        /// The offending source.
        url: String,
    },

    /// A frame could not be read from an open source.
    #[error("Failed to read a frame from {url}")]
    FrameReadFailure {
        /// The offending source.
        url: String,
    },

    /// An artifact exists but does not have the expected content.
    #[error("Malformed artifact {path}: {reason}")]
    MalformedArtifact {
        /// The artifact file.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// The image has a pixel format that is not supported.
    #[error("Unsupported image format")]
    UnsupportedImageFormat,

    /// Error to create the image.
    #[error("Failed to create image. {0}")]
    ImageCreationError(#[from] duocam_image::ImageError),

    /// Error to decode or encode the image.
    #[error("Failed to decode the image. {0}")]
    ImageDecodeError(#[from] image::ImageError),

    /// Error to serialize an artifact.
    #[error("Failed to serialize. {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from the calibration module.
    #[error(transparent)]
    CalibError(#[from] duocam_calib::CalibError),
}

impl IoError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        IoError::MalformedArtifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
