use duocam_sync::CameraId;

/// An error type for the workers.
#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    /// A frame could not be read in the middle of a session.
    #[error("frame read failure on {camera}")]
    FrameReadFailure {
        /// The camera that failed.
        camera: CameraId,
    },

    /// The two camera sources cannot be used together.
    #[error("invalid camera pair: {0}")]
    InvalidCameraPair(String),

    /// The drift monitor ended before both cameras saw a flash.
    #[error("no flash was seen on both cameras, the drift cannot be estimated")]
    NoDriftEstimate,

    /// The worker thread could not be started.
    #[error("failed to start worker: {0}")]
    Spawn(std::io::Error),

    /// The worker thread panicked.
    #[error("worker {0} panicked")]
    Panicked(String),

    /// Error from the io module.
    #[error(transparent)]
    Io(#[from] duocam_io::IoError),

    /// Error from the calibration module.
    #[error(transparent)]
    Calib(#[from] duocam_calib::CalibError),

    /// Error from the synchronization module.
    #[error(transparent)]
    Sync(#[from] duocam_sync::SyncError),

    /// Error from the stereo module.
    #[error(transparent)]
    Stereo(#[from] duocam_stereo::StereoError),

    /// Error from the image module.
    #[error(transparent)]
    Image(#[from] duocam_image::ImageError),

    /// Error to read or write the settings.
    #[error("settings error: {0}")]
    Config(String),
}

impl WorkerError {
    /// Whether the error is a failed frame read of either camera.
    pub fn is_frame_read_failure(&self) -> bool {
        matches!(
            self,
            Self::FrameReadFailure { .. } | Self::Io(duocam_io::IoError::FrameReadFailure { .. })
        )
    }
}
