use duocam_image::ImageError;

/// An error type for the synchronization module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SyncError {
    /// No flash was seen by both cameras within the allotted time.
    #[error("no flash detected on both cameras within {waited:.1}s (camera 1: {}, camera 2: {})",
        describe(.flash1), describe(.flash2))]
    SyncTimeout {
        /// Seconds waited before giving up.
        waited: f64,
        /// Flash time seen by the first camera, if any.
        flash1: Option<f64>,
        /// Flash time seen by the second camera, if any.
        flash2: Option<f64>,
    },

    /// The session was stopped before both flashes were seen.
    #[error("synchronization cancelled")]
    Cancelled,

    /// The session has not reached a terminal state yet.
    #[error("synchronization still in progress")]
    InProgress,

    /// Error from the image module.
    #[error(transparent)]
    Image(#[from] ImageError),
}

fn describe(flash: &Option<f64>) -> String {
    match flash {
        Some(t) => format!("flash at {t:.6}"),
        None => "no flash".to_string(),
    }
}
