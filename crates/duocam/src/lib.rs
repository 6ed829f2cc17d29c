#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use duocam_calib as calib;

#[doc(inline)]
pub use duocam_image as image;

#[doc(inline)]
pub use duocam_imgproc as imgproc;

#[doc(inline)]
pub use duocam_io as io;

#[doc(inline)]
pub use duocam_stereo as stereo;

#[doc(inline)]
pub use duocam_sync as sync;

/// Two cameras owned by one worker.
pub mod cameras;

/// Application settings.
pub mod config;

/// Error types of the workers.
pub mod error;

/// Pre-flight checks of a measurement session.
pub mod preflight;

/// Cooperative cancellation of workers.
pub mod stop;

/// Background workers and their events.
pub mod worker;

/// The calibration, synchronization, drift monitoring and measurement sessions.
pub mod session;

pub use crate::config::AppConfig;
pub use crate::error::WorkerError;
pub use crate::stop::{stop_channel, StopHandle, StopToken};
pub use crate::worker::{EventSender, Worker, WorkerEvent, WorkerSlot};

/// Local time formatted the way artifacts record it.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
