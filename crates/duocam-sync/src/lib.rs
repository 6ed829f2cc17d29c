#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Open loop drift compensation between two live streams.
pub mod aligner;

/// Wall clock abstraction.
pub mod clock;

/// Error types for the synchronization module.
pub mod error;

/// Per camera flash detection.
pub mod flash;

/// Frame count divergence monitoring.
pub mod monitor;

/// The synchronization result.
pub mod record;

/// The flash synchronization state machine.
pub mod synchronizer;

pub use crate::aligner::{FrameAligner, FrameSkip};
pub use crate::clock::{Clock, SystemClock};
pub use crate::error::SyncError;
pub use crate::flash::FlashDetector;
pub use crate::monitor::{DriftMonitor, DriftReport, DriftSummary};
pub use crate::record::{CameraId, SyncRecord};
pub use crate::synchronizer::{DriftSynchronizer, SyncOutcome, SyncSettings, SyncState};
