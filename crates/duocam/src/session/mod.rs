//! Each session owns its cameras for its whole lifetime and reports through
//! a [`crate::worker::Worker`]. A session can also be run on the current
//! thread with its `run` method.

mod calibration;
mod measure;
mod monitor;
mod sync;

pub use calibration::{CalibrationJob, CalibrationSummary};
pub use measure::{MeasureJob, MeasurementFrame, MeasurementSummary, Undistorter};
pub use monitor::MonitorJob;
pub use sync::SyncJob;
