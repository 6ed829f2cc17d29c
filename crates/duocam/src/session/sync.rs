use std::sync::Arc;

use duocam_io::{SourceOpener, SyncStore};
use duocam_sync::{Clock, DriftSynchronizer, SyncRecord, SyncSettings, SyncState, SystemClock};

use crate::cameras::CameraPair;
use crate::config::AppConfig;
use crate::error::WorkerError;
use crate::preflight::check_camera_pair;
use crate::stop::StopToken;
use crate::worker::{EventSender, Worker};

/// A flash synchronization session.
///
/// Both cameras are polled in lockstep until each saw one flash, the wait
/// times out or the session is stopped. Only a successful session writes the
/// sync record.
pub struct SyncJob {
    /// The first camera.
    pub camera1_url: String,
    /// The second camera.
    pub camera2_url: String,
    /// Flash detection and timing.
    pub settings: SyncSettings,
    /// Destination of the sync record.
    pub store: SyncStore,
    /// Opens the cameras.
    pub opener: Arc<dyn SourceOpener>,
    /// Timestamps the flashes.
    pub clock: Box<dyn Clock>,
}

impl SyncJob {
    /// A session configured from a settings snapshot, timed by the system clock.
    pub fn from_config(
        config: &AppConfig,
        camera1_url: impl Into<String>,
        camera2_url: impl Into<String>,
        opener: Arc<dyn SourceOpener>,
    ) -> Self {
        Self {
            camera1_url: camera1_url.into(),
            camera2_url: camera2_url.into(),
            settings: config.sync_settings(),
            store: config.sync_store(),
            opener,
            clock: Box::new(SystemClock),
        }
    }

    /// Replace the clock.
    pub fn with_clock(self, clock: Box<dyn Clock>) -> Self {
        Self { clock, ..self }
    }

    /// Run the session on a background worker.
    pub fn spawn(self) -> Result<Worker<SyncState, SyncRecord>, WorkerError> {
        Worker::spawn("sync", move |stop, events| self.run(stop, events))
    }

    /// Run the session on the current thread.
    ///
    /// Each change of the synchronizer state is sent as an update.
    pub fn run(
        self,
        stop: &StopToken,
        events: &EventSender<SyncState, SyncRecord>,
    ) -> Result<SyncRecord, WorkerError> {
        check_camera_pair(&self.camera1_url, &self.camera2_url)?;
        let mut cameras = CameraPair::open(self.opener.as_ref(), &self.camera1_url, &self.camera2_url)?;

        let poll_interval = self.settings.poll_interval;
        let mut sync = DriftSynchronizer::new(self.settings, self.clock.now());
        let mut state = sync.state();
        events.update(state);
        events.status(describe(state));

        while !state.is_terminal() {
            if stop.is_stopped() {
                sync.cancel();
                break;
            }
            let (frame1, frame2) = cameras.read()?;
            let next = sync.process_pair(&frame1, &frame2, self.clock.now())?;
            if next != state {
                state = next;
                events.update(state);
                events.status(describe(state));
            }
            if !state.is_terminal() && stop.wait(poll_interval) {
                sync.cancel();
                break;
            }
        }
        drop(cameras);

        let outcome = sync.outcome()?;
        let record = SyncRecord::new(
            self.camera1_url,
            self.camera2_url,
            outcome.flash1_time,
            outcome.flash2_time,
            crate::timestamp(),
        );
        self.store.save(&record)?;
        events.status(format!("time difference {:.6}s saved", record.time_diff));
        Ok(record)
    }
}

fn describe(state: SyncState) -> String {
    match state {
        SyncState::Waiting => "waiting for a flash on both cameras",
        SyncState::Flash1Seen => "flash seen on camera 1, waiting for camera 2",
        SyncState::Flash2Seen => "flash seen on camera 2, waiting for camera 1",
        SyncState::BothSeen => "flash seen on both cameras",
        SyncState::TimedOut => "synchronization timed out",
        SyncState::Cancelled => "synchronization cancelled",
    }
    .to_string()
}
