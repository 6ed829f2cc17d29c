use std::time::Duration;

use duocam_image::Image;
use duocam_imgproc::color::to_gray_u8;

use crate::error::SyncError;
use crate::flash::FlashDetector;
use crate::record::CameraId;

/// Parameters of a synchronization session.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Gray level a pixel must exceed to count as bright.
    pub flash_threshold: u8,
    /// Number of bright pixels a flash must exceed.
    pub min_pixels: usize,
    /// Seconds to wait for both flashes before giving up.
    pub max_wait: f64,
    /// Pause between two polls of the cameras.
    pub poll_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            flash_threshold: 220,
            min_pixels: 1000,
            max_wait: 30.0,
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// State of a synchronization session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No flash seen yet.
    Waiting,
    /// Only the first camera saw the flash.
    Flash1Seen,
    /// Only the second camera saw the flash.
    Flash2Seen,
    /// Both cameras saw the flash.
    BothSeen,
    /// The session ran out of time.
    TimedOut,
    /// The session was stopped.
    Cancelled,
}

impl SyncState {
    /// Whether the session is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::BothSeen | SyncState::TimedOut | SyncState::Cancelled)
    }
}

/// Flash times measured by a successful session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncOutcome {
    /// Flash time of the first camera, in seconds.
    pub flash1_time: f64,
    /// Flash time of the second camera, in seconds.
    pub flash2_time: f64,
    /// `flash2_time - flash1_time`.
    pub time_diff: f64,
}

/// Estimates the offset between two camera clocks from a shared flash.
///
/// Frames are fed in pairs together with the wall clock time at which they
/// were read. Each camera records the time of its first flash; the session
/// succeeds once both cameras have one, and times out once `max_wait`
/// seconds have elapsed since `start_time`.
#[derive(Debug, Clone)]
pub struct DriftSynchronizer {
    settings: SyncSettings,
    detector1: FlashDetector,
    detector2: FlashDetector,
    start_time: f64,
    flash1: Option<f64>,
    flash2: Option<f64>,
    state: SyncState,
}

impl DriftSynchronizer {
    /// Start a session at `start_time` seconds.
    pub fn new(settings: SyncSettings, start_time: f64) -> Self {
        let detector = FlashDetector::new(settings.flash_threshold, settings.min_pixels);
        Self {
            detector1: detector.clone(),
            detector2: detector,
            settings,
            start_time,
            flash1: None,
            flash2: None,
            state: SyncState::Waiting,
        }
    }

    /// The session parameters.
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// The current state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Flash time of a camera, if seen.
    pub fn flash_time(&self, camera: CameraId) -> Option<f64> {
        match camera {
            CameraId::First => self.flash1,
            CameraId::Second => self.flash2,
        }
    }

    fn update_state(&mut self) {
        self.state = match (self.flash1, self.flash2) {
            (None, None) => SyncState::Waiting,
            (Some(_), None) => SyncState::Flash1Seen,
            (None, Some(_)) => SyncState::Flash2Seen,
            (Some(_), Some(_)) => SyncState::BothSeen,
        };
    }

    /// Expire the session if `now` is past the deadline.
    pub fn check_timeout(&mut self, now: f64) -> SyncState {
        if !self.state.is_terminal() && now - self.start_time > self.settings.max_wait {
            log::warn!(
                "synchronization timed out after {:.1}s (camera 1: {:?}, camera 2: {:?})",
                now - self.start_time,
                self.flash1,
                self.flash2
            );
            self.state = SyncState::TimedOut;
        }
        self.state
    }

    /// Feed a pair of grayscale frames read at `now`.
    pub fn process_gray_pair(
        &mut self,
        gray1: &Image<u8, 1>,
        gray2: &Image<u8, 1>,
        now: f64,
    ) -> SyncState {
        if self.check_timeout(now).is_terminal() {
            return self.state;
        }

        if self.flash1.is_none() && self.detector1.process_gray(gray1) {
            log::info!("flash detected on camera 1 at {now:.6}");
            self.flash1 = Some(now);
        }
        if self.flash2.is_none() && self.detector2.process_gray(gray2) {
            log::info!("flash detected on camera 2 at {now:.6}");
            self.flash2 = Some(now);
        }

        self.update_state();
        self.state
    }

    /// Feed a pair of RGB frames read at `now`.
    pub fn process_pair(
        &mut self,
        frame1: &Image<u8, 3>,
        frame2: &Image<u8, 3>,
        now: f64,
    ) -> Result<SyncState, SyncError> {
        if self.check_timeout(now).is_terminal() {
            return Ok(self.state);
        }
        let gray1 = to_gray_u8(frame1)?;
        let gray2 = to_gray_u8(frame2)?;
        Ok(self.process_gray_pair(&gray1, &gray2, now))
    }

    /// Stop the session unless it already ended.
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            log::info!("synchronization cancelled");
            self.state = SyncState::Cancelled;
        }
    }

    /// The result of a finished session.
    ///
    /// # Errors
    ///
    /// [`SyncError::SyncTimeout`] with the flashes seen so far when the session
    /// timed out, [`SyncError::Cancelled`] when it was stopped and
    /// [`SyncError::InProgress`] when it is still running.
    pub fn outcome(&self) -> Result<SyncOutcome, SyncError> {
        match (self.state, self.flash1, self.flash2) {
            (SyncState::BothSeen, Some(flash1_time), Some(flash2_time)) => Ok(SyncOutcome {
                flash1_time,
                flash2_time,
                time_diff: flash2_time - flash1_time,
            }),
            (SyncState::TimedOut, flash1, flash2) => Err(SyncError::SyncTimeout {
                waited: self.settings.max_wait,
                flash1,
                flash2,
            }),
            (SyncState::Cancelled, _, _) => Err(SyncError::Cancelled),
            _ => Err(SyncError::InProgress),
        }
    }
}
