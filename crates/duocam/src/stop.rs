use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Requests a worker to stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Sender<()>,
}

impl StopHandle {
    /// Ask the worker to stop. Repeated requests are harmless.
    pub fn stop(&self) {
        let _ = self.tx.send(());
    }
}

/// The worker side of a stop request, polled between frames.
///
/// Dropping every [`StopHandle`] also counts as a stop request, so a worker
/// never outlives the foreground that started it.
#[derive(Debug)]
pub struct StopToken {
    rx: Receiver<()>,
    stopped: Cell<bool>,
}

/// Create a connected stop handle and token.
pub fn stop_channel() -> (StopHandle, StopToken) {
    let (tx, rx) = mpsc::channel();
    (
        StopHandle { tx },
        StopToken {
            rx,
            stopped: Cell::new(false),
        },
    )
}

impl StopToken {
    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        if !self.stopped.get() {
            match self.rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => self.stopped.set(true),
                Err(TryRecvError::Empty) => {}
            }
        }
        self.stopped.get()
    }

    /// Sleep for `duration` unless a stop is requested meanwhile.
    ///
    /// Returns `true` when the wait was interrupted by a stop request.
    pub fn wait(&self, duration: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        if duration.is_zero() {
            return false;
        }
        match self.rx.recv_timeout(duration) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                self.stopped.set(true);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}
