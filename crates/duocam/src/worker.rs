use std::panic::AssertUnwindSafe;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::WorkerError;
use crate::stop::{stop_channel, StopHandle, StopToken};

/// A message from a worker to the foreground.
///
/// `U` is the per step payload of the worker and `R` its final result. A
/// worker always ends with exactly one `Finished` or `Failed` event.
#[derive(Debug)]
pub enum WorkerEvent<U, R> {
    /// A human readable status line.
    Status(String),
    /// Completion in `[0, 1]`.
    Progress(f32),
    /// An intermediate result.
    Update(U),
    /// The worker completed.
    Finished(R),
    /// The worker failed or was stopped.
    Failed(WorkerError),
}

/// The worker side of the event channel.
pub struct EventSender<U, R> {
    tx: Sender<WorkerEvent<U, R>>,
    name: String,
}

impl<U, R> EventSender<U, R> {
    fn send(&self, event: WorkerEvent<U, R>) {
        if self.tx.send(event).is_err() {
            log::debug!("{}: event dropped, the receiver is gone", self.name);
        }
    }

    /// Send a status line, also logged at info level.
    pub fn status(&self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{}: {message}", self.name);
        self.send(WorkerEvent::Status(message));
    }

    /// Send the completion fraction.
    pub fn progress(&self, fraction: f32) {
        self.send(WorkerEvent::Progress(fraction.clamp(0.0, 1.0)));
    }

    /// Send an intermediate result.
    pub fn update(&self, update: U) {
        self.send(WorkerEvent::Update(update));
    }
}

/// A background thread running one session.
///
/// Dropping the worker requests a stop and waits for the thread, so the
/// cameras it owns are always released.
pub struct Worker<U, R> {
    name: String,
    stop: StopHandle,
    handle: Option<JoinHandle<()>>,
    events: Receiver<WorkerEvent<U, R>>,
}

impl<U: Send + 'static, R: Send + 'static> Worker<U, R> {
    /// Start a worker thread.
    ///
    /// # Arguments
    ///
    /// * `name` - The worker name, used for the thread and the logs.
    /// * `f` - The session, polling the stop token and reporting through the sender.
    pub fn spawn<F>(name: impl Into<String>, f: F) -> Result<Self, WorkerError>
    where
        F: FnOnce(&StopToken, &EventSender<U, R>) -> Result<R, WorkerError> + Send + 'static,
    {
        let name = name.into();
        let (stop, token) = stop_channel();
        let (tx, events) = mpsc::channel();
        let sender = EventSender { tx, name: name.clone() };

        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| f(&token, &sender)));
                match result {
                    Ok(Ok(r)) => {
                        log::debug!("{}: finished", sender.name);
                        sender.send(WorkerEvent::Finished(r));
                    }
                    Ok(Err(e)) => {
                        log::error!("{}: {e}", sender.name);
                        sender.send(WorkerEvent::Failed(e));
                    }
                    Err(_) => {
                        log::error!("{}: panicked", sender.name);
                        sender.send(WorkerEvent::Failed(WorkerError::Panicked(sender.name.clone())));
                    }
                }
            })
            .map_err(WorkerError::Spawn)?;

        Ok(Self {
            name,
            stop,
            handle: Some(handle),
            events,
        })
    }
}

impl<U, R> Worker<U, R> {
    /// The worker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The event channel.
    pub fn events(&self) -> &Receiver<WorkerEvent<U, R>> {
        &self.events
    }

    /// Wait up to `timeout` for the next event.
    pub fn next_event(&self, timeout: Duration) -> Option<WorkerEvent<U, R>> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// A handle to stop the worker from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ask the worker to stop, without waiting.
    pub fn stop(&self) {
        log::debug!("{}: stop requested", self.name);
        self.stop.stop();
    }

    /// Whether the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the thread to exit.
    pub fn join(mut self) {
        self.join_thread();
    }

    fn join_thread(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{}: thread panicked", self.name);
            }
        }
    }

    /// Forward every event to `on_event` until the worker ends, then return
    /// its result.
    pub fn wait(mut self, mut on_event: impl FnMut(WorkerEvent<U, R>)) -> Result<R, WorkerError> {
        loop {
            match self.events.recv() {
                Ok(WorkerEvent::Finished(r)) => {
                    self.join_thread();
                    return Ok(r);
                }
                Ok(WorkerEvent::Failed(e)) => {
                    self.join_thread();
                    return Err(e);
                }
                Ok(event) => on_event(event),
                Err(_) => {
                    self.join_thread();
                    return Err(WorkerError::Panicked(self.name.clone()));
                }
            }
        }
    }
}

impl<U, R> Drop for Worker<U, R> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop.stop();
            self.join_thread();
        }
    }
}

/// Holds at most one worker of a kind.
///
/// Starting a new worker stops the previous one and waits for it to exit
/// first, so two sessions never hold the same camera.
pub struct WorkerSlot<U, R> {
    current: Option<Worker<U, R>>,
}

impl<U, R> Default for WorkerSlot<U, R> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<U: Send + 'static, R: Send + 'static> WorkerSlot<U, R> {
    /// An empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the running worker, if any, then start a new one.
    pub fn start<F>(&mut self, name: impl Into<String>, f: F) -> Result<&Worker<U, R>, WorkerError>
    where
        F: FnOnce(&StopToken, &EventSender<U, R>) -> Result<R, WorkerError> + Send + 'static,
    {
        self.stop();
        Ok(self.current.insert(Worker::spawn(name, f)?))
    }

    /// Stop the running worker and wait for it.
    pub fn stop(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.stop();
            previous.join();
        }
    }

    /// The running worker.
    pub fn current(&self) -> Option<&Worker<U, R>> {
        self.current.as_ref()
    }

    /// Take the worker out of the slot.
    pub fn take(&mut self) -> Option<Worker<U, R>> {
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_worker_result_and_events() -> Result<(), WorkerError> {
        let worker = Worker::<u32, &'static str>::spawn("counter", |_, events| {
            events.status("counting");
            for i in 0..3 {
                events.update(i);
            }
            events.progress(1.0);
            Ok("done")
        })?;
        let mut updates = Vec::new();
        let result = worker.wait(|e| {
            if let WorkerEvent::Update(u) = e {
                updates.push(u);
            }
        })?;
        assert_eq!(result, "done");
        assert_eq!(updates, vec![0, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_worker_failure_and_panic() -> Result<(), WorkerError> {
        let failing = Worker::<(), ()>::spawn("failing", |_, _| {
            Err(WorkerError::InvalidCameraPair("same camera".to_string()))
        })?;
        assert!(matches!(failing.wait(|_| {}), Err(WorkerError::InvalidCameraPair(_))));

        let panicking = Worker::<(), ()>::spawn("panicking", |_, _| panic!("boom"))?;
        assert!(matches!(panicking.wait(|_| {}), Err(WorkerError::Panicked(_))));
        Ok(())
    }

    #[test]
    fn test_slot_stops_previous_worker() -> Result<(), WorkerError> {
        let running = Arc::new(AtomicUsize::new(0));
        let mut slot = WorkerSlot::<(), ()>::new();
        for _ in 0..3 {
            let running = running.clone();
            slot.start("looper", move |stop, _| {
                assert_eq!(running.fetch_add(1, Ordering::SeqCst), 0, "two workers at once");
                while !stop.wait(Duration::from_millis(5)) {}
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })?;
        }
        slot.stop();
        assert_eq!(running.load(Ordering::SeqCst), 0);
        assert!(slot.current().is_none());
        Ok(())
    }
}
