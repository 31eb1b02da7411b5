//! Relay actuation worker.
//!
//! Pulses are requested from the read loop and executed by a single
//! background task, so a pulse never delays the next validation and two
//! pulses never drive the line at the same time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  request_pulse()  ┌────────────────┐       ┌─────────────────┐
//! │ Input loop   │──────────────────►│ Pulse queue    │──────►│ Worker task     │
//! │              │   (try_send)      │ (bounded mpsc) │       │  lock + pulse() │
//! └──────────────┘                   └────────────────┘       └────────┬────────┘
//!                                                                      │
//!                                               Arc<Mutex<RelayController>>
//! ```
//!
//! When the queue is full, further requests are dropped rather than
//! blocking the read loop. On shutdown the pulse in progress always
//! finishes (including its deactivation); pulses still waiting in the queue
//! are either run or discarded depending on [`PendingPulses`]. The line is
//! released exactly once, after the worker has stopped.
//!
//! # Examples
//!
//! ```no_run
//! use gatepulse_core::{PulseOrigin, StatusSink};
//! use gatepulse_hardware::devices::AnyOutputLine;
//! use gatepulse_hardware::mock::MockOutputLine;
//! use gatepulse_hardware::relay::RelayController;
//! use gatepulse_hardware::types::Polarity;
//! use gatepulse_hardware::worker::{PendingPulses, RelayWorker};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> gatepulse_hardware::Result<()> {
//!     let (line, _handle) = MockOutputLine::new();
//!     let relay = RelayController::new(
//!         AnyOutputLine::Mock(line),
//!         Polarity::ActiveHigh,
//!         Duration::from_millis(200),
//!     );
//!
//!     let handle = RelayWorker::new(relay, 4).spawn(StatusSink::detached());
//!     handle.request_pulse(PulseOrigin::Diagnostic);
//!     handle.shutdown(PendingPulses::Complete).await
//! }
//! ```

use crate::relay::RelayController;
use crate::Result;
use gatepulse_core::{PulseOrigin, StatusSignal, StatusSink};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A queued pulse request.
#[derive(Debug, Clone, Copy)]
struct PulseRequest {
    origin: PulseOrigin,
}

/// What happens to queued pulses at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPulses {
    /// Run every queued pulse before releasing the line.
    Complete,
    /// Drop queued pulses that have not started.
    Discard,
}

/// Counters describing worker activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseStats {
    /// Requests accepted into the queue.
    pub queued: u64,

    /// Pulses that finished with the relay inactive.
    pub completed: u64,

    /// Pulses that returned an error.
    pub failed: u64,

    /// Requests discarded (queue full or shutting down).
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PulseStats {
        PulseStats {
            queued: self.queued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Builder for the relay worker task.
#[derive(Debug)]
pub struct RelayWorker {
    controller: RelayController,
    queue_capacity: usize,
}

impl RelayWorker {
    /// Create a worker for `controller` that lets up to `queue_capacity`
    /// pulses wait behind the active one.
    pub fn new(controller: RelayController, queue_capacity: usize) -> Self {
        Self {
            controller,
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Spawn the worker task and return the handle used to feed it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self, status: StatusSink) -> RelayHandle {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let controller = Arc::new(Mutex::new(self.controller));
        let closing = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(Counters::default());

        let task = tokio::spawn(run_worker(
            rx,
            Arc::clone(&controller),
            Arc::clone(&closing),
            Arc::clone(&counters),
            status.clone(),
        ));

        debug!(capacity = self.queue_capacity, "Relay worker started");

        RelayHandle {
            tx: Some(tx),
            controller,
            closing,
            counters,
            task: Some(task),
            status,
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<PulseRequest>,
    controller: Arc<Mutex<RelayController>>,
    closing: Arc<AtomicBool>,
    counters: Arc<Counters>,
    status: StatusSink,
) {
    while let Some(request) = rx.recv().await {
        if closing.load(Ordering::Acquire) {
            debug!(origin = %request.origin, "Discarding queued pulse at shutdown");
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            status.emit(StatusSignal::PulseDropped {
                origin: request.origin,
            });
            continue;
        }

        let mut relay = controller.lock().await;
        info!(origin = %request.origin, "Pulsing relay");
        match relay.pulse().await {
            Ok(report) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
                status.emit(StatusSignal::PulseCompleted {
                    origin: request.origin,
                    active_for: report.active_for,
                });
            }
            Err(e) => {
                error!(origin = %request.origin, error = %e, "Relay pulse failed");
                counters.failed.fetch_add(1, Ordering::Relaxed);
                status.emit(StatusSignal::PulseFailed {
                    origin: request.origin,
                    error: e.to_string(),
                });
            }
        }
    }
    debug!("Relay worker stopped");
}

/// Handle for requesting pulses and shutting the worker down.
#[derive(Debug)]
pub struct RelayHandle {
    tx: Option<mpsc::Sender<PulseRequest>>,
    controller: Arc<Mutex<RelayController>>,
    closing: Arc<AtomicBool>,
    counters: Arc<Counters>,
    task: Option<JoinHandle<()>>,
    status: StatusSink,
}

impl RelayHandle {
    /// Queue a pulse without waiting for it.
    ///
    /// Returns `false` if the request was dropped because the queue is full
    /// or the worker is shutting down.
    pub fn request_pulse(&self, origin: PulseOrigin) -> bool {
        let Some(tx) = &self.tx else {
            return self.drop_request(origin, "worker stopped");
        };

        match tx.try_send(PulseRequest { origin }) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                self.status.emit(StatusSignal::PulseQueued { origin });
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => self.drop_request(origin, "queue full"),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.drop_request(origin, "worker stopped")
            }
        }
    }

    fn drop_request(&self, origin: PulseOrigin, reason: &str) -> bool {
        warn!(%origin, reason, "Pulse request dropped");
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        self.status.emit(StatusSignal::PulseDropped { origin });
        false
    }

    /// Snapshot of the worker counters.
    pub fn stats(&self) -> PulseStats {
        self.counters.snapshot()
    }

    /// Stop the worker and release the relay line.
    ///
    /// Waits for the pulse in progress to finish, runs or discards queued
    /// pulses according to `pending`, then releases the line. Emits
    /// `CleanupPerformed` or `CleanupFailed`.
    ///
    /// # Errors
    ///
    /// Returns the release error, if any. The line is released even if the
    /// worker task panicked.
    pub async fn shutdown(mut self, pending: PendingPulses) -> Result<()> {
        if pending == PendingPulses::Discard {
            self.closing.store(true, Ordering::Release);
        }
        drop(self.tx.take());

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Relay worker task ended abnormally");
            }
        }

        let result = self.controller.lock().await.release().await;
        match &result {
            Ok(()) => self.status.emit(StatusSignal::CleanupPerformed),
            Err(e) => {
                error!(error = %e, "Relay cleanup failed");
                self.status.emit(StatusSignal::CleanupFailed {
                    error: e.to_string(),
                });
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::AnyOutputLine;
    use crate::mock::{MockLineHandle, MockOutputLine};
    use crate::types::{Level, Polarity};
    use std::time::Duration;

    const PULSE: Duration = Duration::from_millis(200);

    fn spawn_worker(capacity: usize) -> (RelayHandle, MockLineHandle) {
        let (line, line_handle) = MockOutputLine::new();
        let relay = RelayController::new(AnyOutputLine::Mock(line), Polarity::ActiveHigh, PULSE);
        (
            RelayWorker::new(relay, capacity).spawn(StatusSink::detached()),
            line_handle,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_pulse_then_shutdown() {
        let (handle, line) = spawn_worker(4);

        assert!(handle.request_pulse(PulseOrigin::Validated));
        tokio::time::sleep(PULSE * 2).await;

        let stats = handle.stats();
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.completed, 1);

        handle.shutdown(PendingPulses::Discard).await.unwrap();
        assert_eq!(line.release_count(), 1);
        assert_eq!(line.level(), Level::Low);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_pulses_do_not_overlap() {
        let (handle, line) = spawn_worker(4);

        for _ in 0..3 {
            assert!(handle.request_pulse(PulseOrigin::Validated));
        }
        tokio::time::sleep(PULSE * 4).await;

        let intervals = line.active_intervals(Polarity::ActiveHigh);
        assert_eq!(intervals.len(), 3);
        for pair in intervals.windows(2) {
            assert!(pair[0].end.unwrap() <= pair[1].start);
        }
        for interval in &intervals {
            assert_eq!(interval.end.unwrap() - interval.start, PULSE);
        }

        handle.shutdown(PendingPulses::Discard).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_drops_requests() {
        let (handle, _line) = spawn_worker(1);

        // First request is picked up by the worker, second fills the queue
        assert!(handle.request_pulse(PulseOrigin::Validated));
        tokio::task::yield_now().await;
        assert!(handle.request_pulse(PulseOrigin::Validated));
        assert!(!handle.request_pulse(PulseOrigin::Validated));

        assert_eq!(handle.stats().dropped, 1);
        handle.shutdown(PendingPulses::Discard).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_completes_in_flight_pulse() {
        let (line, line_handle) = MockOutputLine::new();
        let relay = RelayController::new(AnyOutputLine::Mock(line), Polarity::ActiveHigh, PULSE);
        let (status, mut rx) = StatusSink::channel();
        let handle = RelayWorker::new(relay, 4).spawn(status);

        handle.request_pulse(PulseOrigin::Validated);
        handle.request_pulse(PulseOrigin::Validated);
        tokio::time::sleep(PULSE / 2).await;
        assert_eq!(line_handle.level(), Level::High);

        handle.shutdown(PendingPulses::Discard).await.unwrap();

        // In-flight pulse ran to completion, queued one was discarded
        let intervals = line_handle.active_intervals(Polarity::ActiveHigh);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].end.unwrap() - intervals[0].start, PULSE);
        assert_eq!(line_handle.level(), Level::Low);
        assert_eq!(line_handle.release_count(), 1);

        let mut signals = Vec::new();
        while let Ok(event) = rx.try_recv() {
            signals.push(event.signal);
        }
        assert!(signals.contains(&StatusSignal::PulseDropped {
            origin: PulseOrigin::Validated
        }));
        assert_eq!(signals.last(), Some(&StatusSignal::CleanupPerformed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_runs_queued_pulses_when_completing() {
        let (handle, line) = spawn_worker(4);

        handle.request_pulse(PulseOrigin::Validated);
        handle.request_pulse(PulseOrigin::Diagnostic);
        handle.shutdown(PendingPulses::Complete).await.unwrap();

        let intervals = line.active_intervals(Polarity::ActiveHigh);
        assert_eq!(intervals.len(), 2);
        assert!(intervals[0].end.unwrap() <= intervals[1].start);
        assert_eq!(line.level(), Level::Low);
        assert_eq!(line.release_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pulse_is_counted_and_worker_continues() {
        let (handle, line) = spawn_worker(4);
        line.fail_next_writes(1);

        handle.request_pulse(PulseOrigin::Diagnostic);
        handle.request_pulse(PulseOrigin::Diagnostic);
        tokio::time::sleep(PULSE * 3).await;

        let stats = handle.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 1);
        handle.shutdown(PendingPulses::Discard).await.unwrap();
    }
}
