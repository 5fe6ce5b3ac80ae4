// Worker - the cancellable unit of background work
//
// A Worker is created per run, moved onto a dedicated OS thread by the
// controller, and never reused. It communicates exclusively through the
// broadcast event channel and the shared CancelFlag; it touches no
// controller-owned state.

use crate::cancel::CancelFlag;
use crate::metrics::Metrics;
use crate::models::RunnerSettings;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Events emitted by a worker over the course of one run
///
/// Delivery order matches emission order. Every run produces `Started` first
/// and `Finished` last; in between it is either a full ladder of
/// `StepCompleted` events or a prefix of them ended by one `Aborted`.
/// Abort is an ordinary terminal outcome, not an error; the two paths differ
/// only in the events they leave behind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerEvent {
    /// The run routine has entered its loop
    Started,

    /// One unit of work finished without a cancellation request
    StepCompleted { step: usize },

    /// A cancellation request was observed at the end of this unit
    Aborted { step: usize },

    /// The work loop has exited, by exhaustion or abort
    LoopDone,

    /// The run is over; the worker thread exits right after emitting this
    Finished,
}

impl fmt::Display for WorkerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerEvent::Started => write!(f, "started"),
            WorkerEvent::StepCompleted { step } => write!(f, "completed step {}", step),
            WorkerEvent::Aborted { step } => write!(f, "aborted at step {}", step),
            WorkerEvent::LoopDone => write!(f, "loop done"),
            WorkerEvent::Finished => write!(f, "finished"),
        }
    }
}

/// One run's worth of cancellable work
///
/// The worker polls its [`CancelFlag`] once per work unit, at the boundary
/// after the unit's wait and before the unit's completion event. A stop
/// requested while a unit is in flight therefore aborts that same unit, and
/// cancellation latency is bounded by a single unit's duration.
pub struct Worker {
    /// Shared cancellation flag; the controller holds the other handle
    flag: CancelFlag,

    /// Sender half of the event channel subscribers listen on
    events: broadcast::Sender<WorkerEvent>,

    /// Number of work units in one run
    steps: usize,

    /// Simulated duration of one work unit
    step_interval: Duration,

    /// Shared run counters
    metrics: Arc<Metrics>,
}

impl Worker {
    /// Create a worker bound to a cancellation flag and an event channel
    pub fn new(
        flag: CancelFlag,
        events: broadcast::Sender<WorkerEvent>,
        settings: &RunnerSettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            flag,
            events,
            steps: settings.work_steps,
            step_interval: settings.step_interval(),
            metrics,
        }
    }

    /// Execute one run to its terminal state
    ///
    /// Invoked exactly once, on the worker thread. Runs every work unit
    /// unless a cancellation request is observed, then emits `LoopDone` and
    /// `Finished` on both paths. Consumes the worker; a new run gets a new
    /// worker.
    pub fn run(self) {
        let start = Instant::now();
        tracing::debug!("Worker run starting: {} steps", self.steps);

        self.emit(WorkerEvent::Started);

        // A fresh flag is already false. The reset stays so that a flag
        // reused across runs can never pre-cancel this one.
        self.flag.set(false);

        let mut aborted = false;
        for step in 0..self.steps {
            thread::sleep(self.step_interval);

            if self.flag.get() {
                tracing::info!("Cancellation observed at step {}", step);
                self.emit(WorkerEvent::Aborted { step });
                aborted = true;
                break;
            }

            self.emit(WorkerEvent::StepCompleted { step });
            self.metrics.record_step_completed();
        }

        self.emit(WorkerEvent::LoopDone);
        self.emit(WorkerEvent::Finished);

        if aborted {
            self.metrics.record_run_aborted();
        } else {
            self.metrics.record_run_completed();
        }
        self.metrics.record_run_time(start.elapsed());

        tracing::debug!(
            "Worker run finished in {:.2}s (aborted: {})",
            start.elapsed().as_secs_f64(),
            aborted
        );
    }

    /// Send an event to whoever is listening
    ///
    /// Fire-and-forget: a run proceeds identically whether or not anyone is
    /// subscribed.
    fn emit(&self, event: WorkerEvent) {
        tracing::debug!("Worker event: {}", event);

        if self.events.send(event).is_err() {
            self.metrics.record_event_send_error();
        } else {
            self.metrics.record_event_emitted();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        tracing::trace!("Worker dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_settings(steps: usize, interval_ms: u64) -> RunnerSettings {
        RunnerSettings {
            work_steps: steps,
            step_interval_ms: interval_ms,
            ..RunnerSettings::default()
        }
    }

    fn drain(rx: &mut broadcast::Receiver<WorkerEvent>) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_event_display_texts() {
        assert_eq!(WorkerEvent::Started.to_string(), "started");
        assert_eq!(
            WorkerEvent::StepCompleted { step: 3 }.to_string(),
            "completed step 3"
        );
        assert_eq!(
            WorkerEvent::Aborted { step: 2 }.to_string(),
            "aborted at step 2"
        );
        assert_eq!(WorkerEvent::LoopDone.to_string(), "loop done");
        assert_eq!(WorkerEvent::Finished.to_string(), "finished");
    }

    #[test]
    fn test_full_run_event_sequence() {
        let (tx, mut rx) = broadcast::channel(32);
        let worker = Worker::new(
            CancelFlag::new(),
            tx,
            &fast_settings(3, 1),
            Arc::new(Metrics::new()),
        );

        worker.run();

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                WorkerEvent::Started,
                WorkerEvent::StepCompleted { step: 0 },
                WorkerEvent::StepCompleted { step: 1 },
                WorkerEvent::StepCompleted { step: 2 },
                WorkerEvent::LoopDone,
                WorkerEvent::Finished,
            ]
        );
    }

    #[test]
    fn test_cancel_cuts_run_short() {
        let (tx, mut rx) = broadcast::channel(32);
        let flag = CancelFlag::new();
        let worker = Worker::new(
            flag.clone(),
            tx,
            &fast_settings(10, 20),
            Arc::new(Metrics::new()),
        );

        let handle = thread::spawn(move || worker.run());
        thread::sleep(Duration::from_millis(50));
        flag.request_cancel();
        handle.join().unwrap();

        let events = drain(&mut rx);

        // One abort, then the common tail; never a completion after it.
        let abort_index = events
            .iter()
            .position(|e| matches!(e, WorkerEvent::Aborted { .. }))
            .expect("run should have aborted");
        assert!(
            events[abort_index + 1..]
                .iter()
                .all(|e| !matches!(e, WorkerEvent::StepCompleted { .. })),
            "no step may complete after the abort: {:?}",
            events
        );
        assert_eq!(events[events.len() - 2], WorkerEvent::LoopDone);
        assert_eq!(events[events.len() - 1], WorkerEvent::Finished);
    }

    #[test]
    fn test_stale_flag_is_reset_before_the_loop() {
        let (tx, mut rx) = broadcast::channel(32);
        let flag = CancelFlag::new();
        flag.request_cancel();

        let worker = Worker::new(
            flag.clone(),
            tx,
            &fast_settings(2, 1),
            Arc::new(Metrics::new()),
        );
        worker.run();

        let events = drain(&mut rx);
        assert!(
            events
                .iter()
                .all(|e| !matches!(e, WorkerEvent::Aborted { .. })),
            "a stale pre-set flag must not abort a fresh run: {:?}",
            events
        );
        assert_eq!(events[events.len() - 1], WorkerEvent::Finished);
        assert!(!flag.get());
    }

    #[test]
    fn test_metrics_recorded_for_completed_run() {
        use std::sync::atomic::Ordering;

        let (tx, _rx) = broadcast::channel(32);
        let metrics = Arc::new(Metrics::new());
        let worker = Worker::new(
            CancelFlag::new(),
            tx,
            &fast_settings(4, 1),
            Arc::clone(&metrics),
        );

        worker.run();

        assert_eq!(metrics.runs_completed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.runs_aborted.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.steps_completed.load(Ordering::Relaxed), 4);
        // started, 4 completions, loop done, finished
        assert_eq!(metrics.events_emitted.load(Ordering::Relaxed), 7);
    }
}
