// Controller - start/stop protocol and worker-thread lifecycle
//
// The controller owns the (thread, flag, worker) triple for the run in
// flight and the broadcast channel every run emits into. It is confined to
// the thread that created it (typically a UI or main-loop thread); the only
// state it shares with the worker is the CancelFlag and the channel.

use crate::cancel::CancelFlag;
use crate::metrics::Metrics;
use crate::models::RunnerSettings;
use crate::worker::{Worker, WorkerEvent};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

/// Errors surfaced by the start/stop protocol
///
/// Misuse (starting while a run is active, stopping with none) is defined as
/// a no-op rather than an error; spawning the worker thread is the only
/// operation that can actually fail.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Lifecycle of the controller's current run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// No worker thread exists; `start()` is accepted
    Idle,

    /// A worker thread is executing its run
    Running,

    /// Cancellation has been requested; waiting for the thread to exit
    StoppingRequested,
}

/// The active (thread, flag) pair for one run
///
/// The flag handle lives here so it is released only after the join has
/// confirmed the worker thread exited; a worker still running can therefore
/// never observe a dangling flag.
struct ActiveRun {
    thread: thread::JoinHandle<()>,
    flag: CancelFlag,
}

/// Owner of the worker-thread lifecycle and the start/stop protocol
///
/// At most one run is active at a time; a new run is accepted only once the
/// previous one has been fully retired (thread exited, flag released).
/// Sequential reuse is the intended pattern: `start()`, observe the run via
/// [`subscribe()`](Self::subscribe), `stop()` or wait for natural
/// completion, `start()` again.
///
/// The owner's event loop must call [`poll()`](Self::poll) regularly; that
/// is where natural completion is detected and the finished run retired.
///
/// # Example
/// ```ignore
/// let mut controller = Controller::new(settings);
/// let mut events = controller.subscribe();
///
/// controller.start()?;
/// loop {
///     controller.poll();
///     if controller.is_idle() {
///         break;
///     }
///     std::thread::sleep(tick);
/// }
/// ```
pub struct Controller {
    /// Step counts and wait intervals for the runs this controller starts
    settings: RunnerSettings,

    /// Sender half of the event channel; cloned into each worker
    event_tx: broadcast::Sender<WorkerEvent>,

    /// The controller's own subscription, drained by `poll()` and `stop()`
    event_rx: broadcast::Receiver<WorkerEvent>,

    /// The run in flight, `None` when idle
    run: Option<ActiveRun>,

    /// Current protocol state
    state: RunState,

    /// Shared run counters
    metrics: Arc<Metrics>,
}

impl Controller {
    /// Create an idle controller
    pub fn new(settings: RunnerSettings) -> Self {
        let (event_tx, event_rx) = broadcast::channel(settings.event_buffer);
        Self {
            settings,
            event_tx,
            event_rx,
            run: None,
            state: RunState::Idle,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Subscribe to the worker event stream
    ///
    /// Returns a receiver that observes every event emitted after this call,
    /// in emission order. Any number of observers (log sink, UI) can listen
    /// simultaneously.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Current protocol state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// True when no run is active and `start()` would be accepted
    pub fn is_idle(&self) -> bool {
        self.state == RunState::Idle
    }

    /// Shared handle to the run counters
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Start a new run
    ///
    /// Creates a fresh [`CancelFlag`], binds a new [`Worker`] to it and
    /// spawns the worker thread. A no-op unless idle, so racy repeated
    /// triggers (double-clicked start button) are harmless.
    ///
    /// # Errors
    /// [`ControlError::Spawn`] if the OS refuses the thread; the controller
    /// stays idle.
    pub fn start(&mut self) -> Result<(), ControlError> {
        if self.state != RunState::Idle {
            tracing::debug!("Start ignored: run already active ({:?})", self.state);
            return Ok(());
        }

        let flag = CancelFlag::new();
        let worker = Worker::new(
            flag.clone(),
            self.event_tx.clone(),
            &self.settings,
            Arc::clone(&self.metrics),
        );

        let thread = thread::Builder::new()
            .name("sidejob-worker".into())
            .spawn(move || worker.run())?;

        self.run = Some(ActiveRun { thread, flag });
        self.state = RunState::Running;
        self.metrics.record_run_started();

        tracing::info!(
            "Worker thread started: {} steps of {:?}",
            self.settings.work_steps,
            self.settings.step_interval()
        );
        Ok(())
    }

    /// Process pending worker events without blocking
    ///
    /// Drains everything currently queued on the controller's receiver. On
    /// `Finished` the run is retired: the worker thread (already past its
    /// last emission) is joined and the flag released. The owner's event
    /// loop calls this each tick; it is how natural completion lands while
    /// the controller thread keeps doing other work.
    pub fn poll(&mut self) {
        while let Some(event) = self.next_pending_event() {
            tracing::trace!("Controller observed event: {}", event);
            if event == WorkerEvent::Finished {
                self.retire_run();
            }
        }
    }

    /// Request cancellation and wait for the worker thread to exit
    ///
    /// Sets the shared flag, then waits in a bounded loop: pump pending
    /// events, check the thread, sleep one poll interval. Pumping keeps the
    /// natural-completion path alive during the wait; the worker's
    /// `Finished` is delivered through the same receiver this loop drains,
    /// so a run that completes on its own while we wait retires cleanly
    /// instead of deadlocking the caller.
    ///
    /// Returns only after the thread exit is confirmed and the controller is
    /// idle. A no-op when no run is active, and safe to call again while a
    /// previous stop is in progress. There is no hard timeout: cancellation
    /// is cooperative, and the wait is bounded by the worker's remaining
    /// units. Waits past the configured warn threshold are logged so a stuck
    /// worker is visible rather than a silent hang.
    pub fn stop(&mut self) {
        if self.state == RunState::Idle {
            tracing::debug!("Stop ignored: no active run");
            return;
        }
        let Some(run) = self.run.as_ref() else {
            // State said active but the triple is gone; converge.
            self.state = RunState::Idle;
            return;
        };

        tracing::info!("Stop requested; cancelling worker");
        run.flag.request_cancel();
        self.state = RunState::StoppingRequested;

        let poll_interval = self.settings.stop_poll_interval();
        let warn_after = self.settings.stop_warn_after();
        let started = Instant::now();
        let mut last_warn = Instant::now();

        loop {
            self.poll();

            match self.run.as_ref() {
                None => break, // retired by the pump on Finished
                Some(run) if run.thread.is_finished() => break,
                Some(_) => {}
            }

            if last_warn.elapsed() >= warn_after {
                tracing::warn!(
                    "Worker thread still running {:.1}s after stop; continuing to wait",
                    started.elapsed().as_secs_f64()
                );
                last_warn = Instant::now();
            }

            thread::sleep(poll_interval);
        }

        // The thread has exited; its Finished is either already processed or
        // still queued. Drain once more, then force retirement in case the
        // event was lost to channel lag.
        self.poll();
        if self.run.is_some() {
            tracing::warn!("Finished event not observed; retiring run from stop");
            self.retire_run();
        }

        tracing::info!(
            "Stop complete after {:.2}s; controller idle",
            started.elapsed().as_secs_f64()
        );
    }

    /// Pull one queued event, riding out channel lag
    fn next_pending_event(&mut self) -> Option<WorkerEvent> {
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Controller receiver lagged; {} events skipped. Consider a larger event buffer.",
                        skipped
                    );
                }
            }
        }
    }

    /// Retire the current run: join the thread, release the flag, go idle
    ///
    /// `Finished` is the worker's final emission, so the join here only
    /// covers the few instructions between that send and the thread's exit.
    /// Both terminal paths (user stop, natural completion) converge on this
    /// method, and it tolerates being reached with no run left.
    fn retire_run(&mut self) {
        let Some(run) = self.run.take() else {
            self.state = RunState::Idle;
            return;
        };

        if let Err(panic) = run.thread.join() {
            tracing::error!("Worker thread panicked: {:?}", panic);
        }

        self.state = RunState::Idle;
        tracing::debug!("Run retired; ready to start again");
        // run.flag drops here, after the join confirmed the thread exited
    }
}

impl Drop for Controller {
    /// Shutdown hook: a worker must never outlive its controller
    fn drop(&mut self) {
        if self.run.is_some() {
            tracing::warn!("Controller dropped with a run still active; stopping worker");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_settings() -> RunnerSettings {
        RunnerSettings {
            work_steps: 3,
            step_interval_ms: 10,
            stop_poll_ms: 2,
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
    fn test_new_controller_is_idle() {
        let controller = Controller::new(fast_settings());
        assert_eq!(controller.state(), RunState::Idle);
        assert!(controller.is_idle());
    }

    #[test]
    fn test_start_transitions_to_running() {
        let mut controller = Controller::new(fast_settings());

        controller.start().unwrap();
        assert_eq!(controller.state(), RunState::Running);

        controller.stop();
        assert!(controller.is_idle());
    }

    #[test]
    fn test_start_while_running_is_a_noop() {
        let mut controller = Controller::new(fast_settings());
        let mut rx = controller.subscribe();

        controller.start().unwrap();
        controller.start().unwrap(); // ignored
        assert_eq!(controller.state(), RunState::Running);

        controller.stop();

        let finished = drain(&mut rx)
            .into_iter()
            .filter(|e| *e == WorkerEvent::Finished)
            .count();
        assert_eq!(finished, 1, "second start must not spawn a second worker");
    }

    #[test]
    fn test_stop_without_run_is_a_noop() {
        let mut controller = Controller::new(fast_settings());
        controller.stop();
        controller.stop();
        assert!(controller.is_idle());
    }

    #[test]
    fn test_natural_completion_retires_via_poll() {
        let mut controller = Controller::new(fast_settings());
        controller.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !controller.is_idle() {
            assert!(Instant::now() < deadline, "run never completed");
            controller.poll();
            thread::sleep(Duration::from_millis(2));
        }

        // Retired for real: a new run is accepted.
        controller.start().unwrap();
        controller.stop();
        assert!(controller.is_idle());
    }

    #[test]
    fn test_drop_while_running_stops_worker() {
        let mut rx;
        {
            let mut controller = Controller::new(RunnerSettings {
                work_steps: 50,
                step_interval_ms: 10,
                stop_poll_ms: 2,
                ..RunnerSettings::default()
            });
            rx = controller.subscribe();
            controller.start().unwrap();
            thread::sleep(Duration::from_millis(25));
        } // drop stops the run and joins the thread

        let events = drain(&mut rx);
        assert!(
            events.iter().any(|e| matches!(e, WorkerEvent::Aborted { .. })),
            "drop should cancel the run: {:?}",
            events
        );
        assert_eq!(events.last(), Some(&WorkerEvent::Finished));
    }
}
