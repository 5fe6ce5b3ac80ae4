// Run metrics module
//
// Provides lightweight metrics tracking for worker runs and event delivery

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters for worker runs and event delivery
///
/// Uses atomic operations for thread-safe tracking without locks. The worker
/// thread and the controller thread both record into the same instance, which
/// can be logged on shutdown for a run summary.
#[derive(Debug)]
pub struct Metrics {
    /// Runs started by the controller
    pub runs_started: AtomicUsize,

    /// Runs that walked through every work unit
    pub runs_completed: AtomicUsize,

    /// Runs cut short by a cancellation request
    pub runs_aborted: AtomicUsize,

    /// Work units completed across all runs
    pub steps_completed: AtomicU64,

    /// Events successfully handed to the broadcast channel
    pub events_emitted: AtomicU64,

    /// Events dropped because no receiver was subscribed
    pub event_send_errors: AtomicU64,

    /// Total worker run time in milliseconds
    pub total_run_time_ms: AtomicU64,

    /// Process start time
    start_time: Instant,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            runs_started: AtomicUsize::new(0),
            runs_completed: AtomicUsize::new(0),
            runs_aborted: AtomicUsize::new(0),
            steps_completed: AtomicU64::new(0),
            events_emitted: AtomicU64::new(0),
            event_send_errors: AtomicU64::new(0),
            total_run_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a run being started
    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a run that completed all of its work units
    pub fn record_run_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a run that was aborted by cancellation
    pub fn record_run_aborted(&self) {
        self.runs_aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed work unit
    pub fn record_step_completed(&self) {
        self.steps_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event delivered to the broadcast channel
    pub fn record_event_emitted(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event that found no subscribers
    pub fn record_event_send_error(&self) {
        self.event_send_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record wall-clock time spent inside a worker run
    pub fn record_run_time(&self, duration: Duration) {
        self.total_run_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get average run time in milliseconds across finished runs
    pub fn avg_run_time_ms(&self) -> f64 {
        let total = self.total_run_time_ms.load(Ordering::Relaxed);
        let count = self.runs_completed.load(Ordering::Relaxed)
            + self.runs_aborted.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let uptime = self.uptime();
        tracing::info!("=== Run Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", uptime.as_secs_f64());
        tracing::info!(
            "Runs: {} started, {} completed, {} aborted",
            self.runs_started.load(Ordering::Relaxed),
            self.runs_completed.load(Ordering::Relaxed),
            self.runs_aborted.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Work units completed: {}",
            self.steps_completed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Total run time: {:.2}s (avg: {:.2}ms per run)",
            self.total_run_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_run_time_ms()
        );
        tracing::info!(
            "Events: {} emitted, {} undelivered",
            self.events_emitted.load(Ordering::Relaxed),
            self.event_send_errors.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
