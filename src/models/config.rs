use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration from sidejob.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(rename = "Runner", default)]
    pub runner: RunnerSettings,
}

/// Timing and sizing knobs for the controller/worker pair
///
/// The defaults mirror the reference behavior: ten one-second work units per
/// run, a 200 ms poll while waiting for the worker thread to exit. Tests
/// shrink the intervals to the millisecond range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// Work units in one run
    #[serde(rename = "Work Steps", default = "default_work_steps")]
    pub work_steps: usize,

    /// Simulated duration of one work unit, in milliseconds
    #[serde(rename = "Step Interval ms", default = "default_step_interval_ms")]
    pub step_interval_ms: u64,

    /// Sleep between thread-exit checks while stopping, in milliseconds
    #[serde(rename = "Stop Poll ms", default = "default_stop_poll_ms")]
    pub stop_poll_ms: u64,

    /// Stop waits past this long are logged as warnings, in milliseconds
    #[serde(rename = "Stop Warn After ms", default = "default_stop_warn_after_ms")]
    pub stop_warn_after_ms: u64,

    /// Broadcast channel capacity for worker events
    #[serde(rename = "Event Buffer", default = "default_event_buffer")]
    pub event_buffer: usize,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            work_steps: 10,
            step_interval_ms: 1000,
            stop_poll_ms: 200,
            stop_warn_after_ms: 30_000,
            event_buffer: 100,
            debug_mode: false,
        }
    }
}

fn default_work_steps() -> usize {
    10
}

fn default_step_interval_ms() -> u64 {
    1000
}

fn default_stop_poll_ms() -> u64 {
    200
}

fn default_stop_warn_after_ms() -> u64 {
    30_000
}

fn default_event_buffer() -> usize {
    100
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            runner: RunnerSettings::default(),
        }
    }
}

impl RunnerSettings {
    /// Duration of one work unit
    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }

    /// Sleep between thread-exit checks during a stop
    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_ms)
    }

    /// How long a stop may wait silently before warning
    pub fn stop_warn_after(&self) -> Duration {
        Duration::from_millis(self.stop_warn_after_ms)
    }
}
