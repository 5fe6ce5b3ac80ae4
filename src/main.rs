//! sidejob - scripted demo driver for the cancellable worker controller
//!
//! # Overview
//!
//! This binary exercises the full start/stop protocol from a plain console
//! main loop standing in for a UI thread:
//! - Logging infrastructure (file rotation + console output)
//! - YAML settings loaded through [`ConfigManager`]
//! - A [`Controller`] driven through both terminal paths: a run cancelled
//!   partway through, then a run left to complete naturally
//! - An event log sink on its own thread, playing the role the original
//!   window's text log played
//!
//! # Execution Flow
//!
//! 1. Load settings from config/sidejob.yaml (defaults if missing)
//! 2. Initialize logging → logs/sidejob.<date>
//! 3. Start a run, pump the controller for ~2.5 work units, stop it
//! 4. Start a second run and poll until it retires itself
//! 5. Log the metrics summary and shut down
//!
//! The main loop never blocks without pumping: while `stop()` waits for the
//! worker thread it keeps draining the controller's event queue, so the
//! console stays live and a natural completion racing the stop still lands.

use anyhow::Result;
use sidejob::{APP_NAME, ConfigManager, Controller, VERSION, WorkerEvent};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

fn main() -> Result<()> {
    // Settings first; the chosen debug level feeds the log filter
    let config_manager = ConfigManager::new("config")?;
    let config = config_manager.load_settings()?;

    let _log_guard =
        sidejob::logging::setup_logging("logs", "sidejob", config.runner.debug_mode, true)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!(
        "Runner settings: {} steps of {}ms, stop poll {}ms (from {})",
        config.runner.work_steps,
        config.runner.step_interval_ms,
        config.runner.stop_poll_ms,
        config_manager.config_dir()
    );

    let mut controller = Controller::new(config.runner.clone());
    let metrics = controller.metrics();

    // Event log sink - the stand-in for the original text-log widget
    let sink = spawn_event_log_sink(controller.subscribe());

    let step = config.runner.step_interval();
    let tick = config.runner.stop_poll_interval();

    // First run: request a stop partway through the third work unit
    tracing::info!("Demo: starting a run, then stopping it mid-flight");
    controller.start()?;
    pump_for(&mut controller, step.mul_f32(2.5), tick);
    controller.stop();
    tracing::info!("Stop returned; controller idle: {}", controller.is_idle());

    // Second run: sequential reuse, natural completion
    tracing::info!("Demo: starting a second run and letting it finish");
    controller.start()?;
    while !controller.is_idle() {
        controller.poll();
        thread::sleep(tick);
    }
    tracing::info!("Second run completed on its own");

    metrics.log_summary();

    // Dropping the controller closes the event channel; the sink drains the
    // remaining events and exits
    drop(controller);
    if sink.join().is_err() {
        tracing::error!("Event log sink panicked");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Drive the controller's event queue for a stretch of wall-clock time
fn pump_for(controller: &mut Controller, total: Duration, tick: Duration) {
    let deadline = Instant::now() + total;
    while Instant::now() < deadline {
        controller.poll();
        thread::sleep(tick);
    }
}

/// Drain the worker event stream onto the log from a dedicated thread
fn spawn_event_log_sink(
    mut events: broadcast::Receiver<WorkerEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        tracing::debug!("Event log sink started");

        loop {
            match events.blocking_recv() {
                Ok(event) => tracing::info!("worker: {}", event),
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event log sink lagged; {} events skipped", skipped);
                }
            }
        }

        tracing::debug!("Event log sink terminated");
    })
}
