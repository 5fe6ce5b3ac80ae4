// sidejob - start/stop control for a cancellable background worker thread
//
// This is the library crate containing the cancellation flag, the worker and
// the controller. The binary crate (main.rs) provides a scripted demo driver.

pub mod cancel;
pub mod config;
pub mod controller;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod worker;

// Re-export commonly used types for convenience
pub use cancel::CancelFlag;
pub use config::ConfigManager;
pub use controller::{ControlError, Controller, RunState};
pub use models::{RunnerConfig, RunnerSettings};
pub use worker::{Worker, WorkerEvent};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
