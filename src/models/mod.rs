//! Data models for the sidejob runner.
//!
//! - [`RunnerConfig`]: top-level structure of `sidejob.yaml`
//! - [`RunnerSettings`]: timing and sizing knobs for the controller/worker
//!   pair, with serde defaults matching the reference behavior
//!
//! All config structs derive `Serialize`/`Deserialize` for YAML persistence
//! through [`ConfigManager`](crate::config::ConfigManager).

pub mod config;

pub use config::{RunnerConfig, RunnerSettings};
