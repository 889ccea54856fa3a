//! Re-run an action whenever a watched file or directory changes.
//!
//! The core is [`FileTriggerRunner`]; [`write_file_atomic`] and [`ErrorCollector`] are small
//! helpers that pair with it.

pub mod atomic;
pub mod config;
pub mod errors;
pub mod trigger;

pub use atomic::write_file_atomic;
pub use config::TriggerConfig;
pub use errors::ErrorCollector;
pub use trigger::{
    BoxError, FileTriggerRunner, FilterStrategy, RunnerError, RunnerState, StopHandle, Trigger,
    TriggerKind,
};
