//! Logging setup for the observer crate.
//!
//! The observer itself only emits `tracing` events; installing a
//! subscriber is left to the host via [`init_logging`].

mod logging;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
