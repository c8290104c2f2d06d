//! Logging setup for Skyway.
//!
//! Every Skyway crate emits `tracing` events with structured fields; this
//! crate turns them into output. Hosts that already install their own
//! subscriber can skip it entirely.
//!
//! ```rust,ignore
//! use skyway_telemetry::{init_logging, LogConfig};
//!
//! let config = LogConfig {
//!     level: "info,skyway_middleware=debug".to_string(),
//!     ..LogConfig::production()
//! };
//! init_logging(&config)?;
//! ```

#![doc(html_root_url = "https://docs.rs/skyway-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig};

/// Result type for telemetry setup.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
