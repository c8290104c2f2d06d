//! Typed configuration for Skyway.
//!
//! - TOML and JSON files
//! - environment overrides
//! - strict parsing: unknown keys are errors
//! - layering: defaults → files → environment
//!
//! # Example
//!
//! ```no_run
//! use skyway_config::ConfigLoader;
//!
//! # fn main() -> Result<(), skyway_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("skyway.toml")?
//!     .with_env_prefix("SKYWAY")
//!     .load()?;
//!
//! println!("docs served at {}", config.routes.docs_path);
//! # Ok(())
//! # }
//! ```
//!
//! # File format
//!
//! ```toml
//! [routes]
//! fail_on_missing_handler = true
//! docs_path = "/docs"
//!
//! [cors]
//! origin = "*"
//! allowed_headers = ["content-type", "authorization"]
//! max_age = 600
//!
//! [validation]
//! path = "allow"
//! query = "strip"
//! header = "strip"
//! body = "allow"
//!
//! [logging]
//! level = "info,skyway_middleware=debug"
//! json_format = true
//! ```
//!
//! # Environment overrides
//!
//! Variables named `PREFIX__SECTION__KEY` override single values, e.g.
//! `SKYWAY__VALIDATION__QUERY=strip` or `SKYWAY__CORS__ORIGIN=true`. List
//! values are comma separated.

#![doc(html_root_url = "https://docs.rs/skyway-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::SkywayConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{CorsConfig, RoutesConfig};
