//! # callbeacon-core
//!
//! Core library for callbeacon - usage telemetry for library call sites.
//!
//! This library provides:
//! - Domain types for raw call events, privacy policy, and upload records
//! - The telemetry pipeline: redaction, clock-skew correction, batching,
//!   debounced upload
//! - Configuration management
//! - Logging infrastructure
//!
//! Telemetry never interferes with the host: submissions return immediately
//! and every failure downstream of them is logged and dropped.
//!
//! ## Example
//!
//! ```rust,no_run
//! use callbeacon_core::{Config, TelemetryClient};
//!
//! # async fn run(event: callbeacon_core::RawEvent) {
//! let config = Config::load().expect("failed to load config");
//!
//! if let Some(client) = TelemetryClient::from_config(&config.telemetry).expect("bad config") {
//!     client.submit(event);
//! }
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use telemetry::{TelemetryClient, TelemetryOptions};
pub use types::*;

// Public modules
pub mod config;
pub mod error;
pub mod logging;
pub mod telemetry;
pub mod types;
