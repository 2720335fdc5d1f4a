//! Usage telemetry pipeline
//!
//! Call sites hand [`RawEvent`](crate::types::RawEvent)s to a
//! [`TelemetryClient`]; the client ships them in batches to a collection
//! endpoint.
//!
//! ## Pipeline
//!
//! ```text
//! submit ─► redact ─► clock skew ─► queue ─► (quiet for debounce window) ─► upload
//!             │
//!             └─ nothing left: dropped
//! ```
//!
//! - Redaction follows the host's [`PrivacyConfig`](crate::types::PrivacyConfig)
//!   before anything is queued
//! - Clock skew is looked up once per process and attached to every record
//! - Every submission restarts the flush timer; the upload fires one debounce
//!   window after the last submission
//! - Uploads are single best-effort requests: no retry, no persistence
//!
//! ## Timeouts
//!
//! The only deadline is the HTTP client's per-request timeout,
//! `telemetry.timeout_secs` (default 30s), shared by [`HttpSink`] and
//! [`HttpClock`]. A time service that stalls holds back every record waiting
//! on skew for up to that long; a timed-out lookup settles on unknown skew.
//! Custom [`CollectionSink`] and [`TimeSource`] implementations get no
//! timeout from the pipeline.
//!
//! ## Usage
//!
//! Enable uploads in `~/.config/callbeacon/config.toml`:
//!
//! ```toml
//! [telemetry]
//! endpoint = "https://telemetry.example.com/v1/events"
//!
//! [telemetry.privacy]
//! timings = false
//! ```

mod client;
mod queue;
mod redact;
mod skew;
mod transport;
mod uploader;

pub use client::{TelemetryClient, TelemetryOptions};
pub use queue::{BatchQueue, FlushTimer};
pub use redact::prepare;
pub use skew::SkewResolver;
pub use transport::{CollectionSink, HttpClock, HttpSink, TimeSource};
pub use uploader::{encode_batch, Uploader};
