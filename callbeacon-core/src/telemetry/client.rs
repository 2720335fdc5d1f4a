//! Telemetry client: the entry point call sites talk to
//!
//! The client redacts, stamps, queues, and schedules; it never reports a
//! failure back to the caller.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::types::{ClientInfo, PreparedRecord, PrivacyConfig, RawEvent};

use super::queue::{BatchQueue, FlushTimer};
use super::redact;
use super::skew::SkewResolver;
use super::transport::{CollectionSink, HttpClock, HttpSink};
use super::uploader::Uploader;

/// Policy and identity for one client instance
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    /// Which event fields may leave the process
    pub privacy: PrivacyConfig,
    /// Quiet period after the last submission before a flush
    pub debounce: Duration,
    /// Build info stamped on every record
    pub client: ClientInfo,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            privacy: PrivacyConfig::default(),
            debounce: Duration::from_secs(10),
            client: ClientInfo::current(),
        }
    }
}

impl TelemetryOptions {
    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self {
            privacy: config.privacy,
            debounce: config.debounce(),
            client: ClientInfo::current(),
        }
    }
}

/// Batches call events and uploads them once submissions go quiet.
///
/// Cloning is cheap; clones share the same queue and timer.
#[derive(Clone)]
pub struct TelemetryClient {
    inner: Arc<Inner>,
}

struct Inner {
    options: TelemetryOptions,
    skew: Arc<SkewResolver>,
    uploader: Uploader,
    queue: Mutex<BatchQueue>,
    timer: Mutex<FlushTimer>,
}

impl TelemetryClient {
    pub fn new(
        options: TelemetryOptions,
        sink: Arc<dyn CollectionSink>,
        skew: Arc<SkewResolver>,
    ) -> Self {
        let timer = FlushTimer::new(options.debounce);
        Self {
            inner: Arc::new(Inner {
                options,
                skew,
                uploader: Uploader::new(sink),
                queue: Mutex::new(BatchQueue::new()),
                timer: Mutex::new(timer),
            }),
        }
    }

    /// Create a client from configuration, using HTTP for both the collection
    /// endpoint and the process-wide clock-skew resolver.
    ///
    /// Returns None if no endpoint is configured or privacy is switched off.
    pub fn from_config(config: &TelemetryConfig) -> Result<Option<Self>> {
        if !config.is_ready() {
            return Ok(None);
        }

        let sink = Arc::new(HttpSink::new(config)?);
        let skew = SkewResolver::global(Arc::new(HttpClock::new(config)?));

        Ok(Some(Self::new(
            TelemetryOptions::from_config(config),
            sink,
            skew,
        )))
    }

    /// Hand an event over and return immediately.
    ///
    /// The work runs on the ambient tokio runtime. Outside a runtime the
    /// event is dropped.
    pub fn submit(&self, event: RawEvent) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.clone();
                handle.spawn(async move {
                    client.record(event).await;
                });
            }
            Err(_) => {
                tracing::debug!(method = %event.method, "No async runtime, dropping telemetry event");
            }
        }
    }

    /// Redact, stamp, and queue an event, rescheduling the flush.
    ///
    /// Returns false when the privacy policy left nothing to send.
    pub async fn record(&self, event: RawEvent) -> bool {
        let fields = redact::prepare(&event, &self.inner.options.privacy);
        if fields.is_empty() {
            tracing::trace!(method = %event.method, "Privacy policy withheld every field, dropping event");
            return false;
        }

        let skew = self.inner.skew.resolve().await;
        let record = PreparedRecord::new(fields, &self.inner.options.client, skew);
        Inner::enqueue(&self.inner, record);
        true
    }

    /// Cancel the pending timer and upload whatever is queued right now.
    ///
    /// Returns the number of records handed to the collection sink.
    pub async fn flush_now(&self) -> usize {
        self.inner.timer.lock().cancel();
        self.inner.uploader.flush(&self.inner.queue).await
    }

    /// Get number of records waiting for upload
    pub fn pending_count(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Check if there are any records waiting for upload
    pub fn has_pending(&self) -> bool {
        !self.inner.queue.lock().is_empty()
    }

    /// Check if a debounced flush is scheduled
    pub fn flush_scheduled(&self) -> bool {
        self.inner.timer.lock().is_armed()
    }
}

impl Inner {
    fn enqueue(this: &Arc<Inner>, record: PreparedRecord) {
        this.queue.lock().push(record);

        let inner = this.clone();
        this.timer.lock().arm(async move {
            inner.uploader.flush(&inner.queue).await;
        });
    }
}
