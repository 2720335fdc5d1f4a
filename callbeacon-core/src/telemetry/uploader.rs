//! Uploader: drains the batch queue into one collection request

use std::io::Write;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;

use crate::error::Result;
use crate::types::PreparedRecord;

use super::queue::BatchQueue;
use super::transport::CollectionSink;

/// Sends the whole queue as a single gzip-compressed JSON array
pub struct Uploader {
    sink: Arc<dyn CollectionSink>,
}

impl Uploader {
    pub fn new(sink: Arc<dyn CollectionSink>) -> Self {
        Self { sink }
    }

    /// Upload everything currently queued.
    ///
    /// The queue is emptied as the request is issued, whatever its outcome;
    /// failures are logged and the records are gone. Returns the number of
    /// records handed to the sink (0 when the queue was empty and nothing
    /// was sent).
    pub async fn flush(&self, queue: &Mutex<BatchQueue>) -> usize {
        let records = queue.lock().take();
        if records.is_empty() {
            tracing::trace!("Flush with empty queue, nothing to upload");
            return 0;
        }

        let count = records.len();
        match self.dispatch(&records).await {
            Ok(()) => {
                tracing::debug!(records = count, "Uploaded telemetry batch");
            }
            Err(e) => {
                tracing::warn!(
                    records = count,
                    error = %e,
                    "Failed to upload telemetry batch, dropping it"
                );
            }
        }
        count
    }

    async fn dispatch(&self, records: &[PreparedRecord]) -> Result<()> {
        let body = encode_batch(records)?;
        self.sink.post(body).await
    }
}

/// Serialize records as a JSON array and gzip it
pub fn encode_batch(records: &[PreparedRecord]) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(records)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;

    tracing::trace!(
        records = records.len(),
        json_bytes = json.len(),
        gzip_bytes = compressed.len(),
        "Encoded telemetry batch"
    );
    Ok(compressed)
}
