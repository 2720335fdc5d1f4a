//! Batch queue and debounced flush timer

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::types::PreparedRecord;

/// Records waiting for the next upload, in submission order
#[derive(Debug, Default)]
pub struct BatchQueue {
    records: Vec<PreparedRecord>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Identical records are kept as separate entries.
    pub fn push(&mut self, record: PreparedRecord) {
        self.records.push(record);
    }

    /// Remove and return every queued record, leaving the queue empty
    pub fn take(&mut self) -> Vec<PreparedRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Single-shot timer that restarts on every [`arm`](FlushTimer::arm).
///
/// At most one flush is pending at a time. Once the delay elapses the flush
/// runs as its own task, so re-arming never aborts an upload in flight.
#[derive(Debug)]
pub struct FlushTimer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl FlushTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Cancel any pending flush and schedule `flush` to run after the delay.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&mut self, flush: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(flush);
        }));
    }

    /// Drop the pending flush, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// True while a flush is scheduled but has not fired yet
    pub fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientInfo, RedactedEvent, Skew};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn make_record(method: &str) -> PreparedRecord {
        let fields = RedactedEvent {
            method: Some(method.to_string()),
            ..Default::default()
        };
        PreparedRecord::new(fields, &ClientInfo::new("0.1.0", "test"), Skew::Offset(0))
    }

    fn counting_flush(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_queue_keeps_order_and_duplicates() {
        let mut queue = BatchQueue::new();
        queue.push(make_record("get"));
        queue.push(make_record("post"));
        queue.push(make_record("get"));
        assert_eq!(queue.len(), 3);

        let taken = queue.take();
        let methods: Vec<_> = taken
            .iter()
            .map(|r| r.fields.method.as_deref().unwrap())
            .collect();
        assert_eq!(methods, vec!["get", "post", "get"]);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut timer = FlushTimer::new(Duration::from_secs(10));

        timer.arm(counting_flush(&counter));
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_millis(9_900)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_restarts_the_window() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut timer = FlushTimer::new(Duration::from_secs(10));

        timer.arm(counting_flush(&counter));
        tokio::time::sleep(Duration::from_secs(4)).await;
        timer.arm(counting_flush(&counter));
        tokio::time::sleep(Duration::from_secs(5)).await;
        timer.arm(counting_flush(&counter));

        // t = 9s; the first arm alone would have fired at t = 10s
        tokio::time::sleep(Duration::from_millis(9_900)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // t = 19.1s
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_flush() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut timer = FlushTimer::new(Duration::from_secs(1));

        timer.arm(counting_flush(&counter));
        timer.cancel();
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
