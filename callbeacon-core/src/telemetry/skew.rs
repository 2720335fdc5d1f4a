//! Clock-skew resolution
//!
//! Records carry the offset between the local clock and a trusted time
//! authority so the collector can correct call timestamps. The offset is
//! looked up once per process:
//!
//! ```text
//! unresolved ──first resolve()──► resolving ──answer/failure──► resolved
//!                                     ▲
//!                 concurrent resolve() calls wait here
//! ```
//!
//! A failed lookup settles on [`Skew::Unknown`] for the rest of the process.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;

use crate::types::Skew;

use super::transport::TimeSource;

static GLOBAL: OnceLock<Arc<SkewResolver>> = OnceLock::new();

/// Resolves and caches the clock skew against a [`TimeSource`]
pub struct SkewResolver {
    source: Arc<dyn TimeSource>,
    state: OnceCell<Skew>,
}

impl SkewResolver {
    /// Create a resolver with its own cache
    pub fn new(source: Arc<dyn TimeSource>) -> Self {
        Self {
            source,
            state: OnceCell::new(),
        }
    }

    /// The process-wide resolver, created on first use.
    ///
    /// Only the first caller's `source` is used; later callers get the
    /// existing instance.
    pub fn global(source: Arc<dyn TimeSource>) -> Arc<SkewResolver> {
        GLOBAL
            .get_or_init(|| Arc::new(SkewResolver::new(source)))
            .clone()
    }

    /// Resolve the skew, querying the time source at most once.
    ///
    /// Concurrent callers share the single in-flight lookup.
    pub async fn resolve(&self) -> Skew {
        *self
            .state
            .get_or_init(|| async {
                match self.source.now().await {
                    Ok(remote) => {
                        let skew = Skew::Offset(offset_seconds(remote, Utc::now()));
                        tracing::debug!(skew = %skew, "Clock skew resolved");
                        skew
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Clock skew unavailable, records will carry unknown skew");
                        Skew::Unknown
                    }
                }
            })
            .await
    }

    /// The settled skew, if resolution has finished
    pub fn cached(&self) -> Option<Skew> {
        self.state.get().copied()
    }
}

/// Whole seconds from `local` to `remote`, rounded toward negative infinity
fn offset_seconds(remote: DateTime<Utc>, local: DateTime<Utc>) -> i64 {
    (remote - local).num_milliseconds().div_euclid(1000)
}
