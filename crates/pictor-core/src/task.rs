//! Task handles, progress reporting, and callback plumbing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::LoadResult;
use crate::model::ImageFrame;

/// Cache layer that satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
    /// Fast-path in-memory cache.
    Memory,
    /// On-disk cache.
    Disk,
}

/// Completed load payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResponse {
    /// Final decoded frame after all processors ran.
    pub frame: ImageFrame,
    /// Cache layer that satisfied the request, when any.
    pub cache: Option<CacheSource>,
    /// Delivery timestamp assigned by the pipeline.
    pub received_at: DateTime<Utc>,
}

impl ImageResponse {
    /// Fresh (non-cached) response for the given frame, stamped now.
    #[must_use]
    pub fn fresh(frame: ImageFrame) -> Self {
        Self {
            frame,
            cache: None,
            received_at: Utc::now(),
        }
    }

    /// Response served from the given cache layer, stamped now.
    #[must_use]
    pub fn cached(frame: ImageFrame, cache: CacheSource) -> Self {
        Self {
            frame,
            cache: Some(cache),
            received_at: Utc::now(),
        }
    }
}

/// Progress snapshot for an in-flight load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Bytes fetched so far.
    pub completed_bytes: u64,
    /// Expected total, zero when unknown.
    pub total_bytes: u64,
    /// Progressive preview, when the decoder produces one.
    pub preview: Option<ImageFrame>,
}

impl ProgressUpdate {
    /// Completion percentage (0-100), zero while the total is unknown.
    #[must_use]
    pub fn percent_complete(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (to_f64(self.completed_bytes) / to_f64(self.total_bytes)) * 100.0
        }
    }
}

const fn to_f64(value: u64) -> f64 {
    #[expect(
        clippy::cast_precision_loss,
        reason = "u64 to f64 conversion is required for user-facing percentage reporting"
    )]
    {
        value as f64
    }
}

/// Progress callback delivered on the submission's dispatch target.
pub type ProgressHandler = Box<dyn FnMut(ProgressUpdate) + Send>;

/// Completion callback delivered exactly once per submission.
pub type CompletionHandler = Box<dyn FnOnce(LoadResult) + Send>;

/// Cancellation flag shared between a task handle and its pipeline driver.
#[derive(Debug, Default)]
pub struct Cancellation {
    flag: AtomicBool,
    notify: Notify,
}

impl Cancellation {
    /// Request cancellation and wake any waiting driver.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Wait until cancellation is requested.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Opaque handle to an in-flight load.
///
/// The handle only adds cancellation on top of whatever contract the
/// pipeline exposes; the builder layer holds no cancellation state of its
/// own. Clones share one flag.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: Uuid,
    cancellation: Arc<Cancellation>,
}

impl TaskHandle {
    /// Handle backed by a fresh cancellation flag.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cancellation(Arc::new(Cancellation::default()))
    }

    /// Handle sharing an existing cancellation flag with its driver.
    #[must_use]
    pub fn with_cancellation(cancellation: Arc<Cancellation>) -> Self {
        Self {
            id: Uuid::new_v4(),
            cancellation,
        }
    }

    /// Pipeline-assigned task identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Request cancellation of the underlying work.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Shared cancellation flag for pipeline drivers.
    #[must_use]
    pub fn cancellation(&self) -> Arc<Cancellation> {
        Arc::clone(&self.cancellation)
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_handles_unknown_total() {
        let unknown = ProgressUpdate {
            completed_bytes: 512,
            total_bytes: 0,
            preview: None,
        };
        assert!(unknown.percent_complete().abs() < f64::EPSILON);

        let half = ProgressUpdate {
            completed_bytes: 5,
            total_bytes: 10,
            preview: None,
        };
        assert!((half.percent_complete() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn handle_clones_share_the_cancellation_flag() {
        let handle = TaskHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_cancelled());

        handle.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(handle.id(), clone.id());
    }

    #[tokio::test]
    async fn cancelled_wait_observes_a_prior_cancel() {
        let cancellation = Arc::new(Cancellation::default());
        cancellation.cancel();
        cancellation.cancelled().await;
    }

    #[tokio::test]
    async fn cancelled_wait_wakes_on_cancel() {
        let cancellation = Arc::new(Cancellation::default());
        let waiter = {
            let cancellation = Arc::clone(&cancellation);
            tokio::spawn(async move { cancellation.cancelled().await })
        };
        tokio::task::yield_now().await;
        cancellation.cancel();
        waiter.await.expect("waiter task panicked");
    }
}
