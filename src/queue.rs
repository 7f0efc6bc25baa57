//! # Single-Flight Request Queue
//!
//! Session requests must never overlap: a response can rotate the session
//! key, and a request built from a stale key invalidates the session. The
//! queue runs submitted tasks one at a time, strictly in submission order.
//!
//! ## How It Works
//!
//! The queue keeps only the completion signal of the most recently submitted
//! task. Submitting swaps in a new signal and spawns a task that first waits
//! for the previous signal, then runs, then fires its own signal by dropping
//! it. Dropping also happens on panic or timeout, so one failed task never
//! wedges the tasks behind it.
//!
//! Tasks are spawned immediately: a task runs even if the caller never polls
//! the returned future.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct RequestQueue {
    /// Completion signal of the last enqueued task.
    tail: Mutex<Option<oneshot::Receiver<()>>>,
    timeout: Option<Duration>,
}

impl RequestQueue {
    /// A queue without a task timeout; a task that never settles stalls every
    /// task behind it.
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue that fails any task running longer than `timeout` with
    /// [`Error::Timeout`] and moves on to the next one.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { tail: Mutex::new(None), timeout: Some(timeout) }
    }

    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Schedules `task` behind every task enqueued so far.
    ///
    /// The position is fixed when this returns. The returned future resolves to
    /// the task's own result; a panicking task resolves to [`Error::Queue`].
    /// Must be called within a tokio runtime.
    pub fn enqueue<F, Fut, T>(&self, task: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let previous = self.tail.lock().unwrap_or_else(PoisonError::into_inner).replace(done_rx);
        let timeout = self.timeout;

        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                // Err only means the sender was dropped, which is how it settles.
                let _ = previous.await;
            }

            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, task()).await.unwrap_or_else(|_| {
                    tracing::warn!(?limit, "queued request timed out");
                    Err(Error::Timeout(limit))
                }),
                None => task().await,
            };

            drop(done_tx);
            result
        });

        async move { handle.await.map_err(|e| Error::Queue(e.to_string()))? }
    }

    /// Detaches from every task enqueued so far.
    ///
    /// Earlier tasks are neither cancelled nor awaited; they settle on their
    /// own while new tasks start without waiting for them.
    pub fn reset(&self) {
        self.tail.lock().unwrap_or_else(PoisonError::into_inner).take();
        tracing::debug!("request queue reset");
    }
}
