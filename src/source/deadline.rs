//! Cancellable deadline for a graph build
//!
//! The caller owns the token and may cancel it at any time. Every external
//! query runs under [`BuildDeadline::guard`], which aborts the query when the
//! token is cancelled or the deadline passes.

use super::traits::{SourceError, SourceResult};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct BuildDeadline {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
    expires_at: Option<Instant>,
    timeout: Option<Duration>,
}

impl BuildDeadline {
    /// A token with no deadline.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
            expires_at: None,
            timeout: None,
        }
    }

    /// A token that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            expires_at: Some(Instant::now() + timeout),
            timeout: Some(timeout),
            ..Self::new()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Signal cancellation. Queries in flight are aborted.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.notify.notify_waiters();
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    /// Fail if the build was cancelled or ran out of time.
    pub fn check(&self) -> SourceResult<()> {
        if self.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        if self.is_expired() {
            return Err(SourceError::DeadlineExceeded(self.timeout.unwrap_or_default()));
        }
        Ok(())
    }

    /// Run `fut`, racing it against cancellation and the deadline.
    pub async fn guard<T, F>(&self, fut: F) -> SourceResult<T>
    where
        F: Future<Output = SourceResult<T>>,
    {
        self.check()?;

        let cancelled = async {
            loop {
                let notified = self.notify.notified();
                if self.is_cancelled() {
                    break;
                }
                notified.await;
            }
        };
        let expired = async {
            match self.expires_at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = fut => result,
            _ = cancelled => Err(SourceError::Cancelled),
            _ = expired => Err(SourceError::DeadlineExceeded(self.timeout.unwrap_or_default())),
        }
    }
}

impl Default for BuildDeadline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_uncancelled() {
        let deadline = BuildDeadline::new();
        assert!(!deadline.is_cancelled());
        assert!(deadline.check().is_ok());
    }

    #[test]
    fn cloned_token_shares_state() {
        let deadline = BuildDeadline::new();
        let clone = deadline.clone();
        deadline.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(clone.check(), Err(SourceError::Cancelled)));
    }

    #[tokio::test]
    async fn guard_passes_through_result() {
        let deadline = BuildDeadline::with_timeout(Duration::from_secs(5));
        let value = deadline.guard(async { Ok::<_, SourceError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn guard_times_out_slow_query() {
        let deadline = BuildDeadline::with_timeout(Duration::from_millis(20));
        let result = deadline
            .guard(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, SourceError>(())
            })
            .await;
        assert!(matches!(result, Err(SourceError::DeadlineExceeded(_))));
    }

    #[tokio::test]
    async fn cancel_aborts_query_in_flight() {
        let deadline = BuildDeadline::new();
        let canceller = deadline.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let result = deadline
            .guard(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, SourceError>(())
            })
            .await;
        assert!(matches!(result, Err(SourceError::Cancelled)));
    }
}
