//! Retry on optimistic-concurrency conflicts.
//!
//! [`retry_on_conflict`] re-runs a whole read-modify-write attempt whenever
//! it fails with a version conflict, sleeping between attempts according to
//! a [`Backoff`]. Any other error ends the loop at once.
//!
//! ```ignore
//! let outcome = retry_on_conflict(&Backoff::default_retry(), &cancel, |attempt| async move {
//!     let mut root = store.get(&root_key).await?;
//!     root.spec.includes.push(include.clone());
//!     store.update(&root).await
//! })
//! .await;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use rootproxy_storage::StorageError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors that tell the retry loop whether another attempt may succeed.
pub trait ConflictAware {
    /// `true` when the write lost a race and a fresh attempt may succeed.
    fn is_conflict(&self) -> bool;
}

impl ConflictAware for StorageError {
    fn is_conflict(&self) -> bool {
        self.is_version_conflict()
    }
}

/// Exponential backoff between conflicting attempts.
///
/// `steps` bounds the number of attempts, so at most `steps - 1` sleeps
/// happen. The n-th sleep is `duration * factor^(n-1)`, capped at `cap`,
/// plus up to `jitter` of itself at random.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    pub steps: u32,
    pub duration: Duration,
    pub factor: f64,
    pub jitter: f64,
    pub cap: Option<Duration>,
}

impl Backoff {
    /// Five attempts, 10ms apart, 10% jitter.
    pub fn default_retry() -> Self {
        Self {
            steps: 5,
            duration: Duration::from_millis(10),
            factor: 1.0,
            jitter: 0.1,
            cap: None,
        }
    }

    /// Delay before the next attempt, without jitter, after `failures` failed attempts.
    pub fn base_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1) as i32;
        let scaled = self.duration.as_secs_f64() * self.factor.powi(exponent);
        let delay = Duration::try_from_secs_f64(scaled).unwrap_or(Duration::MAX);
        match self.cap {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    fn delay(&self, failures: u32) -> Duration {
        let base = self.base_delay(failures);
        if self.jitter <= 0.0 {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.jitter);
        base.mul_f64(1.0 + extra)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::default_retry()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The token fired before an attempt could finish.
    #[error("cancelled before the operation completed")]
    Cancelled,

    /// Every attempt hit a conflict; `last` is the final one.
    #[error("still conflicting after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// An attempt failed with an error that retrying cannot fix.
    #[error(transparent)]
    Aborted(E),
}

/// Runs `attempt` until it succeeds, fails with a non-conflict error, the
/// backoff runs out of steps, or `cancel` fires.
///
/// `attempt` receives the 1-based attempt number. Cancellation is checked
/// before every attempt and wakes a pending backoff sleep.
pub async fn retry_on_conflict<T, E, F, Fut>(
    backoff: &Backoff,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<T, RetryError<E>>
where
    E: ConflictAware + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let steps = backoff.steps.max(1);
    let mut n = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        n += 1;

        let err = match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_conflict() => err,
            Err(err) => return Err(RetryError::Aborted(err)),
        };

        if n >= steps {
            return Err(RetryError::Exhausted {
                attempts: n,
                last: err,
            });
        }

        let delay = backoff.delay(n);
        debug!(
            attempt = n,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Conflict, retrying"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootproxy_core::ObjectKey;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn conflict() -> StorageError {
        StorageError::version_conflict(&ObjectKey::new("test", "root"), "1", "2")
    }

    fn fast() -> Backoff {
        Backoff {
            duration: Duration::from_millis(1),
            jitter: 0.0,
            ..Backoff::default_retry()
        }
    }

    #[test]
    fn test_default_backoff() {
        let backoff = Backoff::default();
        assert_eq!(backoff.steps, 5);
        assert_eq!(backoff.base_delay(1), Duration::from_millis(10));
        assert_eq!(backoff.base_delay(4), Duration::from_millis(10));
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let backoff = Backoff {
            steps: 10,
            duration: Duration::from_millis(10),
            factor: 2.0,
            jitter: 0.0,
            cap: Some(Duration::from_millis(50)),
        };
        assert_eq!(backoff.base_delay(1), Duration::from_millis(10));
        assert_eq!(backoff.base_delay(2), Duration::from_millis(20));
        assert_eq!(backoff.base_delay(3), Duration::from_millis(40));
        assert_eq!(backoff.base_delay(4), Duration::from_millis(50));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let backoff = Backoff::default_retry();
        for _ in 0..100 {
            let delay = backoff.delay(1);
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_micros(11_001));
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_conflicts() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = retry_on_conflict(&fast(), &CancellationToken::new(), |attempt| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 3 { Err(conflict()) } else { Ok(attempt) }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_after_steps() {
        let result: Result<(), _> =
            retry_on_conflict(&fast(), &CancellationToken::new(), |_| async {
                Err(conflict())
            })
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 5);
                assert!(last.is_version_conflict());
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_conflict_aborts_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            retry_on_conflict(&fast(), &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StorageError::connection_error("reset")) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Aborted(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);

        let result = retry_on_conflict(&fast(), &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<(), StorageError>(()) }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_stops_retrying() {
        let cancel = CancellationToken::new();
        let backoff = Backoff {
            duration: Duration::from_secs(60),
            ..fast()
        };
        let calls = AtomicU32::new(0);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: Result<(), _> = retry_on_conflict(&backoff, &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(conflict()) }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
