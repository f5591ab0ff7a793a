//! Bounded retry for serializable-transaction conflicts.

use std::future::Future;

use tixgo_core::RepoError;
use tixgo_postgres::is_retryable;

/// How many times a serializable transaction body is attempted in total.
pub(crate) const SERIALIZATION_ATTEMPTS: u32 = 3;

/// Run `op` until it succeeds, fails non-transiently, or the attempt budget
/// is spent. Only serialization/deadlock conflicts are retried; the final
/// conflict is returned to the caller unchanged.
pub(crate) async fn with_serialization_retry<T, F, Fut>(
    attempts: u32,
    mut op: F,
) -> Result<T, RepoError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RepoError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if is_retryable(&err) && attempt < attempts => {
                tracing::debug!(attempt, "serializable transaction conflicted, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn transient_conflicts_are_retried() {
        let calls = AtomicU32::new(0);
        let result = with_serialization_retry(3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RepoError::Serialization)
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn the_attempt_budget_is_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RepoError> = with_serialization_retry(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RepoError::Serialization) }
        })
        .await;

        assert!(matches!(result, Err(RepoError::Serialization)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_errors_return_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RepoError> = with_serialization_retry(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RepoError::Conflict) }
        })
        .await;

        assert!(matches!(result, Err(RepoError::Conflict)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
