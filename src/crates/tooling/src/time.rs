//! Deadline handling for async operations.
//!
//! Backend invocations carry a hard deadline; on expiry the call is
//! abandoned and the caller decides what to do next. There is no retry at
//! this layer.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Error of a deadline-bounded operation.
#[derive(Debug)]
pub enum DeadlineError<E> {
    /// The deadline elapsed before the operation finished.
    Elapsed(Duration),
    /// The operation finished in time but failed.
    Inner(E),
}

impl<E: std::fmt::Display> std::fmt::Display for DeadlineError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeadlineError::Elapsed(limit) => {
                write!(f, "deadline of {:?} elapsed", limit)
            }
            DeadlineError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for DeadlineError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeadlineError::Inner(e) => Some(e),
            DeadlineError::Elapsed(_) => None,
        }
    }
}

/// Run an operation under a hard deadline.
///
/// Returns the operation's value, its error wrapped in
/// [`DeadlineError::Inner`], or [`DeadlineError::Elapsed`] when the limit
/// passes first. The in-flight future is dropped on expiry; there is no
/// cooperative cancellation beyond that.
pub async fn with_deadline<F, T, E>(
    limit: Duration,
    operation: F,
) -> std::result::Result<T, DeadlineError<E>>
where
    F: Future<Output = std::result::Result<T, E>>,
{
    match timeout(limit, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(DeadlineError::Inner(error)),
        Err(_) => Err(DeadlineError::Elapsed(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_in_time() {
        let result = with_deadline(Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, String>("done")
        })
        .await;

        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_deadline_elapses() {
        let result = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, String>("late")
        })
        .await;

        match result.unwrap_err() {
            DeadlineError::Elapsed(limit) => assert_eq!(limit, Duration::from_millis(10)),
            DeadlineError::Inner(_) => panic!("expected elapsed deadline"),
        }
    }

    #[tokio::test]
    async fn test_inner_failure_passes_through() {
        let result = with_deadline(Duration::from_millis(100), async {
            Err::<String, _>("backend unreachable")
        })
        .await;

        match result.unwrap_err() {
            DeadlineError::Inner(e) => assert_eq!(e, "backend unreachable"),
            DeadlineError::Elapsed(_) => panic!("expected inner failure"),
        }
    }
}
