//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap pool borrows, connects and remote calls with a deadline
//! - Map an elapsed deadline to `CacheError::Timeout`
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - Timeout errors are distinct from connection errors

use std::future::Future;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Run `future` with a deadline of `after`.
pub async fn with_timeout<T, F>(operation: &'static str, after: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::Timeout { operation, after }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_elapsed_maps_to_timeout() {
        let result: Result<()> = with_timeout("remote call", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            result,
            Err(CacheError::Timeout { operation: "remote call", .. })
        ));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<()> = with_timeout("remote call", Duration::from_secs(1), async {
            Err(CacheError::connection("refused"))
        })
        .await;
        assert!(matches!(result, Err(CacheError::Connection { .. })));
    }
}
