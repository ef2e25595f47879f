// src/queue/guard.rs
// =============================================================================
// Wraps one provider call with a cancellation check and an optional timeout.
//
// Task bodies call this around every suspension point (listing a directory,
// fetching a page). The queue itself never cancels or times anything out.
// =============================================================================

use crate::error::ProviderError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs `call` unless `token` is (or becomes) cancelled, giving up after `timeout`
pub async fn guarded<F, T>(
    token: &CancellationToken,
    timeout: Option<Duration>,
    call: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    if token.is_cancelled() {
        return Err(ProviderError::Cancelled);
    }

    let bounded = async {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(ProviderError::TimedOut(limit))),
            None => call.await,
        }
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ProviderError::Cancelled),
        result = bounded => result,
    }
}
