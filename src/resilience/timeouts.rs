//! Timeout enforcement.
//!
//! Every call to the registry, the config store or a collaborator has a
//! deadline; elapsing maps to the caller's own error type.

use std::future::Future;
use std::time::Duration;

/// Run `fut` with a deadline, mapping expiry through `on_elapsed`.
pub async fn bounded<T, E, F>(
    limit: Duration,
    fut: F,
    on_elapsed: impl FnOnce(Duration) -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_elapsed(limit)),
    }
}
