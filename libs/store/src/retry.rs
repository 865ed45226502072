use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::error::Result;

/// Standard backoff for transient KV/bus backend errors: controllers and the API
/// server wrap store calls in this rather than rolling ad-hoc retry loops
/// (SPEC_FULL.md §0, ambient stack).
pub fn backend_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(4)
}

pub async fn with_retry<T, F, Fut>(op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    op.retry(backend_backoff()).await
}
