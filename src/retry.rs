use anyhow::{Error, Result};
use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder, Retryable};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub fn new_backoff() -> ExponentialBuilder {
    ExponentialBuilder::new()
        .with_jitter()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(2))
}

pub fn new_backoff_limited() -> ExponentialBuilder {
    new_backoff().with_max_times(3)
}

/// `attempts` retries after the first try, `delay` apart.
pub fn new_backoff_fixed(attempts: usize, delay: Duration) -> ConstantBuilder {
    ConstantBuilder::default()
        .with_delay(delay)
        .with_max_times(attempts)
}

pub fn notify<E: std::fmt::Debug>(action: &str) -> impl FnMut(&E, Duration) {
    move |e, d| {
        warn!("Retrying {} due to {:?} after {:?}", action, e, d);
    }
}

pub fn retryable<E>(cancel_token: CancellationToken) -> impl FnMut(&E) -> bool {
    move |_| !cancel_token.is_cancelled()
}

pub async fn retry<T, E, F, Fut, B>(
    operation: F,
    action: &str,
    backoff: B,
    cancel_token: CancellationToken,
) -> Result<T>
where
    E: std::fmt::Debug + Into<Error>,
    Fut: Future<Output = Result<T, E>>,
    F: FnMut() -> Fut,
    B: BackoffBuilder,
{
    operation
        .retry(backoff)
        .notify(notify(action))
        .when(retryable(cancel_token))
        .await
        .map_err(Into::into)
}
