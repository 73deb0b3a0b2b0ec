//! Shared network utilities for talking to the chain and the explorer.

use std::{fmt::Display, future::Future, time::Duration};

use anyhow::Context;

/// Default timeout for explorer HTTP requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Create an HTTP client configured for explorer API requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Repeatedly call `check_fn` until it reports completion.
///
/// Sleeps for `interval` between attempts. Errors for which `is_transient`
/// returns `true` are logged and the check is retried on the next tick; any
/// other error is returned immediately. There is no deadline; callers that
/// need one wrap the returned future in [`tokio::time::timeout`].
///
/// # Arguments
/// * `name` - What is being waited on (for log messages)
/// * `interval` - Delay between two checks
/// * `is_transient` - Whether an error is worth another attempt
/// * `check_fn` - Returns `Ok(true)` once the awaited condition holds
pub async fn wait_until<F, Fut, E>(
    name: &str,
    interval: Duration,
    is_transient: impl Fn(&E) -> bool,
    mut check_fn: F,
) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: Display,
{
    loop {
        match check_fn().await {
            Ok(true) => return Ok(()),
            Ok(false) => {
                tracing::trace!(target_name = %name, "Condition not met yet, polling again...");
            }
            Err(e) if is_transient(&e) => {
                tracing::warn!(error = %e, target_name = %name, "Check failed, retrying...");
            }
            Err(e) => return Err(e),
        }

        tokio::time::sleep(interval).await;
    }
}
