//! Poll-until-predicate primitive for eventually-consistent cloud APIs.
//!
//! Every asynchronous cloud operation (power actions, deletions, volume
//! attachment) completes only after polling. [`wait_until`] is the single
//! place that loop is written.

use crate::error::{CloudError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default delay between two polls
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Default time budget for one wait
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Polling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Delay between polls
    pub interval: Duration,
    /// Maximum total time to wait
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl WaitConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Result of one poll: the resource's state, or proof that it no longer exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed<S> {
    Present(S),
    Gone,
}

impl<S> Observed<S> {
    pub fn is_gone(&self) -> bool {
        matches!(self, Observed::Gone)
    }

    pub fn present(&self) -> Option<&S> {
        match self {
            Observed::Present(s) => Some(s),
            Observed::Gone => None,
        }
    }

    pub fn into_present(self) -> Option<S> {
        match self {
            Observed::Present(s) => Some(s),
            Observed::Gone => None,
        }
    }
}

/// Turn a describe call into an observation; `NotFound` means gone.
pub fn observe<T>(result: Result<T>) -> Result<Observed<T>> {
    match result {
        Ok(value) => Ok(Observed::Present(value)),
        Err(e) if e.is_not_found() => Ok(Observed::Gone),
        Err(e) => Err(e),
    }
}

/// Predicate satisfied once the resource no longer exists
pub fn gone<S>(observed: &Observed<S>) -> bool {
    observed.is_gone()
}

/// Poll `describe` until `predicate` holds.
///
/// The first poll happens immediately, then one every `config.interval`.
/// Transient errors are retried and reported in the `Timeout` if the budget
/// runs out; any other error is returned at once. When `cancel` fires, the
/// wait stops with `Cancelled`.
pub async fn wait_until<S, F, Fut, P>(
    what: &str,
    config: &WaitConfig,
    cancel: Option<&CancellationToken>,
    mut describe: F,
    predicate: P,
) -> Result<Observed<S>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observed<S>>>,
    P: Fn(&Observed<S>) -> bool,
{
    let start = Instant::now();
    let deadline = start + config.timeout;
    let mut polls = 0u32;
    let mut last_error: Option<String> = None;

    loop {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(CloudError::Cancelled(format!("waiting for {}", what)));
        }

        polls += 1;
        match describe().await {
            Ok(observed) if predicate(&observed) => {
                debug!(what, polls, "wait satisfied");
                return Ok(observed);
            }
            Ok(_) => {
                debug!(what, polls, "not there yet");
            }
            Err(e) if e.is_transient() => {
                debug!(what, polls, error = %e, "transient error while waiting");
                last_error = Some(e.to_string());
            }
            Err(e) => return Err(e),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(CloudError::Timeout {
                what: what.to_string(),
                after: config.timeout,
                last_error,
            });
        }

        let pause = config.interval.min(deadline - now);
        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = async {
                match cancel {
                    Some(token) => token.cancelled().await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                return Err(CloudError::Cancelled(format!("waiting for {}", what)));
            }
        }
    }
}
