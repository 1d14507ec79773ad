//! Bounded polling
//!
//! Every wait in the crate (element resolution, completion signals,
//! navigation) goes through [`await_condition`].

use crate::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Poll `predicate` until it yields `true` or `timeout` elapses.
///
/// The predicate is evaluated once immediately, then once per `interval`.
/// The final sleep is clamped to the remaining budget, so a `false` result
/// is returned no later than `timeout + interval` after the call. Errors
/// from the predicate abort the wait and propagate.
pub async fn await_condition<F, Fut>(
    mut predicate: F,
    timeout: Duration,
    interval: Duration,
) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();

    loop {
        if predicate().await? {
            return Ok(true);
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Ok(false);
        }

        let remaining = timeout - elapsed;
        tokio::time::sleep(interval.min(remaining)).await;
    }
}
