//! Bounded waiting for a remote condition.
//!
//! [`poll_until`] fetches a resource on a fixed interval from a background
//! task until a predicate holds, the fetch fails, or the deadline passes.
//! Exactly one of those outcomes is returned and the background task is
//! stopped before the call returns.

use crate::error::format_duration;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
pub enum PollError<E> {
    /// The fetch itself failed; polling stopped at the first error.
    Fetch(E),
    /// The condition did not hold within the given duration.
    Timeout(Duration),
}

impl<E: fmt::Display> fmt::Display for PollError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollError::Fetch(e) => write!(f, "{}", e),
            PollError::Timeout(after) => {
                write!(f, "condition not met after {}", format_duration(after))
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for PollError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PollError::Fetch(e) => Some(e),
            PollError::Timeout(_) => None,
        }
    }
}

/// Calls `fetch` every `interval` (first call after one interval) until
/// `predicate` accepts the fetched resource, which is then returned.
///
/// The first fetch error ends polling. If neither happens within `timeout`,
/// [`PollError::Timeout`] is returned. A fetch in flight when the deadline
/// fires is cancelled, and no fetch is started after this function returns.
pub async fn poll_until<T, E, F, Fut, P>(
    fetch: F,
    predicate: P,
    interval: Duration,
    timeout: Duration,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    P: Fn(&T) -> bool + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let cancel = CancellationToken::new();
    // also stops the loop if the caller drops this future mid-wait
    let _guard = cancel.clone().drop_guard();

    let mut task = tokio::spawn(poll_loop(fetch, predicate, interval, cancel.clone()));

    let joined = tokio::select! {
        joined = &mut task => joined,
        _ = time::sleep(timeout) => {
            debug!("Deadline of {:?} reached, stopping poll task", timeout);
            cancel.cancel();
            // a result the loop produced in the meantime is discarded
            let _ = task.await;
            return Err(PollError::Timeout(timeout));
        }
    };

    match joined {
        Ok(Some(result)) => result.map_err(PollError::Fetch),
        Ok(None) => Err(PollError::Timeout(timeout)),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(PollError::Timeout(timeout)),
    }
}

/// Returns `None` once cancelled.
async fn poll_loop<T, E, F, Fut, P>(
    mut fetch: F,
    predicate: P,
    interval: Duration,
    cancel: CancellationToken,
) -> Option<Result<T, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            _ = ticker.tick() => {}
        }

        attempt += 1;
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            fetched = fetch() => fetched,
        };

        match fetched {
            Ok(resource) if predicate(&resource) => {
                debug!("Condition met after {} attempts", attempt);
                return Some(Ok(resource));
            }
            Ok(_) => debug!("Condition not met yet, attempt {}", attempt),
            Err(e) => return Some(Err(e)),
        }
    }
}
