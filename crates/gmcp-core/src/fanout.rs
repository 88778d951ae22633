//! Concurrent fan-out where one failing branch never sinks its siblings.
//!
//! Handlers that query several independent remote resources (N message ids,
//! M calendars) run one future per key and join on all of them. Each slot in
//! the result carries either the value or an inline error placeholder.

use std::fmt;
use std::future::Future;

use futures_util::future::join_all;
use tracing::warn;

/// Outcome of one fan-out branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled<K, T> {
    /// The key the branch was started for.
    pub key: K,
    /// The branch value, or the rendered error.
    pub outcome: Result<T, String>,
}

impl<K, T> Settled<K, T> {
    /// Returns true if the branch succeeded.
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Returns the branch value, if any.
    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    /// Text to put in the failed slot of an aggregate response.
    pub fn placeholder(&self) -> Option<String> {
        self.outcome
            .as_ref()
            .err()
            .map(|err| format!("error: {err}"))
    }
}

/// Runs `f` for every key concurrently and returns one slot per key, in
/// input order.
pub async fn settle_all<K, T, E, F, Fut>(
    keys: impl IntoIterator<Item = K>,
    f: F,
) -> Vec<Settled<K, T>>
where
    K: Clone + fmt::Debug,
    E: fmt::Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let keys: Vec<K> = keys.into_iter().collect();
    let results = join_all(keys.iter().cloned().map(&f)).await;

    keys.into_iter()
        .zip(results)
        .map(|(key, result)| {
            let outcome = result.map_err(|err| {
                warn!(?key, "fan-out branch failed: {err}");
                err.to_string()
            });
            Settled { key, outcome }
        })
        .collect()
}
