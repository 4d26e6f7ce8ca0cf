//! Sequential fan-out that tolerates partial failure.

use std::fmt::Display;
use std::future::Future;

/// Outcome of [`collect_tolerant`]: successes in input order plus a failure count.
#[derive(Debug)]
pub struct Partial<T> {
    pub ok: Vec<T>,
    pub failed: usize,
}

impl<T> Partial<T> {
    pub fn is_empty(&self) -> bool {
        self.ok.is_empty()
    }
}

/// Runs `task` for each item one at a time, keeping successes and logging failures.
///
/// `what` names the sub-task in the warning, e.g. `"tag lookup"`.
pub async fn collect_tolerant<I, T, E, F, Fut>(what: &str, items: I, mut task: F) -> Partial<T>
where
    I: IntoIterator,
    I::Item: Display,
    E: Display,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut ok = Vec::new();
    let mut failed = 0;
    for item in items {
        let label = item.to_string();
        match task(item).await {
            Ok(value) => ok.push(value),
            Err(e) => {
                failed += 1;
                tracing::warn!(item = %label, error = %e, "{} failed, skipping", what);
            }
        }
    }
    Partial { ok, failed }
}
