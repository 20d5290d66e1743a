//! Bounded worker pool for per-image stages.
//!
//! Both pipeline pool stages (normalize, verify) share the same shape: fan N
//! independent work items out over at most W concurrent workers, and collect
//! a tagged outcome per item keyed by its sequence index. Completion order is
//! unconstrained; attribution is by index, never by position in time.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Outcome of one work item, tagged with its sequence index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub index: usize,
    /// Ok on success; Err carries the per-item error detail.
    pub result: Result<(), String>,
}

/// Run one pool stage over the given (index, path) items.
///
/// At most `pool_size` items are in flight at once. A failing item resolves
/// to an Err outcome for that index only; it never affects its siblings. A
/// panicking worker is converted into an Err outcome the same way. Outcomes
/// are returned in ascending index order.
pub async fn run_stage<F, Fut>(
    items: Vec<(usize, PathBuf)>,
    pool_size: u32,
    task: F,
) -> Vec<StageOutcome>
where
    F: Fn(usize, PathBuf) -> Fut,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(pool_size.max(1) as usize));
    let mut handles = Vec::with_capacity(items.len());

    for (index, path) in items {
        let semaphore = semaphore.clone();
        let work = task(index, path);
        let handle = tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore should not be closed");
            work.await
        });
        handles.push((index, handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (index, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(format!("worker task panicked: {}", join_err)),
        };
        outcomes.push(StageOutcome { index, result });
    }
    outcomes
}
