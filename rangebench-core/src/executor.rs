use std::collections::HashMap;
use std::future::Future;

use tokio::task::{self, JoinSet};

use crate::{FetchTask, RequestOutcome};

/// Runs `tasks` with at most `concurrency` fetches in flight and returns one result per task.
///
/// Tasks are started in submission order; `on_complete` runs on the calling task as each fetch
/// finishes, so results come back in completion order. A fetch that panics still produces a
/// failed outcome. `concurrency` below 1 is treated as 1.
pub async fn execute<F, Fut, C, R>(
    tasks: Vec<FetchTask>,
    concurrency: usize,
    fetch: F,
    mut on_complete: C,
) -> Vec<R>
where
    F: Fn(FetchTask) -> Fut,
    Fut: Future<Output = RequestOutcome> + Send + 'static,
    C: FnMut(FetchTask, RequestOutcome) -> R,
{
    let limit = concurrency.max(1);
    let total = tasks.len();
    let mut queue = tasks.into_iter();
    let mut in_flight: JoinSet<RequestOutcome> = JoinSet::new();
    let mut pending: HashMap<task::Id, FetchTask> = HashMap::with_capacity(limit);
    let mut results = Vec::with_capacity(total);

    loop {
        while in_flight.len() < limit {
            let Some(task) = queue.next() else {
                break;
            };
            let handle = in_flight.spawn(fetch(task.clone()));
            pending.insert(handle.id(), task);
        }

        let Some(joined) = in_flight.join_next_with_id().await else {
            break;
        };
        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome),
            Err(err) => (
                err.id(),
                RequestOutcome::transport_failure(format!("fetch task failed: {err}"), 0.0),
            ),
        };
        if let Some(task) = pending.remove(&id) {
            results.push(on_complete(task, outcome));
        }
    }

    results
}
