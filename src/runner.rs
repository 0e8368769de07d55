//! Bounded concurrency runner
//!
//! Runs one async task per item with a fixed number of workers. Workers claim
//! items from a shared cursor and write into the item's own result slot, so
//! results come back in input order regardless of completion order. A failing
//! or panicking task only affects its own slot.

use anyhow::anyhow;
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Run `task` over `items` with at most `concurrency` in flight.
///
/// Returns exactly one result per item, in input order. A concurrency of 0
/// is treated as 1.
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, concurrency: usize, task: F) -> Vec<anyhow::Result<R>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = anyhow::Result<R>>,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let worker_count = concurrency.max(1).min(total);
    let slots: Vec<Mutex<Option<T>>> = items.into_iter().map(|item| Mutex::new(Some(item))).collect();
    let cursor = AtomicUsize::new(0);

    debug!("Running {} items on {} workers", total, worker_count);

    let slots = &slots;
    let cursor = &cursor;
    let task = &task;

    let workers = (0..worker_count).map(|worker_id| async move {
        let mut finished = Vec::new();
        loop {
            let index = cursor.fetch_add(1, Ordering::SeqCst);
            if index >= total {
                break;
            }

            let item = slots[index].lock().ok().and_then(|mut slot| slot.take());
            let result = match item {
                Some(item) => AssertUnwindSafe(async move { task(item).await })
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let message = panic_message(panic.as_ref());
                        warn!("Worker {} task for item {} panicked: {}", worker_id, index, message);
                        Err(anyhow!("task panicked: {}", message))
                    }),
                None => Err(anyhow!("item {} could not be claimed", index)),
            };
            finished.push((index, result));
        }
        finished
    });

    let mut results: Vec<Option<anyhow::Result<R>>> = (0..total).map(|_| None).collect();
    for (index, result) in join_all(workers).await.into_iter().flatten() {
        results[index] = Some(result);
    }

    results
        .into_iter()
        .enumerate()
        .map(|(index, result)| result.unwrap_or_else(|| Err(anyhow!("item {} produced no result", index))))
        .collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
