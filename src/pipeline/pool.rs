//! Bounded worker pool with submit/join semantics.
//!
//! One [`WorkerPool`] lives for the whole run and owns `max_workers`
//! permits. Each phase of a batch opens a [`PoolBatch`], submits its tasks
//! and then waits on [`PoolBatch::join`], the barrier. Every task yields its
//! own [`TaskOutcome`]; an error or a panic in one task never reaches its
//! siblings.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{AppError, Result};

/// Result of one submitted task.
#[derive(Debug)]
pub struct TaskOutcome<T> {
    /// Label given at submission (usually a URL)
    pub label: String,
    pub result: Result<T>,
}

/// Reusable bounded-parallelism executor.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool running at most `size` tasks at once (minimum 1).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Open a batch of tasks sharing this pool's permits.
    pub fn batch<T: Send + 'static>(&self) -> PoolBatch<T> {
        PoolBatch {
            permits: Arc::clone(&self.permits),
            tasks: JoinSet::new(),
            labels: Vec::new(),
        }
    }
}

/// Tasks submitted to a pool, awaiting [`join`](Self::join).
pub struct PoolBatch<T> {
    permits: Arc<Semaphore>,
    tasks: JoinSet<(usize, Result<T>)>,
    labels: Vec<String>,
}

impl<T: Send + 'static> PoolBatch<T> {
    /// Spawn a task; it starts running once a permit is free.
    pub fn submit<F>(&mut self, label: impl Into<String>, task: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let index = self.labels.len();
        self.labels.push(label.into());
        let permits = Arc::clone(&self.permits);

        self.tasks.spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (index, Err(AppError::pool("worker pool closed"))),
            };

            let result = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(AppError::pool(format!(
                    "task panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            };
            (index, result)
        });
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Wait for every submitted task; outcomes come back in submission order.
    pub async fn join(mut self) -> Vec<TaskOutcome<T>> {
        let mut results: Vec<Option<Result<T>>> = self.labels.iter().map(|_| None).collect();

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => log::error!("Worker task did not complete: {e}"),
            }
        }

        self.labels
            .into_iter()
            .zip(results)
            .map(|(label, result)| TaskOutcome {
                label,
                result: result.unwrap_or_else(|| Err(AppError::pool("task aborted"))),
            })
            .collect()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
