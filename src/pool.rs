use std::future::Future;

use futures::stream::{self, StreamExt};

use crate::error::{Result, YtsegError};

/// Bounded pool that runs one async task per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    /// Create a pool with `size` concurrent slots. Zero is a configuration error.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(YtsegError::Config("workers must be >= 1".to_string()));
        }
        Ok(Self { size })
    }

    /// A pool that runs tasks strictly one after another.
    pub fn sequential() -> Self {
        Self { size: 1 }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `task` for every item and return the results in item order,
    /// whatever order they completed in.
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, task: F) -> Vec<T>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = T>,
    {
        if self.size == 1 {
            let mut results = Vec::with_capacity(items.len());
            for item in items {
                results.push(task(item).await);
            }
            return results;
        }

        let total = items.len();
        let task = &task;
        let mut indexed: Vec<(usize, T)> = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| async move { (index, task(item).await) })
            .buffer_unordered(self.size)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        debug_assert_eq!(indexed.len(), total);
        indexed.into_iter().map(|(_, result)| result).collect()
    }
}
