//! Bounded worker pool with per-task retries.
//!
//! Every submitted job runs to completion (success or final failure) before
//! [`TileExecutor::run`] returns. A failing job never cancels its siblings.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::config::ExecutionConfig;
use crate::error::Result;

/// How often (in completed tasks) progress is logged.
const PROGRESS_INTERVAL: usize = 100;

/// Final result of one submitted job.
#[derive(Debug)]
pub struct TaskOutcome<K, T> {
    pub key: K,
    /// Attempts made, including the first.
    pub attempts: u32,
    pub result: Result<T>,
}

/// Runs jobs with bounded concurrency and retries retryable failures.
#[derive(Debug, Clone)]
pub struct TileExecutor {
    concurrency: usize,
    max_retries: u32,
    retry_delay: Duration,
}

impl TileExecutor {
    pub fn new(concurrency: usize, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            max_retries,
            retry_delay,
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(
            config.concurrency,
            config.max_retries,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `job` for every key and wait for all of them.
    ///
    /// Outcomes are returned in completion order.
    pub async fn run<K, T, F, Fut>(&self, keys: Vec<K>, job: F) -> Vec<TaskOutcome<K, T>>
    where
        K: Clone + fmt::Display,
        F: Fn(K) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let total = keys.len();
        let job = &job;

        let mut pending = stream::iter(keys)
            .map(|key| async move { self.run_with_retries(key, job).await })
            .buffer_unordered(self.concurrency);

        let mut outcomes = Vec::with_capacity(total);
        let mut failed = 0;
        while let Some(outcome) = pending.next().await {
            if outcome.result.is_err() {
                failed += 1;
            }
            outcomes.push(outcome);

            let completed = outcomes.len();
            if completed % PROGRESS_INTERVAL == 0 && completed < total {
                info!(
                    progress = format!("{}/{}", completed, total),
                    failed = failed,
                    "Tile progress"
                );
            }
        }
        outcomes
    }

    async fn run_with_retries<K, T, F, Fut>(&self, key: K, job: &F) -> TaskOutcome<K, T>
    where
        K: Clone + fmt::Display,
        F: Fn(K) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match job(key.clone()).await {
                Ok(value) => {
                    return TaskOutcome {
                        key,
                        attempts,
                        result: Ok(value),
                    }
                }
                Err(e) if e.is_retryable() && attempts <= self.max_retries => {
                    warn!(
                        task = %key,
                        error = %e,
                        retry = attempts,
                        max_retries = self.max_retries,
                        delay_ms = self.retry_delay.as_millis() as u64,
                        "Task failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    return TaskOutcome {
                        key,
                        attempts,
                        result: Err(e),
                    }
                }
            }
        }
    }
}
