// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Result store
//!
//! Durable mapping from (task id, partition) to an opaque result payload.
//! Keys are write-once; consumers poll with [`ResultStore::await_result`]
//! rather than subscribing, which decouples producers and consumers across
//! process boundaries at the cost of staleness bounded by one poll interval.

mod filesystem;
mod memory;

pub use filesystem::FilesystemResultStore;
pub use memory::MemoryResultStore;

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::{DagrunError, DagrunResult};

/// Default poll period for `await_result`
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Trait for result store backends
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Publish a result. Keys are write-once; a second put for the same
    /// (task, partition) fails with `ResultAlreadyWritten`.
    async fn put(&self, task: &str, partition: u32, payload: Vec<u8>) -> DagrunResult<()>;

    /// Fetch a result if it has been written.
    async fn get(&self, task: &str, partition: u32) -> DagrunResult<Option<Vec<u8>>>;

    /// Poll period used by `await_result`.
    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }

    /// Poll for a result until `timeout`. For a key that is never written
    /// this fails no earlier than `timeout` and no later than `timeout`
    /// plus one poll interval.
    async fn await_result(
        &self,
        task: &str,
        partition: u32,
        timeout: Duration,
    ) -> DagrunResult<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(payload) = self.get(task, partition).await? {
                return Ok(payload);
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(DagrunError::Timeout {
                    task: task.to_string(),
                    partition,
                    waited_ms: timeout.as_millis() as u64,
                });
            }

            let nap = self.poll_interval().min(deadline - now);
            tokio::time::sleep(nap).await;
        }
    }
}
