// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! In-memory result store
//!
//! Backs single-process runs and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{ResultStore, DEFAULT_POLL_INTERVAL};
use crate::errors::{DagrunError, DagrunResult};

/// In-memory, write-once result store
pub struct MemoryResultStore {
    entries: RwLock<HashMap<(String, u32), Vec<u8>>>,
    poll_interval: Duration,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            poll_interval,
        }
    }
}

impl Default for MemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn put(&self, task: &str, partition: u32, payload: Vec<u8>) -> DagrunResult<()> {
        let mut entries = self.entries.write().await;
        let key = (task.to_string(), partition);

        if entries.contains_key(&key) {
            return Err(DagrunError::ResultAlreadyWritten {
                task: task.to_string(),
                partition,
            });
        }

        entries.insert(key, payload);
        Ok(())
    }

    async fn get(&self, task: &str, partition: u32) -> DagrunResult<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(task.to_string(), partition)).cloned())
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
