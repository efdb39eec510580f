// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Filesystem-based result store
//!
//! One file per (task, partition) key under a store directory, so results
//! survive the run and are readable by out-of-process consumers.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{ResultStore, DEFAULT_POLL_INTERVAL};
use crate::errors::{DagrunError, DagrunResult};

/// Filesystem-backed, write-once result store
pub struct FilesystemResultStore {
    root: PathBuf,
    poll_interval: Duration,
}

impl FilesystemResultStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: PathBuf) -> Result<Self, DagrunError> {
        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| DagrunError::StoreError {
                message: format!("failed to create store directory: {e}"),
            })?;
        }

        Ok(Self {
            root,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn entry_path(&self, task: &str, partition: u32) -> PathBuf {
        self.root.join(task).join(partition.to_string())
    }
}

#[async_trait]
impl ResultStore for FilesystemResultStore {
    async fn put(&self, task: &str, partition: u32, payload: Vec<u8>) -> DagrunResult<()> {
        let path = self.entry_path(task, partition);

        if path.exists() {
            return Err(DagrunError::ResultAlreadyWritten {
                task: task.to_string(),
                partition,
            });
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DagrunError::StoreError {
                    message: format!("failed to create entry directory: {e}"),
                })?;
        }

        // Write to a temp name first so readers never observe a partial
        // payload as a written key.
        let staged = path.with_extension("partial");
        tokio::fs::write(&staged, payload)
            .await
            .map_err(|e| DagrunError::StoreError {
                message: format!("failed to write result entry: {e}"),
            })?;
        tokio::fs::rename(&staged, &path)
            .await
            .map_err(|e| DagrunError::StoreError {
                message: format!("failed to commit result entry: {e}"),
            })?;

        Ok(())
    }

    async fn get(&self, task: &str, partition: u32) -> DagrunResult<Option<Vec<u8>>> {
        let path = self.entry_path(task, partition);

        match tokio::fs::read(&path).await {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DagrunError::StoreError {
                message: format!("failed to read result entry: {e}"),
            }),
        }
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl FilesystemResultStore {
    /// List written keys, for inspection after a run.
    pub fn keys(&self) -> Result<Vec<(String, u32)>, DagrunError> {
        let mut keys = Vec::new();

        if !self.root.exists() {
            return Ok(keys);
        }

        for task_dir in std::fs::read_dir(&self.root).map_err(|e| DagrunError::StoreError {
            message: format!("failed to read store directory: {e}"),
        })? {
            let task_dir = task_dir
                .map_err(|e| DagrunError::StoreError {
                    message: format!("failed to read store entry: {e}"),
                })?
                .path();

            if !task_dir.is_dir() {
                continue;
            }

            let task = match task_dir.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            for entry in Self::partition_files(&task_dir)? {
                keys.push((task.clone(), entry));
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn partition_files(task_dir: &Path) -> Result<Vec<u32>, DagrunError> {
        let mut partitions = Vec::new();

        for entry in std::fs::read_dir(task_dir).map_err(|e| DagrunError::StoreError {
            message: format!("failed to read task directory: {e}"),
        })? {
            let path = entry
                .map_err(|e| DagrunError::StoreError {
                    message: format!("failed to read task entry: {e}"),
                })?
                .path();

            if let Some(partition) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u32>().ok())
            {
                partitions.push(partition);
            }
        }

        Ok(partitions)
    }
}
