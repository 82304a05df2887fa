//! Persistence traits for allocation progress and scan results.
//!
//! Implementations: [`MemoryStore`] here, `SqliteStorage` in
//! `chainsweep-storage`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use num_bigint::BigUint;

use crate::error::SweepError;
use crate::types::{BalanceObservation, Task, TaskStatus};

/// Task log plus the append-only allocation progress log.
#[async_trait]
pub trait AllocationStore: Send + Sync {
    /// Highest rank recorded in the progress log, or `None` if nothing was issued.
    async fn last_index(&self) -> Result<Option<BigUint>, SweepError>;

    /// Persist `task` as `pending`, then append its rank to the progress log.
    ///
    /// The task row must be durable before the progress row. Backends with
    /// transactions write both atomically. If this returns an error the
    /// progress log must not have advanced.
    async fn commit_task(&self, task: &Task) -> Result<(), SweepError>;

    /// Look up an issued task and its current status.
    async fn task(&self, task_id: &str) -> Result<Option<(Task, TaskStatus)>, SweepError>;

    /// Move a task to `status`. Returns `false` if no such task exists.
    ///
    /// Called by the worker that consumed the task, never by the allocator.
    async fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<bool, SweepError>;
}

/// Accumulated balances plus the append-only block checkpoint log.
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Highest block recorded as fully committed.
    async fn last_processed_block(&self) -> Result<Option<u64>, SweepError>;

    /// Add every observation to its address's stored balance (inserting if
    /// absent), then record `end_block` as processed. All or nothing.
    async fn commit_batch(
        &self,
        observations: &[BalanceObservation],
        end_block: u64,
    ) -> Result<(), SweepError>;

    /// Stored balance for `address`.
    async fn balance(&self, address: &str) -> Result<Option<BigUint>, SweepError>;

    /// Up to `limit` stored balances, largest first.
    async fn balances(&self, limit: usize) -> Result<Vec<BalanceObservation>, SweepError>;
}

// ─── Shared handles ───────────────────────────────────────────────────────────

#[async_trait]
impl<T: AllocationStore + ?Sized> AllocationStore for Arc<T> {
    async fn last_index(&self) -> Result<Option<BigUint>, SweepError> {
        (**self).last_index().await
    }

    async fn commit_task(&self, task: &Task) -> Result<(), SweepError> {
        (**self).commit_task(task).await
    }

    async fn task(&self, task_id: &str) -> Result<Option<(Task, TaskStatus)>, SweepError> {
        (**self).task(task_id).await
    }

    async fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<bool, SweepError> {
        (**self).set_task_status(task_id, status).await
    }
}

#[async_trait]
impl<T: ScanStore + ?Sized> ScanStore for Arc<T> {
    async fn last_processed_block(&self) -> Result<Option<u64>, SweepError> {
        (**self).last_processed_block().await
    }

    async fn commit_batch(
        &self,
        observations: &[BalanceObservation],
        end_block: u64,
    ) -> Result<(), SweepError> {
        (**self).commit_batch(observations, end_block).await
    }

    async fn balance(&self, address: &str) -> Result<Option<BigUint>, SweepError> {
        (**self).balance(address).await
    }

    async fn balances(&self, limit: usize) -> Result<Vec<BalanceObservation>, SweepError> {
        (**self).balances(limit).await
    }
}

// ─── In-memory store ──────────────────────────────────────────────────────────

/// In-memory store for tests and ephemeral runs.
///
/// The `fail_next_*` hooks simulate a crash at the worst point of a commit.
#[derive(Default)]
pub struct MemoryStore {
    tasks: Mutex<Vec<(Task, TaskStatus)>>,
    progress: Mutex<Vec<BigUint>>,
    balances: Mutex<HashMap<String, BigUint>>,
    checkpoints: Mutex<Vec<u64>>,
    fail_progress: AtomicBool,
    fail_batch: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, SweepError> {
    m.lock()
        .map_err(|_| SweepError::Storage("memory store lock poisoned".into()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `commit_task` writes its task row, then fails before the
    /// progress row.
    pub fn fail_next_progress_write(&self) {
        self.fail_progress.store(true, Ordering::SeqCst);
    }

    /// The next `commit_batch` fails without writing anything.
    pub fn fail_next_batch_commit(&self) {
        self.fail_batch.store(true, Ordering::SeqCst);
    }

    /// Number of task rows (including re-issued duplicates).
    pub fn task_rows(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or(0)
    }

    /// Number of progress-log rows.
    pub fn progress_rows(&self) -> usize {
        self.progress.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Number of checkpoint-log rows.
    pub fn checkpoint_rows(&self) -> usize {
        self.checkpoints.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl AllocationStore for MemoryStore {
    async fn last_index(&self) -> Result<Option<BigUint>, SweepError> {
        Ok(lock(&self.progress)?.iter().max().cloned())
    }

    async fn commit_task(&self, task: &Task) -> Result<(), SweepError> {
        let rank = task
            .rank()
            .ok_or_else(|| SweepError::Storage(format!("non-numeric task id '{}'", task.task_id)))?;
        lock(&self.tasks)?.push((task.clone(), TaskStatus::Pending));
        if self.fail_progress.swap(false, Ordering::SeqCst) {
            return Err(SweepError::Storage("simulated crash before progress write".into()));
        }
        lock(&self.progress)?.push(rank);
        Ok(())
    }

    async fn task(&self, task_id: &str) -> Result<Option<(Task, TaskStatus)>, SweepError> {
        Ok(lock(&self.tasks)?
            .iter()
            .rev()
            .find(|(t, _)| t.task_id == task_id)
            .cloned())
    }

    async fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<bool, SweepError> {
        let mut tasks = lock(&self.tasks)?;
        let mut found = false;
        for (t, s) in tasks.iter_mut().filter(|(t, _)| t.task_id == task_id) {
            *s = status;
            found = true;
            tracing::debug!(task_id = %t.task_id, %status, "task status updated");
        }
        Ok(found)
    }
}

#[async_trait]
impl ScanStore for MemoryStore {
    async fn last_processed_block(&self) -> Result<Option<u64>, SweepError> {
        Ok(lock(&self.checkpoints)?.iter().max().copied())
    }

    async fn commit_batch(
        &self,
        observations: &[BalanceObservation],
        end_block: u64,
    ) -> Result<(), SweepError> {
        if self.fail_batch.swap(false, Ordering::SeqCst) {
            return Err(SweepError::Storage("simulated batch commit failure".into()));
        }
        let mut balances = lock(&self.balances)?;
        let mut checkpoints = lock(&self.checkpoints)?;
        for obs in observations {
            *balances.entry(obs.address.clone()).or_default() += &obs.amount;
        }
        checkpoints.push(end_block);
        Ok(())
    }

    async fn balance(&self, address: &str) -> Result<Option<BigUint>, SweepError> {
        Ok(lock(&self.balances)?.get(address).cloned())
    }

    async fn balances(&self, limit: usize) -> Result<Vec<BalanceObservation>, SweepError> {
        let mut all: Vec<_> = lock(&self.balances)?
            .iter()
            .map(|(a, b)| BalanceObservation::new(a.clone(), b.clone()))
            .collect();
        all.sort_by(|x, y| y.amount.cmp(&x.amount).then_with(|| x.address.cmp(&y.address)));
        all.truncate(limit);
        Ok(all)
    }
}
