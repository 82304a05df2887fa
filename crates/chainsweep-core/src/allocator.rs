//! Sequential task allocator.
//!
//! Hands out one 12-word [`Task`] per call, ranks `0, 1, 2, …`, using the
//! persisted progress log as its only state. A restart resumes after the
//! highest committed rank.
//!
//! # Concurrency
//! The read-then-write of the progress log is not guarded. Calls to
//! [`TaskAllocator::acquire_task`] must be serialized by the caller: one
//! allocating process per store, one call in flight at a time. Two
//! concurrent callers can both read the same `last_index` and issue the
//! same rank.

use num_bigint::BigUint;
use num_traits::One;
use tracing::{debug, info};

use crate::combination::{binomial, MixedRadix};
use crate::error::SweepError;
use crate::store::AllocationStore;
use crate::types::{Allocation, Task, WORDS_PER_TASK};
use crate::vocabulary::Vocabulary;

/// Issues tasks in increasing rank order.
pub struct TaskAllocator<S> {
    vocabulary: Vocabulary,
    codec: MixedRadix,
    total: BigUint,
    store: S,
}

impl<S: AllocationStore> TaskAllocator<S> {
    /// Build an allocator over `vocabulary`; `C(n, 12)` is computed here.
    pub fn new(vocabulary: Vocabulary, store: S) -> Self {
        let n = vocabulary.len();
        let total = binomial(n, WORDS_PER_TASK);
        info!(vocabulary = n, total = %total, "task allocator ready");
        Self {
            codec: MixedRadix::new(n, WORDS_PER_TASK),
            vocabulary,
            total,
            store,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        "seq-queue"
    }

    /// Number of ranks this allocator can issue.
    pub fn total_combinations(&self) -> &BigUint {
        &self.total
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Highest issued rank, if any.
    pub async fn last_index(&self) -> Result<Option<BigUint>, SweepError> {
        self.store.last_index().await
    }

    /// Words for `rank`, without issuing anything.
    pub fn words_for(&self, rank: &BigUint) -> Vec<String> {
        self.codec
            .combination(rank)
            .into_iter()
            .filter_map(|i| self.vocabulary.get(i).map(String::from))
            .collect()
    }

    /// Issue the next task, or report exhaustion.
    ///
    /// On exhaustion nothing is written. On a storage error the progress log
    /// has not advanced, so the same rank is issued again next time.
    pub async fn acquire_task(&self) -> Result<Allocation, SweepError> {
        let next = match self.store.last_index().await? {
            Some(last) => last + BigUint::one(),
            None => BigUint::default(),
        };

        if next >= self.total {
            info!(total = %self.total, "all tasks have been distributed");
            return Ok(Allocation::Exhausted);
        }

        let task = Task::new(&next, self.words_for(&next));
        if task.has_repeated_words() {
            debug!(task_id = %task.task_id, "combination repeats a word");
        }

        self.store.commit_task(&task).await?;
        debug!(task_id = %task.task_id, "task issued");
        Ok(Allocation::Task(task))
    }
}
