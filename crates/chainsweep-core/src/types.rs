//! Shared types for allocation and scanning.

use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Number of words handed out per task.
pub const WORDS_PER_TASK: usize = 12;

/// Current task format version.
pub const TASK_FORMAT_VERSION: u8 = 1;

// ─── Task ─────────────────────────────────────────────────────────────────────

/// One unit of work: a 12-word combination identified by its rank.
///
/// Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Decimal encoding of the 0-based combination rank.
    pub task_id: String,
    /// The words, in vocabulary order.
    pub words: Vec<String>,
    /// Format version.
    pub version: u8,
}

impl Task {
    pub fn new(rank: &BigUint, words: Vec<String>) -> Self {
        Self {
            task_id: rank.to_str_radix(10),
            words,
            version: TASK_FORMAT_VERSION,
        }
    }

    /// The rank this task was derived from.
    pub fn rank(&self) -> Option<BigUint> {
        BigUint::parse_bytes(self.task_id.as_bytes(), 10)
    }

    /// Space-separated words, as stored and as fed to key derivation.
    pub fn phrase(&self) -> String {
        self.words.join(" ")
    }

    /// Returns `true` if the same word occurs more than once.
    pub fn has_repeated_words(&self) -> bool {
        self.words.windows(2).any(|w| w[0] == w[1])
    }
}

// ─── TaskStatus ───────────────────────────────────────────────────────────────

/// Lifecycle of a persisted task. The allocator only ever writes `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Found,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Found => write!(f, "found"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "found" => Ok(Self::Found),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

/// Report sent back by the external derivation worker for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    /// Whether any derived address held funds.
    pub found: bool,
    /// Addresses that matched, if any.
    pub addresses: Vec<String>,
}

impl TaskResult {
    /// The status this result moves the task to.
    pub fn status(&self) -> TaskStatus {
        if self.found {
            TaskStatus::Found
        } else {
            TaskStatus::Completed
        }
    }
}

// ─── Allocation ───────────────────────────────────────────────────────────────

/// Outcome of [`crate::allocator::TaskAllocator::acquire_task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    /// A freshly issued task.
    Task(Task),
    /// Every combination has already been issued.
    Exhausted,
}

impl Allocation {
    pub fn into_task(self) -> Option<Task> {
        match self {
            Self::Task(t) => Some(t),
            Self::Exhausted => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

// ─── BalanceObservation ───────────────────────────────────────────────────────

/// A point-in-time balance seen for an address during a scan batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceObservation {
    pub address: String,
    /// Balance in the chain's base unit (wei).
    pub amount: BigUint,
}

impl BalanceObservation {
    pub fn new(address: impl Into<String>, amount: BigUint) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}
