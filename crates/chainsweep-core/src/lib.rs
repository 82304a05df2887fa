//! chainsweep-core — crash-resumable enumeration over very large spaces.
//!
//! # Architecture
//!
//! ```text
//! TaskAllocator ──► AllocationStore   (rank → 12-word Task, progress log)
//!      └── MixedRadix / Vocabulary
//!
//! BlockScanner  ──► ScanStore         (additive balances + block checkpoint)
//!      ├── Retry        (fixed delay, shutdown-aware)
//!      └── EndpointPool (one ChainClient chosen per call)
//! ```
//!
//! Storage backends live in `chainsweep-storage`; the JSON-RPC client lives
//! in `chainsweep-evm`. [`store::MemoryStore`] is provided here for tests and
//! ephemeral runs.

pub mod allocator;
pub mod client;
pub mod combination;
pub mod config;
pub mod error;
pub mod pool;
pub mod retry;
pub mod scanner;
pub mod shutdown;
pub mod store;
pub mod types;
pub mod vocabulary;

pub use allocator::TaskAllocator;
pub use client::{ChainBlock, ChainClient, ChainTransaction};
pub use combination::{binomial, MixedRadix};
pub use config::{LogConfig, SweepConfig};
pub use error::SweepError;
pub use pool::{EndpointPool, SelectionPolicy};
pub use retry::{Retry, RetryConfig};
pub use scanner::{BlockScanner, ScanReport};
pub use shutdown::{Shutdown, ShutdownHandle, ShutdownSignal};
pub use store::{AllocationStore, MemoryStore, ScanStore};
pub use types::{Allocation, BalanceObservation, Task, TaskResult, TaskStatus, WORDS_PER_TASK};
pub use vocabulary::Vocabulary;
