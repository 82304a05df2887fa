//! chainsweep-storage — durable backends for the ChainSweep store traits.
//!
//! Backends:
//! - [`sqlite`] — SQLite via `sqlx` (single file, WAL)
//!
//! The in-memory store lives in `chainsweep_core::store::MemoryStore`.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteStorage, StorageSummary};
