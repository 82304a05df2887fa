//! SQLite storage backend for ChainSweep.
//!
//! Four tables in one file:
//!
//! | table                   | contents                                   |
//! |-------------------------|--------------------------------------------|
//! | `eth_allocate_progress` | append-only log of issued ranks            |
//! | `eth_allocate_tasks`    | issued tasks, their phrase and status      |
//! | `eth_balances_progress` | append-only log of committed batch ends    |
//! | `eth_balances`          | accumulated balance per address            |
//!
//! Ranks and balances exceed 64 bits, so both are stored as decimal TEXT.
//! "Largest" queries order by `length(col) DESC, col DESC`, which is
//! numeric order for canonical decimal strings.
//!
//! # Usage
//! ```rust,no_run
//! use chainsweep_storage::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./chainsweep.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use num_bigint::BigUint;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use chainsweep_core::error::SweepError;
use chainsweep_core::store::{AllocationStore, ScanStore};
use chainsweep_core::types::{BalanceObservation, Task, TaskStatus};

/// RFC 3339 timestamp for `created_at` / `updated_at` columns.
fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn db_err(e: sqlx::Error) -> SweepError {
    SweepError::Storage(e.to_string())
}

fn parse_big(column: &str, value: &str) -> Result<BigUint, SweepError> {
    value
        .parse::<BigUint>()
        .map_err(|e| SweepError::Storage(format!("bad {column} value '{value}': {e}")))
}

/// Row counts across all four tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageSummary {
    pub tasks: u64,
    pub pending_tasks: u64,
    pub allocations: u64,
    pub checkpoints: u64,
    pub balances: u64,
}

/// SQLite-backed allocation and scan storage.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./chainsweep.db"`) or a full
    /// SQLite URL (`"sqlite:./chainsweep.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, SweepError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(db_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        debug!(path, "sqlite storage opened");
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// A single pooled connection holds the data; it is lost on drop.
    pub async fn in_memory() -> Result<Self, SweepError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables if absent and enable WAL mode.
    async fn init_schema(&self) -> Result<(), SweepError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        let statements = [
            "CREATE TABLE IF NOT EXISTS eth_allocate_progress (
                id                   INTEGER PRIMARY KEY AUTOINCREMENT,
                last_processed_index TEXT    NOT NULL,
                created_at           TEXT    NOT NULL
            );",
            "CREATE TABLE IF NOT EXISTS eth_allocate_tasks (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id    TEXT    NOT NULL,
                mnemonic   TEXT    NOT NULL,
                version    INTEGER NOT NULL,
                status     TEXT    NOT NULL DEFAULT 'pending',
                created_at TEXT    NOT NULL,
                updated_at TEXT    NOT NULL
            );",
            "CREATE INDEX IF NOT EXISTS idx_allocate_tasks_task_id
                ON eth_allocate_tasks (task_id);",
            "CREATE TABLE IF NOT EXISTS eth_balances_progress (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                block_number INTEGER NOT NULL,
                created_at   TEXT    NOT NULL
            );",
            "CREATE TABLE IF NOT EXISTS eth_balances (
                address    TEXT PRIMARY KEY,
                balance    TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        ];

        for sql in statements {
            sqlx::query(sql).execute(&self.pool).await.map_err(db_err)?;
        }
        Ok(())
    }

    async fn count(&self, sql: &str) -> Result<u64, SweepError> {
        let row = sqlx::query(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }

    /// Row counts for status reporting.
    pub async fn summary(&self) -> Result<StorageSummary, SweepError> {
        Ok(StorageSummary {
            tasks: self
                .count("SELECT COUNT(*) AS cnt FROM eth_allocate_tasks")
                .await?,
            pending_tasks: self
                .count("SELECT COUNT(*) AS cnt FROM eth_allocate_tasks WHERE status = 'pending'")
                .await?,
            allocations: self
                .count("SELECT COUNT(*) AS cnt FROM eth_allocate_progress")
                .await?,
            checkpoints: self
                .count("SELECT COUNT(*) AS cnt FROM eth_balances_progress")
                .await?,
            balances: self
                .count("SELECT COUNT(*) AS cnt FROM eth_balances")
                .await?,
        })
    }
}

// ─── AllocationStore impl ────────────────────────────────────────────────────

#[async_trait]
impl AllocationStore for SqliteStorage {
    async fn last_index(&self) -> Result<Option<BigUint>, SweepError> {
        let row = sqlx::query(
            "SELECT last_processed_index FROM eth_allocate_progress
             ORDER BY length(last_processed_index) DESC, last_processed_index DESC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|r| {
            let raw: String = r.get("last_processed_index");
            parse_big("last_processed_index", &raw)
        })
        .transpose()
    }

    async fn commit_task(&self, task: &Task) -> Result<(), SweepError> {
        let ts = now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO eth_allocate_tasks (task_id, mnemonic, version, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&task.task_id)
        .bind(task.phrase())
        .bind(task.version as i64)
        .bind(TaskStatus::Pending.to_string())
        .bind(&ts)
        .bind(&ts)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO eth_allocate_progress (last_processed_index, created_at) VALUES (?, ?)",
        )
        .bind(&task.task_id)
        .bind(&ts)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit()
            .await
            .map_err(|e| SweepError::Storage(format!("commit task {}: {e}", task.task_id)))?;

        debug!(task_id = %task.task_id, "task committed");
        Ok(())
    }

    async fn task(&self, task_id: &str) -> Result<Option<(Task, TaskStatus)>, SweepError> {
        let row = sqlx::query(
            "SELECT task_id, mnemonic, version, status FROM eth_allocate_tasks
             WHERE task_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(r) = row else {
            return Ok(None);
        };

        let mnemonic: String = r.get("mnemonic");
        let status: String = r.get("status");
        let status = status.parse::<TaskStatus>().map_err(SweepError::Storage)?;
        let version: i64 = r.get("version");
        let version = u8::try_from(version).map_err(|_| {
            SweepError::Storage(format!("task {task_id}: version {version} out of range"))
        })?;
        let task = Task {
            task_id: r.get("task_id"),
            words: mnemonic.split_whitespace().map(String::from).collect(),
            version,
        };
        Ok(Some((task, status)))
    }

    async fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<bool, SweepError> {
        let result = sqlx::query(
            "UPDATE eth_allocate_tasks SET status = ?, updated_at = ? WHERE task_id = ?",
        )
        .bind(status.to_string())
        .bind(now())
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let updated = result.rows_affected() > 0;
        if updated {
            debug!(task_id, %status, "task status updated");
        }
        Ok(updated)
    }
}

// ─── ScanStore impl ──────────────────────────────────────────────────────────

#[async_trait]
impl ScanStore for SqliteStorage {
    async fn last_processed_block(&self) -> Result<Option<u64>, SweepError> {
        let row = sqlx::query("SELECT MAX(block_number) AS last FROM eth_balances_progress")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let last: Option<i64> = row.get("last");
        last.map(|b| {
            u64::try_from(b)
                .map_err(|_| SweepError::Storage(format!("negative checkpoint block {b}")))
        })
        .transpose()
    }

    async fn commit_batch(
        &self,
        observations: &[BalanceObservation],
        end_block: u64,
    ) -> Result<(), SweepError> {
        let checkpoint = i64::try_from(end_block).map_err(|_| {
            SweepError::Storage(format!("block {end_block} exceeds the storable range"))
        })?;
        let ts = now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for obs in observations {
            let existing = sqlx::query("SELECT balance FROM eth_balances WHERE address = ?")
                .bind(&obs.address)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;

            let total = match existing {
                Some(r) => {
                    let raw: String = r.get("balance");
                    parse_big("balance", &raw)? + &obs.amount
                }
                None => obs.amount.clone(),
            };

            sqlx::query(
                "INSERT INTO eth_balances (address, balance, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(address) DO UPDATE SET
                    balance = excluded.balance,
                    updated_at = excluded.updated_at",
            )
            .bind(&obs.address)
            .bind(total.to_string())
            .bind(&ts)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        sqlx::query("INSERT INTO eth_balances_progress (block_number, created_at) VALUES (?, ?)")
            .bind(checkpoint)
            .bind(&ts)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit()
            .await
            .map_err(|e| SweepError::Storage(format!("commit batch ending at {end_block}: {e}")))?;

        debug!(end_block, balances = observations.len(), "batch stored");
        Ok(())
    }

    async fn balance(&self, address: &str) -> Result<Option<BigUint>, SweepError> {
        let row = sqlx::query("SELECT balance FROM eth_balances WHERE address = ?")
            .bind(address)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|r| {
            let raw: String = r.get("balance");
            parse_big("balance", &raw)
        })
        .transpose()
    }

    async fn balances(&self, limit: usize) -> Result<Vec<BalanceObservation>, SweepError> {
        let rows = sqlx::query(
            "SELECT address, balance FROM eth_balances
             ORDER BY length(balance) DESC, balance DESC, address
             LIMIT ?",
        )
        .bind(limit.min(i64::MAX as usize) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let address: String = r.get("address");
            let raw: String = r.get("balance");
            out.push(BalanceObservation::new(address, parse_big("balance", &raw)?));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(rank: u64) -> Task {
        Task::new(
            &BigUint::from(rank),
            (0..12).map(|i| format!("word{i}")).collect(),
        )
    }

    // ── Allocation ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn fresh_store_has_no_progress() {
        let store = SqliteStorage::in_memory().await.unwrap();
        assert!(store.last_index().await.unwrap().is_none());
        assert!(store.last_processed_block().await.unwrap().is_none());
        assert_eq!(store.summary().await.unwrap(), StorageSummary::default());
    }

    #[tokio::test]
    async fn last_index_is_numeric_max() {
        let store = SqliteStorage::in_memory().await.unwrap();
        for rank in [9u64, 10, 2] {
            store.commit_task(&task(rank)).await.unwrap();
        }
        // "9" > "10" lexically; numeric max is 10
        assert_eq!(store.last_index().await.unwrap(), Some(BigUint::from(10u32)));
    }

    #[tokio::test]
    async fn ranks_beyond_u64_survive() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let big: BigUint = "11005261717918037175659349191167".parse().unwrap();
        let t = Task::new(&big, vec!["zoo".into(); 12]);
        store.commit_task(&t).await.unwrap();
        assert_eq!(store.last_index().await.unwrap(), Some(big));
    }

    #[tokio::test]
    async fn task_roundtrip_and_status() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let t = task(5);
        store.commit_task(&t).await.unwrap();

        let (loaded, status) = store.task("5").await.unwrap().unwrap();
        assert_eq!(loaded, t);
        assert_eq!(status, TaskStatus::Pending);

        assert!(store.set_task_status("5", TaskStatus::Found).await.unwrap());
        assert!(!store.set_task_status("6", TaskStatus::Found).await.unwrap());
        let (_, status) = store.task("5").await.unwrap().unwrap();
        assert_eq!(status, TaskStatus::Found);

        let summary = store.summary().await.unwrap();
        assert_eq!(summary.tasks, 1);
        assert_eq!(summary.pending_tasks, 0);
        assert_eq!(summary.allocations, 1);
    }

    #[tokio::test]
    async fn unknown_task_is_none() {
        let store = SqliteStorage::in_memory().await.unwrap();
        assert!(store.task("404").await.unwrap().is_none());
    }

    // ── Scanning ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn batch_commit_is_additive() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let five = BigUint::from(5u32);
        store
            .commit_batch(&[BalanceObservation::new("0xa", five.clone())], 8)
            .await
            .unwrap();
        store
            .commit_batch(
                &[
                    BalanceObservation::new("0xa", five.clone()),
                    BalanceObservation::new("0xa", five.clone()),
                ],
                16,
            )
            .await
            .unwrap();
        assert_eq!(store.balance("0xa").await.unwrap(), Some(BigUint::from(15u32)));
        assert_eq!(store.last_processed_block().await.unwrap(), Some(16));
        assert_eq!(store.summary().await.unwrap().checkpoints, 2);
    }

    #[tokio::test]
    async fn empty_batch_still_checkpoints() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.commit_batch(&[], 42).await.unwrap();
        assert_eq!(store.last_processed_block().await.unwrap(), Some(42));
        assert_eq!(store.summary().await.unwrap().balances, 0);
    }

    #[tokio::test]
    async fn balances_listed_largest_first() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let wei = |s: &str| s.parse::<BigUint>().unwrap();
        store
            .commit_batch(
                &[
                    BalanceObservation::new("0xsmall", wei("9")),
                    BalanceObservation::new("0xwhale", wei("123456789012345678901234567890")),
                    BalanceObservation::new("0xmid", wei("10")),
                ],
                1,
            )
            .await
            .unwrap();

        let top = store.balances(2).await.unwrap();
        let addrs: Vec<_> = top.iter().map(|o| o.address.as_str()).collect();
        assert_eq!(addrs, vec!["0xwhale", "0xmid"]);
    }

    #[tokio::test]
    async fn out_of_range_version_is_storage_error() {
        let store = SqliteStorage::in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO eth_allocate_tasks (task_id, mnemonic, version, status, created_at, updated_at)
             VALUES ('7', 'a b c d e f g h i j k l', 300, 'pending', '', '')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store.task("7").await.unwrap_err();
        assert!(matches!(err, SweepError::Storage(ref m) if m.contains("300")));
    }

    #[tokio::test]
    async fn unstorable_end_block_writes_nothing() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let obs = [BalanceObservation::new("0xa", BigUint::from(5u32))];

        let err = store.commit_batch(&obs, u64::MAX).await.unwrap_err();
        assert!(matches!(err, SweepError::Storage(_)));
        assert!(store.last_processed_block().await.unwrap().is_none());
        assert!(store.balance("0xa").await.unwrap().is_none());

        store.commit_batch(&obs, i64::MAX as u64).await.unwrap();
        assert_eq!(store.last_processed_block().await.unwrap(), Some(i64::MAX as u64));
    }
}
