//! `chainsweep allocate` — issue the next task(s).
//!
//! Must not run concurrently against the same database: the allocator
//! serializes nothing itself.

use std::path::Path;

use anyhow::Result;
use serde_json::json;

use chainsweep_core::{Allocation, SweepConfig, TaskAllocator};

use crate::{load_vocabulary, open_store};

pub async fn run(config: &SweepConfig, count: u64, wordlist: Option<&Path>, as_json: bool) -> Result<()> {
    let vocabulary = load_vocabulary(wordlist)?;
    let allocator = TaskAllocator::new(vocabulary, open_store(config).await?);

    let mut issued = 0u64;
    while issued < count {
        match allocator.acquire_task().await? {
            Allocation::Task(task) => {
                issued += 1;
                if as_json {
                    println!(
                        "{}",
                        json!({
                            "task_id": task.task_id,
                            "words": task.words,
                            "version": task.version,
                        })
                    );
                } else {
                    println!("{:>12}  {}", task.task_id, task.phrase());
                }
            }
            Allocation::Exhausted => {
                eprintln!(
                    "All {} combinations have been distributed.",
                    allocator.total_combinations()
                );
                break;
            }
        }
    }

    tracing::info!(issued, requested = count, "allocation finished");
    Ok(())
}
