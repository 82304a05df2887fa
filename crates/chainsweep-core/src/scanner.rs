//! Resumable, batched block scanner.
//!
//! For each batch of `max.blocks.per.batch` heights:
//!
//! 1. fetch every block (bounded concurrency, each call retried),
//! 2. collect miner, senders and receivers,
//! 3. look up every collected balance (bounded concurrency, retried),
//! 4. commit non-zero balances and the batch's end height together.
//!
//! Batches run strictly in height order; batch N+1 starts only after batch N
//! is committed. Any failure that survives retry stops the run with the
//! checkpoint at the last committed batch.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use num_traits::Zero;
use serde::Serialize;
use tracing::{debug, info};

use crate::client::{ChainBlock, ChainClient};
use crate::config::SweepConfig;
use crate::error::SweepError;
use crate::retry::Retry;
use crate::shutdown::ShutdownSignal;
use crate::store::ScanStore;
use crate::types::BalanceObservation;

/// Summary of one `fetch` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// First height processed by this run (after resuming).
    pub start_block: u64,
    /// Requested end height.
    pub end_block: u64,
    /// Whether a saved checkpoint moved the start forward.
    pub resumed: bool,
    pub batches: u64,
    pub blocks: u64,
    /// Participant addresses collected, duplicates included.
    pub addresses_observed: u64,
    /// Non-zero balances added to the store.
    pub balances_committed: u64,
}

struct BatchOutcome {
    blocks: u64,
    addresses: u64,
    observations: Vec<BalanceObservation>,
}

/// Scans a closed block range into a [`ScanStore`].
pub struct BlockScanner<S> {
    client: Arc<dyn ChainClient>,
    store: S,
    retry: Retry,
    batch_size: u64,
    concurrency: usize,
    shutdown: ShutdownSignal,
}

impl<S: ScanStore> BlockScanner<S> {
    /// `client` is usually an [`EndpointPool`](crate::pool::EndpointPool).
    pub fn new(
        client: Arc<dyn ChainClient>,
        store: S,
        config: &SweepConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            client,
            store,
            retry: Retry::new(config.retry_config(), shutdown.clone()),
            batch_size: config.max_blocks_per_batch.max(1),
            concurrency: config.fetch_concurrency.max(1),
            shutdown,
        }
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Scan `[from, to]`, resuming after the stored checkpoint.
    pub async fn fetch(&self, from: u64, to: u64) -> Result<ScanReport, SweepError> {
        if from < 1 {
            return Err(SweepError::invalid_range(from, to, "block numbers start at 1"));
        }
        if from > to {
            return Err(SweepError::invalid_range(from, to, "from is after to"));
        }

        let head = self
            .retry
            .run("eth_blockNumber", || {
                let client = self.client.clone();
                async move { client.chain_head().await }
            })
            .await?;
        if to > head {
            return Err(SweepError::invalid_range(
                from,
                to,
                format!("chain head is only {head}"),
            ));
        }

        let checkpoint = self.store.last_processed_block().await?;
        let start = match checkpoint {
            Some(last) => from.max(last.saturating_add(1)),
            None => from,
        };

        let mut report = ScanReport {
            start_block: start,
            end_block: to,
            resumed: start > from,
            ..Default::default()
        };

        if start > to {
            info!(from, to, checkpoint = ?checkpoint, "range already processed");
            return Ok(report);
        }

        info!(from, to, start, head, batch_size = self.batch_size, "starting scan");

        let mut batch_start = start;
        while batch_start <= to {
            if self.shutdown.is_triggered() {
                return Err(SweepError::Cancelled);
            }
            let batch_end = batch_start
                .saturating_add(self.batch_size - 1)
                .min(to);

            let outcome = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Err(SweepError::Cancelled),
                res = self.collect_batch(batch_start, batch_end) => res?,
            };

            self.store
                .commit_batch(&outcome.observations, batch_end)
                .await?;

            report.batches += 1;
            report.blocks += outcome.blocks;
            report.addresses_observed += outcome.addresses;
            report.balances_committed += outcome.observations.len() as u64;

            info!(
                batch_start,
                batch_end,
                blocks = outcome.blocks,
                addresses = outcome.addresses,
                balances = outcome.observations.len(),
                "batch committed"
            );

            if batch_end == u64::MAX {
                break;
            }
            batch_start = batch_end + 1;
        }

        info!(
            to,
            batches = report.batches,
            balances = report.balances_committed,
            "scan complete"
        );
        Ok(report)
    }

    /// Fetch and look up one batch without touching the store.
    async fn collect_batch(&self, from: u64, to: u64) -> Result<BatchOutcome, SweepError> {
        let mut blocks: Vec<ChainBlock> = stream::iter(from..=to)
            .map(|n| self.fetch_block(n))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;
        blocks.sort_by_key(|b| b.number);

        let addresses: Vec<String> = blocks.iter().flat_map(ChainBlock::participants).collect();
        debug!(from, to, addresses = addresses.len(), "addresses collected");

        let balances: Vec<BalanceObservation> = stream::iter(addresses.clone())
            .map(|a| async move { self.lookup_balance(&a).await })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let observations = balances
            .into_iter()
            .filter(|o| !o.amount.is_zero())
            .collect();

        Ok(BatchOutcome {
            blocks: blocks.len() as u64,
            addresses: addresses.len() as u64,
            observations,
        })
    }

    async fn fetch_block(&self, number: u64) -> Result<ChainBlock, SweepError> {
        let client = self.client.clone();
        self.retry
            .run("eth_getBlockByNumber", move || {
                let client = client.clone();
                async move { client.block_by_number(number).await }
            })
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    e
                } else {
                    SweepError::BlockFetch {
                        block: number,
                        source: Box::new(e),
                    }
                }
            })
    }

    async fn lookup_balance(&self, address: &str) -> Result<BalanceObservation, SweepError> {
        let client = self.client.clone();
        let owned = address.to_string();
        let amount = self
            .retry
            .run("eth_getBalance", move || {
                let client = client.clone();
                let address = owned.clone();
                async move { client.balance(&address).await }
            })
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    e
                } else {
                    SweepError::BalanceLookup {
                        address: address.to_string(),
                        source: Box::new(e),
                    }
                }
            })?;
        Ok(BalanceObservation::new(address, amount))
    }
}
