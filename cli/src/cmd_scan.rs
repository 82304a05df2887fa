//! `chainsweep scan` — scan a block range into the balances table.
//!
//! Ctrl-C stops the run between or during batches; everything up to the
//! last committed batch is kept and the next run resumes from there.

use std::sync::Arc;

use anyhow::{Context, Result};

use chainsweep_core::{
    BlockScanner, ChainClient, EndpointPool, ScanStore, Shutdown, SweepConfig, SweepError,
};
use chainsweep_evm::HttpChainClient;

use crate::open_store;

pub async fn run(config: &SweepConfig, from: u64, to: u64, as_json: bool) -> Result<()> {
    config.validate()?;
    if config.endpoints.is_empty() {
        anyhow::bail!("no RPC endpoints: pass --endpoint <url> or set `endpoints` in the config file");
    }

    let mut clients: Vec<Arc<dyn ChainClient>> = Vec::with_capacity(config.endpoints.len());
    for url in &config.endpoints {
        let client = HttpChainClient::new(url.clone(), config.request_timeout())
            .with_context(|| format!("creating client for {url}"))?;
        clients.push(Arc::new(client));
    }
    let pool = EndpointPool::new(clients, config.endpoint_selection);

    let (handle, signal) = Shutdown::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping scan");
            handle.trigger();
        }
    });

    let store = open_store(config).await?;
    let scanner = BlockScanner::new(Arc::new(pool), store, config, signal);

    println!(
        "Scanning blocks {from}..={to} via {} endpoint(s), {} blocks per batch",
        config.endpoints.len(),
        scanner.batch_size()
    );

    match scanner.fetch(from, to).await {
        Ok(report) => {
            if as_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                if report.resumed {
                    println!("  Resumed at block:    {}", report.start_block);
                }
                println!("  Batches committed:   {}", report.batches);
                println!("  Blocks fetched:      {}", report.blocks);
                println!("  Addresses observed:  {}", report.addresses_observed);
                println!("  Balances committed:  {}", report.balances_committed);
            }
            Ok(())
        }
        Err(e) => {
            let saved = scanner.store().last_processed_block().await.ok().flatten();
            match saved {
                Some(b) => eprintln!("Progress saved through block {b}."),
                None => eprintln!("No batch was committed."),
            }
            if matches!(e, SweepError::Cancelled) {
                anyhow::bail!("scan interrupted");
            }
            Err(e).context("scan failed")
        }
    }
}
