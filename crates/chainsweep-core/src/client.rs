//! Chain-node client abstraction.

use async_trait::async_trait;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::error::SweepError;

/// A transaction reduced to its participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub from: String,
    /// `None` for contract creations.
    pub to: Option<String>,
}

/// A block reduced to what the scanner needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBlock {
    pub number: u64,
    /// Miner / coinbase address.
    pub miner: String,
    pub transactions: Vec<ChainTransaction>,
}

impl ChainBlock {
    /// Miner first, then each transaction's sender and receiver, in block
    /// order. Duplicates are kept.
    pub fn participants(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(1 + self.transactions.len() * 2);
        out.push(self.miner.clone());
        for tx in &self.transactions {
            out.push(tx.from.clone());
            if let Some(to) = &tx.to {
                out.push(to.clone());
            }
        }
        out
    }
}

/// The three calls the scanner makes against a chain node.
///
/// Every method may fail transiently and must be safe to retry.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current head block height.
    async fn chain_head(&self) -> Result<u64, SweepError>;

    /// Full block (with transaction objects) at `number`.
    async fn block_by_number(&self, number: u64) -> Result<ChainBlock, SweepError>;

    /// Latest balance of `address`, in wei.
    async fn balance(&self, address: &str) -> Result<BigUint, SweepError>;

    /// Identifier of the endpoint behind this client (URL or name).
    fn endpoint(&self) -> &str;
}
