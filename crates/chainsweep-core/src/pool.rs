//! Multi-endpoint pool: one client chosen per call.
//!
//! No health tracking: a failing endpoint is simply retried by the caller,
//! and the next attempt draws again.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use num_bigint::BigUint;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::client::{ChainBlock, ChainClient};
use crate::error::SweepError;

/// How the pool picks an endpoint for each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Uniformly at random.
    #[default]
    Random,
    /// Cycle through endpoints in order.
    RoundRobin,
}

/// A fixed set of interchangeable chain clients.
pub struct EndpointPool {
    clients: Vec<Arc<dyn ChainClient>>,
    policy: SelectionPolicy,
    cursor: AtomicUsize,
}

impl EndpointPool {
    pub fn new(clients: Vec<Arc<dyn ChainClient>>, policy: SelectionPolicy) -> Self {
        Self {
            clients,
            policy,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Pool with uniform random selection.
    pub fn random(clients: Vec<Arc<dyn ChainClient>>) -> Self {
        Self::new(clients, SelectionPolicy::Random)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.clients.iter().map(|c| c.endpoint().to_string()).collect()
    }

    /// Pick the client for one call.
    pub fn pick(&self) -> Result<Arc<dyn ChainClient>, SweepError> {
        if self.clients.is_empty() {
            return Err(SweepError::NoEndpoints);
        }
        let idx = match self.policy {
            SelectionPolicy::Random => rand::thread_rng().gen_range(0..self.clients.len()),
            SelectionPolicy::RoundRobin => {
                self.cursor.fetch_add(1, Ordering::Relaxed) % self.clients.len()
            }
        };
        Ok(self.clients[idx].clone())
    }
}

#[async_trait]
impl ChainClient for EndpointPool {
    async fn chain_head(&self) -> Result<u64, SweepError> {
        let client = self.pick()?;
        tracing::trace!(endpoint = client.endpoint(), "eth_blockNumber");
        client.chain_head().await
    }

    async fn block_by_number(&self, number: u64) -> Result<ChainBlock, SweepError> {
        let client = self.pick()?;
        tracing::trace!(endpoint = client.endpoint(), block = number, "eth_getBlockByNumber");
        client.block_by_number(number).await
    }

    async fn balance(&self, address: &str) -> Result<BigUint, SweepError> {
        let client = self.pick()?;
        tracing::trace!(endpoint = client.endpoint(), address, "eth_getBalance");
        client.balance(address).await
    }

    fn endpoint(&self) -> &str {
        "pool"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Named(String);

    #[async_trait]
    impl ChainClient for Named {
        async fn chain_head(&self) -> Result<u64, SweepError> {
            Ok(100)
        }
        async fn block_by_number(&self, number: u64) -> Result<ChainBlock, SweepError> {
            Ok(ChainBlock {
                number,
                miner: self.0.clone(),
                transactions: vec![],
            })
        }
        async fn balance(&self, _address: &str) -> Result<BigUint, SweepError> {
            Ok(BigUint::from(1u32))
        }
        fn endpoint(&self) -> &str {
            &self.0
        }
    }

    fn named(list: &[&str]) -> Vec<Arc<dyn ChainClient>> {
        list.iter()
            .map(|n| Arc::new(Named(n.to_string())) as Arc<dyn ChainClient>)
            .collect()
    }

    #[test]
    fn empty_pool_has_no_endpoint() {
        let pool = EndpointPool::random(vec![]);
        assert!(pool.is_empty());
        assert!(matches!(pool.pick(), Err(SweepError::NoEndpoints)));
    }

    #[test]
    fn round_robin_cycles() {
        let pool = EndpointPool::new(named(&["a", "b", "c"]), SelectionPolicy::RoundRobin);
        let picks: Vec<_> = (0..6)
            .map(|_| pool.pick().unwrap().endpoint().to_string())
            .collect();
        assert_eq!(picks, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn random_reaches_every_endpoint() {
        let pool = EndpointPool::random(named(&["a", "b", "c"]));
        let seen: HashSet<_> = (0..300)
            .map(|_| pool.pick().unwrap().endpoint().to_string())
            .collect();
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn pool_delegates_calls() {
        let pool = EndpointPool::new(named(&["only"]), SelectionPolicy::Random);
        let block = pool.block_by_number(42).await.unwrap();
        assert_eq!(block.number, 42);
        assert_eq!(block.miner, "only");
        assert_eq!(pool.chain_head().await.unwrap(), 100);
        assert_eq!(pool.endpoint(), "pool");
    }
}
