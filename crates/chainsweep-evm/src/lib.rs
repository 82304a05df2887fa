//! chainsweep-evm — EVM chain access over HTTP JSON-RPC.
//!
//! [`HttpChainClient`] implements [`chainsweep_core::ChainClient`] for one
//! endpoint URL. Wrap several in an [`chainsweep_core::EndpointPool`] to
//! spread calls across providers.

pub mod client;
pub mod request;

pub use client::{block_from_json, parse_hex_biguint, parse_hex_u64, HttpChainClient};
pub use request::EthCall;
