//! JSON-RPC 2.0 framing for the three `eth_*` calls the scanner makes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use chainsweep_core::error::SweepError;

/// A chain query, with its parameters in wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EthCall {
    /// `eth_blockNumber`
    BlockNumber,
    /// `eth_getBlockByNumber(<hex height>, true)`: full transaction objects.
    BlockByNumber(u64),
    /// `eth_getBalance(<address>, "latest")`
    Balance(String),
}

impl EthCall {
    pub fn method(&self) -> &'static str {
        match self {
            Self::BlockNumber => "eth_blockNumber",
            Self::BlockByNumber(_) => "eth_getBlockByNumber",
            Self::Balance(_) => "eth_getBalance",
        }
    }

    pub fn params(&self) -> Value {
        match self {
            Self::BlockNumber => json!([]),
            Self::BlockByNumber(n) => json!([format!("0x{n:x}"), true]),
            Self::Balance(address) => json!([address, "latest"]),
        }
    }
}

/// Outgoing request envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, call: &EthCall) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: call.method(),
            params: call.params(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// Incoming response envelope. Only `result` and `error` are read.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// The `result` value (`Null` if absent), or the error object as
    /// [`SweepError::Rpc`] attributed to `endpoint`.
    pub fn into_result(self, endpoint: &str, method: &str) -> Result<Value, SweepError> {
        match self.error {
            Some(err) => Err(SweepError::Rpc {
                endpoint: endpoint.to_string(),
                message: format!("{method}: error {}: {}", err.code, err.message),
            }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}
