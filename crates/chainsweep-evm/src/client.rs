//! HTTP JSON-RPC chain client backed by `reqwest`.
//!
//! One client talks to one endpoint and makes a single attempt per call.
//! Retries and endpoint rotation happen above it, in
//! `chainsweep_core::Retry` and `chainsweep_core::EndpointPool`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use serde_json::Value;

use chainsweep_core::client::{ChainBlock, ChainClient, ChainTransaction};
use chainsweep_core::error::SweepError;

use crate::request::{EthCall, JsonRpcRequest, JsonRpcResponse};

/// `ChainClient` for a single JSON-RPC endpoint.
pub struct HttpChainClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpChainClient {
    /// Create a client for `url` with a per-request timeout.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, SweepError> {
        let url = url.into();
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SweepError::Config(format!("cannot build HTTP client for {url}: {e}")))?;

        Ok(Self {
            url,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    fn rpc_err(&self, message: impl Into<String>) -> SweepError {
        SweepError::Rpc {
            endpoint: self.url.clone(),
            message: message.into(),
        }
    }

    /// Send one request and return its `result` value.
    pub async fn call(&self, call: EthCall) -> Result<Value, SweepError> {
        let method = call.method();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, &call);
        tracing::trace!(url = %self.url, method, id, "sending request");

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| self.rpc_err(format!("{method}: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(self.rpc_err(format!("{method}: HTTP {status}: {body}")));
        }

        let body = resp
            .json::<JsonRpcResponse>()
            .await
            .map_err(|e| self.rpc_err(format!("{method}: invalid response: {e}")))?;

        body.into_result(&self.url, method)
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn chain_head(&self) -> Result<u64, SweepError> {
        let v = self.call(EthCall::BlockNumber).await?;
        let s = v
            .as_str()
            .ok_or_else(|| self.rpc_err(format!("eth_blockNumber: expected hex string, got {v}")))?;
        parse_hex_u64(s).map_err(|e| self.rpc_err(format!("eth_blockNumber: {e}")))
    }

    async fn block_by_number(&self, number: u64) -> Result<ChainBlock, SweepError> {
        let v = self.call(EthCall::BlockByNumber(number)).await?;
        if v.is_null() {
            return Err(self.rpc_err(format!("block {number} not available")));
        }
        block_from_json(&v).map_err(|e| self.rpc_err(format!("block {number}: {e}")))
    }

    async fn balance(&self, address: &str) -> Result<BigUint, SweepError> {
        let v = self.call(EthCall::Balance(address.to_string())).await?;
        let s = v
            .as_str()
            .ok_or_else(|| self.rpc_err(format!("eth_getBalance: expected hex string, got {v}")))?;
        parse_hex_biguint(s).map_err(|e| self.rpc_err(format!("eth_getBalance({address}): {e}")))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

// ─── Hex / JSON helpers ──────────────────────────────────────────────────────

fn strip_hex(s: &str) -> Result<&str, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() {
        return Err(format!("empty hex quantity '{s}'"));
    }
    Ok(digits)
}

/// Parse a `0x`-prefixed hex quantity into a `u64`.
pub fn parse_hex_u64(s: &str) -> Result<u64, String> {
    let digits = strip_hex(s)?;
    u64::from_str_radix(digits, 16).map_err(|e| format!("bad hex quantity '{s}': {e}"))
}

/// Parse a `0x`-prefixed hex quantity of any width.
pub fn parse_hex_biguint(s: &str) -> Result<BigUint, String> {
    let digits = strip_hex(s)?;
    BigUint::parse_bytes(digits.as_bytes(), 16).ok_or_else(|| format!("bad hex quantity '{s}'"))
}

/// Convert an `eth_getBlockByNumber(_, true)` result into a [`ChainBlock`].
pub fn block_from_json(v: &Value) -> Result<ChainBlock, String> {
    let number = v["number"]
        .as_str()
        .ok_or("missing block number")
        .and_then(|s| parse_hex_u64(s).map_err(|_| "bad block number"))
        .map_err(String::from)?;
    let miner = v["miner"].as_str().ok_or("missing miner")?.to_string();

    let mut transactions = Vec::new();
    if let Some(txs) = v["transactions"].as_array() {
        for tx in txs {
            if !tx.is_object() {
                return Err("transactions are hashes, not objects".into());
            }
            let from = tx["from"].as_str().ok_or("transaction without sender")?;
            transactions.push(ChainTransaction {
                from: from.to_string(),
                to: tx["to"].as_str().map(String::from),
            });
        }
    }

    Ok(ChainBlock {
        number,
        miner,
        transactions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn hex_quantities() {
        assert_eq!(parse_hex_u64("0x1"), Ok(1));
        assert_eq!(parse_hex_u64("0xff"), Ok(255));
        assert_eq!(parse_hex_u64("1234"), Ok(0x1234));
        assert!(parse_hex_u64("0x").is_err());
        assert!(parse_hex_u64("0xzz").is_err());

        // 1e30 wei does not fit in u64
        let big = parse_hex_biguint("0xc9f2c9cd04674edea40000000").unwrap();
        assert_eq!(big.to_string(), "1000000000000000000000000000000");
        assert_eq!(parse_hex_biguint("0x0").unwrap(), BigUint::default());
    }

    #[test]
    fn block_participants_from_json() {
        let v = json!({
            "number": "0x64",
            "miner": "0xminer",
            "transactions": [
                {"from": "0xa", "to": "0xb", "value": "0x1"},
                {"from": "0xc", "to": null}
            ]
        });
        let block = block_from_json(&v).unwrap();
        assert_eq!(block.number, 100);
        assert_eq!(block.participants(), vec!["0xminer", "0xa", "0xb", "0xc"]);
    }

    #[test]
    fn hash_only_transactions_rejected() {
        let v = json!({"number": "0x1", "miner": "0xm", "transactions": ["0xdeadbeef"]});
        assert!(block_from_json(&v).is_err());
    }

    #[derive(Clone)]
    enum Reply {
        Result(Value),
        Error(i64, &'static str),
    }

    /// Minimal HTTP/1.1 JSON-RPC responder: answers each request by method,
    /// with a `null` result for methods it was not given.
    async fn serve(replies: Vec<(&'static str, Reply)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else { return };
                let replies = replies.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    let body = loop {
                        let n = sock.read(&mut chunk).await.unwrap();
                        if n == 0 {
                            return;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                        let text = String::from_utf8_lossy(&buf).to_string();
                        if let Some(split) = text.find("\r\n\r\n") {
                            let len = text[..split]
                                .lines()
                                .find_map(|l| {
                                    let l = l.to_ascii_lowercase();
                                    l.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap())
                                })
                                .unwrap_or(0);
                            if buf.len() >= split + 4 + len {
                                break text[split + 4..split + 4 + len].to_string();
                            }
                        }
                    };
                    let req: Value = serde_json::from_str(&body).unwrap();
                    let method = req["method"].as_str().unwrap();
                    let reply = replies
                        .iter()
                        .find(|(m, _)| *m == method)
                        .map(|(_, r)| r.clone())
                        .unwrap_or(Reply::Result(Value::Null));
                    let payload = match reply {
                        Reply::Result(result) => json!({"jsonrpc": "2.0", "id": req["id"], "result": result}),
                        Reply::Error(code, message) => json!({
                            "jsonrpc": "2.0",
                            "id": req["id"],
                            "error": {"code": code, "message": message}
                        }),
                    }
                    .to_string();
                    let reply = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        payload.len(),
                        payload
                    );
                    sock.write_all(reply.as_bytes()).await.unwrap();
                    sock.shutdown().await.ok();
                });
            }
        });
        format!("http://{addr}")
    }

    fn client(url: &str) -> HttpChainClient {
        HttpChainClient::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn speaks_json_rpc_over_http() {
        let url = serve(vec![
            ("eth_blockNumber", Reply::Result(json!("0x10"))),
            ("eth_getBalance", Reply::Result(json!("0xde0b6b3a7640000"))),
            (
                "eth_getBlockByNumber",
                Reply::Result(
                    json!({"number": "0x5", "miner": "0xm", "transactions": [{"from": "0xa", "to": "0xb"}]}),
                ),
            ),
        ])
        .await;
        let c = client(&url);

        assert_eq!(c.endpoint(), url);
        assert_eq!(c.chain_head().await.unwrap(), 16);
        assert_eq!(
            c.balance("0xa").await.unwrap(),
            BigUint::from(1_000_000_000_000_000_000u64)
        );
        let block = c.block_by_number(5).await.unwrap();
        assert_eq!(block.number, 5);
        assert_eq!(block.transactions.len(), 1);
    }

    #[tokio::test]
    async fn null_block_is_an_error() {
        let url = serve(vec![]).await;
        let err = client(&url).block_by_number(99).await.unwrap_err();
        assert!(matches!(err, SweepError::Rpc { .. }));
        assert!(err.to_string().contains("block 99"));
    }

    #[tokio::test]
    async fn rpc_error_object_maps_to_rpc_error() {
        let url = serve(vec![("eth_getBalance", Reply::Error(-32005, "limit exceeded"))]).await;
        let err = client(&url).balance("0xa").await.unwrap_err();
        match err {
            SweepError::Rpc { endpoint, message } => {
                assert_eq!(endpoint, url);
                assert!(message.contains("eth_getBalance"));
                assert!(message.contains("limit exceeded"));
            }
            other => panic!("expected Rpc, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_rpc_error() {
        // bind then drop to get a closed port
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let err = client(&format!("http://{addr}")).chain_head().await.unwrap_err();
        assert!(matches!(err, SweepError::Rpc { .. }));
    }
}
