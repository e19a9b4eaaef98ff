//! Minimal Ethereum JSON-RPC client over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("RPC {method} request failed: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("RPC {method} HTTP {status}: {body}")]
    Http {
        method: String,
        status: reqwest::StatusCode,
        body: String,
    },
    /// JSON-RPC `error` member, including contract reverts.
    #[error("RPC {method} error {code}: {message}")]
    Node {
        method: String,
        code: i64,
        message: String,
        data: Option<String>,
    },
    #[error("RPC {method} malformed response: {reason}")]
    Malformed { method: String, reason: String },
}

impl RpcError {
    fn malformed(method: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

/// Receipt of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: B256,
    /// `None` while the node reports the transaction as not yet in a block.
    pub block_number: Option<u64>,
    pub status: bool,
    pub gas_used: u64,
    pub from: Address,
    pub to: Option<Address>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: String,
    block_number: Option<String>,
    status: Option<String>,
    gas_used: String,
    from: String,
    to: Option<String>,
}

impl TxReceipt {
    pub fn from_json(value: Value) -> Result<Self, String> {
        let raw: RawReceipt =
            serde_json::from_value(value).map_err(|e| format!("invalid receipt: {e}"))?;
        let status = match raw.status.as_deref() {
            Some(status) => parse_hex_u64(status)? == 1,
            None => return Err("receipt has no status field".to_string()),
        };
        Ok(Self {
            transaction_hash: raw
                .transaction_hash
                .parse()
                .map_err(|e| format!("invalid transactionHash: {e}"))?,
            block_number: raw.block_number.as_deref().map(parse_hex_u64).transpose()?,
            status,
            gas_used: parse_hex_u64(&raw.gas_used)?,
            from: raw.from.parse().map_err(|e| format!("invalid from: {e}"))?,
            to: raw
                .to
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(|e| format!("invalid to: {e}"))?,
        })
    }
}

pub struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Every request is bounded by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RpcError::Client)?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });
        tracing::trace!(method, id, "rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| RpcError::Transport {
                method: method.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| RpcError::Transport {
            method: method.to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(RpcError::Http {
                method: method.to_string(),
                status,
                body,
            });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| RpcError::malformed(method, format!("invalid JSON: {e}")))?;
        extract_result(method, value)
    }

    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        let result = self.call("eth_chainId", json!([])).await?;
        quantity_u64("eth_chainId", &result)
    }

    /// Nonce including transactions still in the mempool.
    pub async fn get_transaction_count(&self, address: Address) -> Result<u64, RpcError> {
        let result = self
            .call(
                "eth_getTransactionCount",
                json!([format!("{address:#x}"), "pending"]),
            )
            .await?;
        quantity_u64("eth_getTransactionCount", &result)
    }

    pub async fn gas_price(&self) -> Result<u128, RpcError> {
        let result = self.call("eth_gasPrice", json!([])).await?;
        let value = result
            .as_str()
            .ok_or_else(|| RpcError::malformed("eth_gasPrice", format!("non-string: {result}")))?;
        parse_hex_u128(value).map_err(|reason| RpcError::malformed("eth_gasPrice", reason))
    }

    pub async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        data: &[u8],
    ) -> Result<u64, RpcError> {
        let result = self
            .call("eth_estimateGas", json!([call_object(Some(from), to, data)]))
            .await?;
        quantity_u64("eth_estimateGas", &result)
    }

    /// `eth_call` against the latest block.
    pub async fn eth_call(
        &self,
        from: Option<Address>,
        to: Address,
        data: &[u8],
    ) -> Result<Bytes, RpcError> {
        let result = self
            .call("eth_call", json!([call_object(from, to, data), "latest"]))
            .await?;
        let value = result
            .as_str()
            .ok_or_else(|| RpcError::malformed("eth_call", format!("non-string: {result}")))?;
        value
            .parse::<Bytes>()
            .map_err(|e| RpcError::malformed("eth_call", format!("invalid hex data: {e}")))
    }

    pub async fn send_raw_transaction(&self, raw_tx: &[u8]) -> Result<B256, RpcError> {
        let result = self
            .call(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw_tx))]),
            )
            .await?;
        result
            .as_str()
            .and_then(|hash| hash.parse().ok())
            .ok_or_else(|| {
                RpcError::malformed("eth_sendRawTransaction", format!("not a tx hash: {result}"))
            })
    }

    /// `None` until the node knows about the transaction's inclusion.
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TxReceipt>, RpcError> {
        let result = self
            .call("eth_getTransactionReceipt", json!([format!("{tx_hash:#x}")]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        TxReceipt::from_json(result)
            .map(Some)
            .map_err(|reason| RpcError::malformed("eth_getTransactionReceipt", reason))
    }
}

fn call_object(from: Option<Address>, to: Address, data: &[u8]) -> Value {
    let mut object = json!({
        "to": format!("{to:#x}"),
        "data": format!("0x{}", hex::encode(data)),
    });
    if let Some(from) = from {
        object["from"] = Value::String(format!("{from:#x}"));
    }
    object
}

fn extract_result(method: &str, mut value: Value) -> Result<Value, RpcError> {
    if let Some(err) = value.get("error").filter(|err| !err.is_null()) {
        return Err(RpcError::Node {
            method: method.to_string(),
            code: err.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
            data: err.get("data").map(|data| match data {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        });
    }
    match value.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(RpcError::malformed(method, "missing result field")),
    }
}

fn quantity_u64(method: &str, value: &Value) -> Result<u64, RpcError> {
    let text = value
        .as_str()
        .ok_or_else(|| RpcError::malformed(method, format!("non-string quantity: {value}")))?;
    parse_hex_u64(text).map_err(|reason| RpcError::malformed(method, reason))
}

pub fn parse_hex_u64(input: &str) -> Result<u64, String> {
    let value = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    if value.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(value, 16).map_err(|e| format!("invalid hex u64 '{input}': {e}"))
}

pub fn parse_hex_u128(input: &str) -> Result<u128, String> {
    let value = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    if value.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(value, 16).map_err(|e| format!("invalid hex u128 '{input}': {e}"))
}
