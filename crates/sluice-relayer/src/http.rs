//! json-rpc adapter for the remote ledger
//!
//! transient failures are retried here with a short linear backoff so
//! the orchestration layer only sees errors that survived the retries.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::{RelayerError, Result};
use crate::rpc::{Address, Blockhash, Instruction, LedgerRpc, SignatureStatus, TxLogs};

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_STEP: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct HttpLedgerRpc {
    url: String,
    client: Client,
}

impl HttpLedgerRpc {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: Client::new(),
        }
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": "sluice",
            "method": method,
            "params": params,
        });

        let mut last_err = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.call_once(&payload).await {
                Ok(value) => return Ok(value),
                Err(RelayerError::Rpc(e)) if attempt < MAX_ATTEMPTS => {
                    debug!("rpc {} attempt {} failed: {}", method, attempt, e);
                    last_err = e;
                    tokio::time::sleep(BACKOFF_STEP * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(RelayerError::Rpc(format!(
            "{} failed after {} attempts: {}",
            method, MAX_ATTEMPTS, last_err
        )))
    }

    async fn call_once(&self, payload: &Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| RelayerError::Rpc(e.to_string()))?;

        let json: RpcResponse = response
            .json()
            .await
            .map_err(|e| RelayerError::Rpc(e.to_string()))?;

        if let Some(error) = json.error {
            return Err(RelayerError::Rpc(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }

        json.result
            .ok_or_else(|| RelayerError::Rpc("no result in response".into()))
    }
}

#[async_trait::async_trait]
impl LedgerRpc for HttpLedgerRpc {
    async fn read_account(&self, address: &Address) -> Result<Option<Vec<u8>>> {
        let result = self.call("getAccount", vec![json!(address.to_hex())]).await?;
        if result.is_null() {
            return Ok(None);
        }
        let account: AccountResponse =
            serde_json::from_value(result).map_err(|e| RelayerError::Rpc(e.to_string()))?;
        let data = BASE64
            .decode(&account.data)
            .map_err(|e| RelayerError::Rpc(e.to_string()))?;
        Ok(Some(data))
    }

    async fn logs_for_account(&self, address: &Address, limit: usize) -> Result<Vec<TxLogs>> {
        let result = self
            .call(
                "getAccountTransactions",
                vec![json!(address.to_hex()), json!(limit)],
            )
            .await?;
        let txs: Vec<TxResponse> =
            serde_json::from_value(result).map_err(|e| RelayerError::Rpc(e.to_string()))?;

        let mut out = Vec::with_capacity(txs.len());
        for tx in txs {
            let mut records = Vec::with_capacity(tx.records.len());
            for record in tx.records {
                records.push(
                    BASE64
                        .decode(&record)
                        .map_err(|e| RelayerError::Rpc(e.to_string()))?,
                );
            }
            out.push(TxLogs {
                signature: tx.signature,
                records,
            });
        }
        Ok(out)
    }

    async fn submit_instruction(
        &self,
        instruction: &Instruction,
        signature: &[u8; 64],
        signer: &Address,
    ) -> Result<String> {
        let encoded = bincode::serialize(instruction)
            .map_err(|e| RelayerError::Rpc(e.to_string()))?;
        let result = self
            .call(
                "submitInstruction",
                vec![json!({
                    "instruction": BASE64.encode(encoded),
                    "signature": hex::encode(signature),
                    "signer": signer.to_hex(),
                })],
            )
            .await?;
        serde_json::from_value(result).map_err(|e| RelayerError::Rpc(e.to_string()))
    }

    async fn signature_status(&self, signature: &str) -> Result<SignatureStatus> {
        let result = self
            .call("getSignatureStatus", vec![json!(signature)])
            .await?;
        let status: StatusResponse =
            serde_json::from_value(result).map_err(|e| RelayerError::Rpc(e.to_string()))?;
        Ok(match status.status.as_str() {
            "confirmed" => SignatureStatus::Confirmed,
            "failed" => SignatureStatus::Failed(status.error.unwrap_or_default()),
            _ => SignatureStatus::Pending,
        })
    }

    async fn block_height(&self) -> Result<u64> {
        let result = self.call("getBlockHeight", vec![]).await?;
        serde_json::from_value(result).map_err(|e| RelayerError::Rpc(e.to_string()))
    }

    async fn latest_blockhash(&self) -> Result<Blockhash> {
        let result = self.call("getLatestBlockhash", vec![]).await?;
        let response: BlockhashResponse =
            serde_json::from_value(result).map_err(|e| RelayerError::Rpc(e.to_string()))?;
        let bytes = hex::decode(&response.blockhash)
            .map_err(|e| RelayerError::Rpc(e.to_string()))?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| RelayerError::Rpc("blockhash must be 32 bytes".into()))?;
        Ok(Blockhash {
            hash,
            last_valid_height: response.last_valid_block_height,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    data: String,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    signature: String,
    #[serde(default)]
    records: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockhashResponse {
    blockhash: String,
    #[serde(rename = "lastValidBlockHeight")]
    last_valid_block_height: u64,
}
