//! JSON-RPC ledger client
//!
//! Requests are `{"method": ..., "params": [{...}]}` posted to the endpoint;
//! answers carry a `result` object whose `status` is `success` or `error`.

use std::time::Duration;

use async_trait::async_trait;
use relay_core::{AccountId, Hash256};
use relay_protocol::StateEntry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::error::{RelayError, Result};
use crate::ledger::{LedgerClient, ModuleExecution, SubmitResult, TransactionRecord};

/// Error code of a transaction the ledger does not know
const TXN_NOT_FOUND: &str = "txnNotFound";

/// Entries requested per `account_objects` page
const STATE_PAGE_LIMIT: u32 = 400;

#[derive(Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    params: [Value; 1],
}

#[derive(Deserialize)]
struct RpcEnvelope {
    result: Value,
}

#[derive(Deserialize)]
struct RpcFailure {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    engine_result: String,
    #[serde(default)]
    engine_result_message: String,
}

#[derive(Deserialize)]
struct AccountInfoResponse {
    account_data: AccountData,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccountData {
    sequence: u32,
}

#[derive(Deserialize)]
struct LedgerCurrentResponse {
    ledger_current_index: u32,
}

#[derive(Deserialize)]
struct AccountObjectsResponse {
    #[serde(default)]
    account_objects: Vec<StateObject>,
    #[serde(default)]
    marker: Option<Value>,
}

#[derive(Deserialize)]
struct StateObject {
    index: String,
    #[serde(rename = "HookStateData", default)]
    data: Option<String>,
}

#[derive(Deserialize)]
struct TxResponse {
    hash: String,
    #[serde(default)]
    validated: bool,
    #[serde(default)]
    ledger_index: Option<u32>,
    #[serde(default)]
    meta: Option<TxMeta>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TxMeta {
    #[serde(default)]
    transaction_result: Option<String>,
    #[serde(default)]
    hook_executions: Vec<HookExecutionWrapper>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HookExecutionWrapper {
    hook_execution: HookExecution,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HookExecution {
    hook_account: AccountId,
    #[serde(default)]
    hook_return_code: Option<Value>,
    #[serde(default)]
    hook_return_string: String,
    #[serde(default)]
    hook_result: Option<u8>,
}

/// Ledger reached over HTTP JSON-RPC
pub struct JsonRpcLedger {
    endpoint: String,
    client: reqwest::Client,
}

impl JsonRpcLedger {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Raw `result` object, with error statuses turned into `Err`
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        trace!(method, %params, "rpc request");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RpcRequest {
                method,
                params: [params],
            })
            .send()
            .await?
            .error_for_status()?;
        let envelope: RpcEnvelope = response.json().await?;
        check_status(method, envelope.result)
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let result = self.call(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }
}

fn check_status(method: &str, result: Value) -> Result<Value> {
    if result.get("status").and_then(Value::as_str) == Some("error") {
        let failure: RpcFailure = serde_json::from_value(result)?;
        return Err(RelayError::Rpc(match failure.error_message {
            Some(message) => format!("{}: {}: {}", method, failure.error, message),
            None => format!("{}: {}", method, failure.error),
        }));
    }
    Ok(result)
}

fn parse_return_code(value: Option<&Value>) -> Result<u64> {
    match value {
        None => Ok(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|v| v as u64))
            .ok_or_else(|| RelayError::Rpc(format!("bad HookReturnCode {}", n))),
        Some(Value::String(s)) => u64::from_str_radix(s, 16)
            .map_err(|e| RelayError::Rpc(format!("bad HookReturnCode {:?}: {}", s, e))),
        Some(other) => Err(RelayError::Rpc(format!("bad HookReturnCode {}", other))),
    }
}

/// Transaction record from a `tx` result
pub fn parse_transaction(result: Value) -> Result<TransactionRecord> {
    let tx: TxResponse = serde_json::from_value(result)?;
    let meta = tx.meta.unwrap_or(TxMeta {
        transaction_result: None,
        hook_executions: Vec::new(),
    });
    let executions = meta
        .hook_executions
        .into_iter()
        .map(|wrapper| {
            let exec = wrapper.hook_execution;
            Ok(ModuleExecution {
                account: exec.hook_account,
                return_code: parse_return_code(exec.hook_return_code.as_ref())?,
                return_string_hex: exec.hook_return_string,
                result: exec.hook_result,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(TransactionRecord {
        id: Hash256::from_hex(&tx.hash)?,
        validated: tx.validated,
        ledger_index: tx.ledger_index,
        result: meta.transaction_result,
        executions,
    })
}

fn parse_state_object(object: StateObject) -> Result<StateEntry> {
    Ok(StateEntry {
        key: Hash256::from_hex(&object.index)?,
        value: match object.data {
            Some(data) => hex::decode(&data).map_err(|e| RelayError::Rpc(format!("bad HookStateData: {}", e)))?,
            None => Vec::new(),
        },
    })
}

#[async_trait]
impl LedgerClient for JsonRpcLedger {
    async fn submit(&self, blob: &[u8]) -> Result<SubmitResult> {
        let response: SubmitResponse = self
            .request("submit", json!({ "tx_blob": hex::encode_upper(blob) }))
            .await?;
        debug!(code = %response.engine_result, "submitted");
        Ok(SubmitResult {
            code: response.engine_result,
            message: response.engine_result_message,
        })
    }

    async fn fetch_transaction(&self, id: &Hash256) -> Result<Option<TransactionRecord>> {
        match self
            .call("tx", json!({ "transaction": id.to_hex(), "binary": false }))
            .await
        {
            Ok(result) => parse_transaction(result).map(Some),
            Err(RelayError::Rpc(message)) if message.contains(TXN_NOT_FOUND) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_account_state(&self, account: &AccountId) -> Result<Vec<StateEntry>> {
        let mut entries = Vec::new();
        let mut marker: Option<Value> = None;
        loop {
            let mut params = json!({
                "account": account.to_address(),
                "type": "hook_state",
                "limit": STATE_PAGE_LIMIT,
                "ledger_index": "validated",
            });
            if let Some(m) = marker.take() {
                params["marker"] = m;
            }
            let page: AccountObjectsResponse = self.request("account_objects", params).await?;
            for object in page.account_objects {
                entries.push(parse_state_object(object)?);
            }
            match page.marker {
                Some(m) => marker = Some(m),
                None => break,
            }
        }
        debug!(%account, entries = entries.len(), "fetched module state");
        Ok(entries)
    }

    async fn account_sequence(&self, account: &AccountId) -> Result<u32> {
        let info: AccountInfoResponse = self
            .request(
                "account_info",
                json!({ "account": account.to_address(), "ledger_index": "current" }),
            )
            .await?;
        Ok(info.account_data.sequence)
    }

    async fn current_ledger(&self) -> Result<u32> {
        let response: LedgerCurrentResponse = self.request("ledger_current", json!({})).await?;
        Ok(response.ledger_current_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";

    #[test]
    fn test_parse_transaction() {
        let result = json!({
            "hash": "AB".repeat(32),
            "validated": true,
            "ledger_index": 812,
            "meta": {
                "TransactionResult": "tesSUCCESS",
                "HookExecutions": [{
                    "HookExecution": {
                        "HookAccount": MODULE,
                        "HookReturnCode": "0",
                        "HookReturnString": hex::encode_upper("Liteacc: [2] User balance is 1"),
                        "HookResult": 3
                    }
                }]
            }
        });
        let record = parse_transaction(result).unwrap();
        assert!(record.validated);
        assert_eq!(record.ledger_index, Some(812));
        assert_eq!(record.result.as_deref(), Some("tesSUCCESS"));
        assert_eq!(record.executions.len(), 1);
        assert_eq!(record.executions[0].account, MODULE.parse().unwrap());
        assert_eq!(record.executions[0].result, Some(3));
    }

    #[test]
    fn test_parse_pending_transaction() {
        let record = parse_transaction(json!({ "hash": "00".repeat(32) })).unwrap();
        assert!(!record.validated);
        assert!(record.executions.is_empty());
    }

    #[test]
    fn test_return_code_forms() {
        assert_eq!(parse_return_code(None).unwrap(), 0);
        assert_eq!(parse_return_code(Some(&json!("82"))).unwrap(), 0x82);
        assert_eq!(parse_return_code(Some(&json!(130))).unwrap(), 130);
        assert!(parse_return_code(Some(&json!("zz"))).is_err());
    }

    #[test]
    fn test_error_status() {
        let err = check_status(
            "tx",
            json!({ "status": "error", "error": "txnNotFound", "error_message": "Transaction not found." }),
        )
        .unwrap_err();
        match err {
            RelayError::Rpc(message) => assert!(message.contains(TXN_NOT_FOUND)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(check_status("tx", json!({ "status": "success" })).is_ok());
    }

    #[test]
    fn test_state_object() {
        let entry = parse_state_object(StateObject {
            index: "11".repeat(32),
            data: Some("0000000A".to_string()),
        })
        .unwrap();
        assert_eq!(entry.key, Hash256::new([0x11; 32]));
        assert_eq!(entry.value, vec![0, 0, 0, 10]);
    }

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(RpcRequest {
            method: "ledger_current",
            params: [json!({})],
        })
        .unwrap();
        assert_eq!(body, json!({ "method": "ledger_current", "params": [{}] }));
    }
}
