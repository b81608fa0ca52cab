// Standard library imports
use std::time::Duration;

// Third party imports
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

// Internal imports
use super::RpcError;

/// `tokenAmount` của một token account (encoding jsonParsed)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    #[serde(default)]
    pub ui_amount: Option<f64>,
    /// Số lượng nguyên dạng chuỗi
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub decimals: Option<u8>,
}

impl UiTokenAmount {
    /// Giá trị thập phân: `uiAmount`, không có thì `amount / 10^decimals`
    pub fn value(&self) -> f64 {
        if let Some(ui_amount) = self.ui_amount {
            return ui_amount;
        }

        let raw = self
            .amount
            .as_deref()
            .and_then(|a| a.parse::<f64>().ok())
            .unwrap_or(0.0);
        raw / 10f64.powi(self.decimals.unwrap_or(0) as i32)
    }
}

/// JSON-RPC của Solana
#[async_trait]
pub trait SolanaRpc: Send + Sync + 'static {
    /// `getBalance` (lamports)
    async fn get_balance(&self, address: &str) -> Result<u64, RpcError>;

    /// `getTokenAccountsByOwner` lọc theo mint
    async fn token_accounts_by_mint(
        &self,
        owner: &str,
        mint: &str,
    ) -> Result<Vec<UiTokenAmount>, RpcError>;
}

/// Client Solana JSON-RPC qua reqwest
pub struct SolanaRpcClient {
    http: reqwest::Client,
    rpc_url: String,
}

impl SolanaRpcClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            rpc_url: rpc_url.to_string(),
        })
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        debug!("Solana RPC {}", method);
        counter!("rpc_calls_total", 1, "family" => "solana");

        let response: Value = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        extract_result(response)
    }
}

/// Lấy trường `result` của phản hồi JSON-RPC
fn extract_result(mut response: Value) -> Result<Value, RpcError> {
    if let Some(error) = response.get("error") {
        return Err(RpcError::classify(format!("Solana RPC error: {}", error)));
    }

    response
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| RpcError::MalformedResponse("missing 'result' field".to_string()))
}

/// Đọc `tokenAmount` từ kết quả `getTokenAccountsByOwner`
fn parse_token_accounts(result: &Value) -> Result<Vec<UiTokenAmount>, RpcError> {
    let accounts = match result.get("value") {
        Some(Value::Array(accounts)) => accounts,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(other) => {
            return Err(RpcError::MalformedResponse(format!(
                "unexpected token accounts value: {}",
                other
            )))
        }
    };

    accounts
        .iter()
        .map(|account| match account.pointer("/account/data/parsed/info/tokenAmount") {
            Some(amount) => serde_json::from_value(amount.clone())
                .map_err(|e| RpcError::MalformedResponse(format!("bad tokenAmount: {}", e))),
            None => Ok(UiTokenAmount::default()),
        })
        .collect()
}

#[async_trait]
impl SolanaRpc for SolanaRpcClient {
    async fn get_balance(&self, address: &str) -> Result<u64, RpcError> {
        let result = self.rpc_call("getBalance", json!([address])).await?;
        result
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| RpcError::MalformedResponse("failed to parse SOL balance".to_string()))
    }

    async fn token_accounts_by_mint(
        &self,
        owner: &str,
        mint: &str,
    ) -> Result<Vec<UiTokenAmount>, RpcError> {
        let result = self
            .rpc_call(
                "getTokenAccountsByOwner",
                json!([owner, { "mint": mint }, { "encoding": "jsonParsed" }]),
            )
            .await?;
        parse_token_accounts(&result)
    }
}
