// Standard library imports
use std::time::Duration;

// Third party imports
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::debug;

// Internal imports
use super::RpcError;

/// Header API key của TronGrid
const API_KEY_HEADER: &str = "tron-pro-api-key";

/// Body của `POST /wallet/triggerconstantcontract`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConstantRequest {
    pub owner_address: String,
    pub contract_address: String,
    pub function_selector: String,
    pub parameter: String,
    pub visible: bool,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    data: Vec<AccountData>,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    #[serde(default)]
    balance: u64,
}

#[derive(Debug, Deserialize)]
struct ConstantResponse {
    #[serde(default)]
    constant_result: Vec<String>,
}

/// REST API của Tron
#[async_trait]
pub trait TronApi: Send + Sync + 'static {
    /// Số dư TRX (sun). Tài khoản không có dữ liệu trả về `RpcError::NotFound`
    async fn account_balance(&self, address: &str) -> Result<u64, RpcError>;

    /// Gọi hàm view của contract, trả về `constant_result[0]` dạng hex
    async fn trigger_constant_contract(
        &self,
        request: &TriggerConstantRequest,
    ) -> Result<String, RpcError>;
}

/// Client TronGrid qua reqwest
pub struct TronGridClient {
    http: reqwest::Client,
    api_url: String,
}

impl TronGridClient {
    pub fn new(api_url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self, RpcError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = api_key {
            let value = reqwest::header::HeaderValue::from_str(key)
                .map_err(|e| RpcError::Network(format!("invalid TronGrid API key: {}", e)))?;
            headers.insert(API_KEY_HEADER, value);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| RpcError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TronApi for TronGridClient {
    async fn account_balance(&self, address: &str) -> Result<u64, RpcError> {
        let url = format!("{}/v1/accounts/{}", self.api_url, address);
        debug!("GET {}", url);
        counter!("rpc_calls_total", 1, "family" => "tron");

        let response: AccountsResponse = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .data
            .first()
            .map(|account| account.balance)
            .ok_or_else(|| RpcError::NotFound(format!("no account data for {}", address)))
    }

    async fn trigger_constant_contract(
        &self,
        request: &TriggerConstantRequest,
    ) -> Result<String, RpcError> {
        let url = format!("{}/wallet/triggerconstantcontract", self.api_url);
        debug!("POST {} ({})", url, request.function_selector);
        counter!("rpc_calls_total", 1, "family" => "tron");

        let response: ConstantResponse = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .constant_result
            .into_iter()
            .next()
            .ok_or_else(|| RpcError::MalformedResponse("missing constant_result".to_string()))
    }
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounts_response_parsing() {
        let body = r#"{"data":[{"balance":1000000,"address":"41..."}],"success":true}"#;
        let parsed: AccountsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].balance, 1_000_000);

        let empty: AccountsResponse = serde_json::from_str(r#"{"data":[],"success":true}"#).unwrap();
        assert!(empty.data.is_empty());

        let no_balance: AccountsResponse = serde_json::from_str(r#"{"data":[{}]}"#).unwrap();
        assert_eq!(no_balance.data[0].balance, 0);
    }

    #[test]
    fn test_constant_response_parsing() {
        let body = r#"{"result":{"result":true},"constant_result":["00000000000000000000000000000000000000000000000000000000002625a0"]}"#;
        let parsed: ConstantResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.constant_result.len(), 1);
    }

    #[test]
    fn test_request_serialization() {
        let request = TriggerConstantRequest {
            owner_address: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".to_string(),
            contract_address: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".to_string(),
            function_selector: "balanceOf(address)".to_string(),
            parameter: "00".to_string(),
            visible: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["function_selector"], "balanceOf(address)");
        assert_eq!(json["visible"], true);
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client =
            TronGridClient::new("https://api.trongrid.io/", Some("key"), Duration::from_secs(10))
                .unwrap();
        assert_eq!(client.api_url, "https://api.trongrid.io");
    }
}
