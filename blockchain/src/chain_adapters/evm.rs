// External imports
use ethers::{
    providers::{Http, Middleware, Provider},
    types::{Address, U256},
};

// Standard library imports
use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, RwLock},
    time::Duration,
};

// Third party imports
use async_trait::async_trait;
use metrics::counter;
use reqwest::Url;
use tracing::{debug, warn};

// Internal imports
use super::RpcError;
use crate::abi::Erc20;

/// Truy vấn số dư trên chain EVM qua một endpoint cụ thể.
///
/// Endpoint do caller chọn (xoay vòng ở tầng trên), adapter chỉ thực hiện call.
#[async_trait]
pub trait EvmRpc: Send + Sync + 'static {
    /// Số dư native (wei)
    async fn native_balance(&self, endpoint: &str, owner: Address) -> Result<U256, RpcError>;

    /// `balanceOf(owner)` của một token ERC-20
    async fn token_balance(
        &self,
        endpoint: &str,
        token: Address,
        owner: Address,
    ) -> Result<U256, RpcError>;

    /// `decimals()` của một token ERC-20
    async fn token_decimals(&self, endpoint: &str, token: Address) -> Result<u8, RpcError>;
}

/// Adapter EVM dùng ethers `Provider<Http>`, mỗi endpoint một provider dùng lại
pub struct EthersRpc {
    client: reqwest::Client,
    timeout: Duration,
    providers: RwLock<HashMap<String, Arc<Provider<Http>>>>,
}

impl EthersRpc {
    pub fn new(timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout,
            providers: RwLock::new(HashMap::new()),
        })
    }

    /// Lấy provider cho endpoint, tạo mới nếu chưa có
    fn provider(&self, endpoint: &str) -> Result<Arc<Provider<Http>>, RpcError> {
        if let Ok(providers) = self.providers.read() {
            if let Some(provider) = providers.get(endpoint) {
                return Ok(provider.clone());
            }
        }

        let url = Url::parse(endpoint)
            .map_err(|e| RpcError::Network(format!("invalid endpoint {}: {}", endpoint, e)))?;
        let provider = Arc::new(Provider::new(Http::new_with_client(url, self.client.clone())));

        match self.providers.write() {
            Ok(mut providers) => {
                let entry = providers
                    .entry(endpoint.to_string())
                    .or_insert_with(|| provider.clone());
                Ok(entry.clone())
            }
            Err(_) => {
                warn!("Provider cache lock poisoned, using uncached provider for {}", endpoint);
                Ok(provider)
            }
        }
    }

    async fn with_timeout<T, F>(&self, endpoint: &str, fut: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        counter!("rpc_calls_total", 1, "family" => "evm");
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::Timeout(format!(
                "{} did not answer within {:?}",
                endpoint, self.timeout
            ))),
        }
    }
}

#[async_trait]
impl EvmRpc for EthersRpc {
    async fn native_balance(&self, endpoint: &str, owner: Address) -> Result<U256, RpcError> {
        let provider = self.provider(endpoint)?;
        debug!("eth_getBalance {:?} via {}", owner, endpoint);

        self.with_timeout(endpoint, async move {
            provider.get_balance(owner, None).await.map_err(RpcError::from)
        })
        .await
    }

    async fn token_balance(
        &self,
        endpoint: &str,
        token: Address,
        owner: Address,
    ) -> Result<U256, RpcError> {
        let provider = self.provider(endpoint)?;
        debug!("balanceOf {:?} on token {:?} via {}", owner, token, endpoint);

        self.with_timeout(endpoint, async move {
            Erc20::new(token, provider)
                .balance_of(owner)
                .call()
                .await
                .map_err(|e| RpcError::classify(e.to_string()))
        })
        .await
    }

    async fn token_decimals(&self, endpoint: &str, token: Address) -> Result<u8, RpcError> {
        let provider = self.provider(endpoint)?;
        debug!("decimals() on token {:?} via {}", token, endpoint);

        self.with_timeout(endpoint, async move {
            Erc20::new(token, provider)
                .decimals()
                .call()
                .await
                .map_err(|e| RpcError::classify(e.to_string()))
        })
        .await
    }
}
