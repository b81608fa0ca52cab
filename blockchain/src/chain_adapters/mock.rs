//! Adapter giả cho test, ghi lại mọi lần gọi

// External imports
use ethers::types::{Address, U256};

// Standard library imports
use std::{
    collections::HashMap,
    sync::Mutex,
};

// Third party imports
use async_trait::async_trait;

// Internal imports
use super::{RpcError, SolanaRpc, TriggerConstantRequest, TronApi, UiTokenAmount};
use crate::chain_adapters::evm::EvmRpc;

/// Loại call EVM đã ghi nhận
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvmCall {
    Native { endpoint: String, owner: Address },
    TokenBalance { endpoint: String, token: Address, owner: Address },
    Decimals { endpoint: String, token: Address },
}

impl EvmCall {
    pub fn endpoint(&self) -> &str {
        match self {
            EvmCall::Native { endpoint, .. }
            | EvmCall::TokenBalance { endpoint, .. }
            | EvmCall::Decimals { endpoint, .. } => endpoint,
        }
    }
}

type NativeFn = dyn Fn(&str, Address) -> Result<U256, RpcError> + Send + Sync;
type TokenFn = dyn Fn(&str, Address, Address) -> Result<U256, RpcError> + Send + Sync;
type DecimalsFn = dyn Fn(&str, Address) -> Result<u8, RpcError> + Send + Sync;

/// EVM giả: trả lời theo closure, mặc định 0
pub struct FakeEvmRpc {
    native: Box<NativeFn>,
    token: Box<TokenFn>,
    decimals: Box<DecimalsFn>,
    calls: Mutex<Vec<EvmCall>>,
}

impl Default for FakeEvmRpc {
    fn default() -> Self {
        Self {
            native: Box::new(|_, _| Ok(U256::zero())),
            token: Box::new(|_, _, _| Ok(U256::zero())),
            decimals: Box::new(|_, _| Ok(18)),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeEvmRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_native<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Address) -> Result<U256, RpcError> + Send + Sync + 'static,
    {
        self.native = Box::new(f);
        self
    }

    pub fn with_token<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Address, Address) -> Result<U256, RpcError> + Send + Sync + 'static,
    {
        self.token = Box::new(f);
        self
    }

    pub fn with_decimals<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Address) -> Result<u8, RpcError> + Send + Sync + 'static,
    {
        self.decimals = Box::new(f);
        self
    }

    pub fn calls(&self) -> Vec<EvmCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn native_calls(&self) -> Vec<EvmCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, EvmCall::Native { .. }))
            .collect()
    }

    pub fn decimals_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, EvmCall::Decimals { .. }))
            .count()
    }

    fn record(&self, call: EvmCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl EvmRpc for FakeEvmRpc {
    async fn native_balance(&self, endpoint: &str, owner: Address) -> Result<U256, RpcError> {
        self.record(EvmCall::Native {
            endpoint: endpoint.to_string(),
            owner,
        });
        (self.native)(endpoint, owner)
    }

    async fn token_balance(
        &self,
        endpoint: &str,
        token: Address,
        owner: Address,
    ) -> Result<U256, RpcError> {
        self.record(EvmCall::TokenBalance {
            endpoint: endpoint.to_string(),
            token,
            owner,
        });
        (self.token)(endpoint, token, owner)
    }

    async fn token_decimals(&self, endpoint: &str, token: Address) -> Result<u8, RpcError> {
        self.record(EvmCall::Decimals {
            endpoint: endpoint.to_string(),
            token,
        });
        (self.decimals)(endpoint, token)
    }
}

/// Tron giả
pub struct FakeTronApi {
    account: Result<u64, RpcError>,
    constant: HashMap<String, Result<String, RpcError>>,
    requests: Mutex<Vec<TriggerConstantRequest>>,
    account_calls: Mutex<Vec<String>>,
}

impl Default for FakeTronApi {
    fn default() -> Self {
        Self {
            account: Ok(0),
            constant: HashMap::new(),
            requests: Mutex::new(Vec::new()),
            account_calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeTronApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, result: Result<u64, RpcError>) -> Self {
        self.account = result;
        self
    }

    /// Kết quả `constant_result[0]` cho một contract
    pub fn with_constant(mut self, contract: &str, result: Result<String, RpcError>) -> Self {
        self.constant.insert(contract.to_string(), result);
        self
    }

    pub fn requests(&self) -> Vec<TriggerConstantRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn account_calls(&self) -> Vec<String> {
        self.account_calls.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TronApi for FakeTronApi {
    async fn account_balance(&self, address: &str) -> Result<u64, RpcError> {
        if let Ok(mut calls) = self.account_calls.lock() {
            calls.push(address.to_string());
        }
        self.account.clone()
    }

    async fn trigger_constant_contract(
        &self,
        request: &TriggerConstantRequest,
    ) -> Result<String, RpcError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.constant
            .get(&request.contract_address)
            .cloned()
            .unwrap_or_else(|| Ok(format!("{:0>64}", "0")))
    }
}

/// Solana giả
pub struct FakeSolanaRpc {
    balance: Result<u64, RpcError>,
    accounts: HashMap<String, Result<Vec<UiTokenAmount>, RpcError>>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeSolanaRpc {
    fn default() -> Self {
        Self {
            balance: Ok(0),
            accounts: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeSolanaRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, result: Result<u64, RpcError>) -> Self {
        self.balance = result;
        self
    }

    pub fn with_accounts(mut self, mint: &str, result: Result<Vec<UiTokenAmount>, RpcError>) -> Self {
        self.accounts.insert(mint.to_string(), result);
        self
    }

    /// Tên method đã gọi, theo thứ tự
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl SolanaRpc for FakeSolanaRpc {
    async fn get_balance(&self, address: &str) -> Result<u64, RpcError> {
        self.record(format!("getBalance:{}", address));
        self.balance.clone()
    }

    async fn token_accounts_by_mint(
        &self,
        owner: &str,
        mint: &str,
    ) -> Result<Vec<UiTokenAmount>, RpcError> {
        self.record(format!("getTokenAccountsByOwner:{}:{}", owner, mint));
        self.accounts.get(mint).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }
}
