// External imports
use ethers::types::Address;

// Standard library imports
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, RwLock},
};

// Third party imports
use async_trait::async_trait;
use futures::future::join_all;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

// Internal imports
use walletscan_blockchain::{
    abi::{parse_uint_hex, to_decimal, tron_address_parameter, TRC20_BALANCE_OF},
    classify, parse_evm_address, EndpointPool, EthersRpc, EvmRpc, RpcError, SolanaRpc,
    SolanaRpcClient, TriggerConstantRequest, TronApi, TronGridClient, UiTokenAmount,
    WalletFamily,
};
use walletscan_common::{
    CommonError, IntervalRateLimiter, RateLimiter, ScannerConfig, SplTokenConfig,
};

use crate::balance::{
    BalanceItem, EvmBalances, FamilyBalances, SolanaBalances, TronBalances, WalletResult,
};

const EVM_NATIVE_DECIMALS: u8 = 18;
const TRX_DECIMALS: u8 = 6;
const TRC20_USDT_DECIMALS: u8 = 6;
const LAMPORTS_PER_SOL: f64 = 1e9;

/// Lỗi ở mức địa chỉ (không phải lỗi của từng balance item)
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("client error: {0}")]
    Client(#[from] RpcError),
}

impl From<CommonError> for ResolveError {
    fn from(err: CommonError) -> Self {
        ResolveError::Config(err.to_string())
    }
}

/// Tra cứu số dư của một địa chỉ
#[async_trait]
pub trait WalletResolver: Send + Sync + 'static {
    async fn get_balance(&self, address: &str) -> Result<WalletResult, ResolveError>;
}

/// Token ERC-20 đã parse địa chỉ
#[derive(Debug, Clone)]
struct EvmToken {
    symbol: String,
    address: Address,
    decimals: Option<u8>,
}

/// Một chain EVM: pool endpoint và token
#[derive(Debug)]
struct EvmChain {
    pool: EndpointPool,
    tokens: Vec<EvmToken>,
}

impl EvmChain {
    fn name(&self) -> &str {
        self.pool.chain()
    }
}

/// Resolver số dư cho EVM, Tron và Solana.
///
/// Mọi call ra ngoài đều chờ lượt từ rate limiter dùng chung trước khi gửi.
pub struct BalanceResolver {
    limiter: Arc<dyn RateLimiter>,
    evm: Arc<dyn EvmRpc>,
    tron: Arc<dyn TronApi>,
    solana: Arc<dyn SolanaRpc>,
    chains: Vec<EvmChain>,
    tron_usdt_contract: String,
    spl_tokens: Vec<SplTokenConfig>,
    decimals_cache: RwLock<HashMap<(String, Address), u8>>,
}

impl BalanceResolver {
    /// Tạo resolver với adapter cho trước
    pub fn new(
        config: &ScannerConfig,
        limiter: Arc<dyn RateLimiter>,
        evm: Arc<dyn EvmRpc>,
        tron: Arc<dyn TronApi>,
        solana: Arc<dyn SolanaRpc>,
    ) -> Result<Self, ResolveError> {
        let mut chains = Vec::with_capacity(config.evm_chains.len());
        for chain in &config.evm_chains {
            let tokens = chain
                .tokens
                .iter()
                .map(|token| {
                    let address = parse_evm_address(&token.address).map_err(|e| {
                        ResolveError::Config(format!(
                            "token {} on {}: {}",
                            token.symbol, chain.name, e
                        ))
                    })?;
                    Ok(EvmToken {
                        symbol: token.symbol.clone(),
                        address,
                        decimals: token.decimals,
                    })
                })
                .collect::<Result<Vec<_>, ResolveError>>()?;

            chains.push(EvmChain {
                pool: EndpointPool::new(chain.name.clone(), chain.endpoints.clone())?,
                tokens,
            });
        }

        Ok(Self {
            limiter,
            evm,
            tron,
            solana,
            chains,
            tron_usdt_contract: config.tron.usdt_contract.clone(),
            spl_tokens: config.solana.spl_tokens.clone(),
            decimals_cache: RwLock::new(HashMap::new()),
        })
    }

    /// Tạo resolver với client thật từ cấu hình
    pub fn from_config(config: &ScannerConfig) -> Result<Self, ResolveError> {
        let timeout = config.request_timeout();
        let limiter = Arc::new(IntervalRateLimiter::new(config.min_request_interval()));
        let evm = Arc::new(EthersRpc::new(timeout)?);
        let tron = Arc::new(TronGridClient::new(
            &config.tron.api_url,
            config.tron.api_key.as_deref(),
            timeout,
        )?);
        let solana = Arc::new(SolanaRpcClient::new(&config.solana.rpc_url, timeout)?);

        info!(
            "Balance resolver ready: {} EVM chains, {} SPL tokens, interval {:?}",
            config.evm_chains.len(),
            config.solana.spl_tokens.len(),
            limiter.min_interval()
        );
        Self::new(config, limiter, evm, tron, solana)
    }

    /// Tên các chain EVM theo thứ tự cấu hình
    pub fn evm_chains(&self) -> Vec<&str> {
        self.chains.iter().map(EvmChain::name).collect()
    }

    fn record_failure(family: &'static str, symbol: &str, err: RpcError) -> BalanceItem {
        counter!("balance_fetch_failed_total", 1, "family" => family);
        warn!("{} {} balance failed: {}", family, symbol, err);
        BalanceItem::failed(symbol, err)
    }

    // ---- EVM ----

    async fn resolve_evm(&self, address: &str) -> Result<FamilyBalances, ResolveError> {
        let owner = parse_evm_address(address).map_err(|e| ResolveError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

        let per_chain = join_all(self.chains.iter().map(|chain| async move {
            let native = self.evm_native(chain, owner).await;
            let mut tokens = BTreeMap::new();
            for token in &chain.tokens {
                let item = self.evm_token(chain, token, owner).await;
                tokens.insert(token.symbol.clone(), item);
            }
            (chain.name().to_string(), native, tokens)
        }))
        .await;

        let mut balances = EvmBalances::default();
        for (chain, native, tokens) in per_chain {
            balances.native.insert(chain.clone(), native);
            if !tokens.is_empty() {
                balances.tokens.insert(chain, tokens);
            }
        }
        Ok(FamilyBalances::Evm(balances))
    }

    /// Số dư native, thử tối đa `len(endpoints)` lần, chỉ tiếp tục khi bị rate limit
    async fn evm_native(&self, chain: &EvmChain, owner: Address) -> BalanceItem {
        let mut last_error = None;

        for attempt in 1..=chain.pool.len() {
            self.limiter.await_turn().await;
            let endpoint = chain.pool.rotate();

            match self.evm.native_balance(endpoint, owner).await {
                Ok(wei) => {
                    return BalanceItem::success(chain.name(), to_decimal(wei, EVM_NATIVE_DECIMALS))
                }
                Err(e) if e.is_rate_limited() => {
                    counter!("rpc_rate_limited_total", 1, "chain" => chain.name().to_string());
                    debug!(
                        "{} rate limited on {} (attempt {}/{})",
                        chain.name(),
                        endpoint,
                        attempt,
                        chain.pool.len()
                    );
                    last_error = Some(e);
                }
                Err(e) => {
                    last_error = Some(e);
                    break;
                }
            }
        }

        let err = last_error.unwrap_or_else(|| RpcError::Rpc("no endpoint attempted".to_string()));
        Self::record_failure("evm", chain.name(), err)
    }

    /// Số dư token, mỗi call xoay sang endpoint kế tiếp, không retry
    async fn evm_token(&self, chain: &EvmChain, token: &EvmToken, owner: Address) -> BalanceItem {
        self.limiter.await_turn().await;
        let endpoint = chain.pool.rotate();

        let raw = match self.evm.token_balance(endpoint, token.address, owner).await {
            Ok(raw) => raw,
            Err(e) => {
                if e.is_rate_limited() {
                    counter!("rpc_rate_limited_total", 1, "chain" => chain.name().to_string());
                }
                return Self::record_failure("evm", &token.symbol, e);
            }
        };

        match self.token_decimals(chain, token).await {
            Ok(decimals) => BalanceItem::success(&token.symbol, to_decimal(raw, decimals)),
            Err(e) => Self::record_failure("evm", &token.symbol, e),
        }
    }

    /// Decimals cấu hình sẵn, không có thì gọi `decimals()` một lần rồi cache
    async fn token_decimals(&self, chain: &EvmChain, token: &EvmToken) -> Result<u8, RpcError> {
        if let Some(decimals) = token.decimals {
            return Ok(decimals);
        }

        let key = (chain.name().to_string(), token.address);
        let cached = self
            .decimals_cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&key).copied());
        if let Some(decimals) = cached {
            return Ok(decimals);
        }

        self.limiter.await_turn().await;
        let endpoint = chain.pool.rotate();
        let decimals = self.evm.token_decimals(endpoint, token.address).await?;

        if let Ok(mut cache) = self.decimals_cache.write() {
            cache.insert(key, decimals);
        }
        debug!("{} {} decimals = {}", chain.name(), token.symbol, decimals);
        Ok(decimals)
    }

    // ---- Tron ----

    async fn resolve_tron(&self, address: &str) -> FamilyBalances {
        let native = self.tron_native(address).await;
        let usdt = self.tron_usdt(address).await;

        let mut tokens = BTreeMap::new();
        tokens.insert("USDT".to_string(), usdt);
        FamilyBalances::Tron(TronBalances { native, tokens })
    }

    async fn tron_native(&self, address: &str) -> BalanceItem {
        self.limiter.await_turn().await;
        match self.tron.account_balance(address).await {
            Ok(sun) => BalanceItem::success("TRX", sun as f64 / 10f64.powi(TRX_DECIMALS as i32)),
            Err(e) => Self::record_failure("tron", "TRX", e),
        }
    }

    async fn tron_usdt(&self, address: &str) -> BalanceItem {
        let parameter = match tron_address_parameter(address) {
            Ok(parameter) => parameter,
            Err(e) => return Self::record_failure("tron", "USDT", e),
        };

        let request = TriggerConstantRequest {
            owner_address: address.to_string(),
            contract_address: self.tron_usdt_contract.clone(),
            function_selector: TRC20_BALANCE_OF.to_string(),
            parameter,
            visible: true,
        };

        self.limiter.await_turn().await;
        let result = self
            .tron
            .trigger_constant_contract(&request)
            .await
            .and_then(|word| parse_uint_hex(&word));

        match result {
            Ok(raw) => BalanceItem::success("USDT", to_decimal(raw, TRC20_USDT_DECIMALS)),
            Err(e) => Self::record_failure("tron", "USDT", e),
        }
    }

    // ---- Solana ----

    async fn resolve_solana(&self, address: &str) -> FamilyBalances {
        self.limiter.await_turn().await;
        let native = match self.solana.get_balance(address).await {
            Ok(lamports) => BalanceItem::success("SOL", lamports as f64 / LAMPORTS_PER_SOL),
            Err(e) => Self::record_failure("solana", "SOL", e),
        };

        let mut tokens = BTreeMap::new();
        for spl in &self.spl_tokens {
            self.limiter.await_turn().await;
            let item = match self.solana.token_accounts_by_mint(address, &spl.mint).await {
                Ok(accounts) => {
                    let total: f64 = accounts.iter().map(UiTokenAmount::value).sum();
                    if total > 0.0 {
                        BalanceItem::success(&spl.symbol, total)
                    } else {
                        BalanceItem::zero(&spl.symbol)
                    }
                }
                Err(e) => Self::record_failure("solana", &spl.symbol, e),
            };
            tokens.insert(spl.symbol.clone(), item);
        }

        FamilyBalances::Solana(SolanaBalances { native, tokens })
    }
}

#[async_trait]
impl WalletResolver for BalanceResolver {
    async fn get_balance(&self, address: &str) -> Result<WalletResult, ResolveError> {
        let address = address.trim();
        let family = classify(address);
        debug!("Resolving {} as {}", address, family);

        let balances = match family {
            WalletFamily::Evm => self.resolve_evm(address).await?,
            WalletFamily::Trx => self.resolve_tron(address).await,
            WalletFamily::Sol => self.resolve_solana(address).await,
            WalletFamily::Unknown => return Ok(WalletResult::unsupported(address)),
        };

        Ok(WalletResult::new(address, family, balances))
    }
}
