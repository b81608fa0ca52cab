// Standard library imports
use std::{
    collections::HashSet,
    env,
    fs,
    path::Path,
    str::FromStr,
    time::Duration,
};

// Third party imports
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// Internal imports
use crate::error::{CommonError, CommonResult};

/// Biến môi trường trỏ tới file cấu hình JSON
pub const CONFIG_PATH_ENV: &str = "WALLETSCAN_CONFIG";

/// Token ERC-20 trên một chain EVM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Ký hiệu token (USDT, USDC, ...)
    pub symbol: String,
    /// Địa chỉ contract
    pub address: String,
    /// Số chữ số thập phân. `None` thì đọc `decimals()` on-chain
    #[serde(default)]
    pub decimals: Option<u8>,
}

impl TokenConfig {
    pub fn new(symbol: &str, address: &str, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            address: address.to_string(),
            decimals: Some(decimals),
        }
    }
}

/// Cấu hình một chain EVM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmChainConfig {
    /// Tên chain, dùng làm key trong kết quả (ETH, BNB, ...)
    pub name: String,
    /// Danh sách RPC endpoint, xoay vòng theo thứ tự
    pub endpoints: Vec<String>,
    /// Token ERC-20 cần kiểm tra trên chain này
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

impl EvmChainConfig {
    fn new(name: &str, endpoints: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
            tokens: Vec::new(),
        }
    }

    fn with_tokens(mut self, tokens: Vec<TokenConfig>) -> Self {
        self.tokens = tokens;
        self
    }
}

/// Cấu hình TronGrid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TronConfig {
    pub api_url: String,
    /// Contract TRC-20 USDT
    pub usdt_contract: String,
    /// Gửi qua header `TRON-PRO-API-KEY` nếu có
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Token SPL trên Solana
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplTokenConfig {
    pub symbol: String,
    pub mint: String,
}

/// Cấu hình Solana RPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolanaConfig {
    pub rpc_url: String,
    pub spl_tokens: Vec<SplTokenConfig>,
}

/// Cấu hình HTTP API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Token cố định. Mặc định sinh ngẫu nhiên mỗi lần khởi động
    #[serde(default)]
    pub token: Option<String>,
}

/// Cấu hình toàn bộ scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub evm_chains: Vec<EvmChainConfig>,
    pub tron: TronConfig,
    pub solana: SolanaConfig,
    /// Khoảng cách tối thiểu giữa hai RPC call bất kỳ (ms)
    pub min_request_interval_ms: u64,
    /// Timeout cho mỗi RPC call (giây)
    pub request_timeout_secs: u64,
    /// Số worker tối đa cho mỗi job
    pub max_workers: usize,
    pub api: ApiConfig,
    /// Thư mục ghi log xoay vòng theo ngày
    pub log_dir: Option<String>,
    /// Cổng Prometheus exporter
    pub metrics_port: Option<u16>,
}

impl ScannerConfig {
    pub fn new() -> Self {
        let evm_chains = vec![
            EvmChainConfig::new("ETH", &[
                "https://eth.llamarpc.com",
                "https://ethereum.publicnode.com",
            ])
            .with_tokens(vec![
                TokenConfig::new("USDT", "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6),
                TokenConfig::new("USDC", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6),
            ]),
            EvmChainConfig::new("BNB", &[
                "https://bsc-dataseed.binance.org/",
                "https://bsc-dataseed1.defibit.io/",
                "https://bsc-dataseed1.ninicoin.io/",
                "https://bsc-dataseed2.defibit.io/",
            ])
            .with_tokens(vec![
                TokenConfig::new("XRP", "0x1d2f0da169ceb9fc7b3144628db156f3f6c60dbe", 18),
                TokenConfig::new("USDT", "0x55d398326f99059fF775485246999027B3197955", 18),
                TokenConfig::new("USDC", "0x8ac76a51cc950d9822d68b83fe1ad97b32cd580d", 18),
            ]),
            EvmChainConfig::new("POLYGON", &["https://polygon-rpc.com"]).with_tokens(vec![
                TokenConfig::new("USDC", "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174", 6),
            ]),
            EvmChainConfig::new("AVAX", &["https://api.avax.network/ext/bc/C/rpc"]),
            EvmChainConfig::new("ARBITRUM", &["https://arb1.arbitrum.io/rpc"]),
            EvmChainConfig::new("OPTIMISM", &["https://mainnet.optimism.io"]),
            EvmChainConfig::new("BASE", &["https://mainnet.base.org"]),
            EvmChainConfig::new("FANTOM", &["https://rpcapi.fantom.network"]),
            EvmChainConfig::new("CRONOS", &["https://evm.cronos.org"]),
            EvmChainConfig::new("HARMONY", &["https://api.harmony.one"]),
        ];

        Self {
            evm_chains,
            tron: TronConfig {
                api_url: "https://api.trongrid.io".to_string(),
                usdt_contract: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".to_string(),
                api_key: None,
            },
            solana: SolanaConfig {
                rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
                spl_tokens: vec![
                    SplTokenConfig {
                        symbol: "USDC".to_string(),
                        mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
                    },
                    SplTokenConfig {
                        symbol: "USDT".to_string(),
                        mint: "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB".to_string(),
                    },
                ],
            },
            min_request_interval_ms: 300,
            request_timeout_secs: 10,
            max_workers: 20,
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
                token: None,
            },
            log_dir: None,
            metrics_port: None,
        }
    }

    /// Đọc cấu hình từ file JSON, tạo file mặc định nếu chưa tồn tại
    pub fn from_file(path: &str) -> CommonResult<Self> {
        if !Path::new(path).exists() {
            let default_config = Self::new();
            default_config.save_to_file(path)?;
            info!("Created default config at {}", path);
            return Ok(default_config);
        }

        let contents = fs::read_to_string(path).map_err(|source| CommonError::ConfigIo {
            path: path.to_string(),
            source,
        })?;
        let config: ScannerConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> CommonResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        let io_err = |source| CommonError::ConfigIo {
            path: path.to_string(),
            source,
        };

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        fs::write(path, json).map_err(io_err)?;
        Ok(())
    }

    /// Tải cấu hình: `.env`, file `WALLETSCAN_CONFIG` (nếu có), rồi ghi đè bằng biến môi trường
    pub fn load() -> CommonResult<Self> {
        dotenv().ok();

        let mut config = match env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::new(),
        };
        config.apply_overrides(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Ghi đè các trường đơn lẻ từ nguồn key/value (thường là biến môi trường)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> CommonResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = parse_var(&lookup, "API_PORT")? {
            self.api.port = port;
        }
        if let Some(token) = lookup("APP_TOKEN") {
            self.api.token = Some(token);
        }
        if let Some(url) = lookup("TRONGRID_API") {
            self.tron.api_url = url;
        }
        if let Some(key) = lookup("TRON_API_KEY") {
            self.tron.api_key = Some(key);
        }
        if let Some(url) = lookup("SOLANA_RPC") {
            self.solana.rpc_url = url;
        }
        if let Some(ms) = parse_var(&lookup, "MIN_REQUEST_INTERVAL_MS")? {
            self.min_request_interval_ms = ms;
        }
        if let Some(secs) = parse_var(&lookup, "REQUEST_TIMEOUT_SECS")? {
            self.request_timeout_secs = secs;
        }
        if let Some(workers) = parse_var(&lookup, "MAX_WORKERS")? {
            self.max_workers = workers;
        }
        if let Some(dir) = lookup("LOG_DIR") {
            self.log_dir = Some(dir);
        }
        if let Some(port) = parse_var(&lookup, "METRICS_PORT")? {
            self.metrics_port = Some(port);
        }
        debug!("Applied environment overrides to scanner config");
        Ok(())
    }

    /// Kiểm tra tính hợp lệ của cấu hình
    pub fn validate(&self) -> CommonResult<()> {
        let mut seen = HashSet::new();
        for chain in &self.evm_chains {
            if chain.endpoints.is_empty() {
                return Err(CommonError::InvalidConfig(format!(
                    "chain {} has no RPC endpoints",
                    chain.name
                )));
            }
            if !seen.insert(chain.name.as_str()) {
                return Err(CommonError::InvalidConfig(format!(
                    "chain {} is configured twice",
                    chain.name
                )));
            }
        }
        if self.max_workers == 0 {
            return Err(CommonError::InvalidConfig("max_workers must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(CommonError::InvalidConfig(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> CommonResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CommonError::InvalidEnv {
                name: name.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ScannerConfig::default();
        assert_eq!(config.evm_chains.len(), 10);
        assert_eq!(config.evm_chains[1].name, "BNB");
        assert_eq!(config.evm_chains[1].endpoints.len(), 4);
        assert_eq!(config.evm_chains[1].tokens.len(), 3);
        assert_eq!(config.min_request_interval(), Duration::from_millis(300));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_workers, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("walletscan.json");
        let path = path.to_str().unwrap();

        let created = ScannerConfig::from_file(path).unwrap();
        assert!(Path::new(path).exists());

        let loaded = ScannerConfig::from_file(path).unwrap();
        assert_eq!(created, loaded);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{ "max_workers": 4, "evm_chains": [
            { "name": "ETH", "endpoints": ["http://localhost:8545"] }
        ] }"#)
        .unwrap();

        let config = ScannerConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.evm_chains.len(), 1);
        assert!(config.evm_chains[0].tokens.is_empty());
        assert_eq!(config.solana.spl_tokens.len(), 2);
    }

    #[test]
    fn test_validate_rejects_empty_endpoints() {
        let mut config = ScannerConfig::new();
        config.evm_chains[0].endpoints.clear();
        assert!(matches!(config.validate(), Err(CommonError::InvalidConfig(_))));

        let mut config = ScannerConfig::new();
        config.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let vars: HashMap<&str, &str> = [
            ("API_PORT", "8081"),
            ("SOLANA_RPC", "http://localhost:8899"),
            ("MIN_REQUEST_INTERVAL_MS", "0"),
            ("TRON_API_KEY", "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = ScannerConfig::new();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api.port, 8081);
        assert_eq!(config.solana.rpc_url, "http://localhost:8899");
        assert_eq!(config.min_request_interval_ms, 0);
        assert_eq!(config.tron.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_apply_overrides_rejects_garbage() {
        let mut config = ScannerConfig::new();
        let result = config.apply_overrides(|name| {
            (name == "MAX_WORKERS").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(CommonError::InvalidEnv { .. })));
    }
}
