// Modules
pub mod config;
pub mod error;
pub mod logger;
pub mod rate_limit;

// Re-exports
pub use config::{
    ApiConfig, EvmChainConfig, ScannerConfig, SolanaConfig, SplTokenConfig, TokenConfig,
    TronConfig,
};
pub use error::{CommonError, CommonResult};
pub use logger::init_logging;
pub use rate_limit::{IntervalRateLimiter, NoopRateLimiter, RateLimiter};
