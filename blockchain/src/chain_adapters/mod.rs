// Third party imports
use ethers::providers::ProviderError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Modules
pub mod evm;
pub mod solana;
pub mod tron;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-exports
pub use evm::{EthersRpc, EvmRpc};
pub use solana::{SolanaRpc, SolanaRpcClient, UiTokenAmount};
pub use tron::{TriggerConstantRequest, TronApi, TronGridClient};

/// Loại lỗi khi gọi RPC/REST
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcErrorKind {
    RateLimited,
    Timeout,
    Network,
    MalformedResponse,
    NotFound,
    Rpc,
    InvalidAddress,
}

/// Lỗi khi gọi endpoint của chain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Endpoint từ chối vì quá nhiều request (HTTP 429, "rate limit")
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Quá thời gian chờ
    #[error("timeout: {0}")]
    Timeout(String),
    /// Lỗi kết nối
    #[error("network error: {0}")]
    Network(String),
    /// Phản hồi không đúng định dạng
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// Không tìm thấy tài khoản/dữ liệu
    #[error("not found: {0}")]
    NotFound(String),
    /// Lỗi do node trả về
    #[error("rpc error: {0}")]
    Rpc(String),
    /// Địa chỉ không hợp lệ
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl RpcError {
    /// Phân loại lỗi từ chuỗi thông báo của node
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if is_rate_limit_message(&lower) {
            RpcError::RateLimited(message)
        } else if lower.contains("timed out") || lower.contains("timeout") {
            RpcError::Timeout(message)
        } else {
            RpcError::Rpc(message)
        }
    }

    pub fn kind(&self) -> RpcErrorKind {
        match self {
            RpcError::RateLimited(_) => RpcErrorKind::RateLimited,
            RpcError::Timeout(_) => RpcErrorKind::Timeout,
            RpcError::Network(_) => RpcErrorKind::Network,
            RpcError::MalformedResponse(_) => RpcErrorKind::MalformedResponse,
            RpcError::NotFound(_) => RpcErrorKind::NotFound,
            RpcError::Rpc(_) => RpcErrorKind::Rpc,
            RpcError::InvalidAddress(_) => RpcErrorKind::InvalidAddress,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RpcError::RateLimited(_))
    }
}

/// Dấu hiệu rate limit: HTTP 429 hoặc thông báo chứa "rate limit"
pub fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate limit") || lower.contains("429") || lower.contains("too many requests")
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return RpcError::Timeout(err.to_string());
        }
        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return RpcError::RateLimited(err.to_string());
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return RpcError::NotFound(err.to_string());
            }
            return RpcError::classify(err.to_string());
        }
        if err.is_decode() {
            return RpcError::MalformedResponse(err.to_string());
        }
        if is_rate_limit_message(&err.to_string()) {
            return RpcError::RateLimited(err.to_string());
        }
        RpcError::Network(err.to_string())
    }
}

impl From<ProviderError> for RpcError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::HTTPError(e) => e.into(),
            ProviderError::SerdeJson(e) => RpcError::MalformedResponse(e.to_string()),
            other => RpcError::classify(other.to_string()),
        }
    }
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        assert!(RpcError::classify("HTTP 429 Too Many Requests").is_rate_limited());
        assert!(RpcError::classify("Rate limit exceeded for this key").is_rate_limited());
        assert!(!RpcError::classify("execution reverted").is_rate_limited());
    }

    #[test]
    fn test_classify_timeout() {
        assert_eq!(
            RpcError::classify("operation timed out").kind(),
            RpcErrorKind::Timeout
        );
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&RpcErrorKind::MalformedResponse).unwrap(),
            "\"malformed_response\""
        );
    }
}
