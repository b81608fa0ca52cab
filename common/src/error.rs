// Standard library imports
use std::io;

// Third party imports
use thiserror::Error;

/// Lỗi chung của walletscan
#[derive(Debug, Error)]
pub enum CommonError {
    /// Lỗi đọc/ghi file cấu hình
    #[error("Config I/O error at {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: io::Error,
    },
    /// Lỗi phân tích cú pháp file cấu hình
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
    /// Giá trị cấu hình không hợp lệ
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    /// Biến môi trường không hợp lệ
    #[error("Invalid environment variable {name}: {value}")]
    InvalidEnv { name: String, value: String },
    /// Lỗi khởi tạo logging
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Kiểu kết quả chung
pub type CommonResult<T> = Result<T, CommonError>;

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_error_display() {
        let error = CommonError::InvalidConfig("no endpoints for ETH".to_string());
        assert_eq!(error.to_string(), "Invalid config: no endpoints for ETH");

        let error = CommonError::InvalidEnv {
            name: "API_PORT".to_string(),
            value: "abc".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid environment variable API_PORT: abc");
    }
}
