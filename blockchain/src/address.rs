// External imports
use ethers::types::Address;

// Standard library imports
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

// Third party imports
use serde::{Deserialize, Serialize};

// Internal imports
use crate::chain_adapters::RpcError;

/// Loại ví, xác định theo hình dạng địa chỉ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletFamily {
    /// Các chain tương thích EVM
    #[serde(rename = "EVM")]
    Evm,
    /// Tron
    #[serde(rename = "TRX")]
    Trx,
    /// Solana
    #[serde(rename = "SOL")]
    Sol,
    /// Không nhận dạng được
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl WalletFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletFamily::Evm => "EVM",
            WalletFamily::Trx => "TRX",
            WalletFamily::Sol => "SOL",
            WalletFamily::Unknown => "UNKNOWN",
        }
    }

    pub fn is_supported(&self) -> bool {
        *self != WalletFamily::Unknown
    }
}

impl Display for WalletFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phân loại địa chỉ ví. Không có I/O, không bao giờ lỗi.
///
/// Thứ tự ưu tiên: EVM (`0x` + 42 ký tự, hex hợp lệ), Tron (`T` + 34 ký tự),
/// Solana (32..=44 ký tự), còn lại là `Unknown`. Chuỗi có dạng EVM nhưng không
/// parse được thì trả về `Unknown` luôn, không thử các luật sau.
pub fn classify(address: &str) -> WalletFamily {
    let address = address.trim();
    let len = address.chars().count();

    if address.starts_with("0x") && len == 42 {
        return match parse_evm_address(address) {
            Ok(_) => WalletFamily::Evm,
            Err(_) => WalletFamily::Unknown,
        };
    }

    if address.starts_with('T') && len == 34 {
        return WalletFamily::Trx;
    }

    if (32..=44).contains(&len) {
        return WalletFamily::Sol;
    }

    WalletFamily::Unknown
}

/// Parse địa chỉ EVM dạng hex. Không kiểm tra checksum EIP-55.
pub fn parse_evm_address(address: &str) -> Result<Address, RpcError> {
    Address::from_str(address.trim())
        .map_err(|e| RpcError::InvalidAddress(format!("{}: {}", address, e)))
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_evm() {
        assert_eq!(classify("0x0000000000000000000000000000000000000000"), WalletFamily::Evm);
        assert_eq!(classify("0x742d35Cc6634C0532925a3b844Bc454e4438f44e"), WalletFamily::Evm);
        assert_eq!(classify("  0x742d35cc6634c0532925a3b844bc454e4438f44e\n"), WalletFamily::Evm);
    }

    #[test]
    fn test_invalid_evm_shape_is_unknown() {
        // 42 ký tự, bắt đầu bằng 0x nhưng không phải hex
        let bad = "0xZZZZ35Cc6634C0532925a3b844Bc454e4438f44e";
        assert_eq!(bad.len(), 42);
        assert_eq!(classify(bad), WalletFamily::Unknown);
    }

    #[test]
    fn test_classify_tron() {
        assert_eq!(classify("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t"), WalletFamily::Trx);
    }

    #[test]
    fn test_classify_solana() {
        assert_eq!(classify("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"), WalletFamily::Sol);
        assert_eq!(classify("11111111111111111111111111111111"), WalletFamily::Sol);
        // 34 ký tự nhưng không bắt đầu bằng T
        assert_eq!(classify("AR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t"), WalletFamily::Sol);
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify(""), WalletFamily::Unknown);
        assert_eq!(classify("   "), WalletFamily::Unknown);
        assert_eq!(classify("hello"), WalletFamily::Unknown);
        assert_eq!(classify("0x1234"), WalletFamily::Unknown);
        assert_eq!(classify(&"a".repeat(45)), WalletFamily::Unknown);
        assert_eq!(classify(&"a".repeat(31)), WalletFamily::Unknown);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let inputs = [
            "0x0000000000000000000000000000000000000000",
            "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t",
            "not an address",
            "ééééééééééééééééééééééééééééééééé",
        ];
        for input in inputs {
            assert_eq!(classify(input), classify(input));
        }
    }

    #[test]
    fn test_family_serialization() {
        assert_eq!(serde_json::to_string(&WalletFamily::Trx).unwrap(), "\"TRX\"");
        assert_eq!(WalletFamily::Evm.to_string(), "EVM");
        assert!(!WalletFamily::Unknown.is_supported());
    }
}
