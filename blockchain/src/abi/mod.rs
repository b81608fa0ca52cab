// External imports
use ethers::{contract::abigen, types::U256};

// Internal imports
use crate::chain_adapters::RpcError;

// ERC-20 chỉ cần hai hàm view
abigen!(
    Erc20,
    r#"[
        function balanceOf(address account) external view returns (uint256)
        function decimals() external view returns (uint8)
    ]"#
);

/// Selector TRC-20 gửi lên TronGrid
pub const TRC20_BALANCE_OF: &str = "balanceOf(address)";

/// Độ dài một tham số ABI ở dạng hex
const ABI_WORD_HEX_LEN: usize = 64;

/// Mã hóa địa chỉ Tron thành tham số ABI cho `balanceOf(address)`.
///
/// Base58Check-decode, bỏ 1 byte version, lấy hex phần còn lại rồi đệm 0 bên trái
/// cho đủ 64 ký tự.
pub fn tron_address_parameter(address: &str) -> Result<String, RpcError> {
    let decoded = bs58::decode(address.trim())
        .with_check(None)
        .into_vec()
        .map_err(|e| RpcError::InvalidAddress(format!("{}: {}", address, e)))?;

    let body = decoded
        .get(1..)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| RpcError::InvalidAddress(format!("{}: empty payload", address)))?;

    Ok(format!("{:0>width$}", hex::encode(body), width = ABI_WORD_HEX_LEN))
}

/// Parse một word ABI dạng hex (big-endian, không dấu)
pub fn parse_uint_hex(word: &str) -> Result<U256, RpcError> {
    let word = word.trim().trim_start_matches("0x");
    if word.is_empty() {
        return Err(RpcError::MalformedResponse("empty constant_result".to_string()));
    }
    U256::from_str_radix(word, 16)
        .map_err(|e| RpcError::MalformedResponse(format!("invalid uint hex {}: {}", word, e)))
}

/// Đổi số nguyên đơn vị nhỏ nhất sang số thập phân
pub fn to_decimal(raw: U256, decimals: u8) -> f64 {
    let value = raw.to_string().parse::<f64>().unwrap_or(f64::MAX);
    value / 10f64.powi(decimals as i32)
}
