// Standard library imports
use std::collections::BTreeMap;

// Third party imports
use serde::{
    ser::{SerializeStruct, Serializer},
    Serialize,
};

// Internal imports
use walletscan_blockchain::{RpcError, RpcErrorKind, WalletFamily};

/// Loại lỗi của một balance item
pub type FetchErrorKind = RpcErrorKind;

/// Lỗi khi lấy một số dư
#[derive(Debug, Clone, PartialEq)]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl From<RpcError> for FetchError {
    fn from(err: RpcError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Trạng thái của một balance item
#[derive(Debug, Clone, PartialEq)]
pub enum BalanceStatus {
    Success,
    /// Không có token account nào khớp
    Zero,
    Error(FetchError),
}

impl BalanceStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, BalanceStatus::Error(_))
    }

    /// Dạng chuỗi: `success`, `zero` hoặc `error: <lý do>`
    pub fn label(&self) -> String {
        match self {
            BalanceStatus::Success => "success".to_string(),
            BalanceStatus::Zero => "zero".to_string(),
            BalanceStatus::Error(e) => format!("error: {}", e.message),
        }
    }
}

impl Serialize for BalanceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

/// Số dư của một tài sản (native hoặc token)
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceItem {
    pub symbol: String,
    /// Đơn vị thập phân (đã chia decimals)
    pub balance: f64,
    pub status: BalanceStatus,
}

impl BalanceItem {
    pub fn success(symbol: impl Into<String>, balance: f64) -> Self {
        Self {
            symbol: symbol.into(),
            balance,
            status: BalanceStatus::Success,
        }
    }

    pub fn zero(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            balance: 0.0,
            status: BalanceStatus::Zero,
        }
    }

    /// Item lỗi, số dư luôn là 0
    pub fn failed(symbol: impl Into<String>, error: impl Into<FetchError>) -> Self {
        Self {
            symbol: symbol.into(),
            balance: 0.0,
            status: BalanceStatus::Error(error.into()),
        }
    }

    pub fn is_positive(&self) -> bool {
        self.balance > 0.0
    }
}

impl Serialize for BalanceItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let error_kind = match &self.status {
            BalanceStatus::Error(e) => Some(e.kind),
            _ => None,
        };
        let fields = if error_kind.is_some() { 4 } else { 3 };

        let mut state = serializer.serialize_struct("BalanceItem", fields)?;
        state.serialize_field("symbol", &self.symbol)?;
        state.serialize_field("balance", &self.balance)?;
        state.serialize_field("status", &self.status)?;
        if let Some(kind) = error_kind {
            state.serialize_field("error_kind", &kind)?;
        }
        state.end()
    }
}

/// Trạng thái tổng của một ví
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallStatus {
    #[serde(rename = "success")]
    Success,
    /// Ít nhất một item lỗi
    #[serde(rename = "partial")]
    Partial,
    #[serde(rename = "error: unsupported type")]
    Unsupported,
}

/// Khả năng chung của mọi loại kết quả số dư
pub trait BalanceSheet {
    /// Toàn bộ item, native trước rồi tới token
    fn items(&self) -> Vec<&BalanceItem>;

    /// Có số dư nào > 0 không
    fn is_positive(&self) -> bool {
        self.items().iter().any(|item| item.is_positive())
    }

    fn overall_status(&self) -> OverallStatus {
        if self.items().iter().any(|item| item.status.is_error()) {
            OverallStatus::Partial
        } else {
            OverallStatus::Success
        }
    }
}

/// Kết quả ví EVM, key là tên chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvmBalances {
    pub native: BTreeMap<String, BalanceItem>,
    pub tokens: BTreeMap<String, BTreeMap<String, BalanceItem>>,
}

impl BalanceSheet for EvmBalances {
    fn items(&self) -> Vec<&BalanceItem> {
        self.native
            .values()
            .chain(self.tokens.values().flat_map(|t| t.values()))
            .collect()
    }
}

/// Kết quả ví Tron: TRX và token TRC-20
#[derive(Debug, Clone, PartialEq)]
pub struct TronBalances {
    pub native: BalanceItem,
    pub tokens: BTreeMap<String, BalanceItem>,
}

impl BalanceSheet for TronBalances {
    fn items(&self) -> Vec<&BalanceItem> {
        std::iter::once(&self.native)
            .chain(self.tokens.values())
            .collect()
    }
}

/// Kết quả ví Solana: SOL và token SPL
#[derive(Debug, Clone, PartialEq)]
pub struct SolanaBalances {
    pub native: BalanceItem,
    pub tokens: BTreeMap<String, BalanceItem>,
}

impl BalanceSheet for SolanaBalances {
    fn items(&self) -> Vec<&BalanceItem> {
        std::iter::once(&self.native)
            .chain(self.tokens.values())
            .collect()
    }
}

/// Kết quả theo loại ví
#[derive(Debug, Clone, PartialEq)]
pub enum FamilyBalances {
    Evm(EvmBalances),
    Tron(TronBalances),
    Solana(SolanaBalances),
    Unsupported,
}

impl BalanceSheet for FamilyBalances {
    fn items(&self) -> Vec<&BalanceItem> {
        match self {
            FamilyBalances::Evm(b) => b.items(),
            FamilyBalances::Tron(b) => b.items(),
            FamilyBalances::Solana(b) => b.items(),
            FamilyBalances::Unsupported => Vec::new(),
        }
    }

    fn overall_status(&self) -> OverallStatus {
        match self {
            FamilyBalances::Evm(b) => b.overall_status(),
            FamilyBalances::Tron(b) => b.overall_status(),
            FamilyBalances::Solana(b) => b.overall_status(),
            FamilyBalances::Unsupported => OverallStatus::Unsupported,
        }
    }
}

impl FamilyBalances {
    /// Số dư native theo chain/ký hiệu
    pub fn native(&self) -> BTreeMap<&str, &BalanceItem> {
        match self {
            FamilyBalances::Evm(b) => b.native.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            FamilyBalances::Tron(b) => BTreeMap::from([(b.native.symbol.as_str(), &b.native)]),
            FamilyBalances::Solana(b) => BTreeMap::from([(b.native.symbol.as_str(), &b.native)]),
            FamilyBalances::Unsupported => BTreeMap::new(),
        }
    }

    /// Số dư token theo chain, rồi theo ký hiệu
    pub fn tokens(&self) -> BTreeMap<&str, &BTreeMap<String, BalanceItem>> {
        match self {
            FamilyBalances::Evm(b) => b.tokens.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            FamilyBalances::Tron(b) => BTreeMap::from([(b.native.symbol.as_str(), &b.tokens)]),
            FamilyBalances::Solana(b) => BTreeMap::from([(b.native.symbol.as_str(), &b.tokens)]),
            FamilyBalances::Unsupported => BTreeMap::new(),
        }
    }
}

/// Kết quả tra cứu một địa chỉ
#[derive(Debug, Clone, PartialEq)]
pub struct WalletResult {
    pub address: String,
    pub family: WalletFamily,
    pub balances: FamilyBalances,
    pub status: OverallStatus,
    pub positive: bool,
}

impl WalletResult {
    /// Tạo kết quả, tự tính status và positive
    pub fn new(address: impl Into<String>, family: WalletFamily, balances: FamilyBalances) -> Self {
        let status = balances.overall_status();
        let positive = balances.is_positive();
        Self {
            address: address.into(),
            family,
            balances,
            status,
            positive,
        }
    }

    pub fn unsupported(address: impl Into<String>) -> Self {
        Self::new(address, WalletFamily::Unknown, FamilyBalances::Unsupported)
    }
}

impl Serialize for WalletResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("WalletResult", 6)?;
        state.serialize_field("address", &self.address)?;
        state.serialize_field("type", &self.family)?;
        state.serialize_field("balances", &self.balances.native())?;
        state.serialize_field("token_balances", &self.balances.tokens())?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("positive", &self.positive)?;
        state.end()
    }
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;

    fn evm_all_zero() -> EvmBalances {
        let mut balances = EvmBalances::default();
        for chain in ["ETH", "BNB"] {
            balances
                .native
                .insert(chain.to_string(), BalanceItem::success(chain, 0.0));
            let mut tokens = BTreeMap::new();
            tokens.insert("USDT".to_string(), BalanceItem::success("USDT", 0.0));
            tokens.insert("USDC".to_string(), BalanceItem::success("USDC", 0.0));
            balances.tokens.insert(chain.to_string(), tokens);
        }
        balances
    }

    #[test]
    fn test_all_zero_is_not_positive() {
        let balances = evm_all_zero();
        assert!(!balances.is_positive());
        assert_eq!(balances.overall_status(), OverallStatus::Success);
    }

    #[test]
    fn test_any_single_positive_balance_flips_positivity() {
        let base = evm_all_zero();
        let slots = base.items().len();
        assert_eq!(slots, 6);

        for chain in ["ETH", "BNB"] {
            let mut native = base.clone();
            native.native.get_mut(chain).unwrap().balance = 0.000001;
            assert!(native.is_positive(), "native {} should be positive", chain);

            for symbol in ["USDT", "USDC"] {
                let mut token = base.clone();
                token
                    .tokens
                    .get_mut(chain)
                    .unwrap()
                    .get_mut(symbol)
                    .unwrap()
                    .balance = 3.0;
                assert!(token.is_positive(), "{} on {} should be positive", symbol, chain);
            }
        }
    }

    #[test]
    fn test_failed_item_is_partial_and_never_positive() {
        let mut balances = evm_all_zero();
        balances.tokens.get_mut("ETH").unwrap().insert(
            "USDT".to_string(),
            BalanceItem::failed("USDT", RpcError::Timeout("10s".to_string())),
        );
        assert_eq!(balances.overall_status(), OverallStatus::Partial);
        assert!(!balances.is_positive());
    }

    #[test]
    fn test_unsupported_result() {
        let result = WalletResult::unsupported("hello");
        assert_eq!(result.status, OverallStatus::Unsupported);
        assert!(!result.positive);
        assert!(result.balances.items().is_empty());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "UNKNOWN");
        assert_eq!(json["status"], "error: unsupported type");
    }

    #[test]
    fn test_tron_result_serialization() {
        let mut tokens = BTreeMap::new();
        tokens.insert(
            "USDT".to_string(),
            BalanceItem::failed("USDT", RpcError::RateLimited("429".to_string())),
        );
        let balances = FamilyBalances::Tron(TronBalances {
            native: BalanceItem::success("TRX", 1.0),
            tokens,
        });
        let result = WalletResult::new("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", WalletFamily::Trx, balances);

        assert!(result.positive);
        assert_eq!(result.status, OverallStatus::Partial);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "TRX");
        assert_eq!(json["balances"]["TRX"]["balance"], 1.0);
        assert_eq!(json["balances"]["TRX"]["status"], "success");
        assert!(json["balances"]["TRX"].get("error_kind").is_none());
        let usdt = &json["token_balances"]["TRX"]["USDT"];
        assert_eq!(usdt["status"], "error: rate limited: 429");
        assert_eq!(usdt["error_kind"], "rate_limited");
        assert_eq!(json["status"], "partial");
    }

    #[test]
    fn test_zero_status_label() {
        let item = BalanceItem::zero("USDC");
        assert_eq!(serde_json::to_value(&item).unwrap()["status"], "zero");
        assert!(!item.is_positive());
    }
}
