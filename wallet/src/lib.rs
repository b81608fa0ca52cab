// Module exports
pub mod balance;
pub mod resolver;

// Re-export các component chính
pub use balance::{
    BalanceItem, BalanceSheet, BalanceStatus, EvmBalances, FamilyBalances, FetchError,
    FetchErrorKind, OverallStatus, SolanaBalances, TronBalances, WalletResult,
};
pub use resolver::{BalanceResolver, ResolveError, WalletResolver};
