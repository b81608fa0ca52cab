//! Truy cập các chain: phân loại địa chỉ, xoay vòng endpoint và adapter RPC
//! cho EVM, Tron, Solana.

// Internal imports
pub mod abi;
pub mod address;
pub mod chain_adapters;
pub mod endpoint_pool;

// Re-export các module chính
pub use address::{classify, parse_evm_address, WalletFamily};
pub use chain_adapters::{
    EthersRpc, EvmRpc, RpcError, RpcErrorKind, SolanaRpc, SolanaRpcClient, TriggerConstantRequest,
    TronApi, TronGridClient, UiTokenAmount,
};
pub use endpoint_pool::EndpointPool;
