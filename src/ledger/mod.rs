//! Ledger node access
//!
//! The `Ledger` trait is the only path to the network. Queries and the
//! approval pipeline are generic over it so they can run against a real
//! node (`RpcLedger`) or an in-process double in tests.

mod revert;
mod rpc;

#[cfg(test)]
pub(crate) mod mock;

pub use revert::parse_revert_reason;
pub use rpc::RpcLedger;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Classified failure of a single node request
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The node answered with a JSON-RPC error (revert, insufficient funds, bad nonce)
    #[error("Node rejected request: {0}")]
    Rejected(String),

    /// The node could not be reached or the connection failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The node answered with something that could not be decoded
    #[error("Malformed node response: {0}")]
    Malformed(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl LedgerError {
    /// Transport and timeout failures may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Transport(_) | LedgerError::Timeout(_))
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Primitives a ledger node must expose
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Confirmation record returned after inclusion, passed through untouched
    type Receipt: Serialize + Send + Sync + 'static;

    /// Native balance in base units
    async fn balance(&self, address: Address) -> LedgerResult<U256>;

    /// Read-only contract call (`eth_call`), returning raw return data
    async fn call(&self, tx: TransactionRequest) -> LedgerResult<Bytes>;

    async fn estimate_gas(&self, tx: TransactionRequest) -> LedgerResult<u64>;

    async fn gas_price(&self) -> LedgerResult<u128>;

    /// Pending transaction count, used as the next nonce
    async fn transaction_count(&self, address: Address) -> LedgerResult<u64>;

    async fn chain_id(&self) -> LedgerResult<u64>;

    /// Submit a signed transaction in one request
    async fn send_raw_transaction(&self, raw: Bytes) -> LedgerResult<TxHash>;

    /// Wait until the transaction is included and return its receipt
    async fn wait_for_receipt(&self, hash: TxHash) -> LedgerResult<Self::Receipt>;
}

/// Apply an optional deadline to a node request
pub(crate) async fn bounded<T, F>(limit: Option<Duration>, request: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, request)
            .await
            .map_err(|_| LedgerError::Timeout(limit))?,
        None => request.await,
    }
}

/// Decode the leading 32-byte word of `eth_call` return data as a uint256
pub(crate) fn decode_uint(data: &[u8]) -> LedgerResult<U256> {
    if data.len() < 32 {
        return Err(LedgerError::Malformed(format!(
            "expected 32-byte uint256, got {} bytes",
            data.len()
        )));
    }
    Ok(U256::from_be_slice(&data[..32]))
}
