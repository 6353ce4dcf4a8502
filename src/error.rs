//! Error types for the token approval service

use crate::ledger::LedgerError;
use alloy::primitives::TxHash;
use std::fmt;
use thiserror::Error;

/// Boxed cause attached to transaction failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Pipeline stage at which a transaction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    /// Gas estimation or gas price lookup failed for a reason other than
    /// the node rejecting the call
    Estimation,
    /// Fetching the pending nonce or chain id
    Nonce,
    /// Local signing with the derived account
    Signing,
    /// Submitting the raw transaction
    Broadcast,
    /// Waiting for the receipt of a submitted transaction
    Confirmation,
}

impl fmt::Display for TxStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxStage::Estimation => "estimation",
            TxStage::Nonce => "nonce",
            TxStage::Signing => "signing",
            TxStage::Broadcast => "broadcast",
            TxStage::Confirmation => "confirmation",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Wallet derivation error: {0}")]
    Derivation(String),

    #[error("Network error: {0}")]
    Network(#[source] LedgerError),

    #[error("Gas estimation failed: {0}")]
    GasEstimation(#[source] LedgerError),

    #[error("Transaction failed at {stage}: {source}")]
    Transaction {
        stage: TxStage,
        #[source]
        source: BoxError,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn transaction(stage: TxStage, source: impl Into<BoxError>) -> Self {
        Error::Transaction {
            stage,
            source: source.into(),
        }
    }

    /// Whether the caller may retry the same request unchanged
    ///
    /// Only transport-level faults before a transaction was accepted by the
    /// node qualify. Once broadcast succeeded, a retry would sign a second
    /// transaction.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_transient(),
            Error::Transaction {
                stage: TxStage::Confirmation,
                ..
            } => false,
            Error::Transaction { source, .. } => source
                .downcast_ref::<LedgerError>()
                .map(LedgerError::is_transient)
                .unwrap_or(false),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A submitted transaction whose receipt could not be obtained
///
/// The transaction may still be mined; `hash` is what the caller needs to
/// follow it up instead of resubmitting.
#[derive(Error, Debug)]
#[error("transaction {hash} was submitted but not confirmed: {source}")]
pub struct Unconfirmed {
    pub hash: TxHash,
    #[source]
    pub source: LedgerError,
}
