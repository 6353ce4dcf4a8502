//! Token Approver
//!
//! Derives a per-user signing account from a server seed and a user
//! password, and uses it to:
//! - Read native balances and ERC-20 allowances
//! - Sign and submit ERC-20 `approve` transactions
//!
//! # Security Model
//!
//! - Neither the seed nor the password alone determines an account
//! - Accounts exist only for the duration of one signature
//! - Seed, password and private key are never logged or serialised
//! - All input is validated before any network request or derivation

pub mod approval;
pub mod config;
pub mod http;
pub mod ledger;
pub mod query;
pub mod token;
pub mod units;
pub mod validation;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use approval::ApprovalPipeline;
pub use config::{seed_from_env, Config, KdfConfig, RpcConfig};
pub use error::{Error, Result, TxStage, Unconfirmed};
pub use ledger::{Ledger, LedgerError, RpcLedger};
pub use query::QueryService;
pub use wallet::{Account, WalletDeriver};
