//! Per-request signing accounts
//!
//! Accounts are derived on demand from the server seed and a user password,
//! used for exactly one signature, then dropped. Nothing here is persisted.

mod account;
mod deriver;

pub use account::Account;
pub use deriver::{derive, WalletDeriver};
