//! Read-only balance and allowance queries
//!
//! SECURITY NOTE:
//! - This service is READ-ONLY - it never derives accounts or signs
//! - It holds no mutable state and can be shared across requests

use crate::ledger::{decode_uint, Ledger};
use crate::token;
use crate::units;
use crate::{Error, Result};
use alloy::primitives::Address;
use alloy::rpc::types::TransactionRequest;
use std::str::FromStr;
use std::sync::Arc;

/// Balance and allowance lookups against one token contract
pub struct QueryService<L> {
    ledger: Arc<L>,
    token: Address,
}

impl<L> Clone for QueryService<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            token: self.token,
        }
    }
}

impl<L: Ledger> QueryService<L> {
    pub fn new(ledger: Arc<L>, token: Address) -> Self {
        Self { ledger, token }
    }

    /// Native balance of `address`, as a display amount
    pub async fn balance_of(&self, address: &str) -> Result<String> {
        let address = parse_address("address", address)?;

        let balance = self
            .ledger
            .balance(address)
            .await
            .map_err(Error::Network)?;

        tracing::debug!(address = %address, balance = %balance, "Fetched balance");
        Ok(units::to_display(balance))
    }

    /// Amount `spender` may transfer on behalf of `owner`, as a display amount
    pub async fn allowance_of(&self, owner: &str, spender: &str) -> Result<String> {
        let owner = parse_address("owner", owner)?;
        let spender = parse_address("spender", spender)?;

        let tx = TransactionRequest::default()
            .to(self.token)
            .input(token::allowance_calldata(owner, spender).into());

        let data = self.ledger.call(tx).await.map_err(Error::Network)?;
        let allowance = decode_uint(&data).map_err(Error::Network)?;

        tracing::debug!(
            owner = %owner,
            spender = %spender,
            allowance = %allowance,
            "Fetched allowance"
        );
        Ok(units::to_display(allowance))
    }
}

pub(crate) fn parse_address(field: &str, value: &str) -> Result<Address> {
    Address::from_str(value)
        .map_err(|e| Error::InvalidInput(format!("invalid {} address {}: {}", field, value, e)))
}
