//! Transient signing account
//!
//! SECURITY: an `Account` is the only holder of a private key.
//! - Keys are held in alloy's PrivateKeySigner, which zeroizes on drop
//! - Keys are never serialized (no Serialize impl) and never cloned
//! - Keys are never logged (Debug is redacted)
//! - Signing consumes the account, so the key is gone once the
//!   transaction bytes exist

use crate::error::TxStage;
use crate::{Error, Result};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;

/// Key pair derived for a single signing operation
pub struct Account {
    signer: PrivateKeySigner,
    /// Public address (safe to expose)
    address: Address,
}

impl Account {
    pub(crate) fn from_signer(signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        Self { signer, address }
    }

    /// Get the public address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the address as a checksummed string
    pub fn address_string(&self) -> String {
        self.address.to_checksum(None)
    }

    /// Sign a transaction request locally and return the raw EIP-2718 bytes
    ///
    /// The request's `from` is forced to this account. The account is
    /// consumed: the key is dropped when this returns, on success or error.
    pub async fn sign_transaction(self, request: TransactionRequest) -> Result<Bytes> {
        let request = request.with_from(self.address);
        let wallet = EthereumWallet::from(self.signer);

        let envelope = request
            .build(&wallet)
            .await
            .map_err(|e| Error::transaction(TxStage::Signing, e.to_string()))?;

        Ok(Bytes::from(envelope.encoded_2718()))
    }

    #[cfg(test)]
    pub(crate) fn secret_bytes(&self) -> alloy::primitives::B256 {
        self.signer.to_bytes()
    }
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}
