//! Ledger access over a JSON-RPC HTTP endpoint
//!
//! Every read and pre-signing request is bounded by the configured timeout.
//! Broadcast is a single `eth_sendRawTransaction` request and is never cut
//! short locally, so a transaction is either handed to the node or not.

use super::{bounded, parse_revert_reason, Ledger, LedgerError, LedgerResult};
use crate::config::RpcConfig;
use crate::{Error, Result};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use std::time::Duration;

impl From<TransportError> for LedgerError {
    fn from(err: TransportError) -> Self {
        match &err {
            RpcError::ErrorResp(payload) => {
                LedgerError::Rejected(parse_revert_reason(&payload.to_string()))
            }
            RpcError::NullResp | RpcError::DeserError { .. } => {
                LedgerError::Malformed(err.to_string())
            }
            _ => LedgerError::Transport(err.to_string()),
        }
    }
}

/// Ledger backed by an alloy HTTP provider
pub struct RpcLedger {
    provider: DynProvider,
    timeout: Option<Duration>,
    receipt_timeout: Option<Duration>,
    poll_interval: Duration,
}

impl RpcLedger {
    /// Connect to the endpoint named in the RPC config
    ///
    /// No request is made here; an unreachable node surfaces on first use.
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let url: url::Url = config
            .url
            .parse()
            .map_err(|e| Error::Config(format!("Invalid RPC URL {}: {}", config.url, e)))?;

        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self {
            provider,
            timeout: config.timeout(),
            receipt_timeout: config.receipt_timeout(),
            poll_interval: config.poll_interval(),
        })
    }
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("timeout", &self.timeout)
            .field("receipt_timeout", &self.receipt_timeout)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    type Receipt = TransactionReceipt;

    async fn balance(&self, address: Address) -> LedgerResult<U256> {
        bounded(self.timeout, async {
            Ok::<_, LedgerError>(self.provider.get_balance(address).await?)
        })
        .await
    }

    async fn call(&self, tx: TransactionRequest) -> LedgerResult<Bytes> {
        bounded(self.timeout, async {
            Ok::<_, LedgerError>(self.provider.call(tx).await?)
        })
        .await
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> LedgerResult<u64> {
        bounded(self.timeout, async {
            Ok::<_, LedgerError>(self.provider.estimate_gas(tx).await?)
        })
        .await
    }

    async fn gas_price(&self) -> LedgerResult<u128> {
        bounded(self.timeout, async {
            Ok::<_, LedgerError>(self.provider.get_gas_price().await?)
        })
        .await
    }

    async fn transaction_count(&self, address: Address) -> LedgerResult<u64> {
        bounded(self.timeout, async {
            Ok::<_, LedgerError>(self
                .provider
                .get_transaction_count(address)
                .pending()
                .await?)
        })
        .await
    }

    async fn chain_id(&self) -> LedgerResult<u64> {
        bounded(self.timeout, async {
            Ok::<_, LedgerError>(self.provider.get_chain_id().await?)
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> LedgerResult<TxHash> {
        let pending = self.provider.send_raw_transaction(&raw).await?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> LedgerResult<TransactionReceipt> {
        bounded(self.receipt_timeout, async {
            loop {
                if let Some(receipt) = self.provider.get_transaction_receipt(hash).await? {
                    return Ok::<_, LedgerError>(receipt);
                }
                tracing::trace!(tx_hash = %hash, "Receipt not available yet");
                tokio::time::sleep(self.poll_interval).await;
            }
        })
        .await
    }
}
