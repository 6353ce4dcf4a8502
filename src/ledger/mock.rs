//! In-process ledger double for tests

use super::{Ledger, LedgerError, LedgerResult};
use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;

/// Failure a test wants the node to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failure {
    /// Every request fails at the transport level
    Unreachable,
    /// Gas estimation is rejected with a revert reason
    Revert(&'static str),
    /// Broadcast is rejected by the node
    BroadcastRejected,
    /// `eth_call` returns too few bytes
    ShortCallData,
    /// Only the gas price lookup fails at the transport level
    GasPriceUnavailable,
    /// Only the pending nonce lookup fails at the transport level
    NonceUnavailable,
    /// Broadcast succeeds but no receipt arrives before the deadline
    ReceiptTimeout,
}

/// Receipt deadline reported by `Failure::ReceiptTimeout`
pub(crate) const RECEIPT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MockReceipt {
    pub transaction_hash: TxHash,
    pub status: bool,
}

pub(crate) struct MockLedger {
    pub balance: U256,
    pub call_return: U256,
    pub gas_estimate: u64,
    pub gas_price: u128,
    pub nonce: u64,
    pub chain_id: u64,
    pub failure: Option<Failure>,
    requests: Mutex<Vec<&'static str>>,
    calls: Mutex<Vec<TransactionRequest>>,
    sent: Mutex<Vec<Bytes>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            balance: U256::ZERO,
            call_return: U256::ZERO,
            gas_estimate: 46_000,
            gas_price: 1_000_000_000,
            nonce: 0,
            chain_id: 1337,
            failure: None,
            requests: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(failure: Failure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new()
        }
    }

    /// Names of the node methods requested so far, in order
    pub fn requests(&self) -> Vec<&'static str> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests passed to `call` and `estimate_gas`
    pub fn calls(&self) -> Vec<TransactionRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Raw transactions that were broadcast
    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str) -> LedgerResult<()> {
        self.requests.lock().unwrap().push(method);
        if self.failure == Some(Failure::Unreachable) {
            return Err(LedgerError::Transport(
                "error sending request: connection refused".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for MockLedger {
    type Receipt = MockReceipt;

    async fn balance(&self, _address: Address) -> LedgerResult<U256> {
        self.record("eth_getBalance")?;
        Ok(self.balance)
    }

    async fn call(&self, tx: TransactionRequest) -> LedgerResult<Bytes> {
        self.record("eth_call")?;
        self.calls.lock().unwrap().push(tx);
        if self.failure == Some(Failure::ShortCallData) {
            return Ok(Bytes::from_static(&[0u8; 4]));
        }
        Ok(Bytes::from(self.call_return.to_be_bytes::<32>().to_vec()))
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> LedgerResult<u64> {
        self.record("eth_estimateGas")?;
        self.calls.lock().unwrap().push(tx);
        if let Some(Failure::Revert(reason)) = self.failure {
            return Err(LedgerError::Rejected(reason.to_string()));
        }
        Ok(self.gas_estimate)
    }

    async fn gas_price(&self) -> LedgerResult<u128> {
        self.record("eth_gasPrice")?;
        if self.failure == Some(Failure::GasPriceUnavailable) {
            return Err(LedgerError::Transport("gas price: connection reset".to_string()));
        }
        Ok(self.gas_price)
    }

    async fn transaction_count(&self, _address: Address) -> LedgerResult<u64> {
        self.record("eth_getTransactionCount")?;
        if self.failure == Some(Failure::NonceUnavailable) {
            return Err(LedgerError::Transport("nonce: connection reset".to_string()));
        }
        Ok(self.nonce)
    }

    async fn chain_id(&self) -> LedgerResult<u64> {
        self.record("eth_chainId")?;
        Ok(self.chain_id)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> LedgerResult<TxHash> {
        self.record("eth_sendRawTransaction")?;
        if self.failure == Some(Failure::BroadcastRejected) {
            return Err(LedgerError::Rejected("nonce too low".to_string()));
        }
        let hash = keccak256(&raw);
        self.sent.lock().unwrap().push(raw);
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> LedgerResult<MockReceipt> {
        self.record("eth_getTransactionReceipt")?;
        if self.failure == Some(Failure::ReceiptTimeout) {
            return Err(LedgerError::Timeout(RECEIPT_TIMEOUT));
        }
        Ok(MockReceipt {
            transaction_hash: hash,
            status: true,
        })
    }
}
