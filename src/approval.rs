//! ERC-20 approval pipeline
//!
//! SECURITY NOTE:
//! - The owner account is derived per call and consumed by signing
//! - Only the public owner address is ever logged
//! - Nothing is submitted unless every input check and the gas estimate pass

use crate::error::{TxStage, Unconfirmed};
use crate::ledger::{Ledger, LedgerError};
use crate::query::parse_address;
use crate::token;
use crate::units;
use crate::validation;
use crate::wallet::WalletDeriver;
use crate::{Error, Result};
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, U256};
use alloy::rpc::types::TransactionRequest;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Signs and submits `approve(spender, amount)` on behalf of derived owners
pub struct ApprovalPipeline<L> {
    ledger: Arc<L>,
    deriver: Arc<WalletDeriver>,
    token: Address,
    strict_addresses: bool,
}

impl<L> Clone for ApprovalPipeline<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            deriver: Arc::clone(&self.deriver),
            token: self.token,
            strict_addresses: self.strict_addresses,
        }
    }
}

impl<L: Ledger> ApprovalPipeline<L> {
    pub fn new(ledger: Arc<L>, deriver: Arc<WalletDeriver>, token: Address) -> Self {
        Self {
            ledger,
            deriver,
            token,
            strict_addresses: false,
        }
    }

    /// Also require 40 hex digits in the spender address
    pub fn with_strict_addresses(mut self, strict: bool) -> Self {
        self.strict_addresses = strict;
        self
    }

    /// Address shape check used for spenders
    pub fn is_acceptable_address(&self, address: &str) -> bool {
        if self.strict_addresses {
            validation::is_valid_hex_address(address)
        } else {
            validation::is_valid_address(address)
        }
    }

    /// Approve `spender` to move `value` tokens from the password's account
    ///
    /// Returns the node's receipt once the transaction is included. The
    /// pipeline never retries: a failure after broadcast is reported with the
    /// transaction hash so the caller does not submit twice.
    pub async fn approve(
        &self,
        spender: &str,
        value: &Value,
        password: SecretString,
    ) -> Result<L::Receipt> {
        let span = tracing::info_span!(
            "approve",
            request_id = %Uuid::new_v4(),
            spender = %spender,
            owner = tracing::field::Empty,
        );
        self.run(spender, value, password).instrument(span).await
    }

    async fn run(
        &self,
        spender: &str,
        value: &Value,
        password: SecretString,
    ) -> Result<L::Receipt> {
        // 1. Inputs
        let (spender, amount) = self.check_inputs(spender, value, &password)?;

        // 2. Owner account (CPU bound)
        let deriver = Arc::clone(&self.deriver);
        let account = tokio::task::spawn_blocking(move || deriver.derive(&password))
            .await
            .map_err(|e| Error::Derivation(format!("derivation task failed: {}", e)))??;
        let owner = account.address();
        tracing::Span::current().record("owner", tracing::field::display(owner));

        // 3. Calldata
        let request = TransactionRequest::default()
            .with_from(owner)
            .with_to(self.token)
            .with_input(token::approve_calldata(spender, amount));

        // 4. Gas, nonce and chain id
        let (gas_limit, gas_price) = tokio::try_join!(
            async {
                self.ledger
                    .estimate_gas(request.clone())
                    .await
                    .map_err(estimation_error)
            },
            async { self.ledger.gas_price().await.map_err(estimation_error) },
        )?;
        let (nonce, chain_id) = tokio::try_join!(
            async {
                self.ledger
                    .transaction_count(owner)
                    .await
                    .map_err(|e| Error::transaction(TxStage::Nonce, e))
            },
            async {
                self.ledger
                    .chain_id()
                    .await
                    .map_err(|e| Error::transaction(TxStage::Nonce, e))
            },
        )?;
        tracing::debug!(gas_limit, gas_price, nonce, chain_id, "Prepared approval");

        // 5. Sign; the account is dropped here whatever the outcome
        let request = request
            .with_gas_limit(gas_limit)
            .with_gas_price(gas_price)
            .with_nonce(nonce)
            .with_chain_id(chain_id);
        let raw = account.sign_transaction(request).await?;

        // 6. Submit and wait
        let hash = self
            .ledger
            .send_raw_transaction(raw)
            .await
            .map_err(|e| Error::transaction(TxStage::Broadcast, e))?;
        tracing::info!(tx_hash = %hash, "Submitted approval transaction");

        let receipt = self.ledger.wait_for_receipt(hash).await.map_err(|source| {
            tracing::warn!(
                tx_hash = %hash,
                error = %source,
                "Approval submitted but not confirmed"
            );
            Error::transaction(TxStage::Confirmation, Unconfirmed { hash, source })
        })?;

        tracing::info!(
            "Approved {} for spender {} and owner {}",
            value,
            spender,
            owner
        );
        Ok(receipt)
    }

    fn check_inputs(
        &self,
        spender: &str,
        value: &Value,
        password: &SecretString,
    ) -> Result<(Address, U256)> {
        if !self.is_acceptable_address(spender) {
            return Err(Error::InvalidInput(format!(
                "invalid spender address: {}",
                spender
            )));
        }
        let spender = parse_address("spender", spender)?;

        let amount = match value {
            Value::Number(number) if validation::is_valid_value(value) => {
                units::number_to_base(number)?
            }
            _ => {
                return Err(Error::InvalidInput(format!(
                    "value must be a positive number, got {}",
                    value
                )))
            }
        };

        if password.expose_secret().is_empty() {
            return Err(Error::InvalidInput("password must not be empty".to_string()));
        }

        Ok((spender, amount))
    }
}

/// A node rejection while estimating means the call itself would fail
fn estimation_error(e: LedgerError) -> Error {
    match e {
        rejected @ LedgerError::Rejected(_) => Error::GasEstimation(rejected),
        other => Error::transaction(TxStage::Estimation, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KdfConfig;
    use crate::ledger::mock::{Failure, MockLedger, RECEIPT_TIMEOUT};
    use alloy::consensus::TxEnvelope;
    use alloy::eips::eip2718::Decodable2718;
    use alloy::primitives::{address, keccak256, TxKind};
    use serde_json::json;
    use std::error::Error as _;

    const TOKEN: Address = address!("5fbdb2315678afecb367f032d93f642f64180aa3");
    const SPENDER: &str = "0xA6Eb67071a06E676b678F5dd3614D852C129d460";
    const SEED: &str = "server-seed-for-tests";

    fn deriver() -> Arc<WalletDeriver> {
        let kdf = KdfConfig {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        };
        Arc::new(WalletDeriver::new(SecretString::from(SEED), &kdf).unwrap())
    }

    fn pipeline(ledger: MockLedger) -> (ApprovalPipeline<MockLedger>, Arc<MockLedger>) {
        let ledger = Arc::new(ledger);
        (
            ApprovalPipeline::new(Arc::clone(&ledger), deriver(), TOKEN),
            ledger,
        )
    }

    fn password(s: &str) -> SecretString {
        SecretString::from(s)
    }

    fn owner_for(pw: &str) -> Address {
        deriver().derive(&password(pw)).unwrap().address()
    }

    #[tokio::test]
    async fn approve_signs_and_submits() {
        let mut ledger = MockLedger::new();
        ledger.nonce = 5;
        ledger.gas_price = 2_000_000_000;
        let (pipeline, ledger) = pipeline(ledger);

        let receipt = pipeline
            .approve(SPENDER, &json!(1000), password("correct-password"))
            .await
            .unwrap();
        assert!(receipt.status);

        assert_eq!(
            ledger.requests(),
            vec![
                "eth_estimateGas",
                "eth_gasPrice",
                "eth_getTransactionCount",
                "eth_chainId",
                "eth_sendRawTransaction",
                "eth_getTransactionReceipt",
            ]
        );

        let sent = ledger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(receipt.transaction_hash, keccak256(&sent[0]));

        let envelope = TxEnvelope::decode_2718(&mut sent[0].as_ref()).unwrap();
        let signed = envelope.as_legacy().expect("legacy transaction");
        let tx = signed.tx();

        let amount = U256::from(1000u64) * U256::from(10u64).pow(U256::from(18u64));
        let spender: Address = SPENDER.parse().unwrap();
        assert_eq!(tx.to, TxKind::Call(TOKEN));
        assert_eq!(tx.input, token::approve_calldata(spender, amount));
        assert_eq!(tx.gas_limit, 46_000);
        assert_eq!(tx.gas_price, 2_000_000_000);
        assert_eq!(tx.nonce, 5);
        assert_eq!(tx.chain_id, Some(1337));

        let owner = owner_for("correct-password");
        let signer = signed
            .signature()
            .recover_address_from_prehash(&signed.signature_hash())
            .unwrap();
        assert_eq!(signer, owner);

        // Estimation ran as the owner
        assert_eq!(ledger.calls()[0].from, Some(owner));
    }

    #[tokio::test]
    async fn fractional_values_are_exact() {
        let (pipeline, ledger) = pipeline(MockLedger::new());
        tokio_test::assert_ok!(
            pipeline
                .approve(SPENDER, &json!(1.5), password("correct-password"))
                .await
        );

        let envelope = TxEnvelope::decode_2718(&mut ledger.sent()[0].as_ref()).unwrap();
        let tx = envelope.as_legacy().unwrap().tx().clone();
        let amount = U256::from(15u64) * U256::from(10u64).pow(U256::from(17u64));
        assert_eq!(
            tx.input,
            token::approve_calldata(SPENDER.parse().unwrap(), amount)
        );
    }

    #[tokio::test]
    async fn invalid_inputs_never_reach_the_node() {
        let (pipeline, ledger) = pipeline(MockLedger::new());

        let cases = [
            ("bad-address", json!(1000), "pw"),
            ("0xZZEb67071a06E676b678F5dd3614D852C129d460", json!(1000), "pw"),
            (SPENDER, json!(0), "pw"),
            (SPENDER, json!(-5), "pw"),
            (SPENDER, json!("1000"), "pw"),
            (SPENDER, json!(null), "pw"),
            (SPENDER, json!(1000), ""),
        ];
        for (spender, value, pw) in cases {
            let err = pipeline
                .approve(spender, &value, password(pw))
                .await
                .unwrap_err();
            assert!(
                matches!(err, Error::InvalidInput(_)),
                "{spender} {value} -> {err}"
            );
        }
        assert!(ledger.requests().is_empty());
    }

    #[tokio::test]
    async fn too_many_decimals_is_a_conversion_error() {
        let (pipeline, ledger) = pipeline(MockLedger::new());
        let value: Value = serde_json::from_str("0.0000000000000000001").unwrap();
        let err = pipeline
            .approve(SPENDER, &value, password("pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
        assert!(ledger.requests().is_empty());
    }

    #[tokio::test]
    async fn strict_mode_rejects_non_hex_spender() {
        let (pipeline, _) = pipeline(MockLedger::new());
        let pipeline = pipeline.with_strict_addresses(true);
        let spender = "0xZZEb67071a06E676b678F5dd3614D852C129d460";

        assert!(!pipeline.is_acceptable_address(spender));
        assert!(pipeline.is_acceptable_address(SPENDER));
        let err = pipeline
            .approve(spender, &json!(1), password("pw"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid spender address"));
    }

    #[tokio::test]
    async fn revert_during_estimation_is_a_gas_error() {
        let (pipeline, ledger) = pipeline(MockLedger::failing(Failure::Revert(
            "ERC20: approve to the zero address",
        )));

        let err = pipeline
            .approve(SPENDER, &json!(1000), password("correct-password"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GasEstimation(LedgerError::Rejected(_))));
        assert!(err.to_string().contains("approve to the zero address"));
        assert!(!err.is_retryable());
        assert!(ledger.sent().is_empty());
    }

    #[tokio::test]
    async fn unreachable_node_is_a_retryable_transaction_error() {
        let (pipeline, ledger) = pipeline(MockLedger::failing(Failure::Unreachable));

        let err = pipeline
            .approve(SPENDER, &json!(1000), password("correct-password"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transaction {
                stage: TxStage::Estimation,
                ..
            }
        ));
        assert!(err.is_retryable());
        assert!(ledger.sent().is_empty());
    }

    #[tokio::test]
    async fn rejected_broadcast_keeps_the_node_reason() {
        let (pipeline, ledger) = pipeline(MockLedger::failing(Failure::BroadcastRejected));

        let err = pipeline
            .approve(SPENDER, &json!(1000), password("correct-password"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transaction {
                stage: TxStage::Broadcast,
                ..
            }
        ));
        assert!(!err.is_retryable());
        let source = err.source().unwrap().downcast_ref::<LedgerError>().unwrap();
        assert!(source.to_string().contains("nonce too low"));
        assert!(!ledger
            .requests()
            .contains(&"eth_getTransactionReceipt"));
    }

    #[tokio::test]
    async fn receipt_timeout_reports_submitted_hash() {
        let (pipeline, ledger) = pipeline(MockLedger::failing(Failure::ReceiptTimeout));

        let err = pipeline
            .approve(SPENDER, &json!(1000), password("correct-password"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transaction {
                stage: TxStage::Confirmation,
                ..
            }
        ));
        assert!(!err.is_retryable());

        let sent = ledger.sent();
        assert_eq!(sent.len(), 1);
        let unconfirmed = err.source().unwrap().downcast_ref::<Unconfirmed>().unwrap();
        assert_eq!(unconfirmed.hash, keccak256(&sent[0]));
        assert!(matches!(
            unconfirmed.source,
            LedgerError::Timeout(d) if d == RECEIPT_TIMEOUT
        ));
        assert!(err.to_string().contains(&unconfirmed.hash.to_string()));
    }

    #[tokio::test]
    async fn gas_price_outage_is_an_estimation_failure() {
        let (pipeline, ledger) = pipeline(MockLedger::failing(Failure::GasPriceUnavailable));

        let err = pipeline
            .approve(SPENDER, &json!(1000), password("correct-password"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transaction {
                stage: TxStage::Estimation,
                ..
            }
        ));
        assert!(err.is_retryable());
        assert!(ledger.sent().is_empty());
        assert!(!ledger.requests().contains(&"eth_getTransactionCount"));
    }

    #[tokio::test]
    async fn nonce_outage_stops_before_signing() {
        let (pipeline, ledger) = pipeline(MockLedger::failing(Failure::NonceUnavailable));

        let err = pipeline
            .approve(SPENDER, &json!(1000), password("correct-password"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transaction {
                stage: TxStage::Nonce,
                ..
            }
        ));
        assert!(err.is_retryable());
        assert!(ledger.sent().is_empty());
        assert!(!ledger.requests().contains(&"eth_sendRawTransaction"));
    }

    #[tokio::test]
    async fn small_amounts_are_encoded_exactly() {
        let (pipeline, ledger) = pipeline(MockLedger::new());
        let value: Value = serde_json::from_str("0.000001").unwrap();
        tokio_test::assert_ok!(
            pipeline
                .approve(SPENDER, &value, password("correct-password"))
                .await
        );

        let envelope = TxEnvelope::decode_2718(&mut ledger.sent()[0].as_ref()).unwrap();
        let tx = envelope.as_legacy().unwrap().tx().clone();
        let amount = U256::from(10u64).pow(U256::from(12u64));
        assert_eq!(
            tx.input,
            token::approve_calldata(SPENDER.parse().unwrap(), amount)
        );
    }

    #[tokio::test]
    async fn same_password_signs_from_same_owner() {
        let (pipeline, ledger) = pipeline(MockLedger::new());
        for _ in 0..2 {
            pipeline
                .approve(SPENDER, &json!(1), password("correct-password"))
                .await
                .unwrap();
        }
        let owners: Vec<_> = ledger
            .calls()
            .iter()
            .map(|request| request.from)
            .collect();
        assert_eq!(owners.len(), 2);
        assert_eq!(owners[0], owners[1]);

        pipeline
            .approve(SPENDER, &json!(1), password("other-password"))
            .await
            .unwrap();
        assert_ne!(ledger.calls()[2].from, owners[0]);
    }
}
