//! Deterministic account derivation from a server seed and a user password
//!
//! The key is the Argon2id hash of the password, keyed with the server seed
//! as the Argon2 secret. Neither input alone determines the key, and the
//! memory-hard cost makes brute forcing a password slow even for someone
//! holding the seed. The same (password, seed, cost) triple always yields
//! the same account, so nothing but the seed has to be stored.

use super::Account;
use crate::config::KdfConfig;
use crate::{Error, Result};
use alloy::signers::local::PrivateKeySigner;
use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

/// Domain separation for the Argon2 salt; a counter byte is appended
const SALT_DOMAIN: &[u8] = b"token-approver/account/v1";

/// Derives per-user accounts from the process-wide seed
#[derive(Debug)]
pub struct WalletDeriver {
    seed: SecretString,
    params: Params,
}

impl WalletDeriver {
    /// Create a deriver, rejecting an empty seed or invalid cost parameters
    pub fn new(seed: SecretString, kdf: &KdfConfig) -> Result<Self> {
        if seed.expose_secret().is_empty() {
            return Err(Error::Derivation("server seed is empty".to_string()));
        }
        Ok(Self {
            seed,
            params: kdf_params(kdf)?,
        })
    }

    /// Derive the account for a password
    pub fn derive(&self, password: &SecretString) -> Result<Account> {
        derive_with(
            password.expose_secret().as_bytes(),
            self.seed.expose_secret().as_bytes(),
            &self.params,
        )
    }
}

/// Derive the account for a (password, seed) pair
pub fn derive(password: &str, seed: &str, kdf: &KdfConfig) -> Result<Account> {
    if seed.is_empty() {
        return Err(Error::Derivation("server seed is empty".to_string()));
    }
    derive_with(password.as_bytes(), seed.as_bytes(), &kdf_params(kdf)?)
}

fn kdf_params(kdf: &KdfConfig) -> Result<Params> {
    Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(32))
        .map_err(|e| Error::Derivation(format!("invalid Argon2 parameters: {}", e)))
}

fn derive_with(password: &[u8], seed: &[u8], params: &Params) -> Result<Account> {
    if password.is_empty() {
        return Err(Error::InvalidInput("password must not be empty".to_string()));
    }

    let argon2 =
        Argon2::new_with_secret(seed, Algorithm::Argon2id, Version::V0x13, params.clone())
            .map_err(|e| Error::Derivation(format!("invalid server seed: {}", e)))?;

    let mut key = Zeroizing::new([0u8; 32]);

    // An output outside the secp256k1 scalar range is astronomically rare;
    // retrying with the next counter keeps the mapping deterministic.
    for counter in 0..=u8::MAX {
        let salt = [SALT_DOMAIN, &[counter][..]].concat();
        argon2
            .hash_password_into(password, &salt, &mut key[..])
            .map_err(|e| Error::Derivation(format!("key derivation failed: {}", e)))?;

        if let Ok(signer) = PrivateKeySigner::from_slice(&key[..]) {
            return Ok(Account::from_signer(signer));
        }
    }

    Err(Error::Derivation(
        "no valid secp256k1 key found for this password".to_string(),
    ))
}
