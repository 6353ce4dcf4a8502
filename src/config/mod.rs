//! Configuration for the token approval service
//!
//! Everything here is non-secret and serialisable. The server seed is read
//! separately with [`seed_from_env`] so it never appears in a config dump.

pub mod rpc;

use crate::{Error, Result};
use alloy::primitives::Address;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

// Re-export RPC config
pub use rpc::RpcConfig;

/// Server seed environment variable name
pub const SEED_ENV: &str = "APP_SEED";

/// Other environment overrides
mod env_vars {
    pub const CONTRACT_ADDRESS: &str = "CONTRACT_ADDRESS";
    pub const LISTEN_ADDR: &str = "LISTEN_ADDR";
    pub const STRICT_ADDRESSES: &str = "STRICT_ADDRESSES";
}

/// Argon2id cost parameters for account derivation
///
/// Changing any of these changes every derived address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        // OWASP minimum recommendation for Argon2id
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger node endpoint
    pub rpc: RpcConfig,
    /// ERC-20 token contract
    pub token_address: Option<Address>,
    /// Account derivation cost
    pub kdf: KdfConfig,
    /// Require hex digits in addresses, not just length and prefix
    pub strict_addresses: bool,
    /// HTTP listen address
    pub listen_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            token_address: None,
            kdf: KdfConfig::default(),
            strict_addresses: false,
            listen_addr: "0.0.0.0:8050".to_string(),
        }
    }
}

impl Config {
    /// Load from an optional JSON file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Override fields from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.rpc.apply_env(&lookup)?;

        if let Some(address) = lookup(env_vars::CONTRACT_ADDRESS) {
            let address = Address::from_str(address.trim()).map_err(|e| {
                Error::Config(format!("{} is not an address: {}", env_vars::CONTRACT_ADDRESS, e))
            })?;
            self.token_address = Some(address);
        }

        if let Some(listen) = lookup(env_vars::LISTEN_ADDR) {
            self.listen_addr = listen;
        }

        if let Some(flag) = lookup(env_vars::STRICT_ADDRESSES) {
            self.strict_addresses = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(Error::Config(format!(
                        "{} must be true or false, got {}",
                        env_vars::STRICT_ADDRESSES,
                        other
                    )))
                }
            };
        }

        Ok(())
    }

    /// The configured token contract, or an error naming the missing setting
    pub fn token_address(&self) -> Result<Address> {
        self.token_address.ok_or_else(|| {
            Error::Config(format!(
                "token contract address not configured (set {} or token_address)",
                env_vars::CONTRACT_ADDRESS
            ))
        })
    }
}

/// Read the server seed from `APP_SEED`
///
/// A missing or empty seed is a derivation misconfiguration: no account can
/// be derived without it.
pub fn seed_from_env() -> Result<SecretString> {
    match std::env::var(SEED_ENV) {
        Ok(seed) if !seed.is_empty() => Ok(SecretString::from(seed)),
        _ => Err(Error::Derivation(format!("{} is not set", SEED_ENV))),
    }
}
