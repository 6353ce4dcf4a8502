//! Ledger node endpoint configuration
//!
//! The endpoint URL is resolved from the environment following Ethereum
//! ecosystem conventions:
//! 1. `RPC_URL` or `ETH_RPC_URL` - highest priority
//! 2. Provider API keys (`ALCHEMY_API_KEY`, `INFURA_API_KEY`) - builds the URL
//! 3. A local development node - for testing only
//!
//! # Examples
//!
//! ```bash
//! # Option 1: Explicit URL (recommended for production)
//! export RPC_URL="https://eth-sepolia.g.alchemy.com/v2/YOUR_KEY"
//!
//! # Option 2: Provider API key, optionally with a network name
//! export ALCHEMY_API_KEY="YOUR_KEY"
//! export ALCHEMY_NETWORK="eth-sepolia"
//!
//! # Option 3: No env vars - uses http://127.0.0.1:8545
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable names
pub(crate) mod env_vars {
    pub const RPC_URL: &str = "RPC_URL";
    pub const ETH_RPC_URL: &str = "ETH_RPC_URL";

    pub const ALCHEMY_API_KEY: &str = "ALCHEMY_API_KEY";
    pub const ALCHEMY_NETWORK: &str = "ALCHEMY_NETWORK";
    pub const INFURA_API_KEY: &str = "INFURA_API_KEY";
    pub const INFURA_NETWORK: &str = "INFURA_NETWORK";

    pub const RPC_TIMEOUT_SECS: &str = "RPC_TIMEOUT_SECS";
}

/// Local development node (anvil / ganache / hardhat default port)
pub const LOCAL_NODE_URL: &str = "http://127.0.0.1:8545";

/// RPC configuration for the ledger node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Node JSON-RPC endpoint
    pub url: String,
    /// Per-request timeout for reads, estimates and nonce lookups
    pub timeout_secs: Option<u64>,
    /// Upper bound on waiting for a receipt after broadcast
    pub receipt_timeout_secs: Option<u64>,
    /// Delay between receipt polls
    pub poll_interval_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: LOCAL_NODE_URL.to_string(),
            timeout_secs: Some(30),
            receipt_timeout_secs: Some(300),
            poll_interval_ms: 1_000,
        }
    }
}

impl RpcConfig {
    /// Override fields from an environment lookup
    ///
    /// The URL is only replaced when the environment names one; a URL
    /// loaded from a config file otherwise wins over the local fallback.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = resolve_url(&lookup) {
            self.url = url;
        } else if self.url == LOCAL_NODE_URL {
            tracing::warn!(url = LOCAL_NODE_URL, "No RPC endpoint configured, using local node");
        }

        if let Some(secs) = lookup(env_vars::RPC_TIMEOUT_SECS) {
            let secs = secs.trim().parse::<u64>().map_err(|e| {
                Error::Config(format!("{} must be an integer: {}", env_vars::RPC_TIMEOUT_SECS, e))
            })?;
            self.timeout_secs = (secs > 0).then_some(secs);
        }

        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn receipt_timeout(&self) -> Option<Duration> {
        self.receipt_timeout_secs.map(Duration::from_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Pick the endpoint URL from the environment
///
/// Priority:
/// 1. RPC_URL, then ETH_RPC_URL
/// 2. ALCHEMY_API_KEY (network from ALCHEMY_NETWORK, default eth-mainnet)
/// 3. INFURA_API_KEY (network from INFURA_NETWORK, default mainnet)
fn resolve_url<F>(lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(url) = non_empty(env_vars::RPC_URL) {
        tracing::debug!("Using RPC_URL");
        return Some(url);
    }
    if let Some(url) = non_empty(env_vars::ETH_RPC_URL) {
        tracing::debug!("Using ETH_RPC_URL");
        return Some(url);
    }

    if let Some(key) = non_empty(env_vars::ALCHEMY_API_KEY) {
        let network =
            non_empty(env_vars::ALCHEMY_NETWORK).unwrap_or_else(|| "eth-mainnet".to_string());
        tracing::info!(network = %network, "Building RPC URL from ALCHEMY_API_KEY");
        return Some(format!("https://{}.g.alchemy.com/v2/{}", network, key));
    }

    if let Some(key) = non_empty(env_vars::INFURA_API_KEY) {
        let network = non_empty(env_vars::INFURA_NETWORK).unwrap_or_else(|| "mainnet".to_string());
        tracing::info!(network = %network, "Building RPC URL from INFURA_API_KEY");
        return Some(format!("https://{}.infura.io/v3/{}", network, key));
    }

    None
}
