//! Deployment configuration.
//!
//! Values come from `Shipyard.toml`, then from the environment. Environment
//! variables prefixed with `SHIPYARD_` override the file (`__` separates nested
//! keys, e.g. `SHIPYARD_VERIFICATION__ENABLED=false`). The conventional
//! `PRIVATE_KEY`, `BASESCAN_API_KEY` and `ETHERSCAN_API_KEY` variables are
//! honoured too; `BASESCAN_API_KEY` wins when both API keys are set.

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use url::Url;

/// The default name of the configuration file.
pub const CONFIG_FILENAME: &str = "Shipyard.toml";

/// Prefix of the environment variables read into the configuration.
pub const ENV_PREFIX: &str = "SHIPYARD_";

/// Placeholder substituted with the contract address in explorer URL templates.
pub const ADDRESS_PLACEHOLDER: &str = "{address}";

/// Default number of blocks to wait on top of the deployment block.
pub const DEFAULT_CONFIRMATIONS: u64 = 5;

/// Default explorer page for a deployed contract.
pub const DEFAULT_EXPLORER_URL: &str = "https://basescan.org/address/{address}";

/// Etherscan v2 multichain API endpoint.
pub const DEFAULT_EXPLORER_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Base mainnet.
const DEFAULT_CHAIN_ID: u64 = 8453;
const DEFAULT_NETWORK: &str = "Base";
const DEFAULT_RPC_URL: &str = "https://mainnet.base.org";

/// A value that must never end up in logs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Everything a deployment run needs besides the compiled contract itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeployConfig {
    /// Human readable network name, used in log lines.
    #[serde(default = "default_network")]
    pub network: String,
    /// Chain ID of the target network.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// JSON-RPC endpoint of the target network.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: Url,
    /// Key of the deploying account.
    #[serde(default)]
    pub private_key: Option<Secret>,
    /// Path to the Hardhat artifact of the contract to deploy.
    pub artifact: PathBuf,
    /// Blocks to wait on top of the deployment block before verifying.
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Give up waiting for confirmations after this many seconds. Waits forever when unset.
    #[serde(default)]
    pub confirmation_timeout_secs: Option<u64>,
    /// Delay between two chain head polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Explorer page template; `{address}` is replaced by the contract address.
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
    /// Source verification settings.
    #[serde(default)]
    pub verification: VerificationConfig,
}

/// Settings of the explorer verification step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerificationConfig {
    /// Whether to verify the contract after deployment.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Etherscan-compatible API endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: Url,
    /// Explorer API key.
    #[serde(default)]
    pub api_key: Option<Secret>,
    /// Delay between two verification status checks.
    #[serde(default = "default_status_poll_interval_secs")]
    pub status_poll_interval_secs: u64,
    /// Status checks before a pending verification is reported as failed.
    #[serde(default = "default_max_status_checks")]
    pub max_status_checks: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: default_api_url(),
            api_key: None,
            status_poll_interval_secs: default_status_poll_interval_secs(),
            max_status_checks: default_max_status_checks(),
        }
    }
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

fn default_rpc_url() -> Url {
    Url::parse(DEFAULT_RPC_URL).expect("default RPC URL is valid")
}

fn default_confirmations() -> u64 {
    DEFAULT_CONFIRMATIONS
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_explorer_url() -> String {
    DEFAULT_EXPLORER_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_api_url() -> Url {
    Url::parse(DEFAULT_EXPLORER_API_URL).expect("default explorer API URL is valid")
}

fn default_status_poll_interval_secs() -> u64 {
    3
}

fn default_max_status_checks() -> u32 {
    20
}

impl DeployConfig {
    /// Load the configuration from `path` (or `Shipyard.toml` in the working
    /// directory) and the environment.
    ///
    /// An explicitly given path must exist. The default file is optional, so a
    /// run can be configured from the environment alone.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) if !path.exists() => {
                anyhow::bail!("Configuration file not found: {}", path.display())
            }
            Some(path) if path.is_dir() => path.join(CONFIG_FILENAME),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(CONFIG_FILENAME),
        };

        let config: Self = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::raw().only(&["PRIVATE_KEY"]))
            .merge(api_key_from_env("ETHERSCAN_API_KEY"))
            .merge(api_key_from_env("BASESCAN_API_KEY"))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

        config.validate()?;

        tracing::debug!(path = %path.display(), config = ?config, "Configuration loaded");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.explorer_url.contains(ADDRESS_PLACEHOLDER) {
            anyhow::bail!(
                "explorer_url must contain the {} placeholder, got '{}'",
                ADDRESS_PLACEHOLDER,
                self.explorer_url
            );
        }

        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.confirmation_timeout_secs.map(Duration::from_secs)
    }
}

/// Read the explorer API key from the unprefixed variable `name`.
fn api_key_from_env(name: &'static str) -> Env {
    Env::raw()
        .only(&[name])
        .map(|_| "verification.api_key".into())
}

/// Substitute `address` into an explorer URL template.
pub fn render_explorer_url(template: &str, address: Address) -> String {
    template.replace(ADDRESS_PLACEHOLDER, &address.to_string())
}
