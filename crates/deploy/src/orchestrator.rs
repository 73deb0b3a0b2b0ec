//! The deploy → confirm → verify → report sequence.
//!
//! The orchestrator owns no network code. It drives a [`ChainClient`] and an
//! optional [`VerificationService`] strictly one step after the other:
//!
//! 1. deploy the contract (fatal on failure)
//! 2. wait for the configured number of confirmations (fatal on failure)
//! 3. verify the source on the explorer (never fatal)
//! 4. report the address, explorer page and verification outcome

use std::{fmt, time::Duration};

use alloy_core::primitives::{Address, TxHash};

use crate::{
    chain::{ChainClient, ChainError, DeploymentRequest, DeploymentResult},
    config::{DEFAULT_CONFIRMATIONS, DEFAULT_EXPLORER_URL, DeployConfig, render_explorer_url},
    verification::{VerificationOutcome, VerificationService, classify},
};

/// Errors that abort a run. Verification problems never end up here.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("deployment failed")]
    Deploy(#[source] ChainError),

    #[error("failed waiting for {confirmations} confirmations of {tx_hash}")]
    Confirmation {
        tx_hash: TxHash,
        confirmations: u64,
        #[source]
        source: ChainError,
    },

    #[error("timed out after {timeout:?} waiting for {confirmations} confirmations of {tx_hash}")]
    ConfirmationTimeout {
        tx_hash: TxHash,
        confirmations: u64,
        timeout: Duration,
    },
}

/// Per-run knobs of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Contract name, used in log lines and the report.
    pub contract_name: String,
    /// Network name, used in the start banner.
    pub network: String,
    /// Blocks required on top of the deployment block before verifying.
    pub confirmations: u64,
    /// Deadline for the confirmation wait. `None` waits as long as it takes.
    pub confirmation_timeout: Option<Duration>,
    /// Explorer page template with an `{address}` placeholder.
    pub explorer_url: String,
}

impl OrchestratorSettings {
    pub fn new(contract_name: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            contract_name: contract_name.into(),
            network: network.into(),
            confirmations: DEFAULT_CONFIRMATIONS,
            confirmation_timeout: None,
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
        }
    }

    pub fn from_config(config: &DeployConfig, contract_name: impl Into<String>) -> Self {
        Self {
            contract_name: contract_name.into(),
            network: config.network.clone(),
            confirmations: config.confirmations,
            confirmation_timeout: config.confirmation_timeout(),
            explorer_url: config.explorer_url.clone(),
        }
    }
}

/// Final summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    pub contract_name: String,
    /// Address returned by the chain client, untouched.
    pub address: Address,
    pub tx_hash: TxHash,
    pub explorer_url: String,
    pub verification: VerificationOutcome,
}

impl fmt::Display for DeploymentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} deployed to: {}", self.contract_name, self.address)?;
        writeln!(f, "View on explorer: {}", self.explorer_url)?;
        write!(f, "{}", self.verification)
    }
}

/// Runs the deployment workflow against a chain client and a verifier.
pub struct Orchestrator<C, V> {
    chain: C,
    verifier: Option<V>,
    settings: OrchestratorSettings,
}

impl<C, V> Orchestrator<C, V>
where
    C: ChainClient,
    V: VerificationService,
{
    /// Create an orchestrator. Without a verifier the verification step is skipped.
    pub fn new(chain: C, verifier: Option<V>, settings: OrchestratorSettings) -> Self {
        Self {
            chain,
            verifier,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Deploy, wait for confirmations, verify, and report.
    pub async fn run(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentReport, OrchestratorError> {
        let settings = &self.settings;

        tracing::info!("Deploying {} to {}...", settings.contract_name, settings.network);

        let deployment = self
            .chain
            .deploy(request)
            .await
            .map_err(OrchestratorError::Deploy)?;

        let address = self.chain.address(&deployment);
        let explorer_url = render_explorer_url(&settings.explorer_url, address);

        tracing::info!(
            tx_hash = %deployment.tx_hash,
            block_number = deployment.block_number,
            "{} deployed to: {}",
            settings.contract_name,
            address
        );
        tracing::info!("View on explorer: {}", explorer_url);

        tracing::info!(
            confirmations = settings.confirmations,
            "Waiting for block confirmations..."
        );
        self.await_confirmations(&deployment).await?;

        let verification = self.verify(address, request).await;

        Ok(DeploymentReport {
            contract_name: settings.contract_name.clone(),
            address,
            tx_hash: deployment.tx_hash,
            explorer_url,
            verification,
        })
    }

    async fn await_confirmations(
        &self,
        deployment: &DeploymentResult,
    ) -> Result<(), OrchestratorError> {
        let confirmations = self.settings.confirmations;
        let wait = self.chain.await_confirmations(deployment, confirmations);

        let result = match self.settings.confirmation_timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait).await.map_err(|_| {
                OrchestratorError::ConfirmationTimeout {
                    tx_hash: deployment.tx_hash,
                    confirmations,
                    timeout,
                }
            })?,
            None => wait.await,
        };

        result.map_err(|source| OrchestratorError::Confirmation {
            tx_hash: deployment.tx_hash,
            confirmations,
            source,
        })
    }

    async fn verify(&self, address: Address, request: &DeploymentRequest) -> VerificationOutcome {
        let Some(verifier) = &self.verifier else {
            tracing::info!("Verification disabled, skipping");
            return VerificationOutcome::Skipped;
        };

        tracing::info!(address = %address, "Verifying contract on explorer...");
        let outcome = classify(verifier.verify(address, &request.constructor_args).await);

        match &outcome {
            VerificationOutcome::Failed { .. } => tracing::warn!("{}", outcome),
            _ => tracing::info!("{}", outcome),
        }

        outcome
    }
}
