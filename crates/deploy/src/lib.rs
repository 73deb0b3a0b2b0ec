//! shipyard-deploy - Deploy a compiled contract and verify it on a block explorer.
//!
//! The [`Orchestrator`] runs a fixed sequence: deploy through a [`ChainClient`],
//! wait for confirmations, verify through a [`VerificationService`], and return a
//! [`DeploymentReport`]. Only the deployment and the confirmation wait can fail a
//! run; verification problems are reported, not propagated.

pub mod artifact;
pub mod chain;
pub mod config;
mod net;
pub mod orchestrator;
pub mod verification;

pub use artifact::ContractArtifact;
pub use chain::{ChainClient, ChainError, DeploymentRequest, DeploymentResult, RpcChainClient};
pub use config::{DeployConfig, Secret, VerificationConfig};
pub use orchestrator::{DeploymentReport, Orchestrator, OrchestratorError, OrchestratorSettings};
pub use verification::{
    EtherscanVerifier, SourceBundle, VerificationError, VerificationOutcome, VerificationService,
    classify,
};
