//! shipyard deploys a compiled contract, waits for it to settle, and verifies its source.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;
use shipyard_deploy::{
    ContractArtifact, DeployConfig, DeploymentRequest, EtherscanVerifier, Orchestrator,
    OrchestratorSettings, RpcChainClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = DeployConfig::load(cli.config.as_deref())?;
    let artifact = ContractArtifact::load(&config.artifact)?;

    let private_key = config
        .private_key
        .as_ref()
        .context("No deployer key configured (set PRIVATE_KEY or private_key)")?;
    let chain = RpcChainClient::new(
        config.rpc_url.clone(),
        private_key.expose(),
        config.poll_interval(),
    )?;

    tracing::info!(
        network = %config.network,
        chain_id = config.chain_id,
        deployer = %chain.deployer(),
        contract = %artifact.fully_qualified_name(),
        "Loaded deployment configuration"
    );

    let verifier = if config.verification.enabled && !cli.skip_verify {
        Some(EtherscanVerifier::new(
            &config.verification,
            config.chain_id,
            artifact.source_bundle()?,
        )?)
    } else {
        None
    };

    let settings = OrchestratorSettings::from_config(&config, artifact.contract_name.clone());
    let orchestrator = Orchestrator::new(chain, verifier, settings);

    let report = orchestrator
        .run(&DeploymentRequest::new(artifact.bytecode.clone()))
        .await
        .context("Deployment aborted")?;

    tracing::info!(
        address = %report.address,
        tx_hash = %report.tx_hash,
        verified = report.verification.is_success(),
        "✓ Deployment complete!"
    );

    Ok(())
}
