//! JSON-RPC chain client backed by an alloy provider and a local signer.

use std::time::Duration;

use alloy::{
    network::{EthereumWallet, ReceiptResponse, TransactionBuilder},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
};
use alloy_core::primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use anyhow::Context;
use url::Url;

use super::{ChainClient, ChainError, DeploymentRequest, DeploymentResult, confirmations_at};
use crate::net;

/// Chain client that signs locally and submits through an HTTP JSON-RPC endpoint.
pub struct RpcChainClient {
    provider: DynProvider,
    deployer: Address,
    poll_interval: Duration,
}

impl RpcChainClient {
    /// Connect to `rpc_url`, signing transactions with `private_key`.
    pub fn new(rpc_url: Url, private_key: &str, poll_interval: Duration) -> anyhow::Result<Self> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .context("Failed to parse deployer private key")?;
        let deployer = signer.address();

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url)
            .erased();

        Ok(Self::from_provider(provider, deployer, poll_interval))
    }

    fn from_provider(provider: DynProvider, deployer: Address, poll_interval: Duration) -> Self {
        Self {
            provider,
            deployer,
            poll_interval,
        }
    }

    /// Address of the account paying for the deployment.
    pub fn deployer(&self) -> Address {
        self.deployer
    }
}

impl ChainClient for RpcChainClient {
    async fn deploy(&self, request: &DeploymentRequest) -> Result<DeploymentResult, ChainError> {
        if request.bytecode.is_empty() {
            return Err(ChainError::EmptyBytecode);
        }

        let tx = TransactionRequest::default()
            .with_from(self.deployer)
            .with_deploy_code(request.init_code());

        let pending = self.provider.send_transaction(tx).await?;
        let tx_hash = *pending.tx_hash();
        tracing::debug!(
            tx_hash = %tx_hash,
            deployer = %self.deployer,
            "Deployment transaction sent"
        );

        let receipt = pending.get_receipt().await?;
        if !receipt.status() {
            return Err(ChainError::Reverted(tx_hash));
        }

        let address = receipt
            .contract_address()
            .ok_or(ChainError::MissingContractAddress(tx_hash))?;
        let block_number = receipt
            .block_number()
            .ok_or(ChainError::MissingBlockNumber(tx_hash))?;

        tracing::debug!(
            tx_hash = %tx_hash,
            address = %address,
            block_number,
            gas_used = receipt.gas_used(),
            "Deployment transaction included"
        );

        Ok(DeploymentResult {
            address,
            tx_hash,
            block_number,
        })
    }

    async fn await_confirmations(
        &self,
        result: &DeploymentResult,
        confirmations: u64,
    ) -> Result<(), ChainError> {
        let tx_hash = result.tx_hash;

        net::wait_until(
            "block confirmations",
            self.poll_interval,
            ChainError::is_transient,
            || async move {
                let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? else {
                    tracing::warn!(tx_hash = %tx_hash, "Deployment transaction not on chain yet");
                    return Ok(false);
                };
                if !receipt.status() {
                    return Err(ChainError::Reverted(tx_hash));
                }
                let Some(inclusion_block) = receipt.block_number() else {
                    return Ok(false);
                };

                let head = self.provider.get_block_number().await?;
                let confirmed = confirmations_at(inclusion_block, head);
                tracing::debug!(
                    head,
                    inclusion_block,
                    confirmed,
                    required = confirmations,
                    "Polled chain head"
                );
                Ok(confirmed >= confirmations)
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use alloy::transports::mock::Asserter;
    use alloy_core::primitives::address;
    use serde_json::json;

    use super::*;

    const TX_HASH: &str = "0x21f6554c28453a01e7276c1db2fc1695bb512b170818bfa98fa8136433100616";

    fn deployment(block_number: u64) -> DeploymentResult {
        DeploymentResult {
            address: address!("0x5FbDB2315678afecb367f032d93F642f64180aa3"),
            tx_hash: TX_HASH.parse().unwrap(),
            block_number,
        }
    }

    fn mocked_client(asserter: &Asserter) -> RpcChainClient {
        let provider = ProviderBuilder::new()
            .connect_mocked_client(asserter.clone())
            .erased();

        RpcChainClient::from_provider(provider, Address::ZERO, Duration::from_millis(1))
    }

    fn head(block_number: u64) -> String {
        format!("{block_number:#x}")
    }

    fn receipt(block_number: u64, success: bool) -> serde_json::Value {
        json!({
            "type": "0x2",
            "status": if success { "0x1" } else { "0x0" },
            "cumulativeGasUsed": "0x5208",
            "logs": [],
            "logsBloom": format!("0x{}", "0".repeat(512)),
            "transactionHash": TX_HASH,
            "transactionIndex": "0x0",
            "blockHash": "0x4acbdefb861ef4adedb135ca52865f6743451bfbfa35db78076f881a40401a5e",
            "blockNumber": format!("{block_number:#x}"),
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "to": null,
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
        })
    }

    #[tokio::test]
    async fn test_confirmations_counted_from_current_receipt() {
        let asserter = Asserter::new();
        asserter.push_success(&receipt(100, true));
        asserter.push_success(&head(104));
        asserter.push_success(&receipt(100, true));
        asserter.push_success(&head(105));

        mocked_client(&asserter)
            .await_confirmations(&deployment(100), 5)
            .await
            .unwrap();

        assert!(asserter.read_q().is_empty());
    }

    #[tokio::test]
    async fn test_reorged_transaction_is_not_confirmed() {
        let asserter = Asserter::new();
        // Dropped from the chain: the head alone must not confirm it.
        asserter.push_success(&serde_json::Value::Null);
        // Re-included three blocks later.
        asserter.push_success(&receipt(103, true));
        asserter.push_success(&head(105));
        asserter.push_success(&receipt(103, true));
        asserter.push_success(&head(108));

        mocked_client(&asserter)
            .await_confirmations(&deployment(100), 5)
            .await
            .unwrap();

        assert!(asserter.read_q().is_empty());
    }

    #[tokio::test]
    async fn test_missing_receipt_never_confirms() {
        let asserter = Asserter::new();
        asserter.push_success(&serde_json::Value::Null);
        asserter.push_success(&serde_json::Value::Null);

        // Once the queue runs dry the mock fails with a non-retryable error.
        let result = mocked_client(&asserter)
            .await_confirmations(&deployment(100), 5)
            .await;

        assert!(matches!(result, Err(ChainError::Rpc(_))));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let asserter = Asserter::new();
        asserter.push_failure_msg("rate limit exceeded");
        asserter.push_success(&receipt(100, true));
        asserter.push_success(&head(105));

        mocked_client(&asserter)
            .await_confirmations(&deployment(100), 5)
            .await
            .unwrap();

        assert!(asserter.read_q().is_empty());
    }

    #[tokio::test]
    async fn test_permanent_rpc_error_fails_the_wait() {
        let asserter = Asserter::new();
        for _ in 0..10 {
            asserter.push_failure_msg("invalid api key");
        }

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            mocked_client(&asserter).await_confirmations(&deployment(100), 5),
        )
        .await
        .expect("permanent errors must not be retried forever");

        assert!(matches!(result, Err(ChainError::Rpc(_))));
        assert_eq!(asserter.read_q().len(), 9);
    }

    #[tokio::test]
    async fn test_reverted_after_reorg_fails_the_wait() {
        let asserter = Asserter::new();
        asserter.push_success(&receipt(102, false));

        let result = mocked_client(&asserter)
            .await_confirmations(&deployment(100), 5)
            .await;

        let expected = deployment(100).tx_hash;
        assert!(matches!(result, Err(ChainError::Reverted(hash)) if hash == expected));
    }
}
