//! Chain client abstraction used by the orchestrator.
//!
//! The orchestrator never talks to a node directly. It drives a [`ChainClient`],
//! which owns transaction submission, fee and nonce handling, and the
//! confirmation wait.

mod rpc;

use std::future::Future;

use alloy::{
    providers::PendingTransactionError,
    transports::{RpcError, TransportError},
};
use alloy_core::primitives::{Address, Bytes, TxHash};

pub use rpc::RpcChainClient;

/// Everything needed to submit a contract-creation transaction.
///
/// The target network is implied by the [`ChainClient`] the request is handed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    /// Creation bytecode of the contract.
    pub bytecode: Bytes,
    /// ABI-encoded constructor arguments, appended to the bytecode.
    pub constructor_args: Bytes,
}

impl DeploymentRequest {
    /// A request for a contract whose constructor takes no arguments.
    pub fn new(bytecode: Bytes) -> Self {
        Self {
            bytecode,
            constructor_args: Bytes::new(),
        }
    }

    /// The transaction input: creation bytecode followed by constructor arguments.
    pub fn init_code(&self) -> Bytes {
        let mut code = Vec::with_capacity(self.bytecode.len() + self.constructor_args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(&self.constructor_args);
        code.into()
    }
}

/// Outcome of a successful contract-creation transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentResult {
    /// Address of the created contract.
    pub address: Address,
    /// Hash of the creation transaction.
    pub tx_hash: TxHash,
    /// Block in which the creation transaction was included.
    pub block_number: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("rpc request failed")]
    Rpc(#[from] TransportError),

    #[error("failed to watch transaction")]
    PendingTransaction(#[from] PendingTransactionError),

    #[error("refusing to deploy empty bytecode")]
    EmptyBytecode,

    #[error("deployment transaction {0} reverted")]
    Reverted(TxHash),

    #[error("receipt of {0} carries no contract address")]
    MissingContractAddress(TxHash),

    #[error("receipt of {0} carries no block number")]
    MissingBlockNumber(TxHash),
}

impl ChainError {
    /// Whether retrying the same request may succeed, such as rate limiting
    /// or a temporarily unavailable node.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Rpc(RpcError::Transport(kind)) => kind.is_retry_err(),
            Self::Rpc(RpcError::ErrorResp(payload)) => payload.is_retry_err(),
            _ => false,
        }
    }
}

/// Network boundary for deploying a contract and watching it settle.
pub trait ChainClient: Send + Sync {
    /// Submit a contract-creation transaction and wait for its inclusion.
    fn deploy(
        &self,
        request: &DeploymentRequest,
    ) -> impl Future<Output = Result<DeploymentResult, ChainError>> + Send;

    /// Address of the contract created by `result`.
    fn address(&self, result: &DeploymentResult) -> Address {
        result.address
    }

    /// Resolve once `confirmations` blocks sit on top of the block that
    /// currently includes the deployment transaction.
    ///
    /// The inclusion is re-checked on every poll, so a transaction that is
    /// reorganized out is not counted as confirmed.
    fn await_confirmations(
        &self,
        result: &DeploymentResult,
        confirmations: u64,
    ) -> impl Future<Output = Result<(), ChainError>> + Send;
}

/// Number of blocks mined on top of `inclusion_block` when the head is `head`.
pub fn confirmations_at(inclusion_block: u64, head: u64) -> u64 {
    head.saturating_sub(inclusion_block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_code_appends_constructor_args() {
        let request = DeploymentRequest {
            bytecode: Bytes::from_static(&[0x60, 0x80]),
            constructor_args: Bytes::from_static(&[0x01, 0x02]),
        };

        assert_eq!(request.init_code(), Bytes::from_static(&[0x60, 0x80, 0x01, 0x02]));
    }

    #[test]
    fn test_new_request_has_no_constructor_args() {
        let request = DeploymentRequest::new(Bytes::from_static(&[0x60, 0x80]));

        assert!(request.constructor_args.is_empty());
        assert_eq!(request.init_code(), request.bytecode);
    }

    #[test]
    fn test_transient_errors() {
        use alloy::transports::TransportErrorKind;

        let http = |status| ChainError::from(TransportErrorKind::http_error(status, String::new()));

        assert!(http(429).is_transient());
        assert!(http(503).is_transient());
        assert!(!http(401).is_transient());
        assert!(!ChainError::EmptyBytecode.is_transient());
        assert!(!ChainError::Reverted(TxHash::ZERO).is_transient());
    }

    #[test]
    fn test_confirmations_at() {
        assert_eq!(confirmations_at(100, 100), 0);
        assert_eq!(confirmations_at(100, 105), 5);
        // A lagging node may report a head below the inclusion block.
        assert_eq!(confirmations_at(100, 98), 0);
    }
}
