//! Block-explorer source verification.
//!
//! Verification is best effort: every error ends up as a [`VerificationOutcome`]
//! through [`classify`], and never fails a deployment.

mod etherscan;

use std::{fmt, future::Future};

use alloy_core::primitives::{Address, Bytes};

pub use etherscan::{EtherscanVerifier, SourceBundle};

/// Phrase explorers use when the submitted contract is already verified.
const ALREADY_VERIFIED: &str = "already verified";

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// The explorer already holds verified source for this address.
    #[error("Already Verified")]
    AlreadyVerified,

    /// The explorer refused the submission or failed to match the bytecode.
    #[error("{0}")]
    Rejected(String),

    #[error("explorer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected explorer response: {0}")]
    UnexpectedResponse(String),

    #[error("verification still pending after {0} status checks")]
    StatusTimeout(u32),
}

/// Service that publishes a deployed contract's source.
pub trait VerificationService: Send + Sync {
    /// Submit the source of the contract at `address`.
    fn verify(
        &self,
        address: Address,
        constructor_args: &Bytes,
    ) -> impl Future<Output = Result<(), VerificationError>> + Send;
}

/// Final verification status of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    AlreadyVerified,
    Failed { reason: String },
    /// Verification was turned off for this run.
    Skipped,
}

impl VerificationOutcome {
    /// Whether the contract ends up with public source on the explorer.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Verified | Self::AlreadyVerified)
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified => write!(f, "Contract verified successfully!"),
            Self::AlreadyVerified => write!(f, "Contract already verified!"),
            Self::Failed { reason } => write!(f, "Verification failed: {reason}"),
            Self::Skipped => write!(f, "Verification skipped"),
        }
    }
}

/// Turn a verification attempt into its outcome.
///
/// A typed [`VerificationError::AlreadyVerified`] wins. Otherwise the error
/// text is searched for the explorer's "already verified" wording, since not
/// every explorer reports it through a distinct status.
pub fn classify(result: Result<(), VerificationError>) -> VerificationOutcome {
    match result {
        Ok(()) => VerificationOutcome::Verified,
        Err(VerificationError::AlreadyVerified) => VerificationOutcome::AlreadyVerified,
        Err(e) => {
            let reason = e.to_string();
            if mentions_already_verified(&reason) {
                VerificationOutcome::AlreadyVerified
            } else {
                VerificationOutcome::Failed { reason }
            }
        }
    }
}

/// Case-insensitive search for the "already verified" wording.
pub(crate) fn mentions_already_verified(message: &str) -> bool {
    message.to_ascii_lowercase().contains(ALREADY_VERIFIED)
}
