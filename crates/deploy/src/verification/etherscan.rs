//! Verification through the Etherscan-compatible explorer API (BaseScan and friends).
//!
//! One verification attempt is three steps: look up whether the address
//! already has source, submit the standard-JSON compiler input, then poll the
//! submission status until the explorer settles on a result.

use std::time::Duration;

use alloy_core::primitives::{Address, Bytes};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{VerificationError, VerificationService, mentions_already_verified};
use crate::{config::VerificationConfig, net};

/// Status result returned while the explorer has not processed the submission.
const PENDING_IN_QUEUE: &str = "Pending in queue";

/// Status result returned when the bytecode matched.
const PASS_VERIFIED: &str = "Pass - Verified";

/// Source material submitted to the explorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBundle {
    /// Fully qualified name, `path/to/Source.sol:Contract`.
    pub contract_name: String,
    /// Compiler version as the explorer expects it, e.g. `v0.8.24+commit.e11b9ed9`.
    pub compiler_version: String,
    /// Serialized solc standard-JSON input.
    pub standard_json_input: String,
}

/// Envelope of every Etherscan API response.
#[derive(Debug, Clone, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: Value,
}

impl ExplorerResponse {
    fn is_ok(&self) -> bool {
        self.status == "1"
    }

    /// The `result` field as text, or the envelope message when it is not a string.
    fn result_text(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            _ => self.message.clone(),
        }
    }
}

/// State of a submitted verification.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StatusCheck {
    Pending,
    Verified,
}

/// Verifier speaking the Etherscan v2 multichain API.
pub struct EtherscanVerifier {
    client: reqwest::Client,
    api_url: Url,
    api_key: String,
    chain_id: u64,
    source: SourceBundle,
    status_poll_interval: Duration,
    max_status_checks: u32,
}

impl EtherscanVerifier {
    pub fn new(
        config: &VerificationConfig,
        chain_id: u64,
        source: SourceBundle,
    ) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .map(|key| key.expose().to_string())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No explorer API key configured (set BASESCAN_API_KEY or verification.api_key)"
                )
            })?;

        Ok(Self {
            client: net::create_client()?,
            api_url: config.api_url.clone(),
            api_key,
            chain_id,
            source,
            status_poll_interval: Duration::from_secs(config.status_poll_interval_secs),
            max_status_checks: config.max_status_checks,
        })
    }

    async fn get(&self, query: &[(&str, &str)]) -> Result<ExplorerResponse, VerificationError> {
        let chain_id = self.chain_id.to_string();
        let response = self
            .client
            .get(self.api_url.clone())
            .query(&[("chainid", chain_id.as_str()), ("apikey", self.api_key.as_str())])
            .query(query)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn is_verified(&self, address: Address) -> Result<bool, VerificationError> {
        let address = address.to_string();
        let response = self
            .get(&[
                ("module", "contract"),
                ("action", "getsourcecode"),
                ("address", address.as_str()),
            ])
            .await?;

        parse_source_lookup(&response)
    }

    async fn submit(
        &self,
        address: Address,
        constructor_args: &Bytes,
    ) -> Result<String, VerificationError> {
        let chain_id = self.chain_id.to_string();
        let address = address.to_string();
        let constructor_args = hex::encode(constructor_args);

        let response: ExplorerResponse = self
            .client
            .post(self.api_url.clone())
            .query(&[("chainid", chain_id.as_str())])
            .form(&[
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", "verifysourcecode"),
                ("contractaddress", address.as_str()),
                ("sourceCode", self.source.standard_json_input.as_str()),
                ("codeformat", "solidity-standard-json-input"),
                ("contractname", self.source.contract_name.as_str()),
                ("compilerversion", self.source.compiler_version.as_str()),
                // Etherscan's spelling.
                ("constructorArguements", constructor_args.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_submission(&response)
    }

    async fn check_status(&self, guid: &str) -> Result<StatusCheck, VerificationError> {
        let response = self
            .get(&[
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .await?;

        parse_status(&response)
    }
}

impl VerificationService for EtherscanVerifier {
    async fn verify(
        &self,
        address: Address,
        constructor_args: &Bytes,
    ) -> Result<(), VerificationError> {
        if self.is_verified(address).await? {
            return Err(VerificationError::AlreadyVerified);
        }

        let guid = self.submit(address, constructor_args).await?;
        tracing::debug!(guid = %guid, address = %address, "Verification submitted");

        for attempt in 1..=self.max_status_checks {
            tokio::time::sleep(self.status_poll_interval).await;

            match self.check_status(&guid).await? {
                StatusCheck::Verified => return Ok(()),
                StatusCheck::Pending => {
                    tracing::debug!(guid = %guid, attempt, "Verification pending");
                }
            }
        }

        Err(VerificationError::StatusTimeout(self.max_status_checks))
    }
}

/// Interpret a `getsourcecode` response: `true` when source is already published.
fn parse_source_lookup(response: &ExplorerResponse) -> Result<bool, VerificationError> {
    if !response.is_ok() {
        return Err(VerificationError::Rejected(response.result_text()));
    }

    let entry = response
        .result
        .as_array()
        .and_then(|entries| entries.first())
        .ok_or_else(|| VerificationError::UnexpectedResponse(response.result.to_string()))?;

    Ok(entry
        .get("SourceCode")
        .and_then(Value::as_str)
        .is_some_and(|source| !source.is_empty()))
}

/// Interpret a `verifysourcecode` response, returning the submission GUID.
fn parse_submission(response: &ExplorerResponse) -> Result<String, VerificationError> {
    let text = response.result_text();

    if response.is_ok() {
        return Ok(text);
    }

    if mentions_already_verified(&text) {
        Err(VerificationError::AlreadyVerified)
    } else {
        Err(VerificationError::Rejected(text))
    }
}

/// Interpret a `checkverifystatus` response.
fn parse_status(response: &ExplorerResponse) -> Result<StatusCheck, VerificationError> {
    let text = response.result_text();

    if text == PENDING_IN_QUEUE {
        Ok(StatusCheck::Pending)
    } else if text == PASS_VERIFIED || (response.is_ok() && text.starts_with("Pass")) {
        Ok(StatusCheck::Verified)
    } else if mentions_already_verified(&text) {
        Err(VerificationError::AlreadyVerified)
    } else {
        Err(VerificationError::Rejected(text))
    }
}
