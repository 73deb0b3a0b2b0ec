//! Loading of compiled Hardhat artifacts.
//!
//! A contract artifact (`artifacts/contracts/Foo.sol/Foo.json`) carries the
//! creation bytecode. The compiler input needed for verification lives in the
//! build-info file that the sibling `Foo.dbg.json` points to.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use crate::verification::SourceBundle;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    source_name: String,
    bytecode: Bytes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildInfo {
    solc_long_version: String,
    input: Value,
}

/// A compiled contract ready to be deployed and verified.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    /// Contract name, e.g. `ETHMessenger`.
    pub contract_name: String,
    /// Source file the contract is declared in, e.g. `contracts/ETHMessenger.sol`.
    pub source_name: String,
    /// Creation bytecode.
    pub bytecode: Bytes,
    /// Full solc version, e.g. `0.8.24+commit.e11b9ed9`.
    pub solc_long_version: String,
    /// solc standard-JSON input the contract was compiled from.
    pub compiler_input: Value,
}

impl ContractArtifact {
    /// Load an artifact and its build info.
    pub fn load(path: &Path) -> Result<Self> {
        let artifact: HardhatArtifact = read_json(path)?;

        if artifact.bytecode.is_empty() {
            anyhow::bail!(
                "Artifact {} has no bytecode (abstract contract or interface?)",
                path.display()
            );
        }

        let debug_path = path.with_extension("dbg.json");
        let debug: DebugFile = read_json(&debug_path)?;

        let build_info_path = debug_path
            .parent()
            .map(|dir| dir.join(&debug.build_info))
            .unwrap_or(debug.build_info);
        let build_info: BuildInfo = read_json(&build_info_path)?;

        tracing::debug!(
            contract = %artifact.contract_name,
            source = %artifact.source_name,
            solc = %build_info.solc_long_version,
            bytecode_len = artifact.bytecode.len(),
            "Loaded contract artifact"
        );

        Ok(Self {
            contract_name: artifact.contract_name,
            source_name: artifact.source_name,
            bytecode: artifact.bytecode,
            solc_long_version: build_info.solc_long_version,
            compiler_input: build_info.input,
        })
    }

    /// `source:Contract`, the name explorers use to pick the contract out of the input.
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// Material the explorer needs to rebuild and match the bytecode.
    pub fn source_bundle(&self) -> Result<SourceBundle> {
        let standard_json_input = serde_json::to_string(&self.compiler_input)
            .context("Failed to serialize compiler input")?;

        Ok(SourceBundle {
            contract_name: self.fully_qualified_name(),
            compiler_version: format!("v{}", self.solc_long_version),
            standard_json_input,
        })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    /// Lay out a minimal Hardhat `artifacts/` tree and return the artifact path.
    fn write_artifacts(root: &Path, bytecode: &str) -> PathBuf {
        let contract_dir = root.join("artifacts/contracts/ETHMessenger.sol");
        let build_info_dir = root.join("artifacts/build-info");
        std::fs::create_dir_all(&contract_dir).unwrap();
        std::fs::create_dir_all(&build_info_dir).unwrap();

        let artifact_path = contract_dir.join("ETHMessenger.json");
        std::fs::write(
            &artifact_path,
            serde_json::json!({
                "_format": "hh-sol-artifact-1",
                "contractName": "ETHMessenger",
                "sourceName": "contracts/ETHMessenger.sol",
                "abi": [],
                "bytecode": bytecode,
                "deployedBytecode": "0x",
                "linkReferences": {},
                "deployedLinkReferences": {}
            })
            .to_string(),
        )
        .unwrap();

        std::fs::write(
            contract_dir.join("ETHMessenger.dbg.json"),
            r#"{"_format":"hh-sol-dbg-1","buildInfo":"../../build-info/4f2a.json"}"#,
        )
        .unwrap();

        std::fs::write(
            build_info_dir.join("4f2a.json"),
            serde_json::json!({
                "_format": "hh-sol-build-info-1",
                "solcVersion": "0.8.24",
                "solcLongVersion": "0.8.24+commit.e11b9ed9",
                "input": {
                    "language": "Solidity",
                    "sources": { "contracts/ETHMessenger.sol": { "content": "contract ETHMessenger {}" } },
                    "settings": { "optimizer": { "enabled": true, "runs": 200 } }
                },
                "output": {}
            })
            .to_string(),
        )
        .unwrap();

        artifact_path
    }

    #[test]
    fn test_load_artifact_with_build_info() {
        let dir = TempDir::new("shipyard-artifact").unwrap();
        let path = write_artifacts(dir.path(), "0x6080604052");

        let artifact = ContractArtifact::load(&path).unwrap();

        assert_eq!(artifact.contract_name, "ETHMessenger");
        assert_eq!(artifact.bytecode, Bytes::from_static(&[0x60, 0x80, 0x60, 0x40, 0x52]));
        assert_eq!(artifact.solc_long_version, "0.8.24+commit.e11b9ed9");
        assert_eq!(
            artifact.fully_qualified_name(),
            "contracts/ETHMessenger.sol:ETHMessenger"
        );
    }

    #[test]
    fn test_source_bundle() {
        let dir = TempDir::new("shipyard-artifact").unwrap();
        let path = write_artifacts(dir.path(), "0x6080604052");

        let bundle = ContractArtifact::load(&path).unwrap().source_bundle().unwrap();

        assert_eq!(bundle.compiler_version, "v0.8.24+commit.e11b9ed9");
        assert_eq!(bundle.contract_name, "contracts/ETHMessenger.sol:ETHMessenger");

        let input: Value = serde_json::from_str(&bundle.standard_json_input).unwrap();
        assert_eq!(input["language"], "Solidity");
        assert_eq!(input["settings"]["optimizer"]["runs"], 200);
    }

    #[test]
    fn test_load_rejects_empty_bytecode() {
        let dir = TempDir::new("shipyard-artifact").unwrap();
        let path = write_artifacts(dir.path(), "0x");

        let err = ContractArtifact::load(&path).unwrap_err();
        assert!(err.to_string().contains("has no bytecode"));
    }

    #[test]
    fn test_load_missing_artifact() {
        let dir = TempDir::new("shipyard-artifact").unwrap();

        let err = ContractArtifact::load(&dir.path().join("Missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
