//! Deployment lookup table and hardhat-deploy artifact import.

use std::collections::BTreeMap;
use std::path::Path;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use super::CONTRACT_NAME;
use super::binding::InterfaceDescriptor;
use crate::error::ConfigError;

/// Networks probed when importing a hardhat `deployments/` directory.
const HARDHAT_NETWORKS: &[(&str, u64, &str)] = &[
    ("localhost", 31_337, "hardhat"),
    ("sepolia", 11_155_111, "sepolia"),
];

/// One chain's deployment of the pet contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentEntry {
    pub chain_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_name: Option<String>,
    pub address: Address,
}

/// Static chain id -> deployment lookup table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentTable {
    entries: BTreeMap<u64, DeploymentEntry>,
    abi: Option<serde_json::Value>,
}

impl DeploymentTable {
    pub fn from_entries(entries: impl IntoIterator<Item = DeploymentEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.chain_id, entry))
                .collect(),
            abi: None,
        }
    }

    pub fn with_abi(mut self, abi: serde_json::Value) -> Self {
        self.abi = Some(abi);
        self
    }

    pub fn get(&self, chain_id: u64) -> Option<&DeploymentEntry> {
        self.entries.get(&chain_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &DeploymentEntry> {
        self.entries.values()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn abi(&self) -> Option<&serde_json::Value> {
        self.abi.as_ref()
    }

    pub fn interface(&self) -> InterfaceDescriptor {
        InterfaceDescriptor {
            contract_name: CONTRACT_NAME.to_string(),
            abi: self.abi.clone(),
        }
    }

    /// Import deployments written by `hardhat deploy`.
    ///
    /// Every network is optional, but at least one must be present. When
    /// several are found with different ABIs, the first network's ABI wins.
    pub fn import_hardhat(deployments_dir: &Path) -> Result<Self, ConfigError> {
        let mut table = Self::default();

        for (network, chain_id, chain_name) in HARDHAT_NETWORKS {
            let Some(artifact) = read_hardhat_artifact(deployments_dir, network, *chain_id)? else {
                continue;
            };

            tracing::info!(
                network = %network,
                chain_id = %chain_id,
                address = %artifact.address,
                "Found {CONTRACT_NAME} deployment"
            );

            match (&table.abi, artifact.abi) {
                (None, Some(abi)) => table.abi = Some(abi),
                (Some(existing), Some(abi)) if *existing != abi => {
                    tracing::warn!(
                        network = %network,
                        "Deployment ABIs differ between networks; keeping the first one found"
                    );
                }
                _ => {}
            }

            table.entries.insert(
                *chain_id,
                DeploymentEntry {
                    chain_id: *chain_id,
                    chain_name: Some((*chain_name).to_string()),
                    address: artifact.address,
                },
            );
        }

        if table.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: format!("{}/<network>/{CONTRACT_NAME}.json", deployments_dir.display()),
                hint: "Deploy the contract with `npx hardhat deploy --network localhost` or `--network sepolia` first.".to_string(),
            });
        }

        Ok(table)
    }
}

#[derive(Debug, Deserialize)]
struct HardhatArtifact {
    address: Address,
    #[serde(default)]
    abi: Option<serde_json::Value>,
}

fn read_hardhat_artifact(
    deployments_dir: &Path,
    network: &str,
    chain_id: u64,
) -> Result<Option<HardhatArtifact>, ConfigError> {
    let path = deployments_dir
        .join(network)
        .join(format!("{CONTRACT_NAME}.json"));

    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                network = %network,
                chain_id = %chain_id,
                "Skipping network: deployment not found"
            );
            return Ok(None);
        }
        Err(e) => return Err(ConfigError::Io(e)),
    };

    match serde_json::from_str(&data) {
        Ok(artifact) => Ok(Some(artifact)),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Skipping network: unreadable deployment file"
            );
            Ok(None)
        }
    }
}
