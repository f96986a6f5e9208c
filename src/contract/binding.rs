//! Chain id -> contract binding resolution.

use std::sync::Arc;

use alloy_primitives::Address;
use serde::Serialize;

use super::CONTRACT_NAME;
use super::deployments::DeploymentTable;

/// Contract interface description carried by every binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceDescriptor {
    pub contract_name: String,
    /// ABI JSON from the deployment artifact, when one was imported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abi: Option<serde_json::Value>,
}

impl Default for InterfaceDescriptor {
    fn default() -> Self {
        Self {
            contract_name: CONTRACT_NAME.to_string(),
            abi: None,
        }
    }
}

/// Where the pet contract lives on a given chain, if anywhere.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractBinding {
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
    pub chain_name: Option<String>,
    pub interface: InterfaceDescriptor,
}

impl ContractBinding {
    fn unresolved(interface: InterfaceDescriptor) -> Self {
        Self {
            address: None,
            chain_id: None,
            chain_name: None,
            interface,
        }
    }

    pub fn is_deployed(&self) -> bool {
        self.address.is_some_and(|address| address != Address::ZERO)
    }

    /// Deployed address, if the binding is usable for contract calls.
    pub fn deployed_address(&self) -> Option<Address> {
        self.address.filter(|address| *address != Address::ZERO)
    }

    /// Warning to surface when the chain is known but has no deployment.
    ///
    /// While the chain id is still unknown (initial wallet load) there is
    /// nothing to warn about.
    pub fn deployment_warning(&self) -> Option<String> {
        match (self.chain_id, self.is_deployed()) {
            (Some(chain_id), false) => Some(format!(
                "{} deployment not found for chainId={chain_id}.",
                self.interface.contract_name
            )),
            _ => None,
        }
    }
}

/// Resolves bindings from a static deployment table.
#[derive(Debug, Clone, Default)]
pub struct ContractBindingResolver {
    table: Arc<DeploymentTable>,
}

impl ContractBindingResolver {
    pub fn new(table: DeploymentTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> &DeploymentTable {
        &self.table
    }

    pub fn resolve(&self, chain_id: Option<u64>) -> ContractBinding {
        let interface = self.table.interface();
        let Some(chain_id) = chain_id else {
            return ContractBinding::unresolved(interface);
        };

        match self.table.get(chain_id) {
            Some(entry) if entry.address != Address::ZERO => ContractBinding {
                address: Some(entry.address),
                chain_id: Some(entry.chain_id),
                chain_name: entry.chain_name.clone(),
                interface,
            },
            _ => ContractBinding {
                chain_id: Some(chain_id),
                ..ContractBinding::unresolved(interface)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::deployments::DeploymentEntry;

    fn resolver() -> ContractBindingResolver {
        ContractBindingResolver::new(DeploymentTable::from_entries([
            DeploymentEntry {
                chain_id: 11_155_111,
                chain_name: Some("sepolia".to_string()),
                address: Address::repeat_byte(0x42),
            },
            DeploymentEntry {
                chain_id: 1,
                chain_name: Some("mainnet".to_string()),
                address: Address::ZERO,
            },
        ]))
    }

    #[test]
    fn unknown_chain_id_yields_interface_only() {
        let binding = resolver().resolve(None);
        assert_eq!(binding.address, None);
        assert_eq!(binding.chain_id, None);
        assert!(!binding.is_deployed());
        assert_eq!(binding.deployment_warning(), None);
        assert_eq!(binding.interface.contract_name, "FHEPetLife");
    }

    #[test]
    fn missing_entry_and_zero_address_are_not_deployed() {
        for chain_id in [31_337, 1] {
            let binding = resolver().resolve(Some(chain_id));
            assert_eq!(binding.chain_id, Some(chain_id));
            assert_eq!(binding.address, None);
            assert!(!binding.is_deployed());
            let warning = binding.deployment_warning().unwrap();
            assert!(warning.contains("not found"));
            assert!(warning.contains(&chain_id.to_string()));
        }
    }

    #[test]
    fn known_chain_resolves_fully() {
        let binding = resolver().resolve(Some(11_155_111));
        assert_eq!(binding.address, Some(Address::repeat_byte(0x42)));
        assert_eq!(binding.chain_name.as_deref(), Some("sepolia"));
        assert!(binding.is_deployed());
        assert_eq!(binding.deployment_warning(), None);
    }
}
