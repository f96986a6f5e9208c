//! `petlife binding` - show where the pet contract lives on a chain.

use std::path::Path;

use crate::config::Config;
use crate::contract::{ContractBinding, ContractBindingResolver};

pub fn run_binding_command(
    config_path: Option<&Path>,
    chain_id: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::from_env_with_toml(config_path)?;
    let resolver = ContractBindingResolver::new(config.deployments);
    let binding = resolver.resolve(chain_id);

    if json {
        println!("{}", serde_json::to_string_pretty(&binding)?);
        return Ok(());
    }

    for line in describe_binding(&binding) {
        println!("{line}");
    }
    Ok(())
}

fn describe_binding(binding: &ContractBinding) -> Vec<String> {
    let mut lines = vec![format!("{} binding", binding.interface.contract_name)];

    let chain = match (binding.chain_id, binding.chain_name.as_deref()) {
        (Some(id), Some(name)) => format!("{id} ({name})"),
        (Some(id), None) => id.to_string(),
        (None, _) => "unknown".to_string(),
    };
    lines.push(format!("  chain:    {chain}"));

    let address = binding
        .deployed_address()
        .map(|address| address.to_string())
        .unwrap_or_else(|| "-".to_string());
    lines.push(format!("  address:  {address}"));
    lines.push(format!(
        "  abi:      {}",
        if binding.interface.abi.is_some() {
            "imported"
        } else {
            "not imported"
        }
    ));

    if let Some(warning) = binding.deployment_warning() {
        lines.push(String::new());
        lines.push(format!("  [warn] {warning}"));
    }
    lines
}
