//! `petlife deployments` - import hardhat deployment artifacts.

use std::path::{Path, PathBuf};

use clap::Subcommand;

use crate::config::Config;
use crate::contract::DeploymentTable;

#[derive(Subcommand, Debug, Clone)]
pub enum DeploymentsCommand {
    /// Read `<dir>/<network>/FHEPetLife.json` for every known network.
    Import {
        /// hardhat-deploy output directory (usually `deployments/`)
        dir: PathBuf,

        /// Store the imported table in the config file
        #[arg(long)]
        write: bool,
    },

    /// List the deployments from the config file
    List,
}

pub fn run_deployments_command(
    config_path: Option<&Path>,
    command: DeploymentsCommand,
) -> anyhow::Result<()> {
    match command {
        DeploymentsCommand::Import { dir, write } => import(config_path, &dir, write),
        DeploymentsCommand::List => {
            let config = Config::from_env_with_toml(config_path)?;
            print_table(&config.deployments);
            Ok(())
        }
    }
}

fn import(config_path: Option<&Path>, dir: &Path, write: bool) -> anyhow::Result<()> {
    let table = DeploymentTable::import_hardhat(dir)?;
    print_table(&table);

    if !write {
        println!("\n  Dry run. Re-run with --write to save.");
        return Ok(());
    }

    let (path, _) = Config::settings_path(config_path)?;
    let mut settings = Config::load_settings(config_path)?;
    settings
        .set_deployments(&table, &path)
        .map_err(|e| anyhow::anyhow!(e))?;
    settings
        .save_toml(&path)
        .map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(path = %path.display(), deployments = table.entries().count(), "Deployments written");
    println!("\n  Wrote {}", path.display());
    Ok(())
}

fn print_table(table: &DeploymentTable) {
    if table.is_empty() {
        println!("  No deployments configured.");
        return;
    }
    for line in describe_table(table) {
        println!("{line}");
    }
}

fn describe_table(table: &DeploymentTable) -> Vec<String> {
    table
        .entries()
        .map(|entry| {
            format!(
                "  {:>10}  {:<10}  {}",
                entry.chain_id,
                entry.chain_name.as_deref().unwrap_or("-"),
                entry.address
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;

    use super::*;
    use crate::contract::DeploymentEntry;

    #[test]
    fn table_lines_are_ordered_by_chain_id() {
        let table = DeploymentTable::from_entries([
            DeploymentEntry {
                chain_id: 11_155_111,
                chain_name: Some("sepolia".to_string()),
                address: Address::repeat_byte(0x02),
            },
            DeploymentEntry {
                chain_id: 31_337,
                chain_name: None,
                address: Address::repeat_byte(0x01),
            },
        ]);

        let lines = describe_table(&table);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("31337"));
        assert!(lines[0].contains(" - "));
        assert!(lines[1].contains("sepolia"));
    }
}
