//! User settings persistence.
//!
//! Stores deployments and authorization preferences in
//! ~/.petlife/config.toml. Settings are loaded with env var > config.toml >
//! default priority (see [`crate::config`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::contract::{CONTRACT_NAME, DeploymentEntry, DeploymentTable};

/// User settings persisted to disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// JSON file holding the contract ABI imported with the deployments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi_path: Option<String>,

    /// Authorization cache preferences.
    #[serde(default)]
    pub authorization: AuthorizationSettings,

    /// Known deployments of the pet contract, one per chain.
    #[serde(default)]
    pub deployments: Vec<DeploymentEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationSettings {
    /// Validity window of new decryption authorizations, in days.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,

    /// Where signed authorizations are kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<String>,
}

/// Root of the per-user state directory (`~/.petlife`).
pub fn petlife_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".petlife")
}

impl Settings {
    /// Default TOML config file path (~/.petlife/config.toml).
    pub fn default_toml_path() -> PathBuf {
        petlife_home().join("config.toml")
    }

    /// Load settings from a TOML file.
    ///
    /// Returns `None` if the file doesn't exist. Returns an error only
    /// if the file exists but can't be parsed.
    pub fn load_toml(path: &Path) -> Result<Option<Self>, String> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("failed to read {}: {}", path.display(), e)),
        };

        toml::from_str(&data)
            .map(Some)
            .map_err(|e| format!("invalid TOML in {}: {}", path.display(), e))
    }

    /// Write the TOML config file with a short header.
    pub fn save_toml(&self, path: &Path) -> Result<(), String> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| format!("failed to serialize settings: {}", e))?;

        let content = format!(
            "# petlife configuration file.\n\
             #\n\
             # Priority: env var > this file > defaults.\n\
             # Run `petlife deployments import <dir> --write` to refresh [[deployments]].\n\
             \n\
             {raw}"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
        }

        std::fs::write(path, content)
            .map_err(|e| format!("failed to write {}: {}", path.display(), e))
    }

    /// Deployments plus the stored ABI. An unreadable ABI file is logged
    /// and left out.
    pub fn deployment_table(&self) -> DeploymentTable {
        let table = DeploymentTable::from_entries(self.deployments.iter().cloned());
        let Some(path) = self.abi_path.as_deref() else {
            return table;
        };

        match read_abi(Path::new(path)) {
            Ok(abi) => table.with_abi(abi),
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Ignoring unreadable contract ABI");
                table
            }
        }
    }

    /// Replace the deployments with the contents of `table`.
    ///
    /// The table's ABI, if any, is written next to `config_path` as
    /// `FHEPetLife.abi.json` and referenced from `abi_path`.
    pub fn set_deployments(
        &mut self,
        table: &DeploymentTable,
        config_path: &Path,
    ) -> Result<(), String> {
        self.deployments = table.entries().cloned().collect();
        self.abi_path = match table.abi() {
            Some(abi) => {
                let path = abi_sidecar_path(config_path);
                write_abi(&path, abi)?;
                Some(path.display().to_string())
            }
            None => None,
        };
        Ok(())
    }
}

fn abi_sidecar_path(config_path: &Path) -> PathBuf {
    config_path.with_file_name(format!("{CONTRACT_NAME}.abi.json"))
}

fn read_abi(path: &Path) -> Result<serde_json::Value, String> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&data).map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))
}

fn write_abi(path: &Path, abi: &serde_json::Value) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
    }
    let raw = serde_json::to_string_pretty(abi)
        .map_err(|e| format!("failed to serialize ABI: {}", e))?;
    std::fs::write(path, raw).map_err(|e| format!("failed to write {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let settings = Settings {
            abi_path: None,
            authorization: AuthorizationSettings {
                duration_days: Some(30),
                store_path: Some("/tmp/auth.json".to_string()),
            },
            deployments: vec![DeploymentEntry {
                chain_id: 11_155_111,
                chain_name: Some("sepolia".to_string()),
                address: Address::repeat_byte(0x11),
            }],
        };

        settings.save_toml(&path).unwrap();
        let loaded = Settings::load_toml(&path).unwrap().unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn toml_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = Settings::load_toml(&dir.path().join("absent.toml"));
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn toml_invalid_content_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml [[[").unwrap();

        assert!(Settings::load_toml(&path).is_err());
    }

    #[test]
    fn toml_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[[deployments]]\nchain_id = 31337\naddress = \"0x1111111111111111111111111111111111111111\"\n",
        )
        .unwrap();

        let loaded = Settings::load_toml(&path).unwrap().unwrap();
        assert_eq!(loaded.authorization, AuthorizationSettings::default());

        let table = loaded.deployment_table();
        let entry = table.get(31_337).unwrap();
        assert_eq!(entry.address, Address::repeat_byte(0x11));
        assert_eq!(entry.chain_name, None);
    }

    #[test]
    fn toml_header_comment_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Settings::default().save_toml(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# petlife configuration file."));
    }

    #[test]
    fn imported_abi_survives_write_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let abi = serde_json::json!([{"type": "function", "name": "levelUp", "inputs": []}]);
        let table = DeploymentTable::from_entries([DeploymentEntry {
            chain_id: 31_337,
            chain_name: Some("hardhat".to_string()),
            address: Address::repeat_byte(0x11),
        }])
        .with_abi(abi.clone());

        let mut settings = Settings::default();
        settings.set_deployments(&table, &path).unwrap();
        settings.save_toml(&path).unwrap();

        let loaded = Settings::load_toml(&path).unwrap().unwrap();
        let reloaded = loaded.deployment_table();
        assert_eq!(reloaded.abi(), Some(&abi));
        assert_eq!(reloaded.get(31_337), table.get(31_337));
        assert!(dir.path().join("FHEPetLife.abi.json").exists());
    }

    #[test]
    fn table_without_abi_clears_stale_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut settings = Settings {
            abi_path: Some("/nonexistent/FHEPetLife.abi.json".to_string()),
            ..Settings::default()
        };

        settings
            .set_deployments(&DeploymentTable::default(), &path)
            .unwrap();
        assert_eq!(settings.abi_path, None);
    }

    #[test]
    fn missing_abi_file_is_ignored() {
        let settings = Settings {
            abi_path: Some("/nonexistent/FHEPetLife.abi.json".to_string()),
            ..Settings::default()
        };
        assert!(settings.deployment_table().abi().is_none());
    }

    #[test]
    fn default_toml_path_under_petlife() {
        let path = Settings::default_toml_path();
        assert!(path.to_string_lossy().contains(".petlife"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }
}
