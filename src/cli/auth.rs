//! `petlife auth` - inspect the decryption authorization cache.

use std::path::Path;
use std::sync::Arc;

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use clap::Subcommand;

use crate::config::Config;
use crate::fhe::{DecryptionAuthorization, DecryptionAuthorizationCache};
use crate::store::FileStore;

#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommand {
    /// List cached authorizations
    List,

    /// Remove cached authorizations
    Clear {
        /// Only remove authorizations issued to this signer
        #[arg(long)]
        signer: Option<Address>,
    },
}

pub async fn run_auth_command(
    config_path: Option<&Path>,
    command: AuthCommand,
) -> anyhow::Result<()> {
    let config = Config::from_env_with_toml(config_path)?;
    let store = Arc::new(FileStore::new(&config.authorization.store_path));
    let cache = DecryptionAuthorizationCache::new(store, config.authorization.duration_days);

    match command {
        AuthCommand::List => {
            let authorizations = cache.list().await?;
            println!(
                "Decryption authorizations ({})",
                config.authorization.store_path.display()
            );
            if authorizations.is_empty() {
                println!("  none");
            }
            let now = Utc::now();
            for authorization in &authorizations {
                println!("{}", describe_authorization(authorization, now));
            }
        }
        AuthCommand::Clear { signer } => {
            let removed = cache.clear(signer).await?;
            tracing::info!(removed, signer = ?signer, "Authorizations cleared");
            println!("  Removed {removed} authorization(s).");
        }
    }
    Ok(())
}

fn describe_authorization(authorization: &DecryptionAuthorization, now: DateTime<Utc>) -> String {
    let status = if authorization.is_valid_at(now) {
        "valid"
    } else {
        "expired"
    };
    let expires = DateTime::from_timestamp(authorization.expires_at(), 0)
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| authorization.expires_at().to_string());
    let contracts = authorization
        .contract_addresses
        .iter()
        .map(|address| address.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "  [{status}] {user} until {expires}\n           contracts: {contracts}",
        user = authorization.user_address,
    )
}
