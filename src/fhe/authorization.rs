//! Decryption authorization lifecycle.
//!
//! Decrypting a handle requires an EIP-712 signature from the wallet over an
//! ephemeral public key, a set of contract addresses and a validity window.
//! Prompting for that signature on every decrypt is unacceptable, so signed
//! authorizations are persisted per (signer, contract set) and reused until
//! they expire.

use std::fmt;
use std::sync::Arc;

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

use super::{EphemeralKeypair, FheEngine};
use crate::contract::WalletSigner;
use crate::error::{AuthorizationError, StoreError};
use crate::store::KeyValueStore;

/// Validity window of newly issued authorizations.
pub const DEFAULT_DURATION_DAYS: u32 = 365;

const STORAGE_KEY_PREFIX: &str = "fhevm.decryption_signature.";
const SECONDS_PER_DAY: i64 = 86_400;

/// A signed, time-boxed permission to decrypt ciphertexts of a contract set.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptionAuthorization {
    pub public_key: String,
    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub private_key: SecretString,
    pub signature: String,
    /// Sorted, deduplicated.
    pub contract_addresses: Vec<Address>,
    pub user_address: Address,
    /// Unix seconds.
    pub start_timestamp: i64,
    pub duration_days: u32,
}

impl fmt::Debug for DecryptionAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionAuthorization")
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .field("signature", &self.signature)
            .field("contract_addresses", &self.contract_addresses)
            .field("user_address", &self.user_address)
            .field("start_timestamp", &self.start_timestamp)
            .field("duration_days", &self.duration_days)
            .finish()
    }
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

impl DecryptionAuthorization {
    /// First second at which the authorization is no longer valid.
    pub fn expires_at(&self) -> i64 {
        self.start_timestamp
            .saturating_add(i64::from(self.duration_days).saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let now = now.timestamp();
        self.start_timestamp <= now && now < self.expires_at()
    }

    /// Whether this authorization was issued for exactly this signer and
    /// contract set. `contract_addresses` must already be normalized.
    pub fn matches(&self, user_address: Address, contract_addresses: &[Address]) -> bool {
        self.user_address == user_address && self.contract_addresses == contract_addresses
    }

    pub fn keypair(&self) -> EphemeralKeypair {
        EphemeralKeypair {
            public_key: self.public_key.clone(),
            private_key: self.private_key.clone(),
        }
    }
}

/// Sort and deduplicate a contract-address set so comparisons are
/// order-independent.
pub fn normalize_contract_set(contract_addresses: &[Address]) -> Vec<Address> {
    let mut set = contract_addresses.to_vec();
    set.sort();
    set.dedup();
    set
}

/// Store key for a signer and a normalized contract set.
pub fn storage_key(user_address: Address, contract_addresses: &[Address]) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(user_address.as_slice());
    for address in contract_addresses {
        hasher.update(address.as_slice());
    }
    format!("{STORAGE_KEY_PREFIX}{}", hex::encode(hasher.finalize()))
}

/// Loads, validates and (re)issues decryption authorizations.
#[derive(Clone)]
pub struct DecryptionAuthorizationCache {
    store: Arc<dyn KeyValueStore>,
    duration_days: u32,
}

impl fmt::Debug for DecryptionAuthorizationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionAuthorizationCache")
            .field("duration_days", &self.duration_days)
            .finish_non_exhaustive()
    }
}

impl DecryptionAuthorizationCache {
    pub fn new(store: Arc<dyn KeyValueStore>, duration_days: u32) -> Self {
        Self {
            store,
            duration_days,
        }
    }

    pub fn duration_days(&self) -> u32 {
        self.duration_days
    }

    /// Return a valid cached authorization, or ask the signer for a new one.
    pub async fn load_or_sign(
        &self,
        engine: &dyn FheEngine,
        contract_addresses: &[Address],
        signer: &dyn WalletSigner,
    ) -> Result<DecryptionAuthorization, AuthorizationError> {
        self.load_or_sign_at(engine, contract_addresses, signer, Utc::now())
            .await
    }

    pub async fn load_or_sign_at(
        &self,
        engine: &dyn FheEngine,
        contract_addresses: &[Address],
        signer: &dyn WalletSigner,
        now: DateTime<Utc>,
    ) -> Result<DecryptionAuthorization, AuthorizationError> {
        let contract_set = normalize_contract_set(contract_addresses);
        if contract_set.is_empty() {
            return Err(AuthorizationError::EmptyContractSet);
        }
        let user_address = signer.address();

        if let Some(cached) = self.load_valid(user_address, &contract_set, now).await {
            tracing::debug!(signer = %user_address, "Reusing cached decryption authorization");
            return Ok(cached);
        }

        let keypair = engine.generate_keypair()?;
        let start_timestamp = now.timestamp();
        let payload = engine.create_authorization_payload(
            &keypair.public_key,
            &contract_set,
            start_timestamp,
            self.duration_days,
        )?;

        tracing::info!(
            signer = %user_address,
            contracts = contract_set.len(),
            duration_days = self.duration_days,
            "Requesting decryption authorization signature"
        );
        let signature = signer
            .sign_typed_data(&payload)
            .await
            .map_err(|e| AuthorizationError::from_signer(&user_address.to_string(), e))?;
        if signature.trim().is_empty() {
            return Err(AuthorizationError::SigningFailed {
                signer: user_address.to_string(),
                reason: "wallet returned an empty signature".to_string(),
            });
        }

        let authorization = DecryptionAuthorization {
            public_key: keypair.public_key,
            private_key: keypair.private_key,
            signature,
            contract_addresses: contract_set,
            user_address,
            start_timestamp,
            duration_days: self.duration_days,
        };

        if let Err(e) = self.save(&authorization).await {
            tracing::warn!(
                signer = %user_address,
                error = %e,
                "Failed to persist decryption authorization; it will be re-requested next time"
            );
        }

        Ok(authorization)
    }

    /// Cached authorization for this signer and contract set, if still valid.
    ///
    /// Unreadable or undecodable entries count as a miss.
    pub async fn load_valid(
        &self,
        user_address: Address,
        contract_addresses: &[Address],
        now: DateTime<Utc>,
    ) -> Option<DecryptionAuthorization> {
        let contract_set = normalize_contract_set(contract_addresses);
        let key = storage_key(user_address, &contract_set);

        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Authorization store read failed");
                return None;
            }
        };

        let cached: DecryptionAuthorization = match serde_json::from_str(&raw) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable authorization");
                return None;
            }
        };

        let valid = !cached.signature.trim().is_empty()
            && cached.matches(user_address, &contract_set)
            && cached.is_valid_at(now);
        if !valid {
            tracing::debug!(key = %key, "Cached authorization is expired or mismatched");
            return None;
        }
        Some(cached)
    }

    async fn save(&self, authorization: &DecryptionAuthorization) -> Result<(), StoreError> {
        let key = storage_key(
            authorization.user_address,
            &authorization.contract_addresses,
        );
        let raw = serde_json::to_string(authorization)?;
        self.store.set(&key, raw).await
    }

    /// All decodable authorizations currently in the store.
    pub async fn list(&self) -> Result<Vec<DecryptionAuthorization>, StoreError> {
        let mut out = Vec::new();
        for key in self.store.keys().await? {
            if !key.starts_with(STORAGE_KEY_PREFIX) {
                continue;
            }
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_str(&raw) {
                Ok(authorization) => out.push(authorization),
                Err(e) => tracing::warn!(key = %key, error = %e, "Skipping undecodable authorization"),
            }
        }
        Ok(out)
    }

    /// Remove stored authorizations, optionally only those of one signer.
    /// Returns the number removed.
    pub async fn clear(&self, signer: Option<Address>) -> Result<usize, StoreError> {
        let mut removed = 0;
        for key in self.store.keys().await? {
            if !key.starts_with(STORAGE_KEY_PREFIX) {
                continue;
            }
            if let Some(signer) = signer {
                let owner = self
                    .store
                    .get(&key)
                    .await?
                    .and_then(|raw| serde_json::from_str::<DecryptionAuthorization>(&raw).ok())
                    .map(|authorization| authorization.user_address);
                if owner != Some(signer) {
                    continue;
                }
            }
            if self.store.remove(&key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
