//! FHE engine capability.
//!
//! The engine is an external collaborator (a relayer SDK or a local mock).
//! This module fixes the shapes that cross the boundary: encrypted input
//! builders, decrypt requests tagged with their plaintext kind, and the
//! typed-data payload the wallet signs to authorize user decryption.

pub mod authorization;

use std::collections::HashMap;
use std::fmt;

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::contract::{CiphertextHandle, EncryptedArg};
use crate::error::EngineError;

pub use self::authorization::{
    DEFAULT_DURATION_DAYS, DecryptionAuthorization, DecryptionAuthorizationCache,
};

/// Encrypted value kinds stored by the pet contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptedKind {
    Euint32,
    Ebool,
}

/// A decrypted plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ClearPlaintext {
    Uint(U256),
    Bool(bool),
}

impl ClearPlaintext {
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Self::Uint(value) => Some(*value),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for ClearPlaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
        }
    }
}

/// A plaintext together with the exact handle it was decrypted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearValue {
    pub handle: CiphertextHandle,
    pub clear: ClearPlaintext,
}

/// Ordered plaintexts to encrypt for one (contract, user) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInput {
    pub contract_address: Address,
    pub user_address: Address,
    values: Vec<u32>,
}

impl EncryptedInput {
    pub fn new(contract_address: Address, user_address: Address) -> Self {
        Self {
            contract_address,
            user_address,
            values: Vec::new(),
        }
    }

    pub fn add32(mut self, value: u32) -> Self {
        self.values.push(value);
        self
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }
}

/// Engine output: one handle per added value, and a proof covering all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedValues {
    pub handles: Vec<B256>,
    pub input_proof: Bytes,
}

impl EncryptedValues {
    /// The argument for a single-value input.
    pub fn single(&self) -> Result<EncryptedArg, EngineError> {
        match self.handles.as_slice() {
            [handle] => Ok(EncryptedArg {
                handle: *handle,
                proof: self.input_proof.clone(),
            }),
            handles => Err(EngineError::Encryption(format!(
                "expected exactly one handle, engine returned {}",
                handles.len()
            ))),
        }
    }
}

/// One ciphertext to decrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptRequest {
    pub handle: CiphertextHandle,
    pub contract_address: Address,
    pub kind: EncryptedKind,
}

pub type DecryptedValues = HashMap<CiphertextHandle, ClearPlaintext>;

/// Ephemeral keypair used for one decryption authorization.
#[derive(Clone)]
pub struct EphemeralKeypair {
    pub public_key: String,
    pub private_key: SecretString,
}

impl fmt::Debug for EphemeralKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeypair")
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// EIP-712 typed data the wallet signs to authorize user decryption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationPayload(pub serde_json::Value);

/// Client-side FHE operations.
#[async_trait]
pub trait FheEngine: Send + Sync {
    fn generate_keypair(&self) -> Result<EphemeralKeypair, EngineError>;

    fn create_authorization_payload(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: i64,
        duration_days: u32,
    ) -> Result<AuthorizationPayload, EngineError>;

    async fn encrypt(&self, input: EncryptedInput) -> Result<EncryptedValues, EngineError>;

    async fn user_decrypt(
        &self,
        requests: &[DecryptRequest],
        authorization: &DecryptionAuthorization,
    ) -> Result<DecryptedValues, EngineError>;
}
