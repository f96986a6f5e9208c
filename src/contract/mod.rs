//! FHEPetLife contract surface.
//!
//! The provider and wallet are external collaborators: reads go through a
//! [`PetReader`] bound to a read-only provider, writes and signatures go
//! through the connected [`WalletSigner`]. ABI encoding is their concern; the
//! session layer only deals in the typed calls below.

pub mod binding;
pub mod deployments;
pub mod events;

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ContractError, SignerError};
use crate::fhe::AuthorizationPayload;

pub use self::binding::{ContractBinding, ContractBindingResolver, InterfaceDescriptor};
pub use self::deployments::{DeploymentEntry, DeploymentTable};
pub use self::events::{CreatedToken, decode_created_token_id};

/// Contract name used for deployment artifacts and status messages.
pub const CONTRACT_NAME: &str = "FHEPetLife";

pub type TxHash = B256;

/// Opaque reference to a ciphertext stored on-chain.
///
/// The zero hash means "no ciphertext recorded".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CiphertextHandle(B256);

impl CiphertextHandle {
    pub const ZERO: Self = Self(B256::ZERO);

    pub const fn new(raw: B256) -> Self {
        Self(raw)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<B256> for CiphertextHandle {
    fn from(raw: B256) -> Self {
        Self(raw)
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_slice()))
    }
}

impl FromStr for CiphertextHandle {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s.trim())
            .map(Self)
            .map_err(|e| ContractError::Decode(format!("invalid ciphertext handle '{s}': {e}")))
    }
}

/// `getPetInfo(tokenId)` result.
///
/// Providers hand back `lastInteraction` either as a JSON number or as a
/// decimal string, so both are accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetInfo {
    #[serde(deserialize_with = "number_or_string")]
    pub level: u64,
    #[serde(deserialize_with = "number_or_string")]
    pub last_interaction: u64,
}

fn number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid integer '{s}': {e}"))),
    }
}

/// One encrypted argument: the input handle and the proof that binds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedArg {
    pub handle: B256,
    pub proof: Bytes,
}

/// Pet interactions that each consume one encrypted magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetAction {
    Feed,
    Play,
    Rest,
}

impl PetAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Play => "play",
            Self::Rest => "rest",
        }
    }

    pub fn into_call(self, contract: Address, token_id: u64, input: EncryptedArg) -> PetCall {
        match self {
            Self::Feed => PetCall::Feed {
                contract,
                token_id,
                input,
            },
            Self::Play => PetCall::Play {
                contract,
                token_id,
                input,
            },
            Self::Rest => PetCall::Rest {
                contract,
                token_id,
                input,
            },
        }
    }
}

impl fmt::Display for PetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PetAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "feed" => Ok(Self::Feed),
            "play" => Ok(Self::Play),
            "rest" => Ok(Self::Rest),
            other => Err(format!(
                "invalid action '{other}': expected 'feed', 'play', or 'rest'"
            )),
        }
    }
}

/// Mutating calls on the pet contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PetCall {
    CreatePet {
        contract: Address,
        hunger: EncryptedArg,
        happiness: EncryptedArg,
        growth: EncryptedArg,
        metadata_uri: String,
    },
    Feed {
        contract: Address,
        token_id: u64,
        input: EncryptedArg,
    },
    Play {
        contract: Address,
        token_id: u64,
        input: EncryptedArg,
    },
    Rest {
        contract: Address,
        token_id: u64,
        input: EncryptedArg,
    },
    LevelUp {
        contract: Address,
        token_id: u64,
    },
}

impl PetCall {
    /// Solidity function name the call maps to.
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::CreatePet { .. } => "createPet",
            Self::Feed { .. } => "feedPet",
            Self::Play { .. } => "playWithPet",
            Self::Rest { .. } => "restPet",
            Self::LevelUp { .. } => "levelUp",
        }
    }

    pub fn contract(&self) -> Address {
        match self {
            Self::CreatePet { contract, .. }
            | Self::Feed { contract, .. }
            | Self::Play { contract, .. }
            | Self::Rest { contract, .. }
            | Self::LevelUp { contract, .. } => *contract,
        }
    }
}

/// A log entry from a transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Mined transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    /// 1 on success, 0 on revert.
    pub status: u64,
    pub logs: Vec<LogEntry>,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

/// Read-only view of the pet contract.
#[async_trait]
pub trait PetReader: Send + Sync {
    async fn get_hunger(
        &self,
        contract: Address,
        token_id: u64,
    ) -> Result<CiphertextHandle, ContractError>;

    async fn get_happiness(
        &self,
        contract: Address,
        token_id: u64,
    ) -> Result<CiphertextHandle, ContractError>;

    async fn get_growth(
        &self,
        contract: Address,
        token_id: u64,
    ) -> Result<CiphertextHandle, ContractError>;

    async fn get_pet_info(&self, contract: Address, token_id: u64)
    -> Result<PetInfo, ContractError>;
}

/// The connected wallet account.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Sign an EIP-712 payload. A user refusal is [`SignerError::Rejected`].
    async fn sign_typed_data(&self, payload: &AuthorizationPayload)
    -> Result<String, SignerError>;

    /// Submit a mutating call and return its transaction hash.
    async fn send(&self, call: PetCall) -> Result<TxHash, ContractError>;

    /// Wait until the transaction is included.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, ContractError>;
}
