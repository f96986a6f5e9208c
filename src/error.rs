//! Error types for petlife.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key-value store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Store file {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Contract read/write failures reported by the provider or signer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("transaction {tx_hash} was dropped before inclusion")]
    Dropped { tx_hash: String },

    #[error("malformed contract response: {0}")]
    Decode(String),
}

/// Failures inside the external FHE engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("keypair generation failed: {0}")]
    Keypair(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("invalid authorization payload: {0}")]
    Payload(String),
}

/// Wallet signer failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    #[error("user rejected the signature request")]
    Rejected,

    #[error("signing failed: {0}")]
    Failed(String),
}

/// Reasons a decryption authorization could not be produced.
///
/// Every variant maps to the same "authorization unavailable" outcome at the
/// session layer; the variants only refine the log line and status message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    #[error("signature declined by {signer}")]
    Declined { signer: String },

    #[error("signing failed for {signer}: {reason}")]
    SigningFailed { signer: String, reason: String },

    #[error("engine could not prepare the authorization: {0}")]
    Engine(#[from] EngineError),

    #[error("no contract addresses given")]
    EmptyContractSet,
}

impl AuthorizationError {
    pub(crate) fn from_signer(signer: &str, error: SignerError) -> Self {
        match error {
            SignerError::Rejected => Self::Declined {
                signer: signer.to_string(),
            },
            SignerError::Failed(reason) => Self::SigningFailed {
                signer: signer.to_string(),
                reason,
            },
        }
    }
}
