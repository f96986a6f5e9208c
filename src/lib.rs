//! Client-side coordination for FHEPetLife pets.
//!
//! A [`pet::PetSessionController`] owns one pet session against an encrypted
//! on-chain contract. It serializes refresh, decrypt, interaction, creation
//! and level-up requests with busy flags, discards results that arrive after
//! the wallet changed chain or signer, and reuses signed decryption
//! authorizations across calls.
//!
//! Contract I/O, the FHE engine and the wallet are traits so hosts can plug
//! in their own providers.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod contract;
pub mod error;
pub mod fhe;
pub mod identity;
pub mod pet;
pub mod settings;
pub mod store;

pub use config::Config;
pub use identity::{IdentityContext, SignerId};
pub use pet::{OperationOutcome, PetSessionController, PetSnapshot};
