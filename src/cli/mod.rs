//! CLI command handling.
//!
//! Provides subcommands for:
//! - Inspecting the contract binding for a chain (`binding`)
//! - Importing hardhat deployment artifacts (`deployments import`)
//! - Listing and clearing cached decryption authorizations (`auth`)

mod auth;
mod binding;
mod deployments;

pub use auth::{AuthCommand, run_auth_command};
pub use binding::run_binding_command;
pub use deployments::{DeploymentsCommand, run_deployments_command};
