//! Live wallet identity: current chain and current signer.
//!
//! Long-running operations capture a [`SignerId`] and a chain id when they
//! start and ask this context, at each commit point, whether those are still
//! the live values.

use std::fmt;
use std::sync::Arc;

use alloy_primitives::Address;
use tokio::sync::watch;

use crate::contract::WalletSigner;

/// Identity of one installed signer.
///
/// The generation changes every time a signer is installed, so reconnecting
/// the same account still invalidates operations started before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignerId {
    pub address: Address,
    pub generation: u64,
}

#[derive(Clone, Default)]
pub struct IdentityState {
    pub chain_id: Option<u64>,
    signer: Option<(SignerId, Arc<dyn WalletSigner>)>,
    next_generation: u64,
}

impl IdentityState {
    pub fn signer_id(&self) -> Option<SignerId> {
        self.signer.as_ref().map(|(id, _)| *id)
    }

    pub fn signer(&self) -> Option<Arc<dyn WalletSigner>> {
        self.signer.as_ref().map(|(_, signer)| signer.clone())
    }
}

impl fmt::Debug for IdentityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityState")
            .field("chain_id", &self.chain_id)
            .field("signer", &self.signer_id())
            .finish()
    }
}

/// Externally owned, mutable wallet context.
#[derive(Debug)]
pub struct IdentityContext {
    state: watch::Sender<IdentityState>,
}

impl Default for IdentityContext {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityContext {
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(IdentityState::default()),
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.state.borrow().chain_id
    }

    pub fn signer_id(&self) -> Option<SignerId> {
        self.state.borrow().signer_id()
    }

    pub fn signer(&self) -> Option<Arc<dyn WalletSigner>> {
        self.state.borrow().signer()
    }

    /// Current signer together with its identity, read atomically.
    pub fn current_signer(&self) -> Option<(SignerId, Arc<dyn WalletSigner>)> {
        self.state.borrow().signer.clone()
    }

    pub fn same_chain(&self, chain_id: Option<u64>) -> bool {
        self.state.borrow().chain_id == chain_id
    }

    pub fn same_signer(&self, signer: Option<SignerId>) -> bool {
        self.state.borrow().signer_id() == signer
    }

    pub fn set_chain(&self, chain_id: Option<u64>) {
        self.state.send_if_modified(|state| {
            if state.chain_id == chain_id {
                return false;
            }
            tracing::info!(from = ?state.chain_id, to = ?chain_id, "Chain changed");
            state.chain_id = chain_id;
            true
        });
    }

    /// Install a signer (or disconnect with `None`). Returns the new id.
    pub fn set_signer(&self, signer: Option<Arc<dyn WalletSigner>>) -> Option<SignerId> {
        let mut installed = None;
        self.state.send_modify(|state| {
            state.signer = signer.map(|signer| {
                let id = SignerId {
                    address: signer.address(),
                    generation: state.next_generation,
                };
                state.next_generation += 1;
                (id, signer)
            });
            installed = state.signer_id();
        });
        tracing::info!(signer = ?installed, "Signer changed");
        installed
    }

    pub fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.state.subscribe()
    }
}
