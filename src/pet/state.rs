//! Session data owned by the controller and the views it publishes.

use alloy_primitives::Address;
use serde::Serialize;

use super::guards::BusyFlags;
use crate::contract::{CiphertextHandle, PetInfo};
use crate::fhe::{ClearPlaintext, ClearValue};

/// The three encrypted pet attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Hunger,
    Happiness,
    Growth,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [Self::Hunger, Self::Happiness, Self::Growth];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hunger => "hunger",
            Self::Happiness => "happiness",
            Self::Growth => "growth",
        }
    }
}

/// Latest handle of one attribute and the last plaintext decrypted for it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeSlot {
    pub handle: Option<CiphertextHandle>,
    pub clear: Option<ClearValue>,
}

impl AttributeSlot {
    /// The cached plaintext, only if it was decrypted from the current handle.
    pub fn current_clear(&self) -> Option<ClearPlaintext> {
        match (self.handle, self.clear) {
            (Some(handle), Some(clear)) if clear.handle == handle => Some(clear.clear),
            _ => None,
        }
    }

    /// Record a freshly read handle, dropping a plaintext that no longer
    /// belongs to it.
    fn observe(&mut self, handle: CiphertextHandle) {
        self.handle = Some(handle);
        if self.clear.is_some_and(|clear| clear.handle != handle) {
            self.clear = None;
        }
    }
}

/// Handles and metadata returned by one batched status read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PetStatusRead {
    pub hunger: CiphertextHandle,
    pub happiness: CiphertextHandle,
    pub growth: CiphertextHandle,
    pub info: PetInfo,
}

/// Everything known about the selected pet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PetSession {
    pub token_id: Option<u64>,
    pub hunger: AttributeSlot,
    pub happiness: AttributeSlot,
    pub growth: AttributeSlot,
    pub level: u64,
    pub last_interaction: u64,
}

impl PetSession {
    pub fn for_token(token_id: Option<u64>) -> Self {
        Self {
            token_id,
            ..Self::default()
        }
    }

    pub fn slot(&self, attribute: Attribute) -> &AttributeSlot {
        match attribute {
            Attribute::Hunger => &self.hunger,
            Attribute::Happiness => &self.happiness,
            Attribute::Growth => &self.growth,
        }
    }

    pub fn slot_mut(&mut self, attribute: Attribute) -> &mut AttributeSlot {
        match attribute {
            Attribute::Hunger => &mut self.hunger,
            Attribute::Happiness => &mut self.happiness,
            Attribute::Growth => &mut self.growth,
        }
    }

    pub fn apply_status(&mut self, status: PetStatusRead) {
        self.hunger.observe(status.hunger);
        self.happiness.observe(status.happiness);
        self.growth.observe(status.growth);
        self.level = status.info.level;
        self.last_interaction = status.info.last_interaction;
    }

    /// Handles worth decrypting: known and non-zero.
    pub fn decryptable_handles(&self) -> Vec<(Attribute, CiphertextHandle)> {
        Attribute::ALL
            .into_iter()
            .filter_map(|attribute| {
                self.slot(attribute)
                    .handle
                    .filter(|handle| !handle.is_zero())
                    .map(|handle| (attribute, handle))
            })
            .collect()
    }
}

/// Mutable state published to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PetState {
    pub session: PetSession,
    pub busy: BusyFlags,
    pub message: String,
}

/// Rendered view of one attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttributeView {
    pub handle: Option<CiphertextHandle>,
    pub clear: Option<ClearPlaintext>,
}

impl From<&AttributeSlot> for AttributeView {
    fn from(slot: &AttributeSlot) -> Self {
        Self {
            handle: slot.handle,
            clear: slot.current_clear(),
        }
    }
}

/// Everything a UI needs to render the pet and its controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PetSnapshot {
    pub chain_id: Option<u64>,
    pub contract_address: Option<Address>,
    pub is_deployed: bool,
    pub token_id: Option<u64>,
    pub hunger: AttributeView,
    pub happiness: AttributeView,
    pub growth: AttributeView,
    pub level: u64,
    pub last_interaction: u64,
    pub busy: BusyFlags,
    pub message: String,
    pub can_create: bool,
    pub can_interact: bool,
    pub can_decrypt: bool,
    pub can_refresh: bool,
    pub can_level_up: bool,
}

/// How a guarded operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Guard was false; nothing happened.
    Skipped,
    Committed,
    /// The wallet context changed mid-flight and the result was discarded.
    Cancelled,
    AuthorizationUnavailable,
    NothingToDecrypt,
    /// The creation transaction succeeded but no token id could be decoded.
    CreatedWithoutTokenId,
    Failed(String),
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{B256, U256};

    use super::*;

    fn handle(byte: u8) -> CiphertextHandle {
        CiphertextHandle::new(B256::repeat_byte(byte))
    }

    fn status(hunger: u8, happiness: u8, growth: u8) -> PetStatusRead {
        PetStatusRead {
            hunger: handle(hunger),
            happiness: handle(happiness),
            growth: handle(growth),
            info: PetInfo {
                level: 1,
                last_interaction: 42,
            },
        }
    }

    #[test]
    fn new_handle_supersedes_cached_plaintext() {
        let mut session = PetSession::for_token(Some(1));
        session.apply_status(status(1, 2, 3));
        session.hunger.clear = Some(ClearValue {
            handle: handle(1),
            clear: ClearPlaintext::Uint(U256::from(50)),
        });
        assert_eq!(
            session.hunger.current_clear(),
            Some(ClearPlaintext::Uint(U256::from(50)))
        );

        session.apply_status(status(9, 2, 3));
        assert_eq!(session.hunger.current_clear(), None);
        assert_eq!(session.hunger.clear, None);
        assert_eq!(session.level, 1);
        assert_eq!(session.last_interaction, 42);
    }

    #[test]
    fn mismatched_clear_value_is_hidden_from_view() {
        let slot = AttributeSlot {
            handle: Some(handle(2)),
            clear: Some(ClearValue {
                handle: handle(1),
                clear: ClearPlaintext::Bool(true),
            }),
        };
        assert_eq!(AttributeView::from(&slot).clear, None);
    }

    #[test]
    fn zero_handles_are_not_decryptable() {
        let mut session = PetSession::for_token(Some(1));
        session.apply_status(PetStatusRead {
            hunger: CiphertextHandle::ZERO,
            ..status(0, 0xaa, 0xbb)
        });

        assert_eq!(
            session.decryptable_handles(),
            vec![
                (Attribute::Happiness, handle(0xaa)),
                (Attribute::Growth, handle(0xbb))
            ]
        );
    }
}
