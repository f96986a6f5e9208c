//! Dispatch-time context snapshots for staleness checks.

use alloy_primitives::Address;

use crate::identity::{IdentityContext, SignerId};

/// Context captured when an operation starts.
///
/// `signer` is only compared when captured, since refresh does not depend on
/// the signer. `token_id` is always compared: create captures `None` and
/// stays current only while no pet gets selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationScope {
    pub chain_id: Option<u64>,
    pub contract: Address,
    pub signer: Option<SignerId>,
    pub token_id: Option<u64>,
}

impl OperationScope {
    /// Whether the live context still matches this snapshot.
    pub fn is_current(
        &self,
        identity: &IdentityContext,
        live_contract: Option<Address>,
        live_token_id: Option<u64>,
    ) -> bool {
        identity.same_chain(self.chain_id)
            && live_contract == Some(self.contract)
            && self
                .signer
                .is_none_or(|signer| identity.same_signer(Some(signer)))
            && live_token_id == self.token_id
    }

    /// The same scope with the signer left unchecked.
    pub fn ignoring_signer(self) -> Self {
        Self {
            signer: None,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(token_id: Option<u64>) -> OperationScope {
        OperationScope {
            chain_id: Some(31_337),
            contract: Address::repeat_byte(0xc0),
            signer: None,
            token_id,
        }
    }

    #[test]
    fn missing_token_is_compared() {
        let identity = IdentityContext::new();
        identity.set_chain(Some(31_337));
        let live = Some(Address::repeat_byte(0xc0));

        assert!(scope(None).is_current(&identity, live, None));
        assert!(!scope(None).is_current(&identity, live, Some(3)));
        assert!(!scope(Some(3)).is_current(&identity, live, None));
        assert!(scope(Some(3)).is_current(&identity, live, Some(3)));
    }

    #[test]
    fn contract_and_chain_are_compared() {
        let identity = IdentityContext::new();
        identity.set_chain(Some(31_337));

        assert!(!scope(None).is_current(&identity, Some(Address::repeat_byte(0xc1)), None));
        assert!(!scope(None).is_current(&identity, None, None));
        identity.set_chain(Some(11_155_111));
        assert!(!scope(None).is_current(&identity, Some(Address::repeat_byte(0xc0)), None));
    }
}
