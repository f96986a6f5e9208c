//! Creation receipt decoding.
//!
//! The new token id is taken from the first log matching a known event
//! shape, trying the dedicated `PetCreated` event across all logs before
//! falling back to the ERC-721 `Transfer` event.

use alloy_primitives::{Address, B256, U256, keccak256};

use super::LogEntry;

pub const PET_CREATED_EVENT_SIGNATURE: &str = "PetCreated(uint256,address)";
pub const TRANSFER_EVENT_SIGNATURE: &str = "Transfer(address,address,uint256)";

/// Token id recovered from a creation receipt and the event it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedToken {
    pub token_id: u64,
    pub owner: Option<Address>,
    pub source: &'static str,
}

struct EventShape {
    name: &'static str,
    signature: &'static str,
    decode: fn(&LogEntry) -> Option<(U256, Option<Address>)>,
}

const CREATION_EVENT_SHAPES: &[EventShape] = &[
    EventShape {
        name: "PetCreated",
        signature: PET_CREATED_EVENT_SIGNATURE,
        decode: decode_pet_created,
    },
    EventShape {
        name: "Transfer",
        signature: TRANSFER_EVENT_SIGNATURE,
        decode: decode_transfer,
    },
];

/// Recover the token id minted by `createPet`.
///
/// Only logs emitted by `contract` are considered. `None` means no known
/// event shape matched and the token id cannot be recovered.
pub fn decode_created_token_id(logs: &[LogEntry], contract: Address) -> Option<CreatedToken> {
    for shape in CREATION_EVENT_SHAPES {
        let topic0 = keccak256(shape.signature.as_bytes());
        for log in logs.iter().filter(|log| log.address == contract) {
            if log.topics.first() != Some(&topic0) {
                continue;
            }
            let Some((raw_id, owner)) = (shape.decode)(log) else {
                tracing::debug!(event = shape.name, "Log matched topic but failed to decode");
                continue;
            };
            let Some(token_id) = token_id_to_u64(raw_id) else {
                tracing::warn!(event = shape.name, token_id = %raw_id, "Token id out of range");
                continue;
            };
            return Some(CreatedToken {
                token_id,
                owner,
                source: shape.name,
            });
        }
    }
    None
}

// PetCreated(uint256 tokenId, address owner): fields may be indexed or in data.
fn decode_pet_created(log: &LogEntry) -> Option<(U256, Option<Address>)> {
    match log.topics.len() {
        3 => Some((word(&log.topics[1]), Some(Address::from_word(log.topics[2])))),
        2 => {
            let owner = data_word(&log.data, 0).map(Address::from_word);
            Some((word(&log.topics[1]), owner))
        }
        1 => {
            let token_id = data_word(&log.data, 0)?;
            let owner = data_word(&log.data, 1).map(Address::from_word);
            Some((word(&token_id), owner))
        }
        _ => None,
    }
}

// ERC-721 Transfer(address indexed from, address indexed to, uint256 indexed tokenId).
// A three-topic Transfer is the ERC-20 shape and carries an amount, not a token id.
fn decode_transfer(log: &LogEntry) -> Option<(U256, Option<Address>)> {
    if log.topics.len() != 4 {
        return None;
    }
    Some((word(&log.topics[3]), Some(Address::from_word(log.topics[2]))))
}

fn word(raw: &B256) -> U256 {
    U256::from_be_bytes(raw.0)
}

fn data_word(data: &[u8], index: usize) -> Option<B256> {
    let start = index * 32;
    data.get(start..start + 32).map(B256::from_slice)
}

fn token_id_to_u64(value: U256) -> Option<u64> {
    if value > U256::from(u64::MAX) {
        return None;
    }
    Some(value.to::<u64>())
}
