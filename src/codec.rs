//! Address and hash codec for raw log fields.
//!
//! Pure functions that turn fixed-width binary fields pulled out of log
//! topics into their canonical text forms, plus the matching
//! well-formedness checks used by both the decoder and the store.
//!
//! - Addresses are rendered as `0x` + 40 hex digits with EIP-55 checksum casing.
//! - Transaction hashes are rendered as `0x` + 64 lowercase hex digits.
//!
//! ```
//! use bayc_transfer_indexer::codec::{decode_address, is_valid_address};
//!
//! let mut slot = [0u8; 32];
//! slot[31] = 1;
//! let address = decode_address(&slot).unwrap_or_default();
//! assert_eq!(address, "0x0000000000000000000000000000000000000001");
//! assert!(is_valid_address(&address));
//! ```

use alloy::hex;
use alloy::primitives::{Address, U256};

use crate::error::{TrackerError, TrackerResult};

/// Width of an indexed topic slot.
pub const TOPIC_SLOT_LEN: usize = 32;

/// Width of an address.
pub const ADDRESS_LEN: usize = 20;

/// Width of a transaction hash.
pub const TX_HASH_LEN: usize = 32;

/// Length of a textual transaction hash including the `0x` prefix.
pub const TX_HASH_TEXT_LEN: usize = 66;

/// Decodes the address held in the low 20 bytes of a 32-byte topic slot.
///
/// The 12 high bytes are padding and are ignored, not validated. Returns
/// `None` when `slot` is not exactly 32 bytes wide.
#[must_use]
pub fn decode_address(slot: &[u8]) -> Option<String> {
    if slot.len() != TOPIC_SLOT_LEN {
        return None;
    }

    let address = Address::from_slice(&slot[TOPIC_SLOT_LEN - ADDRESS_LEN..]);
    Some(address.to_checksum(None)).filter(|text| is_valid_address(text))
}

/// Renders a 32-byte transaction hash as `0x`-prefixed lowercase hex.
///
/// # Errors
///
/// Returns a decoding error if `raw` is not exactly 32 bytes long.
pub fn decode_tx_hash(raw: &[u8]) -> TrackerResult<String> {
    if raw.len() != TX_HASH_LEN {
        return Err(TrackerError::decoding(
            format!(
                "transactionHash must be {TX_HASH_LEN} bytes, got {} ({})",
                raw.len(),
                hex::encode_prefixed(raw)
            ),
            None,
        ));
    }

    Ok(hex::encode_prefixed(raw))
}

/// Checks that `text` is `0x` followed by 40 hex digits with consistent casing.
///
/// All-lowercase and all-uppercase bodies carry no checksum and are accepted;
/// a mixed-case body must match its EIP-55 checksum exactly.
#[must_use]
pub fn is_valid_address(text: &str) -> bool {
    let Some(body) = text.strip_prefix("0x") else {
        return false;
    };

    if body.len() != 2 * ADDRESS_LEN || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }

    let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());

    if has_lower && has_upper {
        Address::parse_checksummed(text, None).is_ok()
    } else {
        true
    }
}

/// Canonicalizes a valid address to its checksummed form.
///
/// Returns `None` if `text` fails [`is_valid_address`].
#[must_use]
pub fn to_checksum_address(text: &str) -> Option<String> {
    if !is_valid_address(text) {
        return None;
    }

    text.parse::<Address>()
        .ok()
        .map(|address| address.to_checksum(None))
}

/// Checks that `text` is exactly `0x` followed by 64 hex digits.
#[must_use]
pub fn is_valid_tx_hash(text: &str) -> bool {
    text.len() == TX_HASH_TEXT_LEN
        && text
            .strip_prefix("0x")
            .is_some_and(|body| body.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Parses a token id written in decimal or `0x`-prefixed hex.
///
/// Returns `None` for empty input, signs, separators, whitespace or a value
/// wider than 256 bits. `"0x1e7c"` and `"7804"` name the same token.
pub fn parse_token_id(text: &str) -> Option<U256> {
    let (digits, radix) = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (text, 10),
    };

    let well_formed = !digits.is_empty()
        && digits.chars().all(|c| {
            if radix == 16 {
                c.is_ascii_hexdigit()
            } else {
                c.is_ascii_digit()
            }
        });
    if !well_formed {
        return None;
    }

    U256::from_str_radix(digits, radix).ok()
}
