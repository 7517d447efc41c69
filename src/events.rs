//! `Transfer` event definition, filters and decoding.
//!
//! The event interface is generated with Alloy's `sol!` macro so the topic
//! signature is checked at compile time. Decoding itself goes through
//! [`RawLog`], a single explicit record type with named optional fields,
//! so every component that sees a log hands it to [`decode_transfer`]
//! instead of poking at loosely-typed fields.
//!
//! ## Topic layout
//!
//! | Slot | Content |
//! |------|---------|
//! | 0 | `keccak256("Transfer(address,address,uint256)")` |
//! | 1 | `from`, left-zero-padded to 32 bytes |
//! | 2 | `to`, left-zero-padded to 32 bytes |
//! | 3 | `tokenId`, big-endian `uint256` |
//!
//! ## Example
//!
//! ```
//! use alloy::primitives::{B256, U256};
//! use bayc_transfer_indexer::events::{decode_transfer, transfer_topic, RawLog};
//!
//! let topic = transfer_topic();
//! let log = RawLog {
//!     address: None,
//!     topics: vec![topic, B256::ZERO, B256::ZERO, B256::from(U256::from(9u64).to_be_bytes::<32>())],
//!     transaction_hash: Some(B256::repeat_byte(0x11)),
//!     block_number: Some(100),
//! };
//!
//! let record = decode_transfer(&log, topic).unwrap();
//! assert_eq!(record.token_id, U256::from(9u64));
//! ```

use alloy::primitives::{address, keccak256, Address, B256, U256};
use alloy::rpc::types::Filter;
use alloy::sol;

use crate::codec::{decode_address, decode_tx_hash};
use crate::db::models::TransferRecord;
use crate::error::{TrackerError, TrackerResult};

sol! {
    /// ERC-721 ownership transfer. All three parameters are indexed.
    #[derive(Debug)]
    event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
}

/// Canonical declaration hashed into topic 0.
pub const TRANSFER_EVENT_SIGNATURE: &str = "Transfer(address,address,uint256)";

/// Bored Ape Yacht Club collection contract on Ethereum mainnet.
pub const BAYC_CONTRACT: Address = address!("BC4CA0EdA7647A8aB7C2061c2E118A18a936f13D");

/// Number of topics an ERC-721 `Transfer` log carries.
pub const TRANSFER_TOPIC_COUNT: usize = 4;

/// Computes the `Transfer` topic signature from its declaration string.
///
/// Called once per session; always equals the `sol!`-generated
/// `Transfer::SIGNATURE_HASH`.
#[must_use]
pub fn transfer_topic() -> B256 {
    keccak256(TRANSFER_EVENT_SIGNATURE)
}

/// Filter for `Transfer` logs of `contract` over an inclusive block range.
#[must_use]
pub fn create_transfer_filter(
    contract: Address,
    topic: B256,
    from_block: u64,
    to_block: u64,
) -> Filter {
    create_transfer_subscription_filter(contract, topic)
        .from_block(from_block)
        .to_block(to_block)
}

/// Filter for live `Transfer` logs of `contract` (no block bounds).
#[must_use]
pub fn create_transfer_subscription_filter(contract: Address, topic: B256) -> Filter {
    Filter::new().address(contract).event_signature(topic)
}

/// A log as received from the node, before any validation.
///
/// Every field the node may omit is optional; [`decode_transfer`] is the
/// only place that decides whether a missing field is fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLog {
    /// Emitting contract
    pub address: Option<Address>,
    /// Indexed topic slots, signature first
    pub topics: Vec<B256>,
    /// Hash of the including transaction (absent for pending logs)
    pub transaction_hash: Option<B256>,
    /// Number of the including block (absent for pending logs)
    pub block_number: Option<u64>,
}

impl From<alloy::rpc::types::Log> for RawLog {
    fn from(log: alloy::rpc::types::Log) -> Self {
        Self {
            address: Some(log.address()),
            topics: log.topics().to_vec(),
            transaction_hash: log.transaction_hash,
            block_number: log.block_number,
        }
    }
}

/// Decodes one raw log into a validated [`TransferRecord`].
///
/// Token id comes from topic slot 3, addresses from slots 1 and 2, and the
/// transaction hash and block number from the log metadata. The finished
/// record is run through [`TransferRecord::validate`] before it is returned,
/// so a partially-built entity never escapes.
///
/// # Errors
///
/// - [`TrackerError::DecodingError`] if the topic count or topic 0 is wrong,
///   or if the transaction hash or block number is missing
/// - [`TrackerError::ValidationError`] if an address slot does not decode or
///   the assembled record fails validation
pub fn decode_transfer(log: &RawLog, expected_topic: B256) -> TrackerResult<TransferRecord> {
    if log.topics.len() != TRANSFER_TOPIC_COUNT {
        return Err(TrackerError::decoding(
            format!(
                "topics: expected {TRANSFER_TOPIC_COUNT} slots, got {}",
                log.topics.len()
            ),
            None,
        ));
    }

    let signature = log.topics[0];
    if signature != expected_topic {
        return Err(TrackerError::decoding(
            format!("topics[0]: expected {expected_topic}, got {signature}"),
            None,
        ));
    }

    let from_address = decode_address(log.topics[1].as_slice())
        .ok_or_else(|| TrackerError::validation("fromAddress", log.topics[1].to_string()))?;
    let to_address = decode_address(log.topics[2].as_slice())
        .ok_or_else(|| TrackerError::validation("toAddress", log.topics[2].to_string()))?;
    let token_id = U256::from_be_bytes(log.topics[3].0);

    let raw_hash = log
        .transaction_hash
        .ok_or_else(|| TrackerError::decoding("transactionHash is missing", None))?;
    let tx_hash = decode_tx_hash(raw_hash.as_slice())?;

    let block_number = log
        .block_number
        .ok_or_else(|| {
            TrackerError::decoding(format!("blockNumber is missing for {tx_hash}"), None)
        })?;

    let record = TransferRecord {
        token_id,
        from_address,
        to_address,
        tx_hash,
        block_number,
    };
    record.validate()?;

    Ok(record)
}
