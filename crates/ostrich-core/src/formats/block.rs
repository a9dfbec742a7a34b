//! # Snapshot Block Format
//!
//! Binary encoding of one block of sorted snapshot keys.
//!
//! A block is the magic `OSTR`, one format byte, then a postcard payload.
//!
//! The payload is a key count plus a delta stream. Keys are strictly
//! ascending, so each key is written relative to its predecessor: the first
//! component that differs is stored as a difference, everything after it
//! verbatim. postcard writes every `u64` as a varint, which turns the small
//! differences of a dense snapshot into one or two bytes each.
//!
//! ## Validation
//!
//! Size and header are checked before the payload is parsed, and decoded
//! keys must come out strictly ascending. A block that fails any check is
//! reported as a serialization error, never partially returned.

use crate::index::Key;
use crate::primitives::{FORMAT_VERSION, MAGIC_BYTES, MAX_BLOCK_PAYLOAD_SIZE};
use crate::types::serialization_err;
use crate::StoreError;
use serde::{Deserialize, Serialize};

/// Magic plus format byte.
const HEADER_SIZE: usize = MAGIC_BYTES.len() + 1;

#[derive(Serialize, Deserialize)]
struct BlockPayload {
    count: u32,
    stream: Vec<u64>,
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encode a run of strictly ascending keys.
pub fn encode_block(keys: &[Key]) -> Result<Vec<u8>, StoreError> {
    let count = u32::try_from(keys.len())
        .map_err(|_| StoreError::InvalidArgument("block holds too many keys".to_string()))?;

    let mut stream = Vec::with_capacity(keys.len() * 2);
    let mut previous: Option<Key> = None;
    for &key in keys {
        match previous {
            None => stream.extend([key.0, key.1, key.2]),
            Some(prev) if key <= prev => {
                return Err(StoreError::InvalidArgument(
                    "block keys must be strictly ascending".to_string(),
                ));
            }
            Some(prev) => {
                if key.0 != prev.0 {
                    stream.extend([key.0 - prev.0, key.1, key.2]);
                } else if key.1 != prev.1 {
                    stream.extend([0, key.1 - prev.1, key.2]);
                } else {
                    stream.extend([0, 0, key.2 - prev.2]);
                }
            }
        }
        previous = Some(key);
    }

    let payload = postcard::to_allocvec(&BlockPayload { count, stream })
        .map_err(serialization_err)?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(MAGIC_BYTES);
    result.push(FORMAT_VERSION);
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Decode a block written by [`encode_block`].
pub fn decode_block(bytes: &[u8]) -> Result<Vec<Key>, StoreError> {
    if bytes.len() > MAX_BLOCK_PAYLOAD_SIZE {
        return Err(StoreError::Serialization(format!(
            "Block too large: {} bytes exceeds maximum of {} bytes",
            bytes.len(),
            MAX_BLOCK_PAYLOAD_SIZE
        )));
    }
    let (magic, rest) = bytes
        .split_first_chunk::<4>()
        .ok_or_else(|| StoreError::Serialization(format!("Block of {} bytes is truncated", bytes.len())))?;
    if magic != MAGIC_BYTES {
        return Err(StoreError::Serialization(
            "Block does not start with the snapshot magic".to_string(),
        ));
    }
    let (&format, body) = rest
        .split_first()
        .ok_or_else(|| StoreError::Serialization("Block has no format byte".to_string()))?;
    if format != FORMAT_VERSION {
        return Err(StoreError::Serialization(format!(
            "Block format {} cannot be read by format {}",
            format, FORMAT_VERSION
        )));
    }

    let payload: BlockPayload = postcard::from_bytes(body).map_err(serialization_err)?;
    let count = payload.count as usize;
    if payload.stream.len() != count * 3 {
        return Err(StoreError::Serialization(format!(
            "Block declares {} keys but holds {} values",
            count,
            payload.stream.len()
        )));
    }

    let corrupt = || StoreError::Serialization("Block keys overflow or are unsorted".to_string());
    let mut keys: Vec<Key> = Vec::with_capacity(count);
    for chunk in payload.stream.chunks_exact(3) {
        let key = match keys.last() {
            None => (chunk[0], chunk[1], chunk[2]),
            Some(&prev) => {
                if chunk[0] != 0 {
                    (prev.0.checked_add(chunk[0]).ok_or_else(corrupt)?, chunk[1], chunk[2])
                } else if chunk[1] != 0 {
                    (prev.0, prev.1.checked_add(chunk[1]).ok_or_else(corrupt)?, chunk[2])
                } else if chunk[2] != 0 {
                    (prev.0, prev.1, prev.2.checked_add(chunk[2]).ok_or_else(corrupt)?)
                } else {
                    return Err(corrupt());
                }
            }
        };
        keys.push(key);
    }
    Ok(keys)
}

// =============================================================================
// TESTS
// =============================================================================
