//! Index key encoding.
//!
//! A key is the concatenation of fixed-width big-endian term ids, so byte
//! order equals component-wise numeric order and every prefix of components
//! is a byte prefix of the key.

use bopline_core::value::Value;

use crate::error::{AccessError, Result};

/// Width of one encoded key component.
pub const COMPONENT_LEN: usize = 8;

pub fn encode_key(components: &[u64]) -> Vec<u8> {
    let mut key = Vec::with_capacity(components.len() * COMPONENT_LEN);
    for c in components {
        key.extend_from_slice(&c.to_be_bytes());
    }
    key
}

pub fn decode_component(key: &[u8], index: usize) -> Result<u64> {
    let start = index * COMPONENT_LEN;
    key.get(start..start + COMPONENT_LEN)
        .and_then(|bytes| <[u8; COMPONENT_LEN]>::try_from(bytes).ok())
        .map(u64::from_be_bytes)
        .ok_or_else(|| {
            AccessError::KeyDecode(format!(
                "component {index} out of range for {}-byte key",
                key.len()
            ))
        })
}

/// Decode component `index` into a bindable value.
pub fn decode_value(key: &[u8], index: usize) -> Result<Value> {
    decode_component(key, index).map(Value::Term)
}

/// The smallest byte string of the same length that is greater than every
/// key starting with `prefix`. `None` when `prefix` is all `0xFF` (no such
/// bound exists) or empty.
pub fn successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut next = prefix.to_vec();
    for byte in next.iter_mut().rev() {
        if *byte == u8::MAX {
            *byte = 0;
        } else {
            *byte += 1;
            return Some(next);
        }
    }
    None
}
