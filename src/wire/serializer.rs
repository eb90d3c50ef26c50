//! Canonical serialization for protocol payloads, and padding generation.
//!
//! Encoding is `bincode` over the crate's own message types (tuples, byte
//! strings, a string-keyed parameter map). Decoding reads from a `Cursor`
//! rather than `bincode::deserialize`, so trailing bytes — the random
//! padding appended after the primary structure inside an encrypted envelope
//! — are simply left unread rather than rejected.

use std::io::Cursor;

use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SerializerError {
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Encode a value using the wire's canonical encoding.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializerError> {
    bincode::serialize(value).map_err(|e| SerializerError::Encode(e.to_string()))
}

/// Decode a value, tolerating (and discarding) trailing bytes after it.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializerError> {
    let mut cursor = Cursor::new(bytes);
    bincode::deserialize_from(&mut cursor).map_err(|e| SerializerError::Decode(e.to_string()))
}

/// Encode `value` then append a random-length padding string, for use inside
/// an encrypted envelope (`CFG_SALT_LEN_MIN..=CFG_SALT_LEN_MAX`).
pub fn encode_with_padding<T: Serialize>(
    value: &T,
    salt_len_min: usize,
    salt_len_max: usize,
) -> Result<Vec<u8>, SerializerError> {
    let mut out = encode(value)?;
    out.extend_from_slice(&generate_padding(salt_len_min, salt_len_max));
    Ok(out)
}

/// Uniform-random-length byte string in `[min_length, max_length]`, used to
/// obscure the true length of the encrypted structure it's appended to.
pub fn generate_padding(min_length: usize, max_length: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let length = if max_length > min_length {
        rng.gen_range(min_length..=max_length)
    } else {
        min_length
    };
    (0..length).map(|_| rng.gen::<u8>()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_tuple() {
        let value = ("127.0.0.1".to_string(), 2000u16, vec![1u8, 2, 3], "abcd".to_string());
        let encoded = encode(&value).unwrap();
        let decoded: (String, u16, Vec<u8>, String) = decode(&encoded).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn decode_tolerates_trailing_padding() {
        let value = (1u64, "hello".to_string());
        let mut encoded = encode(&value).unwrap();
        encoded.extend_from_slice(&generate_padding(64, 512));

        let decoded: (u64, String) = decode(&encoded).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn padding_length_is_within_range() {
        for _ in 0..200 {
            let padding = generate_padding(64, 512);
            assert!(padding.len() >= 64 && padding.len() <= 512);
        }
    }

    #[test]
    fn padding_degenerate_range_returns_min() {
        let padding = generate_padding(64, 64);
        assert_eq!(padding.len(), 64);
    }
}
