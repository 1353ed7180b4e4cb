//! The value codec (C1): encodes/decodes the value tree to bytes.
//!
//! Chunk files, the table index, the properties file, and field indexes all
//! go through this module so that on-disk format concerns live in one place.

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Encodes a serializable value into its on-disk byte representation.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| Error::codec(e.to_string()))
}

/// Decodes a previously-encoded value, surfacing decode failures as
/// `CorruptChunkError` at the call site's discretion (the caller attaches
/// the path).
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_round_trip() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1i64);
        map.insert("b".to_string(), 2i64);

        let bytes = encode(&map).unwrap();
        let decoded: BTreeMap<String, i64> = decode(&bytes).unwrap();
        assert_eq!(map, decoded);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let garbage = vec![0xff, 0x00, 0x01];
        let result: Result<BTreeMap<String, i64>> = decode(&garbage);
        assert!(result.is_err());
    }
}
