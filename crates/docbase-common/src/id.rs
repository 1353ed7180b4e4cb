//! Auto-generated record and chunk id tokens.

use rand::RngCore;

/// Generates a random 16-hex-character token for auto-keyed inserts.
///
/// Collision probability is negligible for the scales this engine targets;
/// callers needing guaranteed-unique ids should pass an explicit key.
#[must_use]
pub fn generate_record_id() -> String {
    hex_token(8)
}

/// Generates the 8-byte (16 hex character) suffix used to make chunk names
/// unique within a table (`<table>-<hex16>`).
#[must_use]
pub fn generate_chunk_suffix() -> String {
    hex_token(8)
}

fn hex_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_is_16_hex_chars() {
        let id = generate_record_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_chunk_suffix_is_16_hex_chars() {
        let suffix = generate_chunk_suffix();
        assert_eq!(suffix.len(), 16);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ids_are_not_trivially_repeated() {
        let a = generate_record_id();
        let b = generate_record_id();
        assert_ne!(a, b);
    }
}
