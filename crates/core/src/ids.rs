//! Identifier generation: stable hashes, random session/unique ids, uuids.

use rand::RngCore;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A stable 64-bit hash of a project id, used as `Project.numeric_id`.
/// Deliberately not cryptographic: it only needs to be stable and look like
/// a plausible provider-issued numeric project id.
pub fn stable_numeric_id(seed: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    // Clear the top bit so the value always prints as a positive i64 too,
    // matching the provider's numeric-id JSON shape (string-encoded u63).
    hasher.finish() & 0x7fff_ffff_ffff_ffff
}

/// A fresh operation id.
pub fn new_operation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A random 128-bit resumable-session id, hex encoded.
pub fn new_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

/// A random 21-digit numeric service-account `uniqueId`, matching the
/// provider's decimal-string shape.
pub fn new_service_account_unique_id() -> String {
    let mut rng = rand::thread_rng();
    let mut digits = String::with_capacity(21);
    // First digit non-zero so the value never looks truncated.
    digits.push((b'1' + (rng.next_u32() % 9) as u8) as char);
    for _ in 0..20 {
        digits.push((b'0' + (rng.next_u32() % 10) as u8) as char);
    }
    digits
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_numeric_id_is_deterministic() {
        assert_eq!(stable_numeric_id("my-project"), stable_numeric_id("my-project"));
        assert_ne!(stable_numeric_id("my-project"), stable_numeric_id("other-project"));
    }

    #[test]
    fn session_id_is_32_hex_chars() {
        let id = new_session_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn service_account_unique_id_is_21_digits_no_leading_zero() {
        let id = new_service_account_unique_id();
        assert_eq!(id.len(), 21);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
        assert_ne!(&id[0..1], "0");
    }
}
