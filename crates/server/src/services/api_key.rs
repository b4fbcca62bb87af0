//! Agent API key generation and hashing. Only the SHA-256 hash is
//! stored; the plaintext is returned to the agent once at registration.

use rand::{distr::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

/// API key prefix.
const KEY_PREFIX: &str = "pwa_";
/// Length of the random part of the key.
const KEY_RANDOM_LENGTH: usize = 32;

/// Generate a new random API key. Returns the full key and its hash.
pub fn generate_key() -> (String, String) {
    let random_part: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_RANDOM_LENGTH)
        .map(char::from)
        .collect();

    let full_key = format!("{KEY_PREFIX}{random_part}");
    let key_hash = hash_key(&full_key);
    (full_key, key_hash)
}

/// Hash an API key using SHA-256.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_matches_its_hash() {
        let (key, hash) = generate_key();
        assert!(key.starts_with(KEY_PREFIX));
        assert_eq!(key.len(), KEY_PREFIX.len() + KEY_RANDOM_LENGTH);
        assert_eq!(hash_key(&key), hash);
    }

    #[test]
    fn hashing_is_stable_and_hex() {
        let hash = hash_key("pwa_example");
        assert_eq!(hash, hash_key("pwa_example"));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_keys_are_generated() {
        let (a, _) = generate_key();
        let (b, _) = generate_key();
        assert_ne!(a, b);
    }
}
