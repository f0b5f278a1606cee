use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

/// Minimum accepted length, in bytes, of a session signing secret.
pub const MIN_SECRET_LENGTH: usize = 32;

const FINGERPRINT_HEX_CHARS: usize = 16;

/// Errors produced by the common-crypto helpers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("secret too short: expected at least {minimum} bytes, got {actual}")]
    SecretTooShort { minimum: usize, actual: usize },
}

/// Symmetric key material used to sign session tokens.
///
/// The bytes are the UTF-8 encoding of the configured secret; no derivation is
/// applied. The buffer is wiped on drop and never printed.
#[derive(Clone)]
pub struct SecretKey(Zeroizing<Vec<u8>>);

impl SecretKey {
    /// Build a key from the configured secret string.
    pub fn from_secret(secret: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(secret.as_bytes())
    }

    /// Build a key from raw bytes, enforcing [`MIN_SECRET_LENGTH`].
    pub fn from_bytes<B>(bytes: B) -> Result<Self, CryptoError>
    where
        B: AsRef<[u8]>,
    {
        let slice = bytes.as_ref();
        if slice.len() < MIN_SECRET_LENGTH {
            return Err(CryptoError::SecretTooShort {
                minimum: MIN_SECRET_LENGTH,
                actual: slice.len(),
            });
        }
        Ok(Self(Zeroizing::new(slice.to_vec())))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short SHA-256 fingerprint, safe to log when correlating which key signed a token.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_slice());
        let mut encoded = hex::encode(hasher.finalize());
        encoded.truncate(FINGERPRINT_HEX_CHARS);
        encoded
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"***redacted***")
            .field("len", &self.0.len())
            .finish()
    }
}

/// Fixed-time byte comparison.
///
/// Lengths are compared first and a mismatch returns immediately; only the
/// length leaks, never the position of the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Fixed-time comparison of the UTF-8 encodings of two strings.
pub fn safe_compare(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

/// Generate a random base64url secret from `byte_len` bytes of OS randomness.
pub fn generate_secret(byte_len: usize) -> String {
    let mut bytes = Zeroizing::new(vec![0u8; byte_len]);
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_compare_matches_equal_strings() {
        assert!(safe_compare("password", "password"));
    }

    #[test]
    fn safe_compare_rejects_different_strings() {
        assert!(!safe_compare("password", "wrong"));
        assert!(!safe_compare("password", "passwore"));
    }

    #[test]
    fn safe_compare_rejects_unequal_length() {
        assert!(!safe_compare("password", "password123"));
        assert!(!safe_compare("", "x"));
    }

    #[test]
    fn secret_key_enforces_minimum_length() {
        let err = SecretKey::from_secret("too-short").expect_err("short secret rejected");
        assert_eq!(
            err,
            CryptoError::SecretTooShort {
                minimum: MIN_SECRET_LENGTH,
                actual: 9
            }
        );

        let key = SecretKey::from_secret(&"a".repeat(32)).expect("32 bytes accepted");
        assert_eq!(key.len(), 32);
        assert_eq!(key.as_bytes(), "a".repeat(32).as_bytes());
    }

    #[test]
    fn secret_key_length_counts_bytes_not_chars() {
        // 16 two-byte characters = 32 bytes
        let secret = "é".repeat(16);
        assert!(SecretKey::from_secret(&secret).is_ok());
    }

    #[test]
    fn secret_key_debug_is_redacted() {
        let key = SecretKey::from_secret("super-secret-key-at-least-32-chars-long").expect("key");
        let rendered = format!("{key:?}");
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn fingerprint_is_stable_and_distinct() {
        let a = SecretKey::from_secret(&"a".repeat(32)).expect("key");
        let b = SecretKey::from_secret(&"b".repeat(32)).expect("key");
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), FINGERPRINT_HEX_CHARS);
    }

    #[test]
    fn generated_secret_is_url_safe_and_long_enough() {
        let secret = generate_secret(48);
        assert_eq!(secret.len(), 64);
        assert!(secret
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(SecretKey::from_secret(&secret).is_ok());
        assert_ne!(secret, generate_secret(48));
    }
}
