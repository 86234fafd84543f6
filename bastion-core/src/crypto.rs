//! Cryptographic utilities for backup-code handling
//!
//! Backup codes are bearer credentials for account recovery, so they follow
//! the same rules as any other security token:
//!
//! 1. Generated from the OS random number generator, never a predictable PRNG
//! 2. Stored as SHA256 hashes rather than plaintext
//! 3. Verified with constant-time comparison via the `subtle` crate to
//!    prevent timing attacks

use rand::{Rng, TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Alphabet used for backup codes. Uppercase base36, matching the
/// `XXXX-XXXX` format shown to users at enrollment.
const BACKUP_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Number of significant characters in a backup code (excluding the separator).
const BACKUP_CODE_LEN: usize = 8;

/// Generate a single backup code in `XXXX-XXXX` form.
///
/// # Panics
///
/// Panics if the OS random number generator fails. This indicates a critical
/// system failure (e.g., /dev/urandom unavailable) from which recovery is not
/// possible for security-sensitive operations.
pub fn generate_backup_code() -> String {
    let mut rng = OsRng.unwrap_err();
    let mut code = String::with_capacity(BACKUP_CODE_LEN + 1);
    for i in 0..BACKUP_CODE_LEN {
        if i == BACKUP_CODE_LEN / 2 {
            code.push('-');
        }
        let idx = rng.random_range(0..BACKUP_CODE_ALPHABET.len());
        code.push(BACKUP_CODE_ALPHABET[idx] as char);
    }
    code
}

/// Generate a batch of backup codes.
pub fn generate_backup_codes(count: usize) -> Vec<String> {
    (0..count).map(|_| generate_backup_code()).collect()
}

/// Generate raw random bytes for a TOTP shared secret.
///
/// 20 bytes gives 160 bits of entropy, the size recommended by RFC 4226 for
/// HMAC-SHA1 based one-time passwords.
///
/// # Panics
///
/// Panics if the OS random number generator fails, as above.
pub fn generate_secret_bytes() -> [u8; 20] {
    let mut bytes = [0u8; 20];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");
    bytes
}

/// Hash a backup code for storage using SHA256.
///
/// Codes are normalized (uppercased, separator stripped) before hashing so
/// that user input like `ab12-cd34` matches the issued `AB12-CD34`.
pub fn hash_backup_code(code: &str) -> String {
    let normalized: String = code
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a backup code against a stored hash with constant-time comparison.
pub fn verify_backup_code(code: &str, stored_hash: &str) -> bool {
    let computed = hash_backup_code(code);
    constant_time_compare(computed.as_bytes(), stored_hash.as_bytes())
}

/// Perform constant-time comparison of two byte slices.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_code_format() {
        let code = generate_backup_code();
        assert_eq!(code.len(), 9);
        assert_eq!(code.chars().nth(4), Some('-'));
        assert!(
            code.chars()
                .filter(|c| *c != '-')
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn test_batch_generation_is_unique() {
        let codes = generate_backup_codes(8);
        assert_eq!(codes.len(), 8);
        let mut deduped = codes.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), codes.len());
    }

    #[test]
    fn test_hash_and_verify() {
        let code = generate_backup_code();
        let hash = hash_backup_code(&code);

        assert!(verify_backup_code(&code, &hash));
        assert!(!verify_backup_code("ZZZZ-ZZZZ", &hash));
    }

    #[test]
    fn test_verify_normalizes_input() {
        let hash = hash_backup_code("AB12-CD34");
        assert!(verify_backup_code("ab12cd34", &hash));
        assert!(verify_backup_code("ab12-cd34", &hash));
    }

    #[test]
    fn test_constant_time_compare_length_mismatch() {
        assert!(!constant_time_compare(b"abc", b"abcd"));
        assert!(constant_time_compare(b"abc", b"abc"));
    }

    #[test]
    fn test_secret_bytes_entropy() {
        let a = generate_secret_bytes();
        let b = generate_secret_bytes();
        assert_ne!(a, b);
        assert_eq!(a.len(), 20);
    }
}
