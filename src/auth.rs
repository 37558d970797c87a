use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{Error, Result};

const ARGON2_MEMORY: u32 = 64 * 1024; // KiB
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

/// Hashes and verifies principal access secrets with Argon2id. Hashing takes
/// tens of milliseconds; callers on an async executor should run it under
/// `spawn_blocking`.
pub struct SecretHasher {
    argon2: Argon2<'static>,
}

impl Default for SecretHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretHasher {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(
            ARGON2_MEMORY,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .expect("invalid argon2 params");

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Hashes an access secret into a PHC string with a fresh random salt.
    pub fn hash(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| Error::Crypto(format!("failed to hash access secret: {e}")))?;
        Ok(hash.to_string())
    }

    /// Verifies a secret against a stored PHC string in constant time.
    pub fn verify(&self, secret: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::Crypto(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(secret.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Crypto(format!("failed to verify access secret: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_phc_format() {
        let hasher = SecretHasher::new();
        let hash = hasher.hash("test_password").unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_verify_correct_secret() {
        let hasher = SecretHasher::new();
        let hash = hasher.hash("test_password").unwrap();
        assert!(hasher.verify("test_password", &hash).unwrap());
    }

    #[test]
    fn test_verify_wrong_secret() {
        let hasher = SecretHasher::new();
        let hash = hasher.hash("test_password").unwrap();
        assert!(!hasher.verify("not_the_password", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = SecretHasher::new();
        let a = hasher.hash("same_secret").unwrap();
        let b = hasher.hash("same_secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_garbage_hash_errors() {
        let hasher = SecretHasher::new();
        assert!(hasher.verify("anything", "not-a-phc-string").is_err());
    }
}
