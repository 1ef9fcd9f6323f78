// Argon2 password hashing

use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Hashes and verifies passwords with Argon2id
#[derive(Clone)]
pub struct Passwords {
    argon2: Argon2<'static>,
    /// Hash of a random password, verified against when the user is unknown
    /// so that lookups for missing accounts cost the same as real ones
    dummy_hash: String,
}

impl Passwords {
    /// Create a hasher with the given memory cost (KiB) and iteration count
    pub fn new(memory_kib: u32, iterations: u32) -> anyhow::Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| anyhow!("Invalid Argon2 parameters: {}", e))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let dummy_hash = argon2
            .hash_password(salt.as_str().as_bytes(), &salt)
            .map_err(|e| anyhow!("Failed to prepare dummy hash: {}", e))?
            .to_string();

        Ok(Self { argon2, dummy_hash })
    }

    /// Produce a PHC string for storage
    pub fn hash(&self, password: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Failed to hash password: {}", e))?;
        Ok(hash.to_string())
    }

    /// Check `password` against a stored PHC string, or against the dummy
    /// hash when no account was found (always false in that case)
    pub fn verify(&self, password: &str, stored_hash: Option<&str>) -> bool {
        let (hash, known_user) = match stored_hash {
            Some(hash) => (hash, true),
            None => (self.dummy_hash.as_str(), false),
        };

        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Stored password hash is malformed: {}", e);
                return false;
            }
        };

        let matches = self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
        matches && known_user
    }
}
