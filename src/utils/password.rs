//! Credential hashing with Argon2id.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::config::HashingConfig;

/// Newtype for plaintext passwords to keep them out of logs.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for an encoded password hash (PHC string).
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn argon2(config: &HashingConfig) -> Result<Argon2<'static>, anyhow::Error> {
    let params = Params::new(
        config.memory_kib,
        config.iterations,
        config.parallelism,
        None,
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 parameters: {}", e))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password with a fresh random salt. Two calls with the same input
/// produce different hashes.
pub fn hash_password(
    password: &Password,
    config: &HashingConfig,
) -> Result<PasswordHashString, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2(config)?
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(PasswordHashString::new(hash))
}

/// Verify a password against a stored hash. Returns false for mismatches
/// and for malformed hashes; it never errors.
pub fn verify_password(hash: &PasswordHashString, password: &Password) -> bool {
    let Ok(parsed) = PasswordHash::new(hash.as_str()) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed)
        .is_ok()
}
