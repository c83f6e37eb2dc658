//! Password hashing using Argon2id.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand_core::OsRng;

use crate::error::{Error, Result};

/// Turns plaintext passwords into stored hashes and checks them back.
pub trait PasswordScheme: Send + Sync + std::fmt::Debug {
    /// Hash a plaintext password into a self-describing string.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails.
    fn hash(&self, password: &str) -> Result<String>;

    /// Check `password` against a stored hash.
    ///
    /// Returns `Ok(false)` on mismatch.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored hash is malformed.
    fn verify(&self, password: &str, hash: &str) -> Result<bool>;
}

/// Argon2id with configurable cost; PHC-format output.
#[derive(Debug, Clone, Default)]
pub struct Argon2Scheme {
    params: Params,
}

impl Argon2Scheme {
    /// Use explicit cost parameters (memory in KiB, iterations, lanes).
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are out of range.
    pub fn with_cost(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| Error::internal(format!("invalid argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordScheme for Argon2Scheme {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::internal(format!("password hashing failed: {e}")))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| Error::internal(format!("stored password hash is malformed: {e}")))?;

        match self.hasher().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::internal(format!("password verification failed: {e}"))),
        }
    }
}
