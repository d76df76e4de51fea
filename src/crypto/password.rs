use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, ParamsBuilder, Version,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, Zeroizing};

use crate::config::HashCost;
use crate::error::{AppError, Result};

/// Salted one-way password hashing with Argon2id.
#[derive(Clone, Debug)]
pub struct Hasher {
    params: Params,
}

impl Hasher {
    /// Creates a hasher with the given cost.
    pub fn new(cost: HashCost) -> Result<Self> {
        let params = ParamsBuilder::new()
            .m_cost(cost.memory_kib)
            .t_cost(cost.iterations)
            .p_cost(cost.parallelism)
            .build()
            .map_err(|e| AppError::Hashing(format!("Argon2 params: {}", e)))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes a password, returning a PHC string.
    pub fn hash(&self, password: &str) -> Result<String> {
        let mut password_bytes = password.as_bytes().to_vec();

        let mut salt_bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|e| AppError::Hashing(format!("Failed to generate salt: {}", e)))?;

        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AppError::Hashing(format!("Salt encoding error: {}", e)))?;

        let password_hash = self
            .argon2()
            .hash_password(&password_bytes, &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Hashing(format!("Argon2 hash error: {}", e)));

        password_bytes.zeroize();
        tracing::debug!("Password hashed successfully with Argon2");
        password_hash
    }

    /// Verifies a password against a stored hash.
    ///
    /// A mismatch is `Ok(false)`; only an unparsable hash is an error. The
    /// cost parameters embedded in the hash are used, so hashes made with
    /// an older configuration still verify.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Hashing(format!("Hash parse error: {}", e)))?;

        let mut password_bytes = password.as_bytes().to_vec();
        let result = self
            .argon2()
            .verify_password(&password_bytes, &parsed_hash)
            .is_ok();

        password_bytes.zeroize();
        tracing::debug!("Password verification completed");
        Ok(result)
    }

    /// [`Hasher::hash`] on the blocking pool, keeping argon2 off the async
    /// workers.
    pub async fn hash_blocking(&self, password: &str) -> Result<String> {
        let hasher = self.clone();
        let password = Zeroizing::new(password.to_string());
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    /// [`Hasher::verify`] on the blocking pool.
    pub async fn verify_blocking(&self, password: &str, hash: &str) -> Result<bool> {
        let hasher = self.clone();
        let password = Zeroizing::new(password.to_string());
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
    }
}

#[cfg(test)]
pub(crate) fn cheap_hasher() -> Hasher {
    Hasher::new(HashCost {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}
