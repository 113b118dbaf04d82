//! Argon2id password hashing.
//!
//! Hashing is CPU-heavy, so both directions run on the blocking pool
//! instead of a runtime worker.

use anyhow::{Context, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use tokio::task;
use tracing::warn;

use crate::config::SecurityConfig;

/// Hashes a password with Argon2id, using tuned parameters when a security
/// config is given and the library defaults otherwise.
pub async fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let password = password.to_string();
    let config = config.cloned();

    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);

        let argon2 = if let Some(cfg) = config {
            let params = Params::new(
                cfg.argon2_memory_kib,
                cfg.argon2_iterations,
                cfg.argon2_parallelism,
                None,
            )
            .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        } else {
            Argon2::default()
        };

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))
    })
    .await
    .context("Password hashing task panicked")?
}

/// Checks a password against a stored hash.
///
/// A hash cell that does not parse counts as a mismatch rather than an
/// error, so rows with legacy or hand-edited hashes can never log in but
/// also never take the login endpoint down.
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();

    task::spawn_blocking(move || {
        let Ok(parsed_hash) = PasswordHash::new(&password_hash) else {
            warn!("Stored password hash is not a valid Argon2 string");
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    })
    .await
    .context("Password verification task panicked")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify_round_trip() {
        let hash = hash_password("tajne-heslo", None).await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("tajne-heslo", &hash).await.unwrap());
        assert!(!verify_password("spatne-heslo", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_tuned_params_produce_verifiable_hash() {
        let config = SecurityConfig {
            argon2_memory_kib: 8192,
            argon2_iterations: 1,
            argon2_parallelism: 1,
        };
        let hash = hash_password("heslo", Some(&config)).await.unwrap();
        assert!(hash.contains("m=8192"));
        assert!(verify_password("heslo", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_garbage_hash_is_a_mismatch_not_an_error() {
        assert!(!verify_password("heslo", "hash").await.unwrap());
    }
}
