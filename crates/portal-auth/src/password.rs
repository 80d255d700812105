//! Password policy, hashing and verification using Argon2id.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Prepend the pepper, if any, to the password bytes.
fn peppered<'a>(password: &'a str, pepper: Option<&str>, buf: &'a mut String) -> &'a [u8] {
    match pepper {
        Some(p) => {
            *buf = format!("{p}{password}");
            buf.as_bytes()
        }
        None => password.as_bytes(),
    }
}

/// Reject passwords outside the configured length bounds.
///
/// The minimum counts characters; the maximum counts bytes, because that
/// is what the hash consumes.
pub fn check_policy(password: &str, config: &AuthConfig) -> Result<(), AuthError> {
    if password.chars().count() < config.min_password_length {
        return Err(AuthError::WeakPassword {
            min_length: config.min_password_length,
        });
    }
    if password.len() > config.max_password_bytes {
        return Err(AuthError::PasswordTooLong {
            max_bytes: config.max_password_bytes,
        });
    }
    Ok(())
}

/// Hash a password into a PHC string with the configured Argon2id cost.
/// The salt is random per call.
pub fn hash_password(password: &str, config: &AuthConfig) -> Result<String, AuthError> {
    let params = Params::new(
        config.argon2_memory_kib,
        config.argon2_iterations,
        config.argon2_parallelism,
        None,
    )
    .map_err(|e| AuthError::Crypto(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut buf = String::new();
    let input = peppered(password, config.pepper.as_deref(), &mut buf);

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| AuthError::Crypto(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// Cost parameters are read from the hash itself, so hashes made under an
/// older configuration keep verifying.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(AuthError::Crypto)` if the stored hash is malformed.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let mut buf = String::new();
    let input = peppered(password, pepper, &mut buf);

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cheap parameters so the tests stay fast.
    fn test_config() -> AuthConfig {
        AuthConfig {
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            ..AuthConfig::default()
        }
    }

    #[test]
    fn correct_password_matches() {
        let config = test_config();
        let hash = hash_password("longenough1", &config).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("longenough1"));
        assert!(verify_password("longenough1", &hash, None).unwrap());
    }

    #[test]
    fn wrong_password_does_not_match() {
        let hash = hash_password("longenough1", &test_config()).unwrap();
        assert!(!verify_password("wrong", &hash, None).unwrap());
    }

    #[test]
    fn pepper_is_applied() {
        let config = AuthConfig {
            pepper: Some("pepper!".into()),
            ..test_config()
        };
        let hash = hash_password("longenough1", &config).unwrap();
        assert!(verify_password("longenough1", &hash, Some("pepper!")).unwrap());
        assert!(!verify_password("longenough1", &hash, None).unwrap());
    }

    #[test]
    fn salts_differ_per_hash() {
        let config = test_config();
        let a = hash_password("longenough1", &config).unwrap();
        let b = hash_password("longenough1", &config).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_returns_error() {
        assert!(verify_password("pw", "not-a-hash", None).is_err());
    }

    #[test]
    fn policy_bounds() {
        let config = AuthConfig::default();
        assert!(matches!(
            check_policy("short", &config),
            Err(AuthError::WeakPassword { min_length: 8 })
        ));
        assert!(check_policy("exactly8", &config).is_ok());
        assert!(check_policy(&"a".repeat(72), &config).is_ok());
        assert!(matches!(
            check_policy(&"a".repeat(73), &config),
            Err(AuthError::PasswordTooLong { max_bytes: 72 })
        ));
    }

    #[test]
    fn multibyte_passwords_count_bytes_for_the_maximum() {
        let config = AuthConfig::default();
        // 25 characters, 75 bytes.
        let password = "é".repeat(25);
        assert!(matches!(
            check_policy(&password, &config),
            Err(AuthError::PasswordTooLong { .. })
        ));
    }
}
