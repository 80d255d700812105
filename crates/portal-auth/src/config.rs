//! Authentication configuration.

/// Configuration for the authentication service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Argon2id memory cost in KiB (default: 19456 = 19 MiB).
    pub argon2_memory_kib: u32,
    /// Argon2id iteration count (default: 2).
    pub argon2_iterations: u32,
    /// Argon2id lanes (default: 1).
    pub argon2_parallelism: u32,
    /// Optional pepper prepended to passwords before hashing and
    /// verification.
    pub pepper: Option<String>,
    /// Minimum password length in characters.
    pub min_password_length: usize,
    /// Maximum password length in bytes. Longer passwords are rejected,
    /// never truncated.
    pub max_password_bytes: usize,
    /// Session lifetime in seconds (default: 604_800 = 7 days).
    pub session_lifetime_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            argon2_memory_kib: 19_456,
            argon2_iterations: 2,
            argon2_parallelism: 1,
            pepper: None,
            min_password_length: 8,
            max_password_bytes: 72,
            session_lifetime_secs: 604_800,
        }
    }
}
