//! Authentication error types.

use portal_core::error::PortalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("session is not valid")]
    InvalidSession,

    #[error("admin privileges required")]
    NotAdmin,

    #[error("password shorter than {min_length} characters")]
    WeakPassword { min_length: usize },

    #[error("password longer than {max_bytes} bytes")]
    PasswordTooLong { max_bytes: usize },

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for PortalError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => PortalError::AuthenticationFailed,
            AuthError::InvalidSession => PortalError::SessionValidationFailed,
            AuthError::NotAdmin => PortalError::Unauthorized,
            AuthError::WeakPassword { min_length } => PortalError::WeakPassword { min_length },
            AuthError::PasswordTooLong { max_bytes } => PortalError::PasswordTooLong { max_bytes },
            AuthError::Crypto(msg) => PortalError::Crypto(msg),
        }
    }
}
