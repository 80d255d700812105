//! PORTal Auth: password hashing, fingerprint-bound sessions and the
//! admin gate.

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod session;

pub use config::AuthConfig;
pub use error::AuthError;
pub use service::{
    AuthService, ChangeMember, LoginInput, LoginOutput, RegisterMember, SessionCredentials,
};
