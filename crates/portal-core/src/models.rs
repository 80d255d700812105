//! Domain models for PORTal.
//!
//! These are the core types shared across all crates. Each model comes
//! with a `Create*` input and, where it can be patched, an `Update*`
//! patch consumed by [`crate::merge::Merge`].

pub mod member;
pub mod member_qualification;
pub mod qualification;
pub mod reference;
pub mod requirement;
pub mod session;
