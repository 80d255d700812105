//! PORTal core: domain models, partial-update merging, set reconciliation
//! and the repository traits the storage engine implements.

pub mod clock;
pub mod error;
pub mod merge;
pub mod models;
pub mod reconcile;
pub mod repository;
pub mod validation;

pub use error::{EntityKind, PortalError, PortalResult, UniqueField};
