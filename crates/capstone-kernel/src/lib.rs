//! Capstone Kernel
//!
//! Contracts shared by the portal's policy layer:
//!
//! - **Identifiers**: [`Id<K>`](id::Id) with one marker per store table
//! - **Data model**: [`Actor`], [`Group`], [`AdviserRecord`] and [`Role`]
//! - **Errors**: [`PolicyError`] with stable reason codes, [`ValidationError`]
//! - **Store**: the [`PortalStore`] trait the gate and code issuer read from
//! - **Config**: a multi-format loader (feature `config`)
//!
//! Concrete implementations live in `capstone-foundation`.

// error module
pub mod error;

// identifier module
pub mod id;

// record types
pub mod model;

// backing-store contract
pub mod store;

// config module
#[cfg(feature = "config")]
pub mod config;

pub use error::{
    PolicyError, PolicyResult, RateLimitError, ValidationError, ValidationResult,
    ValidationSeverity,
};
pub use id::{EntityKind, Id};
pub use model::{Actor, AdviserRecord, Group, Role, SoftDeletable, live};
pub use store::{PortalStore, StoreError, StoreResult};
