//! Backing-store implementations
//!
//! The contract lives in `capstone_kernel::store`; this module provides
//! the in-memory backend used by tests and single-process deployments.

pub mod memory;

pub use capstone_kernel::store::{PortalStore, StoreError, StoreResult};
pub use memory::InMemoryStore;
