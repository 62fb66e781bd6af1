//! Capstone Foundation
//!
//! Policy layer for the capstone portal: every mutating entry point
//! validates its inputs, passes the access gate, and only then touches
//! the store.

// access gate module
pub mod access;

// backup package validation
pub mod backup;

// adviser code issuance
pub mod codes;

// config module
pub mod config;

// engine facade
pub mod engine;

// logging setup
pub mod logging;

// persistence module
pub mod persistence;

// Validation module - field validators, content safety, rate limiting
pub mod validation;

pub use access::{AccessGate, AdviserContext, InstructorContext, StudentContext, VerifiedActor};
pub use backup::{BackupPackage, BackupTables, BackupValidator, REQUIRED_TABLES};
pub use codes::{CodeIssuer, generate_candidate};
pub use config::{CodeIssuerConfig, PolicyConfig};
pub use engine::PolicyEngine;
pub use persistence::InMemoryStore;
pub use validation::{
    ContentSafetyFilter, InputValidator, RateLimitResult, RateLimitRule, RateLimiter,
    ValidationLimits,
};

// Re-export kernel contracts so hosts depend on one crate
pub use capstone_kernel::{
    Actor, AdviserRecord, Group, Id, PolicyError, PolicyResult, PortalStore, Role, StoreError,
    ValidationError,
};
