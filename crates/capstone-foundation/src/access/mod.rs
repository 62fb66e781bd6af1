//! Access control
//!
//! [`AccessGate`] turns a raw actor id plus an optional target into a
//! verified, narrowed context or a rejection.

pub mod gate;

pub use gate::{
    AccessGate, AdviserContext, InstructorContext, StudentContext, VerifiedActor,
};
