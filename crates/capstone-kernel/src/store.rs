//! Backing-store contract.
//!
//! The policy layer only reads through this trait, apart from the narrow
//! adviser-creation path. Implementations return records as stored,
//! including soft-deleted ones; filtering happens on the caller's side.

use crate::id::{Groups, Id, Users};
use crate::model::{Actor, AdviserRecord, Group};
use async_trait::async_trait;

/// Backing-store failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),
    /// Query error
    #[error("Query error: {0}")]
    Query(String),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Constraint violation (e.g. duplicate adviser code)
    #[error("Constraint violation: {0}")]
    Constraint(String),
    /// Other errors
    #[error("Store error: {0}")]
    Other(String),
}

/// Store result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Records the access gate and code issuer depend on.
#[async_trait]
pub trait PortalStore: Send + Sync {
    /// Actor row by id, deleted or not.
    async fn get_actor(&self, id: &Id<Users>) -> StoreResult<Option<Actor>>;

    /// Group row by id, deleted or not.
    async fn get_group(&self, id: &Id<Groups>) -> StoreResult<Option<Group>>;

    /// Adviser row belonging to the given account.
    async fn get_adviser_by_user(&self, user: &Id<Users>) -> StoreResult<Option<AdviserRecord>>;

    /// Exact lookup on the adviser-code index.
    async fn find_adviser_by_code(&self, code: &str) -> StoreResult<Option<AdviserRecord>>;

    async fn insert_actor(&self, actor: Actor) -> StoreResult<()>;

    async fn insert_group(&self, group: Group) -> StoreResult<()>;

    /// Insert an adviser row.
    ///
    /// Must fail with [`StoreError::Constraint`] if a non-deleted row already
    /// carries the same code.
    async fn insert_adviser(&self, record: AdviserRecord) -> StoreResult<()>;
}
