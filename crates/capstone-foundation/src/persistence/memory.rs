//! In-memory backing store
//!
//! Thread-safe [`PortalStore`] implementation that keeps every row in
//! memory. Suitable for:
//! - Unit and integration tests
//! - Development environments
//! - Single-process demos seeded from a backup package
//!
//! # Example
//!
//! ```rust,ignore
//! use capstone_foundation::persistence::InMemoryStore;
//!
//! let store = InMemoryStore::shared();
//! store.insert_actor(actor).await?;
//! let found = store.get_actor(&actor_id).await?;
//! ```

use async_trait::async_trait;
use capstone_kernel::id::{Groups, Users};
use capstone_kernel::{
    Actor, AdviserRecord, Group, Id, PortalStore, SoftDeletable, StoreError, StoreResult,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-memory storage
pub struct InMemoryStore {
    /// Actor rows by id
    actors: Arc<RwLock<HashMap<Id<Users>, Actor>>>,
    /// Group rows by id
    groups: Arc<RwLock<HashMap<Id<Groups>, Group>>>,
    /// Adviser rows by owning account
    advisers: Arc<RwLock<HashMap<Id<Users>, AdviserRecord>>>,
    /// Adviser-code index (code -> owning account)
    adviser_codes: Arc<RwLock<HashMap<String, Id<Users>>>>,
    /// Number of adviser-code lookups served
    code_lookups: AtomicUsize,
    /// Connection status
    connected: AtomicBool,
}

impl InMemoryStore {
    /// Create new in-memory store
    pub fn new() -> Self {
        Self {
            actors: Arc::new(RwLock::new(HashMap::new())),
            groups: Arc::new(RwLock::new(HashMap::new())),
            advisers: Arc::new(RwLock::new(HashMap::new())),
            adviser_codes: Arc::new(RwLock::new(HashMap::new())),
            code_lookups: AtomicUsize::new(0),
            connected: AtomicBool::new(true),
        }
    }

    /// Create shared in-memory store
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Simulate losing (or regaining) the backing connection.
    ///
    /// While disconnected every call fails with [`StoreError::Connection`].
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// How many times the adviser-code index has been queried.
    pub fn code_lookups(&self) -> usize {
        self.code_lookups.load(Ordering::SeqCst)
    }

    /// Clear all data
    pub async fn clear(&self) {
        self.actors.write().await.clear();
        self.groups.write().await.clear();
        self.advisers.write().await.clear();
        self.adviser_codes.write().await.clear();
    }

    pub async fn actor_count(&self) -> usize {
        self.actors.read().await.len()
    }

    pub async fn adviser_count(&self) -> usize {
        self.advisers.read().await.len()
    }

    fn ensure_connected(&self) -> StoreResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Connection("in-memory store is offline".to_string()))
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortalStore for InMemoryStore {
    async fn get_actor(&self, id: &Id<Users>) -> StoreResult<Option<Actor>> {
        self.ensure_connected()?;
        let actors = self.actors.read().await;
        Ok(actors.get(id).cloned())
    }

    async fn get_group(&self, id: &Id<Groups>) -> StoreResult<Option<Group>> {
        self.ensure_connected()?;
        let groups = self.groups.read().await;
        Ok(groups.get(id).cloned())
    }

    async fn get_adviser_by_user(&self, user: &Id<Users>) -> StoreResult<Option<AdviserRecord>> {
        self.ensure_connected()?;
        let advisers = self.advisers.read().await;
        Ok(advisers.get(user).cloned())
    }

    async fn find_adviser_by_code(&self, code: &str) -> StoreResult<Option<AdviserRecord>> {
        self.ensure_connected()?;
        self.code_lookups.fetch_add(1, Ordering::SeqCst);
        let codes = self.adviser_codes.read().await;
        let Some(owner) = codes.get(code) else {
            return Ok(None);
        };
        let advisers = self.advisers.read().await;
        Ok(advisers.get(owner).cloned())
    }

    async fn insert_actor(&self, actor: Actor) -> StoreResult<()> {
        self.ensure_connected()?;
        self.actors.write().await.insert(actor.id.clone(), actor);
        Ok(())
    }

    async fn insert_group(&self, group: Group) -> StoreResult<()> {
        self.ensure_connected()?;
        self.groups.write().await.insert(group.id.clone(), group);
        Ok(())
    }

    async fn insert_adviser(&self, record: AdviserRecord) -> StoreResult<()> {
        self.ensure_connected()?;
        // Both locks are held for the check and the write, so two inserts
        // racing on one code cannot both succeed.
        let mut codes = self.adviser_codes.write().await;
        let mut advisers = self.advisers.write().await;

        if let Some(owner) = codes.get(&record.code) {
            let holder_is_live = advisers
                .get(owner)
                .is_some_and(|existing| !existing.is_deleted() && existing.code == record.code);
            if holder_is_live && owner != &record.adviser_id {
                return Err(StoreError::Constraint(format!(
                    "adviser code {} is already in use",
                    record.code
                )));
            }
        }

        // drop the old index entry only while this record still owns it
        if let Some(previous) = advisers.get(&record.adviser_id) {
            if previous.code != record.code
                && codes.get(&previous.code) == Some(&record.adviser_id)
            {
                codes.remove(&previous.code);
            }
        }

        codes.insert(record.code.clone(), record.adviser_id.clone());
        advisers.insert(record.adviser_id.clone(), record);
        Ok(())
    }
}
