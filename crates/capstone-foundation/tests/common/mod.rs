//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use capstone_foundation::{Actor, AdviserRecord, Group, InMemoryStore, PortalStore, Role};
use capstone_kernel::Id;
use capstone_kernel::id::{Groups, Users};
use std::sync::Arc;

pub fn uid(raw: &str) -> Id<Users> {
    Id::parse(raw, "user_id").unwrap()
}

pub fn gid(raw: &str) -> Id<Groups> {
    Id::parse(raw, "group_id").unwrap()
}

/// Builder for a seeded [`InMemoryStore`].
#[derive(Default)]
pub struct Fixture {
    actors: Vec<Actor>,
    groups: Vec<Group>,
    advisers: Vec<AdviserRecord>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actor(mut self, id: &str, role: Role) -> Self {
        let email = format!("{}@uni.edu", id.trim_start_matches('_'));
        self.actors
            .push(Actor::new(uid(id), role, email, "First", "Last"));
        self
    }

    pub fn deleted_actor(mut self, id: &str, role: Role) -> Self {
        self.actors
            .push(Actor::new(uid(id), role, "gone@uni.edu", "Gone", "User").deleted());
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    pub fn adviser(mut self, id: &str, code: &str) -> Self {
        self.advisers.push(AdviserRecord::new(uid(id), code));
        self
    }

    pub async fn build(self) -> Arc<InMemoryStore> {
        let store = InMemoryStore::shared();
        for actor in self.actors {
            store.insert_actor(actor).await.unwrap();
        }
        for group in self.groups {
            store.insert_group(group).await.unwrap();
        }
        for record in self.advisers {
            store.insert_adviser(record).await.unwrap();
        }
        store
    }
}

/// One instructor, one adviser claimed by `_g1`, a project manager and a member.
pub async fn portal() -> Arc<InMemoryStore> {
    Fixture::new()
        .actor("_inst", Role::Instructor)
        .actor("_adv", Role::Adviser)
        .actor("_adv_other", Role::Adviser)
        .actor("_pm", Role::Student)
        .actor("_member", Role::Student)
        .actor("_stranger", Role::Student)
        .group(
            Group::new(gid("_g1"), uid("_pm"))
                .with_members([uid("_member")])
                .claimed_by(uid("_adv")),
        )
        .adviser("_adv", "ABCD-EFGH-IJKL")
        .adviser("_adv_other", "QRST-UVWX-YZAB")
        .build()
        .await
}
