//! Role and group-membership checks for entry points
//!
//! Each `require_*` call makes one decision: it either returns a narrowed
//! context proving who the caller is and what they may touch, or a
//! [`PolicyError`] naming the first check that failed.
//!
//! Role is always checked before any target lookup, so a caller with the
//! wrong role cannot tell a missing group from an off-limits one.

use capstone_kernel::id::{Groups, Users};
use capstone_kernel::{
    Actor, AdviserRecord, Group, Id, PolicyError, PolicyResult, PortalStore, Role, live,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// An actor that exists and is not soft-deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedActor {
    pub actor: Actor,
    pub role: Role,
}

/// A student acting on a group they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentContext {
    pub actor: Actor,
    pub group: Group,
}

/// An adviser acting on a group that claimed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdviserContext {
    pub actor: Actor,
    pub group: Group,
    pub adviser: AdviserRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructorContext {
    pub actor: Actor,
}

/// Read-only decision point over a [`PortalStore`].
#[derive(Clone)]
pub struct AccessGate {
    store: Arc<dyn PortalStore>,
}

impl AccessGate {
    pub fn new(store: Arc<dyn PortalStore>) -> Self {
        Self { store }
    }

    /// Load the actor, treating a soft-deleted row as absent.
    pub async fn resolve_actor(&self, actor_id: &Id<Users>) -> PolicyResult<VerifiedActor> {
        let actor = live(self.store.get_actor(actor_id).await?).ok_or_else(|| {
            debug!(actor_id = %actor_id, "actor not found");
            PolicyError::not_found("actor", actor_id.as_str())
        })?;

        Ok(VerifiedActor {
            role: actor.role,
            actor,
        })
    }

    /// Resolve the actor and fail with `WrongRole` unless their role is in `allowed`.
    pub async fn require_any_role(
        &self,
        actor_id: &Id<Users>,
        allowed: &[Role],
    ) -> PolicyResult<VerifiedActor> {
        let verified = self.resolve_actor(actor_id).await?;
        if !allowed.contains(&verified.role) {
            warn!(
                actor_id = %actor_id,
                role = %verified.role,
                "role not permitted"
            );
            return Err(PolicyError::WrongRole {
                actual: verified.role,
                allowed: allowed.to_vec(),
            });
        }
        debug!(actor_id = %actor_id, role = %verified.role, "role check passed");
        Ok(verified)
    }

    async fn load_group(&self, group_id: &Id<Groups>) -> PolicyResult<Group> {
        live(self.store.get_group(group_id).await?).ok_or_else(|| {
            debug!(group_id = %group_id, "group not found");
            PolicyError::not_found("group", group_id.as_str())
        })
    }

    /// Student who is the group's project manager or one of its members.
    pub async fn require_student(
        &self,
        actor_id: &Id<Users>,
        group_id: &Id<Groups>,
    ) -> PolicyResult<StudentContext> {
        let VerifiedActor { actor, .. } = self.require_any_role(actor_id, &[Role::Student]).await?;
        let group = self.load_group(group_id).await?;

        if !group.includes(actor_id) {
            warn!(actor_id = %actor_id, group_id = %group_id, "student is not in group");
            return Err(PolicyError::Forbidden {
                reason: format!("{actor_id} is not a member of group {group_id}"),
            });
        }

        debug!(actor_id = %actor_id, group_id = %group_id, "student access granted");
        Ok(StudentContext { actor, group })
    }

    /// Student who manages the group's project. Plain membership is forbidden.
    pub async fn require_project_manager(
        &self,
        actor_id: &Id<Users>,
        group_id: &Id<Groups>,
    ) -> PolicyResult<StudentContext> {
        let VerifiedActor { actor, .. } = self.require_any_role(actor_id, &[Role::Student]).await?;
        let group = self.load_group(group_id).await?;

        if !group.is_project_manager(actor_id) {
            warn!(actor_id = %actor_id, group_id = %group_id, "student is not project manager");
            return Err(PolicyError::Forbidden {
                reason: format!("{actor_id} is not the project manager of group {group_id}"),
            });
        }

        debug!(actor_id = %actor_id, group_id = %group_id, "project manager access granted");
        Ok(StudentContext { actor, group })
    }

    /// Adviser claimed by this specific group, with a live adviser record.
    pub async fn require_adviser(
        &self,
        actor_id: &Id<Users>,
        group_id: &Id<Groups>,
    ) -> PolicyResult<AdviserContext> {
        let VerifiedActor { actor, .. } = self.require_any_role(actor_id, &[Role::Adviser]).await?;
        let group = self.load_group(group_id).await?;

        if !group.is_claimed_by(actor_id) {
            warn!(actor_id = %actor_id, group_id = %group_id, "adviser does not hold group claim");
            return Err(PolicyError::Forbidden {
                reason: format!("group {group_id} is not advised by {actor_id}"),
            });
        }

        let adviser = live(self.store.get_adviser_by_user(actor_id).await?)
            .ok_or_else(|| PolicyError::not_found("adviser", actor_id.as_str()))?;

        debug!(actor_id = %actor_id, group_id = %group_id, "adviser access granted");
        Ok(AdviserContext {
            actor,
            group,
            adviser,
        })
    }

    pub async fn require_instructor(
        &self,
        actor_id: &Id<Users>,
    ) -> PolicyResult<InstructorContext> {
        let VerifiedActor { actor, .. } =
            self.require_any_role(actor_id, &[Role::Instructor]).await?;
        debug!(actor_id = %actor_id, "instructor access granted");
        Ok(InstructorContext { actor })
    }
}
