//! Persisted records the policy layer reads.
//!
//! These mirror the rows owned by the backing store. The gate never writes
//! them; it only narrows them into verified contexts.

use crate::id::{Groups, Id, Users};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Role
// =============================================================================

/// Account role. Stored as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Role {
    Student = 0,
    Adviser = 1,
    Instructor = 2,
}

impl Role {
    /// Integer code as stored on the actor row.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Role {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Student),
            1 => Ok(Self::Adviser),
            2 => Ok(Self::Instructor),
            other => Err(format!("unknown role code {other}")),
        }
    }
}

impl From<Role> for u8 {
    fn from(role: Role) -> Self {
        role.code()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Student => write!(f, "student"),
            Self::Adviser => write!(f, "adviser"),
            Self::Instructor => write!(f, "instructor"),
        }
    }
}

// =============================================================================
// Soft deletion
// =============================================================================

/// Records that are marked inactive instead of being removed.
pub trait SoftDeletable {
    fn is_deleted(&self) -> bool;
}

/// Drop soft-deleted records so they look exactly like absent ones.
///
/// Every read path in the gate goes through this one predicate.
pub fn live<T: SoftDeletable>(record: Option<T>) -> Option<T> {
    record.filter(|r| !r.is_deleted())
}

// =============================================================================
// Actor
// =============================================================================

/// Subrole code for a student who manages a group's project.
pub const SUBROLE_PROJECT_MANAGER: u8 = 0;
/// Subrole code for an ordinary group member.
pub const SUBROLE_MEMBER: u8 = 1;

/// A portal account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Id<Users>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subrole: Option<u8>,
    pub email: String,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Actor {
    pub fn new(
        id: Id<Users>,
        role: Role,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            role,
            subrole: None,
            email: email.into(),
            first_name: first_name.into(),
            middle_name: None,
            last_name: last_name.into(),
            is_deleted: false,
        }
    }

    pub fn with_subrole(mut self, subrole: u8) -> Self {
        self.subrole = Some(subrole);
        self
    }

    /// Mark this record soft-deleted.
    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    /// "First Middle Last", skipping an absent middle name.
    pub fn display_name(&self) -> String {
        match &self.middle_name {
            Some(middle) if !middle.trim().is_empty() => {
                format!("{} {} {}", self.first_name, middle, self.last_name)
            }
            _ => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

impl SoftDeletable for Actor {
    fn is_deleted(&self) -> bool {
        self.is_deleted
    }
}

// =============================================================================
// Group
// =============================================================================

/// A collaboration unit.
///
/// The project manager is tracked separately from `member_ids` and need not
/// appear there. A group with `adviser_id` set is claimed by that adviser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Id<Groups>,
    pub project_manager_id: Id<Users>,
    #[serde(default)]
    pub member_ids: Vec<Id<Users>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adviser_id: Option<Id<Users>>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Group {
    pub fn new(id: Id<Groups>, project_manager_id: Id<Users>) -> Self {
        Self {
            id,
            project_manager_id,
            member_ids: Vec::new(),
            adviser_id: None,
            is_deleted: false,
        }
    }

    pub fn with_members(mut self, members: impl IntoIterator<Item = Id<Users>>) -> Self {
        self.member_ids.extend(members);
        self
    }

    pub fn claimed_by(mut self, adviser_id: Id<Users>) -> Self {
        self.adviser_id = Some(adviser_id);
        self
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    pub fn is_project_manager(&self, user: &Id<Users>) -> bool {
        &self.project_manager_id == user
    }

    pub fn has_member(&self, user: &Id<Users>) -> bool {
        self.member_ids.contains(user)
    }

    /// Project manager or listed member.
    pub fn includes(&self, user: &Id<Users>) -> bool {
        self.is_project_manager(user) || self.has_member(user)
    }

    pub fn is_claimed_by(&self, adviser: &Id<Users>) -> bool {
        self.adviser_id.as_ref() == Some(adviser)
    }
}

impl SoftDeletable for Group {
    fn is_deleted(&self) -> bool {
        self.is_deleted
    }
}

// =============================================================================
// AdviserRecord
// =============================================================================

/// Per-adviser row holding the linking code students use to find them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviserRecord {
    pub adviser_id: Id<Users>,
    pub code: String,
    #[serde(default)]
    pub is_deleted: bool,
}

impl AdviserRecord {
    pub fn new(adviser_id: Id<Users>, code: impl Into<String>) -> Self {
        Self {
            adviser_id,
            code: code.into(),
            is_deleted: false,
        }
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }
}

impl SoftDeletable for AdviserRecord {
    fn is_deleted(&self) -> bool {
        self.is_deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(raw: &str) -> Id<Users> {
        Id::parse(raw, "user_id").unwrap()
    }

    #[test]
    fn test_role_codes() {
        assert_eq!(Role::try_from(0u8), Ok(Role::Student));
        assert_eq!(Role::try_from(1u8), Ok(Role::Adviser));
        assert_eq!(Role::try_from(2u8), Ok(Role::Instructor));
        assert!(Role::try_from(3u8).is_err());
        assert_eq!(Role::Instructor.code(), 2);
    }

    #[test]
    fn test_actor_rejects_unknown_role_code() {
        let json = r#"{"id":"_u1","role":7,"email":"a@b.co","first_name":"A","last_name":"B"}"#;
        assert!(serde_json::from_str::<Actor>(json).is_err());

        let json = r#"{"id":"_u1","role":1,"email":"a@b.co","first_name":"A","last_name":"B"}"#;
        let actor: Actor = serde_json::from_str(json).unwrap();
        assert_eq!(actor.role, Role::Adviser);
        assert!(!actor.is_deleted);
    }

    #[test]
    fn test_live_filters_soft_deleted() {
        let actor = Actor::new(uid("_u1"), Role::Student, "a@b.co", "Ada", "Byron");
        assert!(live(Some(actor.clone())).is_some());
        assert!(live(Some(actor.deleted())).is_none());
        assert!(live::<Actor>(None).is_none());
    }

    #[test]
    fn test_group_membership() {
        let pm = uid("_pm");
        let member = uid("_m1");
        let stranger = uid("_x");
        let group = Group::new(Id::parse("_g1", "group_id").unwrap(), pm.clone())
            .with_members([member.clone()]);

        assert!(group.includes(&pm));
        assert!(!group.has_member(&pm));
        assert!(group.includes(&member));
        assert!(!group.includes(&stranger));
        assert!(!group.is_claimed_by(&stranger));
    }

    #[test]
    fn test_display_name() {
        let mut actor = Actor::new(uid("_u1"), Role::Student, "a@b.co", "Ada", "Byron");
        assert_eq!(actor.display_name(), "Ada Byron");
        actor.middle_name = Some("King".into());
        assert_eq!(actor.display_name(), "Ada King Byron");
    }
}
