//! Typed entity identifiers.
//!
//! Store identifiers are opaque strings carrying an internal prefix (a
//! leading underscore). [`Id<K>`] pairs the raw string with a zero-sized
//! table marker so a group id can never be passed where a user id is
//! expected. Untrusted input only becomes an `Id` through [`Id::parse`],
//! which is what lets the access gate skip store round-trips on malformed
//! identifiers.

use crate::error::{ValidationError, ValidationResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::Hash;

/// Longest identifier accepted from untrusted input.
pub const MAX_ID_LENGTH: usize = 128;

/// Prefix every store identifier starts with.
pub const ID_PREFIX: char = '_';

mod sealed {
    pub trait Sealed {}
}

/// Marker for one of the fixed set of tables an [`Id`] may point into.
pub trait EntityKind:
    sealed::Sealed + fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + Send + Sync + 'static
{
    /// Table name as stored.
    const TABLE: &'static str;
}

macro_rules! entity_kinds {
    ($($(#[$meta:meta])* $name:ident => $table:literal),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub enum $name {}

            impl sealed::Sealed for $name {}

            impl EntityKind for $name {
                const TABLE: &'static str = $table;
            }
        )+

        /// Every table name an identifier may refer to.
        pub const ENTITY_TABLES: &[&str] = &[$($table),+];
    };
}

entity_kinds! {
    /// Portal accounts (students, advisers, instructors).
    Users => "users",
    /// Collaboration groups.
    Groups => "groups",
    Documents => "documents",
    Notes => "notes",
    TaskAssignments => "taskAssignments",
    DocumentStatus => "documentStatus",
    Images => "images",
    /// Per-student profile rows.
    Students => "students",
    /// Per-adviser rows holding the linking code.
    Advisers => "advisers",
}

/// An identifier into table `K`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<K: EntityKind> {
    raw: String,
    kind: std::marker::PhantomData<K>,
}

impl<K: EntityKind> Id<K> {
    /// Check the identifier shape and attach the table marker.
    ///
    /// `field` names the input for the error message.
    pub fn parse(raw: &str, field: &str) -> ValidationResult<Self> {
        check_shape(raw, field)?;
        Ok(Self {
            raw: raw.to_string(),
            kind: std::marker::PhantomData,
        })
    }

    /// Raw identifier text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Table this identifier points into.
    pub fn table(&self) -> &'static str {
        K::TABLE
    }

    pub fn into_string(self) -> String {
        self.raw
    }
}

fn check_shape(raw: &str, field: &str) -> ValidationResult<()> {
    if !raw.starts_with(ID_PREFIX) || raw.len() <= ID_PREFIX.len_utf8() {
        return Err(ValidationError::new(
            field,
            "must be a store identifier",
            "INVALID_ID",
        ));
    }
    if raw.chars().count() > MAX_ID_LENGTH {
        return Err(ValidationError::new(
            field,
            format!("must be at most {MAX_ID_LENGTH} characters"),
            "INVALID_ID",
        ));
    }
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::new(
            field,
            "must not contain whitespace or control characters",
            "INVALID_ID",
        ));
    }
    Ok(())
}

impl<K: EntityKind> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl<K: EntityKind> AsRef<str> for Id<K> {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl<K: EntityKind> Serialize for Id<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de, K: EntityKind> Deserialize<'de> for Id<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw, K::TABLE).map_err(serde::de::Error::custom)
    }
}
