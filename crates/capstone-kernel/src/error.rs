//! Crate-level error types for `capstone-kernel`.
//!
//! Every check in the policy layer fails fast with a single labelled
//! condition. [`PolicyError`] is that condition; [`PolicyError::code`] gives
//! callers a stable reason string they can branch on without parsing the
//! human-readable message.

use crate::model::Role;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Field validation
// =============================================================================

/// Represents the severity level of a validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValidationSeverity {
    /// Warning - validation failed but request can proceed
    Warning,
    /// Error - validation failed, request should be rejected
    #[default]
    Error,
    /// Critical - validation failed with security implications
    Critical,
}

/// A single rejected field.
///
/// `field` is the path of the offending value (`"members[2]"` for array
/// elements) and `code` is an upper-snake-case tag such as `TOO_LONG`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    /// The field path where validation failed
    pub field: String,
    /// Human-readable reason
    pub message: String,
    /// Error code for programmatic handling
    pub code: String,
    /// Severity level of the error
    pub severity: ValidationSeverity,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
            severity: ValidationSeverity::Error,
        }
    }

    /// Create a validation error with security implications
    pub fn critical(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            severity: ValidationSeverity::Critical,
            ..Self::new(field, message, code)
        }
    }

    /// Re-home this error under an array element of `field`.
    ///
    /// The element's own field name is dropped; the index becomes the path.
    #[must_use]
    pub fn at_index(self, field: &str, index: usize) -> Self {
        Self {
            field: format!("{field}[{index}]"),
            message: format!("item {index}: {}", self.message),
            ..self
        }
    }
}

/// Result type for single-field validation
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Rate limiting
// =============================================================================

/// Details of a refused call, returned when a window is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitError {
    /// Operation name the limit is keyed on
    pub operation: String,
    /// Actor identifier the limit is keyed on
    pub actor_id: String,
    /// Maximum requests allowed per window
    pub max_requests: u32,
    /// Requests already counted in the current window
    pub current_count: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// When the current window ends
    pub resets_at: chrono::DateTime<chrono::Utc>,
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' limited to {} per {} ms for {} (resets at {})",
            self.operation,
            self.max_requests,
            self.window_ms,
            self.actor_id,
            self.resets_at.to_rfc3339()
        )
    }
}

// =============================================================================
// PolicyError
// =============================================================================

/// Every rejection the policy layer can surface to an entry point.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PolicyError {
    /// A field failed a type, length, range, shape or content check.
    #[error(transparent)]
    InvalidInput(#[from] ValidationError),

    /// The referenced record does not exist or is soft-deleted.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The actor exists but fails a membership or ownership check.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// The actor's role is not allowed for this operation.
    ///
    /// Raised before any target lookup.
    #[error("role {actual} is not permitted (requires {})", format_roles(.allowed))]
    WrongRole { actual: Role, allowed: Vec<Role> },

    /// Refused on throughput grounds; retry later without changing input.
    #[error("rate limited: {0}")]
    RateLimited(RateLimitError),

    /// A backup package failed its structural or referential checks.
    #[error("malformed backup package: {reason}")]
    MalformedPackage { reason: String },

    /// Code issuance gave up before finding a free code.
    #[error("no unique code found after {attempts} attempt(s)")]
    CodeSpaceExhausted { attempts: u32 },

    /// Code issuance hit its deadline, usually a slow store.
    #[error("code issuance timed out after {waited_ms}ms ({attempts} attempt(s))")]
    IssuanceTimedOut { attempts: u32, waited_ms: u64 },

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl PolicyError {
    /// Stable reason code for this rejection.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::WrongRole { .. } => "WRONG_ROLE",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::MalformedPackage { .. } => "MALFORMED_PACKAGE",
            Self::CodeSpaceExhausted { .. } => "CODE_SPACE_EXHAUSTED",
            Self::IssuanceTimedOut { .. } => "CODE_ISSUANCE_TIMEOUT",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Whether the same call may succeed later with unchanged input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_)
                | Self::IssuanceTimedOut { .. }
                | Self::Store(StoreError::Connection(_))
        )
    }

    /// `true` for both `Forbidden` and its `WrongRole` specialisation.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. } | Self::WrongRole { .. })
    }

    /// Shorthand for a `NotFound` rejection.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

fn format_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::to_string)
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Result type for policy decisions
pub type PolicyResult<T> = Result<T, PolicyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_index_rewrites_path() {
        let err = ValidationError::new("member_id", "must be a string", "NOT_A_STRING")
            .at_index("member_ids", 2);
        assert_eq!(err.field, "member_ids[2]");
        assert_eq!(err.message, "item 2: must be a string");
        assert_eq!(err.code, "NOT_A_STRING");
    }

    #[test]
    fn test_policy_error_codes_are_stable() {
        let invalid: PolicyError = ValidationError::new("f", "bad", "EMPTY").into();
        assert_eq!(invalid.code(), "INVALID_INPUT");
        assert_eq!(PolicyError::not_found("group", "_g1").code(), "NOT_FOUND");

        let wrong = PolicyError::WrongRole {
            actual: Role::Adviser,
            allowed: vec![Role::Student],
        };
        assert_eq!(wrong.code(), "WRONG_ROLE");
        assert!(wrong.is_forbidden());
        assert_eq!(
            wrong.to_string(),
            "role adviser is not permitted (requires student)"
        );
    }

    #[test]
    fn test_retryable_classification() {
        let limited = PolicyError::RateLimited(RateLimitError {
            operation: "resend".into(),
            actor_id: "_u1".into(),
            max_requests: 3,
            current_count: 3,
            window_ms: 60_000,
            resets_at: chrono::Utc::now(),
        });
        assert!(limited.is_retryable());
        assert!(PolicyError::Store(StoreError::Connection("down".into())).is_retryable());
        let timed_out = PolicyError::IssuanceTimedOut {
            attempts: 1,
            waited_ms: 500,
        };
        assert!(timed_out.is_retryable());
        assert_eq!(timed_out.code(), "CODE_ISSUANCE_TIMEOUT");
        assert!(!PolicyError::CodeSpaceExhausted { attempts: 10 }.is_retryable());
        assert!(!PolicyError::Store(StoreError::Query("bad".into())).is_retryable());
        assert!(
            !PolicyError::Forbidden {
                reason: "x".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_critical_severity() {
        let err = ValidationError::critical("content", "script", "UNSAFE_CONTENT");
        assert_eq!(err.severity, ValidationSeverity::Critical);
    }
}
