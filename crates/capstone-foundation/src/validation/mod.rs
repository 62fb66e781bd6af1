//! Input validation and throughput limits
//!
//! - **Field validators** ([`input`]): type, length, range and shape checks
//!   on raw JSON values, each returning a normalised value or failing
//! - **Content safety** ([`content`]): denylist of script and markup
//!   injection patterns for free-text fields
//! - **Rate limiting** ([`rate_limiter`]): per `(operation, actor)` fixed
//!   windows for abuse-sensitive entry points
//!
//! # Example
//!
//! ```rust
//! use capstone_foundation::validation::{validate_email, validate_document_content};
//! use serde_json::json;
//!
//! let email = validate_email(&json!("  Ada@Example.COM ")).unwrap();
//! assert_eq!(email, "ada@example.com");
//!
//! assert!(validate_document_content(&json!("<script>alert(1)</script>")).is_err());
//! ```

pub mod content;
pub mod input;
pub mod rate_limiter;

pub use content::{ContentSafetyFilter, SafetyProfile, UnsafePattern};

pub use input::{
    ADVISER_CODE_LENGTH, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_STRING_LENGTH,
    MAX_CONTENT_TYPE_LENGTH, MAX_DOCUMENT_CONTENT_LENGTH, MAX_EMAIL_LENGTH, MAX_FILE_NAME_LENGTH,
    MAX_NOTE_CONTENT_LENGTH, RESERVED_FILE_NAMES, is_adviser_code, validate_adviser_code,
    validate_array, validate_array_with, validate_document_content, validate_email,
    validate_file_name, validate_file_size, validate_file_type, validate_id, validate_id_str,
    validate_note_content, validate_number, validate_optional_string, validate_string,
    InputValidator, ValidationLimits,
};

pub use rate_limiter::{RateLimitResult, RateLimitRule, RateLimitStatus, RateLimiter};
