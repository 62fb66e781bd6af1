//! Field validators
//!
//! Each check takes a raw JSON value and the field name used in error
//! messages, and either returns a fully normalised value or fails with a
//! [`ValidationError`] naming that field. Nothing partially validated is
//! ever handed back.

use super::content::ContentSafetyFilter;
use capstone_kernel::{EntityKind, Id, ValidationError, ValidationResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default ceiling for [`validate_string`].
pub const DEFAULT_MAX_STRING_LENGTH: usize = 1000;
/// Ceiling for document bodies (1 MiB of characters).
pub const MAX_DOCUMENT_CONTENT_LENGTH: usize = 1024 * 1024;
/// Ceiling for notes (10 KiB of characters).
pub const MAX_NOTE_CONTENT_LENGTH: usize = 10 * 1024;
pub const MAX_FILE_NAME_LENGTH: usize = 255;
pub const MAX_CONTENT_TYPE_LENGTH: usize = 100;
pub const MAX_EMAIL_LENGTH: usize = 320;
/// Default upload ceiling in bytes (5 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
/// `XXXX-XXXX-XXXX`
pub const ADVISER_CODE_LENGTH: usize = 14;

/// Device names Windows refuses as file stems.
pub const RESERVED_FILE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

// local@domain.tld, deliberately permissive
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

static ADVISER_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{4}-[A-Z]{4}-[A-Z]{4}$").unwrap());

static HAZARDOUS_FILE_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).unwrap());

// =============================================================================
// Scalars
// =============================================================================

/// Textual, at most `max_length` characters, non-empty once trimmed.
///
/// Returns the trimmed text. The length ceiling applies to the raw value.
pub fn validate_string(value: &Value, field: &str, max_length: usize) -> ValidationResult<String> {
    let Some(text) = value.as_str() else {
        return Err(ValidationError::new(field, "must be a string", "NOT_A_STRING"));
    };

    let length = text.chars().count();
    if length > max_length {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max_length} characters (got {length})"),
            "TOO_LONG",
        ));
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "cannot be empty", "EMPTY"));
    }

    Ok(trimmed.to_string())
}

/// Absent and `null` pass as `None`; anything else must satisfy
/// [`validate_string`].
pub fn validate_optional_string(
    value: Option<&Value>,
    field: &str,
    max_length: usize,
) -> ValidationResult<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => validate_string(v, field, max_length).map(Some),
    }
}

/// Returns the address trimmed and lowercased.
pub fn validate_email(value: &Value) -> ValidationResult<String> {
    let email = validate_string(value, "email", MAX_EMAIL_LENGTH)?;
    if !EMAIL_RE.is_match(&email) {
        return Err(ValidationError::new(
            "email",
            "must be a valid email address",
            "INVALID_EMAIL",
        ));
    }
    Ok(email.to_lowercase())
}

/// A store identifier into table `K`.
pub fn validate_id<K: EntityKind>(value: &Value, field: &str) -> ValidationResult<Id<K>> {
    let Some(raw) = value.as_str() else {
        return Err(ValidationError::new(
            field,
            "must be a store identifier",
            "INVALID_ID",
        ));
    };
    validate_id_str(raw, field)
}

/// [`validate_id`] for identifiers taken from paths or headers.
pub fn validate_id_str<K: EntityKind>(raw: &str, field: &str) -> ValidationResult<Id<K>> {
    Id::parse(raw, field)
}

/// A finite number inside the optional inclusive bounds, returned unchanged.
pub fn validate_number(
    value: &Value,
    field: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> ValidationResult<f64> {
    let number = match value.as_f64() {
        Some(n) if n.is_finite() => n,
        _ => {
            return Err(ValidationError::new(
                field,
                "must be a finite number",
                "NOT_A_NUMBER",
            ));
        }
    };

    if let Some(min) = min {
        if number < min {
            return Err(ValidationError::new(
                field,
                format!("must be at least {min}"),
                "OUT_OF_RANGE",
            ));
        }
    }
    if let Some(max) = max {
        if number > max {
            return Err(ValidationError::new(
                field,
                format!("must be at most {max}"),
                "OUT_OF_RANGE",
            ));
        }
    }

    Ok(number)
}

// =============================================================================
// Arrays
// =============================================================================

/// Any JSON array, elements untouched.
pub fn validate_array(value: &Value, field: &str) -> ValidationResult<Vec<Value>> {
    match value.as_array() {
        Some(items) => Ok(items.clone()),
        None => Err(not_an_array(field)),
    }
}

/// A JSON array whose every element passes `item`.
///
/// Stops at the first failing element and reports it under `field[index]`.
pub fn validate_array_with<T, F>(value: &Value, field: &str, item: F) -> ValidationResult<Vec<T>>
where
    F: Fn(&Value, &str) -> ValidationResult<T>,
{
    let Some(items) = value.as_array() else {
        return Err(not_an_array(field));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, element)| {
            let path = format!("{field}[{index}]");
            item(element, &path).map_err(|err| err.at_index(field, index))
        })
        .collect()
}

fn not_an_array(field: &str) -> ValidationError {
    ValidationError::new(field, "must be an array", "NOT_AN_ARRAY")
}

// =============================================================================
// Free text
// =============================================================================

/// Document body: 1 MiB ceiling, full content-safety profile.
pub fn validate_document_content(value: &Value) -> ValidationResult<String> {
    validate_content(
        value,
        "content",
        MAX_DOCUMENT_CONTENT_LENGTH,
        ContentSafetyFilter::document(),
    )
}

/// Note body: 10 KiB ceiling, base content-safety profile.
pub fn validate_note_content(value: &Value) -> ValidationResult<String> {
    validate_content(
        value,
        "content",
        MAX_NOTE_CONTENT_LENGTH,
        ContentSafetyFilter::note(),
    )
}

fn validate_content(
    value: &Value,
    field: &str,
    max_length: usize,
    filter: ContentSafetyFilter,
) -> ValidationResult<String> {
    let text = validate_string(value, field, max_length)?;
    filter.check_safe(&text).map_err(|pattern| {
        ValidationError::critical(
            field,
            format!("contains disallowed content ({pattern})"),
            "UNSAFE_CONTENT",
        )
    })?;
    Ok(text)
}

// =============================================================================
// Uploads
// =============================================================================

/// A file name safe on every filesystem the portal serves to.
pub fn validate_file_name(value: &Value) -> ValidationResult<String> {
    let name = validate_string(value, "filename", MAX_FILE_NAME_LENGTH)?;

    if HAZARDOUS_FILE_CHARS_RE.is_match(&name) {
        return Err(ValidationError::new(
            "filename",
            "contains characters that are not allowed in file names",
            "INVALID_FILE_NAME",
        ));
    }

    let stem = name.split('.').next().unwrap_or_default().trim_end();
    if RESERVED_FILE_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
    {
        return Err(ValidationError::new(
            "filename",
            format!("'{stem}' is a reserved file name"),
            "RESERVED_FILE_NAME",
        ));
    }

    Ok(name)
}

/// Size in bytes within `[0, max_size]`; zero-byte files are rejected.
pub fn validate_file_size(value: &Value, max_size: u64) -> ValidationResult<f64> {
    let size = validate_number(value, "file_size", Some(0.0), Some(max_size as f64))?;
    if size == 0.0 {
        return Err(ValidationError::new(
            "file_size",
            "file cannot be empty",
            "EMPTY_FILE",
        ));
    }
    Ok(size)
}

/// A content type drawn from `allowed_types`.
pub fn validate_file_type(value: &Value, allowed_types: &[&str]) -> ValidationResult<String> {
    let content_type = validate_string(value, "content_type", MAX_CONTENT_TYPE_LENGTH)?;
    if !allowed_types.contains(&content_type.as_str()) {
        return Err(ValidationError::new(
            "content_type",
            format!("must be one of: {}", allowed_types.join(", ")),
            "UNSUPPORTED_FILE_TYPE",
        ));
    }
    Ok(content_type)
}

// =============================================================================
// Codes
// =============================================================================

/// An adviser linking code, `XXXX-XXXX-XXXX` in uppercase A-Z.
pub fn validate_adviser_code(value: &Value) -> ValidationResult<String> {
    let code = validate_string(value, "code", ADVISER_CODE_LENGTH)?;
    if !is_adviser_code(&code) {
        return Err(ValidationError::new(
            "code",
            "must look like ABCD-EFGH-IJKL",
            "INVALID_ADVISER_CODE",
        ));
    }
    Ok(code)
}

/// Grammar check without the string-shape checks.
pub fn is_adviser_code(code: &str) -> bool {
    ADVISER_CODE_RE.is_match(code)
}

// =============================================================================
// Configured validator
// =============================================================================

/// Ceilings an [`InputValidator`] applies in place of the built-in defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    pub default_max_string_length: usize,
    pub document_content_max: usize,
    pub note_content_max: usize,
    pub max_file_size: u64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            default_max_string_length: DEFAULT_MAX_STRING_LENGTH,
            document_content_max: MAX_DOCUMENT_CONTENT_LENGTH,
            note_content_max: MAX_NOTE_CONTENT_LENGTH,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// The field validators bound to deployment-specific ceilings.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputValidator {
    limits: ValidationLimits,
}

impl InputValidator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// [`validate_string`] at the configured default ceiling.
    pub fn string(&self, value: &Value, field: &str) -> ValidationResult<String> {
        validate_string(value, field, self.limits.default_max_string_length)
    }

    pub fn optional_string(
        &self,
        value: Option<&Value>,
        field: &str,
    ) -> ValidationResult<Option<String>> {
        validate_optional_string(value, field, self.limits.default_max_string_length)
    }

    pub fn document_content(&self, value: &Value) -> ValidationResult<String> {
        validate_content(
            value,
            "content",
            self.limits.document_content_max,
            ContentSafetyFilter::document(),
        )
    }

    pub fn note_content(&self, value: &Value) -> ValidationResult<String> {
        validate_content(
            value,
            "content",
            self.limits.note_content_max,
            ContentSafetyFilter::note(),
        )
    }

    pub fn file_size(&self, value: &Value) -> ValidationResult<f64> {
        validate_file_size(value, self.limits.max_file_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstone_kernel::id::{Groups, Users};
    use serde_json::json;

    #[test]
    fn test_string_rejects_blank_for_any_field() {
        for blank in ["", " ", "\t\n", "    \r\n  "] {
            for field in ["title", "name", "x"] {
                let err = validate_string(&json!(blank), field, 1000).unwrap_err();
                assert_eq!(err.code, "EMPTY");
                assert_eq!(err.field, field);
            }
        }
    }

    #[test]
    fn test_string_length_ceiling() {
        let at_limit = "a".repeat(10);
        assert_eq!(validate_string(&json!(at_limit), "f", 10).unwrap(), at_limit);

        let over = "a".repeat(11);
        assert_eq!(validate_string(&json!(over), "f", 10).unwrap_err().code, "TOO_LONG");

        // counted in characters, not bytes
        let accented = "é".repeat(10);
        assert!(validate_string(&json!(accented), "f", 10).is_ok());
    }

    #[test]
    fn test_string_trims_and_rejects_non_text() {
        assert_eq!(
            validate_string(&json!("  hello "), "f", DEFAULT_MAX_STRING_LENGTH).unwrap(),
            "hello"
        );
        for value in [json!(1), json!(null), json!(["a"]), json!({"a": 1}), json!(true)] {
            assert_eq!(
                validate_string(&value, "f", 10).unwrap_err().code,
                "NOT_A_STRING"
            );
        }
    }

    #[test]
    fn test_optional_string() {
        assert_eq!(validate_optional_string(None, "f", 10).unwrap(), None);
        assert_eq!(
            validate_optional_string(Some(&Value::Null), "f", 10).unwrap(),
            None
        );
        assert_eq!(
            validate_optional_string(Some(&json!(" x ")), "f", 10).unwrap(),
            Some("x".to_string())
        );
        assert!(validate_optional_string(Some(&json!("  ")), "f", 10).is_err());
    }

    #[test]
    fn test_email() {
        assert_eq!(
            validate_email(&json!("USER@Example.COM")).unwrap(),
            "user@example.com"
        );
        assert_eq!(
            validate_email(&json!("  a.b+tag@uni.edu.ph ")).unwrap(),
            "a.b+tag@uni.edu.ph"
        );
        for bad in ["not-an-email", "a@b", "@b.co", "a b@c.de", "a@@b.co"] {
            assert_eq!(
                validate_email(&json!(bad)).unwrap_err().code,
                "INVALID_EMAIL",
                "{bad}"
            );
        }
    }

    #[test]
    fn test_id_typed_by_table() {
        let user: Id<Users> = validate_id(&json!("_u123"), "user_id").unwrap();
        assert_eq!(user.table(), "users");
        let group: Id<Groups> = validate_id_str("_g9", "group_id").unwrap();
        assert_eq!(group.as_str(), "_g9");

        assert_eq!(
            validate_id::<Users>(&json!(42), "user_id").unwrap_err().code,
            "INVALID_ID"
        );
        assert_eq!(
            validate_id::<Users>(&json!("u123"), "user_id").unwrap_err().code,
            "INVALID_ID"
        );
    }

    #[test]
    fn test_number_bounds() {
        assert_eq!(validate_number(&json!(5), "n", Some(0.0), Some(10.0)).unwrap(), 5.0);
        assert_eq!(validate_number(&json!(-1.5), "n", None, None).unwrap(), -1.5);
        assert_eq!(
            validate_number(&json!(11), "n", Some(0.0), Some(10.0)).unwrap_err().code,
            "OUT_OF_RANGE"
        );
        assert_eq!(
            validate_number(&json!(-0.1), "n", Some(0.0), None).unwrap_err().code,
            "OUT_OF_RANGE"
        );
        assert_eq!(
            validate_number(&json!("5"), "n", None, None).unwrap_err().code,
            "NOT_A_NUMBER"
        );
    }

    #[test]
    fn test_array_tags_failing_index() {
        let value = json!(["_u1", "_u2", 7, "bad"]);
        let err = validate_array_with(&value, "member_ids", validate_id::<Users>).unwrap_err();
        assert_eq!(err.field, "member_ids[2]");
        assert!(err.message.starts_with("item 2:"));

        let ok = validate_array_with(&json!(["_u1", "_u2"]), "member_ids", validate_id::<Users>)
            .unwrap();
        assert_eq!(ok.len(), 2);

        assert_eq!(validate_array(&json!([1, "a"]), "xs").unwrap().len(), 2);
        assert_eq!(
            validate_array(&json!({"0": 1}), "xs").unwrap_err().code,
            "NOT_AN_ARRAY"
        );
    }

    #[test]
    fn test_array_item_can_transform() {
        let trimmed = validate_array_with(&json!([" a ", "b "]), "tags", |v, f| {
            validate_string(v, f, 20)
        })
        .unwrap();
        assert_eq!(trimmed, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_document_and_note_content() {
        assert_eq!(
            validate_document_content(&json!("  plain text  ")).unwrap(),
            "plain text"
        );
        let err = validate_document_content(&json!("<script>alert(1)</script>")).unwrap_err();
        assert_eq!(err.code, "UNSAFE_CONTENT");
        assert_eq!(err.severity, capstone_kernel::ValidationSeverity::Critical);

        assert!(validate_note_content(&json!("<iframe src=x>")).is_ok());
        assert!(validate_document_content(&json!("<iframe src=x>")).is_err());

        let long_note = "a".repeat(MAX_NOTE_CONTENT_LENGTH + 1);
        assert_eq!(
            validate_note_content(&json!(long_note)).unwrap_err().code,
            "TOO_LONG"
        );
    }

    #[test]
    fn test_file_name() {
        assert_eq!(validate_file_name(&json!("report.pdf")).unwrap(), "report.pdf");
        assert_eq!(
            validate_file_name(&json!("CON.txt")).unwrap_err().code,
            "RESERVED_FILE_NAME"
        );
        assert_eq!(
            validate_file_name(&json!("lpt1")).unwrap_err().code,
            "RESERVED_FILE_NAME"
        );
        assert!(validate_file_name(&json!("console.txt")).is_ok());
        for bad in ["a/b.txt", "a\\b.txt", "what?.doc", "x:y", "pipe|d", "tab\u{1}.txt"] {
            assert_eq!(
                validate_file_name(&json!(bad)).unwrap_err().code,
                "INVALID_FILE_NAME",
                "{bad}"
            );
        }
        let long = format!("{}.pdf", "a".repeat(252));
        assert_eq!(validate_file_name(&json!(long)).unwrap_err().code, "TOO_LONG");
    }

    #[test]
    fn test_file_size() {
        assert_eq!(
            validate_file_size(&json!(0), DEFAULT_MAX_FILE_SIZE).unwrap_err().code,
            "EMPTY_FILE"
        );
        assert_eq!(
            validate_file_size(&json!(5 * 1024 * 1024 + 1), DEFAULT_MAX_FILE_SIZE)
                .unwrap_err()
                .code,
            "OUT_OF_RANGE"
        );
        assert!(validate_file_size(&json!(5 * 1024 * 1024), DEFAULT_MAX_FILE_SIZE).is_ok());
        assert_eq!(
            validate_file_size(&json!(1024), DEFAULT_MAX_FILE_SIZE).unwrap(),
            1024.0
        );
        assert!(validate_file_size(&json!(-1), DEFAULT_MAX_FILE_SIZE).is_err());
    }

    #[test]
    fn test_file_type() {
        let allowed = ["image/png", "image/jpeg", "application/pdf"];
        assert_eq!(
            validate_file_type(&json!("image/png"), &allowed).unwrap(),
            "image/png"
        );
        assert_eq!(
            validate_file_type(&json!("text/html"), &allowed).unwrap_err().code,
            "UNSUPPORTED_FILE_TYPE"
        );
        let long = "a".repeat(MAX_CONTENT_TYPE_LENGTH + 1);
        assert_eq!(
            validate_file_type(&json!(long), &allowed).unwrap_err().code,
            "TOO_LONG"
        );
    }

    #[test]
    fn test_adviser_code_grammar() {
        assert_eq!(
            validate_adviser_code(&json!("ABCD-EFGH-IJKL")).unwrap(),
            "ABCD-EFGH-IJKL"
        );
        for bad in [
            "abcd-efgh-ijkl",
            "ABCD-EFGH",
            "ABCD-EFGH-IJKL-MNOP",
            "ABC-DEFGH-IJKL",
            "ABCDEFGHIJKL",
            "ABCD_EFGH_IJKL",
            "ABC1-EFGH-IJKL",
        ] {
            assert!(validate_adviser_code(&json!(bad)).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_configured_validator_uses_its_limits() {
        let validator = InputValidator::new(ValidationLimits {
            default_max_string_length: 5,
            note_content_max: 8,
            max_file_size: 100,
            ..ValidationLimits::default()
        });
        assert!(validator.string(&json!("abcde"), "f").is_ok());
        assert_eq!(validator.string(&json!("abcdef"), "f").unwrap_err().code, "TOO_LONG");
        assert_eq!(
            validator.note_content(&json!("123456789")).unwrap_err().code,
            "TOO_LONG"
        );
        assert!(validator.file_size(&json!(100)).is_ok());
        assert!(validator.file_size(&json!(101)).is_err());
        assert!(validator.optional_string(None, "f").unwrap().is_none());
        assert!(
            validator
                .document_content(&json!("<embed src=x>"))
                .is_err()
        );
    }
}
