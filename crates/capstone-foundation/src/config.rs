//! Policy settings
//!
//! Every field has a default, so an empty file (or no file) yields the
//! built-in ceilings.
//!
//! ```toml
//! [limits]
//! note_content_max = 20480
//!
//! [codes]
//! max_attempts = 20
//!
//! [rate_limits.resend_verification_code]
//! max_requests = 3
//! window_ms = 60000
//! ```

use crate::codes::DEFAULT_MAX_ATTEMPTS;
use crate::validation::{RateLimitRule, ValidationLimits};
use capstone_kernel::config::{self, ConfigError, ConfigResult, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Operation name for re-sending an email verification code.
pub const RESEND_VERIFICATION_CODE: &str = "resend_verification_code";
/// Operation name for re-sending a password reset code.
pub const RESEND_PASSWORD_RESET_CODE: &str = "resend_password_reset_code";

const RESEND_RULE: RateLimitRule = RateLimitRule::new(3, 60_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeIssuerConfig {
    /// Candidates tried before giving up
    pub max_attempts: u32,
}

impl Default for CodeIssuerConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Top-level settings for a [`PolicyEngine`](crate::PolicyEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub limits: ValidationLimits,
    pub codes: CodeIssuerConfig,
    /// Named rate-limit triples, keyed by operation
    pub rate_limits: HashMap<String, RateLimitRule>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let rate_limits = [RESEND_VERIFICATION_CODE, RESEND_PASSWORD_RESET_CODE]
            .into_iter()
            .map(|op| (op.to_string(), RESEND_RULE))
            .collect();

        Self {
            limits: ValidationLimits::default(),
            codes: CodeIssuerConfig::default(),
            rate_limits,
        }
    }
}

impl PolicyConfig {
    /// Load from a file in any supported format, then [`validate`](Self::validate).
    pub fn load(path: &str) -> ConfigResult<Self> {
        let cfg: Self = config::load_config(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let cfg: Self = config::from_str(text, FileFormat::Toml)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// The configured rule for `operation`, if any.
    pub fn rate_limit(&self, operation: &str) -> Option<RateLimitRule> {
        self.rate_limits.get(operation).copied()
    }

    /// Reject zero ceilings, which would refuse every request.
    pub fn validate(&self) -> ConfigResult<()> {
        let limits = &self.limits;
        let zero = [
            ("limits.default_max_string_length", limits.default_max_string_length == 0),
            ("limits.document_content_max", limits.document_content_max == 0),
            ("limits.note_content_max", limits.note_content_max == 0),
            ("limits.max_file_size", limits.max_file_size == 0),
            ("codes.max_attempts", self.codes.max_attempts == 0),
        ];
        if let Some((name, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }

        for (operation, rule) in &self.rate_limits {
            if rule.max_requests == 0 || rule.window_ms == 0 {
                return Err(ConfigError::Invalid(format!(
                    "rate_limits.{operation} needs a non-zero max_requests and window_ms"
                )));
            }
        }

        Ok(())
    }
}
