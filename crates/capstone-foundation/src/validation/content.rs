//! Markup and script injection checks for free-text fields.
//!
//! Free text is rendered back into HTML-capable surfaces, so injection is
//! rejected at the boundary. This is a denylist: text is accepted or
//! rejected, never rewritten.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::warn;

// =============================================================================
// Compiled Regex Patterns
// =============================================================================

// <script ...> ... </script>, shortest match, across lines
static SCRIPT_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());

static JAVASCRIPT_URI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript\s*:").unwrap());

// onclick=, onerror = ...
static EVENT_HANDLER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bon\w+\s*=").unwrap());

static DATA_HTML_URI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)data\s*:\s*text/html").unwrap());

static VBSCRIPT_URI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)vbscript\s*:").unwrap());

static IFRAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<iframe\b").unwrap());

static OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<object\b").unwrap());

static EMBED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<embed\b").unwrap());

// =============================================================================
// Patterns
// =============================================================================

/// One denylisted construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsafePattern {
    ScriptBlock,
    JavascriptUri,
    EventHandler,
    DataHtmlUri,
    VbscriptUri,
    Iframe,
    Object,
    Embed,
}

impl UnsafePattern {
    fn regex(self) -> &'static Regex {
        match self {
            Self::ScriptBlock => &SCRIPT_BLOCK_RE,
            Self::JavascriptUri => &JAVASCRIPT_URI_RE,
            Self::EventHandler => &EVENT_HANDLER_RE,
            Self::DataHtmlUri => &DATA_HTML_URI_RE,
            Self::VbscriptUri => &VBSCRIPT_URI_RE,
            Self::Iframe => &IFRAME_RE,
            Self::Object => &OBJECT_RE,
            Self::Embed => &EMBED_RE,
        }
    }
}

impl fmt::Display for UnsafePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ScriptBlock => "script block",
            Self::JavascriptUri => "javascript: URI",
            Self::EventHandler => "inline event handler",
            Self::DataHtmlUri => "data:text/html URI",
            Self::VbscriptUri => "vbscript: URI",
            Self::Iframe => "iframe tag",
            Self::Object => "object tag",
            Self::Embed => "embed tag",
        };
        f.write_str(label)
    }
}

/// Checks shared by every free-text field, in evaluation order.
const BASE_PATTERNS: &[UnsafePattern] = &[
    UnsafePattern::ScriptBlock,
    UnsafePattern::JavascriptUri,
    UnsafePattern::EventHandler,
    UnsafePattern::DataHtmlUri,
    UnsafePattern::VbscriptUri,
];

/// Base checks plus embedded-content tags, for full documents.
const DOCUMENT_PATTERNS: &[UnsafePattern] = &[
    UnsafePattern::ScriptBlock,
    UnsafePattern::JavascriptUri,
    UnsafePattern::EventHandler,
    UnsafePattern::DataHtmlUri,
    UnsafePattern::VbscriptUri,
    UnsafePattern::Iframe,
    UnsafePattern::Object,
    UnsafePattern::Embed,
];

// =============================================================================
// ContentSafetyFilter
// =============================================================================

/// Which field family a filter guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyProfile {
    /// Large document bodies: base checks plus iframe/object/embed.
    Document,
    /// Short notes and comments: base checks only.
    Note,
}

/// Denylist filter over free text.
#[derive(Debug, Clone, Copy)]
pub struct ContentSafetyFilter {
    profile: SafetyProfile,
}

impl ContentSafetyFilter {
    pub const fn new(profile: SafetyProfile) -> Self {
        Self { profile }
    }

    pub const fn document() -> Self {
        Self::new(SafetyProfile::Document)
    }

    pub const fn note() -> Self {
        Self::new(SafetyProfile::Note)
    }

    pub fn profile(&self) -> SafetyProfile {
        self.profile
    }

    /// Patterns this filter applies, in order.
    pub fn patterns(&self) -> &'static [UnsafePattern] {
        match self.profile {
            SafetyProfile::Document => DOCUMENT_PATTERNS,
            SafetyProfile::Note => BASE_PATTERNS,
        }
    }

    /// `Err` carries the first pattern that matched.
    pub fn check_safe(&self, text: &str) -> Result<(), UnsafePattern> {
        match self
            .patterns()
            .iter()
            .copied()
            .find(|pattern| pattern.regex().is_match(text))
        {
            Some(pattern) => {
                warn!(?pattern, profile = ?self.profile, "rejected unsafe content");
                Err(pattern)
            }
            None => Ok(()),
        }
    }

    pub fn is_safe(&self, text: &str) -> bool {
        self.check_safe(text).is_ok()
    }
}

impl Default for ContentSafetyFilter {
    fn default() -> Self {
        Self::document()
    }
}
