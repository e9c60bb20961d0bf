//! Canonical content keys
//!
//! Every cache entry and poll registration is addressed by a deterministic
//! key derived from the content kind plus normalized identifying fields.
//! Normalization is total: raw routing parameters may be missing, wrongly
//! typed, or array-wrapped, and still fold to a canonical scalar.

use std::fmt;

use serde_json::Value;

use crate::error::{ContentError, Result};

/// Default study when a request names none.
pub const DEFAULT_STUDY: &str = "jvideo";
/// Default interface/content language (HL code).
pub const DEFAULT_LANGUAGE_HL: &str = "eng00";
/// Default video lookup language (JF code).
pub const DEFAULT_LANGUAGE_JF: &str = "529";
/// Default lesson number.
pub const DEFAULT_LESSON: u32 = 1;

/// Content kinds the resolution engine serves.
///
/// New kinds extend this enum and the key format below; nothing else in the
/// engine special-cases a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// Localized interface strings (merged incrementally as translations land)
    Interface,
    /// Study-wide shared content
    CommonContent,
    /// Per-lesson content
    LessonContent,
    /// Video URL lists (no partial state, completeness check skipped)
    VideoContent,
}

impl ContentKind {
    /// Persistent cache table backing this kind
    pub fn table_name(&self) -> &'static str {
        match self {
            ContentKind::Interface => "interface_strings",
            ContentKind::CommonContent => "common_content",
            ContentKind::LessonContent => "lesson_content",
            ContentKind::VideoContent => "video_urls",
        }
    }

    /// Whether payloads of this kind carry a completeness marker at all
    pub fn has_partial_state(&self) -> bool {
        !matches!(self, ContentKind::VideoContent)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentKind::Interface => "interface",
            ContentKind::CommonContent => "commonContent",
            ContentKind::LessonContent => "lessonContent",
            ContentKind::VideoContent => "videoContent",
        };
        write!(f, "{name}")
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// Unwrap an array-wrapped routing value to its first element.
fn first_of(value: &Value) -> &Value {
    match value {
        Value::Array(items) => items.first().unwrap_or(&Value::Null),
        other => other,
    }
}

/// Normalize a case-insensitive code field (study, HL, JF) to a trimmed,
/// lower-cased string. Missing or unusable input yields the default.
pub fn normalize_code(raw: Option<&Value>, default: &str) -> String {
    let normalized = raw.map(first_of).and_then(|v| match v {
        Value::String(s) => {
            let t = s.trim().to_lowercase();
            (!t.is_empty()).then_some(t)
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    normalized.unwrap_or_else(|| default.to_string())
}

/// Normalize a lesson identifier: numeric-looking strings coerce, anything
/// else degrades to the default lesson.
pub fn normalize_lesson(raw: Option<&Value>) -> u32 {
    raw.map(first_of)
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64().map(|n| n as u32),
            Value::String(s) => s.trim().parse::<u32>().ok(),
            _ => None,
        })
        .unwrap_or(DEFAULT_LESSON)
}

/// Normalize a field the caller marked as required. Unlike the lenient
/// variants this raises a validation error naming the field.
pub fn require_code(raw: Option<&Value>, field: &str) -> Result<String> {
    let value = normalize_code(raw, "");
    if value.is_empty() {
        return Err(ContentError::Validation(field.to_string()));
    }
    Ok(value)
}

// =============================================================================
// ContentKey
// =============================================================================

/// Canonical identifier for a content request.
///
/// Two logically identical requests always derive the same key; fields
/// differing only in case or surrounding whitespace fold together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    pub kind: ContentKind,
    pub study: String,
    pub language_hl: String,
    pub language_jf: String,
    pub lesson: u32,
}

impl ContentKey {
    /// Derive a key from raw, possibly-missing routing parameters.
    pub fn derive(
        kind: ContentKind,
        study: Option<&Value>,
        language_hl: Option<&Value>,
        language_jf: Option<&Value>,
        lesson: Option<&Value>,
    ) -> Self {
        Self {
            kind,
            study: normalize_code(study, DEFAULT_STUDY),
            language_hl: normalize_code(language_hl, DEFAULT_LANGUAGE_HL),
            language_jf: normalize_code(language_jf, DEFAULT_LANGUAGE_JF),
            lesson: normalize_lesson(lesson),
        }
    }

    /// Build a key from already-canonical fields.
    pub fn new(kind: ContentKind, study: &str, hl: &str, jf: &str, lesson: u32) -> Self {
        Self {
            kind,
            study: study.to_string(),
            language_hl: hl.to_string(),
            language_jf: jf.to_string(),
            lesson,
        }
    }

    /// Kind-specific composite key used by the persistent cache tables.
    ///
    /// Formats are stable; changing one orphans previously cached rows.
    pub fn storage_key(&self) -> String {
        match self.kind {
            ContentKind::Interface => format!("{}-Interface", self.language_hl),
            ContentKind::CommonContent => {
                format!("{}-{}-CommonContent", self.study, self.language_hl)
            }
            ContentKind::LessonContent => format!(
                "{}-{}-{}-{}-LessonContent",
                self.study, self.language_hl, self.language_jf, self.lesson
            ),
            ContentKind::VideoContent => format!("{}-VideoUrls", self.language_jf),
        }
    }

    /// Registration key for the poller (kind plus identifying fields).
    pub fn poll_key(&self) -> String {
        format!("{}:{}", self.kind, self.storage_key())
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.poll_key())
    }
}
