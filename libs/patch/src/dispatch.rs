//! Content-type based selection between JSON Patch and JSON Merge Patch.

use std::fmt;
use std::str::FromStr;

use serde_json::Value as JsonValue;

use crate::error::{PatchError, Result};
use crate::merge::{merge_patch, parse_merge_patch};
use crate::ops::JsonPatch;

pub const JSON_PATCH_MEDIA_TYPE: &str = "application/json-patch+json";
pub const MERGE_PATCH_MEDIA_TYPE: &str = "application/merge-patch+json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchFormat {
    JsonPatch,
    MergePatch,
}

impl PatchFormat {
    /// Resolves a `Content-Type` header value. Parameters such as `charset` are ignored and
    /// the media type is matched case-insensitively.
    pub fn from_content_type(content_type: &str) -> Result<Self> {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match media_type.as_str() {
            JSON_PATCH_MEDIA_TYPE => Ok(PatchFormat::JsonPatch),
            MERGE_PATCH_MEDIA_TYPE => Ok(PatchFormat::MergePatch),
            _ => Err(PatchError::UnsupportedMediaType(content_type.trim().to_string())),
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            PatchFormat::JsonPatch => JSON_PATCH_MEDIA_TYPE,
            PatchFormat::MergePatch => MERGE_PATCH_MEDIA_TYPE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PatchFormat::JsonPatch => "json-patch",
            PatchFormat::MergePatch => "merge-patch",
        }
    }

    /// Parses `body` in this format and applies it to a copy of `current`.
    pub fn apply(&self, current: &JsonValue, body: &[u8]) -> Result<JsonValue> {
        match self {
            PatchFormat::JsonPatch => {
                let patch = JsonPatch::from_slice(body)?;
                tracing::debug!(operations = patch.operations().len(), "Applying JSON Patch");
                patch.apply(current)
            }
            PatchFormat::MergePatch => {
                let patch = parse_merge_patch(body)?;
                tracing::debug!("Applying JSON Merge Patch");
                Ok(merge_patch(current, &patch))
            }
        }
    }
}

impl FromStr for PatchFormat {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_content_type(s)
    }
}

impl fmt::Display for PatchFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

/// Applies a PATCH request body to `current` according to `content_type`.
///
/// `current` is never modified; on any failure no partial result escapes.
pub fn apply_patch(current: &JsonValue, body: &[u8], content_type: &str) -> Result<JsonValue> {
    PatchFormat::from_content_type(content_type)?.apply(current, body)
}
