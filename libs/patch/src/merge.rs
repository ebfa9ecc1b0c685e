//! JSON Merge Patch (RFC 7396).

use serde_json::{Map, Value as JsonValue};

use crate::error::{PatchError, Result};

/// Parses a merge patch body. Any JSON value is a valid merge patch document.
pub fn parse_merge_patch(body: &[u8]) -> Result<JsonValue> {
    serde_json::from_slice(body).map_err(|e| PatchError::InvalidMergePatch(e.to_string()))
}

/// Returns `target` with `patch` merged into it. Neither input is modified.
pub fn merge_patch(target: &JsonValue, patch: &JsonValue) -> JsonValue {
    let mut out = target.clone();
    merge_into(&mut out, patch);
    out
}

/// In-place variant of [`merge_patch`].
pub fn merge_into(target: &mut JsonValue, patch: &JsonValue) {
    let JsonValue::Object(patch_members) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = JsonValue::Object(Map::new());
    }
    let JsonValue::Object(target_members) = target else {
        return;
    };

    for (key, patch_value) in patch_members {
        match patch_value {
            JsonValue::Null => {
                target_members.shift_remove(key);
            }
            JsonValue::Object(_) => {
                let slot = target_members
                    .entry(key.clone())
                    .or_insert(JsonValue::Null);
                merge_into(slot, patch_value);
            }
            other => {
                target_members.insert(key.clone(), other.clone());
            }
        }
    }
}
