//! Patch engine for resource representations.
//!
//! Supports:
//! - JSON Pointer (RFC 6901) parsing and resolution
//! - JSON Patch (RFC 6902) with all-or-nothing application
//! - JSON Merge Patch (RFC 7396)
//! - Content-type dispatch between the two patch formats
//!
//! Documents are plain `serde_json::Value` trees. Every entry point takes the current
//! representation by reference and returns a new value, so callers never observe a partially
//! patched document.

pub mod dispatch;
pub mod error;
pub mod merge;
pub mod ops;
pub mod pointer;

pub use dispatch::{apply_patch, PatchFormat, JSON_PATCH_MEDIA_TYPE, MERGE_PATCH_MEDIA_TYPE};
pub use error::{PatchError, Result};
pub use merge::{merge_into, merge_patch, parse_merge_patch};
pub use ops::{json_equal, JsonPatch, PatchOperation};
pub use pointer::{escape_token, ArrayPosition, Pointer};
