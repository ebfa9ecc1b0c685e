//! JSON Patch (RFC 6902) operations.
//!
//! A patch is applied to a working copy of the document. The caller's document is only
//! replaced by the result once every operation succeeded, so a failing operation (including
//! a failing `test`) leaves no partial effect.

use serde_json::{Map, Value as JsonValue};

use crate::error::{PatchError, Result};
use crate::pointer::{parse_array_token, ArrayPosition, Pointer};

#[derive(Debug, Clone, PartialEq)]
pub enum PatchOperation {
    Add { path: Pointer, value: JsonValue },
    Remove { path: Pointer },
    Replace { path: Pointer, value: JsonValue },
    Move { from: Pointer, path: Pointer },
    Copy { from: Pointer, path: Pointer },
    Test { path: Pointer, value: JsonValue },
}

impl PatchOperation {
    pub fn name(&self) -> &'static str {
        match self {
            PatchOperation::Add { .. } => "add",
            PatchOperation::Remove { .. } => "remove",
            PatchOperation::Replace { .. } => "replace",
            PatchOperation::Move { .. } => "move",
            PatchOperation::Copy { .. } => "copy",
            PatchOperation::Test { .. } => "test",
        }
    }

    pub fn path(&self) -> &Pointer {
        match self {
            PatchOperation::Add { path, .. }
            | PatchOperation::Remove { path }
            | PatchOperation::Replace { path, .. }
            | PatchOperation::Move { path, .. }
            | PatchOperation::Copy { path, .. }
            | PatchOperation::Test { path, .. } => path,
        }
    }

    /// Parses a single operation object. `index` is only used for diagnostics.
    pub fn from_json(index: usize, raw: &JsonValue) -> Result<Self> {
        let obj = raw.as_object().ok_or_else(|| PatchError::InvalidOperation {
            index,
            path: String::new(),
            reason: "operation must be a JSON object".to_string(),
        })?;

        let path_str = string_member(obj, "path").ok_or_else(|| PatchError::InvalidOperation {
            index,
            path: String::new(),
            reason: "missing or non-string 'path'".to_string(),
        })?;
        let invalid = |reason: &str| PatchError::InvalidOperation {
            index,
            path: path_str.to_string(),
            reason: reason.to_string(),
        };

        let op = string_member(obj, "op").ok_or_else(|| invalid("missing or non-string 'op'"))?;
        let path = Pointer::parse(path_str).map_err(|e| e.at_operation(index))?;

        let value = || {
            obj.get("value")
                .cloned()
                .ok_or_else(|| invalid("missing 'value'"))
        };
        let from = || -> Result<Pointer> {
            let raw = string_member(obj, "from")
                .ok_or_else(|| invalid("missing or non-string 'from'"))?;
            Pointer::parse(raw).map_err(|e| e.at_operation(index))
        };

        match op {
            "add" => Ok(PatchOperation::Add {
                path,
                value: value()?,
            }),
            "remove" => Ok(PatchOperation::Remove { path }),
            "replace" => Ok(PatchOperation::Replace {
                path,
                value: value()?,
            }),
            "move" => Ok(PatchOperation::Move { from: from()?, path }),
            "copy" => Ok(PatchOperation::Copy { from: from()?, path }),
            "test" => Ok(PatchOperation::Test {
                path,
                value: value()?,
            }),
            other => Err(invalid(&format!("unknown op '{}'", other))),
        }
    }
}

/// An ordered sequence of JSON Patch operations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonPatch(pub Vec<PatchOperation>);

impl JsonPatch {
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let raw: JsonValue = serde_json::from_slice(body)
            .map_err(|e| PatchError::MalformedPatch(e.to_string()))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &JsonValue) -> Result<Self> {
        let items = raw.as_array().ok_or_else(|| {
            PatchError::MalformedPatch("a JSON Patch document must be an array".to_string())
        })?;
        items
            .iter()
            .enumerate()
            .map(|(index, item)| PatchOperation::from_json(index, item))
            .collect::<Result<Vec<_>>>()
            .map(JsonPatch)
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Applies the whole sequence to a copy of `document`.
    pub fn apply(&self, document: &JsonValue) -> Result<JsonValue> {
        let mut working = document.clone();
        for (index, op) in self.0.iter().enumerate() {
            apply_operation(&mut working, index, op)?;
        }
        Ok(working)
    }
}

fn apply_operation(doc: &mut JsonValue, index: usize, op: &PatchOperation) -> Result<()> {
    match op {
        PatchOperation::Add { path, value } => add(doc, index, "add", path, value.clone()),
        PatchOperation::Remove { path } => remove(doc, index, "remove", path).map(|_| ()),
        PatchOperation::Replace { path, value } => {
            let target = path
                .resolve_mut(doc)
                .ok_or_else(|| not_found(index, "replace", path))?;
            *target = value.clone();
            Ok(())
        }
        PatchOperation::Move { from, path } => {
            if from == path {
                return from
                    .resolve(doc)
                    .map(|_| ())
                    .ok_or_else(|| not_found(index, "move", from));
            }
            if from.is_prefix_of(path) {
                return Err(PatchError::InvalidOperation {
                    index,
                    path: path.to_string(),
                    reason: format!("cannot move '{}' into one of its own children", from),
                });
            }
            let value = remove(doc, index, "move", from)?;
            add(doc, index, "move", path, value)
        }
        PatchOperation::Copy { from, path } => {
            let value = from
                .resolve(doc)
                .cloned()
                .ok_or_else(|| not_found(index, "copy", from))?;
            add(doc, index, "copy", path, value)
        }
        PatchOperation::Test { path, value } => match path.resolve(doc) {
            Some(actual) if json_equal(actual, value) => Ok(()),
            _ => Err(PatchError::TestFailed {
                index,
                path: path.to_string(),
            }),
        },
    }
}

fn add(
    doc: &mut JsonValue,
    index: usize,
    op: &'static str,
    path: &Pointer,
    value: JsonValue,
) -> Result<()> {
    let Some((parent, last)) = path.split_last() else {
        *doc = value;
        return Ok(());
    };
    let container = parent
        .resolve_mut(doc)
        .ok_or_else(|| not_found(index, op, path))?;

    match container {
        JsonValue::Object(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        JsonValue::Array(items) => match parse_array_token(last) {
            Some(ArrayPosition::End) => {
                items.push(value);
                Ok(())
            }
            Some(ArrayPosition::Index(i)) if i <= items.len() => {
                items.insert(i, value);
                Ok(())
            }
            Some(ArrayPosition::Index(i)) => Err(PatchError::InvalidOperation {
                index,
                path: path.to_string(),
                reason: format!("array index {} is out of bounds (length {})", i, items.len()),
            }),
            None => Err(PatchError::InvalidOperation {
                index,
                path: path.to_string(),
                reason: format!("'{}' is not a valid array index", last),
            }),
        },
        _ => Err(PatchError::InvalidOperation {
            index,
            path: path.to_string(),
            reason: "parent is neither an object nor an array".to_string(),
        }),
    }
}

fn remove(
    doc: &mut JsonValue,
    index: usize,
    op: &'static str,
    path: &Pointer,
) -> Result<JsonValue> {
    let Some((parent, last)) = path.split_last() else {
        return Err(PatchError::InvalidOperation {
            index,
            path: String::new(),
            reason: "cannot remove the document root".to_string(),
        });
    };
    let container = parent
        .resolve_mut(doc)
        .ok_or_else(|| not_found(index, op, path))?;

    let removed = match container {
        JsonValue::Object(map) => map.shift_remove(last),
        JsonValue::Array(items) => match parse_array_token(last) {
            Some(ArrayPosition::Index(i)) if i < items.len() => Some(items.remove(i)),
            _ => None,
        },
        _ => None,
    };
    removed.ok_or_else(|| not_found(index, op, path))
}

fn not_found(index: usize, op: &'static str, path: &Pointer) -> PatchError {
    PatchError::PathNotFound {
        index,
        op,
        path: path.to_string(),
    }
}

fn string_member<'a>(obj: &'a Map<String, JsonValue>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(JsonValue::as_str)
}

/// JSON equality as used by the `test` operation: numbers compare by value, objects ignore
/// member order.
pub fn json_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            match (x.as_i64(), y.as_i64(), x.as_u64(), y.as_u64()) {
                (Some(l), Some(r), _, _) => l == r,
                (_, _, Some(l), Some(r)) => l == r,
                _ => x.as_f64() == y.as_f64(),
            }
        }
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| json_equal(l, r))
        }
        (JsonValue::Object(x), JsonValue::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, l)| y.get(k).is_some_and(|r| json_equal(l, r)))
        }
        _ => a == b,
    }
}
