//! JSON Patch construction for annotation mutations.
//!
//! Operations are emitted parent-before-child: a missing `metadata` object is
//! created first, then a missing annotation map, then the key is added into it.
//! Keys are turned into JSON Pointer tokens with `PointerBuf::from_tokens`, which
//! escapes `~` and `/` per RFC 6901, so `example.com/owner` lands at
//! `.../example.com~1owner`.

use json_patch::{AddOperation, PatchOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use serde_json::{Map, Value};

/// Pointer tokens of the annotation map relative to the object root
const ANNOTATIONS_PATH: [&str; 2] = ["metadata", "annotations"];

/// Pointer to the object metadata
pub fn metadata_pointer() -> PointerBuf {
    PointerBuf::from_tokens(["metadata"])
}

/// Pointer to the annotation map
pub fn annotations_pointer() -> PointerBuf {
    PointerBuf::from_tokens(ANNOTATIONS_PATH)
}

/// Pointer to a single annotation key, escaped
pub fn annotation_pointer(key: &str) -> PointerBuf {
    PointerBuf::from_tokens(ANNOTATIONS_PATH.into_iter().chain(std::iter::once(key)))
}

fn add(path: PointerBuf, value: Value) -> PatchOperation {
    PatchOperation::Add(AddOperation { path, value })
}

/// Build the operations that set `key` to `value` in the annotations of `object`.
///
/// - No `metadata` object: `add` it, `add` the empty map, then `add` the key.
/// - No annotations (absent or empty): `add` the empty map, then `add` the key.
/// - Map present without the key: a single `add` for the key.
/// - Key present with a different value: a single `replace`.
/// - Key present with the same value: no operations.
pub fn build_add_annotation_patch(object: &Value, key: &str, value: &str) -> Vec<PatchOperation> {
    let new_value = Value::String(value.to_string());
    let mut ops = Vec::new();

    let Some(metadata) = object.get("metadata").and_then(Value::as_object) else {
        ops.push(add(metadata_pointer(), Value::Object(Map::new())));
        ops.push(add(annotations_pointer(), Value::Object(Map::new())));
        ops.push(add(annotation_pointer(key), new_value));
        return ops;
    };

    let annotations = match metadata.get("annotations").and_then(Value::as_object) {
        Some(annotations) if !annotations.is_empty() => annotations,
        _ => {
            ops.push(add(annotations_pointer(), Value::Object(Map::new())));
            ops.push(add(annotation_pointer(key), new_value));
            return ops;
        }
    };

    match annotations.get(key) {
        Some(existing) if existing.as_str() == Some(value) => {}
        Some(_) => ops.push(PatchOperation::Replace(ReplaceOperation {
            path: annotation_pointer(key),
            value: new_value,
        })),
        None => ops.push(add(annotation_pointer(key), new_value)),
    }

    ops
}
