//! Payload inspection: plain text and outbound references.
//!
//! Payloads are opaque editor JSON. Two conventions are understood:
//! string values under a `text` key are the visible text (collected
//! depth-first, arrays in order), and objects carrying `docId`, `blockId` or
//! `assetId` string fields are references to other entities.

use serde_json::Value;

use crate::types::{BlockRef, RefKind};

/// Plain text of a payload.
///
/// A bare string payload is its own text; other scalars have none.
pub fn extract_plain_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        _ => {
            let mut out = String::new();
            collect_text(payload, &mut out);
            out
        }
    }
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match child {
                    Value::String(s) if key == "text" => out.push_str(s),
                    _ => collect_text(child, out),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_text(item, out)),
        _ => {}
    }
}

/// Outbound references in order of first appearance, without duplicates
pub fn extract_refs(payload: &Value) -> Vec<BlockRef> {
    let mut refs = Vec::new();
    collect_refs(payload, &mut refs);
    refs
}

fn collect_refs(value: &Value, refs: &mut Vec<BlockRef>) {
    match value {
        Value::Object(map) => {
            for (field, kind) in [
                ("docId", RefKind::Doc),
                ("blockId", RefKind::Block),
                ("assetId", RefKind::Asset),
            ] {
                if let Some(Value::String(target)) = map.get(field) {
                    let found = BlockRef {
                        kind,
                        target: target.clone(),
                    };
                    if !refs.contains(&found) {
                        refs.push(found);
                    }
                }
            }
            map.values().for_each(|child| collect_refs(child, refs));
        }
        Value::Array(items) => items.iter().for_each(|item| collect_refs(item, refs)),
        _ => {}
    }
}
