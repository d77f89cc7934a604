//! Recursive merge of JSON values.

use serde_json::Value;

/// Merge `overlay` into `base` in place.
///
/// Objects merge key by key and arrays element by element, recursing into
/// nested containers; any other overlay value replaces what is in `base`.
/// Keys present only in `base` are kept.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(base), Value::Array(overlay)) => {
            for (index, value) in overlay.iter().enumerate() {
                match base.get_mut(index) {
                    Some(existing) => deep_merge(existing, value),
                    None => base.push(value.clone()),
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}
