//! Deep-merge for JSON payload patches.
//!
//! Contract: for a key present in both base and patch, two objects recurse;
//! anything else (including arrays) is replaced wholesale by a copy of the
//! patch value. The base is never mutated.

use serde_json::Value;

/// Merge `patch` over `base`, returning a new value.
pub fn deep_merge(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            let mut out = base_map.clone();
            for (key, patch_val) in patch_map {
                match (out.get(key), patch_val) {
                    (Some(Value::Object(_)), Value::Object(_)) => {
                        let merged = deep_merge(&out[key], patch_val);
                        out.insert(key.clone(), merged);
                    }
                    _ => {
                        out.insert(key.clone(), patch_val.clone());
                    }
                }
            }
            Value::Object(out)
        }
        _ => patch.clone(),
    }
}

/// Merge in place: replaces `base` with `deep_merge(base, patch)`.
pub fn deep_merge_into(base: &mut Value, patch: &Value) {
    *base = deep_merge(base, patch);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_objects_recurse() {
        let base = json!({"a": {"x": 1, "y": 2}, "b": 3});
        let patch = json!({"a": {"y": 20, "z": 30}});
        let merged = deep_merge(&base, &patch);
        assert_eq!(merged, json!({"a": {"x": 1, "y": 20, "z": 30}, "b": 3}));
    }

    #[test]
    fn test_lists_replaced_wholesale() {
        let base = json!({"refs": ["a", "b", "c"]});
        let patch = json!({"refs": ["d"]});
        assert_eq!(deep_merge(&base, &patch), json!({"refs": ["d"]}));
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let base = json!({"a": {"b": [1, 2]}, "c": null});
        assert_eq!(deep_merge(&base, &json!({})), base);
    }

    #[test]
    fn test_scalar_overwrites_object() {
        let base = json!({"a": {"b": 1}});
        let patch = json!({"a": 7});
        assert_eq!(deep_merge(&base, &patch), json!({"a": 7}));
    }

    #[test]
    fn test_base_not_mutated() {
        let base = json!({"a": 1});
        let _ = deep_merge(&base, &json!({"a": 2}));
        assert_eq!(base, json!({"a": 1}));
    }
}
