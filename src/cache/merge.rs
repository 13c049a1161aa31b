//! Recursive merge of JSON documents

use serde_json::{Map, Value};

/// Merge `patch` into `base`.
///
/// Objects merge key by key, keeping existing keys the patch does not
/// mention. Arrays, strings, numbers, booleans and null replace the
/// existing value as-is.
pub fn merge_values(base: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        match value {
            Value::Object(incoming) => {
                if let Some(Value::Object(existing)) = base.get_mut(&key) {
                    merge_values(existing, incoming);
                } else {
                    base.insert(key, Value::Object(incoming));
                }
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn nested_objects_merge() {
        let mut base = object(json!({ "volumes": { "a": 1 }, "push": { "web": true } }));
        merge_values(&mut base, object(json!({ "volumes": { "b": 2 } })));

        assert_eq!(
            Value::Object(base),
            json!({ "volumes": { "a": 1, "b": 2 }, "push": { "web": true } })
        );
    }

    #[test]
    fn arrays_replace_wholesale() {
        let mut base = object(json!({ "paths": ["/a", "/b"] }));
        merge_values(&mut base, object(json!({ "paths": ["/c"] })));
        assert_eq!(base["paths"], json!(["/c"]));
    }

    #[test]
    fn false_overwrites_true_verbatim() {
        let mut base = object(json!({ "push": { "web": true } }));
        merge_values(&mut base, object(json!({ "push": { "web": false } })));
        assert_eq!(base["push"]["web"], Value::Bool(false));
    }

    #[test]
    fn primitive_replaced_by_object() {
        let mut base = object(json!({ "settings": "legacy" }));
        merge_values(&mut base, object(json!({ "settings": { "registry": "r" } })));
        assert_eq!(base["settings"], json!({ "registry": "r" }));
    }
}
