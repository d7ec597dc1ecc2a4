use serde_json::Value as JsonValue;

/// Renders a JSON value into a canonical string: object keys sorted, numbers normalised to
/// their shortest round-tripping form. Used anywhere a stable content fingerprint is needed
/// (dependency hashes, transform input fingerprints, document fingerprints).
pub fn canonicalize(value: &JsonValue) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &JsonValue, out: &mut String) {
    match value {
        JsonValue::Null => out.push_str("null"),
        JsonValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        JsonValue::Number(n) => out.push_str(&canonical_number(n)),
        JsonValue::String(s) => {
            out.push('"');
            out.push_str(&s.replace('\\', "\\\\").replace('"', "\\\""));
            out.push('"');
        }
        JsonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(&JsonValue::String((*key).clone()), out);
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
    }
}

fn canonical_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    // Normalise floats through their shortest round-tripping decimal form.
    n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let a = canonicalize(&json!({ "b": 1, "a": 2 }));
        let b = canonicalize(&json!({ "a": 2, "b": 1 }));
        assert_eq!(a, b);
        assert_eq!(a, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn nested_arrays_and_objects_sort_recursively() {
        let value = json!({ "list": [{"z": 1, "a": 2}], "a": 3 });
        assert_eq!(canonicalize(&value), r#"{"a":3,"list":[{"a":2,"z":1}]}"#);
    }

    #[test]
    fn integral_floats_and_ints_are_distinct_representations() {
        let int_val = canonicalize(&json!(4));
        assert_eq!(int_val, "4");
    }
}
