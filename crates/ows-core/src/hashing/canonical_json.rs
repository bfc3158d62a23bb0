//! Canonical JSON: claves de objeto ordenadas lexicográficamente, sin
//! depender de si `serde_json` preserva o no el orden de inserción.
//!
//! Dos variantes: compacta (para hashing) y con indentación (para los
//! archivos de especificación que lee el worker y, a veces, una persona).

use serde_json::Value;
use std::collections::BTreeMap;

fn quote(s: &str) -> String {
    // Display de Value::String produce el literal JSON escapado.
    Value::String(s.to_string()).to_string()
}

pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let tree: BTreeMap<&String, String> = map.iter().map(|(k, v)| (k, to_canonical_json(v))).collect();
            let items: Vec<String> = tree.into_iter().map(|(k, v)| format!("{}:{}", quote(k), v)).collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

/// Variante con indentación fija. Colecciones vacías se escriben `[]` / `{}`.
pub fn to_canonical_json_pretty(value: &Value, indent: usize) -> String {
    let mut out = String::new();
    write_pretty(value, indent, 0, &mut out);
    out
}

fn write_pretty(value: &Value, indent: usize, level: usize, out: &mut String) {
    let pad = |lvl: usize| " ".repeat(indent * lvl);
    match value {
        Value::Array(arr) if !arr.is_empty() => {
            out.push_str("[\n");
            for (i, v) in arr.iter().enumerate() {
                out.push_str(&pad(level + 1));
                write_pretty(v, indent, level + 1, out);
                if i + 1 < arr.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&pad(level));
            out.push(']');
        }
        Value::Object(map) if !map.is_empty() => {
            let tree: BTreeMap<&String, &Value> = map.iter().collect();
            let n = tree.len();
            out.push_str("{\n");
            for (i, (k, v)) in tree.into_iter().enumerate() {
                out.push_str(&pad(level + 1));
                out.push_str(&quote(k));
                out.push_str(": ");
                write_pretty(v, indent, level + 1, out);
                if i + 1 < n {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&pad(level));
            out.push('}');
        }
        Value::Array(_) => out.push_str("[]"),
        Value::Object(_) => out.push_str("{}"),
        other => out.push_str(&to_canonical_json(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_regardless_of_input_order() {
        let a = json!({"b": 1, "a": {"d": [1, 2], "c": null}});
        assert_eq!(to_canonical_json(&a), r#"{"a":{"c":null,"d":[1,2]},"b":1}"#);
    }

    #[test]
    fn pretty_output_is_indented_and_sorted() {
        let v = json!({"z": [], "a": {"k": "v"}});
        let expected = "{\n    \"a\": {\n        \"k\": \"v\"\n    },\n    \"z\": []\n}";
        assert_eq!(to_canonical_json_pretty(&v, 4), expected);
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(to_canonical_json(&json!("a\"b\n")), r#""a\"b\n""#);
    }
}
