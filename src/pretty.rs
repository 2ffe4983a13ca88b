//! Human-readable YAML dumps of rendered documents for debug logs.

use serde_json::Value;

/// Dump `value` as YAML, trimming trailing whitespace inside multi-line strings.
pub fn pretty_dump(value: &Value) -> String {
    serde_yaml::to_string(&tidy(value)).unwrap_or_else(|_| value.to_string())
}

fn tidy(value: &Value) -> Value {
    match value {
        Value::String(s) if s.contains('\n') => {
            Value::String(s.lines().map(str::trim_end).collect::<Vec<_>>().join("\n"))
        }
        Value::Array(items) => Value::Array(items.iter().map(tidy).collect()),
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), tidy(v))).collect()),
        other => other.clone(),
    }
}
