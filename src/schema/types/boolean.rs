use crate::value::Value;

/// Never fails: `"0"` and `"false"` are false, other values follow truthiness.
pub(super) fn cast(value: Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(_) => value,
        Value::String(ref s) if s == "0" || s == "false" => Value::Bool(false),
        Value::String(ref s) if s == "true" => Value::Bool(true),
        other => Value::Bool(other.is_truthy()),
    }
}
