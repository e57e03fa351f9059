use std::rc::Rc;

use crate::error::CastError;
use crate::schema::types::Predicate;
use crate::value::Value;

pub(super) fn cast(path: &str, value: Value) -> Result<Value, CastError> {
    match value {
        Value::String(ref s) if s.trim().is_empty() => Ok(Value::Null),
        ref v if !v.is_truthy() => Ok(value),
        Value::Number(_) => Ok(value),
        Value::String(ref s) => match s.trim().parse::<f64>() {
            Ok(n) if !n.is_nan() => Ok(Value::Number(n)),
            _ => Err(CastError::new(path, "number", &value)),
        },
        Value::Bool(true) => Ok(Value::Number(1.0)),
        other => Err(CastError::new(path, "number", &other)),
    }
}

/// Inclusive numeric bound; falsy values are left to `required`.
pub(super) fn bound(bound: f64, lower: bool) -> Predicate {
    Rc::new(move |value, _| {
        if !value.is_truthy() {
            return true;
        }
        value
            .as_f64()
            .map_or(false, |n| if lower { n >= bound } else { n <= bound })
    })
}
