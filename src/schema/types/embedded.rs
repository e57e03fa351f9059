use crate::error::{CastError, Result, ValidatorError};
use crate::model::{Model, ModelType};
use crate::value::{Map, Value};

/// Turns `value` into a document of `target`. Strings are taken as ids.
pub(crate) fn to_model(target: &ModelType, path: &str, value: Value) -> Result<Model> {
    match value {
        Value::Model(model) if model.model_type().ptr_eq(target) => Ok(model),
        Value::String(id) => {
            let mut doc = Map::new();
            doc.insert(target.id_attribute().to_string(), Value::String(id));
            target.create(Value::Object(doc))
        }
        Value::Object(_) | Value::Null => target.create(value),
        other => Err(CastError::new(path, "embedded document", &other).into()),
    }
}

pub(super) fn cast(
    target: &ModelType,
    path: &str,
    value: Value,
    scope: Option<&Model>,
) -> Result<Value> {
    if !value.is_truthy() {
        return Ok(value);
    }
    let model = to_model(target, path, value)?;
    if let Some(scope) = scope {
        model.attach_parent(scope, path);
    }
    Ok(Value::Model(model))
}

/// Own validators have already passed; now the sub-document validates itself.
pub(super) fn validate(path: &str, value: &Value) -> Vec<ValidatorError> {
    match value.as_model().and_then(Model::validate) {
        Some(errors) => errors.into_iter().map(|e| e.prefixed(path)).collect(),
        None => Vec::new(),
    }
}
