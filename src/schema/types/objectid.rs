use crate::error::{CastError, Error, Result};
use crate::model::{Model, ModelType};
use crate::schema::types::embedded;
use crate::value::Value;

/// A reference path. Ids are stored as strings; full documents are cast into
/// the referenced model type, looked up by name when first needed.
#[derive(Clone, Debug, Default)]
pub(crate) struct ObjectIdRef {
    name: Option<String>,
}

impl ObjectIdRef {
    pub(crate) fn new(name: Option<String>) -> Self {
        ObjectIdRef { name }
    }

    pub(crate) fn cast(&self, path: &str, value: Value, scope: Option<&Model>) -> Result<Value> {
        match value {
            ref v if !v.is_truthy() => Ok(value),
            Value::String(_) => Ok(value),
            Value::Model(_) if self.name.is_none() => Ok(value),
            Value::Model(_) | Value::Object(_) => {
                let target = self.resolve(path, &value, scope)?;
                embedded::cast(&target, path, value, scope)
            }
            other => Err(CastError::new(path, "objectid", &other).into()),
        }
    }

    fn resolve(&self, path: &str, value: &Value, scope: Option<&Model>) -> Result<ModelType> {
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| CastError::new(path, "objectid", value))?;
        scope
            .and_then(|model| model.model_type().registry())
            .and_then(|registry| registry.get(name))
            .ok_or_else(|| Error::UnknownModel {
                name: name.to_string(),
            })
    }
}
