use std::rc::Rc;

use crate::collection::DocumentArray;
use crate::error::{Result, SchemaError, ValidatorError};
use crate::model::{Model, ModelType};
use crate::schema::definition::{Definition, FieldDef, TypeSpec};
use crate::schema::types::{Predicate, SchemaType};
use crate::schema::Schema;
use crate::value::Value;

/// What a collection path holds: sub-documents or scalars of one type.
#[derive(Clone)]
pub(crate) enum Element {
    Model(ModelType),
    Scalar(Box<SchemaType>),
}

#[derive(Clone)]
pub(crate) struct ArraySpec {
    pub(crate) path: String,
    pub(crate) element: Element,
}

impl ArraySpec {
    pub(crate) fn from_definition(
        path: &str,
        element: Definition,
    ) -> std::result::Result<Self, SchemaError> {
        let element = match element {
            Definition::Nested(entries) => {
                let schema = Schema::from_definition(Definition::Nested(entries), Default::default())?;
                Element::Model(ModelType::compile(schema))
            }
            Definition::Field(FieldDef {
                spec: TypeSpec::Model(model_type),
                ..
            }) => Element::Model(model_type),
            Definition::Field(FieldDef {
                spec: TypeSpec::Schema(schema),
                ..
            }) => Element::Model(ModelType::compile(*schema)),
            Definition::Field(field) => Element::Scalar(Box::new(SchemaType::from_field(path, field)?)),
        };
        Ok(ArraySpec {
            path: path.to_string(),
            element,
        })
    }

    pub(crate) fn model_type(&self) -> Option<&ModelType> {
        match &self.element {
            Element::Model(model_type) => Some(model_type),
            Element::Scalar(_) => None,
        }
    }

    /// Casts one incoming item for `array`, wiring sub-documents to their owners.
    pub(crate) fn cast_item(&self, value: Value, array: &DocumentArray) -> Result<Value> {
        match &self.element {
            Element::Scalar(ty) => ty.cast_in(value, array.parent().as_ref()),
            Element::Model(model_type) => {
                let value = if value.is_truthy() { value } else { Value::Null };
                let model = super::embedded::to_model(model_type, &self.path, value)?;
                if let Some(parent) = array.parent() {
                    model.attach_parent(&parent, &self.path);
                }
                model.attach_parent_array(array);
                Ok(Value::Model(model))
            }
        }
    }
}

pub(super) fn cast(spec: &Rc<ArraySpec>, value: Value, scope: Option<&Model>) -> Result<Value> {
    let items = match value {
        Value::Collection(array) if Rc::ptr_eq(array.spec(), spec) => {
            return Ok(Value::Collection(array))
        }
        Value::Collection(array) => array.items(),
        Value::Array(items) => items,
        ref v if !v.is_truthy() => Vec::new(),
        other => vec![other],
    };
    Ok(Value::Collection(DocumentArray::build(
        Rc::clone(spec),
        scope,
        items,
    )?))
}

/// Validates each item once the collection's own validators have passed.
/// Errors are re-rooted under `<path>.<index>`.
pub(super) fn validate(spec: &ArraySpec, value: &Value, scope: &Model) -> Vec<ValidatorError> {
    let Some(array) = value.as_collection() else {
        return Vec::new();
    };
    let mut errors = Vec::new();
    for (index, item) in array.items().iter().enumerate() {
        let prefix = format!("{}.{}", spec.path, index);
        match (item, &spec.element) {
            (Value::Model(model), _) => {
                if let Some(item_errors) = model.validate() {
                    errors.extend(item_errors.into_iter().map(|e| e.prefixed(&prefix)));
                }
            }
            (_, Element::Scalar(ty)) => {
                errors.extend(ty.do_validate(item, scope).into_iter().map(|mut e| {
                    e.path = prefix.clone();
                    e
                }));
            }
            _ => {}
        }
    }
    errors
}

/// Bound on the number of items.
pub(super) fn length_bound(bound: f64, lower: bool) -> Predicate {
    Rc::new(move |value, _| {
        let len = match value {
            Value::Collection(array) => array.len(),
            Value::Array(items) => items.len(),
            _ => return true,
        } as f64;
        if lower {
            len >= bound
        } else {
            len <= bound
        }
    })
}
