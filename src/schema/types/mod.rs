//! Path types: the getter/setter/cast/default pipeline plus validators.
//!
//! Every declared path owns one [`SchemaType`]. The concrete behaviour is a
//! closed set of variants ([`Instance`]) dispatched by tag; virtual paths use
//! the same pipeline with an identity cast and no storage.

mod boolean;
mod date;
mod document_array;
mod embedded;
mod number;
mod objectid;
mod string;

use std::fmt;
use std::rc::Rc;

use crate::error::{Result, SchemaError, ValidatorError};
use crate::model::{Model, ModelType};
use crate::schema::definition::{DefaultValue, FieldDef, TypeSpec};
use crate::value::Value;

pub(crate) use document_array::{ArraySpec, Element};
pub(crate) use objectid::ObjectIdRef;

pub type Getter = Rc<dyn Fn(Value, &Model) -> Value>;
pub type Setter = Rc<dyn Fn(Value, &Model) -> Result<Value>>;
pub type Predicate = Rc<dyn Fn(&Value, &Model) -> bool>;

/// The concrete kind of a path type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instance {
    String,
    Number,
    Boolean,
    Date,
    ObjectId,
    Mixed,
    EmbeddedDocument,
    DocumentArray,
    Virtual,
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Instance::String => "String",
            Instance::Number => "Number",
            Instance::Boolean => "Boolean",
            Instance::Date => "Date",
            Instance::ObjectId => "ObjectId",
            Instance::Mixed => "Mixed",
            Instance::EmbeddedDocument => "EmbeddedDocument",
            Instance::DocumentArray => "DocumentArray",
            Instance::Virtual => "virtual",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone)]
pub(crate) enum Kind {
    String,
    Number,
    Boolean,
    Date,
    Mixed,
    ObjectId(ObjectIdRef),
    Embedded(ModelType),
    DocumentArray(Rc<ArraySpec>),
    Virtual,
}

#[derive(Clone)]
pub struct Validator {
    predicate: Predicate,
    kind: String,
}

impl Validator {
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

#[derive(Clone)]
pub struct SchemaType {
    path: String,
    kind: Kind,
    getters: Vec<Getter>,
    setters: Vec<Setter>,
    validators: Vec<Validator>,
    default: Option<DefaultValue>,
}

impl SchemaType {
    pub(crate) fn new(path: impl Into<String>, kind: Kind) -> Self {
        SchemaType {
            path: path.into(),
            kind,
            getters: Vec::new(),
            setters: Vec::new(),
            validators: Vec::new(),
            default: None,
        }
    }

    pub(crate) fn virtual_type(path: impl Into<String>) -> Self {
        Self::new(path, Kind::Virtual)
    }

    /// Interprets a leaf definition as a concrete path type.
    pub(crate) fn from_field(path: &str, field: FieldDef) -> std::result::Result<Self, SchemaError> {
        let kind = match field.spec {
            TypeSpec::String => Kind::String,
            TypeSpec::Number => Kind::Number,
            TypeSpec::Boolean => Kind::Boolean,
            TypeSpec::Date => Kind::Date,
            TypeSpec::Mixed => Kind::Mixed,
            TypeSpec::ObjectId => Kind::ObjectId(ObjectIdRef::new(field.reference.clone())),
            TypeSpec::Named(ref name) => match name.as_str() {
                "String" => Kind::String,
                "Number" => Kind::Number,
                "Boolean" => Kind::Boolean,
                "Date" => Kind::Date,
                "Mixed" => Kind::Mixed,
                "ObjectId" => Kind::ObjectId(ObjectIdRef::new(field.reference.clone())),
                "Array" => Kind::DocumentArray(Rc::new(ArraySpec::from_definition(
                    path,
                    FieldDef::mixed().into(),
                )?)),
                _ => {
                    return Err(SchemaError::UndefinedType {
                        path: path.to_string(),
                        name: name.clone(),
                    })
                }
            },
            TypeSpec::Schema(ref schema) => {
                Kind::Embedded(ModelType::compile(schema.as_ref().clone()))
            }
            TypeSpec::Model(ref model_type) => Kind::Embedded(model_type.clone()),
            TypeSpec::Array(ref element) => Kind::DocumentArray(Rc::new(
                ArraySpec::from_definition(path, element.as_ref().clone())?,
            )),
        };

        let mut ty = SchemaType::new(path, kind);
        ty.apply_options(&field)?;
        Ok(ty)
    }

    fn apply_options(&mut self, field: &FieldDef) -> std::result::Result<(), SchemaError> {
        if field.required {
            self.required();
        }

        if let Some(pattern) = &field.pattern {
            match self.kind {
                Kind::String => {
                    let regex = regex::Regex::new(pattern).map_err(|e| {
                        SchemaError::InvalidPattern {
                            path: self.path.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    self.push_validator(string::match_validator(regex), "match");
                }
                _ => log::debug!("ignoring `match` option on non-string path {}", self.path),
            }
        }

        if let Some(values) = &field.enum_values {
            match self.kind {
                Kind::String => {
                    self.push_validator(string::enum_validator(values.clone()), "enum")
                }
                _ => log::debug!("ignoring `enum` option on non-string path {}", self.path),
            }
        }

        if let Some(min) = field.min {
            if let Some(check) = self.bound_validator(min, true) {
                self.push_validator(check, "min");
            }
        }
        if let Some(max) = field.max {
            if let Some(check) = self.bound_validator(max, false) {
                self.push_validator(check, "max");
            }
        }

        if let Some(default) = &field.default {
            if let DefaultValue::Literal(literal) = default {
                if matches!(
                    self.kind,
                    Kind::String | Kind::Number | Kind::Boolean | Kind::Date
                ) {
                    self.cast_in(literal.clone(), None).map_err(|err| match err {
                        crate::Error::Cast(source) => SchemaError::InvalidDefault {
                            path: self.path.clone(),
                            source,
                        },
                        _ => SchemaError::InvalidPath {
                            path: self.path.clone(),
                        },
                    })?;
                }
            }
            self.default = Some(default.clone());
        }
        Ok(())
    }

    fn bound_validator(&self, bound: f64, lower: bool) -> Option<Predicate> {
        match self.kind {
            Kind::Number => Some(number::bound(bound, lower)),
            Kind::String => Some(string::length_bound(bound, lower)),
            Kind::DocumentArray(_) => Some(document_array::length_bound(bound, lower)),
            _ => {
                log::debug!("ignoring min/max option on path {}", self.path);
                None
            }
        }
    }

    fn push_validator(&mut self, predicate: Predicate, kind: &str) {
        self.validators.push(Validator {
            predicate,
            kind: kind.to_string(),
        });
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn instance(&self) -> Instance {
        match self.kind {
            Kind::String => Instance::String,
            Kind::Number => Instance::Number,
            Kind::Boolean => Instance::Boolean,
            Kind::Date => Instance::Date,
            Kind::Mixed => Instance::Mixed,
            Kind::ObjectId(_) => Instance::ObjectId,
            Kind::Embedded(_) => Instance::EmbeddedDocument,
            Kind::DocumentArray(_) => Instance::DocumentArray,
            Kind::Virtual => Instance::Virtual,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, Kind::Virtual)
    }

    pub(crate) fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Sub-document or element model type, when the path holds models.
    pub(crate) fn model_type(&self) -> Option<&ModelType> {
        match &self.kind {
            Kind::Embedded(model_type) => Some(model_type),
            Kind::DocumentArray(spec) => spec.model_type(),
            _ => None,
        }
    }

    /// Adds a getter; getters run left to right on every `get`.
    pub fn get<F>(&mut self, getter: F) -> &mut Self
    where
        F: Fn(Value, &Model) -> Value + 'static,
    {
        self.getters.push(Rc::new(getter));
        self
    }

    /// Adds a setter; setters run left to right before the cast on every write.
    pub fn set<F>(&mut self, setter: F) -> &mut Self
    where
        F: Fn(Value, &Model) -> Result<Value> + 'static,
    {
        self.setters.push(Rc::new(setter));
        self
    }

    /// Registers a custom validator reported under `kind` when it fails.
    pub fn validate<F>(&mut self, predicate: F, kind: impl Into<String>) -> &mut Self
    where
        F: Fn(&Value, &Model) -> bool + 'static,
    {
        self.validators.push(Validator {
            predicate: Rc::new(predicate),
            kind: kind.into(),
        });
        self
    }

    pub fn required(&mut self) -> &mut Self {
        self.push_validator(Rc::new(|value: &Value, _: &Model| value.is_truthy()), "required");
        self
    }

    pub fn default_value(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn default_with<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn() -> Value + 'static,
    {
        self.default = Some(DefaultValue::Factory(Rc::new(factory)));
        self
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn has_setters(&self) -> bool {
        !self.setters.is_empty()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Evaluates the default: factories are called, literals are cloned.
    pub fn get_default(&self) -> Option<Value> {
        self.default.as_ref().map(DefaultValue::evaluate)
    }

    pub fn apply_setters(&self, value: Value, scope: &Model) -> Result<Value> {
        let mut value = value;
        for setter in &self.setters {
            value = setter(value, scope)?;
        }
        self.cast(value, scope)
    }

    pub fn apply_getters(&self, value: Value, scope: &Model) -> Value {
        self.getters
            .iter()
            .fold(value, |value, getter| getter(value, scope))
    }

    /// Coerces `value` to this path's type. The containing document is `scope`.
    pub fn cast(&self, value: Value, scope: &Model) -> Result<Value> {
        self.cast_in(value, Some(scope))
    }

    pub(crate) fn cast_in(&self, value: Value, scope: Option<&Model>) -> Result<Value> {
        match &self.kind {
            Kind::String => Ok(string::cast(&self.path, value)?),
            Kind::Number => Ok(number::cast(&self.path, value)?),
            Kind::Boolean => Ok(boolean::cast(value)),
            Kind::Date => Ok(date::cast(&self.path, value)?),
            Kind::Mixed | Kind::Virtual => Ok(value),
            Kind::ObjectId(reference) => reference.cast(&self.path, value, scope),
            Kind::Embedded(model_type) => embedded::cast(model_type, &self.path, value, scope),
            Kind::DocumentArray(spec) => document_array::cast(spec, value, scope),
        }
    }

    /// Runs every validator against `value`; all of them run even after a failure.
    pub fn do_validate(&self, value: &Value, scope: &Model) -> Vec<ValidatorError> {
        let errors: Vec<ValidatorError> = self
            .validators
            .iter()
            .filter(|validator| !(validator.predicate)(value, scope))
            .map(|validator| ValidatorError::new(&self.path, &validator.kind, value.clone()))
            .collect();

        if !errors.is_empty() {
            return errors;
        }

        match &self.kind {
            Kind::Embedded(_) => embedded::validate(&self.path, value),
            Kind::DocumentArray(spec) => document_array::validate(spec, value, scope),
            _ => errors,
        }
    }
}
