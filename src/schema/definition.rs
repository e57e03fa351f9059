//! The schema definition grammar: typed leaves nested inside namespaces.
//!
//! A leaf names its type and options; everything else is a namespace whose
//! children extend the dotted path. Definitions are built in code with
//! [`FieldDef`] and [`Definition::object`], or parsed from JSON:
//!
//! ```ignore
//! let def = Definition::from_json(&json!({
//!     "email": { "type": "String", "required": true },
//!     "age": { "type": "Number", "min": 7, "max": 77 },
//!     "tags": ["String"],
//!     "name": { "first": "String", "last": "String" }
//! }))?;
//! ```

use std::rc::Rc;

use crate::error::SchemaError;
use crate::model::ModelType;
use crate::schema::Schema;
use crate::value::Value;

/// Zero-argument factory producing a fresh default for every new document.
pub type DefaultFactory = Rc<dyn Fn() -> Value>;

#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Factory(DefaultFactory),
}

impl DefaultValue {
    pub fn evaluate(&self) -> Value {
        match self {
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::Factory(factory) => factory(),
        }
    }
}

/// The declared type of a leaf.
#[derive(Clone)]
pub enum TypeSpec {
    String,
    Number,
    Boolean,
    Date,
    ObjectId,
    Mixed,
    /// Resolved by type name at declaration time.
    Named(String),
    /// A sub-document whose schema is compiled on declaration.
    Schema(Box<Schema>),
    /// A sub-document of an already compiled model type.
    Model(ModelType),
    /// An ordered collection of the element definition.
    Array(Box<Definition>),
}

/// A typed leaf plus its validation and default options.
#[derive(Clone)]
pub struct FieldDef {
    pub(crate) spec: TypeSpec,
    pub(crate) required: bool,
    pub(crate) pattern: Option<String>,
    pub(crate) enum_values: Option<Vec<String>>,
    pub(crate) min: Option<f64>,
    pub(crate) max: Option<f64>,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) reference: Option<String>,
}

impl FieldDef {
    pub fn new(spec: TypeSpec) -> Self {
        FieldDef {
            spec,
            required: false,
            pattern: None,
            enum_values: None,
            min: None,
            max: None,
            default: None,
            reference: None,
        }
    }

    pub fn string() -> Self {
        Self::new(TypeSpec::String)
    }

    pub fn number() -> Self {
        Self::new(TypeSpec::Number)
    }

    pub fn boolean() -> Self {
        Self::new(TypeSpec::Boolean)
    }

    pub fn date() -> Self {
        Self::new(TypeSpec::Date)
    }

    pub fn object_id() -> Self {
        Self::new(TypeSpec::ObjectId)
    }

    pub fn mixed() -> Self {
        Self::new(TypeSpec::Mixed)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(TypeSpec::Named(name.into()))
    }

    pub fn schema(schema: Schema) -> Self {
        Self::new(TypeSpec::Schema(Box::new(schema)))
    }

    pub fn embedded(model_type: &ModelType) -> Self {
        Self::new(TypeSpec::Model(model_type.clone()))
    }

    pub fn array(element: impl Into<Definition>) -> Self {
        Self::new(TypeSpec::Array(Box::new(element.into())))
    }

    /// A collection of sub-documents of `model_type`.
    pub fn array_of(model_type: &ModelType) -> Self {
        Self::array(FieldDef::embedded(model_type))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Regular expression the value must match (string paths).
    pub fn matches(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Allowed values (string paths).
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        self.default = Some(DefaultValue::Factory(Rc::new(factory)));
        self
    }

    /// Name of the registered model an `ObjectId` path refers to.
    pub fn reference(mut self, model_name: impl Into<String>) -> Self {
        self.reference = Some(model_name.into());
        self
    }
}

/// A definition tree: typed leaves inside namespaces.
#[derive(Clone)]
pub enum Definition {
    Field(FieldDef),
    Nested(Vec<(String, Definition)>),
}

impl Definition {
    pub fn object<I, K, D>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, D)>,
        K: Into<String>,
        D: Into<Definition>,
    {
        Definition::Nested(
            entries
                .into_iter()
                .map(|(key, def)| (key.into(), def.into()))
                .collect(),
        )
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Definition, SchemaError> {
        match value {
            serde_json::Value::Object(map) => Ok(Definition::Nested(
                map.iter()
                    .map(|(key, entry)| Ok((key.clone(), parse_entry(key, entry)?)))
                    .collect::<Result<_, SchemaError>>()?,
            )),
            _ => Err(SchemaError::InvalidPath {
                path: String::new(),
            }),
        }
    }
}

impl From<FieldDef> for Definition {
    fn from(field: FieldDef) -> Self {
        Definition::Field(field)
    }
}

impl From<TypeSpec> for Definition {
    fn from(spec: TypeSpec) -> Self {
        Definition::Field(FieldDef::new(spec))
    }
}

fn parse_entry(path: &str, value: &serde_json::Value) -> Result<Definition, SchemaError> {
    match value {
        serde_json::Value::String(name) => Ok(FieldDef::named(name.as_str()).into()),
        serde_json::Value::Array(items) => Ok(FieldDef::array(parse_element(path, items)?).into()),
        serde_json::Value::Object(map) => match map.get("type") {
            Some(serde_json::Value::String(_)) | Some(serde_json::Value::Array(_)) => {
                Ok(parse_field(path, map)?.into())
            }
            // `{ type: { type: String } }` declares a field literally named `type`.
            _ => Ok(Definition::Nested(
                map.iter()
                    .map(|(key, entry)| {
                        Ok((key.clone(), parse_entry(&format!("{}.{}", path, key), entry)?))
                    })
                    .collect::<Result<_, SchemaError>>()?,
            )),
        },
        _ => Err(SchemaError::InvalidPath {
            path: path.to_string(),
        }),
    }
}

fn parse_element(path: &str, items: &[serde_json::Value]) -> Result<Definition, SchemaError> {
    match items.first() {
        None => Ok(FieldDef::mixed().into()),
        Some(element) => parse_entry(path, element),
    }
}

fn parse_field(
    path: &str,
    map: &serde_json::Map<String, serde_json::Value>,
) -> Result<FieldDef, SchemaError> {
    let mut field = match map.get("type") {
        Some(serde_json::Value::String(name)) => FieldDef::named(name.as_str()),
        Some(serde_json::Value::Array(items)) => FieldDef::array(parse_element(path, items)?),
        _ => {
            return Err(SchemaError::InvalidPath {
                path: path.to_string(),
            })
        }
    };

    if map.get("required").and_then(|v| v.as_bool()) == Some(true) {
        field = field.required();
    }
    if let Some(pattern) = map.get("match").and_then(|v| v.as_str()) {
        field = field.matches(pattern);
    }
    if let Some(values) = map.get("enum").and_then(|v| v.as_array()) {
        field = field.one_of(values.iter().filter_map(|v| v.as_str()));
    }
    if let Some(min) = map.get("min").and_then(|v| v.as_f64()) {
        field = field.min(min);
    }
    if let Some(max) = map.get("max").and_then(|v| v.as_f64()) {
        field = field.max(max);
    }
    if let Some(default) = map.get("default") {
        field = field.default_value(Value::from(default.clone()));
    }
    if let Some(reference) = map.get("ref").and_then(|v| v.as_str()) {
        field = field.reference(reference);
    }
    Ok(field)
}
