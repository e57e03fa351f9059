use thiserror::Error;

use crate::value::Value;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Cast(#[from] CastError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("unknown instance method `{name}`")]
    UnknownMethod { name: String },
    #[error("unknown static method `{name}`")]
    UnknownStatic { name: String },
    #[error("no model registered under `{name}`")]
    UnknownModel { name: String },
    #[error("path `{path}` is not declared in the schema")]
    UnknownPath { path: String },
}

/// A value could not be coerced to the type declared for its path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cast \"{expected}\" failed for path {path} with value {value}")]
pub struct CastError {
    pub path: String,
    pub expected: &'static str,
    pub value: String,
}

impl CastError {
    pub fn new(path: impl Into<String>, expected: &'static str, value: &Value) -> Self {
        CastError {
            path: path.into(),
            expected,
            value: value.to_string(),
        }
    }
}

/// A semantic rule failed. Collected by `validate()`, never raised.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Validator \"{kind}\" failed for path {path} with value {value}")]
pub struct ValidatorError {
    pub path: String,
    pub kind: String,
    pub value: Value,
}

impl ValidatorError {
    pub fn new(path: impl Into<String>, kind: impl Into<String>, value: Value) -> Self {
        ValidatorError {
            path: path.into(),
            kind: kind.into(),
            value,
        }
    }

    /// Re-roots the error under the path of the document that embeds it.
    pub(crate) fn prefixed(mut self, prefix: &str) -> Self {
        self.path = if self.path.is_empty() {
            prefix.to_string()
        } else {
            format!("{}.{}", prefix, self.path)
        };
        self
    }
}

/// Raised while a schema is being defined. Not recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Invalid value for schema path `{path}`")]
    InvalidPath { path: String },
    #[error("Undefined type `{name}` at `{path}`")]
    UndefinedType { path: String, name: String },
    #[error("Cannot set nested path `{path}`: parent path `{parent}` is already a typed path")]
    NestedUnderTyped { path: String, parent: String },
    #[error("Path `{path}` is already declared")]
    DuplicatePath { path: String },
    #[error("Cannot declare `{path}` as a typed path: it already holds nested paths")]
    NamespaceConflict { path: String },
    #[error("Invalid default for `{path}`: {source}")]
    InvalidDefault { path: String, source: CastError },
    #[error("Invalid match pattern for `{path}`: {reason}")]
    InvalidPattern { path: String, reason: String },
}
