mod collection;
mod error;
mod event;
mod event_emitter;
mod model;
mod registry;
mod schema;
mod store;
mod value;

pub use collection::DocumentArray;
pub use error::{CastError, Error, Result, SchemaError, ValidatorError};
pub use event::{change_event, Event, ADD, CHANGE, INIT, REMOVE, RESET, SORT};
pub use event_emitter::{EventEmitter, ListenerId};
pub use model::{JsonOptions, Model, ModelType, Nested, PathSelection, SetOptions, Transform};
pub use registry::Registry;
pub use schema::definition::DefaultFactory;
pub use schema::types::{Getter, Predicate, Setter, Validator};
pub use schema::{
    DefaultValue, Definition, FieldDef, Instance, Method, Plugin, Schema, SchemaOptions,
    SchemaType, Static, TypeSpec,
};
pub use store::Store;
pub use value::{Map, Value};
