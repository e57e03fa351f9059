//! Models - schema-bound documents with change events and dirty tracking.
//!
//! A [`ModelType`] is a compiled schema: it owns the accessor table, the
//! identity store and the instance methods. A [`Model`] is one live document
//! of that type, shared by handle.
//!
//! ## Example
//!
//! ```ignore
//! use docmodel::{ModelType, Schema, SchemaOptions};
//!
//! let schema = Schema::from_json(&json!({ "name": { "first": "String" } }), SchemaOptions::default())?;
//! let users = ModelType::compile(schema);
//!
//! let pg = users.create(json!({ "_id": "1", "name": { "first": "pg" } }))?;
//! pg.on("change:name.first", |event| println!("{:?}", event.value()));
//! pg.set("name.first", "pierre")?;
//!
//! // same identity, same instance
//! assert!(users.create(json!({ "_id": "1" }))?.ptr_eq(&pg));
//! ```

mod access;
mod json;
mod validate;

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::collection::{ArrayInner, DocumentArray};
use crate::error::{Error, Result};
use crate::event::{Event, INIT};
use crate::event_emitter::{EventEmitter, ListenerId};
use crate::registry::{Registry, RegistryInner};
use crate::schema::compiler::AccessorTable;
use crate::schema::types::Kind;
use crate::schema::Schema;
use crate::store::Store;
use crate::value::{get_path, Map, Value};

pub use access::{Nested, SetOptions};
pub use json::{JsonOptions, Transform};
pub use validate::PathSelection;

static NEXT_CID: AtomicU64 = AtomicU64::new(1);

fn unique_cid() -> String {
    format!("m_{}", NEXT_CID.fetch_add(1, Ordering::Relaxed))
}

pub(crate) struct ModelTypeInner {
    name: RefCell<Option<String>>,
    schema: Schema,
    accessors: AccessorTable,
    store: Option<RefCell<Store>>,
    registry: RefCell<Weak<RegistryInner>>,
    emitter: EventEmitter<Event>,
}

/// A compiled schema. Cloning shares the same type.
#[derive(Clone)]
pub struct ModelType {
    inner: Rc<ModelTypeInner>,
}

impl ModelType {
    /// Compiles `schema`, or returns the type it was already compiled into.
    pub fn compile(schema: Schema) -> ModelType {
        if let Some(inner) = schema.compiled().borrow().upgrade() {
            return ModelType { inner };
        }

        let accessors = AccessorTable::compile(schema.tree());
        let store = schema.options().store.then(|| {
            let mut store = Store::new(schema.id_attribute());
            for index in &schema.options().indexes {
                store.index(index.as_str());
            }
            RefCell::new(store)
        });
        log::debug!(
            "compiled model type: {} paths, {} accessors, store {}",
            schema.path_names().len(),
            accessors.len(),
            if store.is_some() { "on" } else { "off" }
        );

        let memo = Rc::clone(schema.compiled());
        let inner = Rc::new(ModelTypeInner {
            name: RefCell::new(None),
            schema,
            accessors,
            store,
            registry: RefCell::new(Weak::new()),
            emitter: EventEmitter::new(),
        });
        *memo.borrow_mut() = Rc::downgrade(&inner);
        ModelType { inner }
    }

    pub(crate) fn register(&self, name: &str, registry: &Rc<RegistryInner>) {
        let mut current = self.inner.name.borrow_mut();
        if current.is_none() {
            *current = Some(name.to_string());
        }
        *self.inner.registry.borrow_mut() = Rc::downgrade(registry);
    }

    pub fn name(&self) -> Option<String> {
        self.inner.name.borrow().clone()
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    pub fn id_attribute(&self) -> &str {
        self.inner.schema.id_attribute()
    }

    pub fn registry(&self) -> Option<Registry> {
        Registry::upgrade(&self.inner.registry.borrow())
    }

    pub fn ptr_eq(&self, other: &ModelType) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn accessors(&self) -> &AccessorTable {
        &self.inner.accessors
    }

    pub(crate) fn store(&self) -> Option<&RefCell<Store>> {
        self.inner.store.as_ref()
    }

    /// Builds a document from `input`.
    ///
    /// When the input carries an identity already present in the store, the
    /// stored instance is updated with the input and returned instead.
    pub fn create(&self, input: impl Into<Value>) -> Result<Model> {
        let input = input.into();

        if let Some(store) = self.store() {
            let existing = input
                .get(self.id_attribute())
                .and_then(Value::key)
                .and_then(|id| store.borrow().get(&id));
            if let Some(existing) = existing {
                log::trace!("store hit for {}", existing.cid());
                existing.assign(&input)?;
                return Ok(existing);
            }
        }

        let model = Model::allocate(self.clone());
        model.build(&input)?;

        let init = Event::Init(model.clone());
        model.emit(INIT, &init);
        self.inner.emitter.emit(INIT, &init);

        if let Some(store) = self.store() {
            store.borrow_mut().add(&model);
        }
        Ok(model)
    }

    pub fn find(&self, id: &str) -> Option<Model> {
        self.store().and_then(|store| store.borrow().get(id))
    }

    pub fn find_by(&self, index: &str, key: &str) -> Option<Model> {
        self.store().and_then(|store| store.borrow().get_by(index, key))
    }

    /// Forgets every stored instance. Live handles stay usable.
    pub fn clear_store(&self) {
        if let Some(store) = self.store() {
            store.borrow_mut().clear();
        }
    }

    pub fn store_len(&self) -> usize {
        self.store().map_or(0, |store| store.borrow().len())
    }

    pub fn call_static(&self, name: &str, args: &[Value]) -> Result<Value> {
        let method = self
            .schema()
            .get_static(name)
            .cloned()
            .ok_or_else(|| Error::UnknownStatic {
                name: name.to_string(),
            })?;
        method(self, args)
    }

    /// Listens to `init` for every document built by this type.
    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&Event) + 'static,
    {
        self.inner.emitter.on(event, listener)
    }

    pub fn off(&self, event: Option<&str>, id: Option<ListenerId>) {
        self.inner.emitter.off(event, id);
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.name())
            .field("paths", &self.schema().path_names())
            .finish()
    }
}

struct ParentLink {
    model: Weak<ModelInner>,
    path: String,
}

pub(crate) struct ModelInner {
    cid: String,
    model_type: ModelType,
    doc: RefCell<Map>,
    modified: RefCell<Vec<String>>,
    parent: RefCell<Option<ParentLink>>,
    parent_array: RefCell<Weak<ArrayInner>>,
    emitter: EventEmitter<Event>,
}

/// A live document. Cloning hands out another handle to the same document.
#[derive(Clone)]
pub struct Model {
    inner: Rc<ModelInner>,
}

impl Model {
    fn allocate(model_type: ModelType) -> Model {
        Model {
            inner: Rc::new(ModelInner {
                cid: unique_cid(),
                model_type,
                doc: RefCell::new(Map::new()),
                modified: RefCell::new(Vec::new()),
                parent: RefCell::new(None),
                parent_array: RefCell::new(Weak::new()),
                emitter: EventEmitter::new(),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<ModelInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<ModelInner>) -> Option<Model> {
        weak.upgrade().map(|inner| Model { inner })
    }

    /// Process-local id, unique for the lifetime of the process.
    pub fn cid(&self) -> &str {
        &self.inner.cid
    }

    pub fn id(&self) -> Option<String> {
        self.get_value(self.model_type().id_attribute()).key()
    }

    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    pub fn model_type(&self) -> &ModelType {
        &self.inner.model_type
    }

    pub fn schema(&self) -> &Schema {
        self.inner.model_type.schema()
    }

    pub fn ptr_eq(&self, other: &Model) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Same instance, or both carry the same identity.
    pub fn equals(&self, other: &Model) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match other.id() {
            Some(id) => self.id().as_deref() == Some(id.as_str()),
            None => false,
        }
    }

    /// The document embedding this one, if it is still alive.
    pub fn parent(&self) -> Option<Model> {
        self.inner
            .parent
            .borrow()
            .as_ref()
            .and_then(|link| link.model.upgrade())
            .map(|inner| Model { inner })
    }

    /// Path under which the parent embeds this document.
    pub fn parent_path(&self) -> Option<String> {
        self.inner
            .parent
            .borrow()
            .as_ref()
            .map(|link| link.path.clone())
    }

    pub fn parent_array(&self) -> Option<DocumentArray> {
        DocumentArray::upgrade(&self.inner.parent_array.borrow())
    }

    /// First attach wins.
    pub(crate) fn attach_parent(&self, parent: &Model, path: &str) {
        if self.ptr_eq(parent) || self.parent().is_some() {
            return;
        }
        *self.inner.parent.borrow_mut() = Some(ParentLink {
            model: Rc::downgrade(&parent.inner),
            path: path.to_string(),
        });
    }

    pub(crate) fn attach_parent_array(&self, array: &DocumentArray) {
        if self.parent_array().is_none() {
            *self.inner.parent_array.borrow_mut() = array.downgrade();
        }
    }

    pub(crate) fn detach_parent_array(&self, array: &DocumentArray) {
        if self.parent_array().is_some_and(|current| current.ptr_eq(array)) {
            *self.inner.parent_array.borrow_mut() = Weak::new();
        }
    }

    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&Event) + 'static,
    {
        self.inner.emitter.on(event, listener)
    }

    pub fn off(&self, event: Option<&str>, id: Option<ListenerId>) {
        self.inner.emitter.off(event, id);
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.inner.emitter.has_listeners(event)
    }

    pub(crate) fn emit(&self, event: &str, data: &Event) {
        log::trace!("{} emits {}", self.cid(), event);
        self.inner.emitter.emit(event, data);
    }

    /// Calls an instance method declared on the schema.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let method = self
            .schema()
            .get_method(name)
            .cloned()
            .ok_or_else(|| Error::UnknownMethod {
                name: name.to_string(),
            })?;
        method(self, args)
    }

    /// Leaves the containing collection and the store, and drops every listener.
    pub fn dispose(&self) {
        if let Some(array) = self.parent_array() {
            array.remove(&[Value::Model(self.clone())]);
        }
        if let Some(store) = self.model_type().store() {
            store.borrow_mut().remove(self);
        }
        self.inner.emitter.off(None, None);
        log::debug!("disposed {}", self.cid());
    }

    /// Marks the top-level key of `path` dirty, and the embedding path of the parent.
    pub fn mark_modified(&self, path: &str) {
        let key = path.split('.').next().unwrap_or(path);
        {
            let mut modified = self.inner.modified.borrow_mut();
            if modified.iter().any(|p| p == key) {
                return;
            }
            modified.push(key.to_string());
        }
        if let (Some(parent), Some(parent_path)) = (self.parent(), self.parent_path()) {
            parent.mark_modified(&parent_path);
        }
    }

    pub fn modified_paths(&self) -> Vec<String> {
        self.inner.modified.borrow().clone()
    }

    pub fn is_modified(&self, path: &str) -> bool {
        let key = path.split('.').next().unwrap_or(path);
        self.inner.modified.borrow().iter().any(|p| p == key)
    }

    /// Clears dirty state here and in every embedded document and collection item.
    pub fn clear_modified_paths(&self) {
        let mut visited = HashSet::new();
        self.clear_modified_in(&mut visited);
    }

    fn clear_modified_in(&self, visited: &mut HashSet<String>) {
        if !visited.insert(self.cid().to_string()) {
            return;
        }
        self.inner.modified.borrow_mut().clear();

        let children: Vec<Value> = {
            let doc = self.inner.doc.borrow();
            self.schema()
                .paths()
                .filter(|ty| matches!(ty.kind(), Kind::Embedded(_) | Kind::DocumentArray(_)))
                .filter_map(|ty| get_path(&doc, ty.path()).cloned())
                .collect()
        };
        for child in children {
            match child {
                Value::Model(model) => model.clear_modified_in(visited),
                Value::Collection(array) => {
                    for item in array.models() {
                        item.clear_modified_in(visited);
                    }
                }
                _ => {}
            }
        }
    }

    /// Snapshot of the raw document.
    pub fn raw(&self) -> Map {
        self.inner.doc.borrow().clone()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("cid", &self.cid())
            .field("id", &self.id())
            .finish()
    }
}
