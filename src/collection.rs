//! DocumentArray - ordered, deduplicating collection of documents or scalars.
//!
//! Items are cast on insertion, deduplicated by identity (model id, then
//! cid, then the scalar value itself) and indexed for lookup. Every mutation
//! emits one `add`/`remove`/`sort`/`reset` event unless the collection was
//! silenced for that call with [`DocumentArray::silent`].
//!
//! ## Example
//!
//! ```ignore
//! let users = DocumentArray::of(&user_type, vec![jeremy.into(), pg.into()])?;
//! users.on("add", |event| println!("{} added", event.items().len()));
//!
//! // pg is already present: only thomas is added
//! users.push(vec![pg.into(), json!({ "_id": "4", "name": "thomas" }).into()])?;
//! ```

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Serialize, Serializer};

use crate::error::Result;
use crate::event::{Event, ADD, REMOVE, RESET, SORT};
use crate::event_emitter::{EventEmitter, ListenerId};
use crate::model::{JsonOptions, Model, ModelInner, ModelType};
use crate::schema::types::{ArraySpec, Element};
use crate::schema::{Definition, FieldDef};
use crate::value::Value;

pub(crate) struct ArrayInner {
    spec: Rc<ArraySpec>,
    items: RefCell<Vec<Value>>,
    by_id: RefCell<HashMap<String, Value>>,
    parent: RefCell<Weak<ModelInner>>,
    emitter: EventEmitter<Event>,
    silent: Cell<bool>,
}

#[derive(Clone)]
pub struct DocumentArray {
    inner: Rc<ArrayInner>,
}

impl DocumentArray {
    fn new(spec: Rc<ArraySpec>, parent: Option<&Model>) -> Self {
        DocumentArray {
            inner: Rc::new(ArrayInner {
                spec,
                items: RefCell::new(Vec::new()),
                by_id: RefCell::new(HashMap::new()),
                parent: RefCell::new(parent.map(Model::downgrade).unwrap_or_default()),
                emitter: EventEmitter::new(),
                silent: Cell::new(false),
            }),
        }
    }

    /// Builds a collection owned by `parent` holding `items`, without events.
    pub(crate) fn build(
        spec: Rc<ArraySpec>,
        parent: Option<&Model>,
        items: Vec<Value>,
    ) -> Result<Self> {
        let array = DocumentArray::new(spec, parent);
        array.silent().push(items)?;
        Ok(array)
    }

    /// A standalone collection of `model_type` documents.
    pub fn of(model_type: &ModelType, items: Vec<Value>) -> Result<Self> {
        let spec = ArraySpec {
            path: String::new(),
            element: Element::Model(model_type.clone()),
        };
        Self::build(Rc::new(spec), None, items)
    }

    /// A standalone collection of scalars cast by `element`.
    pub fn scalars(element: FieldDef, items: Vec<Value>) -> Result<Self> {
        let spec = ArraySpec::from_definition("", Definition::Field(element))?;
        Self::build(Rc::new(spec), None, items)
    }

    pub(crate) fn upgrade(weak: &Weak<ArrayInner>) -> Option<DocumentArray> {
        weak.upgrade().map(|inner| DocumentArray { inner })
    }

    pub(crate) fn downgrade(&self) -> Weak<ArrayInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn spec(&self) -> &Rc<ArraySpec> {
        &self.inner.spec
    }

    pub fn ptr_eq(&self, other: &DocumentArray) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Schema path of the collection inside its parent; empty when standalone.
    pub fn path(&self) -> &str {
        &self.inner.spec.path
    }

    pub fn model_type(&self) -> Option<&ModelType> {
        self.inner.spec.model_type()
    }

    pub fn parent(&self) -> Option<Model> {
        Model::upgrade(&self.inner.parent.borrow())
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the items.
    pub fn items(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.items().into_iter()
    }

    /// The document items, skipping scalars.
    pub fn models(&self) -> Vec<Model> {
        self.inner
            .items
            .borrow()
            .iter()
            .filter_map(|item| item.as_model().cloned())
            .collect()
    }

    pub fn at(&self, index: usize) -> Option<Value> {
        self.inner.items.borrow().get(index).cloned()
    }

    pub fn index_of(&self, item: &Value) -> Option<usize> {
        self.inner
            .items
            .borrow()
            .iter()
            .position(|candidate| candidate.strict_eq(item))
    }

    /// Looks an item up by id, cid or scalar key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.by_id.borrow().get(key).cloned()
    }

    /// Finds the item matching `value`: a model by id (or cid when it has
    /// none), a plain object by its identity attribute, a scalar by itself.
    pub fn get_value(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Model(model) => match model.id() {
                Some(id) => self.get(&id),
                None => self.get(model.cid()),
            },
            Value::Object(map) => {
                let id_attribute = self.model_type()?.id_attribute();
                map.get(id_attribute)
                    .and_then(Value::key)
                    .and_then(|id| self.get(&id))
            }
            other => other.key().and_then(|key| self.get(&key)),
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.get_value(value).is_some()
    }

    /// Silences the next mutating call.
    pub fn silent(&self) -> &Self {
        self.inner.silent.set(true);
        self
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

    /// Consumes the flag set by [`DocumentArray::silent`].
    fn take_silent(&self) -> bool {
        self.inner.silent.replace(false)
    }

    fn emit(&self, silent: bool, event: &str, data: &Event) {
        if silent {
            return;
        }
        log::trace!("collection {} emits {}", self.path(), event);
        self.inner.emitter.emit(event, data);
    }

    /// Re-emits an item's change event on the collection.
    pub(crate) fn forward(&self, event: &str, data: &Event) {
        self.inner.emitter.emit(event, data);
    }

    pub fn push(&self, values: Vec<Value>) -> Result<usize> {
        let silent = self.take_silent();
        self.append(silent, values)
    }

    fn append(&self, silent: bool, values: Vec<Value>) -> Result<usize> {
        let added = self.uniq(values, &[])?;
        self.inner.items.borrow_mut().extend(added.iter().cloned());
        self.index(&added);
        self.emit_added(silent, added);
        Ok(self.len())
    }

    pub fn unshift(&self, values: Vec<Value>) -> Result<usize> {
        let silent = self.take_silent();
        let added = self.uniq(values, &[])?;
        {
            let mut items = self.inner.items.borrow_mut();
            for (offset, item) in added.iter().enumerate() {
                items.insert(offset, item.clone());
            }
        }
        self.index(&added);
        self.emit_added(silent, added);
        Ok(self.len())
    }

    pub fn pop(&self) -> Option<Value> {
        let silent = self.take_silent();
        let item = self.inner.items.borrow_mut().pop();
        self.emit_removed_one(silent, item)
    }

    pub fn shift(&self) -> Option<Value> {
        let silent = self.take_silent();
        let item = {
            let mut items = self.inner.items.borrow_mut();
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        };
        self.emit_removed_one(silent, item)
    }

    /// Removes `delete_count` items at `start` and inserts `values` there.
    /// Returns the removed items. A cast failure leaves the collection as it was.
    pub fn splice(&self, start: usize, delete_count: usize, values: Vec<Value>) -> Result<Vec<Value>> {
        let silent = self.take_silent();
        let (start, end) = {
            let len = self.len();
            let start = start.min(len);
            (start, start.saturating_add(delete_count).min(len))
        };
        let doomed = self.inner.items.borrow()[start..end].to_vec();
        let added = self.uniq(values, &doomed)?;

        let removed: Vec<Value> = self.inner.items.borrow_mut().drain(start..end).collect();
        self.unindex(&removed);
        {
            let mut items = self.inner.items.borrow_mut();
            for (offset, item) in added.iter().enumerate() {
                items.insert(start + offset, item.clone());
            }
        }
        self.index(&added);

        self.emit_removed(silent, removed.clone(), &added);
        self.emit_added(silent, added);
        Ok(removed)
    }

    /// Removes the items matching `values`; returns what was removed.
    pub fn remove(&self, values: &[Value]) -> Vec<Value> {
        let silent = self.take_silent();
        self.take_out(silent, values)
    }

    fn take_out(&self, silent: bool, values: &[Value]) -> Vec<Value> {
        let mut removed = Vec::new();
        for value in values {
            let Some(item) = self.get_value(value) else {
                continue;
            };
            self.unindex(std::slice::from_ref(&item));
            if let Some(position) = self.index_of(&item) {
                self.inner.items.borrow_mut().remove(position);
            }
            removed.push(item);
        }
        self.emit_removed(silent, removed.clone(), &[]);
        removed
    }

    /// Syncs the collection with `values`: known items are updated in place,
    /// new ones are added and items missing from `values` are removed.
    pub fn set(&self, values: Vec<Value>) -> Result<()> {
        let silent = self.take_silent();

        let mut incoming = Vec::with_capacity(values.len());
        for value in values {
            incoming.push(self.inner.spec.cast_item(value, self)?);
        }

        let mut kept: HashSet<String> = HashSet::new();
        let mut to_add = Vec::new();
        for item in incoming {
            match self.get_value(&item) {
                Some(existing) => {
                    if let Some(key) = identity(&existing) {
                        kept.insert(key);
                    }
                    match (&existing, &item) {
                        (Value::Model(current), Value::Model(update)) => {
                            if !current.ptr_eq(update) {
                                current.assign(&Value::Object(update.raw()))?;
                            }
                        }
                        _ => self.replace(&existing, item),
                    }
                }
                None => to_add.push(item),
            }
        }

        let to_remove: Vec<Value> = self
            .items()
            .into_iter()
            .filter(|item| identity(item).map_or(true, |key| !kept.contains(&key)))
            .collect();

        self.take_out(silent, &to_remove);
        self.append(silent, to_add)?;
        Ok(())
    }

    /// Replaces every item with `values`; emits a single `reset`.
    /// A cast failure leaves the collection as it was.
    pub fn reset(&self, values: Vec<Value>) -> Result<()> {
        let silent = self.take_silent();
        let old = self.items();
        let added = self.uniq(values, &old)?;

        *self.inner.items.borrow_mut() = added.clone();
        self.inner.by_id.borrow_mut().clear();
        self.index(&added);
        for item in &old {
            if let Value::Model(model) = item {
                if !added.iter().any(|kept| kept.strict_eq(item)) {
                    model.detach_parent_array(self);
                }
            }
        }

        let event = Event::Reset {
            items: added,
            collection: self.clone(),
        };
        self.emit(silent, RESET, &event);
        Ok(())
    }

    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let silent = self.take_silent();
        self.inner.items.borrow_mut().sort_by(compare);
        self.emit(silent, SORT, &Event::Sort(self.clone()));
    }

    /// Sorts with the element schema's `compare` method, or by display form.
    pub fn sort(&self) -> Result<()> {
        let silent = self.take_silent();
        let compare = self
            .model_type()
            .filter(|model_type| model_type.schema().has_method("compare"));

        let mut items = self.items();
        match compare {
            Some(_) => {
                let mut failure = None;
                items.sort_by(|a, b| match (a, b) {
                    (Value::Model(a), Value::Model(b)) => {
                        match a.call("compare", &[Value::Model(b.clone())]) {
                            Ok(order) => to_ordering(&order),
                            Err(err) => {
                                failure.get_or_insert(err);
                                Ordering::Equal
                            }
                        }
                    }
                    _ => Ordering::Equal,
                });
                if let Some(err) = failure {
                    return Err(err);
                }
            }
            None => items.sort_by_key(|item| item.to_string()),
        }
        *self.inner.items.borrow_mut() = items;
        self.emit(silent, SORT, &Event::Sort(self.clone()));
        Ok(())
    }

    pub fn to_json(&self, opts: &JsonOptions) -> serde_json::Value {
        serde_json::Value::Array(self.items().iter().map(|item| item.to_json(opts)).collect())
    }

    /// Re-keys `item` after its identity changed from `old`.
    pub(crate) fn rekey(&self, item: &Model, old: Option<String>) {
        let mut by_id = self.inner.by_id.borrow_mut();
        if let Some(old) = old {
            let stale = by_id
                .get(&old)
                .and_then(Value::as_model)
                .is_some_and(|stored| stored.ptr_eq(item));
            if stale {
                by_id.remove(&old);
            }
        }
        if let Some(id) = item.id() {
            by_id.insert(id, Value::Model(item.clone()));
        }
    }

    /// Casts `values`, dropping those already present or repeated. Items in
    /// `leaving` are about to be removed and do not count as present. On a
    /// cast failure nothing cast so far stays linked to the collection.
    fn uniq(&self, values: Vec<Value>, leaving: &[Value]) -> Result<Vec<Value>> {
        let present = |value: &Value| {
            self.get_value(value)
                .is_some_and(|hit| !leaving.iter().any(|item| item.strict_eq(&hit)))
        };
        let mut list = Vec::new();
        let mut seen = HashSet::new();
        for value in values {
            if present(&value) {
                continue;
            }
            let item = match self.inner.spec.cast_item(value, self) {
                Ok(item) => item,
                Err(err) => {
                    self.release(&list);
                    return Err(err);
                }
            };
            if present(&item) {
                continue;
            }
            if let Some(key) = identity(&item) {
                if !seen.insert(key) {
                    continue;
                }
            }
            list.push(item);
        }
        Ok(list)
    }

    /// Drops the collection link of cast items that never made it in.
    fn release(&self, items: &[Value]) {
        let current = self.inner.items.borrow();
        for item in items {
            if let Value::Model(model) = item {
                if !current.iter().any(|kept| kept.strict_eq(item)) {
                    model.detach_parent_array(self);
                }
            }
        }
    }

    fn index(&self, items: &[Value]) {
        let mut by_id = self.inner.by_id.borrow_mut();
        for item in items {
            for key in index_keys(item) {
                by_id.insert(key, item.clone());
            }
        }
    }

    fn unindex(&self, items: &[Value]) {
        let mut by_id = self.inner.by_id.borrow_mut();
        for item in items {
            for key in index_keys(item) {
                by_id.remove(&key);
            }
        }
    }

    fn replace(&self, existing: &Value, item: Value) {
        self.unindex(std::slice::from_ref(existing));
        if let Some(position) = self.index_of(existing) {
            self.inner.items.borrow_mut()[position] = item.clone();
        }
        self.index(std::slice::from_ref(&item));
    }

    fn emit_added(&self, silent: bool, added: Vec<Value>) {
        if added.is_empty() {
            return;
        }
        log::trace!("collection {}: {} added", self.path(), added.len());
        let event = Event::Add {
            items: added,
            collection: self.clone(),
        };
        self.emit(silent, ADD, &event);
    }

    /// Detaches removed models, except those put straight back by the same call.
    fn emit_removed(&self, silent: bool, removed: Vec<Value>, readded: &[Value]) {
        if removed.is_empty() {
            return;
        }
        for item in &removed {
            if let Value::Model(model) = item {
                if !readded.iter().any(|back| back.strict_eq(item)) {
                    model.detach_parent_array(self);
                }
            }
        }
        log::trace!("collection {}: {} removed", self.path(), removed.len());
        let event = Event::Remove {
            items: removed,
            collection: self.clone(),
        };
        self.emit(silent, REMOVE, &event);
    }

    fn emit_removed_one(&self, silent: bool, item: Option<Value>) -> Option<Value> {
        let item = item?;
        self.unindex(std::slice::from_ref(&item));
        self.emit_removed(silent, vec![item.clone()], &[]);
        Some(item)
    }
}

/// The key an item is deduplicated by.
fn identity(item: &Value) -> Option<String> {
    match item {
        Value::Model(model) => Some(model.id().unwrap_or_else(|| model.cid().to_string())),
        other => other.key(),
    }
}

/// Every key an item is reachable by through `get`.
fn index_keys(item: &Value) -> Vec<String> {
    match item {
        Value::Model(model) => {
            let mut keys = vec![model.cid().to_string()];
            keys.extend(model.id());
            keys
        }
        other => other.key().into_iter().collect(),
    }
}

fn to_ordering(value: &Value) -> Ordering {
    match value.as_f64() {
        Some(n) if n < 0.0 => Ordering::Less,
        Some(n) if n > 0.0 => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

impl fmt::Debug for DocumentArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentArray")
            .field("path", &self.path())
            .field("len", &self.len())
            .finish()
    }
}

impl Serialize for DocumentArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json(&JsonOptions::default()).serialize(serializer)
    }
}
