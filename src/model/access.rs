use crate::error::Result;
use crate::event::{bubbling_events, Event};
use crate::schema::compiler::AccessorKind;
use crate::value::{get_path, has_path, set_path, Value};

use super::Model;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Write without emitting change events.
    pub silent: bool,
}

impl SetOptions {
    pub fn silent() -> Self {
        SetOptions { silent: true }
    }
}

impl Model {
    /// Reads `path` through its getters. The empty path is the model itself.
    pub fn get(&self, path: &str) -> Value {
        if path.is_empty() {
            return Value::Model(self.clone());
        }
        let raw = self.get_value(path);
        match self.schema().resolve(path) {
            Some(ty) => ty.apply_getters(raw, self),
            None => raw,
        }
    }

    /// Reads the raw stored value, bypassing getters.
    pub fn get_value(&self, path: &str) -> Value {
        let doc = self.inner.doc.borrow();
        get_path(&doc, path).cloned().unwrap_or_default()
    }

    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        self.set_with(path, value, SetOptions::default())
    }

    /// Writes one path. An object written to a namespace sets the declared
    /// paths it contains; undeclared paths are ignored.
    pub fn set_with(&self, path: &str, value: impl Into<Value>, opts: SetOptions) -> Result<()> {
        let value = value.into();
        let pairs = match self.model_type().accessors().get(path).map(|a| a.kind) {
            Some(AccessorKind::Leaf) | Some(AccessorKind::Virtual) => {
                vec![(path.to_string(), value)]
            }
            Some(AccessorKind::Namespace) => self.schema().get_key_vals(&value, Some(path)),
            None => {
                log::debug!("{}: ignoring write to undeclared path {}", self.cid(), path);
                Vec::new()
            }
        };
        self.apply(pairs, opts)
    }

    /// Writes every declared path present in `input`.
    pub fn assign(&self, input: &Value) -> Result<()> {
        self.assign_with(input, SetOptions::default())
    }

    pub fn assign_with(&self, input: &Value, opts: SetOptions) -> Result<()> {
        let pairs = self.schema().get_key_vals(input, None);
        self.apply(pairs, opts)
    }

    /// Accessor for a namespace path such as `name` in `name.first`.
    pub fn nested(&self, path: &str) -> Option<Nested> {
        self.model_type()
            .accessors()
            .is_namespace(path)
            .then(|| Nested {
                root: self.clone(),
                path: path.to_string(),
            })
    }

    fn apply(&self, pairs: Vec<(String, Value)>, opts: SetOptions) -> Result<()> {
        let mut changed = Vec::new();

        for (path, value) in pairs {
            let current = self.get_value(&path);
            if current.strict_eq(&value) {
                continue;
            }
            let Some(ty) = self.schema().resolve(&path) else {
                continue;
            };
            let value = ty.apply_setters(value, self)?;
            if !ty.is_virtual() {
                set_path(&mut self.inner.doc.borrow_mut(), &path, value.clone());
                self.mark_modified(&path);
                self.rekey(&path, &current, &value);
            }
            changed.push(path);
        }

        if !opts.silent && !changed.is_empty() {
            self.notify(&changed);
        }
        Ok(())
    }

    /// Keeps the store and the containing collection keyed on current values.
    fn rekey(&self, path: &str, old: &Value, new: &Value) {
        if let Some(store) = self.model_type().store() {
            let indexed = store.borrow().is_indexed(path);
            if indexed {
                store.borrow_mut().reindex(self, path, old, new);
            }
        }
        if path == self.model_type().id_attribute() {
            if let Some(array) = self.parent_array() {
                array.rekey(self, old.key());
            }
        }
    }

    /// Emits one event per changed path and ancestor once every write is done.
    /// Values are only computed for events somebody listens to.
    fn notify(&self, changed: &[String]) {
        let parent = self.parent_array();
        let mut names: Vec<String> = Vec::new();

        for path in changed {
            let events = match self.model_type().accessors().get(path) {
                Some(accessor) => accessor.events.clone(),
                None => bubbling_events(path),
            };
            for event in events {
                if names.contains(&event) {
                    continue;
                }
                let observed = self.has_listeners(&event)
                    || parent.as_ref().is_some_and(|p| p.has_listeners(&event));
                if observed {
                    names.push(event);
                }
            }
        }

        let events: Vec<(String, Event)> = names
            .into_iter()
            .map(|name| {
                let path = name
                    .strip_prefix("change:")
                    .unwrap_or_default()
                    .to_string();
                let event = Event::Change {
                    value: self.get(&path),
                    path,
                    model: self.clone(),
                };
                (name, event)
            })
            .collect();

        for (name, event) in &events {
            self.emit(name, event);
            if let Some(parent) = &parent {
                parent.forward(name, event);
            }
        }
    }

    /// Populates a fresh document from `input` and defaults. No events, no dirty marks.
    pub(crate) fn build(&self, input: &Value) -> Result<()> {
        let schema = self.schema();
        for path in schema.path_names() {
            let Some(ty) = schema.path(path) else {
                continue;
            };
            let value = match has_path(input, path) {
                Some(value) => value.clone(),
                None => match ty.get_default() {
                    Some(default) => default,
                    None => continue,
                },
            };
            let value = ty.apply_setters(value, self)?;
            set_path(&mut self.inner.doc.borrow_mut(), path, value);
        }

        for name in schema.virtual_names() {
            let Some(ty) = schema.virtual_path(name) else {
                continue;
            };
            if !ty.has_setters() {
                continue;
            }
            if let Some(value) = has_path(input, name) {
                ty.apply_setters(value.clone(), self)?;
            }
        }
        Ok(())
    }
}

/// A namespace of a model, e.g. `name` for `name.first`. Reads and writes go
/// through the root document.
#[derive(Clone, Debug)]
pub struct Nested {
    root: Model,
    path: String,
}

impl Nested {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn root(&self) -> &Model {
        &self.root
    }

    fn full(&self, key: &str) -> String {
        format!("{}.{}", self.path, key)
    }

    pub fn get(&self, key: &str) -> Value {
        self.root.get(&self.full(key))
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.root.set(&self.full(key), value)
    }

    pub fn nested(&self, key: &str) -> Option<Nested> {
        self.root.nested(&self.full(key))
    }

    /// The raw object stored under this namespace.
    pub fn value(&self) -> Value {
        self.root.get(&self.path)
    }

    /// Writes every declared sub-path present in `value`.
    pub fn assign(&self, value: impl Into<Value>) -> Result<()> {
        self.root.set(&self.path, value)
    }
}
