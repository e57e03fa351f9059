//! Named model types and the plugins applied to every schema they compile.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::Result;
use crate::model::ModelType;
use crate::schema::{Plugin, Schema};

#[derive(Default)]
pub(crate) struct RegistryInner {
    models: RefCell<HashMap<String, ModelType>>,
    plugins: RefCell<Vec<(Plugin, serde_json::Value)>>,
}

/// Owns named model types. `ObjectId` paths with a `ref` resolve through the
/// registry their model type was registered in.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Rc<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn upgrade(weak: &Weak<RegistryInner>) -> Option<Registry> {
        weak.upgrade().map(|inner| Registry { inner })
    }

    /// Registers a plugin run on every schema compiled by [`Registry::model`] from now on.
    pub fn plugin<F>(&self, plugin: F, opts: serde_json::Value) -> &Self
    where
        F: Fn(&mut Schema, &serde_json::Value) -> Result<()> + 'static,
    {
        self.inner.plugins.borrow_mut().push((Rc::new(plugin), opts));
        self
    }

    /// Compiles `schema` under `name`. A name already taken returns the
    /// registered type unchanged.
    pub fn model(&self, name: &str, schema: Schema) -> Result<ModelType> {
        if let Some(existing) = self.get(name) {
            return Ok(existing);
        }

        let already_compiled = schema.compiled().borrow().upgrade().is_some();
        let mut schema = schema;
        if !already_compiled {
            let plugins = self.inner.plugins.borrow().clone();
            for (plugin, opts) in &plugins {
                plugin(&mut schema, opts)?;
            }
        }

        let model_type = ModelType::compile(schema);
        model_type.register(name, &self.inner);
        self.inner
            .models
            .borrow_mut()
            .insert(name.to_string(), model_type.clone());
        log::debug!("registered model type {}", name);
        Ok(model_type)
    }

    pub fn get(&self, name: &str) -> Option<ModelType> {
        self.inner.models.borrow().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.models.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Forgets every named type and plugin. Live documents keep working.
    pub fn clear(&self) {
        self.inner.models.borrow_mut().clear();
        self.inner.plugins.borrow_mut().clear();
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("models", &self.names())
            .field("plugins", &self.inner.plugins.borrow().len())
            .finish()
    }
}
