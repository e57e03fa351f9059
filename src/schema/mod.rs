//! Schemas: declared paths, virtuals, methods and statics.
//!
//! A schema flattens a [`Definition`] into dotted paths, each owning a
//! [`SchemaType`], and keeps a tree mirror of the declaration used to compile
//! the nested accessors of its model type.

pub(crate) mod compiler;
pub mod definition;
pub mod types;

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde::Deserialize;

use crate::error::{Result, SchemaError};
use crate::model::{Model, ModelType, ModelTypeInner};
use crate::value::{has_path, Map, Value};

pub use definition::{DefaultValue, Definition, FieldDef, TypeSpec};
pub use types::{Instance, SchemaType};

pub type Method = Rc<dyn Fn(&Model, &[Value]) -> Result<Value>>;
pub type Static = Rc<dyn Fn(&ModelType, &[Value]) -> Result<Value>>;
pub type Plugin = Rc<dyn Fn(&mut Schema, &serde_json::Value) -> Result<()>>;

/// Schema-wide configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchemaOptions {
    /// Deduplicate instances by identity through the schema's store.
    pub store: bool,
    pub id_attribute: String,
    /// Secondary store indexes, in addition to the identity attribute.
    pub indexes: Vec<String>,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        SchemaOptions {
            store: true,
            id_attribute: "_id".to_string(),
            indexes: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Node {
    Leaf,
    Virtual,
    Branch(Tree),
}

/// Declaration tree, children in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Tree {
    pub(crate) children: Vec<(String, Node)>,
}

impl Tree {
    pub(crate) fn get(&self, key: &str) -> Option<&Node> {
        self.children
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, node)| node)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.children
            .iter_mut()
            .find(|(name, _)| name == key)
            .map(|(_, node)| node)
    }

    fn insert(&mut self, key: &str, node: Node) {
        match self.get_mut(key) {
            Some(existing) => *existing = node,
            None => self.children.push((key.to_string(), node)),
        }
    }

    fn remove(&mut self, key: &str) {
        self.children.retain(|(name, _)| name != key);
    }

    /// Finds the node at a dotted path.
    pub(crate) fn lookup(&self, path: &str) -> Option<&Node> {
        let mut segments = path.split('.');
        let mut node = self.get(segments.next()?)?;
        for segment in segments {
            node = match node {
                Node::Branch(tree) => tree.get(segment)?,
                _ => return None,
            };
        }
        Some(node)
    }
}

#[derive(Clone)]
pub struct Schema {
    options: SchemaOptions,
    paths: HashMap<String, SchemaType>,
    order: Vec<String>,
    virtuals: HashMap<String, SchemaType>,
    virtual_order: Vec<String>,
    tree: Tree,
    methods: HashMap<String, Method>,
    statics: HashMap<String, Static>,
    auto_id: bool,
    compiled: Rc<RefCell<Weak<ModelTypeInner>>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::with_options(SchemaOptions::default())
    }

    pub fn with_options(options: SchemaOptions) -> Self {
        let mut schema = Schema {
            options,
            paths: HashMap::new(),
            order: Vec::new(),
            virtuals: HashMap::new(),
            virtual_order: Vec::new(),
            tree: Tree::default(),
            methods: HashMap::new(),
            statics: HashMap::new(),
            auto_id: false,
            compiled: Rc::new(RefCell::new(Weak::new())),
        };
        let id = schema.options.id_attribute.clone();
        if !id.is_empty() && !id.contains('.') {
            schema.insert_path(&id, SchemaType::new(&id, types::Kind::String));
            schema.auto_id = true;
        }
        schema
    }

    pub fn from_definition(
        definition: Definition,
        options: SchemaOptions,
    ) -> std::result::Result<Self, SchemaError> {
        let mut schema = Self::with_options(options);
        schema.add(definition, "")?;
        Ok(schema)
    }

    /// Parses a JSON definition, e.g. `{"name": {"first": "String"}, "tags": ["String"]}`.
    pub fn from_json(
        definition: &serde_json::Value,
        options: SchemaOptions,
    ) -> std::result::Result<Self, SchemaError> {
        Self::from_definition(Definition::from_json(definition)?, options)
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn id_attribute(&self) -> &str {
        &self.options.id_attribute
    }

    /// Declares every leaf of `definition` under `prefix`.
    pub fn add(&mut self, definition: Definition, prefix: &str) -> std::result::Result<(), SchemaError> {
        match definition {
            Definition::Field(field) => {
                if prefix.is_empty() {
                    return Err(SchemaError::InvalidPath {
                        path: String::new(),
                    });
                }
                self.declare(prefix, field)?;
            }
            Definition::Nested(entries) => {
                for (key, entry) in entries {
                    if key.is_empty() {
                        return Err(SchemaError::InvalidPath {
                            path: join(prefix, &key),
                        });
                    }
                    self.add(entry, &join(prefix, &key))?;
                }
            }
        }
        Ok(())
    }

    /// Declares a single leaf at a dotted path and returns its type for further
    /// configuration.
    pub fn declare(
        &mut self,
        path: &str,
        field: impl Into<FieldDef>,
    ) -> std::result::Result<&mut SchemaType, SchemaError> {
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(SchemaError::InvalidPath {
                path: path.to_string(),
            });
        }

        if self.auto_id && path == self.options.id_attribute {
            self.paths.remove(path);
            self.order.retain(|p| p != path);
            self.tree.remove(path);
            self.auto_id = false;
        }

        self.check_slot(path)?;
        let ty = SchemaType::from_field(path, field.into())?;
        Ok(self.insert_path(path, ty))
    }

    /// Creates (or returns) a virtual path: getters and setters without storage.
    pub fn virtual_field(&mut self, name: &str) -> std::result::Result<&mut SchemaType, SchemaError> {
        if name.is_empty() || name.split('.').any(str::is_empty) {
            return Err(SchemaError::InvalidPath {
                path: name.to_string(),
            });
        }
        if !self.virtuals.contains_key(name) {
            self.check_slot(name)?;
            self.tree_insert(name, Node::Virtual);
            self.virtuals
                .insert(name.to_string(), SchemaType::virtual_type(name));
            self.virtual_order.push(name.to_string());
        }
        self.virtuals
            .get_mut(name)
            .ok_or_else(|| SchemaError::InvalidPath {
                path: name.to_string(),
            })
    }

    pub fn path(&self, path: &str) -> Option<&SchemaType> {
        self.paths.get(path)
    }

    pub fn path_mut(&mut self, path: &str) -> Option<&mut SchemaType> {
        self.paths.get_mut(path)
    }

    pub fn virtual_path(&self, name: &str) -> Option<&SchemaType> {
        self.virtuals.get(name)
    }

    /// Declared (non-virtual) paths in declaration order.
    pub fn path_names(&self) -> &[String] {
        &self.order
    }

    pub fn virtual_names(&self) -> &[String] {
        &self.virtual_order
    }

    pub fn paths(&self) -> impl Iterator<Item = &SchemaType> {
        self.order.iter().filter_map(|path| self.paths.get(path))
    }

    pub(crate) fn resolve(&self, path: &str) -> Option<&SchemaType> {
        self.paths.get(path).or_else(|| self.virtuals.get(path))
    }

    pub(crate) fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn method<F>(&mut self, name: impl Into<String>, method: F) -> &mut Self
    where
        F: Fn(&Model, &[Value]) -> Result<Value> + 'static,
    {
        self.methods.insert(name.into(), Rc::new(method));
        self
    }

    pub fn static_method<F>(&mut self, name: impl Into<String>, method: F) -> &mut Self
    where
        F: Fn(&ModelType, &[Value]) -> Result<Value> + 'static,
    {
        self.statics.insert(name.into(), Rc::new(method));
        self
    }

    pub(crate) fn get_method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    pub(crate) fn get_static(&self, name: &str) -> Option<&Static> {
        self.statics.get(name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Runs `plugin` against this schema right away.
    pub fn plugin<F>(&mut self, plugin: F, opts: &serde_json::Value) -> Result<&mut Self>
    where
        F: Fn(&mut Schema, &serde_json::Value) -> Result<()>,
    {
        plugin(self, opts)?;
        Ok(self)
    }

    /// Declared paths present in `input`, in declaration order. When `prefix` is
    /// given, `input` is read as the value found at that path.
    pub fn get_key_vals(&self, input: &Value, prefix: Option<&str>) -> Vec<(String, Value)> {
        let wrapped;
        let root = match prefix {
            Some(prefix) if !prefix.is_empty() => {
                let mut doc = Map::new();
                crate::value::set_path(&mut doc, prefix, input.clone());
                wrapped = Value::Object(doc);
                &wrapped
            }
            _ => input,
        };
        self.order
            .iter()
            .filter_map(|path| has_path(root, path).map(|value| (path.clone(), value.clone())))
            .collect()
    }

    pub(crate) fn compiled(&self) -> &Rc<RefCell<Weak<ModelTypeInner>>> {
        &self.compiled
    }

    /// Checks the tree slot at `path` is free for a new leaf or virtual.
    fn check_slot(&self, path: &str) -> std::result::Result<(), SchemaError> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut branch = &self.tree;
        for (depth, segment) in segments.iter().enumerate() {
            let last = depth + 1 == segments.len();
            match branch.get(segment) {
                None => return Ok(()),
                Some(Node::Branch(tree)) if !last => branch = tree,
                Some(Node::Branch(_)) => {
                    return Err(SchemaError::NamespaceConflict {
                        path: path.to_string(),
                    })
                }
                Some(Node::Leaf) | Some(Node::Virtual) if last => {
                    return Err(SchemaError::DuplicatePath {
                        path: path.to_string(),
                    })
                }
                Some(_) => {
                    return Err(SchemaError::NestedUnderTyped {
                        path: path.to_string(),
                        parent: segments[..=depth].join("."),
                    })
                }
            }
        }
        Ok(())
    }

    fn insert_path(&mut self, path: &str, ty: SchemaType) -> &mut SchemaType {
        self.tree_insert(path, Node::Leaf);
        if !self.paths.contains_key(path) {
            self.order.push(path.to_string());
        }
        match self.paths.entry(path.to_string()) {
            Entry::Occupied(entry) => {
                let slot = entry.into_mut();
                *slot = ty;
                slot
            }
            Entry::Vacant(entry) => entry.insert(ty),
        }
    }

    fn tree_insert(&mut self, path: &str, node: Node) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(last) = segments.pop() else {
            return;
        };
        let mut branch = &mut self.tree;
        for segment in segments {
            if !matches!(branch.get(segment), Some(Node::Branch(_))) {
                branch.insert(segment, Node::Branch(Tree::default()));
            }
            branch = match branch.get_mut(segment) {
                Some(Node::Branch(tree)) => tree,
                _ => return,
            };
        }
        branch.insert(last, node);
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}
