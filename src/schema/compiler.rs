//! Compiles a schema tree into the accessor table a model type dispatches on.

use std::collections::HashMap;

use crate::event::bubbling_events;
use crate::schema::{Node, Tree};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AccessorKind {
    Leaf,
    Virtual,
    Namespace,
}

#[derive(Clone, Debug)]
pub(crate) struct Accessor {
    pub(crate) kind: AccessorKind,
    /// Change events for this path and its ancestors, leaf first.
    pub(crate) events: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct AccessorTable {
    entries: HashMap<String, Accessor>,
}

impl AccessorTable {
    pub(crate) fn compile(tree: &Tree) -> Self {
        let mut table = AccessorTable::default();
        table.walk(tree, "");
        table
    }

    fn walk(&mut self, tree: &Tree, prefix: &str) {
        for (key, node) in &tree.children {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            let kind = match node {
                Node::Leaf => AccessorKind::Leaf,
                Node::Virtual => AccessorKind::Virtual,
                Node::Branch(branch) => {
                    self.walk(branch, &path);
                    AccessorKind::Namespace
                }
            };
            self.entries.insert(
                path.clone(),
                Accessor {
                    kind,
                    events: bubbling_events(&path),
                },
            );
        }
    }

    pub(crate) fn get(&self, path: &str) -> Option<&Accessor> {
        self.entries.get(path)
    }

    pub(crate) fn is_namespace(&self, path: &str) -> bool {
        self.get(path)
            .is_some_and(|accessor| accessor.kind == AccessorKind::Namespace)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
