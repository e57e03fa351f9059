use std::fmt;
use std::rc::Rc;

use serde::{Serialize, Serializer};

use crate::schema::{Node, Tree};
use crate::value::{get_path, set_json_path, Map, Value};

use super::{Model, PathSelection};

/// Post-processes the JSON object of each serialized document.
pub type Transform = Rc<dyn Fn(&Model, &mut serde_json::Map<String, serde_json::Value>, &JsonOptions)>;

#[derive(Clone, Default)]
pub struct JsonOptions {
    pub transform: Option<Transform>,
}

impl JsonOptions {
    pub fn with_transform<F>(transform: F) -> Self
    where
        F: Fn(&Model, &mut serde_json::Map<String, serde_json::Value>, &JsonOptions) + 'static,
    {
        JsonOptions {
            transform: Some(Rc::new(transform)),
        }
    }
}

impl fmt::Debug for JsonOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonOptions")
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl Model {
    /// Stored keys of the document in declaration order, namespaces
    /// included; sub-documents and collections serialize recursively with
    /// the same options.
    pub fn to_json(&self, opts: &JsonOptions) -> serde_json::Value {
        let mut obj = declared_json(self.schema().tree(), &self.raw(), opts);
        if let Some(transform) = &opts.transform {
            transform(self, &mut obj, opts);
        }
        serde_json::Value::Object(obj)
    }

    /// JSON of the selected stored paths only.
    pub fn pick(&self, paths: impl Into<PathSelection>) -> serde_json::Value {
        let opts = JsonOptions::default();
        let paths = match paths.into() {
            PathSelection::All => return self.to_json(&opts),
            PathSelection::Paths(paths) => paths,
        };
        let doc = self.raw();
        let mut obj = serde_json::Map::new();
        for path in &paths {
            if let Some(value) = get_path(&doc, path) {
                set_json_path(&mut obj, path, value.to_json(&opts));
            }
        }
        serde_json::Value::Object(obj)
    }
}

fn declared_json(tree: &Tree, doc: &Map, opts: &JsonOptions) -> serde_json::Map<String, serde_json::Value> {
    let mut obj = serde_json::Map::new();
    for (key, node) in &tree.children {
        let Some(value) = doc.get(key) else {
            continue;
        };
        match (node, value) {
            (Node::Virtual, _) => {}
            (Node::Branch(branch), Value::Object(nested)) => {
                let mut inner = declared_json(branch, nested, opts);
                for (extra, value) in nested {
                    if !inner.contains_key(extra) && branch.get(extra).is_none() {
                        inner.insert(extra.clone(), value.to_json(opts));
                    }
                }
                obj.insert(key.clone(), serde_json::Value::Object(inner));
            }
            _ => {
                obj.insert(key.clone(), value.to_json(opts));
            }
        }
    }
    obj
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json(&JsonOptions::default()).serialize(serializer)
    }
}
