use crate::collection::DocumentArray;
use crate::model::Model;
use crate::value::Value;

pub const INIT: &str = "init";
pub const CHANGE: &str = "change";
pub const ADD: &str = "add";
pub const REMOVE: &str = "remove";
pub const SORT: &str = "sort";
pub const RESET: &str = "reset";

/// Payload delivered to model and collection listeners.
#[derive(Clone, Debug)]
pub enum Event {
    /// A model finished construction.
    Init(Model),
    /// `path` (empty for the root `change` event) holds `value` after a `set()`.
    Change {
        path: String,
        value: Value,
        model: Model,
    },
    Add {
        items: Vec<Value>,
        collection: DocumentArray,
    },
    Remove {
        items: Vec<Value>,
        collection: DocumentArray,
    },
    Sort(DocumentArray),
    Reset {
        items: Vec<Value>,
        collection: DocumentArray,
    },
}

impl Event {
    /// The name the event is emitted under, e.g. `change:name.first`.
    pub fn event_type(&self) -> String {
        match self {
            Event::Init(_) => INIT.to_string(),
            Event::Change { path, .. } => change_event(path),
            Event::Add { .. } => ADD.to_string(),
            Event::Remove { .. } => REMOVE.to_string(),
            Event::Sort(_) => SORT.to_string(),
            Event::Reset { .. } => RESET.to_string(),
        }
    }

    /// The changed value. For the root `change` event this is the model itself.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Event::Change { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn model(&self) -> Option<&Model> {
        match self {
            Event::Init(model) | Event::Change { model, .. } => Some(model),
            _ => None,
        }
    }

    pub fn items(&self) -> &[Value] {
        match self {
            Event::Add { items, .. } | Event::Remove { items, .. } | Event::Reset { items, .. } => {
                items
            }
            _ => &[],
        }
    }

    pub fn collection(&self) -> Option<&DocumentArray> {
        match self {
            Event::Add { collection, .. }
            | Event::Remove { collection, .. }
            | Event::Reset { collection, .. }
            | Event::Sort(collection) => Some(collection),
            _ => None,
        }
    }
}

/// `change` for the root, `change:<path>` otherwise.
pub fn change_event(path: &str) -> String {
    if path.is_empty() {
        CHANGE.to_string()
    } else {
        format!("{}:{}", CHANGE, path)
    }
}

/// Event names for `path` and every ancestor, leaf first, ending with the root `change`.
pub(crate) fn bubbling_events(path: &str) -> Vec<String> {
    let mut events = Vec::new();
    let mut current = path;
    loop {
        events.push(change_event(current));
        if current.is_empty() {
            break;
        }
        current = match current.rfind('.') {
            Some(at) => &current[..at],
            None => "",
        };
    }
    events
}
