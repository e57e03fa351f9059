use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub type ListenerId = u64;

type Listener<E> = Rc<dyn Fn(&E)>;

/// Synchronous event emitter. Listeners run in registration order on the caller's stack.
pub struct EventEmitter<E> {
    listeners: RefCell<HashMap<String, Vec<(ListenerId, Listener<E>)>>>,
    next_id: Cell<ListenerId>,
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        EventEmitter {
            listeners: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        }
    }

    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&E) + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners
            .borrow_mut()
            .entry(event.into())
            .or_default()
            .push((id, Rc::new(listener)));
        id
    }

    /// Delivers `data` to every listener registered for `event`.
    ///
    /// The listener list is snapshotted first, so handlers may register or remove
    /// listeners without affecting the current delivery.
    pub fn emit(&self, event: &str, data: &E) {
        let snapshot: Vec<Listener<E>> = match self.listeners.borrow().get(event) {
            Some(listeners) => listeners.iter().map(|(_, l)| Rc::clone(l)).collect(),
            None => return,
        };
        for listener in snapshot {
            listener(data);
        }
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listeners
            .borrow()
            .get(event)
            .is_some_and(|listeners| !listeners.is_empty())
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.borrow().get(event).map_or(0, Vec::len)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut removed = false;
        self.listeners.borrow_mut().retain(|_, listeners| {
            let before = listeners.len();
            listeners.retain(|(listener_id, _)| *listener_id != id);
            removed |= listeners.len() != before;
            !listeners.is_empty()
        });
        removed
    }

    /// Removes listeners. `off(None, None)` clears everything, `off(Some(event), None)`
    /// clears one event, and an id targets a single registration.
    pub fn off(&self, event: Option<&str>, id: Option<ListenerId>) {
        match (event, id) {
            (None, None) => self.listeners.borrow_mut().clear(),
            (Some(event), None) => {
                self.listeners.borrow_mut().remove(event);
            }
            (None, Some(id)) => {
                self.remove_listener(id);
            }
            (Some(event), Some(id)) => {
                let mut listeners = self.listeners.borrow_mut();
                if let Some(registered) = listeners.get_mut(event) {
                    registered.retain(|(listener_id, _)| *listener_id != id);
                    if registered.is_empty() {
                        listeners.remove(event);
                    }
                }
            }
        }
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}
