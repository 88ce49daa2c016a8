//! Host observers for property reads, writes and array mutations
//!
//! Registries hold their targets weakly; an entry whose target was dropped
//! is pruned on the next notification.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::types::{Obj, Value, WeakObj};

/// Handle returned by every subscription
pub struct Subscription {
    cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Subscription {
            cancel: RefCell::new(Some(Box::new(cancel))),
        }
    }

    /// Stop receiving notifications; later calls do nothing
    pub fn unsubscribe(&self) {
        if let Some(cancel) = self.cancel.borrow_mut().take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.borrow().is_some())
            .finish()
    }
}

/// A modification observed on an object
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Create {
        key: String,
        value: Value,
    },
    Replace {
        key: String,
        old: Value,
        value: Value,
    },
    Delete {
        key: String,
        old: Value,
    },
    /// In-place array mutation (`push`, `splice`, `sort`, ...)
    ArrayMutation {
        method: &'static str,
        index: usize,
        added: Vec<Value>,
        removed: Vec<Value>,
    },
}

impl Change {
    pub fn key(&self) -> Option<&str> {
        match self {
            Change::Create { key, .. } | Change::Replace { key, .. } | Change::Delete { key, .. } => {
                Some(key)
            }
            Change::ArrayMutation { .. } => None,
        }
    }
}

pub type GetCallback = Rc<dyn Fn(&Obj, &str)>;
pub type ChangeCallback = Rc<dyn Fn(&Obj, &Change)>;

struct Entry<C> {
    id: u64,
    /// `None` observes every object
    target: Option<WeakObj>,
    /// `None` observes every property of the target
    property: Option<String>,
    callback: C,
}

impl<C> Entry<C> {
    fn is_alive(&self) -> bool {
        self.target.as_ref().map_or(true, WeakObj::is_alive)
    }

    fn matches(&self, obj: &Obj, key: Option<&str>) -> bool {
        let target = self.target.as_ref().map_or(true, |t| t.is(obj));
        let property = match (&self.property, key) {
            (None, _) => true,
            (Some(p), Some(k)) => p == k,
            (Some(_), None) => false,
        };
        target && property
    }
}

#[derive(Default)]
pub struct Registry {
    gets: RefCell<Vec<Entry<GetCallback>>>,
    changes: RefCell<Vec<Entry<ChangeCallback>>>,
    next_id: Cell<u64>,
}

impl Registry {
    pub fn new() -> Rc<Self> {
        Rc::new(Registry::default())
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub fn is_empty(&self) -> bool {
        self.gets.borrow().is_empty() && self.changes.borrow().is_empty()
    }

    /// Observe property reads, on one object or (`None`) on all of them
    pub fn subscribe_get(
        self: &Rc<Self>,
        target: Option<&Obj>,
        callback: impl Fn(&Obj, &str) + 'static,
    ) -> Subscription {
        let id = self.next_id();
        self.gets.borrow_mut().push(Entry {
            id,
            target: target.map(Obj::downgrade),
            property: None,
            callback: Rc::new(callback),
        });
        let weak = Rc::downgrade(self);
        Subscription::new(move || {
            if let Some(registry) = Weak::upgrade(&weak) {
                registry.gets.borrow_mut().retain(|e| e.id != id);
            }
        })
    }

    /// Observe changes of one property (`Some`) or of the whole object
    pub fn subscribe_changes(
        self: &Rc<Self>,
        target: &Obj,
        property: Option<&str>,
        callback: impl Fn(&Obj, &Change) + 'static,
    ) -> Subscription {
        let id = self.next_id();
        self.changes.borrow_mut().push(Entry {
            id,
            target: Some(target.downgrade()),
            property: property.map(str::to_string),
            callback: Rc::new(callback),
        });
        let weak = Rc::downgrade(self);
        Subscription::new(move || {
            if let Some(registry) = Weak::upgrade(&weak) {
                registry.changes.borrow_mut().retain(|e| e.id != id);
            }
        })
    }

    pub fn notify_get(&self, obj: &Obj, key: &str) {
        let callbacks: Vec<GetCallback> = {
            let mut gets = self.gets.borrow_mut();
            if gets.is_empty() {
                return;
            }
            gets.retain(Entry::is_alive);
            gets.iter()
                .filter(|e| e.matches(obj, None))
                .map(|e| e.callback.clone())
                .collect()
        };
        for callback in callbacks {
            callback(obj, key);
        }
    }

    pub fn notify_change(&self, obj: &Obj, change: &Change) {
        let callbacks: Vec<ChangeCallback> = {
            let mut changes = self.changes.borrow_mut();
            if changes.is_empty() {
                return;
            }
            changes.retain(Entry::is_alive);
            changes
                .iter()
                .filter(|e| e.matches(obj, change.key()))
                .map(|e| e.callback.clone())
                .collect()
        };
        for callback in callbacks {
            callback(obj, change);
        }
    }
}
