//! Heap object layout

use regex::Regex;
use std::collections::HashMap;
use std::rc::Rc;

use super::function::Function;
use super::promise::PromiseCell;
use super::values::{Obj, Value};
use crate::executor::errors::ErrorKind;

/* ===================== Property Map ===================== */

/// Insertion-ordered own properties
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    order: Vec<Rc<str>>,
    values: HashMap<Rc<str>, Value>,
}

impl PropertyMap {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Insert or replace; returns the previous value
    pub fn insert(&mut self, key: &str, value: Value) -> Option<Value> {
        if let Some(slot) = self.values.get_mut(key) {
            return Some(std::mem::replace(slot, value));
        }
        let key: Rc<str> = Rc::from(key);
        self.order.push(key.clone());
        self.values.insert(key, value);
        None
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let old = self.values.remove(key)?;
        self.order.retain(|k| &**k != key);
        Some(old)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Rc<str>> {
        self.order.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.order
            .iter()
            .filter_map(|k| self.values.get(k).map(|v| (k, v)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/* ===================== Objects ===================== */

#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectFlags {
    /// Part of the built-in runtime; sandboxed code may not modify it
    pub builtin: bool,
    /// `Object.freeze` was applied
    pub frozen: bool,
}

#[derive(Debug, Clone)]
pub struct RegExpData {
    pub regex: Rc<Regex>,
    pub source: Rc<str>,
    pub flags: Rc<str>,
    pub last_index: usize,
}

impl RegExpData {
    pub fn global(&self) -> bool {
        self.flags.contains('g')
    }

    pub fn sticky(&self) -> bool {
        self.flags.contains('y')
    }
}

/// Snapshot iterator used by `for...of`, spread and `keys()`/`values()`
#[derive(Debug, Clone, Default)]
pub struct IteratorState {
    pub items: Vec<Value>,
    pub pos: usize,
    pub current: Value,
}

impl IteratorState {
    pub fn new(items: Vec<Value>) -> Self {
        IteratorState {
            items,
            pos: 0,
            current: Value::Undefined,
        }
    }

    /// Advance; false once exhausted
    pub fn step(&mut self) -> bool {
        match self.items.get(self.pos) {
            Some(v) => {
                self.current = v.clone();
                self.pos += 1;
                true
            }
            None => {
                self.current = Value::Undefined;
                false
            }
        }
    }
}

pub enum ObjectKind {
    Plain,
    Array(Vec<Value>),
    Function(Function),
    Error(ErrorKind),
    RegExp(RegExpData),
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    Promise(Rc<PromiseCell>),
    /// Milliseconds since the epoch, UTC
    Date(f64),
    Iterator(IteratorState),
}

impl ObjectKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            ObjectKind::Plain => "Object",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Error(_) => "Error",
            ObjectKind::RegExp(_) => "RegExp",
            ObjectKind::Map(_) => "Map",
            ObjectKind::Set(_) => "Set",
            ObjectKind::Promise(_) => "Promise",
            ObjectKind::Date(_) => "Date",
            ObjectKind::Iterator(_) => "Iterator",
        }
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            ObjectKind::Plain => TypeTag::Object,
            ObjectKind::Array(_) => TypeTag::Array,
            ObjectKind::Function(_) => TypeTag::Function,
            ObjectKind::Error(_) => TypeTag::Error,
            ObjectKind::RegExp(_) => TypeTag::RegExp,
            ObjectKind::Map(_) => TypeTag::Map,
            ObjectKind::Set(_) => TypeTag::Set,
            ObjectKind::Promise(_) => TypeTag::Promise,
            ObjectKind::Date(_) => TypeTag::Date,
            ObjectKind::Iterator(_) => TypeTag::Iterator,
        }
    }
}

impl std::fmt::Debug for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.class_name())
    }
}

#[derive(Debug)]
pub struct Object {
    pub kind: ObjectKind,
    pub props: PropertyMap,
    pub flags: ObjectFlags,
    /// Sandbox function that constructed this object through `new`
    pub constructor: Option<Obj>,
}

impl Object {
    pub fn new(kind: ObjectKind) -> Self {
        Object {
            kind,
            props: PropertyMap::default(),
            flags: ObjectFlags::default(),
            constructor: None,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.flags.frozen || self.flags.builtin
    }
}

/* ===================== Type Tags ===================== */

/// Runtime type whose member table serves inherited property reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    Object,
    Function,
    Array,
    String,
    Number,
    Boolean,
    BigInt,
    RegExp,
    Map,
    Set,
    Promise,
    Date,
    Error,
    Iterator,
}

impl TypeTag {
    pub const ALL: [TypeTag; 14] = [
        TypeTag::Object,
        TypeTag::Function,
        TypeTag::Array,
        TypeTag::String,
        TypeTag::Number,
        TypeTag::Boolean,
        TypeTag::BigInt,
        TypeTag::RegExp,
        TypeTag::Map,
        TypeTag::Set,
        TypeTag::Promise,
        TypeTag::Date,
        TypeTag::Error,
        TypeTag::Iterator,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Object => "Object",
            TypeTag::Function => "Function",
            TypeTag::Array => "Array",
            TypeTag::String => "String",
            TypeTag::Number => "Number",
            TypeTag::Boolean => "Boolean",
            TypeTag::BigInt => "BigInt",
            TypeTag::RegExp => "RegExp",
            TypeTag::Map => "Map",
            TypeTag::Set => "Set",
            TypeTag::Promise => "Promise",
            TypeTag::Date => "Date",
            TypeTag::Error => "Error",
            TypeTag::Iterator => "Iterator",
        }
    }

    /// Case-insensitive, since configuration sources lowercase table keys
    pub fn from_name(name: &str) -> Option<TypeTag> {
        TypeTag::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    /// Tag a primitive or object is boxed to for member lookup
    pub fn of(value: &Value) -> Option<TypeTag> {
        match value {
            Value::Undefined | Value::Null => None,
            Value::Bool(_) => Some(TypeTag::Boolean),
            Value::Number(_) => Some(TypeTag::Number),
            Value::BigInt(_) => Some(TypeTag::BigInt),
            Value::String(_) => Some(TypeTag::String),
            Value::Object(o) => Some(o.borrow().kind.type_tag()),
        }
    }
}
