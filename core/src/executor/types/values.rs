//! Runtime value types

use num_bigint::BigInt;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use super::object::{Object, ObjectKind};

/// Runtime value
///
/// Primitives are immutable and cheap to clone; objects are shared by
/// reference through [`Obj`].
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(Rc<BigInt>),
    String(Rc<str>),
    Object(Obj),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_object(&self) -> Option<&Obj> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.as_object().is_some_and(Obj::is_callable)
    }

    /// Result of the `typeof` operator
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Object(o) if o.is_callable() => "function",
            Value::Object(_) => "object",
        }
    }

    /// Lossy conversion for the host: functions and `undefined` become
    /// `null`, non-finite numbers become `null`, cycles are cut.
    pub fn to_json(&self) -> serde_json::Value {
        let mut seen = HashSet::new();
        to_json_inner(self, &mut seen)
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => {
                Value::Object(Obj::array(items.iter().map(Value::from_json).collect()))
            }
            serde_json::Value::Object(map) => {
                let obj = Obj::plain();
                {
                    let mut o = obj.borrow_mut();
                    for (k, v) in map {
                        o.props.insert(k, Value::from_json(v));
                    }
                }
                Value::Object(obj)
            }
        }
    }
}

fn to_json_inner(value: &Value, seen: &mut HashSet<usize>) -> serde_json::Value {
    match value {
        Value::Undefined | Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(|n| {
                // integral values print without a fraction
                if n.as_f64().is_some_and(|f| f.fract() == 0.0 && f.abs() < 9.0e15) {
                    serde_json::Value::from(n.as_f64().unwrap_or_default() as i64)
                } else {
                    serde_json::Value::Number(n)
                }
            })
            .unwrap_or(serde_json::Value::Null),
        Value::BigInt(b) => serde_json::Value::String(b.to_string()),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Object(obj) => {
            if !seen.insert(obj.addr()) {
                return serde_json::Value::Null;
            }
            let o = obj.borrow();
            let json = match &o.kind {
                ObjectKind::Array(items) => {
                    serde_json::Value::Array(items.iter().map(|v| to_json_inner(v, seen)).collect())
                }
                ObjectKind::Function(_) => serde_json::Value::Null,
                _ => {
                    let mut map = serde_json::Map::new();
                    for (k, v) in o.props.iter() {
                        map.insert(k.to_string(), to_json_inner(v, seen));
                    }
                    serde_json::Value::Object(map)
                }
            };
            seen.remove(&obj.addr());
            json
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::BigInt(b) => write!(f, "{b}n"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(o) => write!(f, "{o:?}"),
        }
    }
}

/// Strict equality (`===`): identity for objects, NaN unequal to itself
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::String(s)
    }
}

impl From<BigInt> for Value {
    fn from(b: BigInt) -> Self {
        Value::BigInt(Rc::new(b))
    }
}

impl From<Obj> for Value {
    fn from(o: Obj) -> Self {
        Value::Object(o)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Undefined, Into::into)
    }
}

/* ===================== Object Handle ===================== */

/// Shared handle to a heap object
#[derive(Clone)]
pub struct Obj(Rc<RefCell<Object>>);

/// Weak handle used by registries that must not keep targets alive
#[derive(Clone)]
pub struct WeakObj(Weak<RefCell<Object>>);

impl Obj {
    pub fn new(kind: ObjectKind) -> Self {
        Obj(Rc::new(RefCell::new(Object::new(kind))))
    }

    pub fn from_object(object: Object) -> Self {
        Obj(Rc::new(RefCell::new(object)))
    }

    pub fn plain() -> Self {
        Self::new(ObjectKind::Plain)
    }

    pub fn array(items: Vec<Value>) -> Self {
        Self::new(ObjectKind::Array(items))
    }

    /// Plain object from key/value pairs, in order
    pub fn with_props<K: AsRef<str>>(props: impl IntoIterator<Item = (K, Value)>) -> Self {
        let obj = Self::plain();
        {
            let mut o = obj.borrow_mut();
            for (k, v) in props {
                o.props.insert(k.as_ref(), v);
            }
        }
        obj
    }

    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Object> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Obj) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Identity key for registries and cycle detection
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn downgrade(&self) -> WeakObj {
        WeakObj(Rc::downgrade(&self.0))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Array(_))
    }

    /// Own property without any security or subscription handling
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.borrow().props.get(key).cloned()
    }

    pub fn set_raw(&self, key: &str, value: Value) {
        self.borrow_mut().props.insert(key, value);
    }

    /// Snapshot of array elements; empty for non-arrays
    pub fn array_items(&self) -> Vec<Value> {
        match &self.borrow().kind {
            ObjectKind::Array(items) => items.clone(),
            _ => Vec::new(),
        }
    }
}

impl WeakObj {
    pub fn upgrade(&self) -> Option<Obj> {
        self.0.upgrade().map(Obj)
    }

    pub fn is(&self, obj: &Obj) -> bool {
        std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&obj.0))
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(o) => write!(f, "[object {}]", o.kind.class_name()),
            Err(_) => write!(f, "[object]"),
        }
    }
}
