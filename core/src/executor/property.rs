//! Property access through the security gate
//!
//! Reads resolve own properties first (including the built-in own
//! properties such as `length` or `size`), then fall back to the static
//! member table of the receiver's type. Writes are refused on built-in and
//! frozen objects and reported to subscribers.

use std::rc::Rc;

use super::context::ExecContext;
use super::errors::{Exec, ExecError, SandboxError};
use super::ops::{array_index, display_value, to_number_lossy, to_string};
use super::stdlib;
use super::subscriptions::Change;
use super::types::{Obj, Object, ObjectKind, TypeTag, Value};

/// Arrays may not grow beyond this many elements
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

/* ===================== Reads ===================== */

/// Own properties the runtime derives from an object's internal state
fn builtin_own(object: &Object, key: &str) -> Option<Value> {
    match &object.kind {
        ObjectKind::Array(items) => {
            if key == "length" {
                return Some(items.len().into());
            }
            array_index(key).and_then(|i| items.get(i).cloned())
        }
        ObjectKind::Function(f) => match key {
            "name" => Some(f.name().into()),
            "length" => Some(f.arity().into()),
            _ => None,
        },
        ObjectKind::RegExp(re) => match key {
            "source" => Some(Value::String(re.source.clone())),
            "flags" => Some(Value::String(re.flags.clone())),
            "global" => Some(re.global().into()),
            "ignoreCase" => Some(re.flags.contains('i').into()),
            "multiline" => Some(re.flags.contains('m').into()),
            "sticky" => Some(re.sticky().into()),
            "lastIndex" => Some(re.last_index.into()),
            _ => None,
        },
        ObjectKind::Error(kind) if key == "name" => Some(kind.name().into()),
        ObjectKind::Map(entries) if key == "size" => Some(entries.len().into()),
        ObjectKind::Set(items) if key == "size" => Some(items.len().into()),
        _ => None,
    }
}

fn own_property(obj: &Obj, key: &str) -> Option<Value> {
    let o = obj.borrow();
    if let Some(v) = o.props.get(key) {
        return Some(v.clone());
    }
    if key == "constructor" {
        if let Some(ctor) = &o.constructor {
            return Some(ctor.clone().into());
        }
    }
    builtin_own(&o, key)
}

fn string_own(s: &str, key: &str) -> Option<Value> {
    if key == "length" {
        return Some(s.chars().count().into());
    }
    array_index(key).and_then(|i| s.chars().nth(i).map(|c| Value::string(c.to_string())))
}

/// `target[key]`
pub fn get_member(ctx: &Rc<ExecContext>, target: &Value, key: &str) -> Exec<Value> {
    match target {
        Value::Undefined | Value::Null => {
            return Err(ExecError::type_error(format!(
                "Cannot read properties of {} (reading '{key}')",
                to_string(target)
            )))
        }
        Value::Object(obj) => {
            ctx.notify_get(obj, key);
            if let Some(v) = own_property(obj, key) {
                return Ok(v);
            }
        }
        Value::String(s) => {
            if let Some(v) = string_own(s, key) {
                return Ok(v);
            }
        }
        _ => {}
    }
    inherited_member(ctx, target, key)
}

fn inherited_member(ctx: &Rc<ExecContext>, target: &Value, key: &str) -> Exec<Value> {
    let Some(tag) = TypeTag::of(target) else {
        return Ok(Value::Undefined);
    };
    let Some((declaring, member)) = stdlib::lookup_member(tag, key) else {
        return Ok(Value::Undefined);
    };
    ctx.check_member(declaring, key)?;
    if let Some(replaced) = ctx.policy().replace(declaring, target, key) {
        return Ok(replaced);
    }
    Ok(ctx.realm.member_function(declaring, member).into())
}

/// Own property check behind `hasOwnProperty`
pub fn has_own_property(target: &Value, key: &str) -> bool {
    match target {
        Value::Object(obj) => own_property(obj, key).is_some(),
        Value::String(s) => string_own(s, key).is_some(),
        _ => false,
    }
}

/// `key in target`
pub fn has_property(target: &Value, key: &str) -> Exec<bool> {
    let Value::Object(obj) = target else {
        return Err(ExecError::type_error(format!(
            "Cannot use 'in' operator to search for '{key}' in {}",
            display_value(target)
        )));
    };
    if own_property(obj, key).is_some() {
        return Ok(true);
    }
    let tag = obj.borrow().kind.type_tag();
    Ok(stdlib::lookup_member(tag, key).is_some())
}

/* ===================== Writes ===================== */

fn ensure_writable(object: &Object, key: &str) -> Exec<()> {
    if object.flags.builtin {
        return Err(SandboxError::ProtectedObject {
            what: format!("{}.{key}", object.kind.class_name()),
        }
        .into());
    }
    if object.flags.frozen {
        return Err(ExecError::type_error(format!(
            "Cannot assign to read only property '{key}' of object"
        )));
    }
    Ok(())
}

/// Refuse in-place mutation of built-in or frozen objects
pub fn ensure_mutable(obj: &Obj, method: &str) -> Exec<()> {
    ensure_writable(&obj.borrow(), method)
}

/// `target[key] = value`
pub fn set_member(ctx: &Rc<ExecContext>, target: &Value, key: &str, value: Value) -> Exec<()> {
    match target {
        Value::Object(obj) => set_property(ctx, obj, key, value),
        Value::Undefined | Value::Null => Err(ExecError::type_error(format!(
            "Cannot set properties of {} (setting '{key}')",
            to_string(target)
        ))),
        other => Err(ExecError::type_error(format!(
            "Cannot create property '{key}' on {} '{}'",
            other.type_of(),
            to_string(other)
        ))),
    }
}

pub fn set_property(ctx: &Rc<ExecContext>, obj: &Obj, key: &str, value: Value) -> Exec<()> {
    let change = {
        let mut o = obj.borrow_mut();
        ensure_writable(&o, key)?;
        let o = &mut *o;
        match &mut o.kind {
            ObjectKind::Array(items) if key == "length" => {
                let n = to_number_lossy(&value);
                if n < 0.0 || n.fract() != 0.0 || n > MAX_ARRAY_LENGTH as f64 {
                    return Err(ExecError::range_error("Invalid array length"));
                }
                let old = items.len();
                items.resize(n as usize, Value::Undefined);
                Change::Replace {
                    key: key.to_string(),
                    old: old.into(),
                    value,
                }
            }
            ObjectKind::Array(items) if array_index(key).is_some() => {
                let index = array_index(key).unwrap_or_default();
                if let Some(slot) = items.get_mut(index) {
                    let old = std::mem::replace(slot, value.clone());
                    Change::Replace {
                        key: key.to_string(),
                        old,
                        value,
                    }
                } else {
                    if index >= MAX_ARRAY_LENGTH {
                        return Err(ExecError::range_error("Invalid array length"));
                    }
                    items.resize(index, Value::Undefined);
                    items.push(value.clone());
                    Change::Create {
                        key: key.to_string(),
                        value,
                    }
                }
            }
            ObjectKind::RegExp(re) if key == "lastIndex" => {
                let old = Value::from(re.last_index);
                re.last_index = to_number_lossy(&value).max(0.0) as usize;
                Change::Replace {
                    key: key.to_string(),
                    old,
                    value,
                }
            }
            // read-only built-ins
            ObjectKind::Function(_) if matches!(key, "name" | "length") => return Ok(()),
            _ => match o.props.insert(key, value.clone()) {
                Some(old) => Change::Replace {
                    key: key.to_string(),
                    old,
                    value,
                },
                None => Change::Create {
                    key: key.to_string(),
                    value,
                },
            },
        }
    };
    ctx.notify_change(obj, &change);
    Ok(())
}

/// `delete target[key]`
pub fn delete_member(ctx: &Rc<ExecContext>, target: &Value, key: &str) -> Exec<bool> {
    let Value::Object(obj) = target else {
        if target.is_nullish() {
            return Err(ExecError::type_error(format!(
                "Cannot convert undefined or null to object (deleting '{key}')"
            )));
        }
        return Ok(true);
    };
    let change = {
        let mut o = obj.borrow_mut();
        if o.flags.builtin {
            return Err(SandboxError::ProtectedObject {
                what: format!("{}.{key}", o.kind.class_name()),
            }
            .into());
        }
        if o.flags.frozen {
            return Err(ExecError::type_error(format!(
                "Cannot delete property '{key}' of frozen object"
            )));
        }
        let o = &mut *o;
        let old = match (&mut o.kind, array_index(key)) {
            (ObjectKind::Array(items), Some(index)) if index < items.len() => {
                Some(std::mem::take(&mut items[index]))
            }
            _ => o.props.remove(key),
        };
        match old {
            Some(old) => Change::Delete {
                key: key.to_string(),
                old,
            },
            None => return Ok(true),
        }
    };
    ctx.notify_change(obj, &change);
    Ok(true)
}

/* ===================== Enumeration ===================== */

/// Own enumerable keys in order: array indices, then named properties
pub fn own_keys(obj: &Obj) -> Vec<String> {
    let o = obj.borrow();
    let mut keys = Vec::new();
    if let ObjectKind::Array(items) = &o.kind {
        keys.extend((0..items.len()).map(|i| i.to_string()));
    }
    keys.extend(o.props.keys().map(|k| k.to_string()));
    keys
}

/// Own enumerable `[key, value]` pairs
pub fn own_entries(obj: &Obj) -> Vec<(String, Value)> {
    let o = obj.borrow();
    let mut entries = Vec::new();
    if let ObjectKind::Array(items) = &o.kind {
        entries.extend(items.iter().enumerate().map(|(i, v)| (i.to_string(), v.clone())));
    }
    entries.extend(o.props.iter().map(|(k, v)| (k.to_string(), v.clone())));
    entries
}

/// Values produced by iterating `value` (`for...of`, spread, `Array.from`)
pub fn iterate_values(value: &Value) -> Exec<Vec<Value>> {
    match value {
        Value::String(s) => Ok(s.chars().map(|c| Value::string(c.to_string())).collect()),
        Value::Object(obj) => {
            let mut o = obj.borrow_mut();
            match &mut o.kind {
                ObjectKind::Array(items) => Ok(items.clone()),
                ObjectKind::Set(items) => Ok(items.clone()),
                ObjectKind::Map(entries) => Ok(entries
                    .iter()
                    .map(|(k, v)| Obj::array(vec![k.clone(), v.clone()]).into())
                    .collect()),
                ObjectKind::Iterator(state) => {
                    let rest = state.items.get(state.pos..).unwrap_or_default().to_vec();
                    state.pos = state.items.len();
                    Ok(rest)
                }
                _ => Err(not_iterable(value)),
            }
        }
        _ => Err(not_iterable(value)),
    }
}

fn not_iterable(value: &Value) -> ExecError {
    ExecError::type_error(format!("{} is not iterable", display_value(value)))
}

/// Keys visited by `for...in`
pub fn iterate_keys(value: &Value) -> Vec<Value> {
    match value {
        Value::Object(obj) => own_keys(obj).into_iter().map(Value::from).collect(),
        Value::String(s) => (0..s.chars().count()).map(|i| Value::from(i.to_string())).collect(),
        _ => Vec::new(),
    }
}
