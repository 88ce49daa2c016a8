//! `Map`, `Set` and the snapshot iterators they hand out

use std::rc::Rc;

use super::{arg, async_method, callable_arg, constructor, method, this_object, Member};
use crate::executor::call::call;
use crate::executor::context::ExecContext;
use crate::executor::errors::{Exec, ExecError};
use crate::executor::expressions::iterator_object;
use crate::executor::ops::same_value_zero;
use crate::executor::property::{ensure_mutable, iterate_values};
use crate::executor::types::{Brand, NativeImpl, NativeResult, Obj, ObjectKind, TypeTag, Value};

/* ===================== Map ===================== */

pub static MAP_MEMBERS: &[Member] = &[
    method("get", 1, map_get),
    method("set", 2, map_set),
    method("has", 1, map_has),
    method("delete", 1, map_delete),
    method("clear", 0, map_clear),
    async_method("forEach", 1, map_for_each),
    method("keys", 0, map_keys),
    method("values", 0, map_values),
    method("entries", 0, map_entries),
];

pub fn map_constructor() -> Obj {
    constructor(
        "Map",
        0,
        NativeImpl::Sync(requires_new),
        NativeImpl::Sync(construct_map),
        Brand::Map,
        &[],
    )
}

fn requires_new(_: &Rc<ExecContext>, _: &Value, _: &[Value]) -> Exec<Value> {
    Err(ExecError::type_error("Constructor requires 'new'"))
}

fn construct_map(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let mut entries: Vec<(Value, Value)> = Vec::new();
    let source = arg(args, 0);
    if !source.is_nullish() {
        for entry in iterate_values(&source)? {
            let Value::Object(pair) = &entry else {
                return Err(ExecError::type_error(
                    "Iterator value is not an entry object",
                ));
            };
            let items = pair.array_items();
            let key = items.first().cloned().unwrap_or_default();
            let value = items.get(1).cloned().unwrap_or_default();
            upsert(&mut entries, key, value);
        }
    }
    Ok(Obj::new(ObjectKind::Map(entries)).into())
}

fn upsert(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) {
    match entries.iter_mut().find(|(k, _)| same_value_zero(k, &key)) {
        Some(slot) => slot.1 = value,
        None => entries.push((key, value)),
    }
}

fn with_map<R>(this: &Value, name: &str, f: impl FnOnce(&mut Vec<(Value, Value)>) -> R) -> Exec<R> {
    let obj = this_object(this, TypeTag::Map, name)?;
    let mut o = obj.borrow_mut();
    match &mut o.kind {
        ObjectKind::Map(entries) => Ok(f(entries)),
        _ => Err(ExecError::type_error("Map expected")),
    }
}

fn map_get(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let key = arg(args, 0);
    with_map(this, "get", |entries| {
        entries
            .iter()
            .find(|(k, _)| same_value_zero(k, &key))
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    })
}

fn map_set(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    ensure_mutable(this_object(this, TypeTag::Map, "set")?, "set")?;
    with_map(this, "set", |entries| upsert(entries, arg(args, 0), arg(args, 1)))?;
    Ok(this.clone())
}

fn map_has(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let key = arg(args, 0);
    Ok(with_map(this, "has", |entries| entries.iter().any(|(k, _)| same_value_zero(k, &key)))?.into())
}

fn map_delete(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    ensure_mutable(this_object(this, TypeTag::Map, "delete")?, "delete")?;
    let key = arg(args, 0);
    Ok(with_map(this, "delete", |entries| {
        let before = entries.len();
        entries.retain(|(k, _)| !same_value_zero(k, &key));
        entries.len() != before
    })?
    .into())
}

fn map_clear(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    ensure_mutable(this_object(this, TypeTag::Map, "clear")?, "clear")?;
    with_map(this, "clear", Vec::clear)?;
    Ok(Value::Undefined)
}

fn map_keys(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    let keys = with_map(this, "keys", |entries| entries.iter().map(|(k, _)| k.clone()).collect())?;
    Ok(iterator_object(keys))
}

fn map_values(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    let values = with_map(this, "values", |entries| entries.iter().map(|(_, v)| v.clone()).collect())?;
    Ok(iterator_object(values))
}

fn map_entries(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(iterator_object(iterate_values(this)?))
}

fn map_for_each(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let f = callable_arg(&args, 0)?;
        let entries = with_map(&this, "forEach", |entries| entries.clone())?;
        for (key, value) in entries {
            call(ctx.clone(), f.clone(), arg(&args, 1), vec![value, key, this.clone()]).await?;
        }
        Ok(Value::Undefined)
    })
}

/* ===================== Set ===================== */

pub static SET_MEMBERS: &[Member] = &[
    method("add", 1, set_add),
    method("has", 1, set_has),
    method("delete", 1, set_delete),
    method("clear", 0, set_clear),
    async_method("forEach", 1, set_for_each),
    method("keys", 0, set_values),
    method("values", 0, set_values),
    method("entries", 0, set_entries),
];

pub fn set_constructor() -> Obj {
    constructor(
        "Set",
        0,
        NativeImpl::Sync(requires_new),
        NativeImpl::Sync(construct_set),
        Brand::Set,
        &[],
    )
}

fn construct_set(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let mut items: Vec<Value> = Vec::new();
    let source = arg(args, 0);
    if !source.is_nullish() {
        for item in iterate_values(&source)? {
            insert(&mut items, item);
        }
    }
    Ok(Obj::new(ObjectKind::Set(items)).into())
}

fn insert(items: &mut Vec<Value>, value: Value) {
    if !items.iter().any(|v| same_value_zero(v, &value)) {
        items.push(value);
    }
}

fn with_set<R>(this: &Value, name: &str, f: impl FnOnce(&mut Vec<Value>) -> R) -> Exec<R> {
    let obj = this_object(this, TypeTag::Set, name)?;
    let mut o = obj.borrow_mut();
    match &mut o.kind {
        ObjectKind::Set(items) => Ok(f(items)),
        _ => Err(ExecError::type_error("Set expected")),
    }
}

fn set_add(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    ensure_mutable(this_object(this, TypeTag::Set, "add")?, "add")?;
    with_set(this, "add", |items| insert(items, arg(args, 0)))?;
    Ok(this.clone())
}

fn set_has(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let value = arg(args, 0);
    Ok(with_set(this, "has", |items| items.iter().any(|v| same_value_zero(v, &value)))?.into())
}

fn set_delete(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    ensure_mutable(this_object(this, TypeTag::Set, "delete")?, "delete")?;
    let value = arg(args, 0);
    Ok(with_set(this, "delete", |items| {
        let before = items.len();
        items.retain(|v| !same_value_zero(v, &value));
        items.len() != before
    })?
    .into())
}

fn set_clear(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    ensure_mutable(this_object(this, TypeTag::Set, "clear")?, "clear")?;
    with_set(this, "clear", Vec::clear)?;
    Ok(Value::Undefined)
}

fn set_values(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(iterator_object(with_set(this, "values", |items| items.clone())?))
}

fn set_entries(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    let pairs = with_set(this, "entries", |items| {
        items
            .iter()
            .map(|v| Obj::array(vec![v.clone(), v.clone()]).into())
            .collect()
    })?;
    Ok(iterator_object(pairs))
}

fn set_for_each(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let f = callable_arg(&args, 0)?;
        let items = with_set(&this, "forEach", |items| items.clone())?;
        for item in items {
            call(ctx.clone(), f.clone(), arg(&args, 1), vec![item.clone(), item, this.clone()]).await?;
        }
        Ok(Value::Undefined)
    })
}

/* ===================== Iterators ===================== */

pub static ITERATOR_MEMBERS: &[Member] = &[method("next", 0, iterator_next)];

/// `{ value, done }` step of a snapshot iterator
fn iterator_next(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    let obj = this_object(this, TypeTag::Iterator, "next")?;
    let mut o = obj.borrow_mut();
    let ObjectKind::Iterator(state) = &mut o.kind else {
        return Err(ExecError::type_error("Iterator expected"));
    };
    let done = !state.step();
    Ok(Obj::with_props([("value", state.current.clone()), ("done", done.into())]).into())
}
