//! `Object` constructor and the members every value inherits

use std::rc::Rc;

use super::{arg, constructor, method, Member};
use crate::executor::context::ExecContext;
use crate::executor::errors::{Exec, ExecError};
use crate::executor::ops::to_property_key;
use crate::executor::property::{
    has_own_property, iterate_keys, iterate_values, own_entries, set_property,
};
use crate::executor::types::{Brand, NativeImpl, Obj, Value};

pub static MEMBERS: &[Member] = &[
    method("hasOwnProperty", 1, has_own),
    method("toString", 0, to_string),
    method("valueOf", 0, value_of),
];

static STATICS: &[Member] = &[
    method("keys", 1, keys),
    method("values", 1, values),
    method("entries", 1, entries),
    method("assign", 2, assign),
    method("freeze", 1, freeze),
    method("isFrozen", 1, is_frozen),
    method("fromEntries", 1, from_entries),
    method("create", 1, create),
    method("getOwnPropertyNames", 1, keys),
];

pub fn constructor_object() -> Obj {
    constructor(
        "Object",
        1,
        NativeImpl::Sync(construct),
        NativeImpl::Sync(construct),
        Brand::Object,
        STATICS,
    )
}

fn construct(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(match arg(args, 0) {
        Value::Undefined | Value::Null => Obj::plain().into(),
        other => other,
    })
}

/* ===================== Instance ===================== */

fn has_own(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let key = to_property_key(&arg(args, 0));
    Ok(has_own_property(this, &key).into())
}

fn to_string(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    let class = match this {
        Value::Undefined => "Undefined",
        Value::Null => "Null",
        Value::Bool(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::BigInt(_) => "BigInt",
        Value::String(_) => "String",
        Value::Object(obj) => obj.borrow().kind.class_name(),
    };
    Ok(format!("[object {class}]").into())
}

fn value_of(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(this.clone())
}

/* ===================== Statics ===================== */

fn keys(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(Obj::array(iterate_keys(&require_object_coercible(args)?)).into())
}

fn values(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let target = require_object_coercible(args)?;
    let values = match &target {
        Value::Object(obj) => own_entries(obj).into_iter().map(|(_, v)| v).collect(),
        Value::String(_) => iterate_values(&target)?,
        _ => Vec::new(),
    };
    Ok(Obj::array(values).into())
}

fn entries(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let target = require_object_coercible(args)?;
    let pairs: Vec<(Value, Value)> = match &target {
        Value::Object(obj) => own_entries(obj)
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect(),
        Value::String(_) => iterate_keys(&target)
            .into_iter()
            .zip(iterate_values(&target)?)
            .collect(),
        _ => Vec::new(),
    };
    Ok(Obj::array(
        pairs
            .into_iter()
            .map(|(k, v)| Obj::array(vec![k, v]).into())
            .collect(),
    )
    .into())
}

fn require_object_coercible(args: &[Value]) -> Exec<Value> {
    let target = arg(args, 0);
    if target.is_nullish() {
        return Err(ExecError::type_error(
            "Cannot convert undefined or null to object",
        ));
    }
    Ok(target)
}

fn assign(ctx: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let Value::Object(target) = require_object_coercible(args)? else {
        return Ok(arg(args, 0));
    };
    for source in args.iter().skip(1) {
        if let Value::Object(source) = source {
            for (key, value) in own_entries(source) {
                set_property(ctx, &target, &key, value)?;
            }
        }
    }
    Ok(target.into())
}

fn freeze(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let target = arg(args, 0);
    if let Value::Object(obj) = &target {
        obj.borrow_mut().flags.frozen = true;
    }
    Ok(target)
}

fn is_frozen(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(match arg(args, 0) {
        Value::Object(obj) => obj.borrow().is_frozen(),
        _ => true,
    }
    .into())
}

fn from_entries(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let result = Obj::plain();
    for entry in iterate_values(&arg(args, 0))? {
        let Value::Object(pair) = &entry else {
            return Err(ExecError::type_error(
                "Iterator value is not an entry object",
            ));
        };
        let items = pair.array_items();
        let key = to_property_key(items.first().unwrap_or(&Value::Undefined));
        result.set_raw(&key, items.get(1).cloned().unwrap_or_default());
    }
    Ok(result.into())
}

/// There is no prototype chain: `create(proto)` copies the prototype's own
/// properties into the new object
fn create(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    match arg(args, 0) {
        Value::Null => Ok(Obj::plain().into()),
        Value::Object(proto) => {
            let created = Obj::plain();
            let constructor = proto.borrow().constructor.clone();
            for (key, value) in own_entries(&proto) {
                created.set_raw(&key, value);
            }
            created.borrow_mut().constructor = constructor;
            Ok(created.into())
        }
        other => Err(ExecError::type_error(format!(
            "Object prototype may only be an Object or null: {}",
            crate::executor::ops::display_value(&other)
        ))),
    }
}
