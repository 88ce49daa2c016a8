//! `JSON` namespace over `serde_json`

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::collections::HashSet;
use std::rc::Rc;

use super::date::to_iso_string;
use super::{arg, method, namespace, Member};
use crate::executor::context::ExecContext;
use crate::executor::errors::{Exec, ExecError};
use crate::executor::ops::{to_integer, to_string};
use crate::executor::property::own_entries;
use crate::executor::types::{Obj, ObjectKind, Value};

static MEMBERS: &[Member] = &[
    method("stringify", 3, stringify),
    method("parse", 2, parse),
];

pub fn namespace_object() -> Obj {
    namespace(MEMBERS)
}

/* ===================== stringify ===================== */

struct Encoder {
    /// Keys kept when an array replacer was given
    allowed: Option<HashSet<String>>,
    stack: HashSet<usize>,
}

impl Encoder {
    /// `None` for values JSON omits (`undefined`, functions)
    fn encode(&mut self, value: &Value) -> Exec<Option<serde_json::Value>> {
        Ok(Some(match value {
            Value::Undefined => return Ok(None),
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => encode_number(*n),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::BigInt(_) => {
                return Err(ExecError::type_error("Do not know how to serialize a BigInt"))
            }
            Value::Object(obj) => return self.encode_object(obj),
        }))
    }

    fn encode_object(&mut self, obj: &Obj) -> Exec<Option<serde_json::Value>> {
        let items = {
            let o = obj.borrow();
            match &o.kind {
                ObjectKind::Function(_) => return Ok(None),
                ObjectKind::Date(ms) => {
                    return Ok(Some(
                        to_iso_string(*ms).map_or(serde_json::Value::Null, serde_json::Value::String),
                    ))
                }
                ObjectKind::Array(items) => Some(items.clone()),
                _ => None,
            }
        };
        if !self.stack.insert(obj.addr()) {
            return Err(ExecError::type_error(
                "Converting circular structure to JSON",
            ));
        }
        let encoded = match items {
            Some(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in &items {
                    out.push(self.encode(item)?.unwrap_or(serde_json::Value::Null));
                }
                serde_json::Value::Array(out)
            }
            None => {
                let mut map = serde_json::Map::new();
                for (key, value) in own_entries(obj) {
                    if self.allowed.as_ref().is_some_and(|keys| !keys.contains(&key)) {
                        continue;
                    }
                    if let Some(encoded) = self.encode(&value)? {
                        map.insert(key, encoded);
                    }
                }
                serde_json::Value::Object(map)
            }
        };
        self.stack.remove(&obj.addr());
        Ok(Some(encoded))
    }
}

fn encode_number(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

fn indent_of(space: &Value) -> String {
    match space {
        Value::Number(_) => " ".repeat(to_integer(space).clamp(0.0, 10.0) as usize),
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    }
}

/// Serialize with JSON.stringify semantics; `None` when the value is omitted
pub fn stringify_value(value: &Value, replacer: &Value, space: &Value) -> Exec<Option<String>> {
    let allowed = match replacer {
        Value::Object(obj) if obj.is_array() => {
            Some(obj.array_items().iter().map(to_string).collect())
        }
        _ => None,
    };
    let mut encoder = Encoder {
        allowed,
        stack: HashSet::new(),
    };
    let Some(json) = encoder.encode(value)? else {
        return Ok(None);
    };
    let indent = indent_of(space);
    if indent.is_empty() {
        return Ok(Some(json.to_string()));
    }
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
    json.serialize(&mut serializer)
        .map_err(|e| ExecError::type_error(e.to_string()))?;
    Ok(Some(String::from_utf8_lossy(&out).into_owned()))
}

fn stringify(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(stringify_value(&arg(args, 0), &arg(args, 1), &arg(args, 2))?.into())
}

/* ===================== parse ===================== */

fn parse(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let text = to_string(&arg(args, 0));
    let json: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| ExecError::syntax_error(format!("{e} in JSON")))?;
    Ok(Value::from_json(&json))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Obj::with_props([
            ("a", Value::from(1)),
            ("b", Value::string("x")),
            ("skip", Value::Undefined),
            ("list", Obj::array(vec![Value::from(1.5), Value::Undefined]).into()),
        ])
        .into()
    }

    #[test]
    fn test_stringify_compact() {
        let out = stringify_value(&sample(), &Value::Undefined, &Value::Undefined).unwrap();
        assert_eq!(out.as_deref(), Some(r#"{"a":1,"b":"x","list":[1.5,null]}"#));
    }

    #[test]
    fn test_stringify_indent_and_replacer() {
        let replacer: Value = Obj::array(vec![Value::string("a")]).into();
        let out = stringify_value(&sample(), &replacer, &Value::from(2)).unwrap();
        assert_eq!(out.as_deref(), Some("{\n  \"a\": 1\n}"));
    }

    #[test]
    fn test_stringify_rejects_cycles() {
        let obj = Obj::plain();
        obj.set_raw("self", obj.clone().into());
        let err = stringify_value(&obj.clone().into(), &Value::Undefined, &Value::Undefined)
            .unwrap_err();
        assert!(err.to_string().contains("circular"));
        obj.borrow_mut().props.remove("self");
    }

    #[test]
    fn test_undefined_is_omitted() {
        assert_eq!(
            stringify_value(&Value::Undefined, &Value::Undefined, &Value::Undefined).unwrap(),
            None
        );
    }
}
