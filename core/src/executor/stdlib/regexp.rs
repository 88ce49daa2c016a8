//! `RegExp` on top of the `regex` crate
//!
//! Patterns go through the regex engine's own syntax, which covers the
//! common subset; lookaround and backreferences are rejected as syntax
//! errors. `lastIndex` counts characters, like every other string index in
//! the runtime.

use regex::{Captures, Regex, RegexBuilder};
use std::rc::Rc;

use super::{arg, constructor, method, this_object, Member};
use crate::executor::context::ExecContext;
use crate::executor::errors::{Exec, ExecError};
use crate::executor::ops::to_string;
use crate::executor::types::{Brand, NativeImpl, Obj, ObjectKind, RegExpData, TypeTag, Value};

pub static MEMBERS: &[Member] = &[
    method("test", 1, test),
    method("exec", 1, exec),
    method("toString", 0, to_string_member),
];

const FLAGS: &str = "dgimsuy";

pub fn constructor_object() -> Obj {
    constructor(
        "RegExp",
        2,
        NativeImpl::Sync(construct),
        NativeImpl::Sync(construct),
        Brand::RegExp,
        &[],
    )
}

fn construct(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let flags = match arg(args, 1) {
        Value::Undefined => None,
        other => Some(to_string(&other)),
    };
    let pattern = arg(args, 0);
    if let Some(obj) = pattern.as_object() {
        if let ObjectKind::RegExp(re) = &obj.borrow().kind {
            return create(&re.source, &flags.unwrap_or_else(|| re.flags.to_string()));
        }
    }
    let source = match pattern {
        Value::Undefined => "(?:)".to_string(),
        other => to_string(&other),
    };
    create(&source, &flags.unwrap_or_default())
}

/* ===================== Compilation ===================== */

/// Compile `pattern` with JS-style `flags` into the regex engine
pub fn compile(pattern: &str, flags: &str) -> Exec<Regex> {
    for (i, flag) in flags.char_indices() {
        if !FLAGS.contains(flag) || flags[..i].contains(flag) {
            return Err(ExecError::syntax_error(format!(
                "Invalid regular expression flags '{flags}'"
            )));
        }
    }
    RegexBuilder::new(&translate(pattern))
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|e| {
            ExecError::syntax_error(format!(
                "Invalid regular expression: /{pattern}/: {}",
                e.to_string().lines().last().unwrap_or("invalid pattern")
            ))
        })
}

/// Rewrite the escapes the two syntaxes spell differently
fn translate(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('/') => out.push('/'),
            Some('d') => out.push_str("[0-9]"),
            Some('D') => out.push_str("[^0-9]"),
            Some('u') if chars.peek() == Some(&'{') => out.push_str("\\x"),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                out.push_str(&format!("\\x{{{hex}}}"));
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Fresh `RegExp` object
pub fn create(pattern: &str, flags: &str) -> Exec<Value> {
    let regex = compile(pattern, flags)?;
    let mut sorted: Vec<char> = flags.chars().collect();
    sorted.sort_unstable();
    Ok(Obj::new(ObjectKind::RegExp(RegExpData {
        regex: Rc::new(regex),
        source: Rc::from(pattern),
        flags: Rc::from(sorted.into_iter().collect::<String>()),
        last_index: 0,
    }))
    .into())
}

/// Compiled regex and flags of a `RegExp` value
pub fn regex_of(value: &Value) -> Option<(Rc<Regex>, Rc<str>)> {
    let Value::Object(obj) = value else {
        return None;
    };
    match &obj.borrow().kind {
        ObjectKind::RegExp(re) => Some((re.regex.clone(), re.flags.clone())),
        _ => None,
    }
}

/* ===================== Index Conversion ===================== */

pub fn char_to_byte(s: &str, index: usize) -> usize {
    s.char_indices().nth(index).map_or(s.len(), |(b, _)| b)
}

pub fn byte_to_char(s: &str, index: usize) -> usize {
    s[..index].chars().count()
}

/* ===================== Matching ===================== */

/// Match array as returned by `exec` and non-global `match`
pub fn match_array(input: &str, caps: &Captures<'_>, regex: &Regex) -> Value {
    let items: Vec<Value> = caps
        .iter()
        .map(|m| m.map_or(Value::Undefined, |m| Value::string(m.as_str())))
        .collect();
    let whole = caps.get(0).map_or(0, |m| m.start());
    let result = Obj::array(items);
    result.set_raw("index", byte_to_char(input, whole).into());
    result.set_raw("input", input.into());
    let named: Vec<(&str, Value)> = regex
        .capture_names()
        .flatten()
        .map(|name| {
            let value = caps
                .name(name)
                .map_or(Value::Undefined, |m| Value::string(m.as_str()));
            (name, value)
        })
        .collect();
    let groups = if named.is_empty() {
        Value::Undefined
    } else {
        Obj::with_props(named).into()
    };
    result.set_raw("groups", groups);
    result.into()
}

/// `exec` honouring `lastIndex` for global and sticky expressions
fn exec_at(this: &Value, input: &str) -> Exec<Value> {
    let obj = this_object(this, TypeTag::RegExp, "exec")?;
    let mut o = obj.borrow_mut();
    let ObjectKind::RegExp(re) = &mut o.kind else {
        return Ok(Value::Null);
    };
    let tracks_index = re.global() || re.sticky();
    let start = if tracks_index { re.last_index } else { 0 };
    if start > input.chars().count() {
        re.last_index = 0;
        return Ok(Value::Null);
    }
    let byte_start = char_to_byte(input, start);
    let found = re
        .regex
        .captures_at(input, byte_start)
        .filter(|caps| !re.sticky() || caps.get(0).is_some_and(|m| m.start() == byte_start));
    match found {
        Some(caps) => {
            if tracks_index {
                let end = caps.get(0).map_or(byte_start, |m| m.end());
                re.last_index = byte_to_char(input, end);
            }
            Ok(match_array(input, &caps, &re.regex))
        }
        None => {
            if tracks_index {
                re.last_index = 0;
            }
            Ok(Value::Null)
        }
    }
}

fn exec(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    exec_at(this, &to_string(&arg(args, 0)))
}

fn test(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    Ok((!matches!(exec_at(this, &to_string(&arg(args, 0)))?, Value::Null)).into())
}

fn to_string_member(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    let obj = this_object(this, TypeTag::RegExp, "toString")?;
    Ok(to_string(&obj.clone().into()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_honours_flags() {
        let re = compile("ab+c", "i").unwrap();
        assert!(re.is_match("xABBC"));
        assert!(compile("a", "gg").is_err());
        assert!(compile("a", "q").is_err());
    }

    #[test]
    fn test_digit_class_is_ascii() {
        let re = compile(r"^\d+$", "").unwrap();
        assert!(re.is_match("123"));
        assert!(!re.is_match("١٢٣"));
    }

    #[test]
    fn test_unsupported_syntax_is_a_syntax_error() {
        let err = compile("(?=a)", "").unwrap_err();
        assert!(err.to_string().contains("Invalid regular expression"));
    }

    #[test]
    fn test_flags_are_normalised() {
        let Value::Object(obj) = create("x", "mg").unwrap() else {
            panic!("expected object");
        };
        match &obj.borrow().kind {
            ObjectKind::RegExp(re) => assert_eq!(&*re.flags, "gm"),
            _ => panic!("expected regexp"),
        };
    }
}
