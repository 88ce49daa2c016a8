//! `String` constructor and string members
//!
//! Indices count characters (Unicode scalar values).

use std::cmp::Ordering;
use std::rc::Rc;

use super::regexp::{byte_to_char, compile, match_array, regex_of};
use super::{arg, async_method, constructor, method, Member};
use crate::executor::call::call;
use crate::executor::context::ExecContext;
use crate::executor::errors::{Exec, ExecError};
use crate::executor::ops::{
    check_string_length, display_value, relative_index, to_integer, to_number_lossy, to_string,
    MAX_STRING_LENGTH,
};
use crate::executor::types::{Brand, NativeImpl, NativeResult, Obj, Value};

pub static MEMBERS: &[Member] = &[
    method("charAt", 1, char_at),
    method("charCodeAt", 1, char_code_at),
    method("codePointAt", 1, char_code_at),
    method("indexOf", 1, index_of),
    method("lastIndexOf", 1, last_index_of),
    method("includes", 1, includes),
    method("startsWith", 1, starts_with),
    method("endsWith", 1, ends_with),
    method("slice", 2, slice),
    method("substring", 2, substring),
    method("substr", 2, substr),
    method("toUpperCase", 0, to_upper_case),
    method("toLowerCase", 0, to_lower_case),
    method("trim", 0, trim),
    method("trimStart", 0, trim_start),
    method("trimEnd", 0, trim_end),
    method("padStart", 2, pad_start),
    method("padEnd", 2, pad_end),
    method("repeat", 1, repeat),
    method("split", 2, split),
    async_method("replace", 2, replace),
    async_method("replaceAll", 2, replace_all),
    method("match", 1, match_member),
    method("search", 1, search),
    method("at", 1, at),
    method("concat", 1, concat),
    method("localeCompare", 1, locale_compare),
    method("toString", 0, value_of),
    method("valueOf", 0, value_of),
];

static STATICS: &[Member] = &[method("fromCharCode", 1, from_char_code)];

pub fn constructor_object() -> Obj {
    constructor(
        "String",
        1,
        NativeImpl::Sync(construct),
        NativeImpl::Sync(construct),
        Brand::Object,
        STATICS,
    )
}

fn construct(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(match args.first() {
        None => Value::string(""),
        Some(v) => to_string(v).into(),
    })
}

/* ===================== Helpers ===================== */

fn this_str(this: &Value, name: &str) -> Exec<String> {
    match this {
        Value::String(s) => Ok(s.to_string()),
        Value::Undefined | Value::Null => Err(ExecError::type_error(format!(
            "String.prototype.{name} called on null or undefined"
        ))),
        other => Ok(to_string(other)),
    }
}

fn chars(s: &str) -> Vec<char> {
    s.chars().collect()
}

fn substring_of(chars: &[char], start: usize, end: usize) -> String {
    chars[start.min(chars.len())..end.min(chars.len())].iter().collect()
}

/// Character index of `needle` in `chars` at or after `from`
fn find_from(chars: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(chars.len()));
    }
    (from..=chars.len().saturating_sub(needle.len()))
        .find(|&i| chars.get(i..i + needle.len()) == Some(needle))
}

/* ===================== Members ===================== */

fn char_at(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = chars(&this_str(this, "charAt")?);
    let i = to_integer(&arg(args, 0));
    Ok(match (i >= 0.0).then(|| s.get(i as usize)).flatten() {
        Some(c) => c.to_string().into(),
        None => Value::string(""),
    })
}

fn char_code_at(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = chars(&this_str(this, "charCodeAt")?);
    let i = to_integer(&arg(args, 0));
    Ok(match (i >= 0.0).then(|| s.get(i as usize)).flatten() {
        Some(c) => f64::from(u32::from(*c)).into(),
        None => f64::NAN.into(),
    })
}

fn index_of(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = chars(&this_str(this, "indexOf")?);
    let needle = chars(&to_string(&arg(args, 0)));
    let from = to_integer(&arg(args, 1)).max(0.0) as usize;
    Ok(find_from(&s, &needle, from).map_or(-1.0, |i| i as f64).into())
}

fn last_index_of(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = chars(&this_str(this, "lastIndexOf")?);
    let needle = chars(&to_string(&arg(args, 0)));
    if needle.len() > s.len() {
        return Ok((-1.0).into());
    }
    let found = (0..=s.len() - needle.len())
        .rev()
        .find(|&i| s[i..i + needle.len()] == needle[..]);
    Ok(found.map_or(-1.0, |i| i as f64).into())
}

fn includes(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = chars(&this_str(this, "includes")?);
    let needle = chars(&to_string(&arg(args, 0)));
    let from = to_integer(&arg(args, 1)).max(0.0) as usize;
    Ok(find_from(&s, &needle, from).is_some().into())
}

fn starts_with(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = chars(&this_str(this, "startsWith")?);
    let needle = chars(&to_string(&arg(args, 0)));
    let from = relative_index(&arg(args, 1), s.len(), 0);
    Ok(s[from..].starts_with(&needle).into())
}

fn ends_with(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = chars(&this_str(this, "endsWith")?);
    let needle = chars(&to_string(&arg(args, 0)));
    let end = match arg(args, 1) {
        Value::Undefined => s.len(),
        other => (to_integer(&other).max(0.0) as usize).min(s.len()),
    };
    Ok(s[..end].ends_with(&needle).into())
}

fn slice(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = chars(&this_str(this, "slice")?);
    let start = relative_index(&arg(args, 0), s.len(), 0);
    let end = relative_index(&arg(args, 1), s.len(), s.len()).max(start);
    Ok(substring_of(&s, start, end).into())
}

fn substring(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = chars(&this_str(this, "substring")?);
    let clamp = |v: Value, default: usize| match v {
        Value::Undefined => default,
        other => (to_integer(&other).max(0.0) as usize).min(s.len()),
    };
    let a = clamp(arg(args, 0), 0);
    let b = clamp(arg(args, 1), s.len());
    Ok(substring_of(&s, a.min(b), a.max(b)).into())
}

fn substr(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = chars(&this_str(this, "substr")?);
    let start = relative_index(&arg(args, 0), s.len(), 0);
    let count = match arg(args, 1) {
        Value::Undefined => s.len(),
        other => to_integer(&other).max(0.0) as usize,
    };
    Ok(substring_of(&s, start, start.saturating_add(count)).into())
}

fn to_upper_case(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(this_str(this, "toUpperCase")?.to_uppercase().into())
}

fn to_lower_case(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(this_str(this, "toLowerCase")?.to_lowercase().into())
}

fn trim(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(this_str(this, "trim")?.trim().into())
}

fn trim_start(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(this_str(this, "trimStart")?.trim_start().into())
}

fn trim_end(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(this_str(this, "trimEnd")?.trim_end().into())
}

fn padding(s: &str, args: &[Value]) -> Exec<String> {
    let target = to_integer(&arg(args, 0)).max(0.0);
    let fill: Vec<char> = match arg(args, 1) {
        Value::Undefined => vec![' '],
        other => chars(&to_string(&other)),
    };
    let len = s.chars().count();
    if target <= len as f64 || fill.is_empty() {
        return Ok(String::new());
    }
    if target > MAX_STRING_LENGTH as f64 {
        return Err(ExecError::range_error("Invalid string length"));
    }
    let missing = target as usize - len;
    let widest = fill.iter().map(|c| c.len_utf8()).max().unwrap_or(1);
    check_string_length(s.len() + missing * widest)?;
    Ok(fill.iter().cycle().take(missing).collect())
}

fn pad_start(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = this_str(this, "padStart")?;
    Ok(format!("{}{s}", padding(&s, args)?).into())
}

fn pad_end(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = this_str(this, "padEnd")?;
    Ok(format!("{s}{}", padding(&s, args)?).into())
}

fn repeat(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = this_str(this, "repeat")?;
    let n = to_number_lossy(&arg(args, 0));
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 || n.is_infinite() {
        return Err(ExecError::range_error(format!("Invalid count value: {n}")));
    }
    if (s.len() as f64) * n > MAX_STRING_LENGTH as f64 {
        return Err(ExecError::range_error("Invalid string length"));
    }
    Ok(s.repeat(n as usize).into())
}

fn split(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = this_str(this, "split")?;
    let limit = match arg(args, 1) {
        Value::Undefined => usize::MAX,
        other => to_number_lossy(&other).max(0.0) as usize,
    };
    let separator = arg(args, 0);
    let parts: Vec<String> = if let Some((regex, _)) = regex_of(&separator) {
        regex.split(&s).map(str::to_string).collect()
    } else {
        match separator {
            Value::Undefined => vec![s],
            sep => {
                let sep = to_string(&sep);
                if sep.is_empty() {
                    s.chars().map(String::from).collect()
                } else {
                    s.split(sep.as_str()).map(str::to_string).collect()
                }
            }
        }
    };
    Ok(Obj::array(parts.into_iter().take(limit).map(Value::from).collect()).into())
}

fn at(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = chars(&this_str(this, "at")?);
    let n = to_integer(&arg(args, 0));
    let index = if n < 0.0 { s.len() as f64 + n } else { n };
    if index < 0.0 {
        return Ok(Value::Undefined);
    }
    Ok(s.get(index as usize).map(|c| Value::from(c.to_string())).unwrap_or_default())
}

fn concat(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let mut s = this_str(this, "concat")?;
    for value in args {
        let part = to_string(value);
        check_string_length(s.len() + part.len())?;
        s.push_str(&part);
    }
    Ok(s.into())
}

fn locale_compare(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = this_str(this, "localeCompare")?;
    Ok(match s.as_str().cmp(to_string(&arg(args, 0)).as_str()) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
    .into())
}

fn value_of(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    match this {
        Value::String(_) => Ok(this.clone()),
        other => Err(ExecError::type_error(format!(
            "String.prototype.valueOf requires that 'this' be a String, not {}",
            display_value(other)
        ))),
    }
}

fn from_char_code(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let s: String = args
        .iter()
        .map(|v| {
            let code = to_number_lossy(v) as u32 & 0xFFFF;
            char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
        })
        .collect();
    Ok(s.into())
}

/* ===================== Pattern Members ===================== */

/// Regex for `match`/`search`: a `RegExp` value or a pattern string
fn pattern_regex(pattern: &Value) -> Exec<(Rc<regex::Regex>, Rc<str>)> {
    match regex_of(pattern) {
        Some(found) => Ok(found),
        None => {
            let source = match pattern {
                Value::Undefined => "(?:)".to_string(),
                other => to_string(other),
            };
            Ok((Rc::new(compile(&source, "")?), Rc::from("")))
        }
    }
}

fn match_member(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = this_str(this, "match")?;
    let (regex, flags) = pattern_regex(&arg(args, 0))?;
    if flags.contains('g') {
        let all: Vec<Value> = regex.find_iter(&s).map(|m| Value::string(m.as_str())).collect();
        return Ok(if all.is_empty() {
            Value::Null
        } else {
            Obj::array(all).into()
        });
    }
    Ok(match regex.captures(&s) {
        Some(caps) => match_array(&s, &caps, &regex),
        None => Value::Null,
    })
}

fn search(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let s = this_str(this, "search")?;
    let (regex, _) = pattern_regex(&arg(args, 0))?;
    Ok(regex
        .find(&s)
        .map_or(-1.0, |m| byte_to_char(&s, m.start()) as f64)
        .into())
}

/// One occurrence to replace, in byte offsets
struct Occurrence {
    start: usize,
    end: usize,
    groups: Vec<Value>,
}

fn occurrences(s: &str, pattern: &Value, all: bool) -> Exec<Vec<Occurrence>> {
    if let Some((regex, flags)) = regex_of(pattern) {
        let global = flags.contains('g');
        if all && !global {
            return Err(ExecError::type_error(
                "replaceAll must be called with a global RegExp",
            ));
        }
        let found = regex.captures_iter(s).take(if global { usize::MAX } else { 1 });
        return Ok(found
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some(Occurrence {
                    start: whole.start(),
                    end: whole.end(),
                    groups: caps
                        .iter()
                        .skip(1)
                        .map(|m| m.map_or(Value::Undefined, |m| Value::string(m.as_str())))
                        .collect(),
                })
            })
            .collect());
    }
    let needle = to_string(pattern);
    let at = |start: usize| Occurrence {
        start,
        end: start + needle.len(),
        groups: Vec::new(),
    };
    if !all {
        return Ok(s.find(needle.as_str()).map(at).into_iter().collect());
    }
    if needle.is_empty() {
        let mut positions: Vec<usize> = s.char_indices().map(|(i, _)| i).collect();
        positions.push(s.len());
        return Ok(positions.into_iter().map(at).collect());
    }
    Ok(s.match_indices(needle.as_str()).map(|(i, _)| at(i)).collect())
}

/// Expand `$&`, `$1`, `` $` ``, `$'` and `$$` in a replacement template
fn expand(template: &str, s: &str, found: &Occurrence) -> String {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('&') => {
                chars.next();
                out.push_str(&s[found.start..found.end]);
            }
            Some('`') => {
                chars.next();
                out.push_str(&s[..found.start]);
            }
            Some('\'') => {
                chars.next();
                out.push_str(&s[found.end..]);
            }
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                let mut index = d.to_digit(10).unwrap_or_default() as usize;
                if let Some(next) = chars.peek().and_then(|c| c.to_digit(10)) {
                    let two = index * 10 + next as usize;
                    if two >= 1 && two <= found.groups.len() {
                        chars.next();
                        index = two;
                    }
                }
                match found.groups.get(index.wrapping_sub(1)) {
                    Some(group) if index >= 1 => {
                        if !group.is_undefined() {
                            out.push_str(&to_string(group));
                        }
                    }
                    _ => {
                        out.push('$');
                        out.push(d);
                    }
                }
            }
            _ => out.push('$'),
        }
    }
    out
}

async fn replace_impl(ctx: &Rc<ExecContext>, this: &Value, args: &[Value], all: bool) -> Exec<Value> {
    let name = if all { "replaceAll" } else { "replace" };
    let s = this_str(this, name)?;
    let found = occurrences(&s, &arg(args, 0), all)?;
    let replacement = arg(args, 1);
    let template = (!replacement.is_callable()).then(|| to_string(&replacement));

    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for occurrence in &found {
        out.push_str(&s[last..occurrence.start]);
        let text = match &template {
            Some(template) => expand(template, &s, occurrence),
            None => {
                let mut call_args = vec![Value::string(&s[occurrence.start..occurrence.end])];
                call_args.extend(occurrence.groups.iter().cloned());
                call_args.push(byte_to_char(&s, occurrence.start).into());
                call_args.push(Value::string(&s));
                let result = call(ctx.clone(), replacement.clone(), Value::Undefined, call_args).await?;
                to_string(&result)
            }
        };
        out.push_str(&text);
        last = occurrence.end;
    }
    out.push_str(&s[last..]);
    Ok(out.into())
}

fn replace(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move { replace_impl(&ctx, &this, &args, false).await })
}

fn replace_all(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move { replace_impl(&ctx, &this, &args, true).await })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrence(s: &str, needle: &str) -> Occurrence {
        let start = s.find(needle).unwrap();
        Occurrence {
            start,
            end: start + needle.len(),
            groups: vec![Value::string("x")],
        }
    }

    #[test]
    fn test_expand_replacement_patterns() {
        let s = "abxcd";
        let found = occurrence(s, "x");
        assert_eq!(expand("[$&]", s, &found), "[x]");
        assert_eq!(expand("$`|$'", s, &found), "ab|cd");
        assert_eq!(expand("$1$$", s, &found), "x$");
        assert_eq!(expand("$2", s, &found), "$2");
    }

    #[test]
    fn test_find_from_counts_characters() {
        let s = chars("héllo");
        assert_eq!(find_from(&s, &chars("llo"), 0), Some(2));
        assert_eq!(find_from(&s, &chars(""), 9), Some(5));
        assert_eq!(find_from(&s, &chars("z"), 0), None);
    }

    #[test]
    fn test_empty_needle_replace_all_hits_every_boundary() {
        let found = occurrences("ab", &Value::string(""), true).unwrap();
        let starts: Vec<usize> = found.iter().map(|o| o.start).collect();
        assert_eq!(starts, vec![0, 1, 2]);
    }
}
