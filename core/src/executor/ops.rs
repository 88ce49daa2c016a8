//! Value conversions and operator semantics
//!
//! Coercions never call back into sandboxed code: objects convert through
//! their built-in representation only.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use std::collections::HashSet;
use std::rc::Rc;

use super::errors::{Exec, ExecError};
use super::stdlib::date;
use super::types::{Function, ObjectKind, Value};
use crate::parser::ast::BinaryOp;

/* ===================== Primitive Conversions ===================== */

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::BigInt(b) => !b.is_zero(),
        Value::String(s) => !s.is_empty(),
        Value::Object(_) => true,
    }
}

/// Shortest round-trip decimal rendering with the usual exponent rules
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n == 0.0 {
        return "0".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if n < 0.0 {
        return format!("-{}", number_to_string(-n));
    }

    // `{:e}` yields the shortest digits: "1.2345e3"
    let formatted = format!("{n:e}");
    let (mantissa, exponent) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let k = digits.len() as i32;
    let point = exponent + 1;

    if k <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat((-point) as usize))
    } else {
        let sign = if point - 1 < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{first}e{sign}{}", (point - 1).abs())
        } else {
            format!("{first}.{rest}e{sign}{}", (point - 1).abs())
        }
    }
}

pub fn number_to_radix_string(n: f64, radix: u32) -> String {
    if radix == 10 || !n.is_finite() {
        return number_to_string(n);
    }
    let negative = n < 0.0;
    let n = n.abs();
    let mut int = n.trunc();
    let mut frac = n - int;

    let mut int_digits = Vec::new();
    loop {
        let d = (int % f64::from(radix)) as u32;
        int_digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
        int = (int / f64::from(radix)).trunc();
        if int < 1.0 {
            break;
        }
    }
    let mut out: String = int_digits.into_iter().rev().collect();
    if frac > 0.0 {
        out.push('.');
        for _ in 0..52 {
            frac *= f64::from(radix);
            let d = frac.trunc() as u32;
            out.push(std::char::from_digit(d, radix).unwrap_or('0'));
            frac -= f64::from(d);
            if frac <= 0.0 {
                break;
            }
        }
    }
    if negative {
        format!("-{out}")
    } else {
        out
    }
}

/// String to number conversion used by `+"42"`, `Number(...)` and comparisons
pub fn string_to_number(s: &str) -> f64 {
    let s = s.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = s.strip_prefix(prefix) {
            if digits.is_empty() {
                return f64::NAN;
            }
            return digits.chars().try_fold(0f64, |acc, c| {
                c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
            })
            .unwrap_or(f64::NAN);
        }
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// BigInt literal digits, with an optional radix prefix
pub fn parse_bigint_literal(digits: &str) -> Option<BigInt> {
    let (digits, radix) = match digits.get(..2) {
        Some("0x" | "0X") => (&digits[2..], 16),
        Some("0o" | "0O") => (&digits[2..], 8),
        Some("0b" | "0B") => (&digits[2..], 2),
        _ => (digits, 10),
    };
    BigInt::parse_bytes(digits.as_bytes(), radix)
}

pub enum Numeric {
    Number(f64),
    BigInt(Rc<BigInt>),
}

pub fn to_numeric(value: &Value) -> Numeric {
    match value {
        Value::BigInt(b) => Numeric::BigInt(b.clone()),
        other => Numeric::Number(to_number_lossy(other)),
    }
}

/// Numeric conversion that rejects BigInt like unary `+` does
pub fn to_number(value: &Value) -> Exec<f64> {
    match value {
        Value::BigInt(_) => Err(ExecError::type_error(
            "Cannot convert a BigInt value to a number",
        )),
        other => Ok(to_number_lossy(other)),
    }
}

pub fn to_number_lossy(value: &Value) -> f64 {
    match value {
        Value::Undefined => f64::NAN,
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => *n,
        Value::BigInt(b) => b.to_f64().unwrap_or(f64::NAN),
        Value::String(s) => string_to_number(s),
        Value::Object(obj) => match &obj.borrow().kind {
            ObjectKind::Date(ms) => *ms,
            _ => string_to_number(&to_string(value)),
        },
    }
}

/// ToIntegerOrInfinity
pub fn to_integer(value: &Value) -> f64 {
    let n = to_number_lossy(value);
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

/// Relative index argument (`slice(-2)`), clamped to `0..=len`
pub fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    let n = to_integer(value);
    let len_f = len as f64;
    if n < 0.0 {
        (len_f + n).max(0.0) as usize
    } else {
        n.min(len_f) as usize
    }
}

/* ===================== String Conversion ===================== */

pub fn to_string(value: &Value) -> String {
    let mut seen = HashSet::new();
    to_string_inner(value, &mut seen)
}

fn to_string_inner(value: &Value, seen: &mut HashSet<usize>) -> String {
    match value {
        Value::Undefined => "undefined".into(),
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_string(*n),
        Value::BigInt(b) => b.to_string(),
        Value::String(s) => s.to_string(),
        Value::Object(obj) => {
            if !seen.insert(obj.addr()) {
                return String::new();
            }
            let o = obj.borrow();
            let out = match &o.kind {
                ObjectKind::Array(items) => items
                    .iter()
                    .map(|v| {
                        if v.is_nullish() {
                            String::new()
                        } else {
                            to_string_inner(v, seen)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(","),
                ObjectKind::Function(f) => match f {
                    Function::Closure(c) => format!("function {}() {{ [sandboxed code] }}", c.name()),
                    _ => format!("function {}() {{ [native code] }}", f.name()),
                },
                ObjectKind::Error(kind) => {
                    let name = o
                        .props
                        .get("name")
                        .map(|v| to_string_inner(v, seen))
                        .unwrap_or_else(|| kind.name().to_string());
                    let message = o
                        .props
                        .get("message")
                        .map(|v| to_string_inner(v, seen))
                        .unwrap_or_default();
                    if message.is_empty() {
                        name
                    } else {
                        format!("{name}: {message}")
                    }
                }
                ObjectKind::RegExp(re) => format!("/{}/{}", re.source, re.flags),
                ObjectKind::Date(ms) => date::to_display_string(*ms),
                kind => format!("[object {}]", kind.class_name()),
            };
            drop(o);
            seen.remove(&obj.addr());
            out
        }
    }
}

pub fn to_property_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        other => to_string(other),
    }
}

/// Array index encoded by a property key (`"3"`), canonical form only
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

fn to_primitive(value: &Value, prefer_number: bool) -> Value {
    match value {
        Value::Object(obj) => {
            if let ObjectKind::Date(ms) = obj.borrow().kind {
                if prefer_number {
                    return Value::Number(ms);
                }
            }
            Value::string(to_string(value))
        }
        other => other.clone(),
    }
}

/* ===================== Equality ===================== */

/// `==`
pub fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
        (Value::Object(_), _) => loose_equals(&to_primitive(a, false), b),
        (_, Value::Object(_)) => loose_equals(a, &to_primitive(b, false)),
        (Value::BigInt(x), Value::BigInt(y)) => x == y,
        (Value::BigInt(x), Value::String(s)) | (Value::String(s), Value::BigInt(x)) => {
            BigInt::parse_bytes(s.trim().as_bytes(), 10).is_some_and(|y| **x == y)
        }
        (Value::BigInt(x), other) | (other, Value::BigInt(x)) => {
            x.to_f64() == Some(to_number_lossy(other))
        }
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => to_number_lossy(a) == to_number_lossy(b),
    }
}

/// SameValueZero, used by `includes`, `Map` and `Set`
pub fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        _ => a == b,
    }
}

/* ===================== Operators ===================== */

fn bigint_mix_error() -> ExecError {
    ExecError::type_error("Cannot mix BigInt and other types, use explicit conversions")
}

/// Arithmetic, comparison and bitwise operators; `in`/`instanceof` live in the evaluator
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Exec<Value> {
    use BinaryOp::*;
    Ok(match op {
        StrictEq => Value::Bool(left == right),
        StrictNotEq => Value::Bool(left != right),
        Eq => Value::Bool(loose_equals(left, right)),
        NotEq => Value::Bool(!loose_equals(left, right)),
        Add => add(left, right)?,
        Lt => Value::Bool(compare(left, right) == Some(true)),
        Gt => Value::Bool(compare(right, left) == Some(true)),
        LtE => Value::Bool(compare(right, left) == Some(false)),
        GtE => Value::Bool(compare(left, right) == Some(false)),
        In | InstanceOf => {
            return Err(ExecError::syntax_error("Operator requires evaluator context"))
        }
        _ => numeric_op(op, left, right)?,
    })
}

/// Longest string, in bytes, any operation may produce
pub const MAX_STRING_LENGTH: usize = 1 << 29;

pub fn check_string_length(len: usize) -> Exec<()> {
    if len > MAX_STRING_LENGTH {
        return Err(ExecError::range_error("Invalid string length"));
    }
    Ok(())
}

fn add(left: &Value, right: &Value) -> Exec<Value> {
    let l = to_primitive(left, false);
    let r = to_primitive(right, false);
    if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
        let mut s = to_string(&l);
        let tail = to_string(&r);
        check_string_length(s.len() + tail.len())?;
        s.push_str(&tail);
        return Ok(Value::from(s));
    }
    match (to_numeric(&l), to_numeric(&r)) {
        (Numeric::Number(a), Numeric::Number(b)) => Ok(Value::Number(a + b)),
        (Numeric::BigInt(a), Numeric::BigInt(b)) => Ok(Value::from(&*a + &*b)),
        _ => Err(bigint_mix_error()),
    }
}

/// Abstract relational comparison `a < b`; `None` when either side is NaN
fn compare(a: &Value, b: &Value) -> Option<bool> {
    let a = to_primitive(a, true);
    let b = to_primitive(b, true);
    if let (Value::String(x), Value::String(y)) = (&a, &b) {
        return Some(x < y);
    }
    match (to_numeric(&a), to_numeric(&b)) {
        (Numeric::BigInt(x), Numeric::BigInt(y)) => Some(x < y),
        (Numeric::BigInt(x), Numeric::Number(y)) => {
            if y.is_nan() {
                None
            } else {
                x.to_f64().map(|x| x < y)
            }
        }
        (Numeric::Number(x), Numeric::BigInt(y)) => {
            if x.is_nan() {
                None
            } else {
                y.to_f64().map(|y| x < y)
            }
        }
        (Numeric::Number(x), Numeric::Number(y)) => {
            if x.is_nan() || y.is_nan() {
                None
            } else {
                Some(x < y)
            }
        }
    }
}

pub fn exponent(base: f64, exp: f64) -> f64 {
    if exp.is_nan() || (base.abs() == 1.0 && exp.is_infinite()) {
        f64::NAN
    } else {
        base.powf(exp)
    }
}

fn numeric_op(op: BinaryOp, left: &Value, right: &Value) -> Exec<Value> {
    use BinaryOp::*;
    match (to_numeric(left), to_numeric(right)) {
        (Numeric::Number(a), Numeric::Number(b)) => Ok(Value::Number(match op {
            Sub => a - b,
            Mul => a * b,
            Div => a / b,
            Rem => a % b,
            Exp => exponent(a, b),
            BitAnd => f64::from(to_int32(a) & to_int32(b)),
            BitOr => f64::from(to_int32(a) | to_int32(b)),
            BitXor => f64::from(to_int32(a) ^ to_int32(b)),
            Shl => f64::from(to_int32(a).wrapping_shl(to_uint32(b) & 31)),
            Shr => f64::from(to_int32(a) >> (to_uint32(b) & 31)),
            UShr => f64::from(to_uint32(a) >> (to_uint32(b) & 31)),
            _ => f64::NAN,
        })),
        (Numeric::BigInt(a), Numeric::BigInt(b)) => bigint_op(op, &a, &b),
        _ => Err(bigint_mix_error()),
    }
}

fn bigint_op(op: BinaryOp, a: &BigInt, b: &BigInt) -> Exec<Value> {
    use BinaryOp::*;
    let shift = |n: &BigInt| {
        n.to_usize()
            .ok_or_else(|| ExecError::range_error("Maximum BigInt size exceeded"))
    };
    let result = match op {
        Sub => a - b,
        Mul => a * b,
        Div | Rem if b.is_zero() => return Err(ExecError::range_error("Division by zero")),
        Div => a / b,
        Rem => a % b,
        Exp => {
            if b.is_negative() {
                return Err(ExecError::range_error("Exponent must be non-negative"));
            }
            let exp = b
                .to_u32()
                .ok_or_else(|| ExecError::range_error("Maximum BigInt size exceeded"))?;
            num_traits::pow::Pow::pow(a, exp)
        }
        BitAnd => a & b,
        BitOr => a | b,
        BitXor => a ^ b,
        Shl if b.is_negative() => a >> shift(&-b)?,
        Shl => a << shift(b)?,
        Shr if b.is_negative() => a << shift(&-b)?,
        Shr => a >> shift(b)?,
        UShr => {
            return Err(ExecError::type_error(
                "BigInts have no unsigned right shift, use >> instead",
            ))
        }
        _ => return Err(bigint_mix_error()),
    };
    Ok(Value::from(result))
}

/* ===================== Display ===================== */

/// Human-readable rendering for console output and uncaught errors
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        other => inspect(other, 0, &mut HashSet::new()),
    }
}

fn inspect(value: &Value, depth: usize, seen: &mut HashSet<usize>) -> String {
    let obj = match value {
        Value::String(s) if depth > 0 => return format!("'{s}'"),
        Value::BigInt(b) => return format!("{b}n"),
        Value::Object(obj) => obj,
        other => return to_string(other),
    };
    if seen.contains(&obj.addr()) {
        return "[Circular]".into();
    }
    let o = obj.borrow();
    match &o.kind {
        ObjectKind::Function(f) => {
            let name = f.name();
            if name.is_empty() {
                "[Function (anonymous)]".into()
            } else {
                format!("[Function: {name}]")
            }
        }
        ObjectKind::Error(_) => {
            drop(o);
            to_string(value)
        }
        ObjectKind::RegExp(re) => format!("/{}/{}", re.source, re.flags),
        ObjectKind::Date(ms) => date::to_iso_string(*ms).unwrap_or_else(|| "Invalid Date".into()),
        ObjectKind::Promise(cell) => {
            let state = match cell.state() {
                super::types::PromiseState::Pending => "<pending>".to_string(),
                super::types::PromiseState::Fulfilled(v) => inspect(&v, depth + 1, seen),
                super::types::PromiseState::Rejected(v) => {
                    format!("<rejected> {}", inspect(&v, depth + 1, seen))
                }
            };
            format!("Promise {{ {state} }}")
        }
        ObjectKind::Array(items) if depth > 2 => {
            if items.is_empty() {
                "[]".into()
            } else {
                "[Array]".into()
            }
        }
        ObjectKind::Array(items) => {
            let items = items.clone();
            drop(o);
            seen.insert(obj.addr());
            let parts: Vec<String> = items.iter().map(|v| inspect(v, depth + 1, seen)).collect();
            seen.remove(&obj.addr());
            if parts.is_empty() {
                "[]".into()
            } else {
                format!("[ {} ]", parts.join(", "))
            }
        }
        ObjectKind::Map(entries) => {
            let entries = entries.clone();
            drop(o);
            seen.insert(obj.addr());
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{} => {}", inspect(k, depth + 1, seen), inspect(v, depth + 1, seen)))
                .collect();
            seen.remove(&obj.addr());
            format!("Map({}) {{{}}}", parts.len(), spaced(&parts))
        }
        ObjectKind::Set(items) => {
            let items = items.clone();
            drop(o);
            seen.insert(obj.addr());
            let parts: Vec<String> = items.iter().map(|v| inspect(v, depth + 1, seen)).collect();
            seen.remove(&obj.addr());
            format!("Set({}) {{{}}}", parts.len(), spaced(&parts))
        }
        _ if depth > 2 => "[Object]".into(),
        _ => {
            let props: Vec<(Rc<str>, Value)> =
                o.props.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            drop(o);
            seen.insert(obj.addr());
            let parts: Vec<String> = props
                .iter()
                .map(|(k, v)| format!("{k}: {}", inspect(v, depth + 1, seen)))
                .collect();
            seen.remove(&obj.addr());
            if parts.is_empty() {
                "{}".into()
            } else {
                format!("{{ {} }}", parts.join(", "))
            }
        }
    }
}

fn spaced(parts: &[String]) -> String {
    if parts.is_empty() {
        String::new()
    } else {
        format!(" {} ", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::Obj;

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-1.5), "-1.5");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(123456789012.0), "123456789012");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(1.5e-10), "1.5e-10");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(-0.0), "0");
    }

    #[test]
    fn test_radix_strings() {
        assert_eq!(number_to_radix_string(255.0, 16), "ff");
        assert_eq!(number_to_radix_string(-5.0, 2), "-101");
        assert_eq!(number_to_radix_string(0.5, 2), "0.1");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1f"), 31.0);
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("inf").is_nan());
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    fn test_loose_equality() {
        assert!(loose_equals(&Value::Null, &Value::Undefined));
        assert!(loose_equals(&Value::from("1"), &Value::from(1)));
        assert!(loose_equals(&Value::Bool(true), &Value::from(1)));
        assert!(!loose_equals(&Value::Null, &Value::from(0)));
        let arr = Value::from(Obj::array(vec![1.into(), 2.into()]));
        assert!(loose_equals(&arr, &Value::from("1,2")));
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        let v = binary(BinaryOp::Add, &"a".into(), &1.into()).unwrap();
        assert_eq!(v, Value::from("a1"));
        let v = binary(BinaryOp::Shr, &(-8).into(), &1.into()).unwrap();
        assert_eq!(v, Value::from(-4));
        let v = binary(BinaryOp::UShr, &(-1).into(), &28.into()).unwrap();
        assert_eq!(v, Value::from(15));
        let v = binary(BinaryOp::LtE, &Value::Number(f64::NAN), &1.into()).unwrap();
        assert_eq!(v, Value::Bool(false));
        let v = binary(BinaryOp::Lt, &"a".into(), &"b".into()).unwrap();
        assert_eq!(v, Value::Bool(true));
        assert!(binary(BinaryOp::Add, &BigInt::from(1).into(), &1.into()).is_err());
        let v = binary(BinaryOp::Exp, &BigInt::from(2).into(), &BigInt::from(10).into()).unwrap();
        assert_eq!(v, Value::from(BigInt::from(1024)));
    }

    #[test]
    fn test_display_value() {
        let obj = Obj::with_props([("a", Value::from(1)), ("b", Value::from("x"))]);
        assert_eq!(display_value(&obj.into()), "{ a: 1, b: 'x' }");
        let arr = Obj::array(vec![1.into(), "s".into()]);
        assert_eq!(display_value(&arr.into()), "[ 1, 's' ]");
        assert_eq!(display_value(&"plain".into()), "plain");
    }
}
