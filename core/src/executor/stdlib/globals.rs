//! Global functions: number parsing and URI coding

use std::rc::Rc;

use super::{arg, native};
use crate::executor::context::ExecContext;
use crate::executor::errors::{ErrorKind, Exec, ExecError};
use crate::executor::ops::{to_integer, to_number_lossy, to_string};
use crate::executor::types::{Obj, Value};

pub fn functions() -> Vec<(&'static str, Obj)> {
    vec![
        ("parseInt", native("parseInt", 2, parse_int)),
        ("parseFloat", native("parseFloat", 1, parse_float)),
        ("isNaN", native("isNaN", 1, is_nan)),
        ("isFinite", native("isFinite", 1, is_finite)),
        ("encodeURIComponent", native("encodeURIComponent", 1, encode_uri_component)),
        ("decodeURIComponent", native("decodeURIComponent", 1, decode_uri_component)),
        ("encodeURI", native("encodeURI", 1, encode_uri)),
        ("decodeURI", native("decodeURI", 1, decode_uri)),
    ]
}

/* ===================== Numbers ===================== */

/// Integer prefix of `s` in `radix`; `None` radix auto-detects `0x`
pub fn parse_int_str(s: &str, radix: Option<u32>) -> f64 {
    let s = s.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let has_hex_prefix = s.starts_with("0x") || s.starts_with("0X");
    let (radix, digits) = match radix {
        None if has_hex_prefix => (16, &s[2..]),
        None => (10, s),
        Some(16) if has_hex_prefix => (16, &s[2..]),
        Some(r) => (r, s),
    };
    let mut value = 0f64;
    let mut any = false;
    for c in digits.chars() {
        let Some(d) = c.to_digit(radix) else {
            break;
        };
        value = value * f64::from(radix) + f64::from(d);
        any = true;
    }
    match (any, negative) {
        (false, _) => f64::NAN,
        (true, true) => -value,
        (true, false) => value,
    }
}

pub fn parse_int(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let s = to_string(&arg(args, 0));
    let radix = match to_integer(&arg(args, 1)) as i64 {
        0 => None,
        r @ 2..=36 => Some(r as u32),
        _ => return Ok(f64::NAN.into()),
    };
    Ok(parse_int_str(&s, radix).into())
}

/// Longest decimal literal prefix of `s`
pub fn parse_float_str(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    let int_end = digits_from(end);
    let mut mantissa_end = int_end;
    if bytes.get(int_end) == Some(&b'.') {
        mantissa_end = digits_from(int_end + 1);
    }
    let has_digits = int_end > end || mantissa_end > int_end + 1;
    if !has_digits {
        return f64::NAN;
    }
    end = mantissa_end;
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    s[..end].trim_end_matches('.').parse().unwrap_or(f64::NAN)
}

pub fn parse_float(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(parse_float_str(&to_string(&arg(args, 0))).into())
}

fn is_nan(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(to_number_lossy(&arg(args, 0)).is_nan().into())
}

fn is_finite(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(to_number_lossy(&arg(args, 0)).is_finite().into())
}

/* ===================== URI Coding ===================== */

const URI_MARKS: &str = "-_.!~*'()";
const URI_RESERVED: &str = ";/?:@&=+$,#";

fn encode(s: &str, keep: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || URI_MARKS.contains(c) || keep.contains(c) {
            out.push(c);
            continue;
        }
        let mut buf = [0u8; 4];
        for byte in c.encode_utf8(&mut buf).bytes() {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn malformed() -> ExecError {
    ExecError::runtime(ErrorKind::URIError, "URI malformed")
}

/// Decode `%XX` runs as UTF-8, leaving escapes of `keep` untouched
fn decode(s: &str, keep: &str) -> Exec<String> {
    let bytes = s.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let hex = s.get(i + 1..i + 3).ok_or_else(malformed)?;
        let byte = u8::from_str_radix(hex, 16).map_err(|_| malformed())?;
        if byte.is_ascii() && keep.contains(char::from(byte)) {
            out.extend_from_slice(&bytes[i..i + 3]);
        } else {
            out.push(byte);
        }
        i += 3;
    }
    String::from_utf8(out).map_err(|_| malformed())
}

fn encode_uri_component(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(encode(&to_string(&arg(args, 0)), "").into())
}

fn encode_uri(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(encode(&to_string(&arg(args, 0)), URI_RESERVED).into())
}

fn decode_uri_component(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(decode(&to_string(&arg(args, 0)), "")?.into())
}

fn decode_uri(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(decode(&to_string(&arg(args, 0)), URI_RESERVED)?.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_prefixes() {
        assert_eq!(parse_int_str("  42px", None), 42.0);
        assert_eq!(parse_int_str("-0x1f", None), -31.0);
        assert_eq!(parse_int_str("ff", Some(16)), 255.0);
        assert_eq!(parse_int_str("101", Some(2)), 5.0);
        assert!(parse_int_str("px", None).is_nan());
    }

    #[test]
    fn test_parse_float_prefixes() {
        assert_eq!(parse_float_str("3.14abc"), 3.14);
        assert_eq!(parse_float_str(".5"), 0.5);
        assert_eq!(parse_float_str("1e3x"), 1000.0);
        assert_eq!(parse_float_str("1e"), 1.0);
        assert_eq!(parse_float_str("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float_str("abc").is_nan());
    }

    #[test]
    fn test_uri_round_trip() {
        let encoded = encode("a b/ü", "");
        assert_eq!(encoded, "a%20b%2F%C3%BC");
        assert_eq!(decode(&encoded, "").unwrap(), "a b/ü");
        assert_eq!(encode("a/b?c", URI_RESERVED), "a/b?c");
        assert_eq!(decode("%2F", URI_RESERVED).unwrap(), "%2F");
        assert!(decode("%E0%A4%A", "").is_err());
    }
}
