//! `Number`, `Boolean` and `BigInt`

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive, Zero};
use std::rc::Rc;

use super::globals::{parse_float, parse_int};
use super::{arg, builtin_function, constructor, method, with_statics, Member};
use crate::executor::context::ExecContext;
use crate::executor::errors::{Exec, ExecError};
use crate::executor::ops::{
    display_value, number_to_radix_string, number_to_string, parse_bigint_literal, to_integer,
    to_numeric, to_string, truthy, Numeric,
};
use crate::executor::types::{Brand, NativeFunction, NativeImpl, Obj, Value};

/* ===================== Number ===================== */

pub static MEMBERS: &[Member] = &[
    method("toFixed", 1, to_fixed),
    method("toString", 1, number_to_string_member),
    method("toLocaleString", 0, number_to_string_member),
    method("valueOf", 0, number_value_of),
];

static NUMBER_STATICS: &[Member] = &[
    method("isInteger", 1, is_integer),
    method("isFinite", 1, is_finite),
    method("isNaN", 1, is_nan),
    method("isSafeInteger", 1, is_safe_integer),
    method("parseFloat", 1, parse_float),
    method("parseInt", 2, parse_int),
];

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub fn number_constructor() -> Obj {
    let ctor = constructor(
        "Number",
        1,
        NativeImpl::Sync(number_call),
        NativeImpl::Sync(number_call),
        Brand::Object,
        NUMBER_STATICS,
    );
    for (name, value) in [
        ("MAX_SAFE_INTEGER", MAX_SAFE_INTEGER),
        ("MIN_SAFE_INTEGER", -MAX_SAFE_INTEGER),
        ("EPSILON", f64::EPSILON),
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", 5e-324),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ("NaN", f64::NAN),
    ] {
        ctor.set_raw(name, value.into());
    }
    ctor
}

fn number_call(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(match args.first().map(to_numeric) {
        None => 0.0,
        Some(Numeric::Number(n)) => n,
        Some(Numeric::BigInt(b)) => b.to_f64().unwrap_or(f64::NAN),
    }
    .into())
}

fn this_number(this: &Value, name: &str) -> Exec<f64> {
    this.as_number().ok_or_else(|| {
        ExecError::type_error(format!(
            "Number.prototype.{name} requires that 'this' be a Number, not {}",
            display_value(this)
        ))
    })
}

fn radix_arg(args: &[Value]) -> Exec<u32> {
    let radix = match arg(args, 0) {
        Value::Undefined => 10.0,
        other => to_integer(&other),
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(ExecError::range_error(
            "toString() radix must be between 2 and 36",
        ));
    }
    Ok(radix as u32)
}

fn number_to_string_member(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let n = this_number(this, "toString")?;
    Ok(match radix_arg(args)? {
        10 => number_to_string(n),
        radix => number_to_radix_string(n, radix),
    }
    .into())
}

fn to_fixed(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let n = this_number(this, "toFixed")?;
    let digits = to_integer(&arg(args, 0));
    if !(0.0..=100.0).contains(&digits) {
        return Err(ExecError::range_error(
            "toFixed() digits argument must be between 0 and 100",
        ));
    }
    if !n.is_finite() || n.abs() >= 1e21 {
        return Ok(number_to_string(n).into());
    }
    Ok(format!("{:.*}", digits as usize, n).into())
}

fn number_value_of(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(this_number(this, "valueOf")?.into())
}

fn is_integer(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(arg(args, 0)
        .as_number()
        .is_some_and(|n| n.is_finite() && n.fract() == 0.0)
        .into())
}

fn is_safe_integer(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(arg(args, 0)
        .as_number()
        .is_some_and(|n| n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER)
        .into())
}

fn is_finite(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(arg(args, 0).as_number().is_some_and(f64::is_finite).into())
}

fn is_nan(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(arg(args, 0).as_number().is_some_and(f64::is_nan).into())
}

/* ===================== Boolean ===================== */

pub static BOOLEAN_MEMBERS: &[Member] = &[
    method("toString", 0, boolean_to_string),
    method("valueOf", 0, boolean_value_of),
];

pub fn boolean_constructor() -> Obj {
    constructor(
        "Boolean",
        1,
        NativeImpl::Sync(boolean_call),
        NativeImpl::Sync(boolean_call),
        Brand::Object,
        &[],
    )
}

fn boolean_call(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(truthy(&arg(args, 0)).into())
}

fn this_bool(this: &Value, name: &str) -> Exec<bool> {
    match this {
        Value::Bool(b) => Ok(*b),
        other => Err(ExecError::type_error(format!(
            "Boolean.prototype.{name} requires that 'this' be a Boolean, not {}",
            display_value(other)
        ))),
    }
}

fn boolean_to_string(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(this_bool(this, "toString")?.to_string().into())
}

fn boolean_value_of(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(this_bool(this, "valueOf")?.into())
}

/* ===================== BigInt ===================== */

pub static BIGINT_MEMBERS: &[Member] = &[
    method("toString", 1, bigint_to_string),
    method("toLocaleString", 0, bigint_to_string),
    method("valueOf", 0, bigint_value_of),
];

static BIGINT_STATICS: &[Member] = &[method("asIntN", 2, as_int_n)];

/// `BigInt(v)`; not a constructor
pub fn bigint_constructor() -> Obj {
    let func = builtin_function(NativeFunction::sync("BigInt", 1, bigint_call));
    with_statics(func, BIGINT_STATICS)
}

pub fn to_bigint(value: &Value) -> Exec<BigInt> {
    match value {
        Value::BigInt(b) => Ok((**b).clone()),
        Value::Bool(b) => Ok(BigInt::from(u8::from(*b))),
        Value::Number(n) => {
            if n.fract() != 0.0 || !n.is_finite() {
                return Err(ExecError::range_error(format!(
                    "The number {} cannot be converted to a BigInt because it is not an integer",
                    number_to_string(*n)
                )));
            }
            BigInt::from_f64(*n).ok_or_else(|| ExecError::range_error("Invalid BigInt"))
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(BigInt::zero());
            }
            parse_bigint_literal(trimmed)
                .ok_or_else(|| ExecError::syntax_error(format!("Cannot convert {s} to a BigInt")))
        }
        other => Err(ExecError::type_error(format!(
            "Cannot convert {} to a BigInt",
            to_string(other)
        ))),
    }
}

fn bigint_call(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(to_bigint(&arg(args, 0))?.into())
}

fn this_bigint(this: &Value, name: &str) -> Exec<Rc<BigInt>> {
    match this {
        Value::BigInt(b) => Ok(b.clone()),
        other => Err(ExecError::type_error(format!(
            "BigInt.prototype.{name} requires that 'this' be a BigInt, not {}",
            display_value(other)
        ))),
    }
}

fn bigint_to_string(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let b = this_bigint(this, "toString")?;
    Ok(b.to_str_radix(radix_arg(args)?).into())
}

fn bigint_value_of(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(Value::BigInt(this_bigint(this, "valueOf")?))
}

/// `BigInt.asIntN(bits, value)`: wrap to a signed `bits`-wide integer
fn as_int_n(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let bits = to_integer(&arg(args, 0));
    if !(0.0..=65536.0).contains(&bits) {
        return Err(ExecError::range_error("Invalid value: not (convertible to) a safe integer"));
    }
    let bits = bits as u32;
    let value = to_bigint(&arg(args, 1))?;
    if bits == 0 {
        return Ok(BigInt::zero().into());
    }
    let modulus = BigInt::from(1u8) << bits;
    let half = BigInt::from(1u8) << (bits - 1);
    let mut wrapped = ((value % &modulus) + &modulus) % &modulus;
    if wrapped >= half {
        wrapped -= &modulus;
    }
    Ok(wrapped.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_bigint_conversions() {
        assert_eq!(to_bigint(&Value::from(42.0)).unwrap(), BigInt::from(42));
        assert_eq!(to_bigint(&Value::string("0x10")).unwrap(), BigInt::from(16));
        assert!(to_bigint(&Value::from(1.5)).is_err());
        assert!(to_bigint(&Value::Undefined).is_err());
    }
}
