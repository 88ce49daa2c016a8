//! `Math` namespace

use std::rc::Rc;

use super::{arg, method, namespace, Member};
use crate::executor::context::ExecContext;
use crate::executor::errors::Exec;
use crate::executor::ops::{to_int32, to_number, to_uint32};
use crate::executor::types::{Obj, Value};

/// Single-argument functions over `f64`
macro_rules! unary {
    ($($name:ident => $f:expr;)*) => {
        $(
            fn $name(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
                let x = to_number(&arg(args, 0))?;
                let f: fn(f64) -> f64 = $f;
                Ok(f(x).into())
            }
        )*
    };
}

unary! {
    abs => f64::abs;
    ceil => f64::ceil;
    floor => f64::floor;
    trunc => f64::trunc;
    sqrt => f64::sqrt;
    cbrt => f64::cbrt;
    exp => f64::exp;
    expm1 => f64::exp_m1;
    log => f64::ln;
    log1p => f64::ln_1p;
    log2 => f64::log2;
    log10 => f64::log10;
    sin => f64::sin;
    cos => f64::cos;
    tan => f64::tan;
    asin => f64::asin;
    acos => f64::acos;
    atan => f64::atan;
    sinh => f64::sinh;
    cosh => f64::cosh;
    tanh => f64::tanh;
    asinh => f64::asinh;
    acosh => f64::acosh;
    atanh => f64::atanh;
    fround => |x| f64::from(x as f32);
    round => round_half_up;
    sign => |x| if x.is_nan() || x == 0.0 { x } else { x.signum() };
}

static MEMBERS: &[Member] = &[
    method("abs", 1, abs),
    method("ceil", 1, ceil),
    method("floor", 1, floor),
    method("round", 1, round),
    method("trunc", 1, trunc),
    method("sign", 1, sign),
    method("sqrt", 1, sqrt),
    method("cbrt", 1, cbrt),
    method("exp", 1, exp),
    method("expm1", 1, expm1),
    method("log", 1, log),
    method("log1p", 1, log1p),
    method("log2", 1, log2),
    method("log10", 1, log10),
    method("sin", 1, sin),
    method("cos", 1, cos),
    method("tan", 1, tan),
    method("asin", 1, asin),
    method("acos", 1, acos),
    method("atan", 1, atan),
    method("atan2", 2, atan2),
    method("sinh", 1, sinh),
    method("cosh", 1, cosh),
    method("tanh", 1, tanh),
    method("asinh", 1, asinh),
    method("acosh", 1, acosh),
    method("atanh", 1, atanh),
    method("fround", 1, fround),
    method("pow", 2, pow),
    method("min", 2, min),
    method("max", 2, max),
    method("hypot", 2, hypot),
    method("clz32", 1, clz32),
    method("imul", 2, imul),
    method("random", 0, random),
];

pub fn namespace_object() -> Obj {
    let math = namespace(MEMBERS);
    for (name, value) in [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("SQRT2", std::f64::consts::SQRT_2),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
    ] {
        math.set_raw(name, value.into());
    }
    math
}

/// Halves round towards positive infinity
fn round_half_up(x: f64) -> f64 {
    if !x.is_finite() || x.fract() == 0.0 {
        return x;
    }
    let floor = x.floor();
    if x - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

fn numbers(args: &[Value]) -> Exec<Vec<f64>> {
    args.iter().map(to_number).collect()
}

fn atan2(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let y = to_number(&arg(args, 0))?;
    let x = to_number(&arg(args, 1))?;
    Ok(y.atan2(x).into())
}

fn pow(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let base = to_number(&arg(args, 0))?;
    let exponent = to_number(&arg(args, 1))?;
    Ok(crate::executor::ops::exponent(base, exponent).into())
}

fn min(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let values = numbers(args)?;
    if values.iter().any(|n| n.is_nan()) {
        return Ok(f64::NAN.into());
    }
    Ok(values.into_iter().fold(f64::INFINITY, f64::min).into())
}

fn max(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let values = numbers(args)?;
    if values.iter().any(|n| n.is_nan()) {
        return Ok(f64::NAN.into());
    }
    Ok(values.into_iter().fold(f64::NEG_INFINITY, f64::max).into())
}

fn hypot(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let values = numbers(args)?;
    if values.iter().any(|n| n.is_infinite()) {
        return Ok(f64::INFINITY.into());
    }
    Ok(values.iter().map(|n| n * n).sum::<f64>().sqrt().into())
}

fn clz32(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let n = to_uint32(to_number(&arg(args, 0))?);
    Ok(n.leading_zeros().into())
}

fn imul(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let a = to_int32(to_number(&arg(args, 0))?);
    let b = to_int32(to_number(&arg(args, 1))?);
    Ok(a.wrapping_mul(b).into())
}

fn random(ctx: &Rc<ExecContext>, _: &Value, _: &[Value]) -> Exec<Value> {
    Ok(ctx.realm.next_random().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(-2.6), -3.0);
        assert_eq!(round_half_up(7.0), 7.0);
    }
}
