//! `setTimeout` / `setInterval` and their `clear*` counterparts

use std::rc::Rc;
use std::time::Duration;

use super::{arg, native};
use crate::executor::context::ExecContext;
use crate::executor::errors::{Exec, ExecError};
use crate::executor::ops::{to_number_lossy, to_string};
use crate::executor::timers::TimerCallback;
use crate::executor::types::{Obj, Value};

pub fn functions() -> Vec<(&'static str, Obj)> {
    vec![
        ("setTimeout", native("setTimeout", 2, set_timeout)),
        ("setInterval", native("setInterval", 2, set_interval)),
        ("clearTimeout", native("clearTimeout", 1, clear_timer)),
        ("clearInterval", native("clearInterval", 1, clear_timer)),
    ]
}

fn delay_of(value: &Value) -> Duration {
    let ms = to_number_lossy(value);
    if ms.is_finite() && ms > 0.0 {
        Duration::from_millis(ms as u64)
    } else {
        Duration::ZERO
    }
}

fn schedule(ctx: &Rc<ExecContext>, args: &[Value], repeat: bool) -> Exec<Value> {
    let callback = match arg(args, 0) {
        f if f.is_callable() => TimerCallback::Function {
            func: f,
            args: args.get(2..).unwrap_or_default().to_vec(),
        },
        Value::String(source) => {
            ctx.policy().check_function_creation()?;
            TimerCallback::Source(source)
        }
        other => {
            return Err(ExecError::type_error(format!(
                "The \"callback\" argument must be of type function. Received {}",
                to_string(&other)
            )))
        }
    };
    let id = ctx
        .realm
        .timers
        .add(ctx.clone(), callback, delay_of(&arg(args, 1)), repeat);
    Ok(Value::from(id as f64))
}

fn set_timeout(ctx: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    schedule(ctx, args, false)
}

fn set_interval(ctx: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    schedule(ctx, args, true)
}

fn clear_timer(ctx: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let id = to_number_lossy(&arg(args, 0));
    if id.is_finite() && id >= 1.0 {
        ctx.realm.timers.clear(id as u64);
    }
    Ok(Value::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_of() {
        assert_eq!(delay_of(&Value::from(25)), Duration::from_millis(25));
        assert_eq!(delay_of(&Value::from(-5)), Duration::ZERO);
        assert_eq!(delay_of(&Value::Undefined), Duration::ZERO);
        assert_eq!(delay_of(&Value::string("10")), Duration::from_millis(10));
    }
}
