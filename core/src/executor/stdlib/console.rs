//! `console`, routed to `tracing` under the `sandbox::console` target

use std::rc::Rc;
use tracing::{debug, error, info, warn};

use super::{method, namespace, Member};
use crate::executor::context::ExecContext;
use crate::executor::errors::Exec;
use crate::executor::ops::display_value;
use crate::executor::types::{Obj, Value};

static MEMBERS: &[Member] = &[
    method("log", 0, log),
    method("info", 0, log),
    method("warn", 0, warn_member),
    method("error", 0, error_member),
    method("debug", 0, debug_member),
];

pub fn namespace_object() -> Obj {
    namespace(MEMBERS)
}

/// Arguments joined by spaces, strings unquoted
pub fn format_args(args: &[Value]) -> String {
    args.iter().map(display_value).collect::<Vec<_>>().join(" ")
}

fn log(ctx: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    info!(target: "sandbox::console", id = %ctx.id, "{}", format_args(args));
    Ok(Value::Undefined)
}

fn warn_member(ctx: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    warn!(target: "sandbox::console", id = %ctx.id, "{}", format_args(args));
    Ok(Value::Undefined)
}

fn error_member(ctx: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    error!(target: "sandbox::console", id = %ctx.id, "{}", format_args(args));
    Ok(Value::Undefined)
}

fn debug_member(ctx: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    debug!(target: "sandbox::console", id = %ctx.id, "{}", format_args(args));
    Ok(Value::Undefined)
}
