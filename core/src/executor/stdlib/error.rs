//! Error constructors

use std::rc::Rc;

use super::{arg, builtin_function, method, Member};
use crate::executor::context::ExecContext;
use crate::executor::errors::{ErrorKind, Exec};
use crate::executor::ops::to_string;
use crate::executor::types::{Brand, NativeCode, NativeFunction, NativeResult, Obj, ObjectKind, Value};

pub static MEMBERS: &[Member] = &[method("toString", 0, to_string_member)];

/// Error object with `message` and `stack`; `name` derives from the kind
pub fn create(kind: ErrorKind, message: &str) -> Obj {
    let error = Obj::new(ObjectKind::Error(kind));
    error.set_raw("message", message.into());
    let header = if message.is_empty() {
        kind.name().to_string()
    } else {
        format!("{}: {message}", kind.name())
    };
    error.set_raw("stack", format!("{header}\n    at <sandbox>").into());
    error
}

fn construct_error(kind: ErrorKind, args: &[Value]) -> Value {
    let message = match arg(args, 0) {
        Value::Undefined => String::new(),
        other => to_string(&other),
    };
    let error = create(kind, &message);
    if let Value::Object(options) = arg(args, 1) {
        if let Some(cause) = options.get_raw("cause") {
            error.set_raw("cause", cause);
        }
    }
    error.into()
}

fn error_constructor(kind: ErrorKind) -> Obj {
    let make = move |_: Rc<ExecContext>, _: Value, args: Vec<Value>| -> NativeResult {
        Box::pin(std::future::ready(Ok(construct_error(kind, &args))))
    };
    let brand = match kind {
        ErrorKind::Error => Brand::Error(None),
        other => Brand::Error(Some(other)),
    };
    let native = NativeFunction::dynamic(kind.name(), 1, make)
        .constructor(NativeCode::Dynamic(Rc::new(make)), brand);
    builtin_function(native)
}

pub fn constructors() -> Vec<(&'static str, Obj)> {
    ErrorKind::ALL
        .into_iter()
        .map(|kind| (kind.name(), error_constructor(kind)))
        .collect()
}

fn to_string_member(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(to_string(this).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sets_message_and_stack() {
        let error = create(ErrorKind::RangeError, "too big");
        assert_eq!(error.get_raw("message"), Some(Value::string("too big")));
        let stack = error.get_raw("stack").unwrap();
        assert!(to_string(&stack).starts_with("RangeError: too big"));
        assert_eq!(to_string(&error.into()), "RangeError: too big");
    }
}
