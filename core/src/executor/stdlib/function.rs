//! Function members, the `Function` constructor and `eval`
//!
//! Source compiled at run time parses into its own program and runs in a
//! fresh function scope under the global scope. It never sees the locals of
//! the code that created it.

use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

use super::{arg, async_method, builtin_function, constructor, method, this_object, Member};
use crate::executor::call::call;
use crate::executor::context::{ExecContext, Mode};
use crate::executor::errors::{Exec, ExecError};
use crate::executor::ops::to_string;
use crate::executor::scope::Scope;
use crate::executor::statements::run_program;
use crate::executor::types::{
    BoundFunction, Brand, Function, NativeFunction, NativeImpl, NativeResult, Obj, ObjectKind,
    TypeTag, Value,
};
use crate::parser::{self, ParseOptions};

pub static MEMBERS: &[Member] = &[
    async_method("call", 1, call_member),
    async_method("apply", 2, apply),
    method("bind", 1, bind),
    method("toString", 0, to_string_member),
];

pub fn constructor_object() -> Obj {
    constructor(
        "Function",
        1,
        NativeImpl::Async(create_function),
        NativeImpl::Async(create_function),
        Brand::Function,
        &[],
    )
}

pub fn eval_object() -> Obj {
    builtin_function(NativeFunction::new("eval", 1, NativeImpl::Async(eval)))
}

/* ===================== Run-time Compilation ===================== */

/// Compile `source` and run it in a fresh scope; the last expression
/// statement is the result
pub async fn run_source(ctx: &Rc<ExecContext>, source: &str) -> Exec<Value> {
    let options = ParseOptions {
        completion_value: true,
        ..ParseOptions::default()
    };
    run_compiled(ctx, source, options).await
}

async fn run_compiled(ctx: &Rc<ExecContext>, source: &str, options: ParseOptions) -> Exec<Value> {
    ctx.policy().check_function_creation()?;
    let program = parser::parse_with(source, options)
        .map_err(|e| ExecError::syntax_error(e.to_string()))?;
    debug!(len = source.len(), "compiled source at run time");
    let derived = ctx.derive(Arc::new(program));
    let scope = Scope::function(
        &ctx.realm.global_scope,
        Some(Value::Undefined),
        ctx.mode == Mode::Async,
    );
    run_program(&derived, &scope).await
}

fn eval(ctx: Rc<ExecContext>, _: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        match arg(&args, 0) {
            Value::String(source) => run_source(&ctx, &source).await,
            other => Ok(other),
        }
    })
}

/// `Function(p1, ..., body)`
fn create_function(ctx: Rc<ExecContext>, _: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let (body, params) = match args.split_last() {
            Some((body, params)) => (to_string(body), params.iter().map(to_string).collect()),
            None => (String::new(), Vec::<String>::new()),
        };
        let source = format!("(function anonymous({}) {{\n{}\n}})", params.join(", "), body);
        let options = ParseOptions {
            expression: true,
            ..ParseOptions::default()
        };
        run_compiled(&ctx, &source, options).await
    })
}

/* ===================== Members ===================== */

fn this_function<'a>(this: &'a Value, name: &str) -> Exec<&'a Obj> {
    let func = this_object(this, TypeTag::Function, name)?;
    if !func.is_callable() {
        return Err(ExecError::type_error(format!("Function.prototype.{name} called on a non-function")));
    }
    Ok(func)
}

fn call_member(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        this_function(&this, "call")?;
        let receiver = arg(&args, 0);
        let rest = args.get(1..).unwrap_or_default().to_vec();
        call(ctx, this, receiver, rest).await
    })
}

fn apply(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        this_function(&this, "apply")?;
        let list = match arg(&args, 1) {
            v if v.is_nullish() => Vec::new(),
            Value::Object(obj) if obj.is_array() => obj.array_items(),
            _ => {
                return Err(ExecError::type_error(
                    "CreateListFromArrayLike called on non-object",
                ))
            }
        };
        call(ctx, this, arg(&args, 0), list).await
    })
}

fn bind(ctx: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    ctx.policy().check_function_creation()?;
    let target = this_function(this, "bind")?.clone();
    let bound = BoundFunction {
        target,
        this: arg(args, 0),
        args: args.get(1..).unwrap_or_default().to_vec(),
    };
    Ok(Obj::new(ObjectKind::Function(Function::Bound(bound))).into())
}

fn to_string_member(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    let func = this_function(this, "toString")?;
    let o = func.borrow();
    let ObjectKind::Function(f) = &o.kind else {
        return Err(ExecError::type_error("Function expected"));
    };
    let text = match f {
        Function::Closure(c) if c.def.is_arrow => "() => { [code] }".to_string(),
        Function::Closure(c) => format!("function {}() {{ [code] }}", c.name()),
        other => format!("function {}() {{ [native code] }}", other.name()),
    };
    Ok(text.into())
}
