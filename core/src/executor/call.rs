//! Function invocation, construction and closures

use std::rc::Rc;
use std::sync::Arc;

use super::context::ExecContext;
use super::errors::{Exec, ExecError, SandboxError};
use super::ops::display_value;
use super::scope::Scope;
use super::statements::{execute_statements, Control};
use super::stdlib::{error, promise};
use super::types::{
    Closure, Function, NativeCode, NativeResult, Obj, ObjectKind, PromiseCell, Value,
};
use crate::parser::FunctionDef;

enum Target {
    Native(NativeCode),
    Bound { target: Obj, this: Value, args: Vec<Value> },
    Closure(ClosureParts),
}

#[derive(Clone)]
struct ClosureParts {
    def: Arc<FunctionDef>,
    scope: Rc<Scope>,
    ctx: Rc<ExecContext>,
}

fn target_of(func: &Obj, constructing: bool) -> Exec<Target> {
    let o = func.borrow();
    let ObjectKind::Function(f) = &o.kind else {
        return Err(ExecError::type_error("Value is not a function"));
    };
    Ok(match f {
        Function::Native(n) if constructing => match &n.construct {
            Some(code) => Target::Native(code.clone()),
            None => return Err(not_constructor(&f.name())),
        },
        Function::Native(n) => Target::Native(n.call.clone()),
        Function::Bound(b) => Target::Bound {
            target: b.target.clone(),
            this: b.this.clone(),
            args: b.args.clone(),
        },
        Function::Closure(c) if constructing && !c.is_constructor() => {
            return Err(not_constructor(c.name()))
        }
        Function::Closure(c) => Target::Closure(ClosureParts {
            def: c.def.clone(),
            scope: c.scope.clone(),
            ctx: c.ctx.clone(),
        }),
    })
}

fn not_constructor(name: &str) -> ExecError {
    let name = if name.is_empty() { "anonymous" } else { name };
    ExecError::type_error(format!("{name} is not a constructor"))
}

/* ===================== Calls ===================== */

/// Call `callee` with an explicit receiver
pub fn call(ctx: Rc<ExecContext>, callee: Value, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        ctx.policy().check_call()?;
        match callee.as_object().filter(|o| o.is_callable()) {
            Some(func) => invoke(ctx.clone(), func.clone(), this, args).await,
            None => Err(ExecError::type_error(format!(
                "{} is not a function",
                display_value(&callee)
            ))),
        }
    })
}

fn invoke(ctx: Rc<ExecContext>, func: Obj, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        match target_of(&func, false)? {
            Target::Native(code) => code.invoke(ctx, this, args).await,
            Target::Bound {
                target,
                this,
                args: mut bound,
            } => {
                bound.extend(args);
                invoke(ctx, target, this, bound).await
            }
            Target::Closure(parts) => call_closure(func, parts, this, args).await,
        }
    })
}

async fn call_closure(func: Obj, parts: ClosureParts, this: Value, args: Vec<Value>) -> Exec<Value> {
    if !parts.def.is_async {
        return run_body(&func, &parts, this, args).await;
    }
    // async bodies run as a job up to their first suspension
    let cell = PromiseCell::new();
    let result = cell.clone();
    let ctx = parts.ctx.clone();
    ctx.realm.jobs.spawn_eager(async move {
        let outcome = run_body(&func, &parts, this, args).await;
        settle(&parts.ctx, &result, outcome);
    });
    Ok(promise::promise_value(cell))
}

/// Settle a promise from the outcome of sandboxed code
pub fn settle(ctx: &Rc<ExecContext>, cell: &Rc<PromiseCell>, outcome: Exec<Value>) {
    match outcome {
        Ok(value) => promise::resolve(ctx, cell, value),
        Err(e) if e.is_catchable() => cell.reject(error_value(e)),
        Err(e) => ctx.realm.set_fatal(e),
    }
}

async fn run_body(func: &Obj, parts: &ClosureParts, this: Value, args: Vec<Value>) -> Exec<Value> {
    let def = &parts.def;
    // async bodies may stay suspended without occupying the stack
    let _frame = parts.ctx.realm.enter_call(!def.is_async)?;
    let this = (!def.is_arrow).then_some(this);
    let scope = Scope::function(&parts.scope, this, def.is_async);

    if def.binds_name {
        if let Some(name) = &def.name {
            scope.bind_param(name, func.clone().into());
        }
    }
    if !def.is_arrow {
        scope.bind_param("arguments", Obj::array(args.clone()).into());
    }
    for (i, param) in def.params.iter().enumerate() {
        scope.bind_param(param, args.get(i).cloned().unwrap_or_default());
    }
    if let Some(rest) = &def.rest {
        let rest_args = args.get(def.params.len()..).unwrap_or_default().to_vec();
        scope.bind_param(rest, Obj::array(rest_args).into());
    }

    match execute_statements(&parts.ctx, &scope, &def.body).await? {
        Control::Return(value) => Ok(value),
        _ => Ok(Value::Undefined),
    }
}

/* ===================== Construction ===================== */

/// Whether `func` is reachable as a global (`new Map()`), by identity
fn is_global_constructor(ctx: &ExecContext, func: &Obj) -> bool {
    ctx.realm
        .global
        .borrow()
        .props
        .iter()
        .any(|(_, v)| v.as_object().is_some_and(|o| o.ptr_eq(func)))
}

/// `new callee(...args)`
pub fn construct(ctx: Rc<ExecContext>, callee: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        ctx.policy().check_call()?;
        let Some(func) = callee.as_object().filter(|o| o.is_callable()).cloned() else {
            return Err(ExecError::type_error(format!(
                "{} is not a constructor",
                display_value(&callee)
            )));
        };
        match target_of(&func, true)? {
            Target::Closure(parts) => {
                let instance = Obj::plain();
                instance.borrow_mut().constructor = Some(func.clone());
                let result = run_body(&func, &parts, instance.clone().into(), args).await?;
                Ok(match result {
                    Value::Object(_) => result,
                    _ => instance.into(),
                })
            }
            Target::Native(code) => {
                if ctx.policy().enforcing() && !is_global_constructor(&ctx, &func) {
                    let name = match &func.borrow().kind {
                        ObjectKind::Function(f) => f.name(),
                        other => other.class_name().to_string(),
                    };
                    return Err(SandboxError::ConstructionNotAllowed { name }.into());
                }
                code.invoke(ctx, Value::Undefined, args).await
            }
            Target::Bound {
                target,
                args: mut bound,
                ..
            } => {
                bound.extend(args);
                construct(ctx, target.into(), bound).await
            }
        }
    })
}

/// `value instanceof ctor`
pub fn instance_of(value: &Value, ctor: &Value) -> Exec<bool> {
    let Some(ctor) = ctor.as_object().filter(|o| o.is_callable()) else {
        return Err(ExecError::type_error(
            "Right-hand side of 'instanceof' is not callable",
        ));
    };
    let Value::Object(obj) = value else {
        return Ok(false);
    };
    let c = ctor.borrow();
    let ObjectKind::Function(f) = &c.kind else {
        return Ok(false);
    };
    Ok(match f {
        Function::Closure(_) => obj
            .borrow()
            .constructor
            .as_ref()
            .is_some_and(|made_by| made_by.ptr_eq(ctor)),
        Function::Native(n) => n.brand.is_some_and(|brand| brand.matches(&obj.borrow())),
        Function::Bound(b) => {
            let target = Value::Object(b.target.clone());
            drop(c);
            return instance_of(value, &target);
        }
    })
}

/* ===================== Closures ===================== */

/// Function value for a literal evaluated in `scope`
pub fn make_closure(
    ctx: &Rc<ExecContext>,
    scope: &Rc<Scope>,
    def: &Arc<FunctionDef>,
    inferred_name: Option<&str>,
) -> Exec<Value> {
    ctx.policy().check_function_creation()?;
    let closure = Closure {
        def: def.clone(),
        scope: scope.clone(),
        ctx: ctx.clone(),
        inferred_name: inferred_name.map(Rc::from),
    };
    Ok(Obj::new(ObjectKind::Function(Function::Closure(closure))).into())
}

/// Value seen by `catch`: runtime errors become error objects
pub fn error_value(error: ExecError) -> Value {
    match error {
        ExecError::Thrown(value) => value,
        ExecError::Runtime { kind, message } => error::create(kind, &message).into(),
        other => error::create(super::errors::ErrorKind::Error, &other.to_string()).into(),
    }
}
