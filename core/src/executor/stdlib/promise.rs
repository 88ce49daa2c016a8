//! `Promise` over [`PromiseCell`]
//!
//! Reactions never run synchronously: `then` queues a job that waits on the
//! source cell, so handlers observe the usual microtask ordering.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{arg, builtin_function, constructor, method, this_object, Member};
use crate::executor::call::{call, error_value, settle};
use crate::executor::context::ExecContext;
use crate::executor::errors::{ErrorKind, Exec, ExecError};
use crate::executor::property::iterate_values;
use crate::executor::types::{
    Brand, NativeFunction, NativeImpl, NativeResult, Obj, ObjectKind, PromiseCell, PromiseState,
    TypeTag, Value,
};

pub static MEMBERS: &[Member] = &[
    method("then", 2, then),
    method("catch", 1, catch),
    method("finally", 1, finally),
];

static STATICS: &[Member] = &[
    method("resolve", 1, static_resolve),
    method("reject", 1, static_reject),
    method("all", 1, all),
    method("allSettled", 1, all_settled),
    method("race", 1, race),
    method("any", 1, any),
];

pub fn constructor_object() -> Obj {
    constructor(
        "Promise",
        1,
        NativeImpl::Sync(requires_new),
        NativeImpl::Async(construct),
        Brand::Promise,
        STATICS,
    )
}

/* ===================== Cells ===================== */

pub fn promise_value(cell: Rc<PromiseCell>) -> Value {
    Obj::new(ObjectKind::Promise(cell)).into()
}

pub fn as_promise(value: &Value) -> Option<Rc<PromiseCell>> {
    match &value.as_object()?.borrow().kind {
        ObjectKind::Promise(cell) => Some(cell.clone()),
        _ => None,
    }
}

/// Resolve `cell` with `value`, adopting the state of promises and thenables
pub fn resolve(ctx: &Rc<ExecContext>, cell: &Rc<PromiseCell>, value: Value) {
    if let Some(other) = as_promise(&value) {
        if Rc::ptr_eq(&other, cell) {
            cell.reject(error_value(ExecError::type_error(
                "Chaining cycle detected for promise",
            )));
            return;
        }
        let cell = cell.clone();
        ctx.realm.jobs.spawn(async move {
            match other.wait().await {
                Ok(v) => cell.fulfill(v),
                Err(e) => cell.reject(e),
            }
        });
        return;
    }
    let then = value
        .as_object()
        .filter(|o| !o.is_callable())
        .and_then(|o| o.get_raw("then"))
        .filter(Value::is_callable);
    match then {
        Some(then) => {
            let (resolve_fn, reject_fn) = resolvers(cell);
            let ctx2 = ctx.clone();
            let cell = cell.clone();
            ctx.realm.jobs.spawn(async move {
                let outcome = call(ctx2.clone(), then, value, vec![resolve_fn, reject_fn]).await;
                if let Err(e) = outcome {
                    settle(&ctx2, &cell, Err(e));
                }
            });
        }
        None => cell.fulfill(value),
    }
}

/// `resolve` / `reject` functions handed to an executor or thenable
fn resolvers(cell: &Rc<PromiseCell>) -> (Value, Value) {
    let target = cell.clone();
    let resolve_fn = NativeFunction::dynamic("resolve", 1, move |ctx, _, args| {
        resolve(&ctx, &target, arg(&args, 0));
        Box::pin(std::future::ready(Ok(Value::Undefined)))
    });
    let target = cell.clone();
    let reject_fn = NativeFunction::dynamic("reject", 1, move |_, _, args| {
        target.reject(arg(&args, 0));
        Box::pin(std::future::ready(Ok(Value::Undefined)))
    });
    (
        builtin_function(resolve_fn).into(),
        builtin_function(reject_fn).into(),
    )
}

/// Promise for any value: promises pass through, others resolve to it
fn to_cell(ctx: &Rc<ExecContext>, value: Value) -> Rc<PromiseCell> {
    as_promise(&value).unwrap_or_else(|| {
        let cell = PromiseCell::new();
        resolve(ctx, &cell, value);
        cell
    })
}

fn settled_with(state: PromiseState) -> Value {
    let cell = PromiseCell::new();
    match state {
        PromiseState::Fulfilled(v) => cell.fulfill(v),
        PromiseState::Rejected(e) => cell.reject(e),
        PromiseState::Pending => {}
    }
    promise_value(cell)
}

/* ===================== Constructor ===================== */

fn requires_new(_: &Rc<ExecContext>, _: &Value, _: &[Value]) -> Exec<Value> {
    Err(ExecError::type_error("Promise constructor cannot be invoked without 'new'"))
}

fn construct(ctx: Rc<ExecContext>, _: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let executor = arg(&args, 0);
        if !executor.is_callable() {
            return Err(ExecError::type_error(format!(
                "Promise resolver {} is not a function",
                crate::executor::ops::display_value(&executor)
            )));
        }
        let cell = PromiseCell::new();
        let (resolve_fn, reject_fn) = resolvers(&cell);
        match call(ctx.clone(), executor, Value::Undefined, vec![resolve_fn, reject_fn]).await {
            Ok(_) => {}
            Err(e) if e.is_catchable() => cell.reject(error_value(e)),
            Err(e) => return Err(e),
        }
        Ok(promise_value(cell))
    })
}

/* ===================== Reactions ===================== */

fn this_cell(this: &Value, name: &str) -> Exec<Rc<PromiseCell>> {
    let obj = this_object(this, TypeTag::Promise, name)?;
    match &obj.borrow().kind {
        ObjectKind::Promise(cell) => Ok(cell.clone()),
        _ => Err(ExecError::type_error("Promise expected")),
    }
}

/// Queue a reaction on `source`; `reaction` maps its outcome to the derived promise
fn react<F>(ctx: &Rc<ExecContext>, source: Rc<PromiseCell>, reaction: F) -> Value
where
    F: FnOnce(Rc<ExecContext>, Result<Value, Value>) -> NativeResult + 'static,
{
    source.mark_handled();
    let derived = PromiseCell::new();
    let result = derived.clone();
    let job_ctx = ctx.clone();
    ctx.realm.jobs.spawn(async move {
        let outcome = source.wait().await;
        let settled = reaction(job_ctx.clone(), outcome).await;
        settle(&job_ctx, &result, settled);
    });
    promise_value(derived)
}

fn then(ctx: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let source = this_cell(this, "then")?;
    let on_fulfilled = arg(args, 0);
    let on_rejected = arg(args, 1);
    Ok(react(ctx, source, move |ctx, outcome| {
        Box::pin(async move {
            match outcome {
                Ok(v) if on_fulfilled.is_callable() => {
                    call(ctx, on_fulfilled, Value::Undefined, vec![v]).await
                }
                Ok(v) => Ok(v),
                Err(e) if on_rejected.is_callable() => {
                    call(ctx, on_rejected, Value::Undefined, vec![e]).await
                }
                Err(e) => Err(ExecError::Thrown(e)),
            }
        })
    }))
}

fn catch(ctx: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    then(ctx, this, &[Value::Undefined, arg(args, 0)])
}

fn finally(ctx: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let source = this_cell(this, "finally")?;
    let on_finally = arg(args, 0);
    Ok(react(ctx, source, move |ctx, outcome| {
        Box::pin(async move {
            if on_finally.is_callable() {
                call(ctx, on_finally, Value::Undefined, Vec::new()).await?;
            }
            outcome.map_err(ExecError::Thrown)
        })
    }))
}

/* ===================== Statics ===================== */

fn static_resolve(ctx: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let value = arg(args, 0);
    if as_promise(&value).is_some() {
        return Ok(value);
    }
    Ok(promise_value(to_cell(ctx, value)))
}

fn static_reject(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(settled_with(PromiseState::Rejected(arg(args, 0))))
}

/// Shared bookkeeping of a combinator over several promises
struct Gather {
    result: Rc<PromiseCell>,
    slots: RefCell<Vec<Value>>,
    remaining: Cell<usize>,
}

impl Gather {
    fn new(len: usize) -> Rc<Self> {
        Rc::new(Gather {
            result: PromiseCell::new(),
            slots: RefCell::new(vec![Value::Undefined; len]),
            remaining: Cell::new(len),
        })
    }

    /// Record slot `i`; true once every slot is filled
    fn fill(&self, i: usize, value: Value) -> bool {
        self.slots.borrow_mut()[i] = value;
        self.remaining.set(self.remaining.get() - 1);
        self.remaining.get() == 0
    }

    fn array(&self) -> Value {
        Obj::array(self.slots.borrow().clone()).into()
    }
}

/// Run `on_settle` for every input as it settles
fn gather(
    ctx: &Rc<ExecContext>,
    iterable: &Value,
    on_empty: impl FnOnce(&Rc<Gather>),
    on_settle: impl Fn(&Gather, usize, Result<Value, Value>) + Clone + 'static,
) -> Exec<Value> {
    let items = iterate_values(iterable)?;
    let state = Gather::new(items.len());
    if items.is_empty() {
        on_empty(&state);
    }
    for (i, item) in items.into_iter().enumerate() {
        let cell = to_cell(ctx, item);
        let state = state.clone();
        let on_settle = on_settle.clone();
        ctx.realm.jobs.spawn(async move {
            let outcome = cell.wait().await;
            if state.result.is_pending() {
                on_settle(&state, i, outcome);
            }
        });
    }
    Ok(promise_value(state.result.clone()))
}

fn all(ctx: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    gather(
        ctx,
        &arg(args, 0),
        |state| state.result.fulfill(state.array()),
        |state, i, outcome| match outcome {
            Ok(v) => {
                if state.fill(i, v) {
                    state.result.fulfill(state.array());
                }
            }
            Err(e) => state.result.reject(e),
        },
    )
}

fn all_settled(ctx: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    gather(
        ctx,
        &arg(args, 0),
        |state| state.result.fulfill(state.array()),
        |state, i, outcome| {
            let entry = match outcome {
                Ok(v) => Obj::with_props([("status", Value::string("fulfilled")), ("value", v)]),
                Err(e) => Obj::with_props([("status", Value::string("rejected")), ("reason", e)]),
            };
            if state.fill(i, entry.into()) {
                state.result.fulfill(state.array());
            }
        },
    )
}

fn race(ctx: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    gather(ctx, &arg(args, 0), |_| {}, |state, _, outcome| match outcome {
        Ok(v) => state.result.fulfill(v),
        Err(e) => state.result.reject(e),
    })
}

fn any(ctx: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let rejected_all = |state: &Gather| {
        let error = super::error::create(ErrorKind::Error, "All promises were rejected");
        error.set_raw("errors", state.array());
        state.result.reject(error.into());
    };
    gather(
        ctx,
        &arg(args, 0),
        move |state| rejected_all(state),
        move |state, i, outcome| match outcome {
            Ok(v) => state.result.fulfill(v),
            Err(e) => {
                if state.fill(i, e) {
                    rejected_all(state);
                }
            }
        },
    )
}
