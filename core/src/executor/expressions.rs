//! Expression evaluation
//!
//! One recursive async walker serves both engines. Every node passes a
//! checkpoint first, so the tick counter advances per node and a halted
//! sandbox parks at the next node boundary.

use num_bigint::BigInt;
use std::rc::Rc;

use super::call::{call, construct, instance_of, make_closure};
use super::context::ExecContext;
use super::errors::{Exec, ExecError, SandboxError};
use super::jobs::yield_now;
use super::ops::{
    self, parse_bigint_literal, to_int32, to_number, to_numeric, to_property_key, to_string,
    truthy, Numeric,
};
use super::property::{
    delete_member, get_member, has_property, iterate_keys, iterate_values, own_entries,
    set_member, set_property,
};
use super::scope::{Reference, Scope};
use super::stdlib::{promise, regexp};
use super::types::{Eval, IteratorState, Obj, ObjectKind, Value};
use crate::parser::ast::{
    AssignOp, BinaryOp, Expr, Intrinsic, LogicalOp, MemberKey, PropKey, Property, UnaryOp,
    UpdateOp,
};

/* ===================== Entry Point ===================== */

/// Evaluate an expression to a value
pub fn eval_expr<'a>(
    ctx: &'a Rc<ExecContext>,
    scope: &'a Rc<Scope>,
    expr: &'a Expr,
) -> Eval<'a, Exec<Value>> {
    Box::pin(async move {
        ctx.checkpoint().await?;
        match expr {
            Expr::Number { v } => Ok(Value::Number(*v)),
            Expr::NaN => Ok(Value::Number(f64::NAN)),
            Expr::Infinity => Ok(Value::Number(f64::INFINITY)),
            Expr::BigInt { digits } => parse_bigint_literal(digits)
                .map(Value::from)
                .ok_or_else(|| ExecError::syntax_error(format!("Invalid BigInt literal {digits}"))),
            Expr::Str { idx } => ctx
                .constants()
                .string(*idx)
                .map(Value::string)
                .ok_or_else(bad_constant),
            Expr::Template { idx } => eval_template(ctx, scope, *idx).await,
            Expr::Regex { idx } => {
                let literal = ctx.constants().regex(*idx).ok_or_else(bad_constant)?;
                regexp::create(&literal.pattern, &literal.flags)
            }
            Expr::Bool { v } => Ok(Value::Bool(*v)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Ident { name } => read_reference(ctx, &scope.lookup(name)),
            Expr::This => Ok(scope.this()),
            Expr::Array { elements } => Ok(Obj::array(eval_args(ctx, scope, elements).await?).into()),
            Expr::Object { props } => eval_object(ctx, scope, props).await,
            Expr::Member { .. } | Expr::Call { .. } => {
                Ok(eval_chain(ctx, scope, expr).await?.unwrap_or_default())
            }
            Expr::New { callee, args } => {
                let func = eval_expr(ctx, scope, callee).await?;
                let args = eval_args(ctx, scope, args).await?;
                if !func.is_callable() {
                    return Err(ExecError::type_error(format!(
                        "{} is not a constructor",
                        describe(callee)
                    )));
                }
                construct(ctx.clone(), func, args).await
            }
            Expr::Unary { op, arg } => eval_unary(ctx, scope, *op, arg).await,
            Expr::Update { op, prefix, target } => eval_update(ctx, scope, *op, *prefix, target).await,
            Expr::Binary { op, left, right } => {
                let left = eval_expr(ctx, scope, left).await?;
                let right = eval_expr(ctx, scope, right).await?;
                binary_op(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = eval_expr(ctx, scope, left).await?;
                if short_circuits(*op, &left) {
                    Ok(left)
                } else {
                    eval_expr(ctx, scope, right).await
                }
            }
            Expr::Assign { op, target, value } => eval_assign(ctx, scope, *op, target, value).await,
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if truthy(&eval_expr(ctx, scope, test).await?) {
                    eval_expr(ctx, scope, consequent).await
                } else {
                    eval_expr(ctx, scope, alternate).await
                }
            }
            Expr::Sequence { exprs } => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = eval_expr(ctx, scope, expr).await?;
                }
                Ok(last)
            }
            Expr::Function { def } => make_closure(ctx, scope, def, None),
            Expr::Spread { .. } => Err(ExecError::syntax_error("Unexpected spread element")),
            Expr::Await { arg } => eval_await(ctx, scope, arg).await,
            Expr::Intrinsic { op, arg } => {
                let value = eval_expr(ctx, scope, arg).await?;
                eval_intrinsic(*op, value)
            }
        }
    })
}

fn bad_constant() -> ExecError {
    ExecError::syntax_error("Invalid constant reference")
}

/// Evaluate, naming anonymous function literals after their binding
pub(crate) async fn eval_named(
    ctx: &Rc<ExecContext>,
    scope: &Rc<Scope>,
    expr: &Expr,
    name: Option<&str>,
) -> Exec<Value> {
    match expr {
        Expr::Function { def } if def.name.is_none() => {
            ctx.checkpoint().await?;
            make_closure(ctx, scope, def, name)
        }
        other => eval_expr(ctx, scope, other).await,
    }
}

/// Short, source-like description of an expression for error messages
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident { name } => name.clone(),
        Expr::This => "this".into(),
        Expr::Member {
            object,
            property: MemberKey::Name { name },
            ..
        } => format!("{}.{name}", describe(object)),
        Expr::Member { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".into(),
    }
}

/* ===================== References ===================== */

fn read_reference(ctx: &Rc<ExecContext>, reference: &Reference) -> Exec<Value> {
    match reference {
        Reference::Binding { scope, name } => Ok(scope.get_binding(name).unwrap_or_default()),
        Reference::Seed { object, name } => get_member(ctx, &object.clone().into(), name),
        Reference::Global { object, name } => {
            ctx.record_global(name);
            Ok(object.get_raw(name).unwrap_or_default())
        }
        Reference::Unresolved { name } => {
            Err(ExecError::reference_error(format!("{name} is not defined")))
        }
    }
}

/// Assignment target, resolved before the right-hand side runs
enum Place {
    Var(Reference),
    Member { object: Value, key: String },
}

async fn resolve_place(ctx: &Rc<ExecContext>, scope: &Rc<Scope>, target: &Expr) -> Exec<Place> {
    match target {
        Expr::Ident { name } => Ok(Place::Var(scope.lookup(name))),
        Expr::Member {
            object,
            property,
            optional: false,
        } => {
            let object = eval_expr(ctx, scope, object).await?;
            let key = member_key(ctx, scope, property).await?;
            Ok(Place::Member { object, key })
        }
        _ => Err(ExecError::syntax_error("Invalid left-hand side in assignment")),
    }
}

fn read_place(ctx: &Rc<ExecContext>, place: &Place) -> Exec<Value> {
    match place {
        Place::Var(reference) => read_reference(ctx, reference),
        Place::Member { object, key } => get_member(ctx, object, key),
    }
}

fn write_place(ctx: &Rc<ExecContext>, place: &Place, value: Value) -> Exec<()> {
    match place {
        Place::Var(Reference::Binding { scope, name }) => scope.assign_binding(name, value),
        Place::Var(Reference::Seed { object, name }) => set_property(ctx, object, name, value),
        Place::Var(Reference::Global { name, .. }) => {
            Err(SandboxError::AssignGlobal { name: name.clone() }.into())
        }
        Place::Var(Reference::Unresolved { name }) => {
            Err(ExecError::reference_error(format!("{name} is not defined")))
        }
        Place::Member { object, key } => set_member(ctx, object, key, value),
    }
}

async fn member_key(ctx: &Rc<ExecContext>, scope: &Rc<Scope>, key: &MemberKey) -> Exec<String> {
    match key {
        MemberKey::Name { name } => Ok(name.clone()),
        MemberKey::Computed { expr } => Ok(to_property_key(&eval_expr(ctx, scope, expr).await?)),
    }
}

/* ===================== Members & Calls ===================== */

/// Member/call chain; `None` once an optional link short-circuits
fn eval_chain<'a>(
    ctx: &'a Rc<ExecContext>,
    scope: &'a Rc<Scope>,
    expr: &'a Expr,
) -> Eval<'a, Exec<Option<Value>>> {
    Box::pin(async move {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(target) = eval_chain(ctx, scope, object).await? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = member_key(ctx, scope, property).await?;
                get_member(ctx, &target, &key).map(Some)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => {
                let Some((this, func)) = eval_callee(ctx, scope, callee).await? else {
                    return Ok(None);
                };
                if *optional && func.is_nullish() {
                    return Ok(None);
                }
                let args = eval_args(ctx, scope, args).await?;
                if !func.is_callable() {
                    return Err(ExecError::type_error(format!(
                        "{} is not a function",
                        describe(callee)
                    )));
                }
                call(ctx.clone(), func, this, args).await.map(Some)
            }
            other => eval_expr(ctx, scope, other).await.map(Some),
        }
    })
}

/// Callee plus the receiver it was read from
async fn eval_callee(
    ctx: &Rc<ExecContext>,
    scope: &Rc<Scope>,
    callee: &Expr,
) -> Exec<Option<(Value, Value)>> {
    match callee {
        Expr::Member {
            object,
            property,
            optional,
        } => {
            ctx.checkpoint().await?;
            let Some(target) = eval_chain(ctx, scope, object).await? else {
                return Ok(None);
            };
            if *optional && target.is_nullish() {
                return Ok(None);
            }
            let key = member_key(ctx, scope, property).await?;
            let func = get_member(ctx, &target, &key)?;
            Ok(Some((target, func)))
        }
        other => Ok(eval_chain(ctx, scope, other)
            .await?
            .map(|func| (Value::Undefined, func))),
    }
}

/// Argument or element list, expanding spreads
async fn eval_args(ctx: &Rc<ExecContext>, scope: &Rc<Scope>, args: &[Expr]) -> Exec<Vec<Value>> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Expr::Spread { arg } => {
                let value = eval_expr(ctx, scope, arg).await?;
                out.extend(iterate_values(&value)?);
            }
            other => out.push(eval_expr(ctx, scope, other).await?),
        }
    }
    Ok(out)
}

/* ===================== Literals ===================== */

async fn eval_template(ctx: &Rc<ExecContext>, scope: &Rc<Scope>, idx: usize) -> Exec<Value> {
    let template = ctx.constants().template(idx).ok_or_else(bad_constant)?;
    let mut out = String::new();
    for (i, part) in template.parts.iter().enumerate() {
        out.push_str(part);
        if let Some(expr) = template.exprs.get(i) {
            let value = to_string(&eval_expr(ctx, scope, expr).await?);
            ops::check_string_length(out.len() + value.len())?;
            out.push_str(&value);
        }
    }
    Ok(out.into())
}

async fn eval_object(
    ctx: &Rc<ExecContext>,
    scope: &Rc<Scope>,
    props: &[Property],
) -> Exec<Value> {
    let obj = Obj::plain();
    for prop in props {
        match prop {
            Property::KeyValue { key, value } => {
                let key = match key {
                    PropKey::Static { name } => name.clone(),
                    PropKey::Computed { expr } => {
                        to_property_key(&eval_expr(ctx, scope, expr).await?)
                    }
                };
                let value = eval_named(ctx, scope, value, Some(&key)).await?;
                obj.set_raw(&key, value);
            }
            Property::Spread { arg } => match eval_expr(ctx, scope, arg).await? {
                Value::Object(source) => {
                    for (key, value) in own_entries(&source) {
                        obj.set_raw(&key, value);
                    }
                }
                Value::String(s) => {
                    for (i, c) in s.chars().enumerate() {
                        obj.set_raw(&i.to_string(), Value::string(c.to_string()));
                    }
                }
                _ => {}
            },
        }
    }
    Ok(obj.into())
}

/* ===================== Operators ===================== */

fn short_circuits(op: LogicalOp, left: &Value) -> bool {
    match op {
        LogicalOp::And => !truthy(left),
        LogicalOp::Or => truthy(left),
        LogicalOp::Nullish => !left.is_nullish(),
    }
}

fn binary_op(op: BinaryOp, left: &Value, right: &Value) -> Exec<Value> {
    match op {
        BinaryOp::In => Ok(has_property(right, &to_property_key(left))?.into()),
        BinaryOp::InstanceOf => Ok(instance_of(left, right)?.into()),
        _ => ops::binary(op, left, right),
    }
}

async fn eval_unary(
    ctx: &Rc<ExecContext>,
    scope: &Rc<Scope>,
    op: UnaryOp,
    arg: &Expr,
) -> Exec<Value> {
    match op {
        UnaryOp::Typeof => {
            if let Expr::Ident { name } = arg {
                if matches!(scope.lookup(name), Reference::Unresolved { .. }) {
                    return Ok("undefined".into());
                }
            }
            Ok(eval_expr(ctx, scope, arg).await?.type_of().into())
        }
        UnaryOp::Delete => match arg {
            Expr::Member {
                object, property, ..
            } => {
                let Some(target) = eval_chain(ctx, scope, object).await? else {
                    return Ok(true.into());
                };
                let key = member_key(ctx, scope, property).await?;
                Ok(delete_member(ctx, &target, &key)?.into())
            }
            Expr::Ident { .. } => Ok(false.into()),
            other => {
                eval_expr(ctx, scope, other).await?;
                Ok(true.into())
            }
        },
        _ => {
            let value = eval_expr(ctx, scope, arg).await?;
            Ok(match op {
                UnaryOp::Not => (!truthy(&value)).into(),
                UnaryOp::Void => Value::Undefined,
                UnaryOp::Plus => to_number(&value)?.into(),
                UnaryOp::Neg => match to_numeric(&value) {
                    Numeric::Number(n) => Value::Number(-n),
                    Numeric::BigInt(b) => Value::from(-&*b),
                },
                UnaryOp::BitNot => match to_numeric(&value) {
                    Numeric::Number(n) => Value::Number(f64::from(!to_int32(n))),
                    Numeric::BigInt(b) => Value::from(!&*b),
                },
                UnaryOp::Typeof | UnaryOp::Delete => Value::Undefined,
            })
        }
    }
}

async fn eval_update(
    ctx: &Rc<ExecContext>,
    scope: &Rc<Scope>,
    op: UpdateOp,
    prefix: bool,
    target: &Expr,
) -> Exec<Value> {
    let place = resolve_place(ctx, scope, target).await?;
    let current = read_place(ctx, &place)?;
    let (old, new) = match to_numeric(&current) {
        Numeric::Number(n) => {
            let new = if op == UpdateOp::Inc { n + 1.0 } else { n - 1.0 };
            (Value::Number(n), Value::Number(new))
        }
        Numeric::BigInt(b) => {
            let one = BigInt::from(1);
            let new = if op == UpdateOp::Inc { &*b + one } else { &*b - one };
            (Value::BigInt(b), Value::from(new))
        }
    };
    write_place(ctx, &place, new.clone())?;
    Ok(if prefix { new } else { old })
}

async fn eval_assign(
    ctx: &Rc<ExecContext>,
    scope: &Rc<Scope>,
    op: AssignOp,
    target: &Expr,
    value: &Expr,
) -> Exec<Value> {
    let place = resolve_place(ctx, scope, target).await?;
    let name = match target {
        Expr::Ident { name } => Some(name.as_str()),
        _ => None,
    };
    let value = match op {
        AssignOp::Assign => eval_named(ctx, scope, value, name).await?,
        AssignOp::And | AssignOp::Or | AssignOp::Nullish => {
            let current = read_place(ctx, &place)?;
            let logical = match op {
                AssignOp::And => LogicalOp::And,
                AssignOp::Or => LogicalOp::Or,
                _ => LogicalOp::Nullish,
            };
            if short_circuits(logical, &current) {
                return Ok(current);
            }
            eval_named(ctx, scope, value, name).await?
        }
        compound => {
            let current = read_place(ctx, &place)?;
            let rhs = eval_expr(ctx, scope, value).await?;
            let op = compound
                .binary_op()
                .ok_or_else(|| ExecError::syntax_error("Invalid assignment operator"))?;
            ops::binary(op, &current, &rhs)?
        }
    };
    write_place(ctx, &place, value.clone())?;
    Ok(value)
}

async fn eval_await(ctx: &Rc<ExecContext>, scope: &Rc<Scope>, arg: &Expr) -> Exec<Value> {
    if !scope.in_async() {
        return Err(ExecError::IllegalAwait);
    }
    let value = eval_expr(ctx, scope, arg).await?;
    let pending = promise::as_promise(&value);
    yield_now().await;
    let result = match pending {
        Some(cell) => cell.wait().await.map_err(ExecError::Thrown),
        None => Ok(value),
    };
    ctx.checkpoint().await?;
    result
}

/* ===================== Loop Intrinsics ===================== */

fn eval_intrinsic(op: Intrinsic, value: Value) -> Exec<Value> {
    match op {
        Intrinsic::IterateValues => Ok(iterator_object(iterate_values(&value)?)),
        Intrinsic::IterateKeys => Ok(iterator_object(iterate_keys(&value))),
        Intrinsic::IterStep | Intrinsic::IterValue => {
            let Value::Object(obj) = &value else {
                return Err(ExecError::type_error("Iterator expected"));
            };
            let mut o = obj.borrow_mut();
            let ObjectKind::Iterator(state) = &mut o.kind else {
                return Err(ExecError::type_error("Iterator expected"));
            };
            Ok(if op == Intrinsic::IterStep {
                state.step().into()
            } else {
                state.current.clone()
            })
        }
    }
}

pub(crate) fn iterator_object(items: Vec<Value>) -> Value {
    Obj::new(ObjectKind::Iterator(IteratorState::new(items))).into()
}
