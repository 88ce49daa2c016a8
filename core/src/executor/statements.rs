//! Statement execution
//!
//! Statements complete with a [`Control`] value; thrown values and
//! executor errors travel through the `Err` side of [`Exec`].

use std::rc::Rc;

use super::call::{error_value, make_closure};
use super::context::ExecContext;
use super::errors::Exec;
use super::expressions::{eval_expr, eval_named};
use super::ops::truthy;
use super::scope::Scope;
use super::types::{Eval, Value};
use crate::parser::ast::{LoopDef, Stmt, SwitchCase, VarKind};
use crate::parser::Expr;

/// How a statement completed
#[derive(Debug, Clone)]
pub enum Control {
    None,
    Break,
    Continue,
    Return(Value),
}

impl Control {
    pub fn is_abrupt(&self) -> bool {
        !matches!(self, Control::None)
    }
}

/* ===================== Statement Lists ===================== */

/// Run statements in `scope` until one completes abruptly
pub fn execute_statements<'a>(
    ctx: &'a Rc<ExecContext>,
    scope: &'a Rc<Scope>,
    stmts: &'a [Stmt],
) -> Eval<'a, Exec<Control>> {
    Box::pin(async move {
        for stmt in stmts {
            let control = execute_stmt(ctx, scope, stmt).await?;
            if control.is_abrupt() {
                return Ok(control);
            }
        }
        Ok(Control::None)
    })
}

/// Run statements in a fresh block scope
async fn execute_block(
    ctx: &Rc<ExecContext>,
    parent: &Rc<Scope>,
    stmts: &[Stmt],
) -> Exec<Control> {
    let scope = Scope::block(parent);
    execute_statements(ctx, &scope, stmts).await
}

/// Run a whole program body; its `return` value is the result
pub async fn run_program(ctx: &Rc<ExecContext>, scope: &Rc<Scope>) -> Exec<Value> {
    match execute_statements(ctx, scope, &ctx.program.body).await? {
        Control::Return(value) => Ok(value),
        _ => Ok(Value::Undefined),
    }
}

/* ===================== Statements ===================== */

pub fn execute_stmt<'a>(
    ctx: &'a Rc<ExecContext>,
    scope: &'a Rc<Scope>,
    stmt: &'a Stmt,
) -> Eval<'a, Exec<Control>> {
    Box::pin(async move {
        ctx.realm.check_stack()?;
        match stmt {
            Stmt::Expr { expr } => {
                eval_expr(ctx, scope, expr).await?;
                Ok(Control::None)
            }

            Stmt::Declare { kind, decls } => {
                for decl in decls {
                    let value = match &decl.init {
                        Some(init) => Some(eval_named(ctx, scope, init, Some(&decl.name)).await?),
                        None => None,
                    };
                    scope.declare(&decl.name, *kind, value)?;
                }
                Ok(Control::None)
            }

            Stmt::Function { def } => {
                ctx.checkpoint().await?;
                let func = make_closure(ctx, scope, def, None)?;
                scope.declare_function(def.name.as_deref().unwrap_or_default(), func)?;
                Ok(Control::None)
            }

            Stmt::Return { value } => {
                let value = match value {
                    Some(expr) => eval_expr(ctx, scope, expr).await?,
                    None => Value::Undefined,
                };
                Ok(Control::Return(value))
            }

            Stmt::Throw { value } => {
                let value = eval_expr(ctx, scope, value).await?;
                Err(super::errors::ExecError::Thrown(value))
            }

            Stmt::If {
                test,
                then_s,
                else_s,
            } => {
                if truthy(&eval_expr(ctx, scope, test).await?) {
                    execute_block(ctx, scope, then_s).await
                } else if let Some(else_s) = else_s {
                    execute_block(ctx, scope, else_s).await
                } else {
                    Ok(Control::None)
                }
            }

            Stmt::Block { body } => execute_block(ctx, scope, body).await,

            Stmt::Loop { def } => execute_loop(ctx, scope, def).await,

            Stmt::Break => Ok(Control::Break),

            Stmt::Continue => Ok(Control::Continue),

            Stmt::Switch {
                discriminant,
                cases,
            } => execute_switch(ctx, scope, discriminant, cases).await,

            Stmt::Try {
                body,
                catch_var,
                catch_body,
                finally,
            } => {
                execute_try(
                    ctx,
                    scope,
                    body,
                    catch_var.as_deref(),
                    catch_body.as_deref(),
                    finally.as_deref(),
                )
                .await
            }

            Stmt::Empty => Ok(Control::None),
        }
    })
}

/* ===================== Loops ===================== */

/// Every loop form: setup and init run once in the head scope, each
/// iteration runs in a fork of the previous one
async fn execute_loop(ctx: &Rc<ExecContext>, scope: &Rc<Scope>, def: &LoopDef) -> Exec<Control> {
    let head = Scope::block(scope);
    for stmt in &def.setup {
        execute_stmt(ctx, &head, stmt).await?;
    }
    if let Some(init) = &def.init {
        execute_stmt(ctx, &head, init).await?;
    }

    let mut current = head.fork();
    let mut first = true;
    loop {
        ctx.checkpoint().await?;
        let skip_test = first && !def.check_first;
        first = false;
        if !skip_test {
            if let Some(test) = &def.test {
                if !truthy(&eval_expr(ctx, &current, test).await?) {
                    break;
                }
            }
        }

        let iteration = Scope::block(&current);
        for stmt in &def.pre_step {
            execute_stmt(ctx, &iteration, stmt).await?;
        }
        match execute_block(ctx, &iteration, &def.body).await? {
            Control::Break => break,
            Control::Return(value) => return Ok(Control::Return(value)),
            Control::None | Control::Continue => {}
        }

        current = current.fork();
        if let Some(step) = &def.step {
            eval_expr(ctx, &current, step).await?;
        }
    }
    Ok(Control::None)
}

/* ===================== Switch ===================== */

async fn execute_switch(
    ctx: &Rc<ExecContext>,
    scope: &Rc<Scope>,
    discriminant: &Expr,
    cases: &[SwitchCase],
) -> Exec<Control> {
    let value = eval_expr(ctx, scope, discriminant).await?;
    let block = Scope::block(scope);

    let mut start = None;
    for (i, case) in cases.iter().enumerate() {
        if let Some(test) = &case.test {
            if eval_expr(ctx, &block, test).await? == value {
                start = Some(i);
                break;
            }
        }
    }
    let Some(start) = start.or_else(|| cases.iter().position(|c| c.test.is_none())) else {
        return Ok(Control::None);
    };

    for case in &cases[start..] {
        match execute_statements(ctx, &block, &case.body).await? {
            Control::None => {}
            Control::Break => return Ok(Control::None),
            other => return Ok(other),
        }
    }
    Ok(Control::None)
}

/* ===================== Try ===================== */

async fn execute_try(
    ctx: &Rc<ExecContext>,
    scope: &Rc<Scope>,
    body: &[Stmt],
    catch_var: Option<&str>,
    catch_body: Option<&[Stmt]>,
    finally: Option<&[Stmt]>,
) -> Exec<Control> {
    let outcome = execute_block(ctx, scope, body).await;

    let outcome = match (outcome, catch_body) {
        (Err(error), Some(handler)) if error.is_catchable() => {
            let catch_scope = Scope::block(scope);
            if let Some(name) = catch_var {
                catch_scope.declare(name, VarKind::Let, Some(error_value(error)))?;
            }
            execute_statements(ctx, &catch_scope, handler).await
        }
        (outcome, _) => outcome,
    };

    let Some(finalizer) = finally else {
        return outcome;
    };
    if matches!(&outcome, Err(e) if !e.is_catchable()) {
        return outcome;
    }
    match execute_block(ctx, scope, finalizer).await? {
        Control::None => outcome,
        abrupt => Ok(abrupt),
    }
}
