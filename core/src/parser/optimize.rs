//! Constant folding over a parsed program
//!
//! Only folds operations whose result cannot depend on the environment:
//! arithmetic and comparison on number literals, concatenation of string
//! literals, and short-circuit or conditional expressions with a literal
//! boolean test.

use std::sync::Arc;

use super::ast::{
    BinaryOp, Constants, Expr, LogicalOp, MemberKey, Program, PropKey, Property, Stmt, UnaryOp,
};

pub fn fold_program(program: &mut Program) {
    let Program { body, constants } = program;
    fold_block(body, constants);
}

fn fold_block(body: &mut [Stmt], constants: &mut Constants) {
    for stmt in body {
        fold_stmt(stmt, constants);
    }
}

fn fold_stmt(stmt: &mut Stmt, constants: &mut Constants) {
    match stmt {
        Stmt::Expr { expr } | Stmt::Throw { value: expr } => fold_expr(expr, constants),
        Stmt::Return { value } => {
            if let Some(expr) = value {
                fold_expr(expr, constants);
            }
        }
        Stmt::Declare { decls, .. } => {
            for d in decls.iter_mut() {
                if let Some(init) = &mut d.init {
                    fold_expr(init, constants);
                }
            }
        }
        Stmt::Function { def } => fold_block(&mut Arc::make_mut(def).body, constants),
        Stmt::If {
            test,
            then_s,
            else_s,
        } => {
            fold_expr(test, constants);
            fold_block(then_s, constants);
            if let Some(else_s) = else_s {
                fold_block(else_s, constants);
            }
        }
        Stmt::Block { body } => fold_block(body, constants),
        Stmt::Loop { def } => {
            let def = def.as_mut();
            fold_block(&mut def.setup, constants);
            if let Some(init) = &mut def.init {
                fold_stmt(init, constants);
            }
            for expr in [&mut def.test, &mut def.step].into_iter().flatten() {
                fold_expr(expr, constants);
            }
            fold_block(&mut def.pre_step, constants);
            fold_block(&mut def.body, constants);
        }
        Stmt::Switch {
            discriminant,
            cases,
        } => {
            fold_expr(discriminant, constants);
            for case in cases {
                if let Some(test) = &mut case.test {
                    fold_expr(test, constants);
                }
                fold_block(&mut case.body, constants);
            }
        }
        Stmt::Try {
            body,
            catch_body,
            finally,
            ..
        } => {
            fold_block(body, constants);
            for block in [catch_body, finally].into_iter().flatten() {
                fold_block(block, constants);
            }
        }
        Stmt::Break | Stmt::Continue | Stmt::Empty => {}
    }
}

/// Literal node for a computed number
fn number(v: f64) -> Expr {
    if v.is_nan() {
        Expr::NaN
    } else if v == f64::INFINITY {
        Expr::Infinity
    } else if v == f64::NEG_INFINITY {
        Expr::Unary {
            op: UnaryOp::Neg,
            arg: Box::new(Expr::Infinity),
        }
    } else {
        Expr::Number { v }
    }
}

fn as_number(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Number { v } => Some(*v),
        Expr::NaN => Some(f64::NAN),
        Expr::Infinity => Some(f64::INFINITY),
        _ => None,
    }
}

fn fold_numbers(op: BinaryOp, a: f64, b: f64) -> Option<Expr> {
    Some(match op {
        BinaryOp::Add => number(a + b),
        BinaryOp::Sub => number(a - b),
        BinaryOp::Mul => number(a * b),
        BinaryOp::Div => number(a / b),
        BinaryOp::Rem => number(a % b),
        BinaryOp::Lt => Expr::Bool { v: a < b },
        BinaryOp::LtE => Expr::Bool { v: a <= b },
        BinaryOp::Gt => Expr::Bool { v: a > b },
        BinaryOp::GtE => Expr::Bool { v: a >= b },
        BinaryOp::Eq | BinaryOp::StrictEq => Expr::Bool { v: a == b },
        BinaryOp::NotEq | BinaryOp::StrictNotEq => Expr::Bool { v: a != b },
        _ => return None,
    })
}

fn fold_expr(expr: &mut Expr, constants: &mut Constants) {
    match expr {
        Expr::Array { elements } => elements.iter_mut().for_each(|e| fold_expr(e, constants)),
        Expr::Object { props } => {
            for prop in props {
                match prop {
                    Property::KeyValue { key, value } => {
                        if let PropKey::Computed { expr } = key {
                            fold_expr(expr, constants);
                        }
                        fold_expr(value, constants);
                    }
                    Property::Spread { arg } => fold_expr(arg, constants),
                }
            }
        }
        Expr::Member {
            object, property, ..
        } => {
            fold_expr(object, constants);
            if let MemberKey::Computed { expr } = property {
                fold_expr(expr, constants);
            }
        }
        Expr::Call { callee, args, .. } | Expr::New { callee, args } => {
            fold_expr(callee, constants);
            args.iter_mut().for_each(|e| fold_expr(e, constants));
        }
        Expr::Update { target, .. } => fold_expr(target, constants),
        Expr::Spread { arg } | Expr::Await { arg } | Expr::Intrinsic { arg, .. } => {
            fold_expr(arg, constants)
        }
        Expr::Assign { target, value, .. } => {
            fold_expr(target, constants);
            fold_expr(value, constants);
        }
        Expr::Sequence { exprs } => exprs.iter_mut().for_each(|e| fold_expr(e, constants)),
        Expr::Function { def } => fold_block(&mut Arc::make_mut(def).body, constants),

        Expr::Unary { op, arg } => {
            fold_expr(arg, constants);
            let folded = match (*op, arg.as_ref()) {
                (UnaryOp::Neg, Expr::Number { v }) => Some(Expr::Number { v: -v }),
                (UnaryOp::Plus, a) => as_number(a).map(number),
                (UnaryOp::Not, Expr::Bool { v }) => Some(Expr::Bool { v: !v }),
                (UnaryOp::Not, Expr::Number { v }) => Some(Expr::Bool {
                    v: *v == 0.0 || v.is_nan(),
                }),
                _ => None,
            };
            if let Some(folded) = folded {
                *expr = folded;
            }
        }
        Expr::Binary { op, left, right } => {
            fold_expr(left, constants);
            fold_expr(right, constants);
            let folded = match (left.as_ref(), right.as_ref()) {
                (Expr::Str { idx: a }, Expr::Str { idx: b }) if *op == BinaryOp::Add => {
                    let joined = match (constants.string(*a), constants.string(*b)) {
                        (Some(a), Some(b)) => Some(format!("{a}{b}")),
                        _ => None,
                    };
                    joined.map(|s| {
                        constants.strings.push(s);
                        Expr::Str {
                            idx: constants.strings.len() - 1,
                        }
                    })
                }
                (l, r) => match (as_number(l), as_number(r)) {
                    (Some(a), Some(b)) => fold_numbers(*op, a, b),
                    _ => None,
                },
            };
            if let Some(folded) = folded {
                *expr = folded;
            }
        }
        Expr::Logical { op, left, right } => {
            fold_expr(left, constants);
            fold_expr(right, constants);
            let keep_left = match (*op, left.as_ref()) {
                (LogicalOp::And, Expr::Bool { v }) => Some(!v),
                (LogicalOp::Or, Expr::Bool { v }) => Some(*v),
                (LogicalOp::Nullish, Expr::Null | Expr::Undefined) => Some(false),
                (LogicalOp::Nullish, Expr::Bool { .. } | Expr::Number { .. }) => Some(true),
                _ => None,
            };
            match keep_left {
                Some(true) => *expr = std::mem::replace(left.as_mut(), Expr::Undefined),
                Some(false) => *expr = std::mem::replace(right.as_mut(), Expr::Undefined),
                None => {}
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            fold_expr(test, constants);
            fold_expr(consequent, constants);
            fold_expr(alternate, constants);
            if let Expr::Bool { v } = test.as_ref() {
                let branch = if *v { consequent } else { alternate };
                *expr = std::mem::replace(branch.as_mut(), Expr::Undefined);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_with, ParseOptions};

    fn folded(source: &str) -> Program {
        parse_with(
            source,
            ParseOptions {
                expression: true,
                optimize: true,
                ..ParseOptions::default()
            },
        )
        .unwrap()
    }

    fn result(program: &Program) -> &Expr {
        match &program.body[0] {
            Stmt::Return { value: Some(expr) } => expr,
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn test_fold_arithmetic() {
        let program = folded("1 + 2 * 3");
        assert!(matches!(result(&program), Expr::Number { v } if *v == 7.0));
    }

    #[test]
    fn test_fold_string_concat() {
        let program = folded("'a' + 'b'");
        let Expr::Str { idx } = result(&program) else {
            panic!("expected a string literal");
        };
        assert_eq!(program.constants.string(*idx), Some("ab"));
    }

    #[test]
    fn test_fold_division_by_zero() {
        let program = folded("1 / 0");
        assert!(matches!(result(&program), Expr::Infinity));
        let program = folded("0 / 0");
        assert!(matches!(result(&program), Expr::NaN));
    }

    #[test]
    fn test_identifiers_are_left_alone() {
        let program = folded("x + 1");
        assert!(matches!(result(&program), Expr::Binary { .. }));
        let program = folded("true ? x : y");
        assert!(matches!(result(&program), Expr::Ident { name } if name == "x"));
    }
}
