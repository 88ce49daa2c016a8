//! Declaration hoisting
//!
//! Applied to every function body and to the program top level. Function
//! declarations move to the front of the statement list that contains them,
//! and every `var` name declared anywhere in the body (outside nested
//! functions) is pre-declared at the top so it reads as `undefined` before
//! its declaration runs.

use std::collections::HashSet;

use super::ast::{Declarator, LoopDef, Stmt, VarKind};

pub fn hoist(body: Vec<Stmt>) -> Vec<Stmt> {
    let mut names = Vec::new();
    let mut seen = HashSet::new();
    let body = reorder(body, &mut names, &mut seen);
    if names.is_empty() {
        return body;
    }

    let decls = names
        .into_iter()
        .map(|name| Declarator { name, init: None })
        .collect();
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(Stmt::Declare {
        kind: VarKind::Var,
        decls,
    });
    out.extend(body);
    out
}

/// Functions first, in source order; collects `var` names on the way
fn reorder(body: Vec<Stmt>, names: &mut Vec<String>, seen: &mut HashSet<String>) -> Vec<Stmt> {
    let (functions, rest): (Vec<_>, Vec<_>) = body
        .into_iter()
        .partition(|s| matches!(s, Stmt::Function { .. }));
    functions
        .into_iter()
        .chain(rest.into_iter().map(|s| visit(s, names, seen)))
        .collect()
}

fn visit(stmt: Stmt, names: &mut Vec<String>, seen: &mut HashSet<String>) -> Stmt {
    match stmt {
        Stmt::Declare { kind, decls } => {
            if kind == VarKind::Var {
                for d in &decls {
                    if seen.insert(d.name.clone()) {
                        names.push(d.name.clone());
                    }
                }
            }
            Stmt::Declare { kind, decls }
        }
        Stmt::Block { body } => Stmt::Block {
            body: reorder(body, names, seen),
        },
        Stmt::If {
            test,
            then_s,
            else_s,
        } => Stmt::If {
            test,
            then_s: reorder(then_s, names, seen),
            else_s: else_s.map(|b| reorder(b, names, seen)),
        },
        Stmt::Loop { def } => {
            let LoopDef {
                check_first,
                setup,
                init,
                test,
                step,
                pre_step,
                body,
            } = *def;
            let def = LoopDef {
                check_first,
                setup: setup.into_iter().map(|s| visit(s, names, seen)).collect(),
                init: init.map(|s| Box::new(visit(*s, names, seen))),
                test,
                step,
                pre_step: pre_step.into_iter().map(|s| visit(s, names, seen)).collect(),
                body: reorder(body, names, seen),
            };
            Stmt::Loop { def: Box::new(def) }
        }
        Stmt::Switch {
            discriminant,
            cases,
        } => Stmt::Switch {
            discriminant,
            cases: cases
                .into_iter()
                .map(|mut case| {
                    case.body = case.body.into_iter().map(|s| visit(s, names, seen)).collect();
                    case
                })
                .collect(),
        },
        Stmt::Try {
            body,
            catch_var,
            catch_body,
            finally,
        } => Stmt::Try {
            body: reorder(body, names, seen),
            catch_var,
            catch_body: catch_body.map(|b| reorder(b, names, seen)),
            finally: finally.map(|b| reorder(b, names, seen)),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::{Expr, FunctionDef};
    use std::sync::Arc;

    fn function(name: &str) -> Stmt {
        Stmt::Function {
            def: Arc::new(FunctionDef {
                name: Some(name.to_string()),
                ..FunctionDef::default()
            }),
        }
    }

    fn var(name: &str) -> Stmt {
        Stmt::Declare {
            kind: VarKind::Var,
            decls: vec![Declarator {
                name: name.to_string(),
                init: Some(Expr::Number { v: 1.0 }),
            }],
        }
    }

    #[test]
    fn test_functions_move_first() {
        let body = hoist(vec![
            Stmt::Expr {
                expr: Expr::ident("a"),
            },
            function("f"),
            function("g"),
        ]);
        assert!(matches!(&body[0], Stmt::Function { def } if def.name.as_deref() == Some("f")));
        assert!(matches!(&body[1], Stmt::Function { def } if def.name.as_deref() == Some("g")));
        assert!(matches!(&body[2], Stmt::Expr { .. }));
    }

    #[test]
    fn test_nested_vars_are_predeclared_once() {
        let body = hoist(vec![
            Stmt::Block {
                body: vec![var("x"), var("y")],
            },
            var("x"),
        ]);
        let Stmt::Declare { kind, decls } = &body[0] else {
            panic!("expected hoisted declaration");
        };
        assert_eq!(*kind, VarKind::Var);
        let names: Vec<_> = decls.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert!(decls.iter().all(|d| d.init.is_none()));
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn test_let_is_not_hoisted() {
        let body = hoist(vec![Stmt::Declare {
            kind: VarKind::Let,
            decls: vec![Declarator {
                name: "a".to_string(),
                init: None,
            }],
        }]);
        assert_eq!(body.len(), 1);
    }
}
