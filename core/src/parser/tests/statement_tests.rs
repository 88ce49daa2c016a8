//! Tests for statements, loop lowering and hoisting

use super::helpers::parse_program;
use crate::parser::ast::{Expr, Intrinsic, Stmt, VarKind};
use crate::parser::{parse_with, ParseOptions};

#[test]
fn test_semicolon_insertion() {
    let program = parse_program(
        r#"
        let a = 1
        let b = a
        b++
        "#,
    );
    assert_eq!(program.body.len(), 3);
    assert!(matches!(
        &program.body[0],
        Stmt::Declare {
            kind: VarKind::Let,
            ..
        }
    ));
    assert!(matches!(&program.body[2], Stmt::Expr { .. }));
}

#[test]
fn test_if_else_chain() {
    let program = parse_program("if (a) b(); else if (c) d(); else e()");
    let Stmt::If { else_s, then_s, .. } = &program.body[0] else {
        panic!("expected if");
    };
    assert_eq!(then_s.len(), 1);
    let else_s = else_s.as_ref().unwrap();
    assert!(matches!(&else_s[0], Stmt::If { else_s: Some(_), .. }));
}

#[test]
fn test_classic_for_loop() {
    let program = parse_program("for (let i = 0; i < 3; i++) { sum += i }");
    let Stmt::Loop { def } = &program.body[0] else {
        panic!("expected loop");
    };
    assert!(def.check_first);
    assert!(matches!(
        def.init.as_deref(),
        Some(Stmt::Declare {
            kind: VarKind::Let,
            ..
        })
    ));
    assert!(def.test.is_some());
    assert!(def.step.is_some());
    assert_eq!(def.body.len(), 1);
}

#[test]
fn test_empty_for_header() {
    let program = parse_program("for (;;) { break }");
    let Stmt::Loop { def } = &program.body[0] else {
        panic!("expected loop");
    };
    assert!(def.init.is_none() && def.test.is_none() && def.step.is_none());
    assert!(matches!(def.body[0], Stmt::Break));
}

#[test]
fn test_for_of_lowering() {
    let program = parse_program("for (const x of items) { f(x) }");
    let Stmt::Loop { def } = &program.body[0] else {
        panic!("expected loop");
    };
    assert!(matches!(
        &def.setup[0],
        Stmt::Declare { decls, .. }
            if matches!(decls[0].init, Some(Expr::Intrinsic { op: Intrinsic::IterateValues, .. }))
    ));
    assert!(matches!(
        def.test,
        Some(Expr::Intrinsic {
            op: Intrinsic::IterStep,
            ..
        })
    ));
    assert!(matches!(
        &def.pre_step[0],
        Stmt::Declare {
            kind: VarKind::Const,
            ..
        }
    ));
}

#[test]
fn test_for_in_without_declaration_assigns() {
    let program = parse_program("for (k in obj) { }");
    let Stmt::Loop { def } = &program.body[0] else {
        panic!("expected loop");
    };
    assert!(matches!(
        &def.setup[0],
        Stmt::Declare { decls, .. }
            if matches!(decls[0].init, Some(Expr::Intrinsic { op: Intrinsic::IterateKeys, .. }))
    ));
    assert!(matches!(
        &def.pre_step[0],
        Stmt::Expr {
            expr: Expr::Assign { .. }
        }
    ));
}

#[test]
fn test_do_while() {
    let program = parse_program("do { i++ } while (i < 3); done()");
    assert_eq!(program.body.len(), 2);
    let Stmt::Loop { def } = &program.body[0] else {
        panic!("expected loop");
    };
    assert!(!def.check_first);
}

#[test]
fn test_switch_with_default() {
    let program = parse_program(
        r#"
        switch (x) {
            case 1:
            case 2: y = 1; break
            default: y = 2
        }
        "#,
    );
    let Stmt::Switch { cases, .. } = &program.body[0] else {
        panic!("expected switch");
    };
    assert_eq!(cases.len(), 3);
    assert!(cases[0].body.is_empty());
    assert_eq!(cases[1].body.len(), 2);
    assert!(cases[2].test.is_none());
}

#[test]
fn test_try_catch_finally() {
    let program = parse_program("try { a() } catch (e) { b(e) } finally { c() }");
    let Stmt::Try {
        catch_var,
        catch_body,
        finally,
        ..
    } = &program.body[0]
    else {
        panic!("expected try");
    };
    assert_eq!(catch_var.as_deref(), Some("e"));
    assert!(catch_body.is_some());
    assert!(finally.is_some());
}

#[test]
fn test_catch_without_binding() {
    let program = parse_program("try { a() } catch { b() }");
    let Stmt::Try { catch_var, .. } = &program.body[0] else {
        panic!("expected try");
    };
    assert!(catch_var.is_none());
}

#[test]
fn test_function_declarations_hoist() {
    let program = parse_program(
        r#"
        const r = f()
        function f() { return g() }
        function g() { return 1 }
        "#,
    );
    assert!(matches!(&program.body[0], Stmt::Function { def } if def.name.as_deref() == Some("f")));
    assert!(matches!(&program.body[1], Stmt::Function { def } if def.name.as_deref() == Some("g")));
    assert!(matches!(&program.body[2], Stmt::Declare { .. }));
}

#[test]
fn test_var_hoisting_inside_blocks() {
    let program = parse_program("if (a) { var x = 1 } x");
    let Stmt::Declare { kind, decls } = &program.body[0] else {
        panic!("expected hoisted var");
    };
    assert_eq!(*kind, VarKind::Var);
    assert_eq!(decls[0].name, "x");
    assert!(decls[0].init.is_none());
}

#[test]
fn test_function_bodies_hoist_independently() {
    let program = parse_program("function outer() { inner(); function inner() {} }");
    let Stmt::Function { def } = &program.body[0] else {
        panic!("expected function");
    };
    assert!(matches!(&def.body[0], Stmt::Function { .. }));
}

#[test]
fn test_async_function_declaration() {
    let program = parse_program("async function f(a, b) { await a }");
    let Stmt::Function { def } = &program.body[0] else {
        panic!("expected function");
    };
    assert!(def.is_async);
    assert_eq!(def.params.len(), 2);
}

#[test]
fn test_completion_value_option() {
    let program = parse_with(
        "let a = 2\na * 3",
        ParseOptions {
            completion_value: true,
            ..ParseOptions::default()
        },
    )
    .unwrap();
    assert!(matches!(&program.body[1], Stmt::Return { value: Some(_) }));
}

#[test]
fn test_keyword_object_keys() {
    let program = parse_program("const o = { if: 1, return: 2 }");
    assert_eq!(program.body.len(), 1);
}

#[test]
fn test_comments_ignored() {
    let program = parse_program("// leading\nlet a = 1 /* inline */ + 2\n/* block\n */ a");
    assert_eq!(program.body.len(), 2);
}
