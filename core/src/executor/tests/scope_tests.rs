//! Tests for variable resolution, declarations and closures

use super::helpers::{run, run_in};
use crate::executor::errors::{ErrorKind, ExecError, SandboxError};
use crate::executor::types::{Obj, Value};
use crate::sandbox::Sandbox;
use maplit::hashmap;
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_prefix_increment_returns_new_value() {
    let result = assert_ok!(run("let x = 5; return ++x"));
    assert_eq!(result, Value::from(6));
}

#[test]
fn test_shadowing_resolves_innermost() {
    let source = r#"
        let x = 'outer';
        let seen = [];
        {
            let x = 'block';
            {
                let x = 'inner';
                seen.push(x);
            }
            seen.push(x);
        }
        seen.push(x);
        return seen.join(',')
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("inner,block,outer"));
}

#[test]
fn test_const_assignment_never_mutates() {
    let sandbox = Sandbox::new();
    let witness = Obj::plain();
    let source = r#"
        const k = 1;
        witness.before = k;
        try { k = 2 } finally { witness.after = k }
    "#;
    let err = assert_err!(run_in(&sandbox, source, hashmap! { "witness" => witness.clone().into() }));
    assert!(matches!(
        err,
        ExecError::Sandbox(SandboxError::AssignConst { ref name }) if name == "k"
    ));
    // Policy errors skip finally
    assert_eq!(witness.get_raw("before"), Some(Value::from(1)));
    assert_eq!(witness.get_raw("after"), None);
}

#[test]
fn test_redeclaration_is_syntax_error() {
    let err = assert_err!(run("let a = 1; let a = 2"));
    assert!(matches!(err, ExecError::Runtime { kind: ErrorKind::SyntaxError, .. }));
}

#[test]
fn test_undeclared_read_is_reference_error() {
    let err = assert_err!(run("return missing + 1"));
    assert!(matches!(err, ExecError::Runtime { kind: ErrorKind::ReferenceError, .. }));
    // typeof never throws
    assert_eq!(assert_ok!(run("return typeof missing")), Value::string("undefined"));
}

#[test]
fn test_global_cannot_be_overridden() {
    let err = assert_err!(run("Math = 1"));
    assert!(matches!(
        err,
        ExecError::Sandbox(SandboxError::AssignGlobal { ref name }) if name == "Math"
    ));
}

#[test]
fn test_seed_variables_are_read_and_written() {
    let sandbox = Sandbox::new();
    let vars = Obj::with_props([("count", Value::from(2))]);
    let compiled = assert_ok!(sandbox.compile("count = count * 10; return count", false));
    let result = assert_ok!(compiled.bind([vars.clone()]).run());
    assert_eq!(result, Value::from(20));
    assert_eq!(vars.get_raw("count"), Some(Value::from(20)));
}

#[test]
fn test_inner_seed_shadows_outer_seed() {
    let sandbox = Sandbox::new();
    let outer = Obj::with_props([("name", Value::string("outer")), ("only", Value::from(1))]);
    let inner = Obj::with_props([("name", Value::string("inner"))]);
    let compiled = assert_ok!(sandbox.compile("return name + only", false));
    let result = assert_ok!(compiled.bind([outer, inner]).run());
    assert_eq!(result, Value::string("inner1"));
}

#[test]
fn test_closures_capture_per_iteration_bindings() {
    let source = r#"
        const fns = [];
        for (let i = 0; i < 3; i++) {
            fns.push(() => i);
        }
        return fns.map(f => f()).join('')
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("012"));
}

#[test]
fn test_var_and_function_declarations_hoist() {
    let source = r#"
        const first = typeof later;
        const value = hoisted();
        function hoisted() { return 7 }
        var later = 1;
        return first + value
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("undefined7"));
}

#[test]
fn test_arguments_and_named_function_expressions() {
    let source = r#"
        function count() { return arguments.length }
        const fact = function inner(n) { return n <= 1 ? 1 : n * inner(n - 1) };
        return count(1, 2, 3) * 100 + fact(4)
    "#;
    assert_eq!(assert_ok!(run(source)), Value::from(324));
}

#[test]
fn test_this_inside_methods_and_arrows() {
    let source = r#"
        const counter = {
            n: 1,
            bump() {
                const add = () => { this.n += 1 };
                add();
                return this.n;
            }
        };
        return counter.bump()
    "#;
    assert_eq!(assert_ok!(run(source)), Value::from(2));
}

#[test]
fn test_logical_assignment_operators() {
    let source = r#"
        let a = null; let b = 0; let c = 1;
        a ??= 'set'; b ||= 5; c &&= 9;
        return [a, b, c].join('|')
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("set|5|9"));
}

#[test]
fn test_same_compiled_program_binds_independently() {
    let sandbox = Sandbox::new();
    let compiled = assert_ok!(sandbox.compile("let total = base * 2; return total", false));
    let first = compiled.bind([Obj::with_props([("base", Value::from(1))])]);
    let second = compiled.bind([Obj::with_props([("base", Value::from(5))])]);
    assert_eq!(assert_ok!(second.run()), Value::from(10));
    assert_eq!(assert_ok!(first.run()), Value::from(2));
    // Each run evaluates again in a fresh top-level scope
    assert_eq!(assert_ok!(first.run()), Value::from(2));
}

#[test]
fn test_each_run_evaluates_again_over_the_same_seeds() {
    let sandbox = Sandbox::new();
    let counter = Obj::with_props([("n", Value::from(0))]);
    let execution = assert_ok!(sandbox.compile("let step = 1; n = n + step; return n", false))
        .bind([counter.clone()]);
    let first_id = execution.id();

    assert_eq!(assert_ok!(execution.run()), Value::from(1));
    assert_eq!(assert_ok!(execution.run()), Value::from(2));
    assert_eq!(counter.get_raw("n"), Some(Value::from(2)));
    assert_ne!(execution.id(), first_id);
}
