//! Tests for the security gate: whitelist, forbid flags, construction and audit

use super::helpers::{run, run_in};
use crate::executor::errors::{ErrorKind, ExecError, SandboxError};
use crate::executor::stdlib::collections;
use crate::executor::types::{TypeTag, Value};
use crate::sandbox::Sandbox;
use maplit::hashmap;
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio_test::{assert_err, assert_ok};

fn member_denied(err: &ExecError, ty: &str, name: &str) -> bool {
    matches!(
        err,
        ExecError::Sandbox(SandboxError::MemberNotPermitted { type_name, member })
            if type_name == ty && member == name
    )
}

#[test]
fn test_inherited_member_outside_whitelist_is_denied() {
    let sandbox = Sandbox::builder()
        .allow_members(TypeTag::Array, ["push"])
        .build();
    let source = "const a = [1]; a.push(2); return a.map(x => x)";
    let err = assert_err!(run_in(&sandbox, source, HashMap::new()));
    assert!(member_denied(&err, "Array", "map"), "got {err:?}");
}

#[test]
fn test_empty_whitelist_denies_every_inherited_member() {
    let sandbox = Sandbox::builder()
        .globals(Vec::<String>::new())
        .prototype_whitelist(HashMap::new())
        .build();
    // Own properties stay readable
    let own = assert_ok!(run_in(&sandbox, "const o = { a: 1 }; return o.a", HashMap::new()));
    assert_eq!(own, Value::from(1));

    let err = assert_err!(run_in(&sandbox, "return 'abc'.toUpperCase()", HashMap::new()));
    assert!(member_denied(&err, "String", "toUpperCase"), "got {err:?}");
    let err = assert_err!(run_in(&sandbox, "return ({}).hasOwnProperty('a')", HashMap::new()));
    assert!(member_denied(&err, "Object", "hasOwnProperty"), "got {err:?}");
}

#[test]
fn test_denied_type_blocks_primitive_receivers() {
    let sandbox = Sandbox::builder().deny_type(TypeTag::Number).build();
    let err = assert_err!(run_in(&sandbox, "return (1.5).toFixed(0)", HashMap::new()));
    assert!(member_denied(&err, "Number", "toFixed"), "got {err:?}");
}

#[test]
fn test_policy_errors_bypass_sandboxed_catch() {
    let sandbox = Sandbox::builder().deny_type(TypeTag::String).build();
    let source = "try { 'a'.repeat(2) } catch (e) { return 'caught' }";
    let err = assert_err!(run_in(&sandbox, source, HashMap::new()));
    assert!(err.is_sandbox_error());
}

#[test]
fn test_forbidden_calls_stop_before_native_runs() {
    let sandbox = Sandbox::builder().forbid_function_calls(true).build();
    let err = assert_err!(run_in(&sandbox, "return Math.abs(-1)", HashMap::new()));
    assert!(matches!(err, ExecError::Sandbox(SandboxError::FunctionCallsForbidden)));

    let err = assert_err!(run_in(&sandbox, "const f = () => 1; return f()", HashMap::new()));
    assert!(matches!(err, ExecError::Sandbox(SandboxError::FunctionCallsForbidden)));
}

#[test]
fn test_forbidden_creation_blocks_dynamic_code() {
    let sandbox = Sandbox::builder().forbid_function_creation(true).build();
    for source in [
        "return eval('1 + 1')",
        "return Function('return 1')()",
        "return new Function('a', 'return a')",
        "setTimeout('1', 0)",
        "function f() {} return f.bind(null)",
    ] {
        let err = assert_err!(run_in(&sandbox, source, HashMap::new()));
        assert!(
            matches!(err, ExecError::Sandbox(SandboxError::FunctionCreationForbidden)),
            "source {source}: {err:?}"
        );
    }
    // Function literals count as creation too
    let err = assert_err!(run_in(&sandbox, "const f = x => x * 2", HashMap::new()));
    assert!(matches!(err, ExecError::Sandbox(SandboxError::FunctionCreationForbidden)));
    assert_eq!(
        assert_ok!(run_in(&sandbox, "return [1, 2].length", HashMap::new())),
        Value::from(2)
    );
}

#[test]
fn test_eval_and_function_run_isolated_from_locals() {
    let source = r#"
        let secret = 1;
        const seen = eval("typeof secret");
        const value = eval("let a = 2; a * 21");
        const add = new Function('a', 'b', 'return a + b');
        return [seen, value, add(2, 3)].join(',')
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("undefined,42,5"));
}

#[test]
fn test_eval_syntax_error_is_catchable() {
    let source = r#"
        try { eval("(1 + ") } catch (e) { return e.name }
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("SyntaxError"));
}

#[test]
fn test_construction_requires_known_constructor() {
    let source = r#"
        function Point(x) { this.x = x }
        const p = new Point(3);
        const m = new Map([[1, 'a']]);
        return p instanceof Point && p.x === 3 && m.get(1) === 'a' && !(p instanceof Map)
    "#;
    assert_eq!(assert_ok!(run(source)), Value::from(true));

    // A native constructor the global object does not hold is refused
    let foreign = collections::set_constructor();
    let err = assert_err!(run_in(
        &Sandbox::new(),
        "return new Foreign()",
        hashmap! { "Foreign" => foreign.into() }
    ));
    assert!(matches!(err, ExecError::Sandbox(SandboxError::ConstructionNotAllowed { .. })));
}

#[test]
fn test_builtins_are_protected() {
    let err = assert_err!(run("Math.abs = () => 0"));
    assert!(matches!(err, ExecError::Sandbox(SandboxError::ProtectedObject { .. })));
}

#[test]
fn test_prototype_replacement_substitutes_member() {
    let sandbox = Sandbox::builder()
        .prototype_replacement(TypeTag::Array, |_, member| {
            (member == "join").then(|| Value::from(0))
        })
        .build();
    let result = assert_ok!(run_in(&sandbox, "return [1, 2].join", HashMap::new()));
    assert_eq!(result, Value::from(0));
}

#[test]
fn test_audit_records_instead_of_enforcing() {
    let sandbox = Sandbox::builder()
        .deny_type(TypeTag::Array)
        .forbid_function_calls(true)
        .build();
    let outcome = assert_ok!(sandbox.audit(
        "return Math.max([1, 2].map(x => x * 3)[1]) + 'x'.padStart(2)",
        []
    ));
    assert_eq!(assert_ok!(outcome.result), Value::string("6 x"));
    assert!(outcome.report.globals.contains("Math"));
    assert!(outcome.report.prototype_access["Array"].contains("map"));
    assert!(outcome.report.prototype_access["String"].contains("padStart"));
}

#[test]
fn test_halt_on_sandbox_error_defers_until_resume() {
    let sandbox = Sandbox::builder()
        .halt_on_sandbox_error(true)
        .forbid_function_calls(true)
        .build();
    let halts = Rc::new(Cell::new(0));
    let counter = halts.clone();
    let _subscription = sandbox.subscribe_halt(move || counter.set(counter.get() + 1));

    let execution = assert_ok!(sandbox.compile("return Math.abs(-1)", false)).bind([]);
    assert!(matches!(execution.run(), Err(ExecError::Halted)));
    assert!(sandbox.is_halted());
    assert_eq!(halts.get(), 1);

    let err = assert_err!(execution.resume());
    assert!(matches!(err, ExecError::Sandbox(SandboxError::FunctionCallsForbidden)));
    assert!(!sandbox.is_halted());
}

/* ===================== Resource Limits ===================== */

fn is_range_error(err: &ExecError, expected: &str) -> bool {
    matches!(
        err,
        ExecError::Runtime { kind: ErrorKind::RangeError, message } if message == expected
    )
}

#[test]
fn test_unbounded_recursion_is_catchable() {
    let source = r#"
        function f() { return f() }
        try { f() } catch (e) { return e instanceof RangeError && e.message }
    "#;
    assert_eq!(
        assert_ok!(run(source)),
        Value::string("Maximum call stack size exceeded")
    );
}

#[test]
fn test_uncaught_recursion_fails_the_run() {
    let source = "function f(n) { return n === 0 ? 0 : 1 + f(n - 1) } return f(100000)";
    let err = assert_err!(run(source));
    assert!(is_range_error(&err, "Maximum call stack size exceeded"), "got {err:?}");
}

#[test]
fn test_recursion_through_natives_is_bounded() {
    let source = r#"
        function g() { return [1].map(g) }
        try { g() } catch (e) { return e.name }
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("RangeError"));
}

#[test]
fn test_shallow_recursion_and_reuse_after_overflow() {
    let sandbox = Sandbox::new();
    let deep = "function f() { return f() } f()";
    let err = assert_err!(run_in(&sandbox, deep, HashMap::new()));
    assert!(is_range_error(&err, "Maximum call stack size exceeded"), "got {err:?}");

    // The depth count unwinds with the failed run
    let source = "function f(n) { return n === 0 ? 0 : 1 + f(n - 1) } return f(10)";
    assert_eq!(assert_ok!(run_in(&sandbox, source, HashMap::new())), Value::from(10));
}

#[test]
fn test_oversized_strings_are_range_errors() {
    for source in [
        "return 'a'.padStart(Infinity).length",
        "return 'a'.padEnd(2 ** 40, 'xy')",
        "return 'ab'.repeat(2 ** 29)",
        "const parts = []; for (let i = 0; i < 600; i++) parts.push(i); return parts.join('-'.repeat(2 ** 20))",
    ] {
        let err = assert_err!(run(source));
        assert!(is_range_error(&err, "Invalid string length"), "{source}: got {err:?}");
    }
    assert_eq!(assert_ok!(run("return 'a'.padStart(4, 'xy')")), Value::string("xyxa"));
    let caught = "try { 'a'.padEnd(Infinity) } catch (e) { return e.name }";
    assert_eq!(assert_ok!(run(caught)), Value::string("RangeError"));
}
