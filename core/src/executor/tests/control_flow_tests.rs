//! Tests for loops, switch, exceptions and other statement-level control

use super::helpers::{numbers, run};
use crate::executor::errors::{ErrorKind, ExecError};
use crate::executor::types::Value;
use crate::parser::ParseErrorCode;
use crate::sandbox::Sandbox;
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_continue_skips_iteration() {
    let source = r#"
        let sum = 0;
        for (let i = 0; i < 5; i++) { if (i === 2) continue; sum += i }
        return sum
    "#;
    assert_eq!(assert_ok!(run(source)), Value::from(8));
}

#[test]
fn test_stray_break_and_continue_fail_to_compile() {
    let sandbox = Sandbox::new();
    for source in ["break", "if (true) { continue }", "function f() { break }"] {
        let err = assert_err!(sandbox.compile(source, false));
        assert_eq!(err.code, ParseErrorCode::IllegalStatement, "source: {source}");
    }
}

#[test]
fn test_switch_falls_through_without_break() {
    let source = r#"
        let x = 0;
        switch (1) { case 1: x = 2; case 2: x = 3; default: x = 4 }
        return x === 4
    "#;
    assert_eq!(assert_ok!(run(source)), Value::from(true));
}

#[test]
fn test_switch_break_and_default_position() {
    let source = r#"
        const out = [];
        for (const v of [1, 2, 9]) {
            switch (v) {
                default: out.push(0); break;
                case 1: out.push(1); break;
                case 2: out.push(2);
            }
        }
        return out
    "#;
    assert_eq!(numbers(&assert_ok!(run(source))), vec![1.0, 2.0, 0.0]);
}

#[test]
fn test_while_do_while_and_break() {
    let source = r#"
        let n = 0;
        while (true) { n++; if (n >= 3) break }
        let m = 10;
        do { m++ } while (m < 5);
        return n * 100 + m
    "#;
    assert_eq!(assert_ok!(run(source)), Value::from(311));
}

#[test]
fn test_for_in_and_for_of() {
    let source = r#"
        const keys = [];
        for (const k in { a: 1, b: 2 }) keys.push(k);
        let total = 0;
        for (const v of [1, 2, 3]) total += v;
        for (const ch of 'xy') keys.push(ch);
        return keys.join('') + total
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("abxy6"));
}

#[test]
fn test_try_catch_finally_ordering() {
    let source = r#"
        const log = [];
        function risky() {
            try {
                log.push('try');
                throw new RangeError('bad');
            } catch (e) {
                log.push(e.name + ':' + e.message);
                return 'from catch';
            } finally {
                log.push('finally');
            }
        }
        log.push(risky());
        return log.join(' | ')
    "#;
    assert_eq!(
        assert_ok!(run(source)),
        Value::string("try | RangeError:bad | finally | from catch")
    );
}

#[test]
fn test_finally_return_supersedes_throw() {
    let source = r#"
        function f() { try { throw 1 } finally { return 'final' } }
        return f()
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("final"));
}

#[test]
fn test_runtime_errors_are_catchable() {
    let source = r#"
        try { null.x } catch (e) { return e instanceof TypeError }
    "#;
    assert_eq!(assert_ok!(run(source)), Value::from(true));
}

#[test]
fn test_uncaught_throw_reaches_host() {
    let err = assert_err!(run("throw { code: 42 }"));
    match err {
        ExecError::Thrown(Value::Object(obj)) => {
            assert_eq!(obj.get_raw("code"), Some(Value::from(42)));
        }
        other => panic!("Expected thrown object, got {:?}", other),
    }
}

#[test]
fn test_type_error_on_calling_non_function() {
    let err = assert_err!(run("const x = 1; x()"));
    assert!(matches!(err, ExecError::Runtime { kind: ErrorKind::TypeError, .. }));
}

#[test]
fn test_conditional_and_comma_expressions() {
    let source = r#"
        let a = (1, 2, 3);
        return a > 2 ? 'big' : 'small'
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("big"));
}

#[test]
fn test_expression_mode_returns_first_statement() {
    let sandbox = Sandbox::new();
    let compiled = assert_ok!(sandbox.compile_expression("1 + 2 * 3", false));
    assert_eq!(assert_ok!(compiled.bind([]).run()), Value::from(7));
}

#[test]
fn test_optimized_program_matches_plain() {
    let sandbox = Sandbox::new();
    let source = "return (2 ** 10) + '-' + ('a' + 'b')";
    let plain = assert_ok!(assert_ok!(sandbox.compile(source, false)).bind([]).run());
    let folded = assert_ok!(assert_ok!(sandbox.compile(source, true)).bind([]).run());
    assert_eq!(plain, Value::string("1024-ab"));
    assert_eq!(plain, folded);
}
