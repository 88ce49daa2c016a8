//! Tests for rejected programs

use super::helpers::parse_error;
use crate::parser::{self, ParseErrorCode};

#[test]
fn test_unterminated_literals() {
    assert_eq!(parse_error("let a = 'abc"), ParseErrorCode::UnterminatedLiteral);
    assert_eq!(parse_error("let a = `abc"), ParseErrorCode::UnterminatedLiteral);
    assert_eq!(parse_error("a /* b"), ParseErrorCode::UnterminatedComment);
}

#[test]
fn test_unbalanced_brackets() {
    assert_eq!(parse_error("f(a, b"), ParseErrorCode::UnbalancedBracket);
    assert_eq!(parse_error("if (a) { b()"), ParseErrorCode::UnbalancedBracket);
}

#[test]
fn test_illegal_break_and_continue() {
    assert_eq!(parse_error("break"), ParseErrorCode::IllegalStatement);
    assert_eq!(
        parse_error("switch (a) { case 1: continue }"),
        ParseErrorCode::IllegalStatement
    );
    assert_eq!(
        parse_error("while (a) { function f() { break } }"),
        ParseErrorCode::IllegalStatement
    );
}

#[test]
fn test_break_inside_switch_in_loop_is_legal() {
    assert!(parser::parse("while (a) { switch (b) { case 1: continue; default: break } }").is_ok());
}

#[test]
fn test_invalid_assignment_targets() {
    assert_eq!(parse_error("1 = a"), ParseErrorCode::InvalidAssignmentTarget);
    assert_eq!(parse_error("a?.b = 1"), ParseErrorCode::InvalidAssignmentTarget);
    assert_eq!(parse_error("f() = 1"), ParseErrorCode::InvalidAssignmentTarget);
    assert_eq!(parse_error("a + b++ = 1"), ParseErrorCode::InvalidAssignmentTarget);
}

#[test]
fn test_const_requires_initializer() {
    assert_eq!(parse_error("const a"), ParseErrorCode::UnexpectedEnd);
}

#[test]
fn test_function_declaration_requires_name() {
    assert_eq!(parse_error("function () {}"), ParseErrorCode::UnexpectedToken);
}

#[test]
fn test_duplicate_default() {
    assert_eq!(
        parse_error("switch (a) { default: b(); default: c() }"),
        ParseErrorCode::IllegalStatement
    );
}

#[test]
fn test_unsupported_syntax() {
    assert_eq!(parse_error("let { a } = b"), ParseErrorCode::Unsupported);
    assert_eq!(parse_error("function f(a = 1) {}"), ParseErrorCode::Unsupported);
    assert_eq!(parse_error("outer: while (a) {}"), ParseErrorCode::Unsupported);
}

#[test]
fn test_invalid_numbers() {
    assert_eq!(parse_error("let a = 3abc"), ParseErrorCode::UnexpectedToken);
}

#[test]
fn test_error_snippet_is_truncated() {
    let long = format!("f({}", "a, ".repeat(40));
    let err = parser::parse(&long).unwrap_err();
    assert!(err.snippet.chars().count() <= 43);
}

#[test]
fn test_deep_nesting_is_rejected() {
    let parens = format!("return {}1{}", "(".repeat(5000), ")".repeat(5000));
    assert_eq!(parse_error(&parens), ParseErrorCode::Unsupported);
    let arrays = format!("x = {}{}", "[".repeat(5000), "]".repeat(5000));
    assert_eq!(parse_error(&arrays), ParseErrorCode::Unsupported);
    let nots = format!("return {}x", "!".repeat(20000));
    assert_eq!(parse_error(&nots), ParseErrorCode::Unsupported);
}

#[test]
fn test_moderate_nesting_still_parses() {
    let parens = format!("return {}1{}", "(".repeat(12), ")".repeat(12));
    assert!(parser::parse(&parens).is_ok());
    assert!(parser::parse("if (a) { if (b) { while (c) { f(() => { return [[g(1)]] }) } } }").is_ok());
}
