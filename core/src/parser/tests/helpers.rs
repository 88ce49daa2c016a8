//! Test helpers for parser tests

use crate::parser::ast::{Expr, Program, Stmt};
use crate::parser::{self, ParseErrorCode};

/// Parse a program and round-trip it through JSON
///
/// The round trip catches AST shapes that serialize but cannot be read back.
pub fn parse_program(source: &str) -> Program {
    let program = parser::parse(source).expect("Parse failed");
    let json = serde_json::to_string(&program).expect("Program serialization failed");
    serde_json::from_str(&json).expect("Program deserialization failed")
}

/// Parse a single expression and return it with its program
pub fn parse_expr(source: &str) -> (Expr, Program) {
    let mut program = parser::parse_expression(source).expect("Parse failed");
    let expr = match program.body.pop() {
        Some(Stmt::Return { value: Some(expr) }) => expr,
        other => panic!("expected an expression, got {other:?}"),
    };
    (expr, program)
}

pub fn parse_error(source: &str) -> ParseErrorCode {
    match parser::parse(source) {
        Ok(program) => panic!("expected a parse error, got {:?}", program.body),
        Err(e) => e.code,
    }
}
