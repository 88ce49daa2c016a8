//! Source-to-AST pipeline for the sandboxed language
//!
//! Parsing runs in four passes over text:
//! 1. [`extract`] pulls string, template and regex literals into the
//!    constants pool and strips comments
//! 2. [`normalize`] inserts implicit semicolons and braces unbraced bodies
//! 3. [`stmt`] / [`expr`] build the tree from balanced token spans
//! 4. [`hoist`] lifts function and `var` declarations
//!
//! Optionally [`optimize`] folds constant sub-expressions afterwards.

use serde::{Deserialize, Serialize};

use crate::stack;

pub mod ast;
pub mod extract;
pub mod hoist;
pub mod normalize;
pub mod optimize;
pub mod scan;
pub mod unraw;

mod expr;
mod stmt;
mod tokens;

#[cfg(test)]
mod tests;

pub use ast::{Constants, Expr, FunctionDef, Program, Stmt};

/* ===================== Error Types ===================== */

/// Category of a parse failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseErrorCode {
    UnexpectedToken,
    UnexpectedEnd,
    UnterminatedLiteral,
    UnterminatedComment,
    UnbalancedBracket,
    InvalidEscape,
    InvalidAssignmentTarget,
    IllegalStatement,
    Unsupported,
}

/// Syntax error raised while compiling source text
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[error("{message} near `{snippet}`")]
pub struct ParseError {
    pub code: ParseErrorCode,
    pub message: String,
    /// Offending source text, truncated
    pub snippet: String,
}

impl ParseError {
    pub fn new(code: ParseErrorCode, message: impl Into<String>, snippet: &str) -> Self {
        let snippet = snippet.trim();
        let snippet = match snippet.char_indices().nth(40) {
            Some((cut, _)) => format!("{}...", &snippet[..cut]),
            None => snippet.to_string(),
        };
        ParseError {
            code,
            message: message.into(),
            snippet,
        }
    }

    pub fn unexpected(snippet: &str) -> Self {
        Self::new(ParseErrorCode::UnexpectedToken, "Unexpected token", snippet)
    }

    pub fn unexpected_end(snippet: &str) -> Self {
        Self::new(ParseErrorCode::UnexpectedEnd, "Unexpected end of expression", snippet)
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Fail once the running parse has spent its stack budget
pub(crate) fn ensure_stack(snippet: &str) -> ParseResult<()> {
    if stack::parse_exhausted() {
        return Err(ParseError::new(
            ParseErrorCode::Unsupported,
            "Program is nested too deeply",
            snippet,
        ));
    }
    Ok(())
}

/* ===================== Entry Points ===================== */

/// Knobs for a single parse
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Keep only the first top-level statement; a bare expression becomes the result
    pub expression: bool,
    /// Turn a trailing expression statement into the program's completion value
    pub completion_value: bool,
    /// Fold constant sub-expressions
    pub optimize: bool,
}

/// Parse a whole program with default options
pub fn parse(source: &str) -> ParseResult<Program> {
    parse_with(source, ParseOptions::default())
}

/// Parse a single expression-statement program whose value is the result
pub fn parse_expression(source: &str) -> ParseResult<Program> {
    parse_with(
        source,
        ParseOptions {
            expression: true,
            ..ParseOptions::default()
        },
    )
}

pub fn parse_with(source: &str, options: ParseOptions) -> ParseResult<Program> {
    let mut constants = Constants::default();
    let mut body = stack::parse_scope(|| parse_body(source, &mut constants))?;
    if options.expression {
        body.truncate(1);
    }
    let mut body = hoist::hoist(body);
    if options.expression || options.completion_value {
        if let Some(last) = body.last_mut() {
            if let Stmt::Expr { expr } = last {
                let expr = std::mem::replace(expr, Expr::Undefined);
                *last = Stmt::Return { value: Some(expr) };
            }
        }
    }

    let mut program = Program { body, constants };
    if options.optimize {
        optimize::fold_program(&mut program);
    }
    Ok(program)
}

/// Extract, normalize and parse a top-level statement list
fn parse_body(source: &str, constants: &mut Constants) -> ParseResult<Vec<Stmt>> {
    let text = extract::extract_constants(source, constants)?;
    let text = normalize::normalize(&text)?;
    let mut parser = stmt::Parser::new(constants);
    parser.parse_statements(&text)
}

/// Parse the source of a `${...}` template interpolation
pub(crate) fn parse_fragment(source: &str, constants: &mut Constants) -> ParseResult<Expr> {
    ensure_stack(source)?;
    let text = extract::extract_constants(source, constants)?;
    let text = normalize::normalize(&text)?;
    let mut parser = stmt::Parser::new(constants);
    parser.parse_standalone_expression(&text)
}
