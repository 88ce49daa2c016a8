//! Expression parsing over token spans
//!
//! Expressions are parsed top-down by splitting a flat token slice at the
//! operator that binds loosest: commas, then arrows, assignment, the
//! conditional operator, and finally the binary precedence table. Every
//! token is first given a [`Role`] so that `-` in `a - b` and `-b` are told
//! apart without a lookahead grammar.

use std::sync::Arc;

use super::ast::{
    AssignOp, BinaryOp, Expr, FunctionDef, LogicalOp, MemberKey, PropKey, Property, Stmt,
    UnaryOp, UpdateOp,
};
use super::stmt::Parser;
use super::tokens::{is_keyword, split_on, tokenize, Tok, TokenType};
use super::{ensure_stack, ParseError, ParseErrorCode, ParseResult};

/* ===================== Token Roles ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Operand,
    Prefix,
    Binary,
    Postfix,
    Other,
}

const BINARY_PUNCT: &[&str] = &[
    "??", "||", "&&", "|", "^", "&", "==", "!=", "===", "!==", "<", ">", "<=", ">=", "<<", ">>",
    ">>>", "+", "-", "*", "/", "%", "**",
];

fn roles(toks: &[Tok<'_>]) -> Vec<Role> {
    let mut out = Vec::with_capacity(toks.len());
    let mut expect_value = true;
    let mut member_name = false;

    for t in toks {
        let role = match t.ty {
            TokenType::Word if member_name => {
                expect_value = false;
                Role::Operand
            }
            TokenType::Word if expect_value => {
                if matches!(
                    t.text,
                    "typeof" | "void" | "delete" | "await" | "new" | "function" | "async"
                ) {
                    Role::Prefix
                } else {
                    expect_value = false;
                    Role::Operand
                }
            }
            TokenType::Word => {
                if matches!(t.text, "in" | "instanceof") {
                    expect_value = true;
                    Role::Binary
                } else {
                    Role::Other
                }
            }
            TokenType::Group => {
                let role = if expect_value {
                    Role::Operand
                } else {
                    Role::Postfix
                };
                expect_value = false;
                role
            }
            TokenType::Number | TokenType::Str | TokenType::Template | TokenType::Regex => {
                expect_value = false;
                Role::Operand
            }
            TokenType::Punct => match t.text {
                "." | "?." => {
                    expect_value = false;
                    member_name = true;
                    out.push(Role::Postfix);
                    continue;
                }
                "++" | "--" if !expect_value => Role::Postfix,
                "++" | "--" | "!" | "~" | "+" | "-" | "..." if expect_value => Role::Prefix,
                p if !expect_value && BINARY_PUNCT.contains(&p) => {
                    expect_value = true;
                    Role::Binary
                }
                _ => {
                    expect_value = true;
                    Role::Other
                }
            },
        };
        member_name = false;
        out.push(role);
    }

    out
}

/* ===================== Precedence Table ===================== */

#[derive(Debug, Clone, Copy)]
enum BinKind {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

/// Loosest-binding level first; the last level (`**`) is right-associative
const BINARY_LEVELS: &[&[(&str, BinKind)]] = &[
    &[("??", BinKind::Logical(LogicalOp::Nullish))],
    &[("||", BinKind::Logical(LogicalOp::Or))],
    &[("&&", BinKind::Logical(LogicalOp::And))],
    &[("|", BinKind::Binary(BinaryOp::BitOr))],
    &[("^", BinKind::Binary(BinaryOp::BitXor))],
    &[("&", BinKind::Binary(BinaryOp::BitAnd))],
    &[
        ("==", BinKind::Binary(BinaryOp::Eq)),
        ("!=", BinKind::Binary(BinaryOp::NotEq)),
        ("===", BinKind::Binary(BinaryOp::StrictEq)),
        ("!==", BinKind::Binary(BinaryOp::StrictNotEq)),
    ],
    &[
        ("<", BinKind::Binary(BinaryOp::Lt)),
        (">", BinKind::Binary(BinaryOp::Gt)),
        ("<=", BinKind::Binary(BinaryOp::LtE)),
        (">=", BinKind::Binary(BinaryOp::GtE)),
        ("instanceof", BinKind::Binary(BinaryOp::InstanceOf)),
        ("in", BinKind::Binary(BinaryOp::In)),
    ],
    &[
        ("<<", BinKind::Binary(BinaryOp::Shl)),
        (">>", BinKind::Binary(BinaryOp::Shr)),
        (">>>", BinKind::Binary(BinaryOp::UShr)),
    ],
    &[
        ("+", BinKind::Binary(BinaryOp::Add)),
        ("-", BinKind::Binary(BinaryOp::Sub)),
    ],
    &[
        ("*", BinKind::Binary(BinaryOp::Mul)),
        ("/", BinKind::Binary(BinaryOp::Div)),
        ("%", BinKind::Binary(BinaryOp::Rem)),
    ],
    &[("**", BinKind::Binary(BinaryOp::Exp))],
];

fn snippet(toks: &[Tok<'_>]) -> String {
    toks.iter()
        .take(8)
        .map(|t| t.text)
        .collect::<Vec<_>>()
        .join(" ")
}

fn unexpected(toks: &[Tok<'_>]) -> ParseError {
    if toks.is_empty() {
        ParseError::unexpected_end("")
    } else {
        ParseError::unexpected(&snippet(toks))
    }
}

/* ===================== Expression Parser ===================== */

impl<'c> Parser<'c> {
    /// Full expression, including comma sequences
    pub(super) fn parse_expression(&mut self, toks: &[Tok<'_>]) -> ParseResult<Expr> {
        if toks.is_empty() {
            return Err(ParseError::unexpected_end(""));
        }
        let parts = split_on(toks, ",");
        if parts.len() == 1 {
            return self.parse_assign(toks);
        }
        let exprs = parts
            .into_iter()
            .map(|part| self.parse_assign(part))
            .collect::<ParseResult<Vec<_>>>()?;
        Ok(Expr::Sequence { exprs })
    }

    pub(super) fn parse_expression_text(&mut self, text: &str) -> ParseResult<Expr> {
        let toks = tokenize(text)?;
        self.parse_expression(&toks)
    }

    /// Assignment-level expression: arrows, assignments and conditionals
    pub(super) fn parse_assign(&mut self, toks: &[Tok<'_>]) -> ParseResult<Expr> {
        if toks.is_empty() {
            return Err(ParseError::unexpected_end(""));
        }
        ensure_stack(toks[0].text)?;
        if let Some(arrow) = self.try_arrow(toks)? {
            return Ok(arrow);
        }

        let assign_at = toks
            .iter()
            .position(|t| t.ty == TokenType::Punct && AssignOp::from_token(t.text).is_some());
        if let Some(at) = assign_at {
            let conditional_first = toks[..at].iter().any(|t| t.is_punct("?"));
            if !conditional_first {
                let op = AssignOp::from_token(toks[at].text).unwrap_or(AssignOp::Assign);
                let target = self.parse_conditional(&toks[..at])?;
                if !target.is_assignable() {
                    return Err(ParseError::new(
                        ParseErrorCode::InvalidAssignmentTarget,
                        "Invalid left-hand side in assignment",
                        &snippet(toks),
                    ));
                }
                let value = self.parse_assign(&toks[at + 1..])?;
                return Ok(Expr::Assign {
                    op,
                    target: Box::new(target),
                    value: Box::new(value),
                });
            }
        }

        self.parse_conditional(toks)
    }

    fn try_arrow(&mut self, toks: &[Tok<'_>]) -> ParseResult<Option<Expr>> {
        let is_async = toks.len() > 2
            && toks[0].is_word("async")
            && (toks[1].ty == TokenType::Word || toks[1].is_group('('))
            && toks[2].is_punct("=>");
        let rest = if is_async { &toks[1..] } else { toks };

        if rest.len() < 2 || !rest[1].is_punct("=>") {
            return Ok(None);
        }
        let params = match rest[0].ty {
            TokenType::Word if !is_keyword(rest[0].text) => rest[0].text,
            TokenType::Group if rest[0].is_group('(') => rest[0].inner(),
            _ => return Ok(None),
        };
        let body = &rest[2..];
        if body.is_empty() {
            return Err(ParseError::unexpected_end(&snippet(toks)));
        }

        let def = if body.len() == 1 && body[0].is_group('{') {
            self.parse_function(None, params, body[0].inner(), is_async, true)?
        } else {
            let mut def = self.parse_function(None, params, "", is_async, true)?;
            let value = self.parse_assign(body)?;
            def.body = vec![Stmt::Return { value: Some(value) }];
            def
        };
        Ok(Some(Expr::Function { def: Arc::new(def) }))
    }

    fn parse_conditional(&mut self, toks: &[Tok<'_>]) -> ParseResult<Expr> {
        let Some(q) = toks.iter().position(|t| t.is_punct("?")) else {
            return self.parse_binary(toks, 0);
        };

        let mut depth = 0usize;
        let mut colon = None;
        for (i, t) in toks.iter().enumerate().skip(q + 1) {
            if t.is_punct("?") {
                depth += 1;
            } else if t.is_punct(":") {
                if depth == 0 {
                    colon = Some(i);
                    break;
                }
                depth -= 1;
            }
        }
        let Some(c) = colon else {
            return Err(ParseError::unexpected_end(&snippet(toks)));
        };

        Ok(Expr::Conditional {
            test: Box::new(self.parse_binary(&toks[..q], 0)?),
            consequent: Box::new(self.parse_assign(&toks[q + 1..c])?),
            alternate: Box::new(self.parse_assign(&toks[c + 1..])?),
        })
    }

    fn parse_binary(&mut self, toks: &[Tok<'_>], level: usize) -> ParseResult<Expr> {
        if level >= BINARY_LEVELS.len() {
            return self.parse_unary(toks);
        }
        if toks.is_empty() {
            return Err(ParseError::unexpected_end(""));
        }
        ensure_stack(toks[0].text)?;

        let ops = BINARY_LEVELS[level];
        let right_assoc = level == BINARY_LEVELS.len() - 1;
        let roles = roles(toks);
        let mut found = None;
        for (i, (t, role)) in toks.iter().zip(&roles).enumerate() {
            if *role == Role::Binary && ops.iter().any(|(s, _)| *s == t.text) {
                found = Some(i);
                if right_assoc {
                    break;
                }
            }
        }
        let Some(at) = found else {
            return self.parse_binary(toks, level + 1);
        };
        let Some(kind) = ops
            .iter()
            .find(|(s, _)| *s == toks[at].text)
            .map(|(_, k)| *k)
        else {
            return Err(unexpected(&toks[at..]));
        };

        let (left, right) = if right_assoc {
            (
                self.parse_binary(&toks[..at], level + 1)?,
                self.parse_binary(&toks[at + 1..], level)?,
            )
        } else {
            (
                self.parse_binary(&toks[..at], level)?,
                self.parse_binary(&toks[at + 1..], level + 1)?,
            )
        };
        let (left, right) = (Box::new(left), Box::new(right));
        Ok(match kind {
            BinKind::Binary(op) => Expr::Binary { op, left, right },
            BinKind::Logical(op) => Expr::Logical { op, left, right },
        })
    }

    fn parse_unary(&mut self, toks: &[Tok<'_>]) -> ParseResult<Expr> {
        let Some(first) = toks.first() else {
            return Err(ParseError::unexpected_end(""));
        };
        ensure_stack(first.text)?;
        let rest = &toks[1..];

        let op = match (first.ty, first.text) {
            (TokenType::Punct, "!") => UnaryOp::Not,
            (TokenType::Punct, "-") => UnaryOp::Neg,
            (TokenType::Punct, "+") => UnaryOp::Plus,
            (TokenType::Punct, "~") => UnaryOp::BitNot,
            (TokenType::Word, "typeof") => UnaryOp::Typeof,
            (TokenType::Word, "void") => UnaryOp::Void,
            (TokenType::Word, "delete") => UnaryOp::Delete,
            (TokenType::Word, "await") => {
                return Ok(Expr::Await {
                    arg: Box::new(self.parse_unary(rest)?),
                })
            }
            (TokenType::Punct, "++" | "--") => {
                let target = self.parse_unary(rest)?;
                if !target.is_assignable() {
                    return Err(ParseError::new(
                        ParseErrorCode::InvalidAssignmentTarget,
                        "Invalid left-hand side expression in prefix operation",
                        &snippet(toks),
                    ));
                }
                let op = if first.text == "++" {
                    UpdateOp::Inc
                } else {
                    UpdateOp::Dec
                };
                return Ok(Expr::Update {
                    op,
                    prefix: true,
                    target: Box::new(target),
                });
            }
            _ => return self.parse_postfix(toks),
        };

        Ok(Expr::Unary {
            op,
            arg: Box::new(self.parse_unary(rest)?),
        })
    }

    fn parse_postfix(&mut self, toks: &[Tok<'_>]) -> ParseResult<Expr> {
        let (mut expr, mut i) = if toks.first().is_some_and(|t| t.is_word("new")) {
            self.parse_new(toks)?
        } else {
            self.parse_primary(toks)?
        };

        while i < toks.len() {
            let t = toks[i];
            if t.is_punct(".") || t.is_punct("?.") {
                let optional = t.text == "?.";
                let Some(next) = toks.get(i + 1) else {
                    return Err(ParseError::unexpected_end(&snippet(toks)));
                };
                expr = match next.ty {
                    TokenType::Word => Expr::Member {
                        object: Box::new(expr),
                        property: MemberKey::Name {
                            name: next.text.to_string(),
                        },
                        optional,
                    },
                    TokenType::Group if optional && next.is_group('(') => Expr::Call {
                        callee: Box::new(expr),
                        args: self.parse_arguments(next.inner())?,
                        optional: true,
                    },
                    TokenType::Group if optional && next.is_group('[') => Expr::Member {
                        object: Box::new(expr),
                        property: self.computed_key(next)?,
                        optional: true,
                    },
                    _ => return Err(unexpected(&toks[i..])),
                };
                i += 2;
            } else if t.is_group('(') {
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args: self.parse_arguments(t.inner())?,
                    optional: false,
                };
                i += 1;
            } else if t.is_group('[') {
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: self.computed_key(&t)?,
                    optional: false,
                };
                i += 1;
            } else if t.is_punct("++") || t.is_punct("--") {
                if !expr.is_assignable() {
                    return Err(ParseError::new(
                        ParseErrorCode::InvalidAssignmentTarget,
                        "Invalid left-hand side expression in postfix operation",
                        &snippet(toks),
                    ));
                }
                let op = if t.text == "++" {
                    UpdateOp::Inc
                } else {
                    UpdateOp::Dec
                };
                expr = Expr::Update {
                    op,
                    prefix: false,
                    target: Box::new(expr),
                };
                i += 1;
            } else {
                return Err(unexpected(&toks[i..]));
            }
        }

        Ok(expr)
    }

    fn computed_key(&mut self, group: &Tok<'_>) -> ParseResult<MemberKey> {
        Ok(MemberKey::Computed {
            expr: Box::new(self.parse_expression_text(group.inner())?),
        })
    }

    /// `new Callee.path(args)`; returns the expression and tokens consumed
    fn parse_new(&mut self, toks: &[Tok<'_>]) -> ParseResult<(Expr, usize)> {
        let (mut callee, mut i) = if toks.get(1).is_some_and(|t| t.is_word("new")) {
            let (inner, used) = self.parse_new(&toks[1..])?;
            (inner, used + 1)
        } else {
            let (primary, used) = self.parse_primary(&toks[1..])?;
            (primary, used + 1)
        };

        while i < toks.len() {
            if toks[i].is_punct(".") && toks.get(i + 1).is_some_and(|t| t.ty == TokenType::Word) {
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: MemberKey::Name {
                        name: toks[i + 1].text.to_string(),
                    },
                    optional: false,
                };
                i += 2;
            } else if toks[i].is_group('[') {
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: self.computed_key(&toks[i])?,
                    optional: false,
                };
                i += 1;
            } else {
                break;
            }
        }

        let args = match toks.get(i) {
            Some(t) if t.is_group('(') => {
                i += 1;
                self.parse_arguments(t.inner())?
            }
            _ => Vec::new(),
        };
        Ok((
            Expr::New {
                callee: Box::new(callee),
                args,
            },
            i,
        ))
    }

    fn parse_primary(&mut self, toks: &[Tok<'_>]) -> ParseResult<(Expr, usize)> {
        let Some(t) = toks.first() else {
            return Err(ParseError::unexpected_end(""));
        };
        let placeholder = || t.placeholder().ok_or_else(|| ParseError::unexpected(t.text));

        let expr = match t.ty {
            TokenType::Number => parse_number(t.text)?,
            TokenType::Str => Expr::Str { idx: placeholder()? },
            TokenType::Template => Expr::Template { idx: placeholder()? },
            TokenType::Regex => Expr::Regex { idx: placeholder()? },
            TokenType::Group => match t.group() {
                Some('(') => {
                    let inner = tokenize(t.inner())?;
                    if inner.is_empty() {
                        return Err(unexpected(toks));
                    }
                    self.parse_expression(&inner)?
                }
                Some('[') => self.parse_array(t.inner())?,
                _ => self.parse_object(t.inner())?,
            },
            TokenType::Word => match t.text {
                "true" => Expr::Bool { v: true },
                "false" => Expr::Bool { v: false },
                "null" => Expr::Null,
                "undefined" => Expr::Undefined,
                "NaN" => Expr::NaN,
                "Infinity" => Expr::Infinity,
                "this" => Expr::This,
                "function" => return self.parse_function_expression(toks, false),
                "async" if toks.get(1).is_some_and(|n| n.is_word("function")) => {
                    let (expr, used) = self.parse_function_expression(&toks[1..], true)?;
                    return Ok((expr, used + 1));
                }
                w if is_keyword(w) => return Err(unexpected(toks)),
                w => Expr::ident(w),
            },
            TokenType::Punct => return Err(unexpected(toks)),
        };
        Ok((expr, 1))
    }

    /// `function [name](params) { body }` starting at the `function` keyword
    fn parse_function_expression(
        &mut self,
        toks: &[Tok<'_>],
        is_async: bool,
    ) -> ParseResult<(Expr, usize)> {
        let mut i = 1;
        let name = match toks.get(1) {
            Some(t) if t.ty == TokenType::Word && !is_keyword(t.text) => {
                i = 2;
                Some(t.text.to_string())
            }
            _ => None,
        };
        let (Some(params), Some(body)) = (toks.get(i), toks.get(i + 1)) else {
            return Err(ParseError::unexpected_end(&snippet(toks)));
        };
        if !params.is_group('(') || !body.is_group('{') {
            return Err(unexpected(toks));
        }
        let mut def = self.parse_function(name, params.inner(), body.inner(), is_async, false)?;
        def.binds_name = def.name.is_some();
        Ok((Expr::Function { def: Arc::new(def) }, i + 2))
    }

    /// Build a function literal from its parameter list and body text
    pub(super) fn parse_function(
        &mut self,
        name: Option<String>,
        params: &str,
        body: &str,
        is_async: bool,
        is_arrow: bool,
    ) -> ParseResult<FunctionDef> {
        let toks = tokenize(params)?;
        let mut names = Vec::new();
        let mut rest = None;

        for part in split_on(&toks, ",") {
            if rest.is_some() {
                return Err(ParseError::new(
                    ParseErrorCode::UnexpectedToken,
                    "Rest parameter must be last formal parameter",
                    params,
                ));
            }
            match part {
                [] => continue,
                [t] if t.ty == TokenType::Word && !is_keyword(t.text) => {
                    names.push(t.text.to_string())
                }
                [dots, t] if dots.is_punct("...") && t.ty == TokenType::Word => {
                    rest = Some(t.text.to_string())
                }
                _ if part.iter().any(|t| t.is_punct("=")) => {
                    return Err(ParseError::new(
                        ParseErrorCode::Unsupported,
                        "Default parameter values are not supported",
                        params,
                    ))
                }
                _ => return Err(ParseError::unexpected(params)),
            }
        }

        let body = self.parse_function_body(body)?;
        Ok(FunctionDef {
            name,
            params: names,
            rest,
            body,
            is_async,
            is_arrow,
            binds_name: false,
        })
    }

    fn parse_arguments(&mut self, inner: &str) -> ParseResult<Vec<Expr>> {
        let toks = tokenize(inner)?;
        if toks.is_empty() {
            return Ok(Vec::new());
        }
        let parts = split_on(&toks, ",");
        let last = parts.len() - 1;
        let mut args = Vec::with_capacity(parts.len());
        for (i, part) in parts.into_iter().enumerate() {
            match part {
                [] if i == last && i > 0 => {}
                [] => return Err(ParseError::unexpected(inner)),
                [dots, rest @ ..] if dots.is_punct("...") => args.push(Expr::Spread {
                    arg: Box::new(self.parse_assign(rest)?),
                }),
                _ => args.push(self.parse_assign(part)?),
            }
        }
        Ok(args)
    }

    fn parse_array(&mut self, inner: &str) -> ParseResult<Expr> {
        let toks = tokenize(inner)?;
        if toks.is_empty() {
            return Ok(Expr::Array {
                elements: Vec::new(),
            });
        }
        let parts = split_on(&toks, ",");
        let last = parts.len() - 1;
        let mut elements = Vec::with_capacity(parts.len());
        for (i, part) in parts.into_iter().enumerate() {
            match part {
                // trailing comma
                [] if i == last => {}
                // hole
                [] => elements.push(Expr::Undefined),
                [dots, rest @ ..] if dots.is_punct("...") => elements.push(Expr::Spread {
                    arg: Box::new(self.parse_assign(rest)?),
                }),
                _ => elements.push(self.parse_assign(part)?),
            }
        }
        Ok(Expr::Array { elements })
    }

    fn parse_object(&mut self, inner: &str) -> ParseResult<Expr> {
        let toks = tokenize(inner)?;
        let mut props = Vec::new();

        for part in split_on(&toks, ",") {
            if part.is_empty() {
                continue;
            }
            if part[0].is_punct("...") {
                props.push(Property::Spread {
                    arg: self.parse_assign(&part[1..])?,
                });
                continue;
            }

            // method shorthand, optionally async
            let is_async = part.len() == 4 && part[0].is_word("async");
            let method = if is_async { &part[1..] } else { part };
            if method.len() == 3 && method[1].is_group('(') && method[2].is_group('{') {
                let key = self.prop_key(&method[0])?;
                let name = match &key {
                    PropKey::Static { name } => Some(name.clone()),
                    PropKey::Computed { .. } => None,
                };
                let def =
                    self.parse_function(name, method[1].inner(), method[2].inner(), is_async, false)?;
                props.push(Property::KeyValue {
                    key,
                    value: Expr::Function { def: Arc::new(def) },
                });
                continue;
            }

            if part.len() >= 2 && part[1].is_punct(":") {
                let key = self.prop_key(&part[0])?;
                let value = self.parse_assign(&part[2..])?;
                props.push(Property::KeyValue { key, value });
            } else if part.len() == 1 && part[0].ty == TokenType::Word {
                props.push(Property::KeyValue {
                    key: PropKey::Static {
                        name: part[0].text.to_string(),
                    },
                    value: Expr::ident(part[0].text),
                });
            } else {
                return Err(unexpected(part));
            }
        }

        Ok(Expr::Object { props })
    }

    fn prop_key(&mut self, tok: &Tok<'_>) -> ParseResult<PropKey> {
        let name = match tok.ty {
            TokenType::Word => tok.text.to_string(),
            TokenType::Str => tok
                .placeholder()
                .and_then(|idx| self.constants.string(idx))
                .map(str::to_string)
                .ok_or_else(|| ParseError::unexpected(tok.text))?,
            TokenType::Number => match parse_number(tok.text)? {
                Expr::Number { v } => number_key(v),
                _ => tok.text.to_string(),
            },
            TokenType::Group if tok.is_group('[') => {
                return Ok(PropKey::Computed {
                    expr: self.parse_expression_text(tok.inner())?,
                })
            }
            _ => return Err(ParseError::unexpected(tok.text)),
        };
        Ok(PropKey::Static { name })
    }
}

/// Property name for a numeric key (`{1: x}` has key "1")
fn number_key(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e21 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// Numeric literal, including radix prefixes, separators and BigInt suffix
pub(super) fn parse_number(text: &str) -> ParseResult<Expr> {
    let clean: String = text.chars().filter(|c| *c != '_').collect();
    let invalid = || {
        ParseError::new(
            ParseErrorCode::UnexpectedToken,
            "Invalid numeric literal",
            text,
        )
    };

    if let Some(digits) = clean.strip_suffix('n') {
        if digits.contains(['.', 'e', 'E']) && !digits.starts_with("0x") && !digits.starts_with("0X") {
            return Err(invalid());
        }
        return Ok(Expr::BigInt {
            digits: digits.to_string(),
        });
    }

    let radix = |prefix_lower: &str, prefix_upper: &str| {
        clean
            .strip_prefix(prefix_lower)
            .or_else(|| clean.strip_prefix(prefix_upper))
            .map(str::to_string)
    };
    let value = if let Some(hex) = radix("0x", "0X") {
        fold_radix(&hex, 16)
    } else if let Some(oct) = radix("0o", "0O") {
        fold_radix(&oct, 8)
    } else if let Some(bin) = radix("0b", "0B") {
        fold_radix(&bin, 2)
    } else if clean.len() > 1
        && clean.starts_with('0')
        && clean.bytes().all(|b| (b'0'..=b'7').contains(&b))
    {
        // legacy octal: 017
        fold_radix(&clean[1..], 8)
    } else {
        clean.parse::<f64>().ok()
    };
    value
        .map(|v| Expr::Number { v })
        .ok_or_else(invalid)
}

fn fold_radix(digits: &str, radix: u32) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    digits.chars().try_fold(0f64, |acc, c| {
        c.to_digit(radix)
            .map(|d| acc * f64::from(radix) + f64::from(d))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_distinguish_unary_and_binary_minus() {
        let toks = tokenize("-a - -b").unwrap();
        assert_eq!(
            roles(&toks),
            vec![Role::Prefix, Role::Operand, Role::Binary, Role::Prefix, Role::Operand]
        );
    }

    #[test]
    fn test_roles_member_names_are_operands() {
        let toks = tokenize("a.in in b").unwrap();
        assert_eq!(
            roles(&toks),
            vec![Role::Operand, Role::Postfix, Role::Operand, Role::Binary, Role::Operand]
        );
    }

    #[test]
    fn test_number_literals() {
        assert!(matches!(parse_number("0x1F").unwrap(), Expr::Number { v } if v == 31.0));
        assert!(matches!(parse_number("1_000").unwrap(), Expr::Number { v } if v == 1000.0));
        assert!(matches!(parse_number("0b101").unwrap(), Expr::Number { v } if v == 5.0));
        assert!(matches!(parse_number("1.5e2").unwrap(), Expr::Number { v } if v == 150.0));
        assert!(matches!(parse_number("10n").unwrap(), Expr::BigInt { digits } if digits == "10"));
        assert!(matches!(parse_number("017").unwrap(), Expr::Number { v } if v == 15.0));
        assert!(matches!(parse_number("019").unwrap(), Expr::Number { v } if v == 19.0));
        assert!(parse_number("1.5n").is_err());
    }
}
