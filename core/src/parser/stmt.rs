//! Statement parsing over normalized text
//!
//! Input has already been through [`super::normalize`], so every control
//! body is a `{...}` group token and statements end at a top-level `;`.
//! Loops of every form lower to a single [`LoopDef`].

use std::sync::Arc;

use super::ast::{
    AssignOp, Constants, Declarator, Expr, Intrinsic, LoopDef, Stmt, SwitchCase, VarKind,
};
use super::hoist::hoist;
use super::tokens::{is_keyword, split_on, tokenize, Tok, TokenType};
use super::{ensure_stack, ParseError, ParseErrorCode, ParseResult};

/// Internal binding holding the iterator of a `for...in` / `for...of` loop
pub const ITER_BINDING: &str = "#iter";

pub(crate) struct Parser<'c> {
    pub(super) constants: &'c Constants,
    loop_depth: usize,
    switch_depth: usize,
}

fn expect_group<'a, 's>(toks: &'a [Tok<'s>], i: usize, open: char) -> ParseResult<&'a Tok<'s>> {
    match toks.get(i) {
        Some(t) if t.is_group(open) => Ok(t),
        Some(t) => Err(ParseError::unexpected(t.text)),
        None => Err(ParseError::unexpected_end(
            toks.first().map(|t| t.text).unwrap_or(""),
        )),
    }
}

/// Tokens before the first top-level `;` and the count consumed including it
fn until_semicolon<'a, 's>(toks: &'a [Tok<'s>]) -> (&'a [Tok<'s>], usize) {
    match toks.iter().position(|t| t.is_punct(";")) {
        Some(at) => (&toks[..at], at + 1),
        None => (toks, toks.len()),
    }
}

impl<'c> Parser<'c> {
    pub fn new(constants: &'c Constants) -> Self {
        Parser {
            constants,
            loop_depth: 0,
            switch_depth: 0,
        }
    }

    pub fn parse_statements(&mut self, text: &str) -> ParseResult<Vec<Stmt>> {
        let toks = tokenize(text)?;
        self.statement_list(&toks)
    }

    pub fn parse_standalone_expression(&mut self, text: &str) -> ParseResult<Expr> {
        self.parse_expression_text(text)
    }

    /// Function body: its own break/continue context, hoisted
    pub(super) fn parse_function_body(&mut self, text: &str) -> ParseResult<Vec<Stmt>> {
        let saved = (self.loop_depth, self.switch_depth);
        self.loop_depth = 0;
        self.switch_depth = 0;
        let body = self.parse_statements(text);
        (self.loop_depth, self.switch_depth) = saved;
        Ok(hoist(body?))
    }

    fn loop_body(&mut self, text: &str) -> ParseResult<Vec<Stmt>> {
        self.loop_depth += 1;
        let body = self.parse_statements(text);
        self.loop_depth -= 1;
        body
    }

    fn statement_list(&mut self, toks: &[Tok<'_>]) -> ParseResult<Vec<Stmt>> {
        ensure_stack(toks.first().map_or("", |t| t.text))?;
        let mut out = Vec::new();
        let mut i = 0;
        while i < toks.len() {
            let (stmt, used) = self.statement(&toks[i..])?;
            if !matches!(stmt, Stmt::Empty) {
                out.push(stmt);
            }
            i += used.max(1);
        }
        Ok(out)
    }

    fn statement(&mut self, toks: &[Tok<'_>]) -> ParseResult<(Stmt, usize)> {
        let Some(first) = toks.first() else {
            return Ok((Stmt::Empty, 1));
        };
        if first.is_punct(";") {
            return Ok((Stmt::Empty, 1));
        }
        if first.is_group('{') {
            let body = self.parse_statements(first.inner())?;
            return Ok((Stmt::Block { body }, 1));
        }

        if first.ty == TokenType::Word {
            let next = toks.get(1);
            if next.is_some_and(|t| t.is_punct(":")) && !is_keyword(first.text) {
                return Err(ParseError::new(
                    ParseErrorCode::Unsupported,
                    "Labeled statements are not supported",
                    first.text,
                ));
            }
            match first.text {
                "if" => return self.if_statement(toks),
                "for" => return self.for_statement(toks),
                "while" => return self.while_statement(toks),
                "do" => return self.do_statement(toks),
                "try" => return self.try_statement(toks),
                "switch" => return self.switch_statement(toks),
                "function" => return self.function_declaration(toks, false),
                "async" if next.is_some_and(|t| t.is_word("function")) => {
                    let (stmt, used) = self.function_declaration(&toks[1..], true)?;
                    return Ok((stmt, used + 1));
                }
                "return" => {
                    let (value, used) = until_semicolon(&toks[1..]);
                    let value = if value.is_empty() {
                        None
                    } else {
                        Some(self.parse_expression(value)?)
                    };
                    return Ok((Stmt::Return { value }, used + 1));
                }
                "throw" => {
                    let (value, used) = until_semicolon(&toks[1..]);
                    let value = self.parse_expression(value)?;
                    return Ok((Stmt::Throw { value }, used + 1));
                }
                "break" | "continue" => return self.jump_statement(toks),
                "var" | "let" | "const" => {
                    let kind = VarKind::from_keyword(first.text).unwrap_or(VarKind::Var);
                    let (decls, used) = until_semicolon(&toks[1..]);
                    let stmt = self.declaration(kind, decls)?;
                    return Ok((stmt, used + 1));
                }
                "else" | "catch" | "finally" | "case" | "default" => {
                    return Err(ParseError::unexpected(first.text))
                }
                _ => {}
            }
        }

        let (expr, used) = until_semicolon(toks);
        let expr = self.parse_expression(expr)?;
        Ok((Stmt::Expr { expr }, used))
    }

    fn header(&mut self, tok: &Tok<'_>) -> ParseResult<Expr> {
        let toks = tokenize(tok.inner())?;
        if toks.is_empty() {
            return Err(ParseError::unexpected(tok.text));
        }
        self.parse_expression(&toks)
    }

    fn if_statement(&mut self, toks: &[Tok<'_>]) -> ParseResult<(Stmt, usize)> {
        let test = self.header(expect_group(toks, 1, '(')?)?;
        let then_s = self.parse_statements(expect_group(toks, 2, '{')?.inner())?;
        let (else_s, used) = if toks.get(3).is_some_and(|t| t.is_word("else")) {
            let body = self.parse_statements(expect_group(toks, 4, '{')?.inner())?;
            (Some(body), 5)
        } else {
            (None, 3)
        };
        Ok((
            Stmt::If {
                test,
                then_s,
                else_s,
            },
            used,
        ))
    }

    fn while_statement(&mut self, toks: &[Tok<'_>]) -> ParseResult<(Stmt, usize)> {
        let test = self.header(expect_group(toks, 1, '(')?)?;
        let body = self.loop_body(expect_group(toks, 2, '{')?.inner())?;
        let def = LoopDef {
            check_first: true,
            setup: Vec::new(),
            init: None,
            test: Some(test),
            step: None,
            pre_step: Vec::new(),
            body,
        };
        Ok((Stmt::Loop { def: Box::new(def) }, 3))
    }

    fn do_statement(&mut self, toks: &[Tok<'_>]) -> ParseResult<(Stmt, usize)> {
        let body = self.loop_body(expect_group(toks, 1, '{')?.inner())?;
        if !toks.get(2).is_some_and(|t| t.is_word("while")) {
            return Err(ParseError::unexpected_end("do"));
        }
        let test = self.header(expect_group(toks, 3, '(')?)?;
        let used = if toks.get(4).is_some_and(|t| t.is_punct(";")) {
            5
        } else {
            4
        };
        let def = LoopDef {
            check_first: false,
            setup: Vec::new(),
            init: None,
            test: Some(test),
            step: None,
            pre_step: Vec::new(),
            body,
        };
        Ok((Stmt::Loop { def: Box::new(def) }, used))
    }

    fn for_statement(&mut self, toks: &[Tok<'_>]) -> ParseResult<(Stmt, usize)> {
        let header = expect_group(toks, 1, '(')?;
        let body = self.loop_body(expect_group(toks, 2, '{')?.inner())?;
        let head = tokenize(header.inner())?;

        let kind = head
            .first()
            .filter(|t| t.ty == TokenType::Word)
            .and_then(|t| VarKind::from_keyword(t.text));
        let name_at = usize::from(kind.is_some());
        let iteration = match (head.get(name_at), head.get(name_at + 1)) {
            (Some(name), Some(op))
                if name.ty == TokenType::Word && (op.is_word("of") || op.is_word("in")) =>
            {
                Some((name.text, op.text == "of"))
            }
            _ => None,
        };

        let def = if let Some((name, values)) = iteration {
            let iterable = self.parse_expression(&head[name_at + 2..])?;
            let source = if values {
                Intrinsic::IterateValues
            } else {
                Intrinsic::IterateKeys
            };
            let iter = Expr::ident(ITER_BINDING);
            let current = Expr::intrinsic(Intrinsic::IterValue, iter.clone());
            let bind = match kind {
                Some(kind) => Stmt::Declare {
                    kind,
                    decls: vec![Declarator {
                        name: name.to_string(),
                        init: Some(current),
                    }],
                },
                None => Stmt::Expr {
                    expr: Expr::Assign {
                        op: AssignOp::Assign,
                        target: Box::new(Expr::ident(name)),
                        value: Box::new(current),
                    },
                },
            };
            LoopDef {
                check_first: true,
                setup: vec![Stmt::Declare {
                    kind: VarKind::Let,
                    decls: vec![Declarator {
                        name: ITER_BINDING.to_string(),
                        init: Some(Expr::intrinsic(source, iterable)),
                    }],
                }],
                init: None,
                test: Some(Expr::intrinsic(Intrinsic::IterStep, iter)),
                step: None,
                pre_step: vec![bind],
                body,
            }
        } else {
            let parts = split_on(&head, ";");
            let [init, test, step] = parts.as_slice() else {
                return Err(ParseError::new(
                    ParseErrorCode::UnexpectedToken,
                    "Invalid for loop header",
                    header.text,
                ));
            };
            let init = match (init.first(), kind) {
                (None, _) => None,
                (Some(_), Some(kind)) => Some(Box::new(self.declaration(kind, &init[1..])?)),
                (Some(_), None) => Some(Box::new(Stmt::Expr {
                    expr: self.parse_expression(init)?,
                })),
            };
            let test = if test.is_empty() {
                None
            } else {
                Some(self.parse_expression(test)?)
            };
            let step = if step.is_empty() {
                None
            } else {
                Some(self.parse_expression(step)?)
            };
            LoopDef {
                check_first: true,
                setup: Vec::new(),
                init,
                test,
                step,
                pre_step: Vec::new(),
                body,
            }
        };

        Ok((Stmt::Loop { def: Box::new(def) }, 3))
    }

    fn try_statement(&mut self, toks: &[Tok<'_>]) -> ParseResult<(Stmt, usize)> {
        let body = self.parse_statements(expect_group(toks, 1, '{')?.inner())?;
        let mut i = 2;
        let mut catch_var = None;
        let mut catch_body = None;
        let mut finally = None;

        if toks.get(i).is_some_and(|t| t.is_word("catch")) {
            i += 1;
            if let Some(param) = toks.get(i).filter(|t| t.is_group('(')) {
                let inner = tokenize(param.inner())?;
                match inner.as_slice() {
                    [name] if name.ty == TokenType::Word && !is_keyword(name.text) => {
                        catch_var = Some(name.text.to_string())
                    }
                    _ => return Err(ParseError::unexpected(param.text)),
                }
                i += 1;
            }
            catch_body = Some(self.parse_statements(expect_group(toks, i, '{')?.inner())?);
            i += 1;
        }
        if toks.get(i).is_some_and(|t| t.is_word("finally")) {
            finally = Some(self.parse_statements(expect_group(toks, i + 1, '{')?.inner())?);
            i += 2;
        }
        if catch_body.is_none() && finally.is_none() {
            return Err(ParseError::new(
                ParseErrorCode::UnexpectedEnd,
                "Missing catch or finally after try",
                "try",
            ));
        }

        Ok((
            Stmt::Try {
                body,
                catch_var,
                catch_body,
                finally,
            },
            i,
        ))
    }

    fn switch_statement(&mut self, toks: &[Tok<'_>]) -> ParseResult<(Stmt, usize)> {
        let discriminant = self.header(expect_group(toks, 1, '(')?)?;
        let block = expect_group(toks, 2, '{')?;
        self.switch_depth += 1;
        let cases = self.switch_cases(block.inner());
        self.switch_depth -= 1;
        Ok((
            Stmt::Switch {
                discriminant,
                cases: cases?,
            },
            3,
        ))
    }

    fn switch_cases(&mut self, text: &str) -> ParseResult<Vec<SwitchCase>> {
        let toks = tokenize(text)?;
        let is_label = |toks: &[Tok<'_>], i: usize| {
            toks[i].is_word("case")
                || (toks[i].is_word("default") && toks.get(i + 1).is_some_and(|t| t.is_punct(":")))
        };
        let mut cases = Vec::new();
        let mut seen_default = false;
        let mut i = 0;

        while i < toks.len() {
            let test = if toks[i].is_word("case") {
                let mut depth = 0usize;
                let mut colon = None;
                for (j, t) in toks.iter().enumerate().skip(i + 1) {
                    if t.is_punct("?") {
                        depth += 1;
                    } else if t.is_punct(":") {
                        if depth == 0 {
                            colon = Some(j);
                            break;
                        }
                        depth -= 1;
                    }
                }
                let Some(colon) = colon else {
                    return Err(ParseError::unexpected_end("case"));
                };
                let test = self.parse_expression(&toks[i + 1..colon])?;
                i = colon + 1;
                Some(test)
            } else if is_label(&toks, i) {
                if seen_default {
                    return Err(ParseError::new(
                        ParseErrorCode::IllegalStatement,
                        "More than one default clause in switch statement",
                        "default",
                    ));
                }
                seen_default = true;
                i += 2;
                None
            } else {
                return Err(ParseError::unexpected(toks[i].text));
            };

            let mut body = Vec::new();
            while i < toks.len() && !is_label(&toks, i) {
                let (stmt, used) = self.statement(&toks[i..])?;
                if !matches!(stmt, Stmt::Empty) {
                    body.push(stmt);
                }
                i += used.max(1);
            }
            cases.push(SwitchCase { test, body });
        }

        Ok(cases)
    }

    fn jump_statement(&mut self, toks: &[Tok<'_>]) -> ParseResult<(Stmt, usize)> {
        let is_break = toks[0].text == "break";
        let legal = if is_break {
            self.loop_depth > 0 || self.switch_depth > 0
        } else {
            self.loop_depth > 0
        };
        if !legal {
            let message = if is_break {
                "Illegal break statement"
            } else {
                "Illegal continue statement: no surrounding iteration statement"
            };
            return Err(ParseError::new(
                ParseErrorCode::IllegalStatement,
                message,
                toks[0].text,
            ));
        }

        let used = match toks.get(1) {
            None => 1,
            Some(t) if t.is_punct(";") => 2,
            Some(t) if t.ty == TokenType::Word => {
                return Err(ParseError::new(
                    ParseErrorCode::Unsupported,
                    "Labeled statements are not supported",
                    t.text,
                ))
            }
            Some(t) => return Err(ParseError::unexpected(t.text)),
        };
        let stmt = if is_break {
            Stmt::Break
        } else {
            Stmt::Continue
        };
        Ok((stmt, used))
    }

    fn function_declaration(&mut self, toks: &[Tok<'_>], is_async: bool) -> ParseResult<(Stmt, usize)> {
        let name = match toks.get(1) {
            Some(t) if t.ty == TokenType::Word && !is_keyword(t.text) => t.text.to_string(),
            _ => {
                return Err(ParseError::new(
                    ParseErrorCode::UnexpectedToken,
                    "Function statements require a function name",
                    "function",
                ))
            }
        };
        let params = expect_group(toks, 2, '(')?;
        let body = expect_group(toks, 3, '{')?;
        let def = self.parse_function(Some(name), params.inner(), body.inner(), is_async, false)?;
        Ok((Stmt::Function { def: Arc::new(def) }, 4))
    }

    fn declaration(&mut self, kind: VarKind, toks: &[Tok<'_>]) -> ParseResult<Stmt> {
        if toks.is_empty() {
            return Err(ParseError::unexpected_end("declaration"));
        }
        let mut decls = Vec::new();
        for part in split_on(toks, ",") {
            let Some(name) = part.first() else {
                return Err(ParseError::unexpected_end("declaration"));
            };
            if name.ty == TokenType::Group {
                return Err(ParseError::new(
                    ParseErrorCode::Unsupported,
                    "Destructuring declarations are not supported",
                    name.text,
                ));
            }
            if name.ty != TokenType::Word || is_keyword(name.text) {
                return Err(ParseError::unexpected(name.text));
            }
            let init = match part.get(1) {
                None => None,
                Some(eq) if eq.is_punct("=") => Some(self.parse_assign(&part[2..])?),
                Some(t) => return Err(ParseError::unexpected(t.text)),
            };
            if kind == VarKind::Const && init.is_none() {
                return Err(ParseError::new(
                    ParseErrorCode::UnexpectedEnd,
                    "Missing initializer in const declaration",
                    name.text,
                ));
            }
            decls.push(Declarator {
                name: name.text.to_string(),
                init,
            });
        }
        Ok(Stmt::Declare { kind, decls })
    }
}
