//! Statement normalization
//!
//! Two rewrites run over extracted text before tokenization:
//! - semicolons are inserted at line breaks where a statement must end
//! - unbraced bodies of `if`/`else`/`for`/`while`/`do` get explicit braces
//!
//! After both passes every control-flow body is a `{...}` group and every
//! statement that needs one is terminated by `;`, so the statement parser
//! never has to reason about line breaks.

use regex::Regex;
use std::sync::LazyLock;

use super::scan::{closing_for, is_ident_start, is_operator_word, rest_of_exp, word_len};
use super::tokens::is_keyword;
use super::{ParseError, ParseResult};

static SEMICOLON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^;").expect("valid pattern"));
static COLON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^:").expect("valid pattern"));

pub fn normalize(text: &str) -> ParseResult<String> {
    let text = insert_semicolons(text);
    normalize_block(&text)
}

/* ===================== Semicolon Insertion ===================== */

#[derive(Debug, Clone)]
struct Open {
    bracket: char,
    /// Word written directly before the bracket (`if`, `while`, a callee name...)
    keyword: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Last {
    Nothing,
    Word(String),
    Value,
    Postfix,
    Operator,
    Close { bracket: char, keyword: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Next<'a> {
    Word(&'a str),
    Value,
    Open(char),
    Prefix,
    Other,
    End,
}

/// Words that end a statement when followed by a line break
const RESTRICTED: &[&str] = &["return", "break", "continue", "throw"];

pub fn insert_semicolons(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut stack: Vec<Open> = Vec::new();
    let mut last = Last::Nothing;
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];
        let Some(c) = rest.chars().next() else { break };

        match c {
            '\n' => {
                let in_group = stack.last().is_some_and(|o| o.bracket != '{');
                if !in_group && needs_semicolon(&last, next_significant(&rest[1..])) {
                    out.push(';');
                    last = Last::Operator;
                }
                out.push('\n');
                i += 1;
            }
            '(' | '[' | '{' => {
                let keyword = match &last {
                    Last::Word(w) => Some(w.clone()),
                    Last::Close {
                        bracket: ')',
                        keyword,
                    } if c == '{' => keyword.clone(),
                    _ => None,
                };
                stack.push(Open { bracket: c, keyword });
                out.push(c);
                last = Last::Operator;
                i += 1;
            }
            ')' | ']' | '}' => {
                let keyword = stack.pop().and_then(|o| o.keyword);
                last = Last::Close { bracket: c, keyword };
                out.push(c);
                i += 1;
            }
            '"' | '`' => {
                let len = rest[1..].find(c).map_or(rest.len(), |p| p + 2);
                out.push_str(&rest[..len]);
                last = Last::Value;
                i += len;
            }
            c if is_ident_start(c) => {
                let len = word_len(rest);
                out.push_str(&rest[..len]);
                last = Last::Word(rest[..len].to_string());
                i += len;
            }
            c if c.is_ascii_digit() => {
                let len = rest
                    .find(|ch: char| !(ch.is_alphanumeric() || ch == '.' || ch == '_'))
                    .unwrap_or(rest.len());
                out.push_str(&rest[..len]);
                last = Last::Value;
                i += len;
            }
            c if c.is_whitespace() => {
                out.push(c);
                i += c.len_utf8();
            }
            _ => {
                let postfix = (rest.starts_with("++") || rest.starts_with("--"))
                    && ends_value(&last);
                if postfix {
                    out.push_str(&rest[..2]);
                    last = Last::Postfix;
                    i += 2;
                } else {
                    out.push(c);
                    last = Last::Operator;
                    i += c.len_utf8();
                }
            }
        }
    }

    out
}

fn ends_value(last: &Last) -> bool {
    match last {
        Last::Word(w) => !is_keyword(w) && !is_operator_word(w),
        Last::Value | Last::Postfix => true,
        Last::Close {
            bracket: ')',
            keyword,
        } => !matches!(
            keyword.as_deref(),
            Some("if" | "for" | "while" | "with" | "catch" | "switch")
        ),
        Last::Close { .. } => true,
        Last::Nothing | Last::Operator => false,
    }
}

fn needs_semicolon(last: &Last, next: Next<'_>) -> bool {
    if let Last::Word(w) = last {
        if RESTRICTED.contains(&w.as_str()) {
            return next != Next::End;
        }
    }
    if !ends_value(last) {
        return false;
    }
    match next {
        Next::Word(w) => {
            if matches!(w, "else" | "catch" | "finally" | "in" | "instanceof" | "of") {
                return false;
            }
            if w == "while" {
                // `do { } \n while (x)`
                return !matches!(
                    last,
                    Last::Close { bracket: '}', keyword: Some(k) } if k == "do"
                );
            }
            true
        }
        Next::Value | Next::Prefix => true,
        Next::Open('{') => matches!(last, Last::Close { bracket: '}', .. }),
        Next::Open(_) | Next::Other | Next::End => false,
    }
}

fn next_significant(text: &str) -> Next<'_> {
    let trimmed = text.trim_start();
    let Some(c) = trimmed.chars().next() else {
        return Next::End;
    };
    match c {
        c if is_ident_start(c) => Next::Word(&trimmed[..word_len(trimmed)]),
        c if c.is_ascii_digit() => Next::Value,
        '"' | '`' => Next::Value,
        '(' | '[' | '{' => Next::Open(c),
        '!' | '~' => Next::Prefix,
        _ if trimmed.starts_with("++") || trimmed.starts_with("--") => Next::Prefix,
        _ => Next::Other,
    }
}

/* ===================== Body Bracing ===================== */

/// Normalize the contents of a block: a list of statements
fn normalize_block(text: &str) -> ParseResult<String> {
    let mut out = String::with_capacity(text.len() + 8);
    let mut i = 0;
    while i < text.len() {
        let start = skip_ws(text, i);
        out.push_str(&text[i..start]);
        if start >= text.len() {
            break;
        }
        i = statement(text, start, &mut out)?;
    }
    Ok(out)
}

fn skip_ws(text: &str, i: usize) -> usize {
    text[i..]
        .find(|c: char| !c.is_whitespace())
        .map_or(text.len(), |p| i + p)
}

fn word_at(text: &str, i: usize) -> Option<&str> {
    let rest = text.get(i..)?;
    if rest.starts_with(is_ident_start) {
        Some(&rest[..word_len(rest)])
    } else {
        None
    }
}

fn next_char(text: &str, i: usize) -> Option<char> {
    text[skip_ws(text, i)..].chars().next()
}

/// A keyword used as an object key or member name (`{ if: 1 }`)
fn used_as_name(text: &str, after: usize) -> bool {
    matches!(
        next_char(text, after),
        None | Some(':' | ',' | '}' | ')' | ']' | '=' | '.' | ';')
    )
}

/// Copy one statement starting at `i`; returns the offset after it
fn statement(text: &str, i: usize, out: &mut String) -> ParseResult<usize> {
    let rest = &text[i..];
    if rest.starts_with('{') {
        return group(text, i, out);
    }
    if rest.starts_with(';') {
        out.push(';');
        return Ok(i + 1);
    }

    let word = word_at(text, i).unwrap_or("");
    let after = i + word.len();
    let keyword_form = !word.is_empty() && !used_as_name(text, after);

    match word {
        "if" if keyword_form => {
            out.push_str(word);
            let mut j = header(text, after, out)?;
            j = body(text, j, out)?;
            let k = skip_ws(text, j);
            if word_at(text, k) == Some("else") {
                out.push_str(&text[j..k]);
                out.push_str("else");
                j = body(text, k + 4, out)?;
            }
            Ok(j)
        }
        "for" | "while" | "with" if keyword_form => {
            out.push_str(word);
            let j = header(text, after, out)?;
            body(text, j, out)
        }
        "do" if keyword_form => {
            out.push_str(word);
            let j = body(text, after, out)?;
            let k = skip_ws(text, j);
            if word_at(text, k) != Some("while") {
                return Err(ParseError::unexpected(&text[k..]));
            }
            out.push_str(&text[j..k]);
            out.push_str("while");
            let mut j = header(text, k + 5, out)?;
            let k = skip_ws(text, j);
            if text[k..].starts_with(';') {
                out.push_str(&text[j..=k]);
                j = k + 1;
            }
            Ok(j)
        }
        "try" if keyword_form => {
            out.push_str(word);
            let mut j = block_after(text, after, out)?;
            loop {
                let k = skip_ws(text, j);
                match word_at(text, k) {
                    Some("catch") => {
                        out.push_str(&text[j..k]);
                        out.push_str("catch");
                        j = k + 5;
                        if next_char(text, j) == Some('(') {
                            j = header(text, j, out)?;
                        }
                        j = block_after(text, j, out)?;
                    }
                    Some("finally") => {
                        out.push_str(&text[j..k]);
                        out.push_str("finally");
                        j = block_after(text, k + 7, out)?;
                    }
                    _ => return Ok(j),
                }
            }
        }
        "switch" if keyword_form => {
            out.push_str(word);
            let j = header(text, after, out)?;
            block_after(text, j, out)
        }
        "case" if keyword_form => {
            let len = rest_of_exp(rest, &[&COLON], None, None)?;
            if !rest[len..].starts_with(':') {
                return Err(ParseError::unexpected(rest));
            }
            out.push_str(&nested(&rest[..=len])?);
            Ok(i + len + 1)
        }
        "default" if next_char(text, after) == Some(':') => {
            let colon = skip_ws(text, after);
            out.push_str(&text[i..=colon]);
            Ok(colon + 1)
        }
        "function" if keyword_form => function(text, i, out),
        "async" if word_at(text, skip_ws(text, after)) == Some("function") => {
            function(text, i, out)
        }
        _ => {
            let len = rest_of_exp(rest, &[&SEMICOLON], None, None)?;
            let end = if rest[len..].starts_with(';') { len + 1 } else { len };
            if end == 0 {
                return Err(ParseError::unexpected(rest));
            }
            out.push_str(&nested(&rest[..end])?);
            Ok(i + end)
        }
    }
}

/// Copy a parenthesized header such as `(i = 0; i < n; i++)`
fn header(text: &str, i: usize, out: &mut String) -> ParseResult<usize> {
    let k = skip_ws(text, i);
    if !text[k..].starts_with('(') {
        return Err(ParseError::unexpected(&text[i..]));
    }
    out.push_str(&text[i..k]);
    group(text, k, out)
}

/// Copy a mandatory `{...}` block
fn block_after(text: &str, i: usize, out: &mut String) -> ParseResult<usize> {
    let k = skip_ws(text, i);
    if !text[k..].starts_with('{') {
        return Err(ParseError::unexpected(&text[i..]));
    }
    out.push_str(&text[i..k]);
    group(text, k, out)
}

/// Copy a control-flow body, wrapping a single statement in braces
fn body(text: &str, i: usize, out: &mut String) -> ParseResult<usize> {
    let k = skip_ws(text, i);
    if k >= text.len() {
        return Err(ParseError::unexpected_end(&text[..i]));
    }
    out.push_str(&text[i..k]);
    if text[k..].starts_with('{') {
        return group(text, k, out);
    }
    let mut inner = String::new();
    let end = statement(text, k, &mut inner)?;
    out.push('{');
    out.push_str(&inner);
    out.push('}');
    Ok(end)
}

/// Copy a function declaration through the end of its body
fn function(text: &str, i: usize, out: &mut String) -> ParseResult<usize> {
    let mut j = i;
    while j < text.len() {
        let Some(c) = text[j..].chars().next() else { break };
        match c {
            '{' => return group(text, j, out),
            '(' | '[' => j = group(text, j, out)?,
            _ => {
                out.push(c);
                j += c.len_utf8();
            }
        }
    }
    Err(ParseError::unexpected_end(&text[i..]))
}

/// Copy a bracketed group starting at `i`
///
/// Braces hold statement lists (blocks, function bodies, object literals
/// normalize harmlessly as expression statements); other brackets hold
/// expressions that may contain function bodies.
fn group(text: &str, i: usize, out: &mut String) -> ParseResult<usize> {
    let rest = &text[i..];
    let Some(open) = rest.chars().next() else {
        return Err(ParseError::unexpected_end(rest));
    };
    let close = closing_for(open).ok_or_else(|| ParseError::unexpected(rest))?;
    super::ensure_stack(rest)?;
    let inner_len = rest_of_exp(&rest[1..], &[], Some(close), None)?;
    let inner = &rest[1..1 + inner_len];
    out.push(open);
    if open == '{' {
        out.push_str(&normalize_block(inner)?);
    } else {
        out.push_str(&nested(inner)?);
    }
    out.push(close);
    Ok(i + inner_len + 2)
}

/// Copy an expression span, normalizing any nested groups
fn nested(span: &str) -> ParseResult<String> {
    let mut out = String::with_capacity(span.len());
    let mut i = 0;
    while i < span.len() {
        let Some(c) = span[i..].chars().next() else { break };
        if closing_for(c).is_some() {
            i = group(span, i, &mut out)?;
        } else {
            out.push(c);
            i += c.len_utf8();
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squash(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_asi_between_statements() {
        let out = insert_semicolons("let a = 1\nlet b = a\nb++\nreturn\nb");
        assert_eq!(out, "let a = 1;\nlet b = a;\nb++;\nreturn;\nb");
    }

    #[test]
    fn test_asi_skips_continuations() {
        let out = insert_semicolons("let a = b\n  .c()\n  + d\nf(\n1,\n2\n)");
        assert_eq!(out, "let a = b\n  .c()\n  + d;\nf(\n1,\n2\n)");
    }

    #[test]
    fn test_asi_control_headers() {
        let out = insert_semicolons("if (a)\nb()\nelse\nc()\ndo {\n} while (x)\ny()");
        assert_eq!(out, "if (a)\nb()\nelse\nc();\ndo {\n} while (x)\ny()");
    }

    #[test]
    fn test_braces_single_statement_bodies() {
        let out = normalize("if (a) b = 1; else if (c) d(); else e()").unwrap();
        assert_eq!(
            squash(&out),
            "if (a) {b = 1;} else {if (c) {d();} else {e()}}"
        );
    }

    #[test]
    fn test_braces_loops() {
        let out = normalize("for (;;) if (x) break;\nwhile (y) y--").unwrap();
        assert_eq!(squash(&out), "for (;;) {if (x) {break;}} while (y) {y--}");
    }

    #[test]
    fn test_braces_inside_function_bodies() {
        let out = normalize("const f = () => { if (a) return 1; return 2 }").unwrap();
        assert_eq!(squash(&out), "const f = () => { if (a) {return 1;} return 2 }");
    }

    #[test]
    fn test_object_keys_named_like_keywords() {
        let out = normalize("x = { if: 1, do: 2 }").unwrap();
        assert_eq!(squash(&out), "x = { if: 1, do: 2 }");
    }

    #[test]
    fn test_switch_cases() {
        let out = normalize("switch (x) { case 1: if (y) z(); break; default: w() }").unwrap();
        assert_eq!(
            squash(&out),
            "switch (x) { case 1: if (y) {z();} break; default: w() }"
        );
    }
}
