//! Constant extraction
//!
//! Replaces every literal whose contents could confuse bracket matching with
//! a short placeholder and records the decoded literal in the [`Constants`]
//! pool:
//!
//! | literal        | placeholder |
//! |----------------|-------------|
//! | `'..'`, `".."` | `"N"`       |
//! | `` `..` ``     | `` `N` ``   |
//! | `/../flags`    | `/N/r`      |
//!
//! Comments are removed; a block comment spanning lines leaves a newline so
//! semicolon insertion still sees the line break.

use super::ast::{Constants, RegexLiteral, TemplateLiteral};
use super::scan::{is_ident_char, is_ident_start, is_operator_word, rest_of_exp, skip_regex, word_len};
use super::unraw::decode_escapes;
use super::{ParseError, ParseErrorCode, ParseResult};

/// What the last significant piece of output was
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev {
    Nothing,
    Value,
    Operator,
}

pub fn extract_constants(source: &str, constants: &mut Constants) -> ParseResult<String> {
    let mut out = String::with_capacity(source.len());
    let mut prev = Prev::Nothing;
    let mut i = 0;

    while i < source.len() {
        let rest = &source[i..];
        let Some(c) = rest.chars().next() else { break };

        match c {
            '"' | '\'' => {
                let len = string_len(rest)?;
                let raw = &rest[1..len - 1];
                let value = decode_escapes(raw).map_err(|e| {
                    ParseError::new(ParseErrorCode::InvalidEscape, e.to_string(), rest)
                })?;
                out.push_str(&format!("\"{}\"", constants.strings.len()));
                constants.strings.push(value);
                prev = Prev::Value;
                i += len;
            }
            '`' => {
                let (template, len) = extract_template(rest, constants)?;
                out.push_str(&format!("`{}`", constants.templates.len()));
                constants.templates.push(template);
                prev = Prev::Value;
                i += len;
            }
            '/' if rest.starts_with("//") => {
                i += rest.find('\n').unwrap_or(rest.len());
            }
            '/' if rest.starts_with("/*") => {
                let Some(end) = rest[2..].find("*/") else {
                    return Err(ParseError::new(
                        ParseErrorCode::UnterminatedComment,
                        "Unterminated comment",
                        rest,
                    ));
                };
                let body = &rest[2..2 + end];
                out.push(if body.contains('\n') { '\n' } else { ' ' });
                i += 2 + end + 2;
            }
            '/' if prev != Prev::Value => {
                let len = skip_regex(rest)?;
                let literal = &rest[1..len];
                let Some(close) = literal.rfind('/') else {
                    return Err(ParseError::unexpected(rest));
                };
                out.push_str(&format!("/{}/r", constants.regexes.len()));
                constants.regexes.push(RegexLiteral {
                    pattern: literal[..close].to_string(),
                    flags: literal[close + 1..].to_string(),
                });
                prev = Prev::Value;
                i += len;
            }
            c if is_ident_start(c) || c.is_ascii_digit() => {
                let len = if c.is_ascii_digit() {
                    rest.find(|ch: char| !(is_ident_char(ch) || ch == '.'))
                        .unwrap_or(rest.len())
                } else {
                    word_len(rest)
                };
                let word = &rest[..len];
                prev = if is_operator_word(word) {
                    Prev::Operator
                } else {
                    Prev::Value
                };
                out.push_str(word);
                i += len;
            }
            c if c.is_whitespace() => {
                out.push(c);
                i += c.len_utf8();
            }
            ')' | ']' | '}' => {
                out.push(c);
                prev = Prev::Value;
                i += 1;
            }
            _ => {
                // postfix `++` / `--` keep the operand a value
                if prev == Prev::Value && (rest.starts_with("++") || rest.starts_with("--")) {
                    out.push_str(&rest[..2]);
                    i += 2;
                } else {
                    out.push(c);
                    prev = Prev::Operator;
                    i += c.len_utf8();
                }
            }
        }
    }

    Ok(out)
}

/// Byte length of a single- or double-quoted literal, quotes included
fn string_len(text: &str) -> ParseResult<usize> {
    let mut chars = text.char_indices();
    let quote = chars.next().map(|(_, q)| q).unwrap_or('"');
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '\n' => break,
            c if c == quote => return Ok(i + 1),
            _ => {}
        }
    }
    Err(ParseError::new(
        ParseErrorCode::UnterminatedLiteral,
        "Invalid or unexpected token",
        text,
    ))
}

/// Parse a template literal starting at the opening backtick
fn extract_template(text: &str, constants: &mut Constants) -> ParseResult<(TemplateLiteral, usize)> {
    let mut template = TemplateLiteral::default();
    let mut part_start = 1;
    let mut i = 1;

    while i < text.len() {
        let rest = &text[i..];
        let Some(c) = rest.chars().next() else { break };
        match c {
            '\\' => {
                i += 1 + rest[1..].chars().next().map_or(0, char::len_utf8);
                continue;
            }
            '`' => {
                template.parts.push(decode_part(&text[part_start..i], text)?);
                return Ok((template, i + 1));
            }
            '$' if rest.starts_with("${") => {
                template.parts.push(decode_part(&text[part_start..i], text)?);
                let inner = rest_of_exp(&rest[2..], &[], Some('}'), None)?;
                let source = &rest[2..2 + inner];
                if source.trim().is_empty() {
                    return Err(ParseError::unexpected(rest));
                }
                template.exprs.push(super::parse_fragment(source, constants)?);
                i += 2 + inner + 1;
                part_start = i;
                continue;
            }
            _ => {}
        }
        i += c.len_utf8();
    }

    Err(ParseError::new(
        ParseErrorCode::UnterminatedLiteral,
        "Unterminated template literal",
        text,
    ))
}

fn decode_part(raw: &str, context: &str) -> ParseResult<String> {
    // template line terminators are normalized to \n
    let raw = raw.replace("\r\n", "\n");
    decode_escapes(&raw)
        .map_err(|e| ParseError::new(ParseErrorCode::InvalidEscape, e.to_string(), context))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings_become_placeholders() {
        let mut constants = Constants::default();
        let out = extract_constants(r#"let a = 'x;y' + "q\"}""#, &mut constants).unwrap();
        assert_eq!(out, r#"let a = "0" + "1""#);
        assert_eq!(constants.strings, vec!["x;y".to_string(), "q\"}".to_string()]);
    }

    #[test]
    fn test_comments_are_stripped() {
        let mut constants = Constants::default();
        let out = extract_constants("a // c ' x\nb /* q\n */ c /* r */ d", &mut constants).unwrap();
        assert_eq!(out, "a \nb \n c   d");
        assert!(constants.strings.is_empty());
    }

    #[test]
    fn test_regex_and_division() {
        let mut constants = Constants::default();
        let out = extract_constants("x = a / b; y = /a[/]b/gi.test(s)", &mut constants).unwrap();
        assert_eq!(out, "x = a / b; y = /0/r.test(s)");
        assert_eq!(constants.regexes[0].pattern, "a[/]b");
        assert_eq!(constants.regexes[0].flags, "gi");
    }

    #[test]
    fn test_template_with_nested_literals() {
        let mut constants = Constants::default();
        let out = extract_constants("`a${ 'b' + `c${d}` }e`", &mut constants).unwrap();
        assert_eq!(out, "`1`");
        assert_eq!(constants.templates.len(), 2);
        let outer = &constants.templates[1];
        assert_eq!(outer.parts, vec!["a".to_string(), "e".to_string()]);
        assert_eq!(outer.exprs.len(), 1);
    }

    #[test]
    fn test_unterminated() {
        let mut constants = Constants::default();
        assert!(extract_constants("'abc", &mut constants).is_err());
        assert!(extract_constants("`abc${x}", &mut constants).is_err());
        assert!(extract_constants("/* open", &mut constants).is_err());
    }
}
