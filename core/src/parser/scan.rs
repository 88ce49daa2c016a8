//! Balanced-span scanning
//!
//! [`rest_of_exp`] measures how far an expression extends from the start of
//! a text: it walks forward skipping over nested brackets, quoted literals,
//! regex literals and template interpolations, and stops at the first
//! terminator that appears at nesting depth zero.

use regex::Regex;

use super::{ParseError, ParseErrorCode, ParseResult};

/// Extra facts collected while scanning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanDetails {
    /// Last bare identifier seen at depth zero before the scan stopped
    pub last_word: Option<String>,
}

/// Words after which a `/` starts a regex rather than a division
const OPERATOR_WORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "await", "yield",
];

pub fn is_operator_word(word: &str) -> bool {
    OPERATOR_WORDS.contains(&word)
}

pub fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

pub fn is_ident_char(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

pub fn closing_for(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

/// Length in bytes of the expression starting at `text`
///
/// Scanning stops before the first depth-zero match of any of `terminators`
/// (patterns are expected to be anchored with `^`), before `closing`, or
/// before any unmatched closing bracket. When `closing` is given and never
/// found, the span is unbalanced and an error is returned.
pub fn rest_of_exp(
    text: &str,
    terminators: &[&Regex],
    closing: Option<char>,
    mut details: Option<&mut ScanDetails>,
) -> ParseResult<usize> {
    let mut i = 0;
    let mut value_end = false;

    while i < text.len() {
        let rest = &text[i..];
        let Some(c) = rest.chars().next() else { break };

        if Some(c) == closing {
            return Ok(i);
        }
        if matches!(c, ')' | ']' | '}') {
            if closing.is_some() {
                return Err(ParseError::new(
                    ParseErrorCode::UnbalancedBracket,
                    format!("Unexpected '{c}'"),
                    rest,
                ));
            }
            return Ok(i);
        }
        if terminators.iter().any(|re| re.is_match(rest)) {
            return Ok(i);
        }

        match c {
            '(' | '[' | '{' => {
                super::ensure_stack(rest)?;
                let close = closing_for(c).unwrap_or(')');
                let inner = rest_of_exp(&rest[1..], &[], Some(close), None)?;
                i += 1 + inner + 1;
                value_end = true;
            }
            '"' | '\'' | '`' => {
                i += skip_quoted(rest)?;
                value_end = true;
            }
            '/' if !value_end => {
                i += skip_regex(rest)?;
                value_end = true;
            }
            c if is_ident_start(c) => {
                let len = word_len(rest);
                let word = &rest[..len];
                value_end = !is_operator_word(word);
                if let Some(d) = details.as_deref_mut() {
                    d.last_word = Some(word.to_string());
                }
                i += len;
            }
            c if c.is_ascii_digit() => {
                i += rest
                    .find(|ch: char| !(is_ident_char(ch) || ch == '.'))
                    .unwrap_or(rest.len());
                value_end = true;
            }
            c if c.is_whitespace() => i += c.len_utf8(),
            _ => {
                // `x++ / 2` still divides
                value_end = (rest.starts_with("++") || rest.starts_with("--")) && value_end;
                if value_end {
                    i += 2;
                } else {
                    i += c.len_utf8();
                }
            }
        }
    }

    if let Some(close) = closing {
        return Err(ParseError::new(
            ParseErrorCode::UnbalancedBracket,
            format!("Missing closing '{close}'"),
            text,
        ));
    }
    Ok(text.len())
}

/// Byte length of the identifier at the start of `text`
pub fn word_len(text: &str) -> usize {
    text.find(|c: char| !is_ident_char(c)).unwrap_or(text.len())
}

/// Byte length of the quoted literal at the start of `text`, quotes included
///
/// Template literals skip over their `${...}` interpolations.
pub fn skip_quoted(text: &str) -> ParseResult<usize> {
    let mut chars = text.char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(ParseError::unexpected_end(text));
    };
    let mut escaped = false;
    let mut i = quote.len_utf8();

    while i < text.len() {
        let rest = &text[i..];
        let Some(c) = rest.chars().next() else { break };
        if escaped {
            escaped = false;
            i += c.len_utf8();
            continue;
        }
        match c {
            '\\' => escaped = true,
            c if c == quote => return Ok(i + 1),
            '\n' if quote != '`' => break,
            '$' if quote == '`' && rest.starts_with("${") => {
                let inner = rest_of_exp(&rest[2..], &[], Some('}'), None)?;
                i += 2 + inner + 1;
                continue;
            }
            _ => {}
        }
        i += c.len_utf8();
    }

    Err(ParseError::new(
        ParseErrorCode::UnterminatedLiteral,
        "Unterminated string literal",
        text,
    ))
}

/// Byte length of the regex literal at the start of `text`, flags included
pub fn skip_regex(text: &str) -> ParseResult<usize> {
    let mut in_class = false;
    let mut escaped = false;

    for (i, c) in text.char_indices().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => {
                let flags = word_len(&text[i + 1..]);
                return Ok(i + 1 + flags);
            }
            '\n' => break,
            _ => {}
        }
    }

    Err(ParseError::new(
        ParseErrorCode::UnterminatedLiteral,
        "Invalid regular expression: missing /",
        text,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    static SEMI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^;").unwrap());
    static COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^,").unwrap());

    #[test]
    fn test_stops_at_terminator() {
        let text = "a = f(1; 2); b";
        assert_eq!(rest_of_exp(text, &[&SEMI], None, None).unwrap(), 11);
    }

    #[test]
    fn test_skips_strings_and_templates() {
        let text = r#"x + ";" + `a${ {b: ";"}.b }` , y"#;
        let len = rest_of_exp(text, &[&SEMI, &COMMA], None, None).unwrap();
        assert_eq!(&text[len..], ", y");
    }

    #[test]
    fn test_regex_vs_division() {
        let text = "a / b / c; d";
        assert_eq!(rest_of_exp(text, &[&SEMI], None, None).unwrap(), 9);
        let text = "x = /[;/]/g; y";
        assert_eq!(rest_of_exp(text, &[&SEMI], None, None).unwrap(), 11);
    }

    #[test]
    fn test_closing_bracket() {
        let text = "a, (b)) rest";
        assert_eq!(rest_of_exp(text, &[], Some(')'), None).unwrap(), 6);
        assert!(rest_of_exp("a, (b", &[], Some(')'), None).is_err());
        assert!(rest_of_exp("a ]", &[], Some(')'), None).is_err());
    }

    #[test]
    fn test_tracks_last_word() {
        let mut details = ScanDetails::default();
        rest_of_exp("if (x) foo", &[], None, Some(&mut details)).unwrap();
        assert_eq!(details.last_word.as_deref(), Some("foo"));
    }

    #[test]
    fn test_unterminated_literals() {
        assert_eq!(
            skip_quoted("'abc").unwrap_err().code,
            ParseErrorCode::UnterminatedLiteral
        );
        assert!(skip_regex("/abc").is_err());
    }
}
