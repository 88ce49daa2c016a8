//! Token spans over normalized text
//!
//! Tokenization is flat: a bracketed group is captured whole as a single
//! [`TokenType::Group`] token whose contents are tokenized again on demand.
//! Token types are recognized by a static table of anchored patterns tried
//! in order.

use regex::Regex;
use std::sync::LazyLock;

use super::scan::{closing_for, is_operator_word, rest_of_exp};
use super::{ParseError, ParseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Group,
    Number,
    Str,
    Template,
    Regex,
    Word,
    Punct,
}

#[derive(Debug, Clone, Copy)]
pub struct Tok<'s> {
    pub ty: TokenType,
    pub text: &'s str,
}

impl<'s> Tok<'s> {
    pub fn is_punct(&self, p: &str) -> bool {
        self.ty == TokenType::Punct && self.text == p
    }

    pub fn is_word(&self, w: &str) -> bool {
        self.ty == TokenType::Word && self.text == w
    }

    /// Opening bracket of a group token
    pub fn group(&self) -> Option<char> {
        if self.ty == TokenType::Group {
            self.text.chars().next()
        } else {
            None
        }
    }

    pub fn is_group(&self, open: char) -> bool {
        self.group() == Some(open)
    }

    /// Text between the brackets of a group token
    pub fn inner(&self) -> &'s str {
        if self.ty == TokenType::Group && self.text.len() >= 2 {
            &self.text[1..self.text.len() - 1]
        } else {
            ""
        }
    }

    /// Index into the constants pool for placeholder tokens
    pub fn placeholder(&self) -> Option<usize> {
        let digits = match self.ty {
            TokenType::Str | TokenType::Template => &self.text[1..self.text.len() - 1],
            TokenType::Regex => &self.text[1..self.text.len() - 2],
            _ => return None,
        };
        digits.parse().ok()
    }

    /// Whether the token can end an operand
    pub fn ends_value(&self) -> bool {
        match self.ty {
            TokenType::Number | TokenType::Str | TokenType::Template | TokenType::Regex => true,
            TokenType::Group => matches!(self.group(), Some('(') | Some('[') | Some('{')),
            TokenType::Word => !is_operator_word(self.text) && !is_keyword(self.text),
            TokenType::Punct => self.text == "++" || self.text == "--",
        }
    }
}

/// Words that never name a value
pub fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "if" | "else"
            | "for"
            | "while"
            | "do"
            | "switch"
            | "case"
            | "default"
            | "break"
            | "continue"
            | "return"
            | "throw"
            | "try"
            | "catch"
            | "finally"
            | "var"
            | "let"
            | "const"
            | "function"
            | "new"
            | "delete"
            | "typeof"
            | "void"
            | "in"
            | "instanceof"
            | "class"
            | "with"
            | "debugger"
            | "import"
            | "export"
            | "extends"
            | "super"
            | "enum"
            | "yield"
    )
}

/// Punctuators, longest first
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==", "!=",
    "<=", ">=", "&&", "||", "??", "?.", "**", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=",
    "^=", "<<", ">>", "+", "-", "*", "/", "%", "<", ">", "=", "!", "~", "&", "|", "^", "?", ":",
    ";", ",", ".",
];

static TOKEN_TABLE: LazyLock<Vec<(TokenType, Regex)>> = LazyLock::new(|| {
    let table = [
        (
            TokenType::Number,
            r"^(?:0[xX][0-9a-fA-F]+(?:_[0-9a-fA-F]+)*|0[oO][0-7]+(?:_[0-7]+)*|0[bB][01]+(?:_[01]+)*|(?:\d+(?:_\d+)*(?:\.(?:\d+(?:_\d+)*)?)?|\.\d+(?:_\d+)*)(?:[eE][+-]?\d+(?:_\d+)*)?)n?",
        ),
        (TokenType::Str, r#"^"\d+""#),
        (TokenType::Template, r"^`\d+`"),
        (TokenType::Regex, r"^/\d+/r"),
        (TokenType::Word, r"^[\p{L}_$][\p{L}\p{N}_$]*"),
    ];
    table
        .into_iter()
        .filter_map(|(ty, pattern)| Regex::new(pattern).ok().map(|re| (ty, re)))
        .collect()
});

/// Tokenize a normalized span
pub fn tokenize(text: &str) -> ParseResult<Vec<Tok<'_>>> {
    let mut toks: Vec<Tok<'_>> = Vec::new();
    let mut i = 0;

    'outer: while i < text.len() {
        let rest = &text[i..];
        let Some(c) = rest.chars().next() else { break };

        if c.is_whitespace() {
            i += c.len_utf8();
            continue;
        }

        if let Some(close) = closing_for(c) {
            let inner = rest_of_exp(&rest[1..], &[], Some(close), None)?;
            let len = inner + 2;
            toks.push(Tok {
                ty: TokenType::Group,
                text: &rest[..len],
            });
            i += len;
            continue;
        }
        if matches!(c, ')' | ']' | '}') {
            return Err(ParseError::unexpected(rest));
        }

        let after_value = toks.last().is_some_and(|t| t.ends_value());
        for (ty, re) in TOKEN_TABLE.iter() {
            if *ty == TokenType::Regex && after_value {
                continue;
            }
            if let Some(m) = re.find(rest) {
                if *ty == TokenType::Number && rest[m.end()..].starts_with(super::scan::is_ident_char) {
                    return Err(ParseError::new(
                        super::ParseErrorCode::UnexpectedToken,
                        "Invalid or unexpected token",
                        rest,
                    ));
                }
                toks.push(Tok {
                    ty: *ty,
                    text: m.as_str(),
                });
                i += m.end();
                continue 'outer;
            }
        }

        for p in PUNCTUATORS {
            if rest.starts_with(p) {
                // `a?.5:1` is a conditional
                let p = if *p == "?." && rest[2..].starts_with(|c: char| c.is_ascii_digit()) {
                    "?"
                } else {
                    p
                };
                toks.push(Tok {
                    ty: TokenType::Punct,
                    text: &rest[..p.len()],
                });
                i += p.len();
                continue 'outer;
            }
        }

        return Err(ParseError::unexpected(rest));
    }

    Ok(toks)
}

/// Split a token slice on a top-level punctuator
pub fn split_on<'a, 's>(toks: &'a [Tok<'s>], punct: &str) -> Vec<&'a [Tok<'s>]> {
    toks.split(|t| t.is_punct(punct)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<(TokenType, String)> {
        tokenize(text)
            .unwrap()
            .into_iter()
            .map(|t| (t.ty, t.text.to_string()))
            .collect()
    }

    #[test]
    fn test_groups_are_single_tokens() {
        let toks = kinds("f(a, (b)) [1] {x: 1}");
        assert_eq!(toks.len(), 4);
        assert_eq!(toks[1], (TokenType::Group, "(a, (b))".to_string()));
        assert_eq!(toks[3], (TokenType::Group, "{x: 1}".to_string()));
    }

    #[test]
    fn test_punctuators_longest_match() {
        let toks = kinds("a >>>= b ?? c?.d");
        let texts: Vec<_> = toks.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["a", ">>>=", "b", "??", "c", "?.", "d"]);
    }

    #[test]
    fn test_optional_chain_before_digit_is_conditional() {
        let toks = kinds("a?.5:1");
        assert_eq!(toks[1], (TokenType::Punct, "?".to_string()));
        assert_eq!(toks[2], (TokenType::Number, ".5".to_string()));
    }

    #[test]
    fn test_placeholders_and_division() {
        let toks = kinds(r#""0" + `1` + /2/r"#);
        assert_eq!(toks[0].0, TokenType::Str);
        assert_eq!(toks[2].0, TokenType::Template);
        assert_eq!(toks[4].0, TokenType::Regex);

        let toks = kinds("x/2/r");
        assert_eq!(toks.len(), 5);
        assert_eq!(toks[1], (TokenType::Punct, "/".to_string()));
    }

    #[test]
    fn test_numbers() {
        let toks = kinds("0x1F 1_000 1.5e3 10n .5");
        assert!(toks.iter().all(|(ty, _)| *ty == TokenType::Number));
        assert!(tokenize("3abc").is_err());
    }
}
