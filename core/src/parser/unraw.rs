//! Escape-sequence decoding for string and template literal bodies

use std::iter::Peekable;
use std::str::Chars;

/// Reasons an escape sequence can fail to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EscapeError {
    #[error("malformed hexadecimal escape sequence")]
    MalformedHex,
    #[error("malformed Unicode character escape sequence")]
    MalformedUnicode,
    #[error("Unicode codepoint must not be greater than 0x10FFFF in escape sequence")]
    CodePointLimit,
    #[error("octal escape sequences are not allowed")]
    OctalDeprecation,
    #[error("string ended in the middle of an escape sequence")]
    EndOfString,
}

/// Decode the escape sequences of a raw literal body
///
/// Supports the single-character escapes, `\xHH`, `\uHHHH`, `\u{H..}`,
/// surrogate pairs written as two `\u` escapes, `\0` and line continuations.
/// Lone surrogates decode to U+FFFD.
pub fn decode_escapes(raw: &str) -> Result<String, EscapeError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some(esc) = chars.next() else {
            return Err(EscapeError::EndOfString);
        };
        match esc {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !chars.peek().is_some_and(|c| c.is_ascii_digit()) => out.push('\0'),
            '0'..='9' => return Err(EscapeError::OctalDeprecation),
            'x' => {
                let code = take_hex(&mut chars, 2).ok_or(EscapeError::MalformedHex)?;
                out.push(char::from_u32(code).ok_or(EscapeError::MalformedHex)?);
            }
            'u' => decode_unicode(&mut chars, &mut out)?,
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => out.push(other),
        }
    }

    Ok(out)
}

fn take_hex(chars: &mut Peekable<Chars<'_>>, count: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..count {
        let digit = chars.next()?.to_digit(16)?;
        value = value * 16 + digit;
    }
    Some(value)
}

fn decode_unicode(chars: &mut Peekable<Chars<'_>>, out: &mut String) -> Result<(), EscapeError> {
    if chars.peek() == Some(&'{') {
        chars.next();
        let mut value: u32 = 0;
        let mut digits = 0;
        loop {
            match chars.next() {
                Some('}') if digits > 0 => break,
                Some(c) => {
                    let digit = c.to_digit(16).ok_or(EscapeError::MalformedUnicode)?;
                    value = value.saturating_mul(16).saturating_add(digit);
                    digits += 1;
                }
                None => return Err(EscapeError::MalformedUnicode),
            }
        }
        if value > 0x10FFFF {
            return Err(EscapeError::CodePointLimit);
        }
        out.push(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER));
        return Ok(());
    }

    let high = take_hex(chars, 4).ok_or(EscapeError::MalformedUnicode)?;
    if (0xD800..0xDC00).contains(&high) {
        // try to pair with a following `\uDC00`..`\uDFFF`
        let mut lookahead = chars.clone();
        if lookahead.next() == Some('\\') && lookahead.next() == Some('u') {
            if let Some(low) = take_hex(&mut lookahead, 4) {
                if (0xDC00..0xE000).contains(&low) {
                    *chars = lookahead;
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                    return Ok(());
                }
            }
        }
    }
    out.push(char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_escapes() {
        assert_eq!(decode_escapes(r"a\nb\tc").unwrap(), "a\nb\tc");
        assert_eq!(decode_escapes(r#"\"q\'"#).unwrap(), "\"q'");
        assert_eq!(decode_escapes(r"\\").unwrap(), "\\");
    }

    #[test]
    fn test_hex_and_unicode() {
        assert_eq!(decode_escapes(r"\x41").unwrap(), "A");
        assert_eq!(decode_escapes(r"\u0042").unwrap(), "B");
        assert_eq!(decode_escapes(r"\u{1F600}").unwrap(), "\u{1F600}");
        assert_eq!(decode_escapes(r"\uD83D\uDE00").unwrap(), "\u{1F600}");
    }

    #[test]
    fn test_lone_surrogate_is_replaced() {
        assert_eq!(decode_escapes(r"\uD83Dx").unwrap(), "\u{FFFD}x");
    }

    #[test]
    fn test_errors() {
        assert_eq!(decode_escapes(r"\x4"), Err(EscapeError::MalformedHex));
        assert_eq!(decode_escapes(r"\u12"), Err(EscapeError::MalformedUnicode));
        assert_eq!(decode_escapes(r"\u{110000}"), Err(EscapeError::CodePointLimit));
        assert_eq!(decode_escapes(r"\01"), Err(EscapeError::OctalDeprecation));
        assert_eq!(decode_escapes("abc\\"), Err(EscapeError::EndOfString));
    }

    #[test]
    fn test_null_and_line_continuation() {
        assert_eq!(decode_escapes(r"\0").unwrap(), "\0");
        assert_eq!(decode_escapes("a\\\nb").unwrap(), "ab");
    }
}
