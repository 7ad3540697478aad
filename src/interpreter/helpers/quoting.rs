//! Shell value quoting utilities
//!
//! Quoting for output that has to be valid shell input again:
//! `set` and `declare -p` listings, `${x@Q}`, `printf %q` and xtrace.
//! Also the inverse for `echo -e`, `printf %b` and `${x@E}`.

use crate::process::raw_bytes::{raw_byte, raw_char};

/// Bash uses $'...' only for control characters (0x00-0x1F, 0x7F) and
/// bytes that aren't UTF-8.
fn needs_dollar_quoting(value: &str) -> bool {
    value
        .chars()
        .any(|c| (c as u32) < 0x20 || c as u32 == 0x7f || raw_byte(c).is_some())
}

/// ANSI-C quoting: `$'a\nb'`
pub fn dollar_quote(value: &str) -> String {
    let mut result = String::from("$'");

    for c in value.chars() {
        if let Some(b) = raw_byte(c) {
            result.push_str(&format!("\\{:03o}", b));
            continue;
        }
        let code = c as u32;
        match code {
            0x07 => result.push_str("\\a"),
            0x08 => result.push_str("\\b"),
            0x09 => result.push_str("\\t"),
            0x0a => result.push_str("\\n"),
            0x0b => result.push_str("\\v"),
            0x0c => result.push_str("\\f"),
            0x0d => result.push_str("\\r"),
            0x1b => result.push_str("\\E"),
            0x27 => result.push_str("\\'"),
            0x5c => result.push_str("\\\\"),
            _ if code < 0x20 || code == 0x7f => result.push_str(&format!("\\{:03o}", code)),
            _ => result.push(c),
        }
    }

    result.push('\'');
    result
}

/// Characters that never need quoting.
fn is_safe_value(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '.' | ':' | '-' | '@' | '%' | '+' | ',' | '='))
}

/// Quote for `set` output: bare when safe, single quotes otherwise.
pub fn quote_value(value: &str) -> String {
    if needs_dollar_quoting(value) {
        return dollar_quote(value);
    }
    if !value.is_empty() && is_safe_value(value) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Quote for `${x@Q}` and `printf %q`: always quoted.
pub fn quote_for_reuse(value: &str) -> String {
    if needs_dollar_quoting(value) || value.contains('\'') {
        return dollar_quote(value);
    }
    format!("'{}'", value)
}

/// Quote for `declare -p`: double quotes.
pub fn quote_declare_value(value: &str) -> String {
    if needs_dollar_quoting(value) {
        return dollar_quote(value);
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$")
        .replace('`', "\\`");
    format!("\"{}\"", escaped)
}

/// Quote an xtrace word only when it would be misread.
pub fn quote_for_trace(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    let needs_quoting = value.chars().any(|c| {
        matches!(
            c,
            ' ' | '\t' | '\n' | '\'' | '"' | '\\' | '$' | '`' | '!' | '*' | '?' | '[' | ']' | '{' | '}' | '|'
                | '&' | ';' | '<' | '>' | '(' | ')' | '~' | '#'
        )
    });
    if !needs_quoting {
        return value.to_string();
    }
    if needs_dollar_quoting(value) {
        return dollar_quote(value);
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// What stopped backslash decoding early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeStop {
    None,
    /// `\c` in `echo -e` and `printf %b` suppresses further output.
    StopOutput,
}

/// Decode `\n`, `\t`, `\xHH`, `\0NNN` and friends.
///
/// `echo_style` uses `\0NNN` for octal (echo -e, printf %b); otherwise
/// octal is `\NNN` as in `$'...'` and `${x@E}`.
pub fn decode_backslash_escapes(s: &str, echo_style: bool) -> (String, EscapeStop) {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c != '\\' || i + 1 >= chars.len() {
            out.push(c);
            i += 1;
            continue;
        }
        let next = chars[i + 1];
        i += 2;
        match next {
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'e' | 'E' => out.push('\x1b'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '\\' => out.push('\\'),
            '\'' if !echo_style => out.push('\''),
            '"' if !echo_style => out.push('"'),
            'c' if echo_style => return (out, EscapeStop::StopOutput),
            'x' => {
                let hex: String = chars[i..].iter().take(2).take_while(|c| c.is_ascii_hexdigit()).collect();
                if hex.is_empty() {
                    out.push_str("\\x");
                } else {
                    i += hex.len();
                    out.push(raw_char(u8::from_str_radix(&hex, 16).unwrap_or(0)));
                }
            }
            'u' | 'U' => {
                let max = if next == 'u' { 4 } else { 8 };
                let hex: String = chars[i..].iter().take(max).take_while(|c| c.is_ascii_hexdigit()).collect();
                if hex.is_empty() {
                    out.push('\\');
                    out.push(next);
                } else {
                    i += hex.len();
                    if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                        out.push(ch);
                    }
                }
            }
            '0'..='7' => {
                let (start, max) = if echo_style {
                    if next != '0' {
                        out.push('\\');
                        out.push(next);
                        continue;
                    }
                    (i, 3)
                } else {
                    (i - 1, 3)
                };
                let digits: String = chars[start..].iter().take(max).take_while(|c| ('0'..='7').contains(c)).collect();
                i = start + digits.len();
                let code = u32::from_str_radix(&digits, 8).unwrap_or(0) % 256;
                out.push(raw_char(code as u8));
            }
            _ => {
                out.push('\\');
                out.push(next);
            }
        }
    }
    (out, EscapeStop::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_value_simple() {
        assert_eq!(quote_value("hello"), "hello");
        assert_eq!(quote_value("/usr/bin"), "/usr/bin");
        assert_eq!(quote_value(""), "''");
    }

    #[test]
    fn test_quote_value_with_spaces() {
        assert_eq!(quote_value("hello world"), "'hello world'");
        assert_eq!(quote_value("it's"), "'it'\\''s'");
    }

    #[test]
    fn test_quote_for_reuse() {
        assert_eq!(quote_for_reuse("a b"), "'a b'");
        assert_eq!(quote_for_reuse(""), "''");
        assert_eq!(quote_for_reuse("it's"), "$'it\\'s'");
        assert_eq!(quote_for_reuse("a\nb"), "$'a\\nb'");
    }

    #[test]
    fn test_quote_declare_value() {
        assert_eq!(quote_declare_value("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote_declare_value("$x"), "\"\\$x\"");
    }

    #[test]
    fn test_quote_for_trace() {
        assert_eq!(quote_for_trace("abc"), "abc");
        assert_eq!(quote_for_trace("a b"), "'a b'");
        assert_eq!(quote_for_trace(""), "''");
    }

    #[test]
    fn test_decode_escapes() {
        assert_eq!(decode_backslash_escapes("a\\tb", true).0, "a\tb");
        assert_eq!(decode_backslash_escapes("\\x41\\0101", true).0, "AA");
        assert_eq!(decode_backslash_escapes("\\101", false).0, "A");
        assert_eq!(decode_backslash_escapes("\\u00e9", false).0, "é");
        let (out, stop) = decode_backslash_escapes("ab\\cde", true);
        assert_eq!(out, "ab");
        assert_eq!(stop, EscapeStop::StopOutput);
        assert_eq!(decode_backslash_escapes("\\q", true).0, "\\q");
    }

    #[test]
    fn test_hex_and_octal_escapes_are_single_bytes() {
        use crate::process::raw_bytes::encode;
        let (out, _) = decode_backslash_escapes("\\xff\\x41\\0377", true);
        assert_eq!(&*encode(&out), b"\xffA\xff");
        let (out, _) = decode_backslash_escapes("\\351\\u00e9", false);
        assert_eq!(&*encode(&out), b"\xe9\xc3\xa9");
        assert_eq!(quote_for_reuse(&out), "$'\\351\u{e9}'");
    }
}
