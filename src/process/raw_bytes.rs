//! Raw Bytes in Shell Strings
//!
//! Shell values are `String`s, but programs may write any bytes. A byte
//! that isn't part of valid UTF-8 is kept as the private-use character
//! `U+10FF00 + byte` (so `U+10FF80..=U+10FFFF`) and written back out as
//! that same byte.
//!
//! Valid UTF-8 for a character in that range is decoded byte by byte as
//! well, so `encode(&decode(b)) == b` for every input.

use std::borrow::Cow;
use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;

const RAW_BASE: u32 = 0x10FF00;
const RAW_FIRST: char = '\u{10FF80}';
const RAW_LAST: char = '\u{10FFFF}';

/// The character standing for byte `b`: ASCII as itself, anything else as
/// a raw byte.
pub fn raw_char(b: u8) -> char {
    if b.is_ascii() {
        char::from(b)
    } else {
        char::from_u32(RAW_BASE + u32::from(b)).unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}

fn is_raw(c: char) -> bool {
    (RAW_FIRST..=RAW_LAST).contains(&c)
}

/// The byte `c` stands for, when it is a raw byte.
pub fn raw_byte(c: char) -> Option<u8> {
    is_raw(c).then(|| (u32::from(c) - RAW_BASE) as u8)
}

/// Bytes from a pipe or fd to a shell string.
pub fn decode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                push_valid(&mut out, valid);
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                // `valid_up_to` always falls on a char boundary.
                push_valid(&mut out, std::str::from_utf8(valid).unwrap_or_default());
                let bad = e.error_len().unwrap_or(after.len());
                out.extend(after[..bad].iter().map(|&b| raw_char(b)));
                rest = &after[bad..];
            }
        }
    }
    out
}

fn push_valid(out: &mut String, s: &str) {
    if !s.contains(is_raw) {
        out.push_str(s);
        return;
    }
    for c in s.chars() {
        if is_raw(c) {
            let mut buf = [0u8; 4];
            out.extend(c.encode_utf8(&mut buf).bytes().map(raw_char));
        } else {
            out.push(c);
        }
    }
}

/// A shell string as the bytes to write or pass to the kernel.
pub fn encode(s: &str) -> Cow<'_, [u8]> {
    if !s.contains(is_raw) {
        return Cow::Borrowed(s.as_bytes());
    }
    let mut out = Vec::with_capacity(s.len());
    let mut buf = [0u8; 4];
    for c in s.chars() {
        match raw_byte(c) {
            Some(b) => out.push(b),
            None => out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes()),
        }
    }
    Cow::Owned(out)
}

/// A shell string as a path or other OS string.
pub fn to_os(s: &str) -> OsString {
    OsString::from_vec(encode(s).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passes_through() {
        let s = decode("héllo 中".as_bytes());
        assert_eq!(s, "héllo 中");
        assert!(matches!(encode(&s), Cow::Borrowed(_)));
    }

    #[test]
    fn test_invalid_bytes_round_trip() {
        let bytes = b"a\xffb\xc3(\xe2\x82";
        let s = decode(bytes);
        assert_eq!(s.chars().count(), 7);
        assert!(s.starts_with('a'));
        assert_eq!(&*encode(&s), bytes);
    }

    #[test]
    fn test_valid_raw_range_is_escaped() {
        let bytes = "x\u{10FF81}y".as_bytes();
        let s = decode(bytes);
        assert_eq!(s.chars().count(), 6);
        assert_eq!(&*encode(&s), bytes);
    }

    #[test]
    fn test_raw_char() {
        assert_eq!(raw_char(b'A'), 'A');
        assert_eq!(&*encode(&raw_char(0xff).to_string()), b"\xff");
        assert_eq!(to_os(&format!("f{}", raw_char(0x80))).into_vec(), b"f\x80");
    }
}
