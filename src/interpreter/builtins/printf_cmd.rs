//! printf - Formatted output
//!
//! printf [-v VAR] FORMAT [ARGUMENTS...]
//!
//! Conversions: %s %b %q %d %i %u %x %X %o %c %%, with the flags `-+ 0#`,
//! a width and a precision (either may be `*`). The format is reused
//! while arguments remain; missing arguments read as empty or zero.

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::builtins::{out, parse_flags};
use crate::interpreter::errors::{EvalResult, UsageError};
use crate::interpreter::helpers::quoting::{decode_backslash_escapes, quote_for_reuse, EscapeStop};
use crate::interpreter::interpreter::Interpreter;

/// Widths and precisions above this are refused instead of allocated.
const MAX_FIELD_WIDTH: u64 = 1 << 20;

#[derive(Debug, Default)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

struct Formatter<'a> {
    args: &'a [String],
    next: usize,
    /// Conversion errors; the output is still produced.
    failed: bool,
    /// `\c` in a `%b` argument.
    stopped: bool,
}

impl<'a> Formatter<'a> {
    fn take(&mut self) -> Option<&'a str> {
        let arg = self.args.get(self.next).map(String::as_str);
        if arg.is_some() {
            self.next += 1;
        }
        arg
    }

    fn take_number(&mut self) -> i64 {
        match self.take() {
            None => 0,
            Some(s) => match parse_number(s) {
                Some(n) => n,
                None => {
                    eprintln!("oshell: printf: {}: invalid number", s);
                    self.failed = true;
                    0
                }
            },
        }
    }

    /// Format one pass over `fmt`, appending to `text`.
    fn pass(&mut self, fmt: &str, text: &mut String) {
        let chars: Vec<char> = fmt.chars().collect();
        let mut i = 0;
        while i < chars.len() && !self.stopped {
            let c = chars[i];
            i += 1;
            if c != '%' {
                text.push(c);
                continue;
            }
            if chars.get(i) == Some(&'%') {
                text.push('%');
                i += 1;
                continue;
            }

            let mut spec = Spec::default();
            while let Some(&f) = chars.get(i) {
                match f {
                    '-' => spec.left = true,
                    '+' => spec.plus = true,
                    ' ' => spec.space = true,
                    '0' => spec.zero = true,
                    '#' => spec.alt = true,
                    _ => break,
                }
                i += 1;
            }
            spec.width = self.read_count(&chars, &mut i, &mut spec.left);
            if chars.get(i) == Some(&'.') {
                i += 1;
                let mut ignored = false;
                spec.precision = Some(self.read_count(&chars, &mut i, &mut ignored).unwrap_or(0));
            }
            let Some(&conv) = chars.get(i) else {
                text.push('%');
                break;
            };
            i += 1;
            self.convert(conv, &spec, text);
        }
    }

    /// A width or precision: digits or `*` taken from the arguments.
    fn read_count(&mut self, chars: &[char], i: &mut usize, left: &mut bool) -> Option<usize> {
        let n = if chars.get(*i) == Some(&'*') {
            *i += 1;
            let n = self.take_number();
            if n < 0 {
                *left = true;
            }
            n.unsigned_abs()
        } else {
            let start = *i;
            while chars.get(*i).is_some_and(|c| c.is_ascii_digit()) {
                *i += 1;
            }
            if *i == start {
                return None;
            }
            let digits: String = chars[start..*i].iter().collect();
            digits.parse().unwrap_or(u64::MAX)
        };
        if n > MAX_FIELD_WIDTH {
            eprintln!("oshell: printf: {}: field width out of range", n);
            self.failed = true;
            return None;
        }
        Some(n as usize)
    }

    fn convert(&mut self, conv: char, spec: &Spec, text: &mut String) {
        match conv {
            's' => {
                let s = self.take().unwrap_or_default();
                let s = truncate(s, spec.precision);
                pad(text, s, spec);
            }
            'b' => {
                let (decoded, stop) = decode_backslash_escapes(self.take().unwrap_or_default(), true);
                if stop == EscapeStop::StopOutput {
                    self.stopped = true;
                }
                pad(text, truncate(&decoded, spec.precision), spec);
            }
            'q' => {
                let quoted = quote_for_reuse(self.take().unwrap_or_default());
                pad(text, &quoted, spec);
            }
            'c' => {
                let s = self.take().unwrap_or_default();
                let first: String = s.chars().take(1).collect();
                pad(text, &first, spec);
            }
            'd' | 'i' => {
                let n = self.take_number();
                let mut digits = n.unsigned_abs().to_string();
                if let Some(p) = spec.precision {
                    digits = format!("{:0>width$}", digits, width = p);
                }
                let sign = if n < 0 {
                    "-"
                } else if spec.plus {
                    "+"
                } else if spec.space {
                    " "
                } else {
                    ""
                };
                pad_number(text, sign, &digits, spec);
            }
            'u' | 'x' | 'X' | 'o' => {
                let n = self.take_number() as u64;
                let (digits, prefix) = match conv {
                    'x' => (format!("{:x}", n), "0x"),
                    'X' => (format!("{:X}", n), "0X"),
                    'o' => (format!("{:o}", n), "0"),
                    _ => (n.to_string(), ""),
                };
                let prefix = if spec.alt && n != 0 { prefix } else { "" };
                pad_number(text, prefix, &digits, spec);
            }
            other => {
                eprintln!("oshell: printf: %{}: invalid directive", other);
                self.failed = true;
            }
        }
    }
}

fn truncate(s: &str, precision: Option<usize>) -> &str {
    match precision {
        Some(p) => match s.char_indices().nth(p) {
            Some((idx, _)) => &s[..idx],
            None => s,
        },
        None => s,
    }
}

fn pad(text: &mut String, s: &str, spec: &Spec) {
    let len = s.chars().count();
    let fill = spec.width.unwrap_or(0).saturating_sub(len);
    if spec.left {
        text.push_str(s);
        text.extend(std::iter::repeat(' ').take(fill));
    } else {
        text.extend(std::iter::repeat(' ').take(fill));
        text.push_str(s);
    }
}

fn pad_number(text: &mut String, sign: &str, digits: &str, spec: &Spec) {
    let width = spec.width.unwrap_or(0);
    if spec.zero && !spec.left && spec.precision.is_none() {
        let fill = width.saturating_sub(sign.len() + digits.len());
        text.push_str(sign);
        text.extend(std::iter::repeat('0').take(fill));
        text.push_str(digits);
    } else {
        pad(text, &format!("{}{}", sign, digits), spec);
    }
}

/// `42`, `-7`, `0x1f`, `017`, or `'c` for a character code.
fn parse_number(s: &str) -> Option<i64> {
    let t = s.trim_start();
    if let Some(rest) = t.strip_prefix('\'').or_else(|| t.strip_prefix('"')) {
        return Some(rest.chars().next().map_or(0, |c| c as i64));
    }
    let (neg, body) = match t.strip_prefix('-') {
        Some(b) => (true, b),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let n = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if body.len() > 1 && body.starts_with('0') {
        i64::from_str_radix(&body[1..], 8).ok()?
    } else {
        body.parse::<i64>().ok()?
    };
    Some(if neg { -n } else { n })
}

/// Expand `fmt` against `args`, reusing it while arguments remain.
/// Returns the text and whether every conversion succeeded.
pub fn format_all(fmt: &str, args: &[String]) -> (String, bool) {
    let (fmt, _) = decode_backslash_escapes(fmt, false);
    let mut f = Formatter {
        args,
        next: 0,
        failed: false,
        stopped: false,
    };
    let mut text = String::new();
    loop {
        let before = f.next;
        f.pass(&fmt, &mut text);
        if f.stopped || f.next >= args.len() || f.next == before {
            break;
        }
    }
    (text, !f.failed)
}

pub fn handle_printf(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let (flags, first) = parse_flags(cmd.args(), "v:", false)?;
    let operands = &cmd.args()[first..];
    let Some((fmt, args)) = operands.split_first() else {
        return Err(UsageError::new("usage: printf [-v var] format [arguments]").into());
    };
    let (text, ok) = format_all(fmt, args);
    match flags.value('v') {
        Some(var) => sh.set_str(var, text)?,
        None => out(&text)?,
    }
    Ok(if ok { 0 } else { 1 })
}
