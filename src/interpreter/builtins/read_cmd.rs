//! read - Read a line of input builtin
//!
//! Supports:
//! - read VAR... - split the line on IFS; the last VAR gets the rest
//! - read -r - raw mode (no backslash escaping or line continuation)
//! - read -d DELIM - stop at DELIM instead of newline
//! - read -a ARRAY - read fields into an indexed array
//! - read -p PROMPT - print PROMPT to stderr first
//! - read -u FD - read from file descriptor FD
//!
//! Input is read one byte at a time, so the rest of the stream is left
//! for whoever reads it next. The status is 1 at end of input.

use crate::interpreter::builtin_dispatch::{is_valid_name, CmdValue};
use crate::interpreter::builtins::parse_flags;
use crate::interpreter::errors::{EvalResult, UsageError};
use crate::interpreter::helpers::ifs::{split_for_read, Ifs};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::variables::Value;
use crate::process::{raw_bytes, read_byte};

/// Read up to `delim`. Returns the bytes and whether the delimiter was
/// seen. Without `raw`, backslash-newline joins lines.
fn read_record(sh: &mut Interpreter, fd: i32, delim: u8, raw: bool) -> EvalResult<(Vec<u8>, bool)> {
    let mut buf = Vec::new();
    loop {
        let byte = match read_byte(fd) {
            Ok(b) => b,
            Err(e) if e.is_interrupted() => {
                sh.run_pending_traps()?;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        match byte {
            None => return Ok((buf, false)),
            Some(b) if b == delim => {
                if !raw && buf.last() == Some(&b'\\') && !ends_with_escaped_backslash(&buf) {
                    buf.pop();
                    continue;
                }
                return Ok((buf, true));
            }
            Some(b) => buf.push(b),
        }
    }
}

/// True when the trailing backslash is itself escaped, as in `a\\`.
fn ends_with_escaped_backslash(buf: &[u8]) -> bool {
    let n = buf.iter().rev().take_while(|b| **b == b'\\').count();
    n % 2 == 0
}

pub fn handle_read(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let (flags, first) = parse_flags(cmd.args(), "rd:a:p:u:", false)?;
    let names = &cmd.args()[first..];
    let raw = flags.has('r');
    let delim = match flags.value('d') {
        Some(d) => d.bytes().next().unwrap_or(0),
        None => b'\n',
    };
    let fd = match flags.value('u') {
        Some(u) => u
            .parse::<i32>()
            .map_err(|_| UsageError::new(format!("{}: invalid file descriptor specification", u)))?,
        None => 0,
    };
    for name in names.iter().chain(flags.value('a').map(str::to_string).iter()) {
        if !is_valid_name(name) {
            eprintln!("oshell: read: `{}': not a valid identifier", name);
            return Ok(1);
        }
    }
    if let Some(prompt) = flags.value('p') {
        eprint!("{}", prompt);
    }

    let (bytes, complete) = read_record(sh, fd, delim, raw)?;
    let line = raw_bytes::decode(&bytes);
    let status = if complete { 0 } else { 1 };
    if !complete && bytes.is_empty() {
        return Ok(1);
    }

    let ifs_value = sh.get_var("IFS");
    let ifs = Ifs::new(ifs_value.as_deref());
    if let Some(array) = flags.value('a') {
        let fields = split_for_read(&line, &ifs, 0, raw);
        sh.set_var(array, Value::array(fields), None)?;
        return Ok(status);
    }
    if names.is_empty() {
        let reply = if raw { line } else { split_for_read(&line, &Ifs::new(Some("")), 1, false).concat() };
        sh.set_str("REPLY", reply)?;
        return Ok(status);
    }
    let mut fields = split_for_read(&line, &ifs, names.len(), raw).into_iter();
    for name in names {
        sh.set_str(name, fields.next().unwrap_or_default())?;
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpreter::InterpreterOptions;

    fn interp() -> Interpreter {
        Interpreter::new(InterpreterOptions {
            import_env: false,
            ..InterpreterOptions::default()
        })
    }

    #[test]
    fn test_ends_with_escaped_backslash() {
        assert!(ends_with_escaped_backslash(b"a\\\\"));
        assert!(!ends_with_escaped_backslash(b"a\\"));
    }

    #[test]
    fn test_read_fields() {
        let mut sh = interp();
        sh.eval_source("read a b <<< '  one two three  '", "t").unwrap();
        assert_eq!(sh.get_var("a").as_deref(), Some("one"));
        assert_eq!(sh.get_var("b").as_deref(), Some("two three"));
    }

    #[test]
    fn test_read_array_and_ifs() {
        let mut sh = interp();
        sh.eval_source("IFS=: read -a parts <<< 'x:y::z'; n=${#parts[@]}; third=${parts[2]}", "t").unwrap();
        assert_eq!(sh.get_var("n").as_deref(), Some("4"));
        assert_eq!(sh.get_var("third").as_deref(), Some(""));
    }

    #[test]
    fn test_read_raw_and_escapes() {
        let mut sh = interp();
        sh.eval_source("read -r r <<< 'a\\tb'; read e <<< 'a\\tb'", "t").unwrap();
        assert_eq!(sh.get_var("r").as_deref(), Some("a\\tb"));
        assert_eq!(sh.get_var("e").as_deref(), Some("atb"));
    }

    #[test]
    fn test_read_eof_status() {
        let mut sh = interp();
        sh.eval_source("read v < /dev/null; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("1"));
    }

    #[test]
    fn test_read_reply_and_delim() {
        let mut sh = interp();
        sh.eval_source("read -d , <<< 'first,second'; r=$REPLY", "t").unwrap();
        assert_eq!(sh.get_var("r").as_deref(), Some("first"));
    }

    #[test]
    fn test_read_loop_consumes_lines() {
        let mut sh = interp();
        sh.eval_source("out=''; while read l; do out=$out$l.; done <<EOF\na\nb\nEOF\n", "t").unwrap();
        assert_eq!(sh.get_var("out").as_deref(), Some("a.b."));
    }
}
