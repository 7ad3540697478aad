//! Builtin Commands
//!
//! This module contains implementations of shell builtin commands. Each
//! `handle_*` function has the `BuiltinFn` signature and is registered in
//! the dispatch table.

pub mod break_cmd;
pub mod cd_cmd;
pub mod declare_cmd;
pub mod echo_cmd;
pub mod eval_cmd;
pub mod exec_cmd;
pub mod exit_cmd;
pub mod export_cmd;
pub mod jobs_cmd;
pub mod kill_cmd;
pub mod local_cmd;
pub mod printf_cmd;
pub mod read_cmd;
pub mod return_cmd;
pub mod set_cmd;
pub mod shift_cmd;
pub mod shopt_cmd;
pub mod source_cmd;
pub mod test_cmd;
pub mod trap_cmd;
pub mod umask_cmd;
pub mod unset_cmd;

use crate::interpreter::errors::{EvalResult, UsageError};
use crate::process::{raw_bytes, write_fd};

/// Leading `-x`/`+x` flags of a builtin.
#[derive(Debug, Default, Clone)]
pub struct Flags {
    /// Flags given with `-`, in order.
    pub on: Vec<char>,
    /// Flags given with `+`.
    pub off: Vec<char>,
    /// Flags that take a value, e.g. `-p PROMPT`.
    pub values: Vec<(char, String)>,
}

impl Flags {
    pub fn has(&self, c: char) -> bool {
        self.on.contains(&c)
    }

    pub fn has_off(&self, c: char) -> bool {
        self.off.contains(&c)
    }

    pub fn value(&self, c: char) -> Option<&str> {
        self.values.iter().rev().find(|(f, _)| *f == c).map(|(_, v)| v.as_str())
    }
}

/// Parse leading flags. `spec` lists the accepted letters; a letter
/// followed by `:` takes a value. With `allow_plus`, `+x` turns a flag
/// off. Returns the flags and the index of the first operand.
pub fn parse_flags(args: &[String], spec: &str, allow_plus: bool) -> Result<(Flags, usize), UsageError> {
    let mut flags = Flags::default();
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if arg == "--" {
            i += 1;
            break;
        }
        let plus = arg.starts_with('+');
        if arg.len() < 2 || !(arg.starts_with('-') || (plus && allow_plus)) {
            break;
        }
        let letters: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < letters.len() {
            let c = letters[j];
            let Some(pos) = spec.find(c) else {
                return Err(UsageError::new(format!("{}{}: invalid option", &arg[..1], c)));
            };
            if spec[pos + c.len_utf8()..].starts_with(':') {
                let rest: String = letters[j + 1..].iter().collect();
                let value = if !rest.is_empty() {
                    rest
                } else {
                    i += 1;
                    match args.get(i) {
                        Some(v) => v.clone(),
                        None => return Err(UsageError::new(format!("-{}: option requires an argument", c))),
                    }
                };
                flags.values.push((c, value));
                break;
            }
            if plus {
                flags.off.push(c);
            } else {
                flags.on.push(c);
            }
            j += 1;
        }
        i += 1;
    }
    Ok((flags, i))
}

/// Write builtin output to stdout.
pub fn out(s: &str) -> EvalResult<()> {
    write_fd(1, &raw_bytes::encode(s))?;
    Ok(())
}
