//! umask - Show or set the file creation mask
//!
//! umask [-S] [MODE]
//!
//! MODE is octal (`022`) or symbolic (`u=rwx,g=rx,o=`).

use nix::sys::stat::{umask, Mode};

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::builtins::{out, parse_flags};
use crate::interpreter::errors::{EvalResult, UsageError};
use crate::interpreter::interpreter::Interpreter;

fn current_mask() -> u32 {
    // There is no read-only query; set and restore.
    let old = umask(Mode::empty());
    umask(old);
    old.bits() as u32
}

/// `u=rwx,g=rx,o=` for a mask.
pub fn symbolic(mask: u32) -> String {
    let allowed = !mask & 0o777;
    ["u", "g", "o"]
        .iter()
        .enumerate()
        .map(|(i, who)| {
            let bits = (allowed >> (6 - 3 * i)) & 0o7;
            let mut s = format!("{}=", who);
            for (bit, c) in [(4, 'r'), (2, 'w'), (1, 'x')] {
                if bits & bit != 0 {
                    s.push(c);
                }
            }
            s
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Apply a symbolic mode like `g-w,o=` to `mask`.
pub fn apply_symbolic(mask: u32, spec: &str) -> Option<u32> {
    let mut allowed = !mask & 0o777;
    for clause in spec.split(',') {
        let op_pos = clause.find(['=', '+', '-'])?;
        let (who, rest) = clause.split_at(op_pos);
        let mut who_bits = 0;
        for c in who.chars() {
            who_bits |= match c {
                'u' => 0o700,
                'g' => 0o070,
                'o' => 0o007,
                'a' => 0o777,
                _ => return None,
            };
        }
        if who_bits == 0 {
            who_bits = 0o777;
        }
        let op = rest.chars().next()?;
        let mut perm = 0;
        for c in rest[1..].chars() {
            perm |= match c {
                'r' => 0o444,
                'w' => 0o222,
                'x' => 0o111,
                _ => return None,
            };
        }
        let perm = perm & who_bits;
        match op {
            '=' => allowed = (allowed & !who_bits) | perm,
            '+' => allowed |= perm,
            _ => allowed &= !perm,
        }
    }
    Some(!allowed & 0o777)
}

pub fn handle_umask(_sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let (flags, first) = parse_flags(cmd.args(), "S", false)?;
    let mask = current_mask();
    let Some(spec) = cmd.args().get(first) else {
        if flags.has('S') {
            out(&format!("{}\n", symbolic(mask)))?;
        } else {
            out(&format!("{:04o}\n", mask))?;
        }
        return Ok(0);
    };

    let new_mask = if spec.chars().all(|c| c.is_ascii_digit()) {
        u32::from_str_radix(spec, 8).ok().filter(|m| *m <= 0o777)
    } else {
        apply_symbolic(mask, spec)
    };
    match new_mask {
        Some(m) => {
            umask(Mode::from_bits_truncate(m as libc::mode_t));
            Ok(0)
        }
        None if spec.chars().all(|c| c.is_ascii_digit()) => {
            Err(UsageError::new(format!("{}: octal number out of range", spec)).into())
        }
        None => Err(UsageError::new(format!("`{}': invalid symbolic mode", spec)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbolic() {
        assert_eq!(symbolic(0o022), "u=rwx,g=rx,o=rx");
        assert_eq!(symbolic(0o077), "u=rwx,g=,o=");
    }

    #[test]
    fn test_apply_symbolic() {
        assert_eq!(apply_symbolic(0o022, "g-x"), Some(0o032));
        assert_eq!(apply_symbolic(0o022, "o="), Some(0o027));
        assert_eq!(apply_symbolic(0o077, "g+r"), Some(0o037));
        assert_eq!(apply_symbolic(0o000, "a=r"), Some(0o333));
        assert_eq!(apply_symbolic(0o022, "q+r"), None);
        assert_eq!(apply_symbolic(0o022, "u"), None);
    }
}
