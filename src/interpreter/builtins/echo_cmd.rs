//! echo - Print arguments
//!
//! echo [-neE] [arg ...]
//!
//! Only an argument made entirely of `n`, `e` and `E` after the dash is
//! an option; anything else is printed. With -e, `\c` ends the output.

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::builtins::out;
use crate::interpreter::errors::EvalResult;
use crate::interpreter::helpers::quoting::{decode_backslash_escapes, EscapeStop};
use crate::interpreter::interpreter::Interpreter;

/// The text `echo` writes for `args`.
pub fn echo_text(args: &[String]) -> String {
    let mut newline = true;
    let mut escapes = false;
    let mut i = 0;
    while i < args.len() {
        let a = &args[i];
        if a.len() < 2 || !a.starts_with('-') || !a[1..].chars().all(|c| matches!(c, 'n' | 'e' | 'E')) {
            break;
        }
        for c in a[1..].chars() {
            match c {
                'n' => newline = false,
                'e' => escapes = true,
                _ => escapes = false,
            }
        }
        i += 1;
    }

    let mut text = String::new();
    for (n, arg) in args[i..].iter().enumerate() {
        if n > 0 {
            text.push(' ');
        }
        if escapes {
            let (decoded, stop) = decode_backslash_escapes(arg, true);
            text.push_str(&decoded);
            if stop == EscapeStop::StopOutput {
                return text;
            }
        } else {
            text.push_str(arg);
        }
    }
    if newline {
        text.push('\n');
    }
    text
}

pub fn handle_echo(_sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    out(&echo_text(cmd.args()))?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(args: &[&str]) -> String {
        echo_text(&args.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_plain() {
        assert_eq!(echo(&["a", "b"]), "a b\n");
        assert_eq!(echo(&[]), "\n");
    }

    #[test]
    fn test_options() {
        assert_eq!(echo(&["-n", "x"]), "x");
        assert_eq!(echo(&["-e", "a\\tb"]), "a\tb\n");
        assert_eq!(echo(&["-ne", "a\\nb"]), "a\nb");
        assert_eq!(echo(&["-x", "y"]), "-x y\n");
        assert_eq!(echo(&["-eE", "a\\tb"]), "a\\tb\n");
    }

    #[test]
    fn test_stop_output() {
        assert_eq!(echo(&["-e", "ab\\cd", "e"]), "ab");
    }
}
