//! trap - Run code on signals and shell events
//!
//! trap                  - List handlers
//! trap -p [KEY ...]     - List handlers as reusable commands
//! trap -l               - List signal names
//! trap CODE KEY ...     - Set a handler; empty CODE ignores the signal
//! trap - KEY ...        - Restore the default
//! trap KEY              - Same as `trap - KEY`
//!
//! KEY is EXIT, ERR, DEBUG, a signal name with or without SIG, or a
//! signal number.

use nix::sys::signal::Signal;

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::builtins::out;
use crate::interpreter::errors::{EvalResult, UsageError};
use crate::interpreter::helpers::quoting::quote_for_reuse;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::traps::TrapKey;
use crate::process::signals::short_name;

fn print_traps(sh: &Interpreter, keys: &[String]) -> EvalResult<i32> {
    let mut text = String::new();
    let mut status = 0;
    if keys.is_empty() {
        for (key, code) in sh.traps.iter() {
            text.push_str(&format!("trap -- {} {}\n", quote_for_reuse(code), key.name()));
        }
    } else {
        for spec in keys {
            match TrapKey::parse(spec) {
                Some(key) => {
                    if let Some(code) = sh.traps.get(key) {
                        text.push_str(&format!("trap -- {} {}\n", quote_for_reuse(code), key.name()));
                    }
                }
                None => {
                    eprintln!("oshell: trap: {}: invalid signal specification", spec);
                    status = 1;
                }
            }
        }
    }
    out(&text)?;
    Ok(status)
}

fn list_signals() -> EvalResult<i32> {
    let text: String = Signal::iterator()
        .map(|sig| format!("{:2}) {}\n", sig as i32, short_name(sig)))
        .collect();
    out(&text)?;
    Ok(0)
}

pub fn handle_trap(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let mut args = cmd.args();
    match args.first().map(String::as_str) {
        None => return print_traps(sh, &[]),
        Some("-p") => return print_traps(sh, &args[1..]),
        Some("-l") => return list_signals(),
        Some("--") => args = &args[1..],
        Some(s) if s.starts_with('-') && s.len() > 1 => {
            return Err(UsageError::new(format!("{}: invalid option", s)).into());
        }
        _ => {}
    }
    let Some((code, keys)) = args.split_first() else {
        return print_traps(sh, &[]);
    };

    // A lone operand, or `-`, resets.
    let (code, keys): (Option<&str>, &[String]) = if keys.is_empty() {
        (None, args)
    } else if code == "-" {
        (None, keys)
    } else {
        (Some(code.as_str()), keys)
    };

    let mut status = 0;
    for spec in keys {
        let Some(key) = TrapKey::parse(spec) else {
            eprintln!("oshell: trap: {}: invalid signal specification", spec);
            status = 1;
            continue;
        };
        let result = match code {
            Some(code) => sh.traps.set(key, code),
            None => sh.traps.remove(key),
        };
        if let Err(e) = result {
            eprintln!("oshell: trap: {}: {}", spec, e.desc());
            status = 1;
        }
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpreter::InterpreterOptions;

    fn run(src: &str) -> Interpreter {
        let mut sh = Interpreter::new(InterpreterOptions {
            import_env: false,
            ..InterpreterOptions::default()
        });
        sh.eval_source(src, "t").unwrap();
        sh
    }

    #[test]
    fn test_set_and_reset() {
        let sh = run("trap 'echo bye' EXIT; trap 'x=1' ERR");
        assert_eq!(sh.traps.get(TrapKey::Exit), Some("echo bye"));
        assert_eq!(sh.traps.get(TrapKey::Err), Some("x=1"));

        let sh = run("trap 'echo bye' EXIT; trap - EXIT");
        assert_eq!(sh.traps.get(TrapKey::Exit), None);

        let sh = run("trap 'echo bye' 0; trap 0");
        assert_eq!(sh.traps.get(TrapKey::Exit), None);
    }

    #[test]
    fn test_invalid_key() {
        let mut sh = run("trap 'x' NOSUCHSIG; s=$?");
        assert_eq!(sh.get_var("s").as_deref(), Some("1"));
    }

    #[test]
    fn test_err_trap_runs() {
        let mut sh = run("trap 'seen=$?' ERR; false; true");
        assert_eq!(sh.get_var("seen").as_deref(), Some("1"));
    }
}
