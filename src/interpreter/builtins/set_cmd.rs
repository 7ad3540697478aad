//! set - Set shell options and positional parameters
//!
//! set [-eufxCnam] [+eufxCnam] [-o option] [+o option] [--] [arg ...]
//!
//! With no arguments, prints every variable in a form that can be read
//! back. `set -o` lists options with their state, `set +o` as commands
//! that restore them. Operands replace the positional parameters.

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::builtins::out;
use crate::interpreter::errors::{EvalResult, UsageError};
use crate::interpreter::helpers::quoting::quote_value;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::types::ShellOptions;
use crate::interpreter::variables::Value;

fn set_option(sh: &mut Interpreter, name: &str, on: bool) -> Result<(), UsageError> {
    if !sh.options.set(name, on) {
        return Err(UsageError::new(format!("{}: invalid option name", name)));
    }
    if name == "monitor" {
        sh.waiter.untraced = on;
    }
    Ok(())
}

fn list_options(sh: &Interpreter, as_commands: bool) -> String {
    let mut s = String::new();
    for name in ShellOptions::names() {
        let on = sh.options.get(name).unwrap_or(false);
        if as_commands {
            s.push_str(&format!("set {}o {}\n", if on { '-' } else { '+' }, name));
        } else {
            s.push_str(&format!("{:<15}\t{}\n", name, if on { "on" } else { "off" }));
        }
    }
    s
}

fn list_variables(sh: &Interpreter) -> String {
    let mut vars = sh.mem.visible();
    vars.sort_by(|a, b| a.0.cmp(&b.0));
    let mut s = String::new();
    for (name, cell) in vars {
        let line = match &cell.value {
            Value::Undef => continue,
            Value::Str(v) => format!("{}={}", name, quote_value(v)),
            Value::BashArray(items) => {
                let items: Vec<String> = items.iter().map(|(i, v)| format!("[{}]={}", i, quote_value(v))).collect();
                format!("{}=({})", name, items.join(" "))
            }
            Value::AssocArray(map) => {
                let items: Vec<String> = map.iter().map(|(k, v)| format!("[{}]={}", k, quote_value(v))).collect();
                format!("{}=({})", name, items.join(" "))
            }
        };
        s.push_str(&line);
        s.push('\n');
    }
    s
}

pub fn handle_set(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let args = cmd.args();
    if args.is_empty() {
        out(&list_variables(sh))?;
        return Ok(0);
    }

    let mut i = 0;
    let mut positional: Option<Vec<String>> = None;
    while i < args.len() {
        let arg = &args[i];
        if arg == "--" {
            positional = Some(args[i + 1..].to_vec());
            break;
        }
        if arg == "-" {
            sh.options.xtrace = false;
            positional = Some(args[i + 1..].to_vec());
            break;
        }
        let on = arg.starts_with('-');
        if !(on || arg.starts_with('+')) || arg.len() < 2 {
            positional = Some(args[i..].to_vec());
            break;
        }
        for c in arg[1..].chars() {
            if c == 'o' {
                i += 1;
                match args.get(i) {
                    Some(name) => set_option(sh, name, on)?,
                    None => {
                        out(&list_options(sh, !on))?;
                        return Ok(0);
                    }
                }
                continue;
            }
            match ShellOptions::name_for_flag(c) {
                Some(name) => set_option(sh, name, on)?,
                None => return Err(UsageError::new(format!("{}{}: invalid option", &arg[..1], c)).into()),
            }
        }
        i += 1;
    }
    if let Some(argv) = positional {
        sh.mem.set_argv(argv);
    }
    Ok(0)
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
    fn test_flags_and_long_names() {
        let mut sh = interp();
        sh.eval_source("set -u -o pipefail; set +u", "t").unwrap();
        assert!(!sh.options.nounset);
        assert!(sh.options.pipefail);
    }

    #[test]
    fn test_positional() {
        let mut sh = interp();
        sh.eval_source("set -- a 'b c'; n=$#; two=$2", "t").unwrap();
        assert_eq!(sh.get_var("n").as_deref(), Some("2"));
        assert_eq!(sh.get_var("two").as_deref(), Some("b c"));
        sh.eval_source("set --; n=$#", "t").unwrap();
        assert_eq!(sh.get_var("n").as_deref(), Some("0"));
    }

    #[test]
    fn test_operands_without_dashes() {
        let mut sh = interp();
        sh.eval_source("set x y; v=$1$2", "t").unwrap();
        assert_eq!(sh.get_var("v").as_deref(), Some("xy"));
    }

    #[test]
    fn test_invalid_option() {
        let mut sh = interp();
        sh.eval_source("set -o nosuchoption; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("2"));
        sh.eval_source("set -Q; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("2"));
    }

    #[test]
    fn test_list_options() {
        let mut sh = interp();
        sh.options.errexit = true;
        let text = list_options(&sh, true);
        assert!(text.contains("set -o errexit\n"));
        assert!(text.contains("set +o xtrace\n"));
        let dollar_dash = sh.options.flags_string();
        assert!(dollar_dash.contains('e'));
    }

    #[test]
    fn test_list_variables_quotes() {
        let mut sh = interp();
        sh.set_str("greeting", "hello world").unwrap();
        let text = list_variables(&sh);
        assert!(text.contains("greeting='hello world'\n"));
    }
}
