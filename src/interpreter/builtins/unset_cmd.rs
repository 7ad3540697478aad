//! unset - Remove variables/functions builtin
//!
//! Supports:
//! - unset VAR - remove variable, or the function VAR if no variable exists
//! - unset -v VAR - remove variable (explicit)
//! - unset -f FUNC - remove function
//! - unset 'a[i]' - remove array element

use crate::interpreter::builtin_dispatch::{is_valid_name, CmdValue};
use crate::interpreter::builtins::parse_flags;
use crate::interpreter::errors::EvalResult;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::simple_command_assignments::split_lhs;
use crate::interpreter::variables::Value;
use crate::parser::parse_arith_string;

fn unset_var(sh: &mut Interpreter, arg: &str) -> EvalResult<bool> {
    let (name, index) = split_lhs(arg);
    if !is_valid_name(&name) {
        eprintln!("oshell: unset: `{}': not a valid identifier", arg);
        return Ok(false);
    }
    let result = match index {
        None => sh.mem.unset(&name),
        Some(index) => {
            let key = match sh.mem.get(&name) {
                Some(Value::AssocArray(_)) => index,
                _ => {
                    let expr = parse_arith_string(&index)?;
                    sh.eval_arith(&expr)?.to_string()
                }
            };
            sh.mem.unset_element(&name, &key)
        }
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) => {
            eprintln!("oshell: unset: {}: cannot unset: {}", name, e);
            Ok(false)
        }
    }
}

pub fn handle_unset(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let (flags, first) = parse_flags(cmd.args(), "vf", false)?;
    let mut status = 0;
    for arg in &cmd.args()[first..] {
        if flags.has('f') {
            sh.functions.remove(arg.as_str());
            continue;
        }
        if !flags.has('v') && !sh.mem.is_set(arg) && sh.functions.remove(arg.as_str()).is_some() {
            continue;
        }
        if !unset_var(sh, arg)? {
            status = 1;
        }
    }
    Ok(status)
}
