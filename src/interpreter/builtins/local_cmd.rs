//! local - Declare function-local variables
//!
//! local [-aAxr] [name[=value] ...]
//!
//! Only valid inside a function. A bare name shadows the caller's
//! variable with an unset local.

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::builtins::declare_cmd::{declare_each, print_declared, Attrs};
use crate::interpreter::builtins::parse_flags;
use crate::interpreter::errors::EvalResult;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_local(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    if !sh.mem.in_function() {
        eprintln!("oshell: local: can only be used in a function");
        return Ok(1);
    }
    let (flags, _) = parse_flags(cmd.args(), "aAxrp", true)?;
    let attrs = Attrs::from_flags(&flags, true);
    if flags.has('p') || cmd.pairs.is_empty() {
        return print_declared(sh, &attrs, &cmd.pairs, "local");
    }
    declare_each(sh, "local", &cmd.pairs, &attrs)
}
