//! export, readonly - Set variable attributes
//!
//! export [-n] [-p] [name[=value] ...]
//! readonly [-aA] [-p] [name[=value] ...]
//!
//! Both work on the variable visible in the current scope. Without
//! operands they list the variables that carry the attribute.

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::builtins::declare_cmd::{declare_each, print_declared, Attrs};
use crate::interpreter::builtins::parse_flags;
use crate::interpreter::errors::EvalResult;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_export(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let (flags, _) = parse_flags(cmd.args(), "fnp", false)?;
    let attrs = Attrs {
        export: Some(!flags.has('n')),
        ..Attrs::default()
    };
    if flags.has('p') || cmd.pairs.is_empty() {
        return print_declared(sh, &attrs, &[], "export");
    }
    declare_each(sh, "export", &cmd.pairs, &attrs)
}

pub fn handle_readonly(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let (flags, _) = parse_flags(cmd.args(), "aApf", false)?;
    let attrs = Attrs {
        array: flags.has('a'),
        assoc: flags.has('A'),
        readonly: true,
        ..Attrs::default()
    };
    if flags.has('p') || cmd.pairs.is_empty() {
        return print_declared(sh, &attrs, &[], "readonly");
    }
    declare_each(sh, "readonly", &cmd.pairs, &attrs)
}
