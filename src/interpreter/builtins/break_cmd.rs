//! break, continue - Leave or restart enclosing loops
//!
//! break [n]
//! continue [n]
//!
//! Both unwind to the nth enclosing loop. Outside a loop they print a
//! warning and succeed.

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::errors::EvalResult;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_break(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    sh.control_flow_status("break", cmd.args().first().map(String::as_str), cmd.arg_loc(1))
}

pub fn handle_continue(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    sh.control_flow_status("continue", cmd.args().first().map(String::as_str), cmd.arg_loc(1))
}
