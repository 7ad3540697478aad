//! eval - Run arguments as shell code
//!
//! eval [arg ...]
//!
//! The arguments are joined with spaces, parsed and run in the current
//! shell. break, continue and return inside the code unwind past eval.

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::errors::{EvalResult, InterpreterError};
use crate::interpreter::interpreter::Interpreter;

pub fn handle_eval(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    if cmd.args().is_empty() {
        return Ok(0);
    }
    let src = cmd.args().join(" ");
    match sh.eval_source(&src, "eval") {
        Err(InterpreterError::Parse(e)) => {
            eprintln!("{}", InterpreterError::Parse(e).render());
            Ok(2)
        }
        other => other,
    }
}
