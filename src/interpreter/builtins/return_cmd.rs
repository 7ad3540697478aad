//! return - Return from a shell function or sourced file
//!
//! return [n]
//!
//! Without n, the status is that of the last command.

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::errors::EvalResult;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_return(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    sh.control_flow_status("return", cmd.args().first().map(String::as_str), cmd.arg_loc(1))
}

#[cfg(test)]
mod tests {
    use crate::interpreter::interpreter::{Interpreter, InterpreterOptions};

    #[test]
    fn test_return_outside_function() {
        let mut sh = Interpreter::new(InterpreterOptions::default());
        sh.eval_source("builtin return 3; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("1"));
    }

    #[test]
    fn test_return_uses_last_status() {
        let mut sh = Interpreter::new(InterpreterOptions::default());
        sh.eval_source("f() { false; builtin return; }; f; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("1"));
    }
}
