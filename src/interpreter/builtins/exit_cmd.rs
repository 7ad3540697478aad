//! exit - Exit the shell
//!
//! exit [n]
//!
//! The status wraps modulo 256. A non-numeric argument is an error that
//! still exits, with status 2. In a subshell only the subshell exits.

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::errors::EvalResult;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_exit(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    sh.control_flow_status("exit", cmd.args().first().map(String::as_str), cmd.arg_loc(1))
}

#[cfg(test)]
mod tests {
    use crate::interpreter::errors::{ControlFlow, InterpreterError};
    use crate::interpreter::interpreter::{Interpreter, InterpreterOptions};

    #[test]
    fn test_exit_wraps() {
        let mut sh = Interpreter::new(InterpreterOptions::default());
        let err = sh.eval_source("exit 258", "t").unwrap_err();
        assert!(matches!(err, InterpreterError::ControlFlow(ControlFlow::Exit(2))));
    }

    #[test]
    fn test_exit_bad_argument() {
        let mut sh = Interpreter::new(InterpreterOptions::default());
        let err = sh.eval_source("exit abc", "t").unwrap_err();
        assert!(matches!(err, InterpreterError::ControlFlow(ControlFlow::Exit(2))));
    }

    #[test]
    fn test_exit_in_subshell() {
        let mut sh = Interpreter::new(InterpreterOptions::default());
        sh.eval_source("(exit 5); s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("5"));
    }
}
