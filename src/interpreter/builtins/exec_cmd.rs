//! exec - Replace the shell, or make redirects permanent
//!
//! exec [command [arg ...]]
//!
//! With no command, the redirects of the `exec` command itself stay in
//! place for the rest of the shell. With a command, the shell process
//! becomes that program. If the program can't be run, a non-interactive
//! shell exits with 126 or 127.

use log::debug;

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::errors::{ControlFlow, EvalResult};
use crate::interpreter::interpreter::Interpreter;
use crate::process::exec_program;

pub fn handle_exec(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    sh.fd_state.make_permanent();
    let mut args = cmd.args();
    if args.first().map(String::as_str) == Some("--") {
        args = &args[1..];
    }
    if args.is_empty() {
        return Ok(0);
    }
    debug!("exec {:?}", args);
    let environ = sh.mem.exported_environ();
    let path_var = sh.get_var("PATH");
    let status = exec_program(args, &environ, path_var.as_deref());
    if sh.process.interactive {
        return Ok(status);
    }
    Err(ControlFlow::Exit(status).into())
}

#[cfg(test)]
mod tests {
    use crate::interpreter::interpreter::{Interpreter, InterpreterOptions};

    #[test]
    fn test_exec_in_subshell_replaces_process() {
        let mut sh = Interpreter::new(InterpreterOptions::default());
        sh.eval_source("x=$(exec echo replaced; echo not-reached)", "t").unwrap();
        assert_eq!(sh.get_var("x").as_deref(), Some("replaced"));
    }

    #[test]
    fn test_exec_not_found_exits_subshell() {
        let mut sh = Interpreter::new(InterpreterOptions::default());
        sh.eval_source("(exec /nonexistent/prog; exit 0); s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("127"));
    }
}
