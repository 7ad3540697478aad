//! shift - Shift positional parameters
//!
//! shift [n]
//!
//! Shifts positional parameters to the left by n (default 1).
//! $n+1 becomes $1, $n+2 becomes $2, etc.
//! A count larger than $# leaves the parameters alone and fails.

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::errors::{EvalResult, UsageError};
use crate::interpreter::interpreter::Interpreter;

pub fn handle_shift(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let n = match cmd.args().first() {
        None => 1,
        Some(arg) => match arg.parse::<usize>() {
            Ok(n) => n,
            Err(_) => return Err(UsageError::new(format!("{}: numeric argument required", arg)).into()),
        },
    };
    if sh.mem.shift(n) {
        Ok(0)
    } else {
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::interpreter::{Interpreter, InterpreterOptions};

    #[test]
    fn test_shift() {
        let mut sh = Interpreter::new(InterpreterOptions::default());
        sh.eval_source("set -- a b c; shift; x=$1; shift 2; n=$#", "t").unwrap();
        assert_eq!(sh.get_var("x").as_deref(), Some("b"));
        assert_eq!(sh.get_var("n").as_deref(), Some("0"));
    }

    #[test]
    fn test_shift_out_of_range() {
        let mut sh = Interpreter::new(InterpreterOptions::default());
        sh.eval_source("set -- a; shift 2; s=$?; n=$#", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("1"));
        assert_eq!(sh.get_var("n").as_deref(), Some("1"));
    }

    #[test]
    fn test_shift_bad_count() {
        let mut sh = Interpreter::new(InterpreterOptions::default());
        sh.eval_source("shift x; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("2"));
    }
}
