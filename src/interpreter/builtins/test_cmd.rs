//! test, [ - Evaluate a conditional expression
//!
//! test EXPR
//! [ EXPR ]
//!
//! Uses the same operators and evaluator as `[[ ]]`, with the arguments
//! already expanded. The status is 0 for true, 1 for false and 2 for a
//! malformed expression.

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::conditionals::BoolMode;
use crate::interpreter::errors::{EvalResult, InterpreterError, UsageError};
use crate::interpreter::interpreter::Interpreter;
use crate::parser::conditional_parser::parse_test_args;

pub fn handle_test(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let mut args = cmd.args();
    if cmd.name() == "[" {
        match args.split_last() {
            Some((last, rest)) if last == "]" => args = rest,
            _ => return Err(UsageError::new("missing `]'").into()),
        }
    }
    let expr = match parse_test_args(args) {
        Ok(Some(e)) => e,
        Ok(None) => return Ok(1),
        Err(e) => return Err(UsageError::new(e.message).into()),
    };
    match sh.eval_bool(&expr, BoolMode::Test) {
        Ok(true) => Ok(0),
        Ok(false) => Ok(1),
        Err(InterpreterError::Fatal(e)) => Err(UsageError::new(e.message).into()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::interpreter::{Interpreter, InterpreterOptions};

    fn status(src: &str) -> String {
        let mut sh = Interpreter::new(InterpreterOptions {
            import_env: false,
            ..InterpreterOptions::default()
        });
        sh.eval_source(&format!("{}; s=$?", src), "t").unwrap();
        sh.get_var("s").unwrap()
    }

    #[test]
    fn test_string_tests() {
        assert_eq!(status("test -n abc"), "0");
        assert_eq!(status("test -z abc"), "1");
        assert_eq!(status("[ abc = abc ]"), "0");
        assert_eq!(status("[ abc != abc ]"), "1");
        assert_eq!(status("[ ]"), "1");
        assert_eq!(status("[ -n ]"), "0");
    }

    #[test]
    fn test_integer_tests() {
        assert_eq!(status("[ 3 -lt 10 ]"), "0");
        assert_eq!(status("[ 3 -gt 10 ]"), "1");
        assert_eq!(status("[ ! 3 -gt 10 ]"), "0");
    }

    #[test]
    fn test_compound() {
        assert_eq!(status("[ -d / -a -e / ]"), "0");
        assert_eq!(status("[ -f / -o -d / ]"), "0");
    }

    #[test]
    fn test_malformed() {
        assert_eq!(status("[ a = a"), "2");
        assert_eq!(status("[ 1 -lt x ]"), "2");
    }
}
