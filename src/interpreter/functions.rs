//! Function Handling
//!
//! Invocation of shell functions: a new positional frame and local scope,
//! the recursion limit, and `return` caught at the function boundary.

use std::rc::Rc;

use log::trace;

use crate::ast::types::Command;
use crate::interpreter::errors::{ControlFlow, EvalResult, FatalRuntimeError, InterpreterError, StrictModeError};
use crate::interpreter::interpreter::Interpreter;
use crate::parser::arena::Token;

impl Interpreter {
    /// Run a function body with `args` as `$1..`. Loops in the caller are
    /// not visible to `break` inside the function.
    pub(crate) fn call_function(
        &mut self,
        name: &str,
        body: Rc<Command>,
        args: Vec<String>,
        loc: Option<&Token>,
    ) -> EvalResult<i32> {
        if self.call_stack.call_depth >= self.limits.max_recursion_depth {
            return Err(FatalRuntimeError::at(
                format!(
                    "{}: maximum function recursion depth ({}) exceeded",
                    name, self.limits.max_recursion_depth
                ),
                loc,
            )
            .into());
        }
        if self.shopt.strict_errexit && self.options.errexit && self.flow.errexit_suppressed > 0 {
            return Err(StrictModeError::at(
                format!("{}: can't call a function where errexit is disabled", name),
                loc,
            )
            .into());
        }

        trace!("calling {} with {} args", name, args.len());
        self.mem.push_call(args);
        self.call_stack.call_depth += 1;
        self.call_stack.func_names.push(name.to_string());
        let saved_loops = std::mem::take(&mut self.flow.loop_depth);

        let result = self.execute(&body);

        self.flow.loop_depth = saved_loops;
        self.call_stack.func_names.pop();
        self.call_stack.call_depth -= 1;
        self.mem.pop_call();

        match result {
            Err(InterpreterError::ControlFlow(ControlFlow::Return(n))) => Ok(n),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpreter::InterpreterOptions;

    fn interp() -> Interpreter {
        Interpreter::new(InterpreterOptions {
            import_env: false,
            ..InterpreterOptions::default()
        })
    }

    #[test]
    fn test_positional_args_are_scoped() {
        let mut sh = interp();
        sh.eval_source("set -- outer; f() { inner=$1; n=$#; }; f a b c; after=$1", "t").unwrap();
        assert_eq!(sh.get_var("inner").as_deref(), Some("a"));
        assert_eq!(sh.get_var("n").as_deref(), Some("3"));
        assert_eq!(sh.get_var("after").as_deref(), Some("outer"));
    }

    #[test]
    fn test_return_status() {
        let mut sh = interp();
        sh.eval_source("f() { return 7; echo no; }; f; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("7"));
    }

    #[test]
    fn test_local_variables() {
        let mut sh = interp();
        sh.eval_source("x=global; f() { local x=local; y=$x; }; f", "t").unwrap();
        assert_eq!(sh.get_var("x").as_deref(), Some("global"));
        assert_eq!(sh.get_var("y").as_deref(), Some("local"));
    }

    #[test]
    fn test_recursion_limit() {
        let mut sh = Interpreter::new(InterpreterOptions {
            import_env: false,
            limits: crate::interpreter::types::ExecutionLimits {
                max_recursion_depth: 20,
                ..Default::default()
            },
            ..InterpreterOptions::default()
        });
        let err = sh.eval_source("f() { f; }; f", "t").unwrap_err();
        assert!(err.to_string().contains("maximum function recursion depth (20)"));
        assert_eq!(sh.call_stack.call_depth, 0);
    }

    #[test]
    fn test_funcname() {
        let mut sh = interp();
        sh.eval_source("g() { n=${FUNCNAME[0]}; c=${FUNCNAME[1]}; }; f() { g; }; f", "t").unwrap();
        assert_eq!(sh.get_var("n").as_deref(), Some("g"));
        assert_eq!(sh.get_var("c").as_deref(), Some("f"));
    }

    #[test]
    fn test_break_does_not_cross_function() {
        let mut sh = interp();
        sh.eval_source("f() { break; }; for i in 1 2; do f; done; s=$i", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("2"));
    }
}
