//! Execution Engine
//!
//! `execute` is the one entry point for running a command node. It runs
//! pending traps, dispatches on the node type, records `$?`, and applies
//! the ERR trap and errexit to the commands they apply to.
//!
//! errexit is suppressed while running an `if`/`while` condition, every
//! operand of `&&`/`||` except the last, and the stages of a pipeline
//! (the pipeline as a whole is checked instead).

use std::io::Write;
use std::time::Instant;

use log::debug;
use nix::sys::resource::{getrusage, UsageWho};

use crate::ast::types::{AndOr, Command, ControlFlowCmd, Redirected, ShFunction, TimeBlock};
use crate::interpreter::conditionals::BoolMode;
use crate::interpreter::errors::{ControlFlow, EvalResult, FatalRuntimeError, InterpreterError};
use crate::interpreter::interpreter::Interpreter;
use crate::parser::arena::Token;
use crate::parser::id_kind::Id;

/// Commands whose failure triggers errexit directly. Compound commands
/// are covered by the commands inside them.
fn errexit_applies(node: &Command) -> bool {
    match node {
        Command::Simple(_)
        | Command::ShAssignment(_)
        | Command::Subshell(_)
        | Command::DParen(_)
        | Command::DBracket(_) => true,
        Command::Pipeline(p) => p.negated.is_none(),
        _ => false,
    }
}

/// `0m0.004s`
fn format_seconds(secs: f64) -> String {
    let mins = (secs / 60.0).floor();
    format!("{}m{:.3}s", mins as i64, secs - mins * 60.0)
}

/// `exit`, `return`, `break` and `continue` counts wrap like exit codes.
fn wrap_status(n: i64) -> i32 {
    n.rem_euclid(256) as i32
}

impl Interpreter {
    /// Run one command node and return its status.
    pub fn execute(&mut self, node: &Command) -> EvalResult<i32> {
        self.run_pending_traps()?;
        let status = self.dispatch(node)?;
        self.last_status = status;
        let redirect_failed = std::mem::take(&mut self.redirect_failed);
        if status != 0 && self.flow.errexit_suppressed == 0 && (errexit_applies(node) || redirect_failed) {
            self.run_err_trap()?;
            if self.options.errexit {
                debug!("errexit: status {} at line {}", status, node.line_num());
                return Err(ControlFlow::Exit(status).into());
            }
        }
        Ok(status)
    }

    /// Run commands in order; the status is the last one's.
    pub fn execute_list(&mut self, list: &[Command]) -> EvalResult<i32> {
        let mut status = 0;
        for node in list {
            status = self.execute(node)?;
        }
        Ok(status)
    }

    /// Run `f` with errexit and the ERR trap turned off.
    pub(crate) fn with_errexit_suppressed<T>(
        &mut self,
        f: impl FnOnce(&mut Interpreter) -> EvalResult<T>,
    ) -> EvalResult<T> {
        self.flow.errexit_suppressed += 1;
        let result = f(self);
        self.flow.errexit_suppressed -= 1;
        result
    }

    fn dispatch(&mut self, node: &Command) -> EvalResult<i32> {
        match node {
            Command::NoOp => Ok(0),
            Command::Simple(s) => self.exec_simple(s),
            Command::ShAssignment(a) => self.exec_sh_assignment(a),
            Command::ControlFlow(c) => self.exec_control_flow(c),
            Command::Pipeline(p) => self.exec_pipeline(p),
            Command::AndOr(a) => self.exec_and_or(a),
            Command::CommandList(list) => self.execute_list(list),
            Command::Sentence(s) => {
                if s.terminator.id == Id::OpAmp {
                    self.run_background(&s.child, &s.terminator)
                } else {
                    self.execute(&s.child)
                }
            }
            Command::Redirected(r) => self.exec_redirected(r),
            Command::BraceGroup(b) => self.execute_list(&b.children),
            Command::Subshell(s) => self.run_subshell(&s.child),
            Command::DParen(d) => {
                self.current_line = d.left.line_num();
                Ok(if self.eval_arith_to_bool(&d.child)? { 0 } else { 1 })
            }
            Command::DBracket(d) => {
                self.current_line = d.left.line_num();
                match self.eval_bool(&d.expr, BoolMode::DBracket) {
                    Ok(b) => Ok(if b { 0 } else { 1 }),
                    Err(InterpreterError::Usage(e)) => {
                        eprintln!("{}", InterpreterError::Usage(e).render());
                        Ok(2)
                    }
                    Err(e) => Err(e),
                }
            }
            Command::ForEach(f) => self.exec_for_each(f),
            Command::ForExpr(f) => self.exec_for_expr(f),
            Command::WhileUntil(w) => self.exec_while_until(w),
            Command::If(i) => self.exec_if(i),
            Command::Case(c) => self.exec_case(c),
            Command::ShFunction(f) => self.define_function(f),
            Command::TimeBlock(t) => self.exec_time_block(t),
        }
    }

    fn exec_and_or(&mut self, node: &AndOr) -> EvalResult<i32> {
        let mut status = 0;
        let last = node.children.len().saturating_sub(1);
        for (i, child) in node.children.iter().enumerate() {
            if i > 0 {
                let skip = match node.ops[i - 1].id {
                    Id::OpDAmp => status != 0,
                    _ => status == 0,
                };
                if skip {
                    continue;
                }
            }
            status = if i < last {
                self.with_errexit_suppressed(|sh| sh.execute(child))?
            } else {
                self.execute(child)?
            };
        }
        Ok(status)
    }

    fn exec_redirected(&mut self, node: &Redirected) -> EvalResult<i32> {
        if !self.apply_redirects(&node.redirects)? {
            return Ok(1);
        }
        let result = self.execute(&node.child);
        self.pop_redirects();
        result
    }

    fn define_function(&mut self, f: &ShFunction) -> EvalResult<i32> {
        if self.options.xtrace {
            debug!("defining function {}", f.name);
        }
        self.functions.insert(f.name.clone(), f.clone());
        Ok(0)
    }

    fn exec_control_flow(&mut self, node: &ControlFlowCmd) -> EvalResult<i32> {
        let arg = match &node.arg {
            Some(w) => Some(self.eval_word_to_string(w)?),
            None => None,
        };
        self.control_flow_status(&node.keyword.val, arg.as_deref(), Some(&node.keyword))
    }

    /// `break`, `continue`, `return` and `exit`, whether parsed as
    /// keywords or run as builtins. Returns a status when the command
    /// doesn't unwind.
    pub(crate) fn control_flow_status(&mut self, keyword: &str, arg: Option<&str>, tok: Option<&Token>) -> EvalResult<i32> {
        let n = match arg {
            None => None,
            Some(s) => match s.trim().parse::<i64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    let err = FatalRuntimeError::at(format!("{}: {}: numeric argument required", keyword, s), tok);
                    return match keyword {
                        "exit" => {
                            eprintln!("{}", InterpreterError::Fatal(err).render());
                            Err(ControlFlow::Exit(2).into())
                        }
                        _ => Err(err.with_status(2).into()),
                    };
                }
            },
        };
        match keyword {
            "break" | "continue" => {
                let count = n.unwrap_or(1);
                if count < 1 {
                    return Err(FatalRuntimeError::at(format!("{}: {}: loop count out of range", keyword, count), tok).into());
                }
                if self.flow.loop_depth == 0 {
                    eprintln!("oshell: {}: only meaningful in a `for', `while', or `until' loop", keyword);
                    return Ok(0);
                }
                let count = u32::try_from(count).unwrap_or(u32::MAX);
                Err(if keyword == "break" {
                    ControlFlow::Break(count)
                } else {
                    ControlFlow::Continue(count)
                }
                .into())
            }
            "return" => {
                if self.call_stack.call_depth == 0 && self.call_stack.source_depth == 0 {
                    eprintln!("oshell: return: can only `return' from a function or sourced script");
                    return Ok(1);
                }
                let status = n.map(wrap_status).unwrap_or(self.last_status);
                Err(ControlFlow::Return(status).into())
            }
            _ => {
                let status = n.map(wrap_status).unwrap_or(self.last_status);
                Err(ControlFlow::Exit(status).into())
            }
        }
    }

    /// `time pipeline`: wall clock plus user and system time of this
    /// process and its children.
    fn exec_time_block(&mut self, node: &TimeBlock) -> EvalResult<i32> {
        fn cpu_seconds() -> (f64, f64) {
            let mut user = 0.0;
            let mut sys = 0.0;
            for who in [UsageWho::RUSAGE_SELF, UsageWho::RUSAGE_CHILDREN] {
                if let Ok(usage) = getrusage(who) {
                    let u = usage.user_time();
                    let s = usage.system_time();
                    user += u.tv_sec() as f64 + u.tv_usec() as f64 / 1e6;
                    sys += s.tv_sec() as f64 + s.tv_usec() as f64 / 1e6;
                }
            }
            (user, sys)
        }

        let start = Instant::now();
        let (user0, sys0) = cpu_seconds();
        let result = self.execute(&node.pipeline);
        let real = start.elapsed().as_secs_f64();
        let (user1, sys1) = cpu_seconds();
        let _ = std::io::stdout().flush();
        eprintln!(
            "\nreal\t{}\nuser\t{}\nsys\t{}",
            format_seconds(real),
            format_seconds(user1 - user0),
            format_seconds(sys1 - sys0)
        );
        result
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
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0042), "0m0.004s");
        assert_eq!(format_seconds(61.5), "1m1.500s");
    }

    #[test]
    fn test_wrap_status() {
        assert_eq!(wrap_status(256), 0);
        assert_eq!(wrap_status(-1), 255);
        assert_eq!(wrap_status(3), 3);
    }

    #[test]
    fn test_and_or_status() {
        let mut sh = interp();
        assert_eq!(sh.eval_source("false || x=1 && y=2", "t").unwrap(), 0);
        assert_eq!(sh.get_var("x").as_deref(), Some("1"));
        assert_eq!(sh.get_var("y").as_deref(), Some("2"));
        assert_eq!(sh.eval_source("true && false", "t").unwrap(), 1);
    }

    #[test]
    fn test_errexit_skips_and_or_operands() {
        let mut sh = interp();
        sh.options.errexit = true;
        assert_eq!(sh.eval_source("false || true; x=ok", "t").unwrap(), 0);
        assert_eq!(sh.get_var("x").as_deref(), Some("ok"));
        assert_eq!(sh.eval_source("false && true; y=ok", "t").unwrap(), 0);
        assert_eq!(sh.get_var("y").as_deref(), Some("ok"));
        let err = sh.eval_source("false; z=no", "t").unwrap_err();
        assert!(matches!(err, InterpreterError::ControlFlow(ControlFlow::Exit(1))));
        assert_eq!(sh.get_var("z"), None);
    }

    #[test]
    fn test_errexit_in_conditions() {
        let mut sh = interp();
        sh.options.errexit = true;
        assert_eq!(sh.eval_source("if false; then x=1; else x=2; fi", "t").unwrap(), 0);
        assert_eq!(sh.get_var("x").as_deref(), Some("2"));
        assert_eq!(sh.eval_source("! false", "t").unwrap(), 0);
    }

    #[test]
    fn test_err_trap() {
        let mut sh = interp();
        sh.eval_source("trap 'caught=$?' ERR", "t").unwrap();
        sh.eval_source("(( 0 ))", "t").unwrap();
        assert_eq!(sh.get_var("caught").as_deref(), Some("1"));
    }

    #[test]
    fn test_dparen_and_dbracket_status() {
        let mut sh = interp();
        assert_eq!(sh.eval_source("(( 2 > 1 ))", "t").unwrap(), 0);
        assert_eq!(sh.eval_source("(( 0 ))", "t").unwrap(), 1);
        assert_eq!(sh.eval_source("[[ a == b ]]", "t").unwrap(), 1);
        assert_eq!(sh.eval_source("[[ a =~ '(' ]]", "t").unwrap(), 1);
    }

    #[test]
    fn test_function_definition() {
        let mut sh = interp();
        sh.eval_source("f() { r=$1; }; f hi", "t").unwrap();
        assert_eq!(sh.get_var("r").as_deref(), Some("hi"));
        assert!(sh.function_body("f").is_some());
    }

    #[test]
    fn test_control_flow_outside_context() {
        let mut sh = interp();
        assert_eq!(sh.eval_source("break", "t").unwrap(), 0);
        assert_eq!(sh.eval_source("return 3", "t").unwrap(), 1);
        let err = sh.eval_source("exit 300", "t").unwrap_err();
        assert!(matches!(err, InterpreterError::ControlFlow(ControlFlow::Exit(44))));
    }
}
