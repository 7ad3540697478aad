//! Control Flow Execution
//!
//! Loops, `if` and `case`. `break N` and `continue N` arrive here as
//! `ControlFlow` errors; each loop consumes one level and passes the rest
//! outward.

use crate::ast::types::{Case, CaseArm, CaseTerminator, Command, ForEach, ForExpr, If, WhileUntil};
use crate::interpreter::errors::{ControlFlow, EvalResult, InterpreterError};
use crate::interpreter::expansion::pattern::ShellPattern;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::variables::Value;
use crate::parser::id_kind::Id;

/// What a loop does after one run of its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopStep {
    Next,
    Break,
}

impl Interpreter {
    /// Run `f` as a loop, so `break` and `continue` are accepted inside.
    fn in_loop(&mut self, f: impl FnOnce(&mut Interpreter) -> EvalResult<i32>) -> EvalResult<i32> {
        self.flow.loop_depth += 1;
        let result = f(self);
        self.flow.loop_depth -= 1;
        result
    }

    fn loop_body(&mut self, body: &Command, status: &mut i32) -> EvalResult<LoopStep> {
        match self.execute(body) {
            Ok(s) => {
                *status = s;
                Ok(LoopStep::Next)
            }
            Err(InterpreterError::ControlFlow(ControlFlow::Break(n))) => {
                *status = 0;
                if n > 1 {
                    return Err(ControlFlow::Break(n - 1).into());
                }
                Ok(LoopStep::Break)
            }
            Err(InterpreterError::ControlFlow(ControlFlow::Continue(n))) => {
                *status = 0;
                if n > 1 {
                    return Err(ControlFlow::Continue(n - 1).into());
                }
                Ok(LoopStep::Next)
            }
            Err(e) => Err(e),
        }
    }

    /// Status of a condition list, with errexit off.
    fn condition_status(&mut self, cond: &[Command]) -> EvalResult<i32> {
        self.with_errexit_suppressed(|sh| sh.execute_list(cond))
    }

    pub(crate) fn exec_for_each(&mut self, node: &ForEach) -> EvalResult<i32> {
        self.current_line = node.keyword.line_num();
        let items = match &node.iterable {
            Some(words) => self.eval_word_sequence(words)?,
            None => self.mem.argv().to_vec(),
        };
        self.in_loop(|sh| {
            let mut status = 0;
            for item in items {
                sh.set_var(&node.var_name, Value::Str(item), Some(&node.keyword))?;
                if sh.loop_body(&node.body, &mut status)? == LoopStep::Break {
                    break;
                }
            }
            Ok(status)
        })
    }

    pub(crate) fn exec_for_expr(&mut self, node: &ForExpr) -> EvalResult<i32> {
        self.current_line = node.keyword.line_num();
        if let Some(init) = &node.init {
            self.eval_arith(init)?;
        }
        self.in_loop(|sh| {
            let mut status = 0;
            loop {
                if let Some(cond) = &node.cond {
                    if !sh.eval_arith_to_bool(cond)? {
                        break;
                    }
                }
                if sh.loop_body(&node.body, &mut status)? == LoopStep::Break {
                    break;
                }
                if let Some(update) = &node.update {
                    sh.eval_arith(update)?;
                }
            }
            Ok(status)
        })
    }

    pub(crate) fn exec_while_until(&mut self, node: &WhileUntil) -> EvalResult<i32> {
        let is_until = node.keyword.id == Id::KWUntil;
        self.in_loop(|sh| {
            let mut status = 0;
            loop {
                let cond = sh.condition_status(&node.cond)?;
                if (cond == 0) == is_until {
                    break;
                }
                if sh.loop_body(&node.body, &mut status)? == LoopStep::Break {
                    break;
                }
            }
            Ok(status)
        })
    }

    pub(crate) fn exec_if(&mut self, node: &If) -> EvalResult<i32> {
        for arm in &node.arms {
            if self.condition_status(&arm.cond)? == 0 {
                return self.execute_list(&arm.action);
            }
        }
        match &node.else_action {
            Some(action) => self.execute_list(action),
            None => Ok(0),
        }
    }

    fn case_arm_matches(&mut self, arm: &CaseArm, subject: &str) -> EvalResult<bool> {
        for w in &arm.patterns {
            let pat = self.eval_word_to_pattern(w)?;
            if ShellPattern::new(&pat, self.pattern_options()).is_some_and(|p| p.matches(subject)) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub(crate) fn exec_case(&mut self, node: &Case) -> EvalResult<i32> {
        self.current_line = node.keyword.line_num();
        let subject = self.eval_word_to_string(&node.to_match)?;
        let mut status = 0;
        let mut fall_through = false;
        for arm in &node.arms {
            if !fall_through && !self.case_arm_matches(arm, &subject)? {
                continue;
            }
            status = self.execute_list(&arm.action)?;
            match arm.terminator {
                CaseTerminator::Break => return Ok(status),
                CaseTerminator::FallThrough => fall_through = true,
                CaseTerminator::TestNext => fall_through = false,
            }
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::interpreter::{Interpreter, InterpreterOptions};

    fn run(src: &str) -> Interpreter {
        let mut sh = Interpreter::new(InterpreterOptions {
            import_env: false,
            ..InterpreterOptions::default()
        });
        sh.eval_source(src, "t").unwrap();
        sh
    }

    fn var(sh: &mut Interpreter, name: &str) -> String {
        sh.get_var(name).unwrap_or_default()
    }

    #[test]
    fn test_for_each() {
        let mut sh = run("out=; for i in a 'b c' d; do out=$out[$i]; done");
        assert_eq!(var(&mut sh, "out"), "[a][b c][d]");
        assert_eq!(var(&mut sh, "i"), "d");
    }

    #[test]
    fn test_for_over_positionals() {
        let mut sh = run("set -- x y; out=; for a; do out=$out$a; done");
        assert_eq!(var(&mut sh, "out"), "xy");
    }

    #[test]
    fn test_break_and_continue() {
        let mut sh = run("out=; for i in 1 2 3 4 5; do if [[ $i == 2 ]]; then continue; fi; if [[ $i == 4 ]]; then break; fi; out=$out$i; done");
        assert_eq!(var(&mut sh, "out"), "13");
    }

    #[test]
    fn test_nested_break_levels() {
        let mut sh = run("out=; for i in 1 2; do for j in a b; do out=$out$i$j; break 2; done; done");
        assert_eq!(var(&mut sh, "out"), "1a");
        let mut sh = run("out=; for i in 1 2; do for j in a b; do out=$out$i$j; continue 2; done; done");
        assert_eq!(var(&mut sh, "out"), "1a2a");
    }

    #[test]
    fn test_c_style_for() {
        let mut sh = run("s=0; for (( i = 1; i <= 4; i++ )); do (( s += i )); done");
        assert_eq!(var(&mut sh, "s"), "10");
    }

    #[test]
    fn test_while_and_until() {
        let mut sh = run("n=0; while (( n < 3 )); do (( n++ )); done");
        assert_eq!(var(&mut sh, "n"), "3");
        let mut sh = run("n=5; until (( n == 0 )); do (( n-- )); done");
        assert_eq!(var(&mut sh, "n"), "0");
    }

    #[test]
    fn test_if_elif_else() {
        let mut sh = run("x=2; if (( x == 1 )); then r=one; elif (( x == 2 )); then r=two; else r=other; fi");
        assert_eq!(var(&mut sh, "r"), "two");
        let mut sh = run("if false; then r=yes; fi; s=$?");
        assert_eq!(var(&mut sh, "s"), "0");
    }

    #[test]
    fn test_case_patterns_and_terminators() {
        let mut sh = run("case foo.txt in *.md) r=md;; *.txt|*.text) r=txt;; *) r=other;; esac");
        assert_eq!(var(&mut sh, "r"), "txt");
        let mut sh = run("r=; case a in a) r=${r}1;& b) r=${r}2;; c) r=${r}3;; esac");
        assert_eq!(var(&mut sh, "r"), "12");
        let mut sh = run("r=; case ab in a*) r=${r}1;;& *b) r=${r}2;;& c) r=${r}3;; esac");
        assert_eq!(var(&mut sh, "r"), "12");
    }

    #[test]
    fn test_case_quoted_pattern_is_literal() {
        let mut sh = run("r=no; case 'a*' in \"a*\") r=yes;; esac; s=no; case ab in \"a*\") s=yes;; esac");
        assert_eq!(var(&mut sh, "r"), "yes");
        assert_eq!(var(&mut sh, "s"), "no");
    }
}
