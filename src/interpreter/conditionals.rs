//! Conditional Expression Evaluation
//!
//! One evaluator serves both `[[ ]]` and the `test` / `[` builtins; the
//! mode decides where they differ:
//! - `==` and `!=` match a glob pattern in `[[ ]]` and compare strings in `test`
//! - `-eq` and friends evaluate arithmetic in `[[ ]]` and require plain
//!   integers in `test`
//!
//! `=~` is `[[ ]]`-only. It fills `BASH_REMATCH` on success and clears it
//! on failure.

use log::trace;
use regex_lite::Regex;

use crate::ast::types::{BoolExpr, CompoundWord};
use crate::interpreter::errors::{EvalResult, UsageError};
use crate::interpreter::expansion::pattern::ShellPattern;
use crate::interpreter::helpers::file_tests::{binary_file_test, unary_file_test};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::variables::{array_index, Value};
use crate::parser::id_kind::Id;
use crate::parser::parse_arith_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolMode {
    DBracket,
    Test,
}

/// `test` integers: optional surrounding whitespace and sign, decimal only.
fn parse_test_int(s: &str) -> Option<i64> {
    let t = s.trim();
    let digits = t.strip_prefix('-').or_else(|| t.strip_prefix('+')).unwrap_or(t);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    t.parse().ok()
}

impl Interpreter {
    pub fn eval_bool(&mut self, expr: &BoolExpr, mode: BoolMode) -> EvalResult<bool> {
        match expr {
            BoolExpr::WordTest(w) => Ok(!self.eval_word_to_string(w)?.is_empty()),
            BoolExpr::LogicalNot(child) => Ok(!self.eval_bool(child, mode)?),
            BoolExpr::LogicalAnd(l, r) => Ok(self.eval_bool(l, mode)? && self.eval_bool(r, mode)?),
            BoolExpr::LogicalOr(l, r) => Ok(self.eval_bool(l, mode)? || self.eval_bool(r, mode)?),
            BoolExpr::Unary { op, child } => {
                let s = self.eval_word_to_string(child)?;
                self.unary_test(*op, &s)
            }
            BoolExpr::Binary { op, left, right } => self.binary_test(*op, left, right, mode),
        }
    }

    fn unary_test(&mut self, op: Id, s: &str) -> EvalResult<bool> {
        Ok(match op {
            Id::BoolUnaryZ => s.is_empty(),
            Id::BoolUnaryN => !s.is_empty(),
            Id::BoolUnaryO => self.options.get(s).unwrap_or(false),
            Id::BoolUnaryV => self.var_is_set(s)?,
            Id::BoolUnaryR => matches!(self.mem.get_cell(s), Some(c) if c.readonly),
            _ => match unary_file_test(op, s) {
                Some(b) => b,
                None => return Err(UsageError::new(format!("{:?}: unexpected unary operator", op)).into()),
            },
        })
    }

    /// `-v name` and `-v 'a[i]'`.
    fn var_is_set(&mut self, s: &str) -> EvalResult<bool> {
        let Some((name, sub)) = s.strip_suffix(']').and_then(|t| t.split_once('[')) else {
            return Ok(!matches!(self.get_value(s), Value::Undef));
        };
        Ok(match self.get_value(name) {
            Value::AssocArray(map) => map.contains_key(sub),
            Value::BashArray(items) => {
                let i = self.eval_arith(&parse_arith_string(sub)?)?;
                array_index(&items, i).is_some_and(|idx| items.contains_key(&idx))
            }
            Value::Str(_) => self.eval_arith(&parse_arith_string(sub)?)? == 0,
            Value::Undef => false,
        })
    }

    fn int_operand(&mut self, w: &CompoundWord, mode: BoolMode) -> EvalResult<i64> {
        let s = self.eval_word_to_string(w)?;
        match mode {
            BoolMode::DBracket => self.arith_from_string(&s, w.first_token()),
            BoolMode::Test => {
                parse_test_int(&s).ok_or_else(|| UsageError::new(format!("{}: integer expression expected", s)).into())
            }
        }
    }

    fn binary_test(&mut self, op: Id, left: &CompoundWord, right: &CompoundWord, mode: BoolMode) -> EvalResult<bool> {
        match op {
            Id::BoolBinaryEq | Id::BoolBinaryNe | Id::BoolBinaryLt | Id::BoolBinaryLe | Id::BoolBinaryGt
            | Id::BoolBinaryGe => {
                let l = self.int_operand(left, mode)?;
                let r = self.int_operand(right, mode)?;
                return Ok(match op {
                    Id::BoolBinaryEq => l == r,
                    Id::BoolBinaryNe => l != r,
                    Id::BoolBinaryLt => l < r,
                    Id::BoolBinaryLe => l <= r,
                    Id::BoolBinaryGt => l > r,
                    _ => l >= r,
                });
            }
            Id::BoolBinaryEqualTilde => return self.regex_test(left, right),
            _ => {}
        }

        let l = self.eval_word_to_string(left)?;
        match op {
            Id::BoolBinaryGlobEqual | Id::BoolBinaryGlobDEqual | Id::BoolBinaryGlobNEqual => {
                let matched = match mode {
                    BoolMode::DBracket => {
                        let pat = self.eval_word_to_pattern(right)?;
                        trace!("[[ {:?} == {:?} ]]", l, pat);
                        ShellPattern::new(&pat, self.pattern_options()).is_some_and(|p| p.matches(&l))
                    }
                    BoolMode::Test => l == self.eval_word_to_string(right)?,
                };
                Ok(matched != (op == Id::BoolBinaryGlobNEqual))
            }
            Id::OpLess => Ok(l < self.eval_word_to_string(right)?),
            Id::OpGreat => Ok(l > self.eval_word_to_string(right)?),
            Id::BoolBinaryNt | Id::BoolBinaryOt | Id::BoolBinaryEf => {
                let r = self.eval_word_to_string(right)?;
                Ok(binary_file_test(op, &l, &r))
            }
            _ => Err(UsageError::new(format!("{:?}: unexpected binary operator", op)).into()),
        }
    }

    fn regex_test(&mut self, left: &CompoundWord, right: &CompoundWord) -> EvalResult<bool> {
        let s = self.eval_word_to_string(left)?;
        let pat = self.eval_word_to_regex(right)?;
        let pat = if self.shopt.nocasematch {
            format!("(?i){}", pat)
        } else {
            pat
        };
        let re = Regex::new(&pat).map_err(|e| UsageError::new(format!("invalid regex {:?}: {}", pat, e)))?;
        let captures: Vec<String> = match re.captures(&s) {
            Some(caps) => caps
                .iter()
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
            None => Vec::new(),
        };
        let matched = !captures.is_empty();
        self.set_var("BASH_REMATCH", Value::array(captures), None)?;
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::Command;
    use crate::interpreter::interpreter::InterpreterOptions;
    use crate::parser::conditional_parser::parse_test_args;
    use crate::parser::{parse_program, ParseOptions};

    fn interp() -> Interpreter {
        Interpreter::new(InterpreterOptions {
            import_env: false,
            ..InterpreterOptions::default()
        })
    }

    fn dbracket(sh: &mut Interpreter, src: &str) -> EvalResult<bool> {
        let node = parse_program(src, "test", ParseOptions::default()).unwrap();
        let Command::DBracket(d) = node else {
            panic!("not [[: {:?}", node)
        };
        sh.eval_bool(&d.expr, BoolMode::DBracket)
    }

    fn test_cmd(sh: &mut Interpreter, args: &[&str]) -> EvalResult<bool> {
        let argv: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        match parse_test_args(&argv).unwrap() {
            Some(e) => sh.eval_bool(&e, BoolMode::Test),
            None => Ok(false),
        }
    }

    #[test]
    fn test_glob_vs_string_equality() {
        let mut sh = interp();
        sh.set_str("f", "notes.txt").unwrap();
        assert!(dbracket(&mut sh, "[[ $f == *.txt ]]").unwrap());
        assert!(!dbracket(&mut sh, "[[ $f == \"*.txt\" ]]").unwrap());
        assert!(dbracket(&mut sh, "[[ $f != *.md ]]").unwrap());
        assert!(!test_cmd(&mut sh, &["notes.txt", "=", "*.txt"]).unwrap());
        assert!(test_cmd(&mut sh, &["a", "=", "a"]).unwrap());
    }

    #[test]
    fn test_nocasematch() {
        let mut sh = interp();
        sh.shopt.nocasematch = true;
        assert!(dbracket(&mut sh, "[[ ABC == a* ]]").unwrap());
    }

    #[test]
    fn test_integer_comparisons() {
        let mut sh = interp();
        assert!(dbracket(&mut sh, "[[ 1+1 -eq 2 ]]").unwrap());
        assert!(test_cmd(&mut sh, &["3", "-gt", "2"]).unwrap());
        assert!(test_cmd(&mut sh, &[" -3 ", "-lt", "2"]).unwrap());
        let err = test_cmd(&mut sh, &["x", "-eq", "1"]).unwrap_err();
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn test_regex_sets_rematch() {
        let mut sh = interp();
        assert!(dbracket(&mut sh, "[[ abc123 =~ ([a-z]+)([0-9]+) ]]").unwrap());
        assert_eq!(
            sh.get_value("BASH_REMATCH").elements(),
            vec!["abc123".to_string(), "abc".to_string(), "123".to_string()]
        );
        assert!(!dbracket(&mut sh, "[[ abc =~ ^[0-9]+$ ]]").unwrap());
        assert!(sh.get_value("BASH_REMATCH").elements().is_empty());
    }

    #[test]
    fn test_quoted_regex_is_literal() {
        let mut sh = interp();
        assert!(!dbracket(&mut sh, "[[ abc =~ \"a.c\" ]]").unwrap());
        assert!(dbracket(&mut sh, "[[ a.c =~ \"a.c\" ]]").unwrap());
    }

    #[test]
    fn test_var_is_set() {
        let mut sh = interp();
        sh.set_str("x", "").unwrap();
        assert!(dbracket(&mut sh, "[[ -v x ]]").unwrap());
        assert!(!dbracket(&mut sh, "[[ -v nope ]]").unwrap());
        sh.mem.set_index("a", 1, "v".to_string()).unwrap();
        assert!(test_cmd(&mut sh, &["-v", "a[1]"]).unwrap());
        assert!(!test_cmd(&mut sh, &["-v", "a[0]"]).unwrap());
    }

    #[test]
    fn test_string_and_logic() {
        let mut sh = interp();
        assert!(dbracket(&mut sh, "[[ -z '' && -n x ]]").unwrap());
        assert!(dbracket(&mut sh, "[[ ! -z x || nope ]]").unwrap());
        assert!(dbracket(&mut sh, "[[ a < b ]]").unwrap());
        assert!(!test_cmd(&mut sh, &[]).unwrap());
        assert!(test_cmd(&mut sh, &["-n", "x", "-a", "-z", ""]).unwrap());
        assert!(test_cmd(&mut sh, &["-d", "/"]).unwrap());
    }

    #[test]
    fn test_option_test() {
        let mut sh = interp();
        assert!(!dbracket(&mut sh, "[[ -o errexit ]]").unwrap());
        sh.options.errexit = true;
        assert!(dbracket(&mut sh, "[[ -o errexit ]]").unwrap());
    }
}
