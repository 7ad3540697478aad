//! Arithmetic Evaluation
//!
//! Evaluates `$(( ))`, `(( ))`, `for (( ))` and array subscripts over
//! 64-bit signed integers. Overflow wraps, as in bash.
//!
//! Operands that aren't literals are strings: variable values and the
//! results of `$x` or `$(cmd)`. A string is converted by trying, in order:
//! - an integer literal: `42`, `0x1f`, `017`, `2#101`, `64#@_`
//! - a variable name, whose value is converted the same way
//! - an arithmetic expression, parsed and evaluated
//!
//! Anything else is 0, or an error under `shopt -s strict_arith`.

use log::trace;

use crate::ast::types::{ArithExpr, IncDec};
use crate::interpreter::errors::{EvalResult, FatalRuntimeError, InterpreterError, StrictModeError};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::variables::{array_index, Value};
use crate::parser::arena::Token;
use crate::parser::id_kind::Id;
use crate::parser::parse_arith_string;
use crate::parser::word_helpers::is_valid_var_name;

/// Names whose values point at other names before this is an error.
const MAX_NAME_CHAIN: usize = 100;

/// A place an arithmetic assignment can write to.
#[derive(Debug, Clone, PartialEq)]
enum LValue {
    Name(String),
    /// Indexed array element. Negative indexes count from the end.
    Elem(String, i64),
    /// Associative array entry.
    Key(String, String),
}

/// Parse an integer literal.
///
/// `Ok(None)` means the text isn't number-shaped (doesn't start with a
/// digit after the sign). A number-shaped string with bad digits is an
/// error.
pub fn parse_integer(text: &str) -> Result<Option<i64>, String> {
    let s = text.trim();
    let (neg, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    if !digits.as_bytes().first().is_some_and(u8::is_ascii_digit) {
        return Ok(None);
    }
    // `1+1` is an expression, not a malformed number.
    if !digits.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '@' | '_')) {
        return Ok(None);
    }

    let (base, body) = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (16, hex)
    } else if let Some((b, rest)) = digits.split_once('#') {
        let base: u32 = b.parse().map_err(|_| format!("{}: invalid arithmetic base", text))?;
        if !(2..=64).contains(&base) {
            return Err(format!("{}: invalid arithmetic base", text));
        }
        (base, rest)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    if body.is_empty() {
        return Err(format!("{}: invalid integer constant", text));
    }

    let mut n: i64 = 0;
    for c in body.chars() {
        let d = digit_value(c, base).ok_or_else(|| format!("{}: value too great for base", text))?;
        n = n.wrapping_mul(base as i64).wrapping_add(d as i64);
    }
    Ok(Some(if neg { n.wrapping_neg() } else { n }))
}

/// Digits are `0-9a-zA-Z@_`. Up to base 36, letters are case-insensitive.
fn digit_value(c: char, base: u32) -> Option<u32> {
    let d = match c {
        '0'..='9' => c as u32 - '0' as u32,
        'a'..='z' => c as u32 - 'a' as u32 + 10,
        'A'..='Z' if base <= 36 => c as u32 - 'A' as u32 + 10,
        'A'..='Z' => c as u32 - 'A' as u32 + 36,
        '@' => 62,
        '_' => 63,
        _ => return None,
    };
    (d < base).then_some(d)
}

fn arith_error(msg: impl Into<String>, tok: Option<&Token>) -> InterpreterError {
    FatalRuntimeError::at(msg, tok).into()
}

fn bool_int(b: bool) -> i64 {
    b as i64
}

/// The plain operator behind a compound assignment like `+=`.
fn compound_op(id: Id) -> Option<Id> {
    Some(match id {
        Id::ArithPlusEqual => Id::ArithPlus,
        Id::ArithMinusEqual => Id::ArithMinus,
        Id::ArithStarEqual => Id::ArithStar,
        Id::ArithSlashEqual => Id::ArithSlash,
        Id::ArithPercentEqual => Id::ArithPercent,
        Id::ArithDGreatEqual => Id::ArithDGreat,
        Id::ArithDLessEqual => Id::ArithDLess,
        Id::ArithAmpEqual => Id::ArithAmp,
        Id::ArithPipeEqual => Id::ArithPipe,
        Id::ArithCaretEqual => Id::ArithCaret,
        _ => return None,
    })
}

/// Operators without side effects or short-circuiting.
fn binary_op(op: &Token, id: Id, l: i64, r: i64) -> EvalResult<i64> {
    Ok(match id {
        Id::ArithPlus => l.wrapping_add(r),
        Id::ArithMinus => l.wrapping_sub(r),
        Id::ArithStar => l.wrapping_mul(r),
        Id::ArithSlash | Id::ArithPercent if r == 0 => {
            return Err(arith_error("divide by zero", Some(op)));
        }
        Id::ArithSlash => l.wrapping_div(r),
        Id::ArithPercent => l.wrapping_rem(r),
        Id::ArithDStar => {
            if r < 0 {
                return Err(arith_error("exponent less than 0", Some(op)));
            }
            l.wrapping_pow(u32::try_from(r).unwrap_or(u32::MAX))
        }
        Id::ArithDLess => l.wrapping_shl((r & 63) as u32),
        Id::ArithDGreat => l.wrapping_shr((r & 63) as u32),
        Id::ArithAmp => l & r,
        Id::ArithPipe => l | r,
        Id::ArithCaret => l ^ r,
        Id::ArithLess => bool_int(l < r),
        Id::ArithLessEqual => bool_int(l <= r),
        Id::ArithGreat => bool_int(l > r),
        Id::ArithGreatEqual => bool_int(l >= r),
        Id::ArithDEqual => bool_int(l == r),
        Id::ArithNEqual => bool_int(l != r),
        Id::ArithComma => r,
        _ => return Err(arith_error(format!("unexpected operator {:?}", op.val), Some(op))),
    })
}

impl Interpreter {
    /// Evaluate an arithmetic expression.
    pub fn eval_arith(&mut self, e: &ArithExpr) -> EvalResult<i64> {
        match e {
            ArithExpr::Var(tok) => self.arith_var(&tok.val, Some(tok)),
            ArithExpr::Word(w) => {
                if w.parts.is_empty() {
                    return Ok(0);
                }
                let s = self.eval_word_to_string(w)?;
                self.arith_from_string(&s, w.first_token())
            }
            ArithExpr::Index { .. } => {
                let lv = self.arith_lvalue(e)?;
                self.lvalue_get(&lv, None)
            }
            ArithExpr::UnaryAssign { op, child } => {
                let lv = self.arith_lvalue(child)?;
                let old = self.lvalue_get(&lv, None)?;
                let new = match op {
                    IncDec::PreIncr | IncDec::PostIncr => old.wrapping_add(1),
                    IncDec::PreDecr | IncDec::PostDecr => old.wrapping_sub(1),
                };
                self.lvalue_set(&lv, new, None)?;
                Ok(match op {
                    IncDec::PreIncr | IncDec::PreDecr => new,
                    IncDec::PostIncr | IncDec::PostDecr => old,
                })
            }
            ArithExpr::BinaryAssign { op, left, right } => {
                let lv = self.arith_lvalue(left)?;
                let r = self.eval_arith(right)?;
                let value = match compound_op(op.id) {
                    Some(id) => {
                        let l = self.lvalue_get(&lv, Some(op))?;
                        binary_op(op, id, l, r)?
                    }
                    None => r,
                };
                self.lvalue_set(&lv, value, Some(op))?;
                Ok(value)
            }
            ArithExpr::Unary { op, child } => {
                let v = self.eval_arith(child)?;
                Ok(match op.id {
                    Id::ArithMinus => v.wrapping_neg(),
                    Id::ArithPlus => v,
                    Id::ArithBang => bool_int(v == 0),
                    Id::ArithTilde => !v,
                    _ => return Err(arith_error(format!("unexpected operator {:?}", op.val), Some(op))),
                })
            }
            ArithExpr::Binary { op, left, right } => match op.id {
                Id::ArithDAmp => {
                    if self.eval_arith(left)? == 0 {
                        return Ok(0);
                    }
                    Ok(bool_int(self.eval_arith(right)? != 0))
                }
                Id::ArithDPipe => {
                    if self.eval_arith(left)? != 0 {
                        return Ok(1);
                    }
                    Ok(bool_int(self.eval_arith(right)? != 0))
                }
                id => {
                    let l = self.eval_arith(left)?;
                    let r = self.eval_arith(right)?;
                    binary_op(op, id, l, r)
                }
            },
            ArithExpr::Ternary {
                cond,
                true_expr,
                false_expr,
            } => {
                if self.eval_arith(cond)? != 0 {
                    self.eval_arith(true_expr)
                } else {
                    self.eval_arith(false_expr)
                }
            }
        }
    }

    /// `(( ))` status: true when the value is non-zero.
    pub fn eval_arith_to_bool(&mut self, e: &ArithExpr) -> EvalResult<bool> {
        Ok(self.eval_arith(e)? != 0)
    }

    /// Convert a string operand to an integer.
    pub fn arith_from_string(&mut self, s: &str, tok: Option<&Token>) -> EvalResult<i64> {
        self.arith_from_string_at(s, tok, 0)
    }

    fn arith_from_string_at(&mut self, s: &str, tok: Option<&Token>, depth: usize) -> EvalResult<i64> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        match parse_integer(trimmed) {
            Ok(Some(n)) => return Ok(n),
            Ok(None) => {}
            Err(msg) => return Err(arith_error(msg, tok)),
        }
        if is_valid_var_name(trimmed) {
            if depth >= MAX_NAME_CHAIN {
                return Err(arith_error(format!("{}: expression recursion level exceeded", trimmed), tok));
            }
            return match self.get_var(trimmed) {
                Some(v) => self.arith_from_string_at(&v, tok, depth + 1),
                None => self.unset_operand(trimmed, tok),
            };
        }

        let expr = match parse_arith_string(trimmed) {
            Ok(expr) => expr,
            Err(e) => {
                if self.shopt.strict_arith {
                    return Err(StrictModeError::at(format!("invalid integer {:?}", trimmed), tok).into());
                }
                trace!("arith operand {:?} is not an expression: {}", trimmed, e.message);
                return Ok(0);
            }
        };
        self.enter_eval(tok)?;
        let result = self.eval_arith(&expr);
        self.leave_eval();
        result
    }

    fn unset_operand(&mut self, name: &str, tok: Option<&Token>) -> EvalResult<i64> {
        if self.options.nounset {
            return Err(arith_error(format!("{}: unbound variable", name), tok));
        }
        Ok(0)
    }

    fn arith_var(&mut self, name: &str, tok: Option<&Token>) -> EvalResult<i64> {
        match self.get_var(name) {
            Some(v) => self.arith_from_string_at(&v, tok, 1),
            None => self.unset_operand(name, tok),
        }
    }

    /// Resolve the target of `x = 1`, `a[i]++` and friends.
    fn arith_lvalue(&mut self, e: &ArithExpr) -> EvalResult<LValue> {
        match e {
            ArithExpr::Var(tok) => Ok(LValue::Name(tok.val.clone())),
            ArithExpr::Index { base, index } => {
                let ArithExpr::Var(name_tok) = base.as_ref() else {
                    return Err(arith_error("only variables can be indexed", None));
                };
                let name = name_tok.val.clone();
                if matches!(self.mem.get(&name), Some(Value::AssocArray(_))) {
                    let key = match index.as_ref() {
                        ArithExpr::Var(tok) => tok.val.clone(),
                        ArithExpr::Word(w) => self.eval_word_to_string(w)?,
                        other => self.eval_arith(other)?.to_string(),
                    };
                    return Ok(LValue::Key(name, key));
                }
                let i = self.eval_arith(index)?;
                Ok(LValue::Elem(name, i))
            }
            _ => Err(arith_error("invalid assignment target", None)),
        }
    }

    fn lvalue_get(&mut self, lv: &LValue, tok: Option<&Token>) -> EvalResult<i64> {
        match lv {
            LValue::Name(name) => self.arith_var(name, tok),
            LValue::Elem(name, i) => {
                let item = match self.get_value(name) {
                    Value::BashArray(items) => {
                        let Some(idx) = array_index(&items, *i) else {
                            return Err(arith_error(format!("{}[{}]: bad array subscript", name, i), tok));
                        };
                        items.get(&idx).cloned()
                    }
                    Value::Str(s) if *i == 0 => Some(s),
                    _ => None,
                };
                match item {
                    Some(s) => self.arith_from_string_at(&s, tok, 1),
                    None => self.unset_operand(&format!("{}[{}]", name, i), tok),
                }
            }
            LValue::Key(name, key) => {
                let item = match self.mem.get(name) {
                    Some(Value::AssocArray(map)) => map.get(key).cloned(),
                    _ => None,
                };
                match item {
                    Some(s) => self.arith_from_string_at(&s, tok, 1),
                    None => self.unset_operand(&format!("{}[{}]", name, key), tok),
                }
            }
        }
    }

    fn lvalue_set(&mut self, lv: &LValue, n: i64, tok: Option<&Token>) -> EvalResult<()> {
        let s = n.to_string();
        match lv {
            LValue::Name(name) => self.set_var(name, Value::Str(s), tok),
            LValue::Elem(name, i) => self.mem.set_index(name, *i, s).map_err(|e| self.assign_error(e, tok)),
            LValue::Key(name, key) => self
                .mem
                .set_key(name, key.clone(), s)
                .map_err(|e| self.assign_error(e, tok)),
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

    fn eval(sh: &mut Interpreter, src: &str) -> EvalResult<i64> {
        let e = parse_arith_string(src).unwrap();
        sh.eval_arith(&e)
    }

    #[test]
    fn test_parse_integer_bases() {
        assert_eq!(parse_integer("42"), Ok(Some(42)));
        assert_eq!(parse_integer("0x1f"), Ok(Some(31)));
        assert_eq!(parse_integer("017"), Ok(Some(15)));
        assert_eq!(parse_integer("2#101"), Ok(Some(5)));
        assert_eq!(parse_integer("16#ff"), Ok(Some(255)));
        assert_eq!(parse_integer("16#FF"), Ok(Some(255)));
        assert_eq!(parse_integer("64#@"), Ok(Some(62)));
        assert_eq!(parse_integer("64#_"), Ok(Some(63)));
        assert_eq!(parse_integer("64#A"), Ok(Some(36)));
        assert_eq!(parse_integer(" -7 "), Ok(Some(-7)));
        assert_eq!(parse_integer("abc"), Ok(None));
        assert_eq!(parse_integer("1+1"), Ok(None));
        assert!(parse_integer("08").is_err());
        assert!(parse_integer("2#3").is_err());
        assert!(parse_integer("65#1").is_err());
    }

    #[test]
    fn test_precedence_and_ops() {
        let mut sh = interp();
        assert_eq!(eval(&mut sh, "1 + 2 * 3").unwrap(), 7);
        assert_eq!(eval(&mut sh, "(1 + 2) * 3").unwrap(), 9);
        assert_eq!(eval(&mut sh, "2 ** 10").unwrap(), 1024);
        assert_eq!(eval(&mut sh, "-7 / 2").unwrap(), -3);
        assert_eq!(eval(&mut sh, "-7 % 2").unwrap(), -1);
        assert_eq!(eval(&mut sh, "1 << 4 | 1").unwrap(), 17);
        assert_eq!(eval(&mut sh, "~0").unwrap(), -1);
        assert_eq!(eval(&mut sh, "!5").unwrap(), 0);
        assert_eq!(eval(&mut sh, "3 > 2 && 2 > 1").unwrap(), 1);
        assert_eq!(eval(&mut sh, "0 ? 10 : 20").unwrap(), 20);
        assert_eq!(eval(&mut sh, "1, 2, 3").unwrap(), 3);
    }

    #[test]
    fn test_overflow_wraps() {
        let mut sh = interp();
        assert_eq!(eval(&mut sh, "9223372036854775807 + 1").unwrap(), i64::MIN);
    }

    #[test]
    fn test_division_by_zero() {
        let mut sh = interp();
        let err = eval(&mut sh, "1 / 0").unwrap_err();
        assert!(err.to_string().contains("divide by zero"));
        assert!(eval(&mut sh, "2 ** -1").is_err());
    }

    #[test]
    fn test_assignment_and_incdec() {
        let mut sh = interp();
        assert_eq!(eval(&mut sh, "x = 5").unwrap(), 5);
        assert_eq!(eval(&mut sh, "x += 2").unwrap(), 7);
        assert_eq!(eval(&mut sh, "x++").unwrap(), 7);
        assert_eq!(eval(&mut sh, "++x").unwrap(), 9);
        assert_eq!(eval(&mut sh, "x--").unwrap(), 9);
        assert_eq!(sh.get_var("x").as_deref(), Some("8"));
        assert_eq!(eval(&mut sh, "y <<= 3").unwrap(), 0);
    }

    #[test]
    fn test_short_circuit_skips_side_effects() {
        let mut sh = interp();
        assert_eq!(eval(&mut sh, "0 && (z = 1)").unwrap(), 0);
        assert_eq!(eval(&mut sh, "1 || (z = 1)").unwrap(), 1);
        assert_eq!(sh.get_var("z"), None);
    }

    #[test]
    fn test_variable_values_are_evaluated() {
        let mut sh = interp();
        sh.set_str("a", "b").unwrap();
        sh.set_str("b", "3").unwrap();
        assert_eq!(eval(&mut sh, "a + 1").unwrap(), 4);
        sh.set_str("e", "2 * 3").unwrap();
        assert_eq!(eval(&mut sh, "e + 1").unwrap(), 7);
        sh.set_str("bad", "1 +").unwrap();
        assert_eq!(eval(&mut sh, "bad").unwrap(), 0);
        sh.shopt.strict_arith = true;
        assert!(eval(&mut sh, "bad").is_err());
    }

    #[test]
    fn test_self_reference_is_an_error() {
        let mut sh = interp();
        sh.set_str("loop", "loop").unwrap();
        assert!(eval(&mut sh, "loop").is_err());
    }

    #[test]
    fn test_arrays() {
        let mut sh = interp();
        assert_eq!(eval(&mut sh, "a[2] = 5").unwrap(), 5);
        assert_eq!(eval(&mut sh, "a[2] * 2").unwrap(), 10);
        assert_eq!(eval(&mut sh, "a[-1]").unwrap(), 5);
        assert_eq!(eval(&mut sh, "a[0]").unwrap(), 0);
        sh.mem.set_value("m", Value::AssocArray(Default::default())).unwrap();
        assert_eq!(eval(&mut sh, "m[k] = 4").unwrap(), 4);
        assert_eq!(eval(&mut sh, "m[k] + 1").unwrap(), 5);
    }

    #[test]
    fn test_nounset() {
        let mut sh = interp();
        assert_eq!(eval(&mut sh, "nope + 1").unwrap(), 1);
        sh.options.nounset = true;
        assert!(eval(&mut sh, "nope + 1").is_err());
    }
}
