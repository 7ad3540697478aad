//! Simple Command Assignment Handling
//!
//! Evaluates and applies assignments:
//! - `a=1 b=2` with no command word
//! - `FOO=bar cmd` prefix bindings, visible only to `cmd`
//! - the name arguments of `declare`, `local`, `export` and `readonly`
//!
//! Array forms: `a=(x y)`, `a+=(z)`, `a[i]=v`, `a[i]+=v`, and
//! `m=([k]=v)` for associative arrays.

use std::collections::BTreeMap;

use log::trace;

use crate::ast::types::{ArrayItem, AssignOp, AssignPair, CompoundWord, ShAssignment, WordPart};
use crate::interpreter::errors::{EvalResult, FatalRuntimeError};
use crate::interpreter::helpers::quoting::quote_for_trace;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::variables::{array_end, array_index, Value};
use crate::parser::arena::Token;
use crate::parser::{parse_arith_string, parse_dq_string};

/// An evaluated right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignValue {
    Str(String),
    /// `(a [k]=b)`: each item with its evaluated key, if it had one.
    Array(Vec<(Option<String>, String)>),
}

/// An assignment ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignArg {
    pub name: String,
    /// Raw subscript text of `a[i]=v`.
    pub index: Option<String>,
    pub plus_eq: bool,
    /// `None` for a bare name, as in `local x` or `export PATH`.
    pub value: Option<AssignValue>,
    pub loc: Option<Token>,
}

impl AssignArg {
    /// `name=value` text for xtrace.
    pub(crate) fn trace_text(&self) -> String {
        let op = if self.plus_eq { "+=" } else { "=" };
        let index = self.index.as_ref().map(|i| format!("[{}]", i)).unwrap_or_default();
        let value = match &self.value {
            None => return self.name.clone(),
            Some(AssignValue::Str(s)) => quote_for_trace(s),
            Some(AssignValue::Array(items)) => {
                let items: Vec<String> = items
                    .iter()
                    .map(|(k, v)| match k {
                        Some(k) => format!("[{}]={}", k, quote_for_trace(v)),
                        None => quote_for_trace(v),
                    })
                    .collect();
                format!("({})", items.join(" "))
            }
        };
        format!("{}{}{}{}", self.name, index, op, value)
    }
}

/// Split `a[i]` into name and subscript.
pub(crate) fn split_lhs(lhs: &str) -> (String, Option<String>) {
    match lhs.strip_suffix(']').and_then(|s| s.split_once('[')) {
        Some((name, index)) => (name.to_string(), Some(index.to_string())),
        None => (lhs.to_string(), None),
    }
}

impl Interpreter {
    pub(crate) fn eval_assign_value(&mut self, rhs: &CompoundWord) -> EvalResult<AssignValue> {
        if let [WordPart::ArrayLiteral(lit)] = rhs.parts.as_slice() {
            let mut items = Vec::new();
            for item in &lit.items {
                match item {
                    ArrayItem::Word(w) => {
                        for s in self.eval_word_sequence(std::slice::from_ref(w))? {
                            items.push((None, s));
                        }
                    }
                    ArrayItem::Pair { key, value } => {
                        let k = self.eval_word_to_string(key)?;
                        let v = self.eval_word_to_string(value)?;
                        items.push((Some(k), v));
                    }
                }
            }
            return Ok(AssignValue::Array(items));
        }
        Ok(AssignValue::Str(self.eval_word_to_string(rhs)?))
    }

    pub(crate) fn eval_assign_pair(&mut self, pair: &AssignPair) -> EvalResult<AssignArg> {
        let value = match &pair.rhs {
            Some(rhs) => self.eval_assign_value(rhs)?,
            None => AssignValue::Str(String::new()),
        };
        Ok(AssignArg {
            name: pair.name.clone(),
            index: pair.index.clone(),
            plus_eq: pair.op == AssignOp::PlusEqual,
            value: Some(value),
            loc: Some(pair.left.clone()),
        })
    }

    /// An associative array key: the subscript text evaluated like a
    /// double-quoted string.
    fn eval_subscript_key(&mut self, index: &str) -> EvalResult<String> {
        let w = parse_dq_string(index, "subscript")?;
        self.eval_word_to_string(&w)
    }

    fn eval_subscript_index(&mut self, index: &str) -> EvalResult<i64> {
        let e = parse_arith_string(index)?;
        self.eval_arith(&e)
    }

    /// Apply an evaluated assignment in the current scope.
    pub(crate) fn apply_assign(&mut self, arg: &AssignArg) -> EvalResult<()> {
        let tok = arg.loc.as_ref();
        if let Some(index) = &arg.index {
            let s = match &arg.value {
                Some(AssignValue::Str(s)) => s.clone(),
                None => String::new(),
                Some(AssignValue::Array(_)) => {
                    return Err(FatalRuntimeError::at(
                        format!("{}[{}]: cannot assign list to array member", arg.name, index),
                        tok,
                    )
                    .into());
                }
            };
            return self.assign_element(&arg.name, index, s, arg.plus_eq, tok);
        }
        match &arg.value {
            Some(AssignValue::Array(items)) => self.assign_array(&arg.name, items, arg.plus_eq, tok),
            Some(AssignValue::Str(s)) => {
                if arg.plus_eq {
                    match self.mem.get(&arg.name) {
                        Some(Value::BashArray(_)) | Some(Value::AssocArray(_)) => {
                            return self.assign_element(&arg.name, "0", s.clone(), true, tok);
                        }
                        _ => {
                            let old = self.get_var(&arg.name).unwrap_or_default();
                            return self.set_var(&arg.name, Value::Str(old + s), tok);
                        }
                    }
                }
                self.set_var(&arg.name, Value::Str(s.clone()), tok)
            }
            None => Ok(()),
        }
    }

    fn assign_element(&mut self, name: &str, index: &str, value: String, append: bool, tok: Option<&Token>) -> EvalResult<()> {
        if let Some(Value::AssocArray(map)) = self.mem.get(name) {
            let map = map.clone();
            let key = self.eval_subscript_key(index)?;
            let value = match (append, map.get(&key)) {
                (true, Some(old)) => format!("{}{}", old, value),
                _ => value,
            };
            return self.mem.set_key(name, key, value).map_err(|e| self.assign_error(e, tok));
        }
        let i = self.eval_subscript_index(index)?;
        let value = if append {
            let old = match self.get_value(name) {
                Value::BashArray(items) => array_index(&items, i).and_then(|idx| items.get(&idx).cloned()),
                Value::Str(s) if i == 0 => Some(s),
                _ => None,
            };
            old.unwrap_or_default() + &value
        } else {
            value
        };
        self.mem.set_index(name, i, value).map_err(|e| self.assign_error(e, tok))
    }

    fn assign_array(&mut self, name: &str, items: &[(Option<String>, String)], append: bool, tok: Option<&Token>) -> EvalResult<()> {
        let existing = self.mem.get(name).cloned();
        if let Some(Value::AssocArray(mut map)) = existing {
            if !append {
                map.clear();
            }
            for (key, value) in items {
                let Some(key) = key else {
                    return Err(FatalRuntimeError::at(
                        format!("{}: {}: must use subscript when assigning associative array", name, value),
                        tok,
                    )
                    .into());
                };
                map.insert(key.clone(), value.clone());
            }
            return self.set_var(name, Value::AssocArray(map), tok);
        }

        let mut arr: BTreeMap<usize, String> = match (append, existing) {
            (true, Some(Value::BashArray(a))) => a,
            (true, Some(Value::Str(s))) => BTreeMap::from([(0, s)]),
            _ => BTreeMap::new(),
        };
        let mut next = array_end(&arr) as usize;
        for (key, value) in items {
            if let Some(key) = key {
                let n = self.arith_from_string(key, tok)?;
                next = array_index(&arr, n).ok_or_else(|| {
                    FatalRuntimeError::at(format!("{}[{}]: bad array subscript", name, key), tok)
                })?;
            }
            arr.insert(next, value.clone());
            next += 1;
        }
        self.set_var(name, Value::BashArray(arr), tok)
    }

    /// `a=1 b=2`: assignments with no command word. The status is that of
    /// the last command substitution, or 0.
    pub(crate) fn exec_sh_assignment(&mut self, node: &ShAssignment) -> EvalResult<i32> {
        if let Some(first) = node.pairs.first() {
            self.current_line = first.left.line_num();
        }
        self.last_cmdsub_status = None;
        if !node.redirects.is_empty() && !self.apply_redirects(&node.redirects)? {
            return Ok(1);
        }
        let result = self.run_sh_assignment(node);
        if !node.redirects.is_empty() {
            self.pop_redirects();
        }
        result
    }

    fn run_sh_assignment(&mut self, node: &ShAssignment) -> EvalResult<i32> {
        for pair in &node.pairs {
            let arg = self.eval_assign_pair(pair)?;
            if self.options.xtrace {
                self.xtrace_line(&[arg.trace_text()])?;
            }
            trace!("assign {}", arg.name);
            self.apply_assign(&arg)?;
        }
        Ok(self.last_cmdsub_status.take().unwrap_or(0))
    }

    /// Evaluate `FOO=bar` prefixes of a simple command.
    pub(crate) fn eval_more_env(&mut self, pairs: &[AssignPair]) -> EvalResult<Vec<(String, String)>> {
        let mut out = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let value = match &pair.rhs {
                Some(rhs) => self.eval_word_to_string(rhs)?,
                None => String::new(),
            };
            let value = match (pair.op, self.get_var(&pair.name)) {
                (AssignOp::PlusEqual, Some(old)) => old + &value,
                _ => value,
            };
            out.push((pair.name.clone(), value));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpreter::InterpreterOptions;

    fn run(src: &str) -> Interpreter {
        let mut sh = Interpreter::new(InterpreterOptions {
            import_env: false,
            ..InterpreterOptions::default()
        });
        sh.eval_source(src, "t").unwrap();
        sh
    }

    #[test]
    fn test_split_lhs() {
        assert_eq!(split_lhs("a[1]"), ("a".to_string(), Some("1".to_string())));
        assert_eq!(split_lhs("x"), ("x".to_string(), None));
    }

    #[test]
    fn test_scalar_and_append() {
        let mut sh = run("x=a; x+=b; y=");
        assert_eq!(sh.get_var("x").as_deref(), Some("ab"));
        assert_eq!(sh.get_var("y").as_deref(), Some(""));
    }

    #[test]
    fn test_indexed_arrays() {
        let mut sh = run("a=(x 'y z'); a+=(w); a[5]=v; a[1]+=!");
        assert_eq!(
            sh.get_value("a"),
            Value::BashArray(BTreeMap::from([
                (0, "x".into()),
                (1, "y z!".into()),
                (2, "w".into()),
                (5, "v".into()),
            ]))
        );
    }

    #[test]
    fn test_array_literal_with_keys() {
        let mut sh = run("a=([2]=c x [0]=a)");
        assert_eq!(
            sh.get_value("a"),
            Value::BashArray(BTreeMap::from([(0, "a".into()), (2, "c".into()), (3, "x".into())]))
        );
    }

    #[test]
    fn test_huge_index_stays_sparse() {
        let mut sh = run("a[4000000000]=x; a+=(y); n=${#a[@]}; k=\"${!a[*]}\"; last=${a[-1]}");
        assert_eq!(sh.get_var("n").as_deref(), Some("2"));
        assert_eq!(sh.get_var("k").as_deref(), Some("4000000000 4000000001"));
        assert_eq!(sh.get_var("last").as_deref(), Some("y"));
    }

    #[test]
    fn test_array_literal_splits_and_globs_words() {
        let mut sh = run("v='1 2'; a=($v \"$v\")");
        assert_eq!(sh.get_value("a").elements(), vec!["1", "2", "1 2"]);
    }

    #[test]
    fn test_assoc_arrays() {
        let mut sh = run("declare -A m; m=([a]=1 [b]=2); k=b; m[$k]+=0; m[c d]=3");
        let Value::AssocArray(map) = sh.get_value("m") else {
            panic!("not assoc")
        };
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
        assert_eq!(map.get("b").map(String::as_str), Some("20"));
        assert_eq!(map.get("c d").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_assignment_status_is_last_cmdsub() {
        let mut sh = Interpreter::new(InterpreterOptions {
            import_env: false,
            ..InterpreterOptions::default()
        });
        assert_eq!(sh.eval_source("x=$(exit 3)", "t").unwrap(), 3);
        assert_eq!(sh.eval_source("x=1", "t").unwrap(), 0);
    }

    #[test]
    fn test_readonly_assignment_fails() {
        let mut sh = run("readonly r=1");
        assert!(sh.eval_source("r=2", "t").is_err());
        assert_eq!(sh.get_var("r").as_deref(), Some("1"));
    }
}
