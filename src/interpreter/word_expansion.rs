//! Word Expansion
//!
//! Main entry point for shell word expansion.
//!
//! Every word part is first evaluated to a `PartValue` that remembers
//! whether it was quoted. The part values are then assembled for the
//! context the word is used in:
//! - argv words: IFS splitting, then pathname expansion
//! - assignments and redirect targets: one string, no splitting
//! - `case` and `[[ == ]]` patterns: quoted text is escaped
//! - `[[ =~ ]]` regexes: quoted text is regex-escaped
//!
//! Brace expansion happens on the syntax tree before any of this.

use log::trace;
use nix::unistd::{getuid, User};

use crate::ast::types::{ArithExpr, BracedVarSub, BracketOp, CompoundWord, PatSub, SuffixOp, WordPart};
use crate::interpreter::errors::{EvalResult, FatalRuntimeError, InterpreterError};
use crate::interpreter::expansion::parameter_ops::{
    apply_case_op, assignment_form, attribute_flags, slice_items, slice_string, vtest_use_arg, CaseOp,
};
use crate::interpreter::expansion::pattern::{
    glob_escape, replace_pattern, strip_prefix, strip_suffix, PatternOptions, ShellPattern,
};
use crate::interpreter::expansion::prompt::expand_prompt;
use crate::interpreter::expansion::word_glob_expansion::{expand_field, GlobOptions, GlobOutcome};
use crate::interpreter::expansion::word_split::{Field, FieldBuilder};
use crate::interpreter::helpers::ifs::{join_separator, Ifs};
use crate::interpreter::helpers::quoting::{decode_backslash_escapes, quote_for_reuse};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::variables::{array_index, Value};
use crate::parser::arena::Token;
use crate::parser::braces::brace_expand_words;
use crate::parser::word_helpers::is_valid_var_name;
use crate::parser::id_kind::{Id, Kind};
use crate::parser::{parse_arith_string, parse_dq_string};

/// One evaluated word part.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PartValue {
    /// Unquoted source text. Never split; glob characters stay active.
    Literal(String),
    /// A substitution result or quoted text.
    Str { s: String, quoted: bool },
    /// `$@`, `${a[@]}` and friends.
    Array { items: Vec<String>, quoted: bool },
    /// `@(a|b)`, with each arm evaluated.
    ExtGlob { op: String, arms: Vec<Vec<PartValue>> },
}

/// A parameter's value before operators are applied.
#[derive(Debug, Clone, PartialEq)]
enum ParamValue {
    Undef,
    Str(String),
    /// `star` marks `$*` and `${a[*]}`, which join when quoted.
    Items { items: Vec<String>, star: bool },
}

impl ParamValue {
    fn from_value(v: Value) -> Self {
        match v {
            Value::Undef => ParamValue::Undef,
            Value::Str(s) => ParamValue::Str(s),
            other => match other.as_scalar() {
                Some(s) => ParamValue::Str(s),
                None => ParamValue::Undef,
            },
        }
    }

    fn is_unset(&self) -> bool {
        match self {
            ParamValue::Undef => true,
            ParamValue::Str(_) => false,
            ParamValue::Items { items, .. } => items.is_empty(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            ParamValue::Undef => true,
            ParamValue::Str(s) => s.is_empty(),
            ParamValue::Items { items, .. } => items.iter().all(String::is_empty),
        }
    }

    /// Apply a string operation to the value or to every item.
    fn map(self, mut f: impl FnMut(&str) -> String) -> Self {
        match self {
            ParamValue::Undef => ParamValue::Undef,
            ParamValue::Str(s) => ParamValue::Str(f(&s)),
            ParamValue::Items { items, star } => ParamValue::Items {
                items: items.iter().map(|s| f(s)).collect(),
                star,
            },
        }
    }
}

/// Plain text of evaluated parts, with arrays joined by spaces.
fn flatten(values: &[PartValue]) -> String {
    let mut out = String::new();
    for v in values {
        match v {
            PartValue::Literal(s) | PartValue::Str { s, .. } => out.push_str(s),
            PartValue::Array { items, .. } => out.push_str(&items.join(" ")),
            PartValue::ExtGlob { op, arms } => {
                out.push_str(op);
                let arms: Vec<String> = arms.iter().map(|a| flatten(a)).collect();
                out.push_str(&arms.join("|"));
                out.push(')');
            }
        }
    }
    out
}

/// Pattern text where quoted characters match literally.
fn to_pattern(values: &[PartValue]) -> String {
    let mut out = String::new();
    for v in values {
        match v {
            PartValue::Literal(s) | PartValue::Str { s, quoted: false } => out.push_str(s),
            PartValue::Str { s, quoted: true } => out.push_str(&glob_escape(s)),
            PartValue::Array { items, quoted: false } => out.push_str(&items.join(" ")),
            PartValue::Array { items, quoted: true } => out.push_str(&glob_escape(&items.join(" "))),
            PartValue::ExtGlob { op, arms } => {
                out.push_str(op);
                let arms: Vec<String> = arms.iter().map(|a| to_pattern(a)).collect();
                out.push_str(&arms.join("|"));
                out.push(')');
            }
        }
    }
    out
}

/// ERE text where quoted characters match literally.
fn to_regex(values: &[PartValue]) -> String {
    let mut out = String::new();
    for v in values {
        match v {
            PartValue::Literal(s) | PartValue::Str { s, quoted: false } => out.push_str(s),
            PartValue::Str { s, quoted: true } => out.push_str(&regex_lite::escape(s)),
            PartValue::Array { items, quoted: false } => out.push_str(&items.join(" ")),
            PartValue::Array { items, quoted: true } => out.push_str(&regex_lite::escape(&items.join(" "))),
            PartValue::ExtGlob { .. } => out.push_str(&flatten(std::slice::from_ref(v))),
        }
    }
    out
}

fn push_field_value(b: &mut FieldBuilder<'_>, v: &PartValue) {
    match v {
        PartValue::Literal(s) => b.push_literal(s),
        PartValue::Str { s, quoted: true } => b.push_quoted(s),
        PartValue::Str { s, quoted: false } => b.push_split(s),
        PartValue::Array { items, quoted: true } => b.push_quoted_items(items),
        PartValue::Array { items, quoted: false } => b.push_split_items(items),
        // Filename globbing doesn't support extended globs; the text is kept.
        PartValue::ExtGlob { .. } => b.push_quoted(&flatten(std::slice::from_ref(v))),
    }
}

fn bad_sub(msg: impl Into<String>, tok: &Token) -> InterpreterError {
    FatalRuntimeError::at(msg, Some(tok)).into()
}

/// `a[i]` or `a[@]` in an indirect reference.
fn split_subscript(s: &str) -> Option<(&str, &str)> {
    let open = s.find('[')?;
    let inner = s[open + 1..].strip_suffix(']')?;
    Some((&s[..open], inner))
}

impl Interpreter {
    // ---- public entry points ----

    /// Evaluate argv words: brace expansion, substitution, splitting and
    /// pathname expansion.
    pub fn eval_word_sequence(&mut self, words: &[CompoundWord]) -> EvalResult<Vec<String>> {
        Ok(self.eval_argv(words)?.0)
    }

    /// Like `eval_word_sequence`, also giving for each field the first
    /// token of the word it came from.
    pub fn eval_argv(&mut self, words: &[CompoundWord]) -> EvalResult<(Vec<String>, Vec<Option<Token>>)> {
        let words = brace_expand_words(words)?;
        let mut out = Vec::new();
        let mut locs = Vec::new();
        for w in &words {
            let mut values = Vec::new();
            self.eval_parts(&w.parts, false, &mut values)?;
            let fields = self.assemble_fields(&values);
            self.glob_fields(fields, &mut out)?;
            locs.resize(out.len(), w.first_token().cloned());
        }
        Ok((out, locs))
    }

    /// Evaluate a word to a single string, without splitting or globbing.
    pub fn eval_word_to_string(&mut self, w: &CompoundWord) -> EvalResult<String> {
        let mut values = Vec::new();
        self.eval_parts(&w.parts, false, &mut values)?;
        Ok(flatten(&values))
    }

    /// Evaluate an unquoted here-doc body, as if it were double-quoted.
    pub(crate) fn eval_here_doc_body(&mut self, parts: &[WordPart]) -> EvalResult<String> {
        let mut values = Vec::new();
        self.eval_parts(parts, true, &mut values)?;
        Ok(flatten(&values))
    }

    /// Evaluate a word to a shell pattern.
    pub fn eval_word_to_pattern(&mut self, w: &CompoundWord) -> EvalResult<String> {
        let mut values = Vec::new();
        self.eval_parts(&w.parts, false, &mut values)?;
        Ok(to_pattern(&values))
    }

    /// Evaluate the right side of `=~`.
    pub fn eval_word_to_regex(&mut self, w: &CompoundWord) -> EvalResult<String> {
        let mut values = Vec::new();
        self.eval_parts(&w.parts, false, &mut values)?;
        Ok(to_regex(&values))
    }

    /// Options for `case`, `[[ == ]]` and `${x#pat}` matching.
    pub(crate) fn pattern_options(&self) -> PatternOptions {
        PatternOptions {
            extglob: true,
            nocase: self.shopt.nocasematch,
        }
    }

    /// Expand a prompt string: `$` substitutions and backslash escapes.
    pub fn eval_prompt_string(&mut self, src: &str) -> EvalResult<String> {
        let word = parse_dq_string(src, "prompt")?;
        let ctx = self.prompt_context();
        let mut out = String::new();
        let mut raw = String::new();
        for part in &word.parts {
            match part {
                WordPart::Literal(tok) | WordPart::EscapedLiteral { token: tok, .. } => raw.push_str(&tok.val),
                _ => {
                    out.push_str(&expand_prompt(&ctx, &raw));
                    raw.clear();
                    let mut values = Vec::new();
                    self.eval_part(part, true, &mut values)?;
                    out.push_str(&flatten(&values));
                }
            }
        }
        out.push_str(&expand_prompt(&ctx, &raw));
        Ok(out)
    }

    // ---- assembly ----

    fn current_ifs(&self) -> Ifs {
        Ifs::new(self.mem.get_str("IFS").as_deref())
    }

    fn assemble_fields(&self, values: &[PartValue]) -> Vec<Field> {
        let ifs = self.current_ifs();
        let mut b = FieldBuilder::new(&ifs);
        for v in values {
            push_field_value(&mut b, v);
        }
        b.finish()
    }

    fn glob_fields(&self, fields: Vec<Field>, out: &mut Vec<String>) -> EvalResult<()> {
        if self.options.noglob {
            out.extend(fields.into_iter().map(|f| f.text));
            return Ok(());
        }
        let opts = GlobOptions {
            nullglob: self.shopt.nullglob,
            failglob: self.shopt.failglob,
            dotglob: self.shopt.dotglob,
            nocaseglob: self.shopt.nocaseglob,
        };
        for f in fields {
            match expand_field(&f, opts) {
                GlobOutcome::Literal(s) => out.push(s),
                GlobOutcome::Matches(m) => out.extend(m),
                GlobOutcome::Dropped => {}
                GlobOutcome::Failed(pat) => {
                    return Err(FatalRuntimeError::new(format!("no match: {}", pat)).into());
                }
            }
        }
        Ok(())
    }

    // ---- parts ----

    pub(crate) fn eval_parts(&mut self, parts: &[WordPart], quoted: bool, out: &mut Vec<PartValue>) -> EvalResult<()> {
        for part in parts {
            self.eval_part(part, quoted, out)?;
        }
        Ok(())
    }

    fn eval_part(&mut self, part: &WordPart, quoted: bool, out: &mut Vec<PartValue>) -> EvalResult<()> {
        match part {
            WordPart::Literal(tok) => {
                if quoted {
                    out.push(PartValue::Str {
                        s: tok.val.clone(),
                        quoted: true,
                    });
                } else {
                    out.push(PartValue::Literal(tok.val.clone()));
                }
            }
            WordPart::EscapedLiteral { ch, .. } => out.push(PartValue::Str {
                s: ch.clone(),
                quoted: true,
            }),
            WordPart::SingleQuoted(sq) => out.push(PartValue::Str {
                s: sq.value.clone(),
                quoted: true,
            }),
            WordPart::DoubleQuoted(dq) => {
                let mut inner = Vec::new();
                self.eval_parts(&dq.parts, true, &mut inner)?;
                // "" is an empty argument, but "$@" with no args is none.
                if !inner.iter().any(|v| matches!(v, PartValue::Array { .. })) {
                    out.push(PartValue::Str {
                        s: String::new(),
                        quoted: true,
                    });
                }
                out.extend(inner);
            }
            WordPart::SimpleVarSub(tok) => {
                let name = tok.val.strip_prefix('$').unwrap_or(&tok.val);
                let value = self.lookup_param(name);
                if matches!(value, ParamValue::Undef) {
                    self.check_nounset(name, tok)?;
                }
                self.push_param(value, quoted, out);
            }
            WordPart::BracedVarSub(bvs) => self.eval_braced(bvs, quoted, out)?,
            WordPart::TildeSub { user, .. } => out.push(PartValue::Str {
                s: self.expand_tilde(user.as_deref()),
                quoted: true,
            }),
            WordPart::CommandSub(cs) => {
                let s = match cs.left.id {
                    Id::LeftProcSubIn | Id::LeftProcSubOut => {
                        let path = self.process_sub(&cs.child, cs.left.id == Id::LeftProcSubIn)?;
                        out.push(PartValue::Str { s: path, quoted: true });
                        return Ok(());
                    }
                    _ => self.command_sub(&cs.child, &cs.left)?,
                };
                out.push(PartValue::Str { s, quoted });
            }
            WordPart::ArithSub(a) => {
                let n = self.eval_arith(&a.expr)?;
                out.push(PartValue::Str {
                    s: n.to_string(),
                    quoted,
                });
            }
            WordPart::ArrayLiteral(a) => {
                return Err(bad_sub("array literal can't be used here", &a.left));
            }
            WordPart::Splice { name, .. } => {
                let items = self.get_value(name).elements();
                out.push(PartValue::Array { items, quoted: true });
            }
            WordPart::ExtGlob(eg) => {
                let mut arms = Vec::with_capacity(eg.arms.len());
                for arm in &eg.arms {
                    let mut values = Vec::new();
                    self.eval_parts(&arm.parts, quoted, &mut values)?;
                    arms.push(values);
                }
                out.push(PartValue::ExtGlob {
                    op: eg.op.val.clone(),
                    arms,
                });
            }
            // Braces only expand in argv words; elsewhere they are text.
            WordPart::BracedTuple(words) => {
                out.push(PartValue::Literal("{".to_string()));
                for (i, w) in words.iter().enumerate() {
                    if i > 0 {
                        out.push(PartValue::Literal(",".to_string()));
                    }
                    self.eval_parts(&w.parts, quoted, out)?;
                }
                out.push(PartValue::Literal("}".to_string()));
            }
            WordPart::BracedRange(r) => {
                let step = if r.step == 1 || r.step == -1 {
                    String::new()
                } else {
                    format!("..{}", r.step)
                };
                out.push(PartValue::Literal(format!("{{{}..{}{}}}", r.start, r.end, step)));
            }
        }
        Ok(())
    }

    fn push_param(&self, value: ParamValue, quoted: bool, out: &mut Vec<PartValue>) {
        match value {
            ParamValue::Undef => out.push(PartValue::Str {
                s: String::new(),
                quoted,
            }),
            ParamValue::Str(s) => out.push(PartValue::Str { s, quoted }),
            ParamValue::Items { items, star: true } if quoted => {
                let sep = join_separator(self.mem.get_str("IFS").as_deref());
                out.push(PartValue::Str {
                    s: items.join(&sep),
                    quoted: true,
                });
            }
            ParamValue::Items { items, .. } => out.push(PartValue::Array { items, quoted }),
        }
    }

    fn check_nounset(&self, name: &str, tok: &Token) -> EvalResult<()> {
        if self.options.nounset && name != "@" && name != "*" {
            return Err(bad_sub(format!("{}: unbound variable", name), tok));
        }
        Ok(())
    }

    fn expand_tilde(&self, user: Option<&str>) -> String {
        match user {
            None => self.mem.get_str("HOME").unwrap_or_else(|| {
                User::from_uid(getuid())
                    .ok()
                    .flatten()
                    .map(|u| u.dir.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "~".to_string())
            }),
            Some(name) => match User::from_name(name) {
                Ok(Some(u)) => u.dir.to_string_lossy().into_owned(),
                _ => format!("~{}", name),
            },
        }
    }

    // ---- parameters ----

    fn lookup_param(&mut self, name: &str) -> ParamValue {
        match name {
            "@" | "*" => ParamValue::Items {
                items: self.mem.argv().to_vec(),
                star: name == "*",
            },
            _ => ParamValue::from_value(self.get_value(name)),
        }
    }

    /// The key of `a[expr]`: a string for associative arrays, an
    /// arithmetic result otherwise.
    fn subscript_value(&mut self, name: &str, index: &ArithExpr) -> EvalResult<ParamValue> {
        let value = self.get_value(name);
        match value {
            Value::AssocArray(map) => {
                let key = match index {
                    ArithExpr::Var(tok) => tok.val.clone(),
                    ArithExpr::Word(w) => self.eval_word_to_string(w)?,
                    other => self.eval_arith(other)?.to_string(),
                };
                Ok(map.get(&key).cloned().map_or(ParamValue::Undef, ParamValue::Str))
            }
            Value::BashArray(items) => {
                let n = self.eval_arith(index)?;
                Ok(array_index(&items, n)
                    .and_then(|idx| items.get(&idx).cloned())
                    .map_or(ParamValue::Undef, ParamValue::Str))
            }
            Value::Str(s) => {
                let n = self.eval_arith(index)?;
                Ok(if n == 0 || n == -1 {
                    ParamValue::Str(s)
                } else {
                    ParamValue::Undef
                })
            }
            Value::Undef => {
                self.eval_arith(index)?;
                Ok(ParamValue::Undef)
            }
        }
    }

    /// `${!ref}`: look up the variable named by `ref`'s value.
    fn indirect_value(&mut self, bvs: &BracedVarSub) -> EvalResult<ParamValue> {
        let Some(target) = self.lookup_param(&bvs.var_name).as_target() else {
            return Err(bad_sub(format!("{}: invalid indirect expansion", bvs.var_name), &bvs.token));
        };
        if let Some((name, sub)) = split_subscript(&target) {
            return match sub {
                "@" | "*" => Ok(ParamValue::Items {
                    items: self.get_value(name).elements(),
                    star: sub == "*",
                }),
                _ => {
                    let expr = parse_arith_string(sub)?;
                    self.subscript_value(name, &expr)
                }
            };
        }
        Ok(self.lookup_param(&target))
    }

    fn eval_braced(&mut self, bvs: &BracedVarSub, quoted: bool, out: &mut Vec<PartValue>) -> EvalResult<()> {
        let prefix = bvs.prefix_op.as_ref().map(|t| t.id);
        let is_indirect = prefix == Some(Id::VSubBang);
        let is_length = prefix == Some(Id::VSubPound);
        let name = bvs.var_name.as_str();

        if is_indirect {
            // ${!prefix*} and ${!prefix@}
            if let Some(SuffixOp::Nullary(tok)) = &bvs.suffix_op {
                if tok.kind() == Kind::VOp3 {
                    let value = ParamValue::Items {
                        items: self.mem.names_with_prefix(name),
                        star: tok.id == Id::VOp3Star,
                    };
                    self.push_param(value, quoted, out);
                    return Ok(());
                }
            }
            // ${!a[@]}
            if let Some(BracketOp::WholeArray(id)) = &bvs.bracket_op {
                let value = ParamValue::Items {
                    items: self.get_value(name).keys(),
                    star: *id == Id::ArithStar,
                };
                self.push_param(value, quoted, out);
                return Ok(());
            }
        }

        let mut value = if is_indirect {
            self.indirect_value(bvs)?
        } else {
            match &bvs.bracket_op {
                Some(BracketOp::WholeArray(id)) => ParamValue::Items {
                    items: self.get_value(name).elements(),
                    star: *id == Id::ArithStar,
                },
                Some(BracketOp::ArrayIndex(index)) => self.subscript_value(name, index)?,
                None => self.lookup_param(name),
            }
        };

        if is_length {
            if matches!(value, ParamValue::Undef) {
                self.check_nounset(name, &bvs.token)?;
            }
            let n = match &value {
                ParamValue::Undef => 0,
                ParamValue::Str(s) => s.chars().count(),
                ParamValue::Items { items, .. } => items.len(),
            };
            out.push(PartValue::Str {
                s: n.to_string(),
                quoted,
            });
            return Ok(());
        }

        match &bvs.suffix_op {
            None => {
                if matches!(value, ParamValue::Undef) {
                    self.check_nounset(name, &bvs.token)?;
                }
            }
            Some(SuffixOp::Nullary(tok)) => {
                value = self.apply_nullary(bvs, tok, value)?;
            }
            Some(SuffixOp::Unary { op, arg }) if op.kind() == Kind::VTest => {
                if vtest_use_arg(op.id, value.is_unset(), value.is_empty()) {
                    return self.apply_vtest(bvs, op, arg, quoted, out);
                }
                if matches!(op.id, Id::VTestColonPlus | Id::VTestPlus) {
                    value = ParamValue::Undef;
                }
            }
            Some(SuffixOp::Unary { op, arg }) => {
                if matches!(value, ParamValue::Undef) {
                    self.check_nounset(name, &bvs.token)?;
                }
                value = self.apply_unary(op, arg, value)?;
            }
            Some(SuffixOp::PatSub(ps)) => {
                if matches!(value, ParamValue::Undef) {
                    self.check_nounset(name, &bvs.token)?;
                }
                value = self.apply_pat_sub(ps, value)?;
            }
            Some(SuffixOp::Slice { begin, length }) => {
                if matches!(value, ParamValue::Undef) {
                    self.check_nounset(name, &bvs.token)?;
                }
                value = self.apply_slice(bvs, begin.as_ref(), length.as_ref(), value)?;
            }
        }
        self.push_param(value, quoted, out);
        Ok(())
    }

    /// `:-`, `=`, `:?`, `:+` and friends, when the argument takes effect.
    fn apply_vtest(
        &mut self,
        bvs: &BracedVarSub,
        op: &Token,
        arg: &CompoundWord,
        quoted: bool,
        out: &mut Vec<PartValue>,
    ) -> EvalResult<()> {
        match op.id {
            Id::VTestColonEquals | Id::VTestEquals => {
                let s = self.eval_word_to_string(arg)?;
                if bvs.bracket_op.is_some() || !is_valid_var_name(&bvs.var_name) {
                    return Err(bad_sub(format!("${}: cannot assign in this way", bvs.var_name), &bvs.token));
                }
                self.set_var(&bvs.var_name, Value::Str(s.clone()), Some(&bvs.token))?;
                out.push(PartValue::Str { s, quoted });
            }
            Id::VTestColonQMark | Id::VTestQMark => {
                let msg = self.eval_word_to_string(arg)?;
                let msg = if msg.is_empty() {
                    "parameter null or not set".to_string()
                } else {
                    msg
                };
                return Err(bad_sub(format!("{}: {}", bvs.var_name, msg), &bvs.token));
            }
            // :- - :+ +
            _ => {
                let start = out.len();
                self.eval_parts(&arg.parts, quoted, out)?;
                // Unquoted text in the argument is part of the substitution
                // result, so it is split like one.
                if !quoted {
                    for v in &mut out[start..] {
                        if let PartValue::Literal(s) = v {
                            *v = PartValue::Str {
                                s: std::mem::take(s),
                                quoted: false,
                            };
                        }
                    }
                }
                if out.len() == start {
                    out.push(PartValue::Str {
                        s: String::new(),
                        quoted,
                    });
                }
            }
        }
        Ok(())
    }

    fn apply_nullary(&mut self, bvs: &BracedVarSub, tok: &Token, value: ParamValue) -> EvalResult<ParamValue> {
        Ok(match tok.id {
            Id::VOp0Q => match value {
                ParamValue::Undef => ParamValue::Undef,
                v => v.map(quote_for_reuse),
            },
            Id::VOp0E => value.map(|s| decode_backslash_escapes(s, false).0),
            Id::VOp0P => match value {
                ParamValue::Str(s) => ParamValue::Str(self.eval_prompt_string(&s)?),
                ParamValue::Items { items, star } => {
                    let mut expanded = Vec::with_capacity(items.len());
                    for item in &items {
                        expanded.push(self.eval_prompt_string(item)?);
                    }
                    ParamValue::Items { items: expanded, star }
                }
                ParamValue::Undef => ParamValue::Undef,
            },
            Id::VOp0A => ParamValue::Str(assignment_form(&bvs.var_name, self.mem.get_cell(&bvs.var_name))),
            Id::VOp0a => ParamValue::Str(attribute_flags(self.mem.get_cell(&bvs.var_name))),
            _ => return Err(bad_sub(format!("bad substitution: @{}", tok.val), tok)),
        })
    }

    fn compile_pattern(&mut self, w: &CompoundWord) -> EvalResult<Option<ShellPattern>> {
        let pat = self.eval_word_to_pattern(w)?;
        trace!("pattern {:?}", pat);
        Ok(ShellPattern::new(&pat, self.pattern_options()))
    }

    /// `# ## % %%` and the case operators.
    fn apply_unary(&mut self, op: &Token, arg: &CompoundWord, value: ParamValue) -> EvalResult<ParamValue> {
        if let Some(case_op) = CaseOp::from_id(op.id) {
            let pat = if arg.parts.is_empty() {
                None
            } else {
                self.compile_pattern(arg)?
            };
            return Ok(value.map(|s| apply_case_op(s, case_op, pat.as_ref())));
        }
        let Some(pat) = self.compile_pattern(arg)? else {
            return Ok(value);
        };
        Ok(match op.id {
            Id::VOp1Pound => value.map(|s| strip_prefix(s, &pat, false)),
            Id::VOp1DPound => value.map(|s| strip_prefix(s, &pat, true)),
            Id::VOp1Percent => value.map(|s| strip_suffix(s, &pat, false)),
            Id::VOp1DPercent => value.map(|s| strip_suffix(s, &pat, true)),
            _ => return Err(bad_sub(format!("bad substitution operator {:?}", op.val), op)),
        })
    }

    fn apply_pat_sub(&mut self, ps: &PatSub, value: ParamValue) -> EvalResult<ParamValue> {
        if ps.pat.parts.is_empty() {
            return Ok(value);
        }
        let Some(pat) = self.compile_pattern(&ps.pat)? else {
            return Ok(value);
        };
        let rep = match &ps.replace {
            Some(w) => self.eval_word_to_string(w)?,
            None => String::new(),
        };
        Ok(value.map(|s| replace_pattern(s, &pat, &rep, ps.mode)))
    }

    fn apply_slice(
        &mut self,
        bvs: &BracedVarSub,
        begin: Option<&ArithExpr>,
        length: Option<&ArithExpr>,
        value: ParamValue,
    ) -> EvalResult<ParamValue> {
        let offset = match begin {
            Some(e) => self.eval_arith(e)?,
            None => 0,
        };
        let len = match length {
            Some(e) => Some(self.eval_arith(e)?),
            None => None,
        };
        let result = match value {
            ParamValue::Undef => Ok(ParamValue::Undef),
            ParamValue::Str(s) => slice_string(&s, offset, len).map(ParamValue::Str),
            ParamValue::Items { mut items, star } => {
                // ${@:0} starts with $0.
                if bvs.bracket_op.is_none() && matches!(bvs.var_name.as_str(), "@" | "*") {
                    items.insert(0, self.mem.dollar0.clone());
                }
                slice_items(&items, offset, len).map(|items| ParamValue::Items { items, star })
            }
        };
        result.map_err(|msg| bad_sub(msg, &bvs.token))
    }
}

impl ParamValue {
    /// The name an indirect reference points at.
    fn as_target(&self) -> Option<String> {
        match self {
            ParamValue::Str(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpreter::InterpreterOptions;
    use crate::parser::{parse_program, ParseOptions};
    use crate::ast::types::Command;

    fn interp() -> Interpreter {
        Interpreter::new(InterpreterOptions {
            argv: vec!["a b".to_string(), "c".to_string()],
            import_env: false,
            ..InterpreterOptions::default()
        })
    }

    /// The argv words of `echo ...`.
    fn words_of(src: &str) -> Vec<CompoundWord> {
        let node = parse_program(&format!("echo {}", src), "test", ParseOptions::default()).unwrap();
        match node {
            Command::Simple(s) => s.words[1..].to_vec(),
            other => panic!("not a simple command: {:?}", other),
        }
    }

    fn expand(sh: &mut Interpreter, src: &str) -> Vec<String> {
        sh.eval_word_sequence(&words_of(src)).unwrap()
    }

    #[test]
    fn test_default_operand_is_split() {
        let mut sh = interp();
        assert_eq!(expand(&mut sh, "${u:-a b}"), vec!["a", "b"]);
        assert_eq!(expand(&mut sh, "${u-x  y}z"), vec!["x", "yz"]);
        assert_eq!(expand(&mut sh, "\"${u:-a b}\""), vec!["a b"]);
        assert_eq!(expand(&mut sh, "${u:-'a b'}"), vec!["a b"]);
        sh.set_str("s", "set").unwrap();
        assert_eq!(expand(&mut sh, "${s:+p q}"), vec!["p", "q"]);
    }

    #[test]
    fn test_splitting_and_quotes() {
        let mut sh = interp();
        sh.set_str("x", "1  2").unwrap();
        assert_eq!(expand(&mut sh, "$x"), vec!["1", "2"]);
        assert_eq!(expand(&mut sh, "\"$x\""), vec!["1  2"]);
        assert_eq!(expand(&mut sh, "''"), vec![""]);
        assert!(expand(&mut sh, "$unset").is_empty());
    }

    #[test]
    fn test_at_and_star() {
        let mut sh = interp();
        assert_eq!(expand(&mut sh, "\"$@\""), vec!["a b", "c"]);
        assert_eq!(expand(&mut sh, "$@"), vec!["a", "b", "c"]);
        assert_eq!(expand(&mut sh, "\"$*\""), vec!["a b c"]);
        assert_eq!(expand(&mut sh, "\"x$@y\""), vec!["xa b", "cy"]);
        sh.mem.set_argv(Vec::new());
        assert!(expand(&mut sh, "\"$@\"").is_empty());
    }

    #[test]
    fn test_defaults_and_assign() {
        let mut sh = interp();
        assert_eq!(expand(&mut sh, "${u:-d e}"), vec!["d", "e"]);
        assert_eq!(expand(&mut sh, "\"${u:-d e}\""), vec!["d e"]);
        assert_eq!(expand(&mut sh, "${u:=v}"), vec!["v"]);
        assert_eq!(sh.get_var("u").as_deref(), Some("v"));
        assert_eq!(expand(&mut sh, "${u:+set}"), vec!["set"]);
        assert!(expand(&mut sh, "${nope:+set}").is_empty());
        assert!(sh.eval_word_sequence(&words_of("${nope:?oops}")).is_err());
    }

    #[test]
    fn test_string_ops() {
        let mut sh = interp();
        sh.set_str("f", "dir/file.tar.gz").unwrap();
        assert_eq!(expand(&mut sh, "${f#*/}"), vec!["file.tar.gz"]);
        assert_eq!(expand(&mut sh, "${f%%.*}"), vec!["dir/file"]);
        assert_eq!(expand(&mut sh, "${f%.*}"), vec!["dir/file.tar"]);
        assert_eq!(expand(&mut sh, "${f/tar/zip}"), vec!["dir/file.zip.gz"]);
        assert_eq!(expand(&mut sh, "${#f}"), vec!["15"]);
        assert_eq!(expand(&mut sh, "${f:4:4}"), vec!["file"]);
        assert_eq!(expand(&mut sh, "${f^^}"), vec!["DIR/FILE.TAR.GZ"]);
    }

    #[test]
    fn test_quoted_pattern_is_literal() {
        let mut sh = interp();
        sh.set_str("s", "a*b").unwrap();
        assert_eq!(expand(&mut sh, "${s#\"a*\"}"), vec!["b"]);
        sh.set_str("t", "abcb").unwrap();
        assert_eq!(expand(&mut sh, "${t#\"a*\"}"), vec!["abcb"]);
    }

    #[test]
    fn test_arrays() {
        let mut sh = interp();
        sh.mem.append_items("a", vec!["x".into(), "y z".into()]).unwrap();
        assert_eq!(expand(&mut sh, "\"${a[@]}\""), vec!["x", "y z"]);
        assert_eq!(expand(&mut sh, "${#a[@]}"), vec!["2"]);
        assert_eq!(expand(&mut sh, "${a[1]}"), vec!["y", "z"]);
        assert_eq!(expand(&mut sh, "${!a[@]}"), vec!["0", "1"]);
        assert_eq!(expand(&mut sh, "${a}"), vec!["x"]);
    }

    #[test]
    fn test_indirection_and_prefix_names() {
        let mut sh = interp();
        sh.set_str("ref", "target").unwrap();
        sh.set_str("target", "hit").unwrap();
        assert_eq!(expand(&mut sh, "${!ref}"), vec!["hit"]);
        sh.set_str("my_a", "1").unwrap();
        sh.set_str("my_b", "2").unwrap();
        assert_eq!(expand(&mut sh, "${!my_*}"), vec!["my_a", "my_b"]);
    }

    #[test]
    fn test_nounset() {
        let mut sh = interp();
        sh.options.nounset = true;
        assert!(sh.eval_word_sequence(&words_of("$nope")).is_err());
        assert_eq!(expand(&mut sh, "${nope:-ok}"), vec!["ok"]);
        assert_eq!(expand(&mut sh, "\"$@\""), vec!["a b", "c"]);
    }

    #[test]
    fn test_transforms() {
        let mut sh = interp();
        sh.set_str("q", "it's").unwrap();
        assert_eq!(expand(&mut sh, "${q@Q}"), vec!["$'it\\'s'"]);
        sh.set_str("e", "a\\tb").unwrap();
        assert_eq!(expand(&mut sh, "\"${e@E}\""), vec!["a\tb"]);
    }

    #[test]
    fn test_ifs_custom() {
        let mut sh = interp();
        sh.set_str("IFS", ":").unwrap();
        sh.set_str("p", "a::b").unwrap();
        assert_eq!(expand(&mut sh, "$p"), vec!["a", "", "b"]);
        assert_eq!(expand(&mut sh, "\"$*\""), vec!["a b:c"]);
    }

    #[test]
    fn test_brace_and_tilde() {
        let mut sh = interp();
        sh.set_str("HOME", "/home/me").unwrap();
        assert_eq!(expand(&mut sh, "x{1..3}"), vec!["x1", "x2", "x3"]);
        assert_eq!(expand(&mut sh, "~/d"), vec!["/home/me/d"]);
    }

    #[test]
    fn test_to_string_and_pattern() {
        let mut sh = interp();
        sh.set_str("x", "a b").unwrap();
        let w = &words_of("\"$x\"*")[0];
        assert_eq!(sh.eval_word_to_string(w).unwrap(), "a b*");
        assert_eq!(sh.eval_word_to_pattern(w).unwrap(), "a b*");
        let w = &words_of("'*'$x")[0];
        assert_eq!(sh.eval_word_to_pattern(w).unwrap(), "\\*a b");
    }

    #[test]
    fn test_arith_sub() {
        let mut sh = interp();
        assert_eq!(expand(&mut sh, "$((1+2*3))"), vec!["7"]);
    }

    #[test]
    fn test_prompt_string() {
        let mut sh = interp();
        sh.set_str("v", "val").unwrap();
        assert_eq!(sh.eval_prompt_string("+$v \\$ ").unwrap(), if nix::unistd::geteuid().is_root() { "+val # " } else { "+val $ " });
    }
}
