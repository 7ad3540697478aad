//! Parameter Operation Helpers
//!
//! The string-level pieces of `${...}` operators that don't need the
//! evaluator: default/alternative tests, case conversion, slicing and the
//! `@A` / `@a` transforms. The evaluator in `word_expansion` decides which
//! to apply and to which values.

use crate::interpreter::expansion::pattern::ShellPattern;
use crate::interpreter::helpers::quoting::{quote_declare_value, quote_for_reuse};
use crate::interpreter::variables::{Cell, Value};
use crate::parser::id_kind::Id;

/// `${x:-y}` and friends: does the operator's argument take effect?
///
/// The colon forms treat an empty value like an unset one.
pub fn vtest_use_arg(op: Id, is_unset: bool, is_empty: bool) -> bool {
    let missing = match op {
        Id::VTestColonHyphen | Id::VTestColonEquals | Id::VTestColonQMark | Id::VTestColonPlus => {
            is_unset || is_empty
        }
        _ => is_unset,
    };
    match op {
        Id::VTestColonPlus | Id::VTestPlus => !missing,
        _ => missing,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseOp {
    UpperFirst,
    UpperAll,
    LowerFirst,
    LowerAll,
}

impl CaseOp {
    pub fn from_id(id: Id) -> Option<Self> {
        Some(match id {
            Id::VOp1Caret => CaseOp::UpperFirst,
            Id::VOp1DCaret => CaseOp::UpperAll,
            Id::VOp1Comma => CaseOp::LowerFirst,
            Id::VOp1DComma => CaseOp::LowerAll,
            _ => return None,
        })
    }

    fn convert(self, c: char) -> String {
        match self {
            CaseOp::UpperFirst | CaseOp::UpperAll => c.to_uppercase().to_string(),
            CaseOp::LowerFirst | CaseOp::LowerAll => c.to_lowercase().to_string(),
        }
    }
}

/// `${x^}`, `${x^^}`, `${x,}`, `${x,,}`. With a pattern, only characters
/// matching it are converted.
pub fn apply_case_op(value: &str, op: CaseOp, pat: Option<&ShellPattern>) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        let in_range = i == 0 || matches!(op, CaseOp::UpperAll | CaseOp::LowerAll);
        let selected = pat.map(|p| p.matches(&c.to_string())).unwrap_or(true);
        if in_range && selected {
            out.push_str(&op.convert(c));
        } else {
            out.push(c);
        }
    }
    out
}

/// `${x:offset:length}` on a string, counted in characters.
///
/// A negative offset counts from the end. A negative length leaves that
/// many characters off the end, and is an error when that ends before
/// the start.
pub fn slice_string(value: &str, offset: i64, length: Option<i64>) -> Result<String, String> {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len() as i64;
    let start = if offset < 0 { (len + offset).max(0) } else { offset };
    if start >= len {
        return Ok(String::new());
    }
    let end = match length {
        Some(l) if l < 0 => {
            let end = len + l;
            if end < start {
                return Err(format!("{}: substring expression < 0", l));
            }
            end
        }
        Some(l) => start.saturating_add(l).min(len),
        None => len,
    };
    Ok(chars[start as usize..end as usize].iter().collect())
}

/// `${a[@]:offset:length}`, counted in elements.
pub fn slice_items(items: &[String], offset: i64, length: Option<i64>) -> Result<Vec<String>, String> {
    let len = items.len() as i64;
    let start = if offset < 0 { len + offset } else { offset };
    if start < 0 || start >= len {
        return Ok(Vec::new());
    }
    let end = match length {
        Some(l) if l < 0 => return Err(format!("{}: substring expression < 0", l)),
        Some(l) => start.saturating_add(l).min(len),
        None => len,
    };
    Ok(items[start as usize..end as usize].to_vec())
}

/// `${x@a}`: attribute letters in `declare` order.
pub fn attribute_flags(cell: Option<&Cell>) -> String {
    let Some(cell) = cell else {
        return String::new();
    };
    let mut flags = String::new();
    match cell.value {
        Value::BashArray(_) => flags.push('a'),
        Value::AssocArray(_) => flags.push('A'),
        _ => {}
    }
    if cell.readonly {
        flags.push('r');
    }
    if cell.exported {
        flags.push('x');
    }
    flags
}

/// `([0]="a" [2]="c")`
fn array_body(value: &Value) -> String {
    let items: Vec<String> = match value {
        Value::BashArray(items) => items
            .iter()
            .map(|(i, v)| format!("[{}]={}", i, quote_declare_value(v)))
            .collect(),
        Value::AssocArray(map) => map
            .iter()
            .map(|(k, v)| format!("[{}]={}", quote_for_reuse(k), quote_declare_value(v)))
            .collect(),
        _ => Vec::new(),
    };
    format!("({})", items.join(" "))
}

/// What `declare -p name` prints, e.g. `declare -ax a=([0]="1")`.
pub fn declare_line(name: &str, cell: &Cell) -> String {
    let flags = attribute_flags(Some(cell));
    let flags = if flags.is_empty() { "-".to_string() } else { flags };
    match &cell.value {
        Value::Undef => format!("declare -{} {}", flags, name),
        Value::Str(s) => format!("declare -{} {}={}", flags, name, quote_declare_value(s)),
        v => format!("declare -{} {}={}", flags, name, array_body(v)),
    }
}

/// `${x@A}`: an assignment that recreates the variable.
pub fn assignment_form(name: &str, cell: Option<&Cell>) -> String {
    let Some(cell) = cell else {
        return String::new();
    };
    let flags = attribute_flags(Some(cell));
    match &cell.value {
        Value::Undef => String::new(),
        Value::Str(s) if flags.is_empty() => format!("{}={}", name, quote_for_reuse(s)),
        Value::Str(s) => format!("declare -{} {}={}", flags, name, quote_for_reuse(s)),
        v => format!("declare -{} {}={}", flags, name, array_body(v)),
    }
}
