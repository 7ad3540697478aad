//! declare/typeset - Declare variables and give them attributes
//!
//! Usage:
//!   declare              - List all variables
//!   declare -p [NAME]    - Print variables as declare commands
//!   declare NAME=value   - Declare variable with value
//!   declare -a NAME      - Declare indexed array
//!   declare -A NAME      - Declare associative array
//!   declare -r NAME      - Declare readonly variable
//!   declare -x NAME      - Export variable (+x to unexport)
//!   declare -g NAME      - Declare global variable (inside functions)
//!   declare -f / -F      - List function names
//!
//! Inside a function, declare without -g creates locals, like `local`.
//! The attribute logic here is shared with `local`, `export` and
//! `readonly`.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::interpreter::builtin_dispatch::{is_valid_name, CmdValue};
use crate::interpreter::builtins::{out, parse_flags, Flags};
use crate::interpreter::errors::{EvalResult, InterpreterError};
use crate::interpreter::expansion::parameter_ops::declare_line;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::simple_command_assignments::{AssignArg, AssignValue};
use crate::interpreter::variables::{Cell, Value};

/// What a declaration does besides assigning.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Attrs {
    /// Bind in the innermost function frame.
    pub local: bool,
    pub array: bool,
    pub assoc: bool,
    pub export: Option<bool>,
    pub readonly: bool,
}

impl Attrs {
    pub(crate) fn from_flags(flags: &Flags, local: bool) -> Self {
        Self {
            local,
            array: flags.has('a'),
            assoc: flags.has('A'),
            export: if flags.has('x') {
                Some(true)
            } else if flags.has_off('x') {
                Some(false)
            } else {
                None
            },
            readonly: flags.has('r'),
        }
    }

    /// The listing filter for `declare -p -x` and friends.
    fn matches(&self, cell: &Cell) -> bool {
        (!self.array || matches!(cell.value, Value::BashArray(_)))
            && (!self.assoc || matches!(cell.value, Value::AssocArray(_)))
            && (self.export != Some(true) || cell.exported)
            && (!self.readonly || cell.readonly)
    }
}

/// Print `declare` lines for visible variables matching `attrs`.
pub(crate) fn print_declared(sh: &Interpreter, attrs: &Attrs, names: &[AssignArg], cmd_name: &str) -> EvalResult<i32> {
    let mut text = String::new();
    let mut status = 0;
    if names.is_empty() {
        for (name, cell) in sh.mem.visible() {
            if attrs.matches(&cell) {
                text.push_str(&declare_line(&name, &cell));
                text.push('\n');
            }
        }
    } else {
        for arg in names {
            match sh.mem.get_cell(&arg.name) {
                Some(cell) => {
                    text.push_str(&declare_line(&arg.name, cell));
                    text.push('\n');
                }
                None => {
                    eprintln!("oshell: {}: {}: not found", cmd_name, arg.name);
                    status = 1;
                }
            }
        }
    }
    out(&text)?;
    Ok(status)
}

fn empty_like(attrs: &Attrs) -> Option<Value> {
    if attrs.assoc {
        Some(Value::AssocArray(IndexMap::new()))
    } else if attrs.array {
        Some(Value::BashArray(BTreeMap::new()))
    } else {
        None
    }
}

/// Convert an existing binding to the array kind `attrs` asks for.
fn coerce_kind(sh: &mut Interpreter, name: &str, attrs: &Attrs) -> EvalResult<()> {
    let current = sh.mem.get(name).cloned();
    let converted = match (current, attrs.assoc, attrs.array) {
        (Some(Value::AssocArray(_)), true, _) | (Some(Value::BashArray(_)), false, true) => return Ok(()),
        (Some(Value::Str(s)), false, true) => Value::array([s]),
        (Some(Value::Str(s)), true, _) => {
            let mut map = IndexMap::new();
            map.insert("0".to_string(), s);
            Value::AssocArray(map)
        }
        (_, true, _) | (_, false, true) => match empty_like(attrs) {
            Some(v) => v,
            None => return Ok(()),
        },
        _ => return Ok(()),
    };
    sh.set_var(name, converted, None)
}

fn declare_one(sh: &mut Interpreter, arg: &AssignArg, attrs: &Attrs) -> EvalResult<()> {
    if attrs.local {
        let init = match &arg.value {
            None | Some(AssignValue::Array(_)) => empty_like(attrs),
            Some(AssignValue::Str(_)) => None,
        };
        sh.mem
            .set_local(&arg.name, init)
            .map_err(|e| sh.assign_error(e, arg.loc.as_ref()))?;
    }
    if attrs.array || attrs.assoc {
        coerce_kind(sh, &arg.name, attrs)?;
    }
    if arg.value.is_some() {
        sh.apply_assign(arg)?;
    }
    let readonly = if attrs.readonly { Some(true) } else { None };
    sh.mem.set_flags(&arg.name, attrs.export, readonly);
    Ok(())
}

/// Apply each operand. Invalid names and refused assignments are
/// reported and make the status 1; the other operands still apply.
pub(crate) fn declare_each(sh: &mut Interpreter, cmd_name: &str, args: &[AssignArg], attrs: &Attrs) -> EvalResult<i32> {
    let mut status = 0;
    for arg in args {
        if !is_valid_name(&arg.name) {
            eprintln!("oshell: {}: `{}': not a valid identifier", cmd_name, arg.trace_text());
            status = 1;
            continue;
        }
        match declare_one(sh, arg, attrs) {
            Ok(()) => {}
            Err(InterpreterError::Fatal(e)) => {
                eprintln!("oshell: {}: {}", cmd_name, e.message);
                status = 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(status)
}

fn list_functions(sh: &Interpreter, names: &[AssignArg]) -> EvalResult<i32> {
    let mut text = String::new();
    let mut status = 0;
    if names.is_empty() {
        let mut all: Vec<&String> = sh.functions.keys().collect();
        all.sort();
        for name in all {
            text.push_str(&format!("declare -f {}\n", name));
        }
    } else {
        for arg in names {
            if sh.functions.contains_key(&arg.name) {
                text.push_str(&format!("declare -f {}\n", arg.name));
            } else {
                status = 1;
            }
        }
    }
    out(&text)?;
    Ok(status)
}

pub fn handle_declare(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let (flags, _) = parse_flags(cmd.args(), "aAgpfFxr", true)?;
    if flags.has('f') || flags.has('F') {
        return list_functions(sh, &cmd.pairs);
    }
    let local = sh.mem.in_function() && !flags.has('g');
    let attrs = Attrs::from_flags(&flags, local);
    if flags.has('p') || (cmd.pairs.is_empty() && !flags.has('g')) {
        return print_declared(sh, &attrs, &cmd.pairs, cmd.name());
    }
    declare_each(sh, cmd.name(), &cmd.pairs, &attrs)
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
    fn test_declare_attributes() {
        let mut sh = run("declare -rx A=1");
        let cell = sh.mem.get_cell("A").unwrap();
        assert!(cell.readonly && cell.exported);
        assert_eq!(sh.get_var("A").as_deref(), Some("1"));
    }

    #[test]
    fn test_declare_in_function_is_local() {
        let mut sh = run("f() { declare x=in; declare -g y=glob; }; x=out; f");
        assert_eq!(sh.get_var("x").as_deref(), Some("out"));
        assert_eq!(sh.get_var("y").as_deref(), Some("glob"));
    }

    #[test]
    fn test_declare_assoc() {
        let sh = run("declare -A m; m[k]=v; m[j]=w");
        match sh.mem.get("m") {
            Some(Value::AssocArray(map)) => {
                assert_eq!(map.get("k").map(String::as_str), Some("v"));
                assert_eq!(map.len(), 2);
            }
            other => panic!("expected assoc array, got {:?}", other),
        }
    }

    #[test]
    fn test_declare_array_from_scalar() {
        let sh = run("s=one; declare -a s; s[1]=two");
        assert_eq!(
            sh.mem.get("s"),
            Some(&Value::array(["one".to_string(), "two".to_string()]))
        );
    }

    #[test]
    fn test_invalid_identifier() {
        let mut sh = run("declare 1x=2; s=$?");
        assert_eq!(sh.get_var("s").as_deref(), Some("1"));
    }

    #[test]
    fn test_readonly_reassign_reports() {
        let mut sh = run("declare -r R=1; declare R=2; s=$?");
        assert_eq!(sh.get_var("s").as_deref(), Some("1"));
        assert_eq!(sh.get_var("R").as_deref(), Some("1"));
    }

    #[test]
    fn test_print_missing() {
        let mut sh = run("declare -p nosuchvar; s=$?");
        assert_eq!(sh.get_var("s").as_deref(), Some("1"));
    }

    #[test]
    fn test_unexport() {
        let sh = run("export E=1; declare +x E");
        assert!(!sh.mem.get_cell("E").unwrap().exported);
    }
}
