//! Builtin Command Dispatch
//!
//! Builtins are plain functions in a name table. Each one gets the
//! evaluated argv of the command and returns its exit status; anything
//! else it wants to do (unwind a loop, fail fatally) goes through the
//! error channel like every other evaluation step.
//!
//! Special builtins are looked up before normal ones. A `UsageError` from
//! any builtin is printed here and becomes status 2.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::interpreter::builtins;
use crate::interpreter::errors::{EvalResult, InterpreterError, UsageError};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::simple_command_assignments::{split_lhs, AssignArg, AssignValue};
use crate::interpreter::type_command;
use crate::parser::arena::Token;

/// The arguments a builtin receives.
#[derive(Debug, Clone, Default)]
pub struct CmdValue {
    /// `argv[0]` is the builtin's name.
    pub argv: Vec<String>,
    /// Location of the command word, for error messages.
    pub loc: Option<Token>,
    /// Where each `argv` entry came from, parallel to `argv` when known.
    pub arg_locs: Vec<Option<Token>>,
    /// Pre-split `name=value` operands of assignment builtins, in order.
    pub pairs: Vec<AssignArg>,
}

impl CmdValue {
    pub fn new(argv: Vec<String>, loc: Option<Token>) -> Self {
        Self {
            argv,
            loc,
            arg_locs: Vec::new(),
            pairs: Vec::new(),
        }
    }

    /// A command whose words each carry their own location.
    pub fn with_locs(argv: Vec<String>, arg_locs: Vec<Option<Token>>) -> Self {
        let loc = arg_locs.first().cloned().flatten();
        Self {
            argv,
            loc,
            arg_locs,
            pairs: Vec::new(),
        }
    }

    /// Location of `argv[i]`, or of the command word when unknown.
    pub fn arg_loc(&self, i: usize) -> Option<&Token> {
        self.arg_locs.get(i).and_then(Option::as_ref).or(self.loc.as_ref())
    }

    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// Drop the first word, for `command` and `builtin`. Assignment
    /// builtins reached this way get their operands split from the
    /// strings.
    fn shifted(&self) -> CmdValue {
        let argv = self.args().to_vec();
        let arg_locs = self.arg_locs.get(1..).unwrap_or_default().to_vec();
        let loc = arg_locs.first().cloned().flatten().or_else(|| self.loc.clone());
        if !self.pairs.is_empty() || !argv.first().is_some_and(|n| is_assignment_builtin(n)) {
            return CmdValue {
                argv,
                loc,
                arg_locs,
                pairs: self.pairs.clone(),
            };
        }
        let mut flags = vec![argv[0].clone()];
        let mut flag_locs = vec![loc.clone()];
        let mut pairs = Vec::new();
        let mut operands = false;
        for (i, arg) in argv.iter().enumerate().skip(1) {
            let arg_loc = arg_locs.get(i).cloned().flatten().or_else(|| loc.clone());
            if !operands && (arg.starts_with('-') || arg.starts_with('+')) && arg.len() > 1 {
                flags.push(arg.clone());
                flag_locs.push(arg_loc);
            } else {
                operands = true;
                pairs.push(assign_arg_of(arg, arg_loc.as_ref()));
            }
        }
        CmdValue {
            argv: flags,
            loc,
            arg_locs: flag_locs,
            pairs,
        }
    }
}

/// Split `name=value`, `name+=value` or a bare `name` into an assignment.
pub fn assign_arg_of(arg: &str, loc: Option<&Token>) -> AssignArg {
    let (lhs, value, plus_eq) = match arg.split_once('=') {
        Some((lhs, v)) => match lhs.strip_suffix('+') {
            Some(l) => (l, Some(v.to_string()), true),
            None => (lhs, Some(v.to_string()), false),
        },
        None => (arg, None, false),
    };
    let (name, index) = split_lhs(lhs);
    AssignArg {
        name,
        index,
        plus_eq,
        value: value.map(AssignValue::Str),
        loc: loc.cloned(),
    }
}

/// A valid variable name: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub type BuiltinFn = fn(&mut Interpreter, &CmdValue) -> EvalResult<i32>;

lazy_static! {
    static ref SPECIAL_BUILTINS: HashMap<&'static str, BuiltinFn> = {
        let mut m: HashMap<&'static str, BuiltinFn> = HashMap::new();
        m.insert(":", handle_true);
        m.insert(".", builtins::source_cmd::handle_source);
        m.insert("break", builtins::break_cmd::handle_break);
        m.insert("continue", builtins::break_cmd::handle_continue);
        m.insert("eval", builtins::eval_cmd::handle_eval);
        m.insert("exec", builtins::exec_cmd::handle_exec);
        m.insert("exit", builtins::exit_cmd::handle_exit);
        m.insert("export", builtins::export_cmd::handle_export);
        m.insert("readonly", builtins::export_cmd::handle_readonly);
        m.insert("return", builtins::return_cmd::handle_return);
        m.insert("set", builtins::set_cmd::handle_set);
        m.insert("shift", builtins::shift_cmd::handle_shift);
        m.insert("trap", builtins::trap_cmd::handle_trap);
        m.insert("unset", builtins::unset_cmd::handle_unset);
        m
    };
    static ref NORMAL_BUILTINS: HashMap<&'static str, BuiltinFn> = {
        let mut m: HashMap<&'static str, BuiltinFn> = HashMap::new();
        m.insert("true", handle_true);
        m.insert("false", handle_false);
        m.insert("builtin", handle_builtin);
        m.insert("command", handle_command);
        m.insert("echo", builtins::echo_cmd::handle_echo);
        m.insert("printf", builtins::printf_cmd::handle_printf);
        m.insert("source", builtins::source_cmd::handle_source);
        m.insert("shopt", builtins::shopt_cmd::handle_shopt);
        m.insert("local", builtins::local_cmd::handle_local);
        m.insert("declare", builtins::declare_cmd::handle_declare);
        m.insert("typeset", builtins::declare_cmd::handle_declare);
        m.insert("cd", builtins::cd_cmd::handle_cd);
        m.insert("pwd", builtins::cd_cmd::handle_pwd);
        m.insert("read", builtins::read_cmd::handle_read);
        m.insert("test", builtins::test_cmd::handle_test);
        m.insert("[", builtins::test_cmd::handle_test);
        m.insert("wait", builtins::jobs_cmd::handle_wait);
        m.insert("jobs", builtins::jobs_cmd::handle_jobs);
        m.insert("fg", builtins::jobs_cmd::handle_fg);
        m.insert("bg", builtins::jobs_cmd::handle_bg);
        m.insert("kill", builtins::kill_cmd::handle_kill);
        m.insert("type", type_command::handle_type);
        m.insert("umask", builtins::umask_cmd::handle_umask);
        m
    };
}

/// Builtins whose `name=value` operands are parsed as assignments.
pub fn is_assignment_builtin(name: &str) -> bool {
    matches!(name, "declare" | "typeset" | "local" | "export" | "readonly")
}

pub fn lookup_special(name: &str) -> Option<BuiltinFn> {
    SPECIAL_BUILTINS.get(name).copied()
}

pub fn lookup_builtin(name: &str) -> Option<BuiltinFn> {
    NORMAL_BUILTINS.get(name).copied()
}

pub fn is_builtin(name: &str) -> bool {
    SPECIAL_BUILTINS.contains_key(name) || NORMAL_BUILTINS.contains_key(name)
}

impl Interpreter {
    /// Run a builtin, turning a usage error into status 2.
    pub(crate) fn run_builtin(&mut self, f: BuiltinFn, cmd: &CmdValue) -> EvalResult<i32> {
        match f(self, cmd) {
            Err(InterpreterError::Usage(e)) => {
                eprintln!("oshell: {}: {}", cmd.name(), e.message);
                Ok(2)
            }
            other => other,
        }
    }
}

fn handle_true(_sh: &mut Interpreter, _cmd: &CmdValue) -> EvalResult<i32> {
    Ok(0)
}

fn handle_false(_sh: &mut Interpreter, _cmd: &CmdValue) -> EvalResult<i32> {
    Ok(1)
}

/// `builtin NAME ARGS...` skips functions and external programs.
fn handle_builtin(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let Some(name) = cmd.args().first() else {
        return Ok(0);
    };
    match lookup_special(name).or_else(|| lookup_builtin(name)) {
        Some(f) => {
            let inner = cmd.shifted();
            sh.run_builtin(f, &inner)
        }
        None => {
            eprintln!("oshell: builtin: {}: not a shell builtin", name);
            Ok(1)
        }
    }
}

/// `command [-v|-V] NAME ARGS...` runs NAME skipping functions, or
/// describes it.
fn handle_command(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let mut args = cmd.args();
    let mut describe: Option<bool> = None;
    while let Some(first) = args.first() {
        match first.as_str() {
            "-v" => describe = Some(false),
            "-V" => describe = Some(true),
            "-p" => {}
            "--" => {
                args = &args[1..];
                break;
            }
            s if s.starts_with('-') && s.len() > 1 => {
                return Err(UsageError::new(format!("{}: invalid option", s)).into());
            }
            _ => break,
        }
        args = &args[1..];
    }
    if args.is_empty() {
        return Ok(0);
    }
    if let Some(long) = describe {
        let mut status = 0;
        for name in args {
            if !type_command::describe(sh, name, long)? {
                if long {
                    eprintln!("oshell: command: {}: not found", name);
                }
                status = 1;
            }
        }
        return Ok(status);
    }
    let skip = cmd.args().len() - args.len();
    let inner = CmdValue {
        argv: std::iter::once(cmd.name().to_string())
            .chain(cmd.args()[skip..].iter().cloned())
            .collect(),
        loc: cmd.loc.clone(),
        arg_locs: std::iter::once(cmd.loc.clone())
            .chain(cmd.arg_locs.iter().skip(skip + 1).cloned())
            .collect(),
        pairs: cmd.pairs.clone(),
    }
    .shifted();
    sh.run_command(&inner, true)
}
