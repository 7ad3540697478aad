//! Type Command Implementation
//!
//! Implements the `type` builtin command and related functionality:
//! - type [-afptP] name...
//! - command -v/-V name...
//!
//! Names resolve in this order: keyword, function, builtin, then `PATH`.

use std::path::PathBuf;

use crate::interpreter::builtin_dispatch::{is_builtin, CmdValue};
use crate::interpreter::builtins::{out, parse_flags};
use crate::interpreter::errors::EvalResult;
use crate::interpreter::interpreter::Interpreter;
use crate::process::find_in_path;

const KEYWORDS: [&str; 22] = [
    "!", "[[", "]]", "{", "}", "case", "do", "done", "elif", "else", "esac", "fi", "for", "function", "if", "in",
    "then", "time", "until", "while", "select", "coproc",
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Keyword,
    Function,
    Builtin,
    File(PathBuf),
}

impl Kind {
    fn word(&self) -> &'static str {
        match self {
            Kind::Keyword => "keyword",
            Kind::Function => "function",
            Kind::Builtin => "builtin",
            Kind::File(_) => "file",
        }
    }

    fn describe(&self, name: &str) -> String {
        match self {
            Kind::Keyword => format!("{} is a shell keyword", name),
            Kind::Function => format!("{} is a function", name),
            Kind::Builtin => format!("{} is a shell builtin", name),
            Kind::File(p) => format!("{} is {}", name, p.display()),
        }
    }
}

/// Every directory in `PATH` that has an executable `name`.
fn all_in_path(name: &str, path_var: Option<&str>) -> Vec<PathBuf> {
    if name.contains('/') {
        return find_in_path(name, path_var).into_iter().collect();
    }
    path_var
        .unwrap_or_default()
        .split(':')
        .filter_map(|dir| find_in_path(name, Some(if dir.is_empty() { "." } else { dir })))
        .collect()
}

/// What `name` would run as, first match first.
fn resolve(sh: &mut Interpreter, name: &str, all: bool, skip_functions: bool) -> Vec<Kind> {
    let mut kinds = Vec::new();
    if is_keyword(name) {
        kinds.push(Kind::Keyword);
    }
    if !skip_functions && sh.functions.contains_key(name) {
        kinds.push(Kind::Function);
    }
    if is_builtin(name) {
        kinds.push(Kind::Builtin);
    }
    if all || kinds.is_empty() {
        let path_var = sh.get_var("PATH");
        if all {
            kinds.extend(all_in_path(name, path_var.as_deref()).into_iter().map(Kind::File));
        } else if let Some(p) = find_in_path(name, path_var.as_deref()) {
            kinds.push(Kind::File(p));
        }
    }
    if !all {
        kinds.truncate(1);
    }
    kinds
}

/// `command -v` (short) or `command -V` (long) for one name. Returns
/// whether it was found.
pub fn describe(sh: &mut Interpreter, name: &str, long: bool) -> EvalResult<bool> {
    let Some(kind) = resolve(sh, name, false, false).into_iter().next() else {
        return Ok(false);
    };
    let line = match (&kind, long) {
        (_, true) => kind.describe(name),
        (Kind::File(p), false) => p.display().to_string(),
        (_, false) => name.to_string(),
    };
    out(&format!("{}\n", line))?;
    Ok(true)
}

/// Handle the `type` builtin command.
/// type [-afptP] name...
pub fn handle_type(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let (flags, first) = parse_flags(cmd.args(), "afptP", false)?;
    let show_all = flags.has('a');
    let type_only = flags.has('t');
    let path_only = flags.has('p') || flags.has('P');

    let mut text = String::new();
    let mut status = 0;
    for name in &cmd.args()[first..] {
        let kinds = if flags.has('P') {
            let path_var = sh.get_var("PATH");
            let found = all_in_path(name, path_var.as_deref());
            let n = if show_all { found.len() } else { found.len().min(1) };
            found.into_iter().take(n).map(Kind::File).collect()
        } else {
            resolve(sh, name, show_all, flags.has('f'))
        };
        if kinds.is_empty() {
            status = 1;
            if !type_only && !path_only {
                eprintln!("oshell: type: {}: not found", name);
            }
            continue;
        }
        for kind in &kinds {
            match kind {
                _ if type_only => text.push_str(kind.word()),
                Kind::File(p) if path_only => text.push_str(&p.display().to_string()),
                _ if path_only => continue,
                _ => text.push_str(&kind.describe(name)),
            }
            text.push('\n');
        }
    }
    out(&text)?;
    Ok(status)
}
