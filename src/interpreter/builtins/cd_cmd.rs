//! cd, pwd - Change and print the working directory
//!
//! cd [-L|-P] [dir]
//! pwd [-L|-P]
//!
//! `cd` with no argument goes to $HOME, `cd -` to $OLDPWD (and prints
//! it). PWD and OLDPWD are updated on success. Paths are kept logical:
//! `..` removes the last component of $PWD rather than following links.

use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::builtins::{out, parse_flags};
use crate::interpreter::errors::EvalResult;
use crate::interpreter::interpreter::Interpreter;

/// Resolve `.` and `..` lexically.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push("/");
    }
    out
}

fn current_dir(sh: &mut Interpreter) -> PathBuf {
    match sh.get_var("PWD") {
        Some(pwd) if Path::new(&pwd).is_absolute() => PathBuf::from(pwd),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
    }
}

pub fn handle_cd(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let (flags, first) = parse_flags(cmd.args(), "LP", false)?;
    let operands = &cmd.args()[first..];
    let mut print = false;
    let target = match operands.first().map(String::as_str) {
        None => match sh.get_var("HOME") {
            Some(h) => h,
            None => {
                eprintln!("oshell: cd: HOME not set");
                return Ok(1);
            }
        },
        Some("-") => match sh.get_var("OLDPWD") {
            Some(old) => {
                print = true;
                old
            }
            None => {
                eprintln!("oshell: cd: OLDPWD not set");
                return Ok(1);
            }
        },
        Some(dir) => dir.to_string(),
    };

    let old = current_dir(sh);
    let logical = normalize(&old.join(&target));
    let dest = if flags.has('P') {
        match std::fs::canonicalize(&logical) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("oshell: cd: {}: {}", target, e);
                return Ok(1);
            }
        }
    } else {
        logical
    };
    if let Err(e) = std::env::set_current_dir(&dest) {
        eprintln!("oshell: cd: {}: {}", target, e);
        return Ok(1);
    }
    debug!("cd {}", dest.display());
    let dest = dest.to_string_lossy().into_owned();
    sh.set_str("OLDPWD", old.to_string_lossy().into_owned())?;
    sh.set_str("PWD", dest.clone())?;
    if print {
        out(&format!("{}\n", dest))?;
    }
    Ok(0)
}

pub fn handle_pwd(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let (flags, _) = parse_flags(cmd.args(), "LP", false)?;
    let dir = if flags.has('P') {
        match std::env::current_dir() {
            Ok(d) => d,
            Err(e) => {
                eprintln!("oshell: pwd: {}", e);
                return Ok(1);
            }
        }
    } else {
        current_dir(sh)
    };
    out(&format!("{}\n", dir.display()))?;
    Ok(0)
}
