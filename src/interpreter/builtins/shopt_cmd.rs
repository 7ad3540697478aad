//! shopt builtin - Shell options
//!
//! shopt [-s|-u] [-pq] [optname ...]
//!
//! `-s` sets and `-u` unsets the named options. Without either, prints
//! the options' state; `-p` prints them as `shopt` commands and `-q`
//! only sets the status (0 when all named options are on).

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::builtins::{out, parse_flags};
use crate::interpreter::errors::{EvalResult, UsageError};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::types::ShoptOptions;

pub fn handle_shopt(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let (flags, first) = parse_flags(cmd.args(), "supqo", false)?;
    let names = &cmd.args()[first..];
    if flags.has('o') {
        return Err(UsageError::new("-o: set -o options are not managed by shopt").into());
    }

    if flags.has('s') || flags.has('u') {
        let on = flags.has('s');
        if names.is_empty() {
            let listing = listing(&sh.shopt, ShoptOptions::names().filter(|n| sh.shopt.get(n) == Some(on)), true);
            out(&listing)?;
            return Ok(0);
        }
        let mut status = 0;
        for name in names {
            if !sh.shopt.set(name, on) {
                eprintln!("oshell: shopt: {}: invalid shell option name", name);
                status = 1;
            }
        }
        return Ok(status);
    }

    let mut status = 0;
    let selected: Vec<&str> = if names.is_empty() {
        ShoptOptions::names().collect()
    } else {
        let mut v = Vec::new();
        for name in names {
            match sh.shopt.get(name) {
                Some(on) => {
                    if !on {
                        status = 1;
                    }
                    v.push(name.as_str());
                }
                None => {
                    eprintln!("oshell: shopt: {}: invalid shell option name", name);
                    status = 1;
                }
            }
        }
        v
    };
    if !flags.has('q') {
        out(&listing(&sh.shopt, selected.into_iter(), flags.has('p')))?;
    }
    Ok(status)
}

fn listing<'a>(shopt: &ShoptOptions, names: impl Iterator<Item = &'a str>, as_commands: bool) -> String {
    let mut s = String::new();
    for name in names {
        let on = shopt.get(name).unwrap_or(false);
        if as_commands {
            s.push_str(&format!("shopt {} {}\n", if on { "-s" } else { "-u" }, name));
        } else {
            s.push_str(&format!("{:<15}\t{}\n", name, if on { "on" } else { "off" }));
        }
    }
    s
}
