//! kill - Send a signal to processes or jobs
//!
//! kill [-s SIG | -n NUM | -SIG] PID | %JOB ...
//! kill -l [STATUS]

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::builtins::out;
use crate::interpreter::errors::{EvalResult, UsageError};
use crate::interpreter::interpreter::Interpreter;
use crate::process::signals::{short_name, signal_from_name};

fn list(operands: &[String]) -> EvalResult<i32> {
    if operands.is_empty() {
        let names: Vec<&str> = Signal::iterator().map(short_name).collect();
        out(&format!("{}\n", names.join(" ")))?;
        return Ok(0);
    }
    let mut status = 0;
    for op in operands {
        // An exit status names the signal that caused it.
        let sig = match op.parse::<i32>() {
            Ok(n) if n > 128 => Signal::try_from(n - 128).ok(),
            Ok(n) => Signal::try_from(n).ok(),
            Err(_) => signal_from_name(op),
        };
        match (sig, op.parse::<i32>().is_ok()) {
            (Some(sig), true) => out(&format!("{}\n", short_name(sig)))?,
            (Some(sig), false) => out(&format!("{}\n", sig as i32))?,
            (None, _) => {
                eprintln!("oshell: kill: {}: invalid signal specification", op);
                status = 1;
            }
        }
    }
    Ok(status)
}

fn parse_signal(spec: &str) -> Result<Signal, UsageError> {
    signal_from_name(spec).ok_or_else(|| UsageError::new(format!("{}: invalid signal specification", spec)))
}

pub fn handle_kill(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let args = cmd.args();
    let mut sig = Signal::SIGTERM;
    let mut rest = args;
    match args.first().map(String::as_str) {
        Some("-l") | Some("-L") => return list(&args[1..]),
        Some("-s") | Some("-n") => {
            let Some(spec) = args.get(1) else {
                return Err(UsageError::new(format!("{}: option requires an argument", args[0])).into());
            };
            sig = parse_signal(spec)?;
            rest = &args[2..];
        }
        Some("--") => rest = &args[1..],
        Some(s) if s.starts_with('-') && s.len() > 1 && s[1..].parse::<i32>().map_or(true, |n| n >= 0) => {
            sig = parse_signal(&s[1..])?;
            rest = &args[1..];
        }
        _ => {}
    }
    if rest.is_empty() {
        return Err(UsageError::new("usage: kill [-s sigspec | -n signum | -sigspec] pid | jobspec ...").into());
    }

    let mut status = 0;
    for target in rest {
        let result = if target.starts_with('%') {
            match sh.jobs.find(target).and_then(|id| sh.jobs.get(id)) {
                Some(job) if sh.options.monitor => killpg(job.pgid, sig),
                Some(job) => job.pids.iter().try_for_each(|p| kill(*p, sig)),
                None => {
                    eprintln!("oshell: kill: {}: no such job", target);
                    status = 1;
                    continue;
                }
            }
        } else {
            match target.parse::<i32>() {
                Ok(n) => kill(Pid::from_raw(n), sig),
                Err(_) => {
                    eprintln!("oshell: kill: {}: arguments must be process or job IDs", target);
                    status = 1;
                    continue;
                }
            }
        };
        if let Err(e) = result {
            eprintln!("oshell: kill: ({}) - {}", target, e.desc());
            status = 1;
        }
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpreter::InterpreterOptions;

    fn interp() -> Interpreter {
        let mut sh = Interpreter::new(InterpreterOptions {
            import_env: false,
            ..InterpreterOptions::default()
        });
        sh.set_str("PATH", "/bin:/usr/bin").unwrap();
        sh
    }

    #[test]
    fn test_kill_background_job() {
        let mut sh = interp();
        sh.eval_source("sleep 5 & kill %1; wait %1; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("143"));
    }

    #[test]
    fn test_kill_with_signal_name() {
        let mut sh = interp();
        sh.eval_source("sleep 5 & kill -s KILL $!; wait $!; a=$?", "t").unwrap();
        assert_eq!(sh.get_var("a").as_deref(), Some("137"));
        sh.eval_source("sleep 5 & kill -INT $!; wait $!; b=$?", "t").unwrap();
        assert_eq!(sh.get_var("b").as_deref(), Some("130"));
    }

    #[test]
    fn test_kill_errors() {
        let mut sh = interp();
        sh.eval_source("kill %4; a=$?; kill -BOGUS 1; b=$?; kill; c=$?", "t").unwrap();
        assert_eq!(sh.get_var("a").as_deref(), Some("1"));
        assert_eq!(sh.get_var("b").as_deref(), Some("2"));
        assert_eq!(sh.get_var("c").as_deref(), Some("2"));
    }

    #[test]
    fn test_kill_list() {
        let mut sh = interp();
        sh.eval_source("x=$(kill -l 130); y=$(kill -l TERM)", "t").unwrap();
        assert_eq!(sh.get_var("x").as_deref(), Some("INT"));
        assert_eq!(sh.get_var("y").as_deref(), Some("15"));
    }
}
