//! source/. - Execute commands from a file in the current shell
//!
//! source FILE [arg ...]
//!
//! A FILE without a slash is looked up in PATH, then in the current
//! directory. Arguments replace the positional parameters while the file
//! runs. `return` in the file ends it with the given status.

use std::path::PathBuf;

use log::debug;

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::errors::{ControlFlow, EvalResult, InterpreterError, UsageError};
use crate::interpreter::interpreter::Interpreter;
use crate::parser::reader::source_text;

/// Where `source NAME` reads from.
fn resolve(name: &str, path_var: Option<&str>) -> PathBuf {
    if name.contains('/') {
        return PathBuf::from(name);
    }
    if let Some(path_var) = path_var {
        for dir in path_var.split(':').filter(|d| !d.is_empty()) {
            let candidate = PathBuf::from(dir).join(name);
            if candidate.is_file() {
                return candidate;
            }
        }
    }
    PathBuf::from(name)
}

pub fn handle_source(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let mut args = cmd.args();
    if args.first().map(String::as_str) == Some("--") {
        args = &args[1..];
    }
    let Some(name) = args.first() else {
        return Err(UsageError::new("filename argument required").into());
    };
    let path = resolve(name, sh.get_var("PATH").as_deref());
    let src = match std::fs::read(&path) {
        Ok(bytes) => match source_text(bytes) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("oshell: {}: {}", name, e);
                return Ok(2);
            }
        },
        Err(e) => {
            eprintln!("oshell: {}: {}", name, e);
            return Ok(1);
        }
    };
    debug!("sourcing {}", path.display());

    let saved_argv = if args.len() > 1 {
        let saved = sh.mem.argv().to_vec();
        sh.mem.set_argv(args[1..].to_vec());
        Some(saved)
    } else {
        None
    };
    sh.call_stack.source_depth += 1;
    let result = sh.eval_source(&src, &path.to_string_lossy());
    sh.call_stack.source_depth -= 1;
    if let Some(argv) = saved_argv {
        sh.mem.set_argv(argv);
    }

    match result {
        Err(InterpreterError::ControlFlow(ControlFlow::Return(n))) => Ok(n),
        Err(InterpreterError::Parse(e)) => {
            eprintln!("{}", InterpreterError::Parse(e).render());
            Ok(2)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpreter::InterpreterOptions;

    fn script(name: &str, body: impl AsRef<[u8]>) -> String {
        let p = format!("{}/oshell-source-{}-{}", std::env::temp_dir().display(), std::process::id(), name);
        std::fs::write(&p, body).unwrap();
        p
    }

    #[test]
    fn test_source_sets_variables() {
        let p = script("vars", "a=1\nb=$1\n");
        let mut sh = Interpreter::new(InterpreterOptions::default());
        sh.set_str("p", p.clone()).unwrap();
        sh.eval_source("set -- outer; . $p inner; c=$1", "t").unwrap();
        assert_eq!(sh.get_var("a").as_deref(), Some("1"));
        assert_eq!(sh.get_var("b").as_deref(), Some("inner"));
        assert_eq!(sh.get_var("c").as_deref(), Some("outer"));
        let _ = std::fs::remove_file(p);
    }

    #[test]
    fn test_return_from_sourced_file() {
        let p = script("ret", "x=1\nreturn 4\nx=2\n");
        let mut sh = Interpreter::new(InterpreterOptions::default());
        sh.set_str("p", p.clone()).unwrap();
        sh.eval_source("source $p; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("x").as_deref(), Some("1"));
        assert_eq!(sh.get_var("s").as_deref(), Some("4"));
        let _ = std::fs::remove_file(p);
    }

    #[test]
    fn test_missing_file() {
        let mut sh = Interpreter::new(InterpreterOptions::default());
        sh.eval_source("source /nonexistent/oshell.sh; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("1"));
    }

    #[test]
    fn test_invalid_utf8_file_is_not_run() {
        let p = script("bytes", b"y=1\necho \xfe\n");
        let mut sh = Interpreter::new(InterpreterOptions::default());
        sh.set_str("p", p.clone()).unwrap();
        sh.eval_source(". $p; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("2"));
        assert_eq!(sh.get_var("y"), None);
        let _ = std::fs::remove_file(p);
    }

    #[test]
    fn test_resolve_with_slash() {
        assert_eq!(resolve("./x.sh", Some("/bin")), PathBuf::from("./x.sh"));
    }
}
