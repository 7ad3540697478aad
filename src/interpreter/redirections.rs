//! Redirections
//!
//! Turns parsed redirects into `Redirection`s for `FdState`: evaluates
//! target words, picks open flags, and reads here-doc bodies.
//!
//! A redirect that can't be applied prints an error and gives the command
//! status 1 without running it. Nothing stays applied in that case.

use log::debug;

use crate::ast::types::{HereDoc, RedirArg, RedirLoc, Redirect, WordPart};
use crate::interpreter::errors::{EvalResult, FatalRuntimeError, InterpreterError};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::variables::Value;
use crate::parser::id_kind::Id;
use crate::process::{open_flags_for, RedirOpen, RedirTarget, RedirValue, Redirection};

/// Literal text of a here-doc body whose delimiter was quoted.
fn literal_body(parts: &[WordPart]) -> String {
    let mut out = String::new();
    for part in parts {
        match part {
            WordPart::Literal(tok) => out.push_str(&tok.val),
            WordPart::EscapedLiteral { token, .. } => out.push_str(&token.val),
            WordPart::SingleQuoted(sq) => out.push_str(&sq.value),
            _ => {}
        }
    }
    out
}

impl Interpreter {
    /// Evaluate and apply `redirects` in a new fd frame. Returns false,
    /// with no frame pushed, when one of them fails.
    pub(crate) fn apply_redirects(&mut self, redirects: &[Redirect]) -> EvalResult<bool> {
        if redirects.is_empty() {
            self.fd_state.push(&[])?;
            return Ok(true);
        }
        let mut redirs = Vec::with_capacity(redirects.len());
        for r in redirects {
            match self.eval_redirect(r)? {
                Some(mut list) => redirs.append(&mut list),
                None => {
                    self.redirect_failed = true;
                    return Ok(false);
                }
            }
        }
        match self.fd_state.push(&redirs) {
            Ok(named) => {
                for (name, fd) in named {
                    self.set_var(&name, Value::Str(fd.to_string()), None)?;
                }
                Ok(true)
            }
            Err(e) => {
                eprintln!("oshell: {}", e);
                self.redirect_failed = true;
                Ok(false)
            }
        }
    }

    /// Undo the innermost frame and reap its here-doc writers.
    pub(crate) fn pop_redirects(&mut self) {
        let writers = self.fd_state.pop();
        let waiter = self.waiter;
        for pid in writers {
            if let Err(e) = waiter.wait_for_pid(self, pid) {
                debug!("here doc writer {}: {}", pid, e);
            }
        }
    }

    /// One redirect can become two, e.g. `&>file`. `None` means an error
    /// was already reported.
    fn eval_redirect(&mut self, r: &Redirect) -> EvalResult<Option<Vec<Redirection>>> {
        let target = match &r.loc {
            RedirLoc::Fd(fd) => RedirTarget::Fd(*fd),
            RedirLoc::VarName(name) => RedirTarget::VarName(name.clone()),
        };
        let word = match &r.arg {
            RedirArg::HereDoc(h) => {
                let body = self.here_doc_text(h)?;
                return Ok(Some(vec![Redirection {
                    target,
                    value: RedirValue::HereDoc(body),
                }]));
            }
            RedirArg::Word(w) => w,
        };

        if r.op.id == Id::RedirTLess {
            let mut body = self.eval_word_to_string(word)?;
            body.push('\n');
            return Ok(Some(vec![Redirection {
                target,
                value: RedirValue::HereDoc(body),
            }]));
        }

        let fields = self.eval_word_sequence(std::slice::from_ref(word))?;
        let arg = match fields.as_slice() {
            [one] if !one.is_empty() => one.clone(),
            _ => {
                let text = word.static_text().unwrap_or_default();
                eprintln!(
                    "{}",
                    InterpreterError::Fatal(FatalRuntimeError::at(
                        format!("{}: ambiguous redirect", text),
                        word.first_token()
                    ))
                    .render()
                );
                return Ok(None);
            }
        };

        let path = |op: RedirOpen, noclobber: bool| RedirValue::Path {
            path: arg.clone(),
            flags: open_flags_for(op),
            noclobber,
        };
        let redir = |value: RedirValue| Redirection {
            target: target.clone(),
            value,
        };
        let list = match r.op.id {
            Id::RedirLess => vec![redir(path(RedirOpen::Read, false))],
            Id::RedirGreat => vec![redir(path(RedirOpen::Truncate, self.options.noclobber))],
            Id::RedirClobber => vec![redir(path(RedirOpen::Truncate, false))],
            Id::RedirDGreat => vec![redir(path(RedirOpen::Append, false))],
            Id::RedirLessGreat => vec![redir(path(RedirOpen::ReadWrite, false))],
            Id::RedirAndGreat | Id::RedirAndDGreat => {
                let op = if r.op.id == Id::RedirAndGreat {
                    RedirOpen::Truncate
                } else {
                    RedirOpen::Append
                };
                both_to_file(path(op, self.options.noclobber && op == RedirOpen::Truncate))
            }
            Id::RedirGreatAnd | Id::RedirLessAnd => {
                if arg == "-" {
                    vec![redir(RedirValue::Close)]
                } else if let Ok(fd) = arg.parse::<i32>() {
                    vec![redir(RedirValue::Dup(fd))]
                } else if r.op.id == Id::RedirGreatAnd && target == RedirTarget::Fd(1) {
                    // `>&file` is `&>file`.
                    both_to_file(path(RedirOpen::Truncate, self.options.noclobber))
                } else {
                    eprintln!("oshell: {}: ambiguous redirect", arg);
                    return Ok(None);
                }
            }
            other => {
                return Err(FatalRuntimeError::at(format!("unexpected redirect {:?}", other), Some(&r.op)).into());
            }
        };
        Ok(Some(list))
    }

    fn here_doc_text(&mut self, h: &HereDoc) -> EvalResult<String> {
        let body = h.body.borrow();
        let Some(body) = body.as_ref() else {
            return Ok(String::new());
        };
        if body.quoted {
            Ok(literal_body(&body.parts))
        } else {
            self.eval_here_doc_body(&body.parts)
        }
    }
}

/// stdout to the file, then stderr duplicated from stdout.
fn both_to_file(value: RedirValue) -> Vec<Redirection> {
    vec![
        Redirection {
            target: RedirTarget::Fd(1),
            value,
        },
        Redirection {
            target: RedirTarget::Fd(2),
            value: RedirValue::Dup(1),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpreter::InterpreterOptions;

    fn interp() -> Interpreter {
        Interpreter::new(InterpreterOptions {
            import_env: false,
            ..InterpreterOptions::default()
        })
    }

    fn temp_path(name: &str) -> String {
        format!("{}/oshell-redir-{}-{}", std::env::temp_dir().display(), std::process::id(), name)
    }

    #[test]
    fn test_output_and_append() {
        let mut sh = interp();
        let p = temp_path("append");
        sh.set_str("p", p.clone()).unwrap();
        sh.eval_source("echo one > $p; echo two >> $p", "t").unwrap();
        assert_eq!(std::fs::read_to_string(&p).unwrap(), "one\ntwo\n");
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn test_noclobber_refuses_existing_file() {
        let mut sh = interp();
        let p = temp_path("clobber");
        std::fs::write(&p, "keep\n").unwrap();
        sh.set_str("p", p.clone()).unwrap();
        sh.eval_source("set -o noclobber; echo new > $p; s=$?; echo forced >| $p", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("1"));
        assert_eq!(std::fs::read_to_string(&p).unwrap(), "forced\n");
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn test_here_doc_expansion() {
        let mut sh = interp();
        sh.eval_source("x=world\ny=$(cat <<EOF\nhello $x\nEOF\n)\nz=$(cat <<'EOF'\nhello $x\nEOF\n)", "t")
            .unwrap();
        assert_eq!(sh.get_var("y").as_deref(), Some("hello world"));
        assert_eq!(sh.get_var("z").as_deref(), Some("hello $x"));
    }

    #[test]
    fn test_here_string() {
        let mut sh = interp();
        sh.eval_source("read v <<< 'a b'", "t").unwrap();
        assert_eq!(sh.get_var("v").as_deref(), Some("a b"));
    }

    #[test]
    fn test_missing_input_file() {
        let mut sh = interp();
        sh.eval_source("true < /nonexistent/oshell/file; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("1"));
        assert_eq!(sh.fd_state.depth(), 0);
    }

    #[test]
    fn test_redirect_restored_after_builtin() {
        let mut sh = interp();
        let p = temp_path("restore");
        sh.set_str("p", p.clone()).unwrap();
        sh.eval_source("{ echo in; } > $p; x=$(echo out)", "t").unwrap();
        assert_eq!(std::fs::read_to_string(&p).unwrap(), "in\n");
        assert_eq!(sh.get_var("x").as_deref(), Some("out"));
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn test_named_fd() {
        let mut sh = interp();
        let p = temp_path("named");
        sh.set_str("p", p.clone()).unwrap();
        sh.eval_source("exec {fd}> $p; echo hi >&$fd", "t").unwrap();
        let fd: i32 = sh.get_var("fd").unwrap().parse().unwrap();
        assert!(fd >= 10);
        assert_eq!(std::fs::read_to_string(&p).unwrap(), "hi\n");
        let _ = nix::unistd::close(fd);
        let _ = std::fs::remove_file(&p);
    }
}
