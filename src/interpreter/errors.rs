//! Interpreter Errors
//!
//! Everything an evaluation step can produce besides a plain status:
//! - control flow: break, continue, return and exit unwinding to their handler
//! - fatal runtime errors: bad substitutions, unbound variables, division by zero
//! - strict mode errors: opt-in checks like `strict_arith`
//! - usage errors: bad builtin arguments, turned into status 2 at dispatch
//! - parse errors hit while running `eval`, `source` or a substitution
//! - I/O errors, classified by errno
//!
//! Every evaluation function returns `EvalResult<T>`, so each caller either
//! handles the variant it owns or passes it up with `?`.

use std::fmt;

use nix::errno::Errno;
use thiserror::Error;

use crate::parser::arena::{Arena, Token};
use crate::parser::braces::BraceError;
use crate::parser::types::ParseException;

pub type EvalResult<T> = Result<T, InterpreterError>;

/// Non-local exits that unwind the evaluator up to a loop, a function
/// frame or the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    /// `break N`, caught by the Nth enclosing loop.
    Break(u32),
    /// `continue N`
    Continue(u32),
    /// `return N`, caught by the function or sourced file frame.
    Return(i32),
    /// `exit N`, or errexit. Only the top level handles it.
    Exit(i32),
}

impl fmt::Display for ControlFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlFlow::Break(n) => write!(f, "break {}", n),
            ControlFlow::Continue(n) => write!(f, "continue {}", n),
            ControlFlow::Return(n) => write!(f, "return {}", n),
            ControlFlow::Exit(n) => write!(f, "exit {}", n),
        }
    }
}

/// Aborts the current command list. The script exits with `status` unless
/// the error happened in a context that reports and continues.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FatalRuntimeError {
    pub message: String,
    pub token: Option<Token>,
    pub status: i32,
}

impl FatalRuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            token: None,
            status: 1,
        }
    }

    pub fn at(message: impl Into<String>, token: Option<&Token>) -> Self {
        Self {
            message: message.into(),
            token: token.cloned(),
            status: 1,
        }
    }

    pub fn with_status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }
}

/// Raised only when an opt-in strictness option is on.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StrictModeError {
    pub message: String,
    pub token: Option<Token>,
}

impl StrictModeError {
    pub fn at(message: impl Into<String>, token: Option<&Token>) -> Self {
        Self {
            message: message.into(),
            token: token.cloned(),
        }
    }
}

/// Bad arguments to a builtin. Dispatch prints it and returns status 2.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct UsageError {
    pub message: String,
    pub token: Option<Token>,
}

impl UsageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            token: None,
        }
    }
}

/// A failed system call.
#[derive(Debug, Clone, Error)]
#[error("{}: {}", .context, .errno.desc())]
pub struct IoError {
    pub errno: Errno,
    pub context: String,
}

impl IoError {
    pub fn new(errno: Errno, context: impl Into<String>) -> Self {
        Self {
            errno,
            context: context.into(),
        }
    }

    /// `EINTR` is retried after running traps; everything else is fatal.
    pub fn is_interrupted(&self) -> bool {
        self.errno == Errno::EINTR
    }
}

impl From<Errno> for IoError {
    fn from(errno: Errno) -> Self {
        Self::new(errno, "system call failed")
    }
}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        let errno = e.raw_os_error().map(Errno::from_raw).unwrap_or(Errno::EIO);
        Self::new(errno, e.to_string())
    }
}

/// Unified error enum for everything evaluation can raise.
#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("{0}")]
    ControlFlow(ControlFlow),
    #[error(transparent)]
    Fatal(#[from] FatalRuntimeError),
    #[error(transparent)]
    StrictMode(#[from] StrictModeError),
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Parse(#[from] ParseException),
    #[error(transparent)]
    Io(#[from] IoError),
}

impl From<ControlFlow> for InterpreterError {
    fn from(flow: ControlFlow) -> Self {
        InterpreterError::ControlFlow(flow)
    }
}

impl From<Errno> for InterpreterError {
    fn from(errno: Errno) -> Self {
        InterpreterError::Io(errno.into())
    }
}

impl From<BraceError> for InterpreterError {
    fn from(e: BraceError) -> Self {
        InterpreterError::Fatal(FatalRuntimeError::new(e.to_string()))
    }
}

/// Check if an error only leaves a scope (break, continue, return) rather
/// than terminating execution.
pub fn is_scope_exit_error(error: &InterpreterError) -> bool {
    matches!(
        error,
        InterpreterError::ControlFlow(ControlFlow::Break(_) | ControlFlow::Continue(_) | ControlFlow::Return(_))
    )
}

impl InterpreterError {
    /// The token the error points at, if any.
    pub fn location(&self) -> Option<&Token> {
        match self {
            InterpreterError::Fatal(e) => e.token.as_ref(),
            InterpreterError::StrictMode(e) => e.token.as_ref(),
            InterpreterError::Usage(e) => e.token.as_ref(),
            InterpreterError::Parse(e) => e.token.as_ref(),
            InterpreterError::ControlFlow(_) | InterpreterError::Io(_) => None,
        }
    }

    /// Exit status of a shell that stops because of this error.
    pub fn exit_status(&self) -> i32 {
        match self {
            InterpreterError::ControlFlow(ControlFlow::Exit(n) | ControlFlow::Return(n)) => *n,
            InterpreterError::ControlFlow(_) => 0,
            InterpreterError::Fatal(e) => e.status,
            InterpreterError::Usage(_) | InterpreterError::Parse(_) => 2,
            InterpreterError::StrictMode(_) | InterpreterError::Io(_) => 1,
        }
    }

    /// `oshell: <location>: <message>`, with the source line and a caret
    /// above it when the error has a token.
    pub fn render(&self) -> String {
        if let InterpreterError::Parse(e) = self {
            return render_at(&e.message, e.token.as_ref());
        }
        render_at(&self.to_string(), self.location())
    }
}

/// Format a message the way every runtime diagnostic is printed.
pub fn render_at(message: &str, token: Option<&Token>) -> String {
    let mut out = String::new();
    if let Some(tok) = token {
        if let Some(caret) = Arena::caret_for(tok) {
            out.push_str(&caret);
            out.push('\n');
        }
        let src = tok.source_name();
        if !src.is_empty() && tok.line_num() > 0 {
            out.push_str(&format!("oshell: {}:{}: {}", src, tok.line_num(), message));
            return out;
        }
    }
    out.push_str(&format!("oshell: {}", message));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::id_kind::Id;

    #[test]
    fn test_scope_exit() {
        assert!(is_scope_exit_error(&ControlFlow::Break(1).into()));
        assert!(is_scope_exit_error(&ControlFlow::Return(3).into()));
        assert!(!is_scope_exit_error(&ControlFlow::Exit(0).into()));
        assert!(!is_scope_exit_error(&FatalRuntimeError::new("x").into()));
    }

    #[test]
    fn test_exit_status() {
        assert_eq!(InterpreterError::from(ControlFlow::Exit(7)).exit_status(), 7);
        assert_eq!(InterpreterError::from(UsageError::new("bad")).exit_status(), 2);
        let e: InterpreterError = FatalRuntimeError::new("boom").with_status(3).into();
        assert_eq!(e.exit_status(), 3);
    }

    #[test]
    fn test_render_without_location() {
        let e: InterpreterError = FatalRuntimeError::at("x: unbound variable", Some(&Token::synthetic(Id::VSubDollarName, "$x"))).into();
        assert_eq!(e.render(), "oshell: x: unbound variable");
    }

    #[test]
    fn test_io_error_display() {
        let e = IoError::new(Errno::ENOENT, "foo.txt");
        assert!(e.to_string().starts_with("foo.txt: "));
        assert!(!e.is_interrupted());
        assert!(IoError::from(Errno::EINTR).is_interrupted());
    }
}
