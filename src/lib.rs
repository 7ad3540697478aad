//! oshell - a POSIX shell with bash extensions
//!
//! Source is lexed and parsed into a typed AST, then evaluated directly
//! against the process: real forks, pipes, fds and signals.
//!
//!   LineReader → Lexer → Parsers → AST → Interpreter → process substrate

pub mod ast;
pub mod interpreter;
pub mod parser;
pub mod process;
pub mod shell;

pub use ast::types::Command;
pub use interpreter::{Interpreter, InterpreterError, InterpreterOptions};
pub use parser::{parse_program, ParseException, ParseOptions};
pub use shell::{Shell, Source};
