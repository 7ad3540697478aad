//! Interpreter module
//!
//! This module contains the shell evaluator: variables and scopes, the
//! word, arithmetic and boolean evaluators, and command execution on top
//! of the process substrate.

pub mod arithmetic;
pub mod builtin_dispatch;
pub mod builtins;
pub mod command_resolution;
pub mod conditionals;
pub mod control_flow;
pub mod errors;
pub mod execution_engine;
pub mod expansion;
pub mod functions;
pub mod helpers;
#[allow(clippy::module_inception)]
pub mod interpreter;
pub mod pipeline_execution;
pub mod redirections;
pub mod simple_command_assignments;
pub mod subshell_group;
pub mod traps;
pub mod type_command;
pub mod types;
pub mod variables;
pub mod word_expansion;

pub use errors::{ControlFlow, EvalResult, InterpreterError};
pub use interpreter::{Interpreter, InterpreterOptions};
pub use types::{ExecutionLimits, ShellOptions, ShoptOptions};
pub use variables::{Cell, Mem, Value};
