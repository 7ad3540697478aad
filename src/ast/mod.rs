//! Abstract Syntax Tree (AST) Types
//!
//! Typed node definitions for shell source: commands, words and their
//! parts, arithmetic and `[[ ]]` expressions, redirects and here-docs.
//! Tokens point back into the parse arena for error locations.
//!
//! Architecture:
//!   Input → Lexer → Parser → AST → Interpreter → Output

pub mod types;
