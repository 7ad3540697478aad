//! Expansion helpers
//!
//! The pieces of word evaluation that don't walk the AST: parameter
//! operators on strings, shell patterns, prompt escapes, field assembly
//! and pathname expansion.

pub mod parameter_ops;
pub mod pattern;
pub mod prompt;
pub mod word_glob_expansion;
pub mod word_split;
