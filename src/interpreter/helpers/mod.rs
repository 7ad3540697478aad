//! Interpreter helper functions.

pub mod file_tests;
pub mod ifs;
pub mod quoting;
pub mod xtrace;
