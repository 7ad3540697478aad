//! Parser module for shell source
//!
//! Source flows through a mode-driven lexer into four cooperating parsers:
//! words, arithmetic (TDOP), `[[ ]]` conditionals and commands.
//!
//!   LineReader → Lexer → WordParser → CommandParser → ast::Command

pub mod arena;
pub mod arithmetic_parser;
pub mod braces;
pub mod command_parser;
pub mod compound_parser;
pub mod conditional_parser;
pub mod id_kind;
pub mod lexer;
pub mod lexer_def;
pub mod reader;
pub mod types;
pub mod word_helpers;
pub mod word_parser;

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::types::{ArithExpr, Command, CompoundWord};

pub use arena::{Arena, SourceLine, Token};
pub use command_parser::CommandParser;
pub use conditional_parser::parse_test_args;
pub use id_kind::{Id, Kind};
pub use lexer::Lexer;
pub use reader::{FileLineReader, LineReader, StringLineReader};
pub use types::{ParseContext, ParseException, ParseOptions};
pub use word_parser::WordParser;

/// Command parser reading top-level source from `reader`.
pub fn command_parser(ctx: Rc<ParseContext>, reader: Box<dyn LineReader>) -> CommandParser {
    let lexer = Rc::new(RefCell::new(Lexer::new(reader)));
    CommandParser::new(ctx, lexer, Id::EofReal)
}

/// Parse a whole string, e.g. for `eval` or a function body in a test.
pub fn parse_program(src: &str, source_name: &str, opts: ParseOptions) -> Result<Command, ParseException> {
    let arena = Arena::new(source_name);
    let ctx = ParseContext::new(Rc::clone(&arena), opts);
    let mut parser = command_parser(ctx, Box::new(StringLineReader::new(src, arena)));
    parser.parse_whole_file()
}

/// Parse a string as one arithmetic expression: `let` arguments and
/// variable values used as numbers.
pub fn parse_arith_string(src: &str) -> Result<ArithExpr, ParseException> {
    let arena = Arena::new("arith");
    let ctx = ParseContext::new(Rc::clone(&arena), ParseOptions::default());
    let lexer = Rc::new(RefCell::new(Lexer::new(Box::new(StringLineReader::new(src, arena)))));
    let mut w_parser = WordParser::new(ctx, lexer);
    w_parser.parse_arith_only()
}

/// Parse a string as if it were inside double quotes: prompt strings,
/// `${x@P}` and associative array subscripts.
pub fn parse_dq_string(src: &str, source_name: &str) -> Result<CompoundWord, ParseException> {
    let arena = Arena::new(source_name);
    let ctx = ParseContext::new(Rc::clone(&arena), ParseOptions::default());
    let lexer = Rc::new(RefCell::new(Lexer::new(Box::new(StringLineReader::new(src, arena)))));
    let mut w_parser = WordParser::new(ctx, lexer);
    w_parser.read_for_plugin()
}
