//! Parser Types and Constants
//!
//! Shared types, options and limits used across parser modules.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::parser::arena::{Arena, Token};

/// Max recursion depth for nested constructs and substitutions.
pub const MAX_PARSER_DEPTH: usize = 200;

#[derive(Debug, Error)]
pub struct ParseException {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub token: Option<Token>,
}

impl fmt::Display for ParseException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error at {}:{}: {}", self.line, self.column, self.message)
    }
}

impl ParseException {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            token: None,
        }
    }

    pub fn with_token(message: impl Into<String>, line: usize, column: usize, token: Token) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            token: Some(token),
        }
    }

    /// Error located at `tok`.
    pub fn at(message: impl Into<String>, tok: &Token) -> Self {
        Self::with_token(message, tok.line_num(), tok.column(), tok.clone())
    }

    /// Full diagnostic with the source line and a caret, when available.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(tok) = &self.token {
            if let Some(caret) = Arena::caret_for(tok) {
                out.push_str(&caret);
                out.push('\n');
            }
            let src = tok.source_name();
            if !src.is_empty() {
                out.push_str(&format!("{}:{}: ", src, self.line));
            }
        }
        out.push_str(&self.message);
        out
    }
}

/// Options that change how source is parsed.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// `@name` splices an array into argv.
    pub parse_at: bool,
    /// `@(a|b)` is lexed as an extended glob.
    pub extglob: bool,
}

/// State shared by every parser working on one source, including the
/// nested parsers built for command substitutions.
#[derive(Debug)]
pub struct ParseContext {
    pub arena: Rc<Arena>,
    pub opts: ParseOptions,
    depth: Cell<usize>,
    max_depth: usize,
}

impl ParseContext {
    pub fn new(arena: Rc<Arena>, opts: ParseOptions) -> Rc<Self> {
        Rc::new(Self {
            arena,
            opts,
            depth: Cell::new(0),
            max_depth: MAX_PARSER_DEPTH,
        })
    }

    pub fn with_max_depth(arena: Rc<Arena>, opts: ParseOptions, max_depth: usize) -> Rc<Self> {
        Rc::new(Self {
            arena,
            opts,
            depth: Cell::new(0),
            max_depth,
        })
    }

    /// Enter one level of nesting. The returned guard leaves it on drop.
    pub fn enter(self: &Rc<Self>, tok: &Token) -> Result<DepthGuard, ParseException> {
        let d = self.depth.get() + 1;
        if d > self.max_depth {
            return Err(ParseException::at(
                format!("maximum nesting depth ({}) exceeded", self.max_depth),
                tok,
            ));
        }
        self.depth.set(d);
        Ok(DepthGuard { ctx: Rc::clone(self) })
    }

    pub fn depth(&self) -> usize {
        self.depth.get()
    }
}

pub struct DepthGuard {
    ctx: Rc<ParseContext>,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.ctx.depth.set(self.ctx.depth.get().saturating_sub(1));
    }
}
