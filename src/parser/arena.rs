//! Source Lines and Tokens
//!
//! Every token points at the physical line it was lexed from, so errors can
//! render a caret under the offending column. Lines are owned by an `Arena`
//! and shared with tokens through `Rc`, which keeps a token's line alive for
//! as long as the token itself.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::parser::id_kind::{Id, Kind};

/// One physical line of shell source, including its trailing newline.
#[derive(Debug)]
pub struct SourceLine {
    pub line_num: usize,
    pub content: String,
    /// Name of the file, `-c` string, or substitution the line came from.
    pub source: Rc<str>,
}

#[derive(Clone)]
pub struct Token {
    pub id: Id,
    pub val: String,
    pub line: Option<Rc<SourceLine>>,
    pub col: usize,
}

impl Token {
    pub fn new(id: Id, val: impl Into<String>, line: Option<Rc<SourceLine>>, col: usize) -> Self {
        Self {
            id,
            val: val.into(),
            line,
            col,
        }
    }

    /// A token that doesn't come from source text, e.g. the `=` of `x+=1`.
    pub fn synthetic(id: Id, val: impl Into<String>) -> Self {
        Self::new(id, val, None, 0)
    }

    pub fn kind(&self) -> Kind {
        self.id.kind()
    }

    pub fn length(&self) -> usize {
        self.val.len()
    }

    pub fn line_num(&self) -> usize {
        self.line.as_ref().map(|l| l.line_num).unwrap_or(0)
    }

    /// Column as shown to users, 1-based.
    pub fn column(&self) -> usize {
        self.col + 1
    }

    pub fn source_name(&self) -> String {
        self.line.as_ref().map(|l| l.source.to_string()).unwrap_or_default()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:?} {:?}>", self.id, self.val)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.val == other.val && self.col == other.col && self.line_num() == other.line_num()
    }
}

/// Owns the source lines of one parse session.
///
/// Substitutions that are parsed at runtime (`eval`, backticks, here-doc
/// bodies) get a child arena so their lines can be dropped on their own.
#[derive(Debug, Default)]
pub struct Arena {
    lines: RefCell<Vec<Rc<SourceLine>>>,
    sources: RefCell<Vec<Rc<str>>>,
}

impl Arena {
    pub fn new(source_name: &str) -> Rc<Self> {
        let arena = Self::default();
        arena.sources.borrow_mut().push(Rc::from(source_name));
        Rc::new(arena)
    }

    pub fn child(&self, source_name: &str) -> Rc<Self> {
        Self::new(source_name)
    }

    pub fn push_source(&self, name: &str) {
        self.sources.borrow_mut().push(Rc::from(name));
    }

    pub fn pop_source(&self) {
        let mut sources = self.sources.borrow_mut();
        if sources.len() > 1 {
            sources.pop();
        }
    }

    pub fn current_source(&self) -> Rc<str> {
        self.sources.borrow().last().cloned().unwrap_or_else(|| Rc::from(""))
    }

    pub fn add_line(&self, content: impl Into<String>, line_num: usize) -> Rc<SourceLine> {
        let line = Rc::new(SourceLine {
            line_num,
            content: content.into(),
            source: self.current_source(),
        });
        self.lines.borrow_mut().push(Rc::clone(&line));
        line
    }

    pub fn num_lines(&self) -> usize {
        self.lines.borrow().len()
    }

    /// Render a two-line diagnostic: the source line and a caret under `tok`.
    pub fn caret_for(tok: &Token) -> Option<String> {
        let line = tok.line.as_ref()?;
        let text = line.content.trim_end_matches('\n');
        let pad: String = text
            .chars()
            .take(text[..tok.col.min(text.len())].chars().count())
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();
        Some(format!("  {}\n  {}^", text, pad))
    }
}
