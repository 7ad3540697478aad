//! Lexer for Shell Source
//!
//! The lexer hands out one token at a time in whatever mode the parser asks
//! for. It handles:
//! - Pulling physical lines from a `LineReader` when a line is exhausted
//! - Translating token ids through a hint stack, so that e.g. the `)` that
//!   closes `$(` is seen as end of input by the nested parser
//! - Single-line lookahead for the few places the grammar needs it
//! - Raw line reads for here-doc bodies

use std::rc::Rc;

use crate::parser::arena::{SourceLine, Token};
use crate::parser::id_kind::Id;
use crate::parser::lexer_def::{one_token, LexMode};
use crate::parser::reader::{InvalidEncoding, LineReader};
use crate::parser::types::ParseException;

/// Tokenizes a single line.
pub struct LineLexer {
    line: Option<Rc<SourceLine>>,
    pos: usize,
}

impl LineLexer {
    pub fn new() -> Self {
        Self { line: None, pos: 0 }
    }

    pub fn reset(&mut self, line: Rc<SourceLine>, pos: usize) {
        self.line = Some(line);
        self.pos = pos;
    }

    fn content(&self) -> &str {
        self.line.as_ref().map(|l| l.content.as_str()).unwrap_or("")
    }

    pub fn read(&mut self, mode: LexMode) -> Result<Token, ParseException> {
        let pos = self.pos;
        let line = self.content();
        let Some((id, end)) = one_token(mode, line, pos) else {
            let ch = line[pos..].chars().next().unwrap_or('\0');
            let tok = Token::new(Id::UnknownTok, ch.to_string(), self.line.clone(), pos);
            return Err(ParseException::at(format!("unexpected character {:?}", ch), &tok));
        };
        if id == Id::EolTok {
            return Ok(Token::new(Id::EolTok, "", self.line.clone(), pos));
        }
        let val = line[pos..end].to_string();
        self.pos = end;
        Ok(Token::new(id, val, self.line.clone(), pos))
    }

    /// Back up one byte. Only valid when the last token was one byte long.
    pub fn maybe_unread_one(&mut self) -> bool {
        if self.pos == 0 {
            false
        } else {
            self.pos -= 1;
            true
        }
    }

    pub fn look_ahead_one(&self, mode: LexMode) -> Id {
        let line = self.content();
        if self.pos == line.len() {
            return Id::UnknownTok;
        }
        one_token(mode, line, self.pos).map(|(id, _)| id).unwrap_or(Id::UnknownTok)
    }

    /// The id of the next token that isn't whitespace, without moving.
    ///
    /// Lookahead never crosses a line boundary; at end of line this gives
    /// `UnknownTok`.
    pub fn look_past_space(&self, mode: LexMode) -> Id {
        let line = self.content();
        let mut pos = self.pos;
        loop {
            if pos >= line.len() {
                return Id::UnknownTok;
            }
            match one_token(mode, line, pos) {
                Some((Id::WSSpace, end)) | Some((Id::IgnoredSpace, end)) => pos = end,
                Some((id, _)) => return id,
                None => return Id::UnknownTok,
            }
        }
    }

    /// Check for `( )` after a function name. `unread` is 1 when the `(`
    /// was already consumed.
    pub fn look_ahead_func_parens(&self, unread: usize) -> bool {
        let Some(pos) = self.pos.checked_sub(unread) else {
            return false;
        };
        matches!(one_token(LexMode::FuncParens, self.content(), pos), Some((Id::LookAheadFuncParens, _)))
    }

    pub fn at_end_of_line(&self) -> bool {
        self.pos >= self.content().len()
    }

    /// Skip whatever is left of the current line.
    pub fn discard_rest(&mut self) {
        self.pos = self.content().len();
    }

    fn eof_token(&self, id: Id) -> Token {
        Token::new(id, "", self.line.clone(), self.pos)
    }
}

impl Default for LineLexer {
    fn default() -> Self {
        Self::new()
    }
}

/// Multi-line lexer with a translation stack.
pub struct Lexer {
    line_lexer: LineLexer,
    reader: Box<dyn LineReader>,
    translation_stack: Vec<(Id, Id)>,
}

impl Lexer {
    pub fn new(reader: Box<dyn LineReader>) -> Self {
        Self {
            line_lexer: LineLexer::new(),
            reader,
            translation_stack: Vec::new(),
        }
    }

    /// While the hint is on top of the stack, the next `old` token is
    /// returned as `new` and the hint is popped.
    pub fn push_hint(&mut self, old: Id, new: Id) {
        self.translation_stack.push((old, new));
    }

    pub fn hint_depth(&self) -> usize {
        self.translation_stack.len()
    }

    /// Drop hints above `depth`. Nested parsers call this on every exit so
    /// an error can't leave a stale translation behind.
    pub fn truncate_hints(&mut self, depth: usize) {
        self.translation_stack.truncate(depth);
    }

    pub fn maybe_unread_one(&mut self) -> bool {
        self.line_lexer.maybe_unread_one()
    }

    pub fn look_ahead_one(&self, mode: LexMode) -> Id {
        self.line_lexer.look_ahead_one(mode)
    }

    pub fn look_past_space(&self, mode: LexMode) -> Id {
        self.line_lexer.look_past_space(mode)
    }

    pub fn look_ahead_func_parens(&self, unread: usize) -> bool {
        self.line_lexer.look_ahead_func_parens(unread)
    }

    fn read_once(&mut self, mode: LexMode) -> Result<Token, ParseException> {
        let mut tok = self.line_lexer.read(mode)?;
        while tok.id == Id::EolTok {
            match self.next_line()? {
                Some(line) => {
                    self.line_lexer.reset(line, 0);
                    tok = self.line_lexer.read(mode)?;
                }
                None => return Ok(self.line_lexer.eof_token(Id::EofReal)),
            }
        }
        if let Some(&(old, new)) = self.translation_stack.last() {
            if tok.id == old {
                self.translation_stack.pop();
                tok.id = new;
            }
        }
        Ok(tok)
    }

    /// Read the next token in `mode`, skipping line continuations.
    ///
    /// Once input is exhausted every call returns `EofReal`.
    pub fn read(&mut self, mode: LexMode) -> Result<Token, ParseException> {
        loop {
            let tok = self.read_once(mode)?;
            if tok.id != Id::IgnoredLineCont {
                return Ok(tok);
            }
        }
    }

    fn next_line(&mut self) -> Result<Option<Rc<SourceLine>>, ParseException> {
        self.reader.get_line().map_err(|e| {
            match e.get_ref().and_then(|inner| inner.downcast_ref::<InvalidEncoding>()) {
                Some(bad) => ParseException::new("invalid UTF-8 in source", bad.line, bad.column),
                None => ParseException::new(format!("error reading input: {}", e), 0, 0),
            }
        })
    }

    /// Drop the rest of the current line and any pending hints, so an
    /// interactive session can keep going after a syntax error.
    pub fn discard_line(&mut self) {
        self.line_lexer.discard_rest();
        self.translation_stack.clear();
    }

    /// Read a whole line bypassing tokenization, for here-doc bodies.
    ///
    /// Must only be called right after a newline token, when the current
    /// line has been consumed.
    pub fn read_raw_line(&mut self) -> Result<Option<Rc<SourceLine>>, ParseException> {
        let line = self.next_line()?;
        if let Some(l) = &line {
            self.line_lexer.reset(Rc::clone(l), l.content.len());
        }
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::arena::Arena;
    use crate::parser::reader::StringLineReader;

    fn lexer(src: &str) -> Lexer {
        let arena = Arena::new("-c");
        Lexer::new(Box::new(StringLineReader::new(src, arena)))
    }

    #[test]
    fn test_reads_across_lines() {
        let mut lx = lexer("a\nb\n");
        let ids: Vec<Id> = (0..5).map(|_| lx.read(LexMode::ShCommand).unwrap().id).collect();
        assert_eq!(ids, vec![Id::LitChars, Id::OpNewline, Id::LitChars, Id::OpNewline, Id::EofReal]);
    }

    #[test]
    fn test_eof_is_idempotent() {
        let mut lx = lexer("x");
        assert_eq!(lx.read(LexMode::ShCommand).unwrap().id, Id::LitChars);
        for _ in 0..3 {
            assert_eq!(lx.read(LexMode::ShCommand).unwrap().id, Id::EofReal);
        }
    }

    #[test]
    fn test_line_continuation_skipped() {
        let mut lx = lexer("ec\\\nho\n");
        assert_eq!(lx.read(LexMode::ShCommand).unwrap().val, "ec");
        assert_eq!(lx.read(LexMode::ShCommand).unwrap().val, "ho");
    }

    #[test]
    fn test_translation_hint() {
        let mut lx = lexer("a)b)");
        lx.push_hint(Id::OpRParen, Id::EofRParen);
        assert_eq!(lx.read(LexMode::ShCommand).unwrap().id, Id::LitChars);
        assert_eq!(lx.read(LexMode::ShCommand).unwrap().id, Id::EofRParen);
        assert_eq!(lx.read(LexMode::ShCommand).unwrap().id, Id::LitChars);
        assert_eq!(lx.read(LexMode::ShCommand).unwrap().id, Id::OpRParen);
        assert_eq!(lx.hint_depth(), 0);
    }

    #[test]
    fn test_look_past_space() {
        let mut lx = lexer("f  () { :; }\n");
        assert_eq!(lx.read(LexMode::ShCommand).unwrap().val, "f");
        assert_eq!(lx.look_past_space(LexMode::ShCommand), Id::OpLParen);
        assert!(lx.look_ahead_func_parens(0));
    }

    #[test]
    fn test_empty_input_is_eof() {
        let mut lx = lexer("");
        assert_eq!(lx.read(LexMode::SQRaw).unwrap().id, Id::EofReal);
    }
}
