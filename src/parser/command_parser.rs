//! Command Parser
//!
//! Handles parsing of simple commands, redirections, assignments, pipelines
//! and command lists. Compound commands (`if`, `for`, `case`, ...) live in
//! `compound_parser.rs` as a second `impl` block on the same struct.
//!
//! The parser works on whole words from the `WordParser` and keeps one word
//! of lookahead. Here-doc bodies are read when the newline that ends their
//! line is peeked, in the order the here-docs were written.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::types::{
    default_redirect_fd, part_token, AssignOp, AssignPair, Command, CompoundWord, ControlFlowCmd,
    HereDoc, HereDocBody, Pipeline, RedirArg, RedirLoc, Redirect, Sentence, ShAssignment,
    SimpleCommand, Word, WordPart, AndOr,
};
use crate::parser::arena::{SourceLine, Token};
use crate::parser::braces::brace_detect;
use crate::parser::id_kind::{Id, Kind};
use crate::parser::lexer::Lexer;
use crate::parser::lexer_def::LexMode;
use crate::parser::reader::VirtualLineReader;
use crate::parser::types::{ParseContext, ParseException};
use crate::parser::word_helpers::{
    command_id, command_kind, detect_assignment, has_array_part, keyword_token, tilde_detect,
    tilde_detect_assign, AssignmentParts,
};
use crate::parser::word_parser::{SharedLexer, WordEmitter, WordParser};

pub type ParseResult<T> = Result<T, ParseException>;

/// Words that end a command list without being part of it.
const SECONDARY_KEYWORDS: [Id; 7] = [
    Id::KWDo,
    Id::KWDone,
    Id::KWThen,
    Id::KWFi,
    Id::KWElif,
    Id::KWElse,
    Id::KWEsac,
];

/// Error located at the first token of `w`.
pub(crate) fn word_error(msg: impl Into<String>, w: &Word) -> ParseException {
    match word_token(w) {
        Some(tok) => ParseException::at(msg, &tok),
        None => ParseException::new(msg, 0, 0),
    }
}

pub(crate) fn word_token(w: &Word) -> Option<Token> {
    match w {
        Word::Operator(tok) => Some(tok.clone()),
        Word::Compound(cw) => cw.first_token().cloned(),
    }
}

pub struct CommandParser {
    pub(super) ctx: Rc<ParseContext>,
    pub(super) w_parser: WordParser,
    pub(super) lexer: SharedLexer,
    /// `EofReal` at the top level, `EofRParen` inside `$(...)`.
    pub(super) eof_id: Id,
    next_lex_mode: Option<LexMode>,
    pub(super) cur_word: Word,
    pub(super) c_kind: Kind,
    pub(super) c_id: Id,
    pending_here_docs: Vec<(Token, Rc<HereDoc>)>,
}

impl CommandParser {
    pub fn new(ctx: Rc<ParseContext>, lexer: SharedLexer, eof_id: Id) -> Self {
        let w_parser = WordParser::new(Rc::clone(&ctx), Rc::clone(&lexer));
        Self {
            ctx,
            w_parser,
            lexer,
            eof_id,
            next_lex_mode: Some(LexMode::ShCommand),
            cur_word: Word::Operator(Token::synthetic(Id::UndefinedTok, "")),
            c_kind: Kind::Undefined,
            c_id: Id::UndefinedTok,
            pending_here_docs: Vec::new(),
        }
    }

    /// Drop all lookahead and pending state. An interactive shell calls
    /// this after a parse error before reading the next line.
    pub fn reset(&mut self) {
        self.w_parser.reset();
        self.lexer.borrow_mut().truncate_hints(0);
        self.next_lex_mode = Some(LexMode::ShCommand);
        self.cur_word = Word::Operator(Token::synthetic(Id::UndefinedTok, ""));
        self.c_kind = Kind::Undefined;
        self.c_id = Id::UndefinedTok;
        self.pending_here_docs.clear();
    }

    /// Throw away the line that failed to parse and start fresh on the next.
    pub fn recover(&mut self) {
        self.lexer.borrow_mut().discard_line();
        self.reset();
    }

    // ---- cursor ----

    pub(super) fn peek(&mut self) -> ParseResult<()> {
        if let Some(mode) = self.next_lex_mode.take() {
            let w = self.w_parser.read_word(mode)?;
            if w.operator_id() == Some(Id::OpNewline) {
                self.read_pending_here_docs()?;
            }
            self.c_kind = command_kind(&w);
            self.c_id = command_id(&w);
            self.cur_word = w;
        }
        Ok(())
    }

    pub(super) fn next(&mut self) {
        self.next_lex_mode = Some(LexMode::ShCommand);
    }

    pub(super) fn error<T>(&self, msg: impl Into<String>) -> ParseResult<T> {
        Err(word_error(msg, &self.cur_word))
    }

    pub(super) fn cur_tok(&self) -> Token {
        word_token(&self.cur_word).unwrap_or_else(|| Token::synthetic(self.c_id, ""))
    }

    /// Consume `id` or fail.
    pub(super) fn eat(&mut self, id: Id, what: &str) -> ParseResult<Token> {
        self.peek()?;
        if self.c_id != id {
            return self.error(format!("Expected {}", what));
        }
        let tok = self.cur_tok();
        self.next();
        Ok(tok)
    }

    /// Consume the keyword closing `open`, naming both in the error.
    pub(super) fn eat_closing(&mut self, id: Id, close: &str, open: &Token) -> ParseResult<Token> {
        self.peek()?;
        if self.c_id != id {
            let found = if self.c_kind == Kind::Eof {
                "end of input".to_string()
            } else {
                format!("{:?}", self.cur_tok().val)
            };
            return self.error(format!(
                "Expected '{}' to close '{}' at line {}, found {}",
                close,
                open.val,
                open.line_num(),
                found
            ));
        }
        let tok = self.cur_tok();
        self.next();
        Ok(tok)
    }

    pub(super) fn newline_ok(&mut self) -> ParseResult<()> {
        self.peek()?;
        if self.c_id == Id::OpNewline {
            self.next();
            self.peek()?;
        }
        Ok(())
    }

    pub(super) fn at_secondary_keyword(&self) -> bool {
        SECONDARY_KEYWORDS.contains(&self.c_id)
    }

    // ---- here-docs ----

    fn read_pending_here_docs(&mut self) -> ParseResult<()> {
        let pending = std::mem::take(&mut self.pending_here_docs);
        for (op, h) in pending {
            self.read_here_doc(&op, &h)?;
        }
        Ok(())
    }

    fn read_here_doc(&mut self, op: &Token, h: &HereDoc) -> ParseResult<()> {
        let Some((delim, quoted)) = h.here_begin.static_text_quoted() else {
            return Err(ParseException::at("Invalid here doc delimiter", op));
        };

        // Each body line with the offset after stripped tabs.
        let mut lines: Vec<(Rc<SourceLine>, usize)> = Vec::new();
        loop {
            let line = self.lexer.borrow_mut().read_raw_line()?;
            let Some(line) = line else {
                return Err(ParseException::at(
                    format!("Couldn't find terminator for here doc that starts here (wanted {:?})", delim),
                    op,
                ));
            };
            let text = line.content.as_str();
            let start = if h.strip_tabs {
                text.len() - text.trim_start_matches('\t').len()
            } else {
                0
            };
            let rest = &text[start..];
            if rest.strip_suffix('\n').unwrap_or(rest) == delim {
                break;
            }
            lines.push((line, start));
        }

        let parts = if quoted {
            lines
                .iter()
                .map(|(line, start)| {
                    WordPart::Literal(Token::new(
                        Id::LitChars,
                        &line.content[*start..],
                        Some(Rc::clone(line)),
                        *start,
                    ))
                })
                .collect()
        } else {
            let stripped: Vec<Rc<SourceLine>> = lines
                .iter()
                .map(|(line, start)| {
                    if *start == 0 {
                        Rc::clone(line)
                    } else {
                        Rc::new(SourceLine {
                            line_num: line.line_num,
                            content: line.content[*start..].to_string(),
                            source: Rc::clone(&line.source),
                        })
                    }
                })
                .collect();
            let lexer = Rc::new(RefCell::new(Lexer::new(Box::new(VirtualLineReader::new(stripped)))));
            let mut w_parser = WordParser::new(Rc::clone(&self.ctx), lexer);
            let mut parts = Vec::new();
            w_parser.read_here_doc_body(&mut parts)?;
            parts
        };
        *h.body.borrow_mut() = Some(HereDocBody { parts, quoted });
        Ok(())
    }

    /// Fails if a here-doc was opened but its line never ended.
    pub fn check_pending_here_docs(&self) -> ParseResult<()> {
        match self.pending_here_docs.first() {
            Some((op, _)) => Err(ParseException::at("Unterminated here doc began here", op)),
            None => Ok(()),
        }
    }

    // ---- redirects ----

    pub(super) fn parse_redirect(&mut self) -> ParseResult<Redirect> {
        self.peek()?;
        let op = self.cur_tok();
        let loc = redirect_loc(&op);
        self.next();
        self.peek()?;

        if matches!(op.id, Id::RedirDLess | Id::RedirDLessDash) {
            let Word::Compound(here_begin) = self.cur_word.clone() else {
                return self.error("Expected here doc delimiter");
            };
            let h = Rc::new(HereDoc {
                here_begin,
                strip_tabs: op.id == Id::RedirDLessDash,
                body: RefCell::new(None),
            });
            self.pending_here_docs.push((op.clone(), Rc::clone(&h)));
            self.next();
            return Ok(Redirect {
                op,
                loc,
                arg: RedirArg::HereDoc(h),
            });
        }

        let Word::Compound(w) = self.cur_word.clone() else {
            return self.error(format!("Invalid token after redirect operator {:?}", op.val));
        };
        self.next();
        Ok(Redirect {
            op,
            loc,
            arg: RedirArg::Word(tilde_detect(w)),
        })
    }

    /// Redirects after a compound command, e.g. `{ ...; } > out`.
    pub(super) fn parse_redirect_list(&mut self) -> ParseResult<Vec<Redirect>> {
        let mut redirects = Vec::new();
        loop {
            self.peek()?;
            if self.c_kind != Kind::Redir {
                return Ok(redirects);
            }
            redirects.push(self.parse_redirect()?);
        }
    }

    // ---- simple commands ----

    fn scan_simple_command(&mut self) -> ParseResult<(Vec<Redirect>, Vec<CompoundWord>)> {
        let mut redirects = Vec::new();
        let mut words = Vec::new();
        loop {
            self.peek()?;
            match (&self.cur_word, self.c_kind) {
                (_, Kind::Redir) => redirects.push(self.parse_redirect()?),
                (Word::Compound(w), Kind::Word) => {
                    words.push(w.clone());
                    self.next();
                }
                _ => return Ok((redirects, words)),
            }
        }
    }

    fn make_assign_pair(&self, parts: AssignmentParts, w: &CompoundWord) -> ParseResult<AssignPair> {
        let pair = build_assign_pair(parts, w);
        if let Some(value) = &pair.rhs {
            if has_array_part(value) && value.parts.len() > 1 {
                return Err(word_error(
                    "Unexpected parts after array literal",
                    &Word::Compound(value.clone()),
                ));
            }
        }
        Ok(pair)
    }

    pub(super) fn parse_simple_command(&mut self) -> ParseResult<Command> {
        let line = self.cur_tok().line_num();
        let (redirects, words) = self.scan_simple_command()?;

        if words.is_empty() {
            return Ok(Command::Simple(SimpleCommand {
                words,
                redirects,
                more_env: Vec::new(),
                line,
            }));
        }

        let mut prefix = Vec::new();
        let mut i = 0;
        while i < words.len() {
            match detect_assignment(&words[i]) {
                Some(parts) => prefix.push((parts, i)),
                None => break,
            }
            i += 1;
        }
        let suffix = &words[i..];

        if suffix.is_empty() {
            let mut pairs = Vec::with_capacity(prefix.len());
            for (parts, idx) in prefix {
                pairs.push(self.make_assign_pair(parts, &words[idx])?);
            }
            return Ok(Command::ShAssignment(ShAssignment { pairs, redirects }));
        }

        if let Some(keyword) = keyword_token(&suffix[0]) {
            if !redirects.is_empty() {
                return Err(ParseException::at("Control flow shouldn't have redirects", &keyword));
            }
            if !prefix.is_empty() {
                return Err(ParseException::at(
                    "Control flow shouldn't have environment bindings",
                    &keyword,
                ));
            }
            if suffix.len() > 2 {
                let extra = Word::Compound(suffix[2].clone());
                return Err(word_error(format!("Unexpected argument to {:?}", keyword.val), &extra));
            }
            return Ok(Command::ControlFlow(ControlFlowCmd {
                keyword,
                arg: suffix.get(1).cloned(),
            }));
        }

        let mut more_env = Vec::with_capacity(prefix.len());
        for (parts, idx) in prefix {
            if parts.close.is_some() {
                return Err(ParseException::at(
                    "Environment binding shouldn't look like an array assignment",
                    &parts.left,
                ));
            }
            if has_array_part(&words[idx]) {
                return Err(ParseException::at(
                    "Environment bindings can't contain array literals",
                    &parts.left,
                ));
            }
            more_env.push(self.make_assign_pair(parts, &words[idx])?);
        }

        let words = suffix
            .iter()
            .cloned()
            .map(|w| tilde_detect(brace_detect(w)))
            .collect();
        Ok(Command::Simple(SimpleCommand {
            words,
            redirects,
            more_env,
            line,
        }))
    }

    // ---- commands, pipelines, lists ----

    pub fn parse_command(&mut self) -> ParseResult<Command> {
        self.peek()?;
        let tok = self.cur_tok();
        let _guard = self.ctx.enter(&tok)?;

        if self.at_secondary_keyword() {
            return self.error(format!("Unexpected word {:?} when parsing command", tok.val));
        }
        match self.c_id {
            Id::KWFunction => return self.parse_ksh_function_def(),
            Id::KWDLeftBracket
            | Id::OpDLeftParen
            | Id::OpLParen
            | Id::LitLBrace
            | Id::KWFor
            | Id::KWWhile
            | Id::KWUntil
            | Id::KWIf
            | Id::KWCase
            | Id::KWTime => return self.parse_compound_command(),
            Id::LitRBrace => return self.error("Unexpected right brace"),
            _ => {}
        }

        match self.c_kind {
            Kind::Redir => self.parse_simple_command(),
            Kind::Word => {
                let var_like = matches!(
                    &self.cur_word,
                    Word::Compound(w) if detect_assignment(w).is_some()
                );
                if !var_like && self.w_parser.look_ahead_func_parens() {
                    return self.parse_function_def();
                }
                self.parse_simple_command()
            }
            Kind::Eof => self.error("Unexpected EOF while parsing command"),
            _ => self.error(format!("Invalid word {:?} while parsing command", tok.val)),
        }
    }

    /// `! a | b |& c`
    pub(super) fn parse_pipeline(&mut self) -> ParseResult<Command> {
        self.peek()?;
        let negated = if self.c_id == Id::KWBang {
            let tok = self.cur_tok();
            self.next();
            Some(tok)
        } else {
            None
        };

        let child = self.parse_command()?;
        self.peek()?;
        if !matches!(self.c_id, Id::OpPipe | Id::OpPipeAmp) {
            if negated.is_some() {
                return Ok(Command::Pipeline(Pipeline {
                    negated,
                    children: vec![child],
                    stderr_indices: Vec::new(),
                }));
            }
            return Ok(child);
        }

        let mut children = vec![child];
        let mut stderr_indices = Vec::new();
        while matches!(self.c_id, Id::OpPipe | Id::OpPipeAmp) {
            if self.c_id == Id::OpPipeAmp {
                stderr_indices.push(children.len() - 1);
            }
            self.next();
            self.newline_ok()?;
            children.push(self.parse_command()?);
            self.peek()?;
        }
        Ok(Command::Pipeline(Pipeline {
            negated,
            children,
            stderr_indices,
        }))
    }

    /// `a && b || c`, left-associative with equal precedence.
    pub(super) fn parse_and_or(&mut self) -> ParseResult<Command> {
        let child = self.parse_pipeline()?;
        self.peek()?;
        if !matches!(self.c_id, Id::OpDAmp | Id::OpDPipe) {
            return Ok(child);
        }
        let mut children = vec![child];
        let mut ops = Vec::new();
        while matches!(self.c_id, Id::OpDAmp | Id::OpDPipe) {
            ops.push(self.cur_tok());
            self.next();
            self.newline_ok()?;
            children.push(self.parse_pipeline()?);
            self.peek()?;
        }
        Ok(Command::AndOr(AndOr { children, ops }))
    }

    fn at_term_end(&self) -> bool {
        self.c_id == self.eof_id
            || matches!(
                self.c_id,
                Id::EofReal
                    | Id::RightSubshell
                    | Id::LitRBrace
                    | Id::OpDSemi
                    | Id::OpSemiAmp
                    | Id::OpDSemiAmp
            )
    }

    /// Commands inside a compound command, separated by `;`, `&` or
    /// newlines. Stops before a closing keyword, `}`, `)` or `;;`.
    pub(super) fn parse_command_term(&mut self) -> ParseResult<Vec<Command>> {
        let mut children = Vec::new();
        loop {
            self.peek()?;
            if self.at_term_end() || self.at_secondary_keyword() {
                break;
            }
            let mut child = self.parse_and_or()?;
            self.peek()?;
            let mut done = false;
            match self.c_id {
                Id::OpNewline => {
                    self.next();
                    self.peek()?;
                    done = self.at_term_end();
                }
                Id::OpSemi | Id::OpAmp => {
                    child = Command::Sentence(Sentence {
                        child: Box::new(child),
                        terminator: self.cur_tok(),
                    });
                    self.next();
                    self.peek()?;
                    if self.c_id == Id::OpNewline {
                        self.next();
                        self.peek()?;
                    }
                    done = self.at_term_end();
                }
                _ if self.at_secondary_keyword() || self.at_term_end() => done = true,
                _ => {
                    return self.error(format!(
                        "Invalid word {:?} while parsing command list",
                        self.cur_tok().val
                    ))
                }
            }
            children.push(child);
            if done {
                break;
            }
        }
        Ok(children)
    }

    pub(super) fn parse_command_list(&mut self) -> ParseResult<Vec<Command>> {
        self.newline_ok()?;
        self.parse_command_term()
    }

    /// One top-level line: `a; b & c` up to a newline or EOF.
    fn parse_command_line(&mut self) -> ParseResult<Command> {
        let mut children = Vec::new();
        loop {
            let mut child = self.parse_and_or()?;
            self.peek()?;
            let mut done = false;
            match self.c_id {
                Id::OpSemi | Id::OpAmp => {
                    child = Command::Sentence(Sentence {
                        child: Box::new(child),
                        terminator: self.cur_tok(),
                    });
                    self.next();
                    self.peek()?;
                    done = matches!(self.c_id, Id::OpNewline | Id::EofReal);
                }
                Id::OpNewline | Id::EofReal => done = true,
                _ => {
                    return self.error(format!(
                        "Invalid word {:?} while parsing command line",
                        self.cur_tok().val
                    ))
                }
            }
            children.push(child);
            if done {
                break;
            }
        }
        if children.len() == 1 {
            return Ok(children.remove(0));
        }
        Ok(Command::CommandList(children))
    }

    /// Parse the next logical line, or `None` at end of input.
    ///
    /// The main loop runs each line before parsing the next, so a syntax
    /// error late in a script doesn't stop earlier lines from running.
    pub fn parse_logical_line(&mut self) -> ParseResult<Option<Command>> {
        self.newline_ok()?;
        if self.c_id == Id::EofReal {
            self.check_pending_here_docs()?;
            return Ok(None);
        }
        let node = self.parse_command_line()?;
        Ok(Some(node))
    }

    /// Parse everything up to EOF into one list.
    pub fn parse_whole_file(&mut self) -> ParseResult<Command> {
        let mut children = Vec::new();
        while let Some(node) = self.parse_logical_line()? {
            children.push(node);
        }
        if children.len() == 1 {
            return Ok(children.remove(0));
        }
        Ok(Command::CommandList(children))
    }

    /// Body of `$(...)` or backticks, up to `eof_id`.
    pub fn parse_command_sub(&mut self) -> ParseResult<Command> {
        self.newline_ok()?;
        if self.c_kind == Kind::Eof {
            if self.c_id != self.eof_id {
                return self.error("Unexpected EOF in command substitution");
            }
            return Ok(Command::NoOp);
        }
        let children = self.parse_command_term()?;
        self.peek()?;
        if self.c_id != self.eof_id {
            return self.error(format!(
                "Unexpected word {:?} in command substitution",
                self.cur_tok().val
            ));
        }
        self.check_pending_here_docs()?;
        if children.len() == 1 {
            let mut children = children;
            return Ok(children.remove(0));
        }
        Ok(Command::CommandList(children))
    }
}

/// Descriptor or variable a redirect operator applies to: `2>`, `{fd}>`, `>`.
fn redirect_loc(op: &Token) -> RedirLoc {
    let val = op.val.as_str();
    if let Some(rest) = val.strip_prefix('{') {
        if let Some(end) = rest.find('}') {
            return RedirLoc::VarName(rest[..end].to_string());
        }
    }
    let digits: String = val.chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.parse::<i32>() {
        Ok(fd) => RedirLoc::Fd(fd),
        Err(_) => RedirLoc::Fd(default_redirect_fd(op.id)),
    }
}

/// `x=` or `x+=`
fn build_assign_pair(parts: AssignmentParts, w: &CompoundWord) -> AssignPair {
    let left = parts.left;
    let (name, index, op) = match &parts.close {
        None => {
            let (name, op) = split_assign_op(&left.val);
            (name, None, op)
        }
        Some(close) => {
            let name = left.val.trim_end_matches('[').to_string();
            let index = assign_index(&left, close, &w.parts[1..parts.offset - 1]);
            let op = if close.val.contains('+') {
                AssignOp::PlusEqual
            } else {
                AssignOp::Equal
            };
            (name, Some(index), op)
        }
    };
    let rhs = if parts.offset >= w.parts.len() {
        None
    } else {
        Some(tilde_detect_assign(CompoundWord::new(w.parts[parts.offset..].to_vec())))
    };
    AssignPair {
        left,
        name,
        index,
        op,
        rhs,
    }
}

/// Split an argument word of `declare`, `local` and friends into an
/// assignment, if it looks like one.
pub fn assign_pair_of(w: &CompoundWord) -> Option<AssignPair> {
    detect_assignment(w).map(|parts| build_assign_pair(parts, w))
}

fn split_assign_op(val: &str) -> (String, AssignOp) {
    if let Some(name) = val.strip_suffix("+=") {
        (name.to_string(), AssignOp::PlusEqual)
    } else {
        (val.trim_end_matches('=').to_string(), AssignOp::Equal)
    }
}

/// Source text between `a[` and `]=`.
fn assign_index(left: &Token, close: &Token, inner: &[WordPart]) -> String {
    if let (Some(l1), Some(l2)) = (&left.line, &close.line) {
        let start = left.col + left.length();
        if Rc::ptr_eq(l1, l2) && start <= close.col {
            if let Some(s) = l1.content.get(start..close.col) {
                return s.to_string();
            }
        }
    }
    inner
        .iter()
        .filter_map(part_token)
        .map(|t| t.val.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::arena::Arena;
    use crate::parser::reader::StringLineReader;
    use crate::parser::types::ParseOptions;

    fn parser(src: &str) -> CommandParser {
        let arena = Arena::new("-c");
        let ctx = ParseContext::new(Rc::clone(&arena), ParseOptions::default());
        let reader = StringLineReader::new(src, arena);
        let lexer = Rc::new(RefCell::new(Lexer::new(Box::new(reader))));
        CommandParser::new(ctx, lexer, Id::EofReal)
    }

    fn parse(src: &str) -> Command {
        parser(src).parse_whole_file().unwrap()
    }

    fn parse_err(src: &str) -> ParseException {
        parser(src).parse_whole_file().unwrap_err()
    }

    fn texts(words: &[CompoundWord]) -> Vec<String> {
        words.iter().map(|w| w.static_text().unwrap_or_default()).collect()
    }

    #[test]
    fn test_simple_command() {
        let Command::Simple(s) = parse("echo a b") else {
            panic!("expected simple command");
        };
        assert_eq!(texts(&s.words), vec!["echo", "a", "b"]);
        assert_eq!(s.line, 1);
    }

    #[test]
    fn test_assignment_and_env() {
        let Command::ShAssignment(a) = parse("x=1 y+=2 a[i+1]=3") else {
            panic!("expected assignment");
        };
        assert_eq!(a.pairs.len(), 3);
        assert_eq!(a.pairs[1].op, AssignOp::PlusEqual);
        assert_eq!(a.pairs[2].name, "a");
        assert_eq!(a.pairs[2].index.as_deref(), Some("i+1"));

        let Command::Simple(s) = parse("FOO=bar env") else {
            panic!("expected simple command");
        };
        assert_eq!(s.more_env.len(), 1);
        assert_eq!(s.more_env[0].name, "FOO");
        assert_eq!(texts(&s.words), vec!["env"]);

        let Command::ShAssignment(a) = parse("x=") else {
            panic!("expected assignment");
        };
        assert!(a.pairs[0].rhs.is_none());
    }

    #[test]
    fn test_redirects() {
        let Command::Simple(s) = parse("cmd 2>&1 >out {fd}<in") else {
            panic!("expected simple command");
        };
        assert_eq!(s.redirects.len(), 3);
        assert_eq!(s.redirects[0].loc, RedirLoc::Fd(2));
        assert_eq!(s.redirects[1].loc, RedirLoc::Fd(1));
        assert_eq!(s.redirects[2].loc, RedirLoc::VarName("fd".to_string()));
        assert!(matches!(parse_err("echo >").message.as_str(), m if m.contains("redirect")));
    }

    #[test]
    fn test_pipeline_and_or() {
        let Command::AndOr(a) = parse("a | b |& c && ! d || e") else {
            panic!("expected and-or");
        };
        assert_eq!(a.children.len(), 3);
        let Command::Pipeline(p) = &a.children[0] else {
            panic!("expected pipeline");
        };
        assert_eq!(p.children.len(), 3);
        assert_eq!(p.stderr_indices, vec![1]);
        assert!(matches!(&a.children[1], Command::Pipeline(p) if p.negated.is_some()));
    }

    #[test]
    fn test_sentences_and_lines() {
        let Command::CommandList(list) = parse("a; b &\nc") else {
            panic!("expected list");
        };
        assert_eq!(list.len(), 2);
        let Command::CommandList(first) = &list[0] else {
            panic!("expected list on first line");
        };
        assert!(matches!(&first[1], Command::Sentence(s) if s.terminator.id == Id::OpAmp));
    }

    #[test]
    fn test_here_doc_order() {
        let src = "cat <<A; cat <<'B'\none $x\nA\ntwo $y\nB\necho done\n";
        let Command::CommandList(list) = parse(src) else {
            panic!("expected list");
        };
        assert_eq!(list.len(), 2);
        let Command::CommandList(line1) = &list[0] else {
            panic!("expected two commands on line 1");
        };
        let body = |c: &Command| -> HereDocBody {
            let simple = match c {
                Command::Sentence(s) => match s.child.as_ref() {
                    Command::Simple(s) => s.clone(),
                    _ => panic!("expected simple"),
                },
                Command::Simple(s) => s.clone(),
                _ => panic!("expected simple"),
            };
            let RedirArg::HereDoc(h) = &simple.redirects[0].arg else {
                panic!("expected here doc");
            };
            let b = h.body.borrow().clone().unwrap();
            b
        };
        let a = body(&line1[0]);
        assert!(!a.quoted);
        assert!(a.parts.iter().any(|p| matches!(p, WordPart::SimpleVarSub(_))));
        let b = body(&line1[1]);
        assert!(b.quoted);
        assert!(matches!(&b.parts[0], WordPart::Literal(t) if t.val == "two $y\n"));
    }

    #[test]
    fn test_here_doc_strip_tabs() {
        let Command::Simple(s) = parse("cat <<-EOF\n\t\tx\n\tEOF\n") else {
            panic!("expected simple command");
        };
        let RedirArg::HereDoc(h) = &s.redirects[0].arg else {
            panic!("expected here doc");
        };
        let body = h.body.borrow().clone().unwrap();
        assert!(matches!(&body.parts[0], WordPart::Literal(t) if t.val.starts_with('x')));
    }

    #[test]
    fn test_unterminated_here_doc() {
        let e = parse_err("cat <<EOF\nabc\n");
        assert!(e.message.contains("terminator"));
        let e = parse_err("cat <<EOF");
        assert!(e.message.contains("here doc"));
    }

    #[test]
    fn test_control_flow() {
        let Command::ControlFlow(c) = parse("return 3") else {
            panic!("expected control flow");
        };
        assert_eq!(c.keyword.id, Id::ControlFlowReturn);
        assert!(c.arg.is_some());
        assert!(parse_err("break 1 2").message.contains("Unexpected argument"));
    }

    #[test]
    fn test_brace_and_tilde_detection() {
        let Command::Simple(s) = parse("echo a{b,c} ~/x") else {
            panic!("expected simple command");
        };
        assert!(matches!(s.words[1].parts[1], WordPart::BracedTuple(_)));
        assert!(matches!(s.words[2].parts[0], WordPart::TildeSub { .. }));
    }

    #[test]
    fn test_command_sub_body() {
        let Command::Simple(s) = parse("echo $(a; b) $()") else {
            panic!("expected simple command");
        };
        let WordPart::CommandSub(cs) = &s.words[1].parts[0] else {
            panic!("expected command sub");
        };
        assert!(matches!(cs.child.as_ref(), Command::CommandList(l) if l.len() == 2));
        let WordPart::CommandSub(empty) = &s.words[2].parts[0] else {
            panic!("expected command sub");
        };
        assert_eq!(*empty.child, Command::NoOp);
    }

    #[test]
    fn test_logical_lines_are_incremental() {
        let mut p = parser("echo one\necho (\n");
        assert!(p.parse_logical_line().unwrap().is_some());
        assert!(p.parse_logical_line().is_err());
    }
}
