//! Word Parser
//!
//! Builds `Word`s from lexer tokens. A word is read part by part until a
//! token that can't continue it shows up (space, operator, closing quote).
//!
//! The parser always holds one token of lookahead in `cur_token`. After a
//! compound word is returned, `cur_token` is the token right after it and
//! hasn't been consumed yet.
//!
//! Substitutions recurse: `$(...)` builds a fresh `CommandParser` on the same
//! lexer and arms the lexer so the closing `)` reads as end of input.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::types::{
    ArithExpr, ArithSub, ArrayItem, ArrayLiteral, BracedVarSub, BracketOp, CommandSub, CompoundWord,
    DoubleQuoted, ExtGlob, PatSub, PatSubMode, SingleQuoted, SuffixOp, Word, WordPart,
};
use crate::parser::arena::Token;
use crate::parser::arithmetic_parser::TdopParser;
use crate::parser::braces::brace_detect;
use crate::parser::command_parser::CommandParser;
use crate::parser::id_kind::{Id, Kind};
use crate::parser::lexer::Lexer;
use crate::parser::lexer_def::LexMode;
use crate::parser::reader::StringLineReader;
use crate::parser::types::{ParseContext, ParseException};
use crate::parser::word_helpers::{detect_assoc_pair, tilde_detect};
use crate::process::raw_bytes::raw_char;

pub type SharedLexer = Rc<RefCell<Lexer>>;

/// Anything the boolean parser can pull words from: the word parser for
/// `[[`, or a plain argv for `test`.
pub trait WordEmitter {
    fn read_word(&mut self, mode: LexMode) -> Result<Word, ParseException>;
}

const KINDS_THAT_END_WORDS: [Kind; 4] = [Kind::Eof, Kind::WS, Kind::Op, Kind::Right];

/// `${...}` contents before the closing brace is known.
struct VarSubParts {
    token: Token,
    prefix_op: Option<Token>,
    bracket_op: Option<BracketOp>,
    suffix_op: Option<SuffixOp>,
}

pub struct WordParser {
    ctx: Rc<ParseContext>,
    lexer: SharedLexer,
    cur_token: Token,
    token_type: Id,
    token_kind: Kind,
    next_lex_mode: Option<LexMode>,
    cursor_was_newline: bool,
}

impl WordParser {
    pub fn new(ctx: Rc<ParseContext>, lexer: SharedLexer) -> Self {
        Self {
            ctx,
            lexer,
            cur_token: Token::synthetic(Id::UndefinedTok, ""),
            token_type: Id::UndefinedTok,
            token_kind: Kind::Undefined,
            next_lex_mode: Some(LexMode::ShCommand),
            cursor_was_newline: false,
        }
    }

    /// Forget lookahead, e.g. after a parse error in an interactive loop.
    pub fn reset(&mut self) {
        self.cur_token = Token::synthetic(Id::UndefinedTok, "");
        self.token_type = Id::UndefinedTok;
        self.token_kind = Kind::Undefined;
        self.next_lex_mode = Some(LexMode::ShCommand);
        self.cursor_was_newline = false;
    }

    pub fn ctx(&self) -> &Rc<ParseContext> {
        &self.ctx
    }

    pub fn lexer(&self) -> &SharedLexer {
        &self.lexer
    }

    pub fn cur_token(&self) -> &Token {
        &self.cur_token
    }

    pub fn push_hint(&self, old: Id, new: Id) {
        self.lexer.borrow_mut().push_hint(old, new);
    }

    fn hint_depth(&self) -> usize {
        self.lexer.borrow().hint_depth()
    }

    fn truncate_hints(&self, depth: usize) {
        self.lexer.borrow_mut().truncate_hints(depth);
    }

    fn peek(&mut self) -> Result<(), ParseException> {
        if let Some(mode) = self.next_lex_mode.take() {
            let tok = self.lexer.borrow_mut().read(mode)?;
            self.token_type = tok.id;
            self.token_kind = tok.id.kind();
            self.cur_token = tok;
        }
        Ok(())
    }

    /// Consume the current token; the next peek reads in `mode`.
    fn next(&mut self, mode: LexMode) {
        self.next_lex_mode = Some(mode);
    }

    fn error<T>(&self, msg: impl Into<String>) -> Result<T, ParseException> {
        Err(ParseException::at(msg, &self.cur_token))
    }

    // ---- ${} ----

    fn read_var_op_arg(&mut self, arg_mode: LexMode) -> Result<CompoundWord, ParseException> {
        self.read_var_op_arg3(arg_mode, None, true)
    }

    fn read_var_op_arg3(
        &mut self,
        arg_mode: LexMode,
        eof_type: Option<Id>,
        empty_ok: bool,
    ) -> Result<CompoundWord, ParseException> {
        self.next(arg_mode);
        self.peek()?;
        self.read_compound_word3(arg_mode, eof_type, empty_ok)
    }

    fn read_slice_var_op(&mut self) -> Result<SuffixOp, ParseException> {
        self.next(LexMode::Arith);
        self.peek()?;
        let begin = if self.token_type == Id::ArithColon {
            None
        } else {
            Some(self.read_arith_expr()?)
        };
        if self.token_type == Id::ArithRBrace {
            return Ok(SuffixOp::Slice { begin, length: None });
        }
        if self.token_type == Id::ArithColon {
            self.next(LexMode::Arith);
            let length = self.read_arith_expr()?;
            return Ok(SuffixOp::Slice {
                begin,
                length: Some(length),
            });
        }
        self.error("Expected : or } in slice")
    }

    fn read_pat_sub_var_op(&mut self, arg_mode: LexMode) -> Result<SuffixOp, ParseException> {
        let slash = self.cur_token.clone();
        let mut pat = self.read_var_op_arg3(arg_mode, Some(Id::LitSlash), false)?;

        // ${a////c} replaces every / with c
        if pat.parts.len() == 1 && pat.static_text().as_deref() == Some("/") {
            self.next(arg_mode);
            self.peek()?;
            pat.parts.push(WordPart::Literal(self.cur_token.clone()));
        }
        if pat.parts.is_empty() {
            return self.error("Pattern in ${x/pat/replace} must not be empty");
        }

        let mut mode = PatSubMode::First;
        if let Some(WordPart::Literal(tok)) = pat.parts.first() {
            let m = match tok.id {
                Id::LitSlash => Some(PatSubMode::All),
                Id::LitPound => Some(PatSubMode::Prefix),
                Id::LitPercent => Some(PatSubMode::Suffix),
                _ => None,
            };
            if let Some(m) = m {
                mode = m;
                pat.parts.remove(0);
            }
        }

        if self.token_type == Id::RightDollarBrace {
            return Ok(SuffixOp::PatSub(PatSub {
                pat,
                replace: None,
                mode,
                slash,
            }));
        }
        if self.token_type == Id::LitSlash {
            let replace = self.read_var_op_arg(arg_mode)?;
            self.peek()?;
            if self.token_type != Id::RightDollarBrace {
                return self.error("Expected } after replacement string");
            }
            return Ok(SuffixOp::PatSub(PatSub {
                pat,
                replace: Some(replace),
                mode,
                slash,
            }));
        }
        self.error("Expected } or / to close pattern")
    }

    /// `[` ( `@` | `*` | arith ) `]`
    fn read_subscript(&mut self) -> Result<BracketOp, ParseException> {
        let next_id = self.lexer.borrow().look_past_space(LexMode::Arith);
        let op = if matches!(next_id, Id::LitAt | Id::ArithStar) {
            self.next(LexMode::Arith);
            self.peek()?;
            self.next(LexMode::Arith);
            self.peek()?;
            BracketOp::WholeArray(next_id)
        } else {
            self.next(LexMode::Arith);
            BracketOp::ArrayIndex(self.read_arith_expr()?)
        };
        if self.token_type != Id::ArithRBracket {
            return self.error("Expected ] to close subscript");
        }
        self.next(LexMode::VSub2);
        self.peek()?;
        Ok(op)
    }

    fn parse_var_of(&mut self) -> Result<VarSubParts, ParseException> {
        self.peek()?;
        if self.token_kind != Kind::VSub {
            return self.error("bad substitution");
        }
        let token = self.cur_token.clone();
        self.next(LexMode::VSub2);
        self.peek()?;
        let bracket_op = if self.token_type == Id::VOp2LBracket {
            Some(self.read_subscript()?)
        } else {
            None
        };
        Ok(VarSubParts {
            token,
            prefix_op: None,
            bracket_op,
            suffix_op: None,
        })
    }

    fn parse_var_expr(&mut self, arg_mode: LexMode, allow_query: bool) -> Result<VarSubParts, ParseException> {
        let mut part = self.parse_var_of()?;
        self.peek()?;
        if self.token_type == Id::RightDollarBrace {
            return Ok(part);
        }

        match self.token_kind {
            Kind::VTest | Kind::VOp1 => {
                let op = self.cur_token.clone();
                let arg = self.read_var_op_arg(arg_mode)?;
                if self.token_type != Id::RightDollarBrace {
                    return self.error("Expected } to close ${");
                }
                part.suffix_op = Some(SuffixOp::Unary { op, arg });
            }
            Kind::VOp0 => {
                part.suffix_op = Some(SuffixOp::Nullary(self.cur_token.clone()));
                self.next(LexMode::VSub2);
                self.peek()?;
            }
            Kind::VOp2 => match self.token_type {
                Id::VOp2Slash => {
                    part.suffix_op = Some(self.read_pat_sub_var_op(arg_mode)?);
                }
                Id::VOp2Colon => {
                    part.suffix_op = Some(self.read_slice_var_op()?);
                    if self.token_type != Id::ArithRBrace {
                        return self.error("Expected } to close ${");
                    }
                }
                _ => return self.error("Unexpected token in ${}"),
            },
            Kind::VOp3 if allow_query => {
                part.suffix_op = Some(SuffixOp::Nullary(self.cur_token.clone()));
                self.next(LexMode::VSub2);
                self.peek()?;
            }
            _ => return self.error("Unexpected token in ${}"),
        }

        if !matches!(self.token_type, Id::RightDollarBrace | Id::ArithRBrace) {
            return self.error("Expected } to close ${");
        }
        Ok(part)
    }

    fn read_braced_var_sub(&mut self, left: Token, d_quoted: bool) -> Result<BracedVarSub, ParseException> {
        let _guard = self.ctx.enter(&left)?;
        let arg_mode = if d_quoted {
            LexMode::VSubArgDQ
        } else {
            LexMode::VSubArgUnquoted
        };

        self.next(LexMode::VSub1);
        self.peek()?;

        let ty = self.token_type;
        let part = if ty == Id::VSubPound || ty == Id::VSubBang {
            // ${#x} and ${!x} have a prefix; ${#} and ${!} are variables.
            let next_id = self.lexer.borrow().look_ahead_one(LexMode::VSub1);
            let is_prefix = !matches!(next_id, Id::UnknownTok | Id::RightDollarBrace);
            if !is_prefix {
                self.parse_var_expr(arg_mode, false)?
            } else if ty == Id::VSubPound {
                let prefix = self.cur_token.clone();
                self.next(LexMode::VSub1);
                let mut part = self.parse_var_of()?;
                self.peek()?;
                if self.token_type != Id::RightDollarBrace {
                    return self.error("Expected } after length expression");
                }
                part.prefix_op = Some(prefix);
                part
            } else {
                let prefix = self.cur_token.clone();
                self.next(LexMode::VSub1);
                let mut part = self.parse_var_expr(arg_mode, true)?;
                part.prefix_op = Some(prefix);
                part
            }
        } else if self.token_kind == Kind::VSub {
            self.parse_var_expr(arg_mode, false)?
        } else {
            return self.error("bad substitution");
        };

        Ok(BracedVarSub {
            left,
            var_name: part.token.val.clone(),
            token: part.token,
            prefix_op: part.prefix_op,
            bracket_op: part.bracket_op,
            suffix_op: part.suffix_op,
            right: self.cur_token.clone(),
        })
    }

    // ---- quotes ----

    fn read_single_quoted(&mut self, mode: LexMode) -> Result<SingleQuoted, ParseException> {
        let left = self.cur_token.clone();
        let mut value = String::new();
        loop {
            self.next(mode);
            self.peek()?;
            match self.token_kind {
                Kind::Lit => value.push_str(&self.cur_token.val),
                Kind::Char => value.push_str(&decode_char_token(&self.cur_token)),
                Kind::Unknown => value.push_str(&self.cur_token.val),
                Kind::Eof => {
                    return Err(ParseException::at(
                        "Unexpected EOF in single-quoted string that began here",
                        &left,
                    ))
                }
                Kind::Right => break,
                _ => return self.error("Unexpected token in single-quoted string"),
            }
        }
        Ok(SingleQuoted { left, value })
    }

    /// Shared by double-quoted strings and here-doc bodies. With no left
    /// quote, `"` is literal and end of input ends the body.
    fn read_like_dq(&mut self, left: Option<&Token>, out: &mut Vec<WordPart>) -> Result<(), ParseException> {
        loop {
            self.next(LexMode::DQ);
            self.peek()?;
            match self.token_kind {
                Kind::Lit => {
                    let part = if self.token_type == Id::LitEscapedChar {
                        WordPart::EscapedLiteral {
                            token: self.cur_token.clone(),
                            ch: self.cur_token.val[1..].to_string(),
                        }
                    } else {
                        WordPart::Literal(self.cur_token.clone())
                    };
                    out.push(part);
                }
                Kind::Left => {
                    let part = self.read_left_parts(true)?;
                    out.push(part);
                }
                Kind::VSub => out.push(WordPart::SimpleVarSub(self.cur_token.clone())),
                Kind::Right => {
                    if left.is_some() {
                        return Ok(());
                    }
                    out.push(WordPart::Literal(self.cur_token.clone()));
                }
                Kind::Eof => {
                    return match left {
                        Some(l) => Err(ParseException::at(
                            "Unexpected EOF reading double-quoted string that began here",
                            l,
                        )),
                        None => Ok(()),
                    };
                }
                _ => return self.error("Unexpected token in double-quoted string"),
            }
        }
    }

    fn read_double_quoted(&mut self) -> Result<DoubleQuoted, ParseException> {
        let left = self.cur_token.clone();
        let mut parts = Vec::new();
        self.read_like_dq(Some(&left), &mut parts)?;
        Ok(DoubleQuoted { left, parts })
    }

    // ---- substitutions ----

    fn read_left_parts(&mut self, d_quoted: bool) -> Result<WordPart, ParseException> {
        match self.token_type {
            Id::LeftDoubleQuote | Id::LeftDollarDoubleQuote => Ok(WordPart::DoubleQuoted(self.read_double_quoted()?)),
            Id::LeftSingleQuote => Ok(WordPart::SingleQuoted(self.read_single_quoted(LexMode::SQRaw)?)),
            Id::LeftDollarSingleQuote => Ok(WordPart::SingleQuoted(self.read_single_quoted(LexMode::SQC)?)),
            Id::LeftDollarParen | Id::LeftBacktick | Id::LeftProcSubIn | Id::LeftProcSubOut => {
                Ok(WordPart::CommandSub(self.read_command_sub(self.token_type, d_quoted)?))
            }
            Id::LeftDollarBrace => {
                let left = self.cur_token.clone();
                Ok(WordPart::BracedVarSub(Box::new(self.read_braced_var_sub(left, d_quoted)?)))
            }
            Id::LeftDollarDParen => Ok(WordPart::ArithSub(self.read_arith_sub()?)),
            Id::LeftDollarBracket => Ok(WordPart::ArithSub(self.read_legacy_arith_sub()?)),
            _ => self.error("Unexpected token"),
        }
    }

    fn read_command_sub(&mut self, left_id: Id, d_quoted: bool) -> Result<CommandSub, ParseException> {
        let left = self.cur_token.clone();
        let _guard = self.ctx.enter(&left)?;

        if left_id == Id::LeftBacktick {
            return self.read_backtick_sub(left, d_quoted);
        }

        self.next(LexMode::ShCommand);
        let depth = self.hint_depth();
        self.push_hint(Id::OpRParen, Id::EofRParen);
        let mut c_parser = CommandParser::new(Rc::clone(&self.ctx), Rc::clone(&self.lexer), Id::EofRParen);
        let node = c_parser.parse_command_sub();
        self.truncate_hints(depth);
        Ok(CommandSub {
            left,
            child: Box::new(node?),
        })
    }

    /// Backticks collect raw text first, then parse it as a separate source.
    fn read_backtick_sub(&mut self, left: Token, d_quoted: bool) -> Result<CommandSub, ParseException> {
        self.next(LexMode::Backtick);
        let mut code = String::new();
        loop {
            self.peek()?;
            match self.token_type {
                Id::BacktickQuoted => code.push_str(&self.cur_token.val[1..]),
                Id::BacktickDoubleQuote if d_quoted => code.push('"'),
                Id::BacktickDoubleQuote | Id::BacktickOther => code.push_str(&self.cur_token.val),
                Id::BacktickRight => break,
                Id::EofReal => {
                    return Err(ParseException::at(
                        "Unexpected EOF while looking for closing backtick",
                        &left,
                    ))
                }
                _ => return self.error("Unexpected token in backticks"),
            }
            self.next(LexMode::Backtick);
        }

        let arena = Rc::clone(&self.ctx.arena);
        arena.push_source("backticks");
        let reader = StringLineReader::starting_at(&code, Rc::clone(&arena), left.line_num().max(1));
        let lexer = Rc::new(RefCell::new(Lexer::new(Box::new(reader))));
        let mut c_parser = CommandParser::new(Rc::clone(&self.ctx), lexer, Id::EofReal);
        let node = c_parser.parse_command_sub();
        arena.pop_source();
        Ok(CommandSub {
            left,
            child: Box::new(node?),
        })
    }

    pub(crate) fn read_arith_expr(&mut self) -> Result<ArithExpr, ParseException> {
        TdopParser::new(self).parse()
    }

    /// The whole input is one arithmetic expression: `let` arguments,
    /// array subscripts and variable values used as numbers.
    pub fn parse_arith_only(&mut self) -> Result<ArithExpr, ParseException> {
        self.next(LexMode::Arith);
        let expr = self.read_arith_expr()?;
        if self.token_type != Id::EofReal {
            return self.error(format!("Unexpected token {:?} after arithmetic expression", self.cur_token.val));
        }
        Ok(expr)
    }

    fn read_arith_sub(&mut self) -> Result<ArithSub, ParseException> {
        let left = self.cur_token.clone();
        let depth = self.hint_depth();
        self.push_hint(Id::OpRParen, Id::RightDollarDParen);
        let result = self.read_arith_sub_body();
        self.truncate_hints(depth);
        Ok(ArithSub { left, expr: result? })
    }

    fn read_arith_sub_body(&mut self) -> Result<ArithExpr, ParseException> {
        self.next(LexMode::Arith);
        let expr = self.read_arith_expr()?;
        if self.token_type != Id::ArithRParen {
            return self.error("Expected first ) to end arith sub");
        }
        self.next(LexMode::ShCommand);
        self.peek()?;
        if self.token_type != Id::RightDollarDParen {
            return self.error("Expected second ) to end arith sub");
        }
        Ok(expr)
    }

    /// `$[1 + 2]`, the old spelling of `$((1 + 2))`.
    fn read_legacy_arith_sub(&mut self) -> Result<ArithSub, ParseException> {
        let left = self.cur_token.clone();
        self.next(LexMode::Arith);
        let expr = self.read_arith_expr()?;
        if self.token_type != Id::ArithRBracket {
            return self.error("Expected ] to end $[");
        }
        Ok(ArithSub { left, expr })
    }

    /// `(( a = 1 + 2 ))` in command position. The `((` was already read.
    pub fn read_dparen(&mut self) -> Result<ArithExpr, ParseException> {
        let depth = self.hint_depth();
        self.push_hint(Id::OpRParen, Id::OpDRightParen);
        let result = self.read_dparen_body();
        self.truncate_hints(depth);
        result
    }

    fn read_dparen_body(&mut self) -> Result<ArithExpr, ParseException> {
        self.next(LexMode::Arith);
        let expr = self.read_arith_expr()?;
        if self.token_type != Id::ArithRParen {
            return self.error("Expected first ) to end arith statement");
        }
        self.next(LexMode::ShCommand);
        self.peek()?;
        if self.token_type != Id::OpDRightParen {
            return self.error("Expected second ) to end arith statement");
        }
        self.next(LexMode::ShCommand);
        Ok(expr)
    }

    fn next_non_space(&mut self) -> Result<(), ParseException> {
        loop {
            self.next(LexMode::Arith);
            self.peek()?;
            if !matches!(self.token_kind, Kind::Ignored | Kind::WS) {
                return Ok(());
            }
        }
    }

    /// `for (( init; cond; update ))`, after the `((`.
    #[allow(clippy::type_complexity)]
    pub fn read_for_expression(
        &mut self,
    ) -> Result<(Option<ArithExpr>, Option<ArithExpr>, Option<ArithExpr>), ParseException> {
        self.next_non_space()?;
        let init = if self.token_type == Id::ArithSemi {
            None
        } else {
            Some(self.read_arith_expr()?)
        };
        if self.token_type != Id::ArithSemi {
            return self.error("Expected ; in for loop expression");
        }
        self.next_non_space()?;
        let cond = if self.token_type == Id::ArithSemi {
            None
        } else {
            Some(self.read_arith_expr()?)
        };
        if self.token_type != Id::ArithSemi {
            return self.error("Expected ; in for loop expression");
        }
        self.next_non_space()?;
        let update = if self.token_type == Id::ArithRParen {
            None
        } else {
            Some(self.read_arith_expr()?)
        };
        if self.token_type != Id::ArithRParen {
            return self.error("Expected ) to end for loop expression");
        }
        self.next_non_space()?;
        if self.token_type != Id::ArithRParen {
            return self.error("Expected ) to end for loop expression");
        }
        self.next(LexMode::ShCommand);
        Ok((init, cond, update))
    }

    fn read_array_literal(&mut self) -> Result<WordPart, ParseException> {
        self.next(LexMode::ShCommand);
        self.peek()?;
        if self.cur_token.id != Id::OpLParen {
            return self.error("Expected ( after =");
        }
        let left = self.cur_token.clone();

        // A separate word parser, since this one is in the middle of a word.
        let mut w_parser = WordParser::new(Rc::clone(&self.ctx), Rc::clone(&self.lexer));
        let mut words = Vec::new();
        loop {
            match w_parser.read_word(LexMode::ShCommand)? {
                Word::Operator(tok) => match tok.id {
                    Id::RightShArrayLiteral => break,
                    Id::OpNewline => continue,
                    Id::EofReal => {
                        return Err(ParseException::at("Unexpected EOF in array literal", &left));
                    }
                    _ => return Err(ParseException::at("Unexpected token in array literal", &tok)),
                },
                Word::Compound(w) => words.push(w),
            }
        }

        let items = match words.first() {
            None => Vec::new(),
            Some(first) if detect_assoc_pair(first).is_some() => {
                let mut items = Vec::with_capacity(words.len());
                for w in &words {
                    match detect_assoc_pair(w) {
                        Some(pair) => items.push(pair),
                        None => {
                            let tok = w.first_token().cloned().unwrap_or_else(|| left.clone());
                            return Err(ParseException::at("Expected associative array pair", &tok));
                        }
                    }
                }
                items
            }
            Some(_) => words
                .into_iter()
                .map(|w| ArrayItem::Word(brace_detect(tilde_detect(w))))
                .collect(),
        };
        Ok(WordPart::ArrayLiteral(ArrayLiteral { left, items }))
    }

    fn read_ext_glob(&mut self) -> Result<WordPart, ParseException> {
        let depth = self.hint_depth();
        self.push_hint(Id::OpRParen, Id::RightExtGlob);
        let result = self.read_ext_glob_body();
        self.truncate_hints(depth);
        result
    }

    fn read_ext_glob_body(&mut self) -> Result<WordPart, ParseException> {
        let op = self.cur_token.clone();
        self.next(LexMode::ExtGlob);
        let mut arms = Vec::new();
        // @(a||b) has an empty arm in the middle
        let mut read_word = false;
        loop {
            self.peek()?;
            match self.token_type {
                Id::RightExtGlob => {
                    if !read_word {
                        arms.push(CompoundWord::default());
                    }
                    break;
                }
                Id::OpPipe => {
                    if !read_word {
                        arms.push(CompoundWord::default());
                    }
                    read_word = false;
                    self.next(LexMode::ExtGlob);
                }
                _ if matches!(self.token_kind, Kind::Lit | Kind::Left | Kind::VSub | Kind::ExtGlob) => {
                    arms.push(self.read_compound_word(LexMode::ExtGlob)?);
                    read_word = true;
                }
                _ if self.token_kind == Kind::Eof => {
                    return Err(ParseException::at(
                        "Unexpected EOF reading extended glob that began here",
                        &op,
                    ));
                }
                _ => return self.error("Unexpected token in extended glob"),
            }
        }
        Ok(WordPart::ExtGlob(ExtGlob { op, arms }))
    }

    // ---- words ----

    fn read_compound_word(&mut self, mode: LexMode) -> Result<CompoundWord, ParseException> {
        self.read_compound_word3(mode, None, true)
    }

    /// Precondition: looking at the first token of the word.
    /// Postcondition: looking at the token after it.
    fn read_compound_word3(
        &mut self,
        mode: LexMode,
        eof_type: Option<Id>,
        empty_ok: bool,
    ) -> Result<CompoundWord, ParseException> {
        let mut w = CompoundWord::default();
        let mut regex_depth = 0usize;
        loop {
            self.peek()?;

            let allow_done = empty_ok || !w.parts.is_empty();
            if allow_done && Some(self.token_type) == eof_type {
                break;
            }

            let kind = self.token_kind;
            let in_regex_group = regex_depth > 0 && matches!(self.token_type, Id::WSSpace | Id::OpRParen);
            if mode == LexMode::BashRegex && (kind == Kind::BashRegex || in_regex_group) {
                match self.token_type {
                    Id::BashRegexLParen => regex_depth += 1,
                    Id::OpRParen => regex_depth -= 1,
                    _ => {}
                }
                w.parts.push(WordPart::Literal(self.cur_token.clone()));
            } else if matches!(
                kind,
                Kind::Lit | Kind::KW | Kind::ControlFlow | Kind::BoolUnary | Kind::BoolBinary
            ) {
                if self.token_type == Id::LitVarLike
                    && w.parts.is_empty()
                    && self.lexer.borrow().look_ahead_one(LexMode::ShCommand) == Id::OpLParen
                {
                    w.parts.push(WordPart::Literal(self.cur_token.clone()));
                    let depth = self.hint_depth();
                    self.push_hint(Id::OpRParen, Id::RightShArrayLiteral);
                    let part = self.read_array_literal();
                    self.truncate_hints(depth);
                    w.parts.push(part?);

                    self.next(mode);
                    self.peek()?;
                    if !KINDS_THAT_END_WORDS.contains(&self.token_kind) {
                        return self.error("Unexpected token after array literal");
                    }
                    break;
                } else if self.ctx.opts.parse_at && self.token_type == Id::LitSplice && w.parts.is_empty() {
                    let token = self.cur_token.clone();
                    let name = token.val[1..].to_string();
                    w.parts.push(WordPart::Splice { token, name });
                    self.next(mode);
                    self.peek()?;
                    if !KINDS_THAT_END_WORDS.contains(&self.token_kind) {
                        return self.error("Unexpected token after array splice");
                    }
                    break;
                } else if self.token_type == Id::LitEscapedChar {
                    w.parts.push(WordPart::EscapedLiteral {
                        token: self.cur_token.clone(),
                        ch: self.cur_token.val[1..].to_string(),
                    });
                } else {
                    w.parts.push(WordPart::Literal(self.cur_token.clone()));
                }
            } else if kind == Kind::VSub {
                w.parts.push(WordPart::SimpleVarSub(self.cur_token.clone()));
            } else if kind == Kind::ExtGlob {
                let part = self.read_ext_glob()?;
                w.parts.push(part);
            } else if kind == Kind::Left {
                let part = self.read_left_parts(mode == LexMode::VSubArgDQ)?;
                w.parts.push(part);
            } else if kind == Kind::Right {
                if self.token_type == Id::RightDoubleQuote {
                    // still part of the word
                } else {
                    if self.token_type == Id::RightSubshell && self.lexer.borrow_mut().maybe_unread_one() {
                        // (case x in x) ;; esac): re-read the ) once the
                        // case parser has armed its own hint.
                        self.push_hint(Id::OpRParen, Id::RightSubshell);
                        self.next(mode);
                    }
                    break;
                }
            } else {
                // `case x in x)`: the ) is read before the case parser can
                // push its hint, so back up and read it again.
                if matches!(self.token_type, Id::OpRParen | Id::EofRParen)
                    && self.lexer.borrow_mut().maybe_unread_one()
                {
                    if self.token_type == Id::EofRParen {
                        self.push_hint(Id::OpRParen, Id::EofRParen);
                    }
                    self.next(mode);
                }
                break;
            }

            self.next(mode);
        }
        Ok(w)
    }

    fn read_arith_word_once(&mut self) -> Result<Option<Word>, ParseException> {
        self.peek()?;
        match self.token_kind {
            Kind::Unknown => self.error("Unexpected token in arithmetic context"),
            Kind::Eof => Ok(Some(Word::Operator(self.cur_token.clone()))),
            Kind::Ignored => {
                self.next(LexMode::Arith);
                Ok(None)
            }
            Kind::Arith | Kind::Right => {
                self.next(LexMode::Arith);
                Ok(Some(Word::Operator(self.cur_token.clone())))
            }
            Kind::Lit | Kind::Left | Kind::VSub => Ok(Some(Word::Compound(self.read_compound_word(LexMode::Arith)?))),
            _ => self.error("Unexpected token in arithmetic context"),
        }
    }

    fn read_word_once(&mut self, mode: LexMode) -> Result<Option<Word>, ParseException> {
        self.peek()?;
        match self.token_kind {
            Kind::Eof => Ok(Some(Word::Operator(self.cur_token.clone()))),
            Kind::Op | Kind::Redir | Kind::Arith => {
                self.next(mode);
                if self.token_type == Id::OpNewline && self.cursor_was_newline {
                    return Ok(None);
                }
                Ok(Some(Word::Operator(self.cur_token.clone())))
            }
            Kind::Right => {
                if !matches!(
                    self.token_type,
                    Id::RightSubshell | Id::RightShFunction | Id::RightCasePat | Id::RightShArrayLiteral
                ) {
                    return self.error("Unexpected token");
                }
                self.next(mode);
                Ok(Some(Word::Operator(self.cur_token.clone())))
            }
            Kind::Ignored | Kind::WS => {
                self.next(mode);
                Ok(None)
            }
            Kind::VSub
            | Kind::Lit
            | Kind::Left
            | Kind::KW
            | Kind::ControlFlow
            | Kind::BoolUnary
            | Kind::BoolBinary
            | Kind::ExtGlob
            | Kind::BashRegex => {
                if self.token_type == Id::LitPound {
                    // A comment runs to the end of the line.
                    self.next(LexMode::Comment);
                    self.peek()?;
                    return Ok(None);
                }
                Ok(Some(Word::Compound(self.read_compound_word(mode)?)))
            }
            _ => self.error(format!("Unexpected token {:?}", self.cur_token.val)),
        }
    }

    pub fn read_arith_word(&mut self) -> Result<Word, ParseException> {
        loop {
            if let Some(w) = self.read_arith_word_once()? {
                return Ok(w);
            }
        }
    }

    /// Id of the next token, skipping one space. For `f ()` and `a= (`.
    pub fn look_past_space(&self) -> Id {
        if self.cur_token.id == Id::WSSpace {
            self.lexer.borrow().look_past_space(LexMode::ShCommand)
        } else {
            self.cur_token.id
        }
    }

    pub fn look_ahead_func_parens(&self) -> bool {
        match self.cur_token.id {
            Id::OpLParen => self.lexer.borrow().look_ahead_func_parens(1),
            Id::WSSpace => self.lexer.borrow().look_ahead_func_parens(0),
            _ => false,
        }
    }

    /// Here-docs are like double quotes, except `"` isn't special.
    pub fn read_here_doc_body(&mut self, parts: &mut Vec<WordPart>) -> Result<(), ParseException> {
        self.read_like_dq(None, parts)?;
        for part in parts.iter_mut() {
            // \" keeps its backslash outside of real double quotes
            if let WordPart::EscapedLiteral { token, ch } = part {
                if ch == "\"" {
                    *part = WordPart::Literal(token.clone());
                }
            }
        }
        Ok(())
    }

    /// Parse a prompt string like `$PS4` as if it were double-quoted.
    pub fn read_for_plugin(&mut self) -> Result<CompoundWord, ParseException> {
        let mut parts = Vec::new();
        self.read_like_dq(None, &mut parts)?;
        Ok(CompoundWord::new(parts))
    }
}

impl WordEmitter for WordParser {
    fn read_word(&mut self, mode: LexMode) -> Result<Word, ParseException> {
        let w = loop {
            let w = if mode == LexMode::Arith {
                self.read_arith_word_once()?
            } else {
                self.read_word_once(mode)?
            };
            if let Some(w) = w {
                break w;
            }
        };
        // Runs of newlines collapse into one token.
        self.cursor_was_newline = w.operator_id() == Some(Id::OpNewline);
        Ok(w)
    }
}

/// Decode one `$'...'` escape token.
pub fn decode_char_token(tok: &Token) -> String {
    let val = tok.val.as_str();
    let from_radix = |digits: &str, radix: u32| -> String {
        u32::from_str_radix(digits, radix)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    };
    match tok.id {
        Id::CharOneChar => {
            let c = match val.as_bytes().get(1).copied().unwrap_or(b'\\') {
                b'0' => '\0',
                b'a' => '\x07',
                b'b' => '\x08',
                b'e' | b'E' => '\x1b',
                b'f' => '\x0c',
                b'n' => '\n',
                b'r' => '\r',
                b't' => '\t',
                b'v' => '\x0b',
                other => other as char,
            };
            c.to_string()
        }
        // `\xHH` and `\NNN` are single bytes; `\u` and `\U` are characters.
        Id::CharHex => u8::from_str_radix(&val[2..], 16).map(|b| raw_char(b).to_string()).unwrap_or_default(),
        Id::CharUnicode4 | Id::CharUnicode8 => from_radix(&val[2..], 16),
        Id::CharOctal3 => u32::from_str_radix(&val[1..], 8)
            .map(|n| raw_char((n & 0xff) as u8).to_string())
            .unwrap_or_default(),
        _ => val.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::arena::Arena;
    use crate::parser::types::ParseOptions;

    fn parser(src: &str) -> WordParser {
        let arena = Arena::new("-c");
        let ctx = ParseContext::new(Rc::clone(&arena), ParseOptions::default());
        let lexer = Rc::new(RefCell::new(Lexer::new(Box::new(StringLineReader::new(src, arena)))));
        WordParser::new(ctx, lexer)
    }

    fn compound(src: &str) -> CompoundWord {
        match parser(src).read_word(LexMode::ShCommand).unwrap() {
            Word::Compound(w) => w,
            other => panic!("expected compound word, got {:?}", other),
        }
    }

    #[test]
    fn test_words_and_operators() {
        let mut p = parser("echo a|b\n");
        let mut ids = Vec::new();
        loop {
            let w = p.read_word(LexMode::ShCommand).unwrap();
            let done = w.operator_id() == Some(Id::EofReal);
            ids.push(w.operator_id());
            if done {
                break;
            }
        }
        assert_eq!(
            ids,
            vec![None, None, Some(Id::OpPipe), None, Some(Id::OpNewline), Some(Id::EofReal)]
        );
    }

    #[test]
    fn test_quoting_recorded_per_part() {
        let w = compound("a'b c'\"$x\"\\d");
        assert_eq!(w.parts.len(), 4);
        assert!(matches!(&w.parts[1], WordPart::SingleQuoted(sq) if sq.value == "b c"));
        assert!(matches!(&w.parts[2], WordPart::DoubleQuoted(dq) if dq.parts.len() == 1));
        assert!(matches!(&w.parts[3], WordPart::EscapedLiteral { ch, .. } if ch == "d"));
    }

    #[test]
    fn test_dollar_single_quote() {
        let w = compound("$'a\\tb\\x41\\''");
        assert!(matches!(&w.parts[0], WordPart::SingleQuoted(sq) if sq.value == "a\tbA'"));
    }

    #[test]
    fn test_dollar_single_quote_bytes() {
        use crate::process::raw_bytes::encode;
        let w = compound("$'\\xff\\377\\u00ff'");
        let WordPart::SingleQuoted(sq) = &w.parts[0] else { panic!() };
        assert_eq!(&*encode(&sq.value), b"\xff\xff\xc3\xbf");
    }

    #[test]
    fn test_length_vs_pound_var() {
        let w = compound("${#x}");
        let WordPart::BracedVarSub(b) = &w.parts[0] else { panic!() };
        assert_eq!(b.var_name, "x");
        assert!(b.prefix_op.is_some());

        let w = compound("${#}");
        let WordPart::BracedVarSub(b) = &w.parts[0] else { panic!() };
        assert_eq!(b.var_name, "#");
        assert!(b.prefix_op.is_none());
    }

    #[test]
    fn test_var_ops() {
        let w = compound("${x:-default}");
        let WordPart::BracedVarSub(b) = &w.parts[0] else { panic!() };
        assert!(matches!(&b.suffix_op, Some(SuffixOp::Unary { op, .. }) if op.id == Id::VTestColonHyphen));

        let w = compound("${path//\\//:}");
        let WordPart::BracedVarSub(b) = &w.parts[0] else { panic!() };
        assert!(matches!(&b.suffix_op, Some(SuffixOp::PatSub(p)) if p.mode == PatSubMode::All));

        let w = compound("${s:1:2}");
        let WordPart::BracedVarSub(b) = &w.parts[0] else { panic!() };
        assert!(matches!(&b.suffix_op, Some(SuffixOp::Slice { begin: Some(_), length: Some(_) })));

        let w = compound("${a[@]}");
        let WordPart::BracedVarSub(b) = &w.parts[0] else { panic!() };
        assert_eq!(b.bracket_op, Some(BracketOp::WholeArray(Id::LitAt)));
    }

    #[test]
    fn test_command_sub_nested() {
        let w = compound("$(echo $(echo hi))x");
        assert_eq!(w.parts.len(), 2);
        assert!(matches!(&w.parts[0], WordPart::CommandSub(_)));
    }

    #[test]
    fn test_unterminated_quote_points_at_open() {
        let mut p = parser("echo \"abc\n");
        p.read_word(LexMode::ShCommand).unwrap();
        let err = p.read_word(LexMode::ShCommand).unwrap_err();
        assert_eq!(err.column, 6);
        assert!(err.message.contains("double-quoted"));
    }

    #[test]
    fn test_array_literal() {
        let w = compound("a=(1 2 3)");
        assert!(matches!(&w.parts[1], WordPart::ArrayLiteral(a) if a.items.len() == 3));

        let w = compound("A=([k]=v [j]=w)");
        assert!(matches!(&w.parts[1], WordPart::ArrayLiteral(a) if matches!(a.items[0], ArrayItem::Pair { .. })));
    }

    #[test]
    fn test_comment_skipped() {
        let mut p = parser("# hi\nx\n");
        assert_eq!(p.read_word(LexMode::ShCommand).unwrap().operator_id(), Some(Id::OpNewline));
        assert!(p.read_word(LexMode::ShCommand).unwrap().operator_id().is_none());
    }

    #[test]
    fn test_backticks() {
        let w = compound("`echo \\`echo hi\\``");
        assert!(matches!(&w.parts[0], WordPart::CommandSub(cs) if cs.left.id == Id::LeftBacktick));
    }
}
