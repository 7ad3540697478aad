//! Conditional Expression Parser
//!
//! Handles parsing of `[[ ... ]]` and the argv of the `test` / `[` builtins.
//!
//! Grammar:
//!   expr   : term ( ( '||' | '-o' ) expr )?
//!   term   : negated ( ( '&&' | '-a' ) term )?
//!   negated: '!'? factor
//!   factor : WORD | UNARY_OP WORD | WORD BINARY_OP WORD | '(' expr ')'

use crate::ast::types::{bool_id, BoolExpr, CompoundWord, SingleQuoted, Word, WordPart};
use crate::parser::arena::Token;
use crate::parser::id_kind::{binary_test_op, unary_test_op, Id, Kind};
use crate::parser::lexer_def::LexMode;
use crate::parser::types::ParseException;
use crate::parser::word_parser::WordEmitter;

pub struct BoolParser<'a, E: WordEmitter> {
    w_parser: &'a mut E,
    /// Lookahead buffer, at most two words.
    words: Vec<Word>,
    cur_word: Word,
    op_id: Id,
    b_kind: Kind,
    /// `test` accepts operator-looking strings like `(` as operands.
    lenient_operands: bool,
}

fn word_error(msg: impl Into<String>, w: &Word) -> ParseException {
    match w {
        Word::Operator(tok) => ParseException::at(msg, tok),
        Word::Compound(cw) => match cw.first_token() {
            Some(tok) => ParseException::at(msg, tok),
            None => ParseException::new(msg, 0, 0),
        },
    }
}

impl<'a, E: WordEmitter> BoolParser<'a, E> {
    pub fn new(w_parser: &'a mut E) -> Self {
        Self {
            w_parser,
            words: Vec::with_capacity(2),
            cur_word: Word::Operator(Token::synthetic(Id::UndefinedTok, "")),
            op_id: Id::UndefinedTok,
            b_kind: Kind::Undefined,
            lenient_operands: false,
        }
    }

    fn set_cur(&mut self, w: Word) {
        self.op_id = bool_id(&w);
        self.b_kind = self.op_id.kind();
        self.cur_word = w;
    }

    fn next_one(&mut self, mode: LexMode) -> Result<(), ParseException> {
        if self.words.len() == 2 {
            self.words.remove(0);
        } else {
            let w = self.w_parser.read_word(mode)?;
            self.words.clear();
            self.words.push(w);
        }
        let w = self.words[0].clone();
        self.set_cur(w);
        Ok(())
    }

    /// Advance, skipping newlines.
    fn next(&mut self, mode: LexMode) -> Result<(), ParseException> {
        loop {
            self.next_one(mode)?;
            if self.op_id != Id::OpNewline {
                return Ok(());
            }
        }
    }

    fn look_ahead(&mut self) -> Result<Word, ParseException> {
        loop {
            let w = self.w_parser.read_word(LexMode::DBracket)?;
            if w.operator_id() != Some(Id::OpNewline) {
                self.words.push(w.clone());
                return Ok(w);
            }
        }
    }

    /// Parse `[[ ... ]]` after the opening `[[`.
    pub fn parse(&mut self) -> Result<BoolExpr, ParseException> {
        self.next(LexMode::DBracket)?;
        let node = self.parse_expr()?;
        if self.op_id != Id::LitDRightBracket {
            return Err(word_error("Expected ]]", &self.cur_word));
        }
        Ok(node)
    }

    /// Parse a whole argv for `test`, after the special cases are ruled out.
    pub fn parse_for_builtin(&mut self) -> Result<BoolExpr, ParseException> {
        self.lenient_operands = true;
        self.next(LexMode::DBracket)?;
        let node = self.parse_expr()?;
        if self.op_id != Id::EofReal {
            return Err(word_error("Unexpected trailing word", &self.cur_word));
        }
        Ok(node)
    }

    fn parse_expr(&mut self) -> Result<BoolExpr, ParseException> {
        let left = self.parse_term()?;
        if matches!(self.op_id, Id::OpDPipe | Id::BoolUnaryO) {
            self.next(LexMode::DBracket)?;
            let right = self.parse_expr()?;
            return Ok(BoolExpr::LogicalOr(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<BoolExpr, ParseException> {
        let left = self.parse_negated_factor()?;
        if matches!(self.op_id, Id::OpDAmp | Id::BoolUnaryA) {
            self.next(LexMode::DBracket)?;
            let right = self.parse_term()?;
            return Ok(BoolExpr::LogicalAnd(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_negated_factor(&mut self) -> Result<BoolExpr, ParseException> {
        if self.op_id == Id::KWBang {
            self.next(LexMode::DBracket)?;
            let child = self.parse_factor()?;
            return Ok(BoolExpr::LogicalNot(Box::new(child)));
        }
        self.parse_factor()
    }

    fn operand(&self, w: &Word) -> Result<CompoundWord, ParseException> {
        match w {
            Word::Compound(cw) => Ok(cw.clone()),
            Word::Operator(tok) if self.lenient_operands && tok.id.kind() != Kind::Eof => {
                Ok(quoted_operand(&tok.val))
            }
            _ => Err(word_error("Invalid argument to operator", w)),
        }
    }

    fn parse_factor(&mut self) -> Result<BoolExpr, ParseException> {
        if self.b_kind == Kind::BoolUnary {
            let op = self.op_id;
            self.next(LexMode::DBracket)?;
            let child = self.operand(&self.cur_word)?;
            self.next(LexMode::DBracket)?;
            return Ok(BoolExpr::Unary { op, child });
        }

        if self.b_kind == Kind::Word {
            let t2 = self.look_ahead()?;
            let t2_id = bool_id(&t2);
            if t2_id.kind() == Kind::BoolBinary || matches!(t2_id, Id::OpLess | Id::OpGreat) {
                let left = self.operand(&self.cur_word)?;
                self.next(LexMode::DBracket)?;
                let op = self.op_id;
                if op == Id::BoolBinaryEqualTilde {
                    self.next(LexMode::BashRegex)?;
                } else {
                    self.next(LexMode::DBracket)?;
                }
                let right = self.operand(&self.cur_word)?;
                self.next(LexMode::DBracket)?;
                return Ok(BoolExpr::Binary { op, left, right });
            }
            let w = self.operand(&self.cur_word)?;
            self.next(LexMode::DBracket)?;
            return Ok(BoolExpr::WordTest(w));
        }

        if self.op_id == Id::OpLParen {
            self.next(LexMode::DBracket)?;
            let node = self.parse_expr()?;
            if self.op_id != Id::OpRParen {
                return Err(word_error("Expected )", &self.cur_word));
            }
            self.next(LexMode::DBracket)?;
            return Ok(node);
        }

        Err(word_error("Unexpected token in boolean expression", &self.cur_word))
    }
}

/// A `test` operand. Quoting keeps `*` from being read as a pattern.
fn quoted_operand(s: &str) -> CompoundWord {
    CompoundWord::new(vec![WordPart::SingleQuoted(SingleQuoted {
        left: Token::synthetic(Id::LeftSingleQuote, "'"),
        value: s.to_string(),
    })])
}

/// Feeds the argv of `test` to the boolean parser as words.
pub struct StringWordEmitter<'s> {
    argv: &'s [String],
    i: usize,
}

impl<'s> StringWordEmitter<'s> {
    pub fn new(argv: &'s [String]) -> Self {
        Self { argv, i: 0 }
    }
}

impl WordEmitter for StringWordEmitter<'_> {
    fn read_word(&mut self, _mode: LexMode) -> Result<Word, ParseException> {
        let Some(s) = self.argv.get(self.i) else {
            return Ok(Word::Operator(Token::synthetic(Id::EofReal, "")));
        };
        self.i += 1;
        Ok(string_word(s))
    }
}

fn string_word(s: &str) -> Word {
    match s {
        "(" => return Word::Operator(Token::synthetic(Id::OpLParen, s)),
        ")" => return Word::Operator(Token::synthetic(Id::OpRParen, s)),
        "<" => return Word::Operator(Token::synthetic(Id::OpLess, s)),
        ">" => return Word::Operator(Token::synthetic(Id::OpGreat, s)),
        "!" => return Word::Compound(CompoundWord::from_token(Token::synthetic(Id::KWBang, s))),
        _ => {}
    }
    match unary_test_op(s).or_else(|| binary_test_op(s)) {
        Some(id) => Word::Compound(CompoundWord::from_token(Token::synthetic(id, s))),
        None => Word::Compound(quoted_operand(s)),
    }
}

fn test_operand(s: &str) -> CompoundWord {
    quoted_operand(s)
}

fn two_args(a: &[String]) -> Result<BoolExpr, ParseException> {
    if a[0] == "!" {
        return Ok(BoolExpr::LogicalNot(Box::new(BoolExpr::WordTest(test_operand(&a[1])))));
    }
    match unary_test_op(&a[0]) {
        Some(op) => Ok(BoolExpr::Unary {
            op,
            child: test_operand(&a[1]),
        }),
        None => Err(ParseException::new(format!("{}: unary operator expected", a[0]), 0, 0)),
    }
}

fn three_args(a: &[String]) -> Result<BoolExpr, ParseException> {
    if let Some(op) = binary_test_op(&a[1]) {
        return Ok(BoolExpr::Binary {
            op,
            left: test_operand(&a[0]),
            right: test_operand(&a[2]),
        });
    }
    let lhs = || Box::new(BoolExpr::WordTest(test_operand(&a[0])));
    let rhs = || Box::new(BoolExpr::WordTest(test_operand(&a[2])));
    match a[1].as_str() {
        "-a" => return Ok(BoolExpr::LogicalAnd(lhs(), rhs())),
        "-o" => return Ok(BoolExpr::LogicalOr(lhs(), rhs())),
        _ => {}
    }
    if a[0] == "!" {
        return Ok(BoolExpr::LogicalNot(Box::new(two_args(&a[1..])?)));
    }
    if a[0] == "(" && a[2] == ")" {
        return Ok(BoolExpr::WordTest(test_operand(&a[1])));
    }
    Err(ParseException::new(format!("{}: binary operator expected", a[1]), 0, 0))
}

/// Parse `test` arguments. `None` means no arguments, which is false.
///
/// Up to four arguments are decided by count first, the way POSIX
/// describes, so `test -n` and `test ! =` mean what they do in other shells.
pub fn parse_test_args(argv: &[String]) -> Result<Option<BoolExpr>, ParseException> {
    let expr = match argv.len() {
        0 => return Ok(None),
        1 => BoolExpr::WordTest(test_operand(&argv[0])),
        2 => two_args(argv)?,
        3 => three_args(argv)?,
        4 if argv[0] == "!" => BoolExpr::LogicalNot(Box::new(three_args(&argv[1..])?)),
        4 if argv[0] == "(" && argv[3] == ")" => two_args(&argv[1..3])?,
        _ => {
            let mut emitter = StringWordEmitter::new(argv);
            BoolParser::new(&mut emitter).parse_for_builtin()?
        }
    };
    Ok(Some(expr))
}
