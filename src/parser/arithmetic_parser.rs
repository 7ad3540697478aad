//! Arithmetic Expression Parser
//!
//! Top-down operator precedence (Pratt) parsing over arithmetic words:
//! - $((1 + 2))
//! - $((x++))
//! - $((a ? b : c))
//! - $((a[i] += 2))
//!
//! Operands are compound words read in the `Arith` lexer mode, so `$x`,
//! `${a[0]}` and `16#ff` all arrive here already split into parts.

use crate::ast::types::{ArithExpr, CompoundWord, IncDec, Word, WordPart};
use crate::parser::arena::Token;
use crate::parser::id_kind::{Id, Kind};
use crate::parser::types::ParseException;
use crate::parser::word_parser::WordParser;

type NudFn = fn(&mut TdopParser<'_>, Token, i32) -> Result<ArithExpr, ParseException>;
type LedFn = fn(&mut TdopParser<'_>, Token, ArithExpr, i32) -> Result<ArithExpr, ParseException>;

struct NullInfo {
    nud: NudFn,
    bp: i32,
}

struct LeftInfo {
    led: LedFn,
    lbp: i32,
    rbp: i32,
}

fn left_assoc(led: LedFn, bp: i32) -> Option<LeftInfo> {
    Some(LeftInfo { led, lbp: bp, rbp: bp })
}

fn right_assoc(led: LedFn, bp: i32) -> Option<LeftInfo> {
    Some(LeftInfo {
        led,
        lbp: bp,
        rbp: bp - 1,
    })
}

/// Prefix position. Operands are handled separately since they are words.
fn null_info(id: Id) -> Option<NullInfo> {
    use Id::*;
    let (nud, bp): (NudFn, i32) = match id {
        ArithLParen => (nud_group, 0),
        ArithDPlus | ArithDMinus => (nud_inc_dec, 31),
        ArithPlus | ArithMinus | ArithBang | ArithTilde => (nud_prefix_op, 31),
        _ => return None,
    };
    Some(NullInfo { nud, bp })
}

/// Infix and postfix position. Higher binds tighter.
fn left_info(id: Id) -> Option<LeftInfo> {
    use Id::*;
    match id {
        ArithDPlus | ArithDMinus => left_assoc(led_inc_dec, 33),
        ArithLBracket => left_assoc(led_index, 33),
        ArithDStar => right_assoc(led_binary, 29),
        ArithStar | ArithSlash | ArithPercent => left_assoc(led_binary, 27),
        ArithPlus | ArithMinus => left_assoc(led_binary, 25),
        ArithDLess | ArithDGreat => left_assoc(led_binary, 23),
        ArithLess | ArithGreat | ArithLessEqual | ArithGreatEqual => left_assoc(led_binary, 21),
        ArithDEqual | ArithNEqual => left_assoc(led_binary, 19),
        ArithAmp => left_assoc(led_binary, 15),
        ArithCaret => left_assoc(led_binary, 13),
        ArithPipe => left_assoc(led_binary, 11),
        ArithDAmp => left_assoc(led_binary, 9),
        ArithDPipe => left_assoc(led_binary, 7),
        ArithQMark => right_assoc(led_ternary, 5),
        ArithEqual | ArithPlusEqual | ArithMinusEqual | ArithStarEqual | ArithSlashEqual
        | ArithPercentEqual | ArithDGreatEqual | ArithDLessEqual | ArithAmpEqual
        | ArithPipeEqual | ArithCaretEqual => right_assoc(led_assign, 3),
        ArithComma => left_assoc(led_binary, 1),
        _ => None,
    }
}

fn nud_group(p: &mut TdopParser<'_>, _tok: Token, bp: i32) -> Result<ArithExpr, ParseException> {
    let e = p.parse_until(bp)?;
    p.eat(Id::ArithRParen)?;
    Ok(e)
}

fn nud_inc_dec(p: &mut TdopParser<'_>, tok: Token, bp: i32) -> Result<ArithExpr, ParseException> {
    let child = p.parse_until(bp)?;
    if !child.is_lvalue() {
        return Err(ParseException::at("This value can't be assigned to", &tok));
    }
    let op = if tok.id == Id::ArithDPlus {
        IncDec::PreIncr
    } else {
        IncDec::PreDecr
    };
    Ok(ArithExpr::UnaryAssign {
        op,
        child: Box::new(child),
    })
}

fn nud_prefix_op(p: &mut TdopParser<'_>, tok: Token, bp: i32) -> Result<ArithExpr, ParseException> {
    let child = p.parse_until(bp)?;
    Ok(ArithExpr::Unary {
        op: tok,
        child: Box::new(child),
    })
}

fn led_inc_dec(_p: &mut TdopParser<'_>, tok: Token, left: ArithExpr, _rbp: i32) -> Result<ArithExpr, ParseException> {
    if !left.is_lvalue() {
        return Err(ParseException::at("This value can't be assigned to", &tok));
    }
    let op = if tok.id == Id::ArithDPlus {
        IncDec::PostIncr
    } else {
        IncDec::PostDecr
    };
    Ok(ArithExpr::UnaryAssign {
        op,
        child: Box::new(left),
    })
}

fn led_index(p: &mut TdopParser<'_>, tok: Token, left: ArithExpr, _rbp: i32) -> Result<ArithExpr, ParseException> {
    if !matches!(left, ArithExpr::Var(_)) {
        return Err(ParseException::at("Only variables can be indexed", &tok));
    }
    let index = p.parse_until(0)?;
    p.eat(Id::ArithRBracket)?;
    Ok(ArithExpr::Index {
        base: Box::new(left),
        index: Box::new(index),
    })
}

fn led_binary(p: &mut TdopParser<'_>, tok: Token, left: ArithExpr, rbp: i32) -> Result<ArithExpr, ParseException> {
    let right = p.parse_until(rbp)?;
    Ok(ArithExpr::Binary {
        op: tok,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn led_ternary(p: &mut TdopParser<'_>, _tok: Token, left: ArithExpr, rbp: i32) -> Result<ArithExpr, ParseException> {
    let true_expr = p.parse_until(0)?;
    p.eat(Id::ArithColon)?;
    let false_expr = p.parse_until(rbp)?;
    Ok(ArithExpr::Ternary {
        cond: Box::new(left),
        true_expr: Box::new(true_expr),
        false_expr: Box::new(false_expr),
    })
}

fn led_assign(p: &mut TdopParser<'_>, tok: Token, left: ArithExpr, rbp: i32) -> Result<ArithExpr, ParseException> {
    if !left.is_lvalue() {
        return Err(ParseException::at("Left-hand side of this assignment is invalid", &tok));
    }
    let right = p.parse_until(rbp)?;
    Ok(ArithExpr::BinaryAssign {
        op: tok,
        left: Box::new(left),
        right: Box::new(right),
    })
}

/// An operand: a bare name is a variable, anything else needs evaluation.
fn word_operand(w: CompoundWord) -> ArithExpr {
    match w.parts.as_slice() {
        [WordPart::Literal(tok)] if tok.id == Id::LitArithVarLike => ArithExpr::Var(tok.clone()),
        _ => ArithExpr::Word(w),
    }
}

pub struct TdopParser<'a> {
    w_parser: &'a mut WordParser,
    cur_word: Word,
    op_id: Id,
}

impl<'a> TdopParser<'a> {
    pub fn new(w_parser: &'a mut WordParser) -> Self {
        Self {
            w_parser,
            cur_word: Word::Operator(Token::synthetic(Id::UndefinedTok, "")),
            op_id: Id::UndefinedTok,
        }
    }

    fn cur_token(&self) -> Token {
        match &self.cur_word {
            Word::Operator(tok) => tok.clone(),
            Word::Compound(w) => w
                .first_token()
                .cloned()
                .unwrap_or_else(|| self.w_parser.cur_token().clone()),
        }
    }

    fn next(&mut self) -> Result<(), ParseException> {
        self.cur_word = self.w_parser.read_arith_word()?;
        self.op_id = match &self.cur_word {
            Word::Operator(tok) => tok.id,
            Word::Compound(_) => Id::WordCompound,
        };
        Ok(())
    }

    fn eat(&mut self, id: Id) -> Result<(), ParseException> {
        if self.op_id != id {
            return Err(ParseException::at(
                format!("Expected {}, got {:?}", expected_text(id), self.cur_token().val),
                &self.cur_token(),
            ));
        }
        self.next()
    }

    pub fn parse_until(&mut self, rbp: i32) -> Result<ArithExpr, ParseException> {
        if self.op_id.kind() == Kind::Eof {
            return Err(ParseException::at("Unexpected end of input", &self.cur_token()));
        }

        let word = std::mem::replace(&mut self.cur_word, Word::Operator(Token::synthetic(Id::UndefinedTok, "")));
        let mut node = match word {
            Word::Compound(w) => {
                self.next()?;
                word_operand(w)
            }
            Word::Operator(tok) => {
                let Some(null) = null_info(tok.id) else {
                    return Err(ParseException::at(
                        format!("Unexpected token {:?} in arithmetic expression", tok.val),
                        &tok,
                    ));
                };
                self.next()?;
                (null.nud)(self, tok, null.bp)?
            }
        };

        loop {
            let Some(left) = left_info(self.op_id) else {
                break;
            };
            if rbp >= left.lbp {
                break;
            }
            let tok = self.cur_token();
            self.next()?;
            node = (left.led)(self, tok, node, left.rbp)?;
        }
        Ok(node)
    }

    /// Parse one full expression. `$(( ))` is an empty expression, which
    /// evaluates to 0.
    pub fn parse(&mut self) -> Result<ArithExpr, ParseException> {
        self.next()?;
        if matches!(self.op_id, Id::ArithRParen | Id::EofReal) {
            return Ok(ArithExpr::Word(CompoundWord::default()));
        }
        let node = self.parse_until(0)?;
        if let Word::Compound(_) = self.cur_word {
            return Err(ParseException::at("Unexpected word in arithmetic expression", &self.cur_token()));
        }
        Ok(node)
    }
}

fn expected_text(id: Id) -> &'static str {
    match id {
        Id::ArithRParen => "')'",
        Id::ArithRBracket => "']'",
        Id::ArithColon => "':'",
        _ => "token",
    }
}
