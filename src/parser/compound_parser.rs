//! Compound Command Parser
//!
//! Handles parsing of compound commands: if, for, while, until, case,
//! subshell, brace group, `[[`, `((`, `time` and function definitions.

use std::rc::Rc;

use crate::ast::types::{
    BraceGroup, Case, CaseArm, CaseTerminator, Command, CompoundWord, DBracket, DParen, ForEach,
    ForExpr, If, IfArm, Redirected, ShFunction, Subshell, TimeBlock, WhileUntil, Word,
};
use crate::parser::arena::Token;
use crate::parser::braces::brace_detect;
use crate::parser::command_parser::{CommandParser, ParseResult};
use crate::parser::conditional_parser::BoolParser;
use crate::parser::id_kind::{Id, Kind};
use crate::parser::word_helpers::{as_func_name, is_valid_var_name, tilde_detect};

fn is_compound_start(id: Id) -> bool {
    matches!(
        id,
        Id::KWDLeftBracket
            | Id::OpDLeftParen
            | Id::OpLParen
            | Id::LitLBrace
            | Id::KWFor
            | Id::KWWhile
            | Id::KWUntil
            | Id::KWIf
            | Id::KWCase
            | Id::KWTime
    )
}

fn list_to_command(mut children: Vec<Command>) -> Command {
    if children.len() == 1 {
        return children.remove(0);
    }
    Command::CommandList(children)
}

impl CommandParser {
    /// A compound command plus any redirects written after it.
    pub(super) fn parse_compound_command(&mut self) -> ParseResult<Command> {
        self.peek()?;
        let node = match self.c_id {
            Id::LitLBrace => Command::BraceGroup(self.parse_brace_group()?),
            Id::OpLParen => self.parse_subshell()?,
            Id::KWFor => self.parse_for()?,
            Id::KWWhile | Id::KWUntil => self.parse_while_until()?,
            Id::KWIf => self.parse_if()?,
            Id::KWCase => self.parse_case()?,
            Id::KWDLeftBracket => self.parse_dbracket()?,
            Id::OpDLeftParen => self.parse_dparen()?,
            // redirects after `time cmd` belong to cmd
            Id::KWTime => return self.parse_time(),
            _ => return self.error("Expected a compound command"),
        };

        let redirects = self.parse_redirect_list()?;
        if redirects.is_empty() {
            return Ok(node);
        }
        Ok(Command::Redirected(Redirected {
            child: Box::new(node),
            redirects,
        }))
    }

    fn parse_brace_group(&mut self) -> ParseResult<BraceGroup> {
        let left = self.eat(Id::LitLBrace, "'{'")?;
        let children = self.parse_command_list()?;
        self.eat_closing(Id::LitRBrace, "}", &left)?;
        Ok(BraceGroup { left, children })
    }

    fn parse_subshell(&mut self) -> ParseResult<Command> {
        let left = self.cur_tok();
        self.w_parser.push_hint(Id::OpRParen, Id::RightSubshell);
        self.next();
        let children = self.parse_command_list()?;
        if children.is_empty() {
            return self.error("Empty subshell");
        }
        self.eat_closing(Id::RightSubshell, ")", &left)?;
        Ok(Command::Subshell(Subshell {
            left,
            child: Box::new(list_to_command(children)),
        }))
    }

    /// `do ... done`
    fn parse_do_group(&mut self) -> ParseResult<Command> {
        self.peek()?;
        if self.c_id != Id::KWDo {
            return self.error("Expected 'do'");
        }
        let do_tok = self.cur_tok();
        self.next();
        let children = self.parse_command_list()?;
        self.eat_closing(Id::KWDone, "done", &do_tok)?;
        Ok(Command::CommandList(children))
    }

    /// Loop bodies may also be brace groups.
    fn parse_loop_body(&mut self) -> ParseResult<Command> {
        self.peek()?;
        if self.c_id == Id::LitLBrace {
            return Ok(Command::BraceGroup(self.parse_brace_group()?));
        }
        self.parse_do_group()
    }

    fn parse_for_words(&mut self) -> ParseResult<Vec<CompoundWord>> {
        let mut words = Vec::new();
        loop {
            self.peek()?;
            match self.c_id {
                Id::OpSemi | Id::OpNewline => {
                    self.next();
                    return Ok(words);
                }
                _ if self.c_kind == Kind::Word => {
                    if let Word::Compound(w) = &self.cur_word {
                        words.push(tilde_detect(brace_detect(w.clone())));
                    }
                    self.next();
                }
                _ => return self.error("Unexpected word in for loop"),
            }
        }
    }

    fn parse_for(&mut self) -> ParseResult<Command> {
        let keyword = self.cur_tok();
        self.next();
        self.peek()?;
        if self.c_id == Id::OpDLeftParen {
            return self.parse_for_expr(keyword);
        }

        let Word::Compound(name_word) = self.cur_word.clone() else {
            return self.error("Expected loop variable");
        };
        let var_name = match name_word.static_text() {
            Some(name) if is_valid_var_name(&name) => name,
            _ => return self.error("Invalid loop variable name"),
        };
        self.next();
        self.newline_ok()?;

        let iterable = match self.c_id {
            Id::KWIn => {
                self.next();
                Some(self.parse_for_words()?)
            }
            Id::OpSemi => {
                self.next();
                None
            }
            Id::KWDo | Id::LitLBrace => None,
            _ => return self.error("Expected 'in', ';' or 'do' after loop variable"),
        };
        self.newline_ok()?;
        let body = self.parse_loop_body()?;
        Ok(Command::ForEach(ForEach {
            keyword,
            var_name,
            iterable,
            body: Box::new(body),
        }))
    }

    /// `for (( init; cond; update ))`
    fn parse_for_expr(&mut self, keyword: Token) -> ParseResult<Command> {
        let (init, cond, update) = self.w_parser.read_for_expression()?;
        self.next();
        self.peek()?;
        match self.c_id {
            Id::OpSemi => {
                self.next();
                self.newline_ok()?;
            }
            Id::OpNewline => {
                self.next();
                self.peek()?;
            }
            Id::KWDo | Id::LitLBrace => {}
            _ => return self.error("Invalid word after for expression"),
        }
        let body = self.parse_loop_body()?;
        Ok(Command::ForExpr(ForExpr {
            keyword,
            init,
            cond,
            update,
            body: Box::new(body),
        }))
    }

    fn parse_while_until(&mut self) -> ParseResult<Command> {
        let keyword = self.cur_tok();
        self.next();
        let cond = self.parse_command_list()?;
        let body = self.parse_do_group()?;
        Ok(Command::WhileUntil(WhileUntil {
            keyword,
            cond,
            body: Box::new(body),
        }))
    }

    fn parse_if(&mut self) -> ParseResult<Command> {
        let if_tok = self.cur_tok();
        let mut keyword = if_tok.clone();
        let mut arms = Vec::new();
        loop {
            self.next();
            let cond = self.parse_command_list()?;
            self.eat_closing(Id::KWThen, "then", &keyword)?;
            let action = self.parse_command_list()?;
            arms.push(IfArm { keyword, cond, action });
            self.peek()?;
            if self.c_id != Id::KWElif {
                break;
            }
            keyword = self.cur_tok();
        }

        let else_action = if self.c_id == Id::KWElse {
            self.next();
            Some(self.parse_command_list()?)
        } else {
            None
        };
        self.eat_closing(Id::KWFi, "fi", &if_tok)?;
        Ok(Command::If(If { arms, else_action }))
    }

    fn parse_case_arm(&mut self) -> ParseResult<CaseArm> {
        self.w_parser.push_hint(Id::OpRParen, Id::RightCasePat);
        let left = self.cur_tok();
        if self.c_id == Id::OpLParen {
            self.next();
            self.peek()?;
        }

        let mut patterns = Vec::new();
        loop {
            let Word::Compound(w) = self.cur_word.clone() else {
                return self.error("Expected case pattern");
            };
            patterns.push(tilde_detect(w));
            self.next();
            self.peek()?;
            if self.c_id != Id::OpPipe {
                break;
            }
            self.next();
            self.peek()?;
        }
        if self.c_id != Id::RightCasePat {
            return self.error("Expected ) after case pattern");
        }
        self.next();
        self.newline_ok()?;

        let action = if matches!(
            self.c_id,
            Id::OpDSemi | Id::OpSemiAmp | Id::OpDSemiAmp | Id::KWEsac
        ) {
            Vec::new()
        } else {
            self.parse_command_term()?
        };

        self.peek()?;
        let terminator = match self.c_id {
            Id::KWEsac => CaseTerminator::Break,
            Id::OpDSemi => CaseTerminator::Break,
            Id::OpSemiAmp => CaseTerminator::FallThrough,
            Id::OpDSemiAmp => CaseTerminator::TestNext,
            _ => return self.error("Expected ;; or esac"),
        };
        if self.c_id != Id::KWEsac {
            self.next();
        }
        self.newline_ok()?;
        Ok(CaseArm {
            left,
            patterns,
            action,
            terminator,
        })
    }

    fn parse_case(&mut self) -> ParseResult<Command> {
        let keyword = self.cur_tok();
        self.next();
        self.peek()?;
        let Word::Compound(to_match) = self.cur_word.clone() else {
            return self.error("Expected a word to match");
        };
        self.next();
        self.newline_ok()?;
        if self.c_id != Id::KWIn {
            return self.error("Expected 'in' after case word");
        }
        self.next();
        self.newline_ok()?;

        let mut arms = Vec::new();
        loop {
            self.peek()?;
            if self.c_id == Id::KWEsac || self.c_kind == Kind::Eof {
                break;
            }
            arms.push(self.parse_case_arm()?);
        }
        self.eat_closing(Id::KWEsac, "esac", &keyword)?;
        Ok(Command::Case(Case {
            keyword,
            to_match: tilde_detect(to_match),
            arms,
        }))
    }

    fn parse_dbracket(&mut self) -> ParseResult<Command> {
        let left = self.cur_tok();
        self.next();
        let expr = BoolParser::new(&mut self.w_parser).parse()?;
        Ok(Command::DBracket(DBracket { left, expr }))
    }

    fn parse_dparen(&mut self) -> ParseResult<Command> {
        let left = self.cur_tok();
        self.next();
        let child = self.w_parser.read_dparen()?;
        Ok(Command::DParen(DParen { left, child }))
    }

    fn parse_time(&mut self) -> ParseResult<Command> {
        let keyword = self.cur_tok();
        self.next();
        self.peek()?;
        let pipeline = if self.c_kind == Kind::Eof
            || matches!(self.c_id, Id::OpNewline | Id::OpSemi | Id::OpAmp)
        {
            Command::NoOp
        } else {
            self.parse_pipeline()?
        };
        Ok(Command::TimeBlock(TimeBlock {
            keyword,
            pipeline: Box::new(pipeline),
        }))
    }

    fn parse_function_body(&mut self, name_tok: Token, name: String) -> ParseResult<Command> {
        self.newline_ok()?;
        if !is_compound_start(self.c_id) || self.c_id == Id::KWTime {
            return self.error(format!("Expected a compound command as the body of {:?}", name));
        }
        let body = self.parse_compound_command()?;
        Ok(Command::ShFunction(ShFunction {
            name_tok,
            name,
            body: Rc::new(body),
        }))
    }

    fn eat_func_parens(&mut self) -> ParseResult<()> {
        self.peek()?;
        if self.c_id != Id::OpLParen {
            return self.error("Expected ( after function name");
        }
        self.w_parser.push_hint(Id::OpRParen, Id::RightShFunction);
        self.next();
        self.peek()?;
        if self.c_id != Id::RightShFunction {
            return self.error("Expected ) in function definition");
        }
        self.next();
        Ok(())
    }

    /// `name() body`
    pub(super) fn parse_function_def(&mut self) -> ParseResult<Command> {
        let name_tok = self.cur_tok();
        let name = match &self.cur_word {
            Word::Compound(w) => as_func_name(w),
            Word::Operator(_) => None,
        };
        let Some(name) = name else {
            return self.error("Invalid function name");
        };
        self.next();
        self.eat_func_parens()?;
        self.parse_function_body(name_tok, name)
    }

    /// `function name body` or `function name() body`
    pub(super) fn parse_ksh_function_def(&mut self) -> ParseResult<Command> {
        self.next();
        self.peek()?;
        let name_tok = self.cur_tok();
        let name = match &self.cur_word {
            Word::Compound(w) => as_func_name(w),
            Word::Operator(_) => None,
        };
        let Some(name) = name else {
            return self.error("Invalid function name");
        };
        self.next();
        self.peek()?;
        if self.c_id == Id::OpLParen {
            self.eat_func_parens()?;
        }
        self.parse_function_body(name_tok, name)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::ast::types::{ArithExpr, BoolExpr};
    use crate::parser::arena::Arena;
    use crate::parser::lexer::Lexer;
    use crate::parser::reader::StringLineReader;
    use crate::parser::types::{ParseContext, ParseException, ParseOptions};

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

    #[test]
    fn test_if_elif_else() {
        let Command::If(node) = parse("if a; then b; elif c\nthen d; else e; fi") else {
            panic!("expected if");
        };
        assert_eq!(node.arms.len(), 2);
        assert_eq!(node.arms[1].keyword.val, "elif");
        assert_eq!(node.else_action.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_missing_fi_names_opening_keyword() {
        let e = parse_err("if true; then\n  echo x\n");
        assert!(e.message.contains("'fi'"), "{}", e.message);
        assert!(e.message.contains("'if' at line 1"), "{}", e.message);
    }

    #[test]
    fn test_for_each() {
        let Command::ForEach(f) = parse("for x in a {b,c}; do echo $x; done") else {
            panic!("expected for");
        };
        assert_eq!(f.var_name, "x");
        assert_eq!(f.iterable.as_ref().map(Vec::len), Some(2));

        let Command::ForEach(f) = parse("for x\ndo :; done") else {
            panic!("expected for");
        };
        assert!(f.iterable.is_none());
        assert!(parse_err("for 1x in a; do :; done").message.contains("variable"));
    }

    #[test]
    fn test_for_expr() {
        let Command::ForExpr(f) = parse("for ((i=0; i<3; i++)); do echo $i; done") else {
            panic!("expected for expr");
        };
        assert!(f.init.is_some() && f.cond.is_some() && f.update.is_some());

        let Command::ForExpr(f) = parse("for ((;;)) { break; }") else {
            panic!("expected for expr");
        };
        assert!(f.init.is_none() && f.cond.is_none());
    }

    #[test]
    fn test_while_until() {
        let Command::WhileUntil(w) = parse("while false; do :; done") else {
            panic!("expected while");
        };
        assert_eq!(w.keyword.id, Id::KWWhile);
        let Command::WhileUntil(u) = parse("until true\ndo\n:\ndone") else {
            panic!("expected until");
        };
        assert_eq!(u.keyword.id, Id::KWUntil);
    }

    #[test]
    fn test_case_terminators() {
        let src = "case $x in\n  a|b) echo ab ;;\n  (c) echo c ;&\n  d) echo d ;;&\n  *) ;;\nesac";
        let Command::Case(c) = parse(src) else {
            panic!("expected case");
        };
        assert_eq!(c.arms.len(), 4);
        assert_eq!(c.arms[0].patterns.len(), 2);
        assert_eq!(c.arms[1].terminator, CaseTerminator::FallThrough);
        assert_eq!(c.arms[2].terminator, CaseTerminator::TestNext);
        assert!(c.arms[3].action.is_empty());

        let Command::Case(c) = parse("case x in x) echo last\nesac") else {
            panic!("expected case");
        };
        assert_eq!(c.arms[0].terminator, CaseTerminator::Break);
    }

    #[test]
    fn test_case_inside_subshell() {
        let Command::Subshell(s) = parse("(case x in x) echo y;; esac)") else {
            panic!("expected subshell");
        };
        assert!(matches!(s.child.as_ref(), Command::Case(_)));
    }

    #[test]
    fn test_brace_group_and_redirect() {
        let Command::Redirected(r) = parse("{ echo a; echo b; } > out") else {
            panic!("expected redirected");
        };
        assert_eq!(r.redirects.len(), 1);
        assert!(matches!(r.child.as_ref(), Command::BraceGroup(b) if b.children.len() == 2));
        assert!(parse_err("{ echo a }").message.contains("'}'"));
    }

    #[test]
    fn test_function_defs() {
        let Command::ShFunction(f) = parse("f() { echo hi; }") else {
            panic!("expected function");
        };
        assert_eq!(f.name, "f");
        let Command::ShFunction(f) = parse("function g {\n:\n}") else {
            panic!("expected function");
        };
        assert_eq!(f.name, "g");
        let Command::ShFunction(f) = parse("function h () ( exit 1 )") else {
            panic!("expected function");
        };
        assert!(matches!(f.body.as_ref(), Command::Subshell(_)));
        assert!(parse_err("f() echo").message.contains("compound command"));
    }

    #[test]
    fn test_dbracket_and_dparen() {
        let Command::DBracket(d) = parse("[[ -n $x && $y == a* ]]") else {
            panic!("expected dbracket");
        };
        assert!(matches!(d.expr, BoolExpr::LogicalAnd(_, _)));
        let Command::DParen(d) = parse("(( x = 1 + 2 ))") else {
            panic!("expected dparen");
        };
        assert!(matches!(d.child, ArithExpr::BinaryAssign { .. }));
    }

    #[test]
    fn test_time_pipeline() {
        let Command::TimeBlock(t) = parse("time a | b") else {
            panic!("expected time");
        };
        assert!(matches!(t.pipeline.as_ref(), Command::Pipeline(p) if p.children.len() == 2));
    }

    #[test]
    fn test_nested_command_sub_with_case() {
        let Command::Simple(s) = parse("echo $(case a in a) echo x;; esac)") else {
            panic!("expected simple command");
        };
        assert_eq!(s.words.len(), 2);
    }
}
