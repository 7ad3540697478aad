//! Abstract Syntax Tree (AST) Types for Shell Programs
//!
//! Nodes keep the tokens they were built from, so every error raised while
//! evaluating a node can point back at its source location.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::parser::arena::Token;
use crate::parser::id_kind::{Id, Kind};

// =============================================================================
// WORDS
// =============================================================================

/// What the word parser returns: an operator token or a compound word.
#[derive(Debug, Clone, PartialEq)]
pub enum Word {
    /// `|`, `;`, `)`, newline, end of input and friends.
    Operator(Token),
    Compound(CompoundWord),
}

impl Word {
    pub fn operator_id(&self) -> Option<Id> {
        match self {
            Word::Operator(tok) => Some(tok.id),
            Word::Compound(_) => None,
        }
    }
}

/// A sequence of parts evaluated and joined into one or more fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompoundWord {
    pub parts: Vec<WordPart>,
}

/// Parts that can make up a word. Quoting is recorded here, per part.
#[derive(Debug, Clone, PartialEq)]
pub enum WordPart {
    /// Unquoted literal text, including glob characters.
    Literal(Token),
    /// `\x` outside quotes. `ch` is the character without the backslash.
    EscapedLiteral { token: Token, ch: String },
    SingleQuoted(SingleQuoted),
    DoubleQuoted(DoubleQuoted),
    /// `$x`, `$1`, `$@`, `$?` ...
    SimpleVarSub(Token),
    BracedVarSub(Box<BracedVarSub>),
    /// `~` or `~user` at the start of a word.
    TildeSub { token: Token, user: Option<String> },
    CommandSub(CommandSub),
    ArithSub(ArithSub),
    /// `(a b c)` on the right of an assignment.
    ArrayLiteral(ArrayLiteral),
    /// `@name`, with `shopt -s parse_at`.
    Splice { token: Token, name: String },
    /// `@(a|b)` and friends.
    ExtGlob(ExtGlob),
    /// `{a,b,c}`, detected after parsing in command words.
    BracedTuple(Vec<CompoundWord>),
    /// `{1..10..2}` or `{a..e}`.
    BracedRange(BracedRange),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleQuoted {
    pub left: Token,
    /// Decoded contents; `$'\n'` is already a newline here.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoubleQuoted {
    pub left: Token,
    pub parts: Vec<WordPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandSub {
    /// `$(`, a backtick, `<(` or `>(`.
    pub left: Token,
    pub child: Box<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArithSub {
    pub left: Token,
    pub expr: ArithExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayItem {
    Word(CompoundWord),
    /// `[key]=value`
    Pair { key: CompoundWord, value: CompoundWord },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLiteral {
    pub left: Token,
    pub items: Vec<ArrayItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtGlob {
    pub op: Token,
    pub arms: Vec<CompoundWord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Int,
    Char,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BracedRange {
    pub kind: RangeKind,
    pub start: String,
    pub end: String,
    pub step: i64,
}

// =============================================================================
// VARIABLE SUBSTITUTION
// =============================================================================

/// `${prefix name [index] suffix}`
#[derive(Debug, Clone, PartialEq)]
pub struct BracedVarSub {
    pub left: Token,
    pub token: Token,
    pub var_name: String,
    /// `#` for length, `!` for indirection.
    pub prefix_op: Option<Token>,
    pub bracket_op: Option<BracketOp>,
    pub suffix_op: Option<SuffixOp>,
    pub right: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BracketOp {
    /// `[@]` or `[*]`
    WholeArray(Id),
    ArrayIndex(ArithExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SuffixOp {
    /// `@Q` and friends, or `@`/`*` after `${!prefix`.
    Nullary(Token),
    /// Tests like `:-` and the `#`, `%`, `^`, `,` family.
    Unary { op: Token, arg: CompoundWord },
    PatSub(PatSub),
    Slice { begin: Option<ArithExpr>, length: Option<ArithExpr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatSubMode {
    First,
    All,
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatSub {
    pub pat: CompoundWord,
    pub replace: Option<CompoundWord>,
    pub mode: PatSubMode,
    pub slash: Token,
}

// =============================================================================
// ARITHMETIC
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDec {
    PreIncr,
    PreDecr,
    PostIncr,
    PostDecr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArithExpr {
    /// A bare name, `x` in `$(( x + 1 ))`.
    Var(Token),
    /// Anything that needs word evaluation first: `42`, `0x1f`, `$x`, `${a[0]}`.
    Word(CompoundWord),
    UnaryAssign { op: IncDec, child: Box<ArithExpr> },
    /// `=`, `+=` and the other compound assignments.
    BinaryAssign { op: Token, left: Box<ArithExpr>, right: Box<ArithExpr> },
    Unary { op: Token, child: Box<ArithExpr> },
    Binary { op: Token, left: Box<ArithExpr>, right: Box<ArithExpr> },
    /// `a[i]`
    Index { base: Box<ArithExpr>, index: Box<ArithExpr> },
    Ternary { cond: Box<ArithExpr>, true_expr: Box<ArithExpr>, false_expr: Box<ArithExpr> },
}

impl ArithExpr {
    /// Whether this expression can be assigned to.
    pub fn is_lvalue(&self) -> bool {
        match self {
            ArithExpr::Var(_) => true,
            ArithExpr::Index { base, .. } => matches!(**base, ArithExpr::Var(_)),
            _ => false,
        }
    }
}

// =============================================================================
// BOOLEAN EXPRESSIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BoolExpr {
    /// `[[ foo ]]` is an implicit `-n` test.
    WordTest(CompoundWord),
    Unary { op: Id, child: CompoundWord },
    Binary { op: Id, left: CompoundWord, right: CompoundWord },
    LogicalNot(Box<BoolExpr>),
    LogicalAnd(Box<BoolExpr>, Box<BoolExpr>),
    LogicalOr(Box<BoolExpr>, Box<BoolExpr>),
}

// =============================================================================
// ASSIGNMENTS & REDIRECTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Equal,
    PlusEqual,
}

/// `name=value`, `name+=value`, `name[index]=value`
#[derive(Debug, Clone, PartialEq)]
pub struct AssignPair {
    pub left: Token,
    pub name: String,
    /// Raw text between the brackets. Indexed arrays evaluate it as
    /// arithmetic, associative arrays as a string.
    pub index: Option<String>,
    pub op: AssignOp,
    pub rhs: Option<CompoundWord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirLoc {
    Fd(i32),
    /// `{name}>file` allocates a descriptor and stores it in `name`.
    VarName(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HereDocBody {
    pub parts: Vec<WordPart>,
    /// A quoted delimiter disables substitution in the body.
    pub quoted: bool,
}

/// Filled in by the parser once the rest of the line has been read.
#[derive(Debug, PartialEq)]
pub struct HereDoc {
    pub here_begin: CompoundWord,
    pub strip_tabs: bool,
    pub body: RefCell<Option<HereDocBody>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirArg {
    Word(CompoundWord),
    HereDoc(Rc<HereDoc>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub op: Token,
    pub loc: RedirLoc,
    pub arg: RedirArg,
}

/// The descriptor a redirect applies to when no number is written.
pub fn default_redirect_fd(op: Id) -> i32 {
    match op {
        Id::RedirLess | Id::RedirDLess | Id::RedirTLess | Id::RedirDLessDash | Id::RedirLessAnd
        | Id::RedirLessGreat => 0,
        _ => 1,
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    NoOp,
    Simple(SimpleCommand),
    /// Assignments with no command word: `a=1 b=2`.
    ShAssignment(ShAssignment),
    ControlFlow(ControlFlowCmd),
    Pipeline(Pipeline),
    AndOr(AndOr),
    CommandList(Vec<Command>),
    /// A command followed by `;` or `&`.
    Sentence(Sentence),
    /// A compound command with redirects attached.
    Redirected(Redirected),
    BraceGroup(BraceGroup),
    Subshell(Subshell),
    DParen(DParen),
    DBracket(DBracket),
    ForEach(ForEach),
    ForExpr(ForExpr),
    WhileUntil(WhileUntil),
    If(If),
    Case(Case),
    ShFunction(ShFunction),
    TimeBlock(TimeBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleCommand {
    pub words: Vec<CompoundWord>,
    pub redirects: Vec<Redirect>,
    /// `FOO=bar cmd` bindings, visible only to `cmd`.
    pub more_env: Vec<AssignPair>,
    /// Line of the first word, for `$LINENO` and xtrace.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShAssignment {
    pub pairs: Vec<AssignPair>,
    pub redirects: Vec<Redirect>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlFlowCmd {
    pub keyword: Token,
    pub arg: Option<CompoundWord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub negated: Option<Token>,
    pub children: Vec<Command>,
    /// Indices of stages followed by `|&`.
    pub stderr_indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AndOr {
    pub children: Vec<Command>,
    /// `&&` or `||` between consecutive children.
    pub ops: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sentence {
    pub child: Box<Command>,
    pub terminator: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Redirected {
    pub child: Box<Command>,
    pub redirects: Vec<Redirect>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BraceGroup {
    pub left: Token,
    pub children: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subshell {
    pub left: Token,
    pub child: Box<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DParen {
    pub left: Token,
    pub child: ArithExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DBracket {
    pub left: Token,
    pub expr: BoolExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForEach {
    pub keyword: Token,
    pub var_name: String,
    /// `None` iterates over `"$@"`.
    pub iterable: Option<Vec<CompoundWord>>,
    pub body: Box<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForExpr {
    pub keyword: Token,
    pub init: Option<ArithExpr>,
    pub cond: Option<ArithExpr>,
    pub update: Option<ArithExpr>,
    pub body: Box<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileUntil {
    /// `while` or `until`
    pub keyword: Token,
    pub cond: Vec<Command>,
    pub body: Box<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfArm {
    pub keyword: Token,
    pub cond: Vec<Command>,
    pub action: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub arms: Vec<IfArm>,
    pub else_action: Option<Vec<Command>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTerminator {
    /// `;;`
    Break,
    /// `;&`
    FallThrough,
    /// `;;&`
    TestNext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    pub left: Token,
    pub patterns: Vec<CompoundWord>,
    pub action: Vec<Command>,
    pub terminator: CaseTerminator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub keyword: Token,
    pub to_match: CompoundWord,
    pub arms: Vec<CaseArm>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShFunction {
    pub name_tok: Token,
    pub name: String,
    pub body: Rc<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeBlock {
    pub keyword: Token,
    pub pipeline: Box<Command>,
}

// =============================================================================
// HELPERS
// =============================================================================

impl CompoundWord {
    pub fn new(parts: Vec<WordPart>) -> Self {
        Self { parts }
    }

    /// A word made of one literal token, used for synthesized words.
    pub fn from_token(tok: Token) -> Self {
        Self {
            parts: vec![WordPart::Literal(tok)],
        }
    }

    /// The text of the word if every part is an unquoted literal.
    pub fn static_text(&self) -> Option<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                WordPart::Literal(tok) => out.push_str(&tok.val),
                WordPart::EscapedLiteral { ch, .. } => out.push_str(ch),
                _ => return None,
            }
        }
        Some(out)
    }

    /// Like `static_text`, but also accepts quoted literal parts.
    /// `"EOF"` and `'EOF'` give `("EOF", true)`.
    pub fn static_text_quoted(&self) -> Option<(String, bool)> {
        let mut out = String::new();
        let mut quoted = false;
        for part in &self.parts {
            match part {
                WordPart::Literal(tok) => out.push_str(&tok.val),
                WordPart::EscapedLiteral { ch, .. } => {
                    quoted = true;
                    out.push_str(ch);
                }
                WordPart::SingleQuoted(sq) => {
                    quoted = true;
                    out.push_str(&sq.value);
                }
                WordPart::DoubleQuoted(dq) => {
                    quoted = true;
                    for p in &dq.parts {
                        match p {
                            WordPart::Literal(tok) => out.push_str(&tok.val),
                            WordPart::EscapedLiteral { ch, .. } => out.push_str(ch),
                            _ => return None,
                        }
                    }
                }
                _ => return None,
            }
        }
        Some((out, quoted))
    }

    /// Id of a word made of exactly one literal token.
    pub fn literal_id(&self) -> Option<Id> {
        match self.parts.as_slice() {
            [WordPart::Literal(tok)] => Some(tok.id),
            _ => None,
        }
    }

    /// First token in the word, for error locations.
    pub fn first_token(&self) -> Option<&Token> {
        self.parts.iter().find_map(part_token)
    }

    pub fn line_num(&self) -> usize {
        self.first_token().map(|t| t.line_num()).unwrap_or(0)
    }
}

/// The token that best locates a word part.
pub fn part_token(part: &WordPart) -> Option<&Token> {
    match part {
        WordPart::Literal(tok) | WordPart::SimpleVarSub(tok) => Some(tok),
        WordPart::EscapedLiteral { token, .. }
        | WordPart::TildeSub { token, .. }
        | WordPart::Splice { token, .. } => Some(token),
        WordPart::SingleQuoted(sq) => Some(&sq.left),
        WordPart::DoubleQuoted(dq) => Some(&dq.left),
        WordPart::BracedVarSub(bvs) => Some(&bvs.left),
        WordPart::CommandSub(cs) => Some(&cs.left),
        WordPart::ArithSub(a) => Some(&a.left),
        WordPart::ArrayLiteral(a) => Some(&a.left),
        WordPart::ExtGlob(e) => Some(&e.op),
        WordPart::BracedTuple(words) => words.iter().find_map(|w| w.first_token()),
        WordPart::BracedRange(_) => None,
    }
}

/// Id used by the boolean parser to classify a word.
pub fn bool_id(w: &Word) -> Id {
    match w {
        Word::Operator(tok) => tok.id,
        Word::Compound(cw) => match cw.literal_id() {
            Some(id @ (Id::KWBang | Id::LitDRightBracket)) => id,
            Some(id) if matches!(id.kind(), Kind::BoolUnary | Kind::BoolBinary) => id,
            _ => Id::WordCompound,
        },
    }
}

impl Command {
    /// Line of the first token, when one is at hand.
    pub fn line_num(&self) -> usize {
        match self {
            Command::Simple(s) => s.line,
            Command::ShAssignment(a) => a.pairs.first().map(|p| p.left.line_num()).unwrap_or(0),
            Command::ControlFlow(c) => c.keyword.line_num(),
            Command::Pipeline(p) => p.children.first().map(Command::line_num).unwrap_or(0),
            Command::AndOr(a) => a.children.first().map(Command::line_num).unwrap_or(0),
            Command::CommandList(list) => list.first().map(Command::line_num).unwrap_or(0),
            Command::Sentence(s) => s.child.line_num(),
            Command::Redirected(r) => r.child.line_num(),
            Command::BraceGroup(b) => b.left.line_num(),
            Command::Subshell(s) => s.left.line_num(),
            Command::DParen(d) => d.left.line_num(),
            Command::DBracket(d) => d.left.line_num(),
            Command::ForEach(f) => f.keyword.line_num(),
            Command::ForExpr(f) => f.keyword.line_num(),
            Command::WhileUntil(w) => w.keyword.line_num(),
            Command::If(i) => i.arms.first().map(|a| a.keyword.line_num()).unwrap_or(0),
            Command::Case(c) => c.keyword.line_num(),
            Command::ShFunction(f) => f.name_tok.line_num(),
            Command::TimeBlock(t) => t.keyword.line_num(),
            Command::NoOp => 0,
        }
    }
}

impl fmt::Display for CaseTerminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Break => write!(f, ";;"),
            Self::FallThrough => write!(f, ";&"),
            Self::TestNext => write!(f, ";;&"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> WordPart {
        WordPart::Literal(Token::synthetic(Id::LitChars, s))
    }

    #[test]
    fn test_static_text() {
        let w = CompoundWord::new(vec![lit("ab"), lit("c")]);
        assert_eq!(w.static_text().as_deref(), Some("abc"));
        let w = CompoundWord::new(vec![WordPart::SimpleVarSub(Token::synthetic(Id::VSubDollarName, "$x"))]);
        assert_eq!(w.static_text(), None);
    }

    #[test]
    fn test_quoted_delimiter() {
        let w = CompoundWord::new(vec![WordPart::SingleQuoted(SingleQuoted {
            left: Token::synthetic(Id::LeftSingleQuote, "'"),
            value: "EOF".to_string(),
        })]);
        assert_eq!(w.static_text_quoted(), Some(("EOF".to_string(), true)));
    }

    #[test]
    fn test_bool_id() {
        let w = Word::Compound(CompoundWord::from_token(Token::synthetic(Id::BoolUnaryZ, "-z")));
        assert_eq!(bool_id(&w), Id::BoolUnaryZ);
        let w = Word::Compound(CompoundWord::new(vec![lit("foo")]));
        assert_eq!(bool_id(&w), Id::WordCompound);
    }

    #[test]
    fn test_lvalue() {
        let var = ArithExpr::Var(Token::synthetic(Id::LitArithVarLike, "x"));
        assert!(var.is_lvalue());
        let idx = ArithExpr::Index {
            base: Box::new(var.clone()),
            index: Box::new(ArithExpr::Word(CompoundWord::new(vec![lit("1")]))),
        };
        assert!(idx.is_lvalue());
        assert!(!ArithExpr::Word(CompoundWord::new(vec![lit("1")])).is_lvalue());
    }
}
