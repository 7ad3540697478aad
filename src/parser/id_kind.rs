//! Token Ids and Kinds
//!
//! Every token the lexer produces carries an `Id`. Ids are grouped into
//! `Kind`s, which is what the parsers mostly dispatch on.

/// Coarse grouping of token ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Undefined,
    Unknown,
    Eol,
    Eof,
    Ignored,
    WS,
    Lit,
    Backtick,
    Op,
    Redir,
    Left,
    Right,
    ExtGlob,
    VSub,
    VTest,
    VOp0,
    VOp1,
    VOp2,
    VOp3,
    Arith,
    KW,
    ControlFlow,
    BoolUnary,
    BoolBinary,
    Char,
    BashRegex,
    LookAhead,
    /// Not produced by the lexer; the kind of a compound word.
    Word,
}

/// Token ids, one per lexical category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Id {
    UndefinedTok,
    UnknownTok,
    UnknownBackslash,
    EolTok,

    EofReal,
    EofRParen,
    EofBacktick,

    IgnoredLineCont,
    IgnoredSpace,
    IgnoredComment,

    WSSpace,

    // Literals
    LitChars,
    LitVarLike,
    LitArrayLhsOpen,
    LitArrayLhsClose,
    LitSplice,
    LitOther,
    LitEscapedChar,
    LitBadBackslash,
    LitLBracket,
    LitRBracket,
    LitStar,
    LitQMark,
    LitLBrace,
    LitRBrace,
    LitComma,
    LitEquals,
    LitAt,
    LitTilde,
    LitSlash,
    LitColon,
    LitDollar,
    LitPound,
    LitPercent,
    LitDRightBracket,
    LitArithVarLike,
    LitDigits,

    // Backtick mode
    BacktickRight,
    BacktickQuoted,
    BacktickDoubleQuote,
    BacktickOther,

    // Operators
    OpNewline,
    OpAmp,
    OpPipe,
    OpPipeAmp,
    OpDAmp,
    OpDPipe,
    OpSemi,
    OpDSemi,
    OpSemiAmp,
    OpDSemiAmp,
    OpLParen,
    OpRParen,
    OpDLeftParen,
    OpDRightParen,
    OpLess,
    OpGreat,

    // Redirects
    RedirLess,
    RedirGreat,
    RedirDLess,
    RedirTLess,
    RedirDGreat,
    RedirDLessDash,
    RedirGreatAnd,
    RedirLessAnd,
    RedirLessGreat,
    RedirClobber,
    RedirAndGreat,
    RedirAndDGreat,

    // Openers of nested constructs
    LeftDoubleQuote,
    LeftSingleQuote,
    LeftDollarSingleQuote,
    LeftDollarDoubleQuote,
    LeftBacktick,
    LeftDollarParen,
    LeftDollarBrace,
    LeftDollarDParen,
    LeftDollarBracket,
    LeftProcSubIn,
    LeftProcSubOut,

    // Closers
    RightDoubleQuote,
    RightSingleQuote,
    RightBacktick,
    RightDollarBrace,
    RightDollarDParen,
    RightDollarBracket,
    RightSubshell,
    RightShFunction,
    RightCasePat,
    RightShArrayLiteral,
    RightExtGlob,

    ExtGlobAt,
    ExtGlobStar,
    ExtGlobPlus,
    ExtGlobQMark,
    ExtGlobBang,

    // Variable substitution
    VSubDollarName,
    VSubName,
    VSubNumber,
    VSubBang,
    VSubAt,
    VSubPound,
    VSubDollar,
    VSubStar,
    VSubHyphen,
    VSubQMark,

    VTestColonHyphen,
    VTestHyphen,
    VTestColonEquals,
    VTestEquals,
    VTestColonQMark,
    VTestQMark,
    VTestColonPlus,
    VTestPlus,

    VOp0Q,
    VOp0E,
    VOp0P,
    VOp0A,
    VOp0a,

    VOp1Percent,
    VOp1DPercent,
    VOp1Pound,
    VOp1DPound,
    VOp1Caret,
    VOp1DCaret,
    VOp1Comma,
    VOp1DComma,

    VOp2Slash,
    VOp2Colon,
    VOp2LBracket,
    VOp2RBracket,

    VOp3At,
    VOp3Star,

    // Arithmetic
    ArithSemi,
    ArithComma,
    ArithPlus,
    ArithMinus,
    ArithStar,
    ArithSlash,
    ArithPercent,
    ArithDPlus,
    ArithDMinus,
    ArithDStar,
    ArithLParen,
    ArithRParen,
    ArithLBracket,
    ArithRBracket,
    ArithRBrace,
    ArithQMark,
    ArithColon,
    ArithLessEqual,
    ArithLess,
    ArithGreatEqual,
    ArithGreat,
    ArithDEqual,
    ArithNEqual,
    ArithDAmp,
    ArithDPipe,
    ArithBang,
    ArithDGreat,
    ArithDLess,
    ArithAmp,
    ArithPipe,
    ArithCaret,
    ArithTilde,
    ArithEqual,
    ArithPlusEqual,
    ArithMinusEqual,
    ArithStarEqual,
    ArithSlashEqual,
    ArithPercentEqual,
    ArithDGreatEqual,
    ArithDLessEqual,
    ArithAmpEqual,
    ArithPipeEqual,
    ArithCaretEqual,

    // Keywords
    KWDLeftBracket,
    KWBang,
    KWFor,
    KWWhile,
    KWUntil,
    KWDo,
    KWDone,
    KWIn,
    KWCase,
    KWEsac,
    KWIf,
    KWFi,
    KWThen,
    KWElse,
    KWElif,
    KWFunction,
    KWTime,

    ControlFlowBreak,
    ControlFlowContinue,
    ControlFlowReturn,
    ControlFlowExit,

    // [[ unary operators
    BoolUnaryZ,
    BoolUnaryN,
    BoolUnaryO,
    BoolUnaryT,
    BoolUnaryV,
    BoolUnaryR,
    BoolUnaryA,
    BoolUnaryB,
    BoolUnaryC,
    BoolUnaryD,
    BoolUnaryE,
    BoolUnaryF,
    BoolUnaryG,
    BoolUnaryH,
    BoolUnaryL,
    BoolUnaryP,
    BoolUnaryReadable,
    BoolUnaryS,
    BoolUnarySocket,
    BoolUnaryU,
    BoolUnaryW,
    BoolUnaryX,
    BoolUnaryOwned,
    BoolUnaryGroupOwned,
    BoolUnaryModified,

    // [[ binary operators
    BoolBinaryGlobEqual,
    BoolBinaryGlobDEqual,
    BoolBinaryGlobNEqual,
    BoolBinaryEqualTilde,
    BoolBinaryEf,
    BoolBinaryNt,
    BoolBinaryOt,
    BoolBinaryEq,
    BoolBinaryNe,
    BoolBinaryGt,
    BoolBinaryGe,
    BoolBinaryLt,
    BoolBinaryLe,

    // $'' escapes
    CharOneChar,
    CharHex,
    CharUnicode4,
    CharUnicode8,
    CharOctal3,

    BashRegexLParen,
    BashRegexAllowedInParens,

    LookAheadFuncParens,

    /// A word that is not an operator, as seen by the boolean parser.
    WordCompound,
}

impl Id {
    pub fn kind(self) -> Kind {
        use Id::*;
        match self {
            UndefinedTok => Kind::Undefined,
            UnknownTok | UnknownBackslash => Kind::Unknown,
            EolTok => Kind::Eol,
            EofReal | EofRParen | EofBacktick => Kind::Eof,
            IgnoredLineCont | IgnoredSpace | IgnoredComment => Kind::Ignored,
            WSSpace => Kind::WS,
            LitChars | LitVarLike | LitArrayLhsOpen | LitArrayLhsClose | LitSplice | LitOther
            | LitEscapedChar | LitBadBackslash | LitLBracket | LitRBracket | LitStar | LitQMark
            | LitLBrace | LitRBrace | LitComma | LitEquals | LitAt | LitTilde | LitSlash
            | LitColon | LitDollar | LitPound | LitPercent | LitDRightBracket
            | LitArithVarLike | LitDigits => Kind::Lit,
            BacktickRight | BacktickQuoted | BacktickDoubleQuote | BacktickOther => {
                Kind::Backtick
            }
            OpNewline | OpAmp | OpPipe | OpPipeAmp | OpDAmp | OpDPipe | OpSemi | OpDSemi
            | OpSemiAmp | OpDSemiAmp | OpLParen | OpRParen | OpDLeftParen | OpDRightParen
            | OpLess | OpGreat => Kind::Op,
            RedirLess | RedirGreat | RedirDLess | RedirTLess | RedirDGreat | RedirDLessDash
            | RedirGreatAnd | RedirLessAnd | RedirLessGreat | RedirClobber | RedirAndGreat
            | RedirAndDGreat => Kind::Redir,
            LeftDoubleQuote | LeftSingleQuote | LeftDollarSingleQuote | LeftDollarDoubleQuote
            | LeftBacktick | LeftDollarParen | LeftDollarBrace | LeftDollarDParen
            | LeftDollarBracket | LeftProcSubIn | LeftProcSubOut => Kind::Left,
            RightDoubleQuote | RightSingleQuote | RightBacktick | RightDollarBrace
            | RightDollarDParen | RightDollarBracket | RightSubshell | RightShFunction
            | RightCasePat | RightShArrayLiteral | RightExtGlob => Kind::Right,
            ExtGlobAt | ExtGlobStar | ExtGlobPlus | ExtGlobQMark | ExtGlobBang => Kind::ExtGlob,
            VSubDollarName | VSubName | VSubNumber | VSubBang | VSubAt | VSubPound
            | VSubDollar | VSubStar | VSubHyphen | VSubQMark => Kind::VSub,
            VTestColonHyphen | VTestHyphen | VTestColonEquals | VTestEquals | VTestColonQMark
            | VTestQMark | VTestColonPlus | VTestPlus => Kind::VTest,
            VOp0Q | VOp0E | VOp0P | VOp0A | VOp0a => Kind::VOp0,
            VOp1Percent | VOp1DPercent | VOp1Pound | VOp1DPound | VOp1Caret | VOp1DCaret
            | VOp1Comma | VOp1DComma => Kind::VOp1,
            VOp2Slash | VOp2Colon | VOp2LBracket | VOp2RBracket => Kind::VOp2,
            VOp3At | VOp3Star => Kind::VOp3,
            ArithSemi | ArithComma | ArithPlus | ArithMinus | ArithStar | ArithSlash
            | ArithPercent | ArithDPlus | ArithDMinus | ArithDStar | ArithLParen | ArithRParen
            | ArithLBracket | ArithRBracket | ArithRBrace | ArithQMark | ArithColon
            | ArithLessEqual | ArithLess | ArithGreatEqual | ArithGreat | ArithDEqual
            | ArithNEqual | ArithDAmp | ArithDPipe | ArithBang | ArithDGreat | ArithDLess
            | ArithAmp | ArithPipe | ArithCaret | ArithTilde | ArithEqual | ArithPlusEqual
            | ArithMinusEqual | ArithStarEqual | ArithSlashEqual | ArithPercentEqual
            | ArithDGreatEqual | ArithDLessEqual | ArithAmpEqual | ArithPipeEqual
            | ArithCaretEqual => Kind::Arith,
            KWDLeftBracket | KWBang | KWFor | KWWhile | KWUntil | KWDo | KWDone | KWIn
            | KWCase | KWEsac | KWIf | KWFi | KWThen | KWElse | KWElif | KWFunction | KWTime => {
                Kind::KW
            }
            ControlFlowBreak | ControlFlowContinue | ControlFlowReturn | ControlFlowExit => {
                Kind::ControlFlow
            }
            BoolUnaryZ | BoolUnaryN | BoolUnaryO | BoolUnaryT | BoolUnaryV | BoolUnaryR
            | BoolUnaryA | BoolUnaryB | BoolUnaryC | BoolUnaryD | BoolUnaryE | BoolUnaryF
            | BoolUnaryG | BoolUnaryH | BoolUnaryL | BoolUnaryP | BoolUnaryReadable
            | BoolUnaryS | BoolUnarySocket | BoolUnaryU | BoolUnaryW | BoolUnaryX
            | BoolUnaryOwned | BoolUnaryGroupOwned | BoolUnaryModified => Kind::BoolUnary,
            BoolBinaryGlobEqual | BoolBinaryGlobDEqual | BoolBinaryGlobNEqual
            | BoolBinaryEqualTilde | BoolBinaryEf | BoolBinaryNt | BoolBinaryOt | BoolBinaryEq
            | BoolBinaryNe | BoolBinaryGt | BoolBinaryGe | BoolBinaryLt | BoolBinaryLe => {
                Kind::BoolBinary
            }
            CharOneChar | CharHex | CharUnicode4 | CharUnicode8 | CharOctal3 => Kind::Char,
            BashRegexLParen | BashRegexAllowedInParens => Kind::BashRegex,
            LookAheadFuncParens => Kind::LookAhead,
            WordCompound => Kind::Word,
        }
    }
}

/// What the operand of a `[[` / `test` operator is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolArgType {
    Str,
    Int,
    Path,
    Other,
    Undefined,
}

/// Argument type of a boolean operator, used by the evaluator to pick a
/// comparison strategy.
pub fn bool_arg_type(id: Id) -> BoolArgType {
    use Id::*;
    match id {
        BoolUnaryZ | BoolUnaryN => BoolArgType::Str,
        BoolUnaryO | BoolUnaryT | BoolUnaryV | BoolUnaryR => BoolArgType::Other,
        BoolBinaryGlobEqual | BoolBinaryGlobDEqual | BoolBinaryGlobNEqual
        | BoolBinaryEqualTilde | OpLess | OpGreat => BoolArgType::Str,
        BoolBinaryEf | BoolBinaryNt | BoolBinaryOt => BoolArgType::Path,
        BoolBinaryEq | BoolBinaryNe | BoolBinaryGt | BoolBinaryGe | BoolBinaryLt
        | BoolBinaryLe => BoolArgType::Int,
        _ if id.kind() == Kind::BoolUnary => BoolArgType::Path,
        _ => BoolArgType::Undefined,
    }
}

/// Operator spellings used by `test` / `[`, which has no lexer mode of its own.
pub fn unary_test_op(s: &str) -> Option<Id> {
    use Id::*;
    let id = match s {
        "-z" => BoolUnaryZ,
        "-n" => BoolUnaryN,
        "-o" => BoolUnaryO,
        "-t" => BoolUnaryT,
        "-v" => BoolUnaryV,
        "-R" => BoolUnaryR,
        "-a" => BoolUnaryA,
        "-b" => BoolUnaryB,
        "-c" => BoolUnaryC,
        "-d" => BoolUnaryD,
        "-e" => BoolUnaryE,
        "-f" => BoolUnaryF,
        "-g" => BoolUnaryG,
        "-h" => BoolUnaryH,
        "-L" => BoolUnaryL,
        "-p" => BoolUnaryP,
        "-r" => BoolUnaryReadable,
        "-s" => BoolUnaryS,
        "-S" => BoolUnarySocket,
        "-u" => BoolUnaryU,
        "-w" => BoolUnaryW,
        "-x" => BoolUnaryX,
        "-O" => BoolUnaryOwned,
        "-G" => BoolUnaryGroupOwned,
        "-N" => BoolUnaryModified,
        _ => return None,
    };
    Some(id)
}

pub fn binary_test_op(s: &str) -> Option<Id> {
    use Id::*;
    let id = match s {
        "=" => BoolBinaryGlobEqual,
        "==" => BoolBinaryGlobDEqual,
        "!=" => BoolBinaryGlobNEqual,
        "=~" => BoolBinaryEqualTilde,
        "-ef" => BoolBinaryEf,
        "-nt" => BoolBinaryNt,
        "-ot" => BoolBinaryOt,
        "-eq" => BoolBinaryEq,
        "-ne" => BoolBinaryNe,
        "-gt" => BoolBinaryGt,
        "-ge" => BoolBinaryGe,
        "-lt" => BoolBinaryLt,
        "-le" => BoolBinaryLe,
        "<" => OpLess,
        ">" => OpGreat,
        _ => return None,
    };
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(Id::LitChars.kind(), Kind::Lit);
        assert_eq!(Id::EofRParen.kind(), Kind::Eof);
        assert_eq!(Id::VOp1DPound.kind(), Kind::VOp1);
        assert_eq!(Id::BoolUnaryX.kind(), Kind::BoolUnary);
    }

    #[test]
    fn test_bool_arg_types() {
        assert_eq!(bool_arg_type(Id::BoolUnaryZ), BoolArgType::Str);
        assert_eq!(bool_arg_type(Id::BoolUnaryF), BoolArgType::Path);
        assert_eq!(bool_arg_type(Id::BoolBinaryLt), BoolArgType::Int);
        assert_eq!(unary_test_op("-d"), Some(Id::BoolUnaryD));
        assert_eq!(binary_test_op("-nt"), Some(Id::BoolBinaryNt));
        assert_eq!(binary_test_op("-x"), None);
    }
}
