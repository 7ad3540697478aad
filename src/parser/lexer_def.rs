//! Lexer Mode Tables
//!
//! Each lexer mode is an ordered list of (pattern, Id) rules. The lexer tries
//! every rule of the active mode at the current position and keeps the
//! longest match. On a tie the rule declared first wins, which is how
//! keywords beat `Lit_Chars` for `for`, `if`, etc.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex_lite::Regex;

use crate::parser::id_kind::Id;

/// Lexer modes. The parser picks one for every token it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexMode {
    ShCommand,
    Comment,
    Backtick,
    DBracket,
    ExtGlob,
    BashRegex,
    DQ,
    VSubArgUnquoted,
    VSubArgDQ,
    SQRaw,
    SQC,
    VSub1,
    VSub2,
    Arith,
    FuncParens,
}

pub struct Rule {
    pub re: Regex,
    pub id: Id,
}

/// A rule before compilation: `Const` is matched literally, `Pat` is a regex.
enum Spec {
    Const(&'static str, Id),
    Pat(&'static str, Id),
}

use Spec::{Const as C, Pat as R};

const VAR_NAME: &str = r"[a-zA-Z_][a-zA-Z0-9_]*";

// Non-ASCII characters are literals, like the ASCII whitelist below.
const LITERAL_WHITELIST: &str = r"(?:[a-zA-Z0-9_.\-]|[^\x00-\x7F])+";

fn backslash() -> Vec<Spec> {
    vec![R(r"\\[^\n]", Id::LitEscapedChar), C("\\\n", Id::IgnoredLineCont)]
}

fn dq_backslash() -> Vec<Spec> {
    vec![R(r#"\\[$`"\\]"#, Id::LitEscapedChar), C("\\", Id::LitBadBackslash)]
}

fn vars() -> Vec<Spec> {
    vec![
        R(r"\$[a-zA-Z_][a-zA-Z0-9_]*", Id::VSubDollarName),
        R(r"\$[0-9]", Id::VSubNumber),
        C("$!", Id::VSubBang),
        C("$@", Id::VSubAt),
        C("$#", Id::VSubPound),
        C("$$", Id::VSubDollar),
        C("$*", Id::VSubStar),
        C("$-", Id::VSubHyphen),
        C("$?", Id::VSubQMark),
    ]
}

fn left_subs() -> Vec<Spec> {
    vec![
        C("`", Id::LeftBacktick),
        C("$(", Id::LeftDollarParen),
        C("${", Id::LeftDollarBrace),
        C("$((", Id::LeftDollarDParen),
        C("$[", Id::LeftDollarBracket),
    ]
}

fn left_unquoted() -> Vec<Spec> {
    vec![
        C("\"", Id::LeftDoubleQuote),
        C("'", Id::LeftSingleQuote),
        C("$\"", Id::LeftDollarDoubleQuote),
        C("$'", Id::LeftDollarSingleQuote),
    ]
}

fn left_procsub() -> Vec<Spec> {
    vec![C("<(", Id::LeftProcSubIn), C(">(", Id::LeftProcSubOut)]
}

fn extglob_begin() -> Vec<Spec> {
    vec![
        C("@(", Id::ExtGlobAt),
        C("*(", Id::ExtGlobStar),
        C("+(", Id::ExtGlobPlus),
        C("?(", Id::ExtGlobQMark),
        C("!(", Id::ExtGlobBang),
    ]
}

fn unquoted() -> Vec<Spec> {
    let mut rules = backslash();
    rules.extend(left_subs());
    rules.extend(left_unquoted());
    rules.extend(left_procsub());
    rules.extend(vars());
    rules.extend(vec![
        R(LITERAL_WHITELIST, Id::LitChars),
        C("~", Id::LitTilde),
        C("/", Id::LitSlash),
        C(":", Id::LitColon),
        C("$", Id::LitDollar),
        C("#", Id::LitPound),
        R(r"[ \t]+", Id::WSSpace),
        C("\n", Id::OpNewline),
        C("&", Id::OpAmp),
        C("|", Id::OpPipe),
        C("|&", Id::OpPipeAmp),
        C("&&", Id::OpDAmp),
        C("||", Id::OpDPipe),
        C(";", Id::OpSemi),
        C(";;", Id::OpDSemi),
        C(";&", Id::OpSemiAmp),
        C(";;&", Id::OpDSemiAmp),
        C("(", Id::OpLParen),
        C(")", Id::OpRParen),
        R(r"(?s).", Id::LitOther),
    ]);
    rules
}

fn keywords() -> Vec<Spec> {
    vec![
        C("[[", Id::KWDLeftBracket),
        C("!", Id::KWBang),
        C("for", Id::KWFor),
        C("while", Id::KWWhile),
        C("until", Id::KWUntil),
        C("do", Id::KWDo),
        C("done", Id::KWDone),
        C("in", Id::KWIn),
        C("case", Id::KWCase),
        C("esac", Id::KWEsac),
        C("if", Id::KWIf),
        C("fi", Id::KWFi),
        C("then", Id::KWThen),
        C("else", Id::KWElse),
        C("elif", Id::KWElif),
        C("function", Id::KWFunction),
        C("time", Id::KWTime),
        C("break", Id::ControlFlowBreak),
        C("continue", Id::ControlFlowContinue),
        C("return", Id::ControlFlowReturn),
        C("exit", Id::ControlFlowExit),
    ]
}

fn redirects() -> Vec<Spec> {
    const FD_NUM: &str = "[0-9]?[0-9]?";
    const FD_VAR: &str = r"\{[a-zA-Z_][a-zA-Z0-9_]*\}";
    let ops: [(&str, Id); 10] = [
        ("<", Id::RedirLess),
        (">", Id::RedirGreat),
        ("<<", Id::RedirDLess),
        ("<<<", Id::RedirTLess),
        (">>", Id::RedirDGreat),
        ("<<-", Id::RedirDLessDash),
        (">&", Id::RedirGreatAnd),
        ("<&", Id::RedirLessAnd),
        ("<>", Id::RedirLessGreat),
        (r">\|", Id::RedirClobber),
    ];
    let mut rules = Vec::new();
    for prefix in [FD_NUM, FD_VAR] {
        for (op, id) in ops.iter() {
            // Leaked once per process: the tables are built a single time.
            let pat: &'static str = Box::leak(format!("{}{}", prefix, op).into_boxed_str());
            rules.push(R(pat, *id));
        }
    }
    rules.push(C("&>", Id::RedirAndGreat));
    rules.push(C("&>>", Id::RedirAndDGreat));
    rules
}

fn sh_command() -> Vec<Spec> {
    let mut rules = vec![
        R(r"[a-zA-Z_][a-zA-Z0-9_]*\+?=", Id::LitVarLike),
        R(r"[a-zA-Z_][a-zA-Z0-9_]*\[", Id::LitArrayLhsOpen),
        R(r"\]\+?=", Id::LitArrayLhsClose),
        C("((", Id::OpDLeftParen),
        C("[", Id::LitLBracket),
        C("]", Id::LitRBracket),
        C("*", Id::LitStar),
        C("?", Id::LitQMark),
        C("{", Id::LitLBrace),
        C("}", Id::LitRBrace),
        C(",", Id::LitComma),
        C("=", Id::LitEquals),
        C("@", Id::LitAt),
        R(r"@[a-zA-Z_][a-zA-Z0-9_]*", Id::LitSplice),
    ];
    rules.extend(redirects());
    rules.extend(keywords());
    rules.extend(unquoted());
    rules.extend(extglob_begin());
    rules
}

fn dbracket() -> Vec<Spec> {
    let mut rules = vec![
        C("]]", Id::LitDRightBracket),
        C("!", Id::KWBang),
        C("<", Id::OpLess),
        C(">", Id::OpGreat),
    ];
    let unary: [(&'static str, Id); 25] = [
        ("-z", Id::BoolUnaryZ),
        ("-n", Id::BoolUnaryN),
        ("-o", Id::BoolUnaryO),
        ("-t", Id::BoolUnaryT),
        ("-v", Id::BoolUnaryV),
        ("-R", Id::BoolUnaryR),
        ("-a", Id::BoolUnaryA),
        ("-b", Id::BoolUnaryB),
        ("-c", Id::BoolUnaryC),
        ("-d", Id::BoolUnaryD),
        ("-e", Id::BoolUnaryE),
        ("-f", Id::BoolUnaryF),
        ("-g", Id::BoolUnaryG),
        ("-h", Id::BoolUnaryH),
        ("-L", Id::BoolUnaryL),
        ("-p", Id::BoolUnaryP),
        ("-r", Id::BoolUnaryReadable),
        ("-s", Id::BoolUnaryS),
        ("-S", Id::BoolUnarySocket),
        ("-u", Id::BoolUnaryU),
        ("-w", Id::BoolUnaryW),
        ("-x", Id::BoolUnaryX),
        ("-O", Id::BoolUnaryOwned),
        ("-G", Id::BoolUnaryGroupOwned),
        ("-N", Id::BoolUnaryModified),
    ];
    rules.extend(unary.iter().map(|(s, id)| C(s, *id)));
    let binary: [(&'static str, Id); 13] = [
        ("=", Id::BoolBinaryGlobEqual),
        ("==", Id::BoolBinaryGlobDEqual),
        ("!=", Id::BoolBinaryGlobNEqual),
        ("=~", Id::BoolBinaryEqualTilde),
        ("-ef", Id::BoolBinaryEf),
        ("-nt", Id::BoolBinaryNt),
        ("-ot", Id::BoolBinaryOt),
        ("-eq", Id::BoolBinaryEq),
        ("-ne", Id::BoolBinaryNe),
        ("-gt", Id::BoolBinaryGt),
        ("-ge", Id::BoolBinaryGe),
        ("-lt", Id::BoolBinaryLt),
        ("-le", Id::BoolBinaryLe),
    ];
    rules.extend(binary.iter().map(|(s, id)| C(s, *id)));
    rules.extend(unquoted());
    rules.extend(extglob_begin());
    rules
}

fn extglob() -> Vec<Spec> {
    let mut rules = backslash();
    rules.extend(left_subs());
    rules.extend(left_unquoted());
    rules.extend(vars());
    rules.extend(extglob_begin());
    rules.extend(vec![
        R(r#"[^\\$`"'|)@*+!?]+"#, Id::LitChars),
        C("|", Id::OpPipe),
        C(")", Id::OpRParen),
        R(r"(?s).", Id::LitOther),
    ]);
    rules
}

fn bash_regex() -> Vec<Spec> {
    let mut rules = left_subs();
    rules.extend(left_unquoted());
    rules.extend(vars());
    rules.extend(vec![
        R(LITERAL_WHITELIST, Id::LitChars),
        C("~", Id::LitTilde),
        C("/", Id::LitSlash),
        R(r"[ \t]+", Id::WSSpace),
        C("(", Id::BashRegexLParen),
        C(")", Id::OpRParen),
        C("\n", Id::BashRegexAllowedInParens),
        C("&", Id::BashRegexAllowedInParens),
        C(";", Id::BashRegexAllowedInParens),
        C(">", Id::BashRegexAllowedInParens),
        C("<", Id::BashRegexAllowedInParens),
        R(r"(?s).", Id::LitOther),
    ]);
    rules.extend(backslash());
    rules
}

fn dq() -> Vec<Spec> {
    let mut rules = dq_backslash();
    rules.push(C("\\\n", Id::IgnoredLineCont));
    rules.extend(left_subs());
    rules.extend(vars());
    rules.extend(vec![
        R(r#"[^$`"\\]+"#, Id::LitChars),
        C("$", Id::LitDollar),
        C("\"", Id::RightDoubleQuote),
    ]);
    rules
}

fn vs_arg_common() -> Vec<Spec> {
    vec![
        C("/", Id::LitSlash),
        C("#", Id::LitPound),
        C("%", Id::LitPercent),
        C("}", Id::RightDollarBrace),
        C("$", Id::LitDollar),
    ]
}

fn vsub_arg_unquoted() -> Vec<Spec> {
    let mut rules = backslash();
    rules.extend(vs_arg_common());
    rules.extend(left_subs());
    rules.extend(left_unquoted());
    rules.extend(left_procsub());
    rules.extend(vars());
    rules.extend(extglob_begin());
    rules.extend(vec![
        C("~", Id::LitTilde),
        R(r#"[^$`~/}"'\\#%<>@!?+*]+"#, Id::LitChars),
        R(r"(?s).", Id::LitOther),
    ]);
    rules
}

fn vsub_arg_dq() -> Vec<Spec> {
    let mut rules = dq_backslash();
    rules.extend(vs_arg_common());
    rules.extend(left_subs());
    rules.extend(vars());
    rules.extend(vec![
        C("\\}", Id::LitEscapedChar),
        R(r#"[^$`/}"\\#%]+"#, Id::LitChars),
        C("\"", Id::LeftDoubleQuote),
        C("$'", Id::LeftDollarSingleQuote),
    ]);
    rules
}

fn sq_raw() -> Vec<Spec> {
    vec![R(r"[^']+", Id::LitChars), C("'", Id::RightSingleQuote)]
}

fn sq_c() -> Vec<Spec> {
    vec![
        R(r"\\x[0-9a-fA-F]{1,2}", Id::CharHex),
        R(r"\\u[0-9a-fA-F]{1,4}", Id::CharUnicode4),
        R(r"\\U[0-9a-fA-F]{1,8}", Id::CharUnicode8),
        R(r"\\[0abeEfrtnv\\]", Id::CharOneChar),
        C("\\", Id::UnknownBackslash),
        C("\\\n", Id::UnknownBackslash),
        R(r"\\[0-7]{1,3}", Id::CharOctal3),
        C("\\'", Id::CharOneChar),
        C("\\\"", Id::CharOneChar),
        R(r"[^\\']+", Id::LitChars),
        C("'", Id::RightSingleQuote),
    ]
}

fn vsub_1() -> Vec<Spec> {
    vec![
        R(VAR_NAME, Id::VSubName),
        R(r"[0-9]+", Id::VSubNumber),
        C("!", Id::VSubBang),
        C("@", Id::VSubAt),
        C("#", Id::VSubPound),
        C("$", Id::VSubDollar),
        C("*", Id::VSubStar),
        C("-", Id::VSubHyphen),
        C("?", Id::VSubQMark),
        C("}", Id::RightDollarBrace),
        C("\\\n", Id::IgnoredLineCont),
        C("\n", Id::UnknownTok),
        R(r"(?s).", Id::UnknownTok),
    ]
}

fn vsub_2() -> Vec<Spec> {
    vec![
        C(":-", Id::VTestColonHyphen),
        C("-", Id::VTestHyphen),
        C(":=", Id::VTestColonEquals),
        C("=", Id::VTestEquals),
        C(":?", Id::VTestColonQMark),
        C("?", Id::VTestQMark),
        C(":+", Id::VTestColonPlus),
        C("+", Id::VTestPlus),
        C("@Q", Id::VOp0Q),
        C("@E", Id::VOp0E),
        C("@P", Id::VOp0P),
        C("@A", Id::VOp0A),
        C("@a", Id::VOp0a),
        C("%", Id::VOp1Percent),
        C("%%", Id::VOp1DPercent),
        C("#", Id::VOp1Pound),
        C("##", Id::VOp1DPound),
        C("^", Id::VOp1Caret),
        C("^^", Id::VOp1DCaret),
        C(",", Id::VOp1Comma),
        C(",,", Id::VOp1DComma),
        C("/", Id::VOp2Slash),
        C(":", Id::VOp2Colon),
        C("[", Id::VOp2LBracket),
        C("]", Id::VOp2RBracket),
        C("@", Id::VOp3At),
        C("*", Id::VOp3Star),
        C("}", Id::RightDollarBrace),
        C("\\\n", Id::IgnoredLineCont),
        C("\n", Id::UnknownTok),
        R(r"(?s).", Id::UnknownTok),
    ]
}

fn arith() -> Vec<Spec> {
    let mut rules = left_subs();
    rules.extend(vars());
    rules.extend(left_unquoted());
    rules.extend(vec![
        R(r"[ \t\r\n]+", Id::IgnoredSpace),
        R(VAR_NAME, Id::LitArithVarLike),
        R(r"[0-9]+", Id::LitDigits),
        C("@", Id::LitAt),
        C("#", Id::LitPound),
        C(";", Id::ArithSemi),
        C(",", Id::ArithComma),
        C("+", Id::ArithPlus),
        C("-", Id::ArithMinus),
        C("*", Id::ArithStar),
        C("/", Id::ArithSlash),
        C("%", Id::ArithPercent),
        C("++", Id::ArithDPlus),
        C("--", Id::ArithDMinus),
        C("**", Id::ArithDStar),
        C("(", Id::ArithLParen),
        C(")", Id::ArithRParen),
        C("[", Id::ArithLBracket),
        C("]", Id::ArithRBracket),
        C("}", Id::ArithRBrace),
        C("?", Id::ArithQMark),
        C(":", Id::ArithColon),
        C("<=", Id::ArithLessEqual),
        C("<", Id::ArithLess),
        C(">=", Id::ArithGreatEqual),
        C(">", Id::ArithGreat),
        C("==", Id::ArithDEqual),
        C("!=", Id::ArithNEqual),
        C("&&", Id::ArithDAmp),
        C("||", Id::ArithDPipe),
        C("!", Id::ArithBang),
        C(">>", Id::ArithDGreat),
        C("<<", Id::ArithDLess),
        C("&", Id::ArithAmp),
        C("|", Id::ArithPipe),
        C("^", Id::ArithCaret),
        C("~", Id::ArithTilde),
        C("=", Id::ArithEqual),
        C("+=", Id::ArithPlusEqual),
        C("-=", Id::ArithMinusEqual),
        C("*=", Id::ArithStarEqual),
        C("/=", Id::ArithSlashEqual),
        C("%=", Id::ArithPercentEqual),
        C(">>=", Id::ArithDGreatEqual),
        C("<<=", Id::ArithDLessEqual),
        C("&=", Id::ArithAmpEqual),
        C("|=", Id::ArithPipeEqual),
        C("^=", Id::ArithCaretEqual),
        C("\\\n", Id::IgnoredLineCont),
        R(r"(?s).", Id::UnknownTok),
    ]);
    rules
}

fn compile(specs: Vec<Spec>) -> Vec<Rule> {
    specs
        .into_iter()
        .map(|spec| {
            let (pat, id) = match spec {
                Spec::Const(s, id) => (regex_lite::escape(s), id),
                Spec::Pat(p, id) => (p.to_string(), id),
            };
            let anchored = format!("^(?:{})", pat);
            // Every pattern is a constant in this file.
            let re = Regex::new(&anchored).unwrap_or_else(|e| panic!("bad lexer rule {:?}: {}", pat, e));
            Rule { re, id }
        })
        .collect()
}

lazy_static! {
    pub static ref LEXER_DEF: HashMap<LexMode, Vec<Rule>> = {
        let mut m = HashMap::new();
        m.insert(LexMode::ShCommand, compile(sh_command()));
        m.insert(LexMode::Comment, compile(vec![R(r"[^\n]*", Id::IgnoredComment)]));
        m.insert(
            LexMode::Backtick,
            compile(vec![
                C("`", Id::BacktickRight),
                R(r"\\[$`\\]", Id::BacktickQuoted),
                R(r#"\\""#, Id::BacktickDoubleQuote),
                R(r"[^`\\]+", Id::BacktickOther),
                R(r"(?s).", Id::BacktickOther),
            ]),
        );
        m.insert(LexMode::DBracket, compile(dbracket()));
        m.insert(LexMode::ExtGlob, compile(extglob()));
        m.insert(LexMode::BashRegex, compile(bash_regex()));
        m.insert(LexMode::DQ, compile(dq()));
        m.insert(LexMode::VSubArgUnquoted, compile(vsub_arg_unquoted()));
        m.insert(LexMode::VSubArgDQ, compile(vsub_arg_dq()));
        m.insert(LexMode::SQRaw, compile(sq_raw()));
        m.insert(LexMode::SQC, compile(sq_c()));
        m.insert(LexMode::VSub1, compile(vsub_1()));
        m.insert(LexMode::VSub2, compile(vsub_2()));
        m.insert(LexMode::Arith, compile(arith()));
        m.insert(
            LexMode::FuncParens,
            compile(vec![
                R(r"[ \t]*\([ \t]*\)", Id::LookAheadFuncParens),
                R(r"(?s).", Id::UnknownTok),
            ]),
        );
        m
    };
}

/// Match one token of `mode` at byte offset `pos` of `line`.
///
/// Returns the winning id and the end offset, `EolTok` at end of line, or
/// `None` when no rule matches.
pub fn one_token(mode: LexMode, line: &str, pos: usize) -> Option<(Id, usize)> {
    if pos >= line.len() {
        return Some((Id::EolTok, pos));
    }
    let rest = &line[pos..];
    let rules = LEXER_DEF.get(&mode)?;
    let mut best: Option<(Id, usize)> = None;
    for rule in rules {
        if let Some(m) = rule.re.find(rest) {
            let len = m.end();
            match best {
                Some((_, best_len)) if best_len >= len => {}
                _ => best = Some((rule.id, len)),
            }
        }
    }
    best.map(|(id, len)| (id, pos + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(mode: LexMode, line: &str) -> Vec<Id> {
        let mut pos = 0;
        let mut out = Vec::new();
        while pos < line.len() {
            let (id, end) = one_token(mode, line, pos).unwrap();
            out.push(id);
            pos = end;
        }
        out
    }

    #[test]
    fn test_keyword_beats_literal_on_tie() {
        assert_eq!(one_token(LexMode::ShCommand, "for x", 0), Some((Id::KWFor, 3)));
        assert_eq!(one_token(LexMode::ShCommand, "format", 0), Some((Id::LitChars, 6)));
    }

    #[test]
    fn test_longest_match() {
        assert_eq!(one_token(LexMode::ShCommand, "foo=bar", 0), Some((Id::LitVarLike, 4)));
        assert_eq!(one_token(LexMode::ShCommand, "2>&1", 0), Some((Id::RedirGreatAnd, 3)));
        assert_eq!(one_token(LexMode::ShCommand, ";;&", 0), Some((Id::OpDSemiAmp, 3)));
        assert_eq!(one_token(LexMode::ShCommand, "$((", 0), Some((Id::LeftDollarDParen, 3)));
    }

    #[test]
    fn test_command_line() {
        assert_eq!(
            ids(LexMode::ShCommand, "echo hi | wc\n"),
            vec![
                Id::LitChars,
                Id::WSSpace,
                Id::LitChars,
                Id::WSSpace,
                Id::OpPipe,
                Id::WSSpace,
                Id::LitChars,
                Id::OpNewline
            ]
        );
    }

    #[test]
    fn test_dq_mode() {
        assert_eq!(
            ids(LexMode::DQ, r#"a $x \$ ""#),
            vec![Id::LitChars, Id::VSubDollarName, Id::LitChars, Id::LitEscapedChar, Id::LitChars, Id::RightDoubleQuote]
        );
    }

    #[test]
    fn test_arith_mode() {
        assert_eq!(
            ids(LexMode::Arith, "x+=2**3"),
            vec![Id::LitArithVarLike, Id::ArithPlusEqual, Id::LitDigits, Id::ArithDStar, Id::LitDigits]
        );
    }

    #[test]
    fn test_vsub_modes() {
        assert_eq!(one_token(LexMode::VSub1, "#x}", 0), Some((Id::VSubPound, 1)));
        assert_eq!(one_token(LexMode::VSub2, ":-x}", 0), Some((Id::VTestColonHyphen, 2)));
        assert_eq!(one_token(LexMode::VSub2, "##*/}", 0), Some((Id::VOp1DPound, 2)));
    }

    #[test]
    fn test_dbracket_ops() {
        assert_eq!(one_token(LexMode::DBracket, "-z ", 0), Some((Id::BoolUnaryZ, 2)));
        assert_eq!(one_token(LexMode::DBracket, "-zz ", 0), Some((Id::LitChars, 3)));
        assert_eq!(one_token(LexMode::DBracket, "== ", 0), Some((Id::BoolBinaryGlobDEqual, 2)));
    }

    const ALL_MODES: [LexMode; 15] = [
        LexMode::ShCommand,
        LexMode::Comment,
        LexMode::Backtick,
        LexMode::DBracket,
        LexMode::ExtGlob,
        LexMode::BashRegex,
        LexMode::DQ,
        LexMode::VSubArgUnquoted,
        LexMode::VSubArgDQ,
        LexMode::SQRaw,
        LexMode::SQC,
        LexMode::VSub1,
        LexMode::VSub2,
        LexMode::Arith,
        LexMode::FuncParens,
    ];

    /// Every token of `line` with its text. Each token must be non-empty.
    fn tokens(mode: LexMode, line: &str) -> Vec<(Id, &str)> {
        let mut pos = 0;
        let mut out = Vec::new();
        while pos < line.len() {
            let (id, end) = one_token(mode, line, pos).unwrap_or_else(|| panic!("{:?}: no rule at {}", mode, pos));
            assert!(end > pos, "{:?}: empty token at {} in {:?}", mode, pos, line);
            out.push((id, &line[pos..end]));
            pos = end;
        }
        out
    }

    fn assert_relexes(mode: LexMode, line: &str) {
        let first = tokens(mode, line);
        let joined: String = first.iter().map(|(_, text)| *text).collect();
        assert_eq!(joined, line, "{:?}", mode);
        let again: Vec<(Id, &str)> = tokens(mode, &joined);
        assert_eq!(again, first, "{:?}", mode);
    }

    #[test]
    fn test_relex_concatenated_tokens() {
        let cases: &[(LexMode, &str)] = &[
            (LexMode::ShCommand, "for x in a b; do echo \"$x\" ${y:-z} 2>&1 | wc -l; done\n"),
            (LexMode::ShCommand, "a[1]+=v {fd}>out f=(1 2) @(x|y) ;;& |& <(ls) $'c' # end\n"),
            (LexMode::Comment, "# a comment; with | ops"),
            (LexMode::Backtick, "echo \\`x\\` \\$y \\\" z`"),
            (LexMode::DBracket, "-f /etc && $a == b* || ! -z \"$c\" ]]"),
            (LexMode::ExtGlob, "a|b*(c)\\|d)"),
            (LexMode::BashRegex, "^(a|b)+[0-9]{2}$ ]]"),
            (LexMode::DQ, "a $b ${c} $(d) \\$ \\x `e` $\""),
            (LexMode::VSubArgUnquoted, "a b/~c#d%e'f'\"g\"*}"),
            (LexMode::VSubArgDQ, "a b/c#d%e \\} $x}"),
            (LexMode::SQRaw, "it is $raw \\ here'"),
            (LexMode::SQC, "a\\n\\x41\\u00e9\\101\\' b'"),
            (LexMode::VSub1, "#name}"),
            (LexMode::VSub2, ":-%%##^^,,//:@Q}"),
            (LexMode::Arith, "x += y**2 << 1 ? a[i] : $b"),
            (LexMode::FuncParens, " ( ) {"),
        ];
        for (mode, line) in cases {
            assert_relexes(*mode, line);
        }
    }

    #[test]
    fn test_every_mode_covers_any_input() {
        let mut line: String = (0x20u8..0x7f).map(char::from).collect();
        line.push_str("\t\u{e9}\u{4e2d}\u{1f600}");
        for mode in ALL_MODES {
            assert_relexes(mode, &line);
        }
    }

    #[test]
    fn test_eol() {
        assert_eq!(one_token(LexMode::ShCommand, "ab", 2), Some((Id::EolTok, 2)));
        assert_eq!(one_token(LexMode::Comment, "\n", 0), Some((Id::IgnoredComment, 0)));
    }
}
