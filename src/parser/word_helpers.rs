//! Word Classification Helpers
//!
//! Small predicates the command parser uses to decide what a word is:
//! an assignment, a keyword, a function name, a tilde prefix.

use crate::ast::types::{ArrayItem, CompoundWord, Word, WordPart};
use crate::parser::arena::Token;
use crate::parser::id_kind::{Id, Kind};

fn literal_id(part: &WordPart) -> Option<Id> {
    match part {
        WordPart::Literal(tok) => Some(tok.id),
        _ => None,
    }
}

/// Where an assignment word splits into name and value.
pub struct AssignmentParts {
    pub left: Token,
    /// `]=` or `]+=` for `a[i]=v`.
    pub close: Option<Token>,
    /// Index of the first part of the value.
    pub offset: usize,
}

/// Detect `FOO=bar`, `FOO+=bar`, `a[x]=bar` and `a[x]+=bar`.
pub fn detect_assignment(w: &CompoundWord) -> Option<AssignmentParts> {
    let first = w.parts.first()?;
    let WordPart::Literal(tok0) = first else {
        return None;
    };
    match tok0.id {
        Id::LitVarLike => Some(AssignmentParts {
            left: tok0.clone(),
            close: None,
            offset: 1,
        }),
        Id::LitArrayLhsOpen => {
            for (i, part) in w.parts.iter().enumerate().skip(1) {
                if let WordPart::Literal(tok) = part {
                    if tok.id == Id::LitArrayLhsClose {
                        return Some(AssignmentParts {
                            left: tok0.clone(),
                            close: Some(tok.clone()),
                            offset: i + 1,
                        });
                    }
                }
            }
            None
        }
        _ => None,
    }
}

/// Detect `[key]=value` inside an array literal.
pub fn detect_assoc_pair(w: &CompoundWord) -> Option<ArrayItem> {
    if literal_id(w.parts.first()?) != Some(Id::LitLBracket) {
        return None;
    }
    for (i, part) in w.parts.iter().enumerate() {
        if literal_id(part) == Some(Id::LitArrayLhsClose) {
            return Some(ArrayItem::Pair {
                key: CompoundWord::new(w.parts[1..i].to_vec()),
                value: CompoundWord::new(w.parts[i + 1..].to_vec()),
            });
        }
    }
    None
}

/// Turn a leading `~` or `~user` into a tilde substitution.
///
/// The prefix must be followed by `/` or the end of the word.
pub fn tilde_detect(w: CompoundWord) -> CompoundWord {
    let is_tilde = matches!(w.parts.first(), Some(WordPart::Literal(t)) if t.id == Id::LitTilde);
    if !is_tilde {
        return w;
    }
    let mut parts = w.parts;
    let mut user = None;
    let mut consumed = 1;
    if let Some(WordPart::Literal(t)) = parts.get(1) {
        if t.id == Id::LitChars {
            user = Some(t.val.clone());
            consumed = 2;
        }
    }
    let ok = match parts.get(consumed) {
        None => true,
        Some(WordPart::Literal(t)) => t.id == Id::LitSlash,
        Some(_) => false,
    };
    if !ok {
        return CompoundWord::new(parts);
    }
    let WordPart::Literal(token) = parts[0].clone() else {
        return CompoundWord::new(parts);
    };
    let rest = parts.split_off(consumed);
    let mut out = vec![WordPart::TildeSub { token, user }];
    out.extend(rest);
    CompoundWord::new(out)
}

/// Tilde detection on the value of an assignment: after `=` and each `:`.
pub fn tilde_detect_assign(w: CompoundWord) -> CompoundWord {
    let mut out: Vec<WordPart> = Vec::with_capacity(w.parts.len());
    let mut segment: Vec<WordPart> = Vec::new();
    for part in w.parts {
        let is_colon = matches!(&part, WordPart::Literal(t) if t.id == Id::LitColon);
        if is_colon {
            out.extend(tilde_detect(CompoundWord::new(std::mem::take(&mut segment))).parts);
            out.push(part);
        } else {
            segment.push(part);
        }
    }
    out.extend(tilde_detect(CompoundWord::new(segment)).parts);
    CompoundWord::new(out)
}

/// `break`, `continue`, `return` or `exit` as a bare word.
pub fn keyword_token(w: &CompoundWord) -> Option<Token> {
    match w.parts.as_slice() {
        [WordPart::Literal(tok)] if tok.id.kind() == Kind::ControlFlow => Some(tok.clone()),
        _ => None,
    }
}

/// Coarse id for command parsing: operators, keywords, `{` and `}`.
pub fn command_id(w: &Word) -> Id {
    match w {
        Word::Operator(tok) => tok.id,
        Word::Compound(cw) => match cw.literal_id() {
            Some(id @ (Id::LitLBrace | Id::LitRBrace | Id::ControlFlowReturn)) => id,
            Some(id) if id.kind() == Kind::KW => id,
            _ => Id::WordCompound,
        },
    }
}

pub fn command_kind(w: &Word) -> Kind {
    match w {
        Word::Operator(tok) => tok.id.kind(),
        Word::Compound(_) => Kind::Word,
    }
}

/// A function name must be an unquoted static word.
pub fn as_func_name(w: &CompoundWord) -> Option<String> {
    w.static_text().filter(|s| !s.is_empty())
}

/// `a=(...)` words may not be followed by anything.
pub fn has_array_part(w: &CompoundWord) -> bool {
    w.parts.iter().any(|p| matches!(p, WordPart::ArrayLiteral(_)))
}

pub fn is_valid_var_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(id: Id, s: &str) -> WordPart {
        WordPart::Literal(Token::synthetic(id, s))
    }

    #[test]
    fn test_detect_assignment() {
        let w = CompoundWord::new(vec![lit(Id::LitVarLike, "x="), lit(Id::LitChars, "1")]);
        let a = detect_assignment(&w).unwrap();
        assert_eq!(a.left.val, "x=");
        assert_eq!(a.offset, 1);

        let w = CompoundWord::new(vec![
            lit(Id::LitArrayLhsOpen, "a["),
            lit(Id::LitChars, "i"),
            lit(Id::LitArrayLhsClose, "]="),
            lit(Id::LitChars, "v"),
        ]);
        let a = detect_assignment(&w).unwrap();
        assert_eq!(a.close.unwrap().val, "]=");
        assert_eq!(a.offset, 3);

        let w = CompoundWord::new(vec![lit(Id::LitChars, "echo")]);
        assert!(detect_assignment(&w).is_none());
    }

    #[test]
    fn test_tilde_detect() {
        let w = tilde_detect(CompoundWord::new(vec![lit(Id::LitTilde, "~"), lit(Id::LitSlash, "/"), lit(Id::LitChars, "x")]));
        assert!(matches!(w.parts[0], WordPart::TildeSub { user: None, .. }));
        assert_eq!(w.parts.len(), 3);

        let w = tilde_detect(CompoundWord::new(vec![lit(Id::LitTilde, "~"), lit(Id::LitChars, "bob")]));
        assert!(matches!(&w.parts[0], WordPart::TildeSub { user: Some(u), .. } if u == "bob"));

        let w = tilde_detect(CompoundWord::new(vec![lit(Id::LitTilde, "~"), lit(Id::LitColon, ":")]));
        assert!(matches!(w.parts[0], WordPart::Literal(_)));
    }

    #[test]
    fn test_tilde_after_colon() {
        let w = tilde_detect_assign(CompoundWord::new(vec![
            lit(Id::LitChars, "a"),
            lit(Id::LitColon, ":"),
            lit(Id::LitTilde, "~"),
        ]));
        assert!(matches!(w.parts[2], WordPart::TildeSub { .. }));
    }

    #[test]
    fn test_var_name() {
        assert!(is_valid_var_name("_x1"));
        assert!(!is_valid_var_name("1x"));
        assert!(!is_valid_var_name(""));
    }
}
