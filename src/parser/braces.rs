//! Brace Expansion
//!
//! Detection runs on the parsed word: unquoted `{`, `,` and `}` literal
//! tokens are grouped into `BracedTuple` parts, and `{1..10}` style
//! literals into `BracedRange`. Expansion turns one detected word into the
//! cartesian product of its alternatives, before any other expansion.

use lazy_static::lazy_static;
use regex_lite::Regex;
use thiserror::Error;

use crate::ast::types::{BracedRange, CompoundWord, RangeKind, WordPart};
use crate::parser::arena::Token;
use crate::parser::id_kind::Id;

/// Upper bound on words produced by expanding a single word.
pub const MAX_BRACE_EXPANSIONS: usize = 100_000;

#[derive(Debug, Error, PartialEq)]
pub enum BraceError {
    #[error("brace expansion: too many words (limit {0})")]
    TooMany(usize),
}

lazy_static! {
    static ref INT_RANGE: Regex = Regex::new(r"^(-?[0-9]+)\.\.(-?[0-9]+)(?:\.\.(-?[0-9]+))?$").unwrap();
    static ref CHAR_RANGE: Regex = Regex::new(r"^([a-zA-Z])\.\.([a-zA-Z])(?:\.\.(-?[0-9]+))?$").unwrap();
}

fn range_detect(tok: &Token) -> Option<WordPart> {
    let (re, kind) = if INT_RANGE.is_match(&tok.val) {
        (&*INT_RANGE, RangeKind::Int)
    } else if CHAR_RANGE.is_match(&tok.val) {
        (&*CHAR_RANGE, RangeKind::Char)
    } else {
        return None;
    };
    let caps = re.captures(&tok.val)?;
    let start = caps.get(1)?.as_str().to_string();
    let end = caps.get(2)?.as_str().to_string();
    if kind == RangeKind::Int {
        // out of range for i64, leave it alone
        start.parse::<i64>().ok()?;
        end.parse::<i64>().ok()?;
    }
    let step = match caps.get(3) {
        Some(m) => m.as_str().parse::<i64>().ok()?,
        None => 1,
    };
    Some(WordPart::BracedRange(BracedRange { kind, start, end, step }))
}

struct Frame {
    /// Parts before the `{`.
    prefix: Vec<WordPart>,
    lbrace: WordPart,
    alternatives: Vec<CompoundWord>,
    saw_comma: bool,
}

/// Group brace syntax in `w`. Words without valid brace syntax come back
/// unchanged.
pub fn brace_detect(w: CompoundWord) -> CompoundWord {
    let mut cur: Vec<WordPart> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut found = false;

    for part in &w.parts {
        let id = match part {
            WordPart::Literal(tok) => tok.id,
            _ => {
                cur.push(part.clone());
                continue;
            }
        };
        match id {
            Id::LitLBrace => {
                stack.push(Frame {
                    prefix: std::mem::take(&mut cur),
                    lbrace: part.clone(),
                    alternatives: Vec::new(),
                    saw_comma: false,
                });
            }
            Id::LitComma if !stack.is_empty() => {
                if let Some(top) = stack.last_mut() {
                    top.saw_comma = true;
                    top.alternatives.push(CompoundWord::new(std::mem::take(&mut cur)));
                }
            }
            Id::LitRBrace if !stack.is_empty() => {
                let Some(mut frame) = stack.pop() else {
                    continue;
                };
                if !frame.saw_comma {
                    let range = match cur.as_slice() {
                        [WordPart::Literal(t)] if t.id == Id::LitChars => range_detect(t),
                        _ => None,
                    };
                    let mut prefix = frame.prefix;
                    match range {
                        Some(r) => {
                            found = true;
                            prefix.push(r);
                        }
                        None => {
                            // {foo} is literal
                            prefix.push(frame.lbrace);
                            prefix.append(&mut cur);
                            prefix.push(part.clone());
                        }
                    }
                    cur = prefix;
                    continue;
                }
                found = true;
                frame.alternatives.push(CompoundWord::new(std::mem::take(&mut cur)));
                cur = frame.prefix;
                cur.push(WordPart::BracedTuple(frame.alternatives));
            }
            _ => cur.push(part.clone()),
        }
    }

    if !stack.is_empty() || !found {
        return w;
    }
    CompoundWord::new(cur)
}

pub fn has_brace_parts(w: &CompoundWord) -> bool {
    w.parts
        .iter()
        .any(|p| matches!(p, WordPart::BracedTuple(_) | WordPart::BracedRange(_)))
}

fn range_items(r: &BracedRange) -> Result<Vec<String>, BraceError> {
    let step = r.step.unsigned_abs().max(1);
    match r.kind {
        RangeKind::Int => {
            let (Ok(start), Ok(end)) = (r.start.parse::<i64>(), r.end.parse::<i64>()) else {
                return Ok(vec![format!("{{{}..{}}}", r.start, r.end)]);
            };
            let count = start.abs_diff(end) / step + 1;
            if count > MAX_BRACE_EXPANSIONS as u64 {
                return Err(BraceError::TooMany(MAX_BRACE_EXPANSIONS));
            }
            let padded = |s: &str| {
                let digits = s.trim_start_matches('-');
                digits.len() > 1 && digits.starts_with('0')
            };
            let width = if padded(&r.start) || padded(&r.end) {
                r.start.len().max(r.end.len())
            } else {
                0
            };
            let mut out = Vec::with_capacity(count as usize);
            let mut n = start;
            for _ in 0..count {
                out.push(format!("{:0width$}", n, width = width));
                if start <= end {
                    n = n.saturating_add(step as i64);
                } else {
                    n = n.saturating_sub(step as i64);
                }
            }
            Ok(out)
        }
        RangeKind::Char => {
            let start = r.start.chars().next().map(u32::from).unwrap_or(0);
            let end = r.end.chars().next().map(u32::from).unwrap_or(0);
            let step = step as u32;
            let mut out = Vec::new();
            if start <= end {
                let mut c = start;
                while c <= end {
                    out.extend(char::from_u32(c).map(String::from));
                    c += step;
                }
            } else {
                let mut c = start as i64;
                while c >= end as i64 {
                    out.extend(char::from_u32(c as u32).map(String::from));
                    c -= step as i64;
                }
            }
            Ok(out)
        }
    }
}

fn expand_parts(parts: &[WordPart]) -> Result<Vec<Vec<WordPart>>, BraceError> {
    let mut results: Vec<Vec<WordPart>> = vec![Vec::new()];
    for part in parts {
        let suffixes: Vec<Vec<WordPart>> = match part {
            WordPart::BracedTuple(alts) => {
                let mut all = Vec::new();
                for alt in alts {
                    all.extend(expand_parts(&alt.parts)?);
                }
                all
            }
            WordPart::BracedRange(r) => range_items(r)?
                .into_iter()
                .map(|s| vec![WordPart::Literal(Token::synthetic(Id::LitChars, s))])
                .collect(),
            other => {
                for r in results.iter_mut() {
                    r.push(other.clone());
                }
                continue;
            }
        };
        if results.len().saturating_mul(suffixes.len()) > MAX_BRACE_EXPANSIONS {
            return Err(BraceError::TooMany(MAX_BRACE_EXPANSIONS));
        }
        let mut next = Vec::with_capacity(results.len() * suffixes.len());
        for prefix in &results {
            for suffix in &suffixes {
                let mut combined = prefix.clone();
                combined.extend(suffix.iter().cloned());
                next.push(combined);
            }
        }
        results = next;
    }
    Ok(results)
}

/// Expand every detected word into its alternatives, in order.
pub fn brace_expand_words(words: &[CompoundWord]) -> Result<Vec<CompoundWord>, BraceError> {
    let mut out = Vec::with_capacity(words.len());
    for w in words {
        if has_brace_parts(w) {
            out.extend(expand_parts(&w.parts)?.into_iter().map(CompoundWord::new));
        } else {
            out.push(w.clone());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(id: Id, s: &str) -> WordPart {
        WordPart::Literal(Token::synthetic(id, s))
    }

    fn word(spec: &[(Id, &str)]) -> CompoundWord {
        CompoundWord::new(spec.iter().map(|(id, s)| lit(*id, s)).collect())
    }

    fn texts(words: Vec<CompoundWord>) -> Vec<String> {
        words.into_iter().map(|w| w.static_text().unwrap()).collect()
    }

    #[test]
    fn test_tuple() {
        let w = brace_detect(word(&[
            (Id::LitChars, "a"),
            (Id::LitLBrace, "{"),
            (Id::LitChars, "b"),
            (Id::LitComma, ","),
            (Id::LitChars, "c"),
            (Id::LitRBrace, "}"),
            (Id::LitChars, "d"),
        ]));
        assert!(has_brace_parts(&w));
        assert_eq!(texts(brace_expand_words(&[w]).unwrap()), vec!["abd", "acd"]);
    }

    #[test]
    fn test_nested_and_empty_alternative() {
        let w = brace_detect(word(&[
            (Id::LitLBrace, "{"),
            (Id::LitChars, "x"),
            (Id::LitComma, ","),
            (Id::LitLBrace, "{"),
            (Id::LitChars, "y"),
            (Id::LitComma, ","),
            (Id::LitChars, "z"),
            (Id::LitRBrace, "}"),
            (Id::LitComma, ","),
            (Id::LitRBrace, "}"),
        ]));
        assert_eq!(texts(brace_expand_words(&[w]).unwrap()), vec!["x", "y", "z", ""]);
    }

    #[test]
    fn test_no_comma_is_literal() {
        let w = brace_detect(word(&[(Id::LitLBrace, "{"), (Id::LitChars, "foo"), (Id::LitRBrace, "}")]));
        assert!(!has_brace_parts(&w));
        assert_eq!(w.static_text().as_deref(), Some("{foo}"));
    }

    #[test]
    fn test_unbalanced_is_unchanged() {
        let w = word(&[(Id::LitLBrace, "{"), (Id::LitChars, "a"), (Id::LitComma, ",")]);
        assert_eq!(brace_detect(w.clone()), w);
    }

    #[test]
    fn test_ranges() {
        let w = brace_detect(word(&[(Id::LitLBrace, "{"), (Id::LitChars, "1..10..3"), (Id::LitRBrace, "}")]));
        assert_eq!(texts(brace_expand_words(&[w]).unwrap()), vec!["1", "4", "7", "10"]);

        let w = brace_detect(word(&[(Id::LitLBrace, "{"), (Id::LitChars, "03..1"), (Id::LitRBrace, "}")]));
        assert_eq!(texts(brace_expand_words(&[w]).unwrap()), vec!["03", "02", "01"]);

        let w = brace_detect(word(&[(Id::LitLBrace, "{"), (Id::LitChars, "e..a..2"), (Id::LitRBrace, "}")]));
        assert_eq!(texts(brace_expand_words(&[w]).unwrap()), vec!["e", "c", "a"]);
    }

    #[test]
    fn test_range_limit() {
        let w = brace_detect(word(&[(Id::LitLBrace, "{"), (Id::LitChars, "1..999999999"), (Id::LitRBrace, "}")]));
        assert_eq!(
            brace_expand_words(&[w]),
            Err(BraceError::TooMany(MAX_BRACE_EXPANSIONS))
        );
    }
}
