//! Pattern Matching
//!
//! Shell patterns for `case`, `[[ x == pat ]]` and `${var%pat}`-style
//! operators. A pattern is converted to an anchored regex; quoted parts
//! arrive backslash-escaped, so `\*` is a literal star.
//!
//! `!(...)` has no regex equivalent without lookaround, so a pattern that
//! contains one is split around it and matched by trying every split of
//! the subject.
//!
//! ## Error Handling
//!
//! - Unclosed character classes (`[abc`) are treated as literal `[`
//! - Unknown POSIX classes (`[:foo:]`) match nothing
//! - A pattern whose regex fails to compile matches nothing

use std::collections::HashMap;

use regex_lite::{Regex, RegexBuilder};

use crate::ast::types::PatSubMode;

lazy_static::lazy_static! {
    /// Valid POSIX character class names
    static ref POSIX_CLASSES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("alnum", "a-zA-Z0-9");
        m.insert("alpha", "a-zA-Z");
        m.insert("ascii", "\\x00-\\x7F");
        m.insert("blank", " \\t");
        m.insert("cntrl", "\\x00-\\x1F\\x7F");
        m.insert("digit", "0-9");
        m.insert("graph", "!-~");
        m.insert("lower", "a-z");
        m.insert("print", " -~");
        m.insert("punct", "!-/:-@\\[-`{-~");
        m.insert("space", " \\t\\n\\r\\x0C\\x0B");
        m.insert("upper", "A-Z");
        m.insert("word", "a-zA-Z0-9_");
        m.insert("xdigit", "0-9A-Fa-f");
        m
    };
}

/// Characters that make a word a glob.
const GLOB_META: &[char] = &['*', '?', '['];
/// Characters escaped when quoted text becomes part of a pattern.
const PATTERN_SPECIAL: &[char] = &['*', '?', '[', ']', '\\', '(', ')', '|', '@', '+', '!'];

#[derive(Debug, Clone, Copy, Default)]
pub struct PatternOptions {
    /// Recognize `@(..)`, `*(..)`, `+(..)`, `?(..)` and `!(..)`.
    pub extglob: bool,
    /// `nocasematch` / `nocaseglob`
    pub nocase: bool,
}

/// A compiled shell pattern.
#[derive(Debug, Clone)]
pub enum ShellPattern {
    Regex(Regex),
    /// `head !(arms) tail`
    Negated {
        head: Box<ShellPattern>,
        arms: Box<ShellPattern>,
        tail: Box<ShellPattern>,
    },
}

impl ShellPattern {
    pub fn new(pattern: &str, opts: PatternOptions) -> Option<Self> {
        let chars: Vec<char> = pattern.chars().collect();
        if opts.extglob {
            if let Some((bang, close)) = find_negation(&chars) {
                let head: String = chars[..bang].iter().collect();
                let arms: String = chars[bang + 2..close].iter().collect();
                let tail: String = chars[close + 1..].iter().collect();
                return Some(ShellPattern::Negated {
                    head: Box::new(Self::new(&head, opts)?),
                    arms: Box::new(Self::new(&format!("@({})", arms), opts)?),
                    tail: Box::new(Self::new(&tail, opts)?),
                });
            }
        }
        let re = format!("^(?s:{})$", pattern_to_regex(pattern, opts.extglob));
        RegexBuilder::new(&re)
            .case_insensitive(opts.nocase)
            .build()
            .ok()
            .map(ShellPattern::Regex)
    }

    /// Whether the whole of `text` matches.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            ShellPattern::Regex(re) => re.is_match(text),
            ShellPattern::Negated { head, arms, tail } => {
                let bounds = char_boundaries(text);
                for (n, &i) in bounds.iter().enumerate() {
                    if !head.matches(&text[..i]) {
                        continue;
                    }
                    for &j in &bounds[n..] {
                        if !arms.matches(&text[i..j]) && tail.matches(&text[j..]) {
                            return true;
                        }
                    }
                }
                false
            }
        }
    }
}

/// Match `text` against a shell pattern. Bad patterns match nothing.
pub fn pattern_matches(pattern: &str, text: &str, opts: PatternOptions) -> bool {
    ShellPattern::new(pattern, opts).map_or(false, |p| p.matches(text))
}

fn char_boundaries(s: &str) -> Vec<usize> {
    let mut v: Vec<usize> = s.char_indices().map(|(i, _)| i).collect();
    v.push(s.len());
    v
}

/// Position of the first top-level `!(` and its closing paren.
fn find_negation(chars: &[char]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '[' => {
                let end = find_char_class_end(chars, i);
                i = if end == usize::MAX { i + 1 } else { end + 1 };
            }
            '!' if chars.get(i + 1) == Some(&'(') => {
                let close = find_matching_paren(chars, i + 1);
                if close != usize::MAX {
                    return Some((i, close));
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// Convert a shell glob pattern to an unanchored regex string.
pub fn pattern_to_regex(pattern: &str, extglob: bool) -> String {
    let mut regex = String::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // Extended globs: @(...), *(...), +(...), ?(...)
        if extglob && matches!(c, '@' | '*' | '+' | '?') && chars.get(i + 1) == Some(&'(') {
            let close_idx = find_matching_paren(&chars, i + 1);
            if close_idx != usize::MAX {
                let content: String = chars[i + 2..close_idx].iter().collect();
                let alt_regexes: Vec<String> = split_extglob_alternatives(&content)
                    .iter()
                    .map(|alt| pattern_to_regex(alt, extglob))
                    .collect();
                let group = format!("(?:{})", alt_regexes.join("|"));
                regex.push_str(&group);
                match c {
                    '*' => regex.push('*'),
                    '+' => regex.push('+'),
                    '?' => regex.push('?'),
                    _ => {}
                }
                i = close_idx + 1;
                continue;
            }
        }

        match c {
            '\\' => {
                // \X is a literal X
                match chars.get(i + 1) {
                    Some(next) => {
                        regex.push_str(&regex_lite::escape(&next.to_string()));
                        i += 2;
                    }
                    None => {
                        regex.push_str("\\\\");
                        i += 1;
                    }
                }
            }
            '*' => {
                regex.push_str(".*");
                i += 1;
            }
            '?' => {
                regex.push('.');
                i += 1;
            }
            '[' => {
                let class_end = find_char_class_end(&chars, i);
                if class_end == usize::MAX {
                    regex.push_str("\\[");
                    i += 1;
                } else {
                    regex.push_str(&convert_char_class(&chars[i + 1..class_end]));
                    i = class_end + 1;
                }
            }
            _ => {
                regex.push_str(&regex_lite::escape(&c.to_string()));
                i += 1;
            }
        }
    }
    regex
}

/// Find the matching closing parenthesis, handling nesting
fn find_matching_paren(chars: &[char], open_idx: usize) -> usize {
    let mut depth = 1;
    let mut i = open_idx + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                i += 2;
                continue;
            }
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
        i += 1;
    }
    usize::MAX
}

/// Split extglob content on top-level `|`
fn split_extglob_alternatives(content: &str) -> Vec<String> {
    let mut alternatives = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    let mut it = content.chars();

    while let Some(c) = it.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = it.next() {
                    current.push(next);
                }
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            '|' if depth == 0 => alternatives.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    alternatives.push(current);
    alternatives
}

/// Find the `]` closing the class that starts at `start`.
fn find_char_class_end(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    if i < chars.len() && (chars[i] == '!' || chars[i] == '^') {
        i += 1;
    }
    // A ] right after [ or [! is literal
    if i < chars.len() && chars[i] == ']' {
        i += 1;
    }
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            i += 2;
            continue;
        }
        if chars[i] == ']' {
            return i;
        }
        if chars[i] == '[' && chars.get(i + 1) == Some(&':') {
            let rest: String = chars[i + 2..].iter().collect();
            if let Some(close_pos) = rest.find(":]") {
                i += 2 + rest[..close_pos].chars().count() + 2;
                continue;
            }
        }
        i += 1;
    }
    usize::MAX
}

fn push_class_literal(out: &mut String, c: char) {
    if matches!(c, '\\' | '[' | ']' | '^' | '-' | '&' | '~') {
        out.push('\\');
    }
    out.push(c);
}

/// Convert the inside of `[...]` to a regex class.
fn convert_char_class(content: &[char]) -> String {
    let mut result = String::from("[");
    let mut i = 0;

    if !content.is_empty() && (content[0] == '!' || content[0] == '^') {
        result.push('^');
        i += 1;
    }
    let first = i;

    while i < content.len() {
        let c = content[i];
        if c == '[' && content.get(i + 1) == Some(&':') {
            let rest: String = content[i + 2..].iter().collect();
            if let Some(close_pos) = rest.find(":]") {
                let name = &rest[..close_pos];
                result.push_str(POSIX_CLASSES.get(name).copied().unwrap_or(""));
                i += 2 + name.chars().count() + 2;
                continue;
            }
        }
        if c == '\\' && i + 1 < content.len() {
            push_class_literal(&mut result, content[i + 1]);
            i += 2;
        } else if c == '-' && i > first && i + 1 < content.len() {
            result.push('-');
            i += 1;
        } else {
            push_class_literal(&mut result, c);
            i += 1;
        }
    }

    if result == "[" {
        // Only an unknown POSIX class: match nothing.
        return "[^\\x00-\\x{10FFFF}]".to_string();
    }
    if result == "[^" {
        return ".".to_string();
    }
    result.push(']');
    result
}

// ============================================================================
// Quoting helpers
// ============================================================================

/// Escape `s` so every character matches literally.
pub fn glob_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if PATTERN_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Remove the backslashes `glob_escape` added.
pub fn glob_unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut it = s.chars();
    while let Some(c) = it.next() {
        if c == '\\' {
            if let Some(next) = it.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// True when an unescaped `*`, `?` or `[` appears.
pub fn has_glob_chars(s: &str) -> bool {
    let mut it = s.chars();
    while let Some(c) = it.next() {
        if c == '\\' {
            it.next();
        } else if GLOB_META.contains(&c) {
            return true;
        }
    }
    false
}

// ============================================================================
// Operators on strings
// ============================================================================

/// `${s#pat}` (shortest) and `${s##pat}` (longest).
pub fn strip_prefix(s: &str, pat: &ShellPattern, longest: bool) -> String {
    let bounds = char_boundaries(s);
    let found = if longest {
        bounds.iter().rev().find(|&&i| pat.matches(&s[..i]))
    } else {
        bounds.iter().find(|&&i| pat.matches(&s[..i]))
    };
    match found {
        Some(&i) => s[i..].to_string(),
        None => s.to_string(),
    }
}

/// `${s%pat}` (shortest) and `${s%%pat}` (longest).
pub fn strip_suffix(s: &str, pat: &ShellPattern, longest: bool) -> String {
    let bounds = char_boundaries(s);
    let found = if longest {
        bounds.iter().find(|&&i| pat.matches(&s[i..]))
    } else {
        bounds.iter().rev().find(|&&i| pat.matches(&s[i..]))
    };
    match found {
        Some(&i) => s[..i].to_string(),
        None => s.to_string(),
    }
}

/// Longest match starting at byte `start`, as an end offset.
fn longest_match_at(s: &str, start: usize, pat: &ShellPattern, allow_empty: bool) -> Option<usize> {
    char_boundaries(s)
        .into_iter()
        .rev()
        .filter(|&j| j >= start && (allow_empty || j > start))
        .find(|&j| pat.matches(&s[start..j]))
}

/// `${s/pat/rep}` and its `//`, `/#` and `/%` forms.
pub fn replace_pattern(s: &str, pat: &ShellPattern, rep: &str, mode: PatSubMode) -> String {
    match mode {
        PatSubMode::Prefix => match longest_match_at(s, 0, pat, true) {
            Some(end) => format!("{}{}", rep, &s[end..]),
            None => s.to_string(),
        },
        PatSubMode::Suffix => {
            let found = char_boundaries(s).into_iter().find(|&i| pat.matches(&s[i..]));
            match found {
                Some(i) => format!("{}{}", &s[..i], rep),
                None => s.to_string(),
            }
        }
        PatSubMode::First | PatSubMode::All => {
            let mut out = String::with_capacity(s.len());
            let mut pos = 0;
            let mut replaced = false;
            while pos < s.len() {
                if !(replaced && mode == PatSubMode::First) {
                    if let Some(end) = longest_match_at(s, pos, pat, false) {
                        out.push_str(rep);
                        pos = end;
                        replaced = true;
                        continue;
                    }
                }
                let ch = s[pos..].chars().next().map(char::len_utf8).unwrap_or(1);
                out.push_str(&s[pos..pos + ch]);
                pos += ch;
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pat(p: &str) -> ShellPattern {
        ShellPattern::new(
            p,
            PatternOptions {
                extglob: true,
                nocase: false,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_simple_patterns() {
        assert_eq!(pattern_to_regex("*", false), ".*");
        assert_eq!(pattern_to_regex("?", false), ".");
        assert_eq!(pattern_to_regex("abc", false), "abc");
        assert_eq!(pattern_to_regex("a.b", false), "a\\.b");
    }

    #[test]
    fn test_escaped_chars() {
        assert_eq!(pattern_to_regex("\\*", false), "\\*");
        assert!(pat("\\*").matches("*"));
        assert!(!pat("\\*").matches("x"));
    }

    #[test]
    fn test_character_class() {
        assert_eq!(pattern_to_regex("[abc]", false), "[abc]");
        assert_eq!(pattern_to_regex("[!abc]", false), "[^abc]");
        assert!(pat("[[:digit:]]x").matches("7x"));
        assert!(pat("[]a]").matches("]"));
        assert!(pat("[abc").matches("[abc"));
    }

    #[test]
    fn test_extglob_patterns() {
        assert!(pat("@(foo|bar).c").matches("bar.c"));
        assert!(pat("*(ab)").matches("ababab"));
        assert!(pat("+(ab)").matches("ab"));
        assert!(!pat("+(ab)").matches(""));
        assert!(pat("?(x)y").matches("y"));
    }

    #[test]
    fn test_negated_extglob() {
        assert!(pat("!(*.c)").matches("main.rs"));
        assert!(!pat("!(*.c)").matches("main.c"));
        assert!(pat("x!(a)").matches("xb"));
        assert!(!pat("x!(a)").matches("xa"));
    }

    #[test]
    fn test_nocase() {
        let p = ShellPattern::new("ab*", PatternOptions { extglob: false, nocase: true }).unwrap();
        assert!(p.matches("ABC"));
    }

    #[test]
    fn test_strip() {
        let p = pat("*/");
        assert_eq!(strip_prefix("a/b/c", &p, false), "b/c");
        assert_eq!(strip_prefix("a/b/c", &p, true), "c");
        let p = pat(".*");
        assert_eq!(strip_suffix("f.tar.gz", &p, false), "f.tar");
        assert_eq!(strip_suffix("f.tar.gz", &p, true), "f");
    }

    #[test]
    fn test_replace() {
        let p = pat("o");
        assert_eq!(replace_pattern("foo", &p, "0", PatSubMode::First), "f0o");
        assert_eq!(replace_pattern("foo", &p, "0", PatSubMode::All), "f00");
        let p = pat("f");
        assert_eq!(replace_pattern("foo", &p, "g", PatSubMode::Prefix), "goo");
        assert_eq!(replace_pattern("foo", &pat("o"), "x", PatSubMode::Suffix), "fox");
        assert_eq!(replace_pattern("a.b.c", &pat("."), "-", PatSubMode::All), "a-b-c");
    }

    #[test]
    fn test_glob_escape() {
        assert_eq!(glob_escape("a*b"), "a\\*b");
        assert_eq!(glob_unescape("a\\*b"), "a*b");
        assert!(has_glob_chars("*.rs"));
        assert!(!has_glob_chars("\\*.rs"));
    }
}
