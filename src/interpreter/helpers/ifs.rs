//! IFS (Internal Field Separator) Handling
//!
//! Classifies IFS characters for the splitters used by:
//! - Word expansion (unquoted substitutions)
//! - read builtin
//! - "$*" and ${!prefix*} joining

/// Default IFS value: space, tab, newline
pub const DEFAULT_IFS: &str = " \t\n";

/// How a character takes part in splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    /// IFS whitespace: runs collapse, leading and trailing runs are dropped.
    White,
    /// Other IFS characters: each one ends exactly one field.
    Black,
    Other,
}

/// The split characters in effect.
#[derive(Debug, Clone)]
pub struct Ifs {
    white: Vec<char>,
    black: Vec<char>,
}

impl Ifs {
    /// `None` is an unset IFS, which means the default.
    pub fn new(ifs: Option<&str>) -> Self {
        let ifs = ifs.unwrap_or(DEFAULT_IFS);
        let (white, black) = ifs.chars().partition(|c| matches!(c, ' ' | '\t' | '\n'));
        Self { white, black }
    }

    pub fn classify(&self, c: char) -> CharClass {
        if self.white.contains(&c) {
            CharClass::White
        } else if self.black.contains(&c) {
            CharClass::Black
        } else {
            CharClass::Other
        }
    }

    /// `IFS=''` turns splitting off.
    pub fn is_empty(&self) -> bool {
        self.white.is_empty() && self.black.is_empty()
    }
}

/// Separator for "$*": the first character of IFS, a space when IFS is
/// unset, nothing when it is empty.
pub fn join_separator(ifs: Option<&str>) -> String {
    match ifs {
        None => " ".to_string(),
        Some(s) => s.chars().next().map(String::from).unwrap_or_default(),
    }
}

/// Split a line for `read` into at most `max_fields` fields. The last
/// field gets the rest of the line, minus trailing IFS whitespace.
///
/// Without `raw`, a backslash makes the next character literal.
pub fn split_for_read(line: &str, ifs: &Ifs, max_fields: usize, raw: bool) -> Vec<String> {
    let chars: Vec<(char, bool)> = unescape_for_read(line, raw);
    let mut fields = Vec::new();
    let mut i = 0;
    let n = chars.len();

    // Leading whitespace is dropped.
    while i < n && !chars[i].1 && ifs.classify(chars[i].0) == CharClass::White {
        i += 1;
    }
    while i < n {
        if max_fields > 0 && fields.len() + 1 == max_fields {
            let mut rest: Vec<(char, bool)> = chars[i..].to_vec();
            while let Some((c, escaped)) = rest.last() {
                if !escaped && ifs.classify(*c) == CharClass::White {
                    rest.pop();
                } else {
                    break;
                }
            }
            fields.push(rest.into_iter().map(|(c, _)| c).collect());
            return fields;
        }
        let mut field = String::new();
        while i < n && (chars[i].1 || ifs.classify(chars[i].0) == CharClass::Other) {
            field.push(chars[i].0);
            i += 1;
        }
        fields.push(field);
        // One delimiter: surrounding whitespace plus at most one other IFS char.
        while i < n && !chars[i].1 && ifs.classify(chars[i].0) == CharClass::White {
            i += 1;
        }
        if i < n && !chars[i].1 && ifs.classify(chars[i].0) == CharClass::Black {
            i += 1;
            while i < n && !chars[i].1 && ifs.classify(chars[i].0) == CharClass::White {
                i += 1;
            }
        }
    }
    fields
}

fn unescape_for_read(line: &str, raw: bool) -> Vec<(char, bool)> {
    if raw {
        return line.chars().map(|c| (c, false)).collect();
    }
    let mut out = Vec::with_capacity(line.len());
    let mut it = line.chars();
    while let Some(c) = it.next() {
        if c == '\\' {
            if let Some(next) = it.next() {
                out.push((next, true));
            }
        } else {
            out.push((c, false));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let ifs = Ifs::new(Some(" :"));
        assert_eq!(ifs.classify(' '), CharClass::White);
        assert_eq!(ifs.classify(':'), CharClass::Black);
        assert_eq!(ifs.classify('a'), CharClass::Other);
        assert!(Ifs::new(Some("")).is_empty());
        assert!(!Ifs::new(None).is_empty());
    }

    #[test]
    fn test_join_separator() {
        assert_eq!(join_separator(None), " ");
        assert_eq!(join_separator(Some("")), "");
        assert_eq!(join_separator(Some(":-")), ":");
    }

    #[test]
    fn test_read_splitting() {
        let ifs = Ifs::new(None);
        assert_eq!(split_for_read("  a  b  c  ", &ifs, 2, true), vec!["a", "b  c"]);
        assert_eq!(split_for_read("a b", &ifs, 0, true), vec!["a", "b"]);
        let ifs = Ifs::new(Some(":"));
        assert_eq!(split_for_read("a::b", &ifs, 0, true), vec!["a", "", "b"]);
    }

    #[test]
    fn test_read_backslash() {
        let ifs = Ifs::new(None);
        assert_eq!(split_for_read("a\\ b c", &ifs, 0, false), vec!["a b", "c"]);
        assert_eq!(split_for_read("a\\ b c", &ifs, 0, true), vec!["a\\", "b", "c"]);
    }
}
