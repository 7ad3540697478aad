//! Word Splitting
//!
//! Assembles the evaluated parts of one word into argv fields.
//!
//! Parts arrive in order, each tagged quoted or unquoted. Unquoted text
//! from substitutions is split on IFS; quoted text and literal source text
//! only ever extend the current field. Each field also carries a glob
//! pattern in which the quoted characters are escaped, so a later glob
//! pass can't expand them.
//!
//! Splitting state carries across parts, so in `$a"$b"` with `a="1 2"`
//! the quoted `$b` joins the last field of `$a`.

use crate::interpreter::expansion::pattern::glob_escape;
use crate::interpreter::helpers::ifs::{CharClass, Ifs};

/// One argv field before globbing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Field {
    /// The field with quotes removed.
    pub text: String,
    /// The same text as a glob pattern: quoted characters are escaped.
    pub pattern: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitState {
    /// Nothing since the start of the word, or only leading whitespace.
    Start,
    InField,
    /// A field was closed by IFS whitespace.
    AfterWhite,
    /// A field was closed by a non-whitespace IFS character.
    AfterBlack,
}

pub struct FieldBuilder<'a> {
    ifs: &'a Ifs,
    fields: Vec<Field>,
    cur: Option<Field>,
    state: SplitState,
}

impl<'a> FieldBuilder<'a> {
    pub fn new(ifs: &'a Ifs) -> Self {
        Self {
            ifs,
            fields: Vec::new(),
            cur: None,
            state: SplitState::Start,
        }
    }

    fn current(&mut self) -> &mut Field {
        self.state = SplitState::InField;
        self.cur.get_or_insert_with(Field::default)
    }

    fn close(&mut self) {
        if let Some(f) = self.cur.take() {
            self.fields.push(f);
        }
    }

    /// Quoted text. Always opens a field, so `""` is an empty argument.
    pub fn push_quoted(&mut self, s: &str) {
        let f = self.current();
        f.text.push_str(s);
        f.pattern.push_str(&glob_escape(s));
    }

    /// Unquoted text that isn't subject to splitting, like literal source
    /// text. Glob characters in it stay active.
    pub fn push_literal(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        let f = self.current();
        f.text.push_str(s);
        f.pattern.push_str(s);
    }

    /// Unquoted substitution result, split on IFS.
    pub fn push_split(&mut self, s: &str) {
        if self.ifs.is_empty() {
            self.push_literal(s);
            return;
        }
        for c in s.chars() {
            match self.ifs.classify(c) {
                CharClass::White => match self.state {
                    SplitState::InField => {
                        self.close();
                        self.state = SplitState::AfterWhite;
                    }
                    // Whitespace around a delimiter belongs to it.
                    SplitState::Start | SplitState::AfterWhite | SplitState::AfterBlack => {}
                },
                CharClass::Black => {
                    match self.state {
                        SplitState::InField => self.close(),
                        SplitState::AfterWhite => {}
                        // Two delimiters in a row, or a leading one, delimit an empty field.
                        SplitState::Start | SplitState::AfterBlack => self.fields.push(Field::default()),
                    }
                    self.state = SplitState::AfterBlack;
                }
                CharClass::Other => {
                    let f = self.current();
                    f.text.push(c);
                    f.pattern.push(c);
                }
            }
        }
    }

    /// `"$@"` and `"${a[@]}"`: the first element joins the current field,
    /// each later one starts a new field. An empty list adds nothing.
    pub fn push_quoted_items(&mut self, items: &[String]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.close();
            }
            self.push_quoted(item);
        }
    }

    /// Unquoted `$@`, `$*` and `${a[@]}`: every element is split on its
    /// own and elements never join each other.
    pub fn push_split_items(&mut self, items: &[String]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 && self.state == SplitState::InField {
                self.close();
                self.state = SplitState::AfterWhite;
            }
            self.push_split(item);
        }
    }

    pub fn finish(mut self) -> Vec<Field> {
        self.close();
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(fields: Vec<Field>) -> Vec<String> {
        fields.into_iter().map(|f| f.text).collect()
    }

    #[test]
    fn test_whitespace_collapses() {
        let ifs = Ifs::new(None);
        let mut b = FieldBuilder::new(&ifs);
        b.push_split("  a  b  ");
        assert_eq!(texts(b.finish()), vec!["a", "b"]);
    }

    #[test]
    fn test_black_delimiters() {
        let ifs = Ifs::new(Some(":"));
        let mut b = FieldBuilder::new(&ifs);
        b.push_split("a::b:");
        assert_eq!(texts(b.finish()), vec!["a", "", "b"]);

        let ifs = Ifs::new(Some(" :"));
        let mut b = FieldBuilder::new(&ifs);
        b.push_split(" :a : b");
        assert_eq!(texts(b.finish()), vec!["", "a", "b"]);
    }

    #[test]
    fn test_quoted_joins_last_field() {
        let ifs = Ifs::new(None);
        let mut b = FieldBuilder::new(&ifs);
        b.push_split("1 2");
        b.push_quoted("3 4");
        assert_eq!(texts(b.finish()), vec!["1", "23 4"]);
    }

    #[test]
    fn test_empty_quoted_is_a_field() {
        let ifs = Ifs::new(None);
        let mut b = FieldBuilder::new(&ifs);
        b.push_quoted("");
        assert_eq!(texts(b.finish()), vec![""]);

        let mut b = FieldBuilder::new(&ifs);
        b.push_split("");
        assert!(b.finish().is_empty());
    }

    #[test]
    fn test_quoted_at() {
        let ifs = Ifs::new(None);
        let items = vec!["a b".to_string(), "c".to_string()];
        let mut b = FieldBuilder::new(&ifs);
        b.push_literal("x");
        b.push_quoted_items(&items);
        b.push_literal("y");
        assert_eq!(texts(b.finish()), vec!["xa b", "cy"]);

        let mut b = FieldBuilder::new(&ifs);
        b.push_quoted_items(&[]);
        assert!(b.finish().is_empty());
    }

    #[test]
    fn test_unquoted_at() {
        let ifs = Ifs::new(None);
        let items = vec!["a b".to_string(), "".to_string(), "c".to_string()];
        let mut b = FieldBuilder::new(&ifs);
        b.push_split_items(&items);
        assert_eq!(texts(b.finish()), vec!["a", "b", "c"]);

        let no_split = Ifs::new(Some(""));
        let mut b = FieldBuilder::new(&no_split);
        b.push_split_items(&items);
        assert_eq!(texts(b.finish()), vec!["a b", "c"]);
    }

    #[test]
    fn test_pattern_escapes_quoted() {
        let ifs = Ifs::new(None);
        let mut b = FieldBuilder::new(&ifs);
        b.push_literal("*.");
        b.push_quoted("*");
        let fields = b.finish();
        assert_eq!(fields[0].text, "*.*");
        assert_eq!(fields[0].pattern, "*.\\*");
    }

    #[test]
    fn test_ifs_empty_disables_split() {
        let ifs = Ifs::new(Some(""));
        let mut b = FieldBuilder::new(&ifs);
        b.push_split("a b");
        assert_eq!(texts(b.finish()), vec!["a b"]);
    }
}
