//! Pathname Expansion
//!
//! Expands a field's glob pattern against the filesystem with the `glob`
//! crate. Field patterns escape quoted characters with a backslash; the
//! crate has no backslash escapes, so they are rewritten as one-character
//! classes (`\*` becomes `[*]`) first.

use glob::{glob_with, MatchOptions};
use log::trace;

use crate::interpreter::expansion::pattern::{glob_unescape, has_glob_chars};
use crate::interpreter::expansion::word_split::Field;

/// The `shopt` settings that affect pathname expansion.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobOptions {
    pub nullglob: bool,
    pub failglob: bool,
    pub dotglob: bool,
    pub nocaseglob: bool,
}

/// What happened to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobOutcome {
    /// No glob characters, or no matches with default settings.
    Literal(String),
    Matches(Vec<String>),
    /// No matches under `nullglob`.
    Dropped,
    /// No matches under `failglob`.
    Failed(String),
}

/// Rewrite a backslash-escaped shell pattern for the `glob` crate.
fn to_glob_syntax(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    if in_class {
                        out.push(next);
                    } else if matches!(next, '*' | '?' | '[' | ']') {
                        out.push('[');
                        out.push(next);
                        out.push(']');
                    } else {
                        out.push(next);
                    }
                }
            }
            '[' if !in_class => {
                in_class = true;
                out.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('!');
                }
                // A leading ] is a member, not the end.
                if chars.peek() == Some(&']') {
                    chars.next();
                    out.push(']');
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Expand one field. Sorted matches replace it; otherwise the options
/// decide between the literal text, nothing, or an error.
pub fn expand_field(field: &Field, opts: GlobOptions) -> GlobOutcome {
    if !has_glob_chars(&field.pattern) {
        return GlobOutcome::Literal(field.text.clone());
    }
    let match_opts = MatchOptions {
        case_sensitive: !opts.nocaseglob,
        require_literal_separator: true,
        require_literal_leading_dot: !opts.dotglob,
    };
    let pattern = to_glob_syntax(&field.pattern);
    let paths = match glob_with(&pattern, match_opts) {
        Ok(paths) => paths,
        Err(e) => {
            trace!("bad glob {:?}: {}", pattern, e);
            return GlobOutcome::Literal(field.text.clone());
        }
    };
    let mut matches: Vec<String> = paths
        .filter_map(Result::ok)
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    trace!("glob {:?} matched {} paths", pattern, matches.len());

    if matches.is_empty() {
        if opts.failglob {
            return GlobOutcome::Failed(glob_unescape(&field.pattern));
        }
        if opts.nullglob {
            return GlobOutcome::Dropped;
        }
        return GlobOutcome::Literal(field.text.clone());
    }
    matches.sort();
    GlobOutcome::Matches(matches)
}
