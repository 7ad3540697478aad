//! Interpreter Types
//!
//! Options, limits and the small state structs the interpreter is split
//! into, each covering one concern.

use std::time::Instant;

use crate::parser::types::MAX_PARSER_DEPTH;

/// Shell options (set -e, etc.)
#[derive(Debug, Clone, Default)]
pub struct ShellOptions {
    /// set -e: Exit immediately if a command exits with non-zero status
    pub errexit: bool,
    /// set -u: Treat unset variables as an error when substituting
    pub nounset: bool,
    /// set -o pipefail: A pipeline fails if any stage fails
    pub pipefail: bool,
    /// set -x: Print commands and their arguments as they are executed
    pub xtrace: bool,
    /// set -f: Disable filename expansion (globbing)
    pub noglob: bool,
    /// set -C: Prevent overwriting files with redirection
    pub noclobber: bool,
    /// set -n: Read commands but do not execute them
    pub noexec: bool,
    /// set -a: Export all variables
    pub allexport: bool,
    /// set -m: Run jobs in their own process groups
    pub monitor: bool,
}

/// `set -o` names with their single-letter flags.
const SET_OPTION_NAMES: &[(&str, Option<char>)] = &[
    ("allexport", Some('a')),
    ("errexit", Some('e')),
    ("monitor", Some('m')),
    ("noclobber", Some('C')),
    ("noexec", Some('n')),
    ("noglob", Some('f')),
    ("nounset", Some('u')),
    ("pipefail", None),
    ("xtrace", Some('x')),
];

impl ShellOptions {
    pub fn names() -> impl Iterator<Item = &'static str> {
        SET_OPTION_NAMES.iter().map(|(n, _)| *n)
    }

    /// `e` -> `errexit`
    pub fn name_for_flag(flag: char) -> Option<&'static str> {
        SET_OPTION_NAMES
            .iter()
            .find(|(_, c)| *c == Some(flag))
            .map(|(n, _)| *n)
    }

    fn slot(&mut self, name: &str) -> Option<&mut bool> {
        Some(match name {
            "allexport" => &mut self.allexport,
            "errexit" => &mut self.errexit,
            "monitor" => &mut self.monitor,
            "noclobber" => &mut self.noclobber,
            "noexec" => &mut self.noexec,
            "noglob" => &mut self.noglob,
            "nounset" => &mut self.nounset,
            "pipefail" => &mut self.pipefail,
            "xtrace" => &mut self.xtrace,
            _ => return None,
        })
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.clone().slot(name).map(|b| *b)
    }

    /// Returns false for an unknown name.
    pub fn set(&mut self, name: &str, value: bool) -> bool {
        match self.slot(name) {
            Some(b) => {
                *b = value;
                true
            }
            None => false,
        }
    }

    /// The value of `$-`.
    pub fn flags_string(&self) -> String {
        let mut out = String::new();
        for (name, flag) in SET_OPTION_NAMES {
            if let Some(c) = flag {
                if self.get(name) == Some(true) {
                    out.push(*c);
                }
            }
        }
        out.push('h');
        out
    }
}

/// Shopt options (shopt -s, etc.)
#[derive(Debug, Clone, Default)]
pub struct ShoptOptions {
    /// shopt -s nullglob: Return empty for non-matching globs instead of the pattern
    pub nullglob: bool,
    /// shopt -s failglob: Fail if a glob pattern has no matches
    pub failglob: bool,
    /// shopt -s dotglob: Include dotfiles in glob expansion
    pub dotglob: bool,
    /// shopt -s nocaseglob: Case-insensitive filename globbing
    pub nocaseglob: bool,
    /// shopt -s nocasematch: Case-insensitive matching in [[ ]] and case
    pub nocasematch: bool,
    /// shopt -s extglob: Enable @(), *(), +(), ?(), !()
    pub extglob: bool,
    /// shopt -s lastpipe: Run the last pipeline stage in the shell itself
    pub lastpipe: bool,
    /// shopt -s strict_arith: Non-numeric strings in arithmetic are errors
    pub strict_arith: bool,
    /// shopt -s strict_errexit: Calling a function where errexit is disabled is an error
    pub strict_errexit: bool,
    /// shopt -s parse_at: `@name` splices an array
    pub parse_at: bool,
    /// shopt -s globstar: Accepted, `**` matches like `*`
    pub globstar: bool,
}

const SHOPT_NAMES: &[&str] = &[
    "dotglob",
    "extglob",
    "failglob",
    "globstar",
    "lastpipe",
    "nocaseglob",
    "nocasematch",
    "nullglob",
    "parse_at",
    "strict_arith",
    "strict_errexit",
];

impl ShoptOptions {
    pub fn names() -> impl Iterator<Item = &'static str> {
        SHOPT_NAMES.iter().copied()
    }

    fn slot(&mut self, name: &str) -> Option<&mut bool> {
        Some(match name {
            "dotglob" => &mut self.dotglob,
            "extglob" => &mut self.extglob,
            "failglob" => &mut self.failglob,
            "globstar" => &mut self.globstar,
            "lastpipe" => &mut self.lastpipe,
            "nocaseglob" => &mut self.nocaseglob,
            "nocasematch" => &mut self.nocasematch,
            "nullglob" => &mut self.nullglob,
            "parse_at" => &mut self.parse_at,
            "strict_arith" => &mut self.strict_arith,
            "strict_errexit" => &mut self.strict_errexit,
            _ => return None,
        })
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.clone().slot(name).map(|b| *b)
    }

    pub fn set(&mut self, name: &str, value: bool) -> bool {
        match self.slot(name) {
            Some(b) => {
                *b = value;
                true
            }
            None => false,
        }
    }
}

/// Execution limits configuration.
#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    /// Maximum depth of nested function calls
    pub max_recursion_depth: u32,
    /// Maximum nesting of parsed constructs, per parse
    pub max_parse_depth: usize,
    /// Maximum nesting of `eval`, `source` and substitutions evaluated at runtime
    pub max_substitution_depth: u32,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_recursion_depth: 1000,
            max_parse_depth: MAX_PARSER_DEPTH,
            max_substitution_depth: 200,
        }
    }
}

// ============================================================================
// Call Stack State
// ============================================================================

/// Tracks the function call stack and source file nesting.
#[derive(Debug, Clone, Default)]
pub struct CallStackState {
    /// Current function call depth
    pub call_depth: u32,
    /// Current `source` nesting depth, so `return` works in sourced files
    pub source_depth: u32,
    /// Names of the functions being run, innermost last
    pub func_names: Vec<String>,
    /// Nesting of `eval`, `source` and substitutions
    pub eval_depth: u32,
}

// ============================================================================
// Control Flow State
// ============================================================================

/// Tracks loop nesting and errexit suppression.
#[derive(Debug, Clone, Default)]
pub struct ControlFlowState {
    /// Current loop nesting depth (for break/continue)
    pub loop_depth: u32,
    /// Non-zero while running a condition, a `&&`/`||` operand or a
    /// negated pipeline, where errexit doesn't apply
    pub errexit_suppressed: u32,
}

// ============================================================================
// Process State
// ============================================================================

/// Tracks process identity and timing.
#[derive(Debug, Clone)]
pub struct ProcessState {
    /// Time when the shell started (for $SECONDS)
    pub start_time: Instant,
    /// `$$`, which stays the same in subshells
    pub shell_pid: i32,
    /// PID of the last background job (for $!)
    pub last_background_pid: Option<i32>,
    /// True in a forked child: subshells, pipeline stages, substitutions
    pub in_child: bool,
    /// True when reading commands from a terminal
    pub interactive: bool,
}

impl Default for ProcessState {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            shell_pid: nix::unistd::getpid().as_raw(),
            last_background_pid: None,
            in_child: false,
            interactive: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_options_by_name() {
        let mut opts = ShellOptions::default();
        assert!(opts.set("errexit", true));
        assert_eq!(opts.get("errexit"), Some(true));
        assert!(!opts.set("vi", true));
        assert_eq!(opts.get("vi"), None);
        assert_eq!(ShellOptions::name_for_flag('u'), Some("nounset"));
        assert_eq!(ShellOptions::name_for_flag('z'), None);
    }

    #[test]
    fn test_flags_string() {
        let mut opts = ShellOptions::default();
        opts.errexit = true;
        opts.xtrace = true;
        assert_eq!(opts.flags_string(), "exh");
    }

    #[test]
    fn test_shopt_by_name() {
        let mut opts = ShoptOptions::default();
        assert!(opts.set("nullglob", true));
        assert!(opts.nullglob);
        assert_eq!(opts.get("strict_arith"), Some(false));
        assert!(!opts.set("no_such_option", true));
    }
}
