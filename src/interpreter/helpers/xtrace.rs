//! xtrace (set -x) output
//!
//! PS4 is expanded before each trace line. Its first character is repeated
//! once more for every level of eval, source or substitution nesting.

use log::debug;

use crate::interpreter::errors::EvalResult;
use crate::interpreter::interpreter::Interpreter;

/// PS4 when the variable is unset.
pub const DEFAULT_PS4: &str = "+ ";

/// Repeat the first character of an expanded PS4 for nesting depth.
pub fn indent_prefix(ps4: &str, depth: usize) -> String {
    match ps4.chars().next() {
        Some(first) => {
            let mut out: String = std::iter::repeat(first).take(depth).collect();
            out.push_str(ps4);
            out
        }
        None => String::new(),
    }
}

impl Interpreter {
    fn xtrace_prefix(&mut self) -> String {
        let ps4 = self.mem.get_str("PS4").unwrap_or_else(|| DEFAULT_PS4.to_string());
        // A substitution inside PS4 must not trace itself.
        self.options.xtrace = false;
        let expanded = self.eval_prompt_string(&ps4);
        self.options.xtrace = true;
        let expanded = expanded.unwrap_or_else(|e| {
            debug!("PS4 expansion failed: {}", e);
            ps4
        });
        let depth = self.call_stack.eval_depth.saturating_sub(1) as usize;
        indent_prefix(&expanded, depth)
    }

    /// Print one trace line. `words` are already quoted for display.
    pub(crate) fn xtrace_line(&mut self, words: &[String]) -> EvalResult<()> {
        let prefix = self.xtrace_prefix();
        eprintln!("{}{}", prefix, words.join(" "));
        Ok(())
    }
}
