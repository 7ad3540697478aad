//! Command Resolution
//!
//! Evaluation of a simple command, from words to a status:
//! - expand the words (assignment builtins keep `name=value` operands whole)
//! - evaluate `FOO=bar` prefixes
//! - trace, apply redirects, bind the prefixes
//! - look the name up: function, special builtin, builtin, then `PATH`

use log::{debug, trace};

use crate::ast::types::{CompoundWord, SimpleCommand};
use crate::interpreter::builtin_dispatch::{is_assignment_builtin, lookup_builtin, lookup_special, CmdValue};
use crate::interpreter::errors::EvalResult;
use crate::interpreter::helpers::quoting::quote_for_trace;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::subshell_group::ProcessGroup;
use crate::parser::command_parser::assign_pair_of;
use crate::process::external::STATUS_NOT_FOUND;
use crate::process::{exec_program, find_in_path};

impl Interpreter {
    pub(crate) fn exec_simple(&mut self, node: &SimpleCommand) -> EvalResult<i32> {
        self.current_line = node.line;
        self.last_cmdsub_status = None;

        let cmd = self.eval_simple_words(&node.words)?;
        let env = self.eval_more_env(&node.more_env)?;

        if self.options.xtrace {
            let mut words: Vec<String> = env.iter().map(|(k, v)| format!("{}={}", k, quote_for_trace(v))).collect();
            words.extend(cmd.argv.iter().map(|w| quote_for_trace(w)));
            words.extend(cmd.pairs.iter().map(|p| p.trace_text()));
            if !words.is_empty() {
                self.xtrace_line(&words)?;
            }
        }

        if !self.apply_redirects(&node.redirects)? {
            self.finish_proc_subs();
            return Ok(1);
        }
        let result = self.run_simple(cmd, env);
        self.pop_redirects();
        self.finish_proc_subs();
        result
    }

    fn run_simple(&mut self, cmd: CmdValue, env: Vec<(String, String)>) -> EvalResult<i32> {
        if cmd.argv.is_empty() {
            // Only prefixes and redirects, e.g. `FOO=bar >out`: the
            // bindings persist.
            for (name, value) in env {
                self.set_str(&name, value)?;
            }
            return Ok(self.last_cmdsub_status.unwrap_or(0));
        }
        let has_env = !env.is_empty();
        if has_env {
            self.mem.push_temp(env);
        }
        let result = self.run_command(&cmd, false);
        if has_env {
            self.mem.pop_temp();
        }
        result
    }

    /// Expand the words of a simple command. For assignment builtins,
    /// words that look like `name=value` are evaluated as assignments.
    fn eval_simple_words(&mut self, words: &[CompoundWord]) -> EvalResult<CmdValue> {
        let loc = words.first().and_then(|w| w.first_token()).cloned();
        let first = words.first().and_then(|w| w.static_text());
        if !first.as_deref().is_some_and(is_assignment_builtin) {
            let (argv, arg_locs) = self.eval_argv(words)?;
            return Ok(CmdValue::with_locs(argv, arg_locs));
        }

        let mut cmd = CmdValue::new(Vec::new(), loc.clone());
        cmd.argv.push(first.unwrap_or_default());
        cmd.arg_locs.push(loc);
        for w in &words[1..] {
            if let Some(pair) = assign_pair_of(w) {
                let arg = self.eval_assign_pair(&pair)?;
                cmd.pairs.push(arg);
                continue;
            }
            for s in self.eval_word_sequence(std::slice::from_ref(w))? {
                if cmd.pairs.is_empty() && (s.starts_with('-') || s.starts_with('+')) && s.len() > 1 {
                    cmd.argv.push(s);
                    cmd.arg_locs.push(w.first_token().cloned());
                } else {
                    cmd.pairs.push(crate::interpreter::builtin_dispatch::assign_arg_of(&s, w.first_token()));
                }
            }
        }
        Ok(cmd)
    }

    /// Find and run `cmd.argv[0]`.
    pub(crate) fn run_command(&mut self, cmd: &CmdValue, skip_functions: bool) -> EvalResult<i32> {
        let name = cmd.name();
        if !skip_functions {
            if let Some(body) = self.function_body(name) {
                let args = cmd.args().to_vec();
                return self.call_function(name, body, args, cmd.loc.as_ref());
            }
        }
        if let Some(f) = lookup_special(name).or_else(|| lookup_builtin(name)) {
            trace!("builtin {}", name);
            return self.run_builtin(f, cmd);
        }
        self.run_external(cmd)
    }

    fn run_external(&mut self, cmd: &CmdValue) -> EvalResult<i32> {
        let path_var = self.get_var("PATH");
        if find_in_path(cmd.name(), path_var.as_deref()).is_none() {
            eprintln!("oshell: {}: command not found", cmd.name());
            return Ok(STATUS_NOT_FOUND);
        }
        let argv = cmd.argv.clone();
        let environ = self.mem.exported_environ();
        let pid = self.fork_child(ProcessGroup::New, move |_| {
            Ok(exec_program(&argv, &environ, path_var.as_deref()))
        })?;
        debug!("started {} as {}", cmd.name(), pid);
        let statuses = self.wait_foreground(&[pid], pid, &cmd.argv.join(" "))?;
        Ok(statuses.last().copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpreter::InterpreterOptions;

    fn interp() -> Interpreter {
        Interpreter::new(InterpreterOptions {
            import_env: false,
            ..InterpreterOptions::default()
        })
    }

    #[test]
    fn test_command_not_found() {
        let mut sh = interp();
        sh.set_str("PATH", "/bin:/usr/bin").unwrap();
        sh.eval_source("no-such-command-oshell; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("127"));
    }

    #[test]
    fn test_external_status() {
        let mut sh = interp();
        sh.set_str("PATH", "/bin:/usr/bin").unwrap();
        sh.eval_source("sh -c 'exit 3'; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("3"));
    }

    #[test]
    fn test_prefix_binding_is_temporary_and_exported() {
        let mut sh = interp();
        sh.set_str("PATH", "/bin:/usr/bin").unwrap();
        sh.eval_source("x=$(FOO=bar sh -c 'echo $FOO'); y=${FOO-unset}", "t").unwrap();
        assert_eq!(sh.get_var("x").as_deref(), Some("bar"));
        assert_eq!(sh.get_var("y").as_deref(), Some("unset"));
    }

    #[test]
    fn test_prefix_only_persists() {
        let mut sh = interp();
        sh.eval_source("FOO=bar >/dev/null", "t").unwrap();
        assert_eq!(sh.get_var("FOO").as_deref(), Some("bar"));
    }

    #[test]
    fn test_function_before_builtin() {
        let mut sh = interp();
        sh.eval_source("echo() { r=called; }; echo hi", "t").unwrap();
        assert_eq!(sh.get_var("r").as_deref(), Some("called"));
    }

    #[test]
    fn test_declare_operands_not_split() {
        let mut sh = interp();
        sh.eval_source("v='a b'; declare x=$v", "t").unwrap();
        assert_eq!(sh.get_var("x").as_deref(), Some("a b"));
    }

    #[test]
    fn test_process_substitution() {
        let mut sh = interp();
        sh.set_str("PATH", "/bin:/usr/bin").unwrap();
        sh.eval_source("x=$(cat <(echo from-sub))", "t").unwrap();
        assert_eq!(sh.get_var("x").as_deref(), Some("from-sub"));
    }
}
