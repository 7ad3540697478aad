//! Interpreter - Shell State and Main Loop
//!
//! `Interpreter` owns all the state of one shell process: variables,
//! functions, options, the fd and job tables, traps and the counters behind
//! `$?`, `$!` and friends. The evaluators are split across sibling modules
//! as `impl Interpreter` blocks:
//! - Word expansion (word_expansion.rs)
//! - Arithmetic evaluation (arithmetic.rs)
//! - Conditional evaluation (conditionals.rs)
//! - Command execution (execution_engine.rs and friends)
//! - Built-in commands (builtins/)
//! - Redirections (redirections.rs)

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::rc::Rc;

use log::debug;
use nix::sys::signal::Signal;
use nix::unistd::{geteuid, getppid, Pid, User};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ast::types::{Command, ShFunction};
use crate::interpreter::errors::{
    ControlFlow, EvalResult, FatalRuntimeError, InterpreterError,
};
use crate::interpreter::expansion::prompt::PromptContext;
use crate::interpreter::traps::{TrapKey, TrapState};
use crate::interpreter::types::{
    CallStackState, ControlFlowState, ExecutionLimits, ProcessState, ShellOptions, ShoptOptions,
};
use crate::interpreter::variables::{AssignError, Mem, Value};
use crate::parser::arena::Token;
use crate::parser::{parse_program, CommandParser, ParseOptions};
use crate::process::{FdState, JobState, WaitHost, Waiter};

/// Options for creating an interpreter instance.
#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    /// `$0`
    pub dollar0: String,
    /// Positional parameters.
    pub argv: Vec<String>,
    pub options: ShellOptions,
    pub shopt: ShoptOptions,
    /// Execution limits (max recursion, max substitution depth)
    pub limits: ExecutionLimits,
    pub interactive: bool,
    /// Import the process environment as exported variables.
    pub import_env: bool,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            dollar0: "oshell".to_string(),
            argv: Vec::new(),
            options: ShellOptions::default(),
            shopt: ShoptOptions::default(),
            limits: ExecutionLimits::default(),
            interactive: false,
            import_env: true,
        }
    }
}

/// The state of one shell process.
pub struct Interpreter {
    pub mem: Mem,
    pub options: ShellOptions,
    pub shopt: ShoptOptions,
    pub limits: ExecutionLimits,
    pub functions: HashMap<String, ShFunction>,
    pub fd_state: FdState,
    pub jobs: JobState,
    pub waiter: Waiter,
    pub traps: TrapState,
    pub flow: ControlFlowState,
    pub call_stack: CallStackState,
    pub process: ProcessState,
    /// `$?`
    pub last_status: i32,
    /// `${PIPESTATUS[@]}`
    pub pipe_status: Vec<i32>,
    /// `$LINENO`
    pub current_line: usize,
    /// `\#` in prompts.
    pub command_number: usize,
    /// Status of the last command substitution in the current command, so
    /// that `x=$(false)` fails.
    pub(crate) last_cmdsub_status: Option<i32>,
    /// Set when a redirect couldn't be applied; errexit applies to it.
    pub(crate) redirect_failed: bool,
    /// Process substitutions of the current command: child pid and the
    /// parent's end of the pipe.
    pub(crate) proc_subs: Vec<(Pid, RawFd)>,
    /// Seconds added to the clock by assigning `SECONDS`.
    seconds_base: i64,
    rng: StdRng,
}

impl Interpreter {
    pub fn new(opts: InterpreterOptions) -> Self {
        let mut mem = Mem::new(&opts.dollar0, opts.argv);
        if opts.import_env {
            mem.import_environ(std::env::vars().filter(|(k, _)| k != "IFS"));
        }
        let mut process = ProcessState::default();
        process.interactive = opts.interactive;
        let waiter = Waiter {
            untraced: opts.options.monitor,
        };

        let mut interp = Self {
            mem,
            options: opts.options,
            shopt: opts.shopt,
            limits: opts.limits,
            functions: HashMap::new(),
            fd_state: FdState::new(),
            jobs: JobState::new(),
            waiter,
            traps: TrapState::default(),
            flow: ControlFlowState::default(),
            call_stack: CallStackState::default(),
            process,
            last_status: 0,
            pipe_status: vec![0],
            current_line: 0,
            command_number: 1,
            last_cmdsub_status: None,
            redirect_failed: false,
            proc_subs: Vec::new(),
            seconds_base: 0,
            rng: StdRng::from_entropy(),
        };
        interp.init_default_vars();
        interp
    }

    fn init_default_vars(&mut self) {
        let ppid = getppid().as_raw().to_string();
        let _ = self.mem.set_str("PPID", ppid);
        self.mem.set_flags("PPID", None, Some(true));
        if self.mem.get_str("PS4").is_none() {
            let _ = self.mem.set_str("PS4", "+ ");
        }
        if self.mem.get_str("PWD").is_none() {
            if let Ok(cwd) = std::env::current_dir() {
                let _ = self.mem.set_str("PWD", cwd.to_string_lossy().into_owned());
            }
        }
        let _ = self.mem.set_str("OPTIND", "1");
    }

    /// Options for parsing source at runtime: `eval`, `source`, traps.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            parse_at: self.shopt.parse_at,
            extglob: self.shopt.extglob,
        }
    }

    // ---- variables ----

    fn special_scalar(&mut self, name: &str) -> Option<String> {
        Some(match name {
            "?" => self.last_status.to_string(),
            "#" => self.mem.argv().len().to_string(),
            "$" => self.process.shell_pid.to_string(),
            "!" => return self.process.last_background_pid.map(|p| p.to_string()),
            "-" => self.options.flags_string(),
            "0" => self.mem.dollar0.clone(),
            "LINENO" => self.current_line.to_string(),
            "RANDOM" => self.rng.gen_range(0..32768).to_string(),
            "SECONDS" => (self.process.start_time.elapsed().as_secs() as i64 + self.seconds_base).to_string(),
            _ if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) => {
                let n: usize = name.parse().ok()?;
                return self.mem.positional(n);
            }
            _ => return None,
        })
    }

    fn is_special(name: &str) -> bool {
        matches!(name, "?" | "#" | "$" | "!" | "-" | "0" | "@" | "*" | "LINENO" | "RANDOM" | "SECONDS" | "PIPESTATUS")
            || (!name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()))
    }

    /// The value of any variable, including the special ones.
    pub fn get_value(&mut self, name: &str) -> Value {
        match name {
            "@" | "*" => return Value::array(self.mem.argv().iter().cloned()),
            "PIPESTATUS" => {
                return Value::array(self.pipe_status.iter().map(|s| s.to_string()))
            }
            "FUNCNAME" if !self.call_stack.func_names.is_empty() => {
                return Value::array(self.call_stack.func_names.iter().rev().cloned())
            }
            _ => {}
        }
        if Self::is_special(name) {
            return match self.special_scalar(name) {
                Some(s) => Value::Str(s),
                None => Value::Undef,
            };
        }
        self.mem.get(name).cloned().unwrap_or(Value::Undef)
    }

    /// Scalar value, `None` when unset.
    pub fn get_var(&mut self, name: &str) -> Option<String> {
        self.get_value(name).as_scalar()
    }

    pub(crate) fn assign_error(&self, e: AssignError, tok: Option<&Token>) -> InterpreterError {
        FatalRuntimeError::at(e.to_string(), tok).into()
    }

    /// Assign a variable, handling the special names and `set -a`.
    pub fn set_var(&mut self, name: &str, value: Value, tok: Option<&Token>) -> EvalResult<()> {
        match name {
            "RANDOM" => {
                if let Some(seed) = value.as_scalar().and_then(|s| s.trim().parse::<u64>().ok()) {
                    self.rng = StdRng::seed_from_u64(seed);
                }
                return Ok(());
            }
            "SECONDS" => {
                let n = value.as_scalar().and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(0);
                self.seconds_base = n - self.process.start_time.elapsed().as_secs() as i64;
                return Ok(());
            }
            "LINENO" | "PIPESTATUS" => return Ok(()),
            _ => {}
        }
        self.mem.set_value(name, value).map_err(|e| self.assign_error(e, tok))?;
        if self.options.allexport {
            self.mem.set_flags(name, Some(true), None);
        }
        Ok(())
    }

    pub fn set_str(&mut self, name: &str, value: impl Into<String>) -> EvalResult<()> {
        self.set_var(name, Value::Str(value.into()), None)
    }

    /// What prompt escapes like `\u` and `\w` expand to.
    pub fn prompt_context(&mut self) -> PromptContext {
        let user = self.mem.get_str("USER").unwrap_or_else(|| {
            User::from_uid(nix::unistd::getuid())
                .ok()
                .flatten()
                .map(|u| u.name)
                .unwrap_or_default()
        });
        let hostname = nix::unistd::gethostname()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default();
        PromptContext {
            user,
            hostname,
            pwd: self.mem.get_str("PWD").unwrap_or_default(),
            home: self.mem.get_str("HOME").unwrap_or_default(),
            is_root: geteuid().is_root(),
            job_count: self.jobs.jobs().len(),
            command_number: self.command_number,
            shell_name: "oshell".to_string(),
        }
    }

    // ---- running source ----

    /// Guard nesting of `eval`, `source`, traps and substitutions.
    pub(crate) fn enter_eval(&mut self, tok: Option<&Token>) -> EvalResult<()> {
        if self.call_stack.eval_depth >= self.limits.max_substitution_depth {
            return Err(FatalRuntimeError::at(
                format!(
                    "maximum substitution depth ({}) exceeded",
                    self.limits.max_substitution_depth
                ),
                tok,
            )
            .into());
        }
        self.call_stack.eval_depth += 1;
        Ok(())
    }

    pub(crate) fn leave_eval(&mut self) {
        self.call_stack.eval_depth = self.call_stack.eval_depth.saturating_sub(1);
    }

    /// Parse `src` completely, then run it. Used by `eval` and traps.
    pub fn eval_source(&mut self, src: &str, source_name: &str) -> EvalResult<i32> {
        let node = parse_program(src, source_name, self.parse_options())?;
        self.enter_eval(None)?;
        let result = self.execute(&node);
        self.leave_eval();
        result
    }

    /// Read, parse and run one logical line at a time until end of input.
    ///
    /// A parse error stops a script with status 2; an interactive shell
    /// reports it and moves on to the next line. `before_line` runs before
    /// each line is read, which is where the prompt is prepared.
    pub fn main_loop(
        &mut self,
        parser: &mut CommandParser,
        before_line: &mut dyn FnMut(&mut Interpreter),
    ) -> EvalResult<i32> {
        let mut status = 0;
        loop {
            self.run_pending_traps()?;
            if self.process.interactive {
                self.notify_finished_jobs()?;
            }
            before_line(self);
            let node = match parser.parse_logical_line() {
                Ok(Some(node)) => node,
                Ok(None) => break,
                Err(e) => {
                    let err = InterpreterError::from(e);
                    eprintln!("{}", err.render());
                    if self.process.interactive {
                        parser.recover();
                        self.last_status = 2;
                        continue;
                    }
                    return Ok(2);
                }
            };
            if self.options.noexec {
                continue;
            }
            status = match self.execute(&node) {
                Ok(s) => s,
                Err(InterpreterError::ControlFlow(ControlFlow::Exit(n))) => {
                    return Err(ControlFlow::Exit(n).into());
                }
                // break or continue outside a loop, return outside a function
                Err(InterpreterError::ControlFlow(flow)) => {
                    debug!("{} at top level", flow);
                    self.last_status
                }
                Err(e) if self.process.interactive => {
                    eprintln!("{}", e.render());
                    self.last_status = e.exit_status();
                    self.last_status
                }
                Err(e) => return Err(e),
            };
            self.command_number += 1;
        }
        Ok(status)
    }

    /// Print `[1]+ Done ...` for background jobs that finished since the
    /// last prompt, and forget them.
    fn notify_finished_jobs(&mut self) -> EvalResult<()> {
        let waiter = self.waiter;
        waiter.poll(self)?;
        for id in self.jobs.finished() {
            if let Some(job) = self.jobs.get(id) {
                eprintln!("{}", self.jobs.format_job(job, false));
            }
            self.jobs.remove(id);
        }
        Ok(())
    }

    /// Signals whose disposition a forked child must reset. Ignored
    /// signals stay ignored.
    pub(crate) fn child_reset_signals(&self) -> Vec<Signal> {
        let mut sigs: Vec<Signal> = self
            .traps
            .iter()
            .filter_map(|(key, code)| match key {
                TrapKey::Signal(sig) if !code.is_empty() => Some(*sig),
                _ => None,
            })
            .collect();
        if self.process.interactive {
            sigs.extend([Signal::SIGINT, Signal::SIGQUIT, Signal::SIGTSTP, Signal::SIGTTOU, Signal::SIGTTIN]);
        }
        sigs
    }

    /// The definition of a shell function, for `type` and dispatch.
    pub fn function_body(&self, name: &str) -> Option<Rc<Command>> {
        self.functions.get(name).map(|f| Rc::clone(&f.body))
    }
}

impl WaitHost for Interpreter {
    fn run_pending_traps(&mut self) -> EvalResult<()> {
        Interpreter::run_pending_traps(self)
    }

    fn job_state(&mut self) -> &mut JobState {
        &mut self.jobs
    }
}
