//! Shell Environment
//!
//! Main entry point for running shell source.
//! Ties together the parser, the interpreter and the process-level setup
//! (signals, the terminal) that only a top-level shell does.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal, Write};
use std::path::Path;
use std::rc::Rc;

use log::{debug, warn};
use nix::sys::signal::Signal;
use nix::unistd::{getpgrp, getpid, setpgid, tcsetpgrp, Pid};

use crate::interpreter::errors::{ControlFlow, EvalResult, InterpreterError};
use crate::interpreter::interpreter::{Interpreter, InterpreterOptions};
use crate::parser::arena::{Arena, SourceLine};
use crate::parser::reader::{FileLineReader, LineReader, StringLineReader};
use crate::parser::types::ParseContext;
use crate::parser::command_parser;
use crate::process::signals;

/// Where the shell reads commands from.
#[derive(Debug, Clone)]
pub enum Source {
    /// `-c STRING`
    Command(String),
    /// A script file.
    File(String),
    /// Standard input, interactively when it is a terminal.
    Stdin,
}

/// Prompts handed from the main loop to the reader.
#[derive(Debug, Default)]
struct PromptState {
    /// PS1, shown before the first line of a command.
    primary: Option<String>,
    /// PS2, shown before continuation lines.
    secondary: String,
}

/// Reads stdin a line at a time, writing the prompt to stderr first.
struct PromptingReader {
    inner: FileLineReader,
    prompts: Rc<RefCell<PromptState>>,
}

impl LineReader for PromptingReader {
    fn get_line(&mut self) -> io::Result<Option<Rc<SourceLine>>> {
        let prompt = {
            let mut p = self.prompts.borrow_mut();
            p.primary.take().unwrap_or_else(|| p.secondary.clone())
        };
        let mut err = io::stderr();
        err.write_all(prompt.as_bytes())?;
        err.flush()?;
        let line = self.inner.get_line()?;
        if line.is_none() {
            // End of input on a terminal: finish the prompt line.
            let _ = writeln!(err);
        }
        Ok(line)
    }
}

/// A top-level shell.
pub struct Shell {
    pub interp: Interpreter,
}

impl Shell {
    /// Create a shell. An interactive shell takes over the signals that
    /// would otherwise kill it, and with `monitor` also the terminal.
    pub fn new(opts: InterpreterOptions) -> Self {
        let interactive = opts.interactive;
        let shell = Self {
            interp: Interpreter::new(opts),
        };
        if interactive {
            shell.init_interactive_signals();
        }
        shell
    }

    fn init_interactive_signals(&self) {
        let mut ignored = vec![Signal::SIGQUIT, Signal::SIGTERM];
        if self.interp.options.monitor {
            ignored.extend([Signal::SIGTSTP, Signal::SIGTTOU, Signal::SIGTTIN]);
        }
        for sig in ignored {
            if let Err(e) = signals::ignore(sig) {
                warn!("could not ignore {}: {}", sig, e);
            }
        }
        // SIGINT only interrupts the current command.
        if let Err(e) = signals::install_trap_handler(Signal::SIGINT) {
            warn!("could not handle SIGINT: {}", e);
        }
        if self.interp.options.monitor {
            let pid = getpid();
            if getpgrp() != pid {
                if let Err(e) = setpgid(Pid::from_raw(0), Pid::from_raw(0)) {
                    debug!("setpgid: {}", e);
                }
            }
            if let Err(e) = tcsetpgrp(io::stdin(), pid) {
                debug!("tcsetpgrp: {}", e);
            }
        }
    }

    /// Run commands from `source` and return the shell's exit status,
    /// after the EXIT trap has run.
    pub fn run(&mut self, source: &Source) -> i32 {
        let result = match source {
            Source::Command(src) => self.run_reader("-c", |arena| Box::new(StringLineReader::new(src, arena))),
            Source::File(path) => match File::open(path) {
                Ok(f) => {
                    let name = path.clone();
                    self.run_reader(&name, |arena| {
                        Box::new(FileLineReader::new(Box::new(BufReader::new(f)), arena))
                    })
                }
                Err(e) => {
                    eprintln!("oshell: {}: {}", path, e);
                    return if Path::new(path).exists() { 126 } else { 127 };
                }
            },
            Source::Stdin if self.interp.process.interactive => self.run_interactive(),
            Source::Stdin => self.run_reader("stdin", |arena| {
                Box::new(FileLineReader::new(Box::new(BufReader::new(io::stdin())), arena))
            }),
        };
        self.finish(result)
    }

    fn run_reader(
        &mut self,
        source_name: &str,
        make_reader: impl FnOnce(Rc<Arena>) -> Box<dyn LineReader>,
    ) -> EvalResult<i32> {
        let arena = Arena::new(source_name);
        let ctx = ParseContext::new(Rc::clone(&arena), self.interp.parse_options());
        let mut parser = command_parser(ctx, make_reader(arena));
        self.interp.main_loop(&mut parser, &mut |_| {})
    }

    fn run_interactive(&mut self) -> EvalResult<i32> {
        let prompts = Rc::new(RefCell::new(PromptState::default()));
        let arena = Arena::new("stdin");
        let ctx = ParseContext::new(Rc::clone(&arena), self.interp.parse_options());
        let stdin: Box<dyn BufRead> = Box::new(BufReader::new(io::stdin()));
        let reader = PromptingReader {
            inner: FileLineReader::new(stdin, arena),
            prompts: Rc::clone(&prompts),
        };
        let mut parser = command_parser(ctx, Box::new(reader));
        self.interp.main_loop(&mut parser, &mut |sh| {
            let mut p = prompts.borrow_mut();
            p.primary = Some(prompt_text(sh, "PS1", "$ "));
            p.secondary = prompt_text(sh, "PS2", "> ");
        })
    }

    /// Turn the result of the main loop into an exit status, reporting
    /// errors and running the EXIT trap.
    pub fn finish(&mut self, result: EvalResult<i32>) -> i32 {
        let status = match result {
            Ok(status) => status,
            Err(InterpreterError::ControlFlow(ControlFlow::Exit(n))) => n,
            Err(e) => {
                eprintln!("{}", e.render());
                e.exit_status()
            }
        };
        self.interp.last_status = status;
        let status = self.interp.run_exit_trap().unwrap_or(status);
        debug!("exiting with status {}", status);
        status
    }
}

/// Expand a prompt variable, falling back to `default` when it is unset.
fn prompt_text(sh: &mut Interpreter, var: &str, default: &str) -> String {
    let raw = sh.get_var(var).unwrap_or_else(|| default.to_string());
    match sh.eval_prompt_string(&raw) {
        Ok(s) => s,
        Err(e) => {
            debug!("{} expansion failed: {}", var, e);
            raw
        }
    }
}

/// Whether a shell with no `-c` or script should be interactive.
pub fn stdin_is_interactive() -> bool {
    io::stdin().is_terminal() && io::stderr().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> Shell {
        Shell::new(InterpreterOptions {
            import_env: false,
            ..InterpreterOptions::default()
        })
    }

    #[test]
    fn test_run_command_string() {
        let mut sh = shell();
        assert_eq!(sh.run(&Source::Command("x=1; (exit 3)".to_string())), 3);
        assert_eq!(sh.interp.get_var("x").as_deref(), Some("1"));
    }

    #[test]
    fn test_exit_status_and_exit_trap() {
        let mut sh = shell();
        let status = sh.run(&Source::Command("trap 'seen=yes' EXIT; exit 4".to_string()));
        assert_eq!(status, 4);
        assert_eq!(sh.interp.get_var("seen").as_deref(), Some("yes"));
    }

    #[test]
    fn test_exit_in_exit_trap_overrides() {
        let mut sh = shell();
        assert_eq!(sh.run(&Source::Command("trap 'exit 7' EXIT; true".to_string())), 7);
    }

    #[test]
    fn test_parse_error_is_status_2() {
        let mut sh = shell();
        assert_eq!(sh.run(&Source::Command("echo ok; if then".to_string())), 2);
    }

    #[test]
    fn test_fatal_error_runs_exit_trap() {
        let mut sh = shell();
        let status = sh.run(&Source::Command("trap 'seen=1' EXIT; readonly r=1; r=2; after=1".to_string()));
        assert_eq!(status, 1);
        assert_eq!(sh.interp.get_var("seen").as_deref(), Some("1"));
        assert_eq!(sh.interp.get_var("after"), None);
    }

    #[test]
    fn test_missing_script() {
        let mut sh = shell();
        assert_eq!(sh.run(&Source::File("/no/such/script.sh".to_string())), 127);
    }
}
