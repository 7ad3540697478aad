//! Traps
//!
//! Handlers are stored as source text and parsed when they run, which is
//! also what `trap -p` prints back. Signal handlers only mark the signal
//! pending; the handler code runs later, between commands or when a wait
//! is interrupted.

use indexmap::IndexMap;
use log::{debug, warn};
use nix::sys::signal::Signal;

use crate::interpreter::errors::{ControlFlow, EvalResult, InterpreterError};
use crate::interpreter::interpreter::Interpreter;
use crate::process::signals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapKey {
    Exit,
    Err,
    Debug,
    Signal(Signal),
}

impl TrapKey {
    /// `EXIT`, `ERR`, `INT`, `SIGINT`, `2` ...
    pub fn parse(spec: &str) -> Option<Self> {
        match spec.to_ascii_uppercase().as_str() {
            "EXIT" | "0" => Some(TrapKey::Exit),
            "ERR" => Some(TrapKey::Err),
            "DEBUG" => Some(TrapKey::Debug),
            _ => signals::signal_from_name(spec).map(TrapKey::Signal),
        }
    }

    pub fn name(&self) -> String {
        match self {
            TrapKey::Exit => "EXIT".to_string(),
            TrapKey::Err => "ERR".to_string(),
            TrapKey::Debug => "DEBUG".to_string(),
            TrapKey::Signal(sig) => sig.as_str().to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct TrapState {
    handlers: IndexMap<TrapKey, String>,
    /// The EXIT trap runs at most once.
    exit_trap_ran: bool,
}

impl TrapState {
    pub fn get(&self, key: TrapKey) -> Option<&str> {
        self.handlers.get(&key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TrapKey, &String)> {
        self.handlers.iter()
    }

    /// Signals with an installed handler, including ignored ones.
    pub fn signals(&self) -> Vec<Signal> {
        self.handlers
            .keys()
            .filter_map(|k| match k {
                TrapKey::Signal(sig) => Some(*sig),
                _ => None,
            })
            .collect()
    }

    /// `trap CMD KEY`. An empty command ignores the signal.
    pub fn set(&mut self, key: TrapKey, code: &str) -> nix::Result<()> {
        if let TrapKey::Signal(sig) = key {
            if code.is_empty() {
                signals::ignore(sig)?;
            } else {
                signals::install_trap_handler(sig)?;
            }
        }
        self.handlers.insert(key, code.to_string());
        Ok(())
    }

    /// `trap - KEY`
    pub fn remove(&mut self, key: TrapKey) -> nix::Result<()> {
        if let TrapKey::Signal(sig) = key {
            signals::restore_default(sig)?;
        }
        self.handlers.shift_remove(&key);
        Ok(())
    }

    /// Subshells keep ignored signals but drop every other handler.
    pub fn clear_for_subshell(&mut self) {
        self.handlers.retain(|k, code| matches!(k, TrapKey::Signal(_)) && code.is_empty());
        self.exit_trap_ran = false;
    }
}

impl Interpreter {
    /// Run trap code without disturbing `$?`.
    fn run_trap_code(&mut self, key: TrapKey, code: &str) -> EvalResult<()> {
        debug!("running {} trap", key.name());
        let saved = self.last_status;
        let result = self.eval_source(code, &format!("trap {}", key.name()));
        self.last_status = saved;
        match result {
            Ok(_) => Ok(()),
            Err(InterpreterError::ControlFlow(ControlFlow::Exit(n))) => Err(ControlFlow::Exit(n).into()),
            Err(e @ InterpreterError::ControlFlow(_)) => Err(e),
            Err(e) => {
                eprintln!("{}", e.render());
                Ok(())
            }
        }
    }

    /// Run handlers for signals that arrived since the last check.
    pub fn run_pending_traps(&mut self) -> EvalResult<()> {
        if !signals::any_pending() {
            return Ok(());
        }
        for sig in signals::take_pending() {
            match self.traps.get(TrapKey::Signal(sig)).map(str::to_string) {
                Some(code) if !code.is_empty() => self.run_trap_code(TrapKey::Signal(sig), &code)?,
                Some(_) => {}
                None if sig == Signal::SIGINT && self.process.interactive => eprintln!(),
                None => warn!("signal {} pending without a trap", sig),
            }
        }
        Ok(())
    }

    /// The ERR trap, after a command fails where errexit would apply.
    pub(crate) fn run_err_trap(&mut self) -> EvalResult<()> {
        if let Some(code) = self.traps.get(TrapKey::Err).map(str::to_string) {
            if !code.is_empty() {
                // A failure inside the handler doesn't run it again.
                self.with_errexit_suppressed(|sh| sh.run_trap_code(TrapKey::Err, &code))?;
            }
        }
        Ok(())
    }

    /// The EXIT trap, once, when the shell or a subshell finishes. Returns
    /// the status given to `exit` inside the trap, if any.
    pub fn run_exit_trap(&mut self) -> Option<i32> {
        if self.traps.exit_trap_ran {
            return None;
        }
        self.traps.exit_trap_ran = true;
        let code = self.traps.get(TrapKey::Exit)?.to_string();
        if code.is_empty() {
            return None;
        }
        match self.run_trap_code(TrapKey::Exit, &code) {
            Ok(()) => None,
            Err(InterpreterError::ControlFlow(ControlFlow::Exit(n))) => Some(n),
            Err(_) => None,
        }
    }
}
