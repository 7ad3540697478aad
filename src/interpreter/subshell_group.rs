//! Subshells and Child Processes
//!
//! Every fork goes through `fork_child`. The child is a copy of the shell
//! state; it runs its body, runs its own EXIT trap and exits without ever
//! returning into the parent's evaluation stack.
//!
//! Built on top of it:
//! - `( ... )` subshells
//! - `$(...)` and backtick capture
//! - `<(...)` and `>(...)` process substitution
//! - `cmd &` background jobs
//!
//! Foreground waits also live here, together with the terminal hand-off
//! that job control needs.

use std::fs::File;
use std::io::Read;
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};

use log::{debug, trace};
use nix::fcntl::{fcntl, open, FcntlArg, FdFlag, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{close, dup2, fork, getpgrp, pipe2, setpgid, tcsetpgrp, ForkResult, Pid};

use crate::ast::types::Command;
use crate::interpreter::errors::{ControlFlow, EvalResult, InterpreterError, IoError};
use crate::interpreter::interpreter::Interpreter;
use crate::parser::arena::Token;
use crate::process::raw_bytes;
use crate::process::signals::{self, signal_to_exit_status};
use crate::process::WaitResult;

/// Which process group a forked child joins. Only used with job control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessGroup {
    /// Stay in the shell's group.
    Inherit,
    /// Lead a new group.
    New,
    /// Join an existing pipeline group.
    Join(Pid),
}

/// Trailing newlines are removed from captured output.
pub fn strip_trailing_newlines(mut s: String) -> String {
    while s.ends_with('\n') {
        s.pop();
    }
    s
}

/// Text shown by `jobs` for `cmd &`: the source before the `&`, back to
/// the previous command separator on the same line.
pub fn background_text(terminator: &Token) -> String {
    let Some(line) = &terminator.line else {
        return String::new();
    };
    let before = line.content.get(..terminator.col).unwrap_or_default();
    let start = before.rfind([';', '&']).map(|i| i + 1).unwrap_or(0);
    before[start..].trim().to_string()
}

/// A short description of a command for job listings.
pub fn command_summary(node: &Command) -> String {
    match node {
        Command::Simple(s) => s
            .words
            .iter()
            .map(|w| w.static_text().unwrap_or_else(|| "...".to_string()))
            .collect::<Vec<_>>()
            .join(" "),
        Command::Pipeline(p) => p.children.iter().map(command_summary).collect::<Vec<_>>().join(" | "),
        Command::Sentence(s) => command_summary(&s.child),
        Command::Redirected(r) => command_summary(&r.child),
        Command::Subshell(s) => format!("( {} )", command_summary(&s.child)),
        Command::BraceGroup(_) => "{ ... }".to_string(),
        _ => "...".to_string(),
    }
}

impl Interpreter {
    /// Fork. In the child, `body` runs and the process exits with its
    /// status; in the parent, the child's pid is returned.
    pub(crate) fn fork_child(
        &mut self,
        group: ProcessGroup,
        body: impl FnOnce(&mut Interpreter) -> EvalResult<i32>,
    ) -> EvalResult<Pid> {
        let monitor = self.options.monitor;
        let reset = self.child_reset_signals();
        // SAFETY: the shell is single-threaded; the child runs shell code
        // and exits without returning here.
        match unsafe { fork() }.map_err(|e| IoError::new(e, "fork"))? {
            ForkResult::Child => {
                if monitor {
                    let pgid = match group {
                        ProcessGroup::Join(pg) => pg,
                        _ => Pid::from_raw(0),
                    };
                    if group != ProcessGroup::Inherit {
                        let _ = setpgid(Pid::from_raw(0), pgid);
                    }
                }
                signals::reset_for_child(&reset);
                let status = self.run_in_child(body);
                std::process::exit(status);
            }
            ForkResult::Parent { child } => {
                if monitor {
                    let pgid = match group {
                        ProcessGroup::Join(pg) => Some(pg),
                        ProcessGroup::New => Some(child),
                        ProcessGroup::Inherit => None,
                    };
                    // Both sides set the group so neither can race ahead.
                    if let Some(pg) = pgid {
                        let _ = setpgid(child, pg);
                    }
                }
                debug!("forked child {}", child);
                Ok(child)
            }
        }
    }

    /// Child side of a fork: run `body`, then the EXIT trap.
    fn run_in_child(&mut self, body: impl FnOnce(&mut Interpreter) -> EvalResult<i32>) -> i32 {
        self.process.in_child = true;
        self.process.interactive = false;
        self.options.monitor = false;
        self.waiter.untraced = false;
        self.jobs.clear();
        self.traps.clear_for_subshell();
        let status = match body(self) {
            Ok(s) => s,
            Err(InterpreterError::ControlFlow(ControlFlow::Exit(n))) => n,
            Err(InterpreterError::ControlFlow(_)) => self.last_status,
            Err(e) => {
                eprintln!("{}", e.render());
                e.exit_status()
            }
        };
        self.last_status = status;
        self.run_exit_trap().unwrap_or(status)
    }

    /// Give the terminal to `pgid` when job control is on.
    fn give_terminal(&self, pgid: Pid) {
        if self.options.monitor && self.process.interactive {
            if let Err(e) = tcsetpgrp(std::io::stdin(), pgid) {
                debug!("tcsetpgrp {}: {}", pgid, e);
            }
        }
    }

    /// Wait for the processes of a foreground job, in order.
    ///
    /// With job control, a job that stops is moved to the job table and
    /// reported; its status is 128 + SIGTSTP.
    pub(crate) fn wait_foreground(&mut self, pids: &[Pid], pgid: Pid, text: &str) -> EvalResult<Vec<i32>> {
        self.give_terminal(pgid);
        let waiter = self.waiter;
        let mut statuses: Vec<Option<i32>> = vec![None; pids.len()];
        let mut stopped = false;
        let mut result = Ok(());
        for (i, pid) in pids.iter().enumerate() {
            while statuses[i].is_none() && !stopped {
                match waiter.wait_one(self, Some(*pid), false) {
                    Ok(WaitResult::Exited(_, status)) => statuses[i] = Some(status),
                    Ok(WaitResult::Stopped(_)) => stopped = true,
                    Ok(WaitResult::NoChildren) | Ok(WaitResult::Interrupted(_)) => statuses[i] = Some(127),
                    Err(e) => {
                        result = Err(e);
                        break;
                    }
                }
            }
            if result.is_err() || stopped {
                break;
            }
        }
        self.give_terminal(getpgrp());
        result?;

        if stopped {
            let id = self.jobs.add(pgid, pids.to_vec(), text);
            if let Some(job) = self.jobs.get_mut(id) {
                job.stopped = true;
                job.statuses = statuses.clone();
            }
            if let Some(job) = self.jobs.get(id) {
                eprintln!("\n{}", self.jobs.format_job(job, false));
            }
            let tstp = signal_to_exit_status(nix::sys::signal::Signal::SIGTSTP);
            return Ok(statuses.into_iter().map(|s| s.unwrap_or(tstp)).collect());
        }

        let statuses: Vec<i32> = statuses.into_iter().map(|s| s.unwrap_or(127)).collect();
        let sigint = signal_to_exit_status(nix::sys::signal::Signal::SIGINT);
        if self.process.interactive && statuses.last() == Some(&sigint) {
            eprintln!();
        }
        Ok(statuses)
    }

    /// `( ... )`
    pub(crate) fn run_subshell(&mut self, child: &Command) -> EvalResult<i32> {
        let pid = self.fork_child(ProcessGroup::New, |sh| sh.execute(child))?;
        let statuses = self.wait_foreground(&[pid], pid, &command_summary(child))?;
        Ok(statuses.last().copied().unwrap_or(0))
    }

    /// Run `node` in a child with stdout on a pipe and return what it wrote
    /// and its status.
    fn capture_output(&mut self, node: &Command) -> EvalResult<(String, i32)> {
        let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC).map_err(|e| IoError::new(e, "pipe"))?;
        let (r, w) = (read_end.as_raw_fd(), write_end.as_raw_fd());
        let pid = self.fork_child(ProcessGroup::Inherit, move |sh| {
            dup2(w, 1)?;
            let _ = close(w);
            let _ = close(r);
            sh.execute(node)
        })?;
        drop(write_end);

        let mut file = File::from(read_end);
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match file.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => self.run_pending_traps()?,
                Err(e) => return Err(IoError::from(e).into()),
            }
        }
        drop(file);
        let waiter = self.waiter;
        let status = waiter.wait_for_pid(self, pid)?;
        trace!("command sub {} wrote {} bytes, status {}", pid, buf.len(), status);
        Ok((raw_bytes::decode(&buf), status))
    }

    /// `$(...)`: captured stdout minus trailing newlines. The status is
    /// recorded for assignments like `x=$(false)`.
    pub(crate) fn command_sub(&mut self, node: &Command, tok: &Token) -> EvalResult<String> {
        self.enter_eval(Some(tok))?;
        let result = self.capture_output(node);
        self.leave_eval();
        let (out, status) = result?;
        self.last_cmdsub_status = Some(status);
        self.last_status = status;
        Ok(strip_trailing_newlines(out))
    }

    /// `<(...)` when `is_input`, else `>(...)`. Returns the `/dev/fd/N`
    /// path of the shell's end of the pipe, which stays open until the
    /// current command finishes.
    pub(crate) fn process_sub(&mut self, node: &Command, is_input: bool) -> EvalResult<String> {
        let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC).map_err(|e| IoError::new(e, "pipe"))?;
        let (r, w) = (read_end.as_raw_fd(), write_end.as_raw_fd());
        let pid = self.fork_child(ProcessGroup::Inherit, move |sh| {
            if is_input {
                dup2(w, 1)?;
            } else {
                dup2(r, 0)?;
            }
            let _ = close(w);
            let _ = close(r);
            sh.execute(node)
        })?;
        let keep = if is_input {
            drop(write_end);
            read_end.into_raw_fd()
        } else {
            drop(read_end);
            write_end.into_raw_fd()
        };
        // The command that receives the path must inherit the descriptor.
        fcntl(keep, FcntlArg::F_SETFD(FdFlag::empty())).map_err(|e| IoError::new(e, "fcntl"))?;
        self.proc_subs.push((pid, keep));
        Ok(format!("/dev/fd/{}", keep))
    }

    /// Close the shell's ends of process substitutions and reap them.
    pub(crate) fn finish_proc_subs(&mut self) {
        if self.proc_subs.is_empty() {
            return;
        }
        let subs = std::mem::take(&mut self.proc_subs);
        let waiter = self.waiter;
        for (pid, fd) in subs {
            let _ = close(fd);
            if let Err(e) = waiter.wait_for_pid(self, pid) {
                debug!("process sub {}: {}", pid, e);
            }
        }
    }

    /// `cmd &`. Without job control, the job's stdin is `/dev/null`.
    pub(crate) fn run_background(&mut self, child: &Command, terminator: &Token) -> EvalResult<i32> {
        let monitor = self.options.monitor;
        let pid = self.fork_child(ProcessGroup::New, |sh| {
            if !monitor {
                redirect_stdin_to_null()?;
            }
            sh.execute(child)
        })?;
        let text = background_text(terminator);
        let id = self.jobs.add(pid, vec![pid], text);
        self.process.last_background_pid = Some(pid.as_raw());
        if self.process.interactive {
            eprintln!("[{}] {}", id, pid);
        }
        debug!("job {} started as {}", id, pid);
        Ok(0)
    }
}

fn redirect_stdin_to_null() -> Result<(), IoError> {
    let fd: RawFd = open("/dev/null", OFlag::O_RDONLY, Mode::empty()).map_err(|e| IoError::new(e, "/dev/null"))?;
    if fd != 0 {
        dup2(fd, 0).map_err(|e| IoError::new(e, "/dev/null"))?;
        let _ = close(fd);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpreter::InterpreterOptions;
    use crate::parser::{parse_program, ParseOptions};

    fn interp() -> Interpreter {
        Interpreter::new(InterpreterOptions {
            import_env: false,
            ..InterpreterOptions::default()
        })
    }

    #[test]
    fn test_strip_trailing_newlines() {
        assert_eq!(strip_trailing_newlines("a\n\n".to_string()), "a");
        assert_eq!(strip_trailing_newlines("a\nb".to_string()), "a\nb");
    }

    #[test]
    fn test_background_text() {
        let node = parse_program("x=1; sleep 1 &", "t", ParseOptions::default()).unwrap();
        let Command::CommandList(list) = node else {
            panic!("expected a list: {:?}", node)
        };
        let Command::Sentence(s) = &list[1] else {
            panic!("expected a sentence")
        };
        assert_eq!(background_text(&s.terminator), "sleep 1");
    }

    #[test]
    fn test_command_summary() {
        let node = parse_program("ls -l | wc -l", "t", ParseOptions::default()).unwrap();
        assert_eq!(command_summary(&node), "ls -l | wc -l");
    }

    #[test]
    fn test_subshell_isolates_variables() {
        let mut sh = interp();
        sh.eval_source("x=outer; (x=inner; exit 3); s=$?", "t").unwrap();
        assert_eq!(sh.get_var("x").as_deref(), Some("outer"));
        assert_eq!(sh.get_var("s").as_deref(), Some("3"));
    }

    #[test]
    fn test_command_sub_captures_stdout() {
        let mut sh = interp();
        sh.eval_source("x=$(echo hi; echo there)", "t").unwrap();
        assert_eq!(sh.get_var("x").as_deref(), Some("hi\nthere"));
    }

    #[test]
    fn test_nested_command_sub() {
        let mut sh = interp();
        sh.eval_source("x=$(echo $(echo a)b)", "t").unwrap();
        assert_eq!(sh.get_var("x").as_deref(), Some("ab"));
    }

    #[test]
    fn test_background_job_and_wait() {
        let mut sh = interp();
        sh.eval_source("(exit 4) & wait $!; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("4"));
        assert!(sh.get_var("!").is_some());
    }
}
