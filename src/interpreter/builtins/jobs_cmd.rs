//! Job builtins: wait, jobs, fg, bg
//!
//! wait [-n] [PID | %JOB ...]
//! jobs [-lp]
//! fg [%JOB]
//! bg [%JOB ...]
//!
//! A background job stays in the table, with its statuses, until `wait`
//! or `jobs` has reported it.

use log::debug;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;

use crate::interpreter::builtin_dispatch::CmdValue;
use crate::interpreter::builtins::{out, parse_flags};
use crate::interpreter::errors::{EvalResult, IoError};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::pipeline_execution::pipeline_status;
use crate::process::{JobStatus, WaitResult};

const STATUS_UNKNOWN_PID: i32 = 127;

impl Interpreter {
    /// Block until every process of job `id` has exited. Returns the job's
    /// status, or `128 + sig` if a trapped signal interrupted the wait.
    fn wait_job(&mut self, id: usize) -> EvalResult<i32> {
        let waiter = self.waiter;
        loop {
            let Some(job) = self.jobs.get(id) else {
                return Ok(STATUS_UNKNOWN_PID);
            };
            let pending = job.pids.iter().zip(&job.statuses).find(|(_, s)| s.is_none()).map(|(p, _)| *p);
            let Some(pid) = pending else {
                break;
            };
            match waiter.wait_one(self, Some(pid), true)? {
                WaitResult::Interrupted(n) => return Ok(n),
                WaitResult::NoChildren => {
                    // Reaped elsewhere without being recorded.
                    self.jobs.record_exit(pid, STATUS_UNKNOWN_PID);
                }
                WaitResult::Exited(..) | WaitResult::Stopped(_) => {}
            }
            if self.jobs.get(id).is_some_and(|j| j.stopped && !j.is_done()) {
                return Ok(128 + Signal::SIGTSTP as i32);
            }
        }
        let status = match self.jobs.remove(id) {
            Some(job) => {
                let statuses = job.pipe_status().unwrap_or_default();
                pipeline_status(&statuses, self.options.pipefail)
            }
            None => STATUS_UNKNOWN_PID,
        };
        Ok(status)
    }

    /// `wait` with no operands: every child, then forget finished jobs.
    fn wait_all(&mut self) -> EvalResult<i32> {
        let waiter = self.waiter;
        loop {
            match waiter.wait_one(self, None, true)? {
                WaitResult::Exited(..) | WaitResult::Stopped(_) => {}
                WaitResult::NoChildren => break,
                WaitResult::Interrupted(n) => return Ok(n),
            }
        }
        for id in self.jobs.finished() {
            self.jobs.remove(id);
        }
        Ok(0)
    }

    /// `wait -n`: the next job to finish.
    fn wait_next(&mut self) -> EvalResult<i32> {
        if let Some(id) = self.jobs.finished().first().copied() {
            return self.wait_job(id);
        }
        let waiter = self.waiter;
        loop {
            match waiter.wait_one(self, None, true)? {
                WaitResult::Exited(pid, status) => match self.jobs.job_for_pid(pid) {
                    Some(id) if self.jobs.get(id).is_some_and(|j| j.is_done()) => return self.wait_job(id),
                    Some(_) => continue,
                    None => return Ok(status),
                },
                WaitResult::Stopped(_) => continue,
                WaitResult::NoChildren => return Ok(STATUS_UNKNOWN_PID),
                WaitResult::Interrupted(n) => return Ok(n),
            }
        }
    }
}

fn job_or_current(sh: &Interpreter, spec: Option<&String>, cmd_name: &str) -> Option<usize> {
    let found = match spec {
        Some(s) => sh.jobs.find(s),
        None => sh.jobs.current(),
    };
    if found.is_none() {
        eprintln!(
            "oshell: {}: {}: no such job",
            cmd_name,
            spec.map(String::as_str).unwrap_or("current")
        );
    }
    found
}

pub fn handle_wait(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let (flags, first) = parse_flags(cmd.args(), "n", false)?;
    let operands = &cmd.args()[first..];
    if flags.has('n') {
        return sh.wait_next();
    }
    if operands.is_empty() {
        return sh.wait_all();
    }
    let mut status = 0;
    for spec in operands {
        if !spec.starts_with('%') && spec.parse::<i32>().is_err() {
            eprintln!("oshell: wait: `{}': not a pid or valid job spec", spec);
            status = 2;
            continue;
        }
        status = match sh.jobs.find(spec) {
            Some(id) => sh.wait_job(id)?,
            None if spec.starts_with('%') => {
                eprintln!("oshell: wait: {}: no such job", spec);
                STATUS_UNKNOWN_PID
            }
            None => {
                let pid = Pid::from_raw(spec.parse::<i32>().unwrap_or_default());
                let waiter = sh.waiter;
                match waiter.wait_one(sh, Some(pid), true)? {
                    WaitResult::Exited(_, s) | WaitResult::Interrupted(s) => s,
                    WaitResult::Stopped(_) => 128 + Signal::SIGTSTP as i32,
                    WaitResult::NoChildren => {
                        eprintln!("oshell: wait: pid {} is not a child of this shell", spec);
                        STATUS_UNKNOWN_PID
                    }
                }
            }
        };
    }
    Ok(status)
}

pub fn handle_jobs(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let (flags, _) = parse_flags(cmd.args(), "lp", false)?;
    let waiter = sh.waiter;
    waiter.poll(sh)?;
    let mut text = String::new();
    for job in sh.jobs.jobs() {
        if flags.has('p') {
            text.push_str(&format!("{}\n", job.pgid));
        } else {
            text.push_str(&sh.jobs.format_job(job, flags.has('l')));
            text.push('\n');
        }
    }
    out(&text)?;
    for id in sh.jobs.finished() {
        sh.jobs.remove(id);
    }
    Ok(0)
}

/// Send SIGCONT to a job's group, or to each process without job control.
fn continue_job(sh: &Interpreter, id: usize) -> Result<(), IoError> {
    let Some(job) = sh.jobs.get(id) else {
        return Ok(());
    };
    if sh.options.monitor {
        killpg(job.pgid, Signal::SIGCONT).map_err(|e| IoError::new(e, "killpg"))?;
    } else {
        for pid in &job.pids {
            kill(*pid, Signal::SIGCONT).map_err(|e| IoError::new(e, "kill"))?;
        }
    }
    Ok(())
}

pub fn handle_fg(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let Some(id) = job_or_current(sh, cmd.args().first(), "fg") else {
        return Ok(1);
    };
    sh.jobs.touch(id);
    let Some(job) = sh.jobs.get(id).cloned() else {
        return Ok(1);
    };
    eprintln!("{}", job.command);
    if job.status() == JobStatus::Stopped {
        continue_job(sh, id)?;
    }
    sh.jobs.remove(id);

    let running: Vec<Pid> = job
        .pids
        .iter()
        .zip(&job.statuses)
        .filter(|(_, s)| s.is_none())
        .map(|(p, _)| *p)
        .collect();
    debug!("fg: job {} with {} running processes", id, running.len());
    let waited = sh.wait_foreground(&running, job.pgid, &job.command)?;
    let mut waited = waited.into_iter();
    let statuses: Vec<i32> = job
        .statuses
        .iter()
        .map(|s| s.or_else(|| waited.next()).unwrap_or(0))
        .collect();
    Ok(pipeline_status(&statuses, sh.options.pipefail))
}

pub fn handle_bg(sh: &mut Interpreter, cmd: &CmdValue) -> EvalResult<i32> {
    let specs: Vec<Option<&String>> = if cmd.args().is_empty() {
        vec![None]
    } else {
        cmd.args().iter().map(Some).collect()
    };
    for spec in specs {
        let Some(id) = job_or_current(sh, spec, "bg") else {
            return Ok(1);
        };
        continue_job(sh, id)?;
        sh.jobs.touch(id);
        if let Some(job) = sh.jobs.get_mut(id) {
            job.stopped = false;
        }
        if let Some(job) = sh.jobs.get(id) {
            eprintln!("[{}]+ {} &", job.id, job.command);
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpreter::InterpreterOptions;

    fn interp() -> Interpreter {
        let mut sh = Interpreter::new(InterpreterOptions {
            import_env: false,
            ..InterpreterOptions::default()
        });
        sh.set_str("PATH", "/bin:/usr/bin").unwrap();
        sh
    }

    #[test]
    fn test_wait_pid_status() {
        let mut sh = interp();
        sh.eval_source("sh -c 'exit 4' & wait $!; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("4"));
        assert!(sh.jobs.is_empty());
    }

    #[test]
    fn test_wait_job_spec() {
        let mut sh = interp();
        sh.eval_source("(exit 3) & (exit 5) & wait %1; a=$?; wait %2; b=$?", "t").unwrap();
        assert_eq!(sh.get_var("a").as_deref(), Some("3"));
        assert_eq!(sh.get_var("b").as_deref(), Some("5"));
    }

    #[test]
    fn test_wait_all() {
        let mut sh = interp();
        sh.eval_source("(exit 1) & (exit 2) & wait; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("0"));
        assert!(sh.jobs.is_empty());
    }

    #[test]
    fn test_status_retained_until_waited() {
        let mut sh = interp();
        sh.eval_source("(exit 6) &", "t").unwrap();
        let pid = sh.process.last_background_pid.unwrap();
        let waiter = sh.waiter;
        // Reap it without reporting.
        waiter.wait_for_pid(&mut sh, Pid::from_raw(pid)).unwrap();
        assert_eq!(sh.jobs.jobs().len(), 1);
        sh.eval_source(&format!("wait {}; s=$?", pid), "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("6"));
    }

    #[test]
    fn test_wait_errors() {
        let mut sh = interp();
        sh.eval_source("wait %7; a=$?; wait abc; b=$?", "t").unwrap();
        assert_eq!(sh.get_var("a").as_deref(), Some("127"));
        assert_eq!(sh.get_var("b").as_deref(), Some("2"));
    }

    #[test]
    fn test_fg_waits_for_job() {
        let mut sh = interp();
        sh.eval_source("(exit 9) & fg %1; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("9"));
        assert!(sh.jobs.is_empty());
    }

    #[test]
    fn test_fg_without_jobs() {
        let mut sh = interp();
        sh.eval_source("fg; s=$?", "t").unwrap();
        assert_eq!(sh.get_var("s").as_deref(), Some("1"));
    }
}
