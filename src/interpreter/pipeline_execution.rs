//! Pipeline Execution
//!
//! Handles execution of command pipelines (cmd1 | cmd2 | cmd3).
//!
//! Each stage is forked with its stdin and stdout wired to pipes. With
//! `shopt -s lastpipe` and job control off, the last stage runs in the
//! shell itself, so `echo x | read v` sets `v`.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use log::trace;
use nix::fcntl::OFlag;
use nix::unistd::{close, dup2, pipe2, Pid};

use crate::ast::types::{Command, Pipeline};
use crate::interpreter::errors::{EvalResult, IoError};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::subshell_group::{command_summary, ProcessGroup};
use crate::process::{RedirTarget, RedirValue, Redirection};

/// Status of a whole pipeline. With pipefail, the leftmost failing stage
/// decides; otherwise the last stage does.
pub fn pipeline_status(statuses: &[i32], pipefail: bool) -> i32 {
    if pipefail {
        if let Some(s) = statuses.iter().find(|s| **s != 0) {
            return *s;
        }
    }
    statuses.last().copied().unwrap_or(0)
}

fn negate(status: i32) -> i32 {
    if status == 0 {
        1
    } else {
        0
    }
}

impl Interpreter {
    pub(crate) fn exec_pipeline(&mut self, node: &Pipeline) -> EvalResult<i32> {
        let negated = node.negated.is_some();
        if node.children.len() == 1 {
            let child = &node.children[0];
            let status = if negated {
                self.with_errexit_suppressed(|sh| sh.execute(child))?
            } else {
                self.execute(child)?
            };
            self.pipe_status = vec![status];
            return Ok(if negated { negate(status) } else { status });
        }

        let statuses = self.run_stages(node)?;
        trace!("pipeline statuses {:?}", statuses);
        let status = pipeline_status(&statuses, self.options.pipefail);
        self.pipe_status = statuses;
        Ok(if negated { negate(status) } else { status })
    }

    fn run_stages(&mut self, node: &Pipeline) -> EvalResult<Vec<i32>> {
        let n = node.children.len();
        let in_shell_last = self.shopt.lastpipe && !self.options.monitor;
        let forked = if in_shell_last { n - 1 } else { n };

        let mut pids: Vec<Pid> = Vec::with_capacity(n);
        let mut pgid: Option<Pid> = None;
        let mut prev_read: Option<OwnedFd> = None;

        for (i, child) in node.children.iter().enumerate().take(forked) {
            let next = if i + 1 < n {
                Some(pipe2(OFlag::O_CLOEXEC).map_err(|e| IoError::new(e, "pipe"))?)
            } else {
                None
            };
            let stdin_fd: Option<RawFd> = prev_read.as_ref().map(|fd| fd.as_raw_fd());
            let (next_r, next_w): (Option<RawFd>, Option<RawFd>) = match &next {
                Some((r, w)) => (Some(r.as_raw_fd()), Some(w.as_raw_fd())),
                None => (None, None),
            };
            let with_stderr = node.stderr_indices.contains(&i);
            let group = match pgid {
                Some(pg) => ProcessGroup::Join(pg),
                None => ProcessGroup::New,
            };

            let pid = self.fork_child(group, move |sh| {
                if let Some(fd) = stdin_fd {
                    dup2(fd, 0)?;
                    let _ = close(fd);
                }
                if let Some(w) = next_w {
                    dup2(w, 1)?;
                    if with_stderr {
                        dup2(w, 2)?;
                    }
                    let _ = close(w);
                }
                if let Some(r) = next_r {
                    let _ = close(r);
                }
                sh.execute(child)
            })?;
            pids.push(pid);
            if pgid.is_none() {
                pgid = Some(pid);
            }

            prev_read = next.map(|(r, w)| {
                drop(w);
                r
            });
        }

        // The in-shell stage may unwind with break/return or an error; the
        // forked stages are reaped before that propagates.
        let mut last_result = None;
        if in_shell_last {
            if let (Some(read_end), Some(child)) = (prev_read.take(), node.children.last()) {
                last_result = Some(self.run_last_stage(child, read_end));
            }
        }
        drop(prev_read);

        let text = node.children.iter().map(command_summary).collect::<Vec<_>>().join(" | ");
        let mut statuses = match pgid {
            Some(pg) => self.wait_foreground(&pids, pg, &text)?,
            None => Vec::new(),
        };
        match last_result {
            Some(Ok(s)) => statuses.push(s),
            Some(Err(e)) => {
                self.pipe_status = statuses;
                return Err(e);
            }
            None => {}
        }
        Ok(statuses)
    }

    /// The lastpipe stage: stdin comes from the pipe for the duration of
    /// the command.
    fn run_last_stage(&mut self, child: &Command, read_end: OwnedFd) -> EvalResult<i32> {
        let redir = Redirection {
            target: RedirTarget::Fd(0),
            value: RedirValue::Dup(read_end.as_raw_fd()),
        };
        if let Err(e) = self.fd_state.push(&[redir]) {
            eprintln!("oshell: {}", e);
            return Ok(1);
        }
        drop(read_end);
        let result = self.execute(child);
        self.pop_redirects();
        result
    }
}
