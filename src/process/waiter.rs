//! Waiter
//!
//! Every blocking `waitpid` in the shell goes through here. When a wait is
//! interrupted by a trapped signal, the host's pending traps run before the
//! call is retried, so a trap is never dropped while the shell is blocked
//! on a child.

use log::{debug, trace};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::interpreter::errors::{EvalResult, IoError};
use crate::process::job_state::JobState;
use crate::process::signals::{self, signal_to_exit_status};

/// What the waiter needs from the shell while it blocks.
pub trait WaitHost {
    /// Run trap handlers for signals that arrived during the wait.
    fn run_pending_traps(&mut self) -> EvalResult<()>;
    fn job_state(&mut self) -> &mut JobState;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// A child exited or was killed; status is already mapped to 0..=255.
    Exited(Pid, i32),
    Stopped(Pid),
    /// Nothing left to wait for.
    NoChildren,
    /// Interrupted by a trapped signal (`wait` builtin only).
    Interrupted(i32),
}

/// Shell-level exit status for a `WaitStatus`.
pub fn status_of(ws: WaitStatus) -> Option<(Pid, i32)> {
    match ws {
        WaitStatus::Exited(pid, code) => Some((pid, code)),
        WaitStatus::Signaled(pid, sig, _) => Some((pid, signal_to_exit_status(sig))),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Waiter {
    /// Report stopped children (job control on).
    pub untraced: bool,
}

impl Waiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn flags(&self) -> Option<WaitPidFlag> {
        if self.untraced {
            Some(WaitPidFlag::WUNTRACED)
        } else {
            None
        }
    }

    /// Wait for one child, any if `pid` is `None`. Statuses of children
    /// belonging to background jobs are stored in the job table.
    ///
    /// With `interruptible`, a trapped signal ends the wait with
    /// `Interrupted(128 + sig)` after its trap runs, which is how `wait`
    /// behaves. Otherwise the wait is retried.
    pub fn wait_one(&self, host: &mut dyn WaitHost, pid: Option<Pid>, interruptible: bool) -> EvalResult<WaitResult> {
        loop {
            match waitpid(pid, self.flags()) {
                Ok(WaitStatus::Stopped(p, _)) => {
                    debug!("child {} stopped", p);
                    host.job_state().record_stop(p);
                    return Ok(WaitResult::Stopped(p));
                }
                Ok(ws) => match status_of(ws) {
                    Some((p, status)) => {
                        trace!("child {} exited with {}", p, status);
                        host.job_state().record_exit(p, status);
                        return Ok(WaitResult::Exited(p, status));
                    }
                    None => continue,
                },
                Err(Errno::EINTR) => {
                    let pending = signals::take_pending();
                    debug!("wait interrupted by {:?}", pending);
                    // take_pending drained the table; put them back for the host.
                    for sig in &pending {
                        signals::mark_pending(*sig);
                    }
                    host.run_pending_traps()?;
                    if interruptible {
                        if let Some(sig) = pending.first() {
                            return Ok(WaitResult::Interrupted(signal_to_exit_status(*sig)));
                        }
                    }
                }
                Err(Errno::ECHILD) => return Ok(WaitResult::NoChildren),
                Err(e) => return Err(IoError::new(e, "waitpid").into()),
            }
        }
    }

    /// Block until `pid` exits and return its status. A child that was
    /// already reaped by an earlier wait is found in the job table.
    pub fn wait_for_pid(&self, host: &mut dyn WaitHost, pid: Pid) -> EvalResult<i32> {
        loop {
            match self.wait_one(host, Some(pid), false)? {
                WaitResult::Exited(p, status) if p == pid => return Ok(status),
                WaitResult::Exited(..) => continue,
                WaitResult::Stopped(_) => return Ok(signal_to_exit_status(nix::sys::signal::Signal::SIGTSTP)),
                WaitResult::NoChildren | WaitResult::Interrupted(_) => {
                    let js = host.job_state();
                    let status = js
                        .job_for_pid(pid)
                        .and_then(|id| js.get(id))
                        .and_then(|job| job.pids.iter().position(|p| *p == pid).and_then(|i| job.statuses[i]));
                    return Ok(status.unwrap_or(127));
                }
            }
        }
    }

    /// Wait for every pid of a foreground pipeline, in order.
    pub fn wait_for_all(&self, host: &mut dyn WaitHost, pids: &[Pid]) -> EvalResult<Vec<i32>> {
        let mut statuses = Vec::with_capacity(pids.len());
        for pid in pids {
            statuses.push(self.wait_for_pid(host, *pid)?);
        }
        Ok(statuses)
    }

    /// Reap finished children without blocking, recording their statuses.
    pub fn poll(&self, host: &mut dyn WaitHost) -> EvalResult<()> {
        loop {
            match waitpid(None::<Pid>, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => return Ok(()),
                Ok(ws) => {
                    if let Some((p, status)) = status_of(ws) {
                        host.job_state().record_exit(p, status);
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(IoError::new(e, "waitpid").into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;
    use nix::unistd::{fork, ForkResult};

    struct TestHost {
        jobs: JobState,
        traps_run: usize,
    }

    impl WaitHost for TestHost {
        fn run_pending_traps(&mut self) -> EvalResult<()> {
            signals::take_pending();
            self.traps_run += 1;
            Ok(())
        }

        fn job_state(&mut self) -> &mut JobState {
            &mut self.jobs
        }
    }

    #[test]
    fn test_status_of() {
        let pid = Pid::from_raw(10);
        assert_eq!(status_of(WaitStatus::Exited(pid, 3)), Some((pid, 3)));
        assert_eq!(status_of(WaitStatus::Signaled(pid, Signal::SIGKILL, false)), Some((pid, 137)));
        assert_eq!(status_of(WaitStatus::StillAlive), None);
    }

    #[test]
    fn test_wait_for_forked_child() {
        let mut host = TestHost {
            jobs: JobState::new(),
            traps_run: 0,
        };
        // SAFETY: the child exits immediately.
        match unsafe { fork() }.unwrap() {
            ForkResult::Child => unsafe { libc::_exit(5) },
            ForkResult::Parent { child } => {
                host.jobs.add(child, vec![child], "exit 5");
                let status = Waiter::new().wait_for_pid(&mut host, child).unwrap();
                assert_eq!(status, 5);
                let id = host.jobs.job_for_pid(child).unwrap();
                assert_eq!(host.jobs.get(id).unwrap().statuses, vec![Some(5)]);
                assert_eq!(host.traps_run, 0);
            }
        }
    }
}
