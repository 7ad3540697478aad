//! Job Table
//!
//! Background pipelines and `&` commands are recorded here so `wait`,
//! `jobs`, `fg`, `bg` and `kill %N` can find them. A job's statuses are
//! filled in by the waiter as its processes exit, and the job stays in the
//! table until its status has been reported by `wait` or `jobs`.

use std::fmt;

use nix::unistd::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Stopped,
    /// Exit status of the last process (or pipefail status).
    Done(i32),
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Stopped => write!(f, "Stopped"),
            JobStatus::Done(0) => write!(f, "Done"),
            JobStatus::Done(n) => write!(f, "Exit {}", n),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    /// Process group, equal to the first pid when job control is on.
    pub pgid: Pid,
    pub pids: Vec<Pid>,
    /// One per pid, `None` while the process is running.
    pub statuses: Vec<Option<i32>>,
    pub stopped: bool,
    /// Source text shown by `jobs`.
    pub command: String,
}

impl Job {
    pub fn last_pid(&self) -> Pid {
        self.pids.last().copied().unwrap_or(self.pgid)
    }

    pub fn is_done(&self) -> bool {
        self.statuses.iter().all(Option::is_some)
    }

    pub fn status(&self) -> JobStatus {
        if self.is_done() {
            JobStatus::Done(self.statuses.last().copied().flatten().unwrap_or(0))
        } else if self.stopped {
            JobStatus::Stopped
        } else {
            JobStatus::Running
        }
    }

    /// Statuses of every process, in pipeline order, once all have exited.
    pub fn pipe_status(&self) -> Option<Vec<i32>> {
        self.statuses.iter().copied().collect()
    }
}

#[derive(Debug, Default)]
pub struct JobState {
    jobs: Vec<Job>,
    next_id: usize,
    /// Ids in most-recently-used order; the last entry is `%+`.
    recent: Vec<usize>,
}

impl JobState {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            next_id: 1,
            recent: Vec::new(),
        }
    }

    /// Record a background job and return its id.
    pub fn add(&mut self, pgid: Pid, pids: Vec<Pid>, command: impl Into<String>) -> usize {
        if self.jobs.is_empty() {
            self.next_id = 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        let statuses = vec![None; pids.len()];
        self.jobs.push(Job {
            id,
            pgid,
            pids,
            statuses,
            stopped: false,
            command: command.into(),
        });
        self.recent.push(id);
        id
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn get(&self, id: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    pub fn current(&self) -> Option<usize> {
        self.recent.last().copied()
    }

    pub fn previous(&self) -> Option<usize> {
        let n = self.recent.len();
        if n >= 2 {
            Some(self.recent[n - 2])
        } else {
            None
        }
    }

    /// Resolve `%N`, `%%`, `%+`, `%-`, `%name` or a pid to a job id.
    pub fn find(&self, spec: &str) -> Option<usize> {
        match spec.strip_prefix('%') {
            Some("") | Some("%") | Some("+") => self.current(),
            Some("-") => self.previous(),
            Some(rest) => match rest.parse::<usize>() {
                Ok(n) => self.get(n).map(|j| j.id),
                Err(_) => self
                    .jobs
                    .iter()
                    .rev()
                    .find(|j| j.command.starts_with(rest))
                    .map(|j| j.id),
            },
            None => {
                let pid = Pid::from_raw(spec.parse::<i32>().ok()?);
                self.job_for_pid(pid)
            }
        }
    }

    pub fn job_for_pid(&self, pid: Pid) -> Option<usize> {
        self.jobs.iter().find(|j| j.pids.contains(&pid)).map(|j| j.id)
    }

    /// Called by the waiter when a child exits. Returns the owning job.
    pub fn record_exit(&mut self, pid: Pid, status: i32) -> Option<usize> {
        for job in &mut self.jobs {
            if let Some(i) = job.pids.iter().position(|p| *p == pid) {
                job.statuses[i] = Some(status);
                job.stopped = false;
                return Some(job.id);
            }
        }
        None
    }

    pub fn record_stop(&mut self, pid: Pid) -> Option<usize> {
        let id = self.job_for_pid(pid)?;
        if let Some(job) = self.get_mut(id) {
            job.stopped = true;
        }
        Some(id)
    }

    /// Forget a job after its status has been reported.
    pub fn remove(&mut self, id: usize) -> Option<Job> {
        let pos = self.jobs.iter().position(|j| j.id == id)?;
        self.recent.retain(|r| *r != id);
        Some(self.jobs.remove(pos))
    }

    /// Move `id` to the front for `fg` and `bg`.
    pub fn touch(&mut self, id: usize) {
        self.recent.retain(|r| *r != id);
        self.recent.push(id);
    }

    /// Ids of finished jobs, for notification and `jobs` cleanup.
    pub fn finished(&self) -> Vec<usize> {
        self.jobs.iter().filter(|j| j.is_done()).map(|j| j.id).collect()
    }

    pub fn running(&self) -> Vec<usize> {
        self.jobs.iter().filter(|j| !j.is_done()).map(|j| j.id).collect()
    }

    /// One line of `jobs` output.
    pub fn format_job(&self, job: &Job, long: bool) -> String {
        let marker = if Some(job.id) == self.current() {
            '+'
        } else if Some(job.id) == self.previous() {
            '-'
        } else {
            ' '
        };
        if long {
            format!("[{}]{} {} {}\t{}", job.id, marker, job.pgid, job.status(), job.command)
        } else {
            format!("[{}]{} {}\t{}", job.id, marker, job.status(), job.command)
        }
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.recent.clear();
        self.next_id = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: i32) -> Pid {
        Pid::from_raw(n)
    }

    #[test]
    fn test_job_lookup() {
        let mut js = JobState::new();
        let a = js.add(pid(100), vec![pid(100)], "sleep 10");
        let b = js.add(pid(200), vec![pid(200), pid(201)], "cat | wc");
        assert_eq!((a, b), (1, 2));
        assert_eq!(js.find("%%"), Some(2));
        assert_eq!(js.find("%+"), Some(2));
        assert_eq!(js.find("%-"), Some(1));
        assert_eq!(js.find("%1"), Some(1));
        assert_eq!(js.find("%sleep"), Some(1));
        assert_eq!(js.find("201"), Some(2));
        assert_eq!(js.find("%9"), None);
    }

    #[test]
    fn test_record_exit_completes_pipeline() {
        let mut js = JobState::new();
        let id = js.add(pid(200), vec![pid(200), pid(201)], "a | b");
        js.record_exit(pid(200), 1);
        assert_eq!(js.get(id).unwrap().status(), JobStatus::Running);
        js.record_exit(pid(201), 0);
        let job = js.get(id).unwrap();
        assert_eq!(job.status(), JobStatus::Done(0));
        assert_eq!(job.pipe_status(), Some(vec![1, 0]));
        assert_eq!(js.finished(), vec![id]);
    }

    #[test]
    fn test_ids_restart_when_table_empties() {
        let mut js = JobState::new();
        let a = js.add(pid(1), vec![pid(1)], "x");
        js.remove(a);
        assert_eq!(js.add(pid(2), vec![pid(2)], "y"), 1);
    }

    #[test]
    fn test_format_job() {
        let mut js = JobState::new();
        let id = js.add(pid(42), vec![pid(42)], "sleep 1");
        let line = js.format_job(js.get(id).unwrap(), false);
        assert_eq!(line, "[1]+ Running\tsleep 1");
        js.record_exit(pid(42), 3);
        let line = js.format_job(js.get(id).unwrap(), true);
        assert_eq!(line, "[1]+ 42 Exit 3\tsleep 1");
    }
}
