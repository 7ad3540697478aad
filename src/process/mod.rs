//! Process substrate: fd save and restore, the job table, signal-aware
//! waiting and exec of external programs.

pub mod external;
pub mod fd_state;
pub mod job_state;
pub mod raw_bytes;
pub mod signals;
pub mod waiter;

pub use external::{exec_program, find_in_path};
pub use fd_state::{open_flags_for, read_byte, write_fd, FdState, RedirOpen, RedirTarget, RedirValue, Redirection};
pub use job_state::{Job, JobState, JobStatus};
pub use waiter::{WaitHost, WaitResult, Waiter};
