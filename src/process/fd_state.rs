//! File Descriptor State
//!
//! Redirects are applied in frames. `push` saves each descriptor it is
//! about to replace by duplicating it above `SAVE_FD_MIN` (close-on-exec),
//! and `pop` puts the saved copies back in reverse order. The evaluator
//! pops on every path out of a redirected command, including errors and
//! control flow. `exec` with only redirects calls `make_permanent`, which
//! forgets the saved copies so nothing is restored.

use std::fs::File;
use std::io::{Read, Write};
use std::mem::ManuallyDrop;
use std::os::fd::{FromRawFd, IntoRawFd, RawFd};

use log::{debug, trace};
use nix::errno::Errno;
use nix::fcntl::{fcntl, open, FcntlArg, OFlag};
use nix::sys::stat::Mode;
use nix::sys::wait::waitpid;
use nix::unistd::{close, dup2, fork, pipe, ForkResult, Pid};

use crate::interpreter::errors::IoError;
use crate::process::raw_bytes;

/// Saved copies of redirected descriptors live at or above this number.
pub const SAVE_FD_MIN: RawFd = 100;
/// `{name}>file` descriptors are allocated at or above this number.
pub const NAMED_FD_MIN: RawFd = 10;
/// Bodies up to this size are written straight into the pipe.
pub const HERE_DOC_PIPE_LIMIT: usize = 4096;

/// What a redirect puts on its target descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum RedirValue {
    /// Open a file. With `noclobber`, an existing regular file is refused.
    Path { path: String, flags: OFlag, noclobber: bool },
    /// `>&N` and `<&N`
    Dup(RawFd),
    /// `>&-`
    Close,
    /// Here-doc or here-string body, read from a pipe.
    HereDoc(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirTarget {
    Fd(RawFd),
    /// `{name}>file` allocates a fresh descriptor and stores it in `name`.
    VarName(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Redirection {
    pub target: RedirTarget,
    pub value: RedirValue,
}

#[derive(Debug)]
enum SavedFd {
    /// `fd` was open; its old contents are in `saved`.
    Restore { fd: RawFd, saved: RawFd },
    /// `fd` was closed before the redirect.
    Close(RawFd),
}

#[derive(Debug, Default)]
struct RedirFrame {
    saved: Vec<SavedFd>,
    /// Here-doc writer children to reap when the frame is popped.
    writers: Vec<Pid>,
}

#[derive(Debug, Default)]
pub struct FdState {
    frames: Vec<RedirFrame>,
}

fn open_path(path: &str, flags: OFlag, noclobber: bool) -> Result<RawFd, IoError> {
    let os_path = raw_bytes::to_os(path);
    if noclobber {
        if let Ok(meta) = std::fs::metadata(&os_path) {
            if meta.is_file() {
                return Err(IoError::new(Errno::EEXIST, format!("{}: cannot overwrite existing file", path)));
            }
        }
    }
    open(os_path.as_os_str(), flags, Mode::from_bits_truncate(0o666)).map_err(|e| IoError::new(e, path))
}

/// Put `body` on the read end of a fresh pipe. Large bodies are written by
/// a child so a full pipe can't block the shell.
fn here_doc_fd(body: &str, writers: &mut Vec<Pid>) -> Result<RawFd, IoError> {
    let (read_end, write_end) = pipe().map_err(|e| IoError::new(e, "pipe"))?;
    if body.len() <= HERE_DOC_PIPE_LIMIT {
        let mut w = File::from(write_end);
        w.write_all(&raw_bytes::encode(body))?;
    } else {
        // SAFETY: the child only writes to the pipe and exits.
        match unsafe { fork() }.map_err(|e| IoError::new(e, "fork"))? {
            ForkResult::Child => {
                drop(read_end);
                let mut w = File::from(write_end);
                let status = if w.write_all(&raw_bytes::encode(body)).is_ok() { 0 } else { 1 };
                std::process::exit(status);
            }
            ForkResult::Parent { child } => {
                debug!("here doc writer {} for {} bytes", child, body.len());
                writers.push(child);
                drop(write_end);
            }
        }
    }
    Ok(read_end.into_raw_fd())
}

fn reap(writers: &[Pid]) {
    for pid in writers {
        loop {
            match waitpid(*pid, None) {
                Err(Errno::EINTR) => continue,
                _ => break,
            }
        }
    }
}

impl FdState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn save(frame: &mut RedirFrame, fd: RawFd) -> Result<(), IoError> {
        match fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(SAVE_FD_MIN)) {
            Ok(saved) => {
                trace!("saved fd {} as {}", fd, saved);
                frame.saved.push(SavedFd::Restore { fd, saved });
                Ok(())
            }
            Err(Errno::EBADF) => {
                frame.saved.push(SavedFd::Close(fd));
                Ok(())
            }
            Err(e) => Err(IoError::new(e, format!("saving fd {}", fd))),
        }
    }

    /// Move `new_fd` onto `target`, saving what was there.
    fn install(frame: &mut RedirFrame, new_fd: RawFd, target: RawFd) -> Result<(), IoError> {
        if new_fd == target {
            // The open landed on a closed descriptor; closing it restores.
            frame.saved.push(SavedFd::Close(target));
            return Ok(());
        }
        Self::save(frame, target)?;
        dup2(new_fd, target).map_err(|e| IoError::new(e, format!("{}", target)))?;
        let _ = close(new_fd);
        Ok(())
    }

    fn apply(frame: &mut RedirFrame, r: &Redirection) -> Result<Option<(String, RawFd)>, IoError> {
        let new_fd = match &r.value {
            RedirValue::Path { path, flags, noclobber } => open_path(path, *flags, *noclobber)?,
            RedirValue::HereDoc(body) => here_doc_fd(body, &mut frame.writers)?,
            RedirValue::Dup(src) => {
                fcntl(*src, FcntlArg::F_GETFD).map_err(|e| IoError::new(e, format!("{}", src)))?;
                match &r.target {
                    RedirTarget::Fd(target) if target == src => return Ok(None),
                    RedirTarget::Fd(target) => {
                        Self::save(frame, *target)?;
                        dup2(*src, *target).map_err(|e| IoError::new(e, format!("{}", target)))?;
                        return Ok(None);
                    }
                    RedirTarget::VarName(name) => {
                        let fd = fcntl(*src, FcntlArg::F_DUPFD(NAMED_FD_MIN))
                            .map_err(|e| IoError::new(e, name.clone()))?;
                        return Ok(Some((name.clone(), fd)));
                    }
                }
            }
            RedirValue::Close => {
                if let RedirTarget::Fd(target) = &r.target {
                    Self::save(frame, *target)?;
                    let _ = close(*target);
                }
                return Ok(None);
            }
        };
        match &r.target {
            RedirTarget::Fd(target) => {
                Self::install(frame, new_fd, *target)?;
                Ok(None)
            }
            RedirTarget::VarName(name) => {
                let fd = fcntl(new_fd, FcntlArg::F_DUPFD(NAMED_FD_MIN)).map_err(|e| IoError::new(e, name.clone()))?;
                let _ = close(new_fd);
                Ok(Some((name.clone(), fd)))
            }
        }
    }

    /// Apply `redirs` in order in a new frame. On failure everything done
    /// so far is undone and no frame is left behind.
    ///
    /// Returns the descriptors allocated for `{name}` redirects.
    pub fn push(&mut self, redirs: &[Redirection]) -> Result<Vec<(String, RawFd)>, IoError> {
        let mut frame = RedirFrame::default();
        let mut named = Vec::new();
        for r in redirs {
            match Self::apply(&mut frame, r) {
                Ok(Some(pair)) => named.push(pair),
                Ok(None) => {}
                Err(e) => {
                    Self::restore(&mut frame);
                    reap(&frame.writers);
                    return Err(e);
                }
            }
        }
        self.frames.push(frame);
        Ok(named)
    }

    fn restore(frame: &mut RedirFrame) {
        while let Some(saved) = frame.saved.pop() {
            match saved {
                SavedFd::Restore { fd, saved } => {
                    if let Err(e) = dup2(saved, fd) {
                        debug!("restoring fd {}: {}", fd, e);
                    }
                    let _ = close(saved);
                    trace!("restored fd {}", fd);
                }
                SavedFd::Close(fd) => {
                    let _ = close(fd);
                }
            }
        }
    }

    /// Undo the top frame. Returns here-doc writers the caller must reap.
    pub fn pop(&mut self) -> Vec<Pid> {
        match self.frames.pop() {
            Some(mut frame) => {
                Self::restore(&mut frame);
                frame.writers
            }
            None => Vec::new(),
        }
    }

    /// Keep the top frame's redirects in place for good (`exec >file`).
    pub fn make_permanent(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            for saved in frame.saved.drain(..) {
                if let SavedFd::Restore { saved, .. } = saved {
                    let _ = close(saved);
                }
            }
        }
    }
}

/// Borrow `fd` as a `File` without taking ownership of it.
fn with_fd<T>(fd: RawFd, f: impl FnOnce(&mut File) -> T) -> T {
    // SAFETY: the File is never dropped, so `fd` is not closed here.
    let mut file = ManuallyDrop::new(unsafe { File::from_raw_fd(fd) });
    f(&mut file)
}

/// Write all of `data` to `fd`, unbuffered, retrying on EINTR. Builtins
/// write this way so their output interleaves correctly with children
/// sharing the descriptor.
pub fn write_fd(fd: RawFd, data: &[u8]) -> Result<(), IoError> {
    with_fd(fd, |file| {
        let mut rest = data;
        while !rest.is_empty() {
            match file.write(rest) {
                Ok(0) => return Err(IoError::new(Errno::EIO, format!("write to fd {}", fd))),
                Ok(n) => rest = &rest[n..],
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    })
}

/// Read one byte from `fd`, so nothing past the current line is consumed.
/// `None` at end of input. An interrupted read is returned as an error for
/// the caller to run traps.
pub fn read_byte(fd: RawFd) -> Result<Option<u8>, IoError> {
    with_fd(fd, |file| {
        let mut buf = [0u8; 1];
        match file.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) => Err(e.into()),
        }
    })
}

/// Flags for opening a redirect target.
pub fn open_flags_for(op: RedirOpen) -> OFlag {
    match op {
        RedirOpen::Read => OFlag::O_RDONLY,
        RedirOpen::Truncate => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
        RedirOpen::Append => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_APPEND,
        RedirOpen::ReadWrite => OFlag::O_RDWR | OFlag::O_CREAT,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirOpen {
    Read,
    Truncate,
    Append,
    ReadWrite,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::os::fd::FromRawFd;

    fn temp_path(name: &str) -> String {
        let dir = std::env::temp_dir();
        format!("{}/oshell-fd-{}-{}", dir.display(), std::process::id(), name)
    }

    #[test]
    fn test_open_flags() {
        assert!(open_flags_for(RedirOpen::Append).contains(OFlag::O_APPEND));
        assert!(open_flags_for(RedirOpen::Truncate).contains(OFlag::O_TRUNC));
        assert_eq!(open_flags_for(RedirOpen::Read), OFlag::O_RDONLY);
    }

    #[test]
    fn test_named_fd_allocation_and_here_doc() {
        let mut st = FdState::new();
        let named = st
            .push(&[Redirection {
                target: RedirTarget::VarName("fd".into()),
                value: RedirValue::HereDoc("hello\n".into()),
            }])
            .unwrap();
        assert_eq!(named.len(), 1);
        let (name, fd) = &named[0];
        assert_eq!(name, "fd");
        assert!(*fd >= NAMED_FD_MIN);
        // SAFETY: the descriptor was just allocated for this test.
        let mut f = unsafe { File::from_raw_fd(*fd) };
        let mut s = String::new();
        f.read_to_string(&mut s).unwrap();
        assert_eq!(s, "hello\n");
        assert!(st.pop().is_empty());
    }

    #[test]
    fn test_noclobber_refuses_existing_file() {
        let path = temp_path("noclobber");
        std::fs::write(&path, "x").unwrap();
        let err = open_path(&path, open_flags_for(RedirOpen::Truncate), true).unwrap_err();
        assert_eq!(err.errno, Errno::EEXIST);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_failed_push_leaves_no_frame() {
        let mut st = FdState::new();
        let err = st.push(&[Redirection {
            target: RedirTarget::Fd(57),
            value: RedirValue::Path {
                path: "/nonexistent/dir/file".into(),
                flags: OFlag::O_RDONLY,
                noclobber: false,
            },
        }]);
        assert!(err.is_err());
        assert_eq!(st.depth(), 0);
    }
}
