//! File test operators for `[[ ]]` and `test`.
//!
//! Unary tests like `-f` and `-x` and the binary `-nt`, `-ot` and `-ef`
//! work against the real filesystem. `-t` asks whether a descriptor is a
//! terminal.

use std::fs::{self, Metadata};
use std::os::unix::fs::{FileTypeExt, MetadataExt};

use nix::unistd::{access, getegid, geteuid, AccessFlags};

use crate::parser::id_kind::Id;

const S_ISUID: u32 = 0o4000;
const S_ISGID: u32 = 0o2000;

fn can_access(path: &str, flags: AccessFlags) -> bool {
    access(path, flags).is_ok()
}

/// Evaluate a unary file test. Returns `None` for ids that aren't file
/// tests, so the caller can report them.
pub fn unary_file_test(op: Id, operand: &str) -> Option<bool> {
    if op == Id::BoolUnaryT {
        let Ok(fd) = operand.trim().parse::<i32>() else {
            return Some(false);
        };
        // SAFETY: isatty only inspects the descriptor number.
        return Some(unsafe { libc::isatty(fd) } == 1);
    }

    // -L and -h look at the link itself.
    if matches!(op, Id::BoolUnaryL | Id::BoolUnaryH) {
        return Some(
            fs::symlink_metadata(operand)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false),
        );
    }

    let meta: Option<Metadata> = fs::metadata(operand).ok();
    let exists = meta.is_some();
    let result = match op {
        Id::BoolUnaryA | Id::BoolUnaryE => exists,
        Id::BoolUnaryF => meta.map(|m| m.is_file()).unwrap_or(false),
        Id::BoolUnaryD => meta.map(|m| m.is_dir()).unwrap_or(false),
        Id::BoolUnaryS => meta.map(|m| m.len() > 0).unwrap_or(false),
        Id::BoolUnaryB => meta.map(|m| m.file_type().is_block_device()).unwrap_or(false),
        Id::BoolUnaryC => meta.map(|m| m.file_type().is_char_device()).unwrap_or(false),
        Id::BoolUnaryP => meta.map(|m| m.file_type().is_fifo()).unwrap_or(false),
        Id::BoolUnarySocket => meta.map(|m| m.file_type().is_socket()).unwrap_or(false),
        Id::BoolUnaryU => meta.map(|m| m.mode() & S_ISUID != 0).unwrap_or(false),
        Id::BoolUnaryG => meta.map(|m| m.mode() & S_ISGID != 0).unwrap_or(false),
        Id::BoolUnaryOwned => meta.map(|m| m.uid() == geteuid().as_raw()).unwrap_or(false),
        Id::BoolUnaryGroupOwned => meta.map(|m| m.gid() == getegid().as_raw()).unwrap_or(false),
        Id::BoolUnaryModified => meta.map(|m| m.mtime() > m.atime()).unwrap_or(false),
        Id::BoolUnaryReadable => exists && can_access(operand, AccessFlags::R_OK),
        Id::BoolUnaryW => exists && can_access(operand, AccessFlags::W_OK),
        Id::BoolUnaryX => exists && can_access(operand, AccessFlags::X_OK),
        _ => return None,
    };
    Some(result)
}

fn mtime_of(path: &str) -> Option<(i64, i64)> {
    fs::metadata(path).ok().map(|m| (m.mtime(), m.mtime_nsec()))
}

/// `-nt`, `-ot` and `-ef`.
pub fn binary_file_test(op: Id, left: &str, right: &str) -> bool {
    match op {
        // A missing file is older than any existing one.
        Id::BoolBinaryNt => match (mtime_of(left), mtime_of(right)) {
            (Some(l), Some(r)) => l > r,
            (Some(_), None) => true,
            _ => false,
        },
        Id::BoolBinaryOt => match (mtime_of(left), mtime_of(right)) {
            (Some(l), Some(r)) => l < r,
            (None, Some(_)) => true,
            _ => false,
        },
        Id::BoolBinaryEf => match (fs::metadata(left), fs::metadata(right)) {
            (Ok(l), Ok(r)) => l.dev() == r.dev() && l.ino() == r.ino(),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_file_tests() {
        assert_eq!(unary_file_test(Id::BoolUnaryD, "/"), Some(true));
        assert_eq!(unary_file_test(Id::BoolUnaryF, "/"), Some(false));
        assert_eq!(unary_file_test(Id::BoolUnaryE, "/no/such/path"), Some(false));
        assert_eq!(unary_file_test(Id::BoolUnaryZ, "x"), None);
    }

    #[test]
    fn test_terminal_bad_fd() {
        assert_eq!(unary_file_test(Id::BoolUnaryT, "not-a-number"), Some(false));
        assert_eq!(unary_file_test(Id::BoolUnaryT, "9999"), Some(false));
    }

    #[test]
    fn test_same_file() {
        assert!(binary_file_test(Id::BoolBinaryEf, "/", "/"));
        assert!(!binary_file_test(Id::BoolBinaryEf, "/", "/no/such/path"));
        assert!(binary_file_test(Id::BoolBinaryNt, "/", "/no/such/path"));
        assert!(binary_file_test(Id::BoolBinaryOt, "/no/such/path", "/"));
    }
}
