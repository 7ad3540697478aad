//! External Programs
//!
//! Resolves a command name against `PATH` and replaces the current process
//! image with it. `exec_program` only returns when exec fails, with the
//! status the shell should exit with (126 or 127).

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use log::debug;
use nix::errno::Errno;
use nix::unistd::{access, execve, AccessFlags};

use crate::process::raw_bytes;

/// Command not found.
pub const STATUS_NOT_FOUND: i32 = 127;
/// Found but not executable.
pub const STATUS_CANNOT_EXECUTE: i32 = 126;

fn is_executable(path: &Path) -> bool {
    path.is_file() && access(path, AccessFlags::X_OK).is_ok()
}

/// Find `name` the way `execvp` would. Names with a slash are used as is;
/// other names are looked up in each `PATH` directory, with an empty entry
/// meaning the current directory.
pub fn find_in_path(name: &str, path_var: Option<&str>) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains('/') {
        let p = PathBuf::from(raw_bytes::to_os(name));
        return if p.exists() { Some(p) } else { None };
    }
    let path_var = path_var.unwrap_or("/usr/local/bin:/usr/bin:/bin");
    for dir in path_var.split(':') {
        let dir = if dir.is_empty() { "." } else { dir };
        let candidate = Path::new(&raw_bytes::to_os(dir)).join(raw_bytes::to_os(name));
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn to_cstrings<'a>(items: impl IntoIterator<Item = &'a str>) -> Result<Vec<CString>, Errno> {
    items
        .into_iter()
        .map(|s| CString::new(raw_bytes::encode(s).into_owned()).map_err(|_| Errno::EINVAL))
        .collect()
}

/// Replace the process image. Returns only on failure, after printing the
/// error, with the status to exit with.
///
/// A file the kernel can't run (`ENOEXEC`) is handed to `/bin/sh` as a
/// script.
pub fn exec_program(argv: &[String], environ: &[(String, String)], path_var: Option<&str>) -> i32 {
    let Some(name) = argv.first() else {
        return 0;
    };
    let Some(path) = find_in_path(name, path_var) else {
        eprintln!("oshell: {}: command not found", name);
        return STATUS_NOT_FOUND;
    };
    let env_strs: Vec<String> = environ.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    let prepared = (|| -> Result<(CString, Vec<CString>, Vec<CString>), Errno> {
        let prog = CString::new(path.as_os_str().as_bytes()).map_err(|_| Errno::EINVAL)?;
        Ok((
            prog,
            to_cstrings(argv.iter().map(String::as_str))?,
            to_cstrings(env_strs.iter().map(String::as_str))?,
        ))
    })();
    let (prog, args, env) = match prepared {
        Ok(t) => t,
        Err(e) => {
            eprintln!("oshell: {}: {}", name, e.desc());
            return STATUS_CANNOT_EXECUTE;
        }
    };
    debug!("exec {:?}", path);
    let err = match execve(&prog, &args, &env) {
        Err(e) => e,
        Ok(never) => match never {},
    };
    if err == Errno::ENOEXEC {
        let mut sh_args = vec![CString::new("/bin/sh").unwrap_or_default(), prog.clone()];
        sh_args.extend(args.into_iter().skip(1));
        if let Ok(sh) = CString::new("/bin/sh") {
            let _ = execve(&sh, &sh_args, &env);
        }
    }
    eprintln!("oshell: {}: {}", name, err.desc());
    match err {
        Errno::ENOENT => STATUS_NOT_FOUND,
        _ => STATUS_CANNOT_EXECUTE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_in_path_searches_dirs() {
        let found = find_in_path("sh", Some("/nonexistent:/bin:/usr/bin")).unwrap();
        assert!(found.ends_with("sh"));
        assert!(find_in_path("definitely-not-a-command-xyz", Some("/bin")).is_none());
    }

    #[test]
    fn test_find_in_path_with_slash() {
        assert_eq!(find_in_path("/bin/sh", None), Some(PathBuf::from("/bin/sh")));
        assert!(find_in_path("./no/such/file", None).is_none());
        assert!(find_in_path("", None).is_none());
    }

    #[test]
    fn test_directory_is_not_executable() {
        assert!(find_in_path("tmp", Some("/")).is_none());
    }
}
