#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

pub struct Output {
    pub stdout: String,
    /// Stdout as written, for checks on non-UTF-8 output.
    pub stdout_bytes: Vec<u8>,
    pub stderr: String,
    pub status: i32,
}

/// Run the shell binary with `args`, feeding `stdin`.
pub fn run_with(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_oshell"))
        .args(args)
        .env("PATH", "/usr/local/bin:/usr/bin:/bin")
        .env_remove("OSH_DEBUG_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start oshell");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(stdin.as_bytes())
        .expect("failed to write stdin");
    let out = child.wait_with_output().expect("failed to wait for oshell");
    Output {
        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        stdout_bytes: out.stdout.clone(),
        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        status: out.status.code().unwrap_or(-1),
    }
}

/// `oshell -c SCRIPT`
pub fn run(script: &str) -> Output {
    run_with(&["-c", script], "")
}

/// A path in the temp dir that no other test uses.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("oshell-test-{}-{}", std::process::id(), name))
}
