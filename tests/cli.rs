mod common;

use common::{run, run_with, temp_path};

#[test]
fn test_command_string() {
    let out = run("echo hello");
    assert_eq!(out.stdout, "hello\n");
    assert_eq!(out.status, 0);
}

#[test]
fn test_command_string_positionals() {
    let out = run_with(&["-c", "echo $0 $1 $#", "name", "a", "b"], "");
    assert_eq!(out.stdout, "name a 2\n");
}

#[test]
fn test_script_file_with_args() {
    let path = temp_path("script.sh");
    std::fs::write(&path, "echo \"$1-$2\"\nexit 3\n").unwrap();
    let out = run_with(&[path.to_str().unwrap(), "x", "y"], "");
    std::fs::remove_file(&path).unwrap();
    assert_eq!(out.stdout, "x-y\n");
    assert_eq!(out.status, 3);
}

#[test]
fn test_missing_script() {
    let out = run_with(&["/no/such/oshell/script"], "");
    assert_eq!(out.status, 127);
    assert!(out.stderr.contains("/no/such/oshell/script"));
}

#[test]
fn test_reads_stdin() {
    let out = run_with(&[], "x=from-stdin\necho $x\n");
    assert_eq!(out.stdout, "from-stdin\n");
}

#[test]
fn test_exit_status() {
    assert_eq!(run("exit 42").status, 42);
    assert_eq!(run("false").status, 1);
    assert_eq!(run("exit 300").status, 44);
}

#[test]
fn test_errexit_flag() {
    let out = run_with(&["-e", "-c", "echo one; false; echo two"], "");
    assert_eq!(out.stdout, "one\n");
    assert_eq!(out.status, 1);
}

#[test]
fn test_noexec_flag() {
    let out = run_with(&["-n", "-c", "echo hidden"], "");
    assert_eq!(out.stdout, "");
    assert_eq!(out.status, 0);
}

#[test]
fn test_set_option_flag() {
    let out = run_with(&["-o", "pipefail", "-c", "false | true; echo $?"], "");
    assert_eq!(out.stdout, "1\n");
    let out = run_with(&["-o", "nosuchoption", "-c", "true"], "");
    assert_eq!(out.status, 2);
}

#[test]
fn test_shopt_flag() {
    let out = run_with(&["-O", "lastpipe", "-c", "echo piped | read v; echo $v"], "");
    assert_eq!(out.stdout, "piped\n");
}

#[test]
fn test_xtrace_flag() {
    let out = run_with(&["-x", "-c", "echo hi"], "");
    assert_eq!(out.stdout, "hi\n");
    assert!(out.stderr.contains("+ echo hi"));
}

#[test]
fn test_nounset_flag() {
    let out = run_with(&["-u", "-c", "echo $undefined_var; echo after"], "");
    assert_eq!(out.stdout, "");
    assert_ne!(out.status, 0);
    assert!(out.stderr.contains("undefined_var"));
}

#[test]
fn test_parse_error() {
    let out = run("echo before; if then");
    assert_eq!(out.status, 2);
    assert_eq!(out.stdout, "");
    assert!(out.stderr.starts_with("oshell") || out.stderr.contains("oshell:"));
}

#[test]
fn test_command_not_found() {
    let out = run("no_such_command_for_oshell_test");
    assert_eq!(out.status, 127);
    assert!(out.stderr.contains("command not found"));
}

#[test]
fn test_debug_log_file() {
    let path = temp_path("debug.log");
    let out = run_with(&["--debug-log", path.to_str().unwrap(), "-c", "sh -c true"], "");
    assert_eq!(out.status, 0);
    assert!(path.exists());
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_runaway_recursion_is_an_error() {
    let out = run("f() { f; }; f; echo unreachable");
    assert_eq!(out.status, 1);
    assert!(out.stderr.contains("maximum function recursion depth (1000) exceeded"));
    assert_eq!(out.stdout, "");
}

#[test]
fn test_deep_recursion_within_limit() {
    let out = run("f() { if (( $1 > 0 )); then f $(( $1 - 1 )); else echo bottom; fi; }; f 900");
    assert_eq!(out.stdout, "bottom\n");
    assert_eq!(out.status, 0);
}

#[test]
fn test_invalid_utf8_script_is_rejected() {
    let path = temp_path("bad-bytes.sh");
    std::fs::write(&path, b"x=1\necho a\xffb\n").unwrap();
    let out = run_with(&[path.to_str().unwrap()], "");
    std::fs::remove_file(&path).unwrap();
    assert_eq!(out.status, 2);
    assert!(out.stderr.contains("invalid UTF-8"));
    assert!(!out.stdout.contains('\u{FFFD}'));
}

#[test]
fn test_hex_escape_writes_one_byte() {
    let out = run("echo $'\\xff'; printf '\\377\\x80'");
    assert_eq!(out.stdout_bytes, b"\xff\n\xff\x80");
}

#[test]
fn test_command_sub_keeps_bytes() {
    let out = run("x=$(printf '\\377a\\200' | cat); printf '%s|%d' \"$x\" ${#x}");
    assert_eq!(out.stdout_bytes, b"\xffa\x80|3");
}

#[test]
fn test_read_keeps_bytes() {
    let out = run("printf 'a\\377 b\\n' | { read -r p q; printf %s \"$q$p\"; }");
    assert_eq!(out.stdout_bytes, b"ba\xff");
}
