mod common;

use common::run;

#[test]
fn test_pipeline() {
    let out = run("echo hello | tr a-z A-Z");
    assert_eq!(out.stdout, "HELLO\n");
}

#[test]
fn test_pipestatus() {
    let out = run("true | false | true; echo ${PIPESTATUS[@]}");
    assert_eq!(out.stdout, "0 1 0\n");
}

#[test]
fn test_pipefail_leftmost() {
    let out = run("set -o pipefail; (exit 2) | (exit 3) | true; echo $?");
    assert_eq!(out.stdout, "2\n");
}

#[test]
fn test_subshell_isolation() {
    let out = run("x=outer; (x=inner; echo $x); echo $x");
    assert_eq!(out.stdout, "inner\nouter\n");
}

#[test]
fn test_command_substitution() {
    let out = run("x=$(echo a; echo b); echo \"$x\"; y=$(exit 3); echo $?");
    assert_eq!(out.stdout, "a\nb\n3\n");
}

#[test]
fn test_wait_for_pid() {
    let out = run("sh -c 'exit 7' & wait $!; echo $?");
    assert_eq!(out.stdout, "7\n");
}

#[test]
fn test_wait_for_jobs_by_number() {
    let out = run("(exit 3) & (exit 4) & wait %2; echo $?; wait %1; echo $?");
    assert_eq!(out.stdout, "4\n3\n");
}

#[test]
fn test_wait_all() {
    let out = run("(sleep 0.1; echo late) & wait; echo done");
    assert_eq!(out.stdout, "late\ndone\n");
}

#[test]
fn test_signalled_child_status() {
    let out = run("sh -c 'kill -TERM $$'; echo $?");
    assert_eq!(out.stdout, "143\n");
}

#[test]
fn test_exit_trap() {
    let out = run("trap 'echo bye' EXIT; echo hi");
    assert_eq!(out.stdout, "hi\nbye\n");
}

#[test]
fn test_exit_trap_after_fatal_error() {
    let out = run("trap 'echo cleanup' EXIT; readonly r=1; r=2; echo unreachable");
    assert_eq!(out.stdout, "cleanup\n");
    assert_eq!(out.status, 1);
}

#[test]
fn test_signal_trap() {
    let out = run("trap 'echo got-usr1' USR1; kill -USR1 $$; echo after");
    assert_eq!(out.stdout, "got-usr1\nafter\n");
}

#[test]
fn test_trap_interrupts_wait() {
    let out = run("trap 'echo trapped' USR1; (sleep 0.2; kill -USR1 $$) & sleep 2 & wait $!; echo $?");
    assert_eq!(out.stdout, "trapped\n138\n");
}

#[test]
fn test_ignored_signal() {
    let out = run("trap '' USR1; kill -USR1 $$; echo survived");
    assert_eq!(out.stdout, "survived\n");
}

#[test]
fn test_trap_listing() {
    let out = run("trap 'echo x' EXIT; trap -p EXIT; trap - EXIT");
    assert_eq!(out.stdout, "trap -- 'echo x' EXIT\n");
}

#[test]
fn test_kill_job() {
    let out = run("sleep 5 & kill %1; wait %1; echo $?");
    assert_eq!(out.stdout, "143\n");
}

#[test]
fn test_jobs_listing() {
    let out = run("sleep 0.3 & jobs; wait");
    assert!(out.stdout.starts_with("[1]+ Running"), "{}", out.stdout);
    assert!(out.stdout.contains("sleep 0.3"));
}

#[test]
fn test_process_substitution() {
    let out = run("cat <(echo from-proc-sub)");
    assert_eq!(out.stdout, "from-proc-sub\n");
}
