//! Signal Plumbing
//!
//! Trapped signals are recorded by an async-signal-safe handler into a
//! fixed table of atomics. The interpreter drains the table between
//! statements and whenever a blocking wait is interrupted.
//!
//! Handlers are installed without `SA_RESTART`, so a blocking `waitpid`
//! returns `EINTR` and the waiter gets a chance to run the trap.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

const MAX_SIGNAL: usize = 65;

#[allow(clippy::declare_interior_mutable_const)]
const UNSET: AtomicBool = AtomicBool::new(false);
static PENDING: [AtomicBool; MAX_SIGNAL] = [UNSET; MAX_SIGNAL];
static ANY_PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn record_signal(sig: libc::c_int) {
    if let Some(slot) = PENDING.get(sig as usize) {
        slot.store(true, Ordering::SeqCst);
        ANY_PENDING.store(true, Ordering::SeqCst);
    }
}

fn install(sig: Signal, handler: SigHandler) -> nix::Result<()> {
    let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
    // SAFETY: the handler only touches atomics.
    unsafe { sigaction(sig, &action) }.map(|_| ())
}

/// Record `sig` as pending when it arrives, for `trap CMD SIG`.
pub fn install_trap_handler(sig: Signal) -> nix::Result<()> {
    debug!("trap handler installed for {}", sig);
    install(sig, SigHandler::Handler(record_signal))
}

/// `trap '' SIG`
pub fn ignore(sig: Signal) -> nix::Result<()> {
    install(sig, SigHandler::SigIgn)
}

/// `trap - SIG`
pub fn restore_default(sig: Signal) -> nix::Result<()> {
    install(sig, SigHandler::SigDfl)
}

pub fn any_pending() -> bool {
    ANY_PENDING.load(Ordering::SeqCst)
}

/// Put `sig` back in the pending table.
pub fn mark_pending(sig: Signal) {
    record_signal(sig as libc::c_int);
}

/// Signals that arrived since the last call, lowest number first.
pub fn take_pending() -> Vec<Signal> {
    if !ANY_PENDING.swap(false, Ordering::SeqCst) {
        return Vec::new();
    }
    PENDING
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.swap(false, Ordering::SeqCst))
        .filter_map(|(n, _)| Signal::try_from(n as i32).ok())
        .collect()
}

/// Called in a forked child before it runs commands or execs: trapped
/// signals go back to their default disposition, and so does SIGPIPE,
/// which the Rust runtime ignores.
pub fn reset_for_child(trapped: &[Signal]) {
    for sig in trapped.iter().copied().chain([Signal::SIGPIPE]) {
        if let Err(e) = restore_default(sig) {
            debug!("could not reset {} in child: {}", sig, e);
        }
    }
}

/// `INT`, `SIGINT`, `int` or `2`.
pub fn signal_from_name(spec: &str) -> Option<Signal> {
    if let Ok(n) = spec.parse::<i32>() {
        return Signal::try_from(n).ok();
    }
    let upper = spec.to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };
    Signal::from_str(&full).ok()
}

/// `SIGINT` -> `INT`
pub fn short_name(sig: Signal) -> &'static str {
    let name = sig.as_str();
    name.strip_prefix("SIG").unwrap_or(name)
}

/// Exit status of a process killed by `sig`.
pub fn signal_to_exit_status(sig: Signal) -> i32 {
    128 + sig as i32
}
