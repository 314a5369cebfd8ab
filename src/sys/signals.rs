//! Signal forwarding
//!
//! The bridge stays transparent to job control: signals landing on it are
//! re-sent to the child, and only the child's death ends the bridge.
//! Handlers do the minimum a signal context allows. Forwarders re-send
//! with `kill` (async-signal-safe); the child monitor just sets a flag
//! the main loop picks up.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use nix::sys::signal::{
    sigaction, sigprocmask, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal,
};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

/// Signals re-sent to the child.
pub const FORWARDED: [Signal; 8] = [
    Signal::SIGINT,
    Signal::SIGHUP,
    Signal::SIGQUIT,
    Signal::SIGABRT,
    Signal::SIGTERM,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
    Signal::SIGWINCH,
];

static CHILD_PID: AtomicI32 = AtomicI32::new(0);
static CHILD_EXITED: AtomicBool = AtomicBool::new(false);

extern "C" fn forward_signal(signo: libc::c_int) {
    let pid = CHILD_PID.load(Ordering::Relaxed);
    if pid > 0 {
        unsafe {
            libc::kill(pid, signo);
        }
    }
}

extern "C" fn note_child_exit(_: libc::c_int) {
    CHILD_EXITED.store(true, Ordering::Relaxed);
}

/// Install the forwarding handlers and the child monitor.
///
/// None carry SA_RESTART, so an arriving signal interrupts the blocking
/// wait and the loop re-checks its flags. SIGCHLD is limited to actual
/// termination (SA_NOCLDSTOP); job-control stops in the child stay
/// invisible here.
pub fn install() -> io::Result<()> {
    let forward = SigAction::new(
        SigHandler::Handler(forward_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in FORWARDED {
        unsafe { sigaction(signal, &forward) }?;
    }

    let monitor = SigAction::new(
        SigHandler::Handler(note_child_exit),
        SaFlags::SA_NOCLDSTOP,
        SigSet::empty(),
    );
    unsafe { sigaction(Signal::SIGCHLD, &monitor) }?;
    Ok(())
}

/// Point the forwarders at the child.
pub fn set_child(pid: i32) {
    CHILD_PID.store(pid, Ordering::Relaxed);
}

/// Block SIGCHLD delivery, returning the mask from before the block.
///
/// The main loop passes that mask to `ppoll`, confining delivery to the
/// wait itself: a SIGCHLD raised between the loop's flag check and the
/// wait stays pending until `ppoll` opens the mask, and then interrupts
/// it.
pub fn block_sigchld() -> io::Result<SigSet> {
    let mut blocked = SigSet::empty();
    blocked.add(Signal::SIGCHLD);
    let mut prior = SigSet::empty();
    sigprocmask(SigmaskHow::SIG_BLOCK, Some(&blocked), Some(&mut prior))?;
    Ok(prior)
}

/// Collect dead children, reporting the tracked child's status.
///
/// Exits of unrelated processes are drained and ignored; they can reach
/// us when the bridge inherits strays from its parent.
pub fn reap() -> Option<WaitStatus> {
    if !CHILD_EXITED.swap(false, Ordering::Relaxed) {
        return None;
    }
    let tracked = Pid::from_raw(CHILD_PID.load(Ordering::Relaxed));
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => return None,
            Ok(status) if status.pid() == Some(tracked) => return Some(status),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

/// Reset every forwarded disposition to its default, so the bridge can
/// re-raise the child's fatal signal against itself.
pub fn reset_dispositions() {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for signal in FORWARDED {
        let _ = unsafe { sigaction(signal, &default) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_set_contents() {
        assert_eq!(FORWARDED.len(), 8);
        for signal in [
            Signal::SIGINT,
            Signal::SIGHUP,
            Signal::SIGQUIT,
            Signal::SIGABRT,
            Signal::SIGTERM,
            Signal::SIGUSR1,
            Signal::SIGUSR2,
            Signal::SIGWINCH,
        ] {
            assert!(FORWARDED.contains(&signal));
        }
        assert!(!FORWARDED.contains(&Signal::SIGCHLD));
        assert!(!FORWARDED.contains(&Signal::SIGKILL));
    }

    #[test]
    fn test_reap_is_quiet_without_notification() {
        CHILD_EXITED.store(false, Ordering::Relaxed);
        assert_eq!(reap(), None);
    }

    #[test]
    fn test_reap_tolerates_no_children() {
        // Notification with nothing to collect: the flag is consumed and
        // the loop goes back to waiting.
        CHILD_EXITED.store(true, Ordering::Relaxed);
        assert_eq!(reap(), None);
        assert!(!CHILD_EXITED.load(Ordering::Relaxed));
    }

    #[test]
    fn test_forward_without_child_signals_nothing() {
        CHILD_PID.store(0, Ordering::Relaxed);
        // With no child tracked the forwarder must not call kill at all;
        // kill(0, sig) would hit the bridge's own process group, and
        // SIGUSR1 at its default disposition would take this test run
        // down with it.
        forward_signal(libc::SIGUSR1);
        assert_eq!(CHILD_PID.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_block_sigchld_masks_delivery() {
        let prior = block_sigchld().unwrap();
        let masked = SigSet::thread_get_mask().unwrap();
        assert!(masked.contains(Signal::SIGCHLD));
        sigprocmask(SigmaskHow::SIG_SETMASK, Some(&prior), None).unwrap();
    }
}
