use std::os::unix::io::RawFd;

use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::pty::openpty;
use nix::sys::stat::Mode;
use nix::unistd::{close, isatty};

/// Kernel alias for the calling process's controlling terminal. Opening it
/// fails with ENXIO once the process has none.
pub const CONTROLLING_TTY: &str = "/dev/tty";

pub fn open_terminal(path: &str) -> Result<RawFd, Errno> {
    open(path, OFlag::O_WRONLY, Mode::empty())
}

pub fn has_controlling_terminal() -> bool {
    match open_terminal(CONTROLLING_TTY) {
        Ok(fd) => {
            let _ = close(fd);
            true
        }
        Err(_) => false,
    }
}

pub fn is_terminal(fd: RawFd) -> bool {
    isatty(fd).unwrap_or(false)
}

/// Result of trying to make a fresh pseudo-terminal the controlling terminal.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ProbeOutcome {
    /// The kernel refused with EPERM: the caller is not a session leader.
    Refused,
    /// The caller now holds a controlling terminal.
    Acquired,
    /// The probe could not run, or failed for another reason.
    Anomaly(Errno),
}

impl ProbeOutcome {
    pub fn is_expected(&self) -> bool {
        *self == ProbeOutcome::Refused
    }
}

fn set_controlling_terminal(fd: RawFd) -> Result<(), Errno> {
    let res = unsafe { libc::ioctl(fd, libc::TIOCSCTTY as _, 0) };
    Errno::result(res).map(drop)
}

/// Allocates a pty pair and tries to adopt the slave side as controlling
/// terminal. Both descriptors are closed again before returning.
pub fn probe_acquisition() -> ProbeOutcome {
    let pty = match openpty(None, None) {
        Ok(pty) => pty,
        Err(e) => return ProbeOutcome::Anomaly(e),
    };

    let outcome = match set_controlling_terminal(pty.slave) {
        Ok(()) => ProbeOutcome::Acquired,
        Err(Errno::EPERM) => ProbeOutcome::Refused,
        Err(e) => ProbeOutcome::Anomaly(e),
    };

    let _ = close(pty.slave);
    let _ = close(pty.master);
    outcome
}
