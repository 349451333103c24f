use std::os::unix::io::RawFd;

use nix::errno::Errno;
use nix::unistd::Pid;

use crate::generation::GenerationResult;

/// Every failure here is fatal for the generation that hit it: the caller
/// turns it into `EXIT_FAILURE` and the parent only ever sees that status.
#[derive(Debug)]
pub enum DetachError {
    Spawn(Errno),
    Wait { child: Pid, errno: Errno },
    Descriptor { action: String, errno: Errno },
    SlotMismatch { expected: RawFd, actual: RawFd },
    Session(Errno),
    StillAttached(Pid),
    Identity(Errno),
    ChildFailed(GenerationResult),
}

impl DetachError {
    pub fn descriptor(action: &str, errno: Errno) -> Self {
        DetachError::Descriptor {
            action: action.to_owned(),
            errno,
        }
    }
}

impl std::fmt::Display for DetachError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetachError::Spawn(e) => write!(f, "spawn: fork failed: {e}"),
            DetachError::Wait { child, errno } => {
                write!(f, "wait: failed to wait for child process {child}: {errno}")
            }
            DetachError::Descriptor { action, errno } => {
                write!(f, "descriptor: failed to {action}: {errno}")
            }
            DetachError::SlotMismatch { expected, actual } => write!(
                f,
                "descriptor: /dev/null landed on slot {actual} instead of {expected}"
            ),
            DetachError::Session(e) => write!(f, "session: setsid failed: {e}"),
            DetachError::StillAttached(pid) => write!(
                f,
                "session: process {pid} can still open its controlling terminal"
            ),
            DetachError::Identity(e) => write!(f, "identity: getsid failed: {e}"),
            DetachError::ChildFailed(result) => write!(f, "generation: {result}"),
        }
    }
}

impl std::error::Error for DetachError {}
