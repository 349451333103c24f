use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use crate::detach_error::DetachError;

/// Which side of a fork the caller ended up on.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Spawn {
    Parent(Pid),
    Child,
}

/// Duplicates the calling process.
///
/// The child starts with copies of every open descriptor and an otherwise
/// independent address space. Only the calling thread survives in the child,
/// so callers fork from single-threaded code.
pub fn spawn_next() -> Result<Spawn, DetachError> {
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => Ok(Spawn::Parent(child)),
        Ok(ForkResult::Child) => Ok(Spawn::Child),
        Err(e) => Err(DetachError::Spawn(e)),
    }
}

/// Exit report of one child generation, consumed by its direct parent.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct GenerationResult {
    pub pid: Pid,
    pub status: WaitStatus,
}

impl GenerationResult {
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            WaitStatus::Exited(_, code) => Some(code),
            _ => None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code() == Some(libc::EXIT_SUCCESS)
    }
}

impl std::fmt::Display for GenerationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            WaitStatus::Exited(_, code) => {
                write!(f, "process {} exited with status {code}", self.pid)
            }
            WaitStatus::Signaled(_, signal, _) => {
                write!(f, "process {} killed by {signal}", self.pid)
            }
            status => write!(f, "process {} ended as {status:?}", self.pid),
        }
    }
}

/// Blocks until `child` terminates.
///
/// Waiting on the specific pid keeps another child's status from being
/// attributed to this one.
pub fn wait_for(child: Pid) -> Result<GenerationResult, DetachError> {
    loop {
        match waitpid(child, None) {
            Ok(status @ WaitStatus::Exited(..)) | Ok(status @ WaitStatus::Signaled(..)) => {
                return Ok(GenerationResult { pid: child, status })
            }
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(errno) => return Err(DetachError::Wait { child, errno }),
        }
    }
}

/// Demonstration ordering aid: gives the parent time to finish first.
pub fn settle(secs: u64) {
    if secs > 0 {
        thread::sleep(Duration::from_secs(secs));
    }
}
