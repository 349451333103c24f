use nix::unistd::{getpid, setsid};

use crate::detach_error::DetachError;
use crate::identity::ProcessIdentity;
use crate::terminal::has_controlling_terminal;

/// Moves the caller into a brand-new session without a controlling terminal
/// and returns a fresh snapshot of its identity.
///
/// Fails with EPERM when the caller already leads a process group, which is
/// also the case after a first successful call.
pub fn create_session() -> Result<ProcessIdentity, DetachError> {
    setsid().map_err(DetachError::Session)?;
    ProcessIdentity::capture().map_err(DetachError::Identity)
}

/// Verifies that the controlling-terminal alias can no longer be opened.
pub fn ensure_detached() -> Result<(), DetachError> {
    if has_controlling_terminal() {
        return Err(DetachError::StillAttached(getpid()));
    }
    Ok(())
}
