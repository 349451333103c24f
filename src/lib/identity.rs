use nix::errno::Errno;
use nix::unistd::{getpgrp, getpid, getppid, getsid, Pid};

/// Snapshot of where a process sits in the session/group hierarchy.
///
/// Values are read straight from the kernel at capture time. Anything that
/// can move the process (only `setsid` here) makes an older snapshot stale,
/// so callers capture again instead of patching fields.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ProcessIdentity {
    pub pid: Pid,
    pub parent_pid: Pid,
    pub process_group_id: Pid,
    pub session_id: Pid,
}

impl ProcessIdentity {
    pub fn capture() -> Result<Self, Errno> {
        Ok(ProcessIdentity {
            pid: getpid(),
            parent_pid: getppid(),
            process_group_id: getpgrp(),
            session_id: getsid(None)?,
        })
    }

    pub fn is_group_leader(&self) -> bool {
        self.pid == self.process_group_id
    }

    pub fn is_session_leader(&self) -> bool {
        self.pid == self.session_id
    }

    pub fn adopted_by_init(&self) -> bool {
        self.parent_pid == Pid::from_raw(1)
    }
}

impl std::fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pid {} ppid {} pgid {} sid {}. group leader: {}. session leader: {}",
            self.pid,
            self.parent_pid,
            self.process_group_id,
            self.session_id,
            self.is_group_leader(),
            self.is_session_leader()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_self() {
        let identity = ProcessIdentity::capture().unwrap();
        assert_eq!(std::process::id() as i32, identity.pid.as_raw());
        assert_eq!(getppid(), identity.parent_pid);
        assert_eq!(
            identity.pid == identity.process_group_id,
            identity.is_group_leader()
        );
    }

    #[test]
    fn test_leader_predicates() {
        let identity = ProcessIdentity {
            pid: Pid::from_raw(40),
            parent_pid: Pid::from_raw(1),
            process_group_id: Pid::from_raw(40),
            session_id: Pid::from_raw(12),
        };
        assert!(identity.is_group_leader());
        assert!(!identity.is_session_leader());
        assert!(identity.adopted_by_init());
        assert_eq!(
            "pid 40 ppid 1 pgid 40 sid 12. group leader: true. session leader: false",
            identity.to_string()
        );
    }
}
