//! The three generations of the double fork.
//!
//! ```text
//! launcher ──fork──> intermediate ──hygiene, setsid, fork──> daemon
//!    │                    │
//!    wait                 exit
//! ```
//!
//! Each generation returns to the caller once its part is done. The caller
//! owns the exit: `Ok` becomes `EXIT_SUCCESS`, any `DetachError` becomes
//! `EXIT_FAILURE`, and that status is all the parent ever learns.

use nix::sys::stat::{umask, Mode};
use nix::unistd::{getpid, Pid};

use crate::config::DaemonConfig;
use crate::detach_error::DetachError;
use crate::generation::{settle, spawn_next, wait_for, Spawn};
use crate::hygiene::{describe_standard_slots, Hygiene, TerminalStep, STDOUT_FILENO};
use crate::identity::ProcessIdentity;
use crate::logger::Logger;
use crate::session::{create_session, ensure_detached};
use crate::terminal::{is_terminal, probe_acquisition, ProbeOutcome};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Role {
    Launcher,
    Intermediate,
    Daemon,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Launcher => write!(f, "launcher"),
            Role::Intermediate => write!(f, "intermediate"),
            Role::Daemon => write!(f, "daemon"),
        }
    }
}

/// Replaces the process's file-creation mask and returns the new one.
pub fn set_file_mask(mask: u32) -> Mode {
    let mask = Mode::from_bits_truncate(mask as libc::mode_t);
    umask(mask);
    mask
}

pub struct Protocol<'a> {
    config: &'a DaemonConfig,
    logger: Logger,
}

impl<'a> Protocol<'a> {
    pub fn new(config: &'a DaemonConfig) -> Self {
        Protocol {
            config,
            logger: Logger::new(config.log_level),
        }
    }

    /// Logger of whichever generation is running; its sink follows detachment.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn run(&mut self) -> Result<Role, DetachError> {
        match spawn_next()? {
            Spawn::Parent(child) => self.launcher(child),
            Spawn::Child => self.intermediate(),
        }
    }

    fn capture(&self, role: Role) -> Result<ProcessIdentity, DetachError> {
        let identity = ProcessIdentity::capture().map_err(DetachError::Identity)?;
        self.logger.info(&format!("{role}: {identity}"));
        Ok(identity)
    }

    fn launcher(&mut self, child: Pid) -> Result<Role, DetachError> {
        self.capture(Role::Launcher)?;

        let result = wait_for(child)?;
        if !result.succeeded() {
            return Err(DetachError::ChildFailed(result));
        }
        self.logger
            .info(&format!("successfully waited for child process {child}"));
        self.report_stdout();
        Ok(Role::Launcher)
    }

    fn intermediate(&mut self) -> Result<Role, DetachError> {
        settle(self.config.settle_secs);
        let identity = self.capture(Role::Intermediate)?;
        if identity.adopted_by_init() {
            self.logger
                .info(&format!("process {} got adopted by init", identity.pid));
        }

        let hygiene = Hygiene {
            terminal: &self.config.terminal,
            logfile: &self.config.logfile,
            headless: self.config.headless,
        };
        match hygiene.apply(&mut self.logger)? {
            TerminalStep::Attached { fd, announce } => {
                self.logger.info(&format!(
                    "terminal {} was attached on descriptor {fd} before detaching",
                    self.config.terminal
                ));
                if let Some(e) = announce {
                    self.logger
                        .warn(&format!("failed to write to terminal descriptor {fd}: {e}"));
                }
            }
            TerminalStep::Skipped(e) => self.logger.warn(&format!(
                "headless launch, terminal {} unavailable: {e}",
                self.config.terminal
            )),
        }

        let identity = create_session()?;
        self.logger
            .info(&format!("intermediate in new session: {identity}"));
        ensure_detached()?;

        match spawn_next()? {
            Spawn::Parent(daemon) => {
                settle(self.config.linger_secs);
                self.logger
                    .info(&format!("forked daemon {daemon}, intermediate exiting"));
                Ok(Role::Intermediate)
            }
            Spawn::Child => self.daemon(),
        }
    }

    fn daemon(&mut self) -> Result<Role, DetachError> {
        let mask = set_file_mask(self.config.umask);

        let identity = self.capture(Role::Daemon)?;
        self.logger
            .info(&format!("file creation mask set to {:03o}", mask.bits()));
        if identity.is_session_leader() || identity.is_group_leader() {
            self.logger.warn(&format!(
                "daemon {} leads its group or session and could acquire a terminal",
                identity.pid
            ));
        }
        self.logger
            .info(&format!("standard slots: {}", describe_standard_slots()));

        let pid = getpid();
        match probe_acquisition() {
            ProbeOutcome::Refused => self.logger.info(&format!(
                "process {pid} failed to obtain a controlling terminal. This is expected."
            )),
            ProbeOutcome::Acquired => self.logger.warn(&format!(
                "process {pid} was able to obtain a controlling terminal. This is UNEXPECTED."
            )),
            ProbeOutcome::Anomaly(e) => self
                .logger
                .warn(&format!("process {pid} terminal probe anomaly: {e}")),
        }
        self.report_stdout();
        Ok(Role::Daemon)
    }

    fn report_stdout(&self) {
        let pid = getpid();
        if is_terminal(STDOUT_FILENO) {
            self.logger.info(&format!("process {pid}: stdout is a TTY"));
        } else {
            self.logger.info(&format!("process {pid}: stdout is NOT a TTY"));
        }
    }
}
