use std::os::unix::io::RawFd;

use nix::errno::Errno;
use nix::fcntl::{fcntl, open, FcntlArg, OFlag};
use nix::sys::stat::{fstat, stat, Mode};
use nix::unistd::{close, dup2, getpid, write};

use crate::detach_error::DetachError;
use crate::logger::{flush_stdout, Logger, Sink};
use crate::terminal::open_terminal;

pub const STDIN_FILENO: RawFd = 0;
pub const STDOUT_FILENO: RawFd = 1;
pub const STDERR_FILENO: RawFd = 2;
/// Auxiliary slot the log file is pinned to for the rest of the process's
/// life and inherited by every later generation.
pub const LOG_FILENO: RawFd = 3;

pub const DEV_NULL: &str = "/dev/null";

/// What happened to the terminal in the first two steps.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TerminalStep {
    /// The terminal was opened on `fd` and duplicated onto slot 1.
    /// `announce` holds the error of the line written to it, if any.
    Attached { fd: RawFd, announce: Option<Errno> },
    /// Headless launch: the terminal could not be opened and was skipped.
    Skipped(Errno),
}

pub struct Hygiene<'a> {
    pub terminal: &'a str,
    pub logfile: &'a str,
    pub headless: bool,
}

impl<'a> Hygiene<'a> {
    /// Moves slots 0, 1 and 2 from whatever was inherited onto `/dev/null`
    /// and pins the log file at `LOG_FILENO`.
    ///
    /// The order of the steps matters. The terminal is opened by path while
    /// the session still owns it, the log file is opened while the terminal
    /// can still report a failure, and the final `/dev/null` opens rely on
    /// lowest-free-descriptor allocation to land on 0, 1 and 2.
    ///
    /// `logger` moves to the log file as soon as it is pinned, so a failure
    /// while the standard slots are half rebound still gets written somewhere.
    pub fn apply(&self, logger: &mut Logger) -> Result<TerminalStep, DetachError> {
        flush_stdout();

        let terminal = match open_terminal(self.terminal) {
            Ok(fd) => TerminalStep::Attached {
                fd,
                announce: attach_stdout(fd)?,
            },
            Err(e) if self.headless => TerminalStep::Skipped(e),
            Err(e) => {
                return Err(DetachError::descriptor(
                    &format!("open terminal {}", self.terminal),
                    e,
                ))
            }
        };

        let log_fd = open_log(self.logfile)?;
        logger.redirect(Sink::Descriptor(log_fd));
        null_standard_slots()?;
        Ok(terminal)
    }
}

/// Rebinds slot 1 to the freshly opened terminal descriptor `fd`.
///
/// Slot 1 is closed first so that only the duplication decides where stdout
/// points afterwards; `fd` is announced on the terminal while slot 1 is empty.
fn attach_stdout(fd: RawFd) -> Result<Option<Errno>, DetachError> {
    if fd == STDOUT_FILENO {
        return Ok(announce(fd).err());
    }
    close(STDOUT_FILENO).map_err(|e| DetachError::descriptor("close stdout", e))?;
    let announced = announce(fd).err();
    dup2(fd, STDOUT_FILENO).map_err(|e| DetachError::descriptor("dup2 terminal to stdout", e))?;
    close(fd).map_err(|e| DetachError::descriptor("close terminal descriptor", e))?;
    Ok(announced)
}

fn announce(fd: RawFd) -> Result<(), Errno> {
    let line = format!("process {} opened terminal descriptor {fd}\n", getpid());
    write(fd, line.as_bytes()).map(drop)
}

/// Opens (creating if needed) the append-mode log and moves it onto
/// `LOG_FILENO` if the kernel handed out another slot.
pub fn open_log(path: &str) -> Result<RawFd, DetachError> {
    let fd = open(
        path,
        OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_APPEND,
        Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP,
    )
    .map_err(|e| DetachError::descriptor(&format!("open log file {path}"), e))?;

    if fd != LOG_FILENO {
        dup2(fd, LOG_FILENO).map_err(|e| DetachError::descriptor("dup2 log file", e))?;
        close(fd).map_err(|e| DetachError::descriptor("close log file", e))?;
    }
    Ok(LOG_FILENO)
}

fn null_standard_slots() -> Result<(), DetachError> {
    close(STDIN_FILENO).map_err(|e| DetachError::descriptor("close stdin", e))?;
    close(STDERR_FILENO).map_err(|e| DetachError::descriptor("close stderr", e))?;
    close(STDOUT_FILENO).map_err(|e| DetachError::descriptor("close stdout", e))?;

    reopen_null(STDIN_FILENO, OFlag::O_RDONLY)?;
    reopen_null(STDOUT_FILENO, OFlag::O_WRONLY)?;
    reopen_null(STDERR_FILENO, OFlag::O_RDWR)
}

fn reopen_null(expected: RawFd, flags: OFlag) -> Result<(), DetachError> {
    let actual = open(DEV_NULL, flags, Mode::empty())
        .map_err(|e| DetachError::descriptor(&format!("open {DEV_NULL} for slot {expected}"), e))?;
    if actual != expected {
        return Err(DetachError::SlotMismatch { expected, actual });
    }
    Ok(())
}

pub fn slot_access_mode(fd: RawFd) -> Result<OFlag, Errno> {
    let flags = fcntl(fd, FcntlArg::F_GETFL)?;
    Ok(OFlag::from_bits_truncate(flags) & OFlag::O_ACCMODE)
}

fn access_name(mode: OFlag) -> &'static str {
    if mode == OFlag::O_RDONLY {
        "read-only"
    } else if mode == OFlag::O_WRONLY {
        "write-only"
    } else if mode == OFlag::O_RDWR {
        "read-write"
    } else {
        "unknown"
    }
}

/// Whether `fd` refers to the same file as `path`.
pub fn bound_to(fd: RawFd, path: &str) -> Result<bool, Errno> {
    let open = fstat(fd)?;
    let named = stat(path)?;
    Ok(open.st_dev == named.st_dev && open.st_ino == named.st_ino)
}

/// One-line summary of the standard slots, e.g. for the daemon's log.
pub fn describe_standard_slots() -> String {
    [STDIN_FILENO, STDOUT_FILENO, STDERR_FILENO]
        .iter()
        .map(|&fd| match slot_access_mode(fd) {
            Ok(mode) => format!("{fd}: {}", access_name(mode)),
            Err(e) => format!("{fd}: {e}"),
        })
        .collect::<Vec<String>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{spawn_next, wait_for, Spawn};
    use crate::logger::LogLevel;
    use serial_test::serial;
    use std::fs;

    fn run_in_child<F: FnOnce() -> i32>(check: F) -> Option<i32> {
        match spawn_next().unwrap() {
            Spawn::Parent(child) => wait_for(child).unwrap().exit_code(),
            Spawn::Child => {
                let code = check();
                unsafe { libc::_exit(code) }
            }
        }
    }

    fn slots_are_null() -> bool {
        let modes = [
            (STDIN_FILENO, OFlag::O_RDONLY),
            (STDOUT_FILENO, OFlag::O_WRONLY),
            (STDERR_FILENO, OFlag::O_RDWR),
        ];
        modes.iter().all(|&(fd, mode)| {
            slot_access_mode(fd) == Ok(mode) && bound_to(fd, DEV_NULL) == Ok(true)
        })
    }

    #[test]
    fn test_access_name() {
        assert_eq!("read-only", access_name(OFlag::O_RDONLY));
        assert_eq!("write-only", access_name(OFlag::O_WRONLY));
        assert_eq!("read-write", access_name(OFlag::O_RDWR));
    }

    #[test]
    #[serial]
    fn test_slots_bound_to_null_after_hygiene() {
        let dir = tempfile::tempdir().unwrap();
        let terminal = dir.path().join("terminal");
        let logfile = dir.path().join("daemon.log");
        fs::write(&terminal, "").unwrap();
        let terminal = terminal.to_str().unwrap().to_owned();
        let logfile = logfile.to_str().unwrap().to_owned();

        let code = run_in_child(|| {
            let hygiene = Hygiene {
                terminal: &terminal,
                logfile: &logfile,
                headless: false,
            };
            let mut logger = Logger::new(LogLevel::Info);
            match hygiene.apply(&mut logger) {
                Ok(TerminalStep::Attached { announce: None, .. }) => {}
                Ok(_) => return 1,
                Err(_) => return 2,
            }
            if logger.sink() != Sink::Descriptor(LOG_FILENO) {
                return 6;
            }
            if !slots_are_null() {
                return 3;
            }
            if bound_to(LOG_FILENO, &logfile) != Ok(true) {
                return 4;
            }
            if slot_access_mode(LOG_FILENO) != Ok(OFlag::O_RDWR) {
                return 5;
            }
            0
        });
        assert_eq!(Some(0), code);

        let written = fs::read_to_string(&terminal).unwrap();
        assert!(written.contains("opened terminal descriptor"));
        assert!(fs::metadata(&logfile).is_ok());
    }

    #[test]
    #[serial]
    fn test_headless_skips_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let logfile = dir.path().join("daemon.log");
        let logfile = logfile.to_str().unwrap().to_owned();

        let code = run_in_child(|| {
            let hygiene = Hygiene {
                terminal: "/nonexistent/doublefork/tty",
                logfile: &logfile,
                headless: true,
            };
            match hygiene.apply(&mut Logger::new(LogLevel::Info)) {
                Ok(TerminalStep::Skipped(Errno::ENOENT)) if slots_are_null() => 0,
                Ok(_) => 1,
                Err(_) => 2,
            }
        });
        assert_eq!(Some(0), code);
    }

    #[test]
    #[serial]
    fn test_missing_terminal_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let logfile = dir.path().join("daemon.log");
        let logfile = logfile.to_str().unwrap().to_owned();

        let code = run_in_child(|| {
            let hygiene = Hygiene {
                terminal: "/nonexistent/doublefork/tty",
                logfile: &logfile,
                headless: false,
            };
            let mut logger = Logger::new(LogLevel::Info);
            match hygiene.apply(&mut logger) {
                Err(DetachError::Descriptor { errno: Errno::ENOENT, .. })
                    if logger.sink() == Sink::Stdout =>
                {
                    0
                }
                _ => 1,
            }
        });
        assert_eq!(Some(0), code);
        // nothing past the terminal step ran
        assert!(fs::metadata(&logfile).is_err());
    }

    #[test]
    #[serial]
    fn test_log_pinned_to_fixed_slot() {
        let dir = tempfile::tempdir().unwrap();
        let logfile = dir.path().join("pinned.log");
        let logfile = logfile.to_str().unwrap().to_owned();

        let code = run_in_child(|| {
            match open_log(&logfile) {
                Ok(LOG_FILENO) if bound_to(LOG_FILENO, &logfile) == Ok(true) => {
                    let _ = write(LOG_FILENO, b"pinned\n");
                    0
                }
                _ => 1,
            }
        });
        assert_eq!(Some(0), code);
        assert_eq!("pinned\n", fs::read_to_string(&logfile).unwrap());
    }

    #[test]
    #[serial]
    fn test_failure_after_log_open_reaches_log() {
        let dir = tempfile::tempdir().unwrap();
        let logfile = dir.path().join("daemon.log");
        let logfile = logfile.to_str().unwrap().to_owned();

        let code = run_in_child(|| {
            // stdin already gone: the log is handed slot 0 first, then
            // closing stdin fails once the standard slots are being rebound
            if close(STDIN_FILENO).is_err() {
                return 1;
            }
            let hygiene = Hygiene {
                terminal: "/nonexistent/doublefork/tty",
                logfile: &logfile,
                headless: true,
            };
            let mut logger = Logger::new(LogLevel::Info);
            match hygiene.apply(&mut logger) {
                Err(e @ DetachError::Descriptor { errno: Errno::EBADF, .. }) => {
                    logger.crit(&e.to_string());
                    if logger.sink() == Sink::Descriptor(LOG_FILENO) {
                        0
                    } else {
                        2
                    }
                }
                _ => 3,
            }
        });
        assert_eq!(Some(0), code);

        let log = fs::read_to_string(&logfile).unwrap();
        assert!(log.contains("CRIT descriptor: failed to close stdin: EBADF"));
    }

    #[test]
    #[serial]
    #[cfg(target_os = "linux")]
    fn test_failed_announcement_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let logfile = dir.path().join("daemon.log");
        let logfile = logfile.to_str().unwrap().to_owned();

        let code = run_in_child(|| {
            // every write to /dev/full fails with ENOSPC
            let hygiene = Hygiene {
                terminal: "/dev/full",
                logfile: &logfile,
                headless: false,
            };
            match hygiene.apply(&mut Logger::new(LogLevel::Info)) {
                Ok(TerminalStep::Attached {
                    announce: Some(Errno::ENOSPC),
                    ..
                }) if slots_are_null() => 0,
                Ok(_) => 1,
                Err(_) => 2,
            }
        });
        assert_eq!(Some(0), code);
    }
}
