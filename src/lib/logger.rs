use libc::{c_char, localtime_r, strftime, tm};
use nix::unistd::write;
use std::fmt;
use std::io::Write;
use std::mem::MaybeUninit;
use std::os::unix::io::RawFd;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, PartialEq, PartialOrd, Clone, Copy)]
pub enum LogLevel {
    Crit = 0,
    Warn = 1,
    Info = 2,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                LogLevel::Info => "INFO",
                LogLevel::Warn => "WARN",
                LogLevel::Crit => "CRIT",
            }
        )
    }
}

/// Where log lines end up. The terminal inherited at launch is only reachable
/// through stdout; after detachment the log file descriptor is the only sink.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Sink {
    Stdout,
    Descriptor(RawFd),
}

pub struct Logger {
    level: LogLevel,
    sink: Sink,
}

impl Logger {
    pub fn new(level: LogLevel) -> Self {
        Logger {
            level,
            sink: Sink::Stdout,
        }
    }

    pub fn sink(&self) -> Sink {
        self.sink
    }

    /// Stdout is flushed first so nothing buffered leaks into whatever slot 1
    /// gets rebound to.
    pub fn redirect(&mut self, sink: Sink) {
        flush_stdout();
        self.sink = sink;
    }

    fn get_epoch_time() -> (i64, i64) {
        let since_the_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let millis = since_the_epoch.as_millis();

        ((millis / 1000) as i64, (millis % 1000) as i64)
    }

    fn get_formated_timestamp() -> String {
        let (seconds, millis) = Self::get_epoch_time();
        let seconds = seconds as libc::time_t;

        let mut datetime = unsafe { MaybeUninit::<tm>::zeroed().assume_init() };
        unsafe { localtime_r(&seconds, &mut datetime) };

        let mut buf: [u8; 64] = [0; 64];
        let length = unsafe {
            strftime(
                buf.as_mut_ptr() as *mut c_char,
                buf.len(),
                b"%Y-%m-%d %H:%M:%S.\0".as_ptr() as *const c_char,
                &datetime,
            )
        };

        let mut timestamp = String::from_utf8_lossy(&buf[..length]).into_owned();
        timestamp.push_str(&format!("{:03}", millis));

        timestamp
    }

    pub fn format_line(level: LogLevel, message: &str) -> String {
        format!("{} {level} {message}\n", Self::get_formated_timestamp())
    }

    fn log(&self, level: LogLevel, message: &str) {
        if self.level < level {
            return;
        }
        let line = Self::format_line(level, message);
        match self.sink {
            Sink::Stdout => {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(line.as_bytes());
                let _ = stdout.flush();
            }
            // one write per line keeps appends from several processes whole
            Sink::Descriptor(fd) => {
                let _ = write(fd, line.as_bytes());
            }
        }
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn crit(&self, message: &str) {
        self.log(LogLevel::Crit, message);
    }
}

pub fn flush_stdout() {
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::os::unix::io::AsRawFd;

    #[test]
    fn test_level_order() {
        assert!(LogLevel::Crit < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
    }

    #[test]
    fn test_format_line() {
        let line = Logger::format_line(LogLevel::Warn, "hello");
        assert!(line.ends_with(" WARN hello\n"));
        // "YYYY-MM-DD HH:MM:SS.mmm"
        let timestamp = line.split(" WARN").next().unwrap();
        assert_eq!(23, timestamp.len());
        assert_eq!(Some('.'), timestamp.chars().nth(19));
    }

    #[test]
    fn test_descriptor_sink_filters_by_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();

        let mut logger = Logger::new(LogLevel::Warn);
        logger.redirect(Sink::Descriptor(file.as_raw_fd()));
        assert_eq!(Sink::Descriptor(file.as_raw_fd()), logger.sink());

        logger.info("dropped");
        logger.warn("kept warning");
        logger.crit("kept critical");

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(2, lines.len());
        assert!(lines[0].ends_with("WARN kept warning"));
        assert!(lines[1].ends_with("CRIT kept critical"));
    }
}
