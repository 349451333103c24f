use super::config_error::*;
use crate::logger::LogLevel;
use crate::terminal::CONTROLLING_TTY;
use std::error::Error;

#[derive(Debug, PartialEq)]
pub struct DaemonConfig {
    pub logfile: String,
    pub terminal: String,
    pub headless: bool,
    pub umask: u32,
    pub settle_secs: u64,
    pub linger_secs: u64,
    pub log_level: LogLevel,
}

impl DaemonConfig {
    pub fn new() -> Self {
        DaemonConfig {
            logfile: "daemon.log".to_owned(),
            terminal: CONTROLLING_TTY.to_owned(),
            headless: false,
            umask: 0,
            settle_secs: 1,
            linger_secs: 0,
            log_level: LogLevel::Info,
        }
    }

    fn parse_umask(k: &str, v: &str) -> Result<u32, ConfigValueError> {
        match u32::from_str_radix(v, 8) {
            Ok(mask) if mask <= 0o777 => Ok(mask),
            _ => Err(ConfigValueError::new(k, v)),
        }
    }

    fn parse_log_level(k: &str, v: &str) -> Result<LogLevel, ConfigValueError> {
        match v {
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "crit" => Ok(LogLevel::Crit),
            _ => Err(ConfigValueError::new(k, v)),
        }
    }

    fn parse<T: std::str::FromStr>(k: &str, v: &str) -> Result<T, ConfigValueError> {
        v.parse::<T>().map_err(|_| ConfigValueError::new(k, v))
    }

    pub fn from(prop: &ini::Properties) -> Result<Self, Box<dyn Error>> {
        let mut config = DaemonConfig::new();
        for (k, v) in prop.iter() {
            match k {
                "logfile" => config.logfile = v.to_owned(),
                "terminal" => config.terminal = v.to_owned(),
                "headless" => config.headless = DaemonConfig::parse::<bool>(k, v)?,
                "umask" => config.umask = DaemonConfig::parse_umask(k, v)?,
                "settle_secs" => config.settle_secs = DaemonConfig::parse::<u64>(k, v)?,
                "linger_secs" => config.linger_secs = DaemonConfig::parse::<u64>(k, v)?,
                "log_level" => config.log_level = DaemonConfig::parse_log_level(k, v)?,
                _ => return Err(Box::new(ConfigKeyError::new(k))),
            }
        }
        Ok(config)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig::new()
    }
}
