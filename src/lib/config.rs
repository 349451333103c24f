extern crate ini;

mod config_error;
mod daemon_config;
mod parser_ini;

pub use config_error::*;
pub use daemon_config::DaemonConfig;
use std::error::Error;

#[derive(Debug, PartialEq, Default)]
pub struct Config {
    pub daemon: DaemonConfig,
}

impl Config {
    pub fn from(file_path: &str) -> Result<Self, Box<dyn Error>> {
        let ini = parser_ini::load_ini(file_path)?;
        let mut daemon = DaemonConfig::new();
        for (sec, prop) in ini.iter() {
            if let Some("daemon") = sec {
                daemon = DaemonConfig::from(prop)?;
            }
        }
        Ok(Config { daemon })
    }
}
