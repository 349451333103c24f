mod error;

use error::ArgError;
use lib::config::Config;
use lib::logger::flush_stdout;
use lib::protocol::Protocol;

use nix::unistd::getpid;

use std::env;
use std::error::Error;
use std::process;

fn load_config(args: &[String]) -> Result<Config, Box<dyn Error>> {
    match args {
        [_] => Ok(Config::default()),
        [_, conf_file] => Config::from(conf_file),
        _ => Err(Box::new(ArgError::new(
            args.first().map(String::as_str).unwrap_or("doublefork"),
        ))),
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let conf = load_config(&args).unwrap_or_else(|e| lib::exit_with_error(e));

    let mut protocol = Protocol::new(&conf.daemon);
    let code = match protocol.run() {
        Ok(role) => {
            protocol
                .logger()
                .info(&format!("{role} {} over and out", getpid()));
            libc::EXIT_SUCCESS
        }
        Err(e) => {
            protocol.logger().crit(&e.to_string());
            libc::EXIT_FAILURE
        }
    };
    flush_stdout();
    process::exit(code)
}
