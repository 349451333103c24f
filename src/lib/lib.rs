pub mod config;
pub mod detach_error;
pub mod generation;
pub mod hygiene;
pub mod identity;
pub mod logger;
pub mod protocol;
pub mod session;
pub mod terminal;

pub fn exit_with_error(err: Box<dyn std::error::Error>) -> ! {
    eprintln!("{err}");
    std::process::exit(libc::EXIT_FAILURE)
}
