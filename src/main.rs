use esopt::cli::run_cli;
use esopt::log::is_logger_initialised;
use human_panic::{metadata, setup_panic};
use log::error;

fn main() {
    setup_panic!(metadata!());

    if let Err(err) = run_cli() {
        if is_logger_initialised() {
            error!("{err:?}");
        } else {
            eprintln!("Error: {err:?}");
        }

        // Terminate program, signalling an error
        std::process::exit(1);
    }
}
