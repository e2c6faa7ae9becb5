use std::io::{self, Write};
use std::process::ExitCode;

use skiff_config::{Config, ConfigError};

const USAGE_EXIT: u8 = 2;

fn main() -> ExitCode {
    let config = match Config::load_from_iter(std::env::args_os()) {
        Ok(config) => config,
        Err(ConfigError::Parse(error)) => error.exit(),
        Err(error) => {
            let _ = writeln!(io::stderr(), "skiffd: {error}");
            return ExitCode::from(USAGE_EXIT);
        }
    };
    match skiffd::run_node(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(io::stderr(), "skiffd: {error}");
            ExitCode::FAILURE
        }
    }
}
