#[macro_use] extern crate clap;
extern crate rpkigator;

use std::process::exit;
use clap::App;
use rpkigator::config::{self, Config};
use rpkigator::error::ExitError;
use rpkigator::operation::Operation;

fn _main() -> Result<(), ExitError> {
    Operation::init()?;
    let cur_dir = config::current_dir();
    let matches = Operation::config_args(Config::config_args(
        App::new("rpkigator")
            .version(crate_version!())
            .author(crate_authors!())
            .about("collects and validates RPKI repository data")
    )).get_matches();
    let config = Config::from_arg_matches(&matches, &cur_dir)?;
    let operation = Operation::from_arg_matches(&matches)?;
    operation.run(config)
}

fn main() {
    match _main() {
        Ok(()) => exit(0),
        Err(ExitError::Generic) => exit(1),
        Err(ExitError::IncompleteUpdate) => exit(2),
        Err(ExitError::Invalid) => exit(3),
    }
}
