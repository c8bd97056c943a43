//! What the executable can do for you.
//!
//! This module ties the configuration and the validation engine together
//! into the one thing the command line entry point actually runs.

use std::{fs, io, thread};
use clap::{App, ArgMatches};
use log::error;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::ExitError;
use crate::logger::Logger;
use crate::metrics::Metrics;
use crate::origins::AddressOrigins;


//------------ Operation ------------------------------------------------------

/// The one thing this executable does: run validation against a [`Config`].
pub struct Operation;

impl Operation {
    /// Initializes the bare-bones startup logger.
    ///
    /// Must be called before anything else that might log, including
    /// parsing the configuration.
    pub fn init() -> Result<(), ExitError> {
        Logger::init()?;
        Ok(())
    }

    /// Adds the command line arguments understood by this module to `app`.
    ///
    /// Everything this program takes is already covered by
    /// [`Config::config_args`]; there is no separate command to select.
    pub fn config_args<'a: 'b, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
        app
    }

    pub fn from_arg_matches(
        _matches: &ArgMatches
    ) -> Result<Self, ExitError> {
        Ok(Operation)
    }

    /// Runs validation against `config` until told to stop.
    ///
    /// In one-off mode (the default), this performs a single run to
    /// stability, writes out the resulting ROAs, and returns. In repeat
    /// mode (`--repeat`), it keeps doing that every `refresh` interval
    /// until the process is killed.
    pub fn run(self, config: Config) -> Result<(), ExitError> {
        Logger::switch(&config)?;
        let engine = Engine::new(config.clone())?;
        engine.init()?;
        loop {
            let (roas, metrics) = engine.process()?;
            if config.process {
                Self::write_output(&config, &roas, &metrics)?;
            }
            if !config.repeat {
                break;
            }
            thread::sleep(config.refresh);
        }
        Ok(())
    }

    fn write_output(
        config: &Config, roas: &AddressOrigins, metrics: &Metrics
    ) -> Result<(), ExitError> {
        let res = match config.output {
            Some(ref path) => {
                let mut file = fs::File::create(path).map_err(|err| {
                    error!(
                        "Failed to open output file {}: {}.",
                        path.display(), err
                    );
                    ExitError::Generic
                })?;
                config.format.output(roas, None, metrics, &mut file)
            }
            None => {
                let stdout = io::stdout();
                let mut target = stdout.lock();
                config.format.output(roas, None, metrics, &mut target)
            }
        };
        res.map_err(|err| {
            error!("Failed to write output: {}.", err);
            ExitError::Generic
        })
    }
}
