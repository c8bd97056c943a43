//! Logging.
//!
//! All diagnostic output happens through the `log` crate's macros; this
//! module only ever configures where that output goes. [`Logger::init`]
//! sets up a provisional stderr logger early, before the configuration
//! file has even been read, so that any problems reading it can still be
//! reported. Once a [`Config`] is available, [`Logger::switch`] replaces
//! it with whatever the configuration actually asked for.

use std::fs::OpenOptions;
use log::LevelFilter;
use crate::config::{Config, LogTarget};
use crate::error::Failed;


//------------ Logger --------------------------------------------------------

pub struct Logger;

impl Logger {
    /// Sets up a bare-bones logger to stderr at level `warn`.
    ///
    /// Used for the brief window between process start and the
    /// configuration being fully parsed, so that a bad config file or
    /// bad command line arguments can still be reported.
    pub fn init() -> Result<(), Failed> {
        fern::Dispatch::new()
            .level(LevelFilter::Warn)
            .format(Self::format)
            .chain(std::io::stderr())
            .apply()
            .map_err(|err| {
                eprintln!("Failed to initialize logger: {}.", err);
                Failed
            })
    }

    /// Reconfigures logging to match `config`.
    pub fn switch(config: &Config) -> Result<(), Failed> {
        let dispatch = fern::Dispatch::new()
            .level(config.log_level)
            .format(Self::format);
        let dispatch = match config.log_target {
            LogTarget::Stderr => dispatch.chain(std::io::stderr()),
            LogTarget::File(ref path) => {
                let file = OpenOptions::new()
                    .create(true).append(true).open(path)
                    .map_err(|err| {
                        eprintln!(
                            "Failed to open log file '{}': {}.",
                            path.display(), err
                        );
                        Failed
                    })?;
                dispatch.chain(file)
            }
            #[cfg(unix)]
            LogTarget::Syslog => {
                let formatter = syslog::Formatter3164 {
                    facility: syslog::Facility::LOG_DAEMON,
                    hostname: None,
                    process: env!("CARGO_PKG_NAME").into(),
                    pid: std::process::id(),
                };
                let logger = syslog::unix(formatter).map_err(|err| {
                    eprintln!("Failed to connect to syslog: {}.", err);
                    Failed
                })?;
                dispatch.chain(
                    Box::new(syslog::BasicLogger::new(logger))
                        as Box<dyn log::Log>
                )
            }
            #[cfg(not(unix))]
            LogTarget::Syslog => {
                eprintln!("Syslog logging is only supported on Unix.");
                return Err(Failed)
            }
        };
        dispatch.apply().map_err(|err| {
            eprintln!("Failed to initialize logger: {}.", err);
            Failed
        })
    }

    fn format(
        out: fern::FormatCallback, message: &std::fmt::Arguments,
        record: &log::Record
    ) {
        out.finish(format_args!("[{}] {}", record.level(), message))
    }
}
