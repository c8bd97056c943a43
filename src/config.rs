//! Configuration.
//!
//! Configuration comes from three layers, from lowest to highest
//! precedence: built-in defaults, an optional TOML configuration file, and
//! command line arguments. [`Config::create`] drives all three: it builds
//! the `clap` argument parser, then calls [`Config::from_arg_matches`] to
//! produce the final, merged [`Config`].

use std::{env, fs, process};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use clap::{App, Arg, ArgMatches};
use dirs::home_dir;
use log::{error, LevelFilter};
use serde::Deserialize;
use crate::error::Failed;
use crate::output::OutputFormat;


//------------ Config ---------------------------------------------------------

/// The configuration for a validation run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Path to the directory that contains the repository cache.
    pub cache_dir: PathBuf,

    /// Path to the directory that contains the trust anchor locators.
    pub tal_dir: PathBuf,

    /// Path to the optional local exceptions (SLURM) file.
    pub exceptions: Option<PathBuf>,

    /// Reject, warn about, or silently accept invalid resource certificates
    /// found while otherwise successfully walking the chain.
    pub strict: bool,

    /// What to do about manifests and CRLs that are stale (past their
    /// nextUpdate).
    pub stale: FilterPolicy,

    /// What to do about object types we don't understand.
    pub unknown_objects: FilterPolicy,

    /// Don't update the local rsync or RRDP caches, use what's there.
    pub update: bool,

    /// Don't validate, just update the caches.
    pub process: bool,

    /// Disable rsync entirely.
    pub disable_rsync: bool,

    /// The command to run for rsync.
    pub rsync_command: String,

    /// Extra arguments to pass to rsync. `None` picks sensible defaults.
    pub rsync_args: Option<Vec<String>>,

    /// Timeout for a single rsync invocation.
    pub rsync_timeout: Duration,

    /// Disable RRDP entirely.
    pub disable_rrdp: bool,

    /// Timeout for RRDP HTTP requests.
    pub rrdp_timeout: Duration,

    /// Fall back to rsync when RRDP fails for a publication point.
    pub rrdp_failover: bool,

    /// Refuse to fetch from rsync authorities that look dangerous
    /// (`localhost`, bare IP literals, explicit ports).
    pub filter_dubious_hosts: bool,

    /// How long to wait between validation runs in repeat mode.
    pub refresh: Duration,

    /// How long to wait before retrying a publication point whose last
    /// fetch failed.
    pub retry: Duration,

    /// How long cached data may be used without being refreshed at all
    /// before it is considered expired.
    pub expire: Duration,

    /// The maximum number of discovery iterations per validation run.
    pub max_iterations: usize,

    /// Keep validating every `refresh` interval instead of exiting once.
    pub repeat: bool,

    /// Path to the output file, or `None` for stdout.
    pub output: Option<PathBuf>,

    /// The output format.
    pub format: OutputFormat,

    /// The minimum log level to emit.
    pub log_level: LevelFilter,

    /// Where to send log output.
    pub log_target: LogTarget,
}

impl Config {
    /// Adds the command line arguments understood by this module to `app`.
    pub fn config_args<'a: 'b, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
        app
            .arg(Arg::with_name("config")
                 .short("c")
                 .long("config")
                 .value_name("FILE")
                 .help("read base configuration from this TOML file")
                 .takes_value(true)
            )
            .arg(Arg::with_name("basedir")
                 .short("b")
                 .long("base-dir")
                 .value_name("DIR")
                 .help("sets the base directory for cache and TALs")
                 .takes_value(true)
            )
            .arg(Arg::with_name("cachedir")
                 .long("cache-dir")
                 .value_name("DIR")
                 .help("sets the repository cache directory")
                 .takes_value(true)
            )
            .arg(Arg::with_name("taldir")
                 .short("t")
                 .long("tal-dir")
                 .value_name("DIR")
                 .help("sets the TAL directory")
                 .takes_value(true)
            )
            .arg(Arg::with_name("exceptions")
                 .short("x")
                 .long("exceptions")
                 .value_name("FILE")
                 .help("file with local exceptions (see RFC 8416 for format)")
                 .takes_value(true)
            )
            .arg(Arg::with_name("strict")
                 .long("strict")
                 .help("parse and validate RPKI data in strict mode")
            )
            .arg(Arg::with_name("stale")
                 .long("stale")
                 .value_name("POLICY")
                 .possible_values(&["reject", "warn", "accept"])
                 .help("how to treat stale manifests and CRLs")
                 .takes_value(true)
            )
            .arg(Arg::with_name("unknown_objects")
                 .long("unknown-objects")
                 .value_name("POLICY")
                 .possible_values(&["reject", "warn", "accept"])
                 .help("how to treat unknown signed object types")
                 .takes_value(true)
            )
            .arg(Arg::with_name("noupdate")
                 .short("n")
                 .long("noupdate")
                 .help("don't update the local cache")
            )
            .arg(Arg::with_name("noprocess")
                 .short("N")
                 .long("noprocess")
                 .help("don't process and validate the repository")
            )
            .arg(Arg::with_name("disable_rsync")
                 .long("disable-rsync")
                 .help("disable rsync entirely")
            )
            .arg(Arg::with_name("rsync_command")
                 .long("rsync-command")
                 .value_name("COMMAND")
                 .help("the command to run for rsync")
                 .takes_value(true)
            )
            .arg(Arg::with_name("disable_rrdp")
                 .long("disable-rrdp")
                 .help("disable RRDP entirely")
            )
            .arg(Arg::with_name("rrdp_failover")
                 .long("rrdp-failover")
                 .help("fall back to rsync if RRDP fails")
            )
            .arg(Arg::with_name("allow_dubious_hosts")
                 .long("allow-dubious-hosts")
                 .help("allow rsync URIs with localhost, IP literal or \
                        explicit port authorities")
            )
            .arg(Arg::with_name("refresh")
                 .long("refresh")
                 .value_name("SECONDS")
                 .help("refresh interval for repeat mode, in seconds")
                 .takes_value(true)
            )
            .arg(Arg::with_name("max_iterations")
                 .long("max-iterations")
                 .value_name("COUNT")
                 .help("maximum discovery iterations per validation run")
                 .takes_value(true)
            )
            .arg(Arg::with_name("repeat")
                 .short("r")
                 .long("repeat")
                 .help("repeatedly run validation every refresh interval")
            )
            .arg(Arg::with_name("output")
                 .short("o")
                 .long("output")
                 .value_name("FILE")
                 .help("output file, '-' or not present for stdout")
                 .takes_value(true)
            )
            .arg(Arg::with_name("outform")
                 .short("f")
                 .long("outform")
                 .value_name("FORMAT")
                 .possible_values(OutputFormat::VALUES)
                 .help("sets the output format")
                 .takes_value(true)
            )
            .arg(Arg::with_name("syslog")
                 .long("syslog")
                 .help("log to syslog instead of stderr")
            )
            .arg(Arg::with_name("logfile")
                 .long("logfile")
                 .value_name("FILE")
                 .help("log to this file instead of stderr")
                 .takes_value(true)
            )
            .arg(Arg::with_name("verbose")
                 .short("v")
                 .long("verbose")
                 .multiple(true)
                 .help("print more (and more) information")
            )
            .arg(Arg::with_name("quiet")
                 .short("q")
                 .long("quiet")
                 .help("print less information, show only errors")
            )
    }

    /// Builds the final configuration from parsed arguments.
    pub fn from_arg_matches(
        matches: &ArgMatches, cur_dir: &Path
    ) -> Result<Self, Failed> {
        let file = match matches.value_of("config") {
            Some(path) => Some(ConfigFile::load(&cur_dir.join(path))?),
            None => None,
        };
        let file = file.unwrap_or_default();

        let (cache_dir, tal_dir) = Self::prepare_dirs(matches, cur_dir, &file)?;

        Ok(Config {
            cache_dir,
            tal_dir,
            exceptions: matches.value_of("exceptions")
                .map(|path| cur_dir.join(path))
                .or_else(|| file.exceptions.clone().map(PathBuf::from)),
            strict: matches.is_present("strict") || file.strict,
            stale: Self::arg_filter_policy(
                matches, "stale", file.stale
            )?,
            unknown_objects: Self::arg_filter_policy(
                matches, "unknown_objects", file.unknown_objects
            )?,
            update: !matches.is_present("noupdate"),
            process: !matches.is_present("noprocess"),
            disable_rsync:
                matches.is_present("disable_rsync") || file.disable_rsync,
            rsync_command: matches.value_of("rsync_command")
                .map(ToString::to_string)
                .unwrap_or_else(|| {
                    file.rsync_command.clone()
                        .unwrap_or_else(|| "rsync".into())
                }),
            rsync_args: file.rsync_args.clone(),
            rsync_timeout: Duration::from_secs(
                file.rsync_timeout.unwrap_or(300)
            ),
            disable_rrdp:
                matches.is_present("disable_rrdp") || file.disable_rrdp,
            rrdp_timeout: Duration::from_secs(
                file.rrdp_timeout.unwrap_or(30)
            ),
            rrdp_failover:
                matches.is_present("rrdp_failover") || file.rrdp_failover,
            filter_dubious_hosts: !(
                matches.is_present("allow_dubious_hosts")
                || file.allow_dubious_hosts
            ),
            refresh: Duration::from_secs(
                Self::arg_u64(matches, "refresh")?.or(file.refresh)
                    .unwrap_or(3600)
            ),
            retry: Duration::from_secs(file.retry.unwrap_or(600)),
            expire: Duration::from_secs(file.expire.unwrap_or(7200)),
            max_iterations: Self::arg_usize(matches, "max_iterations")?
                .or(file.max_iterations)
                .unwrap_or(32),
            repeat: matches.is_present("repeat") || file.repeat,
            output: match matches.value_of("output") {
                None | Some("-") => None,
                Some(path) => Some(cur_dir.join(path)),
            },
            format: match matches.value_of("outform") {
                Some(value) => OutputFormat::from_str(value)?,
                None => OutputFormat::Csv,
            },
            log_level: match matches.occurrences_of("verbose") {
                0 if matches.is_present("quiet") => LevelFilter::Error,
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                _ => LevelFilter::Debug,
            },
            log_target: if matches.is_present("syslog") {
                LogTarget::Syslog
            }
            else if let Some(path) = matches.value_of("logfile") {
                LogTarget::File(cur_dir.join(path))
            }
            else {
                LogTarget::Stderr
            },
        })
    }

    fn arg_filter_policy(
        matches: &ArgMatches, name: &str, default: Option<FilterPolicy>
    ) -> Result<FilterPolicy, Failed> {
        match matches.value_of(name) {
            Some(value) => FilterPolicy::from_str(value).map_err(|_| {
                error!("Invalid value '{}' for --{}.", value, name);
                Failed
            }),
            None => Ok(default.unwrap_or(FilterPolicy::Reject)),
        }
    }

    fn arg_u64(
        matches: &ArgMatches, name: &str
    ) -> Result<Option<u64>, Failed> {
        match matches.value_of(name) {
            Some(value) => u64::from_str(value).map(Some).map_err(|_| {
                error!("Invalid value '{}' for --{}.", value, name);
                Failed
            }),
            None => Ok(None),
        }
    }

    fn arg_usize(
        matches: &ArgMatches, name: &str
    ) -> Result<Option<usize>, Failed> {
        match matches.value_of(name) {
            Some(value) => usize::from_str(value).map(Some).map_err(|_| {
                error!("Invalid value '{}' for --{}.", value, name);
                Failed
            }),
            None => Ok(None),
        }
    }

    /// Determines and prepares the cache and TAL directories.
    fn prepare_dirs(
        matches: &ArgMatches, cur_dir: &Path, file: &ConfigFile
    ) -> Result<(PathBuf, PathBuf), Failed> {
        let base_dir = match matches.value_of("basedir") {
            Some(dir) => Some(cur_dir.join(dir)),
            None => match file.base_dir.as_ref() {
                Some(dir) => Some(cur_dir.join(dir)),
                None => home_dir().map(|dir| dir.join(".rpki-cache")),
            }
        };
        let cache_dir = match matches.value_of("cachedir") {
            Some(dir) => cur_dir.join(dir),
            None => match base_dir.as_ref() {
                Some(dir) => dir.join("repository"),
                None => {
                    error!(
                        "Can't determine default working directory. \
                         Please use the --base-dir option."
                    );
                    return Err(Failed)
                }
            }
        };
        let tal_dir = match matches.value_of("taldir") {
            Some(dir) => cur_dir.join(dir),
            None => match base_dir.as_ref() {
                Some(dir) => dir.join("tals"),
                None => {
                    error!(
                        "Can't determine default working directory. \
                         Please use the --base-dir option."
                    );
                    return Err(Failed)
                }
            }
        };
        if let Err(err) = fs::create_dir_all(&cache_dir) {
            error!(
                "Can't create repository directory {}: {}.",
                cache_dir.display(), err
            );
            return Err(Failed)
        }
        if fs::read_dir(&tal_dir).is_err() {
            if let Err(err) = fs::create_dir_all(&tal_dir) {
                error!(
                    "Can't create TAL directory {}: {}.",
                    tal_dir.display(), err
                );
                return Err(Failed)
            }
        }
        Ok((cache_dir, tal_dir))
    }
}


//------------ FilterPolicy ----------------------------------------------------

/// What to do when encountering a condition we could strictly reject.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FilterPolicy {
    /// Drop the offending object (and, where applicable, everything under
    /// it in the trust chain).
    Reject,

    /// Log a warning but otherwise keep going as if the problem did not
    /// exist.
    Warn,

    /// Silently accept the object.
    Accept,
}

impl FromStr for FilterPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(FilterPolicy::Reject),
            "warn" => Ok(FilterPolicy::Warn),
            "accept" => Ok(FilterPolicy::Accept),
            _ => Err(()),
        }
    }
}


//------------ LogTarget -------------------------------------------------------

/// Where to send log messages.
#[derive(Clone, Debug)]
pub enum LogTarget {
    /// Write to standard error.
    Stderr,

    /// Write to a file.
    File(PathBuf),

    /// Write to the system log (Unix only).
    Syslog,
}


//------------ ConfigFile -------------------------------------------------------

/// The subset of [`Config`] that can be set via a TOML configuration file.
///
/// Every field is optional; whatever isn't set falls back to the built-in
/// default or is overridden by a matching command line argument.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct ConfigFile {
    base_dir: Option<PathBuf>,
    exceptions: Option<PathBuf>,
    strict: bool,
    stale: Option<FilterPolicy>,
    unknown_objects: Option<FilterPolicy>,
    disable_rsync: bool,
    rsync_command: Option<String>,
    rsync_args: Option<Vec<String>>,
    rsync_timeout: Option<u64>,
    disable_rrdp: bool,
    rrdp_timeout: Option<u64>,
    rrdp_failover: bool,
    allow_dubious_hosts: bool,
    refresh: Option<u64>,
    retry: Option<u64>,
    expire: Option<u64>,
    max_iterations: Option<usize>,
    repeat: bool,
}

impl ConfigFile {
    fn load(path: &Path) -> Result<Self, Failed> {
        let text = fs::read_to_string(path).map_err(|err| {
            error!(
                "Failed to read config file {}: {}.", path.display(), err
            );
            Failed
        })?;
        toml::from_str(&text).map_err(|err| {
            error!(
                "Failed to parse config file {}: {}.", path.display(), err
            );
            Failed
        })
    }
}


//------------ helpers ----------------------------------------------------------

/// Determines the current directory or exits the process.
///
/// Used by `main` before any logging is set up, so failures are reported
/// directly rather than through `error!`.
pub fn current_dir() -> PathBuf {
    match env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!(
                "Fatal: cannot get current directory ({}). Aborting.", err
            );
            process::exit(1);
        }
    }
}

/// Writes `content` to `path`, creating parent directories as needed.
#[allow(dead_code)]
fn write_file(path: &Path, content: &[u8]) -> Result<(), Failed> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|_| Failed)?;
    }
    let mut file = fs::File::create(path).map_err(|_| Failed)?;
    file.write_all(content).map_err(|_| Failed)
}
