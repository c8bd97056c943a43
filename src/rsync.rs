//! Rsync URIs and the local rsync cache.
//!
//! RPKI objects are published primarily via rsync modules identified by an
//! `rsync://` URI. [`Uri`] represents such a URI, [`Module`] the module it
//! lives in (the first path component after the authority, matching how
//! the rsync daemon groups content), and [`Cache`] a local, synchronized
//! copy of whatever modules have been visited during a validation run.

use std::{fmt, fs, io, process};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::collections::HashSet;
use std::time::{Duration, SystemTime};
use log::{debug, error, info};
use url::Url;
use crate::config::Config;
use crate::error::Failed;


//------------ Uri -------------------------------------------------------

/// An `rsync://` URI.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Uri(Url);

impl Uri {
    /// Parses a URI from its encoded octets.
    pub fn from_slice(input: &[u8]) -> Result<Self, UriError> {
        if !input.is_ascii() {
            return Err(UriError::NotAscii)
        }
        let s = std::str::from_utf8(input).map_err(|_| UriError::NotAscii)?;
        Self::from_str(s)
    }

    /// Returns the module this URI's object lives in.
    pub fn module(&self) -> Module {
        let mut segments = self.0.path_segments().into_iter().flatten();
        Module {
            authority: self.authority().to_string(),
            module: segments.next().unwrap_or("").to_string(),
        }
    }

    /// Returns the path within the module, not including a leading slash.
    pub fn module_path(&self) -> &str {
        let path = self.0.path();
        let mut segments = path.trim_start_matches('/').splitn(2, '/');
        segments.next();
        segments.next().unwrap_or("")
    }

    /// Returns the `host[:port]` part of the URI.
    pub fn authority(&self) -> &str {
        self.0.host_str().unwrap_or("")
    }

    /// Returns the full on-disk path for this URI's object under `base`.
    ///
    /// Used both by the rsync cache and the RRDP client so both fetch
    /// methods address the same on-disk location for the same object.
    pub fn cache_path(&self, base: &Path) -> PathBuf {
        base.join(self.module().cache_path()).join(self.module_path())
    }

    /// Returns whether `self` lies underneath `base`.
    ///
    /// `base` is normally the `caRepository` URI a publication point was
    /// advertised under; an RRDP endpoint may only publish or withdraw
    /// objects underneath the rsync URI it is paired with.
    pub fn is_under(&self, base: &Uri) -> bool {
        let base = base.to_string();
        let base = base.trim_end_matches('/');
        let this = self.to_string();
        this == base || this.starts_with(&format!("{}/", base))
    }

    /// Resolves `name` relative to this URI.
    ///
    /// Used to turn a manifest's bare file name into the full URI of the
    /// object it refers to, relative to the manifest's own publication
    /// point. `self` must be a directory URI (end in `/`) for this to
    /// resolve sensibly, which is how RPKI certificates' SIA caRepository
    /// values are required to look.
    pub fn join(&self, name: &str) -> Result<Self, UriError> {
        let url = self.0.join(name).map_err(UriError::BadUri)?;
        if url.scheme() != "rsync" {
            return Err(UriError::BadScheme)
        }
        Ok(Uri(url))
    }

    /// Returns whether the URI's authority is one we should never fetch.
    ///
    /// A dubious authority is a hostname portion that definitely cannot be
    /// reached from the public Internet, or that is being used to try to
    /// trick us into fetching from somewhere unintended: `localhost`,
    /// anything that is a literal IP address, and anything that carries an
    /// explicit port.
    pub fn has_dubious_authority(&self) -> bool {
        let authority = self.authority();
        if authority == "localhost" {
            return true
        }
        if self.0.port().is_some() {
            return true
        }
        IpAddr::from_str(authority).is_ok()
    }
}

impl FromStr for Uri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(UriError::BadUri)?;
        if url.scheme() != "rsync" {
            return Err(UriError::BadScheme)
        }
        if url.host_str().is_none() {
            return Err(UriError::BadScheme)
        }
        Ok(Uri(url))
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}


//------------ UriError ---------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub enum UriError {
    NotAscii,
    BadUri(url::ParseError),
    BadScheme,
}

impl fmt::Display for UriError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            UriError::NotAscii => write!(f, "invalid characters"),
            UriError::BadUri(err) => err.fmt(f),
            UriError::BadScheme => write!(f, "not an rsync URI"),
        }
    }
}

impl std::error::Error for UriError { }


//------------ Module -----------------------------------------------------

/// The rsync module an URI's object lives in.
///
/// This is the granularity at which we invoke rsync: the daemon itself
/// groups content by module, and fetching a whole module at once avoids
/// running rsync once per object underneath it.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Module {
    authority: String,
    module: String,
}

impl Module {
    /// Returns the relative path this module is stored under in the cache.
    pub(crate) fn cache_path(&self) -> PathBuf {
        Path::new(&self.authority).join(&self.module)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "rsync://{}/{}", self.authority, self.module)
    }
}


//------------ Cache -------------------------------------------------------

/// A local copy of repository data synchronized via rsync.
///
/// Data is kept under `cache_dir` using the module's authority and name as
/// the path. During a single validation run, [`load`][Self::load] remembers
/// which modules it has already fetched and only ever runs rsync once per
/// module per run.
pub struct Cache {
    /// The base directory for all cached modules.
    cache_dir: PathBuf,

    /// How to invoke rsync, or `None` if rsync updates are disabled.
    command: Option<Command>,

    /// Whether to refuse to fetch from dubious authorities.
    filter_dubious: bool,

    /// The set of modules already updated during this run.
    seen: HashSet<Module>,
}

impl Cache {
    /// Creates the cache directory without building a full value.
    pub fn init(config: &Config) -> Result<(), Failed> {
        Self::create_cache_dir(config)?;
        Ok(())
    }

    fn create_cache_dir(config: &Config) -> Result<PathBuf, Failed> {
        let cache_dir = config.cache_dir.join("rsync");
        if let Err(err) = fs::create_dir_all(&cache_dir) {
            error!(
                "Failed to create rsync cache directory {}: {}.",
                cache_dir.display(), err
            );
            return Err(Failed)
        }
        Ok(cache_dir)
    }

    /// Creates a new cache for one validation run.
    ///
    /// If `update` is false, whatever is already on disk is used as-is and
    /// rsync is never invoked.
    pub fn new(config: &Config, update: bool) -> Result<Option<Self>, Failed> {
        if config.disable_rsync {
            return Ok(None)
        }
        Ok(Some(Cache {
            cache_dir: Self::create_cache_dir(config)?,
            command: if update { Some(Command::new(config)?) } else { None },
            filter_dubious: config.filter_dubious_hosts,
            seen: HashSet::new(),
        }))
    }

    /// Makes sure `uri`'s module is present and up to date in the cache.
    ///
    /// Returns the local path to the object `uri` refers to, or `None` if
    /// the module was rejected before ever trying to fetch it.
    pub fn load(&mut self, uri: &Uri) -> Option<PathBuf> {
        if self.filter_dubious && uri.has_dubious_authority() {
            info!("{}: dubious authority, not fetching.", uri);
            return None
        }
        let module = uri.module();
        let path = self.cache_dir.join(module.cache_path());
        if !self.seen.contains(&module) {
            if let Some(command) = self.command.as_ref() {
                command.update(&module, &path);
            }
            self.seen.insert(module);
        }
        Some(path.join(uri.module_path()))
    }
}


//------------ Command ------------------------------------------------------

/// How to invoke the rsync binary.
struct Command {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Command {
    fn new(config: &Config) -> Result<Self, Failed> {
        let command = config.rsync_command.clone();
        let output = match process::Command::new(&command).arg("-h").output() {
            Ok(output) => output,
            Err(err) => {
                error!("Failed to run rsync ({}): {}", command, err);
                return Err(Failed)
            }
        };
        if !output.status.success() {
            error!(
                "Running rsync -h failed with output:\n{}",
                String::from_utf8_lossy(&output.stderr)
            );
            return Err(Failed)
        }
        Ok(Command {
            command,
            args: config.rsync_args.clone().unwrap_or_default(),
            timeout: config.rsync_timeout,
        })
    }

    /// Runs rsync to bring `destination` up to date with `module`.
    fn update(&self, module: &Module, destination: &Path) {
        let start = SystemTime::now();
        match self.build(module, destination) {
            Ok(mut cmd) => {
                match cmd.output() {
                    Ok(output) => {
                        if !output.status.success() {
                            error!(
                                "rsync {} failed:\n{}",
                                module,
                                String::from_utf8_lossy(&output.stderr)
                            );
                        }
                        debug!(
                            "{}: finished in {:?}.",
                            module, start.elapsed().unwrap_or_default()
                        );
                    }
                    Err(err) => {
                        error!("Failed to run rsync for {}: {}", module, err);
                    }
                }
            }
            Err(err) => {
                error!("Failed to prepare rsync for {}: {}", module, err);
            }
        }
    }

    fn build(
        &self, module: &Module, destination: &Path
    ) -> Result<process::Command, io::Error> {
        info!("rsyncing from {}.", module);
        fs::create_dir_all(destination)?;
        let mut dest = format!("{}", destination.display());
        if !dest.ends_with('/') {
            dest.push('/');
        }
        let mut cmd = process::Command::new(&self.command);
        for arg in &self.args {
            cmd.arg(arg);
        }
        cmd.arg("-rltz")
           .arg("--delete")
           .arg(format!("--timeout={}", self.timeout.as_secs()))
           .arg(module.to_string())
           .arg(dest);
        Ok(cmd)
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_localhost() {
        let uri = Uri::from_str("rsync://localhost/repo/a.cer").unwrap();
        assert!(uri.has_dubious_authority());
    }

    #[test]
    fn rejects_ip_literal() {
        let uri = Uri::from_str("rsync://192.0.2.1/repo/a.cer").unwrap();
        assert!(uri.has_dubious_authority());
    }

    #[test]
    fn accepts_normal_host() {
        let uri = Uri::from_str(
            "rsync://rpki.example.org/repo/a.cer"
        ).unwrap();
        assert!(!uri.has_dubious_authority());
    }

    #[test]
    fn splits_module_and_path() {
        let uri = Uri::from_str(
            "rsync://rpki.example.org/repo/sub/a.cer"
        ).unwrap();
        let module = uri.module();
        assert_eq!(module.to_string(), "rsync://rpki.example.org/repo");
        assert_eq!(uri.module_path(), "sub/a.cer");
    }
}
