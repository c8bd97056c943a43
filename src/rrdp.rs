//! Synchronizing publication points via RRDP (RFC 8182).
//!
//! For each RRDP-enabled publication point the orchestrator calls
//! [`Client::update`] once per iteration with the notification URI
//! advertised in the referring certificate's SIA and the rsync URI it is
//! paired with. The client fetches the notification document, decides
//! whether a snapshot or a run of deltas is needed, and writes the
//! resulting objects into the same on-disk cache the rsync driver uses,
//! keyed by each object's rsync URI.
//!
//! The notification/snapshot/delta documents are parsed with the
//! hand-rolled pull parser in [`crate::xml`] rather than an external XML
//! crate, the same way the ASN.1 content in this crate is decoded by an
//! in-core BER reader rather than a library.

use std::{fmt, fs, io};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use log::{debug, error, info, warn};
use ring::digest;
use serde::{Deserialize, Serialize};
use url::Url;
use crate::config::Config;
use crate::error::Failed;
use crate::rsync;
use crate::xml;


//------------ Client ------------------------------------------------------

/// Access to repository data synchronized via RRDP.
pub struct Client {
    /// Where fetched objects are written, shared with the rsync cache.
    cache_dir: PathBuf,

    /// Where the per-repository session/serial state is persisted.
    state_path: PathBuf,

    /// The known state of every repository visited so far.
    state: StateStore,

    /// The HTTP client, built lazily on first use.
    http: HttpClient,

    /// A cap on the size of any single fetched document.
    max_object_size: u64,
}

impl Client {
    /// Creates the cache directories without building a full value.
    pub fn init(config: &Config) -> Result<(), Failed> {
        Self::create_dirs(config)?;
        Ok(())
    }

    fn create_dirs(config: &Config) -> Result<(PathBuf, PathBuf), Failed> {
        let cache_dir = config.cache_dir.join("rsync");
        let state_dir = config.cache_dir.join("rrdp");
        for dir in [&cache_dir, &state_dir] {
            if let Err(err) = fs::create_dir_all(dir) {
                error!(
                    "Failed to create RRDP cache directory {}: {}.",
                    dir.display(), err
                );
                return Err(Failed)
            }
        }
        Ok((cache_dir, state_dir))
    }

    /// Creates a new client for one validation run.
    ///
    /// Returns `Ok(None)` if RRDP has been disabled altogether.
    pub fn new(config: &Config) -> Result<Option<Self>, Failed> {
        if config.disable_rrdp {
            return Ok(None)
        }
        let (cache_dir, state_dir) = Self::create_dirs(config)?;
        let state_path = state_dir.join("state.json");
        Ok(Some(Client {
            cache_dir,
            state: StateStore::load(&state_path),
            state_path,
            http: HttpClient::new(config.rrdp_timeout),
            max_object_size: 128 * 1024 * 1024,
        }))
    }

    /// Synchronizes a single publication point.
    ///
    /// `notify` is the `rpkiNotify` URI advertised in the referring
    /// certificate's SIA, `base` the paired `caRepository` URI. Every
    /// object published or withdrawn by this endpoint must lie underneath
    /// `base`; anything that doesn't is logged and ignored.
    pub fn update(
        &mut self, notify: &NotifyUri, base: &rsync::Uri
    ) -> Result<(), RrdpError> {
        let notification = self.fetch_notification(notify)?;
        let key = notify.to_string();
        let known = self.state.get(&key).cloned();
        let needs_snapshot = match &known {
            None => true,
            Some(state) => {
                state.session_id != notification.session_id
                || !notification.deltas.iter().any(
                    |delta| delta.serial == state.serial + 1
                ) && notification.serial != state.serial
            }
        };
        if needs_snapshot {
            self.apply_snapshot(&notification, base)?;
        }
        else if let Some(state) = known {
            self.apply_deltas(&notification, base, state.serial)?;
        }
        self.state.set(key, RepoState {
            session_id: notification.session_id.clone(),
            serial: notification.serial,
        });
        if let Err(err) = self.state.save(&self.state_path) {
            warn!("Failed to persist RRDP state: {}", err);
        }
        Ok(())
    }

    fn fetch_notification(
        &mut self, notify: &NotifyUri
    ) -> Result<NotificationFile, RrdpError> {
        debug!("RRDP: fetching notification {}", notify);
        let body = self.http.get(notify.as_str(), self.max_object_size)?;
        NotificationFile::parse(io::Cursor::new(body))
    }

    fn apply_snapshot(
        &mut self, notification: &NotificationFile, base: &rsync::Uri
    ) -> Result<(), RrdpError> {
        info!("RRDP {}: fetching snapshot.", notification.session_id);
        let body = self.http.get(
            notification.snapshot.uri.as_str(), self.max_object_size
        )?;
        if !notification.snapshot.hash.verify(&body) {
            return Err(RrdpError::HashMismatch)
        }
        let mut reader = xml::Reader::new(io::BufReader::new(
            io::Cursor::new(body.as_slice())
        ));
        let root = reader.next_start()?.ok_or(xml::Error::UnexpectedEof)?;
        if root.name != "snapshot" {
            return Err(xml::Error::UnexpectedElement(root.name).into())
        }
        Self::check_meta(&root, notification)?;
        while let Some(event) = reader.next_start()? {
            if event.name != "publish" {
                return Err(xml::Error::UnexpectedElement(event.name).into())
            }
            let uri = rsync::Uri::from_str(event.attr("uri")?)
                .map_err(|_| RrdpError::IllegalPath)?;
            let data = base64_decode(&reader.read_text()?)?;
            if !event.empty {
                reader.expect_end("publish")?;
            }
            self.write_object(&uri, base, &data);
        }
        Ok(())
    }

    fn apply_deltas(
        &mut self, notification: &NotificationFile, base: &rsync::Uri,
        since: u64
    ) -> Result<(), RrdpError> {
        let mut deltas: Vec<_> = notification.deltas.iter()
            .filter(|delta| delta.serial > since)
            .collect();
        deltas.sort_by_key(|delta| delta.serial);
        let mut expected = since;
        for delta in deltas {
            expected += 1;
            if delta.serial != expected {
                return Err(RrdpError::SerialGap)
            }
            self.apply_delta(delta, notification, base)?;
        }
        Ok(())
    }

    fn apply_delta(
        &mut self, delta: &NotificationDelta,
        notification: &NotificationFile, base: &rsync::Uri
    ) -> Result<(), RrdpError> {
        info!("RRDP {}: applying delta {}.", notification.session_id, delta.serial);
        let body = self.http.get(delta.uri.as_str(), self.max_object_size)?;
        if !delta.hash.verify(&body) {
            return Err(RrdpError::HashMismatch)
        }
        let mut reader = xml::Reader::new(io::BufReader::new(
            io::Cursor::new(body.as_slice())
        ));
        let root = reader.next_start()?.ok_or(xml::Error::UnexpectedEof)?;
        if root.name != "delta" {
            return Err(xml::Error::UnexpectedElement(root.name).into())
        }
        Self::check_meta(&root, notification)?;
        while let Some(event) = reader.next_start()? {
            let uri = rsync::Uri::from_str(event.attr("uri")?)
                .map_err(|_| RrdpError::IllegalPath)?;
            match event.name.as_str() {
                "publish" => {
                    let prior = event.attr_opt("hash")
                        .map(Hash::from_str)
                        .transpose()
                        .map_err(|_| RrdpError::IllegalPath)?;
                    let data = base64_decode(&reader.read_text()?)?;
                    if !event.empty {
                        reader.expect_end("publish")?;
                    }
                    if let Some(prior) = prior {
                        if !self.current_hash_matches(&uri, base, &prior) {
                            return Err(RrdpError::HashMismatch)
                        }
                    }
                    self.write_object(&uri, base, &data);
                }
                "withdraw" => {
                    let expect = Hash::from_str(event.attr("hash")?)
                        .map_err(|_| RrdpError::IllegalPath)?;
                    if !event.empty {
                        reader.expect_end("withdraw")?;
                    }
                    if !self.current_hash_matches(&uri, base, &expect) {
                        return Err(RrdpError::HashMismatch)
                    }
                    self.withdraw_object(&uri, base);
                }
                other => {
                    return Err(
                        xml::Error::UnexpectedElement(other.to_string())
                        .into()
                    )
                }
            }
        }
        Ok(())
    }

    fn check_meta(
        root: &xml::Event, notification: &NotificationFile
    ) -> Result<(), RrdpError> {
        if root.attr("session_id")? != notification.session_id {
            return Err(RrdpError::SessionMismatch)
        }
        Ok(())
    }

    fn current_hash_matches(
        &self, uri: &rsync::Uri, base: &rsync::Uri, expected: &Hash
    ) -> bool {
        if !uri.is_under(base) {
            return false
        }
        let path = uri.cache_path(&self.cache_dir);
        match fs::read(&path) {
            Ok(data) => expected.verify(&data),
            Err(_) => false,
        }
    }

    /// Writes a published object to its cache location.
    ///
    /// Refuses to write anything not underneath `base`; this is the
    /// containment check RFC 8182 conformance depends on and also the
    /// guard against a malicious `../../` path in a publish element.
    fn write_object(&self, uri: &rsync::Uri, base: &rsync::Uri, data: &[u8]) {
        if !uri.is_under(base) {
            warn!("RRDP: {} is not underneath {}, ignoring.", uri, base);
            return
        }
        let path = uri.cache_path(&self.cache_dir);
        if let Some(parent) = path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!(
                    "RRDP: failed to create directory {}: {}",
                    parent.display(), err
                );
                return
            }
        }
        if let Err(err) = fs::write(&path, data) {
            warn!("RRDP: failed to write {}: {}", path.display(), err);
        }
    }

    fn withdraw_object(&self, uri: &rsync::Uri, base: &rsync::Uri) {
        if !uri.is_under(base) {
            warn!("RRDP: {} is not underneath {}, ignoring.", uri, base);
            return
        }
        let path = uri.cache_path(&self.cache_dir);
        if let Err(err) = fs::remove_file(&path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(
                    "RRDP: failed to withdraw {}: {}", path.display(), err
                );
            }
        }
    }
}

fn base64_decode(text: &str) -> Result<Vec<u8>, RrdpError> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    base64::decode(&cleaned).map_err(|_| RrdpError::IllegalPath)
}


//------------ NotifyUri -----------------------------------------------------

/// An `https://` URI pointing at an RRDP notification, snapshot, or delta.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct NotifyUri(Url);

impl NotifyUri {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for NotifyUri {
    type Err = NotifyUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(|_| NotifyUriError)?;
        if url.scheme() != "https" {
            return Err(NotifyUriError)
        }
        Ok(NotifyUri(url))
    }
}

impl fmt::Display for NotifyUri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct NotifyUriError;

impl fmt::Display for NotifyUriError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "not an https URI")
    }
}

impl std::error::Error for NotifyUriError { }


//------------ Hash ----------------------------------------------------------

/// A SHA-256 digest as published in RRDP `hash` attributes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Hash([u8; 32]);

impl Hash {
    pub fn verify(&self, data: &[u8]) -> bool {
        let digest = digest::digest(&digest::SHA256, data);
        digest.as_ref() == self.0
    }
}

impl FromStr for Hash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(HashError)
        }
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| HashError)?;
        }
        Ok(Hash(out))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct HashError;

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid hash value")
    }
}

impl std::error::Error for HashError { }


//------------ NotificationFile ----------------------------------------------

#[derive(Clone, Debug)]
struct NotificationFile {
    session_id: String,
    serial: u64,
    snapshot: NotificationItem,
    deltas: Vec<NotificationDelta>,
}

#[derive(Clone, Debug)]
struct NotificationItem {
    uri: NotifyUri,
    hash: Hash,
}

#[derive(Clone, Debug)]
struct NotificationDelta {
    serial: u64,
    uri: NotifyUri,
    hash: Hash,
}

impl NotificationFile {
    fn parse<R: Read>(input: R) -> Result<Self, RrdpError> {
        let mut reader = xml::Reader::new(io::BufReader::new(input));
        let root = reader.next_start()?.ok_or(xml::Error::UnexpectedEof)?;
        if root.name != "notification" {
            return Err(xml::Error::UnexpectedElement(root.name).into())
        }
        let session_id = root.attr("session_id")?.to_string();
        let serial = root.attr("serial")?.parse()
            .map_err(|_| xml::Error::InvalidAttribute("serial".into()))?;
        let mut snapshot = None;
        let mut deltas = Vec::new();
        while let Some(event) = reader.next_start()? {
            match event.name.as_str() {
                "snapshot" => {
                    snapshot = Some(NotificationItem {
                        uri: NotifyUri::from_str(event.attr("uri")?)
                            .map_err(|_| xml::Error::InvalidAttribute(
                                "uri".into()
                            ))?,
                        hash: Hash::from_str(event.attr("hash")?)
                            .map_err(|_| xml::Error::InvalidAttribute(
                                "hash".into()
                            ))?,
                    });
                }
                "delta" => {
                    deltas.push(NotificationDelta {
                        serial: event.attr("serial")?.parse().map_err(|_| {
                            xml::Error::InvalidAttribute("serial".into())
                        })?,
                        uri: NotifyUri::from_str(event.attr("uri")?)
                            .map_err(|_| xml::Error::InvalidAttribute(
                                "uri".into()
                            ))?,
                        hash: Hash::from_str(event.attr("hash")?)
                            .map_err(|_| xml::Error::InvalidAttribute(
                                "hash".into()
                            ))?,
                    });
                }
                other => {
                    return Err(
                        xml::Error::UnexpectedElement(other.to_string())
                        .into()
                    )
                }
            }
            if !event.empty {
                reader.expect_end(&event.name)?;
            }
        }
        Ok(NotificationFile {
            session_id,
            serial,
            snapshot: snapshot.ok_or(xml::Error::MissingAttribute(
                "snapshot".into()
            ))?,
            deltas,
        })
    }
}


//------------ StateStore -----------------------------------------------------

/// The persisted `(notification-URI -> {session-id, serial})` map.
struct StateStore {
    map: HashMap<String, RepoState>,
}

impl StateStore {
    fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(data) => {
                match serde_json::from_slice(&data) {
                    Ok(map) => StateStore { map },
                    Err(err) => {
                        warn!(
                            "Ignoring corrupt RRDP state file {}: {}",
                            path.display(), err
                        );
                        StateStore { map: HashMap::new() }
                    }
                }
            }
            Err(_) => StateStore { map: HashMap::new() },
        }
    }

    fn get(&self, key: &str) -> Option<&RepoState> {
        self.map.get(key)
    }

    fn set(&mut self, key: String, state: RepoState) {
        self.map.insert(key, state);
    }

    fn save(&self, path: &Path) -> Result<(), io::Error> {
        use std::io::Write;

        let data = serde_json::to_vec_pretty(&self.map)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(&data)?;
        file.persist(path).map_err(|err| err.error)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct RepoState {
    session_id: String,
    serial: u64,
}


//------------ HttpClient -----------------------------------------------------

struct HttpClient {
    client: Option<reqwest::blocking::Client>,
    timeout: Duration,
}

impl HttpClient {
    fn new(timeout: Duration) -> Self {
        HttpClient { client: None, timeout }
    }

    fn client(&mut self) -> Result<&reqwest::blocking::Client, RrdpError> {
        if self.client.is_none() {
            let client = reqwest::blocking::ClientBuilder::new()
                .user_agent(concat!(
                    env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")
                ))
                .timeout(self.timeout)
                .build()
                .map_err(|_| RrdpError::Http)?;
            self.client = Some(client);
        }
        Ok(self.client.as_ref().unwrap())
    }

    fn get(&mut self, uri: &str, max_size: u64) -> Result<Vec<u8>, RrdpError> {
        let timeout = self.timeout;
        let client = self.client()?;
        let mut response = client.get(uri).timeout(timeout).send()
            .map_err(|_| RrdpError::Http)?;
        if !response.status().is_success() {
            return Err(RrdpError::Http)
        }
        if let Some(len) = response.content_length() {
            if len > max_size {
                return Err(RrdpError::ResponseTooLarge)
            }
        }
        let mut body = Vec::new();
        let mut limited = (&mut response).take(max_size + 1);
        limited.read_to_end(&mut body).map_err(|_| RrdpError::Http)?;
        if body.len() as u64 > max_size {
            return Err(RrdpError::ResponseTooLarge)
        }
        Ok(body)
    }
}


//------------ RrdpError ------------------------------------------------------

/// Everything that can go wrong processing one publication point.
///
/// Every variant here is failover-eligible except [`ResponseTooLarge`],
/// which abandons the endpoint for this iteration without falling back
/// to rsync (per `rrdp-failover`'s carve-out for oversized responses).
///
/// [`ResponseTooLarge`]: RrdpError::ResponseTooLarge
#[derive(Debug)]
pub enum RrdpError {
    Http,
    Xml(xml::Error),
    HashMismatch,
    SessionMismatch,
    SerialGap,
    IllegalPath,
    ResponseTooLarge,
}

impl RrdpError {
    /// Whether the orchestrator should fall back to rsync for this URI.
    pub fn is_failover_eligible(&self) -> bool {
        !matches!(self, RrdpError::ResponseTooLarge)
    }
}

impl From<xml::Error> for RrdpError {
    fn from(err: xml::Error) -> Self {
        RrdpError::Xml(err)
    }
}

impl fmt::Display for RrdpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RrdpError::Http => write!(f, "HTTP request failed"),
            RrdpError::Xml(err) => write!(f, "XML error: {}", err),
            RrdpError::HashMismatch => write!(f, "hash mismatch"),
            RrdpError::SessionMismatch => {
                write!(f, "session ID does not match notification")
            }
            RrdpError::SerialGap => write!(f, "missing delta in sequence"),
            RrdpError::IllegalPath => {
                write!(f, "published object outside publication point")
            }
            RrdpError::ResponseTooLarge => write!(f, "response too large"),
        }
    }
}

impl std::error::Error for RrdpError { }


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_verifies_content() {
        let hash = Hash::from_str(
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert!(hash.is_err());
        let digest = digest::digest(&digest::SHA256, b"hello");
        let hex: String = digest.as_ref().iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        let hash = Hash::from_str(&hex).unwrap();
        assert!(hash.verify(b"hello"));
        assert!(!hash.verify(b"goodbye"));
    }

    #[test]
    fn parses_notification_file() {
        let doc = br#"<notification session_id="aaaa" serial="3">
            <snapshot uri="https://example.org/snapshot.xml" hash="e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"/>
            <delta serial="2" uri="https://example.org/2.xml" hash="e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"/>
            <delta serial="3" uri="https://example.org/3.xml" hash="e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"/>
        </notification>"#;
        let notification = NotificationFile::parse(&doc[..]).unwrap();
        assert_eq!(notification.session_id, "aaaa");
        assert_eq!(notification.serial, 3);
        assert_eq!(notification.deltas.len(), 2);
    }

    #[test]
    fn rejects_object_outside_publication_point() {
        let base = rsync::Uri::from_str(
            "rsync://example.org/repo"
        ).unwrap();
        let inside = rsync::Uri::from_str(
            "rsync://example.org/repo/a.cer"
        ).unwrap();
        let outside = rsync::Uri::from_str(
            "rsync://example.org/other/a.cer"
        ).unwrap();
        assert!(inside.is_under(&base));
        assert!(!outside.is_under(&base));
    }
}
