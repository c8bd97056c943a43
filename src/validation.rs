//! The manifest-driven trust-chain walk.
//!
//! A [`Validator`] walks a single trust anchor's CA tree, reading objects
//! that an earlier fetch stage has already placed in the local cache. It
//! never fetches anything itself: per the orchestrator's ordering
//! guarantee, by the time validation runs for an iteration, RRDP and rsync
//! have already brought the cache up to date for that iteration.
//!
//! Walking is manifest-driven: a CA's publication point is trusted only
//! through the signed manifest listing it, not by directory listing. A
//! manifest or file hash mismatch invalidates the whole CA subtree; it
//! never poisons siblings higher up the tree.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use log::{info, warn};
use crate::cert::{Cert, ResourceCert};
use crate::config::{Config, FilterPolicy};
use crate::crl::Crl;
use crate::manifest::Manifest;
use crate::metrics::TalMetrics;
use crate::origins::RouteOrigins;
use crate::roa::Roa;
use crate::rrdp::NotifyUri;
use crate::rsync;
use crate::tal::Tal;
use crate::x509::Time;


//------------ Validator ----------------------------------------------------

/// Walks one TAL's trust chain, reading objects from the local cache.
pub struct Validator<'a> {
    /// The base directory objects are read from.
    cache_dir: &'a Path,

    /// The run's configuration.
    config: &'a Config,

    /// The name of the TAL this validator is walking.
    tal_name: String,

    /// Rsync publication points seen so far this iteration, each mapped to
    /// the first-seen timestamp, reported back as `current_repos`.
    current_repos: HashMap<rsync::Uri, i64>,

    /// Rsync URIs still needing a sync, each mapped to the RRDP URI that
    /// might make the rsync fetch unnecessary, if any.
    rsync_fetch: HashMap<rsync::Uri, Option<NotifyUri>>,

    /// RRDP notification URIs to fetch, each mapped to the rsync URI
    /// publishes underneath it are checked against.
    rrdp_fetch: HashMap<NotifyUri, rsync::Uri>,

    /// The rsync authority each RRDP URI discovered so far is paired with.
    ///
    /// Used to detect and log conflicting SIA advertisements: two CA
    /// certificates pointing the same `rpkiNotify` URI at different
    /// `caRepository` authorities. The first one seen wins.
    rrdp_domains: HashMap<NotifyUri, String>,

    /// The ROAs validated so far for this TAL.
    roas: RouteOrigins,

    /// Per-TAL counters.
    metrics: TalMetrics,
}

impl<'a> Validator<'a> {
    pub fn new(cache_dir: &'a Path, config: &'a Config, tal: &Tal) -> Self {
        Validator {
            cache_dir,
            config,
            tal_name: tal.name().to_string(),
            current_repos: HashMap::new(),
            rsync_fetch: HashMap::new(),
            rrdp_fetch: HashMap::new(),
            rrdp_domains: HashMap::new(),
            roas: RouteOrigins::new(tal.name().to_string()),
            metrics: TalMetrics::new(tal),
        }
    }

    /// Validates the trust anchor and walks its entire CA tree.
    ///
    /// Returns `false` if the TAL's root certificate itself could not be
    /// validated, meaning the caller should retry fetching it on a later
    /// iteration.
    pub fn process(mut self, tal: &Tal) -> (bool, Output) {
        let root_uri = match tal.uris().next() {
            Some(uri) => uri,
            None => {
                warn!("TAL {}: no publication point listed.", self.tal_name);
                return (false, self.finish())
            }
        };
        let data = match self.fetch_object(root_uri) {
            Some(data) => data,
            None => {
                info!(
                    "TAL {}: trust anchor certificate not yet cached, \
                     queuing rsync fetch.",
                    self.tal_name
                );
                self.rsync_fetch.insert(root_uri.clone(), None);
                return (false, self.finish())
            }
        };
        let cert = match Cert::decode(data.as_slice()) {
            Ok(cert) => cert,
            Err(_) => {
                warn!(
                    "TAL {}: trust anchor certificate is malformed.",
                    self.tal_name
                );
                return (false, self.finish())
            }
        };
        let cert = match cert.validate_ta(tal.key_info().subject_public_key()) {
            Ok(cert) => cert,
            Err(_) => {
                warn!(
                    "TAL {}: trust anchor certificate failed to validate.",
                    self.tal_name
                );
                return (false, self.finish())
            }
        };
        self.harvest_sia(&cert);
        self.process_ca(cert);
        (true, self.finish())
    }

    fn finish(self) -> Output {
        Output {
            current_repos: self.current_repos,
            rsync_fetch: self.rsync_fetch,
            rrdp_fetch: self.rrdp_fetch,
            roas: self.roas,
            metrics: self.metrics,
        }
    }

    /// Reads the file `uri` refers to from the local cache, if present.
    fn fetch_object(&self, uri: &rsync::Uri) -> Option<Vec<u8>> {
        fs::read(uri.cache_path(self.cache_dir)).ok()
    }

    /// Records the `caRepository`/`rpkiNotify` SIA entries on a validated
    /// CA certificate for the next iteration's fetch stages.
    fn harvest_sia(&mut self, cert: &ResourceCert) {
        let ca_repo = match cert.cert().ca_repository() {
            Some(uri) => uri,
            None => return,
        };
        let ca_uri = match rsync::Uri::from_str(ca_repo.as_str()) {
            Ok(uri) => uri,
            Err(_) => {
                warn!(
                    "{}: caRepository is not a valid rsync URI.", ca_repo
                );
                return
            }
        };
        let notify = cert.cert().rpki_notify().and_then(|uri| {
            match NotifyUri::from_str(uri.as_str()) {
                Ok(notify) => Some(notify),
                Err(_) => {
                    warn!("{}: rpkiNotify is not a valid URI.", uri);
                    None
                }
            }
        });
        self.current_repos.insert(
            ca_uri.clone(), Time::now().timestamp()
        );
        if let Some(notify) = notify.clone() {
            match domain_conflict(
                self.rrdp_domains.get(&notify).map(String::as_str),
                ca_uri.authority()
            ) {
                DomainConflict::Conflicting(authority) => {
                    warn!(
                        "{}: already associated with rsync authority {}, \
                         ignoring conflicting {}.",
                        notify, authority, ca_uri.authority()
                    );
                }
                DomainConflict::Known => { }
                DomainConflict::New => {
                    self.rrdp_domains.insert(
                        notify.clone(), ca_uri.authority().to_string()
                    );
                }
            }
            self.rrdp_fetch.entry(notify.clone())
                .or_insert_with(|| ca_uri.clone());
        }
        self.rsync_fetch.entry(ca_uri).or_insert(notify);
    }

    /// Validates a CA's manifest, its listed objects, and recurses into
    /// any subordinate CAs it finds.
    ///
    /// Errors anywhere in here invalidate only this CA's subtree; they are
    /// logged and swallowed rather than propagated.
    fn process_ca(&mut self, cert: ResourceCert) {
        let manifest_uri = match cert.cert().rpki_manifest() {
            Some(uri) => uri.as_str().to_string(),
            None => {
                warn!("CA certificate has no rpkiManifest SIA, skipping.");
                return
            }
        };
        let manifest_uri = match rsync::Uri::from_str(&manifest_uri) {
            Ok(uri) => uri,
            Err(_) => {
                warn!("{}: not a valid rsync URI.", manifest_uri);
                return
            }
        };
        let data = match self.fetch_object(&manifest_uri) {
            Some(data) => data,
            None => {
                info!("{}: manifest not found in cache.", manifest_uri);
                return
            }
        };
        let manifest = match Manifest::decode(data.as_slice()) {
            Ok(manifest) => manifest,
            Err(_) => {
                warn!("{}: manifest is malformed.", manifest_uri);
                return
            }
        };
        let (_ee_cert, manifest) = match manifest.process(&cert) {
            Ok(res) => res,
            Err(_) => {
                warn!("{}: manifest signature invalid.", manifest_uri);
                return
            }
        };
        let now = Time::now();
        if manifest.this_update() > now {
            warn!("{}: manifest not yet valid.", manifest_uri);
            return
        }
        if manifest.is_stale(now) {
            match self.config.stale {
                FilterPolicy::Reject => {
                    warn!("{}: manifest is stale, rejecting.", manifest_uri);
                    return
                }
                FilterPolicy::Warn => {
                    warn!("{}: manifest is stale.", manifest_uri);
                }
                FilterPolicy::Accept => { }
            }
        }

        // Directory base for resolving the manifest's bare file names.
        let ca_repo = match cert.cert().ca_repository() {
            Some(uri) => uri.as_str().to_string(),
            None => return,
        };
        let ca_repo = match rsync::Uri::from_str(&ca_repo) {
            Ok(uri) => uri,
            Err(_) => return,
        };

        let mut crl: Option<Crl> = None;
        let mut crl_count = 0;
        for entry in manifest.iter() {
            if entry.file().ends_with(".crl") {
                crl_count += 1;
                let uri = match ca_repo.join(&entry.file()) {
                    Ok(uri) => uri,
                    Err(_) => continue,
                };
                let data = match self.fetch_object(&uri) {
                    Some(data) => data,
                    None => {
                        warn!("{}: listed but not in cache.", uri);
                        continue
                    }
                };
                if !entry.matches(&data) {
                    warn!("{}: hash does not match manifest.", uri);
                    continue
                }
                match Crl::decode(data.as_slice()) {
                    Ok(parsed) => match parsed.validate(&cert) {
                        Ok(parsed) => crl = Some(parsed),
                        Err(_) => warn!("{}: CRL signature invalid.", uri),
                    }
                    Err(_) => warn!("{}: CRL is malformed.", uri),
                }
            }
        }
        if crl_count != 1 {
            warn!(
                "{}: manifest must list exactly one CRL, found {}.",
                manifest_uri, crl_count
            );
            return
        }
        let crl = match crl {
            Some(crl) => crl,
            None => return,
        };
        if crl.is_stale(now) {
            match self.config.stale {
                FilterPolicy::Reject => {
                    warn!("{}: CRL is stale, rejecting subtree.", manifest_uri);
                    return
                }
                FilterPolicy::Warn => warn!("{}: CRL is stale.", manifest_uri),
                FilterPolicy::Accept => { }
            }
        }

        for entry in manifest.iter() {
            let name = entry.file();
            if name.ends_with(".crl") {
                continue
            }
            let uri = match ca_repo.join(&name) {
                Ok(uri) => uri,
                Err(_) => continue,
            };
            let data = match self.fetch_object(&uri) {
                Some(data) => data,
                None => {
                    warn!("{}: listed but not in cache.", uri);
                    continue
                }
            };
            if !entry.matches(&data) {
                warn!("{}: hash does not match manifest.", uri);
                continue
            }
            if name.ends_with(".cer") {
                self.process_child_cert(&uri, &data, &cert, &crl);
            }
            else if name.ends_with(".roa") {
                self.process_roa(&uri, &data, &cert, &crl);
            }
            else {
                match self.config.unknown_objects {
                    FilterPolicy::Reject => {
                        warn!("{}: unknown object type, rejecting.", uri);
                    }
                    FilterPolicy::Warn => warn!("{}: unknown object type.", uri),
                    FilterPolicy::Accept => { }
                }
            }
        }
    }

    fn process_child_cert(
        &mut self, uri: &rsync::Uri, data: &[u8], issuer: &ResourceCert,
        crl: &Crl,
    ) {
        let cert = match Cert::decode(data) {
            Ok(cert) => cert,
            Err(_) => {
                warn!("{}: certificate is malformed.", uri);
                return
            }
        };
        if crl.contains(cert.serial_number()) {
            info!("{}: certificate has been revoked.", uri);
            return
        }
        if !cert.is_ca() {
            warn!("{}: listed as .cer but is not a CA certificate.", uri);
            return
        }
        let cert = match cert.validate_ca(issuer) {
            Ok(cert) => cert,
            Err(_) => {
                warn!("{}: certificate failed to validate.", uri);
                return
            }
        };
        self.harvest_sia(&cert);
        self.process_ca(cert);
    }

    fn process_roa(
        &mut self, uri: &rsync::Uri, data: &[u8], issuer: &ResourceCert,
        crl: &Crl,
    ) {
        let roa = match Roa::decode(data) {
            Ok(roa) => roa,
            Err(_) => {
                warn!("{}: ROA is malformed.", uri);
                return
            }
        };
        let (cert, attestation) = match roa.process(issuer) {
            Ok(res) => res,
            Err(_) => {
                warn!("{}: ROA failed to validate.", uri);
                return
            }
        };
        if crl.contains(cert.cert().serial_number()) {
            info!("{}: ROA's EE certificate has been revoked.", uri);
            return
        }
        self.metrics.roas += 1;
        self.roas.push(attestation);
    }
}


/// The outcome of checking a candidate rsync authority against whatever
/// authority an RRDP notification URI was already associated with.
#[derive(Debug, Eq, PartialEq)]
enum DomainConflict {
    /// This is the first time the notification URI has been seen.
    New,
    /// The notification URI is already paired with this same authority.
    Known,
    /// The notification URI is paired with a different authority.
    Conflicting(String),
}

/// Compares `candidate` against `known`, the authority (if any) an RRDP
/// notification URI was already recorded under.
fn domain_conflict(known: Option<&str>, candidate: &str) -> DomainConflict {
    match known {
        None => DomainConflict::New,
        Some(authority) if authority == candidate => DomainConflict::Known,
        Some(authority) => DomainConflict::Conflicting(authority.to_string()),
    }
}


//------------ Output ---------------------------------------------------------

/// Everything a single TAL's validation walk contributes to an iteration.
pub struct Output {
    pub current_repos: HashMap<rsync::Uri, i64>,
    pub rsync_fetch: HashMap<rsync::Uri, Option<NotifyUri>>,
    pub rrdp_fetch: HashMap<NotifyUri, rsync::Uri>,
    pub roas: RouteOrigins,
    pub metrics: TalMetrics,
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn domain_conflict_new_authority() {
        assert_eq!(domain_conflict(None, "rsync.example.org"), DomainConflict::New);
    }

    #[test]
    fn domain_conflict_same_authority() {
        assert_eq!(
            domain_conflict(Some("rsync.example.org"), "rsync.example.org"),
            DomainConflict::Known
        );
    }

    #[test]
    fn domain_conflict_different_authority() {
        assert_eq!(
            domain_conflict(Some("rsync.example.org"), "rsync.evil.example"),
            DomainConflict::Conflicting("rsync.example.org".into())
        );
    }
}
