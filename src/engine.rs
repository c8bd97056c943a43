//! The validation-run orchestrator.
//!
//! [`Engine`] drives one or more complete passes over every configured
//! trust anchor: synchronizing publication points via RRDP (falling back
//! to rsync when enabled and eligible), then walking the resulting trust
//! chains. Because a CA's own certificate has to be fetched and validated
//! before its publication point is even known, one pass is rarely enough
//! to reach every object in the repository; [`Engine::process`] therefore
//! repeats the fetch-then-validate cycle, feeding each iteration's
//! discoveries into the next, until the set of known publication points
//! stops changing or a hard iteration limit is hit.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use log::{error, info, warn};
use crate::config::Config;
use crate::error::Failed;
use crate::metrics::Metrics;
use crate::origins::AddressOrigins;
use crate::rrdp::{self, NotifyUri};
use crate::rsync;
use crate::tal::Tal;
use crate::validation::Validator;


//------------ Engine ---------------------------------------------------------

/// Drives validation runs against a fixed configuration.
pub struct Engine {
    config: Config,
    tals: Vec<Tal>,
}

impl Engine {
    /// Creates the engine, loading all TALs from the configured directory.
    pub fn new(config: Config) -> Result<Self, Failed> {
        let mut tals = Vec::new();
        let iter = Tal::read_dir(&config.tal_dir).map_err(|err| {
            error!(
                "Failed to open TAL directory {}: {}.",
                config.tal_dir.display(), err
            );
            Failed
        })?;
        for tal in iter {
            match tal {
                Ok(tal) => tals.push(tal),
                Err(err) => warn!("{}", err),
            }
        }
        if tals.is_empty() {
            error!(
                "No usable trust anchor locators found in {}.",
                config.tal_dir.display()
            );
            return Err(Failed)
        }
        Ok(Engine { config, tals })
    }

    /// Creates the on-disk cache directories ahead of the first run.
    pub fn init(&self) -> Result<(), Failed> {
        rsync::Cache::init(&self.config)?;
        rrdp::Client::init(&self.config)?;
        Ok(())
    }

    fn cache_dir(&self) -> PathBuf {
        self.config.cache_dir.join("rsync")
    }

    /// Runs the fetch-then-validate cycle to convergence.
    ///
    /// Returns the deduplicated VRP set and the metrics collected for the
    /// run that reached it. An [`Err`] means the configured iteration
    /// limit was exceeded without the set of known publication points
    /// settling down, which per design is treated as fatal: either the
    /// repository has a structural problem or something is deliberately
    /// feeding us an ever-growing tree.
    pub fn process(&self) -> Result<(AddressOrigins, Metrics), Failed> {
        let fetch = !self.config.update;
        let mut rsync_cache = rsync::Cache::new(&self.config, fetch)?;
        let mut rrdp_client = rrdp::Client::new(&self.config)?;

        let mut rsync_fetch: HashMap<rsync::Uri, Option<NotifyUri>> =
            HashMap::new();
        let mut rrdp_fetch: HashMap<NotifyUri, rsync::Uri> = HashMap::new();
        let mut previous_repos: Option<HashSet<rsync::Uri>> = None;

        for iteration in 0..self.config.max_iterations {
            info!("Starting validation iteration {}.", iteration + 1);

            let mut rrdp_failed: HashMap<NotifyUri, rrdp::RrdpError> =
                HashMap::new();
            if fetch {
                if let Some(client) = rrdp_client.as_mut() {
                    for (notify, base) in rrdp_fetch.iter() {
                        match client.update(notify, base) {
                            Ok(()) => { }
                            Err(err) => {
                                warn!("{}: {}", notify, err);
                                rrdp_failed.insert(notify.clone(), err);
                            }
                        }
                    }
                }
            }

            if let Some(cache) = rsync_cache.as_mut() {
                for (uri, notify) in rsync_fetch.iter() {
                    let need_rsync = match notify {
                        None => true,
                        Some(notify) => match rrdp_failed.get(notify) {
                            None => false,
                            Some(err) => {
                                self.config.rrdp_failover
                                    && err.is_failover_eligible()
                            }
                        }
                    };
                    if need_rsync {
                        cache.load(uri);
                    }
                }
            }

            let mut current_repos = HashSet::new();
            let mut next_rsync_fetch = HashMap::new();
            let mut next_rrdp_fetch = HashMap::new();
            let mut metrics = Metrics::new();
            let mut roas = AddressOrigins::new(true);
            let mut all_roots_ready = true;

            let cache_dir = self.cache_dir();
            for tal in &self.tals {
                let validator = Validator::new(&cache_dir, &self.config, tal);
                let (root_ready, output) = validator.process(tal);
                if !root_ready {
                    all_roots_ready = false;
                }
                current_repos.extend(output.current_repos.into_keys());
                next_rsync_fetch.extend(output.rsync_fetch);
                next_rrdp_fetch.extend(output.rrdp_fetch);
                roas.push_tal(output.roas);
                metrics.push_tal(output.metrics);
            }

            let stable = is_stable(
                all_roots_ready, iteration, previous_repos.as_ref(),
                &current_repos
            );

            rsync_fetch = next_rsync_fetch;
            rrdp_fetch = next_rrdp_fetch;
            previous_repos = Some(current_repos);

            if stable {
                metrics.log();
                return Ok((roas, metrics))
            }
        }

        error!(
            "Validation did not converge within {} iterations, aborting.",
            self.config.max_iterations
        );
        Err(Failed)
    }
}

/// Decides whether an iteration reached a stable, converged state.
///
/// Stability requires every TAL's root to have validated (otherwise the
/// iteration hasn't even seen the whole tree yet), at least one full pass
/// to have happened, and the set of known publication points to be
/// unchanged from the previous iteration.
fn is_stable(
    all_roots_ready: bool,
    iteration: usize,
    previous_repos: Option<&HashSet<rsync::Uri>>,
    current_repos: &HashSet<rsync::Uri>,
) -> bool {
    all_roots_ready && iteration > 0 && previous_repos == Some(current_repos)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    fn uri(s: &str) -> rsync::Uri {
        rsync::Uri::from_str(s).unwrap()
    }

    #[test]
    fn first_iteration_is_never_stable() {
        let repos: HashSet<_> = Some(uri("rsync://example.org/repo/"))
            .into_iter().collect();
        assert!(!is_stable(true, 0, None, &repos));
    }

    #[test]
    fn unready_root_is_never_stable() {
        let repos: HashSet<_> = Some(uri("rsync://example.org/repo/"))
            .into_iter().collect();
        assert!(!is_stable(false, 1, Some(&repos), &repos));
    }

    #[test]
    fn unchanged_repo_set_is_stable() {
        let repos: HashSet<_> = Some(uri("rsync://example.org/repo/"))
            .into_iter().collect();
        assert!(is_stable(true, 1, Some(&repos), &repos));
    }

    #[test]
    fn changed_repo_set_is_not_stable() {
        let previous: HashSet<_> = Some(uri("rsync://example.org/a/"))
            .into_iter().collect();
        let current: HashSet<_> = Some(uri("rsync://example.org/b/"))
            .into_iter().collect();
        assert!(!is_stable(true, 1, Some(&previous), &current));
    }
}
