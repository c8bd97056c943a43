//! Monitoring metrics collected during a validation run.

use std::time::Duration;
use chrono::{DateTime, Utc};
use log::info;
use super::rsync::Module;
use super::tal::Tal;


//------------ Metrics ---------------------------------------------------------

#[derive(Debug)]
pub struct Metrics {
    /// Time when these metrics have been collected.
    time: DateTime<Utc>,

    /// Per-TAL metrics.
    tals: Vec<TalMetrics>,

    /// Rsync metrics, one entry per module fetched during the run.
    rsync: Vec<RsyncMetrics>,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            time: Utc::now(),
            tals: Vec::new(),
            rsync: Vec::new(),
        }
    }

    pub fn push_tal(&mut self, tal: TalMetrics) {
        self.tals.push(tal)
    }

    pub fn push_rsync(&mut self, rsync: RsyncMetrics) {
        self.rsync.push(rsync)
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn timestamp(&self) -> i64 {
        self.time.timestamp()
    }

    pub fn tals(&self) -> &[TalMetrics] {
        &self.tals
    }

    pub fn rsync(&self) -> &[RsyncMetrics] {
        &self.rsync
    }

    pub fn rsync_complete(&self) -> bool {
        self.rsync.iter().all(|metrics| metrics.success)
    }

    pub fn final_vrps(&self) -> u32 {
        self.tals.iter().map(|tal| tal.final_vrps).sum()
    }

    pub fn log(&self) {
        info!("Summary:");
        for tal in &self.tals {
            info!(
                "{}: {} valid ROAs, {} final VRPs.",
                tal.tal_name, tal.roas, tal.final_vrps
            )
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<Self> for Metrics {
    fn as_ref(&self) -> &Self {
        self
    }
}


//------------ TalMetrics --------------------------------------------------------

/// Per-trust-anchor counts accumulated during one validation run.
#[derive(Clone, Debug)]
pub struct TalMetrics {
    /// The name of the TAL, e.g. `"afrinic"`.
    pub tal_name: String,

    /// Number of ROAs that validated successfully.
    pub roas: u32,

    /// Number of VRPs extracted from those ROAs, before deduplication.
    pub total_valid_vrps: u32,

    /// Number of VRPs discarded for overlapping an unsafe address span.
    pub unsafe_vrps: u32,

    /// Number of VRPs remaining after deduplication.
    pub final_vrps: u32,
}

impl TalMetrics {
    pub fn new(tal: &Tal) -> Self {
        TalMetrics {
            tal_name: tal.name().to_string(),
            roas: 0,
            total_valid_vrps: 0,
            unsafe_vrps: 0,
            final_vrps: 0,
        }
    }
}


//------------ RsyncMetrics --------------------------------------------------

/// The outcome of fetching a single rsync module during a run.
#[derive(Clone, Debug)]
pub struct RsyncMetrics {
    pub module: Module,
    pub success: bool,
    pub duration: Option<Duration>,
}
