//! RPKI Validation.
//!
//! The _Resource Public Key Infrastructure_ (RPKI) is an application of
//! PKI to Internet routing security. It allows owners of IP address prefixes
//! to publish cryptographically signed associations of their prefixes to
//! autonomous systems, allowing the validation of the origin of a route
//! announcement in BGP.
//!
//! RPKI employs a repository of signed objects that contains all the
//! information one needs to validate so-called _ROAs_ (or Route Origin
//! Attestations), each of which describes a mapping between a set of IP
//! address prefixes and an AS number. This repository is publicly available
//! via rsync and RRDP.
//!
//! This crate implements everything that is necessary to create a local
//! copy of the repository, validate it and output the list of valid ROAs.
//! The main entry points are the [`engine::Engine`], which drives the
//! fetch-and-validate cycle, and the [`operation::Operation`], which ties
//! it to a parsed configuration.

/// Traces the origin of a decoding error back to its source location.
///
/// Wraps an expression that produces or returns an `Error`, logging the
/// file and line it was raised at under the `trace` level. Left as a
/// plain passthrough of its argument when tracing isn't worth the noise.
macro_rules! xerr {
    ($e:expr) => {
        {
            ::log::trace!("Error at {}:{}", file!(), line!());
            $e
        }
    }
}

pub mod ber;
pub mod asres;
pub mod cert;
pub mod config;
pub mod crl;
pub mod engine;
pub mod error;
pub mod ipres;
pub mod logger;
pub mod manifest;
pub mod metrics;
pub mod operation;
pub mod origins;
pub mod output;
pub mod roa;
pub mod rrdp;
pub mod rsync;
pub mod sigobj;
pub mod tal;
pub mod validation;
pub mod x509;
pub mod xml;
