//! Parsing of data encoded in (a profile of) the Basic Encoding Rules.
//!
//! This is the in-core ASN.1/DER reader the rest of the crate's object
//! decoders (`x509`, `cert`, `manifest`, `crl`, `sigobj`, `roa`, `tal`)
//! build on. It only implements what the RPKI certificate profile
//! (RFC 5280/6487) and CMS profile (RFC 5652/6488) actually need: definite
//! and indefinite length BER/CER/DER values, SEQUENCE/SET/context-tagged
//! constructed values, and the handful of primitive types (INTEGER, OCTET
//! STRING, BIT STRING, OBJECT IDENTIFIER, BOOLEAN, NULL, time types) that
//! appear in those profiles.

pub use self::bstring::BitString;
pub use self::content::{Content, Constructed, Mode, Primitive};
pub use self::error::Error;
pub use self::int::{Integer, Unsigned};
pub use self::length::Length;
pub use self::oid::Oid;
pub use self::ostring::OctetString;
pub use self::source::{CaptureSource, LimitedSource, Source};
pub use self::tag::Tag;

mod bstring;
mod content;
mod error;
mod int;
mod length;
mod oid;
mod ostring;
mod source;
mod tag;
