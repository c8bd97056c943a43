//! Shared X.509 building blocks.
//!
//! Both RFC 5280 certificates and RFC 5280 CRLs are an instance of the
//! `SIGNED{ToBeSigned}` construct: a to-be-signed value followed by a
//! signature algorithm identifier and the signature itself. This module
//! provides that shared wrapper plus the handful of other fields (names,
//! serial numbers, validity times) that both object types need.

use std::{fmt, str};
use std::str::FromStr;
use bytes::Bytes;
use chrono::{DateTime, LocalResult, TimeZone, Utc};
use super::ber::{
    BitString, Constructed, Error, Mode, Source, Tag
};


//------------ SignedData -----------------------------------------------------

/// The content of a `SIGNED{ToBeSigned}` value.
///
/// This keeps the raw content octets of the to-be-signed value around
/// rather than decoding it right away, since the caller usually needs to
/// re-parse it through a different type depending on context (`Cert`
/// parses it as a `tbsCertificate`, `Crl` as a `tbsCertList`).
#[derive(Clone, Debug)]
pub struct SignedData {
    data: Bytes,
    signature_algorithm: SignatureAlgorithm,
    signature: BitString,
}

impl SignedData {
    pub fn take_content_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        Ok(SignedData {
            data: cons.take_one()?,
            signature_algorithm: SignatureAlgorithm::take_from(cons)?,
            signature: BitString::take_from(cons)?,
        })
    }

    /// Returns the raw content octets of the to-be-signed value.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn signature_algorithm(&self) -> &SignatureAlgorithm {
        &self.signature_algorithm
    }

    pub fn signature(&self) -> &BitString {
        &self.signature
    }
}


//------------ SignatureAlgorithm ---------------------------------------------

#[derive(Clone, Debug)]
pub enum SignatureAlgorithm {
    Sha256WithRsaEncryption
}

impl SignatureAlgorithm {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.sequence(Self::take_content_from)
    }

    pub fn take_content_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        oid::SHA256_WITH_RSA_ENCRYPTION.skip_if(cons)?;
        cons.skip_opt_null()?;
        Ok(SignatureAlgorithm::Sha256WithRsaEncryption)
    }
}


//------------ SerialNumber ----------------------------------------------------

/// A certificate's or CRL's serial number.
///
/// RFC 5280 demands implementations to support serial numbers of up to
/// twenty octets, so we keep the value as the raw content octets of the
/// INTEGER rather than decoding it into a native integer type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SerialNumber(Bytes);

impl SerialNumber {
    /// Parses the serial number.
    ///
    /// ```text
    /// CertificateSerialNumber  ::=  INTEGER
    /// ```
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.primitive_if(Tag::INTEGER, |prim| {
            let res = prim.take_all()?;
            if let Some(first) = res.first() {
                if first & 0x80 != 0 {
                    xerr!(return Err(Error::Malformed.into()))
                }
            }
            Ok(SerialNumber(res))
        })
    }
}


//------------ Name -------------------------------------------------------------

/// A certificate's or CRL's issuer or subject name.
///
/// We never need to look inside a name: RPKI certificates treat names as
/// opaque values and never compare or print them other than bit for bit.
/// So we just keep the raw content of the `Name` SEQUENCE around.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Name(Bytes);

impl Name {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.sequence(|cons| cons.take_all()).map(Name)
    }
}


//------------ Time -------------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct Time(DateTime<Utc>);

impl Time {
    pub fn new(dt: DateTime<Utc>) -> Self {
        Time(dt)
    }

    pub fn now() -> Self {
        Time(Utc::now())
    }

    /// Returns the Unix timestamp, in seconds.
    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }

    /// Checks that `self` is not later than `other`.
    pub fn validate_not_after(&self, other: Time) -> Result<(), ValidationError> {
        if *self > other {
            Err(ValidationError)
        }
        else {
            Ok(())
        }
    }

    /// Checks that `self` is not earlier than `other`.
    pub fn validate_not_before(&self, other: Time) -> Result<(), ValidationError> {
        if *self < other {
            Err(ValidationError)
        }
        else {
            Ok(())
        }
    }

    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.primitive(|tag, prim| {
            let bytes = prim.take_all()?;
            Self::parse_content(tag, &bytes).map(Time)
        })
    }

    /// Parses an optional `Time` value from constructed content.
    ///
    /// `Time ::= CHOICE { utcTime, generalizedTime }`, so unlike most
    /// optional values here there's no single tag to filter on.
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Option<Self>, S::Err> {
        cons.opt_primitive(|tag, prim| {
            let bytes = prim.take_all()?;
            Self::parse_content(tag, &bytes).map(Time)
        })
    }

    fn parse_content(tag: Tag, bytes: &[u8]) -> Result<DateTime<Utc>, Error> {
        let parts = match tag {
            Tag::UTC_TIME => {
                // RFC 5280 requires the format YYMMDDHHMMSSZ
                if bytes.len() != 13 || bytes[12] != b'Z' {
                    xerr!(return Err(Error::Malformed))
                }
                let year = read_two_char(&bytes[0..2])? as i32;
                let year = if year >= 50 { year + 1900 }
                           else { year + 2000 };
                (
                    year,
                    read_two_char(&bytes[2..4])?,
                    read_two_char(&bytes[4..6])?,
                    read_two_char(&bytes[6..8])?,
                    read_two_char(&bytes[8..10])?,
                    read_two_char(&bytes[10..12])?,
                )
            }
            Tag::GENERALIZED_TIME => {
                // RFC 5280 requires the format YYYYMMDDHHMMSSZ
                if bytes.len() != 15 || bytes[14] != b'Z' {
                    xerr!(return Err(Error::Malformed))
                }
                (
                    read_four_char(&bytes[0..4])? as i32,
                    read_two_char(&bytes[4..6])?,
                    read_two_char(&bytes[6..8])?,
                    read_two_char(&bytes[8..10])?,
                    read_two_char(&bytes[10..12])?,
                    read_two_char(&bytes[12..14])?,
                )
            }
            _ => {
                xerr!(return Err(Error::Malformed))
            }
        };
        match Utc.ymd_opt(parts.0, parts.1, parts.2) {
            LocalResult::Single(dt) => {
                match dt.and_hms_opt(parts.3, parts.4, parts.5) {
                    Some(dt) => Ok(dt),
                    None => xerr!(Err(Error::Malformed)),
                }
            }
            _ => xerr!(Err(Error::Malformed))
        }
    }
}

fn read_two_char(slice: &[u8]) -> Result<u32, Error> {
    let s = match str::from_utf8(slice) {
        Ok(s) => s,
        Err(_) => xerr!(return Err(Error::Malformed))
    };
    u32::from_str(s).map_err(|_| Error::Malformed)
}

fn read_four_char(slice: &[u8]) -> Result<u32, Error> {
    let s = match str::from_utf8(slice) {
        Ok(s) => s,
        Err(_) => xerr!(return Err(Error::Malformed))
    };
    u32::from_str(s).map_err(|_| Error::Malformed)
}


//------------ ValidationError --------------------------------------------------

/// An object failed to validate.
///
/// This type deliberately carries no further information: by the time an
/// object is rejected, the only thing a caller can do with the reason is
/// log it.
#[derive(Clone, Copy, Debug)]
pub struct ValidationError;

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "validation failed")
    }
}

impl std::error::Error for ValidationError { }


//------------ update_once -----------------------------------------------------

/// Sets `*opt` to the result of `op` unless it is already set.
///
/// Used while walking an extensions SEQUENCE to reject an extension that
/// appears more than once.
pub fn update_once<F, T, E>(opt: &mut Option<T>, op: F) -> Result<(), E>
where F: FnOnce() -> Result<T, E>, E: From<Error> {
    if opt.is_some() {
        xerr!(return Err(Error::Malformed.into()))
    }
    *opt = Some(op()?);
    Ok(())
}


//------------ OIDs ---------------------------------------------------------

mod oid {
    use bytes::Bytes;
    use super::super::ber::Oid;

    pub const SHA256_WITH_RSA_ENCRYPTION: Oid = Oid(
        Bytes::from_static(&[42, 134, 72, 134, 247, 13, 1, 1, 11])
    );
}
