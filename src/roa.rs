//! Route Origin Attestations (ROAs).
//!
//! ROAs are defined in RFC 6482. They are a CMS signed object (RFC 6488)
//! whose content binds a single AS number to a set of IP address prefixes,
//! each carrying a maximum prefix length.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use super::asres::AsId;
use super::ber::{BitString, Constructed, Error, Oid, Source, Tag};
use super::cert::ResourceCert;
use super::ipres::{AddressFamily, AddressRange};
use super::sigobj::SignedObject;
use super::x509::ValidationError;


//------------ Roa -------------------------------------------------------

/// A Route Origin Attestation.
#[derive(Clone, Debug)]
pub struct Roa {
    signed: SignedObject,
    content: RouteOriginAttestation,
}

impl Roa {
    pub fn decode<S: Source>(source: S) -> Result<Self, S::Err> {
        let signed = SignedObject::decode(source)?;
        if signed.content_type() != &oid::ROUTE_ORIGIN_AUTHZ {
            return Err(Error::Malformed.into())
        }
        let content = signed.clone().decode_content(
            RouteOriginAttestation::take_from
        ).map_err(Into::into)?;
        Ok(Roa { signed, content })
    }

    /// Validates the ROA against its issuer and its own resource set.
    ///
    /// On success, returns the EE certificate's validated resources
    /// together with the parsed attestation.
    pub fn process(
        self, issuer: &ResourceCert
    ) -> Result<(ResourceCert, RouteOriginAttestation), ValidationError> {
        let cert = self.signed.validate(issuer)?;
        self.content.verify_resources(&cert)?;
        Ok((cert, self.content))
    }
}


//------------ RouteOriginAttestation -----------------------------------------

/// The content of a ROA: an AS number and the prefixes it authorizes.
///
/// ```text
/// RouteOriginAttestation ::= SEQUENCE {
///     version [0] INTEGER DEFAULT 0,
///     asID ASID,
///     ipAddrBlocks SEQUENCE OF ROAIPAddressFamily }
///
/// ROAIPAddressFamily ::= SEQUENCE {
///     addressFamily OCTET STRING,
///     addresses SEQUENCE OF ROAIPAddress }
///
/// ROAIPAddress ::= SEQUENCE {
///     address BIT STRING,
///     maxLength INTEGER OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct RouteOriginAttestation {
    as_id: AsId,
    v4: Vec<RoaIpAddress>,
    v6: Vec<RoaIpAddress>,
}

impl RouteOriginAttestation {
    fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.sequence(|cons| {
            cons.opt_primitive_if(Tag::CTX_0, |prim| {
                if prim.to_u8()? != 0 {
                    xerr!(Err(Error::Malformed.into()))
                }
                else {
                    Ok(())
                }
            })?;
            let as_id = AsId::take_from(cons)?;
            let mut v4 = Vec::new();
            let mut v6 = Vec::new();
            cons.sequence(|cons| {
                while let Some(()) = cons.opt_sequence(|cons| {
                    let family = AddressFamily::take_from(cons)?;
                    cons.sequence(|cons| {
                        while let Some(addr)
                            = RoaIpAddress::take_opt_from(cons, family)?
                        {
                            match family {
                                AddressFamily::Ipv4 => v4.push(addr),
                                AddressFamily::Ipv6 => v6.push(addr),
                            }
                        }
                        Ok(())
                    })
                })? { }
                Ok(())
            })?;
            Ok(RouteOriginAttestation { as_id, v4, v6 })
        })
    }

    pub fn as_id(&self) -> AsId {
        self.as_id
    }

    pub fn iter(&self) -> impl Iterator<Item = FriendlyRoaIpAddress> + '_ {
        self.v4.iter().copied().map(FriendlyRoaIpAddress::new)
            .chain(self.v6.iter().copied().map(FriendlyRoaIpAddress::new))
    }

    /// Checks that each prefix is encompassed by the EE cert's resources.
    ///
    /// RFC 6482 requires the set of prefixes carried by a ROA to be a
    /// subset of the IP resources of the certificate used to validate it.
    fn verify_resources(
        &self, cert: &ResourceCert
    ) -> Result<(), ValidationError> {
        let resources = cert.ip_resources();
        for addr in &self.v4 {
            if !resources.v4().map_or(false, |blocks| blocks.contain(addr)) {
                return Err(ValidationError)
            }
        }
        for addr in &self.v6 {
            if !resources.v6().map_or(false, |blocks| blocks.contain(addr)) {
                return Err(ValidationError)
            }
        }
        Ok(())
    }
}


//------------ RoaIpAddress ----------------------------------------------------

/// A single prefix and maximum length from a ROA.
#[derive(Clone, Copy, Debug)]
pub struct RoaIpAddress {
    family: AddressFamily,
    prefix: u128,
    prefix_len: u8,
    max_length: u8,
}

impl RoaIpAddress {
    fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>, family: AddressFamily
    ) -> Result<Option<Self>, S::Err> {
        cons.opt_sequence(|cons| {
            let bits = BitString::take_from(cons)?;
            let (prefix, prefix_len) = AddressRange::prefix_from_bits(
                &bits
            )?;
            let max_length = cons.opt_primitive_if(
                Tag::INTEGER, |prim| prim.to_u8()
            )?.unwrap_or(prefix_len);
            Ok(RoaIpAddress { family, prefix, prefix_len, max_length })
        })
    }

    /// Returns the inclusive address range covered by this prefix.
    ///
    /// Used to check containment within a certificate's resource set,
    /// which tracks ranges rather than prefixes.
    pub fn range(&self) -> (u128, u128) {
        if self.prefix_len >= 128 {
            return (self.prefix, self.prefix)
        }
        let host_bits = 128 - u32::from(self.prefix_len);
        let mask = (1u128 << host_bits) - 1;
        (self.prefix, self.prefix | mask)
    }

    pub fn address_family(&self) -> AddressFamily {
        self.family
    }
}


//------------ FriendlyRoaIpAddress -------------------------------------------

/// A ROA address prefix, rendered in terms of an ordinary [`IpAddr`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct FriendlyRoaIpAddress {
    family: AddressFamily,
    prefix: u128,
    prefix_len: u8,
    max_length: u8,
}

impl FriendlyRoaIpAddress {
    fn new(addr: RoaIpAddress) -> Self {
        FriendlyRoaIpAddress {
            family: addr.family,
            prefix: addr.prefix,
            prefix_len: addr.prefix_len,
            max_length: addr.max_length,
        }
    }

    pub fn address(&self) -> IpAddr {
        match self.family {
            AddressFamily::Ipv4 => {
                IpAddr::V4(Ipv4Addr::from((self.prefix >> 96) as u32))
            }
            AddressFamily::Ipv6 => {
                IpAddr::V6(Ipv6Addr::from(self.prefix))
            }
        }
    }

    pub fn address_length(&self) -> u8 {
        self.prefix_len
    }

    pub fn max_length(&self) -> u8 {
        self.max_length
    }
}


//------------ OIDs ------------------------------------------------------------

mod oid {
    use bytes::Bytes;
    use super::Oid;

    macro_rules! oid {
        ($name:ident, $($arc:expr),+ $(,)*) => {
            pub const $name: Oid = Oid(
                Bytes::from_static(&[$($arc),+])
            );
        }
    }

    oid!(ROUTE_ORIGIN_AUTHZ, 42, 134, 72, 134, 247, 13, 1, 9, 16, 1, 24);
}
