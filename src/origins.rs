//! Validated route origins (VRPs).

use std::collections::HashSet;
use std::net::IpAddr;
use super::asres::AsId;
use super::roa::{FriendlyRoaIpAddress, RouteOriginAttestation};


//------------ RouteOrigins --------------------------------------------------

/// The route origins collected for a single trust anchor during one run.
#[derive(Clone, Debug)]
pub struct RouteOrigins {
    tal_name: String,
    origins: Vec<RouteOriginAttestation>,
}

impl RouteOrigins {
    pub fn new(tal_name: String) -> Self {
        RouteOrigins { tal_name, origins: Vec::new() }
    }

    pub fn push(&mut self, attestation: RouteOriginAttestation) {
        self.origins.push(attestation)
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn drain(self) -> impl Iterator<Item = RouteOriginAttestation> {
        self.origins.into_iter()
    }

    pub fn tal_name(&self) -> &str {
        &self.tal_name
    }
}


//------------ AddressOrigins ------------------------------------------------

/// The final, deduplicated set of VRPs produced by a validation run.
#[derive(Clone, Debug)]
pub enum AddressOrigins {
    Regular(Vec<AddressOrigin>),
    Unique(HashSet<AddressOrigin>),
}

impl AddressOrigins {
    pub fn new(unique: bool) -> Self {
        if unique {
            AddressOrigins::Unique(HashSet::new())
        }
        else {
            AddressOrigins::Regular(Vec::new())
        }
    }

    pub fn push_tal(&mut self, origins: RouteOrigins) {
        let tal_name = origins.tal_name().to_string();
        for roa in origins.drain() {
            for addr in roa.iter() {
                let origin = AddressOrigin::new(
                    roa.as_id(), addr, tal_name.clone()
                );
                match self {
                    AddressOrigins::Regular(vec) => vec.push(origin),
                    AddressOrigins::Unique(set) => { set.insert(origin); }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AddressOrigins::Regular(vec) => vec.len(),
            AddressOrigins::Unique(set) => set.len(),
        }
    }

    pub fn iter(&self) -> AddressOriginsIter {
        AddressOriginsIter::new(self)
    }
}


//------------ AddressOriginsIter --------------------------------------------

pub enum AddressOriginsIter<'a> {
    Regular(::std::slice::Iter<'a, AddressOrigin>),
    Unique(::std::collections::hash_set::Iter<'a, AddressOrigin>),
}

impl<'a> AddressOriginsIter<'a> {
    fn new(from: &'a AddressOrigins) -> Self {
        match *from {
            AddressOrigins::Regular(ref inner) => {
                AddressOriginsIter::Regular(inner.iter())
            }
            AddressOrigins::Unique(ref inner) => {
                AddressOriginsIter::Unique(inner.iter())
            }
        }
    }
}

impl<'a> Iterator for AddressOriginsIter<'a> {
    type Item = &'a AddressOrigin;

    fn next(&mut self) -> Option<Self::Item> {
        match *self {
            AddressOriginsIter::Regular(ref mut inner) => inner.next(),
            AddressOriginsIter::Unique(ref mut inner) => inner.next(),
        }
    }
}


//------------ AddressOrigin -------------------------------------------------

/// A single validated route origin: an AS, a prefix, and its provenance.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AddressOrigin {
    as_id: AsId,
    addr: FriendlyRoaIpAddress,
    tal_name: String,
}

impl AddressOrigin {
    fn new(
        as_id: AsId, addr: FriendlyRoaIpAddress, tal_name: String
    ) -> Self {
        AddressOrigin { as_id, addr, tal_name }
    }

    pub fn as_id(&self) -> AsId {
        self.as_id
    }

    pub fn address(&self) -> IpAddr {
        self.addr.address()
    }

    pub fn address_length(&self) -> u8 {
        self.addr.address_length()
    }

    pub fn max_length(&self) -> u8 {
        self.addr.max_length()
    }

    pub fn tal_name(&self) -> &str {
        &self.tal_name
    }

    /// Returns this origin's address prefix.
    pub fn prefix(&self) -> AddressPrefix {
        AddressPrefix::new(self.address(), self.address_length())
    }
}


//------------ AddressPrefix --------------------------------------------------

/// An IP address prefix, used by [`crate::output::Filter`] to match VRPs.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct AddressPrefix {
    addr: IpAddr,
    len: u8,
}

impl AddressPrefix {
    pub fn new(addr: IpAddr, len: u8) -> Self {
        AddressPrefix { addr, len }
    }

    /// Returns whether `self` encompasses `other`.
    ///
    /// This is true if both prefixes are the same address family, `self`
    /// is no more specific than `other`, and the two agree on every bit up
    /// to `self`'s length.
    pub fn covers(&self, other: AddressPrefix) -> bool {
        if self.addr.is_ipv4() != other.addr.is_ipv4() {
            return false
        }
        if self.len > other.len {
            return false
        }
        match (self.addr, other.addr) {
            (IpAddr::V4(lhs), IpAddr::V4(rhs)) => {
                let mask = if self.len == 0 {
                    0
                } else {
                    u32::MAX << (32 - self.len)
                };
                u32::from(lhs) & mask == u32::from(rhs) & mask
            }
            (IpAddr::V6(lhs), IpAddr::V6(rhs)) => {
                let mask = if self.len == 0 {
                    0
                } else {
                    u128::MAX << (128 - self.len)
                };
                u128::from(lhs) & mask == u128::from(rhs) & mask
            }
            _ => false,
        }
    }
}
