//! BER-encoded OBJECT IDENTIFIERs.
//!
//! This is an internal module. Its public types are re-exported by the
//! parent.

use std::fmt;
use bytes::Bytes;
use super::content::{Constructed, Mode, Primitive};
use super::error::Error;
use super::source::Source;
use super::tag::Tag;


//------------ Oid -------------------------------------------------------

/// A BER-encoded object identifier.
///
/// This keeps the raw, relative-encoded content octets around rather than
/// decoding them into a sequence of arcs, since the only thing this crate
/// ever does with an OID is compare it against a small set of known,
/// pre-encoded constants.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct Oid(pub Bytes);

impl Oid {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.take_primitive_if(Tag::OID, Self::take_content_from)
    }

    pub fn take_content_from<S: Source>(
        prim: &mut Primitive<S>
    ) -> Result<Self, S::Err> {
        let res = prim.take_all()?;
        if res.is_empty() {
            xerr!(return Err(Error::Malformed.into()))
        }
        Ok(Oid(res))
    }

    /// Skips over the OID's content if it matches `self`.
    pub fn skip_if<S: Source>(
        &self, cons: &mut Constructed<S>
    ) -> Result<(), S::Err> {
        let oid = Self::take_from(cons)?;
        if oid != *self {
            xerr!(return Err(Error::Malformed.into()))
        }
        Ok(())
    }

    /// Skips over a single OID value in constructed content, whatever it is.
    pub fn skip_in<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<(), S::Err> {
        cons.take_primitive_if(Tag::OID, |prim| {
            prim.skip_all()
        })
    }

    /// Skips over an optional OID value in constructed content.
    pub fn skip_opt_in<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Option<()>, S::Err> {
        cons.take_opt_primitive_if(Tag::OID, |prim| {
            prim.skip_all()
        })
    }

    pub fn iter(&self) -> IdIter {
        IdIter(&self.0)
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut ids = self.iter();
        match ids.next() {
            Some(first) => write!(f, "{}.{}", first / 40, first % 40)?,
            None => return Ok(()),
        }
        for id in ids {
            write!(f, ".{}", id)?;
        }
        Ok(())
    }
}


//------------ IdIter --------------------------------------------------------

/// An iterator over the arcs of an object identifier.
pub struct IdIter<'a>(&'a [u8]);

impl<'a> Iterator for IdIter<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.0.is_empty() {
            return None
        }
        let mut tail = self.0;
        let mut res: u32 = 0;
        loop {
            let (first, rest) = tail.split_first()?;
            tail = rest;
            res = (res << 7) | (*first & 0x7f) as u32;
            if *first < 0x80 {
                self.0 = tail;
                return Some(res)
            }
            if tail.is_empty() {
                // Truncated multi-byte arc. Stop iterating rather than
                // panic on malformed input.
                self.0 = b"";
                return None
            }
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_simple_oid() {
        // 1.2.840.113549.1.1.1 (rsaEncryption)
        let data = Bytes::from_static(
            &[0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01]
        );
        let oid = Mode::Der.decode(data, |cons| {
            Oid::take_from(cons)
        }).unwrap();
        assert_eq!(oid.to_string(), "1.2.840.113549.1.1.1");
    }
}
