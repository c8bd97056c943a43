//! BER tags.
//!
//! This is an internal module. Its public content is re-exported by the
//! parent.

use std::fmt;
use super::error::Error;
use super::source::Source;


//------------ Tag -----------------------------------------------------------

/// The identifier octets of an encoded value, aka its tag.
///
/// This only covers the tag number and class, never the constructed bit --
/// whether a value is primitive or constructed is carried alongside the
/// tag wherever one is returned, since the same tag number can legally be
/// encoded either way (e.g. the `[0]` context tag).
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Tag(u8);

impl Tag {
    const CONSTRUCTED: u8 = 0x20;
    const CONTEXT_SPECIFIC: u8 = 0x80;

    pub const END_OF_VALUE: Self = Tag(0x00);
    pub const BOOLEAN: Self = Tag(0x01);
    pub const INTEGER: Self = Tag(0x02);
    pub const BIT_STRING: Self = Tag(0x03);
    pub const OCTET_STRING: Self = Tag(0x04);
    pub const NULL: Self = Tag(0x05);
    pub const OID: Self = Tag(0x06);
    pub const UTC_TIME: Self = Tag(0x17);
    pub const GENERALIZED_TIME: Self = Tag(0x18);
    pub const SEQUENCE: Self = Tag(0x10);
    pub const SET: Self = Tag(0x11);

    pub const CTX_0: Self = Tag(Tag::CONTEXT_SPECIFIC);
    pub const CTX_1: Self = Tag(Tag::CONTEXT_SPECIFIC | 1);
    pub const CTX_2: Self = Tag(Tag::CONTEXT_SPECIFIC | 2);
    pub const CTX_3: Self = Tag(Tag::CONTEXT_SPECIFIC | 3);
    pub const CTX_4: Self = Tag(Tag::CONTEXT_SPECIFIC | 4);
    pub const CTX_5: Self = Tag(Tag::CONTEXT_SPECIFIC | 5);
    pub const CTX_6: Self = Tag(Tag::CONTEXT_SPECIFIC | 6);

    pub const CTX_CON_0: Self = Tag::CTX_0;
    pub const CTX_CON_1: Self = Tag::CTX_1;
    pub const CTX_CON_2: Self = Tag::CTX_2;
    pub const CTX_CON_3: Self = Tag::CTX_3;
}

impl Tag {
    /// Takes a tag from the beginning of `source`.
    ///
    /// Upon success, returns the tag and whether the value is constructed.
    pub fn take_from<S: Source>(
        source: &mut S
    ) -> Result<(Self, bool), S::Err> {
        let byte = source.take_u8()?;
        if byte & 0x1f == 0x1f {
            // High-tag-number form. We don't need any tags that large in
            // this profile, so we treat them as unimplemented rather than
            // building out the multi-byte encoding.
            xerr!(return Err(Error::Unimplemented.into()))
        }
        let constructed = byte & Self::CONSTRUCTED != 0;
        Ok((Tag(byte & !Self::CONSTRUCTED), constructed))
    }

    /// Takes a tag from the beginning of `source` if it matches `self`.
    ///
    /// If the next value's tag doesn't match, the source is left untouched
    /// and `None` is returned. Otherwise returns whether the value is
    /// constructed.
    pub fn take_from_if<S: Source>(
        &self, source: &mut S
    ) -> Result<Option<bool>, S::Err> {
        if source.request(1)? == 0 {
            return Ok(None)
        }
        let byte = source.slice()[0];
        if byte & !Self::CONSTRUCTED != self.0 {
            return Ok(None)
        }
        let constructed = byte & Self::CONSTRUCTED != 0;
        source.advance(1)?;
        Ok(Some(constructed))
    }

    pub fn is_context_specific(&self) -> bool {
        self.0 & Self::CONTEXT_SPECIFIC != 0
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Tag::BOOLEAN => write!(f, "BOOLEAN"),
            Tag::INTEGER => write!(f, "INTEGER"),
            Tag::BIT_STRING => write!(f, "BIT STRING"),
            Tag::OCTET_STRING => write!(f, "OCTET STRING"),
            Tag::NULL => write!(f, "NULL"),
            Tag::OID => write!(f, "OBJECT IDENTIFIER"),
            Tag::SEQUENCE => write!(f, "SEQUENCE"),
            Tag::SET => write!(f, "SET"),
            Tag::CTX_0 => write!(f, "[0]"),
            Tag::CTX_1 => write!(f, "[1]"),
            Tag::CTX_2 => write!(f, "[2]"),
            Tag::CTX_3 => write!(f, "[3]"),
            Tag::CTX_4 => write!(f, "[4]"),
            Tag::CTX_5 => write!(f, "[5]"),
            Tag::CTX_6 => write!(f, "[6]"),
            _ => write!(f, "Tag(0x{:02x})", self.0)
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn takes_universal_tag() {
        let mut data = &[0x30u8, 0x00][..];
        let (tag, constructed) = Tag::take_from(&mut data).unwrap();
        assert_eq!(tag, Tag::SEQUENCE);
        assert!(constructed);
    }

    #[test]
    fn context_tags_are_distinct() {
        assert_ne!(Tag::CTX_1, Tag::CTX_2);
        assert_ne!(Tag::CTX_2, Tag::CTX_3);
        assert_ne!(Tag::CTX_1, Tag::CTX_3);
    }

    #[test]
    fn take_from_if_rejects_mismatch() {
        let mut data = &[0xa1u8, 0x00][..];
        let res = Tag::CTX_0.take_from_if(&mut data).unwrap();
        assert!(res.is_none());
        // source left untouched
        assert_eq!(data, &[0xa1, 0x00]);
    }
}
