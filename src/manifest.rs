//! RPKI Manifests

use bytes::Bytes;
use super::ber::{BitString, Constructed, Error, OctetString, Source, Tag};
use super::cert::ResourceCert;
use super::sigobj::{self, SignedObject};
use super::x509::{Time, ValidationError};


//------------ Manifest ------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Manifest {
    signed: SignedObject,
    manifest_number: Bytes,
    this_update: Time,
    next_update: Time,
    entries: Vec<FileAndHash>,
}

impl Manifest {
    pub fn decode<S: Source>(source: S) -> Result<Self, S::Err> {
        let signed = SignedObject::decode(source)?;
        signed.clone().decode_content(|cons| {
            cons.sequence(|cons| {
                cons.opt_primitive_if(Tag::CTX_0, |prim| {
                    if prim.to_u8()? != 0 {
                        xerr!(Err(Error::Malformed.into()))
                    }
                    else {
                        Ok(())
                    }
                })?;
                let manifest_number = cons.take_unsigned()?;
                let this_update = Time::take_from(cons)?;
                let next_update = Time::take_from(cons)?;
                sigobj::oid::SHA256.skip_if(cons)?;
                let entries = cons.sequence(|cons| {
                    let mut entries = Vec::new();
                    while let Some(entry) = FileAndHash::take_opt_from(cons)? {
                        entries.push(entry);
                    }
                    Ok(entries)
                })?;
                Ok(Manifest {
                    signed, manifest_number, this_update, next_update, entries
                })
            })
        }).map_err(Into::into)
    }

    /// Validates the manifest's CMS signature against its issuer.
    ///
    /// On success, returns the manifest's own resource-constrained EE
    /// certificate alongside the manifest itself; the caller still needs
    /// to check `this_update`/`next_update` against the current time and
    /// cross-reference the listed CRL.
    pub fn process(
        self, issuer: &ResourceCert
    ) -> Result<(ResourceCert, Self), ValidationError> {
        let cert = self.signed.validate(issuer)?;
        Ok((cert, self))
    }

    pub fn manifest_number(&self) -> &Bytes {
        &self.manifest_number
    }

    pub fn this_update(&self) -> Time {
        self.this_update
    }

    pub fn next_update(&self) -> Time {
        self.next_update
    }

    pub fn is_stale(&self, now: Time) -> bool {
        self.next_update < now
    }

    pub fn iter(&self) -> std::slice::Iter<FileAndHash> {
        self.entries.iter()
    }
}


//------------ FileAndHash ---------------------------------------------------

#[derive(Clone, Debug)]
pub struct FileAndHash {
    file: OctetString,
    hash: BitString,
}

impl FileAndHash {
    fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Option<Self>, S::Err> {
        cons.opt_sequence(|cons| {
            let file = cons.value_if(
                Tag::IA5_STRING, OctetString::take_content_from
            )?;
            let hash = BitString::take_from(cons)?;
            Ok(FileAndHash { file, hash })
        })
    }

    /// Returns the file name as listed on the manifest.
    ///
    /// Manifest file names are plain `IA5String`s (ASCII), so this is
    /// lossless for any well-formed manifest.
    pub fn file(&self) -> String {
        String::from_utf8_lossy(&self.file.to_bytes()).into_owned()
    }

    /// Returns the SHA-256 hash of the referenced file's content.
    pub fn hash(&self) -> &[u8] {
        self.hash.octet_slice().unwrap_or(&[])
    }

    /// Returns whether `data` matches this entry's hash.
    pub fn matches(&self, data: &[u8]) -> bool {
        let digest = ring::digest::digest(&ring::digest::SHA256, data);
        digest.as_ref() == self.hash()
    }
}
