
use super::cert::ResourceCert;
use super::ber::{
    Constructed, Error, Mode, OctetString, Oid, Source, Tag
};
use super::x509::{
    update_once, Name, SerialNumber, SignatureAlgorithm, SignedData, Time,
    ValidationError,
};


//------------ Crl -----------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Crl {
    signed_data: SignedData,

    signature: SignatureAlgorithm,
    issuer: Name,
    this_update: Time,
    next_update: Option<Time>,
    revoked_certs: RevokedCertificates,
    extensions: Extensions
}

impl Crl {
    pub fn decode<S: Source>(source: S) -> Result<Self, S::Err> {
        Mode::Der.decode(source, Self::take_from)
    }

    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.sequence(Self::take_content_from)
    }

    pub fn take_content_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        let signed_data = SignedData::take_content_from(cons)?;

        Mode::Der.decode(signed_data.data().clone(), |cons| {
            cons.sequence(|cons| {
                cons.skip_u8_if(1)?; // v2 => 1
                Ok(Crl {
                    signed_data,
                    signature: SignatureAlgorithm::take_from(cons)?,
                    issuer: Name::take_from(cons)?,
                    this_update: Time::take_from(cons)?,
                    next_update: Time::take_opt_from(cons)?,
                    revoked_certs: RevokedCertificates::take_from(cons)?,
                    extensions: cons.constructed_if(
                        Tag::CTX_0,
                        Extensions::take_from
                    )?
                })
            })
        }).map_err(Into::into)
    }

    /// Validates the CRL's signature against its issuing CA certificate.
    ///
    /// Unlike manifests and ROAs, a CRL is not a CMS signed object with its
    /// own EE certificate: it is signed directly by the issuing CA, using
    /// the same key that signs certificates.
    pub fn validate(self, issuer: &ResourceCert) -> Result<Self, ValidationError> {
        let msg = self.signed_data.data();
        let public_key = issuer.cert().public_key();
        let public_key: &[u8] = AsRef::<[u8]>::as_ref(&public_key);
        ring::signature::UnparsedPublicKey::new(
            &ring::signature::RSA_PKCS1_2048_8192_SHA256,
            public_key
        ).verify(
            msg, self.signed_data.signature().octet_slice().unwrap_or(&[])
        ).map_err(|_| ValidationError)?;
        Ok(self)
    }

    pub fn this_update(&self) -> Time {
        self.this_update
    }

    pub fn next_update(&self) -> Option<Time> {
        self.next_update
    }

    /// Returns whether the CRL's nextUpdate time has passed.
    pub fn is_stale(&self, now: Time) -> bool {
        match self.next_update {
            Some(next_update) => next_update < now,
            None => false,
        }
    }

    pub fn authority_key_id(&self) -> &OctetString {
        &self.extensions.authority_key_id
    }

    /// Returns whether `serial` has been revoked.
    pub fn contains(&self, serial: &SerialNumber) -> bool {
        self.revoked_certs.contains(serial)
    }
}


//------------ RevokedCertificates ------------------------------------------

#[derive(Clone, Debug)]
pub struct RevokedCertificates(Vec<CrlEntry>);

impl RevokedCertificates {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        let res = cons.opt_sequence(|cons| {
            let mut entries = Vec::new();
            while let Some(entry) = CrlEntry::take_opt_from(cons)? {
                entries.push(entry);
            }
            Ok(entries)
        })?;
        Ok(RevokedCertificates(res.unwrap_or_default()))
    }

    pub fn contains(&self, serial: &SerialNumber) -> bool {
        self.0.iter().any(|entry| &entry.user_certificate == serial)
    }

    pub fn iter(&self) -> std::slice::Iter<CrlEntry> {
        self.0.iter()
    }
}


//------------ CrlEntry ------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CrlEntry {
    user_certificate: SerialNumber,
    revocation_date: Time,
}

impl CrlEntry {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.sequence(Self::take_content_from)
    }

    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Option<Self>, S::Err> {
        cons.opt_sequence(Self::take_content_from)
    }

    pub fn take_content_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        Ok(CrlEntry {
            user_certificate: SerialNumber::take_from(cons)?,
            revocation_date: Time::take_from(cons)?,
            // crlEntryExtensions are forbidden by RFC 6487.
        })
    }
}


//------------ Extensions ----------------------------------------------------

#[derive(Clone, Debug)]
pub struct Extensions {
    /// Authority Key Identifier
    authority_key_id: OctetString,

    /// CRL Number
    crl_number: SerialNumber,
}

impl Extensions {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.sequence(|cons| {
            let mut authority_key_id = None;
            let mut crl_number = None;
            while let Some(()) = cons.opt_sequence(|cons| {
                let id = Oid::take_from(cons)?;
                let _critical = cons.take_opt_bool()?.unwrap_or(false);
                let value = OctetString::take_from(cons)?;
                Mode::Der.decode(value.to_source(), |cons| {
                    if id == oid::CE_AUTHORITY_KEY_IDENTIFIER {
                        Self::take_authority_key_identifier(
                            cons, &mut authority_key_id
                        )
                    }
                    else if id == oid::CE_CRL_NUMBER {
                        Self::take_crl_number(cons, &mut crl_number)
                    }
                    else {
                        // RFC 6487 says that no other extensions are
                        // allowed. So we fail even if there is only
                        // non-critical extension.
                        xerr!(Err(Error::Malformed))
                    }
                }).map_err(Into::into)
            })? { }
            let authority_key_id = match authority_key_id {
                Some(some) => some,
                None => return Err(Error::Malformed.into())
            };
            let crl_number = match crl_number {
                Some(some) => some,
                None => return Err(Error::Malformed.into())
            };
            Ok(Extensions {
                authority_key_id,
                crl_number
            })
        })
    }

    /// Parses the Authority Key Identifier Extension.
    ///
    /// Must be present.
    ///
    /// ```text
    /// AuthorityKeyIdentifier ::= SEQUENCE {
    ///   keyIdentifier             [0] KeyIdentifier           OPTIONAL,
    ///   authorityCertIssuer       [1] GeneralNames            OPTIONAL,
    ///   authorityCertSerialNumber [2] CertificateSerialNumber OPTIONAL  }
    ///
    /// KeyIdentifier ::= OCTET STRING
    /// ```
    ///
    /// For certificates, only keyIdentifier must be present. Let’s assume
    /// the same is true for CRLs.
    fn take_authority_key_identifier<S: Source>(
        cons: &mut Constructed<S>,
        authority_key_id: &mut Option<OctetString>
    ) -> Result<(), S::Err> {
        update_once(authority_key_id, || {
            let res = cons.sequence(|cons| {
                cons.value_if(Tag::CTX_0, OctetString::take_content_from)
            })?;
            if res.len() != 20 {
                return Err(Error::Malformed.into())
            }
            else {
                Ok(res)
            }
        })
    }

    /// Parses the CRL Number Extension.
    ///
    /// Must be present
    ///
    /// ```text
    /// CRLNumber ::= INTEGER (0..MAX)
    /// ```
    fn take_crl_number<S: Source>(
        cons: &mut Constructed<S>,
        crl_number: &mut Option<SerialNumber>
    ) -> Result<(), S::Err> {
        update_once(crl_number, || {
            SerialNumber::take_from(cons)
        })
    }
}


//------------ OIDs ----------------------------------------------------------

mod oid {
    use bytes::Bytes;
    use super::super::ber::Oid;

    macro_rules! oid {
        ($name:ident, $($arc:expr),+ $(,)*) => {
            pub const $name: Oid = Oid(
                Bytes::from_static(&[$($arc),+])
            );
        }
    }

    oid!(CE_CRL_NUMBER, 85, 29, 20);
    oid!(CE_AUTHORITY_KEY_IDENTIFIER, 85, 29, 35);
}

