
use std::{fmt, str};
use bytes::Bytes;
use super::asres::{AsIdBlocks, AsIdentifiers};
use super::ber::{
    BitString, Constructed, Error, Mode, OctetString, Oid, Source, Tag
};
use super::ipres::{IpAddressBlocks, IpResources};
use super::x509::{
    update_once, Name, SerialNumber, SignatureAlgorithm, SignedData, Time,
    ValidationError,
};


//------------ Cert ----------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Cert {
    signed_data: SignedData,

    serial_number: SerialNumber,
    signature: SignatureAlgorithm,
    issuer: Name,
    validity: Validity,
    subject: Name,
    subject_public_key_info: SubjectPublicKeyInfo,
    issuer_unique_id: Option<BitString>,
    subject_unique_id: Option<BitString>,
    extensions: Extensions,
}

impl Cert {
    pub fn decode<S: Source>(source: S) -> Result<Self, S::Err> {
        Mode::Der.decode(source, Self::take_from)
    }

    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.sequence(Self::take_content_from)
    }

    /// Parses the content of a Certificate sequence.
    pub fn take_content_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        let signed_data = SignedData::take_content_from(cons)?;

        Mode::Der.decode(signed_data.data().clone(), |cons| {
            cons.sequence(|cons| {
                // version [0] EXPLICIT Version DEFAULT v1.
                //  -- we need extensions so apparently, we want v3 which,
                //     confusingly, is 2.
                cons.constructed_if(Tag::CTX_0, |c| c.skip_u8_if(2))?;

                Ok(Cert {
                    signed_data,
                    serial_number: SerialNumber::take_from(cons)?,
                    signature: SignatureAlgorithm::take_from(cons)?,
                    issuer: Name::take_from(cons)?,
                    validity: Validity::take_from(cons)?,
                    subject: Name::take_from(cons)?,
                    subject_public_key_info: 
                        SubjectPublicKeyInfo::take_from(cons)?,
                    issuer_unique_id: cons.opt_value_if(
                        Tag::CTX_1,
                        |c| BitString::parse_content(c)
                    )?,
                    subject_unique_id: cons.opt_value_if(
                        Tag::CTX_2,
                        |c| BitString::parse_content(c)
                    )?,
                    extensions: cons.constructed_if(
                        Tag::CTX_3,
                        Extensions::take_from
                    )?,
                })
            })
        }).map_err(Into::into)
    }

    pub fn public_key(&self) -> BitString {
        self.subject_public_key_info
            .subject_public_key.clone()
    }

    /*
    pub fn public_key_components(
        &self
    ) -> Result<(Input<'a>, Input<'a>), Error> {
        self.subject_public_key_info.public_key_components()
    }
    */

    pub fn subject_key_identifier(&self) -> &OctetString {
        &self.extensions.subject_key_id
    }

    pub fn serial_number(&self) -> &SerialNumber {
        &self.serial_number
    }

    pub fn validity(&self) -> Validity {
        self.validity.clone()
    }

    pub fn authority_key_id(&self) -> Option<&OctetString> {
        self.extensions.authority_key_id.as_ref()
    }

    /// Returns whether this is a CA certificate.
    ///
    /// This is determined from the Key Usage extension: CA certificates
    /// set both keyCertSign and cRLSign, EE certificates set
    /// digitalSignature instead. See [`Extensions::take_key_usage`].
    pub fn is_ca(&self) -> bool {
        self.extensions.key_usage_ca
    }

    /// Returns the CRL distribution point URI, if present.
    pub fn crl_uri(&self) -> Option<&UriGeneralName> {
        self.extensions.crl_distribution.as_ref().map(|names| names.first())
    }

    /// Returns the caIssuers URI from the Authority Information Access
    /// extension, if present.
    pub fn ca_issuer(&self) -> Option<&UriGeneralName> {
        self.extensions.authority_info_access.as_ref()
    }

    /// Returns the caRepository URI from the Subject Information Access
    /// extension, for CA certificates.
    pub fn ca_repository(&self) -> Option<&UriGeneralName> {
        self.extensions.subject_info_access.ca_repository.as_ref()
    }

    /// Returns the rpkiManifest URI from the Subject Information Access
    /// extension, for CA certificates.
    pub fn rpki_manifest(&self) -> Option<&UriGeneralName> {
        self.extensions.subject_info_access.rpki_manifest.as_ref()
    }

    /// Returns the rpkiNotify (RRDP notification) URI from the Subject
    /// Information Access extension, if the publication point offers RRDP.
    pub fn rpki_notify(&self) -> Option<&UriGeneralName> {
        self.extensions.subject_info_access.rpki_notify.as_ref()
    }

    /// Returns the signedObject URI from the Subject Information Access
    /// extension, for EE certificates.
    pub fn signed_object(&self) -> Option<&UriGeneralName> {
        self.extensions.subject_info_access.signed_object.as_ref()
    }

    /// Verifies that this certificate's signature was produced by the
    /// holder of `public_key`.
    pub fn verify_signature(
        &self, public_key: &BitString
    ) -> Result<(), ValidationError> {
        let public_key: &[u8] = AsRef::<[u8]>::as_ref(public_key);
        ring::signature::UnparsedPublicKey::new(
            &ring::signature::RSA_PKCS1_2048_8192_SHA256,
            public_key
        ).verify(
            self.signed_data.data(),
            self.signed_data.signature().octet_slice().unwrap_or(&[])
        ).map_err(|_| ValidationError)
    }

    /// Validates the certificate as a trust anchor.
    ///
    /// A trust anchor is self-signed, so there is no issuer to validate
    /// the resources against, and since there is nothing to inherit from,
    /// neither the IP nor the AS resources may use the "inherit" form.
    /// `public_key` is the TAL's own copy of the key, which must match
    /// the certificate's subject key and have produced its signature.
    pub fn validate_ta(
        self, public_key: &BitString
    ) -> Result<ResourceCert, ValidationError> {
        let subject_key = self.public_key();
        let subject_key: &[u8] = AsRef::<[u8]>::as_ref(&subject_key);
        if subject_key != AsRef::<[u8]>::as_ref(public_key) {
            return Err(ValidationError)
        }
        self.verify_signature(public_key)?;
        self.validity.not_after().validate_not_before(Time::now())?;
        Time::now().validate_not_before(self.validity.not_before())?;
        let ip_resources = IpAddressBlocks::from_resources(
            self.extensions.ip_resources.as_ref()
        )?;
        let as_resources = match self.extensions.as_resources.as_ref() {
            Some(res) => Some(res.validate_ta()?),
            None => None,
        };
        Ok(ResourceCert { cert: self, ip_resources, as_resources })
    }

    /// Validates the certificate as a CA certificate issued by `issuer`.
    pub fn validate_ca(
        self, issuer: &ResourceCert
    ) -> Result<ResourceCert, ValidationError> {
        self.validate_issued(issuer)
    }

    /// Validates the certificate as an EE certificate issued by `issuer`.
    pub fn validate_ee(
        self, issuer: &ResourceCert
    ) -> Result<ResourceCert, ValidationError> {
        self.validate_issued(issuer)
    }

    /// Resolves the certificate's resources against those of `issuer` and
    /// checks its signature and validity time.
    ///
    /// Each resource family may either be an explicit set, in which case
    /// it must be encompassed by the issuer's resources, or "inherit", in
    /// which case the issuer's set is taken over verbatim.
    fn validate_issued(
        self, issuer: &ResourceCert
    ) -> Result<ResourceCert, ValidationError> {
        self.verify_signature(&issuer.cert().public_key())?;
        Time::now().validate_not_before(self.validity.not_before())?;
        self.validity.not_after().validate_not_before(Time::now())?;
        let ip_resources = issuer.ip_resources.encompasses(
            self.extensions.ip_resources.as_ref()
        )?;
        let as_resources = match self.extensions.as_resources.as_ref() {
            Some(res) => Some(
                res.validate_issued(issuer.as_resources.as_ref())?
            ),
            None => None,
        };
        Ok(ResourceCert { cert: self, ip_resources, as_resources })
    }
}


//------------ ResourceCert ---------------------------------------------------

/// A certificate whose IP and AS resources have been resolved and
/// validated against its issuer (or, for a trust anchor, against itself).
#[derive(Clone, Debug)]
pub struct ResourceCert {
    cert: Cert,
    ip_resources: IpAddressBlocks,
    as_resources: Option<AsIdBlocks>,
}

impl ResourceCert {
    pub fn cert(&self) -> &Cert {
        &self.cert
    }

    pub fn ip_resources(&self) -> &IpAddressBlocks {
        &self.ip_resources
    }

    pub fn as_resources(&self) -> Option<&AsIdBlocks> {
        self.as_resources.as_ref()
    }
}


//------------ Validity ------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Validity {
    not_before: Time,
    not_after: Time,
}

impl Validity {
    pub fn new(not_before: Time, not_after: Time) -> Self {
        Validity { not_before, not_after }
    }

    pub fn not_before(&self) -> Time {
        self.not_before
    }

    pub fn not_after(&self) -> Time {
        self.not_after
    }

    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.sequence(|cons| {
            Ok(Validity::new(
                Time::take_from(cons)?,
                Time::take_from(cons)?,
            ))
        })
    }
}


//------------ SubjectPublicKeyInfo ------------------------------------------

#[derive(Clone, Debug)]
pub struct SubjectPublicKeyInfo {
    algorithm: PublicKeyAlgorithm,
    subject_public_key: BitString,
}

impl SubjectPublicKeyInfo {
    pub fn decode<S: Source>(source: S) -> Result<Self, S::Err> {
        Mode::Der.decode(source, Self::take_from)
    }

    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.sequence(|cons| {
            Ok(SubjectPublicKeyInfo {
                algorithm: PublicKeyAlgorithm::take_from(cons)?,
                subject_public_key: BitString::take_from(cons)?
            })
        })
    }

    /// Returns the encoded public key itself.
    pub fn subject_public_key(&self) -> &BitString {
        &self.subject_public_key
    }

    /*
    pub fn public_key_components(
        &self
    ) -> Result<(Input<'a>, Input<'a>), Error> {
        Content::parse(self.subject_public_key.clone(), |content| {
            content.sequence(|content| {
                Ok((
                    content.primitive_if(Tag::INTEGER, Ok)?,
                    content.primitive_if(Tag::INTEGER, Ok)?,
                ))
            })
        })
    }
    */
}


//------------ PublicKeyAlgorithm --------------------------------------------

#[derive(Clone, Debug)]
pub enum PublicKeyAlgorithm {
    RsaEncryption,
}

impl PublicKeyAlgorithm {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.sequence(Self::take_content_from)
    }

    pub fn take_content_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        oid::RSA_ENCRYPTION.skip_if(cons)?;
        cons.skip_opt_null()?;
        Ok(PublicKeyAlgorithm::RsaEncryption)
    }
}


//------------ Extensions ----------------------------------------------------

#[derive(Clone, Debug)]
pub struct Extensions {
    /// Basic Contraints.
    ///
    /// The field indicates whether the extension is present and, if so,
    /// whether the "cA" boolean is set. See 4.8.1. of RFC 6487.
    basic_ca: Option<bool>,

    /// Subject Key Identifier.
    subject_key_id: OctetString,

    /// Authority Key Identifier
    authority_key_id: Option<OctetString>,

    /// Key Usage.
    ///
    key_usage_ca: bool,

    /// Extended Key Usage.
    ///
    /// The valud is the content of the DER-encoded sequence of object
    /// identifiers.
    extended_key_usage: Option<Bytes>,

    /// CRL Distribution Points
    crl_distribution: Option<UriGeneralNames>,

    /// Authority Information Access
    authority_info_access: Option<UriGeneralName>,

    /// Subject Information Access
    subject_info_access: SubjectInfoAccess,

    /// Certificate Policies
    ///
    /// Must be present and critical. RFC 6484 describes the policies for
    /// PKIX certificates. This value contains the content of the
    /// certificatePolicies sequence.
    certificate_policies: CertificatePolicies,

    /// IP Resources
    ip_resources: Option<IpResources>,

    /// AS Resources
    as_resources: Option<AsIdentifiers>,
}

impl Extensions {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.sequence(|cons| {
            let mut basic_ca = None;
            let mut subject_key_id = None;
            let mut authority_key_id = None;
            let mut key_usage_ca = None;
            let mut extended_key_usage = None;
            let mut crl_distribution = None;
            let mut authority_info_access = None;
            let mut subject_info_access = None;
            let mut certificate_policies = None;
            let mut ip_resources = None;
            let mut as_resources = None;
            while let Some(()) = cons.opt_sequence(|cons| {
                let id = Oid::take_from(cons)?;
                let critical = cons.take_opt_bool()?.unwrap_or(false);
                let value = OctetString::take_from(cons)?;
                Mode::Der.decode(value.to_source(), |content| {
                    if id == oid::CE_BASIC_CONSTRAINTS {
                        Self::take_basic_ca(content, &mut basic_ca)
                    }
                    else if id == oid::CE_SUBJECT_KEY_IDENTIFIER {
                        Self::take_subject_key_identifier(
                            content, &mut subject_key_id
                        )
                    }
                    else if id == oid::CE_AUTHORITY_KEY_IDENTIFIER {
                        Self::take_authority_key_identifier(
                            content, &mut authority_key_id
                        )
                    }
                    else if id == oid::CE_KEY_USAGE {
                        Self::take_key_usage(
                            content, &mut key_usage_ca
                        )
                    }
                    else if id == oid::CE_EXTENDED_KEY_USAGE {
                        Self::take_extended_key_usage(
                            content, &mut extended_key_usage
                        )
                    }
                    else if id == oid::CE_CRL_DISTRIBUTION_POINTS {
                        Self::take_crl_distribution_points(
                            content, &mut crl_distribution
                        )
                    }
                    else if id == oid::PE_AUTHORITY_INFO_ACCESS {
                        Self::take_authority_info_access(
                            content, &mut authority_info_access
                        )
                    }
                    else if id == oid::PE_SUBJECT_INFO_ACCESS {
                        Self::take_subject_info_access(
                            content, &mut subject_info_access
                        )
                    }
                    else if id == oid::CE_CERTIFICATE_POLICIES {
                        Self::take_certificate_policies(
                            content, &mut certificate_policies
                        )
                    }
                    else if id == oid::PE_IP_ADDR_BLOCK {
                        Self::take_ip_resources(
                            content, &mut ip_resources
                        )
                    }
                    else if id == oid::PE_AUTONOMOUS_SYS_IDS {
                        Self::take_as_resources(
                            content, &mut as_resources
                        )
                    }
                    else if critical {
                        xerr!(Err(Error::Malformed))
                    }
                    else {
                        // RFC 5280 says we can ignore non-critical
                        // extensions we don’t know of. RFC 6487
                        // agrees. So let’s do that.
                        Ok(())
                    }
                })?;
                Ok(())
            })? { }
            if ip_resources.is_none() && as_resources.is_none() {
                xerr!(return Err(Error::Malformed.into()))
            }
            Ok(Extensions {
                basic_ca,
                subject_key_id: subject_key_id.ok_or(Error::Malformed)?,
                authority_key_id,
                key_usage_ca: key_usage_ca.ok_or(Error::Malformed)?,
                extended_key_usage,
                crl_distribution,
                authority_info_access,
                subject_info_access:
                    subject_info_access.ok_or(Error::Malformed)?,
                certificate_policies:
                    certificate_policies.ok_or(Error::Malformed)?,
                ip_resources,
                as_resources,
            })
        })
    }

    /// Parses the Basic Constraints Extension.
    ///
    /// The extension must be present in CA certificates and must not be
    /// present in EE certificats.
    ///
    /// ```text
    ///   BasicConstraints ::= SEQUENCE {
    ///        cA                      BOOLEAN DEFAULT FALSE,
    ///        pathLenConstraint       INTEGER (0..MAX) OPTIONAL }
    /// ```
    ///
    /// The cA field gets chosen by the CA. The pathLenConstraint field must
    /// not be present.
    fn take_basic_ca<S: Source>(
        cons: &mut Constructed<S>,
        basic_ca: &mut Option<bool>
    ) -> Result<(), S::Err> {
        update_once(basic_ca, || {
            match cons.sequence(|cons| cons.take_opt_bool())? {
                Some(res) => Ok(res),
                None => Ok(false)
            }
        })
    }

    /// Parses the Subject Key Identifier Extension.
    ///
    /// The extension must be present and contain the 160 bit SHA-1 hash of
    /// the value of the DER-encoded bit string of the subject public key. 
    ///
    /// ```text
    /// SubjectKeyIdentifier ::= KeyIdentifier
    /// KeyIdentifier        ::= OCTET STRING
    /// ```
    fn take_subject_key_identifier<S: Source>(
        cons: &mut Constructed<S>,
        subject_key_id: &mut Option<OctetString>
    ) -> Result<(), S::Err> {
        update_once(subject_key_id, || {
            let id = OctetString::take_from(cons)?;
            if id.len() != 20 {
                xerr!(Err(Error::Malformed.into()))
            }
            else {
                Ok(id)
            }
        })
    }

    /// Parses the Authority Key Identifier Extension.
    ///
    /// Must be present except in self-signed CA certificates where it is
    /// optional.
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
    /// Only keyIdentifier must be present.
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

    /// Parses the Key Usage extension.
    ///
    /// ```text
    /// KeyUsage ::= BIT STRING {
    ///      digitalSignature        (0),
    ///      nonRepudiation          (1), -- recent editions of X.509 have
    ///                           -- renamed this bit to contentCommitment
    ///      keyEncipherment         (2),
    ///      dataEncipherment        (3),
    ///      keyAgreement            (4),
    ///      keyCertSign             (5),
    ///      cRLSign                 (6),
    ///      encipherOnly            (7),
    ///      decipherOnly            (8) }
    ///
    /// Must be present. In CA certificates, keyCertSign and
    /// CRLSign must be set, in EE certificates, digitalSignatures must be
    /// set. This field therefore simply describes whether the certificate
    /// is for a CA.
    fn take_key_usage<S: Source>(
        cons: &mut Constructed<S>,
        key_usage_ca: &mut Option<bool>
    ) -> Result<(), S::Err> {
        update_once(key_usage_ca, || {
            let bits = BitString::take_from(cons)?;
            if bits.bit(5) && bits.bit(6) {
                Ok(true)
            }
            else if bits.bit(0) {
                Ok(false)
            }
            else {
                Err(Error::Malformed.into())
            }
        })
    }

    /// Parses the Extended Key Usage extension.
    ///
    /// ```text
    /// ExtKeyUsageSyntax ::= SEQUENCE SIZE (1..MAX) OF KeyPurposeId
    /// KeyPurposeId ::= OBJECT IDENTIFIER
    /// ```
    ///
    /// May only be present in EE certificates issued to devices.
    fn take_extended_key_usage<S: Source>(
        cons: &mut Constructed<S>,
        extended_key_usage: &mut Option<Bytes>
    ) -> Result<(), S::Err> {
        update_once(extended_key_usage, || {
            let res = cons.sequence(|c| c.take_all())?;
            Mode::Der.decode(res.clone(), |cons| {
                Oid::skip_in(cons)?;
                while let Some(_) = Oid::skip_opt_in(cons)? { }
                Ok(res)
            }).map_err(Into::into)
        })
    }

    /// Parses the CRL Distribution Points extension.
    ///
    /// ```text
    /// CRLDistributionPoints ::= SEQUENCE SIZE (1..MAX) OF DistributionPoint
    ///
    /// DistributionPoint ::= SEQUENCE {
    ///    distributionPoint       [0]     DistributionPointName OPTIONAL,
    ///    reasons                 [1]     ReasonFlags OPTIONAL,
    ///    cRLIssuer               [2]     GeneralNames OPTIONAL }
    ///
    /// DistributionPointName ::= CHOICE {
    ///    fullName                [0]     GeneralNames,
    ///    nameRelativeToCRLIssuer [1]     RelativeDistinguishedName }
    /// ```
    ///
    /// Must be present except in self-signed certificates.
    ///
    /// It must contain exactly one Distribution Point. Only its
    /// distributionPoint field must be present and it must contain
    /// the fullName choice which can be one or more uniformResourceIdentifier
    /// choices.
    fn take_crl_distribution_points<S: Source>(
        cons: &mut Constructed<S>,
        crl_distribution: &mut Option<UriGeneralNames>
    ) -> Result<(), S::Err> {
        update_once(crl_distribution, || {
            cons.sequence(|cons| {
                cons.sequence(|cons| {
                    cons.constructed_if(Tag::CTX_0, |cons| {
                        cons.constructed_if(Tag::CTX_0, |cons| {
                            UriGeneralNames::take_content_from(cons)
                        })
                    })
                })
            })
        })
    }

    /// Parses the Authority Information Access extension.
    ///
    /// ```text
    /// AuthorityInfoAccessSyntax  ::=
    ///         SEQUENCE SIZE (1..MAX) OF AccessDescription
    ///
    /// AccessDescription  ::=  SEQUENCE {
    ///         accessMethod          OBJECT IDENTIFIER,
    ///         accessLocation        GeneralName  }
    /// ```
    ///
    /// Must be present except in self-signed certificates. Must contain
    /// exactly one entry with accessMethod id-ad-caIssuers and a URI as a
    /// generalName.
    fn take_authority_info_access<S: Source>(
        cons: &mut Constructed<S>,
        authority_info_access: &mut Option<UriGeneralName>
    ) -> Result<(), S::Err> {
        update_once(authority_info_access, || {
            cons.sequence(|cons| {
                cons.sequence(|cons| {
                    oid::AD_CA_ISSUERS.skip_if(cons)?;
                    UriGeneralName::take_from(cons)
                })
            })
        })
    }

    /// Parses the Subject Information Access extension.
    ///
    /// ```text
    /// SubjectInfoAccessSyntax  ::=
    ///         SEQUENCE SIZE (1..MAX) OF AccessDescription
    ///
    /// AccessDescription  ::=  SEQUENCE {
    ///         accessMethod          OBJECT IDENTIFIER,
    ///         accessLocation        GeneralName  }
    /// ```
    ///
    /// Must be present.
    ///
    /// For CA certificates, there must be two AccessDescriptions, one with
    /// id-ad-caRepository and one with id-ad-rpkiManifest, both with rsync
    /// URIs. Additional id-ad-rpkiManifest descriptions may be present with
    /// additional access mechanisms for the manifest.
    ///
    /// For EE certificates, there must at least one AccessDescription value
    /// with an id-ad-signedObject access method.
    ///
    /// Since we don’t necessarily know what kind of certificate we have yet,
    /// we may accept the wrong kind here. This needs to be checked later.
    fn take_subject_info_access<S: Source>(
        cons: &mut Constructed<S>,
        subject_info_access: &mut Option<SubjectInfoAccess>,
    ) -> Result<(), S::Err> {
        update_once(subject_info_access, || {
            cons.sequence(|cons| {
                let mut is_ca = None;
                let mut ca_repository = None;
                let mut rpki_manifest = None;
                let mut rpki_notify = None;
                let mut signed_object = None;
                while let Some(()) = cons.opt_sequence(|cons| {
                    let oid = Oid::take_from(cons)?;
                    let uri = UriGeneralName::take_from(cons)?;
                    if oid == oid::AD_CA_REPOSITORY {
                        match is_ca {
                            None => is_ca = Some(true),
                            Some(true) => { }
                            Some(false) => return Err(Error::Malformed),
                        }
                        if ca_repository.is_none() {
                            ca_repository = Some(uri);
                        }
                    }
                    else if oid == oid::AD_RPKI_MANIFEST {
                        match is_ca {
                            None => is_ca = Some(true),
                            Some(true) => { }
                            Some(false) => return Err(Error::Malformed),
                        }
                        if rpki_manifest.is_none() {
                            rpki_manifest = Some(uri);
                        }
                    }
                    else if oid == oid::AD_RPKI_NOTIFY {
                        if rpki_notify.is_none() {
                            rpki_notify = Some(uri);
                        }
                    }
                    else if oid == oid::AD_SIGNED_OBJECT {
                        match is_ca {
                            None => is_ca = Some(false),
                            Some(false) => { }
                            Some(true) => return Err(Error::Malformed),
                        }
                        if signed_object.is_none() {
                            signed_object = Some(uri);
                        }
                    }
                    Ok(())
                })? { }
                let is_ca = match is_ca {
                    // The sequence was empty.
                    None => xerr!(return Err(Error::Malformed)),
                    Some(is_ca) => is_ca,
                };
                Ok(SubjectInfoAccess {
                    is_ca,
                    ca_repository,
                    rpki_manifest,
                    rpki_notify,
                    signed_object,
                })
            })
        })
    }

    /// Parses the Certificate Policies extension.
    ///
    /// Must be present.
    fn take_certificate_policies<S: Source>(
        cons: &mut Constructed<S>,
        certificate_policies: &mut Option<CertificatePolicies>,
    ) -> Result<(), S::Err> {
        update_once(certificate_policies, || {
            CertificatePolicies::take_from(cons)
        })
    }

    /// Parses the IP Resources extension.
    fn take_ip_resources<S: Source>(
        cons: &mut Constructed<S>,
        ip_resources: &mut Option<IpResources>
    ) -> Result<(), S::Err> {
        update_once(ip_resources, || {
            IpResources::take_from(cons)
        })
    }

    /// Parses the AS Resources extension.
    fn take_as_resources<S: Source>(
        cons: &mut Constructed<S>,
        as_resources: &mut Option<AsIdentifiers>
    ) -> Result<(), S::Err> {
        update_once(as_resources, || {
            AsIdentifiers::take_from(cons)
        })
    }
}


//------------ SubjectInfoAccess ---------------------------------------------

/// The parsed content of a certificate's Subject Information Access
/// extension.
///
/// Which fields are populated depends on whether the certificate the
/// extension came from is a CA or an EE certificate; see
/// [`Extensions::take_subject_info_access`].
#[derive(Clone, Debug)]
pub struct SubjectInfoAccess {
    is_ca: bool,
    ca_repository: Option<UriGeneralName>,
    rpki_manifest: Option<UriGeneralName>,
    rpki_notify: Option<UriGeneralName>,
    signed_object: Option<UriGeneralName>,
}

impl SubjectInfoAccess {
    /// Returns whether the access descriptions were CA-shaped.
    ///
    /// This is derived independently from the Key Usage extension, so
    /// callers can cross-check the two agree.
    pub fn is_ca(&self) -> bool {
        self.is_ca
    }
}


//------------ URIGeneralNames -----------------------------------------------

/// A GeneralNames value limited to uniformResourceIdentifier choices.
#[derive(Clone, Debug)]
pub struct UriGeneralNames(Vec<UriGeneralName>);

impl UriGeneralNames {
    /// ```text
    /// GeneralNames ::= SEQUENCE SIZE (1..MAX) OF GeneralName
    ///
    /// GeneralName ::= CHOICE {
    ///    ...
    ///    uniformResourceIdentifier       [6]     IA5String,
    ///    ... }
    /// ```
    fn take_content_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        let mut names = Vec::new();
        match UriGeneralName::take_opt_from(cons)? {
            Some(name) => names.push(name),
            None => xerr!(return Err(Error::Malformed.into())),
        }
        while let Some(name) = UriGeneralName::take_opt_from(cons)? {
            names.push(name);
        }
        Ok(UriGeneralNames(names))
    }

    /// Returns the first URI in the list.
    ///
    /// Callers only ever need the one distribution point RPKI certificates
    /// are restricted to; `take_content_from` guarantees at least one
    /// entry is present.
    pub fn first(&self) -> &UriGeneralName {
        &self.0[0]
    }

    pub fn iter(&self) -> std::slice::Iter<UriGeneralName> {
        self.0.iter()
    }
}


//------------ UriGeneralName ------------------------------------------------

#[derive(Clone, Debug)]
pub struct UriGeneralName(Bytes);

impl UriGeneralName {
    fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.primitive_if(Tag::CTX_6, |prim| {
            let res = prim.take_all()?;
            if res.is_ascii() {
                Ok(UriGeneralName(res))
            }
            else {
                xerr!(Err(Error::Malformed.into()))
            }
        })
    }

    fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Option<Self>, S::Err> {
        cons.opt_primitive_if(Tag::CTX_6, |prim| {
            let res = prim.take_all()?;
            if res.is_ascii() {
                Ok(UriGeneralName(res))
            }
            else {
                xerr!(Err(Error::Malformed.into()))
            }
        })
    }

    /// Returns the URI as a string slice.
    ///
    /// `take_from`/`take_opt_from` already checked the content is ASCII.
    pub fn as_str(&self) -> &str {
        str::from_utf8(&self.0).expect("ASCII checked at parse time")
    }
}

impl fmt::Display for UriGeneralName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}


//------------ CertificatePolicies -------------------------------------------

#[derive(Clone, Debug)]
pub struct CertificatePolicies(Bytes);

impl CertificatePolicies {
    fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        // XXX TODO Parse properly.
        cons.sequence(|c| c.take_all()).map(CertificatePolicies)
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

    oid!(RSA_ENCRYPTION, 42, 134, 72, 134, 247, 13, 1, 1, 1);

    oid!(AD_CA_ISSUERS, 43, 6, 1, 5, 5, 7, 48, 2);
    oid!(AD_CA_REPOSITORY, 43, 6, 1, 5, 5, 7, 48, 5);
    oid!(AD_RPKI_MANIFEST, 43, 6, 1, 5, 5, 7, 48, 10);
    oid!(AD_SIGNED_OBJECT, 43, 6, 1, 5, 5, 7, 48, 11);
    oid!(AD_RPKI_NOTIFY, 43, 6, 1, 5, 5, 7, 48, 13);
    oid!(CE_SUBJECT_KEY_IDENTIFIER, 85, 29, 14);
    oid!(CE_KEY_USAGE, 85, 29, 15);
    oid!(CE_BASIC_CONSTRAINTS, 85, 29, 19);
    oid!(CE_CRL_DISTRIBUTION_POINTS, 85, 29, 31);
    oid!(CE_CERTIFICATE_POLICIES, 85, 29, 32);
    oid!(CE_AUTHORITY_KEY_IDENTIFIER, 85, 29, 35);
    oid!(CE_EXTENDED_KEY_USAGE, 85, 29, 37);
    oid!(PE_AUTHORITY_INFO_ACCESS, 43, 6, 1, 5, 5, 7, 1, 1);
    oid!(PE_IP_ADDR_BLOCK, 43, 6, 1, 5, 5, 7, 1, 7);
    oid!(PE_AUTONOMOUS_SYS_IDS, 43, 6, 1, 5, 5, 7, 1, 8);
    oid!(PE_SUBJECT_INFO_ACCESS, 43, 6, 1, 5, 5, 7, 1, 11);
}

