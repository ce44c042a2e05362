//! PDF signing implementation.
//!
//! This module handles the creation of digital signatures for PDF documents:
//! the signature dictionary with its placeholders, and the CMS SignedData
//! envelope (RFC 5652) carried in `/Contents`.

use super::byterange::{byte_range_placeholder, ByteRangeCalculator};
use super::types::{SignOptions, SigningCredentials};
use crate::error::Result;
use crate::object::{Dict, Object};
use chrono::{DateTime, Utc};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo,
    SignerInfos,
};
use der::asn1::{Any, ObjectIdentifier, OctetString, SetOfVec, UtcTime};
use der::{Encode, Tag};
use rsa::pkcs1v15::SigningKey;
use sha2::{Digest, Sha256};
use signature::{SignatureEncoding, Signer};
use spki::AlgorithmIdentifierOwned;
use x509_cert::attr::Attribute;

pub(crate) const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
pub(crate) const ID_SIGNED_DATA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
pub(crate) const ID_CONTENT_TYPE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
pub(crate) const ID_MESSAGE_DIGEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
pub(crate) const ID_SIGNING_TIME: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
pub(crate) const ID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
pub(crate) const ID_SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

/// PDF signer that creates digital signatures.
pub struct PdfSigner {
    credentials: SigningCredentials,
    options: SignOptions,
    byte_range_calc: ByteRangeCalculator,
}

impl PdfSigner {
    /// Create a new PDF signer with the given credentials and options.
    pub fn new(credentials: SigningCredentials, options: SignOptions) -> Self {
        let byte_range_calc = ByteRangeCalculator::new(options.reserved_size);
        Self {
            credentials,
            options,
            byte_range_calc,
        }
    }

    /// Signing options in use.
    pub fn options(&self) -> &SignOptions {
        &self.options
    }

    /// Get the placeholder size for the signature.
    pub fn placeholder_size(&self) -> usize {
        self.byte_range_calc.placeholder_size()
    }

    /// Build the signature dictionary with a dummy `/ByteRange` and a zeroed
    /// `/Contents`, ready to be written and then patched by
    /// [`sign_prepared`](Self::sign_prepared).
    pub fn build_signature_dictionary(&self, signing_time: DateTime<Utc>) -> Dict {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("Sig"));
        dict.insert("Filter".to_string(), Object::name("Adobe.PPKLite"));
        dict.insert(
            "SubFilter".to_string(),
            Object::name(self.options.sub_filter.as_pdf_name()),
        );
        dict.insert("ByteRange".to_string(), byte_range_placeholder());
        dict.insert("Contents".to_string(), self.byte_range_calc.contents_placeholder());
        dict.insert("M".to_string(), Object::text(&format_pdf_date(signing_time)));

        if let Some(ref name) = self.options.name {
            dict.insert("Name".to_string(), Object::text(name));
        }
        if let Some(ref reason) = self.options.reason {
            dict.insert("Reason".to_string(), Object::text(reason));
        }
        if let Some(permission) = self.options.docmdp_permission {
            dict.insert("Reference".to_string(), docmdp_reference(permission));
        }

        dict
    }

    /// Compute the SHA-256 digest of the signed bytes.
    pub fn compute_digest(&self, signed_bytes: &[u8]) -> Vec<u8> {
        Sha256::digest(signed_bytes).to_vec()
    }

    /// Sign the document bytes and return the DER-encoded CMS ContentInfo.
    ///
    /// The SignedData is detached (no encapsulated content), carries the
    /// signer certificate and chain, and signs the `contentType`,
    /// `signingTime` and `messageDigest` attributes with RSA PKCS#1 v1.5
    /// over SHA-256.
    pub fn sign(&self, signed_bytes: &[u8], signing_time: DateTime<Utc>) -> Result<Vec<u8>> {
        let digest = self.compute_digest(signed_bytes);

        let signing_time = UtcTime::from_unix_duration(std::time::Duration::from_secs(
            signing_time.timestamp().max(0) as u64,
        ))?;
        let signed_attrs: SetOfVec<Attribute> = SetOfVec::try_from(vec![
            attribute(ID_CONTENT_TYPE, Any::encode_from(&ID_DATA)?)?,
            attribute(ID_SIGNING_TIME, Any::encode_from(&signing_time)?)?,
            attribute(ID_MESSAGE_DIGEST, Any::encode_from(&OctetString::new(digest)?)?)?,
        ])?;

        // The signature covers the attributes' explicit SET OF encoding.
        let signing_key = SigningKey::<Sha256>::new(self.credentials.private_key.clone());
        let signature = signing_key.try_sign(&signed_attrs.to_der()?)?;

        let tbs = &self.credentials.certificate.tbs_certificate;
        let signer_info = SignerInfo {
            version: CmsVersion::V1,
            sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                issuer: tbs.issuer.clone(),
                serial_number: tbs.serial_number.clone(),
            }),
            digest_alg: sha256_algorithm(),
            signed_attrs: Some(signed_attrs),
            signature_algorithm: AlgorithmIdentifierOwned {
                oid: ID_SHA256_WITH_RSA,
                parameters: Some(Any::new(Tag::Null, Vec::<u8>::new())?),
            },
            signature: OctetString::new(signature.to_vec())?,
            unsigned_attrs: None,
        };

        let certificates = self
            .credentials
            .certificates()
            .cloned()
            .map(CertificateChoices::Certificate)
            .collect::<Vec<_>>();

        let signed_data = SignedData {
            version: CmsVersion::V1,
            digest_algorithms: SetOfVec::try_from(vec![sha256_algorithm()])?,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: ID_DATA,
                econtent: None,
            },
            certificates: Some(CertificateSet(SetOfVec::try_from(certificates)?)),
            crls: None,
            signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info])?),
        };

        let content_info = ContentInfo {
            content_type: ID_SIGNED_DATA,
            content: Any::encode_from(&signed_data)?,
        };
        Ok(content_info.to_der()?)
    }

    /// Finish a written signature: patch the real ByteRange into the
    /// signature object at `sig_object_offset`, sign the covered bytes and
    /// insert the signature into the `/Contents` gap.
    ///
    /// Returns the ByteRange that was signed.
    pub fn sign_prepared(
        &self,
        pdf_data: &mut [u8],
        sig_object_offset: usize,
        signing_time: DateTime<Utc>,
    ) -> Result<[i64; 4]> {
        let calc = &self.byte_range_calc;
        let gap = calc.locate(pdf_data, sig_object_offset)?;
        let byte_range = calc.calculate_byte_range(pdf_data.len(), gap.contents_offset);
        calc.write_byte_range(pdf_data, &gap, &byte_range)?;

        let signed_bytes = ByteRangeCalculator::extract_signed_bytes(pdf_data, &byte_range)?;
        let signature = self.sign(&signed_bytes, signing_time)?;
        log::debug!(
            "CMS signature is {} bytes of {} reserved, ByteRange {:?}",
            signature.len(),
            calc.reserved(),
            byte_range
        );
        calc.insert_signature(pdf_data, gap.contents_offset, &signature)?;

        Ok(byte_range)
    }
}

/// The `/Reference` array of a certification signature: one DocMDP
/// signature reference carrying the permission level.
pub fn docmdp_reference(permission: i64) -> Object {
    Object::Array(vec![Object::dict([
        ("Type", Object::name("SigRef")),
        ("TransformMethod", Object::name("DocMDP")),
        (
            "TransformParams",
            Object::dict([
                ("Type", Object::name("TransformParams")),
                ("P", Object::Integer(permission)),
                ("V", Object::name("1.2")),
            ]),
        ),
    ])])
}

/// Read the DocMDP permission level out of a signature dictionary's
/// `/Reference` array.
pub fn docmdp_permission(sig_dict: &Dict) -> Option<i64> {
    sig_dict
        .get("Reference")?
        .as_array()?
        .iter()
        .filter_map(Object::as_dict)
        .find(|r| r.get("TransformMethod").and_then(Object::as_name) == Some("DocMDP"))
        .and_then(|r| r.get("TransformParams")?.as_dict()?.get("P")?.as_integer())
}

fn attribute(oid: ObjectIdentifier, value: Any) -> Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

fn sha256_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: ID_SHA256,
        parameters: None,
    }
}

/// Format a timestamp as a PDF date string (`D:YYYYMMDDHHmmSS+00'00'`).
pub fn format_pdf_date(time: DateTime<Utc>) -> String {
    format!("D:{}+00'00'", time.format("%Y%m%d%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::self_signed;
    use chrono::TimeZone;
    use der::Decode;

    fn signer(options: SignOptions) -> PdfSigner {
        let creds = self_signed("Signer Test", "pdf_cosign tests", 1024, 30).unwrap();
        PdfSigner::new(creds, options)
    }

    #[test]
    fn test_format_pdf_date() {
        let time = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(format_pdf_date(time), "D:20240309140507+00'00'");
    }

    #[test]
    fn test_signature_dictionary_entries() {
        let signer = signer(
            SignOptions::default()
                .with_name("Signer A")
                .with_reason("Approval")
                .with_docmdp(2)
                .with_reserved_size(64),
        );
        let dict = signer.build_signature_dictionary(Utc::now());
        assert_eq!(dict.get("Type").and_then(Object::as_name), Some("Sig"));
        assert_eq!(dict.get("SubFilter").and_then(Object::as_name), Some("adbe.pkcs7.detached"));
        assert_eq!(dict.get("Contents").and_then(Object::as_string).map(<[u8]>::len), Some(64));
        assert_eq!(dict.get("Name").and_then(Object::as_text).as_deref(), Some("Signer A"));
        assert_eq!(docmdp_permission(&dict), Some(2));
        assert_eq!(signer.placeholder_size(), 130);
    }

    #[test]
    fn test_approval_signature_has_no_reference() {
        let signer = signer(SignOptions::default());
        let dict = signer.build_signature_dictionary(Utc::now());
        assert!(dict.get("Reference").is_none());
        assert_eq!(docmdp_permission(&dict), None);
    }

    #[test]
    fn test_sign_produces_detached_signed_data() {
        let signer = signer(SignOptions::default());
        let der = signer.sign(b"covered bytes", Utc::now()).unwrap();

        let content_info = ContentInfo::from_der(&der).unwrap();
        assert_eq!(content_info.content_type, ID_SIGNED_DATA);
        let signed_data = SignedData::from_der(&content_info.content.to_der().unwrap()).unwrap();
        assert!(signed_data.encap_content_info.econtent.is_none());
        assert_eq!(signed_data.signer_infos.0.len(), 1);
        assert_eq!(signed_data.certificates.map(|c| c.0.len()), Some(1));
    }
}
