//! PDF signature verification.
//!
//! This module handles verification of existing digital signatures in PDF documents.

use super::byterange::ByteRangeCalculator;
use super::signer::{docmdp_permission, ID_MESSAGE_DIGEST, ID_SIGNED_DATA};
use super::types::{SignatureInfo, SignatureSubFilter, VerificationResult, VerificationStatus};
use crate::editor::{DocumentEditor, FormFields};
use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use der::asn1::OctetString;
use der::{Decode, Encode, SliceReader};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};
use signature::Verifier;
use x509_cert::Certificate;

/// Verifier for PDF digital signatures.
#[derive(Debug, Default)]
pub struct SignatureVerifier {
    /// Trusted certificates (DER-encoded)
    trusted_certificates: Vec<Vec<u8>>,
}

/// What the CMS envelope says about the covered bytes.
struct CmsCheck {
    digest_valid: bool,
    signature_valid: bool,
    certificate_der: Option<Vec<u8>>,
}

impl SignatureVerifier {
    /// Create a new signature verifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trusted certificate. Self-signed signer certificates are
    /// trusted by listing them directly.
    pub fn add_trusted_certificate(&mut self, cert_der: Vec<u8>) {
        self.trusted_certificates.push(cert_der);
    }

    /// Add multiple trusted certificates.
    pub fn add_trusted_certificates(&mut self, certs: impl IntoIterator<Item = Vec<u8>>) {
        self.trusted_certificates.extend(certs);
    }

    /// Extract signature information from a signature dictionary.
    pub fn extract_signature_info(&self, sig_dict: &Dict) -> SignatureInfo {
        let text = |key: &str| sig_dict.get(key).and_then(Object::as_text);
        SignatureInfo {
            signer_name: text("Name"),
            signing_time: text("M"),
            reason: text("Reason"),
            sub_filter: sig_dict
                .get("SubFilter")
                .and_then(Object::as_name)
                .and_then(SignatureSubFilter::from_pdf_name),
            byte_range: sig_dict
                .get("ByteRange")
                .and_then(Object::as_array)
                .map(|arr| arr.iter().filter_map(Object::as_integer).collect())
                .unwrap_or_default(),
            docmdp_permission: docmdp_permission(sig_dict),
            ..SignatureInfo::default()
        }
    }

    /// Verify every signed signature field of a document, in field order.
    pub fn verify_document(&self, pdf_data: &[u8]) -> Result<Vec<VerificationResult>> {
        let editor = DocumentEditor::from_bytes(pdf_data.to_vec())?;
        let Some(form) = FormFields::load(&editor)? else {
            return Ok(Vec::new());
        };

        let mut results = Vec::new();
        for field in form.iter().filter(|f| f.is_signature()) {
            let field_obj = editor.get(field.reference.id)?;
            let Some(value) = field_obj.as_dict().and_then(|d| d.get("V")) else {
                continue;
            };
            let sig_dict = match editor.resolve(value)? {
                Object::Dictionary(dict) => dict,
                other => {
                    log::warn!(
                        "signature field '{}' has a {} value, skipping",
                        field.name,
                        other.type_name()
                    );
                    continue;
                },
            };
            let mut result = self.verify(pdf_data, &sig_dict)?;
            result.signature_info.field_name = field.name.clone();
            results.push(result);
        }
        Ok(results)
    }

    /// Verify one signature dictionary against the file it came from.
    pub fn verify(&self, pdf_data: &[u8], sig_dict: &Dict) -> Result<VerificationResult> {
        let info = self.extract_signature_info(sig_dict);
        let byte_range: [i64; 4] = info.byte_range.as_slice().try_into().map_err(|_| {
            Error::DocumentCorrupt(format!(
                "signature ByteRange must have 4 entries, found {}",
                info.byte_range.len()
            ))
        })?;
        let contents = sig_dict
            .get("Contents")
            .and_then(Object::as_string)
            .ok_or_else(|| Error::DocumentCorrupt("signature has no /Contents".to_string()))?;

        let mut result = VerificationResult {
            signature_info: info,
            ..VerificationResult::default()
        };

        if let Err(e) = ByteRangeCalculator::validate_byte_range(pdf_data, &byte_range) {
            result.status = VerificationStatus::Invalid;
            result.messages.push(e.to_string());
            return Ok(result);
        }
        let revision_end = (byte_range[2] + byte_range[3]) as usize;
        result.signature_info.covers_whole_document = revision_end == pdf_data.len();
        result.document_modified = !result.signature_info.covers_whole_document;
        if result.document_modified {
            result.messages.push(format!(
                "signature covers the revision ending at byte {} of {}",
                revision_end,
                pdf_data.len()
            ));
        }

        let signed_bytes = ByteRangeCalculator::extract_signed_bytes(pdf_data, &byte_range)?;
        let check = match check_cms(contents, &Sha256::digest(&signed_bytes)) {
            Ok(check) => check,
            Err(e) => {
                result.status = VerificationStatus::Invalid;
                result.messages.push(format!("unreadable CMS signature: {}", e));
                return Ok(result);
            },
        };
        result.digest_valid = check.digest_valid;
        result.signature_valid = check.signature_valid;
        if !check.digest_valid {
            result.messages.push("digest does not match the signed bytes".to_string());
        }
        if !check.signature_valid {
            result.messages.push("RSA signature over signed attributes is invalid".to_string());
        }

        if let Some(cert_der) = &check.certificate_der {
            self.describe_certificate(cert_der, &mut result);
        } else {
            result.messages.push("signer certificate not found in CMS".to_string());
        }

        result.status = if !(result.digest_valid && result.signature_valid) {
            VerificationStatus::Invalid
        } else if !result.certificate_trusted {
            VerificationStatus::Unknown
        } else if result.document_modified || result.certificate_expired {
            VerificationStatus::ValidWithWarnings
        } else {
            VerificationStatus::Valid
        };
        Ok(result)
    }

    /// Check if a certificate is in the trusted set.
    pub fn is_certificate_trusted(&self, cert_der: &[u8]) -> bool {
        self.trusted_certificates.iter().any(|t| t == cert_der)
    }

    fn describe_certificate(&self, cert_der: &[u8], result: &mut VerificationResult) {
        result.certificate_trusted = self.is_certificate_trusted(cert_der);
        match x509_parser::parse_x509_certificate(cert_der) {
            Ok((_, cert)) => {
                let info = &mut result.signature_info;
                info.certificate_cn = cert
                    .subject()
                    .iter_common_name()
                    .next()
                    .and_then(|cn| cn.as_str().ok())
                    .map(str::to_string);
                info.certificate_issuer = Some(cert.issuer().to_string());
                info.valid_from = Some(cert.validity().not_before.to_string());
                info.valid_to = Some(cert.validity().not_after.to_string());
                result.certificate_expired = !cert.validity().is_valid();
            },
            Err(e) => result.messages.push(format!("unparseable signer certificate: {}", e)),
        }
    }
}

fn check_cms(contents: &[u8], digest: &[u8]) -> Result<CmsCheck> {
    // The hex gap is zero-padded past the DER value.
    let mut reader = SliceReader::new(contents)?;
    let content_info = ContentInfo::decode(&mut reader)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(Error::Crypto(format!(
            "content type {} is not signedData",
            content_info.content_type
        )));
    }
    let signed_data = SignedData::from_der(&content_info.content.to_der()?)?;
    let signer_info = signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .ok_or_else(|| Error::Crypto("SignedData has no signer".to_string()))?;
    let signed_attrs = signer_info
        .signed_attrs
        .as_ref()
        .ok_or_else(|| Error::Crypto("signer has no signed attributes".to_string()))?;

    let message_digest = signed_attrs
        .iter()
        .find(|attr| attr.oid == ID_MESSAGE_DIGEST)
        .and_then(|attr| attr.values.iter().next())
        .ok_or_else(|| Error::Crypto("messageDigest attribute missing".to_string()))?;
    let message_digest = OctetString::from_der(&message_digest.to_der()?)?;
    let digest_valid = message_digest.as_bytes() == digest;

    let certificate = signed_data.certificates.as_ref().and_then(|set| {
        set.0.iter().find_map(|choice| match choice {
            CertificateChoices::Certificate(cert) if identifies(signer_info, cert) => Some(cert),
            _ => None,
        })
    });

    let signature_valid = match certificate {
        Some(cert) => {
            let spki_der = cert.tbs_certificate.subject_public_key_info.to_der()?;
            let public_key = RsaPublicKey::from_public_key_der(&spki_der)?;
            let signature = Signature::try_from(signer_info.signature.as_bytes())?;
            VerifyingKey::<Sha256>::new(public_key)
                .verify(&signed_attrs.to_der()?, &signature)
                .is_ok()
        },
        None => false,
    };

    Ok(CmsCheck {
        digest_valid,
        signature_valid,
        certificate_der: certificate.map(|c| c.to_der()).transpose()?,
    })
}

fn identifies(signer: &SignerInfo, cert: &Certificate) -> bool {
    match &signer.sid {
        SignerIdentifier::IssuerAndSerialNumber(id) => {
            id.serial_number == cert.tbs_certificate.serial_number
                && id.issuer == cert.tbs_certificate.issuer
        },
        SignerIdentifier::SubjectKeyIdentifier(_) => false,
    }
}
