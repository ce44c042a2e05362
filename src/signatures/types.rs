//! Key material, signing options and verification reports.

use crate::error::{Error, Result};
use der::pem::LineEnding;
use der::{DecodePem, Encode, EncodePem};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::RsaPrivateKey;
use x509_cert::Certificate;

/// `/SubFilter` of a signature dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureSubFilter {
    /// `adbe.pkcs7.detached`
    #[default]
    Pkcs7Detached,
    /// `ETSI.CAdES.detached`
    CadesDetached,
}

impl SignatureSubFilter {
    /// Name written after `/SubFilter`.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
        }
    }

    /// Recognise a `/SubFilter` name. Legacy formats yield `None`.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        [SignatureSubFilter::Pkcs7Detached, SignatureSubFilter::CadesDetached]
            .into_iter()
            .find(|sf| sf.as_pdf_name() == name)
    }
}

/// A certificate, its RSA key and any intermediates.
#[derive(Clone)]
pub struct SigningCredentials {
    /// End-entity certificate embedded in every signature
    pub certificate: Certificate,
    /// Key matching `certificate`
    pub private_key: RsaPrivateKey,
    /// Intermediates, embedded after the end-entity certificate
    pub chain: Vec<Certificate>,
}

impl SigningCredentials {
    /// Pair a certificate with its key.
    pub fn new(certificate: Certificate, private_key: RsaPrivateKey) -> Self {
        Self {
            certificate,
            private_key,
            chain: Vec::new(),
        }
    }

    /// Attach intermediates.
    pub fn with_chain(mut self, chain: Vec<Certificate>) -> Self {
        self.chain = chain;
        self
    }

    /// Parse a PEM certificate and a PKCS#8 PEM key.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        let certificate = Certificate::from_pem(cert_pem.as_bytes())?;
        let private_key = RsaPrivateKey::from_pkcs8_pem(key_pem)?;
        Ok(Self::new(certificate, private_key))
    }

    /// `(certificate, key)` PEM texts accepted by [`from_pem`](Self::from_pem).
    pub fn to_pem(&self) -> Result<(String, String)> {
        let cert = self.certificate.to_pem(LineEnding::LF)?;
        let key = self.private_key.to_pkcs8_pem(LineEnding::LF)?;
        Ok((cert, key.to_string()))
    }

    /// DER bytes of the end-entity certificate.
    pub fn certificate_der(&self) -> Result<Vec<u8>> {
        self.certificate.to_der().map_err(Error::from)
    }

    /// End-entity certificate, then the intermediates.
    pub fn certificates(&self) -> impl Iterator<Item = &Certificate> {
        std::iter::once(&self.certificate).chain(self.chain.iter())
    }
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("subject", &self.certificate.tbs_certificate.subject.to_string())
            .field("intermediates", &self.chain.len())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Per-signature settings.
#[derive(Debug, Clone)]
pub struct SignOptions {
    /// Format advertised in `/SubFilter`
    pub sub_filter: SignatureSubFilter,
    /// `/Reason`
    pub reason: Option<String>,
    /// `/Name`
    pub name: Option<String>,
    /// Set for a certification signature: the `/P` of its DocMDP transform
    pub docmdp_permission: Option<i64>,
    /// Bytes reserved for the DER signature in `/Contents`
    pub reserved_size: usize,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            sub_filter: SignatureSubFilter::default(),
            reason: None,
            name: None,
            docmdp_permission: None,
            reserved_size: 16384,
        }
    }
}

impl SignOptions {
    /// Set `/Reason`.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set `/Name`.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Certify the document, allowing the changes permitted by `permission` (1-3).
    pub fn with_docmdp(mut self, permission: i64) -> Self {
        self.docmdp_permission = Some(permission);
        self
    }

    /// Reserve `reserved_size` bytes for the DER signature.
    pub fn with_reserved_size(mut self, reserved_size: usize) -> Self {
        self.reserved_size = reserved_size;
        self
    }
}

/// What a signature dictionary and its certificate say about a signature.
#[derive(Debug, Clone, Default)]
pub struct SignatureInfo {
    /// Signature field holding the dictionary
    pub field_name: String,
    /// `/Name`
    pub signer_name: Option<String>,
    /// Raw `/M` date string
    pub signing_time: Option<String>,
    /// `/Reason`
    pub reason: Option<String>,
    /// `/SubFilter`, when recognised
    pub sub_filter: Option<SignatureSubFilter>,
    /// ByteRange ends at the end of the file
    pub covers_whole_document: bool,
    /// `/ByteRange` as stored
    pub byte_range: Vec<i64>,
    /// `/P` of a DocMDP reference, for certification signatures
    pub docmdp_permission: Option<i64>,
    /// Signer certificate common name
    pub certificate_cn: Option<String>,
    /// Signer certificate issuer
    pub certificate_issuer: Option<String>,
    /// Certificate notBefore
    pub valid_from: Option<String>,
    /// Certificate notAfter
    pub valid_to: Option<String>,
}

/// Outcome of checking one signature.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Verdict
    pub status: VerificationStatus,
    /// Dictionary and certificate details
    pub signature_info: SignatureInfo,
    /// Human-readable findings, one per problem or warning
    pub messages: Vec<String>,
    /// Revisions were appended after the signed one
    pub document_modified: bool,
    /// SHA-256 of the signed bytes equals the signed `messageDigest`
    pub digest_valid: bool,
    /// RSA signature over the signed attributes checks out
    pub signature_valid: bool,
    /// Signer certificate is one the verifier was told to trust
    pub certificate_trusted: bool,
    /// Signer certificate is past notAfter
    pub certificate_expired: bool,
}

impl Default for VerificationResult {
    fn default() -> Self {
        Self {
            status: VerificationStatus::Unknown,
            signature_info: SignatureInfo::default(),
            messages: Vec::new(),
            document_modified: false,
            digest_valid: false,
            signature_valid: false,
            certificate_trusted: false,
            certificate_expired: false,
        }
    }
}

/// Verdict for one signature.
///
/// Checks apply in order: a broken digest or signature is `Invalid`, an
/// untrusted signer is `Unknown`, later revisions or an expired certificate
/// give `ValidWithWarnings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Intact, trusted and covering the whole file
    Valid,
    /// Intact and trusted, with warnings in the messages
    ValidWithWarnings,
    /// Intact, but the signer is not trusted
    Unknown,
    /// Digest or signature mismatch
    Invalid,
}

impl VerificationStatus {
    /// `Valid` only.
    pub fn is_valid(&self) -> bool {
        *self == VerificationStatus::Valid
    }

    /// `Valid` or `ValidWithWarnings`.
    pub fn is_ok(&self) -> bool {
        matches!(self, VerificationStatus::Valid | VerificationStatus::ValidWithWarnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_filter_round_trip_and_legacy() {
        for sf in [SignatureSubFilter::Pkcs7Detached, SignatureSubFilter::CadesDetached] {
            assert_eq!(SignatureSubFilter::from_pdf_name(sf.as_pdf_name()), Some(sf));
        }
        assert_eq!(SignatureSubFilter::from_pdf_name("adbe.x509.rsa_sha1"), None);
    }

    #[test]
    fn test_options() {
        let plain = SignOptions::default();
        assert_eq!(plain.reserved_size, 16384);
        assert!(plain.reason.is_none() && plain.docmdp_permission.is_none());

        let certifying = SignOptions::default()
            .with_name("Signer A")
            .with_reason("Approval")
            .with_docmdp(2)
            .with_reserved_size(4096);
        assert_eq!(certifying.name.as_deref(), Some("Signer A"));
        assert_eq!(certifying.reason.as_deref(), Some("Approval"));
        assert_eq!(certifying.docmdp_permission, Some(2));
        assert_eq!(certifying.reserved_size, 4096);
    }

    #[test]
    fn test_status_predicates() {
        use VerificationStatus::*;
        let ok: Vec<bool> = [Valid, ValidWithWarnings, Unknown, Invalid].iter().map(|s| s.is_ok()).collect();
        assert_eq!(ok, vec![true, true, false, false]);
        assert!(Valid.is_valid());
        assert!(!ValidWithWarnings.is_valid());
    }

    #[test]
    fn test_from_pem_rejects_garbage() {
        let err = SigningCredentials::from_pem("not a certificate", "not a key").unwrap_err();
        assert!(matches!(err, Error::Crypto(_)));
    }
}
