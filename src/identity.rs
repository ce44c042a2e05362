//! Signing identities for the two signer roles.
//!
//! An [`IdentityProvider`] is built once and then only read: the signing
//! engine holds it behind an `Arc` and looks identities up by role. Keys are
//! either generated with self-signed certificates or loaded from PEM files.

use crate::config::IdentityConfig;
use crate::error::{Error, Result};
use crate::signatures::SigningCredentials;
use crate::workflow::SignerRole;
use der::asn1::{Any, BitString, ObjectIdentifier};
use der::{Decode, Encode, Tag};
use rand::RngCore;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::RsaPrivateKey;
use sha2::Sha256;
use signature::{SignatureEncoding, Signer};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use x509_cert::certificate::{TbsCertificate, Version};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Validity;
use x509_cert::Certificate;

const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

/// Key material bound to one signer role.
#[derive(Debug, Clone)]
pub struct SigningIdentity {
    /// Role this identity signs for
    pub role: SignerRole,
    /// Certificate and private key
    pub credentials: SigningCredentials,
}

impl SigningIdentity {
    /// Certificate subject as an RFC 4514 string.
    pub fn subject(&self) -> String {
        self.credentials.certificate.tbs_certificate.subject.to_string()
    }
}

/// Read-only table of one identity per role.
#[derive(Debug, Clone)]
pub struct IdentityProvider {
    identities: HashMap<SignerRole, SigningIdentity>,
}

impl IdentityProvider {
    /// Generate a fresh RSA key and self-signed certificate for every role.
    pub fn generate(config: &IdentityConfig) -> Result<Self> {
        let mut identities = HashMap::new();
        for role in SignerRole::ALL {
            identities.insert(role, generate_identity(role, config)?);
        }
        Ok(Self { identities })
    }

    /// Build from PEM certificate and PKCS#8 key pairs. Every role must be
    /// supplied.
    pub fn from_pem<'a>(pairs: impl IntoIterator<Item = (SignerRole, &'a str, &'a str)>) -> Result<Self> {
        let mut identities = HashMap::new();
        for (role, cert_pem, key_pem) in pairs {
            let credentials = SigningCredentials::from_pem(cert_pem, key_pem)?;
            identities.insert(role, SigningIdentity { role, credentials });
        }
        let provider = Self { identities };
        for role in SignerRole::ALL {
            provider.identity(role)?;
        }
        Ok(provider)
    }

    /// Load the persisted roles named in the config and generate the rest.
    pub fn from_config(config: &IdentityConfig) -> Result<Self> {
        let mut identities = HashMap::new();
        for role in SignerRole::ALL {
            let identity = match config.persisted.get(&role) {
                Some(paths) => {
                    let cert_pem = std::fs::read_to_string(&paths.certificate)?;
                    let key_pem = std::fs::read_to_string(&paths.private_key)?;
                    log::info!(
                        "loaded signer {} identity from {}",
                        role,
                        paths.certificate.display()
                    );
                    SigningIdentity {
                        role,
                        credentials: SigningCredentials::from_pem(&cert_pem, &key_pem)?,
                    }
                },
                None => generate_identity(role, config)?,
            };
            identities.insert(role, identity);
        }
        Ok(Self { identities })
    }

    /// The identity for `role`.
    pub fn identity(&self, role: SignerRole) -> Result<&SigningIdentity> {
        self.identities.get(&role).ok_or(Error::MissingIdentity(role))
    }

    /// DER certificates of every role, for building a verifier trust list.
    pub fn certificates_der(&self) -> Result<Vec<Vec<u8>>> {
        SignerRole::ALL
            .iter()
            .filter_map(|role| self.identities.get(role))
            .map(|identity| identity.credentials.certificate_der())
            .collect()
    }
}

fn generate_identity(role: SignerRole, config: &IdentityConfig) -> Result<SigningIdentity> {
    let common_name = role.display_name();
    let credentials = self_signed(
        common_name,
        &config.organization,
        config.key_bits,
        config.validity_days,
    )?;
    log::info!(
        "generated {}-bit signing identity for signer {} valid for {} days",
        config.key_bits,
        role,
        config.validity_days
    );
    Ok(SigningIdentity { role, credentials })
}

/// Generate an RSA key and a self-signed v3 certificate for
/// `CN=<common_name>,O=<organization>`.
pub fn self_signed(
    common_name: &str,
    organization: &str,
    key_bits: usize,
    validity_days: u64,
) -> Result<SigningCredentials> {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, key_bits)?;
    let public_key_der = private_key.to_public_key().to_public_key_der()?;
    let subject_public_key_info = SubjectPublicKeyInfoOwned::from_der(public_key_der.as_bytes())?;

    let subject = Name::from_str(&format!(
        "CN={},O={}",
        escape_rdn(common_name),
        escape_rdn(organization)
    ))?;

    let mut serial = [0u8; 16];
    rng.fill_bytes(&mut serial);
    // Positive and without a leading zero octet.
    serial[0] = (serial[0] & 0x7F) | 0x01;

    let signature_algorithm = AlgorithmIdentifierOwned {
        oid: SHA256_WITH_RSA,
        parameters: Some(Any::new(Tag::Null, Vec::<u8>::new())?),
    };
    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(&serial)?,
        signature: signature_algorithm.clone(),
        issuer: subject.clone(),
        validity: Validity::from_now(Duration::from_secs(validity_days * 24 * 60 * 60))?,
        subject,
        subject_public_key_info,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: None,
    };

    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key.try_sign(&tbs_certificate.to_der()?)?;
    let certificate = Certificate {
        tbs_certificate,
        signature_algorithm,
        signature: BitString::from_bytes(&signature.to_vec())?,
    };

    Ok(SigningCredentials::new(certificate, private_key))
}

fn escape_rdn(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> IdentityConfig {
        IdentityConfig::default().with_key_bits(1024)
    }

    #[test]
    fn test_generate_one_identity_per_role() {
        let provider = IdentityProvider::generate(&test_config()).unwrap();
        let a = provider.identity(SignerRole::A).unwrap();
        let b = provider.identity(SignerRole::B).unwrap();
        assert_eq!(a.role, SignerRole::A);
        assert!(a.subject().contains("Signer A"));
        assert!(b.subject().contains("Signer B"));
        assert_ne!(
            a.credentials.certificate.tbs_certificate.serial_number,
            b.credentials.certificate.tbs_certificate.serial_number
        );
        assert_eq!(provider.certificates_der().unwrap().len(), 2);
    }

    #[test]
    fn test_certificate_is_parseable_and_current() {
        let creds = self_signed("Alice Example", "Acme", 1024, 365).unwrap();
        let der = creds.certificate_der().unwrap();
        let (_, cert) = x509_parser::parse_x509_certificate(&der).unwrap();
        let cn = cert.subject().iter_common_name().next().unwrap().as_str().unwrap();
        assert_eq!(cn, "Alice Example");
        assert!(cert.validity().is_valid());
        assert_eq!(cert.subject().to_string(), cert.issuer().to_string());
    }

    #[test]
    fn test_pem_roundtrip_through_provider() {
        let generated = IdentityProvider::generate(&test_config()).unwrap();
        let pems: Vec<(SignerRole, String, String)> = SignerRole::ALL
            .iter()
            .map(|&role| {
                let (cert, key) = generated.identity(role).unwrap().credentials.to_pem().unwrap();
                (role, cert, key)
            })
            .collect();

        let loaded =
            IdentityProvider::from_pem(pems.iter().map(|(r, c, k)| (*r, c.as_str(), k.as_str())))
                .unwrap();
        assert_eq!(
            loaded.certificates_der().unwrap(),
            generated.certificates_der().unwrap()
        );
    }

    #[test]
    fn test_from_pem_requires_both_roles() {
        let generated = IdentityProvider::generate(&test_config()).unwrap();
        let (cert, key) = generated.identity(SignerRole::A).unwrap().credentials.to_pem().unwrap();
        let err = IdentityProvider::from_pem([(SignerRole::A, cert.as_str(), key.as_str())]).unwrap_err();
        assert!(matches!(err, Error::MissingIdentity(SignerRole::B)));
    }
}
