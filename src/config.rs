//! Configuration for preparation, signing and identities.
//!
//! Every struct deserializes from JSON with all fields optional, so a config
//! file only needs the values it changes.

use crate::error::Result;
use crate::workflow::SignerRole;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// What to do with a submitted value or lock that names no form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFieldPolicy {
    /// Log a warning and carry on
    #[default]
    Ignore,
    /// Fail with `Error::UnknownField`
    Reject,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CosignConfig {
    /// Signing engine settings
    pub signing: SigningConfig,
    /// Identity provider settings
    pub identity: IdentityConfig,
    /// Preparation engine settings
    pub preparation: PreparationConfig,
}

impl CosignConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Set the signing settings.
    pub fn with_signing(mut self, signing: SigningConfig) -> Self {
        self.signing = signing;
        self
    }

    /// Set the identity settings.
    pub fn with_identity(mut self, identity: IdentityConfig) -> Self {
        self.identity = identity;
        self
    }

    /// Set the preparation settings.
    pub fn with_preparation(mut self, preparation: PreparationConfig) -> Self {
        self.preparation = preparation;
        self
    }
}

/// Signing engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Bytes reserved in `/Contents` for the DER signature
    pub reserved_signature_size: usize,
    /// `/Reason` written into every signature
    pub reason: String,
    /// Handling of values for fields the document lacks
    pub unknown_fields: UnknownFieldPolicy,
    /// DocMDP permission level granted by the first signature
    pub docmdp_permission: i64,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            reserved_signature_size: 16384,
            reason: "Document signature".to_string(),
            unknown_fields: UnknownFieldPolicy::Ignore,
            docmdp_permission: 2,
        }
    }
}

impl SigningConfig {
    /// Set the reserved signature size.
    pub fn with_reserved_signature_size(mut self, size: usize) -> Self {
        self.reserved_signature_size = size;
        self
    }

    /// Set the signing reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the unknown field policy.
    pub fn with_unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }
}

/// Paths of a persisted certificate and PKCS#8 key, both PEM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PemPaths {
    /// Certificate PEM
    pub certificate: PathBuf,
    /// Private key PEM
    pub private_key: PathBuf,
}

/// Identity provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// RSA modulus size for generated keys
    pub key_bits: usize,
    /// Validity window of generated certificates
    pub validity_days: u64,
    /// Organization in generated certificate subjects
    pub organization: String,
    /// Roles whose identity is loaded from disk instead of generated
    pub persisted: HashMap<SignerRole, PemPaths>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            key_bits: 2048,
            validity_days: 365,
            organization: "pdf_cosign".to_string(),
            persisted: HashMap::new(),
        }
    }
}

impl IdentityConfig {
    /// Set the RSA key size.
    pub fn with_key_bits(mut self, key_bits: usize) -> Self {
        self.key_bits = key_bits;
        self
    }

    /// Load `role`'s identity from PEM files.
    pub fn with_persisted(mut self, role: SignerRole, paths: PemPaths) -> Self {
        self.persisted.insert(role, paths);
        self
    }
}

/// Rectangle in PDF user space, lower-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotRect {
    /// Lower-left x
    pub x: f64,
    /// Lower-left y
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl SlotRect {
    /// `[llx lly urx ury]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }
}

/// Preparation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreparationConfig {
    /// Default appearance for the form and its text fields
    pub default_appearance: String,
    /// Signature bar slot of signer A (last page)
    pub signature_a: SlotRect,
    /// Signature bar slot of signer B (last page)
    pub signature_b: SlotRect,
}

impl Default for PreparationConfig {
    fn default() -> Self {
        Self {
            default_appearance: "/Helv 10 Tf 0 g".to_string(),
            signature_a: SlotRect {
                x: 20.0,
                y: 20.0,
                width: 200.0,
                height: 50.0,
            },
            signature_b: SlotRect {
                x: 230.0,
                y: 20.0,
                width: 200.0,
                height: 50.0,
            },
        }
    }
}

impl PreparationConfig {
    /// Signature slot of `role`.
    pub fn signature_rect(&self, role: SignerRole) -> [f64; 4] {
        match role {
            SignerRole::A => self.signature_a.to_array(),
            SignerRole::B => self.signature_b.to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CosignConfig::default();
        assert_eq!(config.signing.reserved_signature_size, 16384);
        assert_eq!(config.signing.docmdp_permission, 2);
        assert_eq!(config.signing.unknown_fields, UnknownFieldPolicy::Ignore);
        assert_eq!(config.identity.key_bits, 2048);
        assert_eq!(config.preparation.signature_rect(SignerRole::A), [20.0, 20.0, 220.0, 70.0]);
        assert_eq!(config.preparation.signature_rect(SignerRole::B), [230.0, 20.0, 430.0, 70.0]);
    }

    #[test]
    fn test_partial_json() {
        let config: CosignConfig = serde_json::from_str(
            r#"{"signing": {"reserved_signature_size": 8192, "unknown_fields": "reject"},
                "identity": {"persisted": {"A": {"certificate": "a.crt", "private_key": "a.key"}}}}"#,
        )
        .unwrap();
        assert_eq!(config.signing.reserved_signature_size, 8192);
        assert_eq!(config.signing.unknown_fields, UnknownFieldPolicy::Reject);
        assert_eq!(config.signing.reason, "Document signature");
        assert_eq!(
            config.identity.persisted[&SignerRole::A].certificate,
            PathBuf::from("a.crt")
        );
        assert_eq!(config.preparation.default_appearance, "/Helv 10 Tf 0 g");
    }
}
