//! Error types for the co-signing library.
//!
//! Every failure surfaces as one [`Error`] variant. Callers that need to
//! decide how to react (retry, fix input, reconfigure) should branch on
//! [`Error::category`] rather than on individual variants.

use crate::object::ObjectRef;
use crate::workflow::{SignerRole, WorkflowId, WorkflowStatus};

/// Result type alias for co-signing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed or unparseable document. Fatal, no retry.
    Structural,
    /// Operation invoked in the wrong workflow status, or the document lacks
    /// the form/placeholder the operation needs. User-correctable.
    State,
    /// Reserved signature budget exceeded. Requires reconfiguration.
    Capacity,
    /// No signing identity provisioned for a role, or unusable key material.
    Identity,
    /// Document or record persistence failed.
    Storage,
}

/// Error types that can occur while preparing, signing or tracking a document.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// File does not start with `%PDF-`
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Malformed object syntax
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Where parsing stopped
        offset: usize,
        /// What was expected there
        reason: String,
    },

    /// Neither an xref table nor an xref stream could be read
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// A reference points at no xref entry
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// An object is not of the kind its context requires
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Required kind
        expected: String,
        /// Kind present
        found: String,
    },

    /// Document is structurally unusable
    #[error("Document corrupt: {0}")]
    DocumentCorrupt(String),

    /// A stream filter failed
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported feature (encrypted input, unknown filter)
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Reference chain loops back on itself
    #[error("Circular reference detected: object {0}")]
    CircularReference(ObjectRef),

    /// A field specification cannot be applied to the document
    #[error("Invalid field specification '{field}': {reason}")]
    InvalidFieldSpec {
        /// Field name as supplied by the caller
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// The document has no interactive form
    #[error("Document has no interactive form; it must be prepared before signing")]
    MissingForm,

    /// The signature placeholder for a role is absent
    #[error("Signature field '{0}' not found in document")]
    MissingSignatureField(String),

    /// The signature placeholder already carries a value, or its signer's
    /// turn has passed
    #[error("Signature field '{0}' is already signed")]
    AlreadySigned(String),

    /// A caller-supplied value names a field the document does not have
    #[error("Unknown form field '{0}'")]
    UnknownField(String),

    /// Signing attempted out of order
    #[error("Workflow {workflow_id}: signer {role} cannot act while status is {actual} (expected {expected})")]
    OutOfTurn {
        /// Workflow being signed
        workflow_id: WorkflowId,
        /// Role that attempted to sign
        role: SignerRole,
        /// Status the role needs
        expected: WorkflowStatus,
        /// Status the workflow is in
        actual: WorkflowStatus,
    },

    /// Caller input that names no valid role, id or option
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No workflow with this id
    #[error("Workflow {0} not found")]
    WorkflowNotFound(WorkflowId),

    /// The DER signature does not fit the reserved /Contents gap
    #[error("Signature needs {required} bytes but only {reserved} are reserved")]
    CapacityExceeded {
        /// Size of the encoded signature
        required: usize,
        /// Size reserved in the document
        reserved: usize,
    },

    /// No signing identity for a role
    #[error("No signing identity provisioned for signer {0}")]
    MissingIdentity(SignerRole),

    /// Key, certificate or CMS encoding failure
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// An update would rewrite bytes that are already stored
    #[error("Update for {workflow_id} is not an append-only extension of the stored document")]
    NotAppendOnly {
        /// Workflow whose document was being replaced
        workflow_id: WorkflowId,
    },

    /// No stored document for a workflow
    #[error("No document stored for workflow {0}")]
    DocumentNotFound(WorkflowId),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidHeader(_)
            | Error::ParseError { .. }
            | Error::InvalidXref
            | Error::ObjectNotFound(..)
            | Error::InvalidObjectType { .. }
            | Error::DocumentCorrupt(_)
            | Error::Decode(_)
            | Error::Unsupported(_)
            | Error::CircularReference(_) => ErrorCategory::Structural,
            Error::InvalidFieldSpec { .. }
            | Error::MissingForm
            | Error::MissingSignatureField(_)
            | Error::AlreadySigned(_)
            | Error::UnknownField(_)
            | Error::OutOfTurn { .. }
            | Error::InvalidArgument(_)
            | Error::WorkflowNotFound(_) => ErrorCategory::State,
            Error::CapacityExceeded { .. } => ErrorCategory::Capacity,
            Error::MissingIdentity(_) | Error::Crypto(_) => ErrorCategory::Identity,
            Error::NotAppendOnly { .. }
            | Error::DocumentNotFound(_)
            | Error::Io(_)
            | Error::Json(_) => ErrorCategory::Storage,
        }
    }
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Self {
        Error::Crypto(format!("DER: {}", err))
    }
}

impl From<rsa::Error> for Error {
    fn from(err: rsa::Error) -> Self {
        Error::Crypto(format!("RSA: {}", err))
    }
}

impl From<signature::Error> for Error {
    fn from(err: signature::Error) -> Self {
        Error::Crypto(format!("signature: {}", err))
    }
}

impl From<pkcs8::Error> for Error {
    fn from(err: pkcs8::Error) -> Self {
        Error::Crypto(format!("PKCS#8: {}", err))
    }
}

impl From<spki::Error> for Error {
    fn from(err: spki::Error) -> Self {
        Error::Crypto(format!("SPKI: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message() {
        let err = Error::ParseError {
            offset: 1234,
            reason: "invalid token".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("1234"));
        assert!(msg.contains("invalid token"));
        assert_eq!(err.category(), ErrorCategory::Structural);
    }

    #[test]
    fn test_object_not_found_error() {
        let err = Error::ObjectNotFound(10, 0);
        assert!(format!("{}", err).contains("10 0 R"));
    }

    #[test]
    fn test_out_of_turn_names_both_statuses() {
        let id = WorkflowId::new();
        let err = Error::OutOfTurn {
            workflow_id: id,
            role: SignerRole::B,
            expected: WorkflowStatus::SignerBPending,
            actual: WorkflowStatus::SignerAPending,
        };
        let msg = format!("{}", err);
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("SIGNER_B_PENDING"));
        assert!(msg.contains("SIGNER_A_PENDING"));
        assert_eq!(err.category(), ErrorCategory::State);
    }

    #[test]
    fn test_capacity_category() {
        let err = Error::CapacityExceeded {
            required: 2000,
            reserved: 256,
        };
        assert_eq!(err.category(), ErrorCategory::Capacity);
        assert!(format!("{}", err).contains("256"));
    }

    #[test]
    fn test_identity_and_storage_categories() {
        assert_eq!(Error::MissingIdentity(SignerRole::A).category(), ErrorCategory::Identity);
        let io = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(io.category(), ErrorCategory::Storage);
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
