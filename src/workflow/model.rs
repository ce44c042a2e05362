//! Workflow records: identity, signer roles, status vocabulary and field
//! specifications.

use crate::signing::SignatureMetadata;
use crate::writer::FieldKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique workflow identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for WorkflowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One of the two signers. `A` always signs before `B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignerRole {
    /// First signer
    A,
    /// Second and last signer
    B,
}

impl SignerRole {
    /// Both roles in signing order.
    pub const ALL: [SignerRole; 2] = [SignerRole::A, SignerRole::B];

    /// Name of this role's signature placeholder field.
    pub fn signature_field(&self) -> &'static str {
        match self {
            SignerRole::A => "SignatureA",
            SignerRole::B => "SignatureB",
        }
    }

    /// Signer name written into the signature dictionary.
    pub fn display_name(&self) -> &'static str {
        match self {
            SignerRole::A => "Signer A",
            SignerRole::B => "Signer B",
        }
    }

    /// Status in which this role may sign.
    pub fn pending_status(&self) -> WorkflowStatus {
        match self {
            SignerRole::A => WorkflowStatus::SignerAPending,
            SignerRole::B => WorkflowStatus::SignerBPending,
        }
    }

    /// The role that signs after this one.
    pub fn next(&self) -> Option<SignerRole> {
        match self {
            SignerRole::A => Some(SignerRole::B),
            SignerRole::B => None,
        }
    }
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignerRole::A => "A",
            SignerRole::B => "B",
        })
    }
}

impl FromStr for SignerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(SignerRole::A),
            "B" => Ok(SignerRole::B),
            other => Err(format!("unknown signer role '{}'", other)),
        }
    }
}

/// Workflow status.
///
/// `SignerASigned` and `SignerBSigned` belong to the stored vocabulary but
/// no transition produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    /// Record exists; the document has not been prepared
    Created,
    /// Waiting for signer A
    SignerAPending,
    /// Unused
    SignerASigned,
    /// Waiting for signer B
    SignerBPending,
    /// Unused
    SignerBSigned,
    /// Both signatures applied
    Completed,
}

impl WorkflowStatus {
    /// Stored form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Created => "CREATED",
            WorkflowStatus::SignerAPending => "SIGNER_A_PENDING",
            WorkflowStatus::SignerASigned => "SIGNER_A_SIGNED",
            WorkflowStatus::SignerBPending => "SIGNER_B_PENDING",
            WorkflowStatus::SignerBSigned => "SIGNER_B_SIGNED",
            WorkflowStatus::Completed => "COMPLETED",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fillable field to add to the document, owned by one signer.
///
/// Geometry is in PDF user space with a bottom-left origin: (`x`, `y`) is
/// the lower-left corner of the widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, unique within the document
    pub name: String,
    /// Field kind
    pub kind: FieldKind,
    /// Signer who fills the field
    pub role: SignerRole,
    /// Value submitted when the owning signer signed
    #[serde(default)]
    pub value: Option<String>,
    /// Lower-left x
    pub x: f64,
    /// Lower-left y
    pub y: f64,
    /// Widget width
    pub width: f64,
    /// Widget height
    pub height: f64,
    /// Zero-based page index
    pub page: usize,
    /// Height of the page when the field was authored
    #[serde(default = "default_page_height")]
    pub page_height: f64,
}

fn default_page_height() -> f64 {
    792.0
}

impl FieldSpec {
    /// Field on `page` at a bottom-left-origin rectangle.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        kind: FieldKind,
        role: SignerRole,
        page: usize,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            role,
            value: None,
            x,
            y,
            width,
            height,
            page,
            page_height: default_page_height(),
        }
    }

    /// Field placed with a top-left origin, as an authoring UI reports it.
    #[allow(clippy::too_many_arguments)]
    pub fn from_top_left(
        name: impl Into<String>,
        kind: FieldKind,
        role: SignerRole,
        page: usize,
        left: f64,
        top: f64,
        width: f64,
        height: f64,
        page_height: f64,
    ) -> Self {
        let mut spec = Self::new(name, kind, role, page, left, page_height - top - height, width, height);
        spec.page_height = page_height;
        spec
    }

    /// Set the authoring page height.
    pub fn with_page_height(mut self, page_height: f64) -> Self {
        self.page_height = page_height;
        self
    }

    /// Widget rectangle `[llx lly urx ury]`.
    pub fn rect(&self) -> [f64; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Top-left-origin `(left, top, width, height)` for display.
    pub fn display_rect(&self) -> (f64, f64, f64, f64) {
        (self.x, self.page_height - self.y - self.height, self.width, self.height)
    }
}

/// A two-party signing workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow id
    pub id: WorkflowId,
    /// Name of the uploaded file
    pub filename: String,
    /// Handle of the stored document
    pub document: String,
    /// Current status
    pub status: WorkflowStatus,
    /// Fields in creation order
    pub fields: Vec<FieldSpec>,
    /// Applied signatures in signing order
    #[serde(default)]
    pub signatures: Vec<SignatureMetadata>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// New record in `CREATED` state.
    pub fn new(filename: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        let id = WorkflowId::new();
        let now = Utc::now();
        Self {
            id,
            filename: filename.into(),
            document: document_handle(id),
            status: WorkflowStatus::Created,
            fields,
            signatures: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Fields owned by `role`.
    pub fn fields_for(&self, role: SignerRole) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(move |f| f.role == role)
    }

    /// Record submitted values on the matching field specs.
    pub fn record_values<'a>(&mut self, values: impl IntoIterator<Item = (&'a String, &'a String)>) {
        for (name, value) in values {
            if let Some(spec) = self.fields.iter_mut().find(|f| &f.name == name) {
                spec.value = Some(value.clone());
            }
        }
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Store handle for a workflow's document.
pub fn document_handle(id: WorkflowId) -> String {
    format!("{}.pdf", id)
}
