//! Two-party signing workflows.
//!
//! ## Architecture
//!
//! ```text
//! WorkflowService
//!   ├── WorkflowRepository (records, compare-and-set on status)
//!   ├── DocumentStore      (full save at preparation, append-only afterwards)
//!   ├── PreparationEngine  (CREATED -> SIGNER_A_PENDING)
//!   └── SigningEngine      (SIGNER_A_PENDING -> SIGNER_B_PENDING -> COMPLETED)
//! ```

mod model;
mod service;
mod state;
mod store;

pub use model::{document_handle, FieldSpec, SignerRole, Workflow, WorkflowId, WorkflowStatus};
pub use service::WorkflowService;
pub use state::{after_signature, ensure_turn, Transition};
pub use store::{
    ensure_extends, write_atomic, DocumentStore, FsDocumentStore, FsWorkflowRepository,
    InMemoryDocumentStore, InMemoryWorkflowRepository, WorkflowRepository,
};
