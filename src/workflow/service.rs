//! Workflow orchestration: storage, turn order and per-workflow exclusion.
//!
//! Every operation that touches one workflow's document runs under that
//! workflow's mutex, so two signing rounds (or a round and a preparation)
//! never interleave their appends. Different workflows proceed in parallel.

use super::model::{FieldSpec, SignerRole, Workflow, WorkflowId, WorkflowStatus};
use super::state::{after_signature, ensure_turn, Transition};
use super::store::{DocumentStore, WorkflowRepository};
use crate::config::CosignConfig;
use crate::error::{Error, Result};
use crate::identity::IdentityProvider;
use crate::preparation::PreparationEngine;
use crate::signatures::{SignatureVerifier, VerificationResult};
use crate::signing::SigningEngine;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Runs workflows against a document store and a record store.
pub struct WorkflowService {
    documents: Arc<dyn DocumentStore>,
    workflows: Arc<dyn WorkflowRepository>,
    preparation: PreparationEngine,
    signing: SigningEngine,
    locks: DashMap<WorkflowId, Arc<Mutex<()>>>,
}

impl WorkflowService {
    /// Assemble a service from its parts.
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        workflows: Arc<dyn WorkflowRepository>,
        preparation: PreparationEngine,
        signing: SigningEngine,
    ) -> Self {
        Self {
            documents,
            workflows,
            preparation,
            signing,
            locks: DashMap::new(),
        }
    }

    /// Build engines from `config` around existing identities and stores.
    pub fn from_config(
        config: &CosignConfig,
        identities: Arc<IdentityProvider>,
        documents: Arc<dyn DocumentStore>,
        workflows: Arc<dyn WorkflowRepository>,
    ) -> Self {
        Self::new(
            documents,
            workflows,
            PreparationEngine::new(config.preparation.clone()),
            SigningEngine::new(identities, config.signing.clone()),
        )
    }

    fn lock(&self, id: WorkflowId) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }

    /// Create a workflow for `document` and prepare it.
    ///
    /// The record is stored as `CREATED` with the original bytes before
    /// preparation runs. If preparation fails the record stays `CREATED` and
    /// the error is returned.
    pub fn create_workflow(
        &self,
        filename: &str,
        document: &[u8],
        fields: Vec<FieldSpec>,
    ) -> Result<Workflow> {
        let mut workflow = Workflow::new(filename, fields);
        let lock = self.lock(workflow.id);
        let _guard = lock.lock();

        self.workflows.insert(&workflow)?;
        self.documents.save(workflow.id, document)?;
        log::info!("workflow {} created for '{}'", workflow.id, filename);

        let prepared = match self.preparation.prepare(document, &workflow.fields) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("workflow {} left at {}: preparation failed: {}", workflow.id, workflow.status, e);
                return Err(e);
            },
        };
        self.documents.save(workflow.id, &prepared)?;

        let previous = workflow.status;
        let committed = previous
            .apply(Transition::Prepared)
            .ok_or(Error::OutOfTurn {
                workflow_id: workflow.id,
                role: SignerRole::A,
                expected: WorkflowStatus::Created,
                actual: previous,
            })
            .and_then(|next| {
                workflow.status = next;
                workflow.touch();
                self.commit(&workflow, previous, SignerRole::A)
            });
        if let Err(e) = committed {
            self.restore_document(workflow.id, document);
            return Err(e);
        }
        log::info!("workflow {} -> {}", workflow.id, workflow.status);
        Ok(workflow)
    }

    /// Fetch a workflow record.
    pub fn get_workflow(&self, id: WorkflowId) -> Result<Workflow> {
        self.workflows.get(id)
    }

    /// All workflow records, oldest first.
    pub fn list_workflows(&self) -> Result<Vec<Workflow>> {
        self.workflows.list()
    }

    /// Apply `role`'s values, locks and signature.
    ///
    /// Fails with [`Error::OutOfTurn`] when `role`'s turn has not come and
    /// [`Error::AlreadySigned`] when it has passed. On any failure the
    /// document and the record are left as they were: a revision stored
    /// before the record update failed is replaced by the previous bytes.
    /// The workflow's lock entry is dropped once it completes.
    pub fn sign_workflow(
        &self,
        id: WorkflowId,
        role: SignerRole,
        values: &BTreeMap<String, String>,
        fields_to_lock: &BTreeSet<String>,
    ) -> Result<Workflow> {
        let lock = self.lock(id);
        let _guard = lock.lock();

        let mut workflow = match self.workflows.get(id) {
            Ok(workflow) => workflow,
            Err(e) => {
                self.locks.remove(&id);
                return Err(e);
            },
        };
        if let Err(e) = ensure_turn(id, workflow.status, role) {
            if workflow.status.is_terminal() {
                self.locks.remove(&id);
            }
            return Err(e);
        }

        let current = self.documents.load(id)?;
        let signed = self.signing.sign(&current, role, values, fields_to_lock)?;
        self.documents.save_incremental(id, &signed.bytes)?;

        let previous = workflow.status;
        let committed = after_signature(id, previous, role).and_then(|next| {
            workflow.status = next;
            workflow.record_values(&signed.applied);
            workflow.signatures.push(signed.signature);
            workflow.touch();
            self.commit(&workflow, previous, role)
        });
        if let Err(e) = committed {
            self.restore_document(id, &current);
            return Err(e);
        }
        if workflow.status.is_terminal() {
            self.locks.remove(&id);
        }

        log::info!(
            "workflow {}: signer {} signed ({} -> {} bytes), now {}",
            id,
            role,
            current.len(),
            signed.bytes.len(),
            workflow.status
        );
        Ok(workflow)
    }

    /// Current document bytes.
    pub fn download_document(&self, id: WorkflowId) -> Result<Vec<u8>> {
        self.workflows.get(id)?;
        self.documents.load(id)
    }

    /// Verify the stored document's signatures against this service's
    /// signer certificates.
    pub fn verify_workflow(&self, id: WorkflowId) -> Result<Vec<VerificationResult>> {
        let document = self.download_document(id)?;
        let mut verifier = SignatureVerifier::new();
        verifier.add_trusted_certificates(self.signing.identities().certificates_der()?);
        verifier.verify_document(&document)
    }

    /// Put back the bytes a failed round replaced.
    fn restore_document(&self, id: WorkflowId, bytes: &[u8]) {
        match self.documents.save(id, bytes) {
            Ok(()) => log::warn!("workflow {}: record not updated, document restored", id),
            Err(e) => log::error!("workflow {}: restoring document failed: {}", id, e),
        }
    }

    fn commit(&self, workflow: &Workflow, expected: WorkflowStatus, role: SignerRole) -> Result<()> {
        if self.workflows.update_if(workflow, expected)? {
            Ok(())
        } else {
            let actual = self.workflows.get(workflow.id)?.status;
            log::error!(
                "workflow {} changed status to {} outside its lock",
                workflow.id,
                actual
            );
            Err(Error::OutOfTurn {
                workflow_id: workflow.id,
                role,
                expected,
                actual,
            })
        }
    }
}

impl std::fmt::Debug for WorkflowService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowService")
            .field("preparation", &self.preparation)
            .field("signing", &self.signing)
            .field("active_locks", &self.locks.len())
            .finish()
    }
}
