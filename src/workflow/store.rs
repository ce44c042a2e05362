//! Document and workflow record storage.
//!
//! Two traits describe what the workflow service needs from storage; each has
//! an in-memory implementation for tests and embedding, and a directory-backed
//! one used by the `cosign` binary. Directory writes go through a temporary
//! file in the same directory followed by an atomic rename, so a reader sees
//! either the old bytes or the new ones.

use super::model::{document_handle, Workflow, WorkflowId, WorkflowStatus};
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Byte storage for workflow documents.
pub trait DocumentStore: Send + Sync {
    /// Current bytes of the workflow's document.
    fn load(&self, id: WorkflowId) -> Result<Vec<u8>>;

    /// Replace the document wholesale.
    fn save(&self, id: WorkflowId, bytes: &[u8]) -> Result<()>;

    /// Store a new revision that must extend the stored bytes.
    ///
    /// Fails with [`Error::NotAppendOnly`] unless the stored bytes are a
    /// strict prefix of `bytes`; the stored document is then left untouched.
    fn save_incremental(&self, id: WorkflowId, bytes: &[u8]) -> Result<()> {
        let current = self.load(id)?;
        ensure_extends(id, &current, bytes)?;
        self.save(id, bytes)
    }
}

/// Check that `next` is `current` followed by at least one more byte.
pub fn ensure_extends(id: WorkflowId, current: &[u8], next: &[u8]) -> Result<()> {
    if next.len() > current.len() && next.starts_with(current) {
        Ok(())
    } else {
        Err(Error::NotAppendOnly { workflow_id: id })
    }
}

/// Persistence for workflow records.
pub trait WorkflowRepository: Send + Sync {
    /// Store a new record.
    fn insert(&self, workflow: &Workflow) -> Result<()>;

    /// Fetch a record.
    fn get(&self, id: WorkflowId) -> Result<Workflow>;

    /// Replace a record if its stored status is still `expected`.
    ///
    /// Returns `false` and changes nothing when the status has moved on.
    fn update_if(&self, workflow: &Workflow, expected: WorkflowStatus) -> Result<bool>;

    /// All records, oldest first.
    fn list(&self) -> Result<Vec<Workflow>>;
}

/// Documents held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: DashMap<WorkflowId, Arc<Vec<u8>>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn load(&self, id: WorkflowId) -> Result<Vec<u8>> {
        self.documents
            .get(&id)
            .map(|doc| doc.as_ref().clone())
            .ok_or(Error::DocumentNotFound(id))
    }

    fn save(&self, id: WorkflowId, bytes: &[u8]) -> Result<()> {
        self.documents.insert(id, Arc::new(bytes.to_vec()));
        Ok(())
    }

    fn save_incremental(&self, id: WorkflowId, bytes: &[u8]) -> Result<()> {
        let mut entry = self.documents.get_mut(&id).ok_or(Error::DocumentNotFound(id))?;
        ensure_extends(id, entry.as_slice(), bytes)?;
        *entry = Arc::new(bytes.to_vec());
        Ok(())
    }
}

/// Documents stored as `<id>.pdf` files in one directory.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    /// Use `root`, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Path of a workflow's document.
    pub fn path(&self, id: WorkflowId) -> PathBuf {
        self.root.join(document_handle(id))
    }
}

impl DocumentStore for FsDocumentStore {
    fn load(&self, id: WorkflowId) -> Result<Vec<u8>> {
        match std::fs::read(self.path(id)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::DocumentNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, id: WorkflowId, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.path(id), bytes)
    }
}

/// Workflow records held in memory.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowRepository {
    workflows: DashMap<WorkflowId, Workflow>,
}

impl InMemoryWorkflowRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowRepository for InMemoryWorkflowRepository {
    fn insert(&self, workflow: &Workflow) -> Result<()> {
        self.workflows.insert(workflow.id, workflow.clone());
        Ok(())
    }

    fn get(&self, id: WorkflowId) -> Result<Workflow> {
        self.workflows
            .get(&id)
            .map(|w| w.clone())
            .ok_or(Error::WorkflowNotFound(id))
    }

    fn update_if(&self, workflow: &Workflow, expected: WorkflowStatus) -> Result<bool> {
        let mut stored = self
            .workflows
            .get_mut(&workflow.id)
            .ok_or(Error::WorkflowNotFound(workflow.id))?;
        if stored.status != expected {
            return Ok(false);
        }
        *stored = workflow.clone();
        Ok(true)
    }

    fn list(&self) -> Result<Vec<Workflow>> {
        let mut all: Vec<Workflow> = self.workflows.iter().map(|w| w.value().clone()).collect();
        all.sort_by_key(|w| w.created_at);
        Ok(all)
    }
}

/// Workflow records stored as `<id>.json` files in one directory.
///
/// `update_if` reads, compares and writes without a file lock; callers in
/// one process serialise per workflow through the service.
#[derive(Debug, Clone)]
pub struct FsWorkflowRepository {
    root: PathBuf,
}

impl FsWorkflowRepository {
    /// Use `root`, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path(&self, id: WorkflowId) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }

    fn write(&self, workflow: &Workflow) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(workflow)?;
        write_atomic(&self.path(workflow.id), &bytes)
    }
}

impl WorkflowRepository for FsWorkflowRepository {
    fn insert(&self, workflow: &Workflow) -> Result<()> {
        self.write(workflow)
    }

    fn get(&self, id: WorkflowId) -> Result<Workflow> {
        match std::fs::read(self.path(id)) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::WorkflowNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    fn update_if(&self, workflow: &Workflow, expected: WorkflowStatus) -> Result<bool> {
        if self.get(workflow.id)?.status != expected {
            return Ok(false);
        }
        self.write(workflow)?;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<Workflow>> {
        let mut all = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            match serde_json::from_slice::<Workflow>(&bytes) {
                Ok(workflow) => all.push(workflow),
                Err(e) => log::warn!("skipping unreadable record {}: {}", path.display(), e),
            }
        }
        all.sort_by_key(|w| w.created_at);
        Ok(all)
    }
}

/// Write `bytes` to `path` through a synced temporary file and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
