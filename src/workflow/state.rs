//! Workflow status transitions.
//!
//! ```text
//! CREATED --prepared--> SIGNER_A_PENDING --A signs--> SIGNER_B_PENDING --B signs--> COMPLETED
//! ```
//!
//! Status never moves backwards and `COMPLETED` is terminal.

use super::model::{SignerRole, WorkflowId, WorkflowStatus};
use crate::error::{Error, Result};

/// Event that moves a workflow forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The document was prepared
    Prepared,
    /// A signer applied their signature
    Signed(SignerRole),
}

impl WorkflowStatus {
    /// Status after `transition`, or `None` if it is not allowed here.
    pub fn apply(self, transition: Transition) -> Option<WorkflowStatus> {
        match (self, transition) {
            (WorkflowStatus::Created, Transition::Prepared) => Some(WorkflowStatus::SignerAPending),
            (WorkflowStatus::SignerAPending, Transition::Signed(SignerRole::A)) => {
                Some(WorkflowStatus::SignerBPending)
            },
            (WorkflowStatus::SignerBPending, Transition::Signed(SignerRole::B)) => {
                Some(WorkflowStatus::Completed)
            },
            _ => None,
        }
    }

    /// Position in the forward order of reachable states.
    pub fn rank(self) -> u8 {
        match self {
            WorkflowStatus::Created => 0,
            WorkflowStatus::SignerAPending => 1,
            WorkflowStatus::SignerASigned => 2,
            WorkflowStatus::SignerBPending => 3,
            WorkflowStatus::SignerBSigned => 4,
            WorkflowStatus::Completed => 5,
        }
    }
}

/// Check that `role` may sign a workflow in `status`.
///
/// A role whose turn has already passed gets [`Error::AlreadySigned`];
/// a role whose turn has not come yet gets [`Error::OutOfTurn`].
pub fn ensure_turn(workflow_id: WorkflowId, status: WorkflowStatus, role: SignerRole) -> Result<()> {
    let expected = role.pending_status();
    if status == expected {
        Ok(())
    } else if status.rank() > expected.rank() {
        Err(Error::AlreadySigned(role.signature_field().to_string()))
    } else {
        Err(Error::OutOfTurn {
            workflow_id,
            role,
            expected,
            actual: status,
        })
    }
}

/// Status after `role` signs a workflow in `status`.
pub fn after_signature(
    workflow_id: WorkflowId,
    status: WorkflowStatus,
    role: SignerRole,
) -> Result<WorkflowStatus> {
    ensure_turn(workflow_id, status, role)?;
    status
        .apply(Transition::Signed(role))
        .ok_or(Error::OutOfTurn {
            workflow_id,
            role,
            expected: role.pending_status(),
            actual: status,
        })
}
