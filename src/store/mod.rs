//! Persistence and collaborator contracts
//!
//! The engine owns no storage of its own. Everything it reads or writes goes
//! through the repository traits here, and everything it asks of the outside
//! world (identity expansion, submission data, notification delivery) goes
//! through the collaborator traits. `memory` provides in-process
//! implementations for tests and embedded hosts.

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;

use crate::model::{Comment, WorkflowExecution, WorkflowTemplate};

/// Flat field snapshot of the submission under review
pub type DataSnapshot = HashMap<String, serde_json::Value>;

/// Guard serializing all mutations of one execution. Held across the full
/// read-decide-write sequence of a decision or sweep.
pub type ExecutionLock = OwnedMutexGuard<()>;

/// Persistence failures. Fatal to the current operation; the engine never
/// retries its own writes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("write conflict on {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Failures from external collaborators. Logged by the engine, never allowed
/// to fail a state transition.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("unknown group: {0}")]
    UnknownGroup(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("{0}")]
    Other(String),
}

// ============================================================================
// Repositories
// ============================================================================

/// Read/write access to workflow templates, scoped by tenant
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get(
        &self,
        tenant_id: &str,
        template_id: &str,
    ) -> Result<Option<WorkflowTemplate>, StoreError>;

    async fn put(&self, template: WorkflowTemplate) -> Result<(), StoreError>;
}

/// Read/write access to workflow executions
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn insert(&self, execution: WorkflowExecution) -> Result<(), StoreError>;

    async fn get(&self, execution_id: &str) -> Result<Option<WorkflowExecution>, StoreError>;

    async fn update(&self, execution: &WorkflowExecution) -> Result<(), StoreError>;

    /// Executions that have not reached a terminal status. The sweeper scans
    /// these for expired steps.
    async fn list_active(&self) -> Result<Vec<WorkflowExecution>, StoreError>;

    /// Acquire the per-execution lock. Backends may implement this as an
    /// in-process mutex, a database row lock, or an optimistic version
    /// column; the contract is that two holders never interleave
    /// read-decide-write on the same execution.
    async fn lock(&self, execution_id: &str) -> ExecutionLock;
}

/// Append-only comment storage
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn append(&self, comment: Comment) -> Result<(), StoreError>;

    async fn for_execution(&self, execution_id: &str) -> Result<Vec<Comment>, StoreError>;
}

// ============================================================================
// Collaborators
// ============================================================================

/// Expands role and group references into concrete user IDs
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn members_of_role(
        &self,
        tenant_id: &str,
        role: &str,
    ) -> Result<Vec<String>, CollaboratorError>;

    async fn members_of_group(
        &self,
        tenant_id: &str,
        group: &str,
    ) -> Result<Vec<String>, CollaboratorError>;
}

/// Access to the submission being reviewed
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    /// Fetch the submission's field values for condition evaluation.
    /// `Ok(None)` means the submission does not exist.
    async fn fetch_fields(
        &self,
        tenant_id: &str,
        submission_id: &str,
    ) -> Result<Option<DataSnapshot>, CollaboratorError>;

    /// Write a field back onto the submission (update_field action)
    async fn update_field(
        &self,
        tenant_id: &str,
        submission_id: &str,
        field: &str,
        value: serde_json::Value,
    ) -> Result<(), CollaboratorError>;

    /// Create a follow-up task (create_task action)
    async fn create_task(
        &self,
        tenant_id: &str,
        title: &str,
        assignee: Option<&str>,
    ) -> Result<(), CollaboratorError>;

    /// Assign a user to the submission (assign_user action)
    async fn assign_user(
        &self,
        tenant_id: &str,
        submission_id: &str,
        user_id: &str,
        role: Option<&str>,
    ) -> Result<(), CollaboratorError>;
}

/// A message handed to the external notification dispatcher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    /// User IDs to deliver to
    pub recipients: Vec<String>,

    /// Short subject line
    pub subject: String,

    /// Message body
    pub body: String,

    /// Execution the message is about
    pub execution_id: String,

    /// Step the message is about, when step-scoped
    pub step_id: Option<String>,
}

/// Fire-and-forget delivery of notifications
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn deliver(&self, notification: Notification) -> Result<(), CollaboratorError>;
}
