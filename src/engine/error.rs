//! Engine error types
//!
//! Every public engine operation returns exactly one of these. Not-found and
//! precondition variants map to 4xx-equivalents at the host boundary; `Store`
//! is fatal to the operation and must be retried by the caller. Collaborator
//! failures (notifications, webhooks, identity expansion) are logged at the
//! call site and never surface here.

use crate::store::StoreError;

/// Errors that can occur during workflow orchestration
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template is not active: {0}")]
    TemplateInactive(String),

    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("step not found: {0}")]
    StepNotFound(String),

    #[error("submission not found: {0}")]
    SubmissionNotFound(String),

    #[error("step not in progress: {0}")]
    StepNotInProgress(String),

    #[error("user {user} is not an assignee of step {step}")]
    NotAnAssignee { user: String, step: String },

    #[error("comments are not permitted on step {0}")]
    CommentsNotAllowed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
