//! # Reviewflow
//!
//! A template-driven workflow orchestration engine for multi-step review
//! and approval, with conditional step applicability, dynamically resolved
//! assignees, and timeout-driven escalation.
//!
//! ## Features
//!
//! - **Declarative YAML templates** - Define review processes as ordered
//!   step lists with conditions, assignees, actions, and timeout policies
//! - **Sequential scheduling** - Steps activate strictly in template order;
//!   steps whose conditions are false are skipped silently
//! - **Decision protocol** - One decision per step with a deterministic
//!   compare-and-swap guard against concurrent deciders
//! - **Timeout sweeping** - Expired steps escalate, auto-decide, or remind
//!   on a periodic sweep
//! - **Pluggable collaborators** - Storage, identity, submission data, and
//!   notification delivery are injected trait objects
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use reviewflow::model::{Decision, Priority, TemplateLoader};
//! use reviewflow::store::memory::{
//!     MemoryCommentStore, MemoryExecutionStore, MemorySubmissionSource, MemoryTemplateStore,
//!     RecordingDispatcher, StaticIdentityResolver,
//! };
//! use reviewflow::store::TemplateStore;
//! use reviewflow::{DecisionRequest, StartRequest, WorkflowEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let templates = Arc::new(MemoryTemplateStore::new());
//!     let template = TemplateLoader::load_file(std::path::Path::new("templates/file-qc.yaml"))?;
//!     templates.put(template).await?;
//!
//!     let submissions = Arc::new(MemorySubmissionSource::new());
//!     let engine = WorkflowEngine::new(
//!         templates,
//!         Arc::new(MemoryExecutionStore::new()),
//!         Arc::new(MemoryCommentStore::new()),
//!         Arc::new(StaticIdentityResolver::new().with_role("qc_reviewer", &["bob"])),
//!         submissions,
//!         Arc::new(RecordingDispatcher::new()),
//!     );
//!
//!     let execution_id = engine
//!         .start_workflow(StartRequest {
//!             tenant_id: "acme".into(),
//!             template_id: "file-qc".into(),
//!             submission_id: "file-42".into(),
//!             submitted_by: "alice".into(),
//!             priority: Priority::Normal,
//!         })
//!         .await?;
//!
//!     engine
//!         .process_step(DecisionRequest {
//!             execution_id: execution_id.clone(),
//!             step_id: "qc".into(),
//!             user_id: "bob".into(),
//!             decision: Decision::Approve,
//!             comment: Some("looks good".into()),
//!             attachments: vec![],
//!         })
//!         .await?;
//!
//!     let view = engine.get_execution(&execution_id).await?;
//!     println!("status: {:?}", view.execution.status);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod model;
pub mod store;

// Re-export main types
pub use engine::{
    ActionHandler, ActionRegistry, Clock, CommentRequest, DecisionRequest, EngineError,
    ExecutionView, StartRequest, SweepAction, SweepOutcome, TimeoutSweeper, WorkflowEngine,
    SYSTEM_ACTOR,
};
pub use model::{
    ActionDef, AssigneeRef, Comment, Condition, ConditionOperator, Decision, ExecutionStatus,
    LoadError, LogicalOperator, Priority, StepExecution, StepKind, StepStatus, StepTemplate,
    TemplateLoader, TimeoutAction, TimeoutPolicy, WorkflowExecution, WorkflowTemplate,
};
pub use store::{
    CollaboratorError, CommentStore, DataSnapshot, ExecutionStore, IdentityResolver, Notification,
    NotificationDispatcher, StoreError, SubmissionSource, TemplateStore,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::engine::{
        CommentRequest, DecisionRequest, EngineError, ExecutionView, StartRequest, SweepAction,
        TimeoutSweeper, WorkflowEngine, SYSTEM_ACTOR,
    };
    pub use crate::model::{
        ActionDef, AssigneeRef, Condition, ConditionOperator, Decision, ExecutionStatus,
        LogicalOperator, Priority, StepKind, StepStatus, StepTemplate, TemplateLoader,
        TimeoutAction, TimeoutPolicy, WorkflowExecution, WorkflowTemplate,
    };
    pub use crate::store::{
        CommentStore, DataSnapshot, ExecutionStore, IdentityResolver, Notification,
        NotificationDispatcher, SubmissionSource, TemplateStore,
    };
}
