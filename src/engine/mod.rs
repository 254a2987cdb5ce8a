//! Workflow orchestration engine
//!
//! This module contains:
//! - `coordinator` - The workflow engine (start, decide, schedule, rewind)
//! - `conditions` - Condition evaluation against submission data
//! - `assignees` - Assignee reference resolution
//! - `actions` - Post-completion action registry
//! - `sweeper` - Timeout sweeping and escalation
//! - `notify` - Notification adapter
//! - `clock` - Virtual-time clock
//! - `error` - Engine error taxonomy

pub mod actions;
pub mod assignees;
pub mod clock;
pub mod conditions;
pub mod coordinator;
pub mod error;
pub mod notify;
pub mod sweeper;

pub use actions::{ActionContext, ActionHandler, ActionRegistry};
pub use assignees::AssigneeResolver;
pub use clock::Clock;
pub use conditions::evaluate_conditions;
pub use coordinator::{
    CommentRequest, DecisionRequest, ExecutionView, StartRequest, WorkflowEngine, SYSTEM_ACTOR,
};
pub use error::EngineError;
pub use notify::NotificationAdapter;
pub use sweeper::{SweepAction, SweepOutcome, TimeoutSweeper};
