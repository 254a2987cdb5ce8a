//! Workflow domain types
//!
//! This module contains:
//! - `template` - Immutable workflow template definitions
//! - `execution` - Runtime execution and step state
//! - `loader` - YAML template loader

pub mod execution;
pub mod loader;
pub mod template;

pub use execution::{
    Comment, Decision, ExecutionMetadata, ExecutionStatus, Priority, StepExecution, StepStatus,
    WorkflowExecution,
};
pub use loader::{LoadError, TemplateLoader};
pub use template::{
    ActionDef, ActionKind, AssigneeRef, Condition, ConditionOperator, LogicalOperator, StepKind,
    StepSettings, StepTemplate, TemplateError, TemplateSettings, TimeoutAction, TimeoutPolicy,
    WorkflowTemplate,
};
