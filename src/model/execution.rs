//! Runtime execution state
//!
//! A `WorkflowExecution` is one running instance of a template against one
//! submission. It is created exactly once by `start_workflow` and mutated by
//! the engine until it reaches a terminal status. The step array always
//! mirrors the template's step order positionally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::template::WorkflowTemplate;

// ============================================================================
// Statuses and decisions
// ============================================================================

/// Overall status of an execution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    InProgress,
    Completed,
    Rejected,
    Cancelled,
    Expired,
}

impl ExecutionStatus {
    /// Terminal statuses are never left again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Rejected
                | ExecutionStatus::Cancelled
                | ExecutionStatus::Expired
        )
    }
}

/// Status of a single step within an execution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Approved,
    Rejected,
    Skipped,
    Expired,
}

/// A human (or system) decision on a step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
    RequestChanges,
}

/// Submission priority
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

// ============================================================================
// Execution
// ============================================================================

/// Free-form execution metadata
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionMetadata {
    /// Submission priority
    #[serde(default)]
    pub priority: Priority,

    /// Host-defined tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Estimated total review duration in hours
    pub estimated_hours: Option<f64>,

    /// Actual duration, stamped on completion
    pub actual_hours: Option<f64>,
}

/// One running instance of a template against one submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Execution identifier
    pub id: String,

    /// Template this execution was started from
    pub template_id: String,

    /// The submission under review
    pub submission_id: String,

    /// Tenant scope
    pub tenant_id: String,

    /// Overall status
    pub status: ExecutionStatus,

    /// Index of the currently active step
    pub current_step_index: usize,

    /// Per-step runtime state, one entry per template step, same order
    pub steps: Vec<StepExecution>,

    /// Who submitted the work for review
    pub submitted_by: String,

    /// When the execution was started
    pub submitted_at: DateTime<Utc>,

    /// When the execution reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,

    /// Priority, tags, and duration tracking
    #[serde(default)]
    pub metadata: ExecutionMetadata,
}

impl WorkflowExecution {
    /// Create a fresh execution for a template. Establishes the invariant
    /// that `steps.len() == template.steps.len()` with every step pending.
    pub fn new(
        template: &WorkflowTemplate,
        submission_id: &str,
        submitted_by: &str,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            template_id: template.id.clone(),
            submission_id: submission_id.to_string(),
            tenant_id: template.tenant_id.clone(),
            status: ExecutionStatus::Pending,
            current_step_index: 0,
            steps: template
                .steps
                .iter()
                .map(|s| StepExecution::new(&s.id))
                .collect(),
            submitted_by: submitted_by.to_string(),
            submitted_at: now,
            completed_at: None,
            metadata: ExecutionMetadata {
                priority,
                ..Default::default()
            },
        }
    }

    /// Find a step execution by step ID
    pub fn step(&self, step_id: &str) -> Option<&StepExecution> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// Index of the first pending step, scanning in template order
    pub fn first_pending(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.status == StepStatus::Pending)
    }
}

// ============================================================================
// Step execution
// ============================================================================

/// Per-execution runtime state of a single template step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecution {
    /// The template step this state belongs to
    pub step_id: String,

    /// Current status
    pub status: StepStatus,

    /// Assignee snapshot, resolved once at activation time
    #[serde(default)]
    pub assignees: Vec<String>,

    /// When the step became in-progress
    pub activated_at: Option<DateTime<Utc>>,

    /// When a decision landed
    pub completed_at: Option<DateTime<Utc>>,

    /// Who decided the step
    pub decided_by: Option<String>,

    /// The decision that was made
    pub decision: Option<Decision>,

    /// Free-text comment attached to the decision
    pub comment: Option<String>,

    /// Attachment references on the decision
    #[serde(default)]
    pub attachments: Vec<String>,

    /// Deadline computed at activation from the timeout policy
    pub timeout_at: Option<DateTime<Utc>>,

    /// Escalation target snapshot
    #[serde(default)]
    pub escalated_to: Vec<String>,

    /// When the step was last escalated (idempotence guard for the sweeper)
    pub escalated_at: Option<DateTime<Utc>>,
}

impl StepExecution {
    /// A fresh, pending step
    pub fn new(step_id: &str) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Pending,
            assignees: Vec::new(),
            activated_at: None,
            completed_at: None,
            decided_by: None,
            decision: None,
            comment: None,
            attachments: Vec::new(),
            timeout_at: None,
            escalated_to: Vec::new(),
            escalated_at: None,
        }
    }

    /// Reset the step back to pending, clearing all runtime metadata.
    /// Used by the request-changes rewind.
    pub fn reset(&mut self) {
        *self = StepExecution::new(&self.step_id);
    }
}

// ============================================================================
// Comments
// ============================================================================

/// An append-only comment on a step of an execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Comment identifier
    pub id: String,

    /// Execution the comment belongs to
    pub execution_id: String,

    /// Step the comment belongs to
    pub step_id: String,

    /// Comment author
    pub author: String,

    /// Comment body
    pub body: String,

    /// Attachment references
    #[serde(default)]
    pub attachments: Vec<String>,

    /// Internal comments are hidden from the submitter
    #[serde(default)]
    pub internal: bool,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::template::{StepKind, StepSettings, StepTemplate, TemplateSettings};

    fn template_with_steps(n: usize) -> WorkflowTemplate {
        WorkflowTemplate {
            id: "tpl".to_string(),
            tenant_id: "acme".to_string(),
            name: "review".to_string(),
            description: None,
            active: true,
            steps: (0..n)
                .map(|i| StepTemplate {
                    id: format!("step-{i}"),
                    name: format!("Step {i}"),
                    kind: StepKind::Approval,
                    order: i as u32 + 1,
                    required: true,
                    assignees: vec![],
                    conditions: vec![],
                    actions: vec![],
                    timeout: None,
                    settings: StepSettings::default(),
                })
                .collect(),
            settings: TemplateSettings::default(),
        }
    }

    #[test]
    fn test_new_execution_mirrors_template_steps() {
        let template = template_with_steps(3);
        let execution =
            WorkflowExecution::new(&template, "sub-1", "alice", Priority::High, Utc::now());

        assert_eq!(execution.steps.len(), 3);
        assert!(execution
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Pending));
        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert_eq!(execution.metadata.priority, Priority::High);
        assert_eq!(execution.steps[1].step_id, "step-1");
    }

    #[test]
    fn test_first_pending_scans_in_order() {
        let template = template_with_steps(3);
        let mut execution =
            WorkflowExecution::new(&template, "sub-1", "alice", Priority::Normal, Utc::now());

        assert_eq!(execution.first_pending(), Some(0));
        execution.steps[0].status = StepStatus::Approved;
        execution.steps[1].status = StepStatus::Skipped;
        assert_eq!(execution.first_pending(), Some(2));
        execution.steps[2].status = StepStatus::Approved;
        assert_eq!(execution.first_pending(), None);
    }

    #[test]
    fn test_step_reset_clears_runtime_state() {
        let mut step = StepExecution::new("qc");
        step.status = StepStatus::Approved;
        step.assignees = vec!["bob".to_string()];
        step.decided_by = Some("bob".to_string());
        step.decision = Some(Decision::Approve);
        step.completed_at = Some(Utc::now());
        step.timeout_at = Some(Utc::now());

        step.reset();

        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.assignees.is_empty());
        assert!(step.decided_by.is_none());
        assert!(step.decision.is_none());
        assert!(step.completed_at.is_none());
        assert!(step.timeout_at.is_none());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Rejected.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(ExecutionStatus::Expired.is_terminal());
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::InProgress.is_terminal());
    }
}
