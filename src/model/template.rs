//! Workflow template definitions
//!
//! A template is the static, reusable description of an ordered review
//! process: which steps exist, who decides them, when a step applies, what
//! happens on completion, and how timeouts are handled. Templates are
//! immutable once an execution references them.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ============================================================================
// Template
// ============================================================================

/// A complete workflow template definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    /// Template identifier
    pub id: String,

    /// Tenant this template belongs to
    pub tenant_id: String,

    /// Human-readable name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Inactive templates cannot start new executions
    #[serde(default = "default_true")]
    pub active: bool,

    /// Ordered list of steps
    pub steps: Vec<StepTemplate>,

    /// Template-wide settings
    #[serde(default)]
    pub settings: TemplateSettings,
}

/// Template-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSettings {
    /// Allow the submitter to resubmit after a rejection
    #[serde(default = "default_true")]
    pub allow_resubmission: bool,

    /// Notify the submitter on completion/rejection
    #[serde(default = "default_true")]
    pub notify_submitter: bool,

    /// Archive completed executions after this many days (host-owned policy)
    pub auto_archive_days: Option<u32>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            allow_resubmission: true,
            notify_submitter: true,
            auto_archive_days: None,
        }
    }
}

impl WorkflowTemplate {
    /// Get a step template by ID
    pub fn step(&self, step_id: &str) -> Option<&StepTemplate> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Validate structural invariants of the template
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.steps.is_empty() {
            return Err(TemplateError::NoSteps(self.id.clone()));
        }

        let mut ids = HashSet::new();
        let mut last_order: Option<u32> = None;

        for step in &self.steps {
            if !ids.insert(step.id.as_str()) {
                return Err(TemplateError::DuplicateStepId {
                    template: self.id.clone(),
                    step: step.id.clone(),
                });
            }

            // Order indices must be strictly increasing; the engine relies on
            // the step vector mirroring template order positionally.
            if let Some(prev) = last_order {
                if step.order <= prev {
                    return Err(TemplateError::OrderNotIncreasing {
                        template: self.id.clone(),
                        step: step.id.clone(),
                    });
                }
            }
            last_order = Some(step.order);

            for condition in step
                .conditions
                .iter()
                .chain(step.assignees.iter().flat_map(AssigneeRef::conditions))
            {
                condition.validate().map_err(|reason| {
                    TemplateError::InvalidCondition {
                        template: self.id.clone(),
                        step: step.id.clone(),
                        reason,
                    }
                })?;
            }

            if let Some(timeout) = &step.timeout {
                if timeout.action == TimeoutAction::Escalate && timeout.escalate_to.is_empty() {
                    return Err(TemplateError::EscalationWithoutTargets {
                        template: self.id.clone(),
                        step: step.id.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Template validation errors
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template {0} has no steps")]
    NoSteps(String),

    #[error("template {template}: duplicate step id {step}")]
    DuplicateStepId { template: String, step: String },

    #[error("template {template}: step {step} order index is not strictly increasing")]
    OrderNotIncreasing { template: String, step: String },

    #[error("template {template}: step {step} has an invalid condition: {reason}")]
    InvalidCondition {
        template: String,
        step: String,
        reason: String,
    },

    #[error("template {template}: step {step} escalates on timeout but has no escalation targets")]
    EscalationWithoutTargets { template: String, step: String },
}

// ============================================================================
// Step
// ============================================================================

/// Kind of work a step represents
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Approval,
    Review,
    Notification,
    Condition,
    Action,
}

/// A single stage in a workflow template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTemplate {
    /// Step identifier, unique within the template
    pub id: String,

    /// Display name
    pub name: String,

    /// Kind of step
    pub kind: StepKind,

    /// Order index, defines strict sequential precedence
    pub order: u32,

    /// Whether the step must be decided (informational for hosts)
    #[serde(default = "default_true")]
    pub required: bool,

    /// Who may decide this step
    #[serde(default)]
    pub assignees: Vec<AssigneeRef>,

    /// Gate for whether the step applies to a given submission
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Post-completion actions, run when the execution completes
    #[serde(default)]
    pub actions: Vec<ActionDef>,

    /// Timeout policy; absent means the step never expires
    pub timeout: Option<TimeoutPolicy>,

    /// Per-step settings
    #[serde(default)]
    pub settings: StepSettings,
}

/// Per-step behavioral settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSettings {
    /// Require every assignee to approve rather than any single decision.
    /// Stored for hosts; the decision protocol itself is
    /// single-decision-per-step.
    #[serde(default)]
    pub require_all_approvals: bool,

    /// Allow assignees to reassign the step
    #[serde(default)]
    pub allow_reassignment: bool,

    /// Allow comments on the step
    #[serde(default = "default_true")]
    pub allow_comments: bool,

    /// Allow attachments on decisions and comments
    #[serde(default = "default_true")]
    pub allow_attachments: bool,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self {
            require_all_approvals: false,
            allow_reassignment: false,
            allow_comments: true,
            allow_attachments: true,
        }
    }
}

// ============================================================================
// Assignees
// ============================================================================

/// Abstract reference to one or more reviewers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssigneeRef {
    /// A literal user ID
    User { id: String },
    /// Every member of a role (expanded via the identity collaborator)
    Role { role: String },
    /// Every member of a group (expanded via the identity collaborator)
    Group { group: String },
    /// A user included only when the conditions hold for the submission
    Conditional {
        id: String,
        #[serde(default)]
        conditions: Vec<Condition>,
    },
}

impl AssigneeRef {
    fn conditions(&self) -> &[Condition] {
        match self {
            AssigneeRef::Conditional { conditions, .. } => conditions,
            _ => &[],
        }
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// Comparison operator for a condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    In,
    NotIn,
}

/// Combinator linking a condition to the one that follows it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

/// A single field comparison against the submission's data snapshot.
///
/// `logical_operator` joins this condition's result with the *next*
/// condition in the list, not the previous one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    /// Field name in the data snapshot
    pub field: String,

    /// Comparison operator
    pub operator: ConditionOperator,

    /// Value to compare against; must be a list for `in`/`not_in`
    pub value: serde_json::Value,

    /// Combinator for the next condition in the list
    #[serde(default)]
    pub logical_operator: LogicalOperator,
}

impl Condition {
    fn validate(&self) -> Result<(), String> {
        match self.operator {
            ConditionOperator::In | ConditionOperator::NotIn => {
                if !self.value.is_array() {
                    return Err(format!(
                        "field {}: in/not_in requires a list value",
                        self.field
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Discriminant for action dispatch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Email,
    Webhook,
    UpdateField,
    CreateTask,
    AssignUser,
}

/// A post-completion action with strongly-typed configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDef {
    /// Send a message to the resolved recipients
    Email {
        recipients: Vec<AssigneeRef>,
        subject: String,
        #[serde(default)]
        body: String,
    },
    /// POST the execution snapshot to an external URL
    Webhook {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    /// Write a field back onto the submission
    UpdateField {
        field: String,
        value: serde_json::Value,
    },
    /// Create a follow-up task in the host system
    CreateTask {
        title: String,
        assignee: Option<String>,
    },
    /// Assign a user to the submission
    AssignUser { user_id: String, role: Option<String> },
}

impl ActionDef {
    /// The registry key for this action
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionDef::Email { .. } => ActionKind::Email,
            ActionDef::Webhook { .. } => ActionKind::Webhook,
            ActionDef::UpdateField { .. } => ActionKind::UpdateField,
            ActionDef::CreateTask { .. } => ActionKind::CreateTask,
            ActionDef::AssignUser { .. } => ActionKind::AssignUser,
        }
    }
}

// ============================================================================
// Timeouts
// ============================================================================

/// What happens when an in-progress step passes its deadline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutAction {
    /// Reassign to the escalation targets and restart the clock
    Escalate,
    /// Synthesize a system approval
    AutoApprove,
    /// Synthesize a system rejection
    AutoReject,
    /// Remind the current assignees without changing state
    Notify,
}

/// Timeout policy for a step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeoutPolicy {
    /// Hours after activation before the step expires. A zero duration
    /// expires on the first sweep after activation.
    pub duration_hours: i64,

    /// Action to apply on expiry
    pub action: TimeoutAction,

    /// Targets for the `escalate` action
    #[serde(default)]
    pub escalate_to: Vec<AssigneeRef>,
}

fn default_true() -> bool {
    true
}
