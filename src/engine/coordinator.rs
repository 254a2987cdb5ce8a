//! Workflow engine coordinator
//!
//! This is the main engine that:
//! 1. Starts executions from templates
//! 2. Schedules the next applicable step (skipping on false conditions)
//! 3. Validates and applies human decisions
//! 4. Runs the request-changes rewind and completion actions
//! 5. Applies timeout policies on behalf of the sweeper
//!
//! Every mutating path acquires the store's per-execution lock and holds it
//! across the full read-decide-write sequence. The "step must still be
//! in progress" check inside that critical section is the compare-and-swap
//! guard that makes concurrent decisions lose deterministically.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, instrument, warn};

use crate::engine::actions::{ActionContext, ActionRegistry};
use crate::engine::assignees::AssigneeResolver;
use crate::engine::clock::Clock;
use crate::engine::conditions::evaluate_conditions;
use crate::engine::error::EngineError;
use crate::engine::notify::NotificationAdapter;
use crate::engine::sweeper::SweepAction;
use crate::model::{
    Comment, Decision, ExecutionStatus, Priority, StepStatus, TimeoutAction, WorkflowExecution,
    WorkflowTemplate,
};
use crate::store::{
    CommentStore, DataSnapshot, ExecutionStore, IdentityResolver, NotificationDispatcher,
    SubmissionSource, TemplateStore,
};

/// Actor recorded on decisions synthesized by the timeout sweeper. Exempt
/// from the assignee-membership check; nothing else is.
pub const SYSTEM_ACTOR: &str = "system";

/// Input to `start_workflow`
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub tenant_id: String,
    pub template_id: String,
    pub submission_id: String,
    pub submitted_by: String,
    pub priority: Priority,
}

/// Input to `process_step`
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub execution_id: String,
    pub step_id: String,
    pub user_id: String,
    pub decision: Decision,
    pub comment: Option<String>,
    pub attachments: Vec<String>,
}

/// Input to `add_comment`
#[derive(Debug, Clone)]
pub struct CommentRequest {
    pub execution_id: String,
    pub step_id: String,
    pub author: String,
    pub body: String,
    pub attachments: Vec<String>,
    pub internal: bool,
}

/// An execution together with its comment thread
#[derive(Debug, Clone)]
pub struct ExecutionView {
    pub execution: WorkflowExecution,
    pub comments: Vec<Comment>,
}

/// The workflow orchestration engine
pub struct WorkflowEngine {
    templates: Arc<dyn TemplateStore>,
    executions: Arc<dyn ExecutionStore>,
    comments: Arc<dyn CommentStore>,
    submissions: Arc<dyn SubmissionSource>,
    resolver: AssigneeResolver,
    notifier: NotificationAdapter,
    actions: ActionRegistry,
    clock: Clock,
}

impl WorkflowEngine {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        executions: Arc<dyn ExecutionStore>,
        comments: Arc<dyn CommentStore>,
        identity: Arc<dyn IdentityResolver>,
        submissions: Arc<dyn SubmissionSource>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let resolver = AssigneeResolver::new(identity);
        let notifier = NotificationAdapter::new(dispatcher);
        let actions =
            ActionRegistry::builtin(submissions.clone(), notifier.clone(), resolver.clone());
        Self {
            templates,
            executions,
            comments,
            submissions,
            resolver,
            notifier,
            actions,
            clock: Clock::new(),
        }
    }

    /// Replace the clock (tests drive virtual time through this)
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The engine's clock
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Replace the action registry, e.g. to add host-defined handlers
    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    // ========================================================================
    // Public operations
    // ========================================================================

    /// Create an execution for a submission and activate its first
    /// applicable step. Returns the new execution's ID.
    #[instrument(skip(self, request), fields(template_id = %request.template_id, submission_id = %request.submission_id))]
    pub async fn start_workflow(&self, request: StartRequest) -> Result<String, EngineError> {
        let template = self
            .templates
            .get(&request.tenant_id, &request.template_id)
            .await?
            .ok_or_else(|| EngineError::TemplateNotFound(request.template_id.clone()))?;
        if !template.active {
            return Err(EngineError::TemplateInactive(request.template_id.clone()));
        }
        template
            .validate()
            .map_err(|e| EngineError::InvalidRequest(e.to_string()))?;

        let snapshot = self
            .submissions
            .fetch_fields(&request.tenant_id, &request.submission_id)
            .await
            .map_err(|e| {
                warn!(error = %e, "submission fetch failed");
                EngineError::SubmissionNotFound(request.submission_id.clone())
            })?
            .ok_or_else(|| EngineError::SubmissionNotFound(request.submission_id.clone()))?;

        let now = self.clock.now().await;
        let mut execution = WorkflowExecution::new(
            &template,
            &request.submission_id,
            &request.submitted_by,
            request.priority,
            now,
        );
        let execution_id = execution.id.clone();
        self.executions.insert(execution.clone()).await?;

        let _guard = self.executions.lock(&execution_id).await;
        self.advance(&mut execution, &template, &snapshot).await?;

        // pending -> in_progress once the first step is active; a template
        // whose steps all skipped has already completed.
        if execution.status == ExecutionStatus::Pending {
            execution.status = ExecutionStatus::InProgress;
            self.executions.update(&execution).await?;
        }

        info!(execution_id = %execution_id, "workflow started");
        Ok(execution_id)
    }

    /// Apply a human decision to an active step
    #[instrument(skip(self, request), fields(execution_id = %request.execution_id, step_id = %request.step_id, user_id = %request.user_id))]
    pub async fn process_step(&self, request: DecisionRequest) -> Result<(), EngineError> {
        let _guard = self.executions.lock(&request.execution_id).await;
        self.apply_decision(&request, true).await
    }

    /// Fetch an execution together with its comments
    pub async fn get_execution(&self, execution_id: &str) -> Result<ExecutionView, EngineError> {
        let execution = self
            .executions
            .get(execution_id)
            .await?
            .ok_or_else(|| EngineError::ExecutionNotFound(execution_id.to_string()))?;
        let comments = self.comments.for_execution(execution_id).await?;
        Ok(ExecutionView {
            execution,
            comments,
        })
    }

    /// Append a comment to a step of an execution. Returns the comment ID.
    #[instrument(skip(self, request), fields(execution_id = %request.execution_id, step_id = %request.step_id))]
    pub async fn add_comment(&self, request: CommentRequest) -> Result<String, EngineError> {
        let execution = self
            .executions
            .get(&request.execution_id)
            .await?
            .ok_or_else(|| EngineError::ExecutionNotFound(request.execution_id.clone()))?;
        if execution.step(&request.step_id).is_none() {
            return Err(EngineError::StepNotFound(request.step_id.clone()));
        }

        let template = self
            .templates
            .get(&execution.tenant_id, &execution.template_id)
            .await?
            .ok_or_else(|| EngineError::TemplateNotFound(execution.template_id.clone()))?;
        if let Some(step_template) = template.step(&request.step_id) {
            if !step_template.settings.allow_comments {
                return Err(EngineError::CommentsNotAllowed(request.step_id.clone()));
            }
            if !step_template.settings.allow_attachments && !request.attachments.is_empty() {
                return Err(EngineError::InvalidRequest(format!(
                    "attachments are not permitted on step {}",
                    request.step_id
                )));
            }
        }

        let comment = Comment {
            id: uuid::Uuid::new_v4().to_string(),
            execution_id: request.execution_id.clone(),
            step_id: request.step_id.clone(),
            author: request.author.clone(),
            body: request.body.clone(),
            attachments: request.attachments.clone(),
            internal: request.internal,
            created_at: self.clock.now().await,
        };
        let comment_id = comment.id.clone();
        self.comments.append(comment).await?;
        Ok(comment_id)
    }

    // ========================================================================
    // Decision processing
    // ========================================================================

    /// Validate and apply a decision. Caller must hold the execution lock.
    /// `enforce_assignee` is false only for the sweeper's system actor.
    pub(crate) async fn apply_decision(
        &self,
        request: &DecisionRequest,
        enforce_assignee: bool,
    ) -> Result<(), EngineError> {
        let mut execution = self
            .executions
            .get(&request.execution_id)
            .await?
            .ok_or_else(|| EngineError::ExecutionNotFound(request.execution_id.clone()))?;
        let template = self
            .templates
            .get(&execution.tenant_id, &execution.template_id)
            .await?
            .ok_or_else(|| EngineError::TemplateNotFound(execution.template_id.clone()))?;

        let index = execution
            .steps
            .iter()
            .position(|s| s.step_id == request.step_id)
            .ok_or_else(|| EngineError::StepNotFound(request.step_id.clone()))?;

        // CAS guard: late and duplicate decisions fail here.
        if execution.steps[index].status != StepStatus::InProgress {
            return Err(EngineError::StepNotInProgress(request.step_id.clone()));
        }
        if enforce_assignee
            && !execution.steps[index]
                .assignees
                .iter()
                .any(|u| u == &request.user_id)
        {
            return Err(EngineError::NotAnAssignee {
                user: request.user_id.clone(),
                step: request.step_id.clone(),
            });
        }

        let step_template = template
            .step(&request.step_id)
            .ok_or_else(|| EngineError::StepNotFound(request.step_id.clone()))?;
        if !step_template.settings.allow_attachments && !request.attachments.is_empty() {
            return Err(EngineError::InvalidRequest(format!(
                "attachments are not permitted on step {}",
                request.step_id
            )));
        }

        let now = self.clock.now().await;

        match request.decision {
            Decision::Approve => {
                let step = &mut execution.steps[index];
                step.status = StepStatus::Approved;
                step.decision = Some(Decision::Approve);
                step.decided_by = Some(request.user_id.clone());
                step.comment = request.comment.clone();
                step.attachments = request.attachments.clone();
                step.completed_at = Some(now);
                self.executions.update(&execution).await?;
                info!(step_id = %request.step_id, "step approved");

                let snapshot = self.snapshot_for(&execution).await;
                self.advance(&mut execution, &template, &snapshot).await
            }
            Decision::Reject => {
                let step = &mut execution.steps[index];
                step.status = StepStatus::Rejected;
                step.decision = Some(Decision::Reject);
                step.decided_by = Some(request.user_id.clone());
                step.comment = request.comment.clone();
                step.attachments = request.attachments.clone();
                step.completed_at = Some(now);
                execution.status = ExecutionStatus::Rejected;
                execution.completed_at = Some(now);
                self.executions.update(&execution).await?;
                info!(step_id = %request.step_id, "step rejected, execution rejected");

                if template.settings.notify_submitter {
                    self.notifier
                        .rejected(&execution, &request.user_id, request.comment.as_deref())
                        .await;
                }
                Ok(())
            }
            Decision::RequestChanges => {
                // Full restart of forward progress: the requesting step's
                // own status is left for the rewind to reset along with
                // every other in-progress/approved step.
                self.rewind(&mut execution, &template).await?;
                info!(step_id = %request.step_id, "changes requested, execution rewound");

                self.notifier
                    .changes_requested(&execution, request.comment.as_deref())
                    .await;
                Ok(())
            }
        }
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Activate the next applicable pending step, skipping steps whose
    /// conditions are false; completes the execution when nothing is left.
    /// Caller must hold the execution lock.
    async fn advance(
        &self,
        execution: &mut WorkflowExecution,
        template: &WorkflowTemplate,
        snapshot: &DataSnapshot,
    ) -> Result<(), EngineError> {
        loop {
            let Some(index) = execution.first_pending() else {
                return self.complete(execution, template, snapshot).await;
            };
            let step_template = &template.steps[index];

            if !evaluate_conditions(&step_template.conditions, snapshot) {
                // Skips are silent: no notification, no persistence round
                // trip of their own.
                execution.steps[index].status = StepStatus::Skipped;
                debug!(step_id = %step_template.id, "conditions false, step skipped");
                continue;
            }

            let assignees = self
                .resolver
                .resolve(&step_template.assignees, &execution.tenant_id, snapshot)
                .await;
            let now = self.clock.now().await;

            let step = &mut execution.steps[index];
            step.status = StepStatus::InProgress;
            step.assignees = assignees.clone();
            step.activated_at = Some(now);
            step.timeout_at = step_template
                .timeout
                .as_ref()
                .map(|t| now + Duration::hours(t.duration_hours));
            execution.current_step_index = index;
            self.executions.update(execution).await?;
            info!(step_id = %step_template.id, assignees = assignees.len(), "step activated");

            self.notifier
                .assignment(execution, step_template, &assignees)
                .await;
            return Ok(());
        }
    }

    /// Mark the execution completed and run every step's completion actions.
    /// The status write commits before any side effect is attempted.
    async fn complete(
        &self,
        execution: &mut WorkflowExecution,
        template: &WorkflowTemplate,
        snapshot: &DataSnapshot,
    ) -> Result<(), EngineError> {
        let now = self.clock.now().await;
        execution.status = ExecutionStatus::Completed;
        execution.completed_at = Some(now);
        execution.metadata.actual_hours =
            Some((now - execution.submitted_at).num_minutes() as f64 / 60.0);
        self.executions.update(execution).await?;
        info!(execution_id = %execution.id, "execution completed");

        let ctx = ActionContext {
            execution,
            data: snapshot,
        };
        for step_template in &template.steps {
            self.actions.run_all(&step_template.actions, &ctx).await;
        }

        if template.settings.notify_submitter {
            self.notifier.completed(execution).await;
        }
        Ok(())
    }

    /// Reset every in-progress/approved step back to pending, revert the
    /// execution to pending, and re-run the scheduler from the first step.
    /// This intentionally discards prior approvals.
    async fn rewind(
        &self,
        execution: &mut WorkflowExecution,
        template: &WorkflowTemplate,
    ) -> Result<(), EngineError> {
        for step in &mut execution.steps {
            if matches!(step.status, StepStatus::InProgress | StepStatus::Approved) {
                step.reset();
            }
        }
        execution.status = ExecutionStatus::Pending;
        execution.current_step_index = 0;
        execution.completed_at = None;

        let snapshot = self.snapshot_for(execution).await;
        self.advance(execution, template, &snapshot).await
    }

    // ========================================================================
    // Timeout handling (sweeper entry point)
    // ========================================================================

    /// Apply the timeout policy to one expired step. Takes the same
    /// per-execution lock as `process_step` so a sweep can never race a
    /// human decision. Returns `None` when there is nothing to do (already
    /// decided, already escalated in this window, no policy).
    pub(crate) async fn handle_timeout(
        &self,
        execution_id: &str,
        step_id: &str,
    ) -> Result<Option<SweepAction>, EngineError> {
        let _guard = self.executions.lock(execution_id).await;

        let Some(mut execution) = self.executions.get(execution_id).await? else {
            return Ok(None);
        };
        let template = self
            .templates
            .get(&execution.tenant_id, &execution.template_id)
            .await?
            .ok_or_else(|| EngineError::TemplateNotFound(execution.template_id.clone()))?;

        let Some(index) = execution.steps.iter().position(|s| s.step_id == step_id) else {
            return Ok(None);
        };
        let now = self.clock.now().await;
        {
            let step = &execution.steps[index];
            if step.status != StepStatus::InProgress {
                return Ok(None);
            }
            let Some(timeout_at) = step.timeout_at else {
                return Ok(None);
            };
            if timeout_at > now {
                return Ok(None);
            }
        }
        let Some(policy) = &template.steps[index].timeout else {
            return Ok(None);
        };

        match policy.action {
            TimeoutAction::Escalate => {
                // Last-escalated-at guard: a step already escalated for the
                // current deadline is left alone until the clock runs out
                // again.
                let already = {
                    let step = &execution.steps[index];
                    matches!(
                        (step.escalated_at, step.timeout_at),
                        (Some(escalated), Some(deadline)) if escalated >= deadline
                    )
                };
                if already {
                    return Ok(None);
                }

                let snapshot = self.snapshot_for(&execution).await;
                let targets = self
                    .resolver
                    .resolve(&policy.escalate_to, &execution.tenant_id, &snapshot)
                    .await;

                let step = &mut execution.steps[index];
                step.assignees = targets.clone();
                step.escalated_to = targets.clone();
                step.escalated_at = Some(now);
                step.timeout_at = Some(now + Duration::hours(policy.duration_hours));
                self.executions.update(&execution).await?;
                warn!(step_id = %step_id, targets = targets.len(), "step escalated after timeout");

                self.notifier
                    .escalation(&execution, &template.steps[index], &targets)
                    .await;
                Ok(Some(SweepAction::Escalated))
            }
            TimeoutAction::AutoApprove => {
                self.apply_decision(
                    &DecisionRequest {
                        execution_id: execution_id.to_string(),
                        step_id: step_id.to_string(),
                        user_id: SYSTEM_ACTOR.to_string(),
                        decision: Decision::Approve,
                        comment: Some("approved automatically after timeout".to_string()),
                        attachments: Vec::new(),
                    },
                    false,
                )
                .await?;
                Ok(Some(SweepAction::AutoApproved))
            }
            TimeoutAction::AutoReject => {
                self.apply_decision(
                    &DecisionRequest {
                        execution_id: execution_id.to_string(),
                        step_id: step_id.to_string(),
                        user_id: SYSTEM_ACTOR.to_string(),
                        decision: Decision::Reject,
                        comment: Some("rejected automatically after timeout".to_string()),
                        attachments: Vec::new(),
                    },
                    false,
                )
                .await?;
                Ok(Some(SweepAction::AutoRejected))
            }
            TimeoutAction::Notify => {
                self.notifier
                    .reminder(
                        &execution,
                        &template.steps[index],
                        &execution.steps[index].assignees,
                    )
                    .await;
                Ok(Some(SweepAction::Reminded))
            }
        }
    }

    /// Non-terminal executions, for the sweeper's scan
    pub(crate) async fn active_executions(&self) -> Result<Vec<WorkflowExecution>, EngineError> {
        Ok(self.executions.list_active().await?)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Current submission field snapshot. A missing submission or a
    /// collaborator failure degrades to an empty snapshot with a warning;
    /// condition evaluation then treats every field as absent.
    async fn snapshot_for(&self, execution: &WorkflowExecution) -> DataSnapshot {
        match self
            .submissions
            .fetch_fields(&execution.tenant_id, &execution.submission_id)
            .await
        {
            Ok(Some(fields)) => fields,
            Ok(None) => {
                warn!(submission_id = %execution.submission_id, "submission disappeared, using empty snapshot");
                DataSnapshot::new()
            }
            Err(e) => {
                warn!(error = %e, "submission fetch failed, using empty snapshot");
                DataSnapshot::new()
            }
        }
    }
}
