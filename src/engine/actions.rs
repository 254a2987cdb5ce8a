//! Post-completion action execution
//!
//! When an execution completes, the engine runs every step's configured
//! actions through this registry. Each `ActionDef` variant has a dedicated
//! handler; failures are logged per-action and never prevent the remaining
//! actions from running or the execution from staying completed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::engine::assignees::AssigneeResolver;
use crate::engine::notify::NotificationAdapter;
use crate::model::{ActionDef, ActionKind, WorkflowExecution};
use crate::store::{CollaboratorError, DataSnapshot, Notification, SubmissionSource};

/// Everything a handler may need about the completed execution
pub struct ActionContext<'a> {
    pub execution: &'a WorkflowExecution,
    pub data: &'a DataSnapshot,
}

/// One handler per action kind
#[async_trait]
pub trait ActionHandler: Send + Sync {
    fn kind(&self) -> ActionKind;

    async fn execute(
        &self,
        action: &ActionDef,
        ctx: &ActionContext<'_>,
    ) -> Result<(), CollaboratorError>;
}

/// Dispatches actions to their registered handlers
pub struct ActionRegistry {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// An empty registry; hosts can register custom handlers
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with all built-in handlers
    pub fn builtin(
        submissions: Arc<dyn SubmissionSource>,
        notifier: NotificationAdapter,
        resolver: AssigneeResolver,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(EmailAction { notifier, resolver }));
        registry.register(Arc::new(WebhookAction {
            client: reqwest::Client::new(),
        }));
        registry.register(Arc::new(UpdateFieldAction {
            submissions: submissions.clone(),
        }));
        registry.register(Arc::new(CreateTaskAction {
            submissions: submissions.clone(),
        }));
        registry.register(Arc::new(AssignUserAction { submissions }));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    /// Run every action, isolating failures per action
    pub async fn run_all(&self, actions: &[ActionDef], ctx: &ActionContext<'_>) {
        for action in actions {
            let kind = action.kind();
            match self.handlers.get(&kind) {
                Some(handler) => {
                    debug!(execution_id = %ctx.execution.id, ?kind, "running action");
                    if let Err(e) = handler.execute(action, ctx).await {
                        error!(execution_id = %ctx.execution.id, ?kind, error = %e, "action failed");
                    }
                }
                None => warn!(?kind, "no handler registered for action"),
            }
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Built-in handlers
// ============================================================================

/// Sends a message to the resolved recipients via the notification adapter
struct EmailAction {
    notifier: NotificationAdapter,
    resolver: AssigneeResolver,
}

#[async_trait]
impl ActionHandler for EmailAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Email
    }

    async fn execute(
        &self,
        action: &ActionDef,
        ctx: &ActionContext<'_>,
    ) -> Result<(), CollaboratorError> {
        let ActionDef::Email {
            recipients,
            subject,
            body,
        } = action
        else {
            return Ok(());
        };

        let users = self
            .resolver
            .resolve(recipients, &ctx.execution.tenant_id, ctx.data)
            .await;
        self.notifier
            .send(Notification {
                recipients: users,
                subject: subject.clone(),
                body: body.clone(),
                execution_id: ctx.execution.id.clone(),
                step_id: None,
            })
            .await;
        Ok(())
    }
}

/// POSTs the execution snapshot to an external URL
struct WebhookAction {
    client: reqwest::Client,
}

#[async_trait]
impl ActionHandler for WebhookAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Webhook
    }

    async fn execute(
        &self,
        action: &ActionDef,
        ctx: &ActionContext<'_>,
    ) -> Result<(), CollaboratorError> {
        let ActionDef::Webhook { url, headers } = action else {
            return Ok(());
        };

        let mut request = self.client.post(url).json(ctx.execution);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CollaboratorError::Delivery(e.to_string()))?;
        response
            .error_for_status()
            .map_err(|e| CollaboratorError::Delivery(e.to_string()))?;
        Ok(())
    }
}

/// Writes a field back onto the submission
struct UpdateFieldAction {
    submissions: Arc<dyn SubmissionSource>,
}

#[async_trait]
impl ActionHandler for UpdateFieldAction {
    fn kind(&self) -> ActionKind {
        ActionKind::UpdateField
    }

    async fn execute(
        &self,
        action: &ActionDef,
        ctx: &ActionContext<'_>,
    ) -> Result<(), CollaboratorError> {
        let ActionDef::UpdateField { field, value } = action else {
            return Ok(());
        };
        self.submissions
            .update_field(
                &ctx.execution.tenant_id,
                &ctx.execution.submission_id,
                field,
                value.clone(),
            )
            .await
    }
}

/// Creates a follow-up task in the host system
struct CreateTaskAction {
    submissions: Arc<dyn SubmissionSource>,
}

#[async_trait]
impl ActionHandler for CreateTaskAction {
    fn kind(&self) -> ActionKind {
        ActionKind::CreateTask
    }

    async fn execute(
        &self,
        action: &ActionDef,
        ctx: &ActionContext<'_>,
    ) -> Result<(), CollaboratorError> {
        let ActionDef::CreateTask { title, assignee } = action else {
            return Ok(());
        };
        self.submissions
            .create_task(&ctx.execution.tenant_id, title, assignee.as_deref())
            .await
    }
}

/// Assigns a user to the submission
struct AssignUserAction {
    submissions: Arc<dyn SubmissionSource>,
}

#[async_trait]
impl ActionHandler for AssignUserAction {
    fn kind(&self) -> ActionKind {
        ActionKind::AssignUser
    }

    async fn execute(
        &self,
        action: &ActionDef,
        ctx: &ActionContext<'_>,
    ) -> Result<(), CollaboratorError> {
        let ActionDef::AssignUser { user_id, role } = action else {
            return Ok(());
        };
        self.submissions
            .assign_user(
                &ctx.execution.tenant_id,
                &ctx.execution.submission_id,
                user_id,
                role.as_deref(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, TemplateSettings, WorkflowTemplate};
    use crate::store::memory::{
        MemorySubmissionSource, RecordingDispatcher, StaticIdentityResolver,
    };
    use chrono::Utc;
    use serde_json::json;

    fn execution() -> WorkflowExecution {
        let template = WorkflowTemplate {
            id: "tpl".to_string(),
            tenant_id: "acme".to_string(),
            name: "review".to_string(),
            description: None,
            active: true,
            steps: vec![crate::model::StepTemplate {
                id: "s".to_string(),
                name: "S".to_string(),
                kind: crate::model::StepKind::Approval,
                order: 1,
                required: true,
                assignees: vec![],
                conditions: vec![],
                actions: vec![],
                timeout: None,
                settings: Default::default(),
            }],
            settings: TemplateSettings::default(),
        };
        WorkflowExecution::new(&template, "sub-1", "alice", Priority::Normal, Utc::now())
    }

    fn registry(
        submissions: Arc<MemorySubmissionSource>,
        dispatcher: Arc<RecordingDispatcher>,
    ) -> ActionRegistry {
        ActionRegistry::builtin(
            submissions,
            NotificationAdapter::new(dispatcher),
            AssigneeResolver::new(Arc::new(StaticIdentityResolver::new())),
        )
    }

    #[tokio::test]
    async fn test_update_field_writes_through() {
        let submissions = Arc::new(MemorySubmissionSource::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let registry = registry(submissions.clone(), dispatcher);

        let execution = execution();
        let data = DataSnapshot::new();
        registry
            .run_all(
                &[ActionDef::UpdateField {
                    field: "qc_status".to_string(),
                    value: json!("approved"),
                }],
                &ActionContext {
                    execution: &execution,
                    data: &data,
                },
            )
            .await;

        assert_eq!(
            submissions.get_field("sub-1", "qc_status").await,
            Some(json!("approved"))
        );
    }

    #[tokio::test]
    async fn test_failed_action_does_not_stop_the_rest() {
        let submissions = Arc::new(MemorySubmissionSource::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let registry = registry(submissions.clone(), dispatcher);

        let execution = execution();
        let data = DataSnapshot::new();
        registry
            .run_all(
                &[
                    // Unroutable webhook fails; the task must still be created.
                    ActionDef::Webhook {
                        url: "http://127.0.0.1:1/hook".to_string(),
                        headers: HashMap::new(),
                    },
                    ActionDef::CreateTask {
                        title: "archive the file".to_string(),
                        assignee: None,
                    },
                ],
                &ActionContext {
                    execution: &execution,
                    data: &data,
                },
            )
            .await;

        assert_eq!(submissions.created_tasks().await, vec!["archive the file"]);
    }
}
