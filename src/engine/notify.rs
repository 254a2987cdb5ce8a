//! Notification adapter
//!
//! Translates engine state changes into messages for the external
//! notification dispatcher. Dispatch always happens after the state write
//! has committed; delivery failures are logged and swallowed so they can
//! never roll back into the state machine.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::model::{StepTemplate, WorkflowExecution};
use crate::store::{Notification, NotificationDispatcher};

#[derive(Clone)]
pub struct NotificationAdapter {
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl NotificationAdapter {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// A step was activated; tell every resolved assignee.
    /// One message per assignee, dispatched concurrently.
    pub async fn assignment(
        &self,
        execution: &WorkflowExecution,
        step: &StepTemplate,
        assignees: &[String],
    ) {
        let sends = assignees.iter().map(|user| {
            self.send(Notification {
                recipients: vec![user.clone()],
                subject: format!("Review requested: {}", step.name),
                body: format!(
                    "You have been assigned to step \"{}\" of submission {}.",
                    step.name, execution.submission_id
                ),
                execution_id: execution.id.clone(),
                step_id: Some(step.id.clone()),
            })
        });
        join_all(sends).await;
    }

    /// An expired step was reassigned to its escalation targets
    pub async fn escalation(
        &self,
        execution: &WorkflowExecution,
        step: &StepTemplate,
        targets: &[String],
    ) {
        self.send(Notification {
            recipients: targets.to_vec(),
            subject: format!("Escalated: {}", step.name),
            body: format!(
                "Step \"{}\" of submission {} timed out and has been escalated to you.",
                step.name, execution.submission_id
            ),
            execution_id: execution.id.clone(),
            step_id: Some(step.id.clone()),
        })
        .await;
    }

    /// Reminder for an expired step whose timeout action is notify-only
    pub async fn reminder(
        &self,
        execution: &WorkflowExecution,
        step: &StepTemplate,
        assignees: &[String],
    ) {
        self.send(Notification {
            recipients: assignees.to_vec(),
            subject: format!("Reminder: {}", step.name),
            body: format!(
                "Step \"{}\" of submission {} is past its deadline and awaits your decision.",
                step.name, execution.submission_id
            ),
            execution_id: execution.id.clone(),
            step_id: Some(step.id.clone()),
        })
        .await;
    }

    /// The execution was rejected
    pub async fn rejected(
        &self,
        execution: &WorkflowExecution,
        decided_by: &str,
        comment: Option<&str>,
    ) {
        self.send(Notification {
            recipients: vec![execution.submitted_by.clone()],
            subject: format!("Submission {} rejected", execution.submission_id),
            body: match comment {
                Some(text) => format!("Rejected by {decided_by}: {text}"),
                None => format!("Rejected by {decided_by}."),
            },
            execution_id: execution.id.clone(),
            step_id: None,
        })
        .await;
    }

    /// Changes were requested; the submitter must act
    pub async fn changes_requested(&self, execution: &WorkflowExecution, comment: Option<&str>) {
        self.send(Notification {
            recipients: vec![execution.submitted_by.clone()],
            subject: format!("Changes requested on submission {}", execution.submission_id),
            body: comment.unwrap_or("Changes were requested.").to_string(),
            execution_id: execution.id.clone(),
            step_id: None,
        })
        .await;
    }

    /// Every step is done; the execution completed
    pub async fn completed(&self, execution: &WorkflowExecution) {
        self.send(Notification {
            recipients: vec![execution.submitted_by.clone()],
            subject: format!("Submission {} approved", execution.submission_id),
            body: "All review steps have completed.".to_string(),
            execution_id: execution.id.clone(),
            step_id: None,
        })
        .await;
    }

    /// Deliver one message, logging failure instead of propagating it
    pub async fn send(&self, notification: Notification) {
        debug!(
            execution_id = %notification.execution_id,
            recipients = notification.recipients.len(),
            "dispatching notification"
        );
        if let Err(e) = self.dispatcher.deliver(notification).await {
            warn!(error = %e, "notification delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, StepKind, StepSettings, TemplateSettings, WorkflowTemplate};
    use crate::store::memory::RecordingDispatcher;
    use chrono::Utc;

    fn fixtures() -> (WorkflowExecution, StepTemplate) {
        let step = StepTemplate {
            id: "review".to_string(),
            name: "Peer Review".to_string(),
            kind: StepKind::Review,
            order: 1,
            required: true,
            assignees: vec![],
            conditions: vec![],
            actions: vec![],
            timeout: None,
            settings: StepSettings::default(),
        };
        let template = WorkflowTemplate {
            id: "tpl".to_string(),
            tenant_id: "acme".to_string(),
            name: "review".to_string(),
            description: None,
            active: true,
            steps: vec![step.clone()],
            settings: TemplateSettings::default(),
        };
        let execution =
            WorkflowExecution::new(&template, "sub-1", "alice", Priority::Normal, Utc::now());
        (execution, step)
    }

    #[tokio::test]
    async fn test_assignment_sends_one_message_per_assignee() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let adapter = NotificationAdapter::new(dispatcher.clone());
        let (execution, step) = fixtures();

        adapter
            .assignment(&execution, &step, &["bob".to_string(), "carol".to_string()])
            .await;

        let sent = dispatcher.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|n| n.step_id.as_deref() == Some("review")));
    }

    #[tokio::test]
    async fn test_changes_requested_targets_submitter() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let adapter = NotificationAdapter::new(dispatcher.clone());
        let (execution, _) = fixtures();

        adapter
            .changes_requested(&execution, Some("please fix page 3"))
            .await;

        let sent = dispatcher.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipients, vec!["alice"]);
        assert!(sent[0].body.contains("page 3"));
    }
}
