use std::sync::Arc;

use reviewflow::engine::Clock;
use reviewflow::model::{StepSettings, TemplateSettings};
use reviewflow::prelude::*;
use reviewflow::store::memory::{
    MemoryCommentStore, MemoryExecutionStore, MemorySubmissionSource, MemoryTemplateStore,
    RecordingDispatcher, StaticIdentityResolver,
};
use serde_json::Value;

/// Engine wired to in-memory stores, with handles kept for assertions.
/// Known identities: role `qc_reviewer` = {bob, carol}, role
/// `escalation_team` = {erin}, group `leads` = {dave}.
pub struct Harness {
    pub engine: Arc<WorkflowEngine>,
    pub templates: Arc<MemoryTemplateStore>,
    pub submissions: Arc<MemorySubmissionSource>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub clock: Clock,
}

pub fn harness() -> Harness {
    // RUST_LOG=reviewflow=debug makes test failures traceable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let templates = Arc::new(MemoryTemplateStore::new());
    let submissions = Arc::new(MemorySubmissionSource::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let clock = Clock::new();

    let engine = WorkflowEngine::new(
        templates.clone(),
        Arc::new(MemoryExecutionStore::new()),
        Arc::new(MemoryCommentStore::new()),
        Arc::new(
            StaticIdentityResolver::new()
                .with_role("qc_reviewer", &["bob", "carol"])
                .with_role("escalation_team", &["erin"])
                .with_group("leads", &["dave"]),
        ),
        submissions.clone(),
        dispatcher.clone(),
    )
    .with_clock(clock.clone());

    Harness {
        engine: Arc::new(engine),
        templates,
        submissions,
        dispatcher,
        clock,
    }
}

pub fn template(id: &str, steps: Vec<StepTemplate>) -> WorkflowTemplate {
    WorkflowTemplate {
        id: id.to_string(),
        tenant_id: "acme".to_string(),
        name: id.to_string(),
        description: None,
        active: true,
        steps,
        settings: TemplateSettings::default(),
    }
}

pub fn approval_step(id: &str, order: u32, user: &str) -> StepTemplate {
    StepTemplate {
        id: id.to_string(),
        name: id.to_string(),
        kind: StepKind::Approval,
        order,
        required: true,
        assignees: vec![AssigneeRef::User {
            id: user.to_string(),
        }],
        conditions: vec![],
        actions: vec![],
        timeout: None,
        settings: StepSettings::default(),
    }
}

pub fn with_condition(
    mut step: StepTemplate,
    field: &str,
    operator: ConditionOperator,
    value: Value,
) -> StepTemplate {
    step.conditions.push(Condition {
        field: field.to_string(),
        operator,
        value,
        logical_operator: LogicalOperator::And,
    });
    step
}

pub fn with_timeout(mut step: StepTemplate, policy: TimeoutPolicy) -> StepTemplate {
    step.timeout = Some(policy);
    step
}

pub async fn seed(h: &Harness, template: WorkflowTemplate, submission_id: &str, fields: Value) {
    use reviewflow::store::TemplateStore;

    h.templates.put(template).await.unwrap();
    let fields = fields
        .as_object()
        .map(|m| m.clone().into_iter().collect())
        .unwrap_or_default();
    h.submissions.put_submission(submission_id, fields).await;
}

pub async fn start(h: &Harness, template_id: &str, submission_id: &str) -> String {
    h.engine
        .start_workflow(StartRequest {
            tenant_id: "acme".to_string(),
            template_id: template_id.to_string(),
            submission_id: submission_id.to_string(),
            submitted_by: "alice".to_string(),
            priority: Priority::Normal,
        })
        .await
        .expect("start_workflow failed")
}

pub async fn decide(
    h: &Harness,
    execution_id: &str,
    step_id: &str,
    user_id: &str,
    decision: Decision,
) -> Result<(), EngineError> {
    h.engine
        .process_step(DecisionRequest {
            execution_id: execution_id.to_string(),
            step_id: step_id.to_string(),
            user_id: user_id.to_string(),
            decision,
            comment: None,
            attachments: vec![],
        })
        .await
}

pub async fn execution(h: &Harness, execution_id: &str) -> WorkflowExecution {
    h.engine
        .get_execution(execution_id)
        .await
        .expect("get_execution failed")
        .execution
}

pub fn step_status(execution: &WorkflowExecution, step_id: &str) -> StepStatus {
    execution
        .step(step_id)
        .unwrap_or_else(|| panic!("no step {step_id}"))
        .status
}
