//! In-memory store and collaborator implementations
//!
//! Used by the test suites and by embedded hosts that do not need durable
//! storage. The execution store keeps a per-execution lock table so the
//! engine's read-decide-write sequences are serialized exactly as a row-lock
//! backend would serialize them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::model::{Comment, ExecutionStatus, WorkflowExecution, WorkflowTemplate};

use super::{
    CollaboratorError, CommentStore, DataSnapshot, ExecutionLock, ExecutionStore,
    IdentityResolver, Notification, NotificationDispatcher, StoreError, SubmissionSource,
    TemplateStore,
};

// ============================================================================
// Repositories
// ============================================================================

/// In-memory template store keyed by (tenant, template id)
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: RwLock<HashMap<(String, String), WorkflowTemplate>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn get(
        &self,
        tenant_id: &str,
        template_id: &str,
    ) -> Result<Option<WorkflowTemplate>, StoreError> {
        let templates = self.templates.read().await;
        Ok(templates
            .get(&(tenant_id.to_string(), template_id.to_string()))
            .cloned())
    }

    async fn put(&self, template: WorkflowTemplate) -> Result<(), StoreError> {
        let mut templates = self.templates.write().await;
        templates.insert((template.tenant_id.clone(), template.id.clone()), template);
        Ok(())
    }
}

/// In-memory execution store with a per-execution lock table
#[derive(Default)]
pub struct MemoryExecutionStore {
    executions: RwLock<HashMap<String, WorkflowExecution>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn insert(&self, execution: WorkflowExecution) -> Result<(), StoreError> {
        let mut executions = self.executions.write().await;
        if executions.contains_key(&execution.id) {
            return Err(StoreError::Conflict(execution.id));
        }
        executions.insert(execution.id.clone(), execution);
        Ok(())
    }

    async fn get(&self, execution_id: &str) -> Result<Option<WorkflowExecution>, StoreError> {
        let executions = self.executions.read().await;
        Ok(executions.get(execution_id).cloned())
    }

    async fn update(&self, execution: &WorkflowExecution) -> Result<(), StoreError> {
        let mut executions = self.executions.write().await;
        if !executions.contains_key(&execution.id) {
            return Err(StoreError::Backend(format!(
                "update of unknown execution {}",
                execution.id
            )));
        }
        executions.insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<WorkflowExecution>, StoreError> {
        let executions = self.executions.read().await;
        Ok(executions
            .values()
            .filter(|e| !e.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn lock(&self, execution_id: &str) -> ExecutionLock {
        let entry = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(execution_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }
}

/// In-memory append-only comment store
#[derive(Default)]
pub struct MemoryCommentStore {
    comments: RwLock<Vec<Comment>>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn append(&self, comment: Comment) -> Result<(), StoreError> {
        let mut comments = self.comments.write().await;
        comments.push(comment);
        Ok(())
    }

    async fn for_execution(&self, execution_id: &str) -> Result<Vec<Comment>, StoreError> {
        let comments = self.comments.read().await;
        Ok(comments
            .iter()
            .filter(|c| c.execution_id == execution_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Identity resolver backed by static role/group membership tables
#[derive(Default)]
pub struct StaticIdentityResolver {
    roles: HashMap<String, Vec<String>>,
    groups: HashMap<String, Vec<String>>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: &str, members: &[&str]) -> Self {
        self.roles
            .insert(role.to_string(), members.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn with_group(mut self, group: &str, members: &[&str]) -> Self {
        self.groups
            .insert(group.to_string(), members.iter().map(|m| m.to_string()).collect());
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn members_of_role(
        &self,
        _tenant_id: &str,
        role: &str,
    ) -> Result<Vec<String>, CollaboratorError> {
        self.roles
            .get(role)
            .cloned()
            .ok_or_else(|| CollaboratorError::UnknownRole(role.to_string()))
    }

    async fn members_of_group(
        &self,
        _tenant_id: &str,
        group: &str,
    ) -> Result<Vec<String>, CollaboratorError> {
        self.groups
            .get(group)
            .cloned()
            .ok_or_else(|| CollaboratorError::UnknownGroup(group.to_string()))
    }
}

/// Submission source backed by an in-memory field map, keyed by submission ID
#[derive(Default)]
pub struct MemorySubmissionSource {
    fields: RwLock<HashMap<String, DataSnapshot>>,
    tasks: Mutex<Vec<String>>,
}

impl MemorySubmissionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a submission's fields
    pub async fn put_submission(&self, submission_id: &str, fields: DataSnapshot) {
        let mut all = self.fields.write().await;
        all.insert(submission_id.to_string(), fields);
    }

    /// Set a single field on a seeded submission
    pub async fn set_field(&self, submission_id: &str, field: &str, value: serde_json::Value) {
        let mut all = self.fields.write().await;
        all.entry(submission_id.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    /// Read back a field (for assertions)
    pub async fn get_field(&self, submission_id: &str, field: &str) -> Option<serde_json::Value> {
        let all = self.fields.read().await;
        all.get(submission_id)?.get(field).cloned()
    }

    /// Titles of tasks created via the create_task action
    pub async fn created_tasks(&self) -> Vec<String> {
        self.tasks.lock().await.clone()
    }
}

#[async_trait]
impl SubmissionSource for MemorySubmissionSource {
    async fn fetch_fields(
        &self,
        _tenant_id: &str,
        submission_id: &str,
    ) -> Result<Option<DataSnapshot>, CollaboratorError> {
        let all = self.fields.read().await;
        Ok(all.get(submission_id).cloned())
    }

    async fn update_field(
        &self,
        _tenant_id: &str,
        submission_id: &str,
        field: &str,
        value: serde_json::Value,
    ) -> Result<(), CollaboratorError> {
        let mut all = self.fields.write().await;
        all.entry(submission_id.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn create_task(
        &self,
        _tenant_id: &str,
        title: &str,
        _assignee: Option<&str>,
    ) -> Result<(), CollaboratorError> {
        self.tasks.lock().await.push(title.to_string());
        Ok(())
    }

    async fn assign_user(
        &self,
        _tenant_id: &str,
        submission_id: &str,
        user_id: &str,
        _role: Option<&str>,
    ) -> Result<(), CollaboratorError> {
        let mut all = self.fields.write().await;
        all.entry(submission_id.to_string())
            .or_default()
            .insert("assigned_to".to_string(), serde_json::json!(user_id));
        Ok(())
    }
}

/// Dispatcher that records every notification instead of delivering it
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn deliver(&self, notification: Notification) -> Result<(), CollaboratorError> {
        self.sent.lock().await.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use crate::model::{StepKind, StepSettings, StepTemplate, TemplateSettings};

    fn template() -> WorkflowTemplate {
        WorkflowTemplate {
            id: "tpl".to_string(),
            tenant_id: "acme".to_string(),
            name: "review".to_string(),
            description: None,
            active: true,
            steps: vec![StepTemplate {
                id: "review".to_string(),
                name: "Review".to_string(),
                kind: StepKind::Review,
                order: 1,
                required: true,
                assignees: vec![],
                conditions: vec![],
                actions: vec![],
                timeout: None,
                settings: StepSettings::default(),
            }],
            settings: TemplateSettings::default(),
        }
    }

    #[tokio::test]
    async fn test_template_store_is_tenant_scoped() {
        let store = MemoryTemplateStore::new();
        store.put(template()).await.unwrap();

        assert!(store.get("acme", "tpl").await.unwrap().is_some());
        assert!(store.get("other", "tpl").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_execution_store_rejects_duplicate_insert() {
        let store = MemoryExecutionStore::new();
        let execution = WorkflowExecution::new(
            &template(),
            "sub-1",
            "alice",
            Priority::Normal,
            chrono::Utc::now(),
        );

        store.insert(execution.clone()).await.unwrap();
        assert!(matches!(
            store.insert(execution).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_execution_lock_serializes_holders() {
        let store = Arc::new(MemoryExecutionStore::new());

        let first = store.lock("exec-1").await;
        let contender = {
            let store = store.clone();
            tokio::spawn(async move {
                let _guard = store.lock("exec-1").await;
            })
        };

        // The contender cannot acquire while the first guard is held.
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_static_identity_resolver() {
        let resolver = StaticIdentityResolver::new().with_role("qc", &["alice", "bob"]);

        let members = resolver.members_of_role("acme", "qc").await.unwrap();
        assert_eq!(members, vec!["alice", "bob"]);
        assert!(resolver.members_of_role("acme", "missing").await.is_err());
    }
}
