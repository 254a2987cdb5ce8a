//! Assignee resolution
//!
//! Expands abstract assignee references (user, role, group, conditional)
//! into a concrete, de-duplicated set of user IDs. Resolution happens once,
//! at step activation; the result is snapshotted onto the step execution and
//! later membership changes do not alter who may decide an active step.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;

use crate::engine::conditions::evaluate_conditions;
use crate::model::AssigneeRef;
use crate::store::{DataSnapshot, IdentityResolver};

#[derive(Clone)]
pub struct AssigneeResolver {
    identity: Arc<dyn IdentityResolver>,
}

impl AssigneeResolver {
    pub fn new(identity: Arc<dyn IdentityResolver>) -> Self {
        Self { identity }
    }

    /// Resolve a list of references into a sorted, de-duplicated user set.
    /// Identity collaborator failures are logged and the reference skipped;
    /// they never fail the calling state transition.
    pub async fn resolve(
        &self,
        refs: &[AssigneeRef],
        tenant_id: &str,
        data: &DataSnapshot,
    ) -> Vec<String> {
        let mut users = BTreeSet::new();

        for assignee_ref in refs {
            match assignee_ref {
                AssigneeRef::User { id } => {
                    users.insert(id.clone());
                }
                AssigneeRef::Role { role } => {
                    match self.identity.members_of_role(tenant_id, role).await {
                        Ok(members) => users.extend(members),
                        Err(e) => warn!(role = %role, error = %e, "role expansion failed"),
                    }
                }
                AssigneeRef::Group { group } => {
                    match self.identity.members_of_group(tenant_id, group).await {
                        Ok(members) => users.extend(members),
                        Err(e) => warn!(group = %group, error = %e, "group expansion failed"),
                    }
                }
                AssigneeRef::Conditional { id, conditions } => {
                    if evaluate_conditions(conditions, data) {
                        users.insert(id.clone());
                    }
                }
            }
        }

        users.into_iter().collect()
    }
}
