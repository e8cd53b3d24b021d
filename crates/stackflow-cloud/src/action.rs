//! Action types for cloud resource management

use crate::provider::ResourceSet;
use crate::state::ProviderState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Represents a planned action for a cloud resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action
    pub id: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Provider responsible for the resource
    pub provider: String,

    /// Resource type (e.g., "s3-bucket")
    pub resource_type: String,

    /// Logical resource identifier
    pub resource_id: String,

    /// Description of the action
    pub description: String,

    /// Additional details about the action
    pub details: HashMap<String, serde_json::Value>,
}

impl Action {
    fn new(provider: &str, action_type: ActionType, resource_type: &str, resource_id: &str) -> Self {
        let description = match action_type {
            ActionType::Create => format!("create {} {}", resource_type, resource_id),
            ActionType::Update => format!("update {} {}", resource_type, resource_id),
            ActionType::Delete => format!("delete {} {}", resource_type, resource_id),
            ActionType::NoOp => format!("{} {} is up to date", resource_type, resource_id),
        };

        Self {
            id: format!("{}-{}-{}", action_type, resource_type, resource_id),
            action_type,
            provider: provider.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            description,
            details: HashMap::new(),
        }
    }

    /// Resource key (type:id) within the provider
    pub fn resource_key(&self) -> String {
        format!("{}:{}", self.resource_type, self.resource_id)
    }

    /// Key of the resource in the stack state (provider:type:id)
    pub fn state_key(&self) -> String {
        format!("{}:{}", self.provider, self.resource_key())
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource
    Update,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Result of applying actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Successfully applied actions
    pub succeeded: Vec<ActionResult>,

    /// Failed actions
    pub failed: Vec<ActionResult>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, action_id: String, message: String) {
        self.succeeded.push(ActionResult {
            action_id,
            success: true,
            message,
            error: None,
        });
    }

    pub fn add_failure(&mut self, action_id: String, error: String) {
        self.failed.push(ActionResult {
            action_id,
            success: false,
            message: String::new(),
            error: Some(error),
        });
    }
}

impl Default for ApplyResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a single action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// ID of the action
    pub action_id: String,

    /// Whether the action succeeded
    pub success: bool,

    /// Success message
    pub message: String,

    /// Error message if failed
    pub error: Option<String>,
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            has_changes: false,
        }
    }

    /// Compute the actions that converge `current` to `desired` for one provider
    ///
    /// Creates and updates come first in resource-key order, deletes last.
    pub fn diff(provider: &str, desired: &ResourceSet, current: &ProviderState) -> Self {
        let mut actions = Vec::new();

        for resource in desired.iter().filter(|r| r.provider == provider) {
            let action_type = match current.get(&resource.key()) {
                None => ActionType::Create,
                Some(existing) if existing.inputs != resource.config => ActionType::Update,
                Some(_) => ActionType::NoOp,
            };

            let mut action = Action::new(provider, action_type, &resource.resource_type, &resource.id);
            if action_type == ActionType::Update {
                action.details.insert("desired".to_string(), resource.config.clone());
            }
            actions.push(action);
        }

        let mut orphans: Vec<_> = current
            .iter()
            .filter(|(key, _)| !desired.resources.contains_key(*key))
            .collect();
        orphans.sort_by(|a, b| a.0.cmp(b.0));

        for (key, state) in orphans {
            let resource_id = key
                .strip_prefix(&format!("{}:", state.resource_type))
                .unwrap_or(key.as_str());
            let mut action = Action::new(provider, ActionType::Delete, &state.resource_type, resource_id);
            action
                .details
                .insert("physical_id".to_string(), serde_json::json!(state.id));
            actions.push(action);
        }

        Self::new(actions)
    }

    /// Append the actions of another plan
    pub fn extend(&mut self, other: Plan) {
        self.has_changes |= other.has_changes;
        self.actions.extend(other.actions);
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.create, self.update, self.delete, self.no_change
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ResourceConfig;
    use crate::state::ResourceState;
    use serde_json::json;

    fn bucket(id: &str, config: serde_json::Value) -> ResourceConfig {
        ResourceConfig::new("s3-bucket", id, "aws", config)
    }

    fn recorded(id: &str, inputs: serde_json::Value) -> (String, ResourceState) {
        (
            format!("s3-bucket:{}", id),
            ResourceState::new(format!("{}-1234567", id), "s3-bucket").with_inputs(inputs),
        )
    }

    #[test]
    fn test_diff_empty_state_creates_everything() {
        let mut desired = ResourceSet::new();
        desired.add(bucket("demo", json!({})));

        let plan = Plan::diff("aws", &desired, &ProviderState::new());
        assert!(plan.has_changes);
        assert_eq!(plan.summary().create, 1);
        assert_eq!(plan.actions[0].state_key(), "aws:s3-bucket:demo");
    }

    #[test]
    fn test_diff_classifies_changes() {
        let mut desired = ResourceSet::new();
        desired.add(bucket("same", json!({"tags": {"env": "dev"}})));
        desired.add(bucket("changed", json!({"tags": {"env": "prod"}})));

        let mut current = ProviderState::new();
        for (key, state) in [
            recorded("same", json!({"tags": {"env": "dev"}})),
            recorded("changed", json!({"tags": {"env": "dev"}})),
            recorded("gone", json!({})),
        ] {
            current.add(key, state);
        }

        let plan = Plan::diff("aws", &desired, &current);
        let summary = plan.summary();
        assert_eq!(summary.update, 1);
        assert_eq!(summary.no_change, 1);
        assert_eq!(summary.delete, 1);
        assert_eq!(summary.create, 0);

        let delete = plan.actions_by_type(ActionType::Delete)[0];
        assert_eq!(delete.resource_id, "gone");
        assert_eq!(plan.actions.last().unwrap().action_type, ActionType::Delete);
    }

    #[test]
    fn test_diff_no_changes() {
        let mut desired = ResourceSet::new();
        desired.add(bucket("demo", json!({})));
        let mut current = ProviderState::new();
        let (key, state) = recorded("demo", json!({}));
        current.add(key, state);

        let plan = Plan::diff("aws", &desired, &current);
        assert!(!plan.has_changes);
        assert_eq!(
            plan.summary().to_string(),
            "0 to create, 0 to update, 0 to delete, 1 unchanged"
        );
    }
}
