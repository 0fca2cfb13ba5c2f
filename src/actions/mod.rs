//! Named actions invoked by the chat planner.
//!
//! The chat platform decides which action to run and passes its JSON payload.
//! Each [`Action`] returns the plain reply text. [`ActionRegistry::dispatch`] is
//! the boundary towards the chat adapter: it never fails, and any error from an
//! action is logged and replaced with a fixed apology.

pub mod builtin;

pub use builtin::{
    create_default_actions, GetCurrentWeatherAction, GetNicknameAction, QueryFabricDataAgentAction,
};

use crate::replies;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// A named operation the planner can call
#[async_trait]
pub trait Action: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the payload
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, parameters: &Value) -> Result<String, ActionError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ActionError {
    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    #[error("Action not found: {name}")]
    ActionNotFound { name: String },

    #[error("Duplicate action name: {name}")]
    DuplicateAction { name: String },

    #[error("Action execution failed: {message}")]
    ExecutionFailed { message: String },
}

impl ActionError {
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        ActionError::InvalidParameters {
            message: message.into(),
        }
    }
}

impl From<ActionError> for crate::RelayError {
    fn from(error: ActionError) -> Self {
        match error {
            ActionError::InvalidParameters { message } => crate::RelayError::invalid_input(message),
            other => crate::RelayError::action_error(other.to_string()),
        }
    }
}

/// Shared, clone-friendly set of actions keyed by name
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: Arc<RwLock<HashMap<String, Arc<dyn Action>>>>,
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry").finish_non_exhaustive()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action; names must be unique
    pub async fn register_action(&self, action: Arc<dyn Action>) -> Result<(), ActionError> {
        let name = action.name().to_string();
        let mut actions = self.actions.write().await;
        if actions.contains_key(&name) {
            return Err(ActionError::DuplicateAction { name });
        }
        actions.insert(name.clone(), action);
        info!(action = %name, "Registered action");
        Ok(())
    }

    pub async fn execute_action(&self, name: &str, parameters: &Value) -> Result<String, ActionError> {
        let action = {
            let actions = self.actions.read().await;
            actions
                .get(name)
                .cloned()
                .ok_or_else(|| ActionError::ActionNotFound {
                    name: name.to_string(),
                })?
        };
        action.execute(parameters).await
    }

    /// Run an action and always produce a reply for the chat user
    pub async fn dispatch(&self, name: &str, parameters: &Value) -> String {
        match self.execute_action(name, parameters).await {
            Ok(reply) => reply,
            Err(e) => {
                let error = crate::RelayError::from(e);
                if error.is_user_error() {
                    warn!(action = %name, error = %error, "Action rejected its payload");
                } else {
                    error!(action = %name, error = %error, "Unhandled action error");
                }
                replies::ACTION_FAILURE.to_string()
            }
        }
    }

    /// Registered names, sorted
    pub async fn action_names(&self) -> Vec<String> {
        let actions = self.actions.read().await;
        let mut names: Vec<String> = actions.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn has_action(&self, name: &str) -> bool {
        self.actions.read().await.contains_key(name)
    }

    /// Name, description and payload schema of every action
    pub async fn get_action_schemas(&self) -> Vec<Value> {
        let actions = self.actions.read().await;
        let mut schemas: Vec<Value> = actions
            .values()
            .map(|action| {
                serde_json::json!({
                    "name": action.name(),
                    "description": action.description(),
                    "parameters": action.parameters_schema()
                })
            })
            .collect();
        schemas.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        schemas
    }
}

/// Read an optional string field from an action payload
pub(crate) fn string_param<'a>(parameters: &'a Value, key: &str) -> Option<&'a str> {
    parameters.get(key).and_then(Value::as_str)
}
