//! Actions shipped with the relay
//!
//! - [`QueryFabricDataAgentAction`] - forwards `question` to the fallback orchestrator
//! - [`GetCurrentWeatherAction`] - fixed demo weather readings
//! - [`GetNicknameAction`] - fixed demo city nicknames

use super::{string_param, Action, ActionError, ActionRegistry};
use crate::orchestrator::FallbackOrchestrator;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

struct Reading {
    fahrenheit: &'static str,
    celsius: &'static str,
}

static WEATHER: Lazy<HashMap<&'static str, Reading>> = Lazy::new(|| {
    HashMap::from([
        (
            "San Francisco, CA",
            Reading {
                fahrenheit: "71.6F",
                celsius: "22C",
            },
        ),
        (
            "Los Angeles",
            Reading {
                fahrenheit: "75.2F",
                celsius: "24C",
            },
        ),
    ])
});

static NICKNAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([("San Francisco, CA", "The Golden City"), ("Los Angeles", "LA")])
});

/// Forward a data question to the backend chain
#[derive(Debug)]
pub struct QueryFabricDataAgentAction {
    orchestrator: Arc<FallbackOrchestrator>,
}

impl QueryFabricDataAgentAction {
    pub fn new(orchestrator: Arc<FallbackOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Action for QueryFabricDataAgentAction {
    fn name(&self) -> &str {
        "queryFabricDataAgent"
    }

    fn description(&self) -> &str {
        "Ask the Fabric data agent a question about the organisation's data"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {"type": "string", "description": "The question to ask"}
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, parameters: &Value) -> Result<String, ActionError> {
        let question = string_param(parameters, "question").unwrap_or_default();
        info!(chars = question.chars().count(), "queryFabricDataAgent invoked");
        Ok(self.orchestrator.answer(question).await)
    }
}

#[derive(Debug, Default)]
pub struct GetCurrentWeatherAction;

#[async_trait]
impl Action for GetCurrentWeatherAction {
    fn name(&self) -> &str {
        "getCurrentWeather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a location"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {"type": "string", "description": "City and state, e.g. San Francisco, CA"},
                "unit": {"type": "string", "enum": ["c", "f"]}
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, parameters: &Value) -> Result<String, ActionError> {
        let location = string_param(parameters, "location").unwrap_or_default();
        let Some(reading) = WEATHER.get(location) else {
            return Ok(format!("No weather data for ${} found", location));
        };

        // Absent and empty unit both mean Fahrenheit
        match string_param(parameters, "unit").filter(|u| !u.is_empty()) {
            None | Some("f") => Ok(reading.fahrenheit.to_string()),
            Some("c") => Ok(reading.celsius.to_string()),
            Some(other) => Err(ActionError::invalid_parameters(format!(
                "unsupported unit '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Default)]
pub struct GetNicknameAction;

#[async_trait]
impl Action for GetNicknameAction {
    fn name(&self) -> &str {
        "getNickname"
    }

    fn description(&self) -> &str {
        "Get the nickname of a city"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {"type": "string", "description": "City and state, e.g. San Francisco, CA"}
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, parameters: &Value) -> Result<String, ActionError> {
        let location = string_param(parameters, "location").unwrap_or_default();
        Ok(match NICKNAMES.get(location) {
            Some(nickname) => nickname.to_string(),
            None => format!("No nickname for ${} found", location),
        })
    }
}

/// Registry with every built-in action
pub async fn create_default_actions(
    orchestrator: Arc<FallbackOrchestrator>,
) -> Result<ActionRegistry, ActionError> {
    let registry = ActionRegistry::new();
    registry
        .register_action(Arc::new(QueryFabricDataAgentAction::new(orchestrator)))
        .await?;
    registry.register_action(Arc::new(GetCurrentWeatherAction)).await?;
    registry.register_action(Arc::new(GetNicknameAction)).await?;
    Ok(registry)
}
