//! Project agent backend.
//!
//! Resolves a bearer token through the credential chain, then runs the question
//! on the configured agent: fetch agent, create thread, post message, create run,
//! and poll against a wall-clock deadline. Any error is returned to the
//! orchestrator, which decides whether to fall back.

use super::project_client::{ProjectAgentsClient, ThreadMessage};
use crate::config::RelayConfig;
use crate::credentials::CredentialChain;
use crate::llm::extractor::latest_assistant;
use crate::llm::poller::{Clock, PollConclusion, PollPolicy, RunPoller};
use crate::llm::traits::{AnswerBackend, BackendKind, ConversationHandle, InvokeOutcome, MessageRecord};
use crate::replies;
use crate::RelayError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug)]
pub struct ProjectAgentProvider {
    endpoint: String,
    api_version: String,
    agent_id: String,
    scope: String,
    timeout: Duration,
    credentials: CredentialChain,
    poller: RunPoller,
}

impl ProjectAgentProvider {
    pub fn from_config(config: &RelayConfig, clock: Arc<dyn Clock>) -> Self {
        let credentials = CredentialChain::from_config(&config.credentials, config.http.request_timeout);
        Self::with_credentials(config, clock, credentials)
    }

    /// Use a caller supplied credential chain instead of the configured one
    pub fn with_credentials(
        config: &RelayConfig,
        clock: Arc<dyn Clock>,
        credentials: CredentialChain,
    ) -> Self {
        if !config.project.connection_string.is_empty() {
            info!("Project connection string configured; using the project endpoint");
        }
        info!(providers = ?credentials.provider_names(), "Project agent credential chain");
        let policy = PollPolicy::deadline(
            config.polling.project_interval,
            config.polling.project_deadline,
        );
        Self {
            endpoint: config.project.base_endpoint().to_string(),
            api_version: config.project.api_version.clone(),
            agent_id: config.foundry.agent_id.clone(),
            scope: config.credentials.scope.clone(),
            timeout: config.http.request_timeout,
            credentials,
            poller: RunPoller::new(clock, policy),
        }
    }

    async fn run(&self, question: &str) -> Result<InvokeOutcome, RelayError> {
        let token = self.credentials.resolve(&self.scope).await?;
        let client = ProjectAgentsClient::new(&self.endpoint, &self.api_version, &token, self.timeout)?;

        let agent = client.get_agent(&self.agent_id).await?;
        info!(
            agent_id = %agent.id,
            agent_name = agent.name.as_deref().unwrap_or(""),
            model = agent.model.as_deref().unwrap_or(""),
            "Agent resolved"
        );

        let thread = client.create_thread().await?;
        let message = client.create_message(&thread.id, question).await?;
        let run = client.create_run(&thread.id, &agent.id).await?;
        info!(
            thread_id = %thread.id,
            message_id = %message.id,
            run_id = %run.id,
            status = %run.status,
            "Run created"
        );

        let handle = ConversationHandle::new(thread.id, run.id.clone());
        let conclusion = self.poller.drive(&client, &handle, Some(run.snapshot())).await?;
        Ok(conclude(conclusion))
    }
}

/// Map a finished poll to the reply the user sees
fn conclude(conclusion: PollConclusion<ThreadMessage>) -> InvokeOutcome {
    match conclusion {
        PollConclusion::Failed(snapshot) => {
            InvokeOutcome::Failed(replies::project_run_failed(snapshot.last_error.as_deref()))
        }
        PollConclusion::TimedOut { waited, checks } => {
            warn!(waited_ms = waited.as_millis() as u64, checks, "Project run timed out");
            InvokeOutcome::Failed(replies::PROJECT_RUN_TIMEOUT.to_string())
        }
        PollConclusion::Completed(messages) => {
            info!(count = messages.len(), "Thread messages listed");
            let Some(assistant) = latest_assistant(&messages).filter(|m| m.has_content()) else {
                return InvokeOutcome::Failed(replies::PROJECT_NO_ASSISTANT.to_string());
            };
            match assistant.text().filter(|text| !text.is_empty()) {
                Some(text) => InvokeOutcome::Answered(replies::with_header(&text)),
                None => InvokeOutcome::Failed(replies::PROJECT_EMPTY_TEXT.to_string()),
            }
        }
    }
}

#[async_trait]
impl AnswerBackend for ProjectAgentProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::ProjectAgent
    }

    async fn invoke(&self, question: &str) -> Result<InvokeOutcome, RelayError> {
        info!(agent_id = %self.agent_id, "Submitting question to project agent");
        self.run(question).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::traits::{RunSnapshot, RunStatus};
    use serde_json::json;

    fn message(role: &str, created_at: i64, parts: serde_json::Value) -> ThreadMessage {
        serde_json::from_value(json!({
            "id": format!("msg_{}", created_at),
            "role": role,
            "created_at": created_at,
            "content": parts
        }))
        .unwrap()
    }

    fn text(value: &str) -> serde_json::Value {
        json!([{"type": "text", "text": {"value": value}}])
    }

    #[test]
    fn test_latest_assistant_message_wins() {
        let outcome = conclude(PollConclusion::Completed(vec![
            message("assistant", 20, text("newest")),
            message("user", 10, text("question")),
            message("assistant", 15, text("older")),
        ]));
        assert_eq!(
            outcome,
            InvokeOutcome::Answered("**Fabric 數據代理程式回應：**\n\nnewest".to_string())
        );
    }

    #[test]
    fn test_missing_assistant_message() {
        let outcome = conclude(PollConclusion::Completed(vec![message("user", 1, text("q"))]));
        assert_eq!(outcome, InvokeOutcome::Failed("未找到助手回應".to_string()));

        let outcome = conclude(PollConclusion::Completed(vec![message("assistant", 1, json!([]))]));
        assert_eq!(outcome, InvokeOutcome::Failed("未找到助手回應".to_string()));
    }

    #[test]
    fn test_assistant_without_text() {
        let outcome = conclude(PollConclusion::Completed(vec![message(
            "assistant",
            1,
            json!([{"type": "image_file", "image_file": {"file_id": "f"}}]),
        )]));
        assert_eq!(outcome, InvokeOutcome::Failed("無法提取回應文字，請稍後再試".to_string()));
    }

    #[test]
    fn test_failed_and_timed_out_runs() {
        let outcome = conclude(PollConclusion::Failed(
            RunSnapshot::new(RunStatus::Failed).with_error("rate limited"),
        ));
        assert_eq!(outcome, InvokeOutcome::Failed("Agent 運行失敗: rate limited".to_string()));

        let outcome = conclude(PollConclusion::Failed(RunSnapshot::new(RunStatus::Cancelled)));
        assert_eq!(outcome, InvokeOutcome::Failed("Agent 運行失敗: 未知錯誤".to_string()));

        let outcome = conclude(PollConclusion::TimedOut {
            waited: Duration::from_secs(61),
            checks: 61,
        });
        assert_eq!(outcome, InvokeOutcome::Failed("Agent 運行超時，請稍後再試".to_string()));
    }
}
