//! Agent thread REST backend.
//!
//! Four sequential calls against `{endpoint}/openai/assistants/{agent}/threads`:
//! create a thread, post the question, start a run, then poll the run a fixed
//! number of times. A thread that cannot be created, or a transport failure
//! before a run exists, hands the question to the next backend.

use super::{api_key_headers, session};
use crate::config::RelayConfig;
use crate::llm::extractor::{first_assistant_text, json_messages, JsonMessage};
use crate::llm::poller::{Clock, PollConclusion, PollPolicy, RunPoller, RunSource};
use crate::llm::traits::{
    AnswerBackend, BackendKind, ConversationHandle, InvokeOutcome, RunSnapshot, RunStatus,
};
use crate::replies;
use crate::utils::logging::{obscure_credential, preview_body};
use crate::RelayError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Agent thread API reached with an `api-key` header
pub struct RestAgentProvider {
    endpoint: String,
    api_key: String,
    agent_id: String,
    api_version: String,
    timeout: Duration,
    poller: RunPoller,
}

impl std::fmt::Debug for RestAgentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestAgentProvider")
            .field("endpoint", &self.endpoint)
            .field("api_key", &obscure_credential(&self.api_key))
            .field("agent_id", &self.agent_id)
            .field("poll_policy", &self.poller.policy())
            .finish()
    }
}

impl RestAgentProvider {
    pub fn from_config(config: &RelayConfig, clock: Arc<dyn Clock>) -> Self {
        let policy = PollPolicy::attempts(
            config.polling.rest_interval,
            config.polling.rest_max_attempts,
        );
        Self {
            endpoint: config.foundry.base_endpoint().to_string(),
            api_key: config.foundry.api_key.clone(),
            agent_id: config.foundry.agent_id.clone(),
            api_version: config.foundry.api_version.clone(),
            timeout: config.http.request_timeout,
            poller: RunPoller::new(clock, policy),
        }
    }

    fn threads_url(&self, suffix: &str) -> String {
        format!(
            "{}/openai/assistants/{}/threads{}?api-version={}",
            self.endpoint, self.agent_id, suffix, self.api_version
        )
    }

    async fn submit(&self, question: &str) -> Result<InvokeOutcome, RelayError> {
        let client = session(api_key_headers(&self.api_key)?, self.timeout)?;

        let response = client.post(self.threads_url("")).json(&json!({})).send().await?;
        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %preview_body(&body, 500),
                "Thread creation rejected, handing over to chat completion"
            );
            return Ok(InvokeOutcome::needs_fallback(format!(
                "thread creation returned {}",
                status.as_u16()
            )));
        }
        let thread_id = id_field(response.json().await?, "thread")?;
        info!(thread_id = %thread_id, "Thread created");

        let response = client
            .post(self.threads_url(&format!("/{}/messages", thread_id)))
            .json(&json!({"role": "user", "content": question}))
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            error!(thread_id = %thread_id, status = status.as_u16(), body = %preview_body(&body, 500), "Posting message failed");
            return Ok(InvokeOutcome::Failed(replies::rest_message_failed(
                status.as_u16(),
            )));
        }

        let response = client
            .post(self.threads_url(&format!("/{}/runs", thread_id)))
            .json(&json!({}))
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            error!(thread_id = %thread_id, status = status.as_u16(), body = %preview_body(&body, 500), "Starting run failed");
            return Ok(InvokeOutcome::Failed(replies::rest_run_create_failed(
                status.as_u16(),
            )));
        }
        let run_id = id_field(response.json().await?, "run")?;
        info!(thread_id = %thread_id, run_id = %run_id, "Run started");

        let handle = ConversationHandle::new(thread_id, run_id);
        let source = RestRunSource {
            client: &client,
            provider: self,
        };
        Ok(self.await_answer(&source, &handle).await)
    }

    async fn await_answer(
        &self,
        source: &RestRunSource<'_>,
        handle: &ConversationHandle,
    ) -> InvokeOutcome {
        match self.poller.drive(source, handle, None).await {
            Ok(conclusion) => conclude(conclusion),
            Err(RelayError::HttpStatus { status, .. }) => {
                InvokeOutcome::Failed(replies::rest_status_check_failed(status))
            }
            Err(e) => {
                error!(thread_id = %handle.thread_id, run_id = %handle.run_id, error = %e, "Waiting for run failed");
                InvokeOutcome::Failed(replies::rest_wait_failed(&e))
            }
        }
    }
}

/// Map a finished poll to the reply the user sees
fn conclude(conclusion: PollConclusion<JsonMessage>) -> InvokeOutcome {
    match conclusion {
        PollConclusion::Completed(messages) => match first_assistant_text(&messages) {
            Some(text) => InvokeOutcome::Answered(replies::with_header(&text)),
            None => InvokeOutcome::Failed(replies::REST_NO_CONTENT.to_string()),
        },
        PollConclusion::Failed(snapshot) => {
            InvokeOutcome::Failed(replies::rest_run_ended(snapshot.status.as_str()))
        }
        PollConclusion::TimedOut { .. } => InvokeOutcome::Failed(replies::REST_RUN_TIMEOUT.to_string()),
    }
}

fn id_field(body: Value, what: &str) -> Result<String, RelayError> {
    body.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RelayError::backend_error(format!("{} response has no id", what)))
}

/// Run state read through the same session that created the run
struct RestRunSource<'a> {
    client: &'a reqwest::Client,
    provider: &'a RestAgentProvider,
}

#[async_trait]
impl<'a> RunSource for RestRunSource<'a> {
    type Message = JsonMessage;

    async fn run_status(&self, handle: &ConversationHandle) -> Result<RunSnapshot, RelayError> {
        let url = self
            .provider
            .threads_url(&format!("/{}/runs/{}", handle.thread_id, handle.run_id));
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %preview_body(&body, 500), "Run status check failed");
            return Err(RelayError::http_status(status.as_u16(), body));
        }

        let body: Value = response.json().await?;
        let run_status = body
            .get("status")
            .and_then(Value::as_str)
            .map(RunStatus::parse)
            .unwrap_or(RunStatus::Unknown);
        Ok(RunSnapshot::new(run_status))
    }

    async fn thread_messages(
        &self,
        handle: &ConversationHandle,
    ) -> Result<Vec<JsonMessage>, RelayError> {
        let url = self
            .provider
            .threads_url(&format!("/{}/messages", handle.thread_id));
        let response = self.client.get(url).send().await?;
        if response.status() != StatusCode::OK {
            warn!(status = response.status().as_u16(), "Listing thread messages failed");
            return Ok(Vec::new());
        }
        let body: Value = response.json().await?;
        Ok(json_messages(&body))
    }
}

#[async_trait]
impl AnswerBackend for RestAgentProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::RestAgent
    }

    async fn invoke(&self, question: &str) -> Result<InvokeOutcome, RelayError> {
        info!(agent_id = %self.agent_id, "Submitting question to agent thread API");
        self.submit(question).await
    }
}
