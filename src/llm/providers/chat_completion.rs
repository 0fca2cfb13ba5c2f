//! Chat completion backend.
//!
//! One `POST {endpoint}/openai/deployments/{model}/chat/completions` call. This is
//! the base case of the fallback chain: every outcome, transport failures included,
//! becomes a reply and nothing is passed on.

use super::{api_key_headers, session};
use crate::config::RelayConfig;
use crate::llm::traits::{AnswerBackend, BackendKind, InvokeOutcome};
use crate::replies;
use crate::utils::logging::{obscure_credential, preview_body};
use crate::RelayError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl CompletionResponse {
    fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
            .filter(|content| !content.is_empty())
    }
}

/// Chat completion deployment reached with an `api-key` header
pub struct ChatCompletionProvider {
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl std::fmt::Debug for ChatCompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionProvider")
            .field("endpoint", &self.endpoint)
            .field("api_key", &obscure_credential(&self.api_key))
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl ChatCompletionProvider {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            endpoint: config.foundry.base_endpoint().to_string(),
            api_key: config.foundry.api_key.clone(),
            deployment: config.foundry.model_name.clone(),
            api_version: config.foundry.api_version.clone(),
            max_tokens: config.completion.max_tokens,
            temperature: config.completion.temperature,
            timeout: config.http.request_timeout,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    /// Ask the deployment and turn every outcome into a reply
    pub async fn complete(&self, question: &str) -> InvokeOutcome {
        match self.request(question).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(backend = %BackendKind::ChatCompletion, error = %e, "Chat completion call failed");
                InvokeOutcome::Failed(replies::completion_call_failed(&e))
            }
        }
    }

    async fn request(&self, question: &str) -> Result<InvokeOutcome, RelayError> {
        let client = session(api_key_headers(&self.api_key)?, self.timeout)?;
        let body = serde_json::json!({
            "messages": [{"role": "user", "content": question}],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream": false
        });

        info!(deployment = %self.deployment, "Sending chat completion request");
        let response = client.post(self.url()).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %preview_body(&text, 500),
                "Chat completion returned an error status"
            );
            return Ok(InvokeOutcome::Failed(replies::completion_unavailable(
                status.as_u16(),
            )));
        }

        let parsed: CompletionResponse = response.json().await?;
        match parsed.first_content() {
            Some(content) => {
                info!(chars = content.chars().count(), "Chat completion answered");
                Ok(InvokeOutcome::Answered(replies::with_header(content)))
            }
            None => {
                warn!("Chat completion returned no content");
                Ok(InvokeOutcome::Failed(replies::COMPLETION_EMPTY.to_string()))
            }
        }
    }
}

#[async_trait]
impl AnswerBackend for ChatCompletionProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::ChatCompletion
    }

    async fn invoke(&self, question: &str) -> Result<InvokeOutcome, RelayError> {
        Ok(self.complete(question).await)
    }
}
