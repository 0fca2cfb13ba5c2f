//! Typed client for the project agents API.
//!
//! Every call carries a bearer token and `?api-version=` from configuration.
//! Non-success responses become [`RelayError::HttpStatus`]; the caller decides
//! whether that is worth a fallback.

use super::{bearer_headers, session};
use crate::credentials::AccessToken;
use crate::llm::poller::RunSource;
use crate::llm::traits::{ConversationHandle, MessageRecord, RunSnapshot, RunStatus};
use crate::utils::logging::preview_body;
use crate::RelayError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on message list pages fetched for one thread
const MAX_MESSAGE_PAGES: usize = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentThread {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadRun {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

impl ThreadRun {
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            status: self.status.clone(),
            last_error: self.last_error.as_ref().and_then(|e| e.message.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageText {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<MessageText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

impl MessageRecord for ThreadMessage {
    fn role(&self) -> &str {
        &self.role
    }

    /// All `text` parts joined in order
    fn text(&self) -> Option<String> {
        if self.content.is_empty() {
            return None;
        }
        Some(
            self.content
                .iter()
                .filter(|part| part.kind == "text")
                .filter_map(|part| part.text.as_ref())
                .map(|text| text.value.as_str())
                .collect(),
        )
    }

    fn created_at(&self) -> Option<i64> {
        self.created_at
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MessagePage {
    #[serde(default)]
    data: Vec<ThreadMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

#[derive(Serialize)]
struct NewMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct NewRun<'a> {
    assistant_id: &'a str,
}

/// Client for one project, holding one bearer-token session
#[derive(Debug)]
pub struct ProjectAgentsClient {
    endpoint: String,
    api_version: String,
    http: reqwest::Client,
}

impl ProjectAgentsClient {
    pub fn new(
        endpoint: &str,
        api_version: &str,
        token: &AccessToken,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
            http: session(bearer_headers(&token.token)?, timeout)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, self.api_version)
    }

    async fn read<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, RelayError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(operation = what, status = status.as_u16(), body = %preview_body(&body, 500), "Project API call failed");
            return Err(RelayError::http_status(status.as_u16(), body));
        }
        debug!(operation = what, status = status.as_u16(), "Project API call succeeded");
        Ok(response.json().await?)
    }

    pub async fn get_agent(&self, agent_id: &str) -> Result<AgentDefinition, RelayError> {
        let url = self.url(&format!("/assistants/{}", agent_id));
        self.read(self.http.get(url), "get_agent").await
    }

    pub async fn create_thread(&self) -> Result<AgentThread, RelayError> {
        let url = self.url("/threads");
        self.read(self.http.post(url).json(&serde_json::json!({})), "create_thread")
            .await
    }

    pub async fn create_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<ThreadMessage, RelayError> {
        let url = self.url(&format!("/threads/{}/messages", thread_id));
        let body = NewMessage {
            role: "user",
            content,
        };
        self.read(self.http.post(url).json(&body), "create_message").await
    }

    pub async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<ThreadRun, RelayError> {
        let url = self.url(&format!("/threads/{}/runs", thread_id));
        let body = NewRun {
            assistant_id: agent_id,
        };
        self.read(self.http.post(url).json(&body), "create_run").await
    }

    pub async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<ThreadRun, RelayError> {
        let url = self.url(&format!("/threads/{}/runs/{}", thread_id, run_id));
        self.read(self.http.get(url), "get_run").await
    }

    /// Every message of a thread, following `has_more` pagination
    pub async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, RelayError> {
        let mut messages = Vec::new();
        let mut after: Option<String> = None;

        for _ in 0..MAX_MESSAGE_PAGES {
            let mut request = self.http.get(self.url(&format!("/threads/{}/messages", thread_id)));
            if let Some(cursor) = &after {
                request = request.query(&[("after", cursor.as_str())]);
            }
            let page: MessagePage = self.read(request, "list_messages").await?;
            messages.extend(page.data);

            match (page.has_more, page.last_id) {
                (true, Some(last_id)) => after = Some(last_id),
                _ => break,
            }
        }

        Ok(messages)
    }
}

#[async_trait]
impl RunSource for ProjectAgentsClient {
    type Message = ThreadMessage;

    async fn run_status(&self, handle: &ConversationHandle) -> Result<RunSnapshot, RelayError> {
        let run = self.get_run(&handle.thread_id, &handle.run_id).await?;
        Ok(run.snapshot())
    }

    async fn thread_messages(
        &self,
        handle: &ConversationHandle,
    ) -> Result<Vec<ThreadMessage>, RelayError> {
        self.list_messages(&handle.thread_id).await
    }
}
