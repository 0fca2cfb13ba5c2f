//! Backend implementations.
//!
//! Each backend implements [`AnswerBackend`](crate::llm::traits::AnswerBackend) and owns
//! everything about its wire format: URLs, headers, request bodies and the mapping of
//! HTTP outcomes to user-facing replies.
//!
//! - `project_agent` - project agents API with a bearer token, polled against a deadline
//! - `rest_agent` - agent thread REST API with an `api-key`, polled a fixed number of times
//! - `chat_completion` - single chat completion call, the last link of the chain

pub mod chat_completion;
pub mod project_agent;
pub mod project_client;
pub mod rest_agent;

pub use chat_completion::ChatCompletionProvider;
pub use project_agent::ProjectAgentProvider;
pub use project_client::ProjectAgentsClient;
pub use rest_agent::RestAgentProvider;

use crate::RelayError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

/// Headers for the API-key authenticated REST surfaces
pub fn api_key_headers(api_key: &str) -> Result<HeaderMap, RelayError> {
    let mut key = HeaderValue::from_str(api_key)
        .map_err(|_| RelayError::configuration_error("API key contains invalid header characters"))?;
    key.set_sensitive(true);

    let mut headers = json_headers();
    headers.insert("api-key", key);
    Ok(headers)
}

/// Headers for the bearer-token authenticated project surface
pub fn bearer_headers(token: &str) -> Result<HeaderMap, RelayError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| RelayError::authentication_error("Access token contains invalid header characters"))?;
    value.set_sensitive(true);

    let mut headers = json_headers();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Build the HTTP session for a single invocation
///
/// Sessions are never shared between questions; the client is dropped when
/// the invocation returns.
pub fn session(headers: HeaderMap, timeout: Duration) -> Result<reqwest::Client, RelayError> {
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| RelayError::internal_error(format!("Failed to build HTTP client: {}", e)))
}
