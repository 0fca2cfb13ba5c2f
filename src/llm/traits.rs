//! Core traits for the backend abstraction layer.
//!
//! Three very different services can answer a question. They all reduce to an
//! [`AnswerBackend`] whose [`InvokeOutcome`] tells the orchestrator whether the
//! question was answered, failed with a user-facing reason, or should move on to
//! the next backend in the chain.

use crate::RelayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Backend kinds in fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Token authenticated project agents API
    ProjectAgent,
    /// API-key authenticated agent thread API
    RestAgent,
    /// API-key authenticated chat completion deployment
    ChatCompletion,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::ProjectAgent => "project_agent",
            BackendKind::RestAgent => "rest_agent",
            BackendKind::ChatCompletion => "chat_completion",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an agent run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
    Expired,
    /// Any status this crate does not know about; polling continues
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Parse a wire status, mapping unrecognised values to [`RunStatus::Unknown`]
    pub fn parse(value: &str) -> Self {
        match value {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "requires_action" => RunStatus::RequiresAction,
            "cancelling" => RunStatus::Cancelling,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            "cancelled" => RunStatus::Cancelled,
            "expired" => RunStatus::Expired,
            _ => RunStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(thread, run)` pair created for exactly one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHandle {
    pub thread_id: String,
    pub run_id: String,
}

impl ConversationHandle {
    pub fn new(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
        }
    }
}

/// One observation of a run's state
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub status: RunStatus,
    /// Backend supplied failure detail, when any
    pub last_error: Option<String>,
}

impl RunSnapshot {
    pub fn new(status: RunStatus) -> Self {
        Self {
            status,
            last_error: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.last_error = Some(message.into());
        self
    }
}

/// Narrow view over a thread message, whatever its payload shape
pub trait MessageRecord {
    /// Author role, e.g. `assistant` or `user`
    fn role(&self) -> &str;

    /// Text content of the message; `None` when it carries no text part
    fn text(&self) -> Option<String>;

    /// Creation time in seconds since the epoch, when the backend reports one
    fn created_at(&self) -> Option<i64> {
        None
    }

    fn is_assistant(&self) -> bool {
        self.role() == "assistant"
    }
}

/// Result of asking one backend a question
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutcome {
    /// A final answer, header included
    Answered(String),
    /// A final user-facing failure message; the chain stops here
    Failed(String),
    /// The backend cannot serve this question; try the next one
    NeedsFallback { reason: String },
}

impl InvokeOutcome {
    pub fn needs_fallback(reason: impl Into<String>) -> Self {
        InvokeOutcome::NeedsFallback {
            reason: reason.into(),
        }
    }
}

/// A backend able to answer a single question
///
/// Implementations build their own HTTP session per call and must not retry
/// beyond their own poll budget.
#[async_trait]
pub trait AnswerBackend: Send + Sync + std::fmt::Debug {
    /// Which link of the chain this backend is
    fn kind(&self) -> BackendKind;

    /// Submit the question and wait for the answer
    async fn invoke(&self, question: &str) -> Result<InvokeOutcome, RelayError>;
}
