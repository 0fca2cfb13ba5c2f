//! Fallback orchestration across the answer backends.
//!
//! The chain for a question is computed from two facts: whether the project
//! backend is available and whether an agent id is configured.
//!
//! | project available | agent id | chain |
//! |---|---|---|
//! | yes | set | project agent → REST agent → chat completion |
//! | no | set | REST agent → chat completion |
//! | any | empty | chat completion |
//!
//! [`FallbackOrchestrator::answer`] never fails: every path ends in a reply
//! string for the chat user.

use crate::config::RelayConfig;
use crate::llm::poller::{Clock, TokioClock};
use crate::llm::providers::{ChatCompletionProvider, ProjectAgentProvider, RestAgentProvider};
use crate::llm::traits::{AnswerBackend, BackendKind, InvokeOutcome};
use crate::replies;
use crate::RelayError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Ordered preference list of backends for one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSelection {
    chain: Vec<BackendKind>,
}

impl BackendSelection {
    pub fn compute(project_available: bool, agent_configured: bool) -> Self {
        let chain = match (project_available, agent_configured) {
            (true, true) => vec![
                BackendKind::ProjectAgent,
                BackendKind::RestAgent,
                BackendKind::ChatCompletion,
            ],
            (false, true) => vec![BackendKind::RestAgent, BackendKind::ChatCompletion],
            (_, false) => vec![BackendKind::ChatCompletion],
        };
        Self { chain }
    }

    pub fn kinds(&self) -> &[BackendKind] {
        &self.chain
    }

    pub fn first(&self) -> Option<BackendKind> {
        self.chain.first().copied()
    }
}

/// When an error from a backend moves the question along the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
    /// Project agent errors continue with the REST backends
    pub on_project_failure: bool,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            on_project_failure: true,
        }
    }
}

/// Routes a question through the backend chain
#[derive(Debug)]
pub struct FallbackOrchestrator {
    project_available: bool,
    agent_configured: bool,
    policy: FallbackPolicy,
    backends: HashMap<BackendKind, Arc<dyn AnswerBackend>>,
}

impl FallbackOrchestrator {
    /// An orchestrator with no backends registered yet
    pub fn new(project_available: bool, agent_configured: bool, policy: FallbackPolicy) -> Self {
        Self {
            project_available,
            agent_configured,
            policy,
            backends: HashMap::new(),
        }
    }

    /// Register a backend under its own kind, replacing any previous one
    pub fn with_backend(mut self, backend: Arc<dyn AnswerBackend>) -> Self {
        self.backends.insert(backend.kind(), backend);
        self
    }

    /// Build all backends the configuration calls for, polling on the tokio clock
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::from_config_with_clock(config, Arc::new(TokioClock))
    }

    pub fn from_config_with_clock(config: &RelayConfig, clock: Arc<dyn Clock>) -> Self {
        let project_available = config.project.is_available();
        let agent_configured = config.foundry.has_agent();
        let policy = FallbackPolicy {
            on_project_failure: config.fallback.on_project_failure,
        };

        let mut orchestrator = Self::new(project_available, agent_configured, policy)
            .with_backend(Arc::new(ChatCompletionProvider::from_config(config)));
        if agent_configured {
            orchestrator = orchestrator
                .with_backend(Arc::new(RestAgentProvider::from_config(config, clock.clone())));
            if project_available {
                orchestrator = orchestrator
                    .with_backend(Arc::new(ProjectAgentProvider::from_config(config, clock)));
            }
        }

        info!(
            project_available,
            agent_configured,
            on_project_failure = policy.on_project_failure,
            "Fallback orchestrator configured"
        );
        orchestrator
    }

    pub fn selection(&self) -> BackendSelection {
        BackendSelection::compute(self.project_available, self.agent_configured)
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    /// Registered backends in chain order
    pub fn configured_backends(&self) -> Vec<BackendKind> {
        [
            BackendKind::ProjectAgent,
            BackendKind::RestAgent,
            BackendKind::ChatCompletion,
        ]
        .into_iter()
        .filter(|kind| self.backends.contains_key(kind))
        .collect()
    }

    /// Answer one question; always returns a reply
    pub async fn answer(&self, question: &str) -> String {
        let request_id = Uuid::new_v4();
        let span = info_span!("answer", request_id = %request_id);
        self.route(question).instrument(span).await
    }

    async fn route(&self, question: &str) -> String {
        if question.is_empty() {
            info!("Empty question, prompting for content");
            return replies::EMPTY_QUESTION.to_string();
        }

        let selection = self.selection();
        info!(chain = ?selection.kinds(), "Routing question");

        for kind in selection.kinds() {
            let Some(backend) = self.backends.get(kind) else {
                warn!(backend = %kind, "Backend selected but not registered, skipping");
                continue;
            };

            match backend.invoke(question).await {
                Ok(InvokeOutcome::Answered(text)) => {
                    info!(backend = %kind, "Question answered");
                    return text;
                }
                Ok(InvokeOutcome::Failed(text)) => {
                    warn!(backend = %kind, reply = %text, "Backend replied with a failure");
                    return text;
                }
                Ok(InvokeOutcome::NeedsFallback { reason }) => {
                    warn!(backend = %kind, reason = %reason, "Falling back to next backend");
                }
                Err(e) => {
                    for hint in auth_hints(*kind, &e) {
                        warn!(backend = %kind, hint = %hint, "Project agent authentication failed");
                    }
                    if !self.falls_back_on_error(*kind) {
                        error!(backend = %kind, error = %e, "Backend error ends the chain");
                        return error_reply(&e);
                    }
                    warn!(backend = %kind, error = %e, "Backend error, falling back to next backend");
                }
            }
        }

        error!("Every backend in the chain was exhausted");
        replies::GENERIC_FAILURE.to_string()
    }

    fn falls_back_on_error(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::ProjectAgent => self.policy.on_project_failure,
            BackendKind::RestAgent => true,
            BackendKind::ChatCompletion => false,
        }
    }
}

/// Ways to give the project backend a token
const AUTH_HINTS: &[&str] = &[
    "az login --scope https://ai.azure.com/.default",
    "export AZURE_CLIENT_ID=<client id> AZURE_CLIENT_SECRET=<client secret> AZURE_TENANT_ID=<tenant id>",
];

/// Remediation steps to log for a project agent authentication failure
fn auth_hints(kind: BackendKind, error: &RelayError) -> &'static [&'static str] {
    if kind == BackendKind::ProjectAgent && error.is_auth_error() {
        AUTH_HINTS
    } else {
        &[]
    }
}

/// User-facing reply for an error that ends the chain
pub fn error_reply(error: &RelayError) -> String {
    if error.is_network_error() {
        replies::NETWORK_FAILURE.to_string()
    } else {
        replies::GENERIC_FAILURE.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FakeBackend {
        kind: BackendKind,
        result: Result<InvokeOutcome, RelayError>,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn new(kind: BackendKind, result: Result<InvokeOutcome, RelayError>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                result,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnswerBackend for FakeBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        async fn invoke(&self, _question: &str) -> Result<InvokeOutcome, RelayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn answered(text: &str) -> Result<InvokeOutcome, RelayError> {
        Ok(InvokeOutcome::Answered(text.to_string()))
    }

    #[test]
    fn test_selection_table() {
        use BackendKind::*;
        assert_eq!(
            BackendSelection::compute(true, true).kinds(),
            &[ProjectAgent, RestAgent, ChatCompletion]
        );
        assert_eq!(
            BackendSelection::compute(false, true).kinds(),
            &[RestAgent, ChatCompletion]
        );
        assert_eq!(BackendSelection::compute(true, false).kinds(), &[ChatCompletion]);
        assert_eq!(BackendSelection::compute(false, false).first(), Some(ChatCompletion));
    }

    #[tokio::test]
    async fn test_empty_question_calls_nothing() {
        let chat = FakeBackend::new(BackendKind::ChatCompletion, answered("x"));
        let orchestrator = FallbackOrchestrator::new(false, false, FallbackPolicy::default())
            .with_backend(chat.clone());

        assert_eq!(orchestrator.answer("").await, "請提供您的問題內容");
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn test_first_backend_answer_stops_chain() {
        let project = FakeBackend::new(BackendKind::ProjectAgent, answered("from project"));
        let rest = FakeBackend::new(BackendKind::RestAgent, answered("from rest"));
        let chat = FakeBackend::new(BackendKind::ChatCompletion, answered("from chat"));
        let orchestrator = FallbackOrchestrator::new(true, true, FallbackPolicy::default())
            .with_backend(project.clone())
            .with_backend(rest.clone())
            .with_backend(chat.clone());

        assert_eq!(orchestrator.answer("q").await, "from project");
        assert_eq!((project.calls(), rest.calls(), chat.calls()), (1, 0, 0));
    }

    #[tokio::test]
    async fn test_two_fallbacks_reach_chat_completion() {
        let project = FakeBackend::new(
            BackendKind::ProjectAgent,
            Err(RelayError::authentication_error("no token")),
        );
        let rest = FakeBackend::new(
            BackendKind::RestAgent,
            Ok(InvokeOutcome::needs_fallback("thread creation returned 500")),
        );
        let chat = FakeBackend::new(BackendKind::ChatCompletion, answered("from chat"));
        let orchestrator = FallbackOrchestrator::new(true, true, FallbackPolicy::default())
            .with_backend(project.clone())
            .with_backend(rest.clone())
            .with_backend(chat.clone());

        assert_eq!(orchestrator.answer("q").await, "from chat");
        assert_eq!((project.calls(), rest.calls(), chat.calls()), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_failed_reply_does_not_fall_back() {
        let rest = FakeBackend::new(
            BackendKind::RestAgent,
            Ok(InvokeOutcome::Failed("執行超時，請稍後再試".to_string())),
        );
        let chat = FakeBackend::new(BackendKind::ChatCompletion, answered("from chat"));
        let orchestrator = FallbackOrchestrator::new(false, true, FallbackPolicy::default())
            .with_backend(rest.clone())
            .with_backend(chat.clone());

        assert_eq!(orchestrator.answer("q").await, "執行超時，請稍後再試");
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn test_project_failure_without_fallback_policy() {
        let project = FakeBackend::new(
            BackendKind::ProjectAgent,
            Err(RelayError::network_error("connection reset")),
        );
        let rest = FakeBackend::new(BackendKind::RestAgent, answered("from rest"));
        let orchestrator = FallbackOrchestrator::new(
            true,
            true,
            FallbackPolicy {
                on_project_failure: false,
            },
        )
        .with_backend(project.clone())
        .with_backend(rest.clone());

        assert_eq!(orchestrator.answer("q").await, "網路連接錯誤，請檢查您的網路連接");
        assert_eq!(rest.calls(), 0);
    }

    #[tokio::test]
    async fn test_chat_completion_error_maps_to_generic_reply() {
        let chat = FakeBackend::new(
            BackendKind::ChatCompletion,
            Err(RelayError::internal_error("client build failed")),
        );
        let orchestrator = FallbackOrchestrator::new(false, false, FallbackPolicy::default())
            .with_backend(chat);

        assert_eq!(orchestrator.answer("q").await, "查詢過程中發生錯誤，請稍後再試");
    }

    #[tokio::test]
    async fn test_unregistered_backend_is_skipped() {
        let chat = FakeBackend::new(BackendKind::ChatCompletion, answered("from chat"));
        let orchestrator = FallbackOrchestrator::new(true, true, FallbackPolicy::default())
            .with_backend(chat.clone());

        assert_eq!(orchestrator.answer("q").await, "from chat");
        assert_eq!(orchestrator.configured_backends(), vec![BackendKind::ChatCompletion]);
    }

    #[tokio::test]
    async fn test_exhausted_chain() {
        let orchestrator = FallbackOrchestrator::new(false, false, FallbackPolicy::default());
        assert_eq!(orchestrator.answer("q").await, "查詢過程中發生錯誤，請稍後再試");
    }

    #[test]
    fn test_from_config_registers_backends() {
        let mut config = RelayConfig::default();
        config.foundry.endpoint = "https://example.services.ai.azure.com".to_string();
        config.foundry.api_key = "k".to_string();
        let orchestrator = FallbackOrchestrator::from_config(&config);
        assert_eq!(orchestrator.configured_backends(), vec![BackendKind::ChatCompletion]);

        config.foundry.agent_id = "asst_1".to_string();
        config.project.endpoint = "https://example.services.ai.azure.com/api/projects/p".to_string();
        let orchestrator = FallbackOrchestrator::from_config(&config);
        assert_eq!(
            orchestrator.configured_backends(),
            vec![
                BackendKind::ProjectAgent,
                BackendKind::RestAgent,
                BackendKind::ChatCompletion
            ]
        );
        assert_eq!(orchestrator.selection().first(), Some(BackendKind::ProjectAgent));
    }

    #[test]
    fn test_auth_hints_only_for_project_auth_failures() {
        let auth = RelayError::authentication_error("no token");
        let hints = auth_hints(BackendKind::ProjectAgent, &auth);
        assert!(hints.iter().any(|h| h.contains("az login --scope https://ai.azure.com/.default")));
        assert!(hints.iter().any(|h| h.contains("AZURE_CLIENT_SECRET")));

        let forbidden = RelayError::http_status(403, "forbidden");
        assert!(!auth_hints(BackendKind::ProjectAgent, &forbidden).is_empty());

        assert!(auth_hints(BackendKind::RestAgent, &auth).is_empty());
        let network = RelayError::network_error("reset");
        assert!(auth_hints(BackendKind::ProjectAgent, &network).is_empty());
    }
}
