//! Bearer token resolution for the project agents API.
//!
//! Tokens come from an ordered [`CredentialChain`]. Each provider either hands
//! back a token or explains why it was skipped; the first token wins. The default
//! chain tries the Azure CLI login first and then an explicit service principal
//! from the environment.

use crate::config::CredentialConfig;
use crate::utils::logging::{obscure_credential, preview_body};
use crate::RelayError;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A bearer token and when it stops being valid
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    /// Expiry in seconds since the epoch, when known
    pub expires_on: Option<i64>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &obscure_credential(&self.token))
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// What a single provider produced
#[derive(Debug, Clone)]
pub enum CredentialAttempt {
    Token(AccessToken),
    Skipped { reason: String },
}

impl CredentialAttempt {
    fn skipped(reason: impl Into<String>) -> Self {
        CredentialAttempt::Skipped {
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait TokenCredentialProvider: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    async fn get_token(&self, scope: &str) -> CredentialAttempt;
}

/// Token from the signed-in Azure CLI account
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    program: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
}

impl AzureCliCredential {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl TokenCredentialProvider for AzureCliCredential {
    fn name(&self) -> &'static str {
        "azure_cli"
    }

    async fn get_token(&self, scope: &str) -> CredentialAttempt {
        let output = tokio::process::Command::new(&self.program)
            .args(["account", "get-access-token", "--scope", scope, "--output", "json"])
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => return CredentialAttempt::skipped(format!("Azure CLI not available: {}", e)),
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return CredentialAttempt::skipped(format!(
                "Azure CLI returned {}: {}",
                output.status,
                preview_body(stderr.trim(), 200)
            ));
        }

        match serde_json::from_slice::<CliToken>(&output.stdout) {
            Ok(parsed) => CredentialAttempt::Token(AccessToken {
                token: parsed.access_token,
                expires_on: parsed.expires_on,
            }),
            Err(e) => CredentialAttempt::skipped(format!("Unreadable Azure CLI output: {}", e)),
        }
    }
}

/// Service principal credentials exchanged at the authority token endpoint
#[derive(Clone)]
pub struct ClientSecretCredential {
    config: CredentialConfig,
    timeout: Duration,
}

impl std::fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("client_id", &self.config.client_id)
            .field("client_secret", &obscure_credential(&self.config.client_secret))
            .field("tenant_id", &self.config.tenant_id)
            .field("authority_host", &self.config.authority_host)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl ClientSecretCredential {
    pub fn from_config(config: &CredentialConfig, timeout: Duration) -> Self {
        Self {
            config: config.clone(),
            timeout,
        }
    }

    async fn request_token(&self, scope: &str) -> Result<CredentialAttempt, RelayError> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.authority_host.trim_end_matches('/'),
            self.config.tenant_id
        );
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| RelayError::internal_error(format!("Failed to build HTTP client: {}", e)))?;

        let response = client
            .post(url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(CredentialAttempt::skipped(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                preview_body(&body, 200)
            )));
        }

        let parsed: TokenResponse = response.json().await?;
        let expires_on = parsed
            .expires_in
            .map(|secs| chrono::Utc::now().timestamp() + secs);
        Ok(CredentialAttempt::Token(AccessToken {
            token: parsed.access_token,
            expires_on,
        }))
    }
}

#[async_trait]
impl TokenCredentialProvider for ClientSecretCredential {
    fn name(&self) -> &'static str {
        "client_secret"
    }

    async fn get_token(&self, scope: &str) -> CredentialAttempt {
        if !self.config.has_client_secret() {
            return CredentialAttempt::skipped(
                "AZURE_CLIENT_ID, AZURE_CLIENT_SECRET and AZURE_TENANT_ID are not all set",
            );
        }
        match self.request_token(scope).await {
            Ok(attempt) => attempt,
            Err(e) => CredentialAttempt::skipped(format!("token request failed: {}", e)),
        }
    }
}

/// Ordered list of providers; the first token wins
#[derive(Debug, Clone)]
pub struct CredentialChain {
    providers: Vec<Arc<dyn TokenCredentialProvider>>,
}

impl CredentialChain {
    pub fn new(providers: Vec<Arc<dyn TokenCredentialProvider>>) -> Self {
        Self { providers }
    }

    /// Azure CLI first, then the service principal from configuration
    pub fn from_config(config: &CredentialConfig, timeout: Duration) -> Self {
        Self::new(vec![
            Arc::new(AzureCliCredential::new(config.cli_program.clone())),
            Arc::new(ClientSecretCredential::from_config(config, timeout)),
        ])
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Ask each provider in order until one yields a token
    pub async fn resolve(&self, scope: &str) -> Result<AccessToken, RelayError> {
        let mut reasons = Vec::new();
        for provider in &self.providers {
            match provider.get_token(scope).await {
                CredentialAttempt::Token(token) => {
                    info!(provider = provider.name(), "Obtained access token");
                    return Ok(token);
                }
                CredentialAttempt::Skipped { reason } => {
                    debug!(provider = provider.name(), reason = %reason, "Credential provider skipped");
                    reasons.push(format!("{}: {}", provider.name(), reason));
                }
            }
        }

        warn!(attempts = reasons.len(), "No credential provider produced a token");
        Err(RelayError::authentication_error(format!(
            "需要設定 Azure 認證環境變數或重新登入 Azure CLI ({})",
            reasons.join("; ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn secret_config(authority: &str) -> CredentialConfig {
        CredentialConfig {
            client_id: "client".to_string(),
            client_secret: "s3cr3t-value".to_string(),
            tenant_id: "tenant".to_string(),
            authority_host: authority.to_string(),
            ..CredentialConfig::default()
        }
    }

    #[tokio::test]
    async fn test_missing_cli_is_skipped() {
        let credential = AzureCliCredential::new("fabric-relay-no-such-program");
        let attempt = credential.get_token("https://ai.azure.com/.default").await;
        assert!(matches!(attempt, CredentialAttempt::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_incomplete_service_principal_is_skipped() {
        let mut config = secret_config("http://127.0.0.1:1");
        config.tenant_id.clear();
        let credential = ClientSecretCredential::from_config(&config, Duration::from_secs(5));
        match credential.get_token("scope").await {
            CredentialAttempt::Skipped { reason } => assert!(reason.contains("AZURE_TENANT_ID")),
            other => panic!("unexpected attempt: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_secret_token_exchange() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/tenant/oauth2/v2.0/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "client".into()),
                Matcher::UrlEncoded("scope".into(), "https://ai.azure.com/.default".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"token-123","expires_in":3600,"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let chain = CredentialChain::new(vec![
            Arc::new(AzureCliCredential::new("fabric-relay-no-such-program")),
            Arc::new(ClientSecretCredential::from_config(
                &secret_config(&server.url()),
                Duration::from_secs(5),
            )),
        ]);
        let token = chain.resolve("https://ai.azure.com/.default").await.unwrap();
        assert_eq!(token.token, "token-123");
        assert!(token.expires_on.is_some());
        assert!(!format!("{:?}", token).contains("token-123"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chain_exhausted_is_auth_error() {
        let mut config = secret_config("http://127.0.0.1:1");
        config.client_secret.clear();
        config.cli_program = "fabric-relay-no-such-program".to_string();
        let chain = CredentialChain::from_config(&config, Duration::from_secs(5));
        assert_eq!(chain.provider_names(), vec!["azure_cli", "client_secret"]);

        let error = chain.resolve("scope").await.unwrap_err();
        assert!(error.is_auth_error());
        assert!(error.to_string().contains("Azure CLI"));
    }

    #[tokio::test]
    async fn test_rejected_secret_is_skipped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/tenant/oauth2/v2.0/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;

        let credential = ClientSecretCredential::from_config(
            &secret_config(&server.url()),
            Duration::from_secs(5),
        );
        match credential.get_token("scope").await {
            CredentialAttempt::Skipped { reason } => assert!(reason.contains("401")),
            other => panic!("unexpected attempt: {:?}", other),
        }
    }
}
