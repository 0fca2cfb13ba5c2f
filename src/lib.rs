//! Relay chat questions to Azure AI Foundry agents with a multi-backend fallback chain.
//!
//! A question arrives through the `queryFabricDataAgent` action and is answered by
//! the first backend in the chain that can serve it:
//!
//! 1. the project agents API, authenticated with a bearer token from the credential chain
//! 2. the agent thread REST API, authenticated with an `api-key`
//! 3. a plain chat completion deployment
//!
//! Agent runs are polled to completion and the assistant's reply is extracted from the
//! thread. Whatever happens, the chat user gets a plain text reply.
//!
//! # Quick Start
//!
//! ```no_run
//! use fabric_relay::config::RelayConfig;
//! use fabric_relay::FallbackOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig::from_env()?;
//!     config.validate()?;
//!
//!     let orchestrator = FallbackOrchestrator::from_config(&config);
//!     let reply = orchestrator.answer("Which region had the highest sales last quarter?").await;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`orchestrator`] - backend selection and fallback
//! - [`llm`] - backends, run polling and reply extraction
//! - [`credentials`] - bearer token provider chain
//! - [`actions`] - named actions exposed to the chat planner
//! - [`config`] - file and environment configuration
//! - [`telemetry`] - logging setup

pub mod actions;
pub mod config;
pub mod credentials;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod replies;
#[cfg(feature = "http")]
pub mod server;
pub mod telemetry;
pub mod utils;

pub use error::RelayError;
pub use orchestrator::FallbackOrchestrator;

pub type Result<T> = std::result::Result<T, RelayError>;
