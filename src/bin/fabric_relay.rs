//! fabric-relay command line entry point
//!
//! ```text
//! fabric-relay serve
//! fabric-relay ask "Which region sold the most last month?"
//! fabric-relay action getCurrentWeather '{"location":"Los Angeles","unit":"c"}'
//! ```

use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use fabric_relay::actions::create_default_actions;
use fabric_relay::config::RelayConfig;
use fabric_relay::telemetry::{init_logging, LoggingConfig};
use fabric_relay::FallbackOrchestrator;
use std::sync::Arc;
use tracing::{info, warn};

fn cli() -> Command {
    Command::new("fabric-relay")
        .about("Relay chat questions to Azure AI Foundry agents with backend fallback")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .help("Configuration file (.toml, .yaml, .yml or .json); environment overrides apply"),
        )
        .subcommand_required(true)
        .subcommand(Command::new("serve").about("Serve the action HTTP surface"))
        .subcommand(
            Command::new("ask")
                .about("Answer one question through the fallback chain")
                .arg(Arg::new("question").required(true).index(1)),
        )
        .subcommand(
            Command::new("action")
                .about("Run one named action with a JSON payload")
                .arg(Arg::new("name").required(true).index(1))
                .arg(Arg::new("payload").default_value("{}").index(2)),
        )
}

fn report_dotenv(result: Result<std::path::PathBuf, dotenvy::Error>) {
    match result {
        Ok(path) => info!("Read dotenv file from: {}", path.display()),
        Err(dotenvy::Error::Io(io_error)) if io_error.kind() == std::io::ErrorKind::NotFound => {
            info!("No dotenv file found")
        }
        Err(err) => warn!("Error reading dotenv file: {}", err),
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<RelayConfig> {
    let config = match matches.get_one::<String>("config") {
        Some(path) => RelayConfig::from_file(path)
            .with_context(|| format!("reading configuration from {}", path))?
            .merge_with_env()?,
        None => RelayConfig::from_env()?,
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    // Logging reads its own settings from the environment, so .env goes first
    let dotenv = dotenvy::dotenv();
    let _guard = init_logging(LoggingConfig::from_env())?;
    report_dotenv(dotenv);

    let config = load_config(&matches)?;
    info!(
        host = %config.bot.host,
        port = config.bot.port,
        agent_configured = config.foundry.has_agent(),
        project_available = config.project.is_available(),
        "Configuration loaded"
    );

    let orchestrator = Arc::new(FallbackOrchestrator::from_config(&config));
    let actions = create_default_actions(orchestrator.clone()).await?;

    match matches.subcommand() {
        Some(("serve", _)) => serve(actions, &orchestrator, &config).await?,
        Some(("ask", sub)) => {
            let question = sub.get_one::<String>("question").map(String::as_str).unwrap_or_default();
            println!("{}", orchestrator.answer(question).await);
        }
        Some(("action", sub)) => {
            let name = sub.get_one::<String>("name").map(String::as_str).unwrap_or_default();
            let raw = sub.get_one::<String>("payload").map(String::as_str).unwrap_or("{}");
            let payload: serde_json::Value =
                serde_json::from_str(raw).context("action payload must be JSON")?;
            println!("{}", actions.dispatch(name, &payload).await);
        }
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}

#[cfg(feature = "http")]
async fn serve(
    actions: fabric_relay::actions::ActionRegistry,
    orchestrator: &FallbackOrchestrator,
    config: &RelayConfig,
) -> anyhow::Result<()> {
    fabric_relay::server::RelayServer::new(actions, orchestrator, config.bot.port)
        .with_host(config.bot.host.clone())
        .start()
        .await?;
    Ok(())
}

#[cfg(not(feature = "http"))]
async fn serve(
    _actions: fabric_relay::actions::ActionRegistry,
    _orchestrator: &FallbackOrchestrator,
    _config: &RelayConfig,
) -> anyhow::Result<()> {
    anyhow::bail!("fabric-relay was built without the `http` feature")
}
