use clap::{Parser, Subcommand};
use promptfan_core::{GatewayConfig, GenerationRequest, ProviderMode};
use promptfan_engine::{BatchOrchestrator, ExecutionEngine};
use promptfan_gateway::GatewayServer;
use promptfan_providers::ProviderRegistry;
use promptfan_sink::build_sink;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Parser)]
#[command(name = "promptfan", about = "Promptfan: fan one prompt out to many LLM calls")]
struct Cli {
    /// Path to config file (falls back to $CONFIG_PATH, then config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config and $PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one batch locally and print the result as JSON
    Run {
        /// Issue all attempts of a model at once
        #[arg(long)]
        parallel: bool,
    },
    /// Show the configured providers and their models
    Providers,
}

fn config_path(flag: Option<PathBuf>, env: Option<String>) -> PathBuf {
    flag.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

async fn build_orchestrator(config: GatewayConfig) -> anyhow::Result<BatchOrchestrator> {
    let sink = build_sink(&config.sink, &config.credentials).await?;
    info!(sink = %sink.name(), "Log sink ready");

    let registry = ProviderRegistry::with_builtins();
    let engine = ExecutionEngine::new(&config.execution, sink);
    info!(
        attempts = engine.attempts(),
        delay = ?engine.delay(),
        "Execution engine ready"
    );
    Ok(BatchOrchestrator::new(
        Arc::new(config),
        Arc::new(registry),
        engine,
    ))
}

/// Human-readable listing for `promptfan providers`.
fn providers_report(config: &GatewayConfig, registry: &ProviderRegistry) -> Vec<String> {
    let mut lines = Vec::new();
    match config.default.mode() {
        Ok(mode) => {
            let kind = match mode {
                ProviderMode::Single(_) => "single",
                ProviderMode::Multi(_) => "multi",
            };
            lines.push(format!("Mode: {kind} ({})", mode.names().join(", ")));
        }
        Err(e) => lines.push(format!("Mode: unset ({e})")),
    }

    if config.providers.is_empty() {
        lines.push("No providers configured.".to_string());
        return lines;
    }

    lines.push("Providers:".to_string());
    for (name, section) in &config.providers {
        let marker = if registry.contains(name) {
            ""
        } else {
            " [unknown backend]"
        };
        lines.push(format!("  {name}{marker}"));
        for model in &section.models {
            lines.push(format!("    {model}"));
        }
    }
    lines.push(format!(
        "Attempts per model: {}",
        config.execution.attempts
    ));
    lines
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    if let Err(e) = dotenvy::dotenv() {
        warn!(error = %e, "No .env file loaded");
    }

    let cli = Cli::parse();
    let path = config_path(cli.config, std::env::var("CONFIG_PATH").ok());
    let config = GatewayConfig::load(&path)?;
    info!(config = %path.display(), "Configuration loaded");

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let orchestrator = build_orchestrator(config).await?;
            let app = GatewayServer::build(Arc::new(orchestrator));

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Promptfan gateway listening on {addr}");
            axum::serve(listener, app).await?;
        }
        Commands::Run { parallel } => {
            let orchestrator = build_orchestrator(config).await?;
            let response = orchestrator.run(GenerationRequest { parallel }).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Providers => {
            let registry = ProviderRegistry::with_builtins();
            for line in providers_report(&config, &registry) {
                println!("{line}");
            }
        }
    }

    Ok(())
}
