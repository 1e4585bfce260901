use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use rr_domain::config::{Config, ConfigSeverity};
use rr_gateway::api;
use rr_gateway::cli::{self, Cli, Command, ConfigCommand};
use rr_gateway::events;
use rr_gateway::state::AppState;
use rr_providers::{Gateway, ProviderRegistry};
use rr_sessions::{ConversationStore, SessionStore};
use rr_tts::TtsRenderer;
use rr_waves::WavePool;

/// Request-path concurrency guard (axum layer, not the workflow permit).
const MAX_CONCURRENT_REQUESTS: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, config_path) = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing(&config);
            if let Some(path) = &config_path {
                tracing::info!(path = %path.display(), "config loaded");
            } else {
                tracing::info!("no config file found, using defaults");
            }
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            cli::show(&config);
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            if !cli::validate(&config, config_path.as_deref()) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Version) => {
            println!("resonance {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone())),
        )
        .init();
}

/// Start the gateway with the given configuration.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("resonance starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Artifact store ───────────────────────────────────────────────
    let artifacts = Arc::new(
        SessionStore::new(config.artifacts.root.clone())
            .context("initializing artifact store")?,
    );
    tracing::info!(root = %config.artifacts.root.display(), "artifact store ready");

    // ── Conversations ────────────────────────────────────────────────
    let conversations = Arc::new(ConversationStore::new(
        config.llm.default_system_prompt.clone(),
    ));
    tracing::info!("conversation store ready");

    // ── LLM gateway ──────────────────────────────────────────────────
    let registry = ProviderRegistry::from_config(&config.llm);
    if registry.is_empty() {
        tracing::warn!(
            "no LLM providers initialized — the gateway will run but every \
             slot generation will fail"
        );
    } else {
        tracing::info!(providers = registry.len(), "LLM provider registry ready");
    }
    let gateway = Arc::new(Gateway::new(registry, &config.llm));

    // ── TTS renderer ─────────────────────────────────────────────────
    let tts = Arc::new(TtsRenderer::from_config(&config.tts).context("initializing TTS")?);
    tracing::info!(base_url = %config.tts.base_url, "TTS renderer ready");

    // ── Wave pool + event orchestrator ──────────────────────────────
    let (wave_tx, wave_rx) = tokio::sync::mpsc::unbounded_channel();
    let waves = if config.waves.enabled {
        Some(Arc::new(WavePool::start(
            &config.waves,
            config.artifacts.root.clone(),
            wave_tx,
        )))
    } else {
        tracing::info!("wave decomposition disabled by config");
        None
    };

    let push = Arc::new(events::PushChannel::new(config.events.ws_enabled));
    let events = events::spawn(&config.events, push, wave_rx);
    tracing::info!(
        ws_enabled = config.events.ws_enabled,
        "event orchestrator ready"
    );

    // ── App state ────────────────────────────────────────────────────
    let state = AppState {
        config: config.clone(),
        gateway,
        tts,
        conversations,
        artifacts,
        waves,
        events,
        workflow_permit: Arc::new(tokio::sync::Semaphore::new(1)),
    };

    // ── Router ───────────────────────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors_origins);
    let app = api::router(&state)
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(
            MAX_CONCURRENT_REQUESTS,
        ))
        .with_state(state);

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "resonance listening");

    axum::serve(listener, app)
        .await
        .context("axum server error")?;

    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins may carry a trailing `*` wildcard for the port segment
/// (e.g. `http://localhost:*`). A literal `"*"` allows all origins
/// (not recommended outside the gallery floor).
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    use axum::http::header;

    if origins.len() == 1 && origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            // The port remainder must be digits only, so a prefix like
            // "http://localhost:3000.evil.com" cannot sneak through.
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
