mod handlers;

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    Router, ServiceExt,
    extract::{ConnectInfo, FromRef},
    http::{HeaderValue, Method, Request, header},
};
use ci_analyzer_core::config::Config;
use ci_analyzer_db::Database;
use ci_analyzer_github::{GitHub, SourceControl};
use ci_analyzer_inference::{
    CompletionProvider, HttpRiskScorer, OpenAiProvider, RiskScorer, RootCauseAnalyzer,
};
use ci_analyzer_jobs::{JobContext, OutcomeStats};
use tokio::{net::TcpListener, signal};
use tower::{Layer as _, ServiceBuilder};
use tower_http::{
    ServiceBuilderExt,
    cors::{self, AllowOrigin, CorsLayer},
    normalize_path::{NormalizePath, NormalizePathLayer},
    trace::{DefaultOnResponse, MakeSpan, TraceLayer},
};
use tracing::{Level, Span};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::handlers::build_router;

#[derive(Clone, FromRef)]
pub struct AppState {
    db: Arc<Database>,
    jobs: JobContext,
    /// GitHub client holding the service credential. Webhook events that need it
    /// are refused when it is absent.
    github: Option<Arc<dyn SourceControl>>,
}

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::builder()
        // Default to info level
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    if let Err(e) = run().await {
        tracing::error!("{e:?}");
        std::process::exit(1);
    }
    tracing::info!("Shut down gracefully");
}

async fn run() -> Result<()> {
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yml".to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {config_path}"))?;

    let db = Database::new(&config.store);
    let github: Option<Arc<dyn SourceControl>> = match config.github.token() {
        Some(token) => Some(GitHub::new(&config.github, token)?),
        None => {
            tracing::warn!("No GitHub token configured; dispatched webhook events will be rejected");
            None
        }
    };
    let provider: Option<Arc<dyn CompletionProvider>> = match &config.ai {
        Some(ai) => Some(Arc::new(OpenAiProvider::new(ai))),
        None => {
            tracing::warn!("No AI provider configured; failed runs cannot be analyzed");
            None
        }
    };
    let scorer: Arc<dyn RiskScorer> = Arc::new(HttpRiskScorer::new(&config.risk)?);
    let jobs = JobContext {
        analyzer: RootCauseAnalyzer::new(provider),
        scorer,
        analyses: db.clone(),
        predictions: db.clone(),
        stats: Arc::new(OutcomeStats::default()),
    };
    let state = AppState { db, jobs, github };

    let router = ServiceExt::<axum::extract::Request>::into_make_service_with_connect_info::<
        SocketAddr,
    >(app(state, &config)?);
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.server.port));
    let listener = TcpListener::bind(addr).await.context("bind error")?;
    tracing::info!("Web server: Listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error")
}

/// Path normalization wraps the router so it applies before routing.
fn app(state: AppState, config: &Config) -> Result<NormalizePath<Router>> {
    let allow_origin = match &config.server.cors_origin {
        Some(origin) => AllowOrigin::exact(
            HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin {origin}"))?,
        ),
        None => cors::Any.into(),
    };
    let sensitive_headers: Arc<[_]> = vec![header::AUTHORIZATION, header::COOKIE].into();
    let middleware = ServiceBuilder::new()
        .sensitive_request_headers(sensitive_headers.clone())
        .sensitive_response_headers(sensitive_headers)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(MyMakeSpan { level: Level::INFO })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::new().allow_methods([Method::GET]).allow_origin(allow_origin))
        .compression();
    let router = build_router().with_state(state).layer(middleware);
    Ok(NormalizePathLayer::trim_trailing_slash().layer(router))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c().await;
    }
}

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
        // Leave shutdown to SIGTERM.
        std::future::pending::<()>().await;
    }
}

#[derive(Debug, Clone)]
pub struct MyMakeSpan {
    level: Level,
}

impl<B> MakeSpan<B> for MyMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let forwarded_for = request.headers().get("X-Forwarded-For");
        let ip = if let Some(v) = forwarded_for {
            str::from_utf8(v.as_bytes())
                .ok()
                .and_then(|s| s.split(',').next())
                .and_then(|s| IpAddr::from_str(s.trim()).ok())
        } else if let Some(ConnectInfo(socket_addr)) =
            request.extensions().get::<ConnectInfo<SocketAddr>>()
        {
            Some(socket_addr.ip())
        } else {
            None
        };
        let ip = ip.unwrap_or(IpAddr::from([0, 0, 0, 0]));
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("[unknown]");
        let event = request
            .headers()
            .get("X-GitHub-Event")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        macro_rules! make_span {
            ($level:expr) => {
                tracing::span!(
                    $level,
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    ip = %ip,
                    user_agent = %user_agent,
                    github_event = %event,
                )
            }
        }
        match self.level {
            Level::ERROR => make_span!(Level::ERROR),
            Level::WARN => make_span!(Level::WARN),
            Level::INFO => make_span!(Level::INFO),
            Level::DEBUG => make_span!(Level::DEBUG),
            Level::TRACE => make_span!(Level::TRACE),
        }
    }
}
