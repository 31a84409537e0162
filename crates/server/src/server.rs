//! Router assembly and HTTP serving

use axum::extract::Request;
use axum::http::{HeaderValue, Method};
use axum::{Router, ServiceExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::Layer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use vv_common::{Database, Error, Result, Storage, VvConfig};

use crate::execution::ExecutionService;
use crate::llm::{select_provider, LlmProvider};
use crate::scripts::ScriptService;

/// Shared state handed to every handler
pub struct AppState {
    pub config: VvConfig,
    pub db: Database,
    pub storage: Storage,
    pub llm: Arc<dyn LlmProvider>,
    pub scripts: ScriptService,
    pub executor: ExecutionService,
}

impl AppState {
    /// Open storage and database and pick the LLM provider from config
    pub fn new(config: VvConfig) -> Result<Self> {
        let llm = select_provider(&config.llm);
        Self::with_provider(config, llm)
    }

    pub fn with_provider(config: VvConfig, llm: Arc<dyn LlmProvider>) -> Result<Self> {
        let storage = Storage::new(&config.data_dir)?;
        let db = Database::open_location(&config.database)?;
        let scripts = ScriptService::new(storage.clone());
        let executor = ExecutionService::new(storage.clone(), &config.execution);

        info!(
            "State ready: data_dir={}, llm={}",
            storage.base().display(),
            llm.provider_name()
        );

        Ok(Self {
            config,
            db,
            storage,
            llm,
            scripts,
            executor,
        })
    }
}

fn cors_layer(frontend_url: &str) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if frontend_url.trim() == "*" {
        return Ok(layer.allow_origin(Any));
    }
    let origin = HeaderValue::from_str(frontend_url.trim_end_matches('/')).map_err(|e| {
        Error::InvalidConfig(format!("invalid frontend origin {:?}: {}", frontend_url, e))
    })?;
    Ok(layer.allow_origin(origin))
}

/// Full application: API routes, CORS for the frontend, request tracing and
/// trailing-slash normalization.
pub fn app(state: Arc<AppState>) -> Result<NormalizePath<Router>> {
    let cors = cors_layer(&state.config.frontend_url)?;
    let router = crate::api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(NormalizePathLayer::trim_trailing_slash().layer(router))
}

/// Bind and serve until ctrl-c
pub async fn serve(config: VvConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config.bind_addr.parse()?;
    let state = Arc::new(AppState::new(config)?);
    let app = app(state)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("V&V API listening on http://{}", addr);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
