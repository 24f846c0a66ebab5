//! HTTP front end for the pick generator.

pub mod config;
pub mod picks_routes;
pub mod request_id;

use anyhow::Context;
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use llm_client::{OpenAiClient, OpenAiConfig};
use market_data::{OfflineProvider, PolygonClient};
use pick_pipeline::{PickPipeline, PipelineConfig, ReferenceData};
use pick_store::{
    CachedMarketData, KeyValueCache, MemoryCache, RecommendationStore, RedisCache, StoreError,
    DEFAULT_MARKET_TTL,
};
use picks_core::{classify_message, LanguageModel, LlmError, MarketDataProvider, PickError};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::ServerConfig;

/// Shared handler state. Everything inside is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// `None` when no API key is configured
    pub llm: Option<Arc<dyn LanguageModel>>,
    pub market: Arc<dyn MarketDataProvider>,
    pub reference: Arc<ReferenceData>,
    pub pipeline_config: PipelineConfig,
    pub cache: Arc<dyn KeyValueCache>,
    pub store: Option<RecommendationStore>,
    pub cache_ttl: Duration,
}

impl AppState {
    /// State with no external services: offline market data, memory cache,
    /// no store.
    pub fn new(llm: Option<Arc<dyn LanguageModel>>, pipeline_config: PipelineConfig) -> Self {
        Self {
            llm,
            market: Arc::new(OfflineProvider),
            reference: Arc::new(ReferenceData::builtin()),
            pipeline_config,
            cache: Arc::new(MemoryCache::new()),
            store: None,
            cache_ttl: Duration::from_secs(3600),
        }
    }

    pub fn with_market(mut self, market: Arc<dyn MarketDataProvider>) -> Self {
        self.market = market;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn KeyValueCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_store(mut self, store: RecommendationStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Wire real services from configuration. Redis and the database are
    /// optional; an unreachable Redis falls back to the in-memory cache.
    pub async fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let llm: Option<Arc<dyn LanguageModel>> = match &config.openai_api_key {
            Some(key) => {
                let mut llm_config = OpenAiConfig::new(key.clone());
                if let Some(base_url) = &config.openai_base_url {
                    llm_config = llm_config.with_base_url(base_url.clone());
                }
                let client: Arc<dyn LanguageModel> = Arc::new(OpenAiClient::new(llm_config)?);
                Some(client)
            }
            None => {
                warn!("OPENAI_API_KEY not set; pick generation will be rejected");
                None
            }
        };

        let cache: Arc<dyn KeyValueCache> = match &config.redis_url {
            Some(url) => match RedisCache::connect(url).await {
                Ok(redis) => {
                    info!("Connected to Redis cache");
                    Arc::new(redis)
                }
                Err(e) => {
                    warn!("Redis unavailable ({}), using in-memory cache", e);
                    Arc::new(MemoryCache::new())
                }
            },
            None => Arc::new(MemoryCache::new()),
        };

        let vendor: Arc<dyn MarketDataProvider> = match &config.polygon_api_key {
            Some(key) => Arc::new(PolygonClient::new(key.clone(), config.polygon_rate_limit)),
            None => {
                warn!("POLYGON_API_KEY not set; enrichment will use reference data");
                Arc::new(OfflineProvider)
            }
        };
        let market = Arc::new(CachedMarketData::new(vendor, cache.clone(), DEFAULT_MARKET_TTL));

        let store = match &config.database_url {
            Some(url) => Some(
                RecommendationStore::connect(url)
                    .await
                    .context("Failed to connect to recommendation database")?,
            ),
            None => None,
        };

        let pipeline_config = PipelineConfig::default().with_fallback_policy(config.fallback_policy);
        let pipeline_config = match config.calls_per_minute() {
            Some(calls) => pipeline_config.with_pacing(calls),
            None => {
                warn!("Pipeline pacing disabled; upstream calls are not rate limited");
                pipeline_config.without_pacing()
            }
        };

        Ok(Self {
            llm,
            market,
            reference: Arc::new(ReferenceData::builtin()),
            pipeline_config,
            cache,
            store,
            cache_ttl: config.cache_ttl,
        })
    }

    /// Pipeline for one request. Fails before any upstream call when the
    /// language model is not configured.
    pub fn pipeline(&self) -> Result<PickPipeline, PickError> {
        let llm = self.llm.clone().ok_or(LlmError::MissingApiKey)?;
        Ok(PickPipeline::new(
            llm,
            self.market.clone(),
            self.reference.clone(),
            self.pipeline_config.clone(),
        ))
    }
}

/// Envelope for read endpoints
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data }
    }
}

/// Structured JSON error:
/// `{error, message, context, success: false, timestamp, errorType}`
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error_type: &'static str,
    pub message: String,
    pub context: &'static str,
}

impl AppError {
    pub fn new(status: StatusCode, error_type: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_type,
            message: message.into(),
            context: "api",
        }
    }

    pub fn in_context(mut self, context: &'static str) -> Self {
        self.context = context;
        self
    }

    fn title(&self) -> &'static str {
        match self.error_type {
            "invalid_request" => "Invalid request",
            "authentication" => "Authentication failed",
            "rate_limit" => "Rate limit exceeded",
            "timeout" => "Request timed out",
            "service_unavailable" => "Service unavailable",
            "configuration" => "Server misconfigured",
            _ => "Internal server error",
        }
    }
}

impl From<PickError> for AppError {
    fn from(err: PickError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, err.error_type(), err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        let (status, error_type) = classify_message(&message);
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, error_type, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(context = self.context, error_type = self.error_type, "{}", self.message);
        } else {
            warn!(context = self.context, error_type = self.error_type, "{}", self.message);
        }
        let body = json!({
            "error": self.title(),
            "message": self.message,
            "context": self.context,
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "errorType": self.error_type,
        });
        (self.status, Json(body)).into_response()
    }
}

async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "llmConfigured": state.llm.is_some(),
        "marketData": state.market.provider_name(),
        "cache": state.cache.backend_name(),
        "storeConfigured": state.store.is_some(),
        "fallbackPolicy": state.pipeline_config.fallback_policy.as_str(),
    }))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(picks_routes::picks_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(request_id::make_span))
                .layer(middleware::from_fn(request_id::request_id_middleware))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn run_server() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    let state = AppState::from_config(&config).await?;
    let app = build_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Pick server listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
