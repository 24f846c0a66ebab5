//! Pick generation routes
//!
//! `POST /api/generate-picks` runs the full pipeline for one set of criteria;
//! `GET /api/picks/recent` reads back persisted picks.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use pick_pipeline::filter::{MAX_PICKS, MIN_QUANTITATIVE_SCORE, MIN_RISK_REWARD, MIN_TECHNICAL_SCORE};
use pick_pipeline::{PipelineRun, RunStats};
use pick_store::{criteria_cache_key, set_json, StoredPick};
use picks_core::{Criteria, Pick};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{ApiResponse, AppError, AppState};

const GENERATE_CONTEXT: &str = "generate-picks";
const RECENT_CONTEXT: &str = "recent-picks";

const NO_SURVIVORS_MESSAGE: &str =
    "No candidates met the quality gates for these criteria. Try a different timeframe or risk appetite.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePicksResponse {
    pub success: bool,
    pub run_id: String,
    pub picks: Vec<Pick>,
    pub generated_at: DateTime<Utc>,
    pub criteria: Criteria,
    pub model_used: String,
    pub quality_focus: String,
    pub results: RunStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GeneratePicksResponse {
    fn from_run(run: PipelineRun, criteria: Criteria) -> Self {
        let message = run.picks.is_empty().then(|| NO_SURVIVORS_MESSAGE.to_string());
        Self {
            success: true,
            run_id: run.run_id,
            picks: run.picks,
            generated_at: run.generated_at,
            criteria,
            model_used: run.model_used,
            quality_focus: quality_focus(),
            results: run.stats,
            message,
        }
    }
}

fn quality_focus() -> String {
    format!(
        "Top {} picks with quantitative score >= {:.0}, technical score >= {:.0} and risk/reward >= {:.1}",
        MAX_PICKS, MIN_QUANTITATIVE_SCORE, MIN_TECHNICAL_SCORE, MIN_RISK_REWARD
    )
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
}

pub fn picks_routes() -> Router<AppState> {
    Router::new()
        .route("/api/generate-picks", post(generate_picks))
        .route("/api/picks/recent", get(recent_picks))
}

async fn generate_picks(
    State(state): State<AppState>,
    payload: Result<Json<Criteria>, JsonRejection>,
) -> Result<Json<GeneratePicksResponse>, AppError> {
    let Json(criteria) = payload.map_err(|rejection| {
        AppError::new(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text())
            .in_context(GENERATE_CONTEXT)
    })?;
    criteria
        .validate()
        .map_err(|e| AppError::from(e).in_context(GENERATE_CONTEXT))?;

    let pipeline = state
        .pipeline()
        .map_err(|e| AppError::from(e).in_context(GENERATE_CONTEXT))?;
    let run = pipeline
        .run(&criteria)
        .await
        .map_err(|e| AppError::from(e).in_context(GENERATE_CONTEXT))?;

    info!(
        run_id = %run.run_id,
        picks = run.picks.len(),
        discovered = run.stats.discovered,
        "Pick generation finished"
    );

    let response = GeneratePicksResponse::from_run(run, criteria);
    remember(&state, &response).await;
    Ok(Json(response))
}

/// Persist and cache a finished run. Failures are logged only.
async fn remember(state: &AppState, response: &GeneratePicksResponse) {
    if let Some(store) = &state.store {
        if let Err(e) = store
            .save_picks(&response.run_id, &response.criteria, &response.picks, response.generated_at)
            .await
        {
            warn!(run_id = %response.run_id, "Failed to persist picks: {}", e);
        }
    }

    let key = criteria_cache_key(&response.criteria);
    if let Err(e) = set_json(state.cache.as_ref(), &key, response, state.cache_ttl).await {
        warn!(run_id = %response.run_id, backend = state.cache.backend_name(), "Failed to cache picks: {}", e);
    }
}

async fn recent_picks(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<ApiResponse<Vec<StoredPick>>>, AppError> {
    let store = state.store.as_ref().ok_or_else(|| {
        AppError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "service_unavailable",
            "Recommendation store is not configured (set DATABASE_URL)",
        )
        .in_context(RECENT_CONTEXT)
    })?;

    let picks = store
        .recent(query.limit)
        .await
        .map_err(|e| AppError::from(e).in_context(RECENT_CONTEXT))?;
    Ok(Json(ApiResponse::success(picks)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_router;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pick_pipeline::PipelineConfig;
    use pick_store::{KeyValueCache, MemoryCache, RecommendationStore};
    use picks_core::{
        LanguageModel, LlmError, MarketDataError, MarketDataProvider, Quote, StockSnapshot,
        StructuredRequest, TechnicalIndicators,
    };
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct DownModel;

    #[async_trait]
    impl LanguageModel for DownModel {
        async fn generate_object(&self, _request: &StructuredRequest) -> Result<Value, LlmError> {
            Err(LlmError::Unavailable("fetch failed".into()))
        }

        fn provider_name(&self) -> &'static str {
            "down"
        }
    }

    /// Answers every stage with a clean, approvable verdict
    struct AgreeableModel;

    #[async_trait]
    impl LanguageModel for AgreeableModel {
        async fn generate_object(&self, request: &StructuredRequest) -> Result<Value, LlmError> {
            let dim = json!({ "matches": true, "reasoning": "fits", "score": 90 });
            Ok(match request.schema_name {
                "opportunity_discovery" => json!({
                    "opportunities": [{
                        "ticker": "ASML",
                        "companyName": "ASML Holding",
                        "technicalSetup": "Cup and handle",
                        "momentumSignals": ["MACD cross"],
                        "riskLevel": "medium",
                        "convictionLevel": "high",
                        "sector": "Technology",
                        "marketCap": "large",
                        "strategy": "breakout",
                        "catalyst": "earnings",
                        "technicalScore": 9
                    }]
                }),
                "criteria_validation" => json!({
                    "timeframeAlignment": dim,
                    "riskAlignment": dim,
                    "catalystAlignment": dim,
                    "sectorAlignment": dim,
                    "discoveryAlignment": dim
                }),
                "price_analysis" => json!({
                    "currentPrice": 100.0,
                    "targetPrice": 130.0,
                    "stopLoss": 90.0,
                    "expectedMovePercent": 30.0,
                    "riskReward": 3.0,
                    "probabilityOfSuccess": 75,
                    "keyLevels": { "support": [90.0], "resistance": [130.0] },
                    "indicatorSignals": { "rsi": "bullish", "macd": "bullish", "volume": "rising" },
                    "rationale": "Measured move"
                }),
                _ => json!({
                    "approved": true,
                    "quantitativeScore": 88,
                    "convictionLevel": "high",
                    "hedgeFundRecommendation": "strong-buy",
                    "positionSizing": "large",
                    "reasoning": "Clean setup"
                }),
            })
        }

        fn provider_name(&self) -> &'static str {
            "agreeable"
        }
    }

    struct FlatVendor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataProvider for FlatVendor {
        async fn validate_ticker(&self, _ticker: &str) -> Result<bool, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn stock_snapshot(&self, ticker: &str) -> Result<StockSnapshot, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StockSnapshot {
                quote: Quote {
                    ticker: ticker.to_string(),
                    price: 100.0,
                    change: 1.0,
                    change_percent: 1.0,
                    volume: 3_000_000.0,
                    week_52_high: Some(120.0),
                    week_52_low: Some(70.0),
                },
                profile: None,
                technicals: TechnicalIndicators::default(),
                government_trades: vec![],
            })
        }

        fn provider_name(&self) -> &'static str {
            "flat"
        }
    }

    fn criteria_body() -> Value {
        json!({
            "timeframe": "1-week",
            "riskAppetite": "aggressive",
            "catalystType": "technical",
            "sectorPreference": "all",
            "discoveryMethod": "all",
            "model": "gpt-4o"
        })
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_any_call() {
        let vendor = Arc::new(FlatVendor { calls: AtomicUsize::new(0) });
        let state = AppState::new(None, PipelineConfig::immediate()).with_market(vendor.clone());

        let response = build_router(state)
            .oneshot(post_json("/api/generate-picks", &criteria_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = read_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["errorType"], "configuration");
        assert_eq!(json["context"], "generate-picks");
        assert!(json["timestamp"].is_string());
        assert_eq!(vendor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_criteria_rejected() {
        let state = AppState::new(Some(Arc::new(DownModel)), PipelineConfig::immediate());
        let mut body = criteria_body();
        body["timeframe"] = json!("   ");

        let response = build_router(state)
            .oneshot(post_json("/api/generate-picks", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = read_json(response).await;
        assert_eq!(json["errorType"], "invalid_request");
    }

    #[tokio::test]
    async fn test_missing_field_rejected() {
        let state = AppState::new(Some(Arc::new(DownModel)), PipelineConfig::immediate());
        let response = build_router(state)
            .oneshot(post_json("/api/generate-picks", &json!({ "timeframe": "1-week" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["errorType"], "invalid_request");
    }

    #[tokio::test]
    async fn test_everything_down_returns_empty_success() {
        let state = AppState::new(Some(Arc::new(DownModel)), PipelineConfig::immediate());
        let response = build_router(state)
            .oneshot(post_json("/api/generate-picks", &criteria_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["success"], true);
        assert!(json["picks"].as_array().unwrap().len() <= 3);
        assert_eq!(json["modelUsed"], "gpt-4o");
        assert_eq!(json["results"]["discoveryFallback"], true);
        assert!(json["qualityFocus"].as_str().unwrap().contains("risk/reward"));
        assert!(json["message"].is_string());
    }

    #[tokio::test]
    async fn test_successful_run_is_persisted_and_cached() {
        let store = RecommendationStore::connect("sqlite::memory:").await.unwrap();
        let cache = Arc::new(MemoryCache::new());
        let state = AppState::new(Some(Arc::new(AgreeableModel)), PipelineConfig::immediate())
            .with_market(Arc::new(FlatVendor { calls: AtomicUsize::new(0) }))
            .with_cache(cache.clone())
            .with_store(store);
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(post_json("/api/generate-picks", &criteria_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        let picks = json["picks"].as_array().unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0]["ticker"], "ASML");
        assert_eq!(picks[0]["entryPrice"], 100.0);
        assert!(json.get("message").is_none());

        let criteria: Criteria = serde_json::from_value(criteria_body()).unwrap();
        assert!(cache.get(&criteria_cache_key(&criteria)).await.unwrap().is_some());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/picks/recent?limit=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
        assert_eq!(json["data"][0]["pick"]["ticker"], "ASML");
    }

    #[tokio::test]
    async fn test_recent_without_store_is_unavailable() {
        let state = AppState::new(None, PipelineConfig::immediate());
        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/picks/recent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
