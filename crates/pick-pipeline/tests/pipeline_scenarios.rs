use async_trait::async_trait;
use pick_pipeline::{FallbackPolicy, PickPipeline, PipelineConfig, ReferenceData};
use picks_core::{
    Criteria, LanguageModel, LlmError, MarketDataError, MarketDataProvider, PickError, Quote,
    StockSnapshot, StructuredRequest, TechnicalIndicators,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Language model fake driven by a closure over the request
struct FnModel<F> {
    respond: F,
    calls: Mutex<HashMap<String, usize>>,
}

impl<F> FnModel<F>
where
    F: Fn(&StructuredRequest) -> Result<Value, LlmError> + Send + Sync,
{
    fn new(respond: F) -> Self {
        Self { respond, calls: Mutex::new(HashMap::new()) }
    }

    fn calls(&self, schema: &str, ticker: &str) -> usize {
        let key = format!("{}:{}", schema, ticker);
        self.calls.lock().unwrap().get(&key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl<F> LanguageModel for FnModel<F>
where
    F: Fn(&StructuredRequest) -> Result<Value, LlmError> + Send + Sync,
{
    async fn generate_object(&self, request: &StructuredRequest) -> Result<Value, LlmError> {
        let key = format!("{}:{}", request.schema_name, ticker_of(request).unwrap_or("*"));
        *self.calls.lock().unwrap().entry(key).or_insert(0) += 1;
        (self.respond)(request)
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

fn ticker_of(request: &StructuredRequest) -> Option<&str> {
    request
        .prompt
        .lines()
        .find_map(|line| line.strip_prefix("TICKER: "))
        .map(str::trim)
}

/// Vendor fake quoting a fixed price for known tickers
struct FixedVendor {
    prices: HashMap<&'static str, f64>,
    snapshot_calls: AtomicUsize,
}

impl FixedVendor {
    fn new(prices: &[(&'static str, f64)]) -> Self {
        Self {
            prices: prices.iter().copied().collect(),
            snapshot_calls: AtomicUsize::new(0),
        }
    }

    fn down() -> Self {
        Self::new(&[])
    }
}

#[async_trait]
impl MarketDataProvider for FixedVendor {
    async fn validate_ticker(&self, ticker: &str) -> Result<bool, MarketDataError> {
        Ok(self.prices.contains_key(ticker))
    }

    async fn stock_snapshot(&self, ticker: &str) -> Result<StockSnapshot, MarketDataError> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        let price = self
            .prices
            .get(ticker)
            .copied()
            .ok_or_else(|| MarketDataError::Unavailable("vendor down".into()))?;
        Ok(StockSnapshot {
            quote: Quote {
                ticker: ticker.to_string(),
                price,
                change: 1.0,
                change_percent: 1.0,
                volume: 2_000_000.0,
                week_52_high: Some(price * 1.3),
                week_52_low: Some(price * 0.7),
            },
            profile: None,
            technicals: TechnicalIndicators {
                rsi: Some(58.0),
                ..TechnicalIndicators::default()
            },
            government_trades: vec![],
        })
    }

    fn provider_name(&self) -> &'static str {
        "fixed"
    }
}

fn criteria(method: &str) -> Criteria {
    Criteria {
        timeframe: "1-week".into(),
        risk_appetite: "aggressive".into(),
        catalyst_type: "technical".into(),
        sector_preference: "all".into(),
        discovery_method: method.into(),
        model: "gpt-4o".into(),
    }
}

fn opportunity(ticker: &str, sector: &str, strategy: &str, cap: &str) -> Value {
    json!({
        "ticker": ticker,
        "companyName": format!("{} Inc.", ticker),
        "technicalSetup": "Breakout above resistance on volume",
        "momentumSignals": ["RSI rising", "volume expansion"],
        "riskLevel": "medium",
        "convictionLevel": "high",
        "sector": sector,
        "marketCap": cap,
        "strategy": strategy,
        "catalyst": "technical breakout",
        "technicalScore": 8
    })
}

fn strong_validation() -> Value {
    let dim = json!({ "matches": true, "reasoning": "fits", "score": 85 });
    json!({
        "timeframeAlignment": dim,
        "riskAlignment": dim,
        "catalystAlignment": dim,
        "sectorAlignment": dim,
        "discoveryAlignment": dim
    })
}

fn plan(target: f64, stop: f64) -> Value {
    json!({
        "currentPrice": 1.0,
        "targetPrice": target,
        "stopLoss": stop,
        "expectedMovePercent": 999.0,
        "riskReward": 99.0,
        "probabilityOfSuccess": 75,
        "keyLevels": { "support": [stop], "resistance": [target] },
        "indicatorSignals": { "rsi": "bullish", "macd": "bullish", "volume": "rising" },
        "rationale": "Measured move"
    })
}

fn approval(score: f64) -> Value {
    json!({
        "approved": true,
        "quantitativeScore": score,
        "convictionLevel": "high",
        "hedgeFundRecommendation": "strong-buy",
        "positionSizing": "large",
        "reasoning": "Clean setup"
    })
}

fn pipeline(model: Arc<dyn LanguageModel>, vendor: Arc<dyn MarketDataProvider>, config: PipelineConfig) -> PickPipeline {
    PickPipeline::new(model, vendor, Arc::new(ReferenceData::builtin()), config)
}

#[tokio::test]
async fn test_everything_down_still_succeeds() {
    let model = Arc::new(FnModel::new(|_: &StructuredRequest| {
        Err(LlmError::Unavailable("fetch failed".into()))
    }));
    let vendor = Arc::new(FixedVendor::down());
    let run = pipeline(model.clone(), vendor, PipelineConfig::immediate())
        .run(&criteria("all"))
        .await
        .unwrap();

    assert!(run.picks.len() <= 3);
    assert!(run.stats.discovery_fallback);
    assert_eq!(run.stats.discovered, 3);
    assert_eq!(run.stats.fallback_market_data, 3);
    assert_eq!(run.stats.fallback_validations, 3);
    assert_eq!(run.stats.analysis_failures, 3);
    assert_eq!(model.calls("opportunity_discovery", "*"), 3);
    assert_eq!(model.calls("criteria_validation", "AAPL"), 2);
    assert_eq!(model.calls("price_analysis", "AAPL"), 3);
    // No analysis survived, so the scorer never ran
    assert_eq!(model.calls("final_validation", "AAPL"), 0);
}

#[tokio::test]
async fn test_invariant_violation_drops_only_that_candidate() {
    let model = Arc::new(FnModel::new(|request: &StructuredRequest| {
        match (request.schema_name, ticker_of(request)) {
            ("opportunity_discovery", _) => Ok(json!({
                "opportunities": [
                    opportunity("NVDA", "Technology", "breakout", "large"),
                    opportunity("XOM", "Energy", "momentum", "mid"),
                    opportunity("UNH", "Healthcare", "swing", "small"),
                ]
            })),
            ("criteria_validation", _) => Ok(strong_validation()),
            // Target below entry on every attempt
            ("price_analysis", Some("XOM")) => Ok(plan(95.0, 90.0)),
            ("price_analysis", _) => Ok(plan(130.0, 90.0)),
            ("final_validation", _) => Ok(approval(88.0)),
            other => panic!("unexpected request {:?}", other),
        }
    }));
    let vendor = Arc::new(FixedVendor::new(&[("NVDA", 100.0), ("XOM", 100.0), ("UNH", 100.0)]));
    let run = pipeline(model.clone(), vendor, PipelineConfig::immediate())
        .run(&criteria("all"))
        .await
        .unwrap();

    let tickers: Vec<_> = run.picks.iter().map(|p| p.ticker.as_str()).collect();
    assert_eq!(tickers.len(), 2);
    assert!(tickers.contains(&"NVDA"));
    assert!(tickers.contains(&"UNH"));
    assert_eq!(model.calls("price_analysis", "XOM"), 3);
    assert_eq!(run.stats.analysis_failures, 1);

    for pick in &run.picks {
        assert!(pick.target_price > pick.entry_price);
        assert!(pick.entry_price > pick.stop_loss_price);
        assert!(pick.risk_reward_ratio >= 2.0);
        assert!(pick.quantitative_score >= 75.0);
        assert!(pick.technical_score >= 7.0);
        assert!(pick.criteria_compliance >= 70.0);
        // The model's arithmetic is replaced by values computed from the live price
        assert_eq!(pick.entry_price, 100.0);
        assert!((pick.risk_reward_ratio - 3.0).abs() < 1e-9);
        assert!((pick.expected_move - 30.0).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_international_plays_never_return_us_tickers() {
    let model = Arc::new(FnModel::new(|request: &StructuredRequest| match request.schema_name {
        "opportunity_discovery" => Ok(json!({
            "opportunities": [
                opportunity("AAPL", "Technology", "breakout", "large"),
                opportunity("TSM", "Technology", "momentum", "large"),
                opportunity("NVO", "Healthcare", "swing", "large"),
            ]
        })),
        "criteria_validation" => Ok(strong_validation()),
        "price_analysis" => Ok(plan(130.0, 90.0)),
        _ => Ok(approval(90.0)),
    }));
    let vendor = Arc::new(FixedVendor::new(&[("AAPL", 100.0), ("TSM", 100.0), ("NVO", 100.0)]));
    let reference = ReferenceData::builtin();
    let run = pipeline(model.clone(), vendor, PipelineConfig::immediate())
        .run(&criteria("international-plays"))
        .await
        .unwrap();

    assert_eq!(run.stats.discovered, 2);
    assert!(run.picks.iter().all(|p| !reference.is_us_listed(&p.ticker)));
    assert_eq!(model.calls("criteria_validation", "AAPL"), 0);
}

#[tokio::test]
async fn test_international_filter_emptied_is_an_error() {
    let model = Arc::new(FnModel::new(|_: &StructuredRequest| {
        Ok(json!({ "opportunities": [opportunity("MSFT", "Technology", "breakout", "large")] }))
    }));
    let vendor = Arc::new(FixedVendor::down());
    let result = pipeline(model, vendor, PipelineConfig::immediate())
        .run(&criteria("international-plays"))
        .await;
    assert!(matches!(result, Err(PickError::InternationalFilterEmptied)));
}

#[tokio::test]
async fn test_fail_closed_rejects_unvalidated_candidates() {
    let model = Arc::new(FnModel::new(|request: &StructuredRequest| match request.schema_name {
        "opportunity_discovery" => Ok(json!({
            "opportunities": [opportunity("NVDA", "Technology", "breakout", "large")]
        })),
        "price_analysis" => Ok(plan(130.0, 90.0)),
        _ => Err(LlmError::RateLimited("quota".into())),
    }));
    let vendor = Arc::new(FixedVendor::new(&[("NVDA", 100.0)]));

    let open = pipeline(model.clone(), vendor.clone(), PipelineConfig::immediate())
        .run(&criteria("all"))
        .await
        .unwrap();
    assert_eq!(open.picks.len(), 1);
    assert_eq!(open.stats.fallback_scores, 1);

    let closed_config = PipelineConfig::immediate().with_fallback_policy(FallbackPolicy::FailClosed);
    let closed = pipeline(model, vendor, closed_config)
        .run(&criteria("all"))
        .await
        .unwrap();
    assert!(closed.picks.is_empty());
    assert_eq!(closed.stats.criteria_matched, 0);
    assert_eq!(closed.stats.approved, 0);
}

#[tokio::test]
async fn test_blank_criteria_rejected_before_any_call() {
    let model = Arc::new(FnModel::new(|_: &StructuredRequest| Ok(json!({}))));
    let vendor = Arc::new(FixedVendor::down());
    let mut bad = criteria("all");
    bad.sector_preference = String::new();

    let result = pipeline(model.clone(), vendor.clone(), PipelineConfig::immediate())
        .run(&bad)
        .await;
    assert!(matches!(result, Err(PickError::InvalidCriteria(_))));
    assert_eq!(model.calls("opportunity_discovery", "*"), 0);
    assert_eq!(vendor.snapshot_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_paced_pipeline_runs() {
    let model = Arc::new(FnModel::new(|_: &StructuredRequest| {
        Err(LlmError::Timeout(1))
    }));
    let vendor = Arc::new(FixedVendor::down());
    let config = PipelineConfig::immediate().with_pacing(10_000);
    let run = pipeline(model, vendor.clone(), config)
        .run(&criteria("all"))
        .await
        .unwrap();
    assert!(run.picks.is_empty());
    assert_eq!(vendor.snapshot_calls.load(Ordering::SeqCst), 3);
}
