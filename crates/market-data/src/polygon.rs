use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use picks_core::{
    CompanyProfile, MarketDataError, MarketDataProvider, RateLimiter, StockSnapshot,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::indicators::{indicators_from_bars, quote_from_bars};

const BASE_URL: &str = "https://api.polygon.io";

#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl PolygonClient {
    /// `rate_limit` is requests per minute. Free tier users should use 5.
    pub fn new(api_key: String, rate_limit: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            client,
            rate_limiter: RateLimiter::per_minute("Polygon API", rate_limit),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, MarketDataError> {
        let request = builder.build().map_err(|e| MarketDataError::Api(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| MarketDataError::Api("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| MarketDataError::Unavailable(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!(
                "Polygon 429 rate limited, waiting {}s before retry {}/3",
                wait_secs,
                attempt + 1
            );
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(MarketDataError::RateLimited)
    }

    /// Daily bars for the trailing `days` calendar days, oldest first
    pub async fn get_daily_bars(&self, symbol: &str, days: i64) -> Result<Vec<DailyBar>, MarketDataError> {
        let to = Utc::now();
        let from = to - ChronoDuration::days(days);
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            self.base_url,
            symbol,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", "5000"),
            ]))
            .await?;

        if !response.status().is_success() {
            return Err(MarketDataError::Api(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let agg_response: AggregateResponse = response
            .json()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))?;

        Ok(agg_response
            .results
            .into_iter()
            .map(|r| DailyBar {
                timestamp: r.t,
                open: r.o,
                high: r.h,
                low: r.l,
                close: r.c,
                volume: r.v,
            })
            .collect())
    }

    pub async fn get_ticker_details(&self, symbol: &str) -> Result<TickerDetails, MarketDataError> {
        let url = format!("{}/v3/reference/tickers/{}", self.base_url, symbol);

        let response = self
            .send_request(self.client.get(&url).query(&[("apiKey", &self.api_key)]))
            .await?;

        if response.status().as_u16() == 404 {
            return Err(MarketDataError::NotFound(symbol.to_string()));
        }
        if !response.status().is_success() {
            return Err(MarketDataError::Api(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let details_response: TickerDetailsResponse = response
            .json()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))?;

        Ok(details_response.results)
    }
}

#[async_trait]
impl MarketDataProvider for PolygonClient {
    async fn validate_ticker(&self, ticker: &str) -> Result<bool, MarketDataError> {
        match self.get_ticker_details(ticker).await {
            Ok(details) => Ok(details.active),
            Err(MarketDataError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn stock_snapshot(&self, ticker: &str) -> Result<StockSnapshot, MarketDataError> {
        let bars = self.get_daily_bars(ticker, 365).await?;
        let quote = quote_from_bars(ticker, &bars)
            .ok_or_else(|| MarketDataError::NotFound(format!("{}: no price history", ticker)))?;

        // Profile is best-effort; a quote without it is still usable.
        let profile = match self.get_ticker_details(ticker).await {
            Ok(details) => Some(CompanyProfile {
                name: details.name,
                sector: details.sic_description,
                market_cap: details.market_cap,
            }),
            Err(e) => {
                tracing::debug!("Ticker details unavailable for {}: {}", ticker, e);
                None
            }
        };

        Ok(StockSnapshot {
            quote,
            profile,
            technicals: indicators_from_bars(&bars),
            // Polygon has no congressional trading feed
            government_trades: Vec::new(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "polygon"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp
    o: f64, // open
    h: f64, // high
    l: f64, // low
    c: f64, // close
    v: f64, // volume
}

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    results: TickerDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerDetails {
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub primary_exchange: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub sic_description: Option<String>,
}

fn default_active() -> bool {
    true
}
