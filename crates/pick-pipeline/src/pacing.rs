//! Decorators that acquire a shared limiter before each external call.

use async_trait::async_trait;
use picks_core::{
    LanguageModel, LlmError, MarketDataError, MarketDataProvider, RateLimiter, StockSnapshot,
    StructuredRequest,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Takes over the provider-level retries of each request so that every
/// attempt, not just the first, waits on the limiter.
pub struct PacedModel {
    inner: Arc<dyn LanguageModel>,
    limiter: RateLimiter,
}

impl PacedModel {
    pub fn new(inner: Arc<dyn LanguageModel>, limiter: RateLimiter) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl LanguageModel for PacedModel {
    async fn generate_object(&self, request: &StructuredRequest) -> Result<Value, LlmError> {
        let single = StructuredRequest {
            max_retries: 0,
            ..request.clone()
        };

        let mut attempt = 0u32;
        loop {
            self.limiter.acquire().await;
            match self.inner.generate_object(&single).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < request.max_retries => {
                    let backoff = Duration::from_secs(2u64.pow(attempt));
                    warn!(
                        "{} call failed ({}), retrying in {}s ({}/{})",
                        request.schema_name,
                        e,
                        backoff.as_secs(),
                        attempt + 1,
                        request.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

pub struct PacedMarketData {
    inner: Arc<dyn MarketDataProvider>,
    limiter: RateLimiter,
}

impl PacedMarketData {
    pub fn new(inner: Arc<dyn MarketDataProvider>, limiter: RateLimiter) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl MarketDataProvider for PacedMarketData {
    async fn validate_ticker(&self, ticker: &str) -> Result<bool, MarketDataError> {
        self.limiter.acquire().await;
        self.inner.validate_ticker(ticker).await
    }

    async fn stock_snapshot(&self, ticker: &str) -> Result<StockSnapshot, MarketDataError> {
        self.limiter.acquire().await;
        self.inner.stock_snapshot(ticker).await
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}
