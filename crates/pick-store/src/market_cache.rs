use async_trait::async_trait;
use picks_core::{MarketDataError, MarketDataProvider, StockSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::{get_json, set_json, KeyValueCache};

pub const DEFAULT_MARKET_TTL: Duration = Duration::from_secs(300);

/// Read-through cache in front of a market-data vendor. Cache failures are
/// logged and the vendor is used directly.
pub struct CachedMarketData {
    inner: Arc<dyn MarketDataProvider>,
    cache: Arc<dyn KeyValueCache>,
    ttl: Duration,
}

impl CachedMarketData {
    pub fn new(inner: Arc<dyn MarketDataProvider>, cache: Arc<dyn KeyValueCache>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    fn key(ticker: &str) -> String {
        format!("market:{}", ticker.to_uppercase())
    }
}

#[async_trait]
impl MarketDataProvider for CachedMarketData {
    async fn validate_ticker(&self, ticker: &str) -> Result<bool, MarketDataError> {
        self.inner.validate_ticker(ticker).await
    }

    async fn stock_snapshot(&self, ticker: &str) -> Result<StockSnapshot, MarketDataError> {
        let key = Self::key(ticker);
        match get_json::<StockSnapshot>(self.cache.as_ref(), &key).await {
            Ok(Some(snapshot)) => {
                debug!(ticker, "Market data cache hit");
                return Ok(snapshot);
            }
            Ok(None) => {}
            Err(e) => warn!(ticker, backend = self.cache.backend_name(), "Market data cache read failed: {}", e),
        }

        let snapshot = self.inner.stock_snapshot(ticker).await?;
        if let Err(e) = set_json(self.cache.as_ref(), &key, &snapshot, self.ttl).await {
            warn!(ticker, backend = self.cache.backend_name(), "Market data cache write failed: {}", e);
        }
        Ok(snapshot)
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}
