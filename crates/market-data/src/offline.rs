use async_trait::async_trait;
use picks_core::{MarketDataError, MarketDataProvider, StockSnapshot};

/// Provider used when no vendor key is configured. Every lookup fails, so the
/// enricher always takes its fallback path.
#[derive(Debug, Clone, Default)]
pub struct OfflineProvider;

#[async_trait]
impl MarketDataProvider for OfflineProvider {
    async fn validate_ticker(&self, _ticker: &str) -> Result<bool, MarketDataError> {
        Err(MarketDataError::Unavailable("no market data provider configured".into()))
    }

    async fn stock_snapshot(&self, _ticker: &str) -> Result<StockSnapshot, MarketDataError> {
        Err(MarketDataError::Unavailable("no market data provider configured".into()))
    }

    fn provider_name(&self) -> &'static str {
        "offline"
    }
}
