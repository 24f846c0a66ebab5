use picks_core::{
    DataSource, MarketDataProvider, Opportunity, StockSnapshot, TechnicalData,
    TechnicalIndicators, VolatilityBucket,
};
use tracing::{debug, warn};

use crate::reference::ReferenceData;

const RANGE_HIGH_FACTOR: f64 = 1.25;
const RANGE_LOW_FACTOR: f64 = 0.75;

/// Fetches live market data per candidate, synthesizing a deterministic
/// snapshot whenever the vendor cannot supply one. Never fails.
pub struct Enricher<'a> {
    market: &'a dyn MarketDataProvider,
    reference: &'a ReferenceData,
}

impl<'a> Enricher<'a> {
    pub fn new(market: &'a dyn MarketDataProvider, reference: &'a ReferenceData) -> Self {
        Self { market, reference }
    }

    pub async fn enrich(&self, opportunity: &Opportunity) -> TechnicalData {
        let ticker = opportunity.ticker.as_str();

        match self.market.validate_ticker(ticker).await {
            Ok(true) => {}
            Ok(false) => warn!(ticker, "Vendor does not recognize ticker, continuing"),
            Err(e) => warn!(ticker, "Ticker validation failed ({}), continuing", e),
        }

        match self.market.stock_snapshot(ticker).await {
            Ok(snapshot) => self.from_snapshot(opportunity, snapshot),
            Err(e) => {
                warn!(ticker, provider = self.market.provider_name(), "Market data unavailable ({}), using fallback", e);
                self.fallback(opportunity)
            }
        }
    }

    fn from_snapshot(&self, opportunity: &Opportunity, snapshot: StockSnapshot) -> TechnicalData {
        let ticker = opportunity.ticker.as_str();
        let reference = self.reference.quote(ticker);
        let quote = snapshot.quote;

        let price = if quote.price.is_finite() && quote.price > 0.0 {
            quote.price
        } else {
            let fallback = self.reference.fallback_price(ticker);
            warn!(ticker, "Vendor returned price {}, substituting {}", quote.price, fallback);
            fallback
        };

        let (profile_name, profile_sector, profile_cap) = match snapshot.profile {
            Some(p) => (Some(p.name), p.sector, p.market_cap),
            None => (None, None, None),
        };

        let company_name = profile_name
            .or_else(|| reference.map(|r| r.name.clone()))
            .or_else(|| opportunity.company_name.clone())
            .unwrap_or_else(|| ticker.to_string());
        let sector = profile_sector
            .or_else(|| reference.map(|r| r.sector.clone()))
            .unwrap_or_else(|| opportunity.sector.clone());
        let market_cap = profile_cap
            .or_else(|| reference.map(|r| r.market_cap))
            .unwrap_or(0.0);

        debug!(ticker, price, "Enriched with live data");

        TechnicalData {
            ticker: ticker.to_string(),
            price,
            change: quote.change,
            change_percent: quote.change_percent,
            volume: quote.volume,
            company_name,
            market_cap,
            sector,
            indicators: snapshot.technicals,
            week_52_high: quote.week_52_high.unwrap_or(price * RANGE_HIGH_FACTOR),
            week_52_low: quote.week_52_low.unwrap_or(price * RANGE_LOW_FACTOR),
            volatility: VolatilityBucket::from_change_percent(quote.change_percent),
            government_trades: snapshot.government_trades,
            source: DataSource::Live,
        }
    }

    /// Deterministic snapshot: reference table first, then ticker-shape heuristics.
    pub fn fallback(&self, opportunity: &Opportunity) -> TechnicalData {
        let ticker = opportunity.ticker.as_str();
        let price = self.reference.fallback_price(ticker);
        let reference = self.reference.quote(ticker);

        TechnicalData {
            ticker: ticker.to_string(),
            price,
            change: 0.0,
            change_percent: 0.0,
            volume: 0.0,
            company_name: reference
                .map(|r| r.name.clone())
                .or_else(|| opportunity.company_name.clone())
                .unwrap_or_else(|| ticker.to_string()),
            market_cap: reference.map(|r| r.market_cap).unwrap_or(0.0),
            sector: reference
                .map(|r| r.sector.clone())
                .unwrap_or_else(|| opportunity.sector.clone()),
            indicators: TechnicalIndicators::default(),
            week_52_high: price * RANGE_HIGH_FACTOR,
            week_52_low: price * RANGE_LOW_FACTOR,
            volatility: VolatilityBucket::Low,
            government_trades: Vec::new(),
            source: DataSource::Fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use picks_core::{CompanyProfile, MarketDataError, Quote};

    struct Vendor(Option<StockSnapshot>);

    #[async_trait]
    impl MarketDataProvider for Vendor {
        async fn validate_ticker(&self, _ticker: &str) -> Result<bool, MarketDataError> {
            Ok(self.0.is_some())
        }

        async fn stock_snapshot(&self, ticker: &str) -> Result<StockSnapshot, MarketDataError> {
            self.0.clone().ok_or_else(|| MarketDataError::NotFound(ticker.to_string()))
        }

        fn provider_name(&self) -> &'static str {
            "vendor"
        }
    }

    fn opportunity(ticker: &str) -> Opportunity {
        Opportunity {
            ticker: ticker.into(),
            company_name: None,
            technical_setup: "Cup and handle".into(),
            momentum_signals: vec![],
            risk_level: "medium".into(),
            conviction_level: "medium".into(),
            sector: "Industrials".into(),
            market_cap: "mid".into(),
            strategy: "breakout".into(),
            catalyst: "earnings".into(),
            technical_score: 7.0,
        }
    }

    fn snapshot(price: f64, change_percent: f64) -> StockSnapshot {
        StockSnapshot {
            quote: Quote {
                ticker: "ACME".into(),
                price,
                change: price * change_percent / 100.0,
                change_percent,
                volume: 1_000_000.0,
                week_52_high: Some(140.0),
                week_52_low: None,
            },
            profile: Some(CompanyProfile {
                name: "Acme Corp".into(),
                sector: None,
                market_cap: Some(4.0e9),
            }),
            technicals: TechnicalIndicators::default(),
            government_trades: vec![],
        }
    }

    #[tokio::test]
    async fn test_live_snapshot() {
        let vendor = Vendor(Some(snapshot(120.0, 6.5)));
        let reference = ReferenceData::builtin();
        let data = Enricher::new(&vendor, &reference).enrich(&opportunity("ACME")).await;
        assert_eq!(data.source, DataSource::Live);
        assert_eq!(data.price, 120.0);
        assert_eq!(data.company_name, "Acme Corp");
        assert_eq!(data.sector, "Industrials");
        assert_eq!(data.volatility, VolatilityBucket::High);
        assert_eq!(data.week_52_high, 140.0);
        assert_eq!(data.week_52_low, 90.0);
    }

    #[tokio::test]
    async fn test_non_positive_price_replaced() {
        let vendor = Vendor(Some(snapshot(0.0, 1.0)));
        let reference = ReferenceData::builtin();
        let data = Enricher::new(&vendor, &reference).enrich(&opportunity("ACME")).await;
        assert_eq!(data.price, 75.0);
        assert_eq!(data.volatility, VolatilityBucket::Low);
    }

    #[tokio::test]
    async fn test_fallback_uses_reference_table() {
        let vendor = Vendor(None);
        let reference = ReferenceData::builtin();
        let data = Enricher::new(&vendor, &reference).enrich(&opportunity("ASML")).await;
        assert_eq!(data.source, DataSource::Fallback);
        assert_eq!(data.price, 950.0);
        assert_eq!(data.company_name, "ASML Holding N.V.");
    }

    #[tokio::test]
    async fn test_fallback_price_is_deterministic() {
        let vendor = Vendor(None);
        let reference = ReferenceData::builtin();
        let enricher = Enricher::new(&vendor, &reference);
        let first = enricher.enrich(&opportunity("QQQQ")).await;
        let second = enricher.enrich(&opportunity("QQQQ")).await;
        assert_eq!(first.price, second.price);
        assert_eq!(first, second);
    }
}
