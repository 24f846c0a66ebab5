use picks_core::{
    generate_typed, Criteria, LanguageModel, Opportunity, PickError, StructuredRequest,
};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::prompts;
use crate::reference::{market_cap_bucket, ReferenceData};
use crate::retry::with_retries;

const MAX_OPPORTUNITIES: usize = 8;
const FALLBACK_COUNT: usize = 3;
const FALLBACK_STRATEGIES: [&str; 3] = ["momentum", "breakout", "mean-reversion"];
const FALLBACK_TECHNICAL_SCORE: f64 = 7.0;

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    #[serde(default)]
    opportunities: Vec<Opportunity>,
}

#[derive(Debug, Clone)]
pub struct Discovery {
    pub opportunities: Vec<Opportunity>,
    pub used_fallback: bool,
}

pub struct Discoverer<'a> {
    model: &'a dyn LanguageModel,
    reference: &'a ReferenceData,
    config: &'a PipelineConfig,
}

impl<'a> Discoverer<'a> {
    pub fn new(model: &'a dyn LanguageModel, reference: &'a ReferenceData, config: &'a PipelineConfig) -> Self {
        Self { model, reference, config }
    }

    pub async fn discover(&self, criteria: &Criteria) -> Result<Discovery, PickError> {
        let request = StructuredRequest {
            model: criteria.model.clone(),
            system: prompts::DISCOVERY_SYSTEM.to_string(),
            prompt: prompts::discovery_prompt(criteria),
            schema_name: prompts::DISCOVERY_SCHEMA,
            schema: prompts::discovery_schema(),
            temperature: self.config.discovery_temperature,
            max_retries: self.config.llm_max_retries,
        };

        let request = &request;
        let discovered = with_retries("discovery", "*", self.config.discovery, move |_| {
            self.request_opportunities(request)
        })
        .await;

        let discovery = match discovered {
            Ok(opportunities) => {
                info!(count = opportunities.len(), "Discovered opportunities");
                Discovery { opportunities, used_fallback: false }
            }
            Err(e) => {
                warn!(
                    method = %criteria.discovery_method,
                    "Discovery exhausted retries ({}), using fallback opportunities", e
                );
                Discovery {
                    opportunities: self.fallback_opportunities(criteria),
                    used_fallback: true,
                }
            }
        };

        self.apply_international_filter(discovery, criteria)
    }

    async fn request_opportunities(&self, request: &StructuredRequest) -> Result<Vec<Opportunity>, PickError> {
        let response: DiscoveryResponse = generate_typed(self.model, request).await?;

        let mut seen = HashSet::new();
        let opportunities: Vec<Opportunity> = response
            .opportunities
            .into_iter()
            .filter_map(|opp| match opp.normalized() {
                Ok(opp) => Some(opp),
                Err(e) => {
                    warn!("Dropping malformed opportunity: {}", e);
                    None
                }
            })
            .filter(|opp| seen.insert(opp.ticker.clone()))
            .take(MAX_OPPORTUNITIES)
            .collect();

        if opportunities.is_empty() {
            return Err(PickError::NoOpportunities("model returned no usable tickers".into()));
        }
        Ok(opportunities)
    }

    /// Deterministic candidates keyed by discovery method
    pub fn fallback_opportunities(&self, criteria: &Criteria) -> Vec<Opportunity> {
        let risk_level = match criteria.risk_appetite.to_lowercase().as_str() {
            "aggressive" => "high",
            "conservative" => "low",
            _ => "medium",
        };

        self.reference
            .discovery_fallback(&criteria.discovery_method)
            .iter()
            .take(FALLBACK_COUNT)
            .enumerate()
            .map(|(i, ticker)| {
                let quote = self.reference.quote(ticker);
                let sector = match quote {
                    Some(q) => q.sector.clone(),
                    None if criteria.wants_all_sectors() => "Unknown".to_string(),
                    None => criteria.sector_preference.clone(),
                };
                Opportunity {
                    ticker: ticker.clone(),
                    company_name: quote.map(|q| q.name.clone()),
                    technical_setup: format!("Fallback {} candidate", criteria.discovery_method),
                    momentum_signals: Vec::new(),
                    risk_level: risk_level.to_string(),
                    conviction_level: "medium".to_string(),
                    sector,
                    market_cap: quote
                        .map(|q| market_cap_bucket(q.market_cap))
                        .unwrap_or("mid")
                        .to_string(),
                    strategy: FALLBACK_STRATEGIES[i % FALLBACK_STRATEGIES.len()].to_string(),
                    catalyst: criteria.catalyst_type.clone(),
                    technical_score: FALLBACK_TECHNICAL_SCORE,
                }
            })
            .collect()
    }

    fn apply_international_filter(&self, discovery: Discovery, criteria: &Criteria) -> Result<Discovery, PickError> {
        if !criteria.is_international() {
            return Ok(discovery);
        }

        let before = discovery.opportunities.len();
        let opportunities: Vec<Opportunity> = discovery
            .opportunities
            .into_iter()
            .filter(|opp| {
                let us = self.reference.is_us_listed(&opp.ticker);
                if us {
                    info!(ticker = %opp.ticker, "Removing US-listed ticker from international plays");
                }
                !us
            })
            .collect();

        if opportunities.is_empty() {
            warn!(removed = before, "International filter removed every candidate");
            return Err(PickError::InternationalFilterEmptied);
        }

        Ok(Discovery { opportunities, used_fallback: discovery.used_fallback })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use picks_core::LlmError;
    use serde_json::{json, Value};

    struct Static(Result<Value, LlmError>);

    #[async_trait]
    impl LanguageModel for Static {
        async fn generate_object(&self, _request: &StructuredRequest) -> Result<Value, LlmError> {
            self.0.clone()
        }

        fn provider_name(&self) -> &'static str {
            "static"
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

    fn opportunity(ticker: &str) -> Value {
        json!({
            "ticker": ticker,
            "technicalSetup": "Ascending triangle",
            "momentumSignals": ["volume surge"],
            "riskLevel": "medium",
            "convictionLevel": "high",
            "sector": "Technology",
            "marketCap": "large",
            "strategy": "breakout",
            "catalyst": "technical",
            "technicalScore": 8
        })
    }

    #[tokio::test]
    async fn test_dedupes_and_drops_malformed() {
        let model = Static(Ok(json!({
            "opportunities": [opportunity("nvda"), opportunity("NVDA"), opportunity("bad ticker"), opportunity("AMD")]
        })));
        let reference = ReferenceData::builtin();
        let config = PipelineConfig::immediate();
        let discovery = Discoverer::new(&model, &reference, &config)
            .discover(&criteria("all"))
            .await
            .unwrap();
        assert!(!discovery.used_fallback);
        let tickers: Vec<_> = discovery.opportunities.iter().map(|o| o.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["NVDA", "AMD"]);
    }

    #[tokio::test]
    async fn test_empty_response_falls_back() {
        let model = Static(Ok(json!({ "opportunities": [] })));
        let reference = ReferenceData::builtin();
        let config = PipelineConfig::immediate();
        let discovery = Discoverer::new(&model, &reference, &config)
            .discover(&criteria("all"))
            .await
            .unwrap();
        assert!(discovery.used_fallback);
        assert_eq!(discovery.opportunities.len(), 3);
        assert_eq!(discovery.opportunities[0].ticker, "AAPL");
        assert_eq!(discovery.opportunities[0].risk_level, "high");
    }

    #[tokio::test]
    async fn test_international_fallback_survives_filter() {
        let model = Static(Err(LlmError::Unavailable("down".into())));
        let reference = ReferenceData::builtin();
        let config = PipelineConfig::immediate();
        let discovery = Discoverer::new(&model, &reference, &config)
            .discover(&criteria("international-plays"))
            .await
            .unwrap();
        let tickers: Vec<_> = discovery.opportunities.iter().map(|o| o.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["TSM", "ASML", "NVO"]);
    }

    #[tokio::test]
    async fn test_international_filter_emptied() {
        let model = Static(Ok(json!({ "opportunities": [opportunity("AAPL"), opportunity("MSFT")] })));
        let reference = ReferenceData::builtin();
        let config = PipelineConfig::immediate();
        let result = Discoverer::new(&model, &reference, &config)
            .discover(&criteria("international-plays"))
            .await;
        assert!(matches!(result, Err(PickError::InternationalFilterEmptied)));
    }
}
