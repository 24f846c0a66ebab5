use chrono::{DateTime, Utc};
use picks_core::{
    AssessmentSource, Criteria, DataSource, LanguageModel, MarketDataProvider, Pick, PickError,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analyzer::Analyzer;
use crate::config::PipelineConfig;
use crate::discoverer::Discoverer;
use crate::enricher::Enricher;
use crate::filter;
use crate::pacing::{PacedMarketData, PacedModel};
use crate::reference::ReferenceData;
use crate::scorer::Scorer;
use crate::validator::Validator;

/// Per-stage counts reported alongside the picks
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub discovered: usize,
    pub enriched: usize,
    pub criteria_matched: usize,
    pub analyzed: usize,
    pub analysis_failures: usize,
    pub approved: usize,
    pub final_picks: usize,
    pub average_quantitative_score: f64,
    pub discovery_fallback: bool,
    pub fallback_market_data: usize,
    pub fallback_validations: usize,
    pub fallback_scores: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub run_id: String,
    pub picks: Vec<Pick>,
    pub stats: RunStats,
    pub model_used: String,
    pub generated_at: DateTime<Utc>,
}

pub struct PickPipeline {
    model: Arc<dyn LanguageModel>,
    market: Arc<dyn MarketDataProvider>,
    reference: Arc<ReferenceData>,
    config: PipelineConfig,
}

impl PickPipeline {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        market: Arc<dyn MarketDataProvider>,
        reference: Arc<ReferenceData>,
        config: PipelineConfig,
    ) -> Self {
        let (model, market): (Arc<dyn LanguageModel>, Arc<dyn MarketDataProvider>) = match &config.pacer {
            Some(limiter) => (
                Arc::new(PacedModel::new(model, limiter.clone())),
                Arc::new(PacedMarketData::new(market, limiter.clone())),
            ),
            None => (model, market),
        };
        Self { model, market, reference, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage for `criteria`. Candidates move through the stages one
    /// at a time; a candidate whose price analysis fails is dropped and the
    /// rest continue.
    pub async fn run(&self, criteria: &Criteria) -> Result<PipelineRun, PickError> {
        criteria.validate()?;
        let run_id = Uuid::new_v4().to_string();
        let model = self.model.as_ref();
        let reference = self.reference.as_ref();

        info!(
            run_id = %run_id,
            timeframe = %criteria.timeframe,
            risk = %criteria.risk_appetite,
            method = %criteria.discovery_method,
            model = %criteria.model,
            "Starting pick generation"
        );

        let discovery = Discoverer::new(model, reference, &self.config)
            .discover(criteria)
            .await?;

        let enricher = Enricher::new(self.market.as_ref(), reference);
        let validator = Validator::new(model, reference, &self.config);
        let analyzer = Analyzer::new(model, &self.config);
        let scorer = Scorer::new(model, &self.config);

        let mut stats = RunStats {
            discovered: discovery.opportunities.len(),
            discovery_fallback: discovery.used_fallback,
            ..RunStats::default()
        };
        let mut candidates = Vec::with_capacity(discovery.opportunities.len());

        for opportunity in discovery.opportunities {
            let ticker = opportunity.ticker.clone();

            let technical = enricher.enrich(&opportunity).await;
            stats.enriched += 1;
            if technical.source == DataSource::Fallback {
                stats.fallback_market_data += 1;
            }

            let validation = validator.validate(&opportunity, &technical, criteria).await;
            if validation.source == AssessmentSource::Fallback {
                stats.fallback_validations += 1;
            }
            if validation.overall_match {
                stats.criteria_matched += 1;
            }

            let analysis = match analyzer.analyze(&opportunity, &technical, criteria).await {
                Ok(analysis) => analysis,
                Err(e) => {
                    warn!(ticker = %ticker, stage = "analysis", "Dropping candidate: {}", e);
                    stats.analysis_failures += 1;
                    continue;
                }
            };
            stats.analyzed += 1;

            let approval = scorer
                .score(&opportunity, &analysis, &technical, &validation, criteria)
                .await;
            if approval.source == AssessmentSource::Fallback {
                stats.fallback_scores += 1;
            }
            if approval.approved {
                stats.approved += 1;
            }

            candidates.push(Pick::assemble(opportunity, technical, analysis, validation, approval));
        }

        let picks = filter::diversify(filter::eligible(candidates), criteria);
        stats.final_picks = picks.len();
        if !picks.is_empty() {
            stats.average_quantitative_score =
                picks.iter().map(|p| p.quantitative_score).sum::<f64>() / picks.len() as f64;
        }

        info!(
            run_id = %run_id,
            discovered = stats.discovered,
            analyzed = stats.analyzed,
            final_picks = stats.final_picks,
            "Pick generation complete"
        );

        Ok(PipelineRun {
            run_id,
            picks,
            stats,
            model_used: criteria.model.clone(),
            generated_at: Utc::now(),
        })
    }
}
