use picks_core::{
    generate_typed, AssessmentSource, Criteria, CriteriaValidation, DimensionScore,
    LanguageModel, Opportunity, PickError, StructuredRequest, TechnicalData,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{FallbackPolicy, PipelineConfig};
use crate::prompts;
use crate::reference::ReferenceData;
use crate::retry::with_retries;

const FALLBACK_SCORE: f64 = 75.0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidationResponse {
    timeframe_alignment: DimensionScore,
    risk_alignment: DimensionScore,
    catalyst_alignment: DimensionScore,
    sector_alignment: DimensionScore,
    discovery_alignment: DimensionScore,
}

impl ValidationResponse {
    fn into_validation(self, ticker: &str) -> Result<CriteriaValidation, PickError> {
        let dims = [
            &self.timeframe_alignment,
            &self.risk_alignment,
            &self.catalyst_alignment,
            &self.sector_alignment,
            &self.discovery_alignment,
        ];
        if let Some(bad) = dims
            .iter()
            .find(|d| !d.score.is_finite() || d.score < 0.0 || d.score > 100.0)
        {
            return Err(PickError::Validation(format!(
                "{}: criteria score {} outside 0-100",
                ticker, bad.score
            )));
        }
        Ok(CriteriaValidation::from_dimensions(
            self.timeframe_alignment,
            self.risk_alignment,
            self.catalyst_alignment,
            self.sector_alignment,
            self.discovery_alignment,
            AssessmentSource::Model,
        ))
    }
}

/// Scores a candidate against the five criteria dimensions
pub struct Validator<'a> {
    model: &'a dyn LanguageModel,
    reference: &'a ReferenceData,
    config: &'a PipelineConfig,
}

impl<'a> Validator<'a> {
    pub fn new(model: &'a dyn LanguageModel, reference: &'a ReferenceData, config: &'a PipelineConfig) -> Self {
        Self { model, reference, config }
    }

    pub async fn validate(
        &self,
        opportunity: &Opportunity,
        technical: &TechnicalData,
        criteria: &Criteria,
    ) -> CriteriaValidation {
        let ticker = opportunity.ticker.as_str();
        let request = StructuredRequest {
            model: criteria.model.clone(),
            system: prompts::VALIDATION_SYSTEM.to_string(),
            prompt: prompts::validation_prompt(opportunity, technical, criteria),
            schema_name: prompts::VALIDATION_SCHEMA,
            schema: prompts::validation_schema(),
            temperature: self.config.validation_temperature,
            max_retries: self.config.llm_max_retries,
        };

        let model = self.model;
        let request = &request;
        let result = with_retries("validation", ticker, self.config.validation, move |_| async move {
            let response: ValidationResponse = generate_typed(model, request).await?;
            response.into_validation(ticker)
        })
        .await;

        match result {
            Ok(validation) => {
                info!(
                    ticker,
                    aggregate = validation.aggregate_score,
                    overall_match = validation.overall_match,
                    "Criteria validated"
                );
                validation
            }
            Err(e) => {
                warn!(ticker, policy = ?self.config.fallback_policy, "Criteria validation failed ({}), using fallback", e);
                self.fallback(opportunity, technical, criteria)
            }
        }
    }

    pub fn fallback(&self, opportunity: &Opportunity, technical: &TechnicalData, criteria: &Criteria) -> CriteriaValidation {
        match self.config.fallback_policy {
            FallbackPolicy::FailOpen => self.rule_based(opportunity, technical, criteria),
            FallbackPolicy::FailClosed => {
                let reject = || DimensionScore::new(false, "Validation unavailable", 0.0);
                CriteriaValidation::from_dimensions(
                    reject(),
                    reject(),
                    reject(),
                    reject(),
                    reject(),
                    AssessmentSource::Fallback,
                )
            }
        }
    }

    /// Flat scores with `matches` derived from simple field comparisons
    fn rule_based(&self, opportunity: &Opportunity, technical: &TechnicalData, criteria: &Criteria) -> CriteriaValidation {
        let risk_level = opportunity.risk_level.to_lowercase();
        let risk_matches = match criteria.risk_appetite.to_lowercase().as_str() {
            "conservative" => risk_level == "low",
            "moderate" => risk_level == "low" || risk_level == "medium",
            _ => true,
        };

        let catalyst = criteria.catalyst_type.to_lowercase();
        let catalyst_matches = catalyst == "all"
            || opportunity.catalyst.to_lowercase().contains(&catalyst)
            || opportunity.technical_setup.to_lowercase().contains(&catalyst);

        let preference = criteria.sector_preference.to_lowercase();
        let sector_matches = criteria.wants_all_sectors()
            || opportunity.sector.to_lowercase().contains(&preference)
            || technical.sector.to_lowercase().contains(&preference);

        let discovery_matches =
            !criteria.is_international() || !self.reference.is_us_listed(&opportunity.ticker);

        let dim = |matches: bool, label: &str| {
            let verdict = if matches { "consistent with" } else { "does not match" };
            DimensionScore::new(matches, format!("Rule-based: {} {}", verdict, label), FALLBACK_SCORE)
        };

        CriteriaValidation::from_dimensions(
            dim(true, "timeframe"),
            dim(risk_matches, "risk appetite"),
            dim(catalyst_matches, "catalyst type"),
            dim(sector_matches, "sector preference"),
            dim(discovery_matches, "discovery method"),
            AssessmentSource::Fallback,
        )
    }
}
