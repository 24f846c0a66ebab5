use picks_core::{
    generate_typed, Criteria, IndicatorSignals, KeyLevels, LanguageModel, Opportunity,
    PickError, PriceAnalysis, StructuredRequest, TechnicalData,
};
use serde::Deserialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::prompts;
use crate::retry::with_retries;

pub const MIN_RISK_REWARD: f64 = 1.5;
pub const MIN_PROBABILITY: f64 = 60.0;
pub const MAX_PROBABILITY: f64 = 90.0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisResponse {
    target_price: f64,
    stop_loss: f64,
    probability_of_success: f64,
    #[serde(default)]
    key_levels: KeyLevels,
    #[serde(default)]
    indicator_signals: IndicatorSignals,
    #[serde(default)]
    rationale: String,
}

/// Check a proposed plan against the live price. The model's own current
/// price, expected move and risk/reward are ignored and recomputed.
fn check_plan(ticker: &str, live_price: f64, response: AnalysisResponse) -> Result<PriceAnalysis, PickError> {
    let current = live_price;
    let target = response.target_price;
    let stop = response.stop_loss;

    if !(current.is_finite() && current > 0.0) {
        return Err(PickError::invariant(ticker, format!("no usable live price ({})", current)));
    }
    if !target.is_finite() || target <= current {
        return Err(PickError::invariant(
            ticker,
            format!("target {:.2} is not above current price {:.2}", target, current),
        ));
    }
    if !stop.is_finite() || stop >= current || stop <= 0.0 {
        return Err(PickError::invariant(
            ticker,
            format!("stop loss {:.2} is not between 0 and current price {:.2}", stop, current),
        ));
    }

    let risk_reward = (target - current) / (current - stop);
    if risk_reward < MIN_RISK_REWARD {
        return Err(PickError::invariant(
            ticker,
            format!("risk/reward {:.2} below {:.1}", risk_reward, MIN_RISK_REWARD),
        ));
    }

    if !response.probability_of_success.is_finite() {
        return Err(PickError::invariant(ticker, "probability of success is not a number"));
    }

    Ok(PriceAnalysis {
        current_price: current,
        target_price: target,
        stop_loss: stop,
        expected_move_percent: (target - current) / current * 100.0,
        risk_reward,
        probability_of_success: response
            .probability_of_success
            .clamp(MIN_PROBABILITY, MAX_PROBABILITY),
        key_levels: response.key_levels,
        indicator_signals: response.indicator_signals,
        rationale: response.rationale,
    })
}

/// Produces a validated numeric trade plan, or fails the candidate
pub struct Analyzer<'a> {
    model: &'a dyn LanguageModel,
    config: &'a PipelineConfig,
}

impl<'a> Analyzer<'a> {
    pub fn new(model: &'a dyn LanguageModel, config: &'a PipelineConfig) -> Self {
        Self { model, config }
    }

    pub async fn analyze(
        &self,
        opportunity: &Opportunity,
        technical: &TechnicalData,
        criteria: &Criteria,
    ) -> Result<PriceAnalysis, PickError> {
        let ticker = opportunity.ticker.as_str();
        let request = StructuredRequest {
            model: criteria.model.clone(),
            system: prompts::ANALYSIS_SYSTEM.to_string(),
            prompt: prompts::analysis_prompt(opportunity, technical, criteria),
            schema_name: prompts::ANALYSIS_SCHEMA,
            schema: prompts::analysis_schema(),
            temperature: self.config.analysis_temperature,
            max_retries: self.config.llm_max_retries,
        };

        let model = self.model;
        let request = &request;
        let live_price = technical.price;
        let analysis = with_retries("analysis", ticker, self.config.analysis, move |_| async move {
            let response: AnalysisResponse = generate_typed(model, request).await?;
            check_plan(ticker, live_price, response)
        })
        .await?;

        info!(
            ticker,
            target = analysis.target_price,
            stop = analysis.stop_loss,
            risk_reward = analysis.risk_reward,
            "Price analysis accepted"
        );
        Ok(analysis)
    }
}
