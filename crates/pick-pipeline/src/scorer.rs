use picks_core::{
    generate_typed, AssessmentSource, ConvictionLevel, Criteria, CriteriaValidation,
    FinalValidation, LanguageModel, Opportunity, PickError, PositionSizing, PriceAnalysis,
    Recommendation, StructuredRequest, TechnicalData,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{FallbackPolicy, PipelineConfig};
use crate::prompts;
use crate::retry::with_retries;

const GATE_CRITERIA_SCORE: f64 = 70.0;
const GATE_TECHNICAL_SCORE: f64 = 6.0;
const GATE_RISK_REWARD: f64 = 1.5;
const GATE_PROBABILITY: f64 = 60.0;
const GATE_FAILED_SCORE_CAP: f64 = 65.0;
const MIN_APPROVED_SCORE: f64 = 70.0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoringResponse {
    approved: bool,
    quantitative_score: f64,
    conviction_level: ConvictionLevel,
    hedge_fund_recommendation: Recommendation,
    position_sizing: PositionSizing,
    #[serde(default)]
    reasoning: String,
}

/// Upstream numbers the approval gates look at
#[derive(Debug, Clone, Copy)]
pub struct GateInputs {
    pub criteria_score: f64,
    pub technical_score: f64,
    pub risk_reward: f64,
    pub probability: f64,
}

impl GateInputs {
    pub fn new(opportunity: &Opportunity, analysis: &PriceAnalysis, validation: &CriteriaValidation) -> Self {
        Self {
            criteria_score: validation.aggregate_score,
            technical_score: opportunity.technical_score,
            risk_reward: analysis.risk_reward,
            probability: analysis.probability_of_success,
        }
    }

    pub fn passes(&self) -> bool {
        self.criteria_score >= GATE_CRITERIA_SCORE
            && self.technical_score >= GATE_TECHNICAL_SCORE
            && self.risk_reward >= GATE_RISK_REWARD
            && self.probability >= GATE_PROBABILITY
    }
}

/// Force-override a verdict so it can never approve past the hard gates.
pub fn apply_gates(mut verdict: FinalValidation, gates: &GateInputs) -> FinalValidation {
    if !gates.passes() {
        verdict.approved = false;
        verdict.hedge_fund_recommendation = Recommendation::Avoid;
        verdict.quantitative_score = verdict.quantitative_score.min(GATE_FAILED_SCORE_CAP);
    } else if verdict.approved && verdict.quantitative_score < MIN_APPROVED_SCORE {
        verdict.approved = false;
        verdict.hedge_fund_recommendation = Recommendation::Hold;
    }
    verdict
}

/// `clamp(0.3c + 8t + 10rr + 0.4p, 1, 100)` with score-band labels
pub fn formula_verdict(gates: &GateInputs) -> FinalValidation {
    let score = (0.3 * gates.criteria_score
        + 8.0 * gates.technical_score
        + 10.0 * gates.risk_reward
        + 0.4 * gates.probability)
        .clamp(1.0, 100.0);

    let (recommendation, sizing, conviction) = if score >= 85.0 {
        (Recommendation::StrongBuy, PositionSizing::Large, ConvictionLevel::High)
    } else if score >= 70.0 {
        (Recommendation::Buy, PositionSizing::Medium, ConvictionLevel::Medium)
    } else {
        (Recommendation::Avoid, PositionSizing::Small, ConvictionLevel::Low)
    };

    FinalValidation {
        approved: score >= 70.0,
        quantitative_score: score,
        conviction_level: conviction,
        hedge_fund_recommendation: recommendation,
        position_sizing: sizing,
        reasoning: format!("Formula score {:.1} from criteria, technical, risk/reward and probability", score),
        source: AssessmentSource::Fallback,
    }
}

/// Final institutional approval for one candidate. Never fails.
pub struct Scorer<'a> {
    model: &'a dyn LanguageModel,
    config: &'a PipelineConfig,
}

impl<'a> Scorer<'a> {
    pub fn new(model: &'a dyn LanguageModel, config: &'a PipelineConfig) -> Self {
        Self { model, config }
    }

    pub async fn score(
        &self,
        opportunity: &Opportunity,
        analysis: &PriceAnalysis,
        technical: &TechnicalData,
        validation: &CriteriaValidation,
        criteria: &Criteria,
    ) -> FinalValidation {
        let ticker = opportunity.ticker.as_str();
        let gates = GateInputs::new(opportunity, analysis, validation);
        let request = StructuredRequest {
            model: criteria.model.clone(),
            system: prompts::SCORING_SYSTEM.to_string(),
            prompt: prompts::scoring_prompt(opportunity, analysis, technical, validation, criteria),
            schema_name: prompts::SCORING_SCHEMA,
            schema: prompts::scoring_schema(),
            temperature: self.config.scoring_temperature,
            max_retries: 0,
        };

        let model = self.model;
        let request = &request;
        let result = with_retries("scoring", ticker, self.config.scoring, move |_| async move {
            let response: ScoringResponse = generate_typed(model, request).await?;
            if !response.quantitative_score.is_finite() {
                return Err(PickError::Validation(format!("{}: quantitative score is not a number", ticker)));
            }
            Ok(FinalValidation {
                approved: response.approved,
                quantitative_score: response.quantitative_score.clamp(0.0, 100.0),
                conviction_level: response.conviction_level,
                hedge_fund_recommendation: response.hedge_fund_recommendation,
                position_sizing: response.position_sizing,
                reasoning: response.reasoning,
                source: AssessmentSource::Model,
            })
        })
        .await;

        let verdict = match result {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(ticker, policy = ?self.config.fallback_policy, "Final scoring failed ({}), using fallback", e);
                self.fallback(&gates)
            }
        };

        let verdict = apply_gates(verdict, &gates);
        info!(
            ticker,
            approved = verdict.approved,
            score = verdict.quantitative_score,
            recommendation = ?verdict.hedge_fund_recommendation,
            "Final validation complete"
        );
        verdict
    }

    fn fallback(&self, gates: &GateInputs) -> FinalValidation {
        match self.config.fallback_policy {
            FallbackPolicy::FailOpen => formula_verdict(gates),
            FallbackPolicy::FailClosed => FinalValidation {
                approved: false,
                quantitative_score: 0.0,
                conviction_level: ConvictionLevel::Low,
                hedge_fund_recommendation: Recommendation::Avoid,
                position_sizing: PositionSizing::Small,
                reasoning: "Final validation unavailable".to_string(),
                source: AssessmentSource::Fallback,
            },
        }
    }
}
