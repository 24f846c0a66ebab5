use serde::{Deserialize, Deserializer, Serialize};

use crate::PickError;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const INTERNATIONAL_PLAYS: &str = "international-plays";

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// `"model": null` means the same as leaving the field out
fn model_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_model))
}

/// User-supplied trading criteria for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criteria {
    pub timeframe: String,
    pub risk_appetite: String,
    pub catalyst_type: String,
    pub sector_preference: String,
    pub discovery_method: String,
    #[serde(default = "default_model", deserialize_with = "model_or_default")]
    pub model: String,
}

impl Criteria {
    /// Reject blank dimensions before any external call is made.
    pub fn validate(&self) -> Result<(), PickError> {
        let fields = [
            ("timeframe", &self.timeframe),
            ("riskAppetite", &self.risk_appetite),
            ("catalystType", &self.catalyst_type),
            ("sectorPreference", &self.sector_preference),
            ("discoveryMethod", &self.discovery_method),
            ("model", &self.model),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(PickError::InvalidCriteria(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }

    pub fn wants_all_sectors(&self) -> bool {
        self.sector_preference.eq_ignore_ascii_case("all")
    }

    pub fn is_international(&self) -> bool {
        self.discovery_method.eq_ignore_ascii_case(INTERNATIONAL_PLAYS)
    }
}

/// LLM-proposed candidate ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub ticker: String,
    #[serde(default)]
    pub company_name: Option<String>,
    pub technical_setup: String,
    #[serde(default)]
    pub momentum_signals: Vec<String>,
    pub risk_level: String,
    pub conviction_level: String,
    pub sector: String,
    /// Market-cap bucket: "large", "mid" or "small"
    pub market_cap: String,
    pub strategy: String,
    #[serde(default)]
    pub catalyst: String,
    /// Technical setup quality, 1-10
    pub technical_score: f64,
}

impl Opportunity {
    /// Normalize LLM-asserted attributes and reject unusable candidates.
    pub fn normalized(mut self) -> Result<Self, PickError> {
        self.ticker = self.ticker.trim().to_uppercase();
        if !is_valid_ticker(&self.ticker) {
            return Err(PickError::Validation(format!("invalid ticker '{}'", self.ticker)));
        }
        if !self.technical_score.is_finite() {
            return Err(PickError::Validation(format!(
                "{}: technical score is not a number",
                self.ticker
            )));
        }
        self.technical_score = self.technical_score.clamp(1.0, 10.0);
        self.risk_level = self.risk_level.trim().to_lowercase();
        self.conviction_level = self.conviction_level.trim().to_lowercase();
        self.market_cap = normalize_market_cap(&self.market_cap);
        self.strategy = self.strategy.trim().to_lowercase();
        self.sector = self.sector.trim().to_string();
        Ok(self)
    }
}

/// Accepts exchange-style tickers such as `AAPL`, `BRK.B`, `RDS-A`.
pub fn is_valid_ticker(ticker: &str) -> bool {
    !ticker.is_empty()
        && ticker.len() <= 10
        && ticker.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && ticker
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-')
}

fn normalize_market_cap(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    if lower.starts_with("large") || lower.starts_with("mega") {
        "large".to_string()
    } else if lower.starts_with("mid") {
        "mid".to_string()
    } else if lower.starts_with("small") || lower.starts_with("micro") {
        "small".to_string()
    } else {
        lower
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityBucket {
    High,
    Medium,
    Low,
}

impl VolatilityBucket {
    pub fn from_change_percent(change_percent: f64) -> Self {
        let magnitude = change_percent.abs();
        if magnitude > 5.0 {
            VolatilityBucket::High
        } else if magnitude > 2.0 {
            VolatilityBucket::Medium
        } else {
            VolatilityBucket::Low
        }
    }
}

/// Where a piece of data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Fallback,
}

/// Whether an assessment came from the model or a deterministic formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentSource {
    Model,
    Fallback,
}

/// Vendor quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub ticker: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: f64,
    pub week_52_high: Option<f64>,
    pub week_52_low: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub name: String,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalIndicators {
    pub rsi: Option<f64>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub macd: Option<f64>,
    pub avg_volume: Option<f64>,
}

/// Disclosed trade by a government official
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernmentTrade {
    pub official: String,
    pub transaction_type: String,
    pub amount: Option<String>,
    pub date: Option<String>,
}

/// Everything a vendor knows about one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    pub quote: Quote,
    pub profile: Option<CompanyProfile>,
    pub technicals: TechnicalIndicators,
    #[serde(default)]
    pub government_trades: Vec<GovernmentTrade>,
}

/// Market snapshot for one candidate, live or synthesized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalData {
    pub ticker: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: f64,
    pub company_name: String,
    pub market_cap: f64,
    pub sector: String,
    pub indicators: TechnicalIndicators,
    pub week_52_high: f64,
    pub week_52_low: f64,
    pub volatility: VolatilityBucket,
    pub government_trades: Vec<GovernmentTrade>,
    pub source: DataSource,
}

/// One of the five criteria dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionScore {
    pub matches: bool,
    pub reasoning: String,
    pub score: f64,
}

impl DimensionScore {
    pub fn new(matches: bool, reasoning: impl Into<String>, score: f64) -> Self {
        Self {
            matches,
            reasoning: reasoning.into(),
            score: score.clamp(0.0, 100.0),
        }
    }
}

pub const CRITERIA_PASS_SCORE: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaValidation {
    pub timeframe_alignment: DimensionScore,
    pub risk_alignment: DimensionScore,
    pub catalyst_alignment: DimensionScore,
    pub sector_alignment: DimensionScore,
    pub discovery_alignment: DimensionScore,
    pub aggregate_score: f64,
    pub overall_match: bool,
    pub source: AssessmentSource,
}

impl CriteriaValidation {
    /// Builds a verdict, deriving the aggregate and overall match from the
    /// five dimensions rather than trusting a caller-supplied value.
    pub fn from_dimensions(
        timeframe_alignment: DimensionScore,
        risk_alignment: DimensionScore,
        catalyst_alignment: DimensionScore,
        sector_alignment: DimensionScore,
        discovery_alignment: DimensionScore,
        source: AssessmentSource,
    ) -> Self {
        let mut validation = Self {
            timeframe_alignment,
            risk_alignment,
            catalyst_alignment,
            sector_alignment,
            discovery_alignment,
            aggregate_score: 0.0,
            overall_match: false,
            source,
        };
        let dims = validation.dimensions();
        let aggregate = dims.iter().map(|d| d.score).sum::<f64>() / dims.len() as f64;
        let all_pass = dims
            .iter()
            .all(|d| d.matches && d.score >= CRITERIA_PASS_SCORE);
        validation.aggregate_score = aggregate;
        validation.overall_match = all_pass && aggregate >= CRITERIA_PASS_SCORE;
        validation
    }

    pub fn dimensions(&self) -> [&DimensionScore; 5] {
        [
            &self.timeframe_alignment,
            &self.risk_alignment,
            &self.catalyst_alignment,
            &self.sector_alignment,
            &self.discovery_alignment,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyLevels {
    #[serde(default)]
    pub support: Vec<f64>,
    #[serde(default)]
    pub resistance: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSignals {
    #[serde(default)]
    pub rsi: String,
    #[serde(default)]
    pub macd: String,
    #[serde(default)]
    pub volume: String,
}

/// Numeric trade plan. Invariant: target > current > stop, risk/reward >= 1.5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAnalysis {
    pub current_price: f64,
    pub target_price: f64,
    pub stop_loss: f64,
    pub expected_move_percent: f64,
    pub risk_reward: f64,
    pub probability_of_success: f64,
    pub key_levels: KeyLevels,
    pub indicator_signals: IndicatorSignals,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recommendation {
    #[serde(alias = "strong_buy", alias = "STRONG_BUY", alias = "Strong Buy")]
    StrongBuy,
    #[serde(alias = "BUY", alias = "Buy")]
    Buy,
    #[serde(alias = "HOLD", alias = "Hold")]
    Hold,
    #[serde(alias = "AVOID", alias = "Avoid")]
    Avoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvictionLevel {
    #[serde(alias = "High", alias = "HIGH")]
    High,
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "Low", alias = "LOW")]
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSizing {
    #[serde(alias = "Large", alias = "LARGE")]
    Large,
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "Small", alias = "SMALL")]
    Small,
}

/// Final institutional-grade approval for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalValidation {
    pub approved: bool,
    pub quantitative_score: f64,
    pub conviction_level: ConvictionLevel,
    pub hedge_fund_recommendation: Recommendation,
    pub position_sizing: PositionSizing,
    pub reasoning: String,
    pub source: AssessmentSource,
}

/// Output record: the flattened merge of every stage's view of a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pick {
    pub ticker: String,
    pub company_name: String,
    pub sector: String,
    pub market_cap: String,
    pub market_cap_value: f64,
    pub strategy: String,
    pub catalyst: String,
    pub technical_setup: String,
    pub momentum_signals: Vec<String>,
    pub risk_level: String,
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_loss_price: f64,
    pub expected_move: f64,
    pub risk_reward_ratio: f64,
    pub probability_of_success: f64,
    pub key_levels: KeyLevels,
    pub indicator_signals: IndicatorSignals,
    pub price_change_percent: f64,
    pub volume: f64,
    pub volatility: VolatilityBucket,
    pub government_trades: Vec<GovernmentTrade>,
    pub technical_score: f64,
    pub criteria_compliance: f64,
    pub criteria_validation: CriteriaValidation,
    pub approved: bool,
    pub quantitative_score: f64,
    pub conviction_level: ConvictionLevel,
    pub recommendation: Recommendation,
    pub position_sizing: PositionSizing,
    pub analysis_rationale: String,
    pub approval_reasoning: String,
    pub data_source: DataSource,
}

impl Pick {
    pub fn assemble(
        opportunity: Opportunity,
        technical: TechnicalData,
        analysis: PriceAnalysis,
        criteria: CriteriaValidation,
        approval: FinalValidation,
    ) -> Self {
        let company_name = opportunity
            .company_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| technical.company_name.clone());
        Self {
            ticker: opportunity.ticker,
            company_name,
            sector: opportunity.sector,
            market_cap: opportunity.market_cap,
            market_cap_value: technical.market_cap,
            strategy: opportunity.strategy,
            catalyst: opportunity.catalyst,
            technical_setup: opportunity.technical_setup,
            momentum_signals: opportunity.momentum_signals,
            risk_level: opportunity.risk_level,
            // Entry always tracks the live quote, whatever the model proposed.
            entry_price: technical.price,
            target_price: analysis.target_price,
            stop_loss_price: analysis.stop_loss,
            expected_move: analysis.expected_move_percent,
            risk_reward_ratio: analysis.risk_reward,
            probability_of_success: analysis.probability_of_success,
            key_levels: analysis.key_levels,
            indicator_signals: analysis.indicator_signals,
            price_change_percent: technical.change_percent,
            volume: technical.volume,
            volatility: technical.volatility,
            government_trades: technical.government_trades,
            technical_score: opportunity.technical_score,
            criteria_compliance: criteria.aggregate_score,
            criteria_validation: criteria,
            approved: approval.approved,
            quantitative_score: approval.quantitative_score,
            conviction_level: approval.conviction_level,
            recommendation: approval.hedge_fund_recommendation,
            position_sizing: approval.position_sizing,
            analysis_rationale: analysis.rationale,
            approval_reasoning: approval.reasoning,
            data_source: technical.source,
        }
    }

    /// Sort key used when ranking final candidates
    pub fn composite_quality(&self) -> f64 {
        self.quantitative_score + self.technical_score * 10.0 + self.criteria_compliance
    }
}
