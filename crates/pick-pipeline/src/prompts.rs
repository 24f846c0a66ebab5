//! Prompt text and response schemas for each model-backed stage.

use picks_core::{CriteriaValidation, Criteria, Opportunity, PriceAnalysis, TechnicalData};
use serde_json::{json, Value};

pub const DISCOVERY_SCHEMA: &str = "opportunity_discovery";
pub const VALIDATION_SCHEMA: &str = "criteria_validation";
pub const ANALYSIS_SCHEMA: &str = "price_analysis";
pub const SCORING_SCHEMA: &str = "final_validation";

pub const DISCOVERY_SYSTEM: &str = "You are a senior equity analyst at a quantitative hedge fund. \
Identify liquid, tradeable stock opportunities that match the user's criteria exactly. \
Only propose real, currently listed tickers. Respond with JSON matching the schema.";

pub const VALIDATION_SYSTEM: &str = "You are a compliance analyst. Score how well a candidate \
matches each of the user's five criteria independently, from 0 to 100. Be strict: a score \
of 70 or more means the candidate genuinely satisfies that criterion.";

pub const ANALYSIS_SYSTEM: &str = "You are a quantitative price analyst. Produce a realistic \
trade plan anchored on the live price provided. The target must be above the current price, \
the stop loss below it, and the reward-to-risk ratio at least 1.5. Probability of success \
must be between 60 and 90.";

pub const SCORING_SYSTEM: &str = "You are the head of risk at an institutional fund giving \
final approval on trade ideas. Approve only candidates whose criteria fit, technical setup, \
risk/reward and probability all meet institutional standards.";

fn criteria_block(criteria: &Criteria) -> String {
    format!(
        "TIMEFRAME: {}\nRISK APPETITE: {}\nCATALYST TYPE: {}\nSECTOR PREFERENCE: {}\nDISCOVERY METHOD: {}",
        criteria.timeframe,
        criteria.risk_appetite,
        criteria.catalyst_type,
        criteria.sector_preference,
        criteria.discovery_method
    )
}

fn market_block(technical: &TechnicalData) -> String {
    let fmt = |v: Option<f64>| v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "n/a".to_string());
    format!(
        "PRICE: {:.2} ({:+.2}%)\nVOLUME: {:.0}\nMARKET CAP: {:.0}\nSECTOR: {}\n52W RANGE: {:.2} - {:.2}\n\
RSI: {}\nSMA20: {}\nSMA50: {}\nMACD: {}\nVOLATILITY: {:?}\nGOVERNMENT TRADES: {}\nDATA SOURCE: {:?}",
        technical.price,
        technical.change_percent,
        technical.volume,
        technical.market_cap,
        technical.sector,
        technical.week_52_low,
        technical.week_52_high,
        fmt(technical.indicators.rsi),
        fmt(technical.indicators.sma_20),
        fmt(technical.indicators.sma_50),
        fmt(technical.indicators.macd),
        technical.volatility,
        technical.government_trades.len(),
        technical.source,
    )
}

fn opportunity_block(opportunity: &Opportunity) -> String {
    format!(
        "TICKER: {}\nSETUP: {}\nMOMENTUM: {}\nSTRATEGY: {}\nCATALYST: {}\nRISK LEVEL: {}\nMARKET CAP BUCKET: {}\nTECHNICAL SCORE: {:.1}",
        opportunity.ticker,
        opportunity.technical_setup,
        opportunity.momentum_signals.join(", "),
        opportunity.strategy,
        opportunity.catalyst,
        opportunity.risk_level,
        opportunity.market_cap,
        opportunity.technical_score,
    )
}

pub fn discovery_prompt(criteria: &Criteria) -> String {
    let mut prompt = format!(
        "Find 3 to 5 stock opportunities for these criteria.\n\n{}\n\n\
For each, give ticker, company name, technical setup, momentum signals, risk level, \
conviction level, sector, market cap bucket (large/mid/small), strategy, catalyst and a \
technical score from 1 to 10.",
        criteria_block(criteria)
    );
    if criteria.is_international() {
        prompt.push_str(
            "\n\nOnly propose companies headquartered outside the United States \
(ADRs and foreign listings). Do not include US-domiciled companies.",
        );
    }
    prompt
}

pub fn validation_prompt(opportunity: &Opportunity, technical: &TechnicalData, criteria: &Criteria) -> String {
    format!(
        "Validate this candidate against the user's criteria.\n\n{}\n\n{}\n\nUSER CRITERIA\n{}\n\n\
Score timeframe, risk, catalyst, sector and discovery-method alignment independently.",
        opportunity_block(opportunity),
        market_block(technical),
        criteria_block(criteria)
    )
}

pub fn analysis_prompt(opportunity: &Opportunity, technical: &TechnicalData, criteria: &Criteria) -> String {
    format!(
        "Build a price plan for this candidate.\n\n{}\n\n{}\n\nTIMEFRAME: {}\nRISK APPETITE: {}\n\n\
Use {:.2} as the current price. Give target price, stop loss, expected move percent, \
risk/reward, probability of success (60-90), key support/resistance levels, indicator \
signals and a short rationale.",
        opportunity_block(opportunity),
        market_block(technical),
        criteria.timeframe,
        criteria.risk_appetite,
        technical.price
    )
}

pub fn scoring_prompt(
    opportunity: &Opportunity,
    analysis: &PriceAnalysis,
    technical: &TechnicalData,
    validation: &CriteriaValidation,
    criteria: &Criteria,
) -> String {
    format!(
        "Give final approval for this trade idea.\n\n{}\n\n{}\n\n\
PLAN: entry {:.2}, target {:.2}, stop {:.2}, expected move {:.1}%, risk/reward {:.2}, probability {:.0}%\n\
CRITERIA COMPLIANCE: {:.1} (overall match: {})\n\nUSER CRITERIA\n{}\n\n\
Return approval, a quantitative score 0-100, conviction, recommendation \
(strong-buy/buy/hold/avoid), position sizing and reasoning.",
        opportunity_block(opportunity),
        market_block(technical),
        analysis.current_price,
        analysis.target_price,
        analysis.stop_loss,
        analysis.expected_move_percent,
        analysis.risk_reward,
        analysis.probability_of_success,
        validation.aggregate_score,
        validation.overall_match,
        criteria_block(criteria)
    )
}

pub fn discovery_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "opportunities": {
                "type": "array",
                "minItems": 1,
                "maxItems": 8,
                "items": {
                    "type": "object",
                    "properties": {
                        "ticker": { "type": "string" },
                        "companyName": { "type": "string" },
                        "technicalSetup": { "type": "string" },
                        "momentumSignals": { "type": "array", "items": { "type": "string" } },
                        "riskLevel": { "type": "string", "enum": ["low", "medium", "high"] },
                        "convictionLevel": { "type": "string", "enum": ["low", "medium", "high"] },
                        "sector": { "type": "string" },
                        "marketCap": { "type": "string", "enum": ["large", "mid", "small"] },
                        "strategy": { "type": "string" },
                        "catalyst": { "type": "string" },
                        "technicalScore": { "type": "number", "minimum": 1, "maximum": 10 }
                    },
                    "required": [
                        "ticker", "technicalSetup", "riskLevel", "convictionLevel",
                        "sector", "marketCap", "strategy", "technicalScore"
                    ]
                }
            }
        },
        "required": ["opportunities"]
    })
}

fn dimension_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "matches": { "type": "boolean" },
            "reasoning": { "type": "string" },
            "score": { "type": "number", "minimum": 0, "maximum": 100 }
        },
        "required": ["matches", "reasoning", "score"]
    })
}

pub fn validation_schema() -> Value {
    let dim = dimension_schema();
    json!({
        "type": "object",
        "properties": {
            "timeframeAlignment": dim,
            "riskAlignment": dim,
            "catalystAlignment": dim,
            "sectorAlignment": dim,
            "discoveryAlignment": dim
        },
        "required": [
            "timeframeAlignment", "riskAlignment", "catalystAlignment",
            "sectorAlignment", "discoveryAlignment"
        ]
    })
}

pub fn analysis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "currentPrice": { "type": "number" },
            "targetPrice": { "type": "number" },
            "stopLoss": { "type": "number" },
            "expectedMovePercent": { "type": "number" },
            "riskReward": { "type": "number" },
            "probabilityOfSuccess": { "type": "number", "minimum": 60, "maximum": 90 },
            "keyLevels": {
                "type": "object",
                "properties": {
                    "support": { "type": "array", "items": { "type": "number" } },
                    "resistance": { "type": "array", "items": { "type": "number" } }
                }
            },
            "indicatorSignals": {
                "type": "object",
                "properties": {
                    "rsi": { "type": "string" },
                    "macd": { "type": "string" },
                    "volume": { "type": "string" }
                }
            },
            "rationale": { "type": "string" }
        },
        "required": ["targetPrice", "stopLoss", "probabilityOfSuccess"]
    })
}

pub fn scoring_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "approved": { "type": "boolean" },
            "quantitativeScore": { "type": "number", "minimum": 0, "maximum": 100 },
            "convictionLevel": { "type": "string", "enum": ["high", "medium", "low"] },
            "hedgeFundRecommendation": {
                "type": "string",
                "enum": ["strong-buy", "buy", "hold", "avoid"]
            },
            "positionSizing": { "type": "string", "enum": ["large", "medium", "small"] },
            "reasoning": { "type": "string" }
        },
        "required": [
            "approved", "quantitativeScore", "convictionLevel",
            "hedgeFundRecommendation", "positionSizing", "reasoning"
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_discovery_prompt_mentions_criteria() {
        let prompt = discovery_prompt(&criteria("all"));
        assert!(prompt.contains("TIMEFRAME: 1-week"));
        assert!(prompt.contains("RISK APPETITE: aggressive"));
        assert!(!prompt.contains("outside the United States"));

        let intl = discovery_prompt(&criteria("international-plays"));
        assert!(intl.contains("outside the United States"));
    }

    #[test]
    fn test_schemas_require_core_fields() {
        let schema = scoring_schema();
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "quantitativeScore"));

        let validation = validation_schema();
        assert_eq!(validation["properties"]["riskAlignment"]["required"][2], "score");
    }
}
