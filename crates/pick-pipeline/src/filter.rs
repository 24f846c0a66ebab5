use picks_core::{Criteria, Pick};
use tracing::debug;

pub const MAX_PICKS: usize = 5;
pub const MIN_QUANTITATIVE_SCORE: f64 = 75.0;
pub const MIN_TECHNICAL_SCORE: f64 = 7.0;
pub const MIN_RISK_REWARD: f64 = 2.0;
/// Diversity rules apply once this many picks are selected
const DIVERSITY_THRESHOLD: usize = 3;

/// Only approved, criteria-matched candidates reach the filter
pub fn eligible(candidates: Vec<Pick>) -> Vec<Pick> {
    candidates
        .into_iter()
        .filter(|p| p.approved && p.criteria_validation.overall_match)
        .collect()
}

fn passes_quality_gates(pick: &Pick) -> bool {
    pick.quantitative_score >= MIN_QUANTITATIVE_SCORE
        && pick.technical_score >= MIN_TECHNICAL_SCORE
        && pick.risk_reward_ratio >= MIN_RISK_REWARD
}

fn duplicates(candidate: &Pick, selected: &[Pick], check_sector: bool) -> bool {
    selected.iter().any(|s| {
        (check_sector && s.sector.eq_ignore_ascii_case(&candidate.sector))
            || s.strategy.eq_ignore_ascii_case(&candidate.strategy)
            || s.market_cap.eq_ignore_ascii_case(&candidate.market_cap)
    })
}

/// Rank by composite quality and greedily select up to five diversified picks.
pub fn diversify(mut candidates: Vec<Pick>, criteria: &Criteria) -> Vec<Pick> {
    candidates.sort_by(|a, b| {
        b.composite_quality()
            .partial_cmp(&a.composite_quality())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let check_sector = criteria.wants_all_sectors();
    let mut selected: Vec<Pick> = Vec::with_capacity(MAX_PICKS);

    for candidate in candidates {
        if selected.len() >= MAX_PICKS {
            break;
        }
        if !passes_quality_gates(&candidate) {
            debug!(ticker = %candidate.ticker, "Skipped by quality gates");
            continue;
        }
        if selected.len() >= DIVERSITY_THRESHOLD && duplicates(&candidate, &selected, check_sector) {
            debug!(ticker = %candidate.ticker, "Skipped for diversification");
            continue;
        }
        selected.push(candidate);
    }

    selected
}
