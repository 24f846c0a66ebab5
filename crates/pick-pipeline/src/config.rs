use picks_core::{PickError, RateLimiter};
use std::str::FromStr;
use std::time::Duration;

/// What a stage does when the model cannot produce a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Deterministic optimistic verdicts keep candidates flowing
    #[default]
    FailOpen,
    /// Unvalidated candidates are rejected
    FailClosed,
}

impl FallbackPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackPolicy::FailOpen => "fail-open",
            FallbackPolicy::FailClosed => "fail-closed",
        }
    }
}

impl FromStr for FallbackPolicy {
    type Err = PickError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail-open" | "fail_open" | "open" => Ok(FallbackPolicy::FailOpen),
            "fail-closed" | "fail_closed" | "closed" => Ok(FallbackPolicy::FailClosed),
            other => Err(PickError::Configuration(format!(
                "unknown fallback policy '{}' (expected fail-open or fail-closed)",
                other
            ))),
        }
    }
}

/// Attempt budget for one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRetry {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl StageRetry {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

/// Upstream calls per minute under the default pacing, one every 3s
pub const DEFAULT_CALLS_PER_MINUTE: usize = 20;

#[derive(Clone)]
pub struct PipelineConfig {
    pub discovery: StageRetry,
    pub validation: StageRetry,
    pub analysis: StageRetry,
    pub scoring: StageRetry,
    pub discovery_temperature: f32,
    pub validation_temperature: f32,
    pub analysis_temperature: f32,
    pub scoring_temperature: f32,
    /// Provider-level retries passed with each request. Scoring always sends 0.
    pub llm_max_retries: u32,
    pub fallback_policy: FallbackPolicy,
    /// Shared limiter acquired before every model and vendor call
    pub pacer: Option<RateLimiter>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            discovery: StageRetry::new(3, Duration::from_secs(3)),
            validation: StageRetry::new(2, Duration::from_secs(1)),
            analysis: StageRetry::new(3, Duration::from_secs(2)),
            scoring: StageRetry::new(1, Duration::ZERO),
            discovery_temperature: 0.7,
            validation_temperature: 0.2,
            analysis_temperature: 0.3,
            scoring_temperature: 0.2,
            llm_max_retries: 1,
            fallback_policy: FallbackPolicy::FailOpen,
            pacer: Some(RateLimiter::per_minute("pipeline", DEFAULT_CALLS_PER_MINUTE)),
        }
    }
}

impl PipelineConfig {
    /// Same attempt counts with every delay removed and no pacing
    pub fn immediate() -> Self {
        let mut config = Self::default();
        for stage in [
            &mut config.discovery,
            &mut config.validation,
            &mut config.analysis,
            &mut config.scoring,
        ] {
            stage.delay = Duration::ZERO;
        }
        config.llm_max_retries = 0;
        config.pacer = None;
        config
    }

    pub fn with_fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.fallback_policy = policy;
        self
    }

    /// Pace model and vendor calls to `calls_per_minute`
    pub fn with_pacing(mut self, calls_per_minute: usize) -> Self {
        self.pacer = Some(RateLimiter::per_minute("pipeline", calls_per_minute));
        self
    }

    pub fn without_pacing(mut self) -> Self {
        self.pacer = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_attempt_budget() {
        let config = PipelineConfig::default();
        assert_eq!(config.discovery.attempts, 3);
        assert_eq!(config.validation.attempts, 2);
        assert_eq!(config.analysis.attempts, 3);
        assert_eq!(config.scoring.attempts, 1);
        assert_eq!(config.discovery.delay, Duration::from_secs(3));
        assert_eq!(config.fallback_policy, FallbackPolicy::FailOpen);
        assert!(config.pacer.is_some());
        assert!(config.without_pacing().pacer.is_none());
    }

    #[test]
    fn test_immediate_keeps_attempts() {
        let config = PipelineConfig::immediate();
        assert_eq!(config.analysis.attempts, 3);
        assert!(config.analysis.delay.is_zero());
        assert!(config.pacer.is_none());
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("fail-closed".parse::<FallbackPolicy>().unwrap(), FallbackPolicy::FailClosed);
        assert_eq!(" Fail-Open ".parse::<FallbackPolicy>().unwrap(), FallbackPolicy::FailOpen);
        assert!("sometimes".parse::<FallbackPolicy>().is_err());
        assert_eq!(FallbackPolicy::FailClosed.as_str().parse::<FallbackPolicy>().unwrap(), FallbackPolicy::FailClosed);
    }
}
