use thiserror::Error;

/// Failures reported by a structured-output language model.
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("LLM API key is not configured")]
    MissingApiKey,

    #[error("LLM rejected credentials: {0}")]
    Unauthorized(String),

    #[error("LLM rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),

    #[error("LLM output did not match schema: {0}")]
    Schema(String),
}

impl LlmError {
    /// Transient failures that a per-call retry can reasonably recover from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited(_) | LlmError::Timeout(_) | LlmError::Unavailable(_)
        )
    }

    pub fn status_code(&self) -> u16 {
        match self {
            LlmError::MissingApiKey => 500,
            LlmError::Unauthorized(_) => 401,
            LlmError::RateLimited(_) => 429,
            LlmError::Timeout(_) => 408,
            LlmError::Unavailable(_) => 503,
            LlmError::InvalidResponse(_) | LlmError::Schema(_) => 500,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            LlmError::MissingApiKey => "configuration",
            LlmError::Unauthorized(_) => "authentication",
            LlmError::RateLimited(_) => "rate_limit",
            LlmError::Timeout(_) => "timeout",
            LlmError::Unavailable(_) => "service_unavailable",
            LlmError::InvalidResponse(_) | LlmError::Schema(_) => "invalid_response",
        }
    }
}

/// Failures reported by a market-data vendor adapter.
#[derive(Error, Debug, Clone)]
pub enum MarketDataError {
    #[error("Market data provider unavailable: {0}")]
    Unavailable(String),

    #[error("Market data API error: {0}")]
    Api(String),

    #[error("Unknown ticker: {0}")]
    NotFound(String),

    #[error("Market data rate limit exceeded")]
    RateLimited,

    #[error("Market data parse error: {0}")]
    Parse(String),
}

/// Pipeline-level error surfaced to callers of the pick generator.
#[derive(Error, Debug)]
pub enum PickError {
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No opportunities discovered: {0}")]
    NoOpportunities(String),

    #[error("International filter removed every candidate (all discovered tickers are US-listed)")]
    InternationalFilterEmptied,

    #[error("Invariant violated for {ticker}: {message}")]
    InvariantViolation { ticker: String, message: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    #[error("Store error: {0}")]
    Store(String),
}

impl PickError {
    pub fn invariant(ticker: &str, message: impl Into<String>) -> Self {
        PickError::InvariantViolation {
            ticker: ticker.to_string(),
            message: message.into(),
        }
    }

    /// HTTP status for this error. Typed variants map directly; anything else
    /// falls back to classifying the message text.
    pub fn status_code(&self) -> u16 {
        match self {
            PickError::InvalidCriteria(_) => 400,
            PickError::Configuration(_) => 500,
            PickError::Llm(e) => e.status_code(),
            PickError::MarketData(MarketDataError::RateLimited) => 429,
            PickError::MarketData(_) => 503,
            other => classify_message(&other.to_string()).0,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            PickError::InvalidCriteria(_) => "invalid_request",
            PickError::Configuration(_) => "configuration",
            PickError::Llm(e) => e.error_type(),
            PickError::MarketData(MarketDataError::RateLimited) => "rate_limit",
            PickError::MarketData(_) => "service_unavailable",
            other => classify_message(&other.to_string()).1,
        }
    }
}

/// Best-effort status inference from a free-form error message.
pub fn classify_message(message: &str) -> (u16, &'static str) {
    let lower = message.to_lowercase();
    if lower.contains("api key") || lower.contains("unauthorized") || lower.contains("401") {
        (401, "authentication")
    } else if lower.contains("rate limit") || lower.contains("quota") || lower.contains("429") {
        (429, "rate_limit")
    } else if lower.contains("timeout") || lower.contains("timed out") {
        (408, "timeout")
    } else if lower.contains("unavailable")
        || lower.contains("network")
        || lower.contains("connection refused")
        || lower.contains("fetch failed")
    {
        (503, "service_unavailable")
    } else {
        (500, "internal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_message() {
        assert_eq!(classify_message("Invalid API key provided").0, 401);
        assert_eq!(classify_message("You exceeded your current quota").0, 429);
        assert_eq!(classify_message("request timed out").0, 408);
        assert_eq!(classify_message("network error: connection refused").0, 503);
        assert_eq!(classify_message("something odd").0, 500);
    }

    #[test]
    fn test_typed_status_codes() {
        assert_eq!(PickError::Llm(LlmError::RateLimited("slow down".into())).status_code(), 429);
        assert_eq!(PickError::Llm(LlmError::Timeout(30)).status_code(), 408);
        assert_eq!(PickError::Llm(LlmError::MissingApiKey).status_code(), 500);
        assert_eq!(PickError::InvalidCriteria("timeframe".into()).status_code(), 400);
        assert_eq!(PickError::InternationalFilterEmptied.status_code(), 500);
        assert_eq!(
            PickError::MarketData(MarketDataError::Unavailable("down".into())).error_type(),
            "service_unavailable"
        );
    }
}
