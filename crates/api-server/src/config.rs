use anyhow::{Context, Result};
use pick_pipeline::FallbackPolicy;
use std::env;
use std::time::Duration;

/// Server settings read from the environment (after `.env` is loaded)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    // Language model
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub llm_rate_limit_per_minute: Option<usize>,

    // Market data
    pub polygon_api_key: Option<String>,
    pub polygon_rate_limit: usize,

    // Storage
    pub redis_url: Option<String>,
    pub database_url: Option<String>,
    pub cache_ttl: Duration,

    // Pipeline
    pub fallback_policy: FallbackPolicy,
    pub pacing_interval: Option<Duration>,
}

/// Default spacing between upstream calls; `PIPELINE_PACING_MS=0` disables it
pub const DEFAULT_PACING_MS: u64 = 3000;

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let pacing_ms: u64 = env::var("PIPELINE_PACING_MS")
            .unwrap_or_else(|_| DEFAULT_PACING_MS.to_string())
            .parse()
            .context("PIPELINE_PACING_MS must be a whole number of milliseconds")?;

        let llm_rate_limit_per_minute = match optional("LLM_RATE_LIMIT_PER_MINUTE") {
            Some(raw) => Some(
                raw.parse::<usize>()
                    .context("LLM_RATE_LIMIT_PER_MINUTE must be a positive integer")?,
            ),
            None => None,
        };

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid port number")?,
            openai_api_key: optional("OPENAI_API_KEY"),
            openai_base_url: optional("OPENAI_BASE_URL"),
            llm_rate_limit_per_minute,
            polygon_api_key: optional("POLYGON_API_KEY"),
            polygon_rate_limit: env::var("POLYGON_RATE_LIMIT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("POLYGON_RATE_LIMIT must be a positive integer")?,
            redis_url: optional("REDIS_URL"),
            database_url: optional("DATABASE_URL"),
            cache_ttl: Duration::from_secs(
                env::var("CACHE_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .context("CACHE_TTL_SECS must be a whole number of seconds")?,
            ),
            fallback_policy: env::var("PIPELINE_FALLBACK_POLICY")
                .unwrap_or_else(|_| "fail-open".to_string())
                .parse()?,
            pacing_interval: (pacing_ms > 0).then(|| Duration::from_millis(pacing_ms)),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.polygon_rate_limit == 0 {
            anyhow::bail!("POLYGON_RATE_LIMIT must be greater than zero");
        }
        if self.llm_rate_limit_per_minute == Some(0) {
            anyhow::bail!("LLM_RATE_LIMIT_PER_MINUTE must be greater than zero");
        }
        Ok(())
    }

    /// Upstream calls allowed per minute by the shared pacing limiter, or
    /// `None` when pacing is switched off. An explicit per-minute limit wins
    /// over a pacing interval.
    pub fn calls_per_minute(&self) -> Option<usize> {
        if let Some(limit) = self.llm_rate_limit_per_minute {
            return Some(limit);
        }
        self.pacing_interval
            .map(|interval| (60_000 / interval.as_millis().max(1)).max(1) as usize)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
