use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{LlmError, MarketDataError, StockSnapshot};

/// A schema-constrained generation request
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub schema_name: &'static str,
    pub schema: Value,
    pub temperature: f32,
    /// Provider-level retries on transient failures
    pub max_retries: u32,
}

/// Trait for language-model providers that return structured JSON
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate_object(&self, request: &StructuredRequest) -> Result<Value, LlmError>;

    fn provider_name(&self) -> &'static str;
}

/// Generate an object and decode it into `T`. Decode failures surface as
/// `LlmError::Schema`.
pub async fn generate_typed<T: DeserializeOwned>(
    model: &dyn LanguageModel,
    request: &StructuredRequest,
) -> Result<T, LlmError> {
    let value = model.generate_object(request).await?;
    serde_json::from_value(value)
        .map_err(|e| LlmError::Schema(format!("{}: {}", request.schema_name, e)))
}

/// Trait for market-data vendors
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Whether the vendor recognizes the symbol
    async fn validate_ticker(&self, ticker: &str) -> Result<bool, MarketDataError>;

    async fn stock_snapshot(&self, ticker: &str) -> Result<StockSnapshot, MarketDataError>;

    fn provider_name(&self) -> &'static str;
}
