pub mod cache;
pub mod error;
pub mod market_cache;
pub mod recommendations;

pub use cache::{criteria_cache_key, get_json, set_json, KeyValueCache, MemoryCache, RedisCache};
pub use error::StoreError;
pub use market_cache::{CachedMarketData, DEFAULT_MARKET_TTL};
pub use recommendations::{RecommendationStore, StoredPick};
