use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<StoreError> for picks_core::PickError {
    fn from(e: StoreError) -> Self {
        picks_core::PickError::Store(e.to_string())
    }
}
