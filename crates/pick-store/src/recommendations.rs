use chrono::{DateTime, SecondsFormat, Utc};
use picks_core::{Criteria, Pick};
use serde::Serialize;
use sqlx::{AnyPool, Row};
use tracing::info;

use crate::StoreError;

pub const DEFAULT_RECENT_LIMIT: u32 = 20;
pub const MAX_RECENT_LIMIT: u32 = 100;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS recommendations (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL,
    ticker TEXT NOT NULL,
    quantitative_score DOUBLE PRECISION NOT NULL,
    payload TEXT NOT NULL,
    criteria TEXT NOT NULL,
    generated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_recommendations_generated_at ON recommendations (generated_at)
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholders {
    Question,
    Dollar,
}

/// A persisted pick with the run it came from
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPick {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub criteria: Criteria,
    pub pick: Pick,
}

/// Relational store of generated recommendations
#[derive(Clone)]
pub struct RecommendationStore {
    pool: AnyPool,
    placeholders: Placeholders,
}

impl RecommendationStore {
    /// Connect and create the schema. Accepts `postgres://` and `sqlite:` URLs.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new()
            .max_connections(if database_url.starts_with("sqlite::memory:") { 1 } else { 5 })
            .connect(database_url)
            .await?;
        Self::with_pool(pool, database_url).await
    }

    pub async fn with_pool(pool: AnyPool, database_url: &str) -> Result<Self, StoreError> {
        let placeholders = if database_url.starts_with("postgres") {
            Placeholders::Dollar
        } else {
            Placeholders::Question
        };
        let store = Self { pool, placeholders };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        // One statement per query
        for statement in SCHEMA.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    fn params(&self, count: usize) -> String {
        (1..=count)
            .map(|i| match self.placeholders {
                Placeholders::Question => "?".to_string(),
                Placeholders::Dollar => format!("${}", i),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Persist every pick of one run. Re-saving the same run replaces its rows.
    pub async fn save_picks(
        &self,
        run_id: &str,
        criteria: &Criteria,
        picks: &[Pick],
        generated_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let criteria_json = serde_json::to_string(criteria)?;
        let timestamp = generated_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        let delete = format!("DELETE FROM recommendations WHERE id = {}", self.params(1));
        let insert = format!(
            "INSERT INTO recommendations (id, run_id, ticker, quantitative_score, payload, criteria, generated_at) VALUES ({})",
            self.params(7)
        );

        let mut tx = self.pool.begin().await?;
        for pick in picks {
            let id = format!("{}:{}", run_id, pick.ticker);
            sqlx::query(&delete).bind(&id).execute(&mut *tx).await?;
            sqlx::query(&insert)
                .bind(&id)
                .bind(run_id)
                .bind(&pick.ticker)
                .bind(pick.quantitative_score)
                .bind(serde_json::to_string(pick)?)
                .bind(&criteria_json)
                .bind(&timestamp)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!(run_id, count = picks.len(), "Persisted recommendations");
        Ok(picks.len())
    }

    /// Most recent picks first. `limit` defaults to 20 and is capped at 100.
    pub async fn recent(&self, limit: Option<u32>) -> Result<Vec<StoredPick>, StoreError> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, MAX_RECENT_LIMIT);
        let sql = format!(
            "SELECT run_id, payload, criteria, generated_at FROM recommendations \
             ORDER BY generated_at DESC, quantitative_score DESC LIMIT {}",
            limit
        );

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<StoredPick, StoreError> {
                let run_id: String = row.try_get("run_id")?;
                let payload: String = row.try_get("payload")?;
                let criteria: String = row.try_get("criteria")?;
                let generated_at: String = row.try_get("generated_at")?;
                let generated_at = DateTime::parse_from_rfc3339(&generated_at)
                    .map_err(|e| StoreError::Corrupt(format!("generated_at '{}': {}", generated_at, e)))?
                    .with_timezone(&Utc);
                Ok(StoredPick {
                    run_id,
                    generated_at,
                    criteria: serde_json::from_str(&criteria)?,
                    pick: serde_json::from_str(&payload)?,
                })
            })
            .collect()
    }
}
