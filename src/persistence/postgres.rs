//! PostgreSQL implementation of the negotiation log.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::NewLogEntry;
use crate::config::AppConfig;
use crate::error::SwapError;

/// PostgreSQL-backed negotiation log using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresEventLog {
    pool: PgPool,
}

impl PostgresEventLog {
    /// Creates a new log over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized by `config` and applies the embedded
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`SwapError::Persistence`] if the database is unreachable
    /// or a migration fails.
    pub async fn connect(config: &AppConfig) -> Result<Self, SwapError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| SwapError::Persistence(format!("migration failed: {e}")))?;

        Ok(Self::new(pool))
    }

    /// Appends an entry. Returns `false` if an entry with the same
    /// `entry_id` was already stored.
    ///
    /// # Errors
    ///
    /// Returns a [`SwapError::Persistence`] on database failure.
    pub async fn append(&self, entry: &NewLogEntry) -> Result<bool, SwapError> {
        let result = sqlx::query(
            "INSERT INTO negotiation_log \
             (entry_id, aggregate_kind, aggregate_id, event_type, payload, occurred_at) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (entry_id) DO NOTHING",
        )
        .bind(entry.entry_id)
        .bind(entry.aggregate_kind)
        .bind(entry.aggregate_id)
        .bind(entry.event_type)
        .bind(&entry.payload)
        .bind(entry.occurred_at)
        .execute(&self.pool)
        .await
        .map_err(|e| SwapError::Persistence(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    /// Deletes entries older than the given number of days.
    ///
    /// # Errors
    ///
    /// Returns a [`SwapError::Persistence`] on database failure.
    pub async fn delete_older_than(&self, days: u64) -> Result<u64, SwapError> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::try_from(days).unwrap_or(i64::MAX));

        let result = sqlx::query("DELETE FROM negotiation_log WHERE occurred_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| SwapError::Persistence(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
