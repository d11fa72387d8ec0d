//! Timestamps repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::TimestampStore;
use crate::{error::AppResult, models::Timestamp};

#[derive(Clone)]
pub struct TimestampsRepository {
    pool: Pool<Postgres>,
}

impl TimestampsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TimestampStore for TimestampsRepository {
    async fn get_timestamp(&self, service: &str) -> AppResult<Option<Timestamp>> {
        let timestamp = sqlx::query_as::<_, Timestamp>(
            "SELECT id, service, service_type, start, finish FROM timestamps WHERE service = $1",
        )
        .bind(service)
        .fetch_optional(&self.pool)
        .await?;

        Ok(timestamp)
    }

    async fn record_run(
        &self,
        service: &str,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO timestamps (service, service_type, start, finish)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (service) DO UPDATE SET start = EXCLUDED.start, finish = EXCLUDED.finish
            "#,
        )
        .bind(service)
        .bind(Timestamp::SCRIPT_TYPE)
        .bind(start)
        .bind(finish)
        .execute(&mut *tx)
        .await;

        if let Err(e) = result {
            tx.rollback().await?;
            return Err(e.into());
        }

        tx.commit().await?;
        Ok(())
    }
}
