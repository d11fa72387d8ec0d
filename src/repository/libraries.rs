//! Libraries repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::LibraryResolver;
use crate::{error::AppResult, models::Library};

#[derive(Clone)]
pub struct LibrariesRepository {
    pool: Pool<Postgres>,
}

impl LibrariesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LibraryResolver for LibrariesRepository {
    /// Get library by short name
    async fn find_by_short_name(&self, short_name: &str) -> AppResult<Option<Library>> {
        let library = sqlx::query_as::<_, Library>(
            "SELECT id, short_name, name FROM libraries WHERE short_name = $1",
        )
        .bind(short_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(library)
    }
}
