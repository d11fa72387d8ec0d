//! Configuration settings repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};

use super::SettingsStore;
use crate::{
    error::{AppError, AppResult},
    models::{setting::plugin_prefix, ConfigurationSetting, SettingsChanges},
};

#[derive(Clone)]
pub struct SettingsRepository {
    pool: Pool<Postgres>,
}

impl SettingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn write_changes(
        tx: &mut Transaction<'_, Postgres>,
        changes: &SettingsChanges,
    ) -> AppResult<()> {
        for insert in &changes.inserts {
            sqlx::query(
                "INSERT INTO configurationsettings (library_id, key, value) VALUES ($1, $2, $3)",
            )
            .bind(insert.library_id)
            .bind(&insert.key)
            .bind(&insert.value)
            .execute(&mut **tx)
            .await?;
        }

        for update in &changes.updates {
            let done = sqlx::query("UPDATE configurationsettings SET value = $1 WHERE id = $2")
                .bind(&update.value)
                .bind(update.setting.id)
                .execute(&mut **tx)
                .await?;
            if done.rows_affected() != 1 {
                return Err(gone(update.setting.id));
            }
        }

        for setting in &changes.deletes {
            let done = sqlx::query("DELETE FROM configurationsettings WHERE id = $1")
                .bind(setting.id)
                .execute(&mut **tx)
                .await?;
            if done.rows_affected() != 1 {
                return Err(gone(setting.id));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl SettingsStore for SettingsRepository {
    async fn get_global(&self, key: &str) -> AppResult<Option<ConfigurationSetting>> {
        let setting = sqlx::query_as::<_, ConfigurationSetting>(
            r#"
            SELECT id, library_id, key, value FROM configurationsettings
            WHERE library_id IS NULL AND key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(setting)
    }

    async fn put_global(&self, key: &str, value: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Try to update existing record first
        let updated = sqlx::query(
            "UPDATE configurationsettings SET value = $2 WHERE library_id IS NULL AND key = $1",
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await;

        let result = match updated {
            Ok(done) if done.rows_affected() == 0 => sqlx::query(
                "INSERT INTO configurationsettings (library_id, key, value) VALUES (NULL, $1, $2)",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map(|_| ()),
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tx.rollback().await?;
            return Err(e.into());
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_plugin(
        &self,
        library_id: i32,
        plugin_name: &str,
    ) -> AppResult<Vec<ConfigurationSetting>> {
        // left() instead of LIKE so that '_' and '%' in plugin names stay literal
        let prefix = plugin_prefix(plugin_name);
        let rows = sqlx::query_as::<_, ConfigurationSetting>(
            r#"
            SELECT id, library_id, key, value FROM configurationsettings
            WHERE library_id = $1 AND left(key, char_length($2)) = $2
            ORDER BY id
            "#,
        )
        .bind(library_id)
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn apply_changes(&self, changes: &SettingsChanges) -> AppResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        if let Err(e) = Self::write_changes(&mut tx, changes).await {
            tracing::error!("Rolling back settings batch of {} changes: {}", changes.len(), e);
            tx.rollback().await?;
            return Err(e);
        }

        tx.commit().await?;
        Ok(())
    }
}

/// A row planned against was removed by someone else
fn gone(id: i32) -> AppError {
    AppError::Storage(format!("setting {} no longer exists", id))
}
