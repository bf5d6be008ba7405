//! SQLite-Implementierung des SettingsRepository

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::Row;

use crate::repository::{DbResult, SettingsRepository};
use crate::sqlite::pool::SqliteDb;

#[async_trait]
impl SettingsRepository for SqliteDb {
    async fn get_all(&self) -> DbResult<BTreeMap<String, String>> {
        let rows = sqlx::query("SELECT key, value FROM system_settings")
            .fetch_all(&self.pool)
            .await?;

        let mut werte = BTreeMap::new();
        for r in &rows {
            werte.insert(r.try_get("key")?, r.try_get("value")?);
        }
        Ok(werte)
    }

    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let wert = sqlx::query_scalar("SELECT value FROM system_settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(wert)
    }

    async fn upsert_many(&self, werte: &BTreeMap<String, String>) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in werte {
            sqlx::query(
                "INSERT INTO system_settings (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
