//! SQLite-Implementierung des CounterRepository

use async_trait::async_trait;
use chrono::Utc;
use queuedesk_core::CounterId;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{CounterRecord, CounterUpdate, NeuerCounter};
use crate::repository::{CounterRepository, DbResult};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{text_zu_zeit, zeit_zu_text};

const COUNTER_SELECT: &str = "SELECT c.id, c.name, c.description, c.status, c.created_at, \
     EXISTS(SELECT 1 FROM users u WHERE u.counter_id = c.id AND u.is_online = 1) AS is_online \
     FROM counters c";

/// Niedrigste positive ID, die in der (aufsteigend sortierten) Liste fehlt
fn niedrigste_freie_id(belegt: &[i64]) -> i64 {
    let mut kandidat = 1;
    for &id in belegt {
        if id == kandidat {
            kandidat += 1;
        } else if id > kandidat {
            break;
        }
    }
    kandidat
}

#[async_trait]
impl CounterRepository for SqliteDb {
    async fn create(&self, data: NeuerCounter<'_>) -> DbResult<CounterRecord> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let belegt: Vec<i64> = sqlx::query_scalar("SELECT id FROM counters ORDER BY id ASC")
            .fetch_all(&mut *tx)
            .await?;
        let id = niedrigste_freie_id(&belegt);

        sqlx::query(
            "INSERT INTO counters (id, name, description, status, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(data.name)
        .bind(data.description)
        .bind(data.status.als_str())
        .bind(zeit_zu_text(&now))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            DbError::aus_sqlx(e, || format!("Schaltername '{}' bereits vergeben", data.name))
        })?;

        tx.commit().await?;

        Ok(CounterRecord {
            id: CounterId(id),
            name: data.name.to_string(),
            description: data.description.map(str::to_string),
            status: data.status,
            is_online: false,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: CounterId) -> DbResult<Option<CounterRecord>> {
        let sql = format!("{COUNTER_SELECT} WHERE c.id = ?");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_counter(&r)).transpose()
    }

    async fn list(&self) -> DbResult<Vec<CounterRecord>> {
        let sql = format!("{COUNTER_SELECT} ORDER BY c.id ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_counter).collect()
    }

    async fn update(&self, id: CounterId, data: CounterUpdate) -> DbResult<CounterRecord> {
        // Dynamisches UPDATE – nur gesetzte Felder aendern
        let mut sets: Vec<&str> = Vec::new();
        if data.name.is_some() {
            sets.push("name = ?");
        }
        if data.description.is_some() {
            sets.push("description = ?");
        }
        if data.status.is_some() {
            sets.push("status = ?");
        }

        if !sets.is_empty() {
            let sql = format!("UPDATE counters SET {} WHERE id = ?", sets.join(", "));
            let mut q = sqlx::query(&sql);
            if let Some(ref v) = data.name {
                q = q.bind(v);
            }
            if let Some(ref v) = data.description {
                q = q.bind(v);
            }
            if let Some(v) = data.status {
                q = q.bind(v.als_str());
            }
            q = q.bind(id.0);

            let affected = q
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    DbError::aus_sqlx(e, || {
                        format!(
                            "Schaltername '{}' bereits vergeben",
                            data.name.as_deref().unwrap_or_default()
                        )
                    })
                })?
                .rows_affected();
            if affected == 0 {
                return Err(DbError::nicht_gefunden(format!("Schalter {}", id.0)));
            }
        }

        CounterRepository::get_by_id(self, id)
            .await?
            .ok_or_else(|| DbError::nicht_gefunden(format!("Schalter {}", id.0)))
    }

    async fn delete(&self, id: CounterId) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM counters WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

fn row_to_counter(row: &SqliteRow) -> DbResult<CounterRecord> {
    let status_str: String = row.try_get("status")?;
    let created_str: String = row.try_get("created_at")?;
    let is_online: i64 = row.try_get("is_online")?;

    Ok(CounterRecord {
        id: CounterId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        status: status_str.parse().map_err(DbError::UngueltigeDaten)?,
        is_online: is_online != 0,
        created_at: text_zu_zeit(&created_str)?,
    })
}
