//! SQLite-Implementierung des UserRepository

use async_trait::async_trait;
use chrono::Utc;
use queuedesk_core::{CounterId, UserId};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{BenutzerRecord, BenutzerUpdate, NeuerBenutzer};
use crate::repository::{DbResult, UserRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{text_zu_zeit, zeit_zu_text};

#[async_trait]
impl UserRepository for SqliteDb {
    async fn create(&self, data: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord> {
        let id = UserId::new();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, username, counter_id, is_online, created_at)
             VALUES (?, ?, ?, 0, ?)",
        )
        .bind(id.inner().to_string())
        .bind(data.username)
        .bind(data.counter_id.map(|c| c.0))
        .bind(zeit_zu_text(&now))
        .execute(&self.pool)
        .await
        .map_err(|e| schreibfehler(e, data.username, data.counter_id))?;

        Ok(BenutzerRecord {
            id,
            username: data.username.to_string(),
            counter_id: data.counter_id,
            is_online: false,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: UserId) -> DbResult<Option<BenutzerRecord>> {
        let row = sqlx::query(
            "SELECT id, username, counter_id, is_online, created_at FROM users WHERE id = ?",
        )
        .bind(id.inner().to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_benutzer(&r)).transpose()
    }

    async fn list(&self) -> DbResult<Vec<BenutzerRecord>> {
        let rows = sqlx::query(
            "SELECT id, username, counter_id, is_online, created_at FROM users
             ORDER BY username ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_benutzer).collect()
    }

    async fn set_online(&self, id: UserId, online: bool) -> DbResult<()> {
        let affected = sqlx::query("UPDATE users SET is_online = ? WHERE id = ?")
            .bind(online as i64)
            .bind(id.inner().to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Benutzer {id}")));
        }
        Ok(())
    }

    async fn update(&self, id: UserId, data: BenutzerUpdate) -> DbResult<BenutzerRecord> {
        let mut sets: Vec<&str> = Vec::new();
        if data.username.is_some() {
            sets.push("username = ?");
        }
        if data.counter_id.is_some() {
            sets.push("counter_id = ?");
        }

        if !sets.is_empty() {
            let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));
            let mut q = sqlx::query(&sql);
            if let Some(ref v) = data.username {
                q = q.bind(v);
            }
            if let Some(v) = data.counter_id {
                q = q.bind(v.map(|c| c.0));
            }
            q = q.bind(id.inner().to_string());

            let affected = q
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    schreibfehler(
                        e,
                        data.username.as_deref().unwrap_or_default(),
                        data.counter_id.flatten(),
                    )
                })?
                .rows_affected();
            if affected == 0 {
                return Err(DbError::nicht_gefunden(format!("Benutzer {id}")));
            }
        }

        UserRepository::get_by_id(self, id)
            .await?
            .ok_or_else(|| DbError::nicht_gefunden(format!("Benutzer {id}")))
    }

    async fn delete(&self, id: UserId) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.inner().to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

/// Fremdschluessel auf unbekannten Schalter oder doppelter Benutzername
fn schreibfehler(e: sqlx::Error, username: &str, counter_id: Option<CounterId>) -> DbError {
    if e.to_string().contains("FOREIGN KEY") {
        DbError::UngueltigeDaten(format!(
            "Schalter {} existiert nicht",
            counter_id.map(|c| c.0).unwrap_or_default()
        ))
    } else {
        DbError::aus_sqlx(e, || format!("Benutzername '{username}' bereits vergeben"))
    }
}

fn row_to_benutzer(row: &SqliteRow) -> DbResult<BenutzerRecord> {
    let id_str: String = row.try_get("id")?;
    let counter_id: Option<i64> = row.try_get("counter_id")?;
    let is_online: i64 = row.try_get("is_online")?;
    let created_str: String = row.try_get("created_at")?;

    Ok(BenutzerRecord {
        id: UserId(Uuid::parse_str(&id_str).map_err(|e| DbError::UngueltigeDaten(e.to_string()))?),
        username: row.try_get("username")?,
        counter_id: counter_id.map(CounterId),
        is_online: is_online != 0,
        created_at: text_zu_zeit(&created_str)?,
    })
}
