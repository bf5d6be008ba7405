//! SQLite-Implementierung des StatsRepository

use async_trait::async_trait;
use chrono::NaiveDate;
use queuedesk_core::TicketTyp;
use sqlx::Row;

use crate::error::DbError;
use crate::models::TicketStatRecord;
use crate::repository::{DbResult, StatsRepository};
use crate::sqlite::pool::SqliteDb;

const DATUM_FORMAT: &str = "%Y-%m-%d";

#[async_trait]
impl StatsRepository for SqliteDb {
    async fn increment(&self, date: NaiveDate, typ: TicketTyp) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO ticket_stats (date, ticket_type, count) VALUES (?, ?, 1)
             ON CONFLICT(date, ticket_type) DO UPDATE SET count = count + 1",
        )
        .bind(date.format(DATUM_FORMAT).to_string())
        .bind(typ.als_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self) -> DbResult<Vec<TicketStatRecord>> {
        let rows = sqlx::query(
            "SELECT date, ticket_type, count FROM ticket_stats
             ORDER BY date DESC, ticket_type ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                let datum: String = r.try_get("date")?;
                let typ: String = r.try_get("ticket_type")?;
                Ok(TicketStatRecord {
                    date: NaiveDate::parse_from_str(&datum, DATUM_FORMAT)
                        .map_err(|e| DbError::UngueltigeDaten(format!("Datum '{datum}': {e}")))?,
                    typ: typ.parse().map_err(DbError::UngueltigeDaten)?,
                    count: r.try_get("count")?,
                })
            })
            .collect()
    }
}
