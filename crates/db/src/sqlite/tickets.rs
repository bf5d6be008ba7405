//! SQLite-Implementierung des TicketRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use queuedesk_core::{CounterId, TicketId, TicketStatus, TicketTyp};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{CounterRecord, NeuesTicket, TicketMitCounter, TicketRecord};
use crate::repository::{DbResult, TicketRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{optionale_zeit, text_zu_zeit, zeit_zu_text};

const TICKET_SPALTEN: &str = "t.id, t.number, t.display_number, t.ticket_type, t.status, \
     t.counter_id, t.created_at, t.called_at, t.finished_at";

const MIT_COUNTER: &str = "SELECT t.id, t.number, t.display_number, t.ticket_type, t.status, \
     t.counter_id, t.created_at, t.called_at, t.finished_at, \
     c.name AS c_name, c.description AS c_description, c.status AS c_status, \
     c.created_at AS c_created_at, \
     EXISTS(SELECT 1 FROM users u WHERE u.counter_id = c.id AND u.is_online = 1) AS c_is_online \
     FROM tickets t LEFT JOIN counters c ON c.id = t.counter_id";

/// Aufrufreihenfolge: PRIORITY vor NORMAL, dann FIFO
const AUFRUF_REIHENFOLGE: &str = "CASE t.ticket_type WHEN 'PRIORITY' THEN 1 ELSE 0 END DESC, \
     t.created_at ASC, t.number ASC";

#[async_trait]
impl TicketRepository for SqliteDb {
    async fn create_next(&self, data: NeuesTicket<'_>) -> DbResult<TicketRecord> {
        let id = TicketId::new();

        // Nummer und Anzeige werden im selben Statement aus MAX(number) des
        // laufenden Tages berechnet
        let row = sqlx::query(
            "INSERT INTO tickets (id, number, display_number, ticket_type, status, created_at)
             SELECT ?1, COALESCE(MAX(number), 0) + 1, ?2 || (COALESCE(MAX(number), 0) + 1),
                    ?3, 'WAITING', ?4
             FROM tickets WHERE created_at >= ?5
             RETURNING number, display_number",
        )
        .bind(id.inner().to_string())
        .bind(data.prefix)
        .bind(data.typ.als_str())
        .bind(zeit_zu_text(&data.created_at))
        .bind(zeit_zu_text(&data.tagesbeginn))
        .fetch_one(&self.pool)
        .await?;

        Ok(TicketRecord {
            id,
            number: row.try_get("number")?,
            display_number: row.try_get("display_number")?,
            typ: data.typ,
            status: TicketStatus::Waiting,
            counter_id: None,
            created_at: data.created_at,
            called_at: None,
            finished_at: None,
        })
    }

    async fn get_by_id(&self, id: TicketId) -> DbResult<Option<TicketRecord>> {
        let sql = format!("SELECT {TICKET_SPALTEN} FROM tickets t WHERE t.id = ?");
        let row = sqlx::query(&sql)
            .bind(id.inner().to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_ticket(&r)).transpose()
    }

    async fn get_with_counter(&self, id: TicketId) -> DbResult<Option<TicketMitCounter>> {
        let sql = format!("{MIT_COUNTER} WHERE t.id = ?");
        let row = sqlx::query(&sql)
            .bind(id.inner().to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_ticket_mit_counter(&r)).transpose()
    }

    async fn list(&self, status: Option<TicketStatus>) -> DbResult<Vec<TicketMitCounter>> {
        let rows = match status {
            Some(s) => {
                let sql =
                    format!("{MIT_COUNTER} WHERE t.status = ? ORDER BY t.created_at ASC, t.number ASC");
                sqlx::query(&sql)
                    .bind(s.als_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("{MIT_COUNTER} ORDER BY t.created_at ASC, t.number ASC");
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };

        rows.iter().map(row_to_ticket_mit_counter).collect()
    }

    async fn list_calling(&self) -> DbResult<Vec<TicketMitCounter>> {
        let sql = format!("{MIT_COUNTER} WHERE t.status = 'CALLING' ORDER BY t.called_at DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_ticket_mit_counter).collect()
    }

    async fn list_waiting(&self, typ: Option<TicketTyp>, limit: i64) -> DbResult<Vec<TicketRecord>> {
        let rows = match typ {
            Some(t) => {
                let sql = format!(
                    "SELECT {TICKET_SPALTEN} FROM tickets t
                     WHERE t.status = 'WAITING' AND t.ticket_type = ?
                     ORDER BY {AUFRUF_REIHENFOLGE} LIMIT ?"
                );
                sqlx::query(&sql)
                    .bind(t.als_str())
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {TICKET_SPALTEN} FROM tickets t
                     WHERE t.status = 'WAITING'
                     ORDER BY {AUFRUF_REIHENFOLGE} LIMIT ?"
                );
                sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?
            }
        };

        rows.iter().map(row_to_ticket).collect()
    }

    async fn find_calling_for_counter(&self, counter_id: CounterId) -> DbResult<Option<TicketRecord>> {
        let sql = format!(
            "SELECT {TICKET_SPALTEN} FROM tickets t
             WHERE t.status = 'CALLING' AND t.counter_id = ?"
        );
        let row = sqlx::query(&sql)
            .bind(counter_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_ticket(&r)).transpose()
    }

    async fn mark_calling(
        &self,
        id: TicketId,
        counter_id: CounterId,
        called_at: DateTime<Utc>,
    ) -> DbResult<TicketMitCounter> {
        let affected = sqlx::query(
            "UPDATE tickets SET status = 'CALLING', counter_id = ?, called_at = ?
             WHERE id = ? AND status = 'WAITING'",
        )
        .bind(counter_id.0)
        .bind(zeit_zu_text(&called_at))
        .bind(id.inner().to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DbError::aus_sqlx(e, || format!("Schalter {} ruft bereits ein Ticket auf", counter_id.0))
        })?
        .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Wartendes Ticket {id}")));
        }

        self.get_with_counter(id)
            .await?
            .ok_or_else(|| DbError::nicht_gefunden(format!("Ticket {id}")))
    }

    async fn update_status(
        &self,
        id: TicketId,
        status: TicketStatus,
        finished_at: Option<DateTime<Utc>>,
    ) -> DbResult<Option<TicketMitCounter>> {
        let affected = sqlx::query(
            "UPDATE tickets SET status = ?, finished_at = COALESCE(?, finished_at) WHERE id = ?",
        )
        .bind(status.als_str())
        .bind(finished_at.as_ref().map(zeit_zu_text))
        .bind(id.inner().to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::aus_sqlx(e, || format!("Schalter von Ticket {id} ruft bereits auf")))?
        .rows_affected();

        if affected == 0 {
            return Ok(None);
        }

        self.get_with_counter(id).await
    }

    async fn delete(&self, id: TicketId) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM tickets WHERE id = ?")
            .bind(id.inner().to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn delete_by_status(&self, status: TicketStatus) -> DbResult<u64> {
        let affected = sqlx::query("DELETE FROM tickets WHERE status = ?")
            .bind(status.als_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }

    async fn delete_all(&self) -> DbResult<u64> {
        let affected = sqlx::query("DELETE FROM tickets")
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }
}

fn row_to_ticket(row: &SqliteRow) -> DbResult<TicketRecord> {
    let id_str: String = row.try_get("id")?;
    let typ_str: String = row.try_get("ticket_type")?;
    let status_str: String = row.try_get("status")?;
    let counter_id: Option<i64> = row.try_get("counter_id")?;
    let created_str: String = row.try_get("created_at")?;

    Ok(TicketRecord {
        id: TicketId(
            Uuid::parse_str(&id_str).map_err(|e| DbError::UngueltigeDaten(e.to_string()))?,
        ),
        number: row.try_get("number")?,
        display_number: row.try_get("display_number")?,
        typ: typ_str.parse().map_err(DbError::UngueltigeDaten)?,
        status: status_str.parse().map_err(DbError::UngueltigeDaten)?,
        counter_id: counter_id.map(CounterId),
        created_at: text_zu_zeit(&created_str)?,
        called_at: optionale_zeit(row.try_get("called_at")?)?,
        finished_at: optionale_zeit(row.try_get("finished_at")?)?,
    })
}

fn row_to_ticket_mit_counter(row: &SqliteRow) -> DbResult<TicketMitCounter> {
    let ticket = row_to_ticket(row)?;

    let counter_name: Option<String> = row.try_get("c_name")?;
    let counter = match (ticket.counter_id, counter_name) {
        (Some(counter_id), Some(name)) => {
            let status_str: String = row.try_get("c_status")?;
            let created_str: String = row.try_get("c_created_at")?;
            let is_online: i64 = row.try_get("c_is_online")?;
            Some(CounterRecord {
                id: counter_id,
                name,
                description: row.try_get("c_description")?,
                status: status_str.parse().map_err(DbError::UngueltigeDaten)?,
                is_online: is_online != 0,
                created_at: text_zu_zeit(&created_str)?,
            })
        }
        _ => None,
    };

    Ok(TicketMitCounter { ticket, counter })
}
