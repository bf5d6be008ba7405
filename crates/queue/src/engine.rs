//! QueueEngine – Ticket-Lebenszyklus und Aufruf-Auswahl
//!
//! Alle schreibenden Sequenzen (Nummernvergabe, Auto-Abschluss mit
//! anschliessender Auswahl, Statuswechsel, Loeschen) laufen unter dem
//! Dispatch-Mutex. Ereignisse gehen erst nach erfolgreichem Schreiben raus.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use queuedesk_core::zeit::{kalendertag, tagesbeginn};
use queuedesk_core::{
    CounterId, CounterStatus, EventBus, QueueEvent, TicketId, TicketStatus, TicketTyp, Uhr,
    VoiceLockGate,
};
use queuedesk_db::{
    CounterRepository, NeuesTicket, SettingsRepository, StatsRepository, TicketMitCounter,
    TicketRecord, TicketRepository,
};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{QueueError, QueueResult};
use crate::statistics::{aggregieren, Statistik};

/// Einstellungsschluessel fuer das Anzeige-Praefix normaler Tickets
pub const PREFIX_NORMAL_KEY: &str = "prefix_normal";
/// Einstellungsschluessel fuer das Anzeige-Praefix bevorzugter Tickets
pub const PREFIX_PRIORITY_KEY: &str = "prefix_priority";

pub const STANDARD_PREFIX_NORMAL: &str = "";
pub const STANDARD_PREFIX_PRIORITY: &str = "P-";

/// Standardlaenge der Warteliste
pub const STANDARD_WARTE_LIMIT: i64 = 10;

/// Ergebnis der naechtlichen Bereinigung
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BereinigungsBericht {
    pub geloescht: u64,
    pub zeitpunkt: DateTime<Utc>,
}

/// Aufruf-Engine
///
/// Generisch ueber die Datenbank, damit Tests und Server dieselbe
/// Implementierung nutzen koennen.
pub struct QueueEngine<D>
where
    D: TicketRepository + StatsRepository + CounterRepository + SettingsRepository + 'static,
{
    db: Arc<D>,
    sprachsperre: Arc<dyn VoiceLockGate>,
    bus: Arc<dyn EventBus>,
    uhr: Arc<dyn Uhr>,
    dispatch: Mutex<()>,
}

impl<D> QueueEngine<D>
where
    D: TicketRepository + StatsRepository + CounterRepository + SettingsRepository + 'static,
{
    pub fn neu(
        db: Arc<D>,
        sprachsperre: Arc<dyn VoiceLockGate>,
        bus: Arc<dyn EventBus>,
        uhr: Arc<dyn Uhr>,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            sprachsperre,
            bus,
            uhr,
            dispatch: Mutex::new(()),
        })
    }

    // -----------------------------------------------------------------------
    // Anlegen und Lesen
    // -----------------------------------------------------------------------

    /// Zieht ein neues Ticket mit der naechsten Tagesnummer
    pub async fn create(&self, typ: TicketTyp) -> QueueResult<TicketRecord> {
        let prefix = self.prefix_fuer(typ).await?;

        let _guard = self.dispatch.lock().await;
        let jetzt = self.uhr.jetzt();
        let ticket = self
            .db
            .create_next(NeuesTicket {
                typ,
                prefix: &prefix,
                created_at: jetzt.with_timezone(&Utc),
                tagesbeginn: tagesbeginn(jetzt),
            })
            .await?;

        tracing::info!(
            ticket_id = %ticket.id,
            nummer = %ticket.display_number,
            typ = %typ,
            "Ticket gezogen"
        );
        self.bus.an_alle_senden(QueueEvent::QueueUpdate);
        Ok(ticket)
    }

    pub async fn find_all(&self, status: Option<TicketStatus>) -> QueueResult<Vec<TicketMitCounter>> {
        Ok(TicketRepository::list(self.db.as_ref(), status).await?)
    }

    pub async fn get_calling_tickets(&self) -> QueueResult<Vec<TicketMitCounter>> {
        Ok(self.db.list_calling().await?)
    }

    /// Wartende Tickets in Aufrufreihenfolge (Standard: 10)
    pub async fn get_waiting_tickets(&self, limit: Option<i64>) -> QueueResult<Vec<TicketRecord>> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(STANDARD_WARTE_LIMIT);
        Ok(self.db.list_waiting(None, limit).await?)
    }

    // -----------------------------------------------------------------------
    // Aufruf
    // -----------------------------------------------------------------------

    /// Ruft am Schalter das naechste Ticket auf
    ///
    /// Ein noch aufgerufenes Ticket desselben Schalters wird vorher
    /// abgeschlossen. Findet die Auswahl danach nichts, bleibt der Abschluss
    /// bestehen und die Clients werden trotzdem benachrichtigt.
    pub async fn call_next(
        &self,
        counter_id: CounterId,
        typ_filter: Option<TicketTyp>,
    ) -> QueueResult<TicketMitCounter> {
        let _guard = self.dispatch.lock().await;

        match CounterRepository::get_by_id(self.db.as_ref(), counter_id).await? {
            Some(counter) if counter.status == CounterStatus::Active => {}
            _ => return Err(QueueError::CounterUnavailable(counter_id)),
        }

        if self.sprachsperre.is_held() {
            tracing::debug!(counter_id = %counter_id, "Aufruf waehrend Durchsage abgelehnt");
            return Err(QueueError::DispatchLocked);
        }

        let jetzt = self.uhr.jetzt();
        let mut abgeschlossen = false;
        if let Some(vorheriges) = self.db.find_calling_for_counter(counter_id).await? {
            self.abschliessen(&vorheriges, jetzt).await?;
            abgeschlossen = true;
        }

        let naechstes = match self.db.list_waiting(typ_filter, 1).await?.into_iter().next() {
            Some(t) => t,
            None => {
                if abgeschlossen {
                    self.bus.an_alle_senden(QueueEvent::QueueUpdate);
                }
                return Err(QueueError::NoWaitingTickets);
            }
        };

        let aufgerufen = self
            .db
            .mark_calling(naechstes.id, counter_id, jetzt.with_timezone(&Utc))
            .await?;

        tracing::info!(
            ticket_id = %aufgerufen.ticket.id,
            nummer = %aufgerufen.ticket.display_number,
            counter_id = %counter_id,
            "Ticket aufgerufen"
        );
        self.bus
            .an_alle_senden(QueueEvent::TicketCalled(aufgerufen.snapshot()));
        self.bus.an_alle_senden(QueueEvent::QueueUpdate);
        Ok(aufgerufen)
    }

    /// Setzt den Status ohne Pruefung des bisherigen Zustands
    ///
    /// COMPLETED und SKIPPED setzen `finished_at`, COMPLETED zaehlt zusaetzlich
    /// in die Tagesstatistik.
    pub async fn update_status(
        &self,
        id: TicketId,
        status: TicketStatus,
    ) -> QueueResult<TicketMitCounter> {
        let _guard = self.dispatch.lock().await;
        let jetzt = self.uhr.jetzt();

        let finished_at = status.ist_endzustand().then(|| jetzt.with_timezone(&Utc));
        let ticket = self
            .db
            .update_status(id, status, finished_at)
            .await?
            .ok_or(QueueError::TicketNotFound(id))?;

        if status == TicketStatus::Completed {
            self.db.increment(kalendertag(jetzt), ticket.ticket.typ).await?;
        }

        tracing::info!(ticket_id = %id, status = %status, "Ticket-Status geaendert");
        self.bus.an_alle_senden(QueueEvent::QueueUpdate);
        Ok(ticket)
    }

    /// Wiederholt die Durchsage eines aufgerufenen Tickets
    pub async fn recall(&self, id: TicketId) -> QueueResult<TicketMitCounter> {
        let ticket = self
            .db
            .get_with_counter(id)
            .await?
            .ok_or(QueueError::TicketNotFound(id))?;

        if ticket.ticket.status != TicketStatus::Calling {
            return Err(QueueError::InvalidState {
                id,
                status: ticket.ticket.status,
            });
        }

        tracing::info!(ticket_id = %id, nummer = %ticket.ticket.display_number, "Ticket erneut aufgerufen");
        self.bus.an_alle_senden(QueueEvent::TicketCalled(ticket.snapshot()));
        Ok(ticket)
    }

    // -----------------------------------------------------------------------
    // Loeschen
    // -----------------------------------------------------------------------

    pub async fn delete(&self, id: TicketId) -> QueueResult<()> {
        let _guard = self.dispatch.lock().await;
        if !TicketRepository::delete(self.db.as_ref(), id).await? {
            return Err(QueueError::TicketNotFound(id));
        }
        tracing::info!(ticket_id = %id, "Ticket geloescht");
        self.bus.an_alle_senden(QueueEvent::QueueUpdate);
        Ok(())
    }

    /// Entfernt alle abgeschlossenen Tickets
    pub async fn delete_completed(&self) -> QueueResult<u64> {
        let _guard = self.dispatch.lock().await;
        let anzahl = self.db.delete_by_status(TicketStatus::Completed).await?;
        tracing::info!(anzahl, "Abgeschlossene Tickets geloescht");
        self.bus.an_alle_senden(QueueEvent::QueueUpdate);
        Ok(anzahl)
    }

    pub async fn delete_all(&self) -> QueueResult<u64> {
        let _guard = self.dispatch.lock().await;
        let anzahl = self.db.delete_all().await?;
        tracing::info!(anzahl, "Alle Tickets geloescht");
        self.bus.an_alle_senden(QueueEvent::QueueUpdate);
        Ok(anzahl)
    }

    /// Naechtliche Bereinigung; Fehler werden protokolliert, nicht weitergegeben
    pub async fn daily_cleanup(&self, jetzt: DateTime<Local>) -> Option<BereinigungsBericht> {
        tracing::info!(zeitpunkt = %jetzt, "Taegliche Bereinigung startet");

        let _guard = self.dispatch.lock().await;
        match self.db.delete_all().await {
            Ok(geloescht) => {
                tracing::info!(geloescht, "Taegliche Bereinigung erfolgreich");
                self.bus.an_alle_senden(QueueEvent::QueueUpdate);
                Some(BereinigungsBericht {
                    geloescht,
                    zeitpunkt: jetzt.with_timezone(&Utc),
                })
            }
            Err(e) => {
                tracing::error!(fehler = %e, "Taegliche Bereinigung fehlgeschlagen");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Statistik
    // -----------------------------------------------------------------------

    pub async fn get_statistics(&self) -> QueueResult<Statistik> {
        let history = StatsRepository::list(self.db.as_ref()).await?;
        Ok(aggregieren(history, kalendertag(self.uhr.jetzt())))
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    async fn abschliessen(&self, ticket: &TicketRecord, jetzt: DateTime<Local>) -> QueueResult<()> {
        self.db
            .update_status(ticket.id, TicketStatus::Completed, Some(jetzt.with_timezone(&Utc)))
            .await?;
        self.db.increment(kalendertag(jetzt), ticket.typ).await?;
        tracing::debug!(
            ticket_id = %ticket.id,
            counter_id = ?ticket.counter_id,
            "Vorheriges Ticket automatisch abgeschlossen"
        );
        Ok(())
    }

    /// Anzeige-Praefix fuer einen Typ; leere Werte fallen auf den Standard zurueck
    async fn prefix_fuer(&self, typ: TicketTyp) -> QueueResult<String> {
        let (key, standard) = match typ {
            TicketTyp::Normal => (PREFIX_NORMAL_KEY, STANDARD_PREFIX_NORMAL),
            TicketTyp::Priority => (PREFIX_PRIORITY_KEY, STANDARD_PREFIX_PRIORITY),
        };
        let wert = self.db.get(key).await?;
        Ok(wert
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| standard.to_string()))
    }
}
