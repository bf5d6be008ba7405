//! Event-Broadcaster – Verteilt Ereignisse an alle offenen Verbindungen
//!
//! Jede WebSocket-Verbindung registriert sich mit ihrer `ConnectionId` und
//! erhaelt eine begrenzte Send-Queue. Ereignisse werden einmal zu JSON
//! serialisiert und dann per `try_send` eingereiht; volle oder geschlossene
//! Queues verwerfen das Ereignis.

use std::sync::Arc;

use dashmap::DashMap;
use queuedesk_core::{ConnectionId, EventBus, QueueEvent};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Verbindung
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub verbindung: ConnectionId,
    pub tx: mpsc::Sender<Arc<str>>,
}

impl ClientSender {
    /// Reiht einen fertig serialisierten Frame nicht-blockierend ein
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, frame: Arc<str>) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(verbindung = %self.verbindung, "Send-Queue voll – Ereignis verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(verbindung = %self.verbindung, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Broadcaster fuer alle offenen Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

struct EventBroadcasterInner {
    clients: DashMap<ConnectionId, ClientSender>,
}

impl EventBroadcaster {
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(EventBroadcasterInner {
                clients: DashMap::new(),
            }),
        }
    }

    /// Registriert eine Verbindung und gibt ihre Empfangs-Queue zurueck
    pub fn verbindung_registrieren(&self, verbindung: ConnectionId) -> mpsc::Receiver<Arc<str>> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        self.inner
            .clients
            .insert(verbindung, ClientSender { verbindung, tx });
        tracing::debug!(verbindung = %verbindung, "Verbindung im Broadcaster registriert");
        rx
    }

    pub fn verbindung_entfernen(&self, verbindung: &ConnectionId) {
        self.inner.clients.remove(verbindung);
        tracing::debug!(verbindung = %verbindung, "Verbindung aus Broadcaster entfernt");
    }

    pub fn verbindungs_anzahl(&self) -> usize {
        self.inner.clients.len()
    }

    pub fn ist_registriert(&self, verbindung: &ConnectionId) -> bool {
        self.inner.clients.contains_key(verbindung)
    }

    fn serialisieren(event: &QueueEvent) -> Option<Arc<str>> {
        match serde_json::to_string(event) {
            Ok(json) => Some(Arc::from(json)),
            Err(e) => {
                tracing::error!(fehler = %e, "Ereignis konnte nicht serialisiert werden");
                None
            }
        }
    }
}

impl EventBus for EventBroadcaster {
    fn an_alle_senden(&self, event: QueueEvent) -> usize {
        let Some(frame) = Self::serialisieren(&event) else {
            return 0;
        };
        let mut gesendet = 0;
        self.inner.clients.iter().for_each(|entry| {
            if entry.value().senden(Arc::clone(&frame)) {
                gesendet += 1;
            }
        });
        gesendet
    }

    fn an_verbindung_senden(&self, verbindung: ConnectionId, event: QueueEvent) -> bool {
        let Some(sender) = self.inner.clients.get(&verbindung).map(|s| s.clone()) else {
            tracing::debug!(verbindung = %verbindung, "Senden an unbekannte Verbindung");
            return false;
        };
        match Self::serialisieren(&event) {
            Some(frame) => sender.senden(frame),
            None => false,
        }
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
