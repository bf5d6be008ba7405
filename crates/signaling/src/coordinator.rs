//! QueueCoordinator – Presence und Sprachsperre
//!
//! Der gesamte In-Memory-Zustand (Presence-Tabelle, Sprachsperre,
//! Timer-Generationen) liegt in einem einzigen Mutex, der nie ueber einen
//! Await-Punkt gehalten wird. Presence-Schreibvorgaenge in die Datenbank
//! laufen nacheinander ueber den Schreib-Mutex; vor jedem Schreiben wird
//! unter dem Zustands-Mutex erneut geprueft, ob der Zielzustand noch gilt.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use queuedesk_core::{
    ConnectionId, CounterId, EventBus, QueueEvent, TimerDienst, UserId, VoiceLockGate, VoiceStatus,
};
use queuedesk_db::UserRepository;

use crate::presence::PresenceTabelle;
use crate::voice_lock::Sprachsperre;

/// Standard-Schonfrist bis ein getrennter Benutzer offline gesetzt wird
pub const STANDARD_ABWESENHEIT: Duration = Duration::from_millis(3000);
/// Standard-Hoechstdauer einer Durchsage
pub const STANDARD_SPRACHSPERRE: Duration = Duration::from_millis(10_000);

/// Zeitkonstanten des Koordinators
#[derive(Debug, Clone, Copy)]
pub struct KoordinatorConfig {
    pub abwesenheit_verzoegerung: Duration,
    pub sprachsperre_timeout: Duration,
}

impl Default for KoordinatorConfig {
    fn default() -> Self {
        Self {
            abwesenheit_verzoegerung: STANDARD_ABWESENHEIT,
            sprachsperre_timeout: STANDARD_SPRACHSPERRE,
        }
    }
}

#[derive(Debug, Default)]
struct Zustand {
    presence: PresenceTabelle,
    sperre: Sprachsperre,
    generation: u64,
}

impl Zustand {
    fn naechste_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

/// Presence- und Sprachsperren-Koordinator
///
/// Clone teilt den inneren Zustand.
pub struct QueueCoordinator<U: UserRepository + 'static> {
    inner: Arc<CoordinatorInner<U>>,
}

struct CoordinatorInner<U: UserRepository + 'static> {
    benutzer: Arc<U>,
    bus: Arc<dyn EventBus>,
    timer: Arc<dyn TimerDienst>,
    config: KoordinatorConfig,
    zustand: Mutex<Zustand>,
    schreiber: tokio::sync::Mutex<()>,
}

impl<U: UserRepository + 'static> Clone for QueueCoordinator<U> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<U: UserRepository + 'static> QueueCoordinator<U> {
    pub fn neu(
        benutzer: Arc<U>,
        bus: Arc<dyn EventBus>,
        timer: Arc<dyn TimerDienst>,
        config: KoordinatorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                benutzer,
                bus,
                timer,
                config,
                zustand: Mutex::new(Zustand::default()),
                schreiber: tokio::sync::Mutex::new(()),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Presence
    // -----------------------------------------------------------------------

    /// Neue Verbindung
    ///
    /// Die Verbindung erhaelt immer den aktuellen Sprachsperren-Zustand.
    /// Ohne `user_id` nimmt sie nicht an der Presence teil.
    pub async fn connect(&self, verbindung: ConnectionId, user_id: Option<UserId>) {
        let erste_verbindung = {
            let mut z = self.inner.zustand.lock();
            self.inner.bus.an_verbindung_senden(
                verbindung,
                QueueEvent::VoiceStatusUpdate(z.sperre.status()),
            );

            match user_id {
                Some(user_id) => {
                    let verbunden = z.presence.verbinden(verbindung, user_id);
                    if let Some(handle) = verbunden.abgeloest {
                        handle.abbrechen();
                        tracing::debug!(user_id = %user_id, "Abwesenheit durch Reconnect abgebrochen");
                    }
                    tracing::info!(
                        user_id = %user_id,
                        verbindung = %verbindung,
                        verbindungen = z.presence.verbindungen_von(&user_id),
                        "Benutzer verbunden"
                    );
                    verbunden.erste_verbindung.then_some(user_id)
                }
                None => {
                    tracing::debug!(verbindung = %verbindung, "Anonyme Verbindung");
                    None
                }
            }
        };

        if let Some(user_id) = erste_verbindung {
            self.praesenz_schreiben(user_id, true).await;
        }
    }

    /// Verbindung geschlossen
    ///
    /// Bei der letzten Verbindung eines Benutzers beginnt die Schonfrist;
    /// erst danach wird er offline gesetzt.
    pub fn disconnect(&self, verbindung: ConnectionId) {
        let mut z = self.inner.zustand.lock();
        let Some(getrennt) = z.presence.trennen(&verbindung) else {
            tracing::debug!(verbindung = %verbindung, "Trennung einer unbekannten Verbindung");
            return;
        };

        tracing::info!(
            user_id = %getrennt.user_id,
            verbindung = %verbindung,
            verbleibend = getrennt.verbleibend,
            "Benutzer getrennt"
        );
        if getrennt.verbleibend > 0 {
            return;
        }

        let generation = z.naechste_generation();
        let koordinator = self.clone();
        let user_id = getrennt.user_id;
        let handle = self.inner.timer.planen(
            self.inner.config.abwesenheit_verzoegerung,
            Box::pin(async move { koordinator.abwesenheit_faellig(user_id, generation).await }),
        );
        if let Some(alt) = z.presence.abwesenheit_vormerken(user_id, generation, handle) {
            alt.abbrechen();
        }
    }

    async fn abwesenheit_faellig(&self, user_id: UserId, generation: u64) {
        let faellig = self
            .inner
            .zustand
            .lock()
            .presence
            .abwesenheit_faellig(user_id, generation);

        if faellig {
            tracing::info!(user_id = %user_id, "Schonfrist abgelaufen, Benutzer offline");
            self.praesenz_schreiben(user_id, false).await;
        } else {
            tracing::debug!(user_id = %user_id, generation, "Veralteter Abwesenheits-Timer ignoriert");
        }
    }

    /// Schreibt den Online-Status; Fehler werden protokolliert und geschluckt
    async fn praesenz_schreiben(&self, user_id: UserId, online: bool) {
        let _schreiber = self.inner.schreiber.lock().await;

        let noch_gueltig = self.inner.zustand.lock().presence.ist_online(&user_id) == online;
        if !noch_gueltig {
            tracing::debug!(user_id = %user_id, online, "Presence-Schreiben ueberholt, uebersprungen");
            return;
        }

        match self.inner.benutzer.set_online(user_id, online).await {
            Ok(()) => {
                self.inner.bus.an_alle_senden(QueueEvent::QueueUpdate);
            }
            Err(e) => {
                tracing::error!(
                    user_id = %user_id,
                    online,
                    fehler = %e,
                    "Presence konnte nicht gespeichert werden"
                );
            }
        }
    }

    pub fn ist_online(&self, user_id: &UserId) -> bool {
        self.inner.zustand.lock().presence.ist_online(user_id)
    }

    pub fn verbindungen_von(&self, user_id: &UserId) -> u32 {
        self.inner.zustand.lock().presence.verbindungen_von(user_id)
    }

    pub fn online_anzahl(&self) -> usize {
        self.inner.zustand.lock().presence.online_anzahl()
    }

    // -----------------------------------------------------------------------
    // Sprachsperre
    // -----------------------------------------------------------------------

    /// Durchsage beginnt am Schalter; der letzte Aufruf gewinnt
    pub fn acquire(&self, counter_id: CounterId) {
        let mut z = self.inner.zustand.lock();
        let generation = z.naechste_generation();
        let koordinator = self.clone();
        let handle = self.inner.timer.planen(
            self.inner.config.sprachsperre_timeout,
            Box::pin(async move { koordinator.sperre_timeout(generation) }),
        );

        if let Some(alt) = z.sperre.setzen(counter_id, generation, handle) {
            alt.abbrechen();
        }
        tracing::info!(counter_id = %counter_id, "Sprachsperre gesetzt");
        self.inner
            .bus
            .an_alle_senden(QueueEvent::VoiceStatusUpdate(z.sperre.status()));
    }

    /// Durchsage beendet; sendet den freigegebenen Zustand immer
    pub fn release(&self) {
        let mut z = self.inner.zustand.lock();
        if let Some(handle) = z.sperre.freigeben() {
            handle.abbrechen();
        }
        tracing::info!("Sprachsperre freigegeben");
        self.inner
            .bus
            .an_alle_senden(QueueEvent::VoiceStatusUpdate(z.sperre.status()));
    }

    fn sperre_timeout(&self, generation: u64) {
        let mut z = self.inner.zustand.lock();
        if !z.sperre.timeout_gueltig(generation) {
            return;
        }
        // Eigener Timer, nicht abbrechen
        drop(z.sperre.freigeben());
        tracing::warn!("Sprachsperre nach Zeitueberschreitung freigegeben");
        self.inner
            .bus
            .an_alle_senden(QueueEvent::VoiceStatusUpdate(z.sperre.status()));
    }

    pub fn is_held(&self) -> bool {
        self.inner.zustand.lock().sperre.ist_gehalten()
    }

    pub fn voice_status(&self) -> VoiceStatus {
        self.inner.zustand.lock().sperre.status()
    }

    /// Bricht alle laufenden Timer ab (beim Herunterfahren)
    pub fn herunterfahren(&self) {
        let mut z = self.inner.zustand.lock();
        for handle in z.presence.alle_abwesenheiten_entnehmen() {
            handle.abbrechen();
        }
        if let Some(handle) = z.sperre.freigeben() {
            handle.abbrechen();
        }
        tracing::debug!("Koordinator-Timer abgebrochen");
    }
}

impl<U: UserRepository + 'static> VoiceLockGate for QueueCoordinator<U> {
    fn is_held(&self) -> bool {
        QueueCoordinator::is_held(self)
    }
}
