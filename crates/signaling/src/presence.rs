//! Presence-Tabelle – Verbindungszaehler und ausstehende Abwesenheiten
//!
//! Ein Benutzer gilt als online, solange er mindestens eine offene
//! Verbindung hat oder ein Abwesenheits-Timer fuer ihn aussteht. Mehrere
//! Tabs desselben Benutzers ergeben so genau ein Online/Offline-Signal.
//!
//! Die Tabelle ist reiner Zustand ohne Locking; der Koordinator haelt sie
//! hinter seinem Zustands-Mutex.

use std::collections::HashMap;

use queuedesk_core::{ConnectionId, TimerHandle, UserId};

/// Ausstehender Abwesenheits-Timer
#[derive(Debug)]
pub struct AusstehendeAbwesenheit {
    pub generation: u64,
    pub handle: TimerHandle,
}

/// Presence-Eintrag eines Benutzers
#[derive(Debug, Default)]
pub struct PresenceEintrag {
    pub verbindungen: u32,
    pub abwesenheit: Option<AusstehendeAbwesenheit>,
}

impl PresenceEintrag {
    fn ist_online(&self) -> bool {
        self.verbindungen > 0 || self.abwesenheit.is_some()
    }
}

/// Ergebnis von `verbinden`
#[derive(Debug)]
pub struct Verbunden {
    /// Zaehler ging von 0 auf 1, auch waehrend der Schonfrist
    pub erste_verbindung: bool,
    /// Abgeloester Abwesenheits-Timer, muss vom Aufrufer abgebrochen werden
    pub abgeloest: Option<TimerHandle>,
}

/// Ergebnis von `trennen`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Getrennt {
    pub user_id: UserId,
    pub verbleibend: u32,
}

#[derive(Debug, Default)]
pub struct PresenceTabelle {
    verbindungen: HashMap<ConnectionId, UserId>,
    eintraege: HashMap<UserId, PresenceEintrag>,
}

impl PresenceTabelle {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Zaehlt eine neue Verbindung und loest eine ausstehende Abwesenheit ab
    pub fn verbinden(&mut self, verbindung: ConnectionId, user_id: UserId) -> Verbunden {
        self.verbindungen.insert(verbindung, user_id);
        let eintrag = self.eintraege.entry(user_id).or_default();

        let erste_verbindung = eintrag.verbindungen == 0;
        let abgeloest = eintrag.abwesenheit.take().map(|a| a.handle);
        eintrag.verbindungen += 1;

        Verbunden {
            erste_verbindung,
            abgeloest,
        }
    }

    /// Loest die Verbindung auf und zaehlt herunter (nie unter 0)
    ///
    /// Unbekannte Verbindungen ergeben `None`.
    pub fn trennen(&mut self, verbindung: &ConnectionId) -> Option<Getrennt> {
        let user_id = self.verbindungen.remove(verbindung)?;
        let eintrag = self.eintraege.entry(user_id).or_default();
        eintrag.verbindungen = eintrag.verbindungen.saturating_sub(1);

        Some(Getrennt {
            user_id,
            verbleibend: eintrag.verbindungen,
        })
    }

    /// Merkt einen geplanten Abwesenheits-Timer vor
    ///
    /// Ein eventuell vorher vorgemerkter Timer wird zurueckgegeben.
    pub fn abwesenheit_vormerken(
        &mut self,
        user_id: UserId,
        generation: u64,
        handle: TimerHandle,
    ) -> Option<TimerHandle> {
        let eintrag = self.eintraege.entry(user_id).or_default();
        eintrag
            .abwesenheit
            .replace(AusstehendeAbwesenheit { generation, handle })
            .map(|a| a.handle)
    }

    /// Prueft ob der Timer mit dieser Generation noch gilt
    ///
    /// Gilt er, wird der Eintrag entfernt und `true` zurueckgegeben; der
    /// Benutzer ist damit offline. Veraltete Generationen sind ein No-op.
    pub fn abwesenheit_faellig(&mut self, user_id: UserId, generation: u64) -> bool {
        let gueltig = match self.eintraege.get(&user_id) {
            Some(eintrag) => {
                eintrag.verbindungen == 0
                    && eintrag
                        .abwesenheit
                        .as_ref()
                        .is_some_and(|a| a.generation == generation)
            }
            None => false,
        };
        if gueltig {
            self.eintraege.remove(&user_id);
        }
        gueltig
    }

    pub fn ist_online(&self, user_id: &UserId) -> bool {
        self.eintraege.get(user_id).is_some_and(PresenceEintrag::ist_online)
    }

    pub fn verbindungen_von(&self, user_id: &UserId) -> u32 {
        self.eintraege.get(user_id).map_or(0, |e| e.verbindungen)
    }

    pub fn abwesenheit_ausstehend(&self, user_id: &UserId) -> bool {
        self.eintraege
            .get(user_id)
            .is_some_and(|e| e.abwesenheit.is_some())
    }

    /// Anzahl der Benutzer die aktuell als online gelten
    pub fn online_anzahl(&self) -> usize {
        self.eintraege.values().filter(|e| e.ist_online()).count()
    }

    /// Alle Timer-Handles (beim Herunterfahren abbrechen)
    pub fn alle_abwesenheiten_entnehmen(&mut self) -> Vec<TimerHandle> {
        self.eintraege
            .values_mut()
            .filter_map(|e| e.abwesenheit.take().map(|a| a.handle))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuedesk_core::{TimerDienst, TokioTimer};
    use std::time::Duration;

    fn dummy_handle() -> TimerHandle {
        TokioTimer.planen(Duration::from_secs(3600), Box::pin(async {}))
    }

    #[tokio::test]
    async fn mehrere_tabs_ein_signal() {
        let mut tabelle = PresenceTabelle::neu();
        let user = UserId::new();
        let (a, b) = (ConnectionId::new(), ConnectionId::new());

        assert!(tabelle.verbinden(a, user).erste_verbindung);
        assert!(!tabelle.verbinden(b, user).erste_verbindung);
        assert_eq!(tabelle.verbindungen_von(&user), 2);

        let getrennt = tabelle.trennen(&a).unwrap();
        assert_eq!(getrennt.verbleibend, 1);
        assert!(tabelle.ist_online(&user));
    }

    #[tokio::test]
    async fn schonfrist_haelt_online() {
        let mut tabelle = PresenceTabelle::neu();
        let user = UserId::new();
        let a = ConnectionId::new();

        tabelle.verbinden(a, user);
        assert_eq!(tabelle.trennen(&a).unwrap().verbleibend, 0);
        tabelle.abwesenheit_vormerken(user, 1, dummy_handle());
        assert!(tabelle.ist_online(&user));

        // Reconnect innerhalb der Schonfrist: Zaehler geht wieder 0 -> 1
        let verbunden = tabelle.verbinden(ConnectionId::new(), user);
        assert!(verbunden.erste_verbindung);
        assert!(verbunden.abgeloest.is_some());
        assert!(!tabelle.abwesenheit_ausstehend(&user));
        assert!(tabelle.ist_online(&user));
        assert!(!tabelle.verbinden(ConnectionId::new(), user).erste_verbindung);
    }

    #[tokio::test]
    async fn veraltete_generation_ist_noop() {
        let mut tabelle = PresenceTabelle::neu();
        let user = UserId::new();
        let a = ConnectionId::new();

        tabelle.verbinden(a, user);
        tabelle.trennen(&a);
        tabelle.abwesenheit_vormerken(user, 7, dummy_handle());

        assert!(!tabelle.abwesenheit_faellig(user, 6));
        assert!(tabelle.ist_online(&user));
        assert!(tabelle.abwesenheit_faellig(user, 7));
        assert!(!tabelle.ist_online(&user));
        assert!(!tabelle.abwesenheit_faellig(user, 7));
    }

    #[test]
    fn unbekannte_verbindung_wird_ignoriert() {
        let mut tabelle = PresenceTabelle::neu();
        assert!(tabelle.trennen(&ConnectionId::new()).is_none());
        assert_eq!(tabelle.online_anzahl(), 0);
    }
}
