//! Globale Sprachsperre
//!
//! Solange eine Durchsage laeuft, darf kein Schalter das naechste Ticket
//! aufrufen. Der letzte `voiceStarted`-Aufruf gewinnt; ein Sicherheits-Timer
//! gibt die Sperre spaetestens nach der konfigurierten Dauer frei.

use queuedesk_core::{CounterId, TimerHandle, VoiceStatus};

#[derive(Debug, Default)]
pub struct Sprachsperre {
    gehalten: bool,
    counter_id: Option<CounterId>,
    timer: Option<(u64, TimerHandle)>,
}

impl Sprachsperre {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Setzt die Sperre fuer einen Schalter, gibt den abgeloesten Timer zurueck
    pub fn setzen(
        &mut self,
        counter_id: CounterId,
        generation: u64,
        handle: TimerHandle,
    ) -> Option<TimerHandle> {
        self.gehalten = true;
        self.counter_id = Some(counter_id);
        self.timer.replace((generation, handle)).map(|(_, h)| h)
    }

    /// Gibt die Sperre frei, liefert den laufenden Timer zum Abbrechen
    pub fn freigeben(&mut self) -> Option<TimerHandle> {
        self.gehalten = false;
        self.counter_id = None;
        self.timer.take().map(|(_, h)| h)
    }

    /// Prueft ob der Sicherheits-Timer dieser Generation noch der aktuelle ist
    pub fn timeout_gueltig(&self, generation: u64) -> bool {
        matches!(self.timer, Some((g, _)) if g == generation)
    }

    pub fn ist_gehalten(&self) -> bool {
        self.gehalten
    }

    pub fn status(&self) -> VoiceStatus {
        VoiceStatus {
            is_speaking: self.gehalten,
            counter_id: self.counter_id,
        }
    }
}
