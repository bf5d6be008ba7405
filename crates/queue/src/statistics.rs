//! Aggregation der Tageszaehler zu Tages-, Monats- und Jahreswerten

use chrono::{Datelike, NaiveDate};
use queuedesk_core::TicketTyp;
use queuedesk_db::TicketStatRecord;
use serde::Serialize;

/// Abgeschlossene Tickets pro Typ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypZaehler {
    #[serde(rename = "NORMAL")]
    pub normal: i64,
    #[serde(rename = "PRIORITY")]
    pub priority: i64,
}

impl TypZaehler {
    fn addieren(&mut self, typ: TicketTyp, anzahl: i64) {
        match typ {
            TicketTyp::Normal => self.normal += anzahl,
            TicketTyp::Priority => self.priority += anzahl,
        }
    }

    pub fn gesamt(&self) -> i64 {
        self.normal + self.priority
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistik {
    pub today: TypZaehler,
    pub month: TypZaehler,
    pub year: TypZaehler,
    /// Rohdaten, neueste zuerst
    pub history: Vec<TicketStatRecord>,
}

/// Fasst die Tageszaehler relativ zu `heute` zusammen
pub fn aggregieren(history: Vec<TicketStatRecord>, heute: NaiveDate) -> Statistik {
    let mut today = TypZaehler::default();
    let mut month = TypZaehler::default();
    let mut year = TypZaehler::default();

    for eintrag in &history {
        let d = eintrag.date;
        if d == heute {
            today.addieren(eintrag.typ, eintrag.count);
        }
        if d.year() == heute.year() {
            year.addieren(eintrag.typ, eintrag.count);
            if d.month() == heute.month() {
                month.addieren(eintrag.typ, eintrag.count);
            }
        }
    }

    Statistik {
        today,
        month,
        year,
        history,
    }
}
