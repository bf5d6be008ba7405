//! Uhr und Timer-Dienst
//!
//! Die Engine liest die Wanduhr nur ueber `Uhr`, der Koordinator plant
//! verzoegerte Aktionen nur ueber `TimerDienst`. Tests setzen `FesteUhr`
//! ein und steuern `TokioTimer` ueber die pausierte tokio-Zeit.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;

/// Liefert die aktuelle Wanduhrzeit
pub trait Uhr: Send + Sync + 'static {
    fn jetzt(&self) -> DateTime<Local>;
}

/// Systemuhr des Hosts
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUhr;

impl Uhr for SystemUhr {
    fn jetzt(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Manuell gestellte Uhr
#[derive(Debug)]
pub struct FesteUhr {
    zeit: Mutex<DateTime<Local>>,
}

impl FesteUhr {
    pub fn neu(start: DateTime<Local>) -> Self {
        Self {
            zeit: Mutex::new(start),
        }
    }

    pub fn setzen(&self, zeit: DateTime<Local>) {
        *self.zeit.lock() = zeit;
    }

    pub fn vorstellen(&self, dauer: chrono::Duration) {
        let mut zeit = self.zeit.lock();
        *zeit += dauer;
    }
}

impl Uhr for FesteUhr {
    fn jetzt(&self) -> DateTime<Local> {
        *self.zeit.lock()
    }
}

/// Beginn des Kalendertages (lokal 00:00) eines Zeitpunkts, in UTC
pub fn tagesbeginn(zeitpunkt: DateTime<Local>) -> DateTime<Utc> {
    let mitternacht = zeitpunkt
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| zeitpunkt.naive_local());
    // Bei einer Zeitumstellung um Mitternacht existiert 00:00 evtl. nicht
    match Local.from_local_datetime(&mitternacht).earliest() {
        Some(lokal) => lokal.with_timezone(&Utc),
        None => zeitpunkt.with_timezone(&Utc),
    }
}

/// Lokales Kalenderdatum eines Zeitpunkts
pub fn kalendertag(zeitpunkt: DateTime<Local>) -> NaiveDate {
    zeitpunkt.date_naive()
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// Verzoegert auszufuehrende Aktion
pub type TimerAktion = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handle auf eine geplante Aktion
///
/// `abbrechen` ist idempotent. Eine Aktion die bereits laeuft wird
/// abgebrochen, sobald sie den naechsten Await-Punkt erreicht; Aufrufer
/// muessen spaete Ausfuehrungen deshalb zusaetzlich per Generation verwerfen.
#[derive(Debug)]
pub struct TimerHandle {
    abbruch: tokio::task::AbortHandle,
}

impl TimerHandle {
    pub fn abbrechen(&self) {
        self.abbruch.abort();
    }
}

/// Plant abbrechbare, verzoegerte Aktionen
pub trait TimerDienst: Send + Sync + 'static {
    fn planen(&self, verzoegerung: Duration, aktion: TimerAktion) -> TimerHandle;
}

/// Timer-Dienst auf Basis von `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl TimerDienst for TokioTimer {
    fn planen(&self, verzoegerung: Duration, aktion: TimerAktion) -> TimerHandle {
        let task = tokio::spawn(async move {
            tokio::time::sleep(verzoegerung).await;
            aktion.await;
        });
        TimerHandle {
            abbruch: task.abort_handle(),
        }
    }
}
