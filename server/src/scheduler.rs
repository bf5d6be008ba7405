//! Naechtliche Bereinigung
//!
//! Die Engine kennt nur `daily_cleanup(jetzt)`. Wann diese Operation laeuft,
//! entscheidet dieser Task anhand der konfigurierten lokalen Uhrzeit.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use queuedesk_core::Uhr;
use queuedesk_db::{CounterRepository, SettingsRepository, StatsRepository, TicketRepository};
use queuedesk_queue::QueueEngine;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Naechster Zeitpunkt nach `jetzt`, an dem die lokale Uhr `uhrzeit` zeigt
///
/// Liegt die Uhrzeit heute bereits zurueck (oder genau auf `jetzt`), wird der
/// Folgetag gewaehlt. Faellt sie in eine Zeitumstellungs-Luecke, gilt der
/// naechste Tag, an dem sie existiert.
pub fn naechster_lauf(jetzt: DateTime<Local>, uhrzeit: NaiveTime) -> DateTime<Local> {
    let heute = jetzt.date_naive();
    for tage in 0..=2 {
        let Some(datum) = heute.checked_add_days(Days::new(tage)) else {
            break;
        };
        if let Some(kandidat) = Local
            .from_local_datetime(&datum.and_time(uhrzeit))
            .earliest()
        {
            if kandidat > jetzt {
                return kandidat;
            }
        }
    }
    jetzt + chrono::Duration::days(1)
}

/// Naechster Lauf, nachdem `ziel` bereits angesteuert wurde
///
/// Der Sleep laeuft auf der monotonen Uhr und kann minimal vor der
/// Wanduhr-Zielzeit aufwachen. Gerechnet wird deshalb ab dem spaeteren der
/// beiden Zeitpunkte, sonst laege der Folgelauf Millisekunden entfernt.
pub fn folgelauf(
    jetzt: DateTime<Local>,
    ziel: Option<DateTime<Local>>,
    uhrzeit: NaiveTime,
) -> DateTime<Local> {
    let basis = ziel.map_or(jetzt, |ziel| ziel.max(jetzt));
    naechster_lauf(basis, uhrzeit)
}

/// Startet den Bereinigungs-Task
///
/// Der Task endet, sobald `shutdown` auf `true` wechselt.
pub fn bereinigung_starten<D>(
    engine: Arc<QueueEngine<D>>,
    uhr: Arc<dyn Uhr>,
    uhrzeit: NaiveTime,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    D: TicketRepository + StatsRepository + CounterRepository + SettingsRepository + 'static,
{
    tokio::spawn(async move {
        let mut letztes_ziel = None;
        loop {
            let jetzt = uhr.jetzt();
            let naechster = folgelauf(jetzt, letztes_ziel, uhrzeit);
            let warten = (naechster - jetzt).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!(naechster_lauf = %naechster, "Bereinigung geplant");

            tokio::select! {
                _ = tokio::time::sleep(warten) => {
                    letztes_ziel = Some(naechster);
                    // Frueh geweckt zaehlt bereits als neuer Tag
                    let stichzeit = uhr.jetzt().max(naechster);
                    if let Some(bericht) = engine.daily_cleanup(stichzeit).await {
                        tracing::info!(geloescht = bericht.geloescht, "Naechtliche Bereinigung abgeschlossen");
                    }
                }
                geaendert = shutdown.changed() => {
                    // Sender weg oder Shutdown gesetzt
                    if geaendert.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Bereinigungs-Task beendet");
    })
}
