//! Tests fuer die QueueEngine (In-Memory SQLite, feste Uhr)

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, Local, TimeZone};
use queuedesk_core::{
    AufzeichnenderBus, CounterId, CounterStatus, FesteUhr, QueueEvent, TicketId, TicketStatus,
    TicketTyp, VoiceLockGate,
};
use queuedesk_db::{
    models::{CounterUpdate, NeuerCounter},
    CounterRepository, SettingsRepository, SqliteDb, StatsRepository, TicketRepository,
};

use crate::{engine::QueueEngine, error::QueueError};

#[derive(Default)]
struct TestSperre(AtomicBool);

impl VoiceLockGate for TestSperre {
    fn is_held(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct Umgebung {
    engine: Arc<QueueEngine<SqliteDb>>,
    db: Arc<SqliteDb>,
    bus: Arc<AufzeichnenderBus>,
    uhr: Arc<FesteUhr>,
    sperre: Arc<TestSperre>,
    counter: CounterId,
}

async fn umgebung() -> Umgebung {
    let db = Arc::new(
        SqliteDb::in_memory()
            .await
            .expect("In-Memory-DB konnte nicht geoeffnet werden"),
    );
    let counter = CounterRepository::create(
        db.as_ref(),
        NeuerCounter {
            name: "Schalter 1",
            description: None,
            status: CounterStatus::Active,
        },
    )
    .await
    .expect("Schalter anlegen fehlgeschlagen")
    .id;

    let bus = Arc::new(AufzeichnenderBus::neu());
    let uhr = Arc::new(FesteUhr::neu(
        Local.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap(),
    ));
    let sperre = Arc::new(TestSperre::default());
    let engine = QueueEngine::neu(db.clone(), sperre.clone(), bus.clone(), uhr.clone());

    Umgebung {
        engine,
        db,
        bus,
        uhr,
        sperre,
        counter,
    }
}

async fn zweiter_schalter(u: &Umgebung, status: CounterStatus) -> CounterId {
    CounterRepository::create(
        u.db.as_ref(),
        NeuerCounter {
            name: "Schalter 2",
            description: None,
            status,
        },
    )
    .await
    .unwrap()
    .id
}

// ---------------------------------------------------------------------------
// Anlegen
// ---------------------------------------------------------------------------

#[tokio::test]
async fn nummern_steigen_und_praefix_nach_typ() {
    let u = umgebung().await;

    let a = u.engine.create(TicketTyp::Normal).await.unwrap();
    let b = u.engine.create(TicketTyp::Priority).await.unwrap();
    let c = u.engine.create(TicketTyp::Normal).await.unwrap();

    assert_eq!((a.number, b.number, c.number), (1, 2, 3));
    assert_eq!(a.display_number, "1");
    assert_eq!(b.display_number, "P-2");
    assert_eq!(c.display_number, "3");
    assert_eq!(u.bus.queue_updates(), 3);
}

#[tokio::test]
async fn praefix_aus_einstellungen_leerer_wert_faellt_zurueck() {
    let u = umgebung().await;
    let mut werte = BTreeMap::new();
    werte.insert("prefix_normal".to_string(), "A-".to_string());
    werte.insert("prefix_priority".to_string(), String::new());
    u.db.upsert_many(&werte).await.unwrap();

    let a = u.engine.create(TicketTyp::Normal).await.unwrap();
    let b = u.engine.create(TicketTyp::Priority).await.unwrap();
    assert_eq!(a.display_number, "A-1");
    assert_eq!(b.display_number, "P-2");
}

#[tokio::test]
async fn nummerierung_beginnt_am_folgetag_neu() {
    let u = umgebung().await;
    u.engine.create(TicketTyp::Normal).await.unwrap();
    u.engine.create(TicketTyp::Normal).await.unwrap();

    u.uhr.vorstellen(Duration::days(1));
    let neu = u.engine.create(TicketTyp::Normal).await.unwrap();
    assert_eq!(neu.number, 1);
}

#[tokio::test]
async fn parallele_anlage_ohne_doppelte_nummern() {
    let u = umgebung().await;
    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = u.engine.clone();
        let typ = if i % 2 == 0 {
            TicketTyp::Normal
        } else {
            TicketTyp::Priority
        };
        handles.push(tokio::spawn(async move { engine.create(typ).await.unwrap().number }));
    }

    let mut nummern = Vec::new();
    for h in handles {
        nummern.push(h.await.unwrap());
    }
    nummern.sort_unstable();
    assert_eq!(nummern, (1..=8).collect::<Vec<i64>>());
}

// ---------------------------------------------------------------------------
// Aufruf
// ---------------------------------------------------------------------------

#[tokio::test]
async fn priority_vor_aelterem_normal() {
    let u = umgebung().await;
    u.uhr.setzen(Local.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap());
    let normal = u.engine.create(TicketTyp::Normal).await.unwrap();
    u.uhr.setzen(Local.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap());
    let prio = u.engine.create(TicketTyp::Priority).await.unwrap();

    let aufgerufen = u.engine.call_next(u.counter, None).await.unwrap();
    assert_eq!(aufgerufen.ticket.id, prio.id);
    assert_eq!(aufgerufen.ticket.status, TicketStatus::Calling);
    assert_eq!(aufgerufen.ticket.counter_id, Some(u.counter));
    assert!(aufgerufen.ticket.called_at.is_some());

    let wartend = u.engine.get_waiting_tickets(None).await.unwrap();
    assert_eq!(wartend.len(), 1);
    assert_eq!(wartend[0].id, normal.id);
}

#[tokio::test]
async fn fifo_innerhalb_eines_typs() {
    let u = umgebung().await;
    let erstes = u.engine.create(TicketTyp::Normal).await.unwrap();
    u.uhr.vorstellen(Duration::minutes(1));
    u.engine.create(TicketTyp::Normal).await.unwrap();

    let aufgerufen = u.engine.call_next(u.counter, None).await.unwrap();
    assert_eq!(aufgerufen.ticket.id, erstes.id);
}

#[tokio::test]
async fn typ_filter_beschraenkt_auswahl() {
    let u = umgebung().await;
    let normal = u.engine.create(TicketTyp::Normal).await.unwrap();
    u.engine.create(TicketTyp::Priority).await.unwrap();

    let aufgerufen = u
        .engine
        .call_next(u.counter, Some(TicketTyp::Normal))
        .await
        .unwrap();
    assert_eq!(aufgerufen.ticket.id, normal.id);
}

#[tokio::test]
async fn aufruf_sendet_ticket_called_dann_queue_update() {
    let u = umgebung().await;
    u.engine.create(TicketTyp::Normal).await.unwrap();
    u.bus.leeren();

    let aufgerufen = u.engine.call_next(u.counter, None).await.unwrap();
    let events = u.bus.gesendet();
    assert_eq!(events.len(), 2);
    match &events[0] {
        QueueEvent::TicketCalled(snapshot) => {
            assert_eq!(snapshot.id, aufgerufen.ticket.id);
            assert_eq!(snapshot.counter.as_ref().unwrap().name, "Schalter 1");
        }
        andere => panic!("TicketCalled erwartet, erhalten: {andere:?}"),
    }
    assert_eq!(events[1], QueueEvent::QueueUpdate);
}

#[tokio::test]
async fn erneuter_aufruf_schliesst_vorheriges_ab() {
    let u = umgebung().await;
    let x = u.engine.create(TicketTyp::Normal).await.unwrap();
    let y = u.engine.create(TicketTyp::Normal).await.unwrap();

    u.engine.call_next(u.counter, None).await.unwrap();
    u.uhr.vorstellen(Duration::minutes(5));
    let zweiter = u.engine.call_next(u.counter, None).await.unwrap();
    assert_eq!(zweiter.ticket.id, y.id);

    let x_neu = TicketRepository::get_by_id(u.db.as_ref(), x.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(x_neu.status, TicketStatus::Completed);
    assert!(x_neu.finished_at.is_some());

    let calling = u.engine.get_calling_tickets().await.unwrap();
    assert_eq!(calling.len(), 1);
    assert_eq!(calling[0].ticket.id, y.id);

    let stats = StatsRepository::list(u.db.as_ref()).await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].typ, TicketTyp::Normal);
    assert_eq!(stats[0].count, 1);
}

#[tokio::test]
async fn auto_abschluss_bleibt_wenn_nichts_mehr_wartet() {
    let u = umgebung().await;
    let x = u.engine.create(TicketTyp::Priority).await.unwrap();
    u.engine.call_next(u.counter, None).await.unwrap();
    u.bus.leeren();

    let err = u.engine.call_next(u.counter, None).await.unwrap_err();
    assert!(matches!(err, QueueError::NoWaitingTickets));
    assert_eq!(u.bus.gesendet(), vec![QueueEvent::QueueUpdate]);

    let x_neu = TicketRepository::get_by_id(u.db.as_ref(), x.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(x_neu.status, TicketStatus::Completed);
}

#[tokio::test]
async fn leere_warteschlange_ohne_abschluss_sendet_nichts() {
    let u = umgebung().await;
    let err = u.engine.call_next(u.counter, None).await.unwrap_err();
    assert!(matches!(err, QueueError::NoWaitingTickets));
    assert!(u.bus.gesendet().is_empty());
}

#[tokio::test]
async fn sprachsperre_blockiert_aufruf() {
    let u = umgebung().await;
    let t = u.engine.create(TicketTyp::Normal).await.unwrap();
    u.sperre.0.store(true, Ordering::SeqCst);

    let err = u.engine.call_next(u.counter, None).await.unwrap_err();
    assert!(matches!(err, QueueError::DispatchLocked));

    let unveraendert = TicketRepository::get_by_id(u.db.as_ref(), t.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unveraendert.status, TicketStatus::Waiting);

    u.sperre.0.store(false, Ordering::SeqCst);
    assert!(u.engine.call_next(u.counter, None).await.is_ok());
}

#[tokio::test]
async fn unbekannter_oder_inaktiver_schalter() {
    let u = umgebung().await;
    u.engine.create(TicketTyp::Normal).await.unwrap();

    let err = u.engine.call_next(CounterId(99), None).await.unwrap_err();
    assert!(matches!(err, QueueError::CounterUnavailable(CounterId(99))));

    let inaktiv = zweiter_schalter(&u, CounterStatus::Inactive).await;
    let err = u.engine.call_next(inaktiv, None).await.unwrap_err();
    assert!(matches!(err, QueueError::CounterUnavailable(_)));

    CounterRepository::update(
        u.db.as_ref(),
        u.counter,
        CounterUpdate {
            status: Some(CounterStatus::Inactive),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(matches!(
        u.engine.call_next(u.counter, None).await,
        Err(QueueError::CounterUnavailable(_))
    ));
}

#[tokio::test]
async fn parallele_aufrufe_nie_zwei_calling_pro_schalter() {
    let u = umgebung().await;
    let zweiter = zweiter_schalter(&u, CounterStatus::Active).await;
    for _ in 0..6 {
        u.engine.create(TicketTyp::Normal).await.unwrap();
    }

    let mut handles = Vec::new();
    for counter in [u.counter, zweiter, u.counter, zweiter, u.counter] {
        let engine = u.engine.clone();
        handles.push(tokio::spawn(async move { engine.call_next(counter, None).await }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let calling = u.engine.get_calling_tickets().await.unwrap();
    assert_eq!(calling.len(), 2);
    assert_ne!(calling[0].ticket.counter_id, calling[1].ticket.counter_id);

    let abgeschlossen = u.engine.find_all(Some(TicketStatus::Completed)).await.unwrap();
    assert_eq!(abgeschlossen.len(), 3);
}

// ---------------------------------------------------------------------------
// Status, erneuter Aufruf, Loeschen
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_update_ist_permissiv() {
    let u = umgebung().await;
    let t = u.engine.create(TicketTyp::Normal).await.unwrap();

    let fertig = u
        .engine
        .update_status(t.id, TicketStatus::Completed)
        .await
        .unwrap();
    assert!(fertig.ticket.finished_at.is_some());

    // Rueckkehr aus einem Endzustand wird nicht verhindert
    let wieder = u
        .engine
        .update_status(t.id, TicketStatus::Waiting)
        .await
        .unwrap();
    assert_eq!(wieder.ticket.status, TicketStatus::Waiting);

    let stats = StatsRepository::list(u.db.as_ref()).await.unwrap();
    assert_eq!(stats[0].count, 1);
}

#[tokio::test]
async fn skipped_setzt_finished_at_ohne_statistik() {
    let u = umgebung().await;
    let t = u.engine.create(TicketTyp::Priority).await.unwrap();
    u.bus.leeren();

    let uebersprungen = u
        .engine
        .update_status(t.id, TicketStatus::Skipped)
        .await
        .unwrap();
    assert_eq!(uebersprungen.ticket.status, TicketStatus::Skipped);
    assert!(uebersprungen.ticket.finished_at.is_some());
    assert!(StatsRepository::list(u.db.as_ref()).await.unwrap().is_empty());
    assert_eq!(u.bus.queue_updates(), 1);
}

#[tokio::test]
async fn status_update_unbekanntes_ticket() {
    let u = umgebung().await;
    let err = u
        .engine
        .update_status(TicketId::new(), TicketStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::TicketNotFound(_)));
}

#[tokio::test]
async fn recall_nur_fuer_calling() {
    let u = umgebung().await;
    let t = u.engine.create(TicketTyp::Normal).await.unwrap();

    let err = u.engine.recall(t.id).await.unwrap_err();
    assert!(matches!(
        err,
        QueueError::InvalidState {
            status: TicketStatus::Waiting,
            ..
        }
    ));

    u.engine.call_next(u.counter, None).await.unwrap();
    u.bus.leeren();

    let wiederholt = u.engine.recall(t.id).await.unwrap();
    assert_eq!(wiederholt.ticket.status, TicketStatus::Calling);
    let events = u.bus.gesendet();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], QueueEvent::TicketCalled(s) if s.id == t.id));

    assert!(matches!(
        u.engine.recall(TicketId::new()).await,
        Err(QueueError::TicketNotFound(_))
    ));
}

#[tokio::test]
async fn loeschen_und_abgeschlossene_entfernen() {
    let u = umgebung().await;
    let a = u.engine.create(TicketTyp::Normal).await.unwrap();
    let b = u.engine.create(TicketTyp::Normal).await.unwrap();
    u.engine.create(TicketTyp::Normal).await.unwrap();

    u.engine.delete(a.id).await.unwrap();
    assert!(matches!(
        u.engine.delete(a.id).await,
        Err(QueueError::TicketNotFound(_))
    ));

    u.engine.update_status(b.id, TicketStatus::Completed).await.unwrap();
    assert_eq!(u.engine.delete_completed().await.unwrap(), 1);
    assert_eq!(u.engine.delete_all().await.unwrap(), 1);
    assert!(u.engine.find_all(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn taegliche_bereinigung_behaelt_statistik() {
    let u = umgebung().await;
    let t = u.engine.create(TicketTyp::Normal).await.unwrap();
    u.engine.create(TicketTyp::Priority).await.unwrap();
    u.engine.update_status(t.id, TicketStatus::Completed).await.unwrap();
    u.bus.leeren();

    let mitternacht = Local.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap();
    let bericht = u.engine.daily_cleanup(mitternacht).await.unwrap();
    assert_eq!(bericht.geloescht, 2);
    assert_eq!(u.bus.queue_updates(), 1);

    assert!(u.engine.find_all(None).await.unwrap().is_empty());
    assert_eq!(StatsRepository::list(u.db.as_ref()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn bereinigung_fehler_wird_geschluckt() {
    let u = umgebung().await;
    u.db.schliessen().await;

    let bericht = u
        .engine
        .daily_cleanup(Local.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap())
        .await;
    assert!(bericht.is_none());
    assert!(u.bus.gesendet().is_empty());
}

// ---------------------------------------------------------------------------
// Statistik
// ---------------------------------------------------------------------------

#[tokio::test]
async fn statistik_nach_einem_abschluss() {
    let u = umgebung().await;
    let t = u.engine.create(TicketTyp::Normal).await.unwrap();
    u.engine.update_status(t.id, TicketStatus::Completed).await.unwrap();

    let stat = u.engine.get_statistics().await.unwrap();
    assert_eq!(stat.today.normal, 1);
    assert_eq!(stat.month.normal, 1);
    assert_eq!(stat.year.normal, 1);
    assert_eq!(stat.today.priority, 0);
    assert_eq!(stat.history.len(), 1);
}

#[tokio::test]
async fn warteliste_limit() {
    let u = umgebung().await;
    for _ in 0..12 {
        u.engine.create(TicketTyp::Normal).await.unwrap();
    }
    assert_eq!(u.engine.get_waiting_tickets(None).await.unwrap().len(), 10);
    assert_eq!(u.engine.get_waiting_tickets(Some(3)).await.unwrap().len(), 3);
    assert_eq!(u.engine.get_waiting_tickets(Some(0)).await.unwrap().len(), 10);
}
