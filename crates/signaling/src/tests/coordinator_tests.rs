//! Tests fuer den QueueCoordinator (pausierte tokio-Zeit)
//!
//! Die Benutzer-Datenbank ist hier eine In-Memory-Attrappe: echte
//! SQLite-IO wuerde mit der automatisch vorspulenden Testzeit kollidieren.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use queuedesk_core::{
    AufzeichnenderBus, ConnectionId, CounterId, QueueEvent, TokioTimer, UserId, VoiceLockGate,
    VoiceStatus,
};
use queuedesk_db::{
    BenutzerRecord, BenutzerUpdate, DbError, DbResult, NeuerBenutzer, UserRepository,
};

use crate::coordinator::{KoordinatorConfig, QueueCoordinator};

#[derive(Default)]
struct TestBenutzer {
    schreibvorgaenge: Mutex<Vec<(UserId, bool)>>,
    online: Mutex<HashMap<UserId, bool>>,
    fehlschlagen: AtomicBool,
}

impl TestBenutzer {
    fn schreibvorgaenge(&self) -> Vec<(UserId, bool)> {
        self.schreibvorgaenge.lock().clone()
    }

    fn ist_online(&self, user_id: &UserId) -> bool {
        self.online.lock().get(user_id).copied().unwrap_or(false)
    }
}

#[async_trait]
impl UserRepository for TestBenutzer {
    async fn create(&self, _data: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord> {
        Err(DbError::intern("in Tests nicht benoetigt"))
    }

    async fn get_by_id(&self, _id: UserId) -> DbResult<Option<BenutzerRecord>> {
        Ok(None)
    }

    async fn list(&self) -> DbResult<Vec<BenutzerRecord>> {
        Ok(Vec::new())
    }

    async fn set_online(&self, id: UserId, online: bool) -> DbResult<()> {
        if self.fehlschlagen.load(Ordering::SeqCst) {
            return Err(DbError::intern("Datenbank nicht erreichbar"));
        }
        self.schreibvorgaenge.lock().push((id, online));
        self.online.lock().insert(id, online);
        Ok(())
    }
    async fn update(&self, _id: UserId, _data: BenutzerUpdate) -> DbResult<BenutzerRecord> {
        Err(DbError::intern("in Tests nicht benoetigt"))
    }

    async fn delete(&self, _id: UserId) -> DbResult<bool> {
        Ok(false)
    }
}

struct Umgebung {
    koordinator: QueueCoordinator<TestBenutzer>,
    benutzer: Arc<TestBenutzer>,
    bus: Arc<AufzeichnenderBus>,
}

fn umgebung() -> Umgebung {
    let benutzer = Arc::new(TestBenutzer::default());
    let bus = Arc::new(AufzeichnenderBus::neu());
    let koordinator = QueueCoordinator::neu(
        benutzer.clone(),
        bus.clone(),
        Arc::new(TokioTimer),
        KoordinatorConfig::default(),
    );
    Umgebung {
        koordinator,
        benutzer,
        bus,
    }
}

async fn warten(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    tokio::task::yield_now().await;
}

fn voice_events(bus: &AufzeichnenderBus) -> Vec<VoiceStatus> {
    bus.gesendet()
        .into_iter()
        .filter_map(|e| match e {
            QueueEvent::VoiceStatusUpdate(s) => Some(s),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn zwei_tabs_eine_trennung_bleibt_online() {
    let u = umgebung();
    let user = UserId::new();
    let (a, b) = (ConnectionId::new(), ConnectionId::new());

    u.koordinator.connect(a, Some(user)).await;
    u.koordinator.connect(b, Some(user)).await;
    u.koordinator.disconnect(a);

    assert!(u.koordinator.ist_online(&user));
    assert_eq!(u.koordinator.verbindungen_von(&user), 1);
    assert_eq!(u.benutzer.schreibvorgaenge(), vec![(user, true)]);
    assert_eq!(u.bus.queue_updates(), 1);

    warten(5000).await;
    assert!(u.benutzer.ist_online(&user));
}

#[tokio::test(start_paused = true)]
async fn offline_erst_nach_schonfrist() {
    let u = umgebung();
    let user = UserId::new();
    let (a, b) = (ConnectionId::new(), ConnectionId::new());

    u.koordinator.connect(a, Some(user)).await;
    u.koordinator.connect(b, Some(user)).await;
    u.koordinator.disconnect(a);
    u.koordinator.disconnect(b);

    warten(2999).await;
    assert!(u.koordinator.ist_online(&user));
    assert!(u.benutzer.ist_online(&user));

    warten(2).await;
    assert!(!u.koordinator.ist_online(&user));
    assert_eq!(u.benutzer.schreibvorgaenge(), vec![(user, true), (user, false)]);
    assert_eq!(u.bus.queue_updates(), 2);
}

#[tokio::test(start_paused = true)]
async fn reconnect_in_schonfrist_meldet_online_ohne_offline() {
    let u = umgebung();
    let user = UserId::new();
    let a = ConnectionId::new();

    u.koordinator.connect(a, Some(user)).await;
    u.koordinator.disconnect(a);
    u.bus.leeren();

    // Seiten-Reload innerhalb der Schonfrist: Zaehler 0 -> 1
    warten(1000).await;
    u.koordinator.connect(ConnectionId::new(), Some(user)).await;
    assert_eq!(u.benutzer.schreibvorgaenge(), vec![(user, true), (user, true)]);
    assert_eq!(u.bus.queue_updates(), 1);

    // Abgebrochener Abwesenheits-Timer schreibt nie offline
    warten(10_000).await;
    assert_eq!(u.benutzer.schreibvorgaenge(), vec![(user, true), (user, true)]);
    assert_eq!(u.bus.queue_updates(), 1);
    assert!(u.benutzer.ist_online(&user));
    assert!(u.koordinator.ist_online(&user));
    assert_eq!(u.koordinator.verbindungen_von(&user), 1);
}

#[tokio::test(start_paused = true)]
async fn zweiter_tab_in_schonfrist_nur_ein_signal() {
    let u = umgebung();
    let user = UserId::new();
    let a = ConnectionId::new();

    u.koordinator.connect(a, Some(user)).await;
    u.koordinator.disconnect(a);
    u.bus.leeren();

    warten(500).await;
    u.koordinator.connect(ConnectionId::new(), Some(user)).await;
    u.koordinator.connect(ConnectionId::new(), Some(user)).await;

    assert_eq!(u.bus.queue_updates(), 1);
    assert_eq!(u.koordinator.verbindungen_von(&user), 2);
}

#[tokio::test(start_paused = true)]
async fn wieder_online_nach_abgelaufener_schonfrist() {
    let u = umgebung();
    let user = UserId::new();
    let a = ConnectionId::new();

    u.koordinator.connect(a, Some(user)).await;
    u.koordinator.disconnect(a);
    warten(3500).await;
    assert!(!u.benutzer.ist_online(&user));

    u.koordinator.connect(ConnectionId::new(), Some(user)).await;
    assert_eq!(
        u.benutzer.schreibvorgaenge(),
        vec![(user, true), (user, false), (user, true)]
    );
}

#[tokio::test(start_paused = true)]
async fn connect_sendet_privaten_sperren_snapshot() {
    let u = umgebung();
    u.koordinator.acquire(CounterId(4));

    let verbindung = ConnectionId::new();
    u.koordinator.connect(verbindung, Some(UserId::new())).await;

    let privat = u.bus.privat_gesendet();
    assert_eq!(privat.len(), 1);
    assert_eq!(privat[0].0, verbindung);
    assert_eq!(
        privat[0].1,
        QueueEvent::VoiceStatusUpdate(VoiceStatus {
            is_speaking: true,
            counter_id: Some(CounterId(4)),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn anonyme_verbindung_ohne_presence() {
    let u = umgebung();
    let verbindung = ConnectionId::new();

    u.koordinator.connect(verbindung, None).await;
    u.koordinator.disconnect(verbindung);
    warten(5000).await;

    assert_eq!(u.bus.privat_gesendet().len(), 1);
    assert!(u.benutzer.schreibvorgaenge().is_empty());
    assert_eq!(u.koordinator.online_anzahl(), 0);
}

#[tokio::test(start_paused = true)]
async fn unbekannte_verbindung_wird_ignoriert() {
    let u = umgebung();
    u.koordinator.disconnect(ConnectionId::new());
    warten(5000).await;
    assert!(u.benutzer.schreibvorgaenge().is_empty());
    assert!(u.bus.gesendet().is_empty());
}

#[tokio::test(start_paused = true)]
async fn datenbankfehler_wird_geschluckt() {
    let u = umgebung();
    let user = UserId::new();
    u.benutzer.fehlschlagen.store(true, Ordering::SeqCst);

    let a = ConnectionId::new();
    u.koordinator.connect(a, Some(user)).await;
    assert_eq!(u.koordinator.verbindungen_von(&user), 1);
    assert_eq!(u.bus.queue_updates(), 0);

    u.koordinator.disconnect(a);
    warten(3500).await;
    assert!(!u.koordinator.ist_online(&user));
    assert_eq!(u.bus.queue_updates(), 0);

    // Nach Wiederherstellung funktioniert die Presence normal weiter
    u.benutzer.fehlschlagen.store(false, Ordering::SeqCst);
    u.koordinator.connect(ConnectionId::new(), Some(user)).await;
    assert_eq!(u.benutzer.schreibvorgaenge(), vec![(user, true)]);
}

// ---------------------------------------------------------------------------
// Sprachsperre
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn sperre_laeuft_nach_timeout_ab() {
    let u = umgebung();
    u.koordinator.acquire(CounterId(2));
    assert!(u.koordinator.is_held());
    assert_eq!(
        voice_events(&u.bus),
        vec![VoiceStatus {
            is_speaking: true,
            counter_id: Some(CounterId(2))
        }]
    );

    warten(9999).await;
    assert!(u.koordinator.is_held());

    warten(2).await;
    assert!(!u.koordinator.is_held());
    assert_eq!(voice_events(&u.bus).last(), Some(&VoiceStatus::frei()));

    let json = serde_json::to_value(QueueEvent::VoiceStatusUpdate(VoiceStatus::frei())).unwrap();
    assert_eq!(json["data"]["isSpeaking"], false);
    assert!(json["data"]["counterId"].is_null());
}

#[tokio::test(start_paused = true)]
async fn release_bricht_timeout_ab() {
    let u = umgebung();
    u.koordinator.acquire(CounterId(1));
    warten(1000).await;
    u.koordinator.release();
    assert!(!u.koordinator.is_held());

    warten(20_000).await;
    // Gesetzt + freigegeben, kein zweites Freigeben durch den Timer
    assert_eq!(voice_events(&u.bus).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn letzter_schreiber_gewinnt_und_ersetzt_timer() {
    let u = umgebung();
    u.koordinator.acquire(CounterId(1));
    warten(5000).await;
    u.koordinator.acquire(CounterId(2));
    assert_eq!(u.koordinator.voice_status().counter_id, Some(CounterId(2)));

    // Erster Timer waere bei 10 s abgelaufen
    warten(6000).await;
    assert!(u.koordinator.is_held());

    warten(5000).await;
    assert!(!u.koordinator.is_held());
    assert_eq!(voice_events(&u.bus).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn release_sendet_auch_ohne_sperre() {
    let u = umgebung();
    u.koordinator.release();
    assert_eq!(voice_events(&u.bus), vec![VoiceStatus::frei()]);
}

#[tokio::test(start_paused = true)]
async fn koordinator_als_gate() {
    let u = umgebung();
    let gate: Arc<dyn VoiceLockGate> = Arc::new(u.koordinator.clone());
    assert!(!gate.is_held());
    u.koordinator.acquire(CounterId(1));
    assert!(gate.is_held());
    u.koordinator.herunterfahren();
    assert!(!gate.is_held());
}

#[tokio::test(start_paused = true)]
async fn konfigurierbare_zeiten() {
    let benutzer = Arc::new(TestBenutzer::default());
    let bus = Arc::new(AufzeichnenderBus::neu());
    let koordinator = QueueCoordinator::neu(
        benutzer.clone(),
        bus.clone(),
        Arc::new(TokioTimer),
        KoordinatorConfig {
            abwesenheit_verzoegerung: Duration::from_millis(100),
            sprachsperre_timeout: Duration::from_millis(200),
        },
    );
    let user = UserId::new();
    let a = ConnectionId::new();

    koordinator.connect(a, Some(user)).await;
    koordinator.disconnect(a);
    koordinator.acquire(CounterId(1));

    warten(150).await;
    assert!(!koordinator.ist_online(&user));
    assert!(koordinator.is_held());

    warten(100).await;
    assert!(!koordinator.is_held());
}
