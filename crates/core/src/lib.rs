//! queuedesk-core – Gemeinsame Typen, Ereignisse und Zeitquellen
//!
//! Dieses Crate stellt die Bausteine bereit, die von Engine, Koordinator,
//! Datenbank und Server gemeinsam genutzt werden.

pub mod event;
pub mod types;
pub mod zeit;

// Re-Exporte fuer bequemen Zugriff
pub use event::{
    AufzeichnenderBus, CounterSnapshot, EventBus, QueueEvent, TicketSnapshot, VoiceLockGate,
    VoiceStatus,
};
pub use types::{ConnectionId, CounterId, CounterStatus, TicketId, TicketStatus, TicketTyp, UserId};
pub use zeit::{FesteUhr, SystemUhr, TimerAktion, TimerDienst, TimerHandle, TokioTimer, Uhr};
