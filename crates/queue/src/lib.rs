//! queuedesk-queue – Ticket-Lebenszyklus und Aufruf-Engine
//!
//! Dieses Crate implementiert:
//! - QueueEngine: Tickets ziehen, aufrufen, Status aendern, erneut aufrufen,
//!   loeschen, naechtliche Bereinigung
//! - Statistik: Tageszaehler zu Tag/Monat/Jahr zusammenfassen
//!
//! Die Engine kennt die Sprachsperre nur ueber `VoiceLockGate` und
//! benachrichtigt Clients nur ueber `EventBus`.

pub mod engine;
pub mod error;
pub mod statistics;

#[cfg(test)]
mod tests;

pub use engine::{BereinigungsBericht, QueueEngine, STANDARD_WARTE_LIMIT};
pub use error::{QueueError, QueueResult};
pub use statistics::{Statistik, TypZaehler};
