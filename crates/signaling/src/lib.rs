//! queuedesk-signaling – Presence, Sprachsperre und Echtzeit-Broadcast
//!
//! ## Architektur
//!
//! ```text
//! WebSocket-Gateway (GET /ws?userId=...)
//!     |
//!     +-- connect / disconnect --> QueueCoordinator
//!     |                               +-- PresenceTabelle (Verbindungen, Schonfrist)
//!     |                               +-- Sprachsperre    (voiceStarted/voiceFinished)
//!     |
//!     +-- Send-Queue <------------ EventBroadcaster (EventBus)
//! ```
//!
//! Die Engine fragt die Sprachsperre ueber `VoiceLockGate` ab und sendet
//! ihre Ereignisse ueber denselben `EventBroadcaster`.

pub mod broadcast;
pub mod coordinator;
pub mod error;
pub mod presence;
pub mod protocol;
pub mod voice_lock;
pub mod ws;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use coordinator::{KoordinatorConfig, QueueCoordinator};
pub use error::{SignalingError, SignalingResult};
pub use protocol::ClientNachricht;
pub use ws::{ws_router, GatewayState};
