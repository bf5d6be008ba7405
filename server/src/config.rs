//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use std::time::Duration;

use chrono::NaiveTime;
use queuedesk_db::DatabaseConfig;
use queuedesk_signaling::KoordinatorConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Datenbank-Einstellungen
    pub datenbank: DatenbankEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Presence-Schonfrist und Sprachsperren-Timeout
    pub koordinator: KoordinatorEinstellungen,
    /// Naechtliche Bereinigung der Tickets
    pub bereinigung: BereinigungsEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "QueueDesk".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer REST, WebSocket und Observability
    pub bind_adresse: String,
    /// Port des HTTP-Listeners
    pub port: u16,
    /// CORS-Origins (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3000,
            cors_origins: vec![],
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    /// WAL-Modus aktivieren
    pub sqlite_wal: bool,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        let db = DatabaseConfig::default();
        Self {
            url: db.url,
            max_verbindungen: db.max_verbindungen,
            sqlite_wal: db.sqlite_wal,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Zeitkonstanten des Presence-/Sprachsperren-Koordinators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KoordinatorEinstellungen {
    /// Schonfrist bevor ein Benutzer ohne Verbindung offline gemeldet wird
    pub abwesenheit_verzoegerung_ms: u64,
    /// Sprachsperre wird nach dieser Zeit automatisch freigegeben
    pub sprachsperre_timeout_ms: u64,
}

impl Default for KoordinatorEinstellungen {
    fn default() -> Self {
        Self {
            abwesenheit_verzoegerung_ms: 3000,
            sprachsperre_timeout_ms: 10_000,
        }
    }
}

/// Naechtliche Bereinigung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BereinigungsEinstellungen {
    pub aktiviert: bool,
    /// Lokale Uhrzeit im Format "HH:MM"
    pub uhrzeit: String,
}

impl Default for BereinigungsEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            uhrzeit: "00:00".into(),
        }
    }
}

impl BereinigungsEinstellungen {
    /// Parst `uhrzeit` als lokale Uhrzeit
    pub fn zeitpunkt(&self) -> anyhow::Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.uhrzeit, "%H:%M").map_err(|e| {
            anyhow::anyhow!("Ungueltige Bereinigungs-Uhrzeit '{}': {e}", self.uhrzeit)
        })
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.validieren()?;
        Ok(config)
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn validieren(&self) -> anyhow::Result<()> {
        if !queuedesk_observability::log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Ungueltiges Log-Level: {}", self.logging.level);
        }
        if !queuedesk_observability::log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Ungueltiges Log-Format: {}", self.logging.format);
        }
        self.bereinigung.zeitpunkt()?;
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse des HTTP-Listeners zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    pub fn datenbank_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.datenbank.url.clone(),
            max_verbindungen: self.datenbank.max_verbindungen,
            sqlite_wal: self.datenbank.sqlite_wal,
        }
    }

    pub fn koordinator_config(&self) -> KoordinatorConfig {
        KoordinatorConfig {
            abwesenheit_verzoegerung: Duration::from_millis(
                self.koordinator.abwesenheit_verzoegerung_ms,
            ),
            sprachsperre_timeout: Duration::from_millis(self.koordinator.sprachsperre_timeout_ms),
        }
    }
}
