//! Configuration types and fixed reply content.

use chrono_tz::Tz;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Acknowledgment sent to the requester when a query is relayed to the
/// answer peer.
pub const WORKING_NOTICE: &str = "🤖 Estamos revisando, un momento por favor...";

/// Sent to a requester whose query arrives while another is in flight.
pub const BUSY_NOTICE: &str = "🧑‍💻 Por favor un momento, estoy con otra consulta.";

/// Sent when no answer peer is configured.
pub const PEER_UNCONFIGURED_NOTICE: &str = "La IA no está configurada.";

/// Display label used when a contact has no display name.
pub const FALLBACK_DISPLAY_NAME: &str = "Desconocido";

/// Phrases that count as a simple greeting (compared after folding).
pub const GREETING_PHRASES: &[&str] = &[
    "hola",
    "saludos",
    "viejo hugo",
    "buen dia",
    "buenas",
    "buenas tardes",
    "buenas noches",
    "buenos dias",
];

/// Delay between transport drops and the next connect attempt.
pub const RECONNECT_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

/// Bot configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Base URL of the messaging bridge.
    pub gateway_url: String,
    /// Address of the answer-generation peer on the same transport.
    /// `None` leaves AI relay disabled (requesters get a notice).
    pub peer_address: Option<String>,
    /// Persona name embedded in peer prompts.
    pub persona: String,
    /// Timezone for time-of-day greetings.
    pub timezone: Tz,
    /// Group containers eligible for automated handling.
    pub allowed_groups: Vec<String>,
    /// Recipient for email reports. `None` disables notifications.
    pub report_to: Option<String>,
    /// SMTP settings for the notification sink.
    pub email: Option<EmailConfig>,
    /// Minimum gap between greetings to the same identity.
    pub greeting_cooldown: chrono::Duration,
    /// Window in which a follow-up message continues the prior answer.
    pub context_timeout: chrono::Duration,
}

impl BotConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let gateway_url =
            std::env::var("WA_GATEWAY_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".into());

        let peer_address = std::env::var("AI_PEER_ADDRESS")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let persona = std::env::var("BOT_PERSONA").unwrap_or_else(|_| "Hugo Romero".into());

        let tz_name = std::env::var("BOT_TIMEZONE").unwrap_or_else(|_| "America/Bogota".into());
        let timezone: Tz = tz_name.parse().map_err(|_| ConfigError::InvalidValue {
            key: "BOT_TIMEZONE".into(),
            message: format!("unknown timezone: {tz_name}"),
        })?;

        let allowed_groups = match std::env::var("GROUP_ALLOWLIST") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => default_allowed_groups(),
        };

        let report_to = std::env::var("REPORT_EMAIL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(Self {
            gateway_url,
            peer_address,
            persona,
            timezone,
            allowed_groups,
            report_to,
            email: EmailConfig::from_env(),
            greeting_cooldown: chrono::Duration::hours(1),
            context_timeout: chrono::Duration::minutes(3),
        })
    }
}

/// Outbound SMTP configuration for the notification sink.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl EmailConfig {
    /// Build config from environment variables.
    /// Returns `None` if `EMAIL_USERNAME` is not set (sink disabled).
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("EMAIL_USERNAME").ok()?;

        let smtp_host =
            std::env::var("EMAIL_SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".into());

        let smtp_port: u16 = std::env::var("EMAIL_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let password = SecretString::from(std::env::var("EMAIL_PASSWORD").unwrap_or_default());
        let from_address = std::env::var("EMAIL_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Some(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
        })
    }
}

/// Group containers handled automatically when no allowlist is configured.
pub fn default_allowed_groups() -> Vec<String> {
    [
        "573124138249-1633615578@g.us",
        "573144117449-1420163618@g.us",
        "1579546575@g.us",
        "1390082199@g.us",
        "1410194235@g.us",
        "120363043316977258@g.us",
        "120363042095724140@g.us",
        "120363420822895904@g.us",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
