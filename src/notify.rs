//! Email notification sink — fire-and-forget SMTP.

use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport as _};
use secrecy::ExposeSecret;

use crate::config::EmailConfig;
use crate::error::NotifyError;

/// Fire-and-forget email notifications.
///
/// A failed send is logged and never surfaces to the caller; message
/// handling must not stall or crash on a broken mail path.
#[derive(Clone)]
pub struct Notifier {
    config: EmailConfig,
}

impl Notifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Queue one notification mail. Returns immediately; the blocking SMTP
    /// send runs on the blocking pool and any failure is warn-logged there.
    pub fn notify(&self, to: &str, subject: &str, body: &str) {
        let config = self.config.clone();
        let to = to.to_string();
        let subject = subject.to_string();
        let body = body.to_string();

        tokio::task::spawn_blocking(move || {
            match send_mail(&config, &to, &subject, &body) {
                Ok(()) => tracing::info!(%to, %subject, "Notification email sent"),
                Err(e) => tracing::warn!(%to, error = %e, "Notification email failed"),
            }
        });
    }
}

/// Build and send one mail over SMTP (blocking).
fn send_mail(config: &EmailConfig, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
    let email = Message::builder()
        .from(
            config
                .from_address
                .parse()
                .map_err(|e| NotifyError::BuildFailed(format!("invalid from address: {e}")))?,
        )
        .to(to
            .parse()
            .map_err(|e| NotifyError::BuildFailed(format!("invalid to address: {e}")))?)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| NotifyError::BuildFailed(e.to_string()))?;

    let creds = Credentials::new(
        config.username.clone(),
        config.password.expose_secret().to_string(),
    );

    let transport = SmtpTransport::starttls_relay(&config.smtp_host)
        .map_err(|e| NotifyError::SendFailed(format!("SMTP relay error: {e}")))?
        .port(config.smtp_port)
        .credentials(creds)
        .build();

    transport
        .send(&email)
        .map_err(|e| NotifyError::SendFailed(e.to_string()))?;

    Ok(())
}
