use std::sync::Arc;

use futures::StreamExt;

use ops_assist::config::{BotConfig, RECONNECT_DELAY};
use ops_assist::delivery::MessageDelivery;
use ops_assist::notify::Notifier;
use ops_assist::router::MessageRouter;
use ops_assist::transport::{HttpGatewayTransport, Transport, TransportEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;

    eprintln!("🤖 Ops Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Gateway: {}", config.gateway_url);
    eprintln!(
        "   AI peer: {}",
        config.peer_address.as_deref().unwrap_or("not configured")
    );
    eprintln!("   Timezone: {}", config.timezone);
    eprintln!("   Group allowlist: {} groups", config.allowed_groups.len());
    match (&config.email, &config.report_to) {
        (Some(email), Some(to)) => {
            eprintln!("   Reports: enabled ({} → {})", email.smtp_host, to);
        }
        _ => eprintln!("   Reports: disabled"),
    }

    let transport: Arc<dyn Transport> = Arc::new(HttpGatewayTransport::new(&config.gateway_url));
    let delivery = MessageDelivery::new(Arc::clone(&transport));
    let notifier = config.email.clone().map(Notifier::new);
    let mut router = MessageRouter::new(&config, delivery, notifier);

    // Connect lifecycle: one session at a time; a drop triggers a fresh
    // connect attempt, never a process exit.
    loop {
        let mut events = match transport.start().await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "Failed to open session");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        while let Some(event) = events.next().await {
            match event {
                TransportEvent::QrChallenge { data } => {
                    tracing::info!("QR challenge received; scan to link the session");
                    eprintln!("--------------------------------------------------");
                    eprintln!("{data}");
                    eprintln!("--------------------------------------------------");
                }
                TransportEvent::Authenticated => {
                    tracing::info!("Session authenticated");
                }
                TransportEvent::Ready { self_address } => {
                    tracing::info!(address = %self_address, "Session ready");
                    router.set_self_address(&self_address);
                }
                TransportEvent::Disconnected { reason } => {
                    tracing::warn!(%reason, "Session disconnected");
                    break;
                }
                TransportEvent::Message(msg) => {
                    // One message at a time; a failure here never takes
                    // down the session loop.
                    if let Err(e) = router.handle(msg).await {
                        tracing::error!(error = %e, "Message handling failed");
                    }
                }
            }
        }

        tracing::warn!("Session ended; reconnecting");
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
