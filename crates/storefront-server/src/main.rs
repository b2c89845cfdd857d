//! Storefront checkout server
//!
//! Wires the checkout pipeline to its integrations from the environment and
//! serves it over HTTP until Ctrl-C or SIGTERM.

use std::sync::Arc;

use chrono::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_checkout::{
    BackUrls, CheckoutService, CheckoutSessions, LogMailer, Mailer, MelhorEnvioClient,
    MemoryProcessedPayments, MemorySessionStore, MercadoPagoClient, PaymentGateway,
    ResendMailer, SessionSweeper, ShippingQuoter, WebhookReconciler, WebhookVerifier,
};
use storefront_server::{AppState, Payments, ServerConfig, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(environment = ?config.environment, base_url = %config.base_url, "Starting storefront server");

    // Stores
    let store = Arc::new(MemorySessionStore::with_ttl(Duration::hours(config.session_ttl_hours)));
    let ledger = Arc::new(MemoryProcessedPayments::with_ttl(Duration::hours(
        config.processed_payment_ttl_hours,
    )));
    let sessions = CheckoutSessions::new(store.clone());

    // Mail
    let resend = ResendMailer::from_env();
    let mail_configured = resend.is_ok();
    let mailer: Arc<dyn Mailer> = match resend {
        Ok(mailer) => {
            tracing::info!("✓ Mail configured");
            Arc::new(mailer)
        }
        Err(e) => {
            tracing::warn!(reason = %e, "⚠ Mail not configured - order emails will only be logged");
            Arc::new(LogMailer::new())
        }
    };

    // Payments
    let payments = match MercadoPagoClient::from_env() {
        Ok(client) => {
            tracing::info!("✓ Mercado Pago configured");
            let verifier = WebhookVerifier::new(client.webhook_secret())
                .with_tolerance(Duration::seconds(config.webhook_tolerance_secs));
            let gateway: Arc<dyn PaymentGateway> = Arc::new(client);
            Some(Payments {
                checkout: Arc::new(CheckoutService::new(
                    sessions.clone(),
                    gateway.clone(),
                    BackUrls::from_base(&config.base_url),
                    config.environment,
                )),
                reconciler: Arc::new(WebhookReconciler::new(gateway, mailer.clone(), ledger.clone())),
                verifier,
            })
        }
        Err(e) => {
            tracing::warn!(reason = %e, "⚠ Mercado Pago not configured - payments disabled");
            tracing::warn!("  Set MERCADO_PAGO_ACCESS_TOKEN and MERCADO_PAGO_WEBHOOK_SECRET in .env");
            None
        }
    };

    // Shipping
    let shipping: Option<Arc<dyn ShippingQuoter>> = match MelhorEnvioClient::from_env() {
        Ok(client) => {
            tracing::info!("✓ Shipping quotes configured");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(reason = %e, "⚠ Shipping quotes not configured");
            None
        }
    };

    // Background expiry sweep
    let sweeper = SessionSweeper::new(store, ledger).spawn(config.sweep_interval);

    let state = AppState {
        sessions,
        payments,
        mailer,
        mail_configured,
        shipping,
        environment: config.environment,
    };
    let app = router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 storefront server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health            - Health check");
    tracing::info!("  POST /checkout/init     - Open checkout session");
    tracing::info!("  GET  /checkout/{{id}}     - Read checkout session");
    tracing::info!("  POST /checkout          - Create hosted payment");
    tracing::info!("  POST /checkout/webhook  - Payment notifications");
    tracing::info!("  POST /shipping          - Shipping quotes");
    if !config.environment.is_production() {
        tracing::info!("  POST /dev/test-email    - Send sample order emails");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
