//! Background expiry sweep
//!
//! Owned by the process lifecycle: spawned on boot, stopped on shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::idempotency::ProcessedPayments;
use crate::session::SessionStore;

/// Periodic sweeper for the session store and the processed-payment ledger
pub struct SessionSweeper {
    sessions: Arc<dyn SessionStore>,
    ledger: Arc<dyn ProcessedPayments>,
}

/// Handle to a running sweeper
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SessionSweeper {
    pub fn new(sessions: Arc<dyn SessionStore>, ledger: Arc<dyn ProcessedPayments>) -> Self {
        Self { sessions, ledger }
    }

    /// Run one sweep over both stores
    pub async fn sweep_once(&self) {
        let now = Utc::now();

        match self.sessions.sweep(now).await {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "Swept expired checkout sessions"),
            Err(e) => tracing::warn!(error = %e, "Checkout session sweep failed"),
        }

        match self.ledger.sweep(now).await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "Swept processed payment ids"),
            Err(e) => tracing::warn!(error = %e, "Processed payment sweep failed"),
        }
    }

    /// Spawn the sweep loop on the current runtime
    ///
    /// The first sweep happens one full `interval` after spawning.
    pub fn spawn(self, interval: Duration) -> SweeperHandle {
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => self.sweep_once().await,
                    _ = stop.changed() => break,
                }
            }

            tracing::debug!("Session sweeper stopped");
        });

        SweeperHandle { shutdown, task }
    }
}

impl SweeperHandle {
    /// Signal the loop to stop and wait for it
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Session sweeper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
