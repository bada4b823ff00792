//! Background Expiry Sweeper
//!
//! Expiry is enforced lazily: every read checks the deadline. A key that
//! expires and is never touched again would still sit in memory, so this
//! task periodically purges expired entries from all namespaces.
//!
//! The sweeper only reclaims memory. It never changes what a client sees,
//! because an expired entry already reads as absent.

use crate::storage::SharedStore;
use std::sync::PoisonError;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the sweeper as a background task purging every `interval`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(store: SharedStore, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(store, interval, shutdown_rx));

        info!(interval_ms = interval.as_millis() as u64, "Expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the expiry sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            debug!("Expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(store: SharedStore, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    trace!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let (purged, remaining) = {
            let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
            let purged = store.purge_expired();
            (purged, store.len())
        };

        if purged > 0 {
            debug!(purged, remaining, "Expired entries purged");
        }
    }
}
