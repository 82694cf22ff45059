//! # Background Workers
//!
//! Process-lifetime scheduler for the two periodic sweeps: reminders and
//! dialog inactivity. Each sweep runs on its own timer as an independent
//! task; a shared watch token shuts both down. Sweep runs are safe to
//! overlap thanks to the claim/skip-locked pattern and the farewell guards.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::DialogConfig;
use crate::lifecycle::DialogLifecycle;
use crate::reminders::ReminderWorker;

pub struct BackgroundWorkers {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundWorkers {
    /// Spawn both sweep loops.
    pub fn start(
        reminder_worker: ReminderWorker,
        lifecycle: Arc<DialogLifecycle>,
        dialog_config: DialogConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(2);

        let reminder_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            reminder_worker.run(reminder_shutdown).await;
        }));

        let mut inactivity_shutdown = shutdown_rx;
        handles.push(tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(dialog_config.sweep_interval_seconds));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(
                interval_seconds = dialog_config.sweep_interval_seconds,
                "Inactivity worker started"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = lifecycle.process_inactive_sessions().await {
                            warn!(error = %e, "Inactivity sweep failed");
                        }
                    }
                    _ = inactivity_shutdown.changed() => {
                        if *inactivity_shutdown.borrow() {
                            info!("Inactivity worker shutting down");
                            return;
                        }
                    }
                }
            }
        }));

        Self {
            shutdown_tx,
            handles,
        }
    }

    /// Signal both workers and wait for them to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task did not shut down cleanly");
            }
        }
        info!("Background workers stopped");
    }
}
