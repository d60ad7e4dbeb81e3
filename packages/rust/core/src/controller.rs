//! Lifecycle controller: the start/stop surface for the process entry point.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::scheduler::Scheduler;

/// Owns the background scheduler task and guarantees clean shutdown.
pub struct Pipeline {
    scheduler: Arc<Scheduler>,
    running: Option<(CancellationToken, JoinHandle<()>)>,
}

impl Pipeline {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler: Arc::new(scheduler),
            running: None,
        }
    }

    /// The scheduler driving this pipeline.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Spawn the scheduler loop on a background task.
    ///
    /// Not guarded against double-start: a second call replaces the previous
    /// handle and the earlier loop keeps running detached.
    pub fn start(&mut self) {
        if self.running.is_some() {
            warn!("pipeline already started, replacing previous handle");
        }

        let token = CancellationToken::new();
        let scheduler = Arc::clone(&self.scheduler);
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            scheduler.run(task_token).await;
        });

        info!("pipeline started");
        self.running = Some((token, handle));
    }

    /// Cancel the loop and wait for it to finish its current tick.
    pub async fn stop(&mut self) {
        let Some((token, handle)) = self.running.take() else {
            return;
        };

        token.cancel();
        if let Err(e) = handle.await {
            warn!(error = %e, "scheduler task did not shut down cleanly");
        }
        info!("pipeline stopped");
    }

    /// Whether a background task handle is currently held.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}
