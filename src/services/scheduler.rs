//! Background consolidation scheduling.
//!
//! Drives periodic consolidation without holding any per-tenant state:
//! each tick lists the known tenants and runs a pass for the next one in
//! round-robin order. A failed pass is logged and retried naturally on a
//! later tick; it never stops the loop.

use crate::models::{PassStats, TenantId};
use crate::services::ConsolidationService;
use crate::storage::traits::RepositoryBackend;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Periodic driver for [`ConsolidationService`] passes.
pub struct ConsolidationScheduler {
    service: Arc<ConsolidationService>,
    repository: Arc<dyn RepositoryBackend>,
    interval: Duration,
}

impl ConsolidationScheduler {
    /// Creates a scheduler ticking at the configured interval.
    #[must_use]
    pub fn new(
        service: Arc<ConsolidationService>,
        repository: Arc<dyn RepositoryBackend>,
        interval_secs: u64,
    ) -> Self {
        Self {
            service,
            repository,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// Runs one pass for a single tenant immediately.
    ///
    /// Operational escape hatch; the background loop calls the same path.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConsolidationAborted`] if the pass was
    /// rolled back.
    pub fn tick(&self, tenant: &TenantId) -> Result<PassStats> {
        self.service.run_pass(tenant)
    }

    /// Spawns the background loop onto the current tokio runtime.
    ///
    /// Each tick consolidates at most one tenant, so a slow pass for one
    /// tenant cannot starve the runtime, and tenants are visited fairly
    /// as the tenant set changes between ticks.
    #[must_use]
    pub fn spawn(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut cursor = 0_usize;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_next(&mut cursor).await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::debug!("consolidation scheduler stopping");
                            break;
                        }
                    }
                }
            }
        });
        SchedulerHandle { shutdown_tx, task }
    }

    /// Consolidates the next tenant in round-robin order, if any.
    async fn run_next(&self, cursor: &mut usize) {
        let tenants = match self.repository.tenants() {
            Ok(tenants) => tenants,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list tenants for consolidation");
                return;
            }
        };
        if tenants.is_empty() {
            return;
        }
        let tenant = tenants[*cursor % tenants.len()].clone();
        *cursor = cursor.wrapping_add(1);

        // Passes take blocking locks, so they run off the async executor.
        let service = Arc::clone(&self.service);
        let moved = tenant.clone();
        match tokio::task::spawn_blocking(move || service.run_pass(&moved)).await {
            Ok(Ok(stats)) => {
                tracing::debug!(tenant = %tenant, summary = %stats.summary(), "scheduled pass done");
            }
            Ok(Err(e)) => {
                tracing::warn!(tenant = %tenant, error = %e, "scheduled pass failed");
            }
            Err(e) => {
                tracing::warn!(tenant = %tenant, error = %e, "scheduled pass panicked");
            }
        }
    }
}

/// Handle for stopping a spawned scheduler loop.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals the loop to stop after its current tick.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Waits for the loop to exit.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}
