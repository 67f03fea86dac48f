use std::time::{Duration, Instant};

use tracing::info;

/// Running counters for the worker, owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct WorkerStats {
    pub messages_processed: u64,
    pub messages_discarded: u64,
    pub batches_processed: u64,
    pub domains_processed: u64,
    pub zones_created: u64,
    pub records_removed: u64,
    pub triggers_fired: u64,
    pub trigger_failures: u64,
    pub domains_collected: u64,
    started_at: Instant,
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerStats {
    pub fn new() -> Self {
        Self {
            messages_processed: 0,
            messages_discarded: 0,
            batches_processed: 0,
            domains_processed: 0,
            zones_created: 0,
            records_removed: 0,
            triggers_fired: 0,
            trigger_failures: 0,
            domains_collected: 0,
            started_at: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn log_summary(&self) {
        info!(
            messages_processed = self.messages_processed,
            messages_discarded = self.messages_discarded,
            batches_processed = self.batches_processed,
            domains_processed = self.domains_processed,
            zones_created = self.zones_created,
            records_removed = self.records_removed,
            triggers_fired = self.triggers_fired,
            trigger_failures = self.trigger_failures,
            domains_collected = self.domains_collected,
            uptime_secs = self.uptime().as_secs_f64(),
            "worker statistics"
        );
    }
}
